use common_kafka::config::KafkaConfig;
use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    // Remote location of the raw snapshot. Only required when no usable
    // cached copy exists at `raw_path`.
    pub raw_url: Option<String>,

    #[envconfig(default = "/data/raw.csv")]
    pub raw_path: String,

    #[envconfig(default = "/data/cleaned.csv")]
    pub cleaned_path: String,

    #[envconfig(default = "/data/messages.jsonl")]
    pub jsonl_path: String,

    // Records are additionally published to this topic when set; the file
    // outputs are always written.
    pub kafka_topic: Option<String>,

    #[envconfig(nested = true)]
    pub kafka: KafkaConfig,
}
