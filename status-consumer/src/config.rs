use common_kafka::config::{ConsumerConfig, KafkaConfig};
use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(nested = true)]
    pub kafka: KafkaConfig,

    #[envconfig(nested = true)]
    pub consumer: ConsumerConfig,

    #[envconfig(default = "localhost")]
    pub db_host: String,

    #[envconfig(default = "5432")]
    pub db_port: u16,

    #[envconfig(default = "stations")]
    pub db_name: String,

    #[envconfig(default = "stations")]
    pub db_user: String,

    #[envconfig(default = "stations")]
    pub db_password: String,

    #[envconfig(default = "4")]
    pub max_pg_connections: u32,

    // The store routinely comes up later than this process in a compose
    // deployment; connection attempts are retried on a fixed delay before
    // startup is abandoned.
    #[envconfig(default = "30")]
    pub db_connect_attempts: u32,

    #[envconfig(default = "2")]
    pub db_connect_retry_secs: u64,

    #[envconfig(from = "BIND_HOST", default = "::")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "3301")]
    pub port: u16,
}

impl Config {
    pub fn init_with_defaults() -> Result<Self, envconfig::Error> {
        ConsumerConfig::set_defaults("station-status-consumer", "station-status");
        Self::init_from_env()
    }
}
