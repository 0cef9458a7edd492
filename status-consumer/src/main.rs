use std::time::Duration;

use anyhow::Context;
use common_kafka::kafka_consumer::{RecvErr, SingleTopicConsumer};
use common_types::StationStatusRecord;
use health::HealthRegistry;
use serde_json::Value;
use status_consumer::config::Config;
use status_consumer::database;
use status_consumer::metrics_consts::{
    EMPTY_PAYLOADS, MAPPING_FAILURES, MESSAGES_RECEIVED, PAYLOAD_DECODE_FAILURES, ROWS_UPSERTED,
    UPSERT_FAILURES,
};
use status_consumer::server;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn setup_tracing() {
    let log_layer: tracing_subscriber::filter::Filtered<
        tracing_subscriber::fmt::Layer<tracing_subscriber::Registry>,
        EnvFilter,
        tracing_subscriber::Registry,
    > = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(log_layer).init();
}

fn start_admin_server(config: &Config, liveness: HealthRegistry) -> JoinHandle<()> {
    let bind = format!("{}:{}", config.host, config.port);
    let router = server::router(liveness);
    tokio::task::spawn(async move {
        server::serve(router, &bind)
            .await
            .expect("failed to start admin server");
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing();
    info!("Starting up...");

    let config = Config::init_with_defaults().context("failed to load configuration from env")?;

    // Startup connectivity is fatal once the retry budget is spent; steady
    // state write failures below are not, redelivery covers those.
    let pool = database::connect_with_retry(&config)
        .await
        .context("store unreachable, exhausted connection attempts")?;
    database::ensure_schema(&pool)
        .await
        .context("failed to ensure destination table")?;
    info!("store ready, destination table ensured");

    let consumer = SingleTopicConsumer::new(config.kafka.clone(), config.consumer.clone())?;
    info!(
        "Subscribed to topic: {}",
        config.consumer.kafka_consumer_topic
    );

    let liveness = HealthRegistry::new();
    let worker_liveness = liveness.register("consumer_loop", Duration::from_secs(60));
    start_admin_server(&config, liveness);

    loop {
        worker_liveness.report_healthy();

        let (payload, offset): (Value, _) = match consumer.json_recv().await {
            Ok(received) => received,
            Err(RecvErr::Kafka(error)) => {
                // If the broker is gone, we're gone.
                return Err(error.into());
            }
            Err(error @ RecvErr::Empty { .. }) => {
                metrics::counter!(EMPTY_PAYLOADS).increment(1);
                warn!(error = %error, "skipping message, checkpoint withheld");
                continue;
            }
            Err(error @ RecvErr::Payload { .. }) => {
                metrics::counter!(PAYLOAD_DECODE_FAILURES).increment(1);
                warn!(error = %error, "skipping message, checkpoint withheld");
                continue;
            }
        };
        metrics::counter!(MESSAGES_RECEIVED).increment(1);

        let Value::Object(fields) = payload else {
            metrics::counter!(MAPPING_FAILURES).increment(1);
            warn!(
                partition = offset.partition(),
                offset = offset.offset(),
                "payload is not an object, checkpoint withheld"
            );
            continue;
        };

        let record = match StationStatusRecord::from_message(&fields) {
            Ok(record) => record,
            Err(error) => {
                metrics::counter!(MAPPING_FAILURES).increment(1);
                warn!(
                    partition = offset.partition(),
                    offset = offset.offset(),
                    error = %error,
                    "unmappable message, checkpoint withheld"
                );
                continue;
            }
        };

        if let Err(error) = database::upsert_status(&pool, &record).await {
            metrics::counter!(UPSERT_FAILURES).increment(1);
            warn!(
                partition = offset.partition(),
                offset = offset.offset(),
                station_code = %record.station_code,
                error = %error,
                "store write failed, message will be redelivered"
            );
            continue;
        }

        // The store acknowledged the write, only now does the checkpoint
        // move. A crash in between causes redelivery and a repeat upsert,
        // never a lost observation.
        offset
            .store()
            .context("failed to store offset, consumer gone")?;
        metrics::counter!(ROWS_UPSERTED).increment(1);
        debug!(
            station_code = %record.station_code,
            due_date = %record.due_date,
            "row upserted"
        );
    }
}
