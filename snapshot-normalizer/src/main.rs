use std::path::Path;

use anyhow::Context;
use common_kafka::kafka_producer::{create_kafka_producer, send_keyed_iter_to_kafka};
use envconfig::Envconfig;
use snapshot_normalizer::{config::Config, fetch, normalize, output};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn setup_tracing() {
    let log_layer: tracing_subscriber::filter::Filtered<
        tracing_subscriber::fmt::Layer<tracing_subscriber::Registry>,
        EnvFilter,
        tracing_subscriber::Registry,
    > = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(log_layer).init();
}

async fn write_output(path: &str, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("failed to write {path}"))?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing();
    info!("Starting up...");

    let config = Config::init_from_env().context("failed to load configuration from env")?;

    fetch::ensure_raw_snapshot(&config.raw_path, config.raw_url.as_deref()).await?;

    let raw = tokio::fs::read(&config.raw_path)
        .await
        .with_context(|| format!("failed to read {}", config.raw_path))?;
    let records = normalize::normalize(&String::from_utf8_lossy(&raw))?;

    let mut cleaned = Vec::new();
    output::write_cleaned_csv(&records, &mut cleaned)?;
    write_output(&config.cleaned_path, &cleaned).await?;
    info!(path = %config.cleaned_path, rows = records.len(), "wrote cleaned csv");

    let mut jsonl = Vec::new();
    output::write_jsonl(&records, &mut jsonl)?;
    write_output(&config.jsonl_path, &jsonl).await?;
    info!(path = %config.jsonl_path, rows = records.len(), "wrote jsonl");

    if let Some(topic) = &config.kafka_topic {
        let producer = create_kafka_producer(&config.kafka)
            .await
            .context("failed to create kafka producer")?;

        let results = send_keyed_iter_to_kafka(
            &producer,
            topic,
            |message| Some(message.station_code.clone()),
            records.iter(),
        )
        .await;

        let failures = results.iter().filter(|result| result.is_err()).count();
        for produce_error in results.into_iter().filter_map(Result::err).take(5) {
            error!(error = %produce_error, "failed to publish record");
        }
        if failures > 0 {
            anyhow::bail!("{failures} of {} records failed to publish", records.len());
        }
        info!(topic = %topic, records = records.len(), "published records to kafka");
    }

    Ok(())
}
