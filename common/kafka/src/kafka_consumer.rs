use std::sync::{Arc, Weak};

use rdkafka::{
    consumer::{Consumer, StreamConsumer},
    error::KafkaError,
    ClientConfig, Message,
};
use serde::de::DeserializeOwned;

use crate::config::{ConsumerConfig, KafkaConfig};

/// A consumer over a single subscribed topic, with explicit checkpointing.
///
/// Offset auto-store is disabled: an offset only moves past a message once
/// the caller invokes [`Offset::store`], which callers do after the message's
/// effects are durably applied. A message whose handling fails leaves the
/// checkpoint behind it, so the broker redelivers it after a restart or
/// rebalance.
#[derive(Clone)]
pub struct SingleTopicConsumer {
    inner: Arc<Inner>,
}

struct Inner {
    consumer: StreamConsumer,
    topic: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RecvErr {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),
    #[error("empty payload at partition {partition} offset {offset}")]
    Empty { partition: i32, offset: i64 },
    #[error("undecodable payload at partition {partition} offset {offset}: {error}")]
    Payload {
        partition: i32,
        offset: i64,
        error: serde_json::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum OffsetErr {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),
    #[error("Consumer gone")]
    Gone,
}

impl SingleTopicConsumer {
    pub fn new(
        common_config: KafkaConfig,
        consumer_config: ConsumerConfig,
    ) -> Result<Self, KafkaError> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &common_config.kafka_hosts)
            .set("statistics.interval.ms", "10000")
            .set("group.id", consumer_config.kafka_consumer_group)
            .set(
                "auto.offset.reset",
                &consumer_config.kafka_consumer_offset_reset,
            )
            .set(
                "auto.commit.interval.ms",
                consumer_config
                    .kafka_consumer_auto_commit_interval_ms
                    .to_string(),
            );

        client_config.set("enable.auto.offset.store", "false");

        if common_config.kafka_tls {
            client_config
                .set("security.protocol", "ssl")
                .set("enable.ssl.certificate.verification", "false");
        };

        let consumer: StreamConsumer = client_config.create()?;
        consumer.subscribe(&[consumer_config.kafka_consumer_topic.as_str()])?;

        let inner = Inner {
            consumer,
            topic: consumer_config.kafka_consumer_topic,
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Block for the next message and decode its payload as JSON.
    ///
    /// Empty and undecodable payloads are reported with their stream position
    /// and their offset is NOT stored; whether to step over them is the
    /// caller's call, by storing or withholding the checkpoint.
    pub async fn json_recv<T>(&self) -> Result<(T, Offset), RecvErr>
    where
        T: DeserializeOwned,
    {
        let message = self.inner.consumer.recv().await?;

        let offset = Offset {
            handle: Arc::downgrade(&self.inner),
            partition: message.partition(),
            offset: message.offset(),
        };

        let Some(payload) = message.payload() else {
            return Err(RecvErr::Empty {
                partition: offset.partition,
                offset: offset.offset,
            });
        };

        match serde_json::from_slice(payload) {
            Ok(parsed) => Ok((parsed, offset)),
            Err(error) => Err(RecvErr::Payload {
                partition: offset.partition,
                offset: offset.offset,
                error,
            }),
        }
    }
}

/// The checkpoint for one received message. Consumed by [`Offset::store`],
/// so a message's position can be acknowledged at most once.
pub struct Offset {
    handle: Weak<Inner>,
    partition: i32,
    offset: i64,
}

impl Offset {
    pub fn partition(&self) -> i32 {
        self.partition
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Mark this message processed. The background commit flushes stored
    /// offsets on its interval; a crash before the flush only ever causes
    /// redelivery, never loss.
    pub fn store(self) -> Result<(), OffsetErr> {
        let inner = self.handle.upgrade().ok_or(OffsetErr::Gone)?;
        inner
            .consumer
            .store_offset(&inner.topic, self.partition, self.offset)?;
        Ok(())
    }
}
