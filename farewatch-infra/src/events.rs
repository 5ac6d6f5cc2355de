use async_trait::async_trait;
use chrono::Utc;
use farewatch_core::messaging::AlertSink;
use farewatch_shared::{PriceAlertEvent, PriceTrend};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{error, info};

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!(
                    "Sent message to {}/{}: partition {} offset {}",
                    topic, key, delivery.partition, delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }
}

/// Hands alerts to the chat collaborator through a Kafka topic, keyed by user
pub struct KafkaAlertSink {
    producer: EventProducer,
    topic: String,
}

impl KafkaAlertSink {
    pub fn new(producer: EventProducer, topic: impl Into<String>) -> Self {
        Self { producer, topic: topic.into() }
    }
}

pub(crate) fn alert_payload(user_id: i64, text: &str, trend: Option<PriceTrend>) -> serde_json::Result<String> {
    serde_json::to_string(&PriceAlertEvent {
        user_id,
        text: text.to_string(),
        trend,
        sent_at: Utc::now().timestamp(),
    })
}

#[async_trait]
impl AlertSink for KafkaAlertSink {
    async fn send_alert(
        &self,
        user_id: i64,
        text: &str,
        trend: Option<PriceTrend>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let payload = alert_payload(user_id, text, trend)?;
        self.producer
            .publish(&self.topic, &user_id.to_string(), &payload)
            .await?;
        Ok(())
    }
}
