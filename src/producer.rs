//! NATS message producer for fraud alerts

use crate::config::NatsConfig;
use crate::types::alert::FraudAlert;
use anyhow::{Context, Result};
use async_nats::Client;
use tracing::{debug, info};

/// Producer for publishing fraud alerts to NATS
#[derive(Clone)]
pub struct AlertProducer {
    client: Client,
    subject: String,
}

impl AlertProducer {
    /// Create a new alert producer
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Connect to the configured server
    pub async fn connect(config: &NatsConfig) -> Result<Self> {
        let client = async_nats::connect(&config.url)
            .await
            .with_context(|| format!("Failed to connect to NATS at {}", config.url))?;
        info!(url = %config.url, subject = %config.subject, "Connected to NATS");
        Ok(Self::new(client, &config.subject))
    }

    /// Publish a fraud alert and wait until the server has it.
    ///
    /// `Client::publish` only queues the message, so without the flush a
    /// process that exits right after a single alert would drop it.
    pub async fn publish(&self, alert: &FraudAlert) -> Result<()> {
        let payload = serde_json::to_vec(alert)?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;
        self.client
            .flush()
            .await
            .context("Failed to flush fraud alert to NATS")?;

        debug!(
            alert_id = %alert.alert_id,
            source = %alert.source,
            fraud_probability = alert.fraud_probability,
            "Published fraud alert"
        );

        Ok(())
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}
