//! Fan-out of fraud alerts to the configured channels

use crate::config::{AlertsConfig, SpeechConfig};
use crate::producer::AlertProducer;
use crate::types::alert::FraudAlert;
use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Speaks a fixed phrase through an external text-to-speech program
#[derive(Debug, Clone)]
pub struct SpeechAlert {
    command: String,
    args: Vec<String>,
    phrase: String,
}

impl SpeechAlert {
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            phrase: config.phrase.clone(),
        }
    }

    /// Run the program and wait for it to finish speaking
    pub async fn announce(&self) -> Result<()> {
        let status = Command::new(&self.command)
            .args(&self.args)
            .arg(&self.phrase)
            .status()
            .await
            .with_context(|| format!("Failed to run speech command `{}`", self.command))?;

        if !status.success() {
            anyhow::bail!("Speech command `{}` exited with {}", self.command, status);
        }
        debug!(command = %self.command, "Fraud announcement spoken");
        Ok(())
    }
}

/// One destination for fraud alerts
pub enum AlertChannel {
    Speech(SpeechAlert),
    Nats(AlertProducer),
}

impl AlertChannel {
    fn name(&self) -> &'static str {
        match self {
            AlertChannel::Speech(_) => "speech",
            AlertChannel::Nats(_) => "nats",
        }
    }

    async fn send(&self, alert: &FraudAlert) -> Result<()> {
        match self {
            AlertChannel::Speech(speech) => speech.announce().await,
            AlertChannel::Nats(producer) => producer.publish(alert).await,
        }
    }
}

/// Delivers each alert to every channel; a failing channel never blocks the others
#[derive(Default)]
pub struct AlertDispatcher {
    channels: Vec<AlertChannel>,
}

impl AlertDispatcher {
    /// Dispatcher with no channels
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, channel: AlertChannel) -> Self {
        self.channels.push(channel);
        self
    }

    /// Build the channels named in the configuration
    pub async fn from_config(config: &AlertsConfig) -> Result<Self> {
        let mut dispatcher = Self::disabled();
        if config.speech.enabled {
            dispatcher = dispatcher.with_channel(AlertChannel::Speech(SpeechAlert::new(&config.speech)));
        }
        if let Some(nats) = &config.nats {
            dispatcher = dispatcher.with_channel(AlertChannel::Nats(AlertProducer::connect(nats).await?));
        }
        info!(
            channels = ?dispatcher.channels.iter().map(AlertChannel::name).collect::<Vec<_>>(),
            "Alert channels ready"
        );
        Ok(dispatcher)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Send to every channel; returns how many accepted the alert
    pub async fn dispatch(&self, alert: &FraudAlert) -> usize {
        let mut delivered = 0;
        for channel in &self.channels {
            match channel.send(alert).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    channel = channel.name(),
                    alert_id = %alert.alert_id,
                    error = %e,
                    "Failed to deliver fraud alert"
                ),
            }
        }
        delivered
    }
}
