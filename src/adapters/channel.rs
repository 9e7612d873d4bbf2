use crate::domain::ports::{Message, NotificationChannel};
use crate::utils::error::{Result, RouletteError};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Mutex;
use std::time::Duration;

/// Records messages instead of delivering them.
#[derive(Debug, Default)]
pub struct DryRunChannel {
    outbox: Mutex<Vec<Message>>,
}

impl DryRunChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Message> {
        self.outbox.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl NotificationChannel for DryRunChannel {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn send(&self, message: &Message) -> Result<()> {
        tracing::info!("[dry-run] would send '{}' to {}", message.subject, message.to);
        tracing::debug!("[dry-run] body for {}:\n{}", message.to, message.body);
        if let Ok(mut outbox) = self.outbox.lock() {
            outbox.push(message.clone());
        }
        Ok(())
    }
}

/// Hands each message to an external program, e.g. a mail-client script.
/// The message travels in the `ROULETTE_TO`, `ROULETTE_SUBJECT` and
/// `ROULETTE_BODY` environment variables; a non-zero exit is a failure.
#[derive(Debug, Clone)]
pub struct CommandChannel {
    program: String,
    args: Vec<String>,
}

impl CommandChannel {
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

#[async_trait]
impl NotificationChannel for CommandChannel {
    fn name(&self) -> &str {
        &self.program
    }

    async fn send(&self, message: &Message) -> Result<()> {
        tracing::debug!("Running {} for {}", self.program, message.to);
        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .env("ROULETTE_TO", &message.to)
            .env("ROULETTE_SUBJECT", &message.subject)
            .env("ROULETTE_BODY", &message.body)
            .output()
            .await
            .map_err(|e| RouletteError::ChannelError {
                recipient: message.to.clone(),
                message: format!("failed to start {}: {}", self.program, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RouletteError::ChannelError {
                recipient: message.to.clone(),
                message: format!("{} exited with {}: {}", self.program, output.status, stderr.trim()),
            });
        }
        Ok(())
    }
}

/// Posts each message as JSON to an HTTP mail relay.
#[derive(Debug, Clone)]
pub struct WebhookChannel {
    endpoint: String,
    client: Client,
}

impl WebhookChannel {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { endpoint, client })
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, message: &Message) -> Result<()> {
        tracing::debug!("POST {} for {}", self.endpoint, message.to);
        let response = self
            .client
            .post(&self.endpoint)
            .json(message)
            .send()
            .await
            .map_err(|e| RouletteError::ChannelError {
                recipient: message.to.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RouletteError::ChannelError {
                recipient: message.to.clone(),
                message: format!("relay answered {}: {}", status, body.trim()),
            });
        }
        Ok(())
    }
}
