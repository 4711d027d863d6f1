//! AMQP connection management with retry logic

use crate::config::AmqpSettings;
use crate::error::{MatchmakingError, Result};
use amqprs::channel::Channel;
use amqprs::connection::{Connection, OpenConnectionArguments};
use anyhow::Context;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Upper bound of the reconnect backoff
const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Configuration for AMQP connection
#[derive(Debug, Clone)]
pub struct AmqpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub vhost: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for AmqpConfig {
    fn default() -> Self {
        Self::from(&AmqpSettings::default())
    }
}

impl From<&AmqpSettings> for AmqpConfig {
    fn from(settings: &AmqpSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            username: settings.username.clone(),
            password: settings.password.clone(),
            vhost: settings.vhost.clone(),
            max_retries: settings.max_retry_attempts,
            retry_delay_ms: settings.retry_delay_ms,
        }
    }
}

impl AmqpConfig {
    /// Reconnect delay after `attempt` failures, doubling up to a cap
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(
            self.retry_delay_ms
                .saturating_mul(factor)
                .min(MAX_RETRY_DELAY_MS),
        )
    }
}

/// Wrapper around AMQP connection with additional metadata
pub struct AmqpConnection {
    connection: Connection,
    config: AmqpConfig,
}

impl AmqpConnection {
    /// Create a new AMQP connection with retry logic
    pub async fn new(config: AmqpConfig) -> Result<Self> {
        let connection = Self::connect_with_retry(&config).await?;
        Ok(Self { connection, config })
    }

    /// Attempt to connect with exponential backoff retry
    async fn connect_with_retry(config: &AmqpConfig) -> Result<Connection> {
        let mut retry_count = 0;

        loop {
            match Self::try_connect(config).await {
                Ok(connection) => {
                    info!(
                        "Successfully connected to AMQP broker - host: {}:{}, vhost: '{}'",
                        config.host, config.port, config.vhost
                    );
                    return Ok(connection);
                }
                Err(e) => {
                    retry_count += 1;
                    if retry_count > config.max_retries {
                        error!(
                            "Failed to connect to AMQP after {} retries",
                            config.max_retries
                        );
                        return Err(MatchmakingError::AmqpConnectionFailed {
                            message: format!("Max retries exceeded: {}", e),
                        }
                        .into());
                    }

                    let delay = config.backoff(retry_count);
                    warn!(
                        "AMQP connection attempt {} failed: {}. Retrying in {:?}",
                        retry_count, e, delay
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    /// Single connection attempt
    async fn try_connect(config: &AmqpConfig) -> Result<Connection> {
        let mut args = OpenConnectionArguments::new(
            &config.host,
            config.port,
            &config.username,
            &config.password,
        );
        args.virtual_host(&config.vhost);

        Connection::open(&args)
            .await
            .context("Failed to open AMQP connection")
            .map_err(|e| {
                MatchmakingError::AmqpConnectionFailed {
                    message: format!("{:#}", e),
                }
                .into()
            })
    }

    /// Get the underlying connection
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn config(&self) -> &AmqpConfig {
        &self.config
    }

    /// Open a fresh channel on this connection
    pub async fn open_channel(&self) -> Result<Channel> {
        self.connection.open_channel(None).await.map_err(|e| {
            MatchmakingError::AmqpConnectionFailed {
                message: format!("Failed to open AMQP channel: {}", e),
            }
            .into()
        })
    }

    /// Check if connection is still alive
    pub fn is_alive(&self) -> bool {
        self.connection.is_open()
    }

    /// Close the connection
    pub async fn close(&self) -> Result<()> {
        self.connection
            .clone()
            .close()
            .await
            .context("Failed to close AMQP connection")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amqp_config_from_settings() {
        let config = AmqpConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5672);
        assert_eq!(config.max_retries, 5);

        let settings = AmqpSettings {
            host: "rabbit".to_string(),
            vhost: "games".to_string(),
            ..AmqpSettings::default()
        };
        let config = AmqpConfig::from(&settings);
        assert_eq!(config.host, "rabbit");
        assert_eq!(config.vhost, "games");
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let config = AmqpConfig {
            retry_delay_ms: 1000,
            ..AmqpConfig::default()
        };
        assert_eq!(config.backoff(1), Duration::from_millis(1000));
        assert_eq!(config.backoff(2), Duration::from_millis(2000));
        assert_eq!(config.backoff(3), Duration::from_millis(4000));
        assert_eq!(config.backoff(10), Duration::from_millis(MAX_RETRY_DELAY_MS));
    }
}
