//! Main application configuration
//!
//! This module defines the primary configuration structures for the game
//! master, including environment variable and TOML file loading and validation.

use crate::config::limits::{RateLimitRule, RateLimitSettings};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub amqp: AmqpSettings,
    pub matchmaking: MatchmakingSettings,
    pub party: PartySettings,
    pub heartbeat: HeartbeatSettings,
    pub rate_limits: RateLimitSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health check endpoint
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// AMQP connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmqpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub vhost: String,
    /// Exchange host controllers listen on, keyed by host address
    pub controller_exchange: String,
    /// Queue controller callbacks are delivered to
    pub actions_queue: String,
    /// Maximum retry attempts for failed operations
    pub max_retry_attempts: u32,
    /// Retry delay in milliseconds
    pub retry_delay_ms: u64,
}

/// Room placement and reservation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Grace period before an unapproved reservation is released
    pub reservation_timeout_seconds: u64,
    /// Timeout of spawn and terminate calls to a host controller
    pub spawn_timeout_seconds: u64,
}

/// Party orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PartySettings {
    /// Per-message TTL of member queues
    pub message_ttl_ms: u64,
    /// How many finished parties keep their start outcome queryable
    pub start_outcome_retention: usize,
}

/// Host heartbeat polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatSettings {
    pub enabled: bool,
    pub interval_seconds: u64,
    pub timeout_seconds: u64,
    /// Memory percentage above which a host is marked OVERLOAD
    pub memory_overload: u32,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "game-master".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for AmqpSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            username: "guest".to_string(),
            password: "guest".to_string(),
            vhost: "/".to_string(),
            controller_exchange: "game.controllers".to_string(),
            actions_queue: "game.master.actions".to_string(),
            max_retry_attempts: 5,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            reservation_timeout_seconds: 30,
            spawn_timeout_seconds: 60,
        }
    }
}

impl Default for PartySettings {
    fn default() -> Self {
        Self {
            message_ttl_ms: 1000,
            start_outcome_retention: 10_000,
        }
    }
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 30,
            timeout_seconds: 5,
            memory_overload: 95,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("Invalid {} value: {}", name, value))
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(port) = env::var("HEALTH_PORT") {
            self.service.health_port = parse_env("HEALTH_PORT", &port)?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds =
                parse_env("SHUTDOWN_TIMEOUT_SECONDS", &timeout)?;
        }

        // AMQP settings
        if let Ok(host) = env::var("AMQP_HOST") {
            self.amqp.host = host;
        }
        if let Ok(port) = env::var("AMQP_PORT") {
            self.amqp.port = parse_env("AMQP_PORT", &port)?;
        }
        if let Ok(username) = env::var("AMQP_USERNAME") {
            self.amqp.username = username;
        }
        if let Ok(password) = env::var("AMQP_PASSWORD") {
            self.amqp.password = password;
        }
        if let Ok(vhost) = env::var("AMQP_VHOST") {
            self.amqp.vhost = vhost;
        }
        if let Ok(retries) = env::var("AMQP_MAX_RETRY_ATTEMPTS") {
            self.amqp.max_retry_attempts = parse_env("AMQP_MAX_RETRY_ATTEMPTS", &retries)?;
        }
        if let Ok(delay) = env::var("AMQP_RETRY_DELAY_MS") {
            self.amqp.retry_delay_ms = parse_env("AMQP_RETRY_DELAY_MS", &delay)?;
        }

        // Matchmaking settings
        if let Ok(timeout) = env::var("RESERVATION_TIMEOUT_SECONDS") {
            self.matchmaking.reservation_timeout_seconds =
                parse_env("RESERVATION_TIMEOUT_SECONDS", &timeout)?;
        }
        if let Ok(timeout) = env::var("SPAWN_TIMEOUT_SECONDS") {
            self.matchmaking.spawn_timeout_seconds = parse_env("SPAWN_TIMEOUT_SECONDS", &timeout)?;
        }

        // Party settings
        if let Ok(ttl) = env::var("PARTY_MESSAGE_TTL_MS") {
            self.party.message_ttl_ms = parse_env("PARTY_MESSAGE_TTL_MS", &ttl)?;
        }

        // Heartbeat settings
        if let Ok(enabled) = env::var("HEARTBEAT_ENABLED") {
            self.heartbeat.enabled = parse_env("HEARTBEAT_ENABLED", &enabled)?;
        }
        if let Ok(interval) = env::var("HEARTBEAT_INTERVAL_SECONDS") {
            self.heartbeat.interval_seconds = parse_env("HEARTBEAT_INTERVAL_SECONDS", &interval)?;
        }

        // Rate limits
        if let Ok(rule) = env::var("CREATE_ROOM_RATE_LIMIT") {
            let rule: RateLimitRule = rule
                .parse()
                .map_err(|e| anyhow!("Invalid CREATE_ROOM_RATE_LIMIT value: {}", e))?;
            self.rate_limits.rules.insert("create_room".to_string(), rule);
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get AMQP retry delay as Duration
    pub fn amqp_retry_delay(&self) -> Duration {
        Duration::from_millis(self.amqp.retry_delay_ms)
    }

    /// Get reservation grace period as Duration
    pub fn reservation_timeout(&self) -> Duration {
        Duration::from_secs(self.matchmaking.reservation_timeout_seconds)
    }

    /// Get host controller RPC timeout as Duration
    pub fn spawn_timeout(&self) -> Duration {
        Duration::from_secs(self.matchmaking.spawn_timeout_seconds)
    }

    /// Get party message TTL as Duration
    pub fn party_message_ttl(&self) -> Duration {
        Duration::from_millis(self.party.message_ttl_ms)
    }

    /// Get heartbeat polling interval as Duration
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat.interval_seconds)
    }

    /// Get heartbeat RPC timeout as Duration
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat.timeout_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    if config.amqp.host.is_empty() {
        return Err(anyhow!("AMQP host cannot be empty"));
    }
    if config.amqp.controller_exchange.is_empty() {
        return Err(anyhow!("Controller exchange name cannot be empty"));
    }
    if config.amqp.actions_queue.is_empty() {
        return Err(anyhow!("Actions queue name cannot be empty"));
    }

    if config.matchmaking.reservation_timeout_seconds == 0 {
        return Err(anyhow!("Reservation timeout must be greater than 0"));
    }
    if config.matchmaking.spawn_timeout_seconds == 0 {
        return Err(anyhow!("Spawn timeout must be greater than 0"));
    }

    if config.party.message_ttl_ms == 0 {
        return Err(anyhow!("Party message TTL must be greater than 0"));
    }

    if config.heartbeat.enabled && config.heartbeat.interval_seconds == 0 {
        return Err(anyhow!("Heartbeat interval must be greater than 0"));
    }
    if config.heartbeat.memory_overload == 0 || config.heartbeat.memory_overload > 100 {
        return Err(anyhow!(
            "Memory overload threshold must be within 1..=100, got {}",
            config.heartbeat.memory_overload
        ));
    }

    for (action, rule) in &config.rate_limits.rules {
        if rule.amount == 0 || rule.period_seconds == 0 {
            return Err(anyhow!("Invalid rate limit for '{}': {}", action, rule));
        }
    }

    Ok(())
}
