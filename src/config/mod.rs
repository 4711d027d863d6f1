//! Configuration management for the game master
//!
//! This module handles configuration loading from environment variables and
//! TOML files, validation, and default values.

pub mod app;
pub mod limits;

// Re-export commonly used types
pub use app::{
    validate_config, AmqpSettings, AppConfig, HeartbeatSettings, MatchmakingSettings,
    PartySettings, ServiceSettings,
};
pub use limits::{RateLimitRule, RateLimitSettings};
