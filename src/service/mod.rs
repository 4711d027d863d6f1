//! Service layer for the game master
//!
//! Assembles the matchmaking core, runs it against the broker and reports
//! on its health.

pub mod app;
pub mod health;

pub use app::{AppState, Collaborators, GameMaster, ServiceError};
pub use health::{ComponentCheck, HealthCheck, HealthStatus, ServiceStats};
