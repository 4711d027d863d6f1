//! Game Master - matchmaking and session orchestration
//!
//! Places players into game rooms across a regional fleet of hosts, spawns
//! rooms through host controllers, holds player slots as reservations until
//! the game server approves them, and coordinates parties of players that
//! enter a room together.

pub mod amqp;
pub mod config;
pub mod controller;
pub mod error;
pub mod gates;
pub mod heartbeat;
pub mod metrics;
pub mod party;
pub mod placement;
pub mod reservation;
pub mod room;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{ApiResult, MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use party::{PartyOrchestrator, PartySession};
pub use reservation::ReservationManager;
pub use room::{RoomOrchestrator, RoomRequest};
pub use service::{Collaborators, GameMaster};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
