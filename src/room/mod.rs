//! Room orchestration: placing players into existing or freshly spawned rooms

pub mod orchestrator;
pub mod request;

pub use orchestrator::{RoomGates, RoomOrchestrator};
pub use request::{Caller, PlacedRoom, RoomRequest};
