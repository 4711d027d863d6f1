//! Parties: groups of players matched or spawned into one room together

pub mod broker;
pub mod callback;
pub mod messages;
pub mod orchestrator;
pub mod outcomes;
pub mod session;

pub use broker::{InMemoryPartyBroker, PartyBroker, Subscription};
pub use callback::{
    notify_close, CloseInvocation, CloseReason, LoggingCloseCallback, MockCloseCallback,
    PartyCloseCallback,
};
pub use messages::{MessageType, PartyMessage, Recipient};
pub use orchestrator::{PartyOrchestrator, PartyParams, PartyStart};
pub use outcomes::{StartOutcome, StartOutcomes};
pub use session::PartySession;
