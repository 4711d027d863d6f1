//! Host controllers: the client interface the game master drives them
//! through, and the callbacks their game servers send back

pub mod actions;
pub mod client;
pub mod token;

pub use actions::{ActionKind, ActionRequest, ControllerAction, ControllerActions};
pub use client::{
    HeartbeatReport, HostController, HostLoad, MockHostController, SpawnRequest, SpawnResult,
    UNKNOWN_LOAD,
};
pub use token::{ExtendedToken, NoTokenExtension, TokenExtender};
