//! Host heartbeats: load and state refresh plus stale room cleanup

pub mod monitor;

pub use monitor::{HeartbeatMonitor, SweepSummary};
