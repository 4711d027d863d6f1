//! Host controller client interface
//!
//! Every fleet host runs a controller that spawns and terminates game-server
//! processes and reports its load. This is the request/response surface the
//! game master drives it through.

use crate::error::{MatchmakingError, Result};
use crate::types::{DeploymentId, Host, HostId, Location, RoomId, Settings};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Load reported when a controller leaves a figure out
pub const UNKNOWN_LOAD: u32 = 999;

fn unknown_load() -> u32 {
    UNKNOWN_LOAD
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub gamespace: String,
    pub game_name: String,
    pub game_version: String,
    pub game_server_name: String,
    pub deployment_id: DeploymentId,
    pub room_id: RoomId,
    /// Merged `{game, server, room, other?}` settings document
    pub settings: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnResult {
    pub location: Location,
    /// Settings the spawned process chose to override
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostLoad {
    #[serde(default = "unknown_load")]
    pub memory: u32,
    #[serde(default = "unknown_load")]
    pub cpu: u32,
}

impl Default for HostLoad {
    fn default() -> Self {
        Self {
            memory: UNKNOWN_LOAD,
            cpu: UNKNOWN_LOAD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatReport {
    #[serde(default)]
    pub load: HostLoad,
    /// Rooms the host is still running
    #[serde(default)]
    pub rooms: Vec<RoomId>,
}

#[async_trait]
pub trait HostController: Send + Sync {
    async fn spawn(&self, host: &Host, request: SpawnRequest) -> Result<SpawnResult>;

    async fn terminate(&self, host: &Host, gamespace: &str, room_id: RoomId) -> Result<()>;

    async fn heartbeat(&self, host: &Host) -> Result<HeartbeatReport>;
}

/// Mock host controller for testing
///
/// Spawns succeed with a location on the host's address unless a failure
/// has been configured; every call is recorded.
#[derive(Debug, Default)]
pub struct MockHostController {
    calls: Mutex<Vec<String>>,
    spawns: Mutex<Vec<SpawnRequest>>,
    spawn_failure: Mutex<Option<(u16, String)>>,
    spawn_delay: Mutex<Option<Duration>>,
    spawn_overrides: Mutex<Settings>,
    terminate_timeout: Mutex<bool>,
    heartbeats: Mutex<HashMap<HostId, HeartbeatReport>>,
}

impl MockHostController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following spawn fail with this status
    pub fn fail_spawns(&self, code: u16, message: &str) {
        if let Ok(mut failure) = self.spawn_failure.lock() {
            *failure = Some((code, message.to_string()));
        }
    }

    pub fn succeed_spawns(&self) {
        if let Ok(mut failure) = self.spawn_failure.lock() {
            *failure = None;
        }
    }

    /// Delay spawns, to exercise the caller's timeout
    pub fn delay_spawns(&self, delay: Duration) {
        if let Ok(mut current) = self.spawn_delay.lock() {
            *current = Some(delay);
        }
    }

    /// Settings returned by successful spawns
    pub fn override_settings(&self, settings: Settings) {
        if let Ok(mut overrides) = self.spawn_overrides.lock() {
            *overrides = settings;
        }
    }

    pub fn time_out_terminations(&self) {
        if let Ok(mut timeout) = self.terminate_timeout.lock() {
            *timeout = true;
        }
    }

    pub fn set_heartbeat(&self, host_id: HostId, report: HeartbeatReport) {
        if let Ok(mut heartbeats) = self.heartbeats.lock() {
            heartbeats.insert(host_id, report);
        }
    }

    pub fn clear_heartbeat(&self, host_id: HostId) {
        if let Ok(mut heartbeats) = self.heartbeats.lock() {
            heartbeats.remove(&host_id);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn spawn_requests(&self) -> Vec<SpawnRequest> {
        self.spawns.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl HostController for MockHostController {
    async fn spawn(&self, host: &Host, request: SpawnRequest) -> Result<SpawnResult> {
        self.record(format!("spawn:{}:{}", host.id, request.room_id));
        if let Ok(mut spawns) = self.spawns.lock() {
            spawns.push(request.clone());
        }

        let delay = self.spawn_delay.lock().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.spawn_failure.lock().ok().and_then(|f| f.clone());
        if let Some((code, message)) = failure {
            return Err(MatchmakingError::SpawnFailed { code, message }.into());
        }

        let settings = self
            .spawn_overrides
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default();
        Ok(SpawnResult {
            location: Location {
                host: host.address.clone(),
                ports: vec![7000 + (request.room_id % 1000) as u16],
            },
            settings,
        })
    }

    async fn terminate(&self, host: &Host, gamespace: &str, room_id: RoomId) -> Result<()> {
        self.record(format!("terminate:{}:{}:{}", host.id, gamespace, room_id));
        if self.terminate_timeout.lock().map(|t| *t).unwrap_or(false) {
            return Err(MatchmakingError::ControllerTimeout {
                action: "terminate".to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn heartbeat(&self, host: &Host) -> Result<HeartbeatReport> {
        self.record(format!("heartbeat:{}", host.id));
        let report = self
            .heartbeats
            .lock()
            .ok()
            .and_then(|h| h.get(&host.id).cloned());
        report.ok_or_else(|| {
            MatchmakingError::ControllerTimeout {
                action: "heartbeat".to_string(),
            }
            .into()
        })
    }
}
