//! Callbacks from spawned game servers
//!
//! A game server reports player joins and leaves, settings changes, its
//! deployment check and its own shutdown through its host controller. Each
//! request names an action; names are resolved through a fixed table into
//! `ControllerAction`, and anything not in the table is rejected.

use crate::controller::token::TokenExtender;
use crate::error::{status_of, MatchmakingError, Result};
use crate::gates::DeploymentGate;
use crate::metrics::MetricsCollector;
use crate::reservation::ReservationManager;
use crate::types::{DeploymentId, Gamespace, RoomId, Settings};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Joined,
    Left,
    UpdateSettings,
    CheckDeployment,
    Stopped,
}

const ACTION_TABLE: &[(&str, ActionKind)] = &[
    ("joined", ActionKind::Joined),
    ("left", ActionKind::Left),
    ("update_settings", ActionKind::UpdateSettings),
    ("check_deployment", ActionKind::CheckDeployment),
    ("stopped", ActionKind::Stopped),
];

impl ActionKind {
    pub fn lookup(name: &str) -> Result<Self> {
        ACTION_TABLE
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| {
                MatchmakingError::NoSuchAction {
                    action: name.to_string(),
                }
                .into()
            })
    }

    pub fn name(&self) -> &'static str {
        ACTION_TABLE
            .iter()
            .find(|(_, kind)| kind == self)
            .map(|(n, _)| *n)
            .unwrap_or("unknown")
    }
}

/// A parsed callback with its arguments
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerAction {
    Joined {
        key: String,
        extend_token: Option<String>,
        extend_scopes: Option<String>,
    },
    Left {
        key: String,
    },
    UpdateSettings {
        settings: Settings,
    },
    CheckDeployment {
        game_name: String,
        game_version: String,
        deployment_id: DeploymentId,
    },
    Stopped,
}

fn required_str(args: &Value, name: &str) -> Result<String> {
    args.get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            MatchmakingError::InvalidRequest {
                reason: format!("Missing argument '{}'", name),
            }
            .into()
        })
}

fn optional_str(args: &Value, name: &str) -> Option<String> {
    args.get(name).and_then(Value::as_str).map(str::to_string)
}

impl ControllerAction {
    pub fn parse(name: &str, args: &Value) -> Result<Self> {
        let action = match ActionKind::lookup(name)? {
            ActionKind::Joined => ControllerAction::Joined {
                key: required_str(args, "key")?,
                extend_token: optional_str(args, "extend_token"),
                extend_scopes: optional_str(args, "extend_scopes"),
            },
            ActionKind::Left => ControllerAction::Left {
                key: required_str(args, "key")?,
            },
            ActionKind::UpdateSettings => ControllerAction::UpdateSettings {
                settings: args
                    .get("settings")
                    .and_then(Value::as_object)
                    .cloned()
                    .ok_or_else(|| MatchmakingError::InvalidRequest {
                        reason: "Missing argument 'settings'".to_string(),
                    })?,
            },
            ActionKind::CheckDeployment => ControllerAction::CheckDeployment {
                game_name: required_str(args, "game_name")?,
                game_version: required_str(args, "game_version")?,
                deployment_id: args
                    .get("deployment_id")
                    .and_then(|v| v.as_u64().or_else(|| v.as_str()?.parse().ok()))
                    .ok_or_else(|| MatchmakingError::InvalidRequest {
                        reason: "Missing argument 'deployment_id'".to_string(),
                    })?,
            },
            ActionKind::Stopped => ControllerAction::Stopped,
        };
        Ok(action)
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            ControllerAction::Joined { .. } => ActionKind::Joined,
            ControllerAction::Left { .. } => ActionKind::Left,
            ControllerAction::UpdateSettings { .. } => ActionKind::UpdateSettings,
            ControllerAction::CheckDeployment { .. } => ActionKind::CheckDeployment,
            ControllerAction::Stopped => ActionKind::Stopped,
        }
    }
}

/// Raw callback as forwarded by a host controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: String,
    pub gamespace: Gamespace,
    pub room_id: RoomId,
    #[serde(default)]
    pub args: Value,
}

/// Executes game-server callbacks
#[derive(Clone)]
pub struct ControllerActions {
    reservations: ReservationManager,
    deployments: Arc<dyn DeploymentGate>,
    tokens: Arc<dyn TokenExtender>,
    metrics: Arc<MetricsCollector>,
}

impl ControllerActions {
    pub fn new(
        reservations: ReservationManager,
        deployments: Arc<dyn DeploymentGate>,
        tokens: Arc<dyn TokenExtender>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            reservations,
            deployments,
            tokens,
            metrics,
        }
    }

    /// Parse and execute a raw callback
    pub async fn dispatch(&self, request: ActionRequest) -> Result<Value> {
        let outcome = match ControllerAction::parse(&request.action, &request.args) {
            Ok(action) => {
                self.handle(&request.gamespace, request.room_id, action)
                    .await
            }
            Err(e) => Err(e),
        };

        let status = match &outcome {
            Ok(_) => 200,
            Err(e) => status_of(e),
        };
        self.metrics.record_controller_action(&request.action, status);
        if let Err(e) = &outcome {
            warn!(
                "Controller action failed - action: '{}', room_id: {}, status: {}, error: {}",
                request.action, request.room_id, status, e
            );
        }
        outcome
    }

    pub async fn handle(
        &self,
        gamespace: &str,
        room_id: RoomId,
        action: ControllerAction,
    ) -> Result<Value> {
        match action {
            ControllerAction::Joined {
                key,
                extend_token,
                extend_scopes,
            } => {
                let slot = self.reservations.approve(room_id, &key).await?;

                let (access_token, account, scopes) = match (extend_token, extend_scopes) {
                    (Some(extend_with), Some(scopes)) => {
                        let extended = self
                            .tokens
                            .extend(gamespace, &slot.credential, &extend_with, &scopes)
                            .await?;
                        (extended.access_token, extended.account, extended.scopes)
                    }
                    _ => (slot.credential.clone(), slot.account_id.clone(), Vec::new()),
                };

                info!(
                    "Player joined room - room_id: {}, account_id: '{}'",
                    room_id, slot.account_id
                );
                Ok(json!({
                    "access_token": access_token,
                    "account": account,
                    "info": slot.info,
                    "scopes": scopes,
                }))
            }

            ControllerAction::Left { key } => {
                let removed = self.reservations.approve_leave(room_id, &key).await?;
                info!(
                    "Player left room - room_id: {}, removed: {}",
                    room_id, removed
                );
                Ok(json!({}))
            }

            ControllerAction::UpdateSettings { settings } => {
                self.reservations
                    .store()
                    .update_settings(room_id, settings)
                    .await?;
                Ok(json!({}))
            }

            ControllerAction::CheckDeployment {
                game_name,
                game_version,
                deployment_id,
            } => {
                let current = self
                    .deployments
                    .current_deployment(gamespace, &game_name, &game_version)
                    .await?;
                if !current.enabled {
                    return Err(MatchmakingError::NoCurrentDeployment {
                        game_name,
                        game_version,
                    }
                    .into());
                }
                if current.deployment_id != deployment_id {
                    return Err(MatchmakingError::DeploymentOutdated.into());
                }
                Ok(json!({}))
            }

            ControllerAction::Stopped => {
                if self.reservations.store().remove_room(room_id).await? {
                    self.metrics.record_room_removed("stopped");
                    info!("Room stopped by its game server - room_id: {}", room_id);
                }
                Ok(json!({}))
            }
        }
    }
}
