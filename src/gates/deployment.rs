//! Deployment gate
//!
//! A game version spawns only with its current deployment, and only while
//! that deployment is enabled.

use crate::error::{MatchmakingError, Result};
use crate::types::{CurrentDeployment, Deployment, DeploymentId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

#[async_trait]
pub trait DeploymentGate: Send + Sync {
    /// The current deployment of a game version, NoCurrentDeployment if none
    async fn current_deployment(
        &self,
        gamespace: &str,
        game_name: &str,
        game_version: &str,
    ) -> Result<CurrentDeployment>;

    /// Current deployment id, failing unless it exists and is enabled
    async fn enabled_deployment(
        &self,
        gamespace: &str,
        game_name: &str,
        game_version: &str,
    ) -> Result<DeploymentId> {
        let current = self
            .current_deployment(gamespace, game_name, game_version)
            .await?;
        if !current.enabled {
            return Err(MatchmakingError::DeploymentDisabled {
                game_name: game_name.to_string(),
                game_version: game_version.to_string(),
            }
            .into());
        }
        Ok(current.deployment_id)
    }
}

type VersionKey = (String, String, String);

fn version_key(gamespace: &str, game_name: &str, game_version: &str) -> VersionKey {
    (
        gamespace.to_string(),
        game_name.to_string(),
        game_version.to_string(),
    )
}

/// In-memory deployment registry
#[derive(Debug, Default)]
pub struct InMemoryDeployments {
    deployments: RwLock<HashMap<DeploymentId, Deployment>>,
    current: RwLock<HashMap<VersionKey, CurrentDeployment>>,
}

fn lock_error() -> MatchmakingError {
    MatchmakingError::InternalError {
        message: "Failed to acquire deployments lock".to_string(),
    }
}

impl InMemoryDeployments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a deployment and make it current for its version
    pub fn deploy(&self, gamespace: &str, deployment: Deployment, enabled: bool) -> Result<()> {
        let key = version_key(gamespace, &deployment.game_name, &deployment.game_version);
        let current = CurrentDeployment {
            deployment_id: deployment.id,
            enabled,
        };

        self.deployments
            .write()
            .map_err(|_| lock_error())?
            .insert(deployment.id, deployment);
        self.current
            .write()
            .map_err(|_| lock_error())?
            .insert(key, current);
        Ok(())
    }

    /// Toggle the current deployment of a version
    pub fn set_enabled(
        &self,
        gamespace: &str,
        game_name: &str,
        game_version: &str,
        enabled: bool,
    ) -> Result<()> {
        let mut current = self.current.write().map_err(|_| lock_error())?;
        let entry = current
            .get_mut(&version_key(gamespace, game_name, game_version))
            .ok_or_else(|| MatchmakingError::NoCurrentDeployment {
                game_name: game_name.to_string(),
                game_version: game_version.to_string(),
            })?;
        entry.enabled = enabled;
        debug!(
            "Deployment toggled - game: '{}', version: '{}', enabled: {}",
            game_name, game_version, enabled
        );
        Ok(())
    }

    pub fn get_deployment(&self, deployment_id: DeploymentId) -> Result<Option<Deployment>> {
        let deployments = self.deployments.read().map_err(|_| lock_error())?;
        Ok(deployments.get(&deployment_id).cloned())
    }
}

#[async_trait]
impl DeploymentGate for InMemoryDeployments {
    async fn current_deployment(
        &self,
        gamespace: &str,
        game_name: &str,
        game_version: &str,
    ) -> Result<CurrentDeployment> {
        let current = self.current.read().map_err(|_| lock_error())?;
        current
            .get(&version_key(gamespace, game_name, game_version))
            .copied()
            .ok_or_else(|| {
                MatchmakingError::NoCurrentDeployment {
                    game_name: game_name.to_string(),
                    game_version: game_version.to_string(),
                }
                .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::status_of;
    use crate::types::DeploymentStatus;

    fn deployment(id: DeploymentId) -> Deployment {
        Deployment {
            id,
            game_name: "arena".to_string(),
            game_version: "1.0".to_string(),
            hash: format!("hash-{}", id),
            status: DeploymentStatus::Delivered,
        }
    }

    #[tokio::test]
    async fn test_missing_and_disabled_deployments() {
        let gate = InMemoryDeployments::new();
        let err = gate.enabled_deployment("gs", "arena", "1.0").await.unwrap_err();
        assert_eq!(status_of(&err), 404);

        gate.deploy("gs", deployment(3), false).unwrap();
        let err = gate.enabled_deployment("gs", "arena", "1.0").await.unwrap_err();
        assert_eq!(status_of(&err), 410);

        gate.set_enabled("gs", "arena", "1.0", true).unwrap();
        assert_eq!(gate.enabled_deployment("gs", "arena", "1.0").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_newer_deployment_replaces_current() {
        let gate = InMemoryDeployments::new();
        gate.deploy("gs", deployment(1), true).unwrap();
        gate.deploy("gs", deployment(2), true).unwrap();

        let current = gate.current_deployment("gs", "arena", "1.0").await.unwrap();
        assert_eq!(current.deployment_id, 2);
        assert!(gate.get_deployment(1).unwrap().is_some());
        assert!(gate.current_deployment("other", "arena", "1.0").await.is_err());
    }
}
