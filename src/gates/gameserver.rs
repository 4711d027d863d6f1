//! Game-server configuration catalog
//!
//! Resolves which server configuration a room is spawned from and the
//! server settings that apply to a particular game version.

use crate::error::{MatchmakingError, Result};
use crate::types::{GameServerConfig, GameServerId};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

#[async_trait]
pub trait GameServerCatalog: Send + Sync {
    async fn find_game_server(
        &self,
        gamespace: &str,
        game_name: &str,
        server_name: &str,
    ) -> Result<GameServerConfig>;

    async fn get_game_server(
        &self,
        gamespace: &str,
        game_name: &str,
        game_server_id: GameServerId,
    ) -> Result<GameServerConfig>;

    /// Settings a version overrides for one server configuration, if any
    async fn version_settings(
        &self,
        gamespace: &str,
        game_name: &str,
        game_version: &str,
        game_server_id: GameServerId,
    ) -> Result<Option<Value>>;

    /// Server settings for a version, falling back to the server's defaults
    async fn server_settings(
        &self,
        gamespace: &str,
        game_name: &str,
        game_version: &str,
        server: &GameServerConfig,
    ) -> Result<Value> {
        if let Some(settings) = self
            .version_settings(gamespace, game_name, game_version, server.id)
            .await?
        {
            return Ok(settings);
        }

        server.server_settings.clone().ok_or_else(|| {
            MatchmakingError::ConfigurationError {
                message: format!(
                    "No server settings for {}/{} on '{}'",
                    game_name, game_version, server.name
                ),
            }
            .into()
        })
    }
}

fn lock_error() -> MatchmakingError {
    MatchmakingError::InternalError {
        message: "Failed to acquire game servers lock".to_string(),
    }
}

/// In-memory catalog
#[derive(Debug, Default)]
pub struct InMemoryGameServers {
    servers: RwLock<HashMap<(String, String, String), GameServerConfig>>,
    versions: RwLock<HashMap<(String, String, String, GameServerId), Value>>,
}

impl InMemoryGameServers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_game_server(&self, gamespace: &str, server: GameServerConfig) -> Result<()> {
        let key = (
            gamespace.to_string(),
            server.game_name.clone(),
            server.name.clone(),
        );
        self.servers
            .write()
            .map_err(|_| lock_error())?
            .insert(key, server);
        Ok(())
    }

    pub fn set_version_settings(
        &self,
        gamespace: &str,
        game_name: &str,
        game_version: &str,
        game_server_id: GameServerId,
        settings: Value,
    ) -> Result<()> {
        let key = (
            gamespace.to_string(),
            game_name.to_string(),
            game_version.to_string(),
            game_server_id,
        );
        self.versions
            .write()
            .map_err(|_| lock_error())?
            .insert(key, settings);
        Ok(())
    }
}

#[async_trait]
impl GameServerCatalog for InMemoryGameServers {
    async fn find_game_server(
        &self,
        gamespace: &str,
        game_name: &str,
        server_name: &str,
    ) -> Result<GameServerConfig> {
        let servers = self.servers.read().map_err(|_| lock_error())?;
        servers
            .get(&(
                gamespace.to_string(),
                game_name.to_string(),
                server_name.to_string(),
            ))
            .cloned()
            .ok_or_else(|| {
                MatchmakingError::GameServerNotFound {
                    game_name: game_name.to_string(),
                    server_name: server_name.to_string(),
                }
                .into()
            })
    }

    async fn get_game_server(
        &self,
        gamespace: &str,
        game_name: &str,
        game_server_id: GameServerId,
    ) -> Result<GameServerConfig> {
        let servers = self.servers.read().map_err(|_| lock_error())?;
        servers
            .iter()
            .find(|((gs, game, _), server)| {
                gs == gamespace && game == game_name && server.id == game_server_id
            })
            .map(|(_, server)| server.clone())
            .ok_or_else(|| {
                MatchmakingError::GameServerNotFound {
                    game_name: game_name.to_string(),
                    server_name: game_server_id.to_string(),
                }
                .into()
            })
    }

    async fn version_settings(
        &self,
        gamespace: &str,
        game_name: &str,
        game_version: &str,
        game_server_id: GameServerId,
    ) -> Result<Option<Value>> {
        let versions = self.versions.read().map_err(|_| lock_error())?;
        Ok(versions
            .get(&(
                gamespace.to_string(),
                game_name.to_string(),
                game_version.to_string(),
                game_server_id,
            ))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::status_of;
    use serde_json::json;

    fn server(defaults: Option<Value>) -> GameServerConfig {
        GameServerConfig {
            id: 4,
            name: "default".to_string(),
            game_name: "arena".to_string(),
            max_players: 8,
            game_settings: json!({"tickrate": 64}),
            server_settings: defaults,
        }
    }

    #[tokio::test]
    async fn test_version_settings_override_defaults() {
        let catalog = InMemoryGameServers::new();
        catalog
            .add_game_server("gs", server(Some(json!({"binary": "v1"}))))
            .unwrap();

        let found = catalog.find_game_server("gs", "arena", "default").await.unwrap();
        let settings = catalog.server_settings("gs", "arena", "1.0", &found).await.unwrap();
        assert_eq!(settings, json!({"binary": "v1"}));

        catalog
            .set_version_settings("gs", "arena", "1.0", 4, json!({"binary": "v1.0"}))
            .unwrap();
        let settings = catalog.server_settings("gs", "arena", "1.0", &found).await.unwrap();
        assert_eq!(settings, json!({"binary": "v1.0"}));
    }

    #[tokio::test]
    async fn test_missing_configuration() {
        let catalog = InMemoryGameServers::new();
        let err = catalog.find_game_server("gs", "arena", "x").await.unwrap_err();
        assert_eq!(status_of(&err), 404);

        catalog.add_game_server("gs", server(None)).unwrap();
        assert_eq!(catalog.get_game_server("gs", "arena", 4).await.unwrap().name, "default");
        assert!(catalog.get_game_server("other", "arena", 4).await.is_err());

        let err = catalog
            .server_settings("gs", "arena", "1.0", &server(None))
            .await
            .unwrap_err();
        assert_eq!(status_of(&err), 500);
    }
}
