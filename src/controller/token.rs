//! Access token extension
//!
//! A game server that approves a player may ask for the player's credential
//! to be extended with extra scopes, signed by a server-side token.

use crate::error::{MatchmakingError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedToken {
    pub access_token: String,
    pub account: String,
    pub scopes: Vec<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenExtender: Send + Sync {
    /// Extend `credential` with `scopes` on the authority of `extend_with`
    async fn extend(
        &self,
        gamespace: &str,
        credential: &str,
        extend_with: &str,
        scopes: &str,
    ) -> Result<ExtendedToken>;
}

/// Extender for deployments without a login service
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTokenExtension;

#[async_trait]
impl TokenExtender for NoTokenExtension {
    async fn extend(&self, _: &str, _: &str, _: &str, _: &str) -> Result<ExtendedToken> {
        Err(MatchmakingError::TokenExtensionFailed {
            code: 501,
            message: "Token extension is not configured".to_string(),
        }
        .into())
    }
}

/// Split a comma separated scope list
pub fn parse_scopes(scopes: &str) -> Vec<String> {
    scopes
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
