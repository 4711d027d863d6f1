//! Ban gate
//!
//! Bans are matched by account or by IP and only while unexpired.

use crate::error::{MatchmakingError, Result};
use crate::types::BanInfo;
use crate::utils::current_timestamp;
use async_trait::async_trait;
use std::sync::RwLock;
use tracing::info;

#[async_trait]
pub trait BanGate: Send + Sync {
    /// The active ban matching the account or the IP, if any
    async fn lookup_ban(
        &self,
        gamespace: &str,
        account_id: &str,
        ip: Option<&str>,
    ) -> Result<Option<BanInfo>>;

    /// Fail with the ban's metadata when the caller is banned
    async fn ensure_not_banned(
        &self,
        gamespace: &str,
        account_id: &str,
        ip: Option<&str>,
    ) -> Result<()> {
        match self.lookup_ban(gamespace, account_id, ip).await? {
            Some(ban) => {
                info!(
                    "Banned caller rejected - account_id: '{}', ban_id: {}, expires: {}",
                    account_id, ban.ban_id, ban.expires
                );
                Err(MatchmakingError::Banned { ban }.into())
            }
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
struct BanRecord {
    gamespace: String,
    ban: BanInfo,
}

/// In-memory ban list
#[derive(Debug, Default)]
pub struct InMemoryBans {
    bans: RwLock<Vec<BanRecord>>,
}

impl InMemoryBans {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_ban(&self, gamespace: &str, ban: BanInfo) -> Result<()> {
        let mut bans = self.bans.write().map_err(|_| MatchmakingError::InternalError {
            message: "Failed to acquire bans lock".to_string(),
        })?;
        bans.push(BanRecord {
            gamespace: gamespace.to_string(),
            ban,
        });
        Ok(())
    }
}

#[async_trait]
impl BanGate for InMemoryBans {
    async fn lookup_ban(
        &self,
        gamespace: &str,
        account_id: &str,
        ip: Option<&str>,
    ) -> Result<Option<BanInfo>> {
        let bans = self.bans.read().map_err(|_| MatchmakingError::InternalError {
            message: "Failed to acquire bans lock".to_string(),
        })?;
        let now = current_timestamp();

        let found = bans
            .iter()
            .filter(|record| record.gamespace == gamespace && record.ban.expires > now)
            .find(|record| {
                record.ban.account_id == account_id
                    || matches!((ip, &record.ban.ip), (Some(ip), Some(banned)) if ip == banned)
            })
            .map(|record| {
                let mut ban = record.ban.clone();
                // Account bans learn the address they were last seen from
                if ban.ip.is_none() {
                    ban.ip = ip.map(str::to_string);
                }
                ban
            });
        Ok(found)
    }
}

/// A gate that never bans, for deployments without a ban list
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBans;

#[async_trait]
impl BanGate for NoBans {
    async fn lookup_ban(&self, _: &str, _: &str, _: Option<&str>) -> Result<Option<BanInfo>> {
        Ok(None)
    }
}
