//! Party and member storage
//!
//! Parties use the same row-lock layout as rooms: membership changes and
//! status transitions happen under the party's own mutex.

use crate::error::{MatchmakingError, Result};
use crate::store::filter::SettingsFilter;
use crate::types::{
    GameServerId, Gamespace, Party, PartyFlags, PartyId, PartyMember, PartyStatus, RegionId,
    Settings,
};
use crate::utils::IdSequence;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info};

/// Everything needed to insert a party
#[derive(Debug, Clone)]
pub struct NewParty {
    pub gamespace: Gamespace,
    pub game_name: String,
    pub game_version: String,
    pub game_server_id: GameServerId,
    pub region_id: RegionId,
    pub max_members: u32,
    pub settings: Settings,
    pub room_settings: Settings,
    pub room_filters: Option<Value>,
    pub flags: PartyFlags,
    pub close_callback: Option<String>,
}

/// Criteria for finding a party to join
#[derive(Debug, Clone)]
pub struct PartyQuery {
    pub gamespace: Gamespace,
    pub game_name: String,
    pub game_version: String,
    pub game_server_id: GameServerId,
    pub region_id: Option<RegionId>,
    pub filter: SettingsFilter,
}

impl PartyQuery {
    pub fn matches(&self, party: &Party) -> bool {
        party.gamespace == self.gamespace
            && party.game_name == self.game_name
            && party.game_version == self.game_version
            && party.game_server_id == self.game_server_id
            && self.region_id.map_or(true, |r| r == party.region_id)
            && party.status == PartyStatus::Created
            && party.num_members < party.max_members
            && self.filter.matches(&party.settings)
    }
}

/// Result of removing a member
#[derive(Debug, Clone)]
pub enum MemberRemoval {
    /// The party lives on with the updated count
    Remaining(Party),
    /// The last member left an auto-close party and it was deleted
    Closed(Party),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartyStoreStats {
    pub parties: usize,
    pub members: u64,
    pub starting: usize,
}

#[async_trait]
pub trait PartyStore: Send + Sync {
    /// Insert a party, with its creator already joined when given
    async fn create_party(&self, new_party: NewParty, creator: Option<PartyMember>)
        -> Result<Party>;

    async fn get_party(&self, party_id: PartyId) -> Result<Party>;

    async fn list_members(&self, party_id: PartyId) -> Result<Vec<PartyMember>>;

    async fn get_member(&self, party_id: PartyId, account_id: &str)
        -> Result<Option<PartyMember>>;

    /// Add a member to a CREATED party with spare capacity
    async fn join(&self, party_id: PartyId, member: PartyMember) -> Result<Party>;

    /// Join the first matching party, PartyNotFound when none qualifies
    async fn find_and_join(&self, query: &PartyQuery, member: PartyMember) -> Result<Party>;

    async fn remove_member(&self, party_id: PartyId, account_id: &str) -> Result<MemberRemoval>;

    /// CREATED -> STARTING, returning the frozen membership
    async fn begin_start(&self, party_id: PartyId) -> Result<(Party, Vec<PartyMember>)>;

    /// STARTING -> CREATED after a failed start
    async fn rollback_start(&self, party_id: PartyId) -> Result<Party>;

    /// Delete a party and its members, returning what was removed
    async fn delete_party(&self, party_id: PartyId)
        -> Result<Option<(Party, Vec<PartyMember>)>>;

    async fn stats(&self) -> Result<PartyStoreStats>;
}

#[derive(Debug)]
struct PartyRow {
    party: Party,
    members: BTreeMap<String, PartyMember>,
    deleted: bool,
}

impl PartyRow {
    fn admit(&mut self, member: PartyMember) -> Result<()> {
        let party_id = self.party.id;
        if self.party.status != PartyStatus::Created {
            return Err(MatchmakingError::PartyAlreadyStarted { party_id }.into());
        }
        if self.party.num_members >= self.party.max_members {
            return Err(MatchmakingError::PartyFull { party_id }.into());
        }
        if self.members.contains_key(&member.account_id) {
            return Err(MatchmakingError::AlreadyJoined.into());
        }

        self.members.insert(member.account_id.clone(), member);
        self.party.num_members = self.members.len() as u32;
        Ok(())
    }
}

type PartyHandle = Arc<Mutex<PartyRow>>;

fn lock_error(what: &str) -> MatchmakingError {
    MatchmakingError::InternalError {
        message: format!("Failed to acquire {} lock", what),
    }
}

/// In-memory party store with per-party locking
#[derive(Default)]
pub struct InMemoryPartyStore {
    rows: RwLock<BTreeMap<PartyId, PartyHandle>>,
    party_ids: IdSequence,
}

impl InMemoryPartyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, party_id: PartyId) -> Result<PartyHandle> {
        let rows = self.rows.read().map_err(|_| lock_error("parties"))?;
        rows.get(&party_id)
            .cloned()
            .ok_or_else(|| MatchmakingError::PartyNotFound { party_id }.into())
    }

    fn handles(&self) -> Result<Vec<(PartyId, PartyHandle)>> {
        let rows = self.rows.read().map_err(|_| lock_error("parties"))?;
        Ok(rows.iter().map(|(id, h)| (*id, h.clone())).collect())
    }

    fn with_row<T>(&self, party_id: PartyId, f: impl FnOnce(&mut PartyRow) -> Result<T>) -> Result<T> {
        let handle = self.handle(party_id)?;
        let mut row = handle.lock().map_err(|_| lock_error("party"))?;
        if row.deleted {
            return Err(MatchmakingError::PartyNotFound { party_id }.into());
        }
        f(&mut row)
    }

    fn unlink(&self, party_id: PartyId) -> Result<()> {
        let mut rows = self.rows.write().map_err(|_| lock_error("parties"))?;
        rows.remove(&party_id);
        Ok(())
    }
}

#[async_trait]
impl PartyStore for InMemoryPartyStore {
    async fn create_party(
        &self,
        new_party: NewParty,
        creator: Option<PartyMember>,
    ) -> Result<Party> {
        if new_party.max_members < 2 {
            return Err(MatchmakingError::InvalidRequest {
                reason: "max_members must be at least 2".to_string(),
            }
            .into());
        }

        let party = Party {
            id: self.party_ids.next(),
            gamespace: new_party.gamespace,
            game_name: new_party.game_name,
            game_version: new_party.game_version,
            game_server_id: new_party.game_server_id,
            region_id: new_party.region_id,
            num_members: 0,
            max_members: new_party.max_members,
            settings: new_party.settings,
            room_settings: new_party.room_settings,
            room_filters: new_party.room_filters,
            flags: new_party.flags,
            close_callback: new_party.close_callback,
            status: PartyStatus::Created,
        };

        let mut row = PartyRow {
            party,
            members: BTreeMap::new(),
            deleted: false,
        };
        if let Some(creator) = creator {
            row.admit(creator)?;
        }
        let party = row.party.clone();

        let mut rows = self.rows.write().map_err(|_| lock_error("parties"))?;
        rows.insert(party.id, Arc::new(Mutex::new(row)));

        info!(
            "Party inserted - party_id: {}, max_members: {}, flags: '{}'",
            party.id,
            party.max_members,
            party.flags.dump()
        );
        Ok(party)
    }

    async fn get_party(&self, party_id: PartyId) -> Result<Party> {
        self.with_row(party_id, |row| Ok(row.party.clone()))
    }

    async fn list_members(&self, party_id: PartyId) -> Result<Vec<PartyMember>> {
        self.with_row(party_id, |row| Ok(row.members.values().cloned().collect()))
    }

    async fn get_member(
        &self,
        party_id: PartyId,
        account_id: &str,
    ) -> Result<Option<PartyMember>> {
        self.with_row(party_id, |row| Ok(row.members.get(account_id).cloned()))
    }

    async fn join(&self, party_id: PartyId, member: PartyMember) -> Result<Party> {
        self.with_row(party_id, |row| {
            row.admit(member)?;
            Ok(row.party.clone())
        })
    }

    async fn find_and_join(&self, query: &PartyQuery, member: PartyMember) -> Result<Party> {
        for (_, handle) in self.handles()? {
            let mut row = handle.lock().map_err(|_| lock_error("party"))?;
            if row.deleted
                || !query.matches(&row.party)
                || row.members.contains_key(&member.account_id)
            {
                continue;
            }
            row.admit(member)?;
            debug!(
                "Matched party joined - party_id: {}, members: {}/{}",
                row.party.id, row.party.num_members, row.party.max_members
            );
            return Ok(row.party.clone());
        }

        Err(MatchmakingError::PartyNotFound { party_id: 0 }.into())
    }

    async fn remove_member(&self, party_id: PartyId, account_id: &str) -> Result<MemberRemoval> {
        let removal = self.with_row(party_id, |row| {
            if row.party.status != PartyStatus::Created {
                return Err(MatchmakingError::PartyAlreadyStarted { party_id }.into());
            }
            if row.members.remove(account_id).is_none() {
                return Err(MatchmakingError::MemberNotFound {
                    account_id: account_id.to_string(),
                }
                .into());
            }
            row.party.num_members = row.members.len() as u32;

            if row.party.flags.auto_close && row.party.num_members == 0 {
                row.deleted = true;
                return Ok(MemberRemoval::Closed(row.party.clone()));
            }
            Ok(MemberRemoval::Remaining(row.party.clone()))
        })?;

        if matches!(removal, MemberRemoval::Closed(_)) {
            self.unlink(party_id)?;
        }
        Ok(removal)
    }

    async fn begin_start(&self, party_id: PartyId) -> Result<(Party, Vec<PartyMember>)> {
        self.with_row(party_id, |row| {
            if row.party.status != PartyStatus::Created {
                return Err(MatchmakingError::PartyAlreadyStarted { party_id }.into());
            }
            row.party.status = PartyStatus::Starting;
            Ok((row.party.clone(), row.members.values().cloned().collect()))
        })
    }

    async fn rollback_start(&self, party_id: PartyId) -> Result<Party> {
        self.with_row(party_id, |row| {
            row.party.status = PartyStatus::Created;
            Ok(row.party.clone())
        })
    }

    async fn delete_party(
        &self,
        party_id: PartyId,
    ) -> Result<Option<(Party, Vec<PartyMember>)>> {
        let handle = {
            let mut rows = self.rows.write().map_err(|_| lock_error("parties"))?;
            rows.remove(&party_id)
        };
        let Some(handle) = handle else {
            return Ok(None);
        };

        let mut row = handle.lock().map_err(|_| lock_error("party"))?;
        if row.deleted {
            return Ok(None);
        }
        row.deleted = true;
        let members = std::mem::take(&mut row.members);
        Ok(Some((row.party.clone(), members.into_values().collect())))
    }

    async fn stats(&self) -> Result<PartyStoreStats> {
        let mut stats = PartyStoreStats::default();
        for (_, handle) in self.handles()? {
            let row = handle.lock().map_err(|_| lock_error("party"))?;
            if row.deleted {
                continue;
            }
            stats.parties += 1;
            stats.members += row.members.len() as u64;
            if row.party.status == PartyStatus::Starting {
                stats.starting += 1;
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::roles;
    use serde_json::json;

    fn new_party(max_members: u32, flags: &str) -> NewParty {
        NewParty {
            gamespace: "gs".to_string(),
            game_name: "arena".to_string(),
            game_version: "1.0".to_string(),
            game_server_id: 1,
            region_id: 1,
            max_members,
            settings: json!({"mode": "duo"}).as_object().cloned().unwrap(),
            room_settings: Settings::new(),
            room_filters: None,
            flags: PartyFlags::parse(flags),
            close_callback: None,
        }
    }

    fn member(account: &str) -> PartyMember {
        PartyMember {
            account_id: account.to_string(),
            role: roles::USER,
            profile: json!({}),
            credential: "token".to_string(),
        }
    }

    fn status(err: anyhow::Error) -> u16 {
        crate::error::status_of(&err)
    }

    #[tokio::test]
    async fn test_create_rejects_tiny_party() {
        let store = InMemoryPartyStore::new();
        let err = store.create_party(new_party(1, ""), None).await.unwrap_err();
        assert_eq!(status(err), 400);
    }

    #[tokio::test]
    async fn test_join_checks_capacity_and_duplicates() {
        let store = InMemoryPartyStore::new();
        let party = store
            .create_party(new_party(2, ""), Some(member("a")))
            .await
            .unwrap();
        assert_eq!(party.num_members, 1);

        assert_eq!(status(store.join(party.id, member("a")).await.unwrap_err()), 409);
        assert_eq!(store.join(party.id, member("b")).await.unwrap().num_members, 2);
        assert_eq!(status(store.join(party.id, member("c")).await.unwrap_err()), 406);
        assert_eq!(store.list_members(party.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_start_freezes_membership() {
        let store = InMemoryPartyStore::new();
        let party = store
            .create_party(new_party(3, ""), Some(member("a")))
            .await
            .unwrap();

        let (starting, members) = store.begin_start(party.id).await.unwrap();
        assert_eq!(starting.status, PartyStatus::Starting);
        assert_eq!(members.len(), 1);

        assert_eq!(status(store.begin_start(party.id).await.unwrap_err()), 409);
        assert_eq!(status(store.join(party.id, member("b")).await.unwrap_err()), 409);
        assert_eq!(
            status(store.remove_member(party.id, "a").await.unwrap_err()),
            409
        );

        let party = store.rollback_start(party.id).await.unwrap();
        assert_eq!(party.status, PartyStatus::Created);
        assert!(store.join(party.id, member("b")).await.is_ok());
    }

    #[tokio::test]
    async fn test_auto_close_on_last_leave() {
        let store = InMemoryPartyStore::new();
        let party = store
            .create_party(new_party(2, "auto_close"), Some(member("a")))
            .await
            .unwrap();

        let removal = store.remove_member(party.id, "a").await.unwrap();
        assert!(matches!(removal, MemberRemoval::Closed(_)));
        assert_eq!(status(store.get_party(party.id).await.unwrap_err()), 404);

        let keep = store
            .create_party(new_party(2, ""), Some(member("a")))
            .await
            .unwrap();
        let removal = store.remove_member(keep.id, "a").await.unwrap();
        assert!(matches!(removal, MemberRemoval::Remaining(ref p) if p.num_members == 0));
        assert_eq!(status(store.remove_member(keep.id, "a").await.unwrap_err()), 409);
    }

    #[tokio::test]
    async fn test_find_and_join_uses_filter() {
        let store = InMemoryPartyStore::new();
        let party = store.create_party(new_party(2, ""), None).await.unwrap();

        let mut query = PartyQuery {
            gamespace: "gs".to_string(),
            game_name: "arena".to_string(),
            game_version: "1.0".to_string(),
            game_server_id: 1,
            region_id: None,
            filter: SettingsFilter::parse(&json!({"mode": "solo"})).unwrap(),
        };
        assert_eq!(status(store.find_and_join(&query, member("a")).await.unwrap_err()), 404);

        query.filter = SettingsFilter::parse(&json!({"mode": "duo"})).unwrap();
        let joined = store.find_and_join(&query, member("a")).await.unwrap();
        assert_eq!(joined.id, party.id);
        store.find_and_join(&query, member("b")).await.unwrap();
        assert!(store.find_and_join(&query, member("c")).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_returns_members_once() {
        let store = InMemoryPartyStore::new();
        let party = store
            .create_party(new_party(2, ""), Some(member("a")))
            .await
            .unwrap();

        let (deleted, members) = store.delete_party(party.id).await.unwrap().unwrap();
        assert_eq!(deleted.id, party.id);
        assert_eq!(members.len(), 1);
        assert!(store.delete_party(party.id).await.unwrap().is_none());
        assert_eq!(store.stats().await.unwrap(), PartyStoreStats::default());
    }
}
