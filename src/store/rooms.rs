//! Room and slot storage
//!
//! Every room is a row guarded by its own mutex. Operations that change the
//! player count read the capacity and insert or delete slots while holding
//! that row's lock, so concurrent joins on one room serialize and joins on
//! different rooms never contend. The outer map lock is only held long enough
//! to snapshot or swap row handles and never across an await.

use crate::error::{MatchmakingError, Result};
use crate::placement::FleetDirectory;
use crate::store::query::RoomQuery;
use crate::types::{
    DeploymentId, GameServerId, Gamespace, HostId, Location, RegionId, Reservation,
    Room, RoomId, RoomState, Settings, Slot, SlotId, SlotRequest, SlotState,
};
use crate::utils::{generate_join_key, IdSequence};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info};

/// Everything needed to insert a room
#[derive(Debug, Clone)]
pub struct NewRoom {
    pub gamespace: Gamespace,
    pub game_name: String,
    pub game_version: String,
    pub game_server_id: GameServerId,
    pub region_id: RegionId,
    pub host_id: HostId,
    pub deployment_id: DeploymentId,
    pub max_players: u32,
    pub settings: Settings,
}

/// Aggregate counters for gauges
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoomStoreStats {
    pub rooms: usize,
    pub players: u64,
    pub reserved: u64,
}

/// Transactional access to rooms and their slots
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Lock the best room matching `query` with space for every member and
    /// reserve one slot per member, all or nothing
    async fn find_and_reserve(
        &self,
        query: &RoomQuery,
        members: &[SlotRequest],
    ) -> Result<(Room, Vec<Reservation>)>;

    /// Reserve slots in a specific room, all or nothing
    async fn reserve_in_room(
        &self,
        room_id: RoomId,
        members: &[SlotRequest],
    ) -> Result<(Room, Vec<Reservation>)>;

    /// Insert a room with its first slots already reserved
    async fn create_room(
        &self,
        new_room: NewRoom,
        members: &[SlotRequest],
    ) -> Result<(Room, Vec<Reservation>)>;

    /// Move a reserved slot to JOINED; a key that is unknown or already joined fails
    async fn approve_join(&self, room_id: RoomId, key: &str) -> Result<Slot>;

    /// Delete a slot by join key
    async fn approve_leave(&self, room_id: RoomId, key: &str) -> Result<bool>;

    /// Delete a slot only if it is still RESERVED
    async fn release_reserved(&self, room_id: RoomId, slot_id: SlotId) -> Result<bool>;

    /// Delete an account's slot, and the whole room if asked to
    async fn leave(&self, room_id: RoomId, account_id: &str, remove_room: bool) -> Result<bool>;

    async fn remove_room(&self, room_id: RoomId) -> Result<bool>;

    /// Remove every room of a host except the listed ones
    async fn remove_host_rooms(&self, host_id: HostId, keep: &[RoomId]) -> Result<Vec<RoomId>>;

    /// Record where the room was spawned, merge server-chosen settings and mark it SPAWNED
    async fn assign_location(
        &self,
        room_id: RoomId,
        location: Location,
        settings: Settings,
    ) -> Result<Room>;

    /// Replace the room's settings document
    async fn update_settings(&self, room_id: RoomId, settings: Settings) -> Result<Room>;

    async fn get_room(&self, room_id: RoomId) -> Result<Room>;

    /// Non-locking listing, sorted like the find path
    async fn list_rooms(&self, query: &RoomQuery) -> Result<Vec<Room>>;

    async fn list_slots(&self, room_id: RoomId) -> Result<Vec<Slot>>;

    async fn stats(&self) -> Result<RoomStoreStats>;
}

#[derive(Debug)]
struct RoomRow {
    room: Room,
    slots: BTreeMap<SlotId, Slot>,
    deleted: bool,
}

impl RoomRow {
    fn sync_players(&mut self) {
        self.room.players = self.slots.len() as u32;
    }

    fn reserve(
        &mut self,
        slot_ids: &IdSequence,
        members: &[SlotRequest],
    ) -> Vec<Reservation> {
        let mut reservations = Vec::with_capacity(members.len());
        for member in members {
            let slot = Slot {
                id: slot_ids.next(),
                room_id: self.room.id,
                host_id: self.room.host_id,
                gamespace: self.room.gamespace.clone(),
                account_id: member.account_id.clone(),
                key: generate_join_key(&self.room.gamespace, &member.account_id),
                credential: member.credential.clone(),
                state: SlotState::Reserved,
                info: member.info.clone(),
            };
            reservations.push(Reservation {
                account_id: slot.account_id.clone(),
                slot_id: slot.id,
                key: slot.key.clone(),
            });
            self.slots.insert(slot.id, slot);
        }
        self.sync_players();
        reservations
    }
}

#[derive(Debug, Clone)]
struct RowHandle {
    host_id: HostId,
    row: Arc<Mutex<RoomRow>>,
}

fn lock_error(what: &str) -> MatchmakingError {
    MatchmakingError::InternalError {
        message: format!("Failed to acquire {} lock", what),
    }
}

fn check_members(members: &[SlotRequest]) -> Result<()> {
    if members.is_empty() {
        return Err(MatchmakingError::InvalidRequest {
            reason: "at least one member is required".to_string(),
        }
        .into());
    }
    Ok(())
}

/// In-memory room store with per-room locking
pub struct InMemoryRoomStore {
    rows: RwLock<BTreeMap<RoomId, RowHandle>>,
    room_ids: IdSequence,
    slot_ids: IdSequence,
    fleet: Arc<dyn FleetDirectory>,
}

impl InMemoryRoomStore {
    pub fn new(fleet: Arc<dyn FleetDirectory>) -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            room_ids: IdSequence::new(),
            slot_ids: IdSequence::new(),
            fleet,
        }
    }

    fn handles(&self) -> Result<Vec<RowHandle>> {
        let rows = self.rows.read().map_err(|_| lock_error("rooms"))?;
        Ok(rows.values().cloned().collect())
    }

    fn handle(&self, room_id: RoomId) -> Result<Option<RowHandle>> {
        let rows = self.rows.read().map_err(|_| lock_error("rooms"))?;
        Ok(rows.get(&room_id).cloned())
    }

    fn take_handle(&self, room_id: RoomId) -> Result<Option<RowHandle>> {
        let mut rows = self.rows.write().map_err(|_| lock_error("rooms"))?;
        Ok(rows.remove(&room_id))
    }

    async fn active_hosts(&self, query: &RoomQuery) -> Result<Option<HashSet<HostId>>> {
        if !query.host_active {
            return Ok(None);
        }
        let hosts = self.fleet.list_hosts(query.region_id).await?;
        Ok(Some(
            hosts
                .into_iter()
                .filter(|host| host.accepts_players())
                .map(|host| host.id)
                .collect(),
        ))
    }

    /// Run `f` against a live row, RoomNotFound if the room is gone
    fn with_row<T>(&self, room_id: RoomId, f: impl FnOnce(&mut RoomRow) -> Result<T>) -> Result<T> {
        let handle = self
            .handle(room_id)?
            .ok_or(MatchmakingError::RoomNotFound {
                room_id: Some(room_id),
            })?;
        let mut row = handle.row.lock().map_err(|_| lock_error("room"))?;
        if row.deleted {
            return Err(MatchmakingError::RoomNotFound {
                room_id: Some(room_id),
            }
            .into());
        }
        f(&mut row)
    }

    fn remove_handle(&self, room_id: RoomId) -> Result<bool> {
        match self.take_handle(room_id)? {
            Some(handle) => {
                let mut row = handle.row.lock().map_err(|_| lock_error("room"))?;
                row.deleted = true;
                row.slots.clear();
                row.sync_players();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Matching rooms in query order, read without holding any row lock
    fn ordered_matches(
        &self,
        query: &RoomQuery,
        active_hosts: Option<&HashSet<HostId>>,
        min_free: u32,
    ) -> Result<Vec<(Room, RowHandle)>> {
        let mut candidates = Vec::new();
        for handle in self.handles()? {
            if query.host_id.map_or(false, |h| h != handle.host_id) {
                continue;
            }
            let row = handle.row.lock().map_err(|_| lock_error("room"))?;
            if row.deleted
                || row.room.free_slots() < min_free
                || !query.matches(&row.room, active_hosts)
            {
                continue;
            }
            let room = row.room.clone();
            drop(row);
            candidates.push((room, handle));
        }

        candidates.sort_by_key(|(room, _)| query.sort_key(room.region_id, room.id));
        Ok(candidates)
    }
}

#[async_trait]
impl RoomStore for InMemoryRoomStore {
    async fn find_and_reserve(
        &self,
        query: &RoomQuery,
        members: &[SlotRequest],
    ) -> Result<(Room, Vec<Reservation>)> {
        check_members(members)?;
        let active = self.active_hosts(query).await?;
        let needed = query.free_slots.max(members.len() as u32);

        for (_, handle) in self.ordered_matches(query, active.as_ref(), needed)? {
            let mut row = handle.row.lock().map_err(|_| lock_error("room"))?;
            // The snapshot may be stale, capacity is decided under the row lock
            if row.deleted
                || row.room.free_slots() < needed
                || !query.matches(&row.room, active.as_ref())
            {
                continue;
            }

            let reservations = row.reserve(&self.slot_ids, members);
            debug!(
                "Slots reserved in existing room - room_id: {}, members: {}, players: {}/{}",
                row.room.id,
                members.len(),
                row.room.players,
                row.room.max_players
            );
            return Ok((row.room.clone(), reservations));
        }

        Err(MatchmakingError::RoomNotFound { room_id: None }.into())
    }

    async fn reserve_in_room(
        &self,
        room_id: RoomId,
        members: &[SlotRequest],
    ) -> Result<(Room, Vec<Reservation>)> {
        check_members(members)?;
        self.with_row(room_id, |row| {
            if (row.room.free_slots() as usize) < members.len() {
                return Err(MatchmakingError::RoomNotFound {
                    room_id: Some(room_id),
                }
                .into());
            }
            let reservations = row.reserve(&self.slot_ids, members);
            Ok((row.room.clone(), reservations))
        })
    }

    async fn create_room(
        &self,
        new_room: NewRoom,
        members: &[SlotRequest],
    ) -> Result<(Room, Vec<Reservation>)> {
        check_members(members)?;
        if members.len() as u32 > new_room.max_players {
            return Err(MatchmakingError::InvalidRequest {
                reason: format!(
                    "{} members do not fit in a room of {}",
                    members.len(),
                    new_room.max_players
                ),
            }
            .into());
        }

        let room = Room {
            id: self.room_ids.next(),
            gamespace: new_room.gamespace,
            game_name: new_room.game_name,
            game_version: new_room.game_version,
            game_server_id: new_room.game_server_id,
            region_id: new_room.region_id,
            host_id: new_room.host_id,
            deployment_id: new_room.deployment_id,
            players: 0,
            max_players: new_room.max_players,
            settings: new_room.settings,
            location: None,
            state: RoomState::None,
        };

        let mut row = RoomRow {
            room,
            slots: BTreeMap::new(),
            deleted: false,
        };
        // The row is populated before it becomes visible
        let reservations = row.reserve(&self.slot_ids, members);
        let room = row.room.clone();

        let handle = RowHandle {
            host_id: room.host_id,
            row: Arc::new(Mutex::new(row)),
        };
        {
            let mut rows = self.rows.write().map_err(|_| lock_error("rooms"))?;
            rows.insert(room.id, handle);
        }

        info!(
            "Room inserted - room_id: {}, host_id: {}, region_id: {}, players: {}/{}",
            room.id, room.host_id, room.region_id, room.players, room.max_players
        );
        Ok((room, reservations))
    }

    async fn approve_join(&self, room_id: RoomId, key: &str) -> Result<Slot> {
        let handle = self
            .handle(room_id)?
            .ok_or(MatchmakingError::ApproveFailed { room_id })?;
        let mut row = handle.row.lock().map_err(|_| lock_error("room"))?;
        if row.deleted {
            return Err(MatchmakingError::ApproveFailed { room_id }.into());
        }

        let slot = row
            .slots
            .values_mut()
            .find(|slot| slot.key == key)
            .ok_or(MatchmakingError::ApproveFailed { room_id })?;
        if slot.state != SlotState::Reserved {
            return Err(MatchmakingError::ApproveFailed { room_id }.into());
        }
        slot.state = SlotState::Joined;
        Ok(slot.clone())
    }

    async fn approve_leave(&self, room_id: RoomId, key: &str) -> Result<bool> {
        let Some(handle) = self.handle(room_id)? else {
            return Ok(false);
        };
        let mut row = handle.row.lock().map_err(|_| lock_error("room"))?;
        let before = row.slots.len();
        row.slots.retain(|_, slot| slot.key != key);
        row.sync_players();
        Ok(row.slots.len() != before)
    }

    async fn release_reserved(&self, room_id: RoomId, slot_id: SlotId) -> Result<bool> {
        let Some(handle) = self.handle(room_id)? else {
            return Ok(false);
        };
        let mut row = handle.row.lock().map_err(|_| lock_error("room"))?;
        let reserved = row
            .slots
            .get(&slot_id)
            .map_or(false, |slot| slot.state == SlotState::Reserved);
        if !reserved {
            return Ok(false);
        }
        row.slots.remove(&slot_id);
        row.sync_players();
        Ok(true)
    }

    async fn leave(&self, room_id: RoomId, account_id: &str, remove_room: bool) -> Result<bool> {
        let removed = match self.handle(room_id)? {
            Some(handle) => {
                let mut row = handle.row.lock().map_err(|_| lock_error("room"))?;
                let before = row.slots.len();
                row.slots.retain(|_, slot| slot.account_id != account_id);
                row.sync_players();
                row.slots.len() != before
            }
            None => false,
        };

        if remove_room {
            self.remove_handle(room_id)?;
        }
        Ok(removed)
    }

    async fn remove_room(&self, room_id: RoomId) -> Result<bool> {
        self.remove_handle(room_id)
    }

    async fn remove_host_rooms(&self, host_id: HostId, keep: &[RoomId]) -> Result<Vec<RoomId>> {
        let stale: Vec<RoomId> = {
            let rows = self.rows.read().map_err(|_| lock_error("rooms"))?;
            rows.iter()
                .filter(|(id, handle)| handle.host_id == host_id && !keep.contains(id))
                .map(|(id, _)| *id)
                .collect()
        };

        let mut removed = Vec::with_capacity(stale.len());
        for room_id in stale {
            if self.remove_handle(room_id)? {
                removed.push(room_id);
            }
        }
        Ok(removed)
    }

    async fn assign_location(
        &self,
        room_id: RoomId,
        location: Location,
        settings: Settings,
    ) -> Result<Room> {
        self.with_row(room_id, |row| {
            row.room.location = Some(location);
            row.room.settings.extend(settings);
            row.room.state = RoomState::Spawned;
            Ok(row.room.clone())
        })
    }

    async fn update_settings(&self, room_id: RoomId, settings: Settings) -> Result<Room> {
        self.with_row(room_id, |row| {
            row.room.settings = settings;
            Ok(row.room.clone())
        })
    }

    async fn get_room(&self, room_id: RoomId) -> Result<Room> {
        self.with_row(room_id, |row| Ok(row.room.clone()))
    }

    async fn list_rooms(&self, query: &RoomQuery) -> Result<Vec<Room>> {
        let active = self.active_hosts(query).await?;
        let mut rooms: Vec<Room> = self
            .ordered_matches(query, active.as_ref(), query.free_slots)?
            .into_iter()
            .map(|(room, _)| room)
            .collect();
        if let Some(limit) = query.limit {
            rooms.truncate(limit);
        }
        Ok(rooms)
    }

    async fn list_slots(&self, room_id: RoomId) -> Result<Vec<Slot>> {
        self.with_row(room_id, |row| Ok(row.slots.values().cloned().collect()))
    }

    async fn stats(&self) -> Result<RoomStoreStats> {
        let mut stats = RoomStoreStats::default();
        for handle in self.handles()? {
            let row = handle.row.lock().map_err(|_| lock_error("room"))?;
            if row.deleted {
                continue;
            }
            stats.rooms += 1;
            stats.players += row.slots.len() as u64;
            stats.reserved += row
                .slots
                .values()
                .filter(|slot| slot.state == SlotState::Reserved)
                .count() as u64;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::InMemoryFleet;
    use crate::store::filter::SettingsFilter;
    use crate::types::{Host, HostState};
    use proptest::prelude::*;
    use serde_json::json;

    fn create_test_store() -> (Arc<InMemoryFleet>, InMemoryRoomStore) {
        let fleet = Arc::new(InMemoryFleet::new());
        fleet.add_host(Host::new(1, "h1", "h1.internal", 1)).unwrap();
        fleet.add_host(Host::new(2, "h2", "h2.internal", 2)).unwrap();
        let store = InMemoryRoomStore::new(fleet.clone());
        (fleet, store)
    }

    fn new_room(host_id: HostId, max_players: u32) -> NewRoom {
        NewRoom {
            gamespace: "gs".to_string(),
            game_name: "arena".to_string(),
            game_version: "1.0".to_string(),
            game_server_id: 1,
            region_id: host_id,
            host_id,
            deployment_id: 1,
            max_players,
            settings: json!({"mode": "ctf"}).as_object().cloned().unwrap(),
        }
    }

    fn members(accounts: &[&str]) -> Vec<SlotRequest> {
        accounts.iter().map(|a| SlotRequest::new(a, "token")).collect()
    }

    fn query() -> RoomQuery {
        RoomQuery::new("gs", "arena", "1.0").host_active(true)
    }

    #[tokio::test]
    async fn test_create_counts_first_slot() {
        let (_, store) = create_test_store();
        let (room, reservations) = store.create_room(new_room(1, 4), &members(&["a"])).await.unwrap();

        assert_eq!(room.players, 1);
        assert_eq!(room.state, RoomState::None);
        assert_eq!(reservations.len(), 1);
        assert!(reservations[0].key.starts_with("gs_a_"));

        let slots = store.list_slots(room.id).await.unwrap();
        assert_eq!(slots[0].state, SlotState::Reserved);
    }

    #[tokio::test]
    async fn test_find_respects_capacity_and_region_order() {
        let (_, store) = create_test_store();
        let (first, _) = store.create_room(new_room(1, 2), &members(&["a"])).await.unwrap();
        let (second, _) = store.create_room(new_room(2, 2), &members(&["b"])).await.unwrap();

        let ordered = query().regions_order(vec![2, 1]);
        let (room, _) = store.find_and_reserve(&ordered, &members(&["c"])).await.unwrap();
        assert_eq!(room.id, second.id);

        let (room, _) = store.find_and_reserve(&ordered, &members(&["d"])).await.unwrap();
        assert_eq!(room.id, first.id);

        let err = store.find_and_reserve(&ordered, &members(&["e"])).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchmakingError>(),
            Some(MatchmakingError::RoomNotFound { room_id: None })
        ));
    }

    #[tokio::test]
    async fn test_multi_reserve_is_all_or_nothing() {
        let (_, store) = create_test_store();
        let (room, _) = store.create_room(new_room(1, 3), &members(&["a"])).await.unwrap();

        assert!(store
            .reserve_in_room(room.id, &members(&["b", "c", "d"]))
            .await
            .is_err());
        assert_eq!(store.get_room(room.id).await.unwrap().players, 1);

        let (room, reservations) = store
            .reserve_in_room(room.id, &members(&["b", "c"]))
            .await
            .unwrap();
        assert_eq!(reservations.len(), 2);
        assert_eq!(room.players, 3);
    }

    #[tokio::test]
    async fn test_rooms_on_failed_hosts_are_skipped() {
        let (fleet, store) = create_test_store();
        store.create_room(new_room(1, 4), &members(&["a"])).await.unwrap();

        fleet.set_hosts_state(&[1], HostState::Error).await.unwrap();
        assert!(store.find_and_reserve(&query(), &members(&["b"])).await.is_err());

        fleet.set_hosts_state(&[1], HostState::Overload).await.unwrap();
        assert!(store.find_and_reserve(&query(), &members(&["b"])).await.is_ok());
    }

    #[tokio::test]
    async fn test_settings_filter_applies() {
        let (_, store) = create_test_store();
        store.create_room(new_room(1, 4), &members(&["a"])).await.unwrap();

        let dm = query().filter(SettingsFilter::parse(&json!({"mode": "dm"})).unwrap());
        assert!(store.find_and_reserve(&dm, &members(&["b"])).await.is_err());
    }

    #[tokio::test]
    async fn test_approve_join_only_once() {
        let (_, store) = create_test_store();
        let (room, reservations) = store.create_room(new_room(1, 4), &members(&["a"])).await.unwrap();
        let key = &reservations[0].key;

        let slot = store.approve_join(room.id, key).await.unwrap();
        assert_eq!(slot.state, SlotState::Joined);
        assert_eq!(slot.credential, "token");

        let err = store.approve_join(room.id, key).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchmakingError>(),
            Some(MatchmakingError::ApproveFailed { .. })
        ));
        assert!(store.approve_join(room.id, "nope").await.is_err());
    }

    #[tokio::test]
    async fn test_release_is_conditional_on_reserved() {
        let (_, store) = create_test_store();
        let (room, reservations) = store
            .create_room(new_room(1, 4), &members(&["a", "b"]))
            .await
            .unwrap();

        store.approve_join(room.id, &reservations[0].key).await.unwrap();
        assert!(!store.release_reserved(room.id, reservations[0].slot_id).await.unwrap());
        assert!(store.release_reserved(room.id, reservations[1].slot_id).await.unwrap());
        assert!(!store.release_reserved(room.id, reservations[1].slot_id).await.unwrap());
        assert_eq!(store.get_room(room.id).await.unwrap().players, 1);
    }

    #[tokio::test]
    async fn test_leave_with_room_removal() {
        let (_, store) = create_test_store();
        let (room, _) = store.create_room(new_room(1, 4), &members(&["a"])).await.unwrap();

        assert!(store.leave(room.id, "a", true).await.unwrap());
        assert!(store.get_room(room.id).await.is_err());
        assert!(!store.leave(room.id, "a", false).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_host_rooms_keeps_reported() {
        let (_, store) = create_test_store();
        let (keep, _) = store.create_room(new_room(1, 4), &members(&["a"])).await.unwrap();
        let (stale, _) = store.create_room(new_room(1, 4), &members(&["b"])).await.unwrap();
        let (other, _) = store.create_room(new_room(2, 4), &members(&["c"])).await.unwrap();

        let removed = store.remove_host_rooms(1, &[keep.id]).await.unwrap();
        assert_eq!(removed, vec![stale.id]);
        assert!(store.get_room(keep.id).await.is_ok());
        assert!(store.get_room(other.id).await.is_ok());
        assert_eq!(store.stats().await.unwrap().rooms, 2);
    }

    #[tokio::test]
    async fn test_assign_location_merges_settings() {
        let (_, store) = create_test_store();
        let (room, _) = store.create_room(new_room(1, 4), &members(&["a"])).await.unwrap();

        let location = Location {
            host: "10.0.0.1".to_string(),
            ports: vec![7000],
        };
        let overrides = json!({"map": "dust"}).as_object().cloned().unwrap();
        let room = store.assign_location(room.id, location.clone(), overrides).await.unwrap();

        assert_eq!(room.state, RoomState::Spawned);
        assert_eq!(room.location, Some(location));
        assert_eq!(room.settings.get("mode"), Some(&json!("ctf")));
        assert_eq!(room.settings.get("map"), Some(&json!("dust")));
    }

    proptest! {
        #[test]
        fn prop_players_never_exceed_capacity(max_players in 1u32..6, joins in 1usize..12) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async {
                let (_, store) = create_test_store();
                let (room, _) = store.create_room(new_room(1, max_players), &members(&["owner"])).await.unwrap();

                let mut admitted = 1;
                for i in 0..joins {
                    let account = format!("p{}", i);
                    if store.find_and_reserve(&query(), &members(&[&account])).await.is_ok() {
                        admitted += 1;
                    }
                }

                let room = store.get_room(room.id).await.unwrap();
                assert!(room.players <= max_players);
                assert_eq!(room.players, admitted.min(max_players));
            });
        }
    }
}
