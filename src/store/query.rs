//! Structured room queries
//!
//! A `RoomQuery` combines structural constraints with a settings filter. The
//! same query drives the locked find-to-join path and plain listings.

use crate::store::filter::SettingsFilter;
use crate::types::{
    DeploymentId, GameServerId, Gamespace, HostId, RegionId, Room, RoomId, RoomState,
};
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct RoomQuery {
    pub gamespace: Option<Gamespace>,
    pub game_name: Option<String>,
    pub game_version: Option<String>,
    pub game_server_id: Option<GameServerId>,
    pub room_id: Option<RoomId>,
    pub host_id: Option<HostId>,
    pub region_id: Option<RegionId>,
    pub deployment_id: Option<DeploymentId>,
    pub state: Option<RoomState>,
    /// Rooms need at least this many free slots, 0 also shows full rooms
    pub free_slots: u32,
    /// Preferred region order, rooms in earlier regions sort first
    pub regions_order: Option<Vec<RegionId>>,
    /// Only rooms whose host is ACTIVE or OVERLOAD
    pub host_active: bool,
    pub filter: SettingsFilter,
    pub limit: Option<usize>,
}

impl RoomQuery {
    /// Query for rooms of one game that have a free slot
    pub fn new(gamespace: &str, game_name: &str, game_version: &str) -> Self {
        Self {
            gamespace: Some(gamespace.to_string()),
            game_name: Some(game_name.to_string()),
            game_version: Some(game_version.to_string()),
            free_slots: 1,
            ..Self::default()
        }
    }

    pub fn game_server(mut self, game_server_id: GameServerId) -> Self {
        self.game_server_id = Some(game_server_id);
        self
    }

    pub fn room(mut self, room_id: RoomId) -> Self {
        self.room_id = Some(room_id);
        self
    }

    pub fn host(mut self, host_id: HostId) -> Self {
        self.host_id = Some(host_id);
        self
    }

    pub fn region(mut self, region_id: RegionId) -> Self {
        self.region_id = Some(region_id);
        self
    }

    pub fn deployment(mut self, deployment_id: DeploymentId) -> Self {
        self.deployment_id = Some(deployment_id);
        self
    }

    pub fn state(mut self, state: RoomState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn free_slots(mut self, free_slots: u32) -> Self {
        self.free_slots = free_slots;
        self
    }

    pub fn show_full(self) -> Self {
        self.free_slots(0)
    }

    pub fn regions_order(mut self, order: Vec<RegionId>) -> Self {
        self.regions_order = Some(order);
        self
    }

    pub fn host_active(mut self, host_active: bool) -> Self {
        self.host_active = host_active;
        self
    }

    pub fn filter(mut self, filter: SettingsFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a room satisfies every constraint
    ///
    /// `active_hosts` is only consulted when `host_active` is set.
    pub fn matches(&self, room: &Room, active_hosts: Option<&HashSet<HostId>>) -> bool {
        fn eq<T: PartialEq>(want: &Option<T>, have: &T) -> bool {
            want.as_ref().map_or(true, |want| want == have)
        }

        eq(&self.gamespace, &room.gamespace)
            && eq(&self.game_name, &room.game_name)
            && eq(&self.game_version, &room.game_version)
            && eq(&self.game_server_id, &room.game_server_id)
            && eq(&self.room_id, &room.id)
            && eq(&self.host_id, &room.host_id)
            && eq(&self.region_id, &room.region_id)
            && eq(&self.deployment_id, &room.deployment_id)
            && eq(&self.state, &room.state)
            && room.free_slots() >= self.free_slots
            && (!self.host_active
                || active_hosts.map_or(false, |hosts| hosts.contains(&room.host_id)))
            && self.filter.matches(&room.settings)
    }

    /// Sort key: position in the preferred region order, then id
    pub fn sort_key(&self, region_id: RegionId, room_id: RoomId) -> (usize, RoomId) {
        let position = self
            .regions_order
            .as_ref()
            .and_then(|order| order.iter().position(|r| *r == region_id))
            .unwrap_or(usize::MAX);
        (position, room_id)
    }
}
