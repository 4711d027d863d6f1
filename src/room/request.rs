//! Room request and result types

use crate::placement::PlacementHint;
use crate::store::SettingsFilter;
use crate::types::{Reservation, Room, RoomTicket, Settings, SlotRequest};
use serde_json::Value;

/// The player a request is made on behalf of
#[derive(Debug, Clone)]
pub struct Caller {
    pub account_id: String,
    pub credential: String,
    pub ip: Option<String>,
    /// Handed to the game server when the player's join is approved
    pub info: Value,
}

impl Caller {
    pub fn new(account_id: &str, credential: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            credential: credential.to_string(),
            ip: None,
            info: Value::Null,
        }
    }

    pub fn with_ip(mut self, ip: &str) -> Self {
        self.ip = Some(ip.to_string());
        self
    }

    pub fn slot_request(&self) -> SlotRequest {
        SlotRequest {
            account_id: self.account_id.clone(),
            credential: self.credential.clone(),
            info: self.info.clone(),
        }
    }
}

/// What kind of room is wanted and where
#[derive(Debug, Clone)]
pub struct RoomRequest {
    pub gamespace: String,
    pub game_name: String,
    pub game_version: String,
    pub game_server_name: String,
    pub placement: PlacementHint,
    /// Only search the closest region
    pub lock_region: bool,
    /// Conditions an existing room's settings must meet
    pub filter: SettingsFilter,
    /// Settings of a newly created room
    pub settings: Settings,
    /// Extra settings passed to a spawned game server
    pub other: Option<Value>,
}

impl RoomRequest {
    pub fn new(gamespace: &str, game_name: &str, game_version: &str, server_name: &str) -> Self {
        Self {
            gamespace: gamespace.to_string(),
            game_name: game_name.to_string(),
            game_version: game_version.to_string(),
            game_server_name: server_name.to_string(),
            placement: PlacementHint::Default,
            lock_region: false,
            filter: SettingsFilter::default(),
            settings: Settings::new(),
            other: None,
        }
    }

    pub fn placement(mut self, placement: PlacementHint) -> Self {
        self.placement = placement;
        self
    }

    pub fn lock_region(mut self, lock_region: bool) -> Self {
        self.lock_region = lock_region;
        self
    }

    pub fn filter(mut self, filter: SettingsFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn other(mut self, other: Value) -> Self {
        self.other = Some(other);
        self
    }
}

/// A room and the slots reserved in it for one request
#[derive(Debug, Clone)]
pub struct PlacedRoom {
    pub room: Room,
    pub reservations: Vec<Reservation>,
    /// Whether the room was spawned for this request
    pub created: bool,
}

impl PlacedRoom {
    pub fn ticket(&self, reservation: &Reservation) -> RoomTicket {
        RoomTicket {
            room_id: self.room.id,
            slot_id: reservation.slot_id,
            key: reservation.key.clone(),
            location: self.room.location.clone(),
            settings: self.room.settings.clone(),
        }
    }

    pub fn ticket_for(&self, account_id: &str) -> Option<RoomTicket> {
        self.reservations
            .iter()
            .find(|r| r.account_id == account_id)
            .map(|r| self.ticket(r))
    }
}
