//! Common types used throughout the game master

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Account identifier of a player
pub type AccountId = String;

/// Tenant key every room and party belongs to
pub type Gamespace = String;

pub type RegionId = u64;
pub type HostId = u64;
pub type RoomId = u64;
pub type SlotId = u64;
pub type PartyId = u64;
pub type DeploymentId = u64;
pub type GameServerId = u64;

/// Opaque, filterable key/value document attached to rooms and parties
pub type Settings = serde_json::Map<String, Value>;

/// Geographic coordinates in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A geographic grouping of hosts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub name: String,
    pub location: GeoPoint,
    pub default: bool,
    #[serde(default)]
    pub settings: Value,
}

/// Health state of a host as seen by the heartbeat subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostState {
    Active,
    Overload,
    Error,
}

impl std::fmt::Display for HostState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostState::Active => write!(f, "ACTIVE"),
            HostState::Overload => write!(f, "OVERLOAD"),
            HostState::Error => write!(f, "ERROR"),
        }
    }
}

/// A fleet machine running a host controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    pub name: String,
    /// Address of the host controller, used as its RPC routing key
    pub address: String,
    pub region_id: RegionId,
    pub enabled: bool,
    pub memory: u32,
    pub cpu: u32,
    /// max(memory, cpu) / 100
    pub load: f64,
    pub state: HostState,
    pub heartbeat: Option<DateTime<Utc>>,
}

impl Host {
    pub fn new(id: HostId, name: &str, address: &str, region_id: RegionId) -> Self {
        Self {
            id,
            name: name.to_string(),
            address: address.to_string(),
            region_id,
            enabled: true,
            memory: 0,
            cpu: 0,
            load: 0.0,
            state: HostState::Active,
            heartbeat: None,
        }
    }

    /// Whether rooms on this host may still accept players
    pub fn accepts_players(&self) -> bool {
        matches!(self.state, HostState::Active | HostState::Overload)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Uploading,
    Uploaded,
    Delivering,
    Delivered,
    Error,
}

/// An uploaded build of a game version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,
    pub game_name: String,
    pub game_version: String,
    pub hash: String,
    pub status: DeploymentStatus,
}

/// The deployment a game version currently spawns with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentDeployment {
    pub deployment_id: DeploymentId,
    pub enabled: bool,
}

/// Game-server configuration a room is spawned from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameServerConfig {
    pub id: GameServerId,
    pub name: String,
    pub game_name: String,
    pub max_players: u32,
    #[serde(default)]
    pub game_settings: Value,
    /// Default server settings used when a version has no override
    pub server_settings: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomState {
    None,
    Spawned,
}

/// Network location of a spawned game server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub host: String,
    pub ports: Vec<u16>,
}

/// A game-server session on one host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub gamespace: Gamespace,
    pub game_name: String,
    pub game_version: String,
    pub game_server_id: GameServerId,
    pub region_id: RegionId,
    pub host_id: HostId,
    pub deployment_id: DeploymentId,
    pub players: u32,
    pub max_players: u32,
    pub settings: Settings,
    pub location: Option<Location>,
    pub state: RoomState,
}

impl Room {
    pub fn free_slots(&self) -> u32 {
        self.max_players.saturating_sub(self.players)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotState {
    Reserved,
    Joined,
}

/// Player-in-room record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
    pub room_id: RoomId,
    pub host_id: HostId,
    pub gamespace: Gamespace,
    pub account_id: AccountId,
    pub key: String,
    pub credential: String,
    pub state: SlotState,
    /// Extra data handed to the game server on approval (party membership)
    #[serde(default)]
    pub info: Value,
}

/// One member of a bulk reservation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotRequest {
    pub account_id: AccountId,
    pub credential: String,
    #[serde(default)]
    pub info: Value,
}

impl SlotRequest {
    pub fn new(account_id: &str, credential: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            credential: credential.to_string(),
            info: Value::Null,
        }
    }
}

/// A freshly reserved slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub account_id: AccountId,
    pub slot_id: SlotId,
    pub key: String,
}

/// What a caller needs to connect to a room it was placed into
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomTicket {
    pub room_id: RoomId,
    pub slot_id: SlotId,
    pub key: String,
    pub location: Option<Location>,
    pub settings: Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyStatus {
    Created,
    Starting,
}

/// Behaviour switches of a party
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyFlags {
    /// Start the game as soon as the party fills up
    pub auto_start: bool,
    /// Delete the party when the last member leaves
    pub auto_close: bool,
}

impl PartyFlags {
    /// Parse a comma separated flag list such as `auto_start,auto_close`
    pub fn parse(flags: &str) -> Self {
        let mut parsed = Self::default();
        for flag in flags.split(',').map(|f| f.trim().to_lowercase()) {
            match flag.as_str() {
                "auto_start" => parsed.auto_start = true,
                "auto_close" => parsed.auto_close = true,
                _ => {}
            }
        }
        parsed
    }

    pub fn dump(&self) -> String {
        let mut flags = Vec::new();
        if self.auto_start {
            flags.push("auto_start");
        }
        if self.auto_close {
            flags.push("auto_close");
        }
        flags.join(",")
    }
}

/// Member roles and the permissions they unlock
pub mod roles {
    pub const USER: i32 = 0;
    pub const ADMIN: i32 = 1000;

    pub const PERMISSION_START: i32 = 500;
    pub const PERMISSION_CLOSE: i32 = 1000;
}

/// A group of players that is matched or spawned together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    pub id: PartyId,
    pub gamespace: Gamespace,
    pub game_name: String,
    pub game_version: String,
    pub game_server_id: GameServerId,
    pub region_id: RegionId,
    pub num_members: u32,
    pub max_members: u32,
    pub settings: Settings,
    pub room_settings: Settings,
    /// When absent, starting always spawns a fresh room
    pub room_filters: Option<Value>,
    pub flags: PartyFlags,
    pub close_callback: Option<String>,
    pub status: PartyStatus,
}

impl Party {
    /// Public view of the party as handed to members and close callbacks
    pub fn dump(&self) -> Value {
        serde_json::json!({
            "id": self.id.to_string(),
            "num_members": self.num_members,
            "max_members": self.max_members,
            "settings": self.settings,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyMember {
    pub account_id: AccountId,
    pub role: i32,
    pub profile: Value,
    pub credential: String,
}

impl PartyMember {
    pub fn dump(&self) -> Value {
        serde_json::json!({
            "account": self.account_id,
            "role": self.role,
            "profile": self.profile,
        })
    }
}

/// An active ban as surfaced to a rejected caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanInfo {
    pub ban_id: u64,
    pub account_id: AccountId,
    pub ip: Option<String>,
    pub expires: DateTime<Utc>,
    pub reason: String,
}
