//! Capacity store: rooms, slots, parties and the query engine over them

pub mod filter;
pub mod parties;
pub mod query;
pub mod rooms;

pub use filter::{CompareOp, Predicate, SettingsFilter};
pub use parties::{
    InMemoryPartyStore, MemberRemoval, NewParty, PartyQuery, PartyStore, PartyStoreStats,
};
pub use query::RoomQuery;
pub use rooms::{InMemoryRoomStore, NewRoom, RoomStore, RoomStoreStats};
