//! Party broker messages
//!
//! Every message is a JSON object `{"mt": <type>, "p": <payload>}` published
//! to the party's topic exchange, either to one member's routing key or to
//! the broadcast key every member is bound to.

use crate::error::{MatchmakingError, Result};
use crate::types::{AccountId, PartyId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    PlayerJoined,
    PlayerLeft,
    GameStarting,
    GameStartFailed,
    GameStarted,
    Custom,
    PartyClosed,
    #[serde(other)]
    Unknown,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::PlayerJoined => "player_joined",
            MessageType::PlayerLeft => "player_left",
            MessageType::GameStarting => "game_starting",
            MessageType::GameStartFailed => "game_start_failed",
            MessageType::GameStarted => "game_started",
            MessageType::Custom => "custom",
            MessageType::PartyClosed => "party_closed",
            MessageType::Unknown => "unknown",
        }
    }

    /// Only members see start progress; observers skip these
    pub fn members_only(&self) -> bool {
        matches!(self, MessageType::GameStarting | MessageType::GameStartFailed)
    }

    /// After these the party no longer exists
    pub fn ends_session(&self) -> bool {
        matches!(self, MessageType::GameStarted | MessageType::PartyClosed)
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyMessage {
    #[serde(rename = "mt")]
    pub message_type: MessageType,
    #[serde(rename = "p", default)]
    pub payload: Value,
}

impl PartyMessage {
    pub fn new(message_type: MessageType, payload: Value) -> Self {
        Self {
            message_type,
            payload,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to serialize party message: {}", e),
            }
            .into()
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            MatchmakingError::InvalidRequest {
                reason: format!("Failed to deserialize party message: {}", e),
            }
            .into()
        })
    }
}

/// Who a message is routed to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Recipient {
    All,
    Member(AccountId),
}

impl Recipient {
    pub fn routing_key(&self, gamespace: &str) -> String {
        match self {
            Recipient::All => broadcast_routing_key(gamespace),
            Recipient::Member(account_id) => member_routing_key(gamespace, account_id),
        }
    }
}

pub fn exchange_name(gamespace: &str, party_id: PartyId) -> String {
    format!("party.{}.{}", gamespace, party_id)
}

pub fn member_routing_key(gamespace: &str, account_id: &str) -> String {
    format!("user.{}.{}", gamespace, account_id)
}

pub fn broadcast_routing_key(gamespace: &str) -> String {
    format!("all.{}", gamespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format() {
        let message = PartyMessage::new(MessageType::GameStartFailed, json!({"code": 503}));
        let encoded: Value = serde_json::from_slice(&message.to_bytes().unwrap()).unwrap();
        assert_eq!(encoded, json!({"mt": "game_start_failed", "p": {"code": 503}}));
    }

    #[test]
    fn test_unknown_type_and_missing_payload() {
        let message = PartyMessage::from_bytes(br#"{"mt": "emote"}"#).unwrap();
        assert_eq!(message.message_type, MessageType::Unknown);
        assert_eq!(message.payload, Value::Null);

        assert!(PartyMessage::from_bytes(b"not json").is_err());
    }

    #[test]
    fn test_routing() {
        assert_eq!(exchange_name("gs", 12), "party.gs.12");
        assert_eq!(Recipient::All.routing_key("gs"), "all.gs");
        assert_eq!(
            Recipient::Member("42".to_string()).routing_key("gs"),
            "user.gs.42"
        );
    }
}
