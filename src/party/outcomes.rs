//! Start outcomes of finished parties
//!
//! `game_started` is delivered best effort. The per-member result of every
//! successful start is also kept here, so a member who missed the message
//! can still fetch its slot after the party row is gone.

use crate::types::{AccountId, Location, PartyId, RoomId, Settings, SlotId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartOutcome {
    pub room_id: RoomId,
    pub slot_id: SlotId,
    pub key: String,
    pub location: Option<Location>,
    pub settings: Settings,
}

impl StartOutcome {
    /// Payload of the member's `game_started` message
    pub fn payload(&self) -> Value {
        json!({
            "id": self.room_id.to_string(),
            "slot": self.slot_id.to_string(),
            "key": self.key,
            "location": self.location,
            "settings": self.settings,
        })
    }
}

#[derive(Debug, Default)]
struct Ledger {
    order: VecDeque<PartyId>,
    entries: HashMap<PartyId, HashMap<AccountId, StartOutcome>>,
}

/// Bounded ledger, the oldest party is evicted first
#[derive(Debug)]
pub struct StartOutcomes {
    retention: usize,
    ledger: Mutex<Ledger>,
}

impl StartOutcomes {
    pub fn new(retention: usize) -> Self {
        Self {
            retention: retention.max(1),
            ledger: Mutex::new(Ledger::default()),
        }
    }

    pub fn record(&self, party_id: PartyId, outcomes: HashMap<AccountId, StartOutcome>) {
        let Ok(mut ledger) = self.ledger.lock() else {
            warn!("Failed to acquire start outcomes lock - party_id: {}", party_id);
            return;
        };

        if ledger.entries.insert(party_id, outcomes).is_none() {
            ledger.order.push_back(party_id);
        }
        while ledger.order.len() > self.retention {
            if let Some(evicted) = ledger.order.pop_front() {
                ledger.entries.remove(&evicted);
            }
        }
    }

    pub fn get(&self, party_id: PartyId, account_id: &str) -> Option<StartOutcome> {
        let ledger = self.ledger.lock().ok()?;
        ledger
            .entries
            .get(&party_id)
            .and_then(|members| members.get(account_id))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.ledger.lock().map(|l| l.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
