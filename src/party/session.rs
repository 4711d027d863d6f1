//! A member's (or observer's) live connection to one party
//!
//! The session owns a broker subscription. Call `release` when done with
//! it: a joined member leaves the party and the subscription is torn down.

use crate::error::{classify, ApiResult, MatchmakingError};
use crate::party::broker::Subscription;
use crate::party::messages::{MessageType, PartyMessage, Recipient};
use crate::party::orchestrator::{PartyOrchestrator, PartyStart};
use crate::room::Caller;
use crate::types::{roles, Party, PartyId};
use serde_json::Value;
use tracing::{debug, warn};

pub struct PartySession {
    parties: PartyOrchestrator,
    party: Party,
    caller: Caller,
    role: i32,
    /// Member profile, present while joined
    profile: Option<Value>,
    subscription: Option<Subscription>,
    released: bool,
}

impl PartySession {
    pub(crate) fn new(
        parties: PartyOrchestrator,
        party: Party,
        caller: &Caller,
        role: i32,
        subscription: Subscription,
    ) -> Self {
        Self {
            parties,
            party,
            caller: caller.clone(),
            role,
            profile: None,
            subscription: Some(subscription),
            released: false,
        }
    }

    pub(crate) fn mark_joined(&mut self, profile: Value) {
        self.profile = Some(profile);
    }

    /// Party record as of the last change made through this session
    pub fn party(&self) -> &Party {
        &self.party
    }

    pub fn party_id(&self) -> PartyId {
        self.party.id
    }

    pub fn account_id(&self) -> &str {
        &self.caller.account_id
    }

    pub fn role(&self) -> i32 {
        self.role
    }

    pub fn is_joined(&self) -> bool {
        self.profile.is_some()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub async fn join(&mut self, profile: Value) -> ApiResult<Party> {
        self.ensure_active()?;
        if self.is_joined() {
            return Err(MatchmakingError::AlreadyJoined);
        }

        let party = self
            .parties
            .join_member(self.party.id, &self.caller, &profile, self.role)
            .await
            .map_err(classify)?;
        self.party = party.clone();
        self.profile = Some(profile);
        Ok(party)
    }

    pub async fn leave(&mut self) -> ApiResult<()> {
        self.ensure_active()?;
        let Some(profile) = self.profile.clone() else {
            return Err(MatchmakingError::NotJoined);
        };

        self.parties
            .remove_member(&self.party, &self.caller.account_id, &profile)
            .await
            .map_err(classify)?;
        self.profile = None;
        Ok(())
    }

    pub async fn start_game(&mut self, payload: Value) -> ApiResult<PartyStart> {
        self.ensure_active()?;
        if self.role < roles::PERMISSION_START {
            return Err(MatchmakingError::PermissionDenied {
                action: "start a game".to_string(),
            });
        }

        self.parties
            .start(self.party.id, &self.caller.account_id, payload)
            .await
            .map_err(classify)
    }

    pub async fn close(&mut self, message: Value) -> ApiResult<Option<Value>> {
        self.ensure_active()?;
        if self.role < roles::PERMISSION_CLOSE {
            return Err(MatchmakingError::PermissionDenied {
                action: "close party".to_string(),
            });
        }

        self.parties
            .close_party(&self.party.gamespace, self.party.id, message)
            .await
    }

    /// Send a custom message to every member, or to one of them
    pub async fn send_message(&self, payload: Value, to: Option<&str>) -> ApiResult<()> {
        self.ensure_active()?;
        let recipient = match to {
            Some(account_id) => Recipient::Member(account_id.to_string()),
            None => Recipient::All,
        };
        self.parties
            .send(
                &self.party,
                recipient,
                PartyMessage::new(MessageType::Custom, payload),
            )
            .await
            .map_err(classify)
    }

    /// Next message for this session
    ///
    /// Start progress is skipped unless joined. After `game_started` or
    /// `party_closed` the session is released and this returns None.
    pub async fn recv(&mut self) -> Option<PartyMessage> {
        loop {
            let subscription = self.subscription.as_mut()?;
            let message = subscription.recv().await?;

            if message.message_type.members_only() && !self.is_joined() {
                continue;
            }
            if message.message_type.ends_session() {
                debug!(
                    "Party session finished - party_id: {}, account_id: '{}', reason: {}",
                    self.party.id, self.caller.account_id, message.message_type
                );
                self.profile = None;
                self.finish().await;
            }
            return Some(message);
        }
    }

    /// Leave the party if joined and stop listening
    pub async fn release(&mut self) -> ApiResult<()> {
        if self.released {
            return Ok(());
        }

        if let Some(profile) = self.profile.take() {
            if let Err(e) = self
                .parties
                .remove_member(&self.party, &self.caller.account_id, &profile)
                .await
            {
                warn!(
                    "Failed to leave party on release - party_id: {}, account_id: '{}', error: {}",
                    self.party.id, self.caller.account_id, e
                );
            }
        }

        self.finish().await;
        Ok(())
    }

    async fn finish(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            if let Err(e) = self.parties.broker().unsubscribe(subscription.id()).await {
                warn!(
                    "Failed to tear down party subscription - party_id: {}, error: {}",
                    self.party.id, e
                );
            }
        }
        self.released = true;
    }

    fn ensure_active(&self) -> ApiResult<()> {
        if self.released {
            return Err(MatchmakingError::PartyReleased);
        }
        Ok(())
    }
}

impl std::fmt::Debug for PartySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartySession")
            .field("party_id", &self.party.id)
            .field("account_id", &self.caller.account_id)
            .field("role", &self.role)
            .field("joined", &self.is_joined())
            .field("released", &self.released)
            .finish()
    }
}
