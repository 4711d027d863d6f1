//! Party orchestrator
//!
//! Parties are CREATED while they accept members, STARTING while a room is
//! being found or spawned for the whole membership, and deleted once the
//! game started or the party was closed. A failed start is the only way back
//! from STARTING to CREATED.

use crate::error::{classify, status_of, ApiResult, MatchmakingError, Result};
use crate::metrics::MetricsCollector;
use crate::party::broker::PartyBroker;
use crate::party::callback::{notify_close, CloseReason, PartyCloseCallback};
use crate::party::messages::{MessageType, PartyMessage, Recipient};
use crate::party::outcomes::{StartOutcome, StartOutcomes};
use crate::party::session::PartySession;
use crate::placement::PlacementHint;
use crate::room::{Caller, PlacedRoom, RoomOrchestrator, RoomRequest};
use crate::store::{MemberRemoval, NewParty, PartyQuery, PartyStore, SettingsFilter};
use crate::types::{
    roles, AccountId, Party, PartyFlags, PartyId, PartyMember, RegionId, RoomId, Settings,
    SlotRequest,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Everything needed to create a party
#[derive(Debug, Clone)]
pub struct PartyParams {
    pub gamespace: String,
    pub game_name: String,
    pub game_version: String,
    pub game_server_name: String,
    pub region_id: RegionId,
    pub max_members: u32,
    pub settings: Settings,
    pub room_settings: Settings,
    /// Search existing rooms with this filter before spawning one
    pub room_filters: Option<Value>,
    pub flags: PartyFlags,
    pub close_callback: Option<String>,
}

impl PartyParams {
    pub fn new(
        gamespace: &str,
        game_name: &str,
        game_version: &str,
        server_name: &str,
        region_id: RegionId,
        max_members: u32,
    ) -> Self {
        Self {
            gamespace: gamespace.to_string(),
            game_name: game_name.to_string(),
            game_version: game_version.to_string(),
            game_server_name: server_name.to_string(),
            region_id,
            max_members,
            settings: Settings::new(),
            room_settings: Settings::new(),
            room_filters: None,
            flags: PartyFlags::default(),
            close_callback: None,
        }
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn room_settings(mut self, room_settings: Settings) -> Self {
        self.room_settings = room_settings;
        self
    }

    pub fn room_filters(mut self, room_filters: Value) -> Self {
        self.room_filters = Some(room_filters);
        self
    }

    pub fn flags(mut self, flags: PartyFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn close_callback(mut self, callback: &str) -> Self {
        self.close_callback = Some(callback.to_string());
        self
    }
}

/// A party that made it into a room
#[derive(Debug, Clone)]
pub struct PartyStart {
    pub room_id: RoomId,
    pub outcomes: HashMap<AccountId, StartOutcome>,
    /// What the close callback returned, if one ran
    pub callback_result: Option<Value>,
}

fn is_party_not_found(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<MatchmakingError>(),
        Some(MatchmakingError::PartyNotFound { .. })
    )
}

fn member_payload(account_id: &str, profile: &Value) -> Value {
    json!({
        "account": account_id,
        "profile": profile,
    })
}

#[derive(Clone)]
pub struct PartyOrchestrator {
    store: Arc<dyn PartyStore>,
    rooms: RoomOrchestrator,
    broker: Arc<dyn PartyBroker>,
    callbacks: Arc<dyn PartyCloseCallback>,
    outcomes: Arc<StartOutcomes>,
    metrics: Arc<MetricsCollector>,
}

impl PartyOrchestrator {
    pub fn new(
        store: Arc<dyn PartyStore>,
        rooms: RoomOrchestrator,
        broker: Arc<dyn PartyBroker>,
        callbacks: Arc<dyn PartyCloseCallback>,
        outcomes: Arc<StartOutcomes>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            store,
            rooms,
            broker,
            callbacks,
            outcomes,
            metrics,
        }
    }

    pub fn store(&self) -> Arc<dyn PartyStore> {
        self.store.clone()
    }

    pub(crate) fn broker(&self) -> Arc<dyn PartyBroker> {
        self.broker.clone()
    }

    /// Create a party and open a session for its creator
    ///
    /// The creator is an admin of the party; with `auto_join` it is also
    /// its first member.
    pub async fn create_party(
        &self,
        params: &PartyParams,
        caller: &Caller,
        profile: Value,
        auto_join: bool,
    ) -> ApiResult<PartySession> {
        self.create_with_session(params, caller, profile, auto_join)
            .await
            .map_err(classify)
    }

    /// Create a party nobody has joined yet
    pub async fn create_empty_party(&self, params: &PartyParams) -> ApiResult<Party> {
        self.insert_party(params, None).await.map_err(classify)
    }

    /// Join the first open party matching `filter`, creating one when allowed
    pub async fn join_party(
        &self,
        params: &PartyParams,
        filter: SettingsFilter,
        caller: &Caller,
        profile: Value,
        auto_create: bool,
    ) -> ApiResult<PartySession> {
        self.find_or_create_party(params, filter, caller, profile, auto_create)
            .await
            .map_err(classify)
    }

    /// Open a session on a known party
    ///
    /// An existing member picks up its membership and role. Otherwise the
    /// caller joins when `auto_join` is set, or just observes.
    pub async fn party_session(
        &self,
        gamespace: &str,
        party_id: PartyId,
        caller: &Caller,
        profile: Value,
        auto_join: bool,
    ) -> ApiResult<PartySession> {
        let result: Result<PartySession> = async {
            let party = self.fetch_party(gamespace, party_id).await?;
            let existing = self.store.get_member(party_id, &caller.account_id).await?;
            let role = existing.as_ref().map_or(roles::USER, |m| m.role);

            let mut session = self.open_session(party, caller, role).await?;
            if let Some(member) = existing {
                session.mark_joined(member.profile);
            } else if auto_join {
                if let Err(e) = session.join(profile).await {
                    session.release().await.ok();
                    return Err(e.into());
                }
            }
            Ok(session)
        }
        .await;
        result.map_err(classify)
    }

    /// Close a party on behalf of an admin
    pub async fn close_party(
        &self,
        gamespace: &str,
        party_id: PartyId,
        message: Value,
    ) -> ApiResult<Option<Value>> {
        let result: Result<Option<Value>> = async {
            let party = self.fetch_party(gamespace, party_id).await?;
            if party.num_members > 0 {
                self.publish(
                    &party,
                    Recipient::All,
                    PartyMessage::new(MessageType::PartyClosed, message.clone()),
                )
                .await;
            }

            let Some((party, members)) = self.store.delete_party(party_id).await? else {
                return Err(MatchmakingError::PartyNotFound { party_id }.into());
            };
            self.metrics.record_party_closed(CloseReason::Close.as_str());
            info!(
                "Party closed - party_id: {}, members: {}",
                party_id,
                members.len()
            );

            Ok(notify_close(&*self.callbacks, &party, Some(message), CloseReason::Close).await)
        }
        .await;
        result.map_err(classify)
    }

    /// Start a party's game
    pub async fn start_party(
        &self,
        gamespace: &str,
        party_id: PartyId,
        initiator: &str,
        payload: Value,
    ) -> ApiResult<PartyStart> {
        let result: Result<PartyStart> = async {
            self.fetch_party(gamespace, party_id).await?;
            self.start(party_id, initiator, payload).await
        }
        .await;
        result.map_err(classify)
    }

    pub async fn get_party(&self, gamespace: &str, party_id: PartyId) -> ApiResult<Party> {
        self.fetch_party(gamespace, party_id).await.map_err(classify)
    }

    pub async fn list_party_members(
        &self,
        gamespace: &str,
        party_id: PartyId,
    ) -> ApiResult<Vec<PartyMember>> {
        let result: Result<Vec<PartyMember>> = async {
            self.fetch_party(gamespace, party_id).await?;
            self.store.list_members(party_id).await
        }
        .await;
        result.map_err(classify)
    }

    /// A member's slot in the room its party started into
    pub fn get_start_outcome(&self, party_id: PartyId, account_id: &str) -> ApiResult<StartOutcome> {
        self.outcomes
            .get(party_id, account_id)
            .ok_or(MatchmakingError::PartyNotFound { party_id })
    }

    /// Add a member, then auto-start if the join filled the party
    pub(crate) async fn join_member(
        &self,
        party_id: PartyId,
        caller: &Caller,
        profile: &Value,
        role: i32,
    ) -> Result<Party> {
        let party = self
            .store
            .join(party_id, Self::member(caller, profile, role))
            .await?;
        self.after_join(&party, &caller.account_id, profile).await;
        Ok(party)
    }

    pub(crate) async fn remove_member(
        &self,
        party: &Party,
        account_id: &str,
        profile: &Value,
    ) -> Result<()> {
        match self.store.remove_member(party.id, account_id).await? {
            MemberRemoval::Remaining(party) => {
                self.publish(
                    &party,
                    Recipient::All,
                    PartyMessage::new(MessageType::PlayerLeft, member_payload(account_id, profile)),
                )
                .await;
                debug!(
                    "Member left party - party_id: {}, account_id: '{}', members: {}/{}",
                    party.id, account_id, party.num_members, party.max_members
                );
            }
            MemberRemoval::Closed(party) => {
                self.metrics.record_party_closed(CloseReason::Leave.as_str());
                info!(
                    "Last member left, party closed - party_id: {}, account_id: '{}'",
                    party.id, account_id
                );
                notify_close(&*self.callbacks, &party, None, CloseReason::Leave).await;
            }
        }
        Ok(())
    }

    /// Publish a message, surfacing broker failures
    pub(crate) async fn send(
        &self,
        party: &Party,
        recipient: Recipient,
        message: PartyMessage,
    ) -> Result<()> {
        self.metrics
            .record_party_message(message.message_type.as_str());
        self.broker
            .publish(&party.gamespace, party.id, &recipient, &message)
            .await
    }

    /// CREATED -> STARTING -> deleted, or back to CREATED on failure
    pub(crate) async fn start(
        &self,
        party_id: PartyId,
        initiator: &str,
        payload: Value,
    ) -> Result<PartyStart> {
        let (party, members) = self.store.begin_start(party_id).await?;
        info!(
            "Party starting - party_id: {}, members: {}, initiator: '{}'",
            party_id,
            members.len(),
            initiator
        );
        self.publish(
            &party,
            Recipient::All,
            PartyMessage::new(MessageType::GameStarting, payload.clone()),
        )
        .await;

        let timer = self.metrics.start_timer();
        let placed = match self.place_party(&party, &members, initiator).await {
            Ok(placed) => placed,
            Err(e) => {
                let code = status_of(&e);
                warn!(
                    "Party start failed - party_id: {}, code: {}, error: {}",
                    party_id, code, e
                );
                if let Err(rollback) = self.store.rollback_start(party_id).await {
                    error!(
                        "Failed to roll party back to created - party_id: {}, error: {}",
                        party_id, rollback
                    );
                }
                self.publish(
                    &party,
                    Recipient::All,
                    PartyMessage::new(
                        MessageType::GameStartFailed,
                        json!({"code": code, "reason": e.to_string()}),
                    ),
                )
                .await;
                self.metrics.record_party_start_failed();
                return Err(e);
            }
        };
        self.metrics.record_operation("party_start", timer.stop());

        let outcomes: HashMap<AccountId, StartOutcome> = placed
            .reservations
            .iter()
            .map(|reservation| {
                (
                    reservation.account_id.clone(),
                    StartOutcome {
                        room_id: placed.room.id,
                        slot_id: reservation.slot_id,
                        key: reservation.key.clone(),
                        location: placed.room.location.clone(),
                        settings: placed.room.settings.clone(),
                    },
                )
            })
            .collect();
        self.outcomes.record(party_id, outcomes.clone());

        for (account_id, outcome) in &outcomes {
            self.publish(
                &party,
                Recipient::Member(account_id.clone()),
                PartyMessage::new(MessageType::GameStarted, outcome.payload()),
            )
            .await;
        }

        let callback_result = match self.store.delete_party(party_id).await {
            Ok(Some((deleted, _))) => {
                notify_close(
                    &*self.callbacks,
                    &deleted,
                    Some(payload),
                    CloseReason::GameStarted,
                )
                .await
            }
            Ok(None) => None,
            Err(e) => {
                warn!(
                    "Failed to delete started party - party_id: {}, error: {}",
                    party_id, e
                );
                None
            }
        };

        self.metrics.record_party_started();
        self.metrics
            .record_party_closed(CloseReason::GameStarted.as_str());
        info!(
            "Party started - party_id: {}, room_id: {}, created: {}",
            party_id, placed.room.id, placed.created
        );

        Ok(PartyStart {
            room_id: placed.room.id,
            outcomes,
            callback_result,
        })
    }

    async fn create_with_session(
        &self,
        params: &PartyParams,
        caller: &Caller,
        profile: Value,
        auto_join: bool,
    ) -> Result<PartySession> {
        let creator = auto_join.then(|| Self::member(caller, &profile, roles::ADMIN));
        let party = self.insert_party(params, creator).await?;

        let mut session = self.open_session(party.clone(), caller, roles::ADMIN).await?;
        if auto_join {
            self.publish(
                &party,
                Recipient::All,
                PartyMessage::new(
                    MessageType::PlayerJoined,
                    member_payload(&caller.account_id, &profile),
                ),
            )
            .await;
            session.mark_joined(profile);
        }
        Ok(session)
    }

    async fn find_or_create_party(
        &self,
        params: &PartyParams,
        filter: SettingsFilter,
        caller: &Caller,
        profile: Value,
        auto_create: bool,
    ) -> Result<PartySession> {
        Self::validate_size(params.max_members)?;
        let server = self
            .rooms
            .gates()
            .game_servers
            .find_game_server(&params.gamespace, &params.game_name, &params.game_server_name)
            .await?;

        let query = PartyQuery {
            gamespace: params.gamespace.clone(),
            game_name: params.game_name.clone(),
            game_version: params.game_version.clone(),
            game_server_id: server.id,
            region_id: Some(params.region_id),
            filter,
        };

        match self
            .store
            .find_and_join(&query, Self::member(caller, &profile, roles::USER))
            .await
        {
            Ok(party) => {
                let mut session = self.open_session(party.clone(), caller, roles::USER).await?;
                session.mark_joined(profile.clone());
                self.after_join(&party, &caller.account_id, &profile).await;
                Ok(session)
            }
            Err(e) if is_party_not_found(&e) && auto_create => {
                debug!(
                    "No matching party, creating one - game: '{}', account_id: '{}'",
                    params.game_name, caller.account_id
                );
                self.create_with_session(params, caller, profile, true)
                    .await
            }
            Err(e) => Err(e),
        }
    }

    async fn insert_party(&self, params: &PartyParams, creator: Option<PartyMember>) -> Result<Party> {
        Self::validate_size(params.max_members)?;
        let server = self
            .rooms
            .gates()
            .game_servers
            .find_game_server(&params.gamespace, &params.game_name, &params.game_server_name)
            .await?;

        let party = self
            .store
            .create_party(
                NewParty {
                    gamespace: params.gamespace.clone(),
                    game_name: params.game_name.clone(),
                    game_version: params.game_version.clone(),
                    game_server_id: server.id,
                    region_id: params.region_id,
                    max_members: params.max_members,
                    settings: params.settings.clone(),
                    room_settings: params.room_settings.clone(),
                    room_filters: params.room_filters.clone(),
                    flags: params.flags,
                    close_callback: params.close_callback.clone(),
                },
                creator,
            )
            .await?;

        self.metrics.record_party_created();
        info!(
            "Party created - party_id: {}, game: '{}', members: {}/{}",
            party.id, party.game_name, party.num_members, party.max_members
        );
        Ok(party)
    }

    async fn after_join(&self, party: &Party, account_id: &str, profile: &Value) {
        self.publish(
            party,
            Recipient::All,
            PartyMessage::new(MessageType::PlayerJoined, member_payload(account_id, profile)),
        )
        .await;

        if party.flags.auto_start && party.num_members >= party.max_members {
            info!("Party is full, starting automatically - party_id: {}", party.id);
            if let Err(e) = self
                .start(party.id, account_id, json!({"auto_start": true}))
                .await
            {
                warn!(
                    "Automatic start failed - party_id: {}, error: {}",
                    party.id, e
                );
            }
        }
    }

    async fn place_party(
        &self,
        party: &Party,
        members: &[PartyMember],
        initiator: &str,
    ) -> Result<PlacedRoom> {
        if members.is_empty() {
            return Err(MatchmakingError::InvalidRequest {
                reason: "Party has no members".to_string(),
            }
            .into());
        }

        let server = self
            .rooms
            .gates()
            .game_servers
            .get_game_server(&party.gamespace, &party.game_name, party.game_server_id)
            .await?;

        let roster: serde_json::Map<String, Value> = members
            .iter()
            .map(|m| {
                (
                    m.account_id.clone(),
                    json!({"profile": m.profile, "role": m.role}),
                )
            })
            .collect();

        let mut request = RoomRequest::new(
            &party.gamespace,
            &party.game_name,
            &party.game_version,
            &server.name,
        )
        .placement(PlacementHint::Region(party.region_id))
        .settings(party.room_settings.clone())
        .other(json!({
            "party_id": party.id.to_string(),
            "party_settings": party.settings,
            "party_members": roster,
        }));

        let slots: Vec<SlotRequest> = members
            .iter()
            .map(|m| SlotRequest {
                account_id: m.account_id.clone(),
                credential: m.credential.clone(),
                info: json!({
                    "party_id": party.id.to_string(),
                    "party_profile": m.profile,
                    "party_role": m.role,
                }),
            })
            .collect();

        let initiator = members
            .iter()
            .find(|m| m.account_id == initiator)
            .map(|m| Caller::new(&m.account_id, &m.credential))
            .unwrap_or_else(|| Caller::new(initiator, ""));

        let placed = match &party.room_filters {
            None => self.rooms.create_multi(&request, &initiator, &slots).await?,
            Some(filters) => {
                request = request.filter(SettingsFilter::parse(filters)?);
                self.rooms
                    .find_or_create_multi(&request, &initiator, &slots, true)
                    .await?
            }
        };
        Ok(placed)
    }

    async fn open_session(&self, party: Party, caller: &Caller, role: i32) -> Result<PartySession> {
        let subscription = self
            .broker
            .subscribe(&party.gamespace, party.id, &caller.account_id)
            .await?;
        Ok(PartySession::new(self.clone(), party, caller, role, subscription))
    }

    async fn fetch_party(&self, gamespace: &str, party_id: PartyId) -> Result<Party> {
        let party = self.store.get_party(party_id).await?;
        if party.gamespace != gamespace {
            return Err(MatchmakingError::PartyNotFound { party_id }.into());
        }
        Ok(party)
    }

    async fn publish(&self, party: &Party, recipient: Recipient, message: PartyMessage) {
        let message_type = message.message_type;
        if let Err(e) = self.send(party, recipient, message).await {
            warn!(
                "Failed to publish party message - party_id: {}, type: {}, error: {}",
                party.id, message_type, e
            );
        }
    }

    fn member(caller: &Caller, profile: &Value, role: i32) -> PartyMember {
        PartyMember {
            account_id: caller.account_id.clone(),
            role,
            profile: profile.clone(),
            credential: caller.credential.clone(),
        }
    }

    fn validate_size(max_members: u32) -> Result<()> {
        if max_members < 2 {
            return Err(MatchmakingError::InvalidRequest {
                reason: "max_members cannot be less than 2".to_string(),
            }
            .into());
        }
        Ok(())
    }
}
