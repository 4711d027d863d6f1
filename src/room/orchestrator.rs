//! Room orchestrator
//!
//! Places players into rooms. A request first passes the ban gate, then
//! either reserves slots in an existing room that satisfies the filter or
//! creates a room: deployment gate, rate limit, region and host selection,
//! insert with the slots already counted, spawn on the host, and finally the
//! returned location is stored. Every step after the rate limit that fails
//! undoes what came before it, so a failed creation leaves no room, no slot
//! and no consumed quota behind.

use crate::controller::{HostController, SpawnRequest};
use crate::error::{classify, status_of, ApiResult, MatchmakingError, Result};
use crate::gates::{BanGate, DeploymentGate, GameServerCatalog, RateLimiter, CREATE_ROOM};
use crate::metrics::MetricsCollector;
use crate::placement::PlacementSelector;
use crate::reservation::ReservationManager;
use crate::room::request::{Caller, PlacedRoom, RoomRequest};
use crate::store::{NewRoom, RoomQuery};
use crate::types::{GameServerConfig, Room, RoomId, RoomState, RoomTicket, SlotRequest};
use crate::utils::scalar_settings;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Policy collaborators consulted before a room is joined or created
#[derive(Clone)]
pub struct RoomGates {
    pub deployments: Arc<dyn DeploymentGate>,
    pub game_servers: Arc<dyn GameServerCatalog>,
    pub limiter: Arc<dyn RateLimiter>,
    pub bans: Arc<dyn BanGate>,
}

fn is_room_not_found(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<MatchmakingError>(),
        Some(MatchmakingError::RoomNotFound { .. })
    )
}

#[derive(Clone)]
pub struct RoomOrchestrator {
    selector: PlacementSelector,
    reservations: ReservationManager,
    gates: RoomGates,
    controller: Arc<dyn HostController>,
    metrics: Arc<MetricsCollector>,
    spawn_timeout: Duration,
}

impl RoomOrchestrator {
    pub fn new(
        selector: PlacementSelector,
        reservations: ReservationManager,
        gates: RoomGates,
        controller: Arc<dyn HostController>,
        metrics: Arc<MetricsCollector>,
        spawn_timeout: Duration,
    ) -> Self {
        Self {
            selector,
            reservations,
            gates,
            controller,
            metrics,
            spawn_timeout,
        }
    }

    pub fn reservations(&self) -> &ReservationManager {
        &self.reservations
    }

    pub fn gates(&self) -> &RoomGates {
        &self.gates
    }

    /// Join a matching room, creating one when none matches and `auto_create` is set
    pub async fn find_or_create(
        &self,
        request: &RoomRequest,
        caller: &Caller,
        auto_create: bool,
    ) -> ApiResult<RoomTicket> {
        let placed = self
            .find_or_create_multi(request, caller, &[caller.slot_request()], auto_create)
            .await?;
        Self::ticket_of(&placed, caller)
    }

    /// Create a room for the caller without searching
    pub async fn create(&self, request: &RoomRequest, caller: &Caller) -> ApiResult<RoomTicket> {
        let placed = self
            .create_multi(request, caller, &[caller.slot_request()])
            .await?;
        Self::ticket_of(&placed, caller)
    }

    /// Place a group of players into one room, all of them or none
    pub async fn find_or_create_multi(
        &self,
        request: &RoomRequest,
        initiator: &Caller,
        members: &[SlotRequest],
        auto_create: bool,
    ) -> ApiResult<PlacedRoom> {
        let timer = self.metrics.start_timer();
        let result = self
            .place(request, initiator, members, true, auto_create)
            .await;
        self.metrics.record_operation("find_or_create", timer.stop());
        result.map_err(classify)
    }

    /// Spawn a new room for a group of players
    pub async fn create_multi(
        &self,
        request: &RoomRequest,
        initiator: &Caller,
        members: &[SlotRequest],
    ) -> ApiResult<PlacedRoom> {
        let timer = self.metrics.start_timer();
        let result = self.place(request, initiator, members, false, true).await;
        self.metrics.record_operation("create", timer.stop());
        result.map_err(classify)
    }

    /// Join a specific room by id
    pub async fn join_room(
        &self,
        gamespace: &str,
        room_id: RoomId,
        caller: &Caller,
    ) -> ApiResult<RoomTicket> {
        let result: Result<RoomTicket> = async {
            self.check_bans(gamespace, caller, &[]).await?;

            let room = self.reservations.store().get_room(room_id).await?;
            if room.gamespace != gamespace || room.state != RoomState::Spawned {
                return Err(MatchmakingError::RoomNotFound {
                    room_id: Some(room_id),
                }
                .into());
            }

            let (room, reservations) = self
                .reservations
                .reserve_in_room(room_id, &[caller.slot_request()])
                .await?;
            self.metrics.record_placement(false, reservations.len());
            info!(
                "Player joined room by id - room_id: {}, account_id: '{}'",
                room_id, caller.account_id
            );

            let placed = PlacedRoom {
                room,
                reservations,
                created: false,
            };
            Ok(Self::ticket_of(&placed, caller)?)
        }
        .await;
        result.map_err(classify)
    }

    /// Remove a player's slot, and the room as well when asked to
    pub async fn leave_room(
        &self,
        room_id: RoomId,
        account_id: &str,
        remove_room: bool,
    ) -> ApiResult<bool> {
        let left = self
            .reservations
            .leave(room_id, account_id, remove_room)
            .await
            .map_err(classify)?;
        if remove_room {
            self.metrics.record_room_removed("leave");
        }
        Ok(left)
    }

    pub async fn get_room(&self, room_id: RoomId) -> ApiResult<Room> {
        self.reservations
            .store()
            .get_room(room_id)
            .await
            .map_err(classify)
    }

    pub async fn list_rooms(&self, query: &RoomQuery) -> ApiResult<Vec<Room>> {
        self.reservations
            .store()
            .list_rooms(query)
            .await
            .map_err(classify)
    }

    /// Stop a room's game server and delete the room
    ///
    /// A controller that times out is assumed to have stopped the server.
    pub async fn terminate_room(&self, room_id: RoomId) -> ApiResult<()> {
        let result: Result<()> = async {
            let store = self.reservations.store();
            let room = store.get_room(room_id).await?;
            let host = self.selector.fleet().get_host(room.host_id).await?;

            let terminated = match tokio::time::timeout(
                self.spawn_timeout,
                self.controller.terminate(&host, &room.gamespace, room_id),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(MatchmakingError::ControllerTimeout {
                    action: "terminate".to_string(),
                }
                .into()),
            };

            if let Err(e) = terminated {
                if !matches!(
                    e.downcast_ref::<MatchmakingError>(),
                    Some(MatchmakingError::ControllerTimeout { .. })
                ) {
                    return Err(e);
                }
                warn!(
                    "Terminate timed out, treating room as stopped - room_id: {}, host_id: {}",
                    room_id, host.id
                );
            }

            if store.remove_room(room_id).await? {
                self.metrics.record_room_removed("terminated");
            }
            info!("Room terminated - room_id: {}", room_id);
            Ok(())
        }
        .await;
        result.map_err(classify)
    }

    fn ticket_of(placed: &PlacedRoom, caller: &Caller) -> ApiResult<RoomTicket> {
        placed
            .ticket_for(&caller.account_id)
            .ok_or_else(|| MatchmakingError::InternalError {
                message: format!("No reservation for account '{}'", caller.account_id),
            })
    }

    async fn place(
        &self,
        request: &RoomRequest,
        initiator: &Caller,
        members: &[SlotRequest],
        search: bool,
        auto_create: bool,
    ) -> Result<PlacedRoom> {
        self.check_bans(&request.gamespace, initiator, members)
            .await?;

        let server = self
            .gates
            .game_servers
            .find_game_server(
                &request.gamespace,
                &request.game_name,
                &request.game_server_name,
            )
            .await?;

        if search {
            match self.find_room_for(request, &server, members).await {
                Ok(placed) => return Ok(placed),
                Err(e) if is_room_not_found(&e) && auto_create => {
                    debug!(
                        "No matching room, creating one - game: '{}', version: '{}'",
                        request.game_name, request.game_version
                    );
                }
                Err(e) => return Err(e),
            }
        }

        self.create_room_for(request, &server, initiator, members)
            .await
    }

    async fn check_bans(
        &self,
        gamespace: &str,
        initiator: &Caller,
        members: &[SlotRequest],
    ) -> Result<()> {
        let checked = self
            .gates
            .bans
            .ensure_not_banned(gamespace, &initiator.account_id, initiator.ip.as_deref())
            .await;
        if checked.is_err() {
            self.metrics.record_ban_rejection();
            return checked;
        }

        for member in members
            .iter()
            .filter(|m| m.account_id != initiator.account_id)
        {
            if let Err(e) = self
                .gates
                .bans
                .ensure_not_banned(gamespace, &member.account_id, None)
                .await
            {
                self.metrics.record_ban_rejection();
                return Err(e);
            }
        }
        Ok(())
    }

    async fn find_room_for(
        &self,
        request: &RoomRequest,
        server: &GameServerConfig,
        members: &[SlotRequest],
    ) -> Result<PlacedRoom> {
        let scope = self
            .selector
            .search_scope(request.placement, request.lock_region)
            .await?;

        let mut query = RoomQuery::new(
            &request.gamespace,
            &request.game_name,
            &request.game_version,
        )
        .game_server(server.id)
        .state(RoomState::Spawned)
        .host_active(true)
        .free_slots(members.len() as u32)
        .filter(request.filter.clone());
        if let Some(region_id) = scope.region {
            query = query.region(region_id);
        }
        if let Some(order) = scope.order {
            query = query.regions_order(order);
        }

        let (room, reservations) = self.reservations.reserve(&query, members).await?;
        self.metrics.record_placement(false, reservations.len());
        info!(
            "Existing room found - room_id: {}, region_id: {}, players: {}/{}",
            room.id, room.region_id, room.players, room.max_players
        );

        Ok(PlacedRoom {
            room,
            reservations,
            created: false,
        })
    }

    async fn create_room_for(
        &self,
        request: &RoomRequest,
        server: &GameServerConfig,
        initiator: &Caller,
        members: &[SlotRequest],
    ) -> Result<PlacedRoom> {
        let deployment_id = match self
            .gates
            .deployments
            .enabled_deployment(
                &request.gamespace,
                &request.game_name,
                &request.game_version,
            )
            .await
        {
            Ok(deployment_id) => deployment_id,
            Err(e) => {
                let reason = if status_of(&e) == 404 { "missing" } else { "disabled" };
                self.metrics.record_deployment_rejection(reason);
                return Err(e);
            }
        };

        let lease = match self
            .gates
            .limiter
            .acquire(CREATE_ROOM, &initiator.account_id)
            .await
        {
            Ok(lease) => lease,
            Err(e) => {
                if status_of(&e) == 429 {
                    self.metrics.record_rate_limited(CREATE_ROOM);
                }
                return Err(e);
            }
        };

        match self
            .spawn_room(request, server, deployment_id, members)
            .await
        {
            Ok(placed) => Ok(placed),
            Err(e) => {
                lease.rollback().await;
                Err(e)
            }
        }
    }

    async fn spawn_room(
        &self,
        request: &RoomRequest,
        server: &GameServerConfig,
        deployment_id: u64,
        members: &[SlotRequest],
    ) -> Result<PlacedRoom> {
        let server_settings = self
            .gates
            .game_servers
            .server_settings(
                &request.gamespace,
                &request.game_name,
                &request.game_version,
                server,
            )
            .await?;

        let region = self.selector.creation_region(request.placement).await?;
        let host = self.selector.best_host(region.id).await?;

        let (room, reservations) = self
            .reservations
            .create_with_reservations(
                NewRoom {
                    gamespace: request.gamespace.clone(),
                    game_name: request.game_name.clone(),
                    game_version: request.game_version.clone(),
                    game_server_id: server.id,
                    region_id: region.id,
                    host_id: host.id,
                    deployment_id,
                    max_players: server.max_players,
                    settings: scalar_settings(&request.settings),
                },
                members,
            )
            .await?;

        let mut settings = json!({
            "game": server.game_settings,
            "server": server_settings,
            "room": room.settings,
        });
        if let Some(other) = &request.other {
            settings["other"] = other.clone();
        }

        let spawn = SpawnRequest {
            gamespace: request.gamespace.clone(),
            game_name: request.game_name.clone(),
            game_version: request.game_version.clone(),
            game_server_name: server.name.clone(),
            deployment_id,
            room_id: room.id,
            settings,
        };

        info!(
            "Spawning room - room_id: {}, host_id: {}, region_id: {}, deployment_id: {}",
            room.id, host.id, region.id, deployment_id
        );

        let timer = self.metrics.start_timer();
        let spawned = match tokio::time::timeout(
            self.spawn_timeout,
            self.controller.spawn(&host, spawn),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(MatchmakingError::ControllerTimeout {
                action: "spawn".to_string(),
            }
            .into()),
        };

        let spawned = match spawned {
            Ok(spawned) => spawned,
            Err(e) => {
                self.metrics.record_spawn(Some(status_of(&e)), timer.stop());
                error!(
                    "Spawn failed, removing room - room_id: {}, host_id: {}, error: {}",
                    room.id, host.id, e
                );
                if let Some(first) = members.first() {
                    if let Err(cleanup) = self
                        .reservations
                        .leave(room.id, &first.account_id, true)
                        .await
                    {
                        warn!(
                            "Failed to remove room after spawn failure - room_id: {}, error: {}",
                            room.id, cleanup
                        );
                    }
                }
                self.metrics.record_room_removed("spawn_failed");
                return Err(e);
            }
        };
        self.metrics.record_spawn(None, timer.stop());

        let room = self
            .reservations
            .store()
            .assign_location(room.id, spawned.location, spawned.settings)
            .await?;
        self.reservations.schedule_release(room.id, &reservations);

        self.metrics.record_room_created(region.id);
        self.metrics.record_placement(true, reservations.len());
        info!(
            "Room spawned - room_id: {}, host_id: {}, players: {}/{}",
            room.id, host.id, room.players, room.max_players
        );

        Ok(PlacedRoom {
            room,
            reservations,
            created: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RateLimitRule, RateLimitSettings};
    use crate::controller::MockHostController;
    use crate::gates::{InMemoryBans, InMemoryDeployments, InMemoryGameServers, InMemoryRateLimiter};
    use crate::placement::{InMemoryFleet, PlacementHint};
    use crate::store::{InMemoryRoomStore, SettingsFilter};
    use crate::types::{
        BanInfo, Deployment, DeploymentStatus, GeoPoint, Host, Region, RoomState,
    };
    use crate::utils::current_timestamp;
    use serde_json::{json, Value};

    struct Harness {
        rooms: RoomOrchestrator,
        fleet: Arc<InMemoryFleet>,
        controller: Arc<MockHostController>,
        deployments: Arc<InMemoryDeployments>,
        limiter: InMemoryRateLimiter,
        bans: Arc<InMemoryBans>,
    }

    fn create_test_harness(max_players: u32) -> Harness {
        let fleet = Arc::new(InMemoryFleet::new());
        for (id, name, lat, lon, default) in
            [(1, "eu", 50.1, 8.7, true), (2, "us", 40.7, -74.0, false)]
        {
            fleet
                .add_region(Region {
                    id,
                    name: name.to_string(),
                    location: GeoPoint::new(lat, lon),
                    default,
                    settings: Value::Null,
                })
                .unwrap();
            fleet
                .add_host(Host::new(id * 10, name, &format!("{}.internal", name), id))
                .unwrap();
        }

        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let store = Arc::new(InMemoryRoomStore::new(fleet.clone()));
        let reservations =
            ReservationManager::new(store, Duration::from_secs(30), metrics.clone());

        let deployments = Arc::new(InMemoryDeployments::new());
        deployments
            .deploy(
                "gs",
                Deployment {
                    id: 9,
                    game_name: "arena".to_string(),
                    game_version: "1.0".to_string(),
                    hash: "abc".to_string(),
                    status: DeploymentStatus::Delivered,
                },
                true,
            )
            .unwrap();

        let game_servers = Arc::new(InMemoryGameServers::new());
        game_servers
            .add_game_server(
                "gs",
                GameServerConfig {
                    id: 1,
                    name: "default".to_string(),
                    game_name: "arena".to_string(),
                    max_players,
                    game_settings: json!({"tickrate": 64}),
                    server_settings: Some(json!({"binary": "arena"})),
                },
            )
            .unwrap();

        let mut limits = RateLimitSettings::default();
        limits
            .rules
            .insert(CREATE_ROOM.to_string(), RateLimitRule::new(2, 60));
        let limiter = InMemoryRateLimiter::new(&limits);
        let bans = Arc::new(InMemoryBans::new());
        let controller = Arc::new(MockHostController::new());

        let rooms = RoomOrchestrator::new(
            PlacementSelector::new(fleet.clone()),
            reservations,
            RoomGates {
                deployments: deployments.clone(),
                game_servers,
                limiter: Arc::new(limiter.clone()),
                bans: bans.clone(),
            },
            controller.clone(),
            metrics,
            Duration::from_secs(60),
        );

        Harness {
            rooms,
            fleet,
            controller,
            deployments,
            limiter,
            bans,
        }
    }

    fn request() -> RoomRequest {
        RoomRequest::new("gs", "arena", "1.0", "default")
    }

    #[tokio::test]
    async fn test_creates_then_finds() {
        let h = create_test_harness(4);

        let first = h
            .rooms
            .find_or_create(&request(), &Caller::new("a", "ta"), true)
            .await
            .unwrap();
        assert!(first.location.is_some());

        let second = h
            .rooms
            .find_or_create(&request(), &Caller::new("b", "tb"), true)
            .await
            .unwrap();
        assert_eq!(first.room_id, second.room_id);
        assert_ne!(first.key, second.key);

        let room = h.rooms.get_room(first.room_id).await.unwrap();
        assert_eq!(room.players, 2);
        assert_eq!(room.state, RoomState::Spawned);
        assert_eq!(h.controller.spawn_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_without_auto_create_nothing_is_found() {
        let h = create_test_harness(4);
        let err = h
            .rooms
            .find_or_create(&request(), &Caller::new("a", "ta"), false)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert!(h.controller.spawn_requests().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_settings_are_merged() {
        let h = create_test_harness(4);
        h.controller
            .override_settings(json!({"port_hint": 7777}).as_object().cloned().unwrap());

        let settings = json!({"mode": "ctf", "nested": {"x": 1}})
            .as_object()
            .cloned()
            .unwrap();
        let ticket = h
            .rooms
            .create(
                &request().settings(settings).other(json!({"party": 1})),
                &Caller::new("a", "ta"),
            )
            .await
            .unwrap();

        let spawn = &h.controller.spawn_requests()[0];
        assert_eq!(spawn.deployment_id, 9);
        assert_eq!(spawn.settings["game"], json!({"tickrate": 64}));
        assert_eq!(spawn.settings["server"], json!({"binary": "arena"}));
        assert_eq!(spawn.settings["room"], json!({"mode": "ctf"}));
        assert_eq!(spawn.settings["other"], json!({"party": 1}));

        assert_eq!(ticket.settings.get("port_hint"), Some(&json!(7777)));
        assert_eq!(ticket.settings.get("mode"), Some(&json!("ctf")));
    }

    #[tokio::test]
    async fn test_spawn_failure_rolls_back_room_and_quota() {
        let h = create_test_harness(4);
        h.controller.fail_spawns(502, "no binary");

        let err = h
            .rooms
            .create(&request(), &Caller::new("a", "ta"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 502);
        assert_eq!(h.limiter.used(CREATE_ROOM, "a"), 0);

        let all = RoomQuery::default().show_full();
        assert!(h.rooms.list_rooms(&all).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_timeout_is_a_failure() {
        let h = create_test_harness(4);
        h.controller.delay_spawns(Duration::from_secs(120));

        let err = h
            .rooms
            .create(&request(), &Caller::new("a", "ta"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 504);
        assert_eq!(h.limiter.used(CREATE_ROOM, "a"), 0);
        assert!(h
            .rooms
            .list_rooms(&RoomQuery::default().show_full())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_room_is_hidden_until_spawned() {
        let h = create_test_harness(4);
        h.controller.delay_spawns(Duration::from_secs(5));
        h.controller.fail_spawns(503, "no capacity");

        let creator = {
            let rooms = h.rooms.clone();
            tokio::spawn(async move { rooms.create(&request(), &Caller::new("a", "ta")).await })
        };

        // Wait until the room row exists while its spawn is still in flight
        let all = RoomQuery::default().show_full();
        let pending = loop {
            let listed = h.rooms.list_rooms(&all).await.unwrap();
            if let Some(room) = listed.into_iter().next() {
                break room;
            }
            tokio::task::yield_now().await;
        };
        assert_eq!(pending.state, RoomState::None);

        let err = h
            .rooms
            .find_or_create(&request(), &Caller::new("b", "tb"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, MatchmakingError::RoomNotFound { .. }));

        let err = h
            .rooms
            .join_room("gs", pending.id, &Caller::new("c", "tc"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert_eq!(h.rooms.get_room(pending.id).await.unwrap().players, 1);

        let created = creator.await.unwrap();
        assert_eq!(created.unwrap_err().status_code(), 503);
        assert!(h.rooms.list_rooms(&all).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_exceeded() {
        let h = create_test_harness(4);
        let caller = Caller::new("a", "ta");
        h.rooms.create(&request(), &caller).await.unwrap();
        h.rooms.create(&request(), &caller).await.unwrap();

        let err = h.rooms.create(&request(), &caller).await.unwrap_err();
        assert_eq!(err.status_code(), 429);
        assert_eq!(h.controller.spawn_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_deployment_gate() {
        let h = create_test_harness(4);
        h.deployments.set_enabled("gs", "arena", "1.0", false).unwrap();

        let err = h
            .rooms
            .create(&request(), &Caller::new("a", "ta"))
            .await
            .unwrap_err();
        assert!(matches!(err, MatchmakingError::DeploymentDisabled { .. }));
        assert_eq!(h.limiter.used(CREATE_ROOM, "a"), 0);
        assert!(h.controller.spawn_requests().is_empty());
    }

    #[tokio::test]
    async fn test_no_hosts_refunds_quota() {
        let h = create_test_harness(4);
        h.fleet.set_host_enabled(10, false).unwrap();

        let err = h
            .rooms
            .create(&request(), &Caller::new("a", "ta"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 503);
        assert_eq!(h.limiter.used(CREATE_ROOM, "a"), 0);
    }

    #[tokio::test]
    async fn test_banned_caller_has_no_side_effects() {
        let h = create_test_harness(4);
        h.bans
            .add_ban(
                "gs",
                BanInfo {
                    ban_id: 3,
                    account_id: "other".to_string(),
                    ip: Some("10.1.1.1".to_string()),
                    expires: current_timestamp() + chrono::Duration::hours(1),
                    reason: "abuse".to_string(),
                },
            )
            .unwrap();

        let caller = Caller::new("a", "ta").with_ip("10.1.1.1");
        let err = h.rooms.find_or_create(&request(), &caller, true).await.unwrap_err();
        match err {
            MatchmakingError::Banned { ban } => {
                assert_eq!(ban.ban_id, 3);
                assert_eq!(ban.reason, "abuse");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(h.limiter.used(CREATE_ROOM, "a"), 0);
        assert!(h.controller.spawn_requests().is_empty());
    }

    #[tokio::test]
    async fn test_region_preference_and_lock() {
        let h = create_test_harness(4);
        let us = request().placement(PlacementHint::Region(2));
        let us_room = h.rooms.create(&us, &Caller::new("a", "ta")).await.unwrap();

        // From Berlin the EU region is closest, but without a lock the US room qualifies
        let berlin = PlacementHint::Coordinates(GeoPoint::new(52.5, 13.4));
        let ticket = h
            .rooms
            .find_or_create(&request().placement(berlin), &Caller::new("b", "tb"), false)
            .await
            .unwrap();
        assert_eq!(ticket.room_id, us_room.room_id);

        let locked = request().placement(berlin).lock_region(true);
        let ticket = h
            .rooms
            .find_or_create(&locked, &Caller::new("c", "tc"), true)
            .await
            .unwrap();
        assert_ne!(ticket.room_id, us_room.room_id);
        assert_eq!(h.rooms.get_room(ticket.room_id).await.unwrap().region_id, 1);
    }

    #[tokio::test]
    async fn test_filter_selects_rooms() {
        let h = create_test_harness(4);
        let ctf = json!({"mode": "ctf"}).as_object().cloned().unwrap();
        h.rooms
            .create(&request().settings(ctf), &Caller::new("a", "ta"))
            .await
            .unwrap();

        let wants_dm = request().filter(SettingsFilter::parse(&json!({"mode": "dm"})).unwrap());
        assert!(h
            .rooms
            .find_or_create(&wants_dm, &Caller::new("b", "tb"), false)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_multi_create_and_capacity() {
        let h = create_test_harness(3);
        let members: Vec<SlotRequest> = ["a", "b", "c"]
            .iter()
            .map(|a| SlotRequest::new(a, "t"))
            .collect();

        let placed = h
            .rooms
            .create_multi(&request(), &Caller::new("a", "t"), &members)
            .await
            .unwrap();
        assert!(placed.created);
        assert_eq!(placed.reservations.len(), 3);
        assert_eq!(placed.room.players, 3);

        let too_many: Vec<SlotRequest> = ["d", "e", "f", "g"]
            .iter()
            .map(|a| SlotRequest::new(a, "t"))
            .collect();
        let err = h
            .rooms
            .create_multi(&request(), &Caller::new("d", "t"), &too_many)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_join_room_by_id() {
        let h = create_test_harness(2);
        let ticket = h.rooms.create(&request(), &Caller::new("a", "ta")).await.unwrap();

        let joined = h
            .rooms
            .join_room("gs", ticket.room_id, &Caller::new("b", "tb"))
            .await
            .unwrap();
        assert_eq!(joined.room_id, ticket.room_id);

        let err = h
            .rooms
            .join_room("gs", ticket.room_id, &Caller::new("c", "tc"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);

        let err = h
            .rooms
            .join_room("other", ticket.room_id, &Caller::new("c", "tc"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_terminate_treats_timeout_as_success() {
        let h = create_test_harness(4);
        let ticket = h.rooms.create(&request(), &Caller::new("a", "ta")).await.unwrap();
        h.controller.time_out_terminations();

        h.rooms.terminate_room(ticket.room_id).await.unwrap();
        assert_eq!(h.rooms.get_room(ticket.room_id).await.unwrap_err().status_code(), 404);
        assert!(h
            .controller
            .calls()
            .iter()
            .any(|c| c.starts_with("terminate:10:gs:")));
    }

    #[tokio::test]
    async fn test_leave_room() {
        let h = create_test_harness(4);
        let ticket = h.rooms.create(&request(), &Caller::new("a", "ta")).await.unwrap();
        h.rooms
            .find_or_create(&request(), &Caller::new("b", "tb"), false)
            .await
            .unwrap();

        assert!(h.rooms.leave_room(ticket.room_id, "b", false).await.unwrap());
        assert_eq!(h.rooms.get_room(ticket.room_id).await.unwrap().players, 1);

        assert!(h.rooms.leave_room(ticket.room_id, "a", true).await.unwrap());
        assert!(h.rooms.get_room(ticket.room_id).await.is_err());
    }
}
