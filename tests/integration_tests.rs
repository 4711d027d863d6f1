//! Integration tests for room placement
//!
//! These tests drive a fully wired game master through whole room
//! lifecycles: placement, approval by the game server, expiry of unclaimed
//! reservations, heartbeat sweeps and termination.

mod fixtures;

use futures::future::join_all;
use game_master::controller::{ActionRequest, HeartbeatReport};
use game_master::gates::CREATE_ROOM;
use game_master::placement::PlacementHint;
use game_master::store::{RoomQuery, SettingsFilter};
use game_master::types::{HostState, RoomState};
use game_master::MatchmakingError;
use serde_json::{json, Value};
use std::time::Duration;

use fixtures::{
    caller, room_request, TestSystem, DEPLOYMENT_ID, EU_HOST, EU_REGION, GAME, GAMESPACE,
    US_REGION, VERSION,
};

fn action(name: &str, room_id: u64, args: Value) -> ActionRequest {
    ActionRequest {
        action: name.to_string(),
        gamespace: GAMESPACE.to_string(),
        room_id,
        args,
    }
}

fn all_rooms() -> RoomQuery {
    RoomQuery::new(GAMESPACE, GAME, VERSION).show_full()
}

#[tokio::test]
async fn test_complete_room_workflow() {
    let system = TestSystem::new(4);
    let rooms = &system.gm.rooms;

    // Step 1: nobody is playing, so the first player gets a fresh room
    let first = rooms
        .find_or_create(&room_request(), &caller("alice"), true)
        .await
        .unwrap();
    let location = first.location.clone().expect("spawned room has a location");
    assert_eq!(location.host, "eu.internal");

    // Step 2: the second player is matched into the same room
    let second = rooms
        .find_or_create(&room_request(), &caller("bob"), true)
        .await
        .unwrap();
    assert_eq!(second.room_id, first.room_id);
    assert_ne!(second.key, first.key);
    assert_eq!(
        system.controller.calls(),
        vec![format!("spawn:{}:{}", EU_HOST, first.room_id)]
    );

    // Step 3: the game server approves both players
    for (ticket, account) in [(&first, "alice"), (&second, "bob")] {
        let approved = system
            .gm
            .actions
            .dispatch(action("joined", ticket.room_id, json!({"key": ticket.key})))
            .await
            .unwrap();
        assert_eq!(approved["account"], account);
        assert_eq!(approved["access_token"], format!("token-{}", account));
    }
    assert_eq!(system.gm.reservations.pending_timers(), 0);

    // Step 4: one of them leaves
    system
        .gm
        .actions
        .dispatch(action("left", first.room_id, json!({"key": second.key})))
        .await
        .unwrap();
    let room = rooms.get_room(first.room_id).await.unwrap();
    assert_eq!(room.players, 1);
    assert_eq!(room.state, RoomState::Spawned);
}

#[tokio::test]
async fn test_second_approval_is_rejected() {
    let system = TestSystem::new(4);
    let ticket = system
        .gm
        .rooms
        .create(&room_request(), &caller("alice"))
        .await
        .unwrap();

    let joined = action("joined", ticket.room_id, json!({"key": ticket.key}));
    system.gm.actions.dispatch(joined.clone()).await.unwrap();

    let again = system.gm.actions.dispatch(joined).await.unwrap_err();
    assert_eq!(game_master::error::status_of(&again), 409);
    assert_eq!(
        system.gm.rooms.get_room(ticket.room_id).await.unwrap().players,
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_never_overfill() {
    let system = TestSystem::new(4);
    let rooms = &system.gm.rooms;
    let owner = rooms
        .create(&room_request(), &caller("owner"))
        .await
        .unwrap();

    let joins = (0..30).map(|i| {
        let rooms = rooms.clone();
        tokio::spawn(async move {
            rooms
                .find_or_create(&room_request(), &caller(&format!("player-{}", i)), false)
                .await
        })
    });
    let results: Vec<_> = join_all(joins)
        .await
        .into_iter()
        .map(|joined| joined.expect("join task panicked"))
        .collect();

    let placed: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(placed.len(), 3);
    assert!(placed.iter().all(|ticket| ticket.room_id == owner.room_id));
    for failure in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(failure, MatchmakingError::RoomNotFound { .. }));
    }

    let room = rooms.get_room(owner.room_id).await.unwrap();
    assert_eq!(room.players, room.max_players);
}

#[tokio::test]
async fn test_two_player_rooms_fill_then_spawn_more() {
    let system = TestSystem::new(2);
    let rooms = &system.gm.rooms;

    let mut room_ids = Vec::new();
    for i in 0..5 {
        let ticket = rooms
            .find_or_create(&room_request(), &caller(&format!("p{}", i)), true)
            .await
            .unwrap();
        room_ids.push(ticket.room_id);
    }

    assert_eq!(room_ids[0], room_ids[1]);
    assert_eq!(room_ids[2], room_ids[3]);
    assert_ne!(room_ids[1], room_ids[2]);
    assert_ne!(room_ids[3], room_ids[4]);
    assert_eq!(rooms.list_rooms(&all_rooms()).await.unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_unapproved_reservation_expires() {
    let system = TestSystem::new(4);
    let rooms = &system.gm.rooms;

    let owner = rooms
        .create(&room_request(), &caller("owner"))
        .await
        .unwrap();
    system
        .gm
        .actions
        .dispatch(action("joined", owner.room_id, json!({"key": owner.key})))
        .await
        .unwrap();

    let guest = rooms
        .find_or_create(&room_request(), &caller("guest"), false)
        .await
        .unwrap();
    assert_eq!(rooms.get_room(owner.room_id).await.unwrap().players, 2);

    // The guest never shows up on the game server
    tokio::time::sleep(system.gm.reservations.grace() + Duration::from_secs(1)).await;
    assert_eq!(rooms.get_room(owner.room_id).await.unwrap().players, 1);

    let late = system
        .gm
        .actions
        .dispatch(action("joined", guest.room_id, json!({"key": guest.key})))
        .await;
    assert!(late.is_err());
}

#[tokio::test]
async fn test_failed_spawn_leaves_nothing_behind() {
    let system = TestSystem::new(4);
    let rooms = &system.gm.rooms;
    system.controller.fail_spawns(503, "no capacity");

    let err = rooms
        .find_or_create(&room_request(), &caller("alice"), true)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 503);
    assert!(rooms.list_rooms(&all_rooms()).await.unwrap().is_empty());
    assert_eq!(system.gm.limiter.used(CREATE_ROOM, "alice"), 0);

    system.controller.succeed_spawns();
    let ticket = rooms
        .find_or_create(&room_request(), &caller("alice"), true)
        .await
        .unwrap();
    assert_eq!(rooms.get_room(ticket.room_id).await.unwrap().players, 1);
    assert_eq!(system.gm.limiter.used(CREATE_ROOM, "alice"), 1);
}

#[tokio::test]
async fn test_failed_spawn_at_quota_boundary_is_refunded() {
    let system = TestSystem::new(4);
    let rooms = &system.gm.rooms;

    for _ in 0..4 {
        rooms
            .create(&room_request(), &caller("alice"))
            .await
            .unwrap();
    }

    // The last allowed creation fails downstream and must not use up the quota
    system.controller.fail_spawns(503, "no capacity");
    let err = rooms
        .create(&room_request(), &caller("alice"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 503);
    assert_eq!(system.gm.limiter.used(CREATE_ROOM, "alice"), 4);

    system.controller.succeed_spawns();
    rooms
        .create(&room_request(), &caller("alice"))
        .await
        .unwrap();
    assert_eq!(system.gm.limiter.used(CREATE_ROOM, "alice"), 5);

    let err = rooms
        .create(&room_request(), &caller("alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, MatchmakingError::RateLimitExceeded { .. }));
    assert_eq!(rooms.list_rooms(&all_rooms()).await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_room_creation_is_rate_limited_per_account() {
    let system = TestSystem::new(4);
    let rooms = &system.gm.rooms;

    for _ in 0..5 {
        rooms
            .create(&room_request(), &caller("spammer"))
            .await
            .unwrap();
    }
    let err = rooms
        .create(&room_request(), &caller("spammer"))
        .await
        .unwrap_err();
    assert!(matches!(err, MatchmakingError::RateLimitExceeded { .. }));

    // Other accounts keep their own quota
    rooms
        .create(&room_request(), &caller("someone-else"))
        .await
        .unwrap();
    assert_eq!(rooms.list_rooms(&all_rooms()).await.unwrap().len(), 6);
}

#[tokio::test]
async fn test_region_hint_and_filters() {
    let system = TestSystem::new(4);
    let rooms = &system.gm.rooms;

    let us = rooms
        .create(
            &room_request()
                .placement(PlacementHint::Region(US_REGION))
                .settings(json!({"map": "dust"}).as_object().cloned().unwrap()),
            &caller("a"),
        )
        .await
        .unwrap();
    assert_eq!(
        rooms.get_room(us.room_id).await.unwrap().region_id,
        US_REGION
    );

    // Locked to the closest region, the US room is out of reach
    let eu_only = rooms
        .find_or_create(
            &room_request()
                .placement(PlacementHint::Region(EU_REGION))
                .lock_region(true),
            &caller("b"),
            false,
        )
        .await;
    assert!(matches!(eu_only, Err(MatchmakingError::RoomNotFound { .. })));

    let filtered = rooms
        .find_or_create(
            &room_request().filter(SettingsFilter::parse(&json!({"map": "dust"})).unwrap()),
            &caller("c"),
            false,
        )
        .await
        .unwrap();
    assert_eq!(filtered.room_id, us.room_id);

    let mismatch = rooms
        .find_or_create(
            &room_request().filter(SettingsFilter::parse(&json!({"map": "nuke"})).unwrap()),
            &caller("d"),
            false,
        )
        .await;
    assert!(mismatch.is_err());
}

#[tokio::test]
async fn test_heartbeat_sweeps_unreported_rooms() {
    let system = TestSystem::new(1);
    let rooms = &system.gm.rooms;

    let kept = rooms.create(&room_request(), &caller("a")).await.unwrap();
    let lost = rooms.create(&room_request(), &caller("b")).await.unwrap();

    let report: HeartbeatReport = serde_json::from_value(json!({
        "load": {"memory": 40, "cpu": 30},
        "rooms": [kept.room_id],
    }))
    .unwrap();
    system.controller.set_heartbeat(EU_HOST, report);

    let summary = system.gm.heartbeat.poll_once().await.unwrap();
    assert_eq!(summary.removed_rooms, vec![lost.room_id]);

    let remaining: Vec<_> = rooms
        .list_rooms(&all_rooms())
        .await
        .unwrap()
        .into_iter()
        .map(|room| room.id)
        .collect();
    assert_eq!(remaining, vec![kept.room_id]);

    let eu = game_master::placement::FleetDirectory::get_host(system.gm.fleet.as_ref(), EU_HOST)
        .await
        .unwrap();
    assert_eq!(eu.state, HostState::Active);
}

#[tokio::test]
async fn test_terminate_room() {
    let system = TestSystem::new(4);
    let rooms = &system.gm.rooms;
    let ticket = rooms.create(&room_request(), &caller("a")).await.unwrap();

    rooms.terminate_room(ticket.room_id).await.unwrap();
    assert!(matches!(
        rooms.get_room(ticket.room_id).await,
        Err(MatchmakingError::RoomNotFound { .. })
    ));
    assert!(system
        .controller
        .calls()
        .contains(&format!("terminate:{}:{}:{}", EU_HOST, GAMESPACE, ticket.room_id)));
}

#[tokio::test]
async fn test_game_server_checks_its_deployment() {
    let system = TestSystem::new(4);
    let ticket = system
        .gm
        .rooms
        .create(&room_request(), &caller("a"))
        .await
        .unwrap();

    let check = |deployment_id: u64| {
        action(
            "check_deployment",
            ticket.room_id,
            json!({
                "game_name": GAME,
                "game_version": VERSION,
                "deployment_id": deployment_id,
            }),
        )
    };

    system
        .gm
        .actions
        .dispatch(check(DEPLOYMENT_ID))
        .await
        .unwrap();
    let outdated = system
        .gm
        .actions
        .dispatch(check(DEPLOYMENT_ID - 1))
        .await
        .unwrap_err();
    assert_eq!(game_master::error::status_of(&outdated), 410);

    let unknown = system
        .gm
        .actions
        .dispatch(action("reboot", ticket.room_id, json!({})))
        .await
        .unwrap_err();
    assert_eq!(game_master::error::status_of(&unknown), 400);
}
