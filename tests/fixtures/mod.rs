//! Test fixtures for integration testing
//!
//! `TestSystem` is a fully wired game master running against in-process
//! collaborators: two regions with one host each, one delivered deployment
//! and one game-server configuration.

#![allow(dead_code)]

use game_master::config::{AppConfig, RateLimitRule};
use game_master::controller::MockHostController;
use game_master::gates::CREATE_ROOM;
use game_master::metrics::MetricsCollector;
use game_master::party::{InMemoryPartyBroker, MockCloseCallback, PartyParams};
use game_master::room::{Caller, RoomRequest};
use game_master::service::{Collaborators, GameMaster};
use game_master::types::{
    Deployment, DeploymentStatus, GameServerConfig, GeoPoint, Host, Region,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub const GAMESPACE: &str = "gs";
pub const GAME: &str = "arena";
pub const VERSION: &str = "1.0";
pub const SERVER: &str = "default";
pub const DEPLOYMENT_ID: u64 = 7;

pub const EU_REGION: u64 = 1;
pub const US_REGION: u64 = 2;
pub const EU_HOST: u64 = 10;
pub const US_HOST: u64 = 20;

pub struct TestSystem {
    pub gm: GameMaster,
    pub controller: Arc<MockHostController>,
    pub broker: Arc<InMemoryPartyBroker>,
    pub callbacks: Arc<MockCloseCallback>,
}

impl TestSystem {
    /// Rooms of `max_players`, five room creations per minute per account
    pub fn new(max_players: u32) -> Self {
        let mut config = AppConfig::default();
        config
            .rate_limits
            .rules
            .insert(CREATE_ROOM.to_string(), RateLimitRule::new(5, 60));
        Self::with_config(&config, max_players)
    }

    pub fn with_config(config: &AppConfig, max_players: u32) -> Self {
        let controller = Arc::new(MockHostController::new());
        let broker = Arc::new(InMemoryPartyBroker::new());
        let callbacks = Arc::new(MockCloseCallback::new());

        let gm = GameMaster::new(
            config,
            Collaborators::new(controller.clone(), broker.clone())
                .with_callbacks(callbacks.clone()),
            Arc::new(MetricsCollector::new().expect("Failed to create collector")),
        );

        for (id, host_id, name, lat, lon, default) in [
            (EU_REGION, EU_HOST, "eu", 50.1, 8.7, true),
            (US_REGION, US_HOST, "us", 40.7, -74.0, false),
        ] {
            gm.fleet
                .add_region(Region {
                    id,
                    name: name.to_string(),
                    location: GeoPoint::new(lat, lon),
                    default,
                    settings: Value::Null,
                })
                .expect("Failed to add region");
            gm.fleet
                .add_host(Host::new(host_id, name, &format!("{}.internal", name), id))
                .expect("Failed to add host");
        }

        gm.deployments
            .deploy(
                GAMESPACE,
                Deployment {
                    id: DEPLOYMENT_ID,
                    game_name: GAME.to_string(),
                    game_version: VERSION.to_string(),
                    hash: "f00d".to_string(),
                    status: DeploymentStatus::Delivered,
                },
                true,
            )
            .expect("Failed to deploy");

        gm.game_servers
            .add_game_server(
                GAMESPACE,
                GameServerConfig {
                    id: 1,
                    name: SERVER.to_string(),
                    game_name: GAME.to_string(),
                    max_players,
                    game_settings: json!({"mode": "ffa"}),
                    server_settings: Some(json!({"binary": "arena-server"})),
                },
            )
            .expect("Failed to add game server");

        Self {
            gm,
            controller,
            broker,
            callbacks,
        }
    }
}

pub fn room_request() -> RoomRequest {
    RoomRequest::new(GAMESPACE, GAME, VERSION, SERVER)
}

pub fn party_params(max_members: u32) -> PartyParams {
    PartyParams::new(GAMESPACE, GAME, VERSION, SERVER, EU_REGION, max_members)
}

pub fn caller(account_id: &str) -> Caller {
    Caller::new(account_id, &format!("token-{}", account_id))
}

pub fn profile(name: &str) -> Value {
    json!({"name": name})
}
