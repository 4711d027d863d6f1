//! Main application state and service coordination
//!
//! `GameMaster` wires the stores, gates and orchestrators together around a
//! set of external collaborators. `AppState` runs it as a service: it owns
//! the AMQP connection, the action consumer and the background tasks.

use crate::amqp::{
    AmqpConfig, AmqpConnection, AmqpHostController, AmqpPartyBroker, ActionRequestConsumer,
};
use crate::config::AppConfig;
use crate::controller::{ControllerActions, HostController, NoTokenExtension, TokenExtender};
use crate::gates::{InMemoryBans, InMemoryDeployments, InMemoryGameServers, InMemoryRateLimiter};
use crate::heartbeat::HeartbeatMonitor;
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector};
use crate::party::{
    LoggingCloseCallback, PartyBroker, PartyCloseCallback, PartyOrchestrator, StartOutcomes,
};
use crate::placement::{InMemoryFleet, PlacementSelector};
use crate::reservation::ReservationManager;
use crate::room::{RoomGates, RoomOrchestrator};
use crate::store::{InMemoryPartyStore, InMemoryRoomStore, PartyStore, RoomStore};
use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Interval of the gauge refresh task
const GAUGE_REFRESH_INTERVAL: Duration = Duration::from_secs(15);

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("AMQP connection error: {message}")]
    AmqpConnection { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Systems the game master talks to but does not own
#[derive(Clone)]
pub struct Collaborators {
    pub controller: Arc<dyn HostController>,
    pub broker: Arc<dyn PartyBroker>,
    pub callbacks: Arc<dyn PartyCloseCallback>,
    pub tokens: Arc<dyn TokenExtender>,
}

impl Collaborators {
    pub fn new(controller: Arc<dyn HostController>, broker: Arc<dyn PartyBroker>) -> Self {
        Self {
            controller,
            broker,
            callbacks: Arc::new(LoggingCloseCallback),
            tokens: Arc::new(NoTokenExtension),
        }
    }

    pub fn with_callbacks(mut self, callbacks: Arc<dyn PartyCloseCallback>) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn with_tokens(mut self, tokens: Arc<dyn TokenExtender>) -> Self {
        self.tokens = tokens;
        self
    }
}

/// The assembled matchmaking core
///
/// Regions, hosts, deployments, game-server configurations and bans are
/// registered by the embedding application on the in-memory registries.
#[derive(Clone)]
pub struct GameMaster {
    pub fleet: Arc<InMemoryFleet>,
    pub deployments: Arc<InMemoryDeployments>,
    pub game_servers: Arc<InMemoryGameServers>,
    pub bans: Arc<InMemoryBans>,
    pub limiter: Arc<InMemoryRateLimiter>,
    pub room_store: Arc<InMemoryRoomStore>,
    pub party_store: Arc<InMemoryPartyStore>,
    pub reservations: ReservationManager,
    pub rooms: RoomOrchestrator,
    pub parties: PartyOrchestrator,
    pub actions: ControllerActions,
    pub heartbeat: HeartbeatMonitor,
    pub metrics: Arc<MetricsCollector>,
}

impl GameMaster {
    pub fn new(
        config: &AppConfig,
        collaborators: Collaborators,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let fleet = Arc::new(InMemoryFleet::new());
        let deployments = Arc::new(InMemoryDeployments::new());
        let game_servers = Arc::new(InMemoryGameServers::new());
        let bans = Arc::new(InMemoryBans::new());
        let limiter = Arc::new(InMemoryRateLimiter::new(&config.rate_limits));
        let room_store = Arc::new(InMemoryRoomStore::new(fleet.clone()));
        let party_store = Arc::new(InMemoryPartyStore::new());

        let reservations = ReservationManager::new(
            room_store.clone(),
            config.reservation_timeout(),
            metrics.clone(),
        );
        let rooms = RoomOrchestrator::new(
            PlacementSelector::new(fleet.clone()),
            reservations.clone(),
            RoomGates {
                deployments: deployments.clone(),
                game_servers: game_servers.clone(),
                limiter: limiter.clone(),
                bans: bans.clone(),
            },
            collaborators.controller.clone(),
            metrics.clone(),
            config.spawn_timeout(),
        );
        let parties = PartyOrchestrator::new(
            party_store.clone(),
            rooms.clone(),
            collaborators.broker.clone(),
            collaborators.callbacks.clone(),
            Arc::new(StartOutcomes::new(config.party.start_outcome_retention)),
            metrics.clone(),
        );
        let actions = ControllerActions::new(
            reservations.clone(),
            deployments.clone(),
            collaborators.tokens.clone(),
            metrics.clone(),
        );
        let heartbeat = HeartbeatMonitor::new(
            fleet.clone(),
            room_store.clone(),
            collaborators.controller,
            metrics.clone(),
            config.heartbeat.memory_overload,
            config.heartbeat_timeout(),
        );

        Self {
            fleet,
            deployments,
            game_servers,
            bans,
            limiter,
            room_store,
            party_store,
            reservations,
            rooms,
            parties,
            actions,
            heartbeat,
            metrics,
        }
    }

    /// Push store counters into the gauges
    pub async fn refresh_gauges(&self) -> Result<()> {
        let rooms = self.room_store.stats().await?;
        self.metrics.update_room_gauges(&rooms);
        let parties = self.party_store.stats().await?;
        self.metrics.update_party_gauges(&parties);
        debug!(
            "Gauges refreshed - rooms: {}, players: {}, parties: {}",
            rooms.rooms, rooms.players, parties.parties
        );
        Ok(())
    }
}

/// Main application state containing all service components
pub struct AppState {
    config: AppConfig,
    game_master: GameMaster,
    amqp_connection: Arc<AmqpConnection>,
    health_server: Arc<HealthServer>,
    action_consumer: tokio::sync::Mutex<Option<ActionRequestConsumer>>,
    background_tasks: Mutex<Vec<JoinHandle<()>>>,
    is_running: RwLock<bool>,
    started_at: std::time::Instant,
}

impl AppState {
    /// Connect to the broker and assemble the game master
    pub async fn new(config: AppConfig) -> Result<Arc<Self>, ServiceError> {
        info!("Initializing game master service");
        info!(
            "Configuration: service={}, amqp={}:{}",
            config.service.name, config.amqp.host, config.amqp.port
        );

        let metrics = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            }
        })?);

        let amqp_connection = Arc::new(
            AmqpConnection::new(AmqpConfig::from(&config.amqp))
                .await
                .map_err(|e| ServiceError::AmqpConnection {
                    message: format!("Failed to connect to AMQP: {}", e),
                })?,
        );

        let collaborators = Self::initialize_collaborators(&config, &amqp_connection).await?;
        let game_master = GameMaster::new(&config, collaborators, metrics.clone());

        let health_server = Arc::new(HealthServer::new(
            HealthServerConfig {
                port: config.service.health_port,
                host: "0.0.0.0".to_string(),
            },
            metrics,
        ));

        let state = Arc::new(Self {
            config,
            game_master,
            amqp_connection,
            health_server,
            action_consumer: tokio::sync::Mutex::new(None),
            background_tasks: Mutex::new(Vec::new()),
            is_running: RwLock::new(false),
            started_at: std::time::Instant::now(),
        });
        state.health_server.attach(Arc::downgrade(&state));
        Ok(state)
    }

    async fn initialize_collaborators(
        config: &AppConfig,
        amqp_connection: &AmqpConnection,
    ) -> Result<Collaborators, ServiceError> {
        let open = |e: anyhow::Error| ServiceError::AmqpConnection {
            message: format!("Failed to open AMQP channel: {}", e),
        };

        let controller = AmqpHostController::connect(
            amqp_connection.open_channel().await.map_err(open)?,
            &config.amqp.controller_exchange,
            config.spawn_timeout(),
        )
        .await
        .map_err(|e| ServiceError::Initialization {
            message: format!("Failed to set up host controller client: {}", e),
        })?;

        let broker = AmqpPartyBroker::new(
            amqp_connection.open_channel().await.map_err(open)?,
            config.party.message_ttl_ms,
        );

        Ok(Collaborators::new(Arc::new(controller), Arc::new(broker)))
    }

    /// Start all background services and message consumption
    pub async fn start(&self) -> Result<(), ServiceError> {
        info!("Starting game master service");
        *self.is_running.write().await = true;

        self.start_health_server();
        self.start_action_consumption().await?;
        self.start_background_tasks();

        info!("Game master service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of game master service");
        *self.is_running.write().await = false;

        if let Some(consumer) = self.action_consumer.lock().await.take() {
            if let Err(e) = consumer.stop_consuming().await {
                warn!("Failed to stop AMQP consumer: {}", e);
            } else {
                info!("AMQP action consumption stopped");
            }
        }

        self.stop_background_tasks();
        self.game_master.reservations.shutdown();

        if let Err(e) = self.health_server.stop().await {
            warn!("Failed to stop health server: {}", e);
        }

        if let Err(e) = self.game_master.refresh_gauges().await {
            warn!("Failed to collect final statistics: {}", e);
        }
        info!("Game master service shutdown completed");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn game_master(&self) -> &GameMaster {
        &self.game_master
    }

    pub fn amqp_connection(&self) -> Arc<AmqpConnection> {
        self.amqp_connection.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.game_master.metrics.clone()
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    fn start_health_server(&self) {
        let health_server = self.health_server.clone();
        let port = self.config.service.health_port;
        self.track(tokio::spawn(async move {
            if let Err(e) = health_server.start().await {
                error!("Health server failed: {}", e);
            }
        }));
        info!("Health server starting on port {}", port);
    }

    async fn start_action_consumption(&self) -> Result<(), ServiceError> {
        let channel = self.amqp_connection.open_channel().await.map_err(|e| {
            ServiceError::AmqpConnection {
                message: format!("Failed to open consumer channel: {}", e),
            }
        })?;

        let consumer =
            ActionRequestConsumer::new(Arc::new(self.game_master.actions.clone()), channel);
        consumer
            .start_consuming(&self.config.amqp.actions_queue)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to start consuming messages: {}", e),
            })?;

        *self.action_consumer.lock().await = Some(consumer);
        Ok(())
    }

    fn start_background_tasks(&self) {
        let game_master = self.game_master.clone();
        let started_at = self.started_at;
        self.track(tokio::spawn(async move {
            let mut interval = tokio::time::interval(GAUGE_REFRESH_INTERVAL);
            loop {
                interval.tick().await;
                if let Err(e) = game_master.refresh_gauges().await {
                    warn!("Failed to refresh gauges: {}", e);
                }
                game_master
                    .metrics
                    .service()
                    .uptime_seconds
                    .set(started_at.elapsed().as_secs() as i64);
            }
        }));

        if self.config.heartbeat.enabled {
            self.track(
                self.game_master
                    .heartbeat
                    .start(self.config.heartbeat_interval()),
            );
        } else {
            info!("Heartbeat polling disabled");
        }
    }

    fn track(&self, handle: JoinHandle<()>) {
        match self.background_tasks.lock() {
            Ok(mut tasks) => tasks.push(handle),
            Err(_) => {
                warn!("Failed to acquire background tasks lock, task will not be tracked");
            }
        }
    }

    fn stop_background_tasks(&self) {
        let tasks: Vec<JoinHandle<()>> = match self.background_tasks.lock() {
            Ok(mut tasks) => tasks.drain(..).collect(),
            Err(_) => return,
        };
        info!("Stopping {} background tasks", tasks.len());
        for task in tasks {
            task.abort();
        }
    }
}
