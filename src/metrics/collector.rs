//! Metrics collection using Prometheus
//!
//! Counters and gauges for room placement, reservations, parties, gates,
//! host controllers and the heartbeat sweep, grouped by concern.

use crate::store::{PartyStoreStats, RoomStoreStats};
use crate::types::HostId;
use anyhow::Result;
use prometheus::{
    Gauge, GaugeVec, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the game master
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    service_metrics: ServiceMetrics,
    room_metrics: RoomMetrics,
    reservation_metrics: ReservationMetrics,
    party_metrics: PartyMetrics,
    gate_metrics: GateMetrics,
    fleet_metrics: FleetMetrics,
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Total AMQP messages processed
    pub amqp_messages_total: IntCounterVec,

    /// AMQP message processing errors
    pub amqp_errors_total: IntCounterVec,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Room placement metrics
#[derive(Clone)]
pub struct RoomMetrics {
    /// Rooms currently stored
    pub active_rooms: IntGauge,

    /// Slots currently held, reserved or joined
    pub players_in_rooms: IntGauge,

    /// Rooms created by region
    pub rooms_created_total: IntCounterVec,

    /// Players placed, by whether the room was found or created
    pub placements_total: IntCounterVec,

    /// Rooms removed by reason
    pub rooms_removed_total: IntCounterVec,

    /// Spawn failures by status code
    pub spawn_failures_total: IntCounterVec,

    /// Spawn RPC latency
    pub spawn_duration_seconds: Histogram,
}

/// Reservation lifecycle metrics
#[derive(Clone)]
pub struct ReservationMetrics {
    /// Slots currently RESERVED
    pub reserved_slots: IntGauge,

    /// Slots reserved
    pub reservations_total: IntCounter,

    /// Reservations released by the grace timer
    pub reservations_expired_total: IntCounter,

    /// Join approvals by result
    pub approvals_total: IntCounterVec,
}

/// Party metrics
#[derive(Clone)]
pub struct PartyMetrics {
    pub active_parties: IntGauge,

    pub party_members: IntGauge,

    pub parties_created_total: IntCounter,

    pub parties_started_total: IntCounter,

    /// Parties deleted, by close reason
    pub parties_closed_total: IntCounterVec,

    pub start_failures_total: IntCounter,

    /// Messages published by type
    pub messages_published_total: IntCounterVec,
}

/// Ban, deployment and rate limit rejections
#[derive(Clone)]
pub struct GateMetrics {
    pub rate_limit_rejections_total: IntCounterVec,

    pub ban_rejections_total: IntCounter,

    pub deployment_rejections_total: IntCounterVec,
}

/// Host controller and heartbeat metrics
#[derive(Clone)]
pub struct FleetMetrics {
    /// Controller callbacks by action and status code
    pub controller_actions_total: IntCounterVec,

    /// Heartbeat polls by outcome
    pub heartbeats_total: IntCounterVec,

    /// Last reported host load (0.0 to 1.0+)
    pub host_load: GaugeVec,

    /// Duration of a whole heartbeat sweep
    pub last_sweep_seconds: Gauge,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Orchestrator operation durations
    pub operation_duration: HistogramVec,

    /// AMQP operation durations
    pub amqp_operation_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let room_metrics = RoomMetrics::new(&registry)?;
        let reservation_metrics = ReservationMetrics::new(&registry)?;
        let party_metrics = PartyMetrics::new(&registry)?;
        let gate_metrics = GateMetrics::new(&registry)?;
        let fleet_metrics = FleetMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            room_metrics,
            reservation_metrics,
            party_metrics,
            gate_metrics,
            fleet_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn rooms(&self) -> &RoomMetrics {
        &self.room_metrics
    }

    pub fn reservations(&self) -> &ReservationMetrics {
        &self.reservation_metrics
    }

    pub fn parties(&self) -> &PartyMetrics {
        &self.party_metrics
    }

    pub fn gates(&self) -> &GateMetrics {
        &self.gate_metrics
    }

    pub fn fleet(&self) -> &FleetMetrics {
        &self.fleet_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Refresh room gauges from store counters
    pub fn update_room_gauges(&self, stats: &RoomStoreStats) {
        self.room_metrics.active_rooms.set(stats.rooms as i64);
        self.room_metrics.players_in_rooms.set(stats.players as i64);
        self.reservation_metrics
            .reserved_slots
            .set(stats.reserved as i64);
    }

    /// Refresh party gauges from store counters
    pub fn update_party_gauges(&self, stats: &PartyStoreStats) {
        self.party_metrics.active_parties.set(stats.parties as i64);
        self.party_metrics.party_members.set(stats.members as i64);
    }

    pub fn record_room_created(&self, region_id: u64) {
        self.room_metrics
            .rooms_created_total
            .with_label_values(&[&region_id.to_string()])
            .inc();
    }

    /// Record players placed into a room that was found or created
    pub fn record_placement(&self, created: bool, players: usize) {
        let outcome = if created { "created" } else { "found" };
        self.room_metrics
            .placements_total
            .with_label_values(&[outcome])
            .inc_by(players as u64);
    }

    pub fn record_room_removed(&self, reason: &str) {
        self.room_metrics
            .rooms_removed_total
            .with_label_values(&[reason])
            .inc();
    }

    pub fn record_spawn(&self, code: Option<u16>, duration: Duration) {
        self.room_metrics
            .spawn_duration_seconds
            .observe(duration.as_secs_f64());
        if let Some(code) = code {
            self.room_metrics
                .spawn_failures_total
                .with_label_values(&[&code.to_string()])
                .inc();
        }
    }

    pub fn record_reservations(&self, count: usize) {
        self.reservation_metrics
            .reservations_total
            .inc_by(count as u64);
    }

    pub fn record_reservation_expired(&self) {
        self.reservation_metrics.reservations_expired_total.inc();
    }

    pub fn record_approval(&self, success: bool) {
        let result = if success { "approved" } else { "rejected" };
        self.reservation_metrics
            .approvals_total
            .with_label_values(&[result])
            .inc();
    }

    pub fn record_party_created(&self) {
        self.party_metrics.parties_created_total.inc();
    }

    pub fn record_party_started(&self) {
        self.party_metrics.parties_started_total.inc();
    }

    pub fn record_party_start_failed(&self) {
        self.party_metrics.start_failures_total.inc();
    }

    pub fn record_party_closed(&self, reason: &str) {
        self.party_metrics
            .parties_closed_total
            .with_label_values(&[reason])
            .inc();
    }

    pub fn record_party_message(&self, message_type: &str) {
        self.party_metrics
            .messages_published_total
            .with_label_values(&[message_type])
            .inc();
    }

    pub fn record_rate_limited(&self, action: &str) {
        self.gate_metrics
            .rate_limit_rejections_total
            .with_label_values(&[action])
            .inc();
    }

    pub fn record_ban_rejection(&self) {
        self.gate_metrics.ban_rejections_total.inc();
    }

    pub fn record_deployment_rejection(&self, reason: &str) {
        self.gate_metrics
            .deployment_rejections_total
            .with_label_values(&[reason])
            .inc();
    }

    pub fn record_controller_action(&self, action: &str, status: u16) {
        self.fleet_metrics
            .controller_actions_total
            .with_label_values(&[action, &status.to_string()])
            .inc();
    }

    pub fn record_heartbeat(&self, host_id: HostId, load: Option<f64>) {
        let outcome = if load.is_some() { "ok" } else { "failed" };
        self.fleet_metrics
            .heartbeats_total
            .with_label_values(&[outcome])
            .inc();
        if let Some(load) = load {
            self.fleet_metrics
                .host_load
                .with_label_values(&[&host_id.to_string()])
                .set(load);
        }
    }

    pub fn record_sweep(&self, duration: Duration) {
        self.fleet_metrics
            .last_sweep_seconds
            .set(duration.as_secs_f64());
    }

    /// Record an orchestrator operation duration
    pub fn record_operation(&self, operation: &str, duration: Duration) {
        self.performance_metrics
            .operation_duration
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }

    /// Record AMQP operation
    pub fn record_amqp_operation(&self, operation: &str, success: bool, duration: Duration) {
        let status = if success { "success" } else { "error" };

        self.service_metrics
            .amqp_messages_total
            .with_label_values(&[operation, status])
            .inc();

        if !success {
            self.service_metrics
                .amqp_errors_total
                .with_label_values(&[operation])
                .inc();
        }

        self.performance_metrics
            .amqp_operation_duration
            .with_label_values(&[operation, status])
            .observe(duration.as_secs_f64());
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("game_master_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let amqp_messages_total = IntCounterVec::new(
            Opts::new(
                "game_master_amqp_messages_total",
                "Total AMQP messages processed",
            ),
            &["operation", "status"],
        )?;
        registry.register(Box::new(amqp_messages_total.clone()))?;

        let amqp_errors_total = IntCounterVec::new(
            Opts::new("game_master_amqp_errors_total", "Total AMQP errors"),
            &["operation"],
        )?;
        registry.register(Box::new(amqp_errors_total.clone()))?;

        let health_status = IntGauge::new(
            "game_master_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("game_master_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            amqp_messages_total,
            amqp_errors_total,
            health_status,
            component_health,
        })
    }
}

impl RoomMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_rooms = IntGauge::new("game_master_active_rooms", "Rooms currently stored")?;
        registry.register(Box::new(active_rooms.clone()))?;

        let players_in_rooms =
            IntGauge::new("game_master_players_in_rooms", "Slots currently held")?;
        registry.register(Box::new(players_in_rooms.clone()))?;

        let rooms_created_total = IntCounterVec::new(
            Opts::new("game_master_rooms_created_total", "Total rooms created"),
            &["region"],
        )?;
        registry.register(Box::new(rooms_created_total.clone()))?;

        let placements_total = IntCounterVec::new(
            Opts::new("game_master_placements_total", "Players placed into rooms"),
            &["outcome"],
        )?;
        registry.register(Box::new(placements_total.clone()))?;

        let rooms_removed_total = IntCounterVec::new(
            Opts::new("game_master_rooms_removed_total", "Total rooms removed"),
            &["reason"],
        )?;
        registry.register(Box::new(rooms_removed_total.clone()))?;

        let spawn_failures_total = IntCounterVec::new(
            Opts::new("game_master_spawn_failures_total", "Failed spawn attempts"),
            &["code"],
        )?;
        registry.register(Box::new(spawn_failures_total.clone()))?;

        let spawn_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("game_master_spawn_duration_seconds", "Spawn RPC latency")
                .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        )?;
        registry.register(Box::new(spawn_duration_seconds.clone()))?;

        Ok(Self {
            active_rooms,
            players_in_rooms,
            rooms_created_total,
            placements_total,
            rooms_removed_total,
            spawn_failures_total,
            spawn_duration_seconds,
        })
    }
}

impl ReservationMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let reserved_slots =
            IntGauge::new("game_master_reserved_slots", "Slots awaiting approval")?;
        registry.register(Box::new(reserved_slots.clone()))?;

        let reservations_total =
            IntCounter::new("game_master_reservations_total", "Total slots reserved")?;
        registry.register(Box::new(reservations_total.clone()))?;

        let reservations_expired_total = IntCounter::new(
            "game_master_reservations_expired_total",
            "Reservations released after the grace period",
        )?;
        registry.register(Box::new(reservations_expired_total.clone()))?;

        let approvals_total = IntCounterVec::new(
            Opts::new("game_master_approvals_total", "Join approvals"),
            &["result"],
        )?;
        registry.register(Box::new(approvals_total.clone()))?;

        Ok(Self {
            reserved_slots,
            reservations_total,
            reservations_expired_total,
            approvals_total,
        })
    }
}

impl PartyMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_parties = IntGauge::new("game_master_active_parties", "Parties stored")?;
        registry.register(Box::new(active_parties.clone()))?;

        let party_members = IntGauge::new("game_master_party_members", "Members in parties")?;
        registry.register(Box::new(party_members.clone()))?;

        let parties_created_total =
            IntCounter::new("game_master_parties_created_total", "Total parties created")?;
        registry.register(Box::new(parties_created_total.clone()))?;

        let parties_started_total = IntCounter::new(
            "game_master_parties_started_total",
            "Parties that started a game",
        )?;
        registry.register(Box::new(parties_started_total.clone()))?;

        let parties_closed_total = IntCounterVec::new(
            Opts::new("game_master_parties_closed_total", "Parties deleted"),
            &["reason"],
        )?;
        registry.register(Box::new(parties_closed_total.clone()))?;

        let start_failures_total = IntCounter::new(
            "game_master_party_start_failures_total",
            "Party starts rolled back",
        )?;
        registry.register(Box::new(start_failures_total.clone()))?;

        let messages_published_total = IntCounterVec::new(
            Opts::new(
                "game_master_party_messages_total",
                "Party messages published",
            ),
            &["message_type"],
        )?;
        registry.register(Box::new(messages_published_total.clone()))?;

        Ok(Self {
            active_parties,
            party_members,
            parties_created_total,
            parties_started_total,
            parties_closed_total,
            start_failures_total,
            messages_published_total,
        })
    }
}

impl GateMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let rate_limit_rejections_total = IntCounterVec::new(
            Opts::new(
                "game_master_rate_limit_rejections_total",
                "Requests rejected by the rate limiter",
            ),
            &["action"],
        )?;
        registry.register(Box::new(rate_limit_rejections_total.clone()))?;

        let ban_rejections_total = IntCounter::new(
            "game_master_ban_rejections_total",
            "Requests rejected by an active ban",
        )?;
        registry.register(Box::new(ban_rejections_total.clone()))?;

        let deployment_rejections_total = IntCounterVec::new(
            Opts::new(
                "game_master_deployment_rejections_total",
                "Room creations rejected by the deployment gate",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(deployment_rejections_total.clone()))?;

        Ok(Self {
            rate_limit_rejections_total,
            ban_rejections_total,
            deployment_rejections_total,
        })
    }
}

impl FleetMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let controller_actions_total = IntCounterVec::new(
            Opts::new(
                "game_master_controller_actions_total",
                "Callbacks received from game servers",
            ),
            &["action", "status"],
        )?;
        registry.register(Box::new(controller_actions_total.clone()))?;

        let heartbeats_total = IntCounterVec::new(
            Opts::new("game_master_heartbeats_total", "Host heartbeat polls"),
            &["outcome"],
        )?;
        registry.register(Box::new(heartbeats_total.clone()))?;

        let host_load = GaugeVec::new(
            Opts::new("game_master_host_load", "Last reported host load"),
            &["host"],
        )?;
        registry.register(Box::new(host_load.clone()))?;

        let last_sweep_seconds = Gauge::new(
            "game_master_heartbeat_sweep_seconds",
            "Duration of the last heartbeat sweep",
        )?;
        registry.register(Box::new(last_sweep_seconds.clone()))?;

        Ok(Self {
            controller_actions_total,
            heartbeats_total,
            host_load,
            last_sweep_seconds,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "game_master_operation_duration_seconds",
                "Orchestrator operation duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        let amqp_operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "game_master_amqp_operation_duration_seconds",
                "AMQP operation duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation", "status"],
        )?;
        registry.register(Box::new(amqp_operation_duration.clone()))?;

        Ok(Self {
            operation_duration,
            amqp_operation_duration,
        })
    }
}
