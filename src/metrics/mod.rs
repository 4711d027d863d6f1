//! Metrics and monitoring for the game master
//!
//! Prometheus collectors for rooms, reservations, parties, gates and the
//! fleet, plus the HTTP server exposing them with the health endpoints.

pub mod collector;
pub mod health;

pub use collector::{
    FleetMetrics, GateMetrics, MetricsCollector, MetricsTimer, PartyMetrics, PerformanceMetrics,
    ReservationMetrics, RoomMetrics, ServiceMetrics,
};
pub use health::{render_metrics, HealthServer, HealthServerConfig};
