//! Health check endpoints and monitoring
//!
//! Readiness requires a running service with a live broker connection; a
//! fleet with no host able to take players only degrades it.

use crate::service::app::{AppState, GameMaster};
use crate::placement::FleetDirectory;
use crate::store::{PartyStore, RoomStore};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Gauge value: 0=unhealthy, 1=degraded, 2=healthy
    pub fn gauge(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    /// The worse of two statuses
    pub fn worst(self, other: HealthStatus) -> HealthStatus {
        if other.gauge() < self.gauge() {
            other
        } else {
            self
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub checks: Vec<ComponentCheck>,
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    pub duration_ms: u64,
}

impl ComponentCheck {
    fn new(name: &str, started: Instant, status: HealthStatus, message: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    pub active_rooms: usize,
    pub players_in_rooms: u64,
    pub reserved_slots: u64,
    pub active_parties: usize,
    pub party_members: u64,
    pub starting_parties: usize,
    pub pending_release_timers: usize,
    pub uptime_seconds: u64,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(app_state: &AppState) -> Result<Self> {
        let game_master = app_state.game_master();
        let checks = vec![
            Self::check_service_running(app_state).await,
            Self::check_amqp_health(app_state),
            Self::check_fleet(game_master).await,
            Self::check_stores(game_master).await,
        ];

        let status = checks
            .iter()
            .fold(HealthStatus::Healthy, |status, check| status.worst(check.status));
        let stats = Self::gather_service_stats(game_master, app_state.uptime()).await;

        app_state.metrics().update_health_status(status.gauge());
        for check in &checks {
            app_state
                .metrics()
                .update_component_health(&check.name, check.status != HealthStatus::Unhealthy);
        }

        Ok(HealthCheck {
            status,
            service: app_state.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(app_state: &AppState) -> Result<HealthStatus> {
        if app_state.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify service can handle requests
    pub async fn readiness_check(app_state: &AppState) -> Result<HealthStatus> {
        if !app_state.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }
        let amqp = Self::check_amqp_health(app_state).status;
        let fleet = Self::check_fleet(app_state.game_master()).await.status;
        Ok(amqp.worst(fleet))
    }

    async fn check_service_running(app_state: &AppState) -> ComponentCheck {
        let started = Instant::now();
        if app_state.is_running().await {
            ComponentCheck::new("service_running", started, HealthStatus::Healthy, None)
        } else {
            ComponentCheck::new(
                "service_running",
                started,
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        }
    }

    fn check_amqp_health(app_state: &AppState) -> ComponentCheck {
        let started = Instant::now();
        if app_state.amqp_connection().is_alive() {
            ComponentCheck::new("amqp_connection", started, HealthStatus::Healthy, None)
        } else {
            ComponentCheck::new(
                "amqp_connection",
                started,
                HealthStatus::Unhealthy,
                Some("Broker connection is closed".to_string()),
            )
        }
    }

    /// Degraded while no host can take players
    pub(crate) async fn check_fleet(game_master: &GameMaster) -> ComponentCheck {
        let started = Instant::now();
        let (status, message) = match game_master.fleet.list_hosts(None).await {
            Ok(hosts) if hosts.is_empty() => (
                HealthStatus::Degraded,
                Some("No hosts registered".to_string()),
            ),
            Ok(hosts) => {
                let available = hosts
                    .iter()
                    .filter(|host| host.enabled && host.accepts_players())
                    .count();
                if available == 0 {
                    (
                        HealthStatus::Degraded,
                        Some(format!("None of {} hosts accepts players", hosts.len())),
                    )
                } else {
                    (HealthStatus::Healthy, None)
                }
            }
            Err(e) => (HealthStatus::Unhealthy, Some(e.to_string())),
        };
        ComponentCheck::new("fleet", started, status, message)
    }

    pub(crate) async fn check_stores(game_master: &GameMaster) -> ComponentCheck {
        let started = Instant::now();
        let rooms = game_master.room_store.stats().await;
        let parties = game_master.party_store.stats().await;
        let (status, message) = match (rooms, parties) {
            (Ok(_), Ok(_)) => (HealthStatus::Healthy, None),
            (Err(e), _) | (_, Err(e)) => (HealthStatus::Unhealthy, Some(e.to_string())),
        };
        ComponentCheck::new("stores", started, status, message)
    }

    pub(crate) async fn gather_service_stats(
        game_master: &GameMaster,
        uptime: Duration,
    ) -> ServiceStats {
        let mut stats = ServiceStats {
            pending_release_timers: game_master.reservations.pending_timers(),
            uptime_seconds: uptime.as_secs(),
            ..ServiceStats::default()
        };

        match game_master.room_store.stats().await {
            Ok(rooms) => {
                stats.active_rooms = rooms.rooms;
                stats.players_in_rooms = rooms.players;
                stats.reserved_slots = rooms.reserved;
            }
            Err(e) => debug!("Failed to get room stats for health check: {}", e),
        }
        match game_master.party_store.stats().await {
            Ok(parties) => {
                stats.active_parties = parties.parties;
                stats.party_members = parties.members;
                stats.starting_parties = parties.starting;
            }
            Err(e) => debug!("Failed to get party stats for health check: {}", e),
        }
        stats
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::controller::MockHostController;
    use crate::metrics::MetricsCollector;
    use crate::party::InMemoryPartyBroker;
    use crate::service::app::Collaborators;
    use crate::types::{GeoPoint, Host, HostState, Region};
    use serde_json::Value;
    use std::sync::Arc;

    fn game_master() -> GameMaster {
        GameMaster::new(
            &AppConfig::default(),
            Collaborators::new(
                Arc::new(MockHostController::new()),
                Arc::new(InMemoryPartyBroker::new()),
            ),
            Arc::new(MetricsCollector::new().unwrap()),
        )
    }

    #[test]
    fn test_worst_status_wins() {
        assert_eq!(
            HealthStatus::Healthy.worst(HealthStatus::Degraded),
            HealthStatus::Degraded
        );
        assert_eq!(
            HealthStatus::Unhealthy.worst(HealthStatus::Degraded),
            HealthStatus::Unhealthy
        );
    }

    #[tokio::test]
    async fn test_fleet_check_tracks_host_states() {
        let gm = game_master();
        assert_eq!(HealthCheck::check_fleet(&gm).await.status, HealthStatus::Degraded);

        gm.fleet
            .add_region(Region {
                id: 1,
                name: "eu".to_string(),
                location: GeoPoint::new(50.0, 10.0),
                default: true,
                settings: Value::Null,
            })
            .unwrap();
        gm.fleet.add_host(Host::new(1, "h1", "h1.internal", 1)).unwrap();
        assert_eq!(HealthCheck::check_fleet(&gm).await.status, HealthStatus::Healthy);

        gm.fleet.set_hosts_state(&[1], HostState::Error).await.unwrap();
        let check = HealthCheck::check_fleet(&gm).await;
        assert_eq!(check.status, HealthStatus::Degraded);
        assert!(check.message.unwrap().contains("1 hosts"));
    }

    #[tokio::test]
    async fn test_stats_on_empty_service() {
        let gm = game_master();
        assert_eq!(HealthCheck::check_stores(&gm).await.status, HealthStatus::Healthy);

        let stats = HealthCheck::gather_service_stats(&gm, Duration::from_secs(90)).await;
        assert_eq!(stats.active_rooms, 0);
        assert_eq!(stats.active_parties, 0);
        assert_eq!(stats.uptime_seconds, 90);
    }
}
