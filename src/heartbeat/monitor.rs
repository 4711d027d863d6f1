//! Host heartbeat processing
//!
//! Every round asks each enabled host controller for its load and the rooms
//! it still runs. A host that answers gets its load and state refreshed and
//! loses the rooms it no longer reports; a host that does not answer is
//! moved to ERROR, which hides its rooms from find-to-join.

use crate::controller::{HeartbeatReport, HostController};
use crate::error::{MatchmakingError, Result};
use crate::metrics::MetricsCollector;
use crate::placement::FleetDirectory;
use crate::store::RoomStore;
use crate::types::{Host, HostId, HostState, RoomId};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

/// Outcome of one polling round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub checked: usize,
    /// Hosts still claimed by an earlier round
    pub skipped: usize,
    pub failed: Vec<HostId>,
    pub removed_rooms: Vec<RoomId>,
}

#[derive(Clone)]
pub struct HeartbeatMonitor {
    fleet: Arc<dyn FleetDirectory>,
    rooms: Arc<dyn RoomStore>,
    controller: Arc<dyn HostController>,
    metrics: Arc<MetricsCollector>,
    memory_overload: u32,
    timeout: Duration,
}

impl HeartbeatMonitor {
    pub fn new(
        fleet: Arc<dyn FleetDirectory>,
        rooms: Arc<dyn RoomStore>,
        controller: Arc<dyn HostController>,
        metrics: Arc<MetricsCollector>,
        memory_overload: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            fleet,
            rooms,
            controller,
            metrics,
            memory_overload,
            timeout,
        }
    }

    /// State a host ends up in for a given memory figure
    pub fn state_for(&self, memory: u32) -> HostState {
        if memory > self.memory_overload {
            HostState::Overload
        } else {
            HostState::Active
        }
    }

    /// Record a host's report and drop the rooms it no longer runs
    pub async fn apply_report(&self, host_id: HostId, report: &HeartbeatReport) -> Result<Vec<RoomId>> {
        let state = self.state_for(report.load.memory);
        self.fleet
            .update_host_load(host_id, report.load.memory, report.load.cpu, state)
            .await?;

        let load = f64::from(report.load.memory.max(report.load.cpu)) / 100.0;
        self.metrics.record_heartbeat(host_id, Some(load));

        let removed = self.rooms.remove_host_rooms(host_id, &report.rooms).await?;
        for room_id in &removed {
            self.metrics.record_room_removed("host_missing");
            info!(
                "Room missing from heartbeat, removed - host_id: {}, room_id: {}",
                host_id, room_id
            );
        }

        debug!(
            "Heartbeat applied - host_id: {}, memory: {}, cpu: {}, state: {}, rooms: {}",
            host_id,
            report.load.memory,
            report.load.cpu,
            state,
            report.rooms.len()
        );
        Ok(removed)
    }

    /// Move hosts that failed to answer to ERROR
    pub async fn mark_failed(&self, host_ids: &[HostId]) -> Result<()> {
        if host_ids.is_empty() {
            return Ok(());
        }
        self.fleet.set_hosts_state(host_ids, HostState::Error).await?;
        for host_id in host_ids {
            self.metrics.record_heartbeat(*host_id, None);
        }
        warn!("Hosts failed to report a heartbeat - hosts: {:?}", host_ids);
        Ok(())
    }

    /// Poll every enabled host once
    pub async fn poll_once(&self) -> Result<SweepSummary> {
        let timer = self.metrics.start_timer();
        let hosts = self.fleet.list_hosts(None).await?;
        let mut summary = SweepSummary::default();
        let mut polls = JoinSet::new();

        for host in hosts.into_iter().filter(|host| host.enabled) {
            if !self.fleet.begin_processing(host.id).await? {
                summary.skipped += 1;
                continue;
            }
            let monitor = self.clone();
            polls.spawn(async move {
                let outcome = monitor.poll_host(&host).await;
                (host.id, outcome)
            });
        }

        while let Some(joined) = polls.join_next().await {
            let (host_id, outcome) = joined.map_err(|e| MatchmakingError::InternalError {
                message: format!("Heartbeat task failed: {}", e),
            })?;
            summary.checked += 1;
            match outcome {
                Ok(removed) => summary.removed_rooms.extend(removed),
                Err(e) => {
                    debug!("Heartbeat failed - host_id: {}, error: {}", host_id, e);
                    summary.failed.push(host_id);
                }
            }
        }

        summary.failed.sort_unstable();
        self.mark_failed(&summary.failed).await?;
        self.metrics.record_sweep(timer.stop());
        Ok(summary)
    }

    async fn poll_host(&self, host: &Host) -> Result<Vec<RoomId>> {
        let report = tokio::time::timeout(self.timeout, self.controller.heartbeat(host))
            .await
            .map_err(|_| MatchmakingError::ControllerTimeout {
                action: "heartbeat".to_string(),
            })??;
        self.apply_report(host.id, &report).await
    }

    /// Poll on a fixed interval until the returned task is aborted
    pub fn start(&self, interval: Duration) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            info!("Heartbeat monitor started - interval: {}s", interval.as_secs());
            let mut ticks = IntervalStream::new(tokio::time::interval(interval));
            while ticks.next().await.is_some() {
                match monitor.poll_once().await {
                    Ok(summary) => debug!(
                        "Heartbeat round finished - checked: {}, skipped: {}, failed: {}, removed_rooms: {}",
                        summary.checked,
                        summary.skipped,
                        summary.failed.len(),
                        summary.removed_rooms.len()
                    ),
                    Err(e) => error!("Heartbeat round failed: {}", e),
                }
            }
        })
    }
}
