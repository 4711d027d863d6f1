//! Fleet directory: regions and hosts
//!
//! Regions and hosts are created by operators. Host load and state are only
//! written by the heartbeat path, which claims a host with
//! `begin_processing` so two concurrent sweeps never process it twice.

use crate::error::{MatchmakingError, Result};
use crate::types::{Host, HostId, HostState, Region, RegionId};
use crate::utils::current_timestamp;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::RwLock;
use tracing::debug;

/// Read and heartbeat-write access to regions and hosts
#[async_trait]
pub trait FleetDirectory: Send + Sync {
    async fn list_regions(&self) -> Result<Vec<Region>>;

    async fn get_region(&self, region_id: RegionId) -> Result<Region>;

    /// Hosts of one region, or of the whole fleet
    async fn list_hosts(&self, region_id: Option<RegionId>) -> Result<Vec<Host>>;

    async fn get_host(&self, host_id: HostId) -> Result<Host>;

    /// Record a heartbeat: load, state and timestamp, and release the processing claim
    async fn update_host_load(
        &self,
        host_id: HostId,
        memory: u32,
        cpu: u32,
        state: HostState,
    ) -> Result<()>;

    /// Force a state on several hosts, releasing their processing claims
    async fn set_hosts_state(&self, host_ids: &[HostId], state: HostState) -> Result<()>;

    /// Claim a host for heartbeat processing, false if someone else holds it
    async fn begin_processing(&self, host_id: HostId) -> Result<bool>;
}

#[derive(Debug, Clone)]
struct HostRecord {
    host: Host,
    processing: bool,
}

/// In-memory fleet directory
#[derive(Debug, Default)]
pub struct InMemoryFleet {
    regions: RwLock<BTreeMap<RegionId, Region>>,
    hosts: RwLock<BTreeMap<HostId, HostRecord>>,
}

fn lock_error(what: &str) -> MatchmakingError {
    MatchmakingError::InternalError {
        message: format!("Failed to acquire {} lock", what),
    }
}

impl InMemoryFleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a region
    pub fn add_region(&self, region: Region) -> Result<()> {
        let mut regions = self.regions.write().map_err(|_| lock_error("regions"))?;
        regions.insert(region.id, region);
        Ok(())
    }

    /// Register or replace a host
    pub fn add_host(&self, host: Host) -> Result<()> {
        let mut hosts = self.hosts.write().map_err(|_| lock_error("hosts"))?;
        hosts.insert(
            host.id,
            HostRecord {
                host,
                processing: false,
            },
        );
        Ok(())
    }

    /// Remove a host from the fleet
    pub fn remove_host(&self, host_id: HostId) -> Result<Option<Host>> {
        let mut hosts = self.hosts.write().map_err(|_| lock_error("hosts"))?;
        Ok(hosts.remove(&host_id).map(|record| record.host))
    }

    pub fn set_host_enabled(&self, host_id: HostId, enabled: bool) -> Result<()> {
        let mut hosts = self.hosts.write().map_err(|_| lock_error("hosts"))?;
        let record = hosts
            .get_mut(&host_id)
            .ok_or(MatchmakingError::HostNotFound { host_id })?;
        record.host.enabled = enabled;
        Ok(())
    }
}

#[async_trait]
impl FleetDirectory for InMemoryFleet {
    async fn list_regions(&self) -> Result<Vec<Region>> {
        let regions = self.regions.read().map_err(|_| lock_error("regions"))?;
        Ok(regions.values().cloned().collect())
    }

    async fn get_region(&self, region_id: RegionId) -> Result<Region> {
        let regions = self.regions.read().map_err(|_| lock_error("regions"))?;
        regions
            .get(&region_id)
            .cloned()
            .ok_or_else(|| MatchmakingError::RegionNotFound.into())
    }

    async fn list_hosts(&self, region_id: Option<RegionId>) -> Result<Vec<Host>> {
        let hosts = self.hosts.read().map_err(|_| lock_error("hosts"))?;
        Ok(hosts
            .values()
            .filter(|record| region_id.map_or(true, |r| record.host.region_id == r))
            .map(|record| record.host.clone())
            .collect())
    }

    async fn get_host(&self, host_id: HostId) -> Result<Host> {
        let hosts = self.hosts.read().map_err(|_| lock_error("hosts"))?;
        hosts
            .get(&host_id)
            .map(|record| record.host.clone())
            .ok_or_else(|| MatchmakingError::HostNotFound { host_id }.into())
    }

    async fn update_host_load(
        &self,
        host_id: HostId,
        memory: u32,
        cpu: u32,
        state: HostState,
    ) -> Result<()> {
        let mut hosts = self.hosts.write().map_err(|_| lock_error("hosts"))?;
        let record = hosts
            .get_mut(&host_id)
            .ok_or(MatchmakingError::HostNotFound { host_id })?;

        record.host.memory = memory;
        record.host.cpu = cpu;
        record.host.load = f64::from(memory.max(cpu)) / 100.0;
        record.host.state = state;
        record.host.heartbeat = Some(current_timestamp());
        record.processing = false;

        debug!(
            "Host load updated - host_id: {}, memory: {}, cpu: {}, state: {}",
            host_id, memory, cpu, state
        );
        Ok(())
    }

    async fn set_hosts_state(&self, host_ids: &[HostId], state: HostState) -> Result<()> {
        let mut hosts = self.hosts.write().map_err(|_| lock_error("hosts"))?;
        for host_id in host_ids {
            if let Some(record) = hosts.get_mut(host_id) {
                record.host.state = state;
                record.processing = false;
            }
        }
        Ok(())
    }

    async fn begin_processing(&self, host_id: HostId) -> Result<bool> {
        let mut hosts = self.hosts.write().map_err(|_| lock_error("hosts"))?;
        let record = hosts
            .get_mut(&host_id)
            .ok_or(MatchmakingError::HostNotFound { host_id })?;
        if record.processing {
            return Ok(false);
        }
        record.processing = true;
        Ok(true)
    }
}
