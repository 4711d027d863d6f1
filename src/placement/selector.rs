//! Placement selection
//!
//! Turns a caller's placement hint into either a region ordering used to
//! search existing rooms, or a concrete region and host for a new room.
//! Nothing here writes; every operation is a ranked read of the fleet.

use crate::error::{MatchmakingError, Result};
use crate::placement::fleet::FleetDirectory;
use crate::types::{GeoPoint, Host, HostState, Region, RegionId};
use crate::utils::distance_meters;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Where a caller would like to be placed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum PlacementHint {
    /// An explicit region id
    Region(RegionId),
    /// Coordinates resolved from the caller's IP
    Coordinates(GeoPoint),
    /// Fall back to the fleet's default region
    #[default]
    Default,
}

/// Region constraints for a room search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchScope {
    /// Only rooms of this region qualify
    pub region: Option<RegionId>,
    /// Prefer rooms in this region order, closest first
    pub order: Option<Vec<RegionId>>,
}

/// Ranks regions by distance and hosts by load
#[derive(Clone)]
pub struct PlacementSelector {
    fleet: Arc<dyn FleetDirectory>,
}

impl PlacementSelector {
    pub fn new(fleet: Arc<dyn FleetDirectory>) -> Self {
        Self { fleet }
    }

    pub fn fleet(&self) -> Arc<dyn FleetDirectory> {
        self.fleet.clone()
    }

    /// Regions in ascending distance from `point`
    pub async fn ordered_regions(&self, point: GeoPoint) -> Result<Vec<Region>> {
        let mut regions: Vec<(f64, Region)> = self
            .fleet
            .list_regions()
            .await?
            .into_iter()
            .map(|region| (distance_meters(&point, &region.location), region))
            .collect();

        regions.sort_by(|(da, a), (db, b)| {
            da.partial_cmp(db)
                .unwrap_or(Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });

        Ok(regions.into_iter().map(|(_, region)| region).collect())
    }

    pub async fn closest_region(&self, point: GeoPoint) -> Result<Region> {
        self.ordered_regions(point)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MatchmakingError::RegionNotFound.into())
    }

    pub async fn default_region(&self) -> Result<Region> {
        self.fleet
            .list_regions()
            .await?
            .into_iter()
            .find(|region| region.default)
            .ok_or_else(|| MatchmakingError::RegionNotFound.into())
    }

    /// The enabled ACTIVE host with the lowest load, ties broken by lowest id
    pub async fn best_host(&self, region_id: RegionId) -> Result<Host> {
        let host = self
            .fleet
            .list_hosts(Some(region_id))
            .await?
            .into_iter()
            .filter(|host| host.enabled && host.state == HostState::Active)
            .min_by(|a, b| {
                a.load
                    .partial_cmp(&b.load)
                    .unwrap_or(Ordering::Equal)
                    .then(a.id.cmp(&b.id))
            });

        match host {
            Some(host) => {
                debug!(
                    "Best host selected - region_id: {}, host_id: {}, load: {:.2}",
                    region_id, host.id, host.load
                );
                Ok(host)
            }
            None => Err(MatchmakingError::NoHostsAvailable { region_id }.into()),
        }
    }

    /// Region a new room should be created in
    pub async fn creation_region(&self, hint: PlacementHint) -> Result<Region> {
        match hint {
            PlacementHint::Region(region_id) => self.fleet.get_region(region_id).await,
            PlacementHint::Coordinates(point) => match self.closest_region(point).await {
                Ok(region) => Ok(region),
                Err(_) => self.default_region().await,
            },
            PlacementHint::Default => self.default_region().await,
        }
    }

    /// Region constraints for finding an existing room
    ///
    /// With coordinates the search is ordered closest-first, or locked to the
    /// closest region when `lock_region` is set. An explicit region always
    /// locks. Without any hint every region qualifies.
    pub async fn search_scope(&self, hint: PlacementHint, lock_region: bool) -> Result<SearchScope> {
        match hint {
            PlacementHint::Region(region_id) => Ok(SearchScope {
                region: Some(region_id),
                order: None,
            }),
            PlacementHint::Coordinates(point) => {
                let regions = self.ordered_regions(point).await?;
                if lock_region {
                    if let Some(closest) = regions.first() {
                        return Ok(SearchScope {
                            region: Some(closest.id),
                            order: None,
                        });
                    }
                }
                Ok(SearchScope {
                    region: None,
                    order: Some(regions.into_iter().map(|region| region.id).collect()),
                })
            }
            PlacementHint::Default => Ok(SearchScope::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::fleet::InMemoryFleet;
    use serde_json::Value;

    fn region(id: RegionId, name: &str, lat: f64, lon: f64, default: bool) -> Region {
        Region {
            id,
            name: name.to_string(),
            location: GeoPoint::new(lat, lon),
            default,
            settings: Value::Null,
        }
    }

    fn create_test_selector() -> (Arc<InMemoryFleet>, PlacementSelector) {
        let fleet = Arc::new(InMemoryFleet::new());
        fleet.add_region(region(1, "eu", 50.11, 8.68, true)).unwrap();
        fleet.add_region(region(2, "us", 40.71, -74.0, false)).unwrap();
        fleet.add_region(region(3, "asia", 35.68, 139.69, false)).unwrap();
        let selector = PlacementSelector::new(fleet.clone());
        (fleet, selector)
    }

    #[tokio::test]
    async fn test_ordered_regions_by_distance() {
        let (_, selector) = create_test_selector();

        // Boston
        let ordered = selector
            .ordered_regions(GeoPoint::new(42.36, -71.06))
            .await
            .unwrap();
        let ids: Vec<_> = ordered.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);

        let closest = selector
            .closest_region(GeoPoint::new(34.0, 135.0))
            .await
            .unwrap();
        assert_eq!(closest.id, 3);
    }

    #[tokio::test]
    async fn test_best_host_lowest_load_then_id() {
        let (fleet, selector) = create_test_selector();

        let mut busy = Host::new(1, "busy", "h1", 1);
        busy.load = 0.9;
        let mut idle_a = Host::new(3, "idle-a", "h3", 1);
        idle_a.load = 0.1;
        let mut idle_b = Host::new(2, "idle-b", "h2", 1);
        idle_b.load = 0.1;
        let mut overloaded = Host::new(4, "over", "h4", 1);
        overloaded.state = HostState::Overload;
        let mut disabled = Host::new(5, "off", "h5", 1);
        disabled.enabled = false;

        for host in [busy, idle_a, idle_b, overloaded, disabled] {
            fleet.add_host(host).unwrap();
        }

        let best = selector.best_host(1).await.unwrap();
        assert_eq!(best.id, 2);
    }

    #[tokio::test]
    async fn test_best_host_none_available() {
        let (_, selector) = create_test_selector();
        let err = selector.best_host(2).await.unwrap_err();
        let typed = err.downcast_ref::<MatchmakingError>().unwrap();
        assert_eq!(typed.status_code(), 503);
    }

    #[tokio::test]
    async fn test_search_scope() {
        let (_, selector) = create_test_selector();
        let tokyo = PlacementHint::Coordinates(GeoPoint::new(35.0, 139.0));

        let scope = selector.search_scope(tokyo, false).await.unwrap();
        assert_eq!(scope.region, None);
        assert_eq!(scope.order.unwrap()[0], 3);

        let locked = selector.search_scope(tokyo, true).await.unwrap();
        assert_eq!(locked.region, Some(3));

        let open = selector
            .search_scope(PlacementHint::Default, true)
            .await
            .unwrap();
        assert_eq!(open, SearchScope::default());
    }

    #[tokio::test]
    async fn test_creation_region_falls_back_to_default() {
        let fleet = Arc::new(InMemoryFleet::new());
        let selector = PlacementSelector::new(fleet.clone());
        assert!(selector
            .creation_region(PlacementHint::Default)
            .await
            .is_err());

        fleet.add_region(region(7, "only", 0.0, 0.0, true)).unwrap();
        let region = selector
            .creation_region(PlacementHint::Coordinates(GeoPoint::new(10.0, 10.0)))
            .await
            .unwrap();
        assert_eq!(region.id, 7);
    }
}
