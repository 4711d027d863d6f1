//! Utility functions for the game master

use crate::types::{GeoPoint, Settings};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Mean earth radius in meters
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Monotonic id source standing in for an auto-increment column
#[derive(Debug)]
pub struct IdSequence(AtomicU64);

impl IdSequence {
    pub fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdSequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a unique join key for a slot
pub fn generate_join_key(gamespace: &str, account_id: &str) -> String {
    format!("{}_{}_{}", gamespace, account_id, Uuid::new_v4().simple())
}

/// Generate a correlation id for RPC requests
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Great-circle distance in meters
pub fn distance_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Keep only scalar values, rooms cannot be created with nested settings
pub fn scalar_settings(settings: &Settings) -> Settings {
    settings
        .iter()
        .filter(|(_, value)| {
            matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_keys_are_unique() {
        let a = generate_join_key("1", "42");
        let b = generate_join_key("1", "42");
        assert_ne!(a, b);
        assert!(a.starts_with("1_42_"));
        assert_eq!(a.len(), "1_42_".len() + 32);
    }

    #[test]
    fn test_id_sequence() {
        let seq = IdSequence::new();
        assert_eq!(seq.next(), 1);
        assert_eq!(seq.next(), 2);
    }

    #[test]
    fn test_distance() {
        let berlin = GeoPoint::new(52.52, 13.405);
        let paris = GeoPoint::new(48.8566, 2.3522);
        let d = distance_meters(&berlin, &paris);
        assert!((d - 878_000.0).abs() < 10_000.0, "got {}", d);
        assert_eq!(distance_meters(&berlin, &berlin), 0.0);
    }

    #[test]
    fn test_scalar_settings() {
        let settings = json!({"mode": "ffa", "max": 4, "ranked": true, "nested": {"a": 1}, "list": [1]});
        let filtered = scalar_settings(settings.as_object().unwrap());
        assert_eq!(filtered.len(), 3);
        assert!(!filtered.contains_key("nested"));
    }
}
