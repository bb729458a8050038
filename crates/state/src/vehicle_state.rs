//! Authoritative per-city vehicle state.
//!
//! One record per vehicle id per city, last writer wins. The processor is the
//! only writer; the cleanup task shares the same outer mutex.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use railview_core::{BBox, CityId, VehiclePosition};

#[derive(Debug, Clone)]
struct VehicleRecord {
    position: VehiclePosition,
    last_updated: DateTime<Utc>,
}

/// Outcome of an upsert against the per-city cap.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// The city bucket is full and the vehicle id is new; the event is dropped.
    RejectedCityFull,
}

/// Totals used for observability.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VehicleStateStats {
    pub total_vehicles: usize,
    pub cities: HashMap<String, usize>,
}

/// Result of one cleanup pass.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CleanupResult {
    pub vehicles_removed: usize,
    pub cities_dropped: usize,
}

/// In-memory vehicle state: `cityId → (vehicleId → position + timestamp)`.
pub struct VehicleStateManager {
    cities: Mutex<HashMap<CityId, HashMap<String, VehicleRecord>>>,
    max_vehicles_per_city: usize,
}

impl VehicleStateManager {
    /// `max_vehicles_per_city == 0` disables the cap.
    pub fn new(max_vehicles_per_city: usize) -> Self {
        Self {
            cities: Mutex::new(HashMap::new()),
            max_vehicles_per_city,
        }
    }

    /// Insert or overwrite a vehicle; `last_updated` follows the payload's
    /// `updated_at`, not the wall clock.
    pub fn upsert_vehicle(&self, city_id: &CityId, position: VehiclePosition) -> UpsertOutcome {
        let mut cities = self.cities.lock().unwrap();
        let bucket = cities.entry(city_id.clone()).or_default();

        let existing = bucket.contains_key(&position.id);
        if !existing
            && self.max_vehicles_per_city > 0
            && bucket.len() >= self.max_vehicles_per_city
        {
            warn!(
                city = %city_id,
                vehicle = %position.id,
                cap = self.max_vehicles_per_city,
                "city bucket full, dropping new vehicle"
            );
            return UpsertOutcome::RejectedCityFull;
        }

        let last_updated = position.updated_at;
        bucket.insert(
            position.id.clone(),
            VehicleRecord {
                position,
                last_updated,
            },
        );

        if existing {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        }
    }

    /// Delete a vehicle; drops the city bucket when it empties.
    pub fn remove_vehicle(&self, city_id: &CityId, vehicle_id: &str) -> bool {
        let mut cities = self.cities.lock().unwrap();
        let Some(bucket) = cities.get_mut(city_id) else {
            return false;
        };

        let removed = bucket.remove(vehicle_id).is_some();
        if bucket.is_empty() {
            cities.remove(city_id);
        }
        removed
    }

    /// Snapshot of every vehicle in a city, without the timestamp side-field.
    pub fn vehicles_for_city(&self, city_id: &CityId) -> HashMap<String, VehiclePosition> {
        let cities = self.cities.lock().unwrap();
        cities
            .get(city_id)
            .map(|bucket| {
                bucket
                    .iter()
                    .map(|(id, rec)| (id.clone(), rec.position.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Vehicles within `bbox`, inclusive on all four edges.
    pub fn vehicles_in_bbox(&self, city_id: &CityId, bbox: &BBox) -> Vec<VehiclePosition> {
        let cities = self.cities.lock().unwrap();
        cities
            .get(city_id)
            .map(|bucket| {
                bucket
                    .values()
                    .filter(|rec| bbox.contains(&rec.position.coordinate))
                    .map(|rec| rec.position.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Evict vehicles older than `max_age_ms`, dropping emptied buckets.
    pub fn cleanup(&self, max_age_ms: u64) -> CleanupResult {
        self.cleanup_at(max_age_ms, Utc::now())
    }

    pub fn cleanup_at(&self, max_age_ms: u64, now: DateTime<Utc>) -> CleanupResult {
        let cutoff = now - ChronoDuration::milliseconds(max_age_ms as i64);
        let mut result = CleanupResult::default();

        let mut cities = self.cities.lock().unwrap();
        cities.retain(|city_id, bucket| {
            let before = bucket.len();
            bucket.retain(|_, rec| rec.last_updated >= cutoff);
            result.vehicles_removed += before - bucket.len();

            if bucket.is_empty() {
                debug!(city = %city_id, "dropping empty city bucket");
                result.cities_dropped += 1;
                false
            } else {
                true
            }
        });

        result
    }

    pub fn stats(&self) -> VehicleStateStats {
        let cities = self.cities.lock().unwrap();
        let mut stats = VehicleStateStats::default();
        for (city_id, bucket) in cities.iter() {
            stats.total_vehicles += bucket.len();
            stats.cities.insert(city_id.as_str().to_string(), bucket.len());
        }
        stats
    }
}
