//! Scope definitions and scoped frames, TTL-indexed.
//!
//! Two maps keyed by scope id, each behind its own mutex: HTTP handlers read
//! while the processor writes, and no transaction spans the two maps. A scope
//! is discoverable iff its TTL has not elapsed; expiry is lazy.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info};

use railview_core::{ScopeDefinition, ScopeId, ScopedTrainsFrame};

use crate::ttl_map::TtlMap;

/// Default scope/frame lifetime.
pub const DEFAULT_TTL_MS: u64 = 120_000;

#[derive(Debug, Clone)]
pub struct ScopeStoreConfig {
    pub default_ttl: Duration,
}

impl Default for ScopeStoreConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_millis(DEFAULT_TTL_MS),
        }
    }
}

impl ScopeStoreConfig {
    pub fn from_env() -> Self {
        let default_ttl = std::env::var("SCOPE_TTL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(DEFAULT_TTL_MS));
        Self { default_ttl }
    }
}

/// Store failure: a map mutex was poisoned by a panicking writer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("scope store lock poisoned")]
    Poisoned,
}

/// TTL-indexed store for scope definitions and their latest frames.
pub struct ScopeFrameStore {
    definitions: Mutex<TtlMap<ScopeId, ScopeDefinition>>,
    frames: Mutex<TtlMap<ScopeId, ScopedTrainsFrame>>,
    default_ttl: Duration,
}

impl ScopeFrameStore {
    pub fn new(config: ScopeStoreConfig) -> Self {
        Self {
            definitions: Mutex::new(TtlMap::new()),
            frames: Mutex::new(TtlMap::new()),
            default_ttl: config.default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Write or refresh a scope definition (TTL restarts from now).
    pub fn upsert_scope(
        &self,
        definition: ScopeDefinition,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        self.upsert_scope_at(definition, ttl, Instant::now())
    }

    pub fn upsert_scope_at(
        &self,
        definition: ScopeDefinition,
        ttl: Option<Duration>,
        now: Instant,
    ) -> Result<(), StoreError> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let id = definition.id.clone();

        let mut definitions = self.definitions.lock().map_err(|_| StoreError::Poisoned)?;
        definitions.insert_at(id.clone(), definition, ttl, now);
        drop(definitions);

        info!(scope = %id, ttl_ms = ttl.as_millis() as u64, "scope created");
        metrics::increment_counter!("railview_scopes_created_total");
        Ok(())
    }

    /// Fetch a live definition; expired entries are deleted and missing.
    pub fn get_scope(&self, id: &ScopeId) -> Result<Option<ScopeDefinition>, StoreError> {
        self.get_scope_at(id, Instant::now())
    }

    pub fn get_scope_at(
        &self,
        id: &ScopeId,
        now: Instant,
    ) -> Result<Option<ScopeDefinition>, StoreError> {
        let mut definitions = self.definitions.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(definitions.get_at(id, now).cloned())
    }

    /// Write or refresh the latest frame for a scope.
    pub fn set_frame(
        &self,
        frame: ScopedTrainsFrame,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        self.set_frame_at(frame, ttl, Instant::now())
    }

    pub fn set_frame_at(
        &self,
        frame: ScopedTrainsFrame,
        ttl: Option<Duration>,
        now: Instant,
    ) -> Result<(), StoreError> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let id = frame.scope_id.clone();

        let mut frames = self.frames.lock().map_err(|_| StoreError::Poisoned)?;
        frames.insert_at(id.clone(), frame, ttl, now);
        drop(frames);

        debug!(scope = %id, "frame updated");
        metrics::increment_counter!("railview_frames_updated_total");
        Ok(())
    }

    pub fn get_frame(&self, id: &ScopeId) -> Result<Option<ScopedTrainsFrame>, StoreError> {
        self.get_frame_at(id, Instant::now())
    }

    pub fn get_frame_at(
        &self,
        id: &ScopeId,
        now: Instant,
    ) -> Result<Option<ScopedTrainsFrame>, StoreError> {
        let mut frames = self.frames.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(frames.get_at(id, now).cloned())
    }

    /// Visit every live scope definition.
    pub fn for_each_active_scope(
        &self,
        visit: impl FnMut(&ScopeDefinition),
    ) -> Result<(), StoreError> {
        self.for_each_active_scope_at(Instant::now(), visit)
    }

    pub fn for_each_active_scope_at(
        &self,
        now: Instant,
        mut visit: impl FnMut(&ScopeDefinition),
    ) -> Result<(), StoreError> {
        let mut definitions = self.definitions.lock().map_err(|_| StoreError::Poisoned)?;
        definitions.for_each_active_at(now, |_, def| visit(def));
        Ok(())
    }

    /// Snapshot of every live definition (operator listing).
    pub fn active_scopes(&self) -> Result<Vec<ScopeDefinition>, StoreError> {
        let mut scopes = Vec::new();
        self.for_each_active_scope(|def| scopes.push(def.clone()))?;
        Ok(scopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use railview_core::{BBox, CityId};

    fn definition(city: &str, south: f64) -> ScopeDefinition {
        let city = CityId::new(city).unwrap();
        let bbox = BBox::new(south, -74.02, south + 0.06, -73.96).normalized().unwrap();
        ScopeDefinition {
            id: ScopeId::derive(&city, &bbox),
            city_id: city,
            bbox,
            created_at: Utc::now(),
        }
    }

    fn store() -> ScopeFrameStore {
        ScopeFrameStore::new(ScopeStoreConfig::default())
    }

    #[test]
    fn scope_round_trip_and_lazy_expiry() {
        let store = store();
        let def = definition("nyc", 40.7);
        let id = def.id.clone();
        let t0 = Instant::now();

        store.upsert_scope_at(def.clone(), None, t0).unwrap();
        assert_eq!(store.get_scope_at(&id, t0).unwrap(), Some(def));

        let after_ttl = t0 + store.default_ttl();
        assert_eq!(store.get_scope_at(&id, after_ttl).unwrap(), None);
    }

    #[test]
    fn upsert_refreshes_the_scope_ttl() {
        let store = store();
        let def = definition("nyc", 40.7);
        let id = def.id.clone();
        let t0 = Instant::now();
        let half = store.default_ttl() / 2;

        store.upsert_scope_at(def.clone(), None, t0).unwrap();
        store.upsert_scope_at(def.clone(), None, t0 + half).unwrap();

        // Past the first deadline, inside the refreshed one.
        assert!(store
            .get_scope_at(&id, t0 + store.default_ttl() + Duration::from_millis(1))
            .unwrap()
            .is_some());
    }

    #[test]
    fn per_call_ttl_overrides_the_default() {
        let store = store();
        let def = definition("nyc", 40.7);
        let id = def.id.clone();
        let t0 = Instant::now();

        store
            .upsert_scope_at(def, Some(Duration::from_secs(1)), t0)
            .unwrap();
        assert!(store.get_scope_at(&id, t0 + Duration::from_secs(2)).unwrap().is_none());
    }

    #[test]
    fn frame_lifecycle_mirrors_scope_lifecycle() {
        let store = store();
        let def = definition("nyc", 40.7);
        let t0 = Instant::now();

        let frame = ScopedTrainsFrame::empty(
            def.id.clone(),
            def.bbox,
            def.city_id.clone(),
            Utc::now(),
        );
        store.set_frame_at(frame.clone(), None, t0).unwrap();

        assert_eq!(store.get_frame_at(&def.id, t0).unwrap(), Some(frame));
        assert_eq!(
            store.get_frame_at(&def.id, t0 + store.default_ttl()).unwrap(),
            None
        );
    }

    #[test]
    fn active_scope_iteration_skips_expired() {
        let store = store();
        let t0 = Instant::now();

        store
            .upsert_scope_at(definition("nyc", 40.7), Some(Duration::from_secs(1)), t0)
            .unwrap();
        store.upsert_scope_at(definition("sfo", 37.7), None, t0).unwrap();

        let later = t0 + Duration::from_secs(2);
        let mut cities = Vec::new();
        store
            .for_each_active_scope_at(later, |def| cities.push(def.city_id.as_str().to_string()))
            .unwrap();

        assert_eq!(cities, ["sfo"]);
    }
}
