//! Scope-filtered frame recomputation.
//!
//! Every state change recomputes a fresh frame for each active scope that
//! passes the caller's filter (typically: same city). Per-scope failures are
//! collected, never fatal to the pass.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, warn};

use railview_core::{CityId, ScopeDefinition, ScopedTrainsFrame, VehiclePosition};

use crate::scope_store::{ScopeFrameStore, StoreError};

/// Result of one recomputation pass.
///
/// `vehicles_included` sums inclusions across scopes; a vehicle visible in
/// several overlapping scopes counts once per scope.
#[derive(Debug, Clone, Default)]
pub struct FrameComputation {
    pub scopes_processed: usize,
    pub vehicles_included: usize,
    pub processing_time_ms: u64,
    pub errors: Vec<String>,
}

/// Computes and stores one frame per active scope.
pub struct FrameComputer {
    store: Arc<ScopeFrameStore>,
}

impl FrameComputer {
    pub fn new(store: Arc<ScopeFrameStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<ScopeFrameStore> {
        &self.store
    }

    /// Recompute frames for every active scope passing `filter`.
    ///
    /// `Err` means the pass itself could not run (scope iteration failed) and
    /// is the retryable failure; per-scope write failures land in `errors`
    /// without aborting the pass.
    pub fn compute_frames(
        &self,
        city_id: &CityId,
        vehicles: &HashMap<String, VehiclePosition>,
        filter: impl Fn(&ScopeDefinition) -> bool,
    ) -> Result<FrameComputation, StoreError> {
        let started = Instant::now();
        let mut result = FrameComputation::default();

        // Snapshot matching scopes so frame writes happen outside the
        // definitions lock.
        let mut scopes = Vec::new();
        self.store.for_each_active_scope(|def| {
            if filter(def) {
                scopes.push(def.clone());
            }
        })?;

        let at = Utc::now();
        for scope in scopes {
            let visible: Vec<VehiclePosition> = vehicles
                .values()
                .filter(|v| scope.bbox.contains(&v.coordinate))
                .cloned()
                .collect();

            result.vehicles_included += visible.len();

            let frame = ScopedTrainsFrame::new(
                scope.id.clone(),
                scope.bbox,
                scope.city_id.clone(),
                at,
                visible,
            );

            match self.store.set_frame(frame, None) {
                Ok(()) => result.scopes_processed += 1,
                Err(e) => {
                    warn!(scope = %scope.id, error = %e, "frame write failed");
                    result.errors.push(format!("scope {}: {e}", scope.id));
                }
            }
        }

        result.processing_time_ms = started.elapsed().as_millis() as u64;
        metrics::counter!(
            "railview_frames_computed_total",
            result.scopes_processed as u64
        );

        debug!(
            city = %city_id,
            scopes = result.scopes_processed,
            vehicles = result.vehicles_included,
            elapsed_ms = result.processing_time_ms,
            "frames recomputed"
        );

        Ok(result)
    }
}
