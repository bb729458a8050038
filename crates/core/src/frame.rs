//! Scoped snapshot frames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::BBox;
use crate::scope::{CityId, ScopeId};
use crate::vehicle::VehiclePosition;

/// The latest snapshot of vehicles visible within one scope.
///
/// Frames are overwritten wholesale on every recomputation; there is no
/// incremental delta contract. `checksum` is an optional passthrough that
/// the core carries but never computes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedTrainsFrame {
    pub scope_id: ScopeId,
    pub bbox: BBox,
    pub city_id: CityId,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    pub vehicles: Vec<VehiclePosition>,
}

impl ScopedTrainsFrame {
    /// Build a frame; callers supply vehicles already filtered to `bbox`.
    pub fn new(
        scope_id: ScopeId,
        bbox: BBox,
        city_id: CityId,
        at: DateTime<Utc>,
        vehicles: Vec<VehiclePosition>,
    ) -> Self {
        Self {
            scope_id,
            bbox,
            city_id,
            at,
            checksum: None,
            vehicles,
        }
    }

    /// An empty frame for a freshly provisioned scope.
    pub fn empty(scope_id: ScopeId, bbox: BBox, city_id: CityId, at: DateTime<Utc>) -> Self {
        Self::new(scope_id, bbox, city_id, at, Vec::new())
    }

    /// True when every vehicle lies within the frame's bbox.
    pub fn is_spatially_consistent(&self) -> bool {
        self.vehicles.iter().all(|v| self.bbox.contains(&v.coordinate))
    }
}
