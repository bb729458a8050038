//! Event envelope contract.
//!
//! Every stream entry carries one JSON-serialized `EventEnvelope`. The
//! envelope pins a schema version and wraps exactly one event variant,
//! dispatched on the `kind` tag. Adding fields to the wire shape requires a
//! schema-version bump.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use railview_core::{CityId, VehiclePosition};

/// Wire schema version accepted by this build.
pub const SCHEMA_VERSION: &str = "1";

/// Topic names used on the stream bus.
pub mod topics {
    /// Normalized vehicle events, producer → processor.
    pub const EVENTS_NORMALIZED: &str = "events.normalized";
}

/// Versioned wrapper around one canonical event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub schema_version: String,
    pub data: TransitEvent,
}

/// Canonical event variants, tagged by `kind` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TransitEvent {
    #[serde(rename = "vehicle.upsert")]
    VehicleUpsert(VehicleUpsertEvent),
    #[serde(rename = "vehicle.remove")]
    VehicleRemove(VehicleRemoveEvent),
}

/// A vehicle appeared or moved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleUpsertEvent {
    pub at: DateTime<Utc>,
    pub city_id: CityId,
    pub source: String,
    pub payload: VehiclePosition,
}

/// A vehicle left service and must be dropped from state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRemoveEvent {
    pub at: DateTime<Utc>,
    pub city_id: CityId,
    pub source: String,
    pub payload: VehicleRemovePayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleRemovePayload {
    pub id: String,
}

impl EventEnvelope {
    pub fn upsert(
        city_id: CityId,
        source: impl Into<String>,
        at: DateTime<Utc>,
        payload: VehiclePosition,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            data: TransitEvent::VehicleUpsert(VehicleUpsertEvent {
                at,
                city_id,
                source: source.into(),
                payload,
            }),
        }
    }

    pub fn remove(
        city_id: CityId,
        source: impl Into<String>,
        at: DateTime<Utc>,
        vehicle_id: impl Into<String>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            data: TransitEvent::VehicleRemove(VehicleRemoveEvent {
                at,
                city_id,
                source: source.into(),
                payload: VehicleRemovePayload {
                    id: vehicle_id.into(),
                },
            }),
        }
    }

    /// The city this event mutates.
    pub fn city_id(&self) -> &CityId {
        match &self.data {
            TransitEvent::VehicleUpsert(e) => &e.city_id,
            TransitEvent::VehicleRemove(e) => &e.city_id,
        }
    }

    /// The wire value of the `kind` tag.
    pub fn kind(&self) -> &'static str {
        match &self.data {
            TransitEvent::VehicleUpsert(_) => "vehicle.upsert",
            TransitEvent::VehicleRemove(_) => "vehicle.remove",
        }
    }
}
