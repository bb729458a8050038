//! Core domain: geography, scope identity, vehicle payloads, timestamps.
//!
//! This crate is deterministic and IO-free. Transport, storage, and HTTP
//! live in the outer crates.

pub mod error;
pub mod frame;
pub mod geo;
pub mod scope;
pub mod timestamp;
pub mod vehicle;

pub use error::{DomainError, DomainResult};
pub use frame::ScopedTrainsFrame;
pub use geo::{BBox, Coordinate, NormalizeError, COORD_GRID, MAX_ZOOM, WEB_MERCATOR_MAX_LAT};
pub use scope::{CityId, ScopeDefinition, ScopeId, MAX_SCOPE_ID_LEN, SCOPE_ID_VERSION};
pub use timestamp::parse_utc_z;
pub use vehicle::{VehiclePosition, VehicleStatus};
