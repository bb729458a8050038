//! Stateful side of the pipeline: vehicle state, scope/frame store, frame
//! recomputation.
//!
//! Everything here is in-memory by design; frames do not outlive the process.

pub mod frame_computer;
pub mod scope_store;
pub mod ttl_map;
pub mod vehicle_state;

pub use frame_computer::{FrameComputation, FrameComputer};
pub use scope_store::{ScopeFrameStore, ScopeStoreConfig, StoreError, DEFAULT_TTL_MS};
pub use ttl_map::TtlMap;
pub use vehicle_state::{
    CleanupResult, UpsertOutcome, VehicleStateManager, VehicleStateStats,
};
