//! Event contract and bus abstraction.
//!
//! The envelope is the unit of transport: every stream entry holds one
//! JSON-serialized `EventEnvelope`. The `EventBus` trait is implemented by
//! the durable stream-backed bus (infra crate) and by the in-memory fan-out
//! bus here.

pub mod bus;
pub mod envelope;
pub mod in_memory_bus;
pub mod validator;

pub use bus::{EventBus, EventHandler, HandlerError, PublishError, SubscriptionHandle};
pub use envelope::{
    topics, EventEnvelope, TransitEvent, VehicleRemoveEvent, VehicleRemovePayload,
    VehicleUpsertEvent, SCHEMA_VERSION,
};
pub use in_memory_bus::InMemoryEventBus;
pub use validator::validate;
