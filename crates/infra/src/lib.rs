//! Infrastructure: the durable stream transport.
//!
//! The core event bus abstraction lives in `railview-events` as pure
//! mechanics; this crate provides the Redis/Valkey-backed implementation.

pub mod stream;

pub use stream::{
    BusConfig, ReadOptions, StreamBatch, StreamBusClient, StreamBusConfig, StreamBusError,
    StreamEventBus, StreamMessage,
};
