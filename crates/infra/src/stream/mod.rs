//! Redis/Valkey stream transport.

pub mod bus;
pub mod client;

pub use bus::{BusConfig, StreamEventBus, ENTRY_FIELD};
pub use client::{
    ReadOptions, StreamBatch, StreamBusClient, StreamBusConfig, StreamBusError, StreamMessage,
};
