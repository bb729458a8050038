//! Redis/Valkey stream client (durable, at-least-once delivery).
//!
//! Wraps the sync `redis` client with the exact command layouts the system
//! depends on:
//!
//! - `XADD <stream> [MAXLEN ~ <N>] * json <json>`
//! - `XGROUP CREATE <stream> <group> <id> [MKSTREAM]` (BUSYGROUP swallowed)
//! - `XREADGROUP GROUP <g> <c> [BLOCK <ms>] [COUNT <n>] STREAMS <stream> <id>`
//! - `XACK <stream> <group> <id>`
//!
//! Command construction is separated from execution so the layouts are
//! testable without a server. One client owns one cached connection; give
//! each blocking consumer loop its own client.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

/// Connection-wide configuration.
#[derive(Debug, Clone)]
pub struct StreamBusConfig {
    pub url: String,
    pub default_block_ms: u64,
    pub default_count: usize,
}

impl Default for StreamBusConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            default_block_ms: 5_000,
            default_count: 100,
        }
    }
}

impl StreamBusConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("STREAM_BUS_URL").unwrap_or(defaults.url),
            default_block_ms: std::env::var("STREAM_BUS_BLOCK_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.default_block_ms),
            default_count: std::env::var("STREAM_BUS_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.default_count),
        }
    }
}

#[derive(Debug, Error)]
pub enum StreamBusError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("serialization failure: {0}")]
    Serialization(String),
}

/// One entry read from a stream, fields decoded to strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    pub id: String,
    pub fields: HashMap<String, String>,
}

/// Normalized result of one consumer-group read: entries per stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamBatch {
    pub name: String,
    pub messages: Vec<StreamMessage>,
}

/// Per-call overrides for `xread_group`; `None` falls back to the
/// connection-wide defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    pub block_ms: Option<u64>,
    pub count: Option<usize>,
}

/// Build the publish command: `XADD <stream> [MAXLEN ~ <N>] * json <json>`.
///
/// The trim directive is issued iff `maxlen_approx > 0`.
pub fn xadd_cmd(stream: &str, json_payload: &str, maxlen_approx: Option<i64>) -> redis::Cmd {
    let mut cmd = redis::cmd("XADD");
    cmd.arg(stream);
    if let Some(n) = maxlen_approx {
        if n > 0 {
            cmd.arg("MAXLEN").arg("~").arg(n);
        }
    }
    cmd.arg("*").arg("json").arg(json_payload);
    cmd
}

/// Build the group-create command: `XGROUP CREATE <stream> <group> <id> [MKSTREAM]`.
pub fn xgroup_create_cmd(stream: &str, group: &str, start_id: &str, mkstream: bool) -> redis::Cmd {
    let mut cmd = redis::cmd("XGROUP");
    cmd.arg("CREATE").arg(stream).arg(group).arg(start_id);
    if mkstream {
        cmd.arg("MKSTREAM");
    }
    cmd
}

/// Build the read command:
/// `XREADGROUP GROUP <g> <c> [BLOCK <ms>] [COUNT <n>] STREAMS <stream> <id>`.
pub fn xreadgroup_cmd(
    group: &str,
    consumer: &str,
    stream: &str,
    id: &str,
    block_ms: Option<u64>,
    count: Option<usize>,
) -> redis::Cmd {
    let mut cmd = redis::cmd("XREADGROUP");
    cmd.arg("GROUP").arg(group).arg(consumer);
    if let Some(ms) = block_ms {
        cmd.arg("BLOCK").arg(ms);
    }
    if let Some(n) = count {
        cmd.arg("COUNT").arg(n);
    }
    cmd.arg("STREAMS").arg(stream).arg(id);
    cmd
}

/// Build the acknowledge command: `XACK <stream> <group> <id>`.
pub fn xack_cmd(stream: &str, group: &str, id: &str) -> redis::Cmd {
    let mut cmd = redis::cmd("XACK");
    cmd.arg(stream).arg(group).arg(id);
    cmd
}

/// A "group already exists" reply is success, not an error.
pub fn is_busygroup(err: &redis::RedisError) -> bool {
    err.to_string().contains("BUSYGROUP")
}

/// Decode an `XREADGROUP` reply into normalized batches.
///
/// A nil reply (blocking timeout, no data) decodes to `None`.
pub fn parse_read_reply(value: redis::Value) -> Result<Option<Vec<StreamBatch>>, StreamBusError> {
    let streams = match value {
        redis::Value::Nil => return Ok(None),
        redis::Value::Bulk(streams) => streams,
        other => {
            return Err(StreamBusError::Transport(format!(
                "unexpected XREADGROUP reply shape: {other:?}"
            )))
        }
    };

    let mut batches = Vec::with_capacity(streams.len());
    for stream in streams {
        let redis::Value::Bulk(parts) = stream else {
            return Err(StreamBusError::Transport(
                "stream entry is not an array".to_string(),
            ));
        };
        let mut parts = parts.into_iter();
        let name = decode_string(parts.next(), "stream name")?;
        let entries = match parts.next() {
            Some(redis::Value::Bulk(entries)) => entries,
            other => {
                return Err(StreamBusError::Transport(format!(
                    "stream entries are not an array: {other:?}"
                )))
            }
        };

        let mut messages = Vec::with_capacity(entries.len());
        for entry in entries {
            let redis::Value::Bulk(entry_parts) = entry else {
                return Err(StreamBusError::Transport(
                    "entry is not an array".to_string(),
                ));
            };
            let mut entry_parts = entry_parts.into_iter();
            let id = decode_string(entry_parts.next(), "entry id")?;

            let mut fields = HashMap::new();
            if let Some(redis::Value::Bulk(kv)) = entry_parts.next() {
                for pair in kv.chunks(2) {
                    if let [k, v] = pair {
                        fields.insert(
                            decode_string(Some(k.clone()), "field key")?,
                            decode_string(Some(v.clone()), "field value")?,
                        );
                    }
                }
            }

            messages.push(StreamMessage { id, fields });
        }

        batches.push(StreamBatch { name, messages });
    }

    Ok(Some(batches))
}

fn decode_string(value: Option<redis::Value>, what: &str) -> Result<String, StreamBusError> {
    match value {
        Some(redis::Value::Data(bytes)) => Ok(String::from_utf8_lossy(&bytes).to_string()),
        Some(redis::Value::Status(s)) => Ok(s),
        other => Err(StreamBusError::Transport(format!(
            "expected {what} as a string, got {other:?}"
        ))),
    }
}

/// Sync stream client with one cached connection.
pub struct StreamBusClient {
    client: redis::Client,
    connection: Mutex<Option<redis::Connection>>,
    config: StreamBusConfig,
}

impl StreamBusClient {
    pub fn new(config: StreamBusConfig) -> Result<Self, StreamBusError> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| StreamBusError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
            config,
        })
    }

    pub fn config(&self) -> &StreamBusConfig {
        &self.config
    }

    /// Establish the cached connection. Idempotent.
    pub fn connect(&self) -> Result<(), StreamBusError> {
        let mut guard = self.connection.lock().unwrap();
        self.ensure_connection(&mut guard).map(|_| ())
    }

    /// Drop the cached connection; the next call reconnects.
    pub fn close(&self) {
        *self.connection.lock().unwrap() = None;
        debug!("stream connection closed");
    }

    pub fn ping(&self) -> Result<(), StreamBusError> {
        let reply: String = self.query(redis::cmd("PING"))?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(StreamBusError::Transport(format!(
                "unexpected PING reply: {reply}"
            )))
        }
    }

    /// Append one JSON-serialized payload; returns the server-assigned id.
    pub fn xadd_json(
        &self,
        stream: &str,
        payload: &impl Serialize,
        maxlen_approx: Option<i64>,
    ) -> Result<String, StreamBusError> {
        let json = serde_json::to_string(payload)
            .map_err(|e| StreamBusError::Serialization(e.to_string()))?;
        self.query(xadd_cmd(stream, &json, maxlen_approx))
    }

    /// Idempotent consumer-group creation; BUSYGROUP is success.
    pub fn xgroup_create(
        &self,
        stream: &str,
        group: &str,
        start_id: &str,
        mkstream: bool,
    ) -> Result<(), StreamBusError> {
        let mut guard = self.connection.lock().unwrap();
        let conn = self.ensure_connection(&mut guard)?;

        let result: redis::RedisResult<String> =
            xgroup_create_cmd(stream, group, start_id, mkstream).query(conn);
        match result {
            Ok(_) => {
                info!(stream, group, "consumer group created");
                Ok(())
            }
            Err(e) if is_busygroup(&e) => {
                debug!(stream, group, "consumer group already exists");
                Ok(())
            }
            Err(e) => {
                Self::invalidate_on_io_error(&mut guard, &e);
                Err(StreamBusError::Transport(e.to_string()))
            }
        }
    }

    /// Blocking consumer-group read; `None` on timeout.
    pub fn xread_group(
        &self,
        group: &str,
        consumer: &str,
        stream: &str,
        id: &str,
        options: ReadOptions,
    ) -> Result<Option<Vec<StreamBatch>>, StreamBusError> {
        let block_ms = options.block_ms.unwrap_or(self.config.default_block_ms);
        let count = options.count.unwrap_or(self.config.default_count);

        let reply: redis::Value = self.query(xreadgroup_cmd(
            group,
            consumer,
            stream,
            id,
            Some(block_ms),
            Some(count),
        ))?;
        parse_read_reply(reply)
    }

    /// Acknowledge one entry; returns the server's ack count.
    pub fn xack(&self, stream: &str, group: &str, id: &str) -> Result<u64, StreamBusError> {
        self.query(xack_cmd(stream, group, id))
    }

    fn query<T: redis::FromRedisValue>(&self, cmd: redis::Cmd) -> Result<T, StreamBusError> {
        let mut guard = self.connection.lock().unwrap();
        let conn = self.ensure_connection(&mut guard)?;

        match cmd.query(conn) {
            Ok(value) => Ok(value),
            Err(e) => {
                Self::invalidate_on_io_error(&mut guard, &e);
                Err(StreamBusError::Transport(e.to_string()))
            }
        }
    }

    fn ensure_connection<'a>(
        &self,
        guard: &'a mut Option<redis::Connection>,
    ) -> Result<&'a mut redis::Connection, StreamBusError> {
        if guard.is_none() {
            let conn = self
                .client
                .get_connection()
                .map_err(|e| StreamBusError::Transport(e.to_string()))?;
            *guard = Some(conn);
        }
        Ok(guard.as_mut().unwrap())
    }

    fn invalidate_on_io_error(guard: &mut Option<redis::Connection>, err: &redis::RedisError) {
        if err.is_io_error() || err.is_connection_dropped() {
            *guard = None;
        }
    }
}
