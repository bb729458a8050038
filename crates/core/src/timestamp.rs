//! Timestamp discipline for wire payloads.
//!
//! Event timestamps are ISO-8601 UTC with a literal `Z` suffix. Offsets other
//! than `Z` are rejected even when they denote UTC, and years outside
//! 1800–9999 are rejected as sensor garbage.

use chrono::{DateTime, Datelike, Utc};

use crate::error::{DomainError, DomainResult};

pub const MIN_YEAR: i32 = 1800;
pub const MAX_YEAR: i32 = 9999;

/// Parse a wire timestamp, enforcing the `Z` suffix and year bounds.
pub fn parse_utc_z(s: &str) -> DomainResult<DateTime<Utc>> {
    if !s.ends_with('Z') {
        return Err(DomainError::validation(format!(
            "timestamp must be UTC with a 'Z' suffix, got {s:?}"
        )));
    }

    let parsed = DateTime::parse_from_rfc3339(s)
        .map_err(|e| DomainError::validation(format!("malformed timestamp {s:?}: {e}")))?;

    let utc = parsed.with_timezone(&Utc);
    let year = utc.year();
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(DomainError::validation(format!(
            "timestamp year must be within [{MIN_YEAR}, {MAX_YEAR}], got {year}"
        )));
    }

    Ok(utc)
}
