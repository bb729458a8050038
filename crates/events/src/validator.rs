//! Envelope validation.
//!
//! Parses an untyped JSON value against the envelope contract, collecting
//! every violation instead of stopping at the first. Invalid envelopes are
//! logged and discarded by the consumer; they are never worth a redelivery.

use serde_json::Value;

use railview_core::parse_utc_z;

use crate::envelope::{EventEnvelope, SCHEMA_VERSION};

/// Recognized values of the `kind` tag.
const KINDS: [&str; 2] = ["vehicle.upsert", "vehicle.remove"];

/// Recognized vehicle status values.
const STATUSES: [&str; 4] = ["in_service", "out_of_service", "layover", "deadhead"];

/// Validate an untyped envelope and classify it as a recognized event.
///
/// Returns the typed envelope, or every violation found.
pub fn validate(value: &Value) -> Result<EventEnvelope, Vec<String>> {
    let mut errors = Vec::new();

    let Some(root) = value.as_object() else {
        return Err(vec!["envelope must be a JSON object".to_string()]);
    };

    match root.get("schemaVersion").and_then(Value::as_str) {
        Some(SCHEMA_VERSION) => {}
        Some(other) => errors.push(format!(
            "schemaVersion: unknown version {other:?}, expected {SCHEMA_VERSION:?}"
        )),
        None => errors.push("schemaVersion: missing or not a string".to_string()),
    }

    let Some(data) = root.get("data").and_then(Value::as_object) else {
        errors.push("data: missing or not an object".to_string());
        return Err(errors);
    };

    let kind = match data.get("kind").and_then(Value::as_str) {
        Some(k) if KINDS.contains(&k) => Some(k),
        Some(other) => {
            errors.push(format!("data.kind: unknown kind {other:?}"));
            None
        }
        None => {
            errors.push("data.kind: missing or not a string".to_string());
            None
        }
    };

    check_timestamp(data.get("at"), "data.at", &mut errors);
    check_non_empty_string(data.get("cityId"), "data.cityId", &mut errors);
    check_non_empty_string(data.get("source"), "data.source", &mut errors);

    match data.get("payload").and_then(Value::as_object) {
        Some(payload) => {
            check_non_empty_string(payload.get("id"), "data.payload.id", &mut errors);
            if kind == Some("vehicle.upsert") {
                check_position(payload, &mut errors);
            }
        }
        None => errors.push("data.payload: missing or not an object".to_string()),
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    // Field checks passed; the typed parse should only fail on shapes the
    // checks cannot express (e.g. wrong JSON type for an optional field).
    serde_json::from_value::<EventEnvelope>(value.clone())
        .map_err(|e| vec![format!("envelope: {e}")])
}

fn check_non_empty_string(value: Option<&Value>, path: &str, errors: &mut Vec<String>) {
    match value.and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => {}
        Some(_) => errors.push(format!("{path}: must be a non-empty string")),
        None => errors.push(format!("{path}: missing or not a string")),
    }
}

fn check_timestamp(value: Option<&Value>, path: &str, errors: &mut Vec<String>) {
    match value.and_then(Value::as_str) {
        Some(s) => {
            if let Err(e) = parse_utc_z(s) {
                errors.push(format!("{path}: {e}"));
            }
        }
        None => errors.push(format!("{path}: missing or not a string")),
    }
}

fn check_position(payload: &serde_json::Map<String, Value>, errors: &mut Vec<String>) {
    match payload.get("coordinate").and_then(Value::as_object) {
        Some(coord) => {
            check_range(coord.get("lat"), "data.payload.coordinate.lat", -90.0, 90.0, errors);
            check_range(coord.get("lng"), "data.payload.coordinate.lng", -180.0, 180.0, errors);
        }
        None => errors.push("data.payload.coordinate: missing or not an object".to_string()),
    }

    check_timestamp(payload.get("updatedAt"), "data.payload.updatedAt", errors);

    if let Some(bearing) = payload.get("bearing") {
        match bearing.as_f64() {
            Some(b) if (0.0..360.0).contains(&b) => {}
            _ => errors.push("data.payload.bearing: must be within [0, 360)".to_string()),
        }
    }

    if let Some(speed) = payload.get("speedMps") {
        match speed.as_f64() {
            Some(s) if s >= 0.0 => {}
            _ => errors.push("data.payload.speedMps: must be a non-negative number".to_string()),
        }
    }

    if let Some(status) = payload.get("status") {
        match status.as_str() {
            Some(s) if STATUSES.contains(&s) => {}
            _ => errors.push(format!(
                "data.payload.status: must be one of {}",
                STATUSES.join(", ")
            )),
        }
    }

    for field in ["tripId", "routeId"] {
        if let Some(v) = payload.get(field) {
            if !v.is_string() {
                errors.push(format!("data.payload.{field}: must be a string"));
            }
        }
    }
}

fn check_range(value: Option<&Value>, path: &str, min: f64, max: f64, errors: &mut Vec<String>) {
    match value.and_then(Value::as_f64) {
        Some(v) if (min..=max).contains(&v) => {}
        Some(v) => errors.push(format!("{path}: must be within [{min}, {max}], got {v}")),
        None => errors.push(format!("{path}: missing or not a number")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::TransitEvent;

    fn valid_upsert() -> Value {
        serde_json::json!({
            "schemaVersion": "1",
            "data": {
                "kind": "vehicle.upsert",
                "at": "2024-01-01T00:00:00Z",
                "cityId": "nyc",
                "source": "test",
                "payload": {
                    "id": "V1",
                    "coordinate": { "lat": 40.75, "lng": -73.98 },
                    "updatedAt": "2024-01-01T00:00:00Z",
                    "bearing": 359.9,
                    "speedMps": 4.2,
                    "status": "in_service"
                }
            }
        })
    }

    fn errors_of(v: Value) -> Vec<String> {
        validate(&v).unwrap_err()
    }

    #[test]
    fn accepts_a_valid_upsert() {
        let env = validate(&valid_upsert()).unwrap();
        assert!(matches!(env.data, TransitEvent::VehicleUpsert(_)));
    }

    #[test]
    fn accepts_a_valid_remove() {
        let v = serde_json::json!({
            "schemaVersion": "1",
            "data": {
                "kind": "vehicle.remove",
                "at": "2024-01-01T00:00:00Z",
                "cityId": "nyc",
                "source": "test",
                "payload": { "id": "V1" }
            }
        });
        let env = validate(&v).unwrap();
        assert!(matches!(env.data, TransitEvent::VehicleRemove(_)));
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let mut v = valid_upsert();
        v["schemaVersion"] = serde_json::json!("2");
        let errs = errors_of(v);
        assert!(errs.iter().any(|e| e.starts_with("schemaVersion:")));
    }

    #[test]
    fn rejects_unknown_kind() {
        let mut v = valid_upsert();
        v["data"]["kind"] = serde_json::json!("vehicle.teleport");
        let errs = errors_of(v);
        assert!(errs.iter().any(|e| e.contains("unknown kind")));
    }

    #[test]
    fn rejects_offset_timestamps() {
        let mut v = valid_upsert();
        v["data"]["at"] = serde_json::json!("2024-01-01T02:00:00+02:00");
        let errs = errors_of(v);
        assert!(errs.iter().any(|e| e.starts_with("data.at:")));
    }

    #[test]
    fn rejects_missing_city_and_source() {
        let mut v = valid_upsert();
        v["data"].as_object_mut().unwrap().remove("cityId");
        v["data"]["source"] = serde_json::json!("   ");
        let errs = errors_of(v);
        assert!(errs.iter().any(|e| e.starts_with("data.cityId:")));
        assert!(errs.iter().any(|e| e.starts_with("data.source:")));
    }

    #[test]
    fn rejects_out_of_range_coordinate() {
        let mut v = valid_upsert();
        v["data"]["payload"]["coordinate"]["lat"] = serde_json::json!(90.5);
        let errs = errors_of(v);
        assert!(errs.iter().any(|e| e.contains("coordinate.lat")));
    }

    #[test]
    fn rejects_bearing_of_exactly_360() {
        let mut v = valid_upsert();
        v["data"]["payload"]["bearing"] = serde_json::json!(360.0);
        let errs = errors_of(v);
        assert!(errs.iter().any(|e| e.contains("bearing")));
    }

    #[test]
    fn rejects_negative_speed_and_bad_status() {
        let mut v = valid_upsert();
        v["data"]["payload"]["speedMps"] = serde_json::json!(-1.0);
        v["data"]["payload"]["status"] = serde_json::json!("parked");
        let errs = errors_of(v);
        assert!(errs.iter().any(|e| e.contains("speedMps")));
        assert!(errs.iter().any(|e| e.contains("status")));
    }

    #[test]
    fn collects_multiple_errors_in_one_pass() {
        let v = serde_json::json!({
            "schemaVersion": "9",
            "data": {
                "kind": "vehicle.upsert",
                "at": "nope",
                "cityId": "",
                "source": "test",
                "payload": {
                    "id": "V1",
                    "coordinate": { "lat": 200, "lng": 0 },
                    "updatedAt": "2024-01-01T00:00:00Z"
                }
            }
        });
        let errs = errors_of(v);
        assert!(errs.len() >= 3, "expected several errors, got {errs:?}");
    }

    #[test]
    fn non_object_envelope_is_rejected() {
        assert!(validate(&serde_json::json!("hello")).is_err());
        assert!(validate(&serde_json::json!(null)).is_err());
    }
}
