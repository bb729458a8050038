//! Viewport request parsing and validation.
//!
//! The provisioning body is parsed from untyped JSON so every violation can
//! be reported with its path, in one pass, in the documented error shape.

use serde::Serialize;
use serde_json::Value;

use railview_core::{BBox, CityId, NormalizeError, ScopeId, MAX_SCOPE_ID_LEN, MAX_ZOOM};

/// One validation finding: `{path, message, code}` on the wire.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ValidationDetail {
    pub path: String,
    pub message: String,
    pub code: &'static str,
}

impl ValidationDetail {
    fn new(path: impl Into<String>, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            code,
        }
    }
}

/// A validated provisioning request: city, normalized bbox, and the scope id
/// it addresses (derived, or the external key verbatim).
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportRequest {
    pub city_id: CityId,
    pub bbox: BBox,
    pub scope_id: ScopeId,
}

/// Parse and validate a provisioning body.
///
/// The returned bbox is already clamped and quantized.
pub fn parse_viewport(body: &Value) -> Result<ViewportRequest, Vec<ValidationDetail>> {
    let mut details = Vec::new();

    let Some(root) = body.as_object() else {
        return Err(vec![ValidationDetail::new(
            "",
            "request body must be a JSON object",
            "invalid_type",
        )]);
    };

    let city_id = match root.get("cityId") {
        Some(Value::String(s)) if !s.trim().is_empty() => CityId::new(s.clone()).ok(),
        Some(Value::String(_)) => {
            details.push(ValidationDetail::new(
                "cityId",
                "cityId must be a non-empty string",
                "too_small",
            ));
            None
        }
        _ => {
            details.push(ValidationDetail::new(
                "cityId",
                "cityId must be a non-empty string",
                "invalid_type",
            ));
            None
        }
    };

    let bbox = parse_bbox(root.get("bbox"), &mut details);

    let external_scope_key = match root.get("externalScopeKey") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if !s.is_empty() && s.len() <= MAX_SCOPE_ID_LEN => {
            Some(s.clone())
        }
        Some(Value::String(_)) => {
            details.push(ValidationDetail::new(
                "externalScopeKey",
                format!("externalScopeKey must be 1..{MAX_SCOPE_ID_LEN} characters"),
                "too_big",
            ));
            None
        }
        Some(_) => {
            details.push(ValidationDetail::new(
                "externalScopeKey",
                "externalScopeKey must be a string",
                "invalid_type",
            ));
            None
        }
    };

    let (Some(city_id), Some(bbox)) = (city_id, bbox) else {
        return Err(details);
    };
    if !details.is_empty() {
        return Err(details);
    }

    let scope_id = match external_scope_key {
        Some(key) => match ScopeId::external(key) {
            Ok(id) => id,
            Err(e) => {
                details.push(ValidationDetail::new("externalScopeKey", e.to_string(), "custom"));
                return Err(details);
            }
        },
        None => ScopeId::derive(&city_id, &bbox),
    };

    Ok(ViewportRequest {
        city_id,
        bbox,
        scope_id,
    })
}

fn parse_bbox(value: Option<&Value>, details: &mut Vec<ValidationDetail>) -> Option<BBox> {
    let Some(obj) = value.and_then(Value::as_object) else {
        details.push(ValidationDetail::new(
            "bbox",
            "bbox must be an object",
            "invalid_type",
        ));
        return None;
    };

    let mut edge = |name: &str| -> Option<f64> {
        match obj.get(name).and_then(Value::as_f64) {
            Some(v) if v.is_finite() => Some(v),
            _ => {
                details.push(ValidationDetail::new(
                    format!("bbox.{name}"),
                    format!("{name} must be a finite number"),
                    "invalid_type",
                ));
                None
            }
        }
    };

    let south = edge("south");
    let west = edge("west");
    let north = edge("north");
    let east = edge("east");

    let zoom = match obj.get("zoom") {
        None | Some(Value::Null) => None,
        Some(v) => match v.as_u64() {
            Some(z) if z <= MAX_ZOOM as u64 => Some(z as u8),
            _ => {
                details.push(ValidationDetail::new(
                    "bbox.zoom",
                    format!("zoom must be an integer within [0, {MAX_ZOOM}]"),
                    "out_of_range",
                ));
                None
            }
        },
    };

    let (south, west, north, east) = (south?, west?, north?, east?);

    let mut bbox = BBox::new(south, west, north, east);
    bbox.zoom = zoom;

    match bbox.normalized() {
        Ok(normalized) => Some(normalized),
        Err(NormalizeError::NorthLessThanSouth) => {
            details.push(ValidationDetail::new(
                "bbox.north",
                "north must be >= south",
                "custom",
            ));
            None
        }
        Err(NormalizeError::EastLessThanWest) => {
            details.push(ValidationDetail::new(
                "bbox.east",
                "east must be >= west",
                "custom",
            ));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_body() -> Value {
        serde_json::json!({
            "cityId": "nyc",
            "bbox": { "south": 40.7, "west": -74.02, "north": 40.76, "east": -73.96, "zoom": 12 }
        })
    }

    #[test]
    fn accepts_a_valid_request_and_normalizes() {
        let req = parse_viewport(&valid_body()).unwrap();
        assert_eq!(req.city_id.as_str(), "nyc");
        assert_eq!(req.bbox.zoom, Some(12));
        assert_eq!(
            req.scope_id.as_str(),
            "v1|nyc|40.7000|-74.0200|40.7600|-73.9600"
        );
    }

    #[test]
    fn zoom_does_not_change_the_scope_id() {
        let mut other = valid_body();
        other["bbox"]["zoom"] = serde_json::json!(5);

        let a = parse_viewport(&valid_body()).unwrap();
        let b = parse_viewport(&other).unwrap();
        assert_eq!(a.scope_id, b.scope_id);
    }

    #[test]
    fn inverted_north_reports_the_documented_detail() {
        let body = serde_json::json!({
            "cityId": "nyc",
            "bbox": { "south": 1, "west": 0, "north": 0, "east": 1 }
        });
        let details = parse_viewport(&body).unwrap_err();

        let north = details.iter().find(|d| d.path == "bbox.north").unwrap();
        assert!(north.message.contains("north must be >= south"));
    }

    #[test]
    fn out_of_range_edges_are_clamped_not_rejected() {
        let body = serde_json::json!({
            "cityId": "nyc",
            "bbox": { "south": -100, "west": -181, "north": 100, "east": 181 }
        });
        let req = parse_viewport(&body).unwrap();

        assert_eq!(format!("{:.4}", req.bbox.south), "-85.0511");
        assert_eq!(format!("{:.4}", req.bbox.north), "85.0511");
        assert_eq!(req.bbox.west, -180.0);
        assert_eq!(req.bbox.east, 180.0);
    }

    #[test]
    fn missing_city_and_bad_zoom_are_both_reported() {
        let body = serde_json::json!({
            "bbox": { "south": 0, "west": 0, "north": 1, "east": 1, "zoom": 25 }
        });
        let details = parse_viewport(&body).unwrap_err();

        assert!(details.iter().any(|d| d.path == "cityId"));
        assert!(details.iter().any(|d| d.path == "bbox.zoom"));
    }

    #[test]
    fn external_scope_key_overrides_derivation() {
        let mut body = valid_body();
        body["externalScopeKey"] = serde_json::json!("ops:dashboard:42");
        let req = parse_viewport(&body).unwrap();
        assert_eq!(req.scope_id.as_str(), "ops:dashboard:42");
    }

    #[test]
    fn oversized_external_scope_key_is_rejected() {
        let mut body = valid_body();
        body["externalScopeKey"] = serde_json::json!("x".repeat(257));
        let details = parse_viewport(&body).unwrap_err();
        assert!(details.iter().any(|d| d.path == "externalScopeKey"));
    }

    #[test]
    fn non_object_body_is_rejected() {
        assert!(parse_viewport(&serde_json::json!("nope")).is_err());
        assert!(parse_viewport(&serde_json::json!(null)).is_err());
    }

    #[test]
    fn missing_bbox_edges_are_reported_by_path() {
        let body = serde_json::json!({ "cityId": "nyc", "bbox": { "south": 0, "west": 0 } });
        let details = parse_viewport(&body).unwrap_err();
        assert!(details.iter().any(|d| d.path == "bbox.north"));
        assert!(details.iter().any(|d| d.path == "bbox.east"));
    }
}
