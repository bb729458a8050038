//! Geographic primitives: coordinates, bounding boxes, viewport normalization.
//!
//! Viewport normalization is the identity-bearing operation of the system:
//! two clients whose viewports land on the same quantized grid cell share a
//! scope. The pipeline is clamp (Web-Mercator bounds) then quantize (1e-4
//! degree grid, ~11 m), and it is idempotent.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{DomainError, DomainResult};

/// Latitude bound usable in Web-Mercator tiling math.
pub const WEB_MERCATOR_MAX_LAT: f64 = 85.05112878;

/// Quantization grid for bbox edges, in degrees (~11 m at the equator).
pub const COORD_GRID: f64 = 1e-4;

/// Maximum zoom hint accepted on a viewport.
pub const MAX_ZOOM: u8 = 22;

/// A WGS84 point.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> DomainResult<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(DomainError::validation(format!(
                "lat must be within [-90, 90], got {lat}"
            )));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(DomainError::validation(format!(
                "lng must be within [-180, 180], got {lng}"
            )));
        }
        Ok(Self { lat, lng })
    }
}

/// A geographic bounding box, optionally carrying a zoom hint.
///
/// `zoom` is advisory only and never participates in scope identity.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<u8>,
}

/// Normalization failure: the box degenerated after clamp + quantize.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("north must be >= south")]
    NorthLessThanSouth,

    #[error("east must be >= west")]
    EastLessThanWest,
}

impl BBox {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
            zoom: None,
        }
    }

    pub fn with_zoom(mut self, zoom: u8) -> Self {
        self.zoom = Some(zoom);
        self
    }

    /// Inclusive membership test on all four edges.
    pub fn contains(&self, point: &Coordinate) -> bool {
        self.south <= point.lat
            && point.lat <= self.north
            && self.west <= point.lng
            && point.lng <= self.east
    }

    /// Clamp to Web-Mercator bounds and snap every edge to the 1e-4 grid.
    ///
    /// Fails when the box is degenerate after quantization (`north < south`
    /// or `east < west`). The zoom hint is carried through untouched.
    pub fn normalized(&self) -> Result<BBox, NormalizeError> {
        let south = quantize(clamp_lat(self.south));
        let north = quantize(clamp_lat(self.north));
        let west = quantize(clamp_lng(self.west));
        let east = quantize(clamp_lng(self.east));

        if north < south {
            return Err(NormalizeError::NorthLessThanSouth);
        }
        if east < west {
            return Err(NormalizeError::EastLessThanWest);
        }

        Ok(BBox {
            south,
            west,
            north,
            east,
            zoom: self.zoom,
        })
    }
}

pub fn clamp_lat(lat: f64) -> f64 {
    lat.clamp(-WEB_MERCATOR_MAX_LAT, WEB_MERCATOR_MAX_LAT)
}

pub fn clamp_lng(lng: f64) -> f64 {
    lng.clamp(-180.0, 180.0)
}

/// Snap a value to the quantization grid.
pub fn quantize(v: f64) -> f64 {
    let q = (v / COORD_GRID).round() * COORD_GRID;
    // Collapse -0.0 so it cannot leak into scope identifiers.
    if q == 0.0 { 0.0 } else { q }
}

/// Render a quantized edge with exactly four fractional digits.
///
/// This is the canonical textual form used in scope identifiers.
pub fn format_edge(v: f64) -> String {
    format!("{v:.4}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn coordinate_rejects_out_of_range() {
        assert!(Coordinate::new(90.1, 0.0).is_err());
        assert!(Coordinate::new(-90.1, 0.0).is_err());
        assert!(Coordinate::new(0.0, 180.5).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(90.0, -180.0).is_ok());
    }

    #[test]
    fn contains_is_inclusive_on_edges() {
        let b = BBox::new(40.7, -74.02, 40.76, -73.96);
        assert!(b.contains(&Coordinate { lat: 40.7, lng: -74.02 }));
        assert!(b.contains(&Coordinate { lat: 40.76, lng: -73.96 }));
        assert!(b.contains(&Coordinate { lat: 40.73, lng: -74.0 }));
        assert!(!b.contains(&Coordinate { lat: 40.6999, lng: -74.0 }));
        assert!(!b.contains(&Coordinate { lat: 40.73, lng: -73.9599 }));
    }

    #[test]
    fn normalize_clamps_to_web_mercator() {
        let b = BBox::new(-100.0, -181.0, 100.0, 181.0).normalized().unwrap();
        assert_eq!(b.south, quantize(-WEB_MERCATOR_MAX_LAT));
        assert_eq!(b.north, quantize(WEB_MERCATOR_MAX_LAT));
        assert_eq!(b.west, -180.0);
        assert_eq!(b.east, 180.0);
        assert_eq!(format_edge(b.south), "-85.0511");
        assert_eq!(format_edge(b.north), "85.0511");
    }

    #[test]
    fn normalize_rejects_inverted_boxes() {
        assert_eq!(
            BBox::new(1.0, 0.0, 0.0, 1.0).normalized().unwrap_err(),
            NormalizeError::NorthLessThanSouth
        );
        assert_eq!(
            BBox::new(0.0, 1.0, 1.0, 0.0).normalized().unwrap_err(),
            NormalizeError::EastLessThanWest
        );
    }

    #[test]
    fn normalize_keeps_zoom_hint() {
        let b = BBox::new(40.7, -74.02, 40.76, -73.96)
            .with_zoom(12)
            .normalized()
            .unwrap();
        assert_eq!(b.zoom, Some(12));
    }

    #[test]
    fn edge_formatting_pads_to_four_digits() {
        assert_eq!(format_edge(quantize(40.7)), "40.7000");
        assert_eq!(format_edge(quantize(-74.02)), "-74.0200");
        assert_eq!(format_edge(quantize(0.0)), "0.0000");
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: normalization is idempotent for any box that normalizes.
        #[test]
        fn normalize_is_idempotent(
            south in -120.0f64..120.0,
            west in -200.0f64..200.0,
            dlat in 0.0f64..10.0,
            dlng in 0.0f64..10.0,
        ) {
            let b = BBox::new(south, west, south + dlat, west + dlng);
            if let Ok(once) = b.normalized() {
                let twice = once.normalized().unwrap();
                prop_assert_eq!(once, twice);
            }
        }

        /// Property: quantized edges are within half a grid step of the input.
        #[test]
        fn quantize_stays_on_grid(v in -180.0f64..180.0) {
            let q = quantize(v);
            prop_assert!((q - v).abs() <= COORD_GRID / 2.0 + f64::EPSILON);
            prop_assert_eq!(quantize(q), q);
        }
    }
}
