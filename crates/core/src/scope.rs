//! Scope identity: cities, deterministic scope ids, scope definitions.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::geo::{format_edge, BBox};

/// Version prefix baked into derived scope ids.
pub const SCOPE_ID_VERSION: &str = "v1";

/// Upper bound on scope identifiers, derived or external.
pub const MAX_SCOPE_ID_LEN: usize = 256;

/// Identifier of a city bucket (e.g. `"nyc"`).
///
/// Trimmed, non-empty. Cities are opaque routing keys here, not a registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct CityId(String);

impl CityId {
    pub fn new(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_id("cityId must be a non-empty string"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for CityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CityId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl FromStr for CityId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Identifier of a viewport scope.
///
/// Either derived deterministically from `(cityId, normalized bbox)` or
/// supplied verbatim by the client as an external key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct ScopeId(String);

impl ScopeId {
    /// Derive the canonical id for a city + normalized bbox.
    ///
    /// The bbox must already be normalized; edges are rendered with four
    /// fractional digits so equal grid cells produce equal ids.
    pub fn derive(city: &CityId, bbox: &BBox) -> Self {
        Self(format!(
            "{SCOPE_ID_VERSION}|{}|{}|{}|{}|{}",
            city.as_str(),
            format_edge(bbox.south),
            format_edge(bbox.west),
            format_edge(bbox.north),
            format_edge(bbox.east),
        ))
    }

    /// Accept a client-provided external key verbatim (1..=256 chars).
    pub fn external(key: impl Into<String>) -> DomainResult<Self> {
        let key = key.into();
        Self::try_from(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ScopeId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(DomainError::invalid_id("scope id must be non-empty"));
        }
        if value.len() > MAX_SCOPE_ID_LEN {
            return Err(DomainError::invalid_id(format!(
                "scope id must be at most {MAX_SCOPE_ID_LEN} chars, got {}",
                value.len()
            )));
        }
        Ok(Self(value))
    }
}

impl FromStr for ScopeId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_string())
    }
}

/// A provisioned viewport scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeDefinition {
    pub id: ScopeId,
    pub city_id: CityId,
    pub bbox: BBox,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn nyc() -> CityId {
        CityId::new("nyc").unwrap()
    }

    #[test]
    fn city_id_trims_and_rejects_empty() {
        assert_eq!(CityId::new("  nyc ").unwrap().as_str(), "nyc");
        assert!(CityId::new("").is_err());
        assert!(CityId::new("   ").is_err());
    }

    #[test]
    fn derived_id_matches_canonical_form() {
        let bbox = BBox::new(40.7, -74.02, 40.76, -73.96).normalized().unwrap();
        let id = ScopeId::derive(&nyc(), &bbox);
        assert_eq!(id.as_str(), "v1|nyc|40.7000|-74.0200|40.7600|-73.9600");
    }

    #[test]
    fn zoom_never_reaches_identity() {
        let plain = BBox::new(40.7, -74.02, 40.76, -73.96).normalized().unwrap();
        let zoomed = BBox::new(40.7, -74.02, 40.76, -73.96)
            .with_zoom(5)
            .normalized()
            .unwrap();
        assert_eq!(ScopeId::derive(&nyc(), &plain), ScopeId::derive(&nyc(), &zoomed));
    }

    #[test]
    fn external_keys_are_bounded() {
        assert!(ScopeId::external("k").is_ok());
        assert!(ScopeId::external("x".repeat(256)).is_ok());
        assert!(ScopeId::external("").is_err());
        assert!(ScopeId::external("x".repeat(257)).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: deriving twice from the same normalized bbox is stable,
        /// and re-normalizing does not change the id.
        #[test]
        fn derivation_is_deterministic(
            south in -80.0f64..80.0,
            west in -170.0f64..170.0,
            dlat in 0.001f64..5.0,
            dlng in 0.001f64..5.0,
        ) {
            let bbox = BBox::new(south, west, south + dlat, west + dlng)
                .normalized()
                .unwrap();
            let a = ScopeId::derive(&nyc(), &bbox);
            let b = ScopeId::derive(&nyc(), &bbox.normalized().unwrap());
            prop_assert_eq!(a, b);
        }
    }
}
