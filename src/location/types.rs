//! Core types for address resolution.

use crate::error::ResolutionFailure;
use crate::geo::GeoPoint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which geocoder produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeocoderSource {
    Provincial,
    Nominatim,
    Manual,
}

impl fmt::Display for GeocoderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provincial => write!(f, "Adresse Québec"),
            Self::Nominatim => write!(f, "Nominatim"),
            Self::Manual => write!(f, "Manual"),
        }
    }
}

/// A successfully resolved address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAddress {
    pub latitude: f64,
    pub longitude: f64,
    pub formatted_address: String,
    pub municipality: Option<String>,
    pub city: Option<String>,
    /// Always computed from the coordinate, never taken from the geocoder.
    pub region: String,
    pub source: GeocoderSource,
}

impl ResolvedAddress {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Outcome envelope: `success=false` carries the reason and nothing else.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressResolution {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub municipality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Result<ResolvedAddress, ResolutionFailure>> for AddressResolution {
    fn from(result: &Result<ResolvedAddress, ResolutionFailure>) -> Self {
        match result {
            Ok(addr) => Self {
                success: true,
                latitude: Some(addr.latitude),
                longitude: Some(addr.longitude),
                formatted_address: Some(addr.formatted_address.clone()),
                municipality: addr.municipality.clone(),
                city: addr.city.clone(),
                region: Some(addr.region.clone()),
                error: None,
            },
            Err(err) => Self {
                success: false,
                latitude: None,
                longitude: None,
                formatted_address: None,
                municipality: None,
                city: None,
                region: None,
                error: Some(err.to_string()),
            },
        }
    }
}
