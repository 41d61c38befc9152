//! Address resolver: orchestrates the geocoder fallback chain.
//!
//! Flow: province hint → provincial geocoder → Nominatim (province-checked) → error

use super::providers::{self, PROVINCE_SUFFIX};
use super::types::{GeocoderSource, ResolvedAddress};
use crate::error::ResolutionFailure;
use crate::geo::{region_label, GeoPoint};
use crate::sources::http::HttpClient;

/// Substrings that already anchor an address to the province.
const PROVINCE_HINTS: &[&str] = &[
    "québec",
    "quebec",
    "qc",
    "montréal",
    "montreal",
    "sherbrooke",
    "quebec city",
];

/// Narrower set re-checked before the backup geocoder.
const BACKUP_PROVINCE_HINTS: &[&str] = &["québec", "quebec", "qc"];

/// Resolves free text to a coordinate inside the province.
#[derive(Clone)]
pub struct AddressResolver {
    client: HttpClient,
    provincial_url: String,
    nominatim_url: String,
}

impl AddressResolver {
    pub fn new(client: HttpClient, provincial_url: impl Into<String>, nominatim_url: impl Into<String>) -> Self {
        Self {
            client,
            provincial_url: provincial_url.into(),
            nominatim_url: nominatim_url.into(),
        }
    }

    /// Resolve an address through the full fallback chain.
    pub fn resolve(&self, raw_address: &str) -> Result<ResolvedAddress, ResolutionFailure> {
        let trimmed = raw_address.trim();
        if trimmed.is_empty() {
            return Err(ResolutionFailure::NoInput);
        }
        let query = with_province_hint(trimmed, PROVINCE_HINTS);

        // 1. Provincial geocoder
        tracing::info!(address = %query, "geocoding with provincial service");
        match providers::provincial_geocode(&self.client, &self.provincial_url, &query) {
            Ok(Some(resolved)) => {
                tracing::info!(
                    lat = resolved.latitude,
                    lon = resolved.longitude,
                    region = %resolved.region,
                    "provincial geocoding succeeded"
                );
                return Ok(resolved);
            }
            Ok(None) => tracing::warn!("no provincial match, trying Nominatim"),
            Err(err) => tracing::warn!(error = %err, "provincial geocoder unavailable, trying Nominatim"),
        }

        // 2. Nominatim, rejected when it lands outside the province
        let backup_query = with_province_hint(&query, BACKUP_PROVINCE_HINTS);
        tracing::info!(address = %backup_query, "geocoding with Nominatim");
        let resolved = providers::nominatim_geocode(&self.client, &self.nominatim_url, &backup_query)
            .inspect_err(|err| tracing::error!(error = %err, "address resolution failed"))?;
        tracing::info!(
            lat = resolved.latitude,
            lon = resolved.longitude,
            region = %resolved.region,
            "Nominatim geocoding succeeded"
        );
        Ok(resolved)
    }

    /// Build a resolution from known coordinates, skipping the geocoders.
    pub fn from_coordinates(
        point: GeoPoint,
        municipality: Option<&str>,
    ) -> Result<ResolvedAddress, ResolutionFailure> {
        if !point.is_valid() {
            return Err(ResolutionFailure::InvalidCoordinates);
        }
        let municipality = municipality
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);
        let formatted_address = match &municipality {
            Some(m) => format!("{:.6}, {:.6} ({}, {})", point.latitude, point.longitude, m, PROVINCE_SUFFIX),
            None => format!("{:.6}, {:.6}", point.latitude, point.longitude),
        };
        Ok(ResolvedAddress {
            latitude: point.latitude,
            longitude: point.longitude,
            formatted_address,
            city: municipality.clone(),
            municipality,
            region: region_label(point).to_string(),
            source: GeocoderSource::Manual,
        })
    }
}

/// Append the province when none of `hints` occurs in the text
/// (case-insensitive), so national geocoders don't pick another jurisdiction.
pub fn with_province_hint(address: &str, hints: &[&str]) -> String {
    let lower = address.to_lowercase();
    if hints.iter().any(|hint| lower.contains(hint)) {
        address.to_string()
    } else {
        format!("{}, {}", address, PROVINCE_SUFFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use std::time::Duration;

    fn unreachable_resolver() -> AddressResolver {
        let client = HttpClient::new(&HttpConfig {
            timeout: Duration::from_secs(2),
            ..HttpConfig::default()
        });
        AddressResolver::new(client, "http://127.0.0.1:9/geocoder", "http://127.0.0.1:9/nominatim")
    }

    #[test]
    fn test_hint_appended() {
        assert_eq!(
            with_province_hint("1000 rue Sainte-Catherine", PROVINCE_HINTS),
            "1000 rue Sainte-Catherine, Québec, Canada"
        );
    }

    #[test]
    fn test_hint_kept_when_present() {
        assert_eq!(
            with_province_hint("1000 rue Sainte-Catherine, Montréal", PROVINCE_HINTS),
            "1000 rue Sainte-Catherine, Montréal"
        );
        assert_eq!(with_province_hint("12 rue King, QC", PROVINCE_HINTS), "12 rue King, QC");
    }

    #[test]
    fn test_backup_hint_narrower() {
        assert_eq!(
            with_province_hint("1 rue Wellington, Sherbrooke", BACKUP_PROVINCE_HINTS),
            "1 rue Wellington, Sherbrooke, Québec, Canada"
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(unreachable_resolver().resolve("   "), Err(ResolutionFailure::NoInput));
    }

    #[test]
    fn test_both_geocoders_down() {
        let result = unreachable_resolver().resolve("1 rue Nulle Part");
        assert!(matches!(result, Err(ResolutionFailure::Geocoder(_))));
    }

    #[test]
    fn test_manual_coordinates() {
        let resolved =
            AddressResolver::from_coordinates(GeoPoint::new(45.5088, -73.5540), Some("Montréal")).unwrap();
        assert_eq!(resolved.source, GeocoderSource::Manual);
        assert_eq!(resolved.region, "Montréal");
        assert_eq!(resolved.municipality.as_deref(), Some("Montréal"));
    }

    #[test]
    fn test_manual_rejects_out_of_range() {
        let result = AddressResolver::from_coordinates(GeoPoint::new(120.0, -73.0), None);
        assert_eq!(result, Err(ResolutionFailure::InvalidCoordinates));
    }
}
