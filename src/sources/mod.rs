//! Risk-domain source connectors.
//!
//! Every connector answers one question about a coordinate by walking an
//! ordered list of tiers (live service, regional dataset, geographic
//! heuristic) and returning the first usable answer. When every tier comes
//! up empty the connector still returns a record, tagged
//! [`DataQuality::Indisponible`].

pub mod air_quality;
pub mod arcgis;
pub mod ckan;
pub mod contamination;
pub mod crime;
pub mod disaster;
pub mod flood;
pub mod http;
pub mod hydrants;
pub mod overpass;
pub mod property;
pub mod seismic;
pub mod services;

use crate::error::SourceUnavailable;
use crate::geo::{region_label, region_of, GeoPoint, Region};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence of a domain result, by the tier that produced it.
///
/// Declared lowest first so that `Haute` compares greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataQuality {
    Indisponible,
    Basse,
    Moyenne,
    Haute,
}

impl fmt::Display for DataQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Haute => "Haute",
            Self::Moyenne => "Moyenne",
            Self::Basse => "Basse",
            Self::Indisponible => "Indisponible",
        };
        f.write_str(s)
    }
}

/// Per-domain risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Unknown,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Input of one connector call.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub point: GeoPoint,
    pub municipality: Option<String>,
    /// Overrides the connector's default search radius, in meters.
    pub radius_m: Option<f64>,
}

impl FetchRequest {
    pub fn new(point: GeoPoint) -> Self {
        Self { point, municipality: None, radius_m: None }
    }

    pub fn with_municipality(mut self, municipality: Option<String>) -> Self {
        self.municipality = municipality;
        self
    }

    pub fn with_radius(mut self, radius_m: f64) -> Self {
        self.radius_m = Some(radius_m);
        self
    }

    pub fn radius_or(&self, default_m: f64) -> f64 {
        self.radius_m.filter(|r| r.is_finite() && *r > 0.0).unwrap_or(default_m)
    }

    pub fn region(&self) -> &'static str {
        region_label(self.point)
    }

    /// Classified region, `None` when undetermined.
    pub fn region_kind(&self) -> Option<Region> {
        region_of(self.point).ok()
    }

    /// In the Montréal region, or the municipality names the city.
    pub fn in_montreal(&self) -> bool {
        self.region_kind() == Some(Region::Montreal)
            || self.municipality_mentions("montréal")
            || self.municipality_mentions("montreal")
    }

    pub fn municipality_mentions(&self, needle: &str) -> bool {
        self.municipality
            .as_deref()
            .is_some_and(|m| m.to_lowercase().contains(needle))
    }
}

/// Fields every domain result carries.
pub trait DomainRecord: Sized + Send + 'static {
    const DOMAIN: &'static str;

    /// Terminal record returned when every tier failed; cannot fail itself.
    fn unavailable(region: &str) -> Self;

    fn source(&self) -> &str;

    fn data_quality(&self) -> DataQuality;
}

/// A blocking connector for one risk domain.
pub trait SourceConnector: Send + Sync + 'static {
    type Output: DomainRecord;

    /// Never fails: walks the tiers and falls back to the terminal record.
    fn fetch(&self, request: &FetchRequest) -> Self::Output;
}

type TierResult<T> = Result<Option<T>, SourceUnavailable>;

struct Tier<'a, T> {
    name: &'static str,
    attempt: Box<dyn FnOnce() -> TierResult<T> + 'a>,
}

/// Ordered tier attempts; the first `Ok(Some(_))` wins.
///
/// Each tier runs at most once. An error or an empty answer moves on to the
/// next tier; errors are logged and dropped here.
pub struct FallbackChain<'a, T: DomainRecord> {
    tiers: Vec<Tier<'a, T>>,
}

impl<'a, T: DomainRecord> FallbackChain<'a, T> {
    pub fn new() -> Self {
        Self { tiers: Vec::new() }
    }

    pub fn tier(mut self, name: &'static str, attempt: impl FnOnce() -> TierResult<T> + 'a) -> Self {
        self.tiers.push(Tier { name, attempt: Box::new(attempt) });
        self
    }

    /// Run the tiers in order, else build the terminal record for `region`.
    pub fn run(self, region: &str) -> T {
        for tier in self.tiers {
            tracing::debug!(domain = T::DOMAIN, tier = tier.name, "trying tier");
            match (tier.attempt)() {
                Ok(Some(result)) => {
                    tracing::info!(
                        domain = T::DOMAIN,
                        tier = tier.name,
                        quality = %result.data_quality(),
                        "tier answered"
                    );
                    return result;
                }
                Ok(None) => {
                    tracing::debug!(domain = T::DOMAIN, tier = tier.name, "tier had no data");
                }
                Err(err) => {
                    tracing::warn!(domain = T::DOMAIN, tier = tier.name, error = %err, "tier unavailable");
                }
            }
        }
        tracing::warn!(domain = T::DOMAIN, region, "all tiers exhausted, data unavailable");
        T::unavailable(region)
    }
}

impl<T: DomainRecord> Default for FallbackChain<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One result per risk domain, as produced for a single request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainResults {
    pub flood: flood::FloodRisk,
    pub contamination: contamination::ContaminationReport,
    pub services: services::EmergencyServices,
    pub hydrants: hydrants::HydrantCoverage,
    pub seismic: seismic::SeismicHazard,
    pub air_quality: air_quality::AirQuality,
    pub disaster_history: disaster::DisasterHistory,
    pub property_assessment: property::PropertyAssessment,
    pub crime: crime::CrimeStats,
}

impl DomainResults {
    /// Every domain at its terminal record.
    pub fn unavailable(region: &str) -> Self {
        Self {
            flood: DomainRecord::unavailable(region),
            contamination: DomainRecord::unavailable(region),
            services: DomainRecord::unavailable(region),
            hydrants: DomainRecord::unavailable(region),
            seismic: DomainRecord::unavailable(region),
            air_quality: DomainRecord::unavailable(region),
            disaster_history: DomainRecord::unavailable(region),
            property_assessment: DomainRecord::unavailable(region),
            crime: DomainRecord::unavailable(region),
        }
    }

    /// `(domain, data_quality)` for each of the nine domains.
    pub fn qualities(&self) -> [(&'static str, DataQuality); 9] {
        fn q<T: DomainRecord>(r: &T) -> (&'static str, DataQuality) {
            (T::DOMAIN, r.data_quality())
        }
        [
            q(&self.flood),
            q(&self.contamination),
            q(&self.services),
            q(&self.hydrants),
            q(&self.seismic),
            q(&self.air_quality),
            q(&self.disaster_history),
            q(&self.property_assessment),
            q(&self.crime),
        ]
    }
}

/// Source label of a terminal record.
pub(crate) fn unavailable_source(region: &str) -> String {
    format!("Data unavailable ({region})")
}
