//! Reported criminal acts within one kilometre (Montréal open data).

use super::ckan::{self, CRIMES_RESOURCE};
use super::disaster::most_common;
use super::http::HttpClient;
use super::{unavailable_source, DataQuality, DomainRecord, FallbackChain, FetchRequest, RiskLevel, SourceConnector};
use crate::error::SourceUnavailable;
use crate::geo::Region;
use serde::{Deserialize, Serialize};
use std::fmt;

const RADIUS_M: f64 = 1_000.0;
const DATASTORE_LIMIT: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrimeDensity {
    Low,
    Moderate,
    High,
}

impl CrimeDensity {
    /// ≤ 10 incidents low, ≤ 50 moderate, else high.
    pub fn from_count(count: usize) -> Self {
        if count <= 10 {
            Self::Low
        } else if count <= 50 {
            Self::Moderate
        } else {
            Self::High
        }
    }

    pub fn risk_level(&self) -> RiskLevel {
        match self {
            Self::Low => RiskLevel::Low,
            Self::Moderate => RiskLevel::Medium,
            Self::High => RiskLevel::High,
        }
    }
}

impl fmt::Display for CrimeDensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrimeStats {
    pub incidents_1km: Option<usize>,
    /// Category counts, in order of first appearance.
    pub incidents_by_category: Vec<(String, usize)>,
    pub most_common_category: Option<String>,
    pub crime_density: Option<CrimeDensity>,
    /// Neighbourhood police station of the first matching incident.
    pub pdq: Option<String>,
    pub risk_level: RiskLevel,
    pub source: String,
    pub data_quality: DataQuality,
    pub region: String,
}

impl DomainRecord for CrimeStats {
    const DOMAIN: &'static str = "crime";

    fn unavailable(region: &str) -> Self {
        Self {
            incidents_1km: None,
            incidents_by_category: Vec::new(),
            most_common_category: None,
            crime_density: None,
            pdq: None,
            risk_level: RiskLevel::Unknown,
            source: unavailable_source(region),
            data_quality: DataQuality::Indisponible,
            region: region.to_string(),
        }
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn data_quality(&self) -> DataQuality {
        self.data_quality
    }
}

pub struct CrimeConnector {
    client: HttpClient,
    datastore_url: String,
}

impl CrimeConnector {
    pub fn new(client: HttpClient, datastore_url: impl Into<String>) -> Self {
        Self { client, datastore_url: datastore_url.into() }
    }

    fn query_montreal(&self, request: &FetchRequest) -> Result<Option<CrimeStats>, SourceUnavailable> {
        if !matches!(request.region_kind(), Some(Region::Montreal | Region::Laval)) {
            return Ok(None);
        }
        let sql = ckan::bbox_sql(
            CRIMES_RESOURCE,
            "\"CATEGORIE\", \"PDQ\", \"LATITUDE\", \"LONGITUDE\", \"DATE\"",
            request.point,
            RADIUS_M,
            DATASTORE_LIMIT,
        );
        let records = ckan::search_sql(&self.client, &self.datastore_url, &sql)?;

        let mut categories: Vec<(String, usize)> = Vec::new();
        let mut incidents = Vec::new();
        let mut pdq = None;
        for record in &records {
            let Some(location) = record.point() else { continue };
            if location.latitude == 0.0 || location.longitude == 0.0 {
                continue;
            }
            if request.point.distance_m(&location) > RADIUS_M {
                continue;
            }
            let category = record.text("CATEGORIE").unwrap_or_else(|| "Other".into());
            match categories.iter_mut().find(|(c, _)| *c == category) {
                Some((_, n)) => *n += 1,
                None => categories.push((category.clone(), 1)),
            }
            if pdq.is_none() {
                pdq = record.text("PDQ");
            }
            incidents.push(category);
        }

        let count = incidents.len();
        let density = CrimeDensity::from_count(count);
        Ok(Some(CrimeStats {
            incidents_1km: Some(count),
            most_common_category: most_common(incidents.iter().map(String::as_str)).map(str::to_string),
            incidents_by_category: categories,
            crime_density: Some(density),
            pdq: Some(pdq.unwrap_or_else(|| "undetermined".into())),
            risk_level: density.risk_level(),
            source: "Ville de Montréal open data - criminal acts".into(),
            data_quality: DataQuality::Haute,
            region: request.region().to_string(),
        }))
    }
}

impl SourceConnector for CrimeConnector {
    type Output = CrimeStats;

    fn fetch(&self, request: &FetchRequest) -> CrimeStats {
        FallbackChain::new()
            .tier("Montréal criminal acts", || self.query_montreal(request))
            .run(request.region())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;

    #[test]
    fn test_density_bands() {
        assert_eq!(CrimeDensity::from_count(10), CrimeDensity::Low);
        assert_eq!(CrimeDensity::from_count(11), CrimeDensity::Moderate);
        assert_eq!(CrimeDensity::from_count(50), CrimeDensity::Moderate);
        assert_eq!(CrimeDensity::from_count(51), CrimeDensity::High);
        assert_eq!(CrimeDensity::High.risk_level(), RiskLevel::High);
        assert_eq!(CrimeDensity::Moderate.to_string(), "moderate");
    }

    #[test]
    fn test_uncovered_region_is_unavailable() {
        let connector = CrimeConnector::new(HttpClient::default(), "http://127.0.0.1:9/datastore_search_sql");
        let stats = connector.fetch(&FetchRequest::new(Region::Estrie.center()));
        assert_eq!(stats.data_quality, DataQuality::Indisponible);
        assert_eq!(stats.incidents_1km, None);
        assert_eq!(stats.source, "Data unavailable (Estrie)");
    }

    #[test]
    fn test_covered_region_service_down() {
        let connector = CrimeConnector::new(HttpClient::default(), "http://127.0.0.1:9/datastore_search_sql");
        let stats = connector.fetch(&FetchRequest::new(GeoPoint::new(45.5088, -73.5540)));
        assert_eq!(stats.data_quality, DataQuality::Indisponible);
        assert_eq!(stats.risk_level, RiskLevel::Unknown);
    }
}
