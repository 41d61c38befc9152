//! Fire hydrant coverage.

use super::ckan::{self, HYDRANTS_RESOURCE};
use super::http::HttpClient;
use super::overpass;
use super::{unavailable_source, DataQuality, DomainRecord, FallbackChain, FetchRequest, RiskLevel, SourceConnector};
use crate::error::SourceUnavailable;
use crate::geo::GeoPoint;
use serde::{Deserialize, Serialize};

pub const DEFAULT_RADIUS_M: f64 = 500.0;
const NEAR_M: f64 = 200.0;
const FAR_M: f64 = 500.0;
const LISTED: usize = 5;
const DATASTORE_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hydrant {
    /// Whole meters from the property.
    pub distance: f64,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydrantCoverage {
    pub nearest_hydrant: Option<Hydrant>,
    pub hydrants_count_200m: usize,
    pub hydrants_count_500m: usize,
    pub hydrants: Vec<Hydrant>,
    pub risk_level: RiskLevel,
    pub source: String,
    pub data_quality: DataQuality,
    pub region: String,
}

impl HydrantCoverage {
    pub fn nearest_distance(&self) -> Option<f64> {
        self.nearest_hydrant.map(|h| h.distance)
    }
}

impl DomainRecord for HydrantCoverage {
    const DOMAIN: &'static str = "hydrants";

    fn unavailable(region: &str) -> Self {
        Self {
            nearest_hydrant: None,
            hydrants_count_200m: 0,
            hydrants_count_500m: 0,
            hydrants: Vec::new(),
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

/// Nearest < 200 m → low, ≤ 500 m → medium, otherwise (or none) → high.
pub fn risk_from_nearest(nearest_m: Option<f64>) -> RiskLevel {
    match nearest_m {
        Some(d) if d < NEAR_M => RiskLevel::Low,
        Some(d) if d <= FAR_M => RiskLevel::Medium,
        _ => RiskLevel::High,
    }
}

/// Sort, count and summarize hydrant positions around `origin`.
pub fn coverage(
    origin: GeoPoint,
    positions: impl IntoIterator<Item = GeoPoint>,
    source: &str,
    quality: DataQuality,
    region: &str,
) -> HydrantCoverage {
    let mut hydrants: Vec<Hydrant> = positions
        .into_iter()
        .map(|p| Hydrant {
            distance: origin.distance_m(&p).trunc(),
            latitude: p.latitude,
            longitude: p.longitude,
        })
        .collect();
    hydrants.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    let nearest = hydrants.first().copied();
    let count_200 = hydrants.iter().filter(|h| h.distance <= NEAR_M).count();
    let count_500 = hydrants.iter().filter(|h| h.distance <= FAR_M).count();
    hydrants.truncate(LISTED);

    HydrantCoverage {
        nearest_hydrant: nearest,
        hydrants_count_200m: count_200,
        hydrants_count_500m: count_500,
        hydrants,
        risk_level: risk_from_nearest(nearest.map(|h| h.distance)),
        source: source.to_string(),
        data_quality: quality,
        region: region.to_string(),
    }
}

pub struct HydrantConnector {
    client: HttpClient,
    overpass: Vec<String>,
    datastore_url: String,
}

impl HydrantConnector {
    pub fn new(client: HttpClient, overpass: Vec<String>, datastore_url: impl Into<String>) -> Self {
        Self { client, overpass, datastore_url: datastore_url.into() }
    }

    fn query_osm(&self, request: &FetchRequest) -> Result<Option<HydrantCoverage>, SourceUnavailable> {
        let radius = request.radius_or(DEFAULT_RADIUS_M);
        let response = overpass::run(&self.client, &self.overpass, &overpass::hydrants_query(request.point, radius))?;
        let positions = response.elements.iter().filter_map(|el| match (el.lat, el.lon) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        });
        // Zero hydrants mapped is itself the answer.
        Ok(Some(coverage(
            request.point,
            positions,
            "OpenStreetMap (Overpass API)",
            DataQuality::Haute,
            request.region(),
        )))
    }

    fn query_montreal(&self, request: &FetchRequest) -> Result<Option<HydrantCoverage>, SourceUnavailable> {
        if !request.in_montreal() {
            return Ok(None);
        }
        let radius = request.radius_or(DEFAULT_RADIUS_M);
        let sql = ckan::bbox_sql(
            HYDRANTS_RESOURCE,
            "\"LONGITUDE\", \"LATITUDE\"",
            request.point,
            radius,
            DATASTORE_LIMIT,
        );
        let records = ckan::search_sql(&self.client, &self.datastore_url, &sql)?;
        if records.is_empty() {
            return Ok(None);
        }
        let positions = records
            .iter()
            .filter_map(|r| r.point())
            .filter(|p| request.point.distance_m(p).trunc() <= radius);
        Ok(Some(coverage(
            request.point,
            positions,
            "Ville de Montréal open data",
            DataQuality::Moyenne,
            request.region(),
        )))
    }
}

impl SourceConnector for HydrantConnector {
    type Output = HydrantCoverage;

    fn fetch(&self, request: &FetchRequest) -> HydrantCoverage {
        FallbackChain::new()
            .tier("OpenStreetMap hydrants", || self.query_osm(request))
            .tier("Montréal hydrant registry", || self.query_montreal(request))
            .run(request.region())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_bands() {
        assert_eq!(risk_from_nearest(Some(199.0)), RiskLevel::Low);
        assert_eq!(risk_from_nearest(Some(200.0)), RiskLevel::Medium);
        assert_eq!(risk_from_nearest(Some(500.0)), RiskLevel::Medium);
        assert_eq!(risk_from_nearest(Some(501.0)), RiskLevel::High);
        assert_eq!(risk_from_nearest(None), RiskLevel::High);
    }

    #[test]
    fn test_coverage_counts_and_order() {
        let origin = GeoPoint::new(45.5, -73.6);
        let positions = vec![
            GeoPoint::new(45.5040, -73.6), // ~445 m
            GeoPoint::new(45.5010, -73.6), // ~111 m
            GeoPoint::new(45.5020, -73.6), // ~222 m
        ];
        let result = coverage(origin, positions, "test", DataQuality::Haute, "Montréal");
        assert_eq!(result.hydrants_count_200m, 1);
        assert_eq!(result.hydrants_count_500m, 3);
        assert_eq!(result.risk_level, RiskLevel::Low);
        let nearest = result.nearest_distance().unwrap();
        assert!((nearest - 111.0).abs() < 1.0);
        assert!(result.hydrants.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_empty_coverage_is_high_risk() {
        let result = coverage(GeoPoint::new(45.5, -73.6), Vec::new(), "test", DataQuality::Haute, "Laval");
        assert_eq!(result.risk_level, RiskLevel::High);
        assert_eq!(result.nearest_hydrant, None);
    }

    #[test]
    fn test_everything_down_is_unavailable() {
        let connector = HydrantConnector::new(
            HttpClient::default(),
            vec!["http://127.0.0.1:9/overpass".into()],
            "http://127.0.0.1:9/datastore_search_sql",
        );
        let result = connector.fetch(&FetchRequest::new(GeoPoint::new(45.5, -73.6)));
        assert_eq!(result.data_quality, DataQuality::Indisponible);
        assert_eq!(result.risk_level, RiskLevel::Unknown);
    }
}
