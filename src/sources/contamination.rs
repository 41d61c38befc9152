//! Contaminated land registry (provincial GTC repertory).

use super::arcgis::{self, Feature, SpatialQuery};
use super::http::HttpClient;
use super::{unavailable_source, DataQuality, DomainRecord, FallbackChain, FetchRequest, SourceConnector};
use crate::error::SourceUnavailable;
use crate::geo::GeoPoint;
use serde::{Deserialize, Serialize};

pub const DEFAULT_RADIUS_M: f64 = 500.0;

/// A listed site closer than this is taken to be the property itself.
const ON_SITE_M: f64 = 50.0;

const LISTED_SITES: usize = 10;
const MAX_RECORDS: u32 = 50;

const OUT_FIELDS: &str =
    "NO_MEF_LIEU,LATITUDE,LONGITUDE,ADR_CIV_LIEU,LST_MRC_REG_ADM,NB_FICHES,DESC_MILIEU_RECEPT";

const SOURCE: &str = "Répertoire des terrains contaminés (GTC) - MELCCFP";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContaminatedSite {
    pub name: String,
    pub address: String,
    /// Rounded meters.
    pub distance: u32,
    pub status: String,
    pub record_count: u32,
    pub administrative_listing: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContaminationReport {
    pub is_contaminated: bool,
    /// Every site matched within the radius, not only the listed ones.
    pub nearby_count: usize,
    pub sites: Vec<ContaminatedSite>,
    pub source: String,
    pub data_quality: DataQuality,
    pub region: String,
}

impl DomainRecord for ContaminationReport {
    const DOMAIN: &'static str = "contamination";

    fn unavailable(region: &str) -> Self {
        Self {
            is_contaminated: false,
            nearby_count: 0,
            sites: Vec::new(),
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

/// Collapse a multi-line civic address onto one line.
pub fn clean_address(raw: &str) -> String {
    let joined = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" / ");
    if joined.is_empty() {
        "address unavailable".to_string()
    } else {
        joined
    }
}

fn site_from_feature(origin: GeoPoint, feature: &Feature) -> Option<ContaminatedSite> {
    let location = feature.location("LATITUDE", "LONGITUDE")?;
    let distance = origin.distance_m(&location);
    Some(ContaminatedSite {
        name: format!("Site {}", feature.text("NO_MEF_LIEU").unwrap_or_else(|| "unknown".into())),
        address: clean_address(&feature.text("ADR_CIV_LIEU").unwrap_or_default()),
        distance: distance.round() as u32,
        status: feature.text("DESC_MILIEU_RECEPT").unwrap_or_else(|| "unspecified".into()),
        record_count: feature.number("NB_FICHES").map_or(0, |n| n as u32),
        administrative_listing: feature.text("LST_MRC_REG_ADM").unwrap_or_default(),
    })
}

/// Build the report from every feature the service matched.
pub fn summarize(origin: GeoPoint, features: &[Feature], region: &str) -> ContaminationReport {
    let mut sites: Vec<ContaminatedSite> =
        features.iter().filter_map(|f| site_from_feature(origin, f)).collect();
    sites.sort_by_key(|s| s.distance);

    let is_contaminated = sites.iter().any(|s| f64::from(s.distance) < ON_SITE_M);
    let nearby_count = sites.len();
    sites.truncate(LISTED_SITES);

    ContaminationReport {
        is_contaminated,
        nearby_count,
        sites,
        source: SOURCE.to_string(),
        data_quality: DataQuality::Haute,
        region: region.to_string(),
    }
}

pub struct ContaminationConnector {
    client: HttpClient,
    url: String,
}

impl ContaminationConnector {
    pub fn new(client: HttpClient, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }

    fn query_registry(&self, request: &FetchRequest) -> Result<Option<ContaminationReport>, SourceUnavailable> {
        let radius = request.radius_or(DEFAULT_RADIUS_M);
        let set = arcgis::query(
            &self.client,
            &self.url,
            &SpatialQuery {
                point: request.point,
                out_fields: OUT_FIELDS,
                distance_m: Some(radius),
                return_geometry: true,
                record_count: Some(MAX_RECORDS),
            },
        )?;
        let report = summarize(request.point, &set.features, request.region());
        tracing::debug!(radius, sites = report.nearby_count, "contaminated sites matched");
        // No sites is an answer, not a gap.
        Ok(Some(report))
    }
}

impl SourceConnector for ContaminationConnector {
    type Output = ContaminationReport;

    fn fetch(&self, request: &FetchRequest) -> ContaminationReport {
        FallbackChain::new()
            .tier("contaminated land registry", || self.query_registry(request))
            .run(request.region())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(lat: f64, lon: f64, id: &str) -> Feature {
        serde_json::from_value(serde_json::json!({
            "attributes": {
                "NO_MEF_LIEU": id,
                "ADR_CIV_LIEU": "1 rue Principale\r\n\r\nMontréal ",
                "NB_FICHES": 2,
                "DESC_MILIEU_RECEPT": "Terminé"
            },
            "geometry": {"x": lon, "y": lat}
        }))
        .unwrap()
    }

    #[test]
    fn test_clean_address() {
        assert_eq!(clean_address("12 rue A\r\n  \r\nLaval\n"), "12 rue A / Laval");
        assert_eq!(clean_address("  "), "address unavailable");
    }

    #[test]
    fn test_site_on_property() {
        let origin = GeoPoint::new(45.5, -73.6);
        let report = summarize(origin, &[feature(45.5001, -73.6, "7")], "Montréal");
        assert!(report.is_contaminated);
        assert_eq!(report.sites[0].name, "Site 7");
        assert_eq!(report.sites[0].address, "1 rue Principale / Montréal");
        assert_eq!(report.sites[0].record_count, 2);
    }

    #[test]
    fn test_sorted_and_capped_but_counted() {
        let origin = GeoPoint::new(45.5, -73.6);
        let features: Vec<Feature> = (0..12)
            .rev()
            .map(|i| feature(45.5 + 0.001 * (i as f64 + 1.0), -73.6, &i.to_string()))
            .collect();
        let report = summarize(origin, &features, "Montréal");
        assert_eq!(report.nearby_count, 12);
        assert_eq!(report.sites.len(), 10);
        assert!(report.sites.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert_eq!(report.sites[0].name, "Site 0");
        assert!(!report.is_contaminated);
    }

    #[test]
    fn test_feature_without_location_skipped() {
        let origin = GeoPoint::new(45.5, -73.6);
        let report = summarize(origin, &[Feature::default()], "Montréal");
        assert_eq!(report.nearby_count, 0);
        assert_eq!(report.data_quality, DataQuality::Haute);
    }

    #[test]
    fn test_service_down_is_unavailable() {
        let connector = ContaminationConnector::new(HttpClient::default(), "http://127.0.0.1:9/contamination/query");
        let report = connector.fetch(&FetchRequest::new(GeoPoint::new(45.5, -73.6)));
        assert_eq!(report.data_quality, DataQuality::Indisponible);
        assert_eq!(report.nearby_count, 0);
        assert_eq!(report.source, "Data unavailable (Montréal)");
    }
}
