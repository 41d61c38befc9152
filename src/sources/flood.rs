//! Flood-zone exposure.
//!
//! Tiers: provincial flood-zone polygons (point intersect) → Montréal
//! reference water points → province-wide hydrographic proximity →
//! unavailable.

use super::arcgis::{self, SpatialQuery};
use super::http::HttpClient;
use super::{unavailable_source, DataQuality, DomainRecord, FallbackChain, FetchRequest, RiskLevel, SourceConnector};
use crate::error::SourceUnavailable;
use crate::geo::{DistanceCategory, GeoPoint, Region};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const OUT_FIELDS: &str = "PERIODE_RETOUR,TYPE_ZONE,NOM,SOURCE,OBJECTID";

/// Estimates past this distance are considered implausible for the island.
const MONTREAL_PLAUSIBLE_M: f64 = 15_000.0;

/// Reported when no water body can be located.
const TERMINAL_WATER_DISTANCE_M: u32 = 5_000;

// ─── Water bodies ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterType {
    /// The St. Lawrence.
    MajorRiver,
    River,
    Canal,
    Lake,
    Unknown,
}

struct WaterPoint {
    lat: f64,
    lon: f64,
    name: &'static str,
    kind: WaterType,
}

const fn wp(lat: f64, lon: f64, name: &'static str, kind: WaterType) -> WaterPoint {
    WaterPoint { lat, lon, name, kind }
}

const MONTREAL_WATER_POINTS: &[WaterPoint] = &[
    wp(45.5017, -73.5673, "Fleuve Saint-Laurent - Pont Jacques-Cartier", WaterType::MajorRiver),
    wp(45.5046, -73.5531, "Fleuve Saint-Laurent - Vieux-Port", WaterType::MajorRiver),
    wp(45.5075, -73.5419, "Fleuve Saint-Laurent - Bassin Peel", WaterType::MajorRiver),
    wp(45.5113, -73.5311, "Fleuve Saint-Laurent - Bassin Bonsecours", WaterType::MajorRiver),
    wp(45.5150, -73.5200, "Fleuve Saint-Laurent - Parc Bellerive", WaterType::MajorRiver),
    wp(45.5200, -73.5100, "Fleuve Saint-Laurent - Pointe-aux-Prairies", WaterType::MajorRiver),
    wp(45.4900, -73.5800, "Fleuve Saint-Laurent - Pointe-Saint-Charles", WaterType::MajorRiver),
    wp(45.4700, -73.6000, "Fleuve Saint-Laurent - Lachine", WaterType::MajorRiver),
    wp(45.5400, -73.7000, "Rivière des Prairies - Ouest", WaterType::River),
    wp(45.5300, -73.6500, "Rivière des Prairies - Centre", WaterType::River),
    wp(45.5200, -73.6000, "Rivière des Prairies - Est", WaterType::River),
    wp(45.4920, -73.5700, "Canal Lachine - Sud", WaterType::Canal),
    wp(45.4980, -73.5550, "Canal Lachine - Centre", WaterType::Canal),
    wp(45.5050, -73.5400, "Canal Lachine - Nord", WaterType::Canal),
    wp(45.4700, -73.7500, "Lac Saint-Louis", WaterType::Lake),
    wp(45.4200, -73.8200, "Lac des Deux Montagnes", WaterType::Lake),
    wp(45.5600, -73.6500, "Rivière des Mille Îles", WaterType::River),
];

const MAJOR_WATER_BODIES: &[WaterPoint] = &[
    wp(46.813, -71.208, "Fleuve Saint-Laurent - Québec", WaterType::MajorRiver),
    wp(48.428, -71.068, "Rivière Saguenay", WaterType::River),
    wp(46.500, -72.523, "Rivière Saint-Maurice", WaterType::River),
    wp(45.477, -75.701, "Rivière des Outaouais", WaterType::River),
    wp(48.511, -68.464, "Fleuve Saint-Laurent - Bas-Saint-Laurent", WaterType::MajorRiver),
];

fn regional_water_points(region: Option<Region>) -> &'static [WaterPoint] {
    const CAPITALE_NATIONALE: &[WaterPoint] = &[
        wp(46.750, -71.283, "Rivière Saint-Charles", WaterType::River),
        wp(46.850, -71.183, "Rivière Montmorency", WaterType::River),
    ];
    const ESTRIE: &[WaterPoint] = &[
        wp(45.283, -72.150, "Lac Memphrémagog", WaterType::Lake),
        wp(45.417, -71.883, "Lac Massawippi", WaterType::Lake),
    ];
    const SAGUENAY: &[WaterPoint] = &[
        wp(48.567, -72.250, "Lac Saint-Jean", WaterType::Lake),
        wp(48.433, -71.067, "Rivière Chicoutimi", WaterType::River),
    ];
    const MONTEREGIE: &[WaterPoint] = &[
        wp(45.300, -73.250, "Rivière Richelieu", WaterType::River),
        wp(45.233, -73.667, "Lac Champlain", WaterType::Lake),
    ];

    match region {
        Some(Region::CapitaleNationale) => CAPITALE_NATIONALE,
        Some(Region::Estrie) => ESTRIE,
        Some(Region::SaguenayLacSaintJean) => SAGUENAY,
        Some(Region::Monteregie) => MONTEREGIE,
        _ => &[],
    }
}

/// Distance from the property to the nearest known water body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterDistance {
    pub distance_meters: u32,
    pub distance_category: DistanceCategory,
    pub water_name: String,
    pub water_type: WaterType,
    pub source: String,
    pub precision: DataQuality,
}

impl WaterDistance {
    fn estimated(meters: f64, name: &str, kind: WaterType, source: String, precision: DataQuality) -> Self {
        Self {
            distance_meters: meters as u32,
            distance_category: DistanceCategory::from_meters(meters),
            water_name: name.to_string(),
            water_type: kind,
            source,
            precision,
        }
    }

    fn unknown(region: &str) -> Self {
        Self {
            distance_meters: TERMINAL_WATER_DISTANCE_M,
            distance_category: DistanceCategory::Far,
            water_name: format!("water body - {region}"),
            water_type: WaterType::Unknown,
            source: "hydrographic data unavailable".into(),
            precision: DataQuality::Indisponible,
        }
    }
}

/// Nearest of `points` after scaling each raw distance by `weight(kind)`.
fn nearest_weighted<'p>(
    point: GeoPoint,
    points: impl IntoIterator<Item = &'p WaterPoint>,
    weight: impl Fn(WaterType) -> f64,
) -> Option<(&'p WaterPoint, f64)> {
    let mut best: Option<(&WaterPoint, f64)> = None;
    for candidate in points {
        let d = point.distance_m(&GeoPoint::new(candidate.lat, candidate.lon)) * weight(candidate.kind);
        match best {
            Some((_, min)) if d >= min => {}
            _ => best = Some((candidate, d)),
        }
    }
    best
}

/// Water distance on the island of Montréal.
pub fn montreal_water_distance(point: GeoPoint) -> WaterDistance {
    let weight = |kind| match kind {
        WaterType::MajorRiver | WaterType::River | WaterType::Canal => 0.85,
        _ => 1.0,
    };
    match nearest_weighted(point, MONTREAL_WATER_POINTS, weight) {
        Some((nearest, d)) if d <= MONTREAL_PLAUSIBLE_M => WaterDistance::estimated(
            d,
            nearest.name,
            nearest.kind,
            "Montréal reference water points".into(),
            DataQuality::Moyenne,
        ),
        _ => montreal_banded_estimate(point),
    }
}

/// Coarse estimate from the St. Lawrence, banded by latitude.
fn montreal_banded_estimate(point: GeoPoint) -> WaterDistance {
    const ST_LAWRENCE: GeoPoint = GeoPoint::new(45.507, -73.553);
    let d = point.distance_m(&ST_LAWRENCE);

    let (meters, name, kind) = if point.latitude > 45.55 {
        ((d * 0.7).max(100.0), "Rivière des Prairies", WaterType::River)
    } else if point.latitude < 45.45 {
        ((d * 0.8).max(100.0), "Lac Saint-Louis", WaterType::Lake)
    } else {
        (d.max(50.0), "Fleuve Saint-Laurent", WaterType::MajorRiver)
    };
    WaterDistance::estimated(meters, name, kind, "Montréal estimate".into(), DataQuality::Basse)
}

/// Water distance anywhere in the province.
pub fn provincial_water_distance(point: GeoPoint, region: Option<Region>) -> WaterDistance {
    if region == Some(Region::Montreal) {
        return montreal_water_distance(point);
    }
    let label = region.map_or(crate::geo::region::PROVINCE_LABEL, |r| r.name());
    let weight = |kind| match kind {
        WaterType::MajorRiver | WaterType::River => 0.8,
        _ => 0.9,
    };
    let candidates = MAJOR_WATER_BODIES.iter().chain(regional_water_points(region));
    match nearest_weighted(point, candidates, weight) {
        Some((nearest, d)) if d.is_finite() => WaterDistance::estimated(
            d,
            nearest.name,
            nearest.kind,
            format!("hydrographic reference points - {label}"),
            DataQuality::Moyenne,
        ),
        _ => WaterDistance::unknown(label),
    }
}

// ─── Classification ───────────────────────────────────────────

/// Risk from the zone's return period in years; unparsable → medium.
pub fn risk_from_return_period(period: &str) -> RiskLevel {
    match period.trim().parse::<i64>() {
        Ok(years) if years <= 20 => RiskLevel::High,
        Ok(years) if years <= 100 => RiskLevel::Medium,
        Ok(_) => RiskLevel::Low,
        Err(_) => RiskLevel::Medium,
    }
}

pub fn flood_type_from_zone(zone_type: &str) -> &'static str {
    let lower = zone_type.to_lowercase();
    let has = |terms: &[&str]| terms.iter().any(|t| lower.contains(t));
    if zone_type.trim().is_empty() {
        "unspecified flooding"
    } else if has(&["fluvial", "rivière", "fleuve"]) {
        "fluvial flooding"
    } else if has(&["lacustre", "lac"]) {
        "lacustrine flooding"
    } else if has(&["maritime", "marée"]) {
        "maritime flooding"
    } else if has(&["pluvial", "pluie"]) {
        "pluvial flooding"
    } else {
        "flooding"
    }
}

pub fn flood_type_from_region(region: Option<Region>) -> &'static str {
    match region {
        Some(Region::CoteNord | Region::GaspesieIlesDeLaMadeleine) => "coastal/maritime flooding",
        Some(Region::SaguenayLacSaintJean) => "lacustrine flooding",
        Some(Region::Mauricie | Region::Estrie | Region::CentreDuQuebec) => "fluvial flooding",
        Some(Region::Montreal | Region::Laval | Region::Monteregie) => "fluvial/urban flooding",
        _ => "flooding",
    }
}

/// Proximity bands used by the estimating tiers.
fn risk_from_water_distance(meters: u32) -> (RiskLevel, bool, &'static str) {
    if meters < 100 {
        (RiskLevel::High, true, "high risk zone (immediate proximity)")
    } else if meters < 500 {
        (RiskLevel::Medium, true, "moderate risk zone")
    } else {
        (RiskLevel::Low, false, "outside identified risk zones")
    }
}

fn empty_feature_collection() -> Value {
    json!({ "type": "FeatureCollection", "features": [] })
}

// ─── Result ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloodRisk {
    pub in_zone: bool,
    pub zone_type: String,
    pub recurrence_zone: String,
    pub flood_type: String,
    pub water_distance: WaterDistance,
    /// Matched zone polygon as a GeoJSON `FeatureCollection`, for map display.
    pub flood_zones_geojson: Value,
    pub risk_level: RiskLevel,
    pub source: String,
    pub data_quality: DataQuality,
    pub region: String,
}

impl DomainRecord for FloodRisk {
    const DOMAIN: &'static str = "flood";

    fn unavailable(region: &str) -> Self {
        Self {
            in_zone: false,
            zone_type: "data unavailable".into(),
            recurrence_zone: "undetermined".into(),
            flood_type: "undetermined".into(),
            water_distance: WaterDistance::unknown(region),
            flood_zones_geojson: empty_feature_collection(),
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

// ─── Connector ────────────────────────────────────────────────

pub struct FloodConnector {
    client: HttpClient,
    url: String,
}

impl FloodConnector {
    pub fn new(client: HttpClient, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }

    fn query_zones(&self, request: &FetchRequest) -> Result<Option<FloodRisk>, SourceUnavailable> {
        let set = arcgis::query(
            &self.client,
            &self.url,
            &SpatialQuery {
                point: request.point,
                out_fields: OUT_FIELDS,
                distance_m: None,
                return_geometry: true,
                record_count: None,
            },
        )?;
        let Some(feature) = set.features.into_iter().next() else {
            return Ok(None);
        };

        let period = feature.text("PERIODE_RETOUR").unwrap_or_else(|| "100".into());
        let risk_level = risk_from_return_period(&period);
        let zone_type = feature.text("TYPE_ZONE");

        let mut properties = feature.attributes.clone();
        properties.insert(
            "zone_name".into(),
            Value::String(feature.text("NOM").unwrap_or_else(|| "flood zone".into())),
        );
        properties.insert("return_period".into(), Value::String(period.clone()));
        properties.insert("risk_level".into(), Value::String(risk_level.to_string()));
        let geojson = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": properties,
                "geometry": feature.geometry.clone().unwrap_or(Value::Null),
            }]
        });

        Ok(Some(FloodRisk {
            in_zone: true,
            flood_type: flood_type_from_zone(zone_type.as_deref().unwrap_or_default()).into(),
            zone_type: zone_type.unwrap_or_else(|| "flood zone".into()),
            recurrence_zone: format!("recurrence zone {period} years"),
            water_distance: provincial_water_distance(request.point, request.region_kind()),
            flood_zones_geojson: geojson,
            risk_level,
            source: feature.text("SOURCE").unwrap_or_else(|| "Gouvernement du Québec".into()),
            data_quality: DataQuality::Haute,
            region: request.region().to_string(),
        }))
    }
}

fn estimate(water: WaterDistance, flood_type: &str, source: String, quality: DataQuality, region: &str) -> FloodRisk {
    let (risk_level, in_zone, zone_type) = risk_from_water_distance(water.distance_meters);
    FloodRisk {
        in_zone,
        zone_type: zone_type.into(),
        recurrence_zone: format!("estimated from proximity ({}m)", water.distance_meters),
        flood_type: flood_type.into(),
        water_distance: water,
        flood_zones_geojson: empty_feature_collection(),
        risk_level,
        source,
        data_quality: quality,
        region: region.to_string(),
    }
}

/// Regional tier for the Montréal area.
fn montreal_estimate(request: &FetchRequest) -> FloodRisk {
    estimate(
        montreal_water_distance(request.point),
        flood_type_from_region(Some(Region::Montreal)),
        "Ville de Montréal - estimate".into(),
        DataQuality::Moyenne,
        Region::Montreal.name(),
    )
}

/// Geographic tier, valid province-wide.
fn geographic_estimate(request: &FetchRequest) -> FloodRisk {
    let region = request.region_kind();
    let water = provincial_water_distance(request.point, region);
    let quality = if water.precision == DataQuality::Moyenne {
        DataQuality::Moyenne
    } else {
        DataQuality::Basse
    };
    estimate(
        water,
        flood_type_from_region(region),
        format!("geographic estimate - {}", request.region()),
        quality,
        request.region(),
    )
}

impl SourceConnector for FloodConnector {
    type Output = FloodRisk;

    fn fetch(&self, request: &FetchRequest) -> FloodRisk {
        FallbackChain::new()
            .tier("provincial flood zones", || self.query_zones(request))
            .tier("Montréal reference points", || {
                Ok(request.in_montreal().then(|| montreal_estimate(request)))
            })
            .tier("hydrographic proximity", || Ok(Some(geographic_estimate(request))))
            .run(request.region())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline() -> FloodConnector {
        FloodConnector::new(HttpClient::default(), "http://127.0.0.1:9/flood/query")
    }

    #[test]
    fn test_return_period_bands() {
        assert_eq!(risk_from_return_period("2"), RiskLevel::High);
        assert_eq!(risk_from_return_period("20"), RiskLevel::High);
        assert_eq!(risk_from_return_period(" 100 "), RiskLevel::Medium);
        assert_eq!(risk_from_return_period("101"), RiskLevel::Low);
        assert_eq!(risk_from_return_period("0-20 ans"), RiskLevel::Medium);
    }

    #[test]
    fn test_flood_type_keywords() {
        assert_eq!(flood_type_from_zone("Zone fluviale"), "fluvial flooding");
        assert_eq!(flood_type_from_zone("Zone lacustre"), "lacustrine flooding");
        assert_eq!(flood_type_from_zone("Submersion marée"), "maritime flooding");
        assert_eq!(flood_type_from_zone(""), "unspecified flooding");
        assert_eq!(flood_type_from_zone("Zone A"), "flooding");
    }

    #[test]
    fn test_water_distance_bands() {
        assert_eq!(risk_from_water_distance(99).0, RiskLevel::High);
        assert_eq!(risk_from_water_distance(100), (RiskLevel::Medium, true, "moderate risk zone"));
        assert!(!risk_from_water_distance(500).1);
    }

    #[test]
    fn test_montreal_water_points() {
        // Right at the Vieux-Port.
        let water = montreal_water_distance(GeoPoint::new(45.5046, -73.5531));
        assert_eq!(water.water_name, "Fleuve Saint-Laurent - Vieux-Port");
        assert!(water.distance_meters < 5);
        assert_eq!(water.precision, DataQuality::Moyenne);
    }

    #[test]
    fn test_montreal_implausible_distance_uses_band_estimate() {
        let water = montreal_water_distance(GeoPoint::new(46.0, -73.6));
        assert_eq!(water.water_name, "Rivière des Prairies");
        assert_eq!(water.precision, DataQuality::Basse);
    }

    #[test]
    fn test_provincial_uses_regional_points() {
        let water = provincial_water_distance(GeoPoint::new(45.417, -71.883), Some(Region::Estrie));
        assert_eq!(water.water_name, "Lac Massawippi");
        assert_eq!(water.water_type, WaterType::Lake);
    }

    #[test]
    fn test_montreal_tier_when_service_down() {
        let result = offline().fetch(&FetchRequest::new(GeoPoint::new(45.5046, -73.5531)));
        assert_eq!(result.data_quality, DataQuality::Moyenne);
        assert_eq!(result.risk_level, RiskLevel::High);
        assert!(result.in_zone);
        assert_eq!(result.region, "Montréal");
    }

    #[test]
    fn test_geographic_tier_outside_montreal() {
        let result = offline().fetch(&FetchRequest::new(GeoPoint::new(45.4042, -71.8929)));
        assert!(result.data_quality < DataQuality::Haute);
        assert_eq!(result.flood_type, "fluvial flooding");
        assert!(result.source.starts_with("geographic estimate"));
    }

    #[test]
    fn test_unavailable_record() {
        let result = FloodRisk::unavailable("Estrie");
        assert_eq!(result.risk_level, RiskLevel::Unknown);
        assert_eq!(result.water_distance.distance_meters, 5000);
        assert_eq!(result.data_quality, DataQuality::Indisponible);
    }
}
