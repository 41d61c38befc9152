//! Historical civil-security events (MSP) around the property.

use super::http::HttpClient;
use super::{unavailable_source, DataQuality, DomainRecord, FallbackChain, FetchRequest, RiskLevel, SourceConnector};
use crate::error::SourceUnavailable;
use crate::geo::GeoPoint;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_RADIUS_M: f64 = 25_000.0;
const LISTED_EVENTS: usize = 10;
const NO_EVENTS: &str = "None";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisasterEvent {
    pub event_type: String,
    pub date: String,
    pub description: String,
    pub distance_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisasterHistory {
    pub nearby_events_count: usize,
    pub events: Vec<DisasterEvent>,
    pub most_common_type: String,
    pub risk_level: RiskLevel,
    pub source: String,
    pub data_quality: DataQuality,
    pub region: String,
}

impl DomainRecord for DisasterHistory {
    const DOMAIN: &'static str = "disaster_history";

    fn unavailable(region: &str) -> Self {
        Self {
            nearby_events_count: 0,
            events: Vec::new(),
            most_common_type: NO_EVENTS.into(),
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

/// 0 → low, 1 to 3 → medium, more → high.
pub fn risk_from_count(count: usize) -> RiskLevel {
    match count {
        0 => RiskLevel::Low,
        1..=3 => RiskLevel::Medium,
        _ => RiskLevel::High,
    }
}

/// Majority value; a tie goes to the value seen first.
pub fn most_common<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((value, 1)),
        }
    }
    let mut best: Option<(&str, usize)> = None;
    for (value, n) in counts {
        match best {
            Some((_, max)) if n <= max => {}
            _ => best = Some((value, n)),
        }
    }
    best.map(|(value, _)| value)
}

#[derive(Deserialize, Debug, Default)]
struct EventCollection {
    #[serde(default)]
    features: Vec<EventFeature>,
}

#[derive(Deserialize, Debug, Default)]
struct EventFeature {
    #[serde(default)]
    geometry: Option<EventGeometry>,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Deserialize, Debug, Default)]
struct EventGeometry {
    #[serde(default)]
    coordinates: Vec<Value>,
}

impl EventFeature {
    /// GeoJSON point, `[lon, lat]`.
    fn point(&self) -> Option<GeoPoint> {
        let coords = &self.geometry.as_ref()?.coordinates;
        let lon = coords.first()?.as_f64()?;
        let lat = coords.get(1)?.as_f64()?;
        Some(GeoPoint::new(lat, lon)).filter(GeoPoint::is_valid)
    }

    fn prop(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| match self.properties.get(*k)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        })
    }
}

fn summarize(origin: GeoPoint, features: &[EventFeature], radius_km: f64, region: &str) -> DisasterHistory {
    let mut events: Vec<DisasterEvent> = features
        .iter()
        .filter_map(|f| {
            let distance = origin.distance_km(&f.point()?);
            (distance <= radius_km).then(|| DisasterEvent {
                event_type: f
                    .prop(&["type_evenement", "TYPE"])
                    .unwrap_or_else(|| "unspecified".into()),
                date: f.prop(&["date_evenement", "DATE"]).unwrap_or_default(),
                description: f.prop(&["description", "NOM"]).unwrap_or_default(),
                distance_km: (distance * 10.0).round() / 10.0,
            })
        })
        .collect();
    events.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

    let count = events.len();
    let most_common_type = most_common(events.iter().map(|e| e.event_type.as_str()))
        .unwrap_or(NO_EVENTS)
        .to_string();
    events.truncate(LISTED_EVENTS);

    DisasterHistory {
        nearby_events_count: count,
        events,
        most_common_type,
        risk_level: risk_from_count(count),
        source: "MSP Québec - civil security history".into(),
        data_quality: DataQuality::Haute,
        region: region.to_string(),
    }
}

pub struct DisasterConnector {
    client: HttpClient,
    url: String,
}

impl DisasterConnector {
    pub fn new(client: HttpClient, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }

    fn query_wfs(&self, request: &FetchRequest) -> Result<Option<DisasterHistory>, SourceUnavailable> {
        let collection: EventCollection = self.client.get_json(
            &self.url,
            &[
                ("service", "wfs"),
                ("version", "1.1.0"),
                ("request", "getfeature"),
                ("typename", "msp_risc_evenements_public"),
                ("outputformat", "geojson"),
                ("srsName", "epsg:4326"),
            ],
        )?;
        let radius_km = request.radius_or(DEFAULT_RADIUS_M) / 1000.0;
        Ok(Some(summarize(request.point, &collection.features, radius_km, request.region())))
    }
}

impl SourceConnector for DisasterConnector {
    type Output = DisasterHistory;

    fn fetch(&self, request: &FetchRequest) -> DisasterHistory {
        FallbackChain::new()
            .tier("MSP event history", || self.query_wfs(request))
            .run(request.region())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(lat: f64, lon: f64, kind: &str) -> EventFeature {
        serde_json::from_value(serde_json::json!({
            "geometry": {"type": "Point", "coordinates": [lon, lat]},
            "properties": {"type_evenement": kind, "date_evenement": "2019-04-20"}
        }))
        .unwrap()
    }

    #[test]
    fn test_risk_bands() {
        assert_eq!(risk_from_count(0), RiskLevel::Low);
        assert_eq!(risk_from_count(3), RiskLevel::Medium);
        assert_eq!(risk_from_count(4), RiskLevel::High);
    }

    #[test]
    fn test_most_common_tie_goes_to_first() {
        assert_eq!(most_common(["Flood", "Fire", "Fire", "Flood"]), Some("Flood"));
        assert_eq!(most_common(["Flood", "Fire", "Fire"]), Some("Fire"));
        assert_eq!(most_common(Vec::<&str>::new()), None);
    }

    #[test]
    fn test_summary_filters_radius_and_sorts() {
        let origin = GeoPoint::new(45.5, -73.6);
        let features = vec![
            event(45.6, -73.6, "Inondation"),   // ~11 km
            event(45.51, -73.6, "Glissement"),  // ~1 km
            event(46.5, -73.6, "Inondation"),   // ~111 km, out of range
            event(45.52, -73.6, "Inondation"),  // ~2 km
        ];
        let history = summarize(origin, &features, 25.0, "Montréal");
        assert_eq!(history.nearby_events_count, 3);
        assert_eq!(history.events[0].event_type, "Glissement");
        assert_eq!(history.events[0].distance_km, 1.1);
        assert_eq!(history.most_common_type, "Inondation");
        assert_eq!(history.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_no_events_is_low() {
        let history = summarize(GeoPoint::new(45.5, -73.6), &[], 25.0, "Montréal");
        assert_eq!(history.most_common_type, "None");
        assert_eq!(history.risk_level, RiskLevel::Low);
        assert_eq!(history.data_quality, DataQuality::Haute);
    }

    #[test]
    fn test_missing_geometry_skipped() {
        let feature: EventFeature = serde_json::from_value(serde_json::json!({"properties": {"TYPE": "Feu"}})).unwrap();
        assert_eq!(feature.point(), None);
        assert_eq!(feature.prop(&["type_evenement", "TYPE"]).as_deref(), Some("Feu"));
    }

    #[test]
    fn test_service_down_is_unavailable() {
        let connector = DisasterConnector::new(HttpClient::default(), "http://127.0.0.1:9/disasters");
        let history = connector.fetch(&FetchRequest::new(GeoPoint::new(45.5, -73.6)));
        assert_eq!(history.data_quality, DataQuality::Indisponible);
        assert_eq!(history.risk_level, RiskLevel::Unknown);
    }
}
