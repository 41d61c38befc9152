//! Air quality index, from the Montréal monitoring network (RSQA) where it
//! reaches, else from regional averages.

use super::http::HttpClient;
use super::{unavailable_source, DataQuality, DomainRecord, FallbackChain, FetchRequest, RiskLevel, SourceConnector};
use crate::error::SourceUnavailable;
use crate::geo::{GeoPoint, Region};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Index used for regions without a published average.
const DEFAULT_REGIONAL_AQI: i64 = 20;

struct Station {
    number: u32,
    name: &'static str,
    lat: f64,
    lon: f64,
}

const fn st(number: u32, name: &'static str, lat: f64, lon: f64) -> Station {
    Station { number, name, lat, lon }
}

const RSQA_STATIONS: &[Station] = &[
    st(1, "Drummond", 45.5095, -73.5726),
    st(3, "Hochelaga", 45.5421, -73.5415),
    st(6, "Anjou", 45.5830, -73.5580),
    st(7, "Rivière-des-Prairies", 45.6253, -73.5760),
    st(13, "Notre-Dame-de-Grâce", 45.4722, -73.6266),
    st(17, "Pointe-aux-Trembles", 45.6409, -73.5009),
    st(28, "Verdun", 45.4511, -73.5712),
    st(29, "Saint-Jean-Baptiste", 45.5240, -73.5850),
    st(50, "Sainte-Anne-de-Bellevue", 45.4040, -73.9403),
    st(55, "Aéroport de Montréal", 45.4707, -73.7455),
    st(61, "Échangeur Décarie", 45.4930, -73.6395),
    st(66, "Parc Pilon", 45.5635, -73.5068),
    st(99, "AÉMC", 45.4736, -73.5813),
];

impl Station {
    fn label(&self) -> String {
        format!("Station {} - {}", self.number, self.name)
    }

    /// True when a CSV station cell designates this station, by number or name.
    fn matches(&self, cell: &str) -> bool {
        let numbered = cell
            .split(|c: char| !c.is_ascii_digit())
            .filter(|t| !t.is_empty())
            .any(|t| t.parse::<u32>() == Ok(self.number));
        numbered || cell.to_lowercase().contains(&self.name.to_lowercase())
    }
}

fn nearest_station(point: GeoPoint) -> Option<(&'static Station, f64)> {
    RSQA_STATIONS
        .iter()
        .map(|s| (s, point.distance_km(&GeoPoint::new(s.lat, s.lon))))
        .fold(None, |best, (s, d)| match best {
            Some((_, min)) if d >= min => best,
            _ => Some((s, d)),
        })
}

fn live_coverage(region: Option<Region>) -> bool {
    matches!(region, Some(Region::Montreal | Region::Laval | Region::Monteregie))
}

pub fn regional_average(region: Option<Region>) -> i64 {
    match region {
        Some(Region::Montreal) => 35,
        Some(Region::Laval) => 32,
        Some(Region::Monteregie) => 28,
        Some(Region::CapitaleNationale) => 25,
        Some(Region::Outaouais) => 22,
        Some(Region::Estrie) => 20,
        Some(Region::Mauricie) => 22,
        Some(Region::SaguenayLacSaintJean) => 18,
        Some(Region::Laurentides) => 20,
        Some(Region::Lanaudiere) => 22,
        _ => DEFAULT_REGIONAL_AQI,
    }
}

/// ≤ 25 Good, ≤ 50 Acceptable (both low), ≤ 75 Poor (medium), else Very poor (high).
pub fn categorize(aqi: i64) -> (&'static str, RiskLevel) {
    if aqi <= 25 {
        ("Good", RiskLevel::Low)
    } else if aqi <= 50 {
        ("Acceptable", RiskLevel::Low)
    } else if aqi <= 75 {
        ("Poor", RiskLevel::Medium)
    } else {
        ("Very poor", RiskLevel::High)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQuality {
    pub aqi: Option<i64>,
    pub aqi_category: String,
    pub nearest_station: String,
    pub station_distance_km: Option<f64>,
    pub risk_level: RiskLevel,
    pub source: String,
    pub data_quality: DataQuality,
    pub region: String,
}

impl DomainRecord for AirQuality {
    const DOMAIN: &'static str = "air_quality";

    fn unavailable(region: &str) -> Self {
        Self {
            aqi: None,
            aqi_category: "unknown".into(),
            nearest_station: "none".into(),
            station_distance_km: None,
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

#[derive(Deserialize, Debug)]
struct IndexRow {
    #[serde(default, alias = "station")]
    nom_station: Option<String>,
    #[serde(default, alias = "iqa")]
    valeur: Option<String>,
}

/// Index of the last row naming `station`, streaming the CSV.
fn latest_index<R: Read>(reader: R, station: &Station) -> Result<Option<i64>, SourceUnavailable> {
    let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut latest = None;
    for row in csv.deserialize::<IndexRow>() {
        let row = match row {
            Ok(row) => row,
            Err(err) if err.is_io_error() => return Err(err.into()),
            Err(_) => continue,
        };
        let named = row.nom_station.as_deref().is_some_and(|cell| station.matches(cell));
        if !named {
            continue;
        }
        let value = row
            .valeur
            .as_deref()
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0);
        if let Some(value) = value {
            latest = Some(value.trunc() as i64);
        }
    }
    Ok(latest)
}

pub struct AirQualityConnector {
    client: HttpClient,
    csv_url: String,
}

impl AirQualityConnector {
    pub fn new(client: HttpClient, csv_url: impl Into<String>) -> Self {
        Self { client, csv_url: csv_url.into() }
    }

    fn query_rsqa(&self, request: &FetchRequest) -> Result<Option<AirQuality>, SourceUnavailable> {
        if !live_coverage(request.region_kind()) {
            return Ok(None);
        }
        let Some((station, distance_km)) = nearest_station(request.point) else {
            return Ok(None);
        };
        let body = self.client.get_reader(&self.csv_url, &[])?;
        let Some(aqi) = latest_index(body, station)? else {
            tracing::debug!(station = %station.label(), "no reading for nearest station");
            return Ok(None);
        };

        let (category, risk_level) = categorize(aqi);
        Ok(Some(AirQuality {
            aqi: Some(aqi),
            aqi_category: category.into(),
            nearest_station: station.label(),
            station_distance_km: Some((distance_km * 10.0).round() / 10.0),
            risk_level,
            source: "RSQA - Ville de Montréal".into(),
            data_quality: DataQuality::Haute,
            region: request.region().to_string(),
        }))
    }
}

fn regional_estimate(request: &FetchRequest) -> AirQuality {
    let region = request.region();
    let aqi = regional_average(request.region_kind());
    let (category, risk_level) = categorize(aqi);
    AirQuality {
        aqi: Some(aqi),
        aqi_category: category.into(),
        nearest_station: format!("estimate - {region}"),
        station_distance_km: None,
        risk_level,
        source: format!("regional estimate - {region}"),
        data_quality: DataQuality::Basse,
        region: region.to_string(),
    }
}

impl SourceConnector for AirQualityConnector {
    type Output = AirQuality;

    fn fetch(&self, request: &FetchRequest) -> AirQuality {
        FallbackChain::new()
            .tier("RSQA real-time index", || self.query_rsqa(request))
            .tier("regional average", || Ok(Some(regional_estimate(request))))
            .run(request.region())
    }
}
