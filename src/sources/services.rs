//! Nearest emergency services: fire station, hospital, police.

use super::http::HttpClient;
use super::overpass::{self, Element};
use super::{unavailable_source, DataQuality, DomainRecord, FallbackChain, FetchRequest, SourceConnector};
use crate::error::SourceUnavailable;
use crate::geo::{DistanceCategory, GeoPoint, Region};
use serde::{Deserialize, Serialize};

pub const SEARCH_RADIUS_M: f64 = 5_000.0;

/// Used when the region cannot be determined.
const PROVINCE_CENTER: GeoPoint = GeoPoint::new(46.8, -71.2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    FireStation,
    Hospital,
    Police,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 3] = [Self::FireStation, Self::Hospital, Self::Police];

    /// OpenStreetMap `amenity` tag value.
    pub fn amenity(&self) -> &'static str {
        match self {
            Self::FireStation => "fire_station",
            Self::Hospital => "hospital",
            Self::Police => "police",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Self::FireStation => "Fire station",
            Self::Hospital => "Hospital",
            Self::Police => "Police station",
        }
    }

    fn from_amenity(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.amenity() == tag)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub name: String,
    /// Rounded meters.
    pub distance: u32,
    pub distance_category: DistanceCategory,
    pub address: String,
}

impl Facility {
    fn at(name: String, address: String, meters: f64) -> Self {
        Self {
            name,
            distance: meters.round() as u32,
            distance_category: DistanceCategory::from_meters(meters),
            address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyServices {
    pub fire_station: Option<Facility>,
    pub hospital: Option<Facility>,
    pub police_station: Option<Facility>,
    pub source: String,
    pub data_quality: DataQuality,
    pub region: String,
}

impl EmergencyServices {
    fn slot(&mut self, kind: ServiceKind) -> &mut Option<Facility> {
        match kind {
            ServiceKind::FireStation => &mut self.fire_station,
            ServiceKind::Hospital => &mut self.hospital,
            ServiceKind::Police => &mut self.police_station,
        }
    }

    fn found(&self) -> usize {
        [&self.fire_station, &self.hospital, &self.police_station]
            .iter()
            .filter(|f| f.is_some())
            .count()
    }
}

impl DomainRecord for EmergencyServices {
    const DOMAIN: &'static str = "services";

    fn unavailable(region: &str) -> Self {
        Self {
            fire_station: None,
            hospital: None,
            police_station: None,
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

// ─── Static facilities ────────────────────────────────────────

struct StaticFacility {
    name: &'static str,
    lat: f64,
    lon: f64,
    address: &'static str,
}

const fn sf(name: &'static str, lat: f64, lon: f64, address: &'static str) -> StaticFacility {
    StaticFacility { name, lat, lon, address }
}

const MONTREAL_FIRE_STATIONS: &[StaticFacility] = &[
    sf("Caserne 12", 45.5087, -73.5540, "Vieux-Montréal"),
    sf("Caserne 23", 45.5200, -73.5800, "Plateau Mont-Royal"),
    sf("Caserne 5", 45.4950, -73.5600, "Griffintown"),
    sf("Caserne 31", 45.5300, -73.6200, "Rosemont"),
    sf("Caserne 42", 45.4800, -73.5900, "Verdun"),
];

const MONTREAL_HOSPITALS: &[StaticFacility] = &[
    sf("CHUM", 45.5090, -73.5617, "1051 Rue Sanguinet, Montréal"),
    sf("Hôpital Général de Montréal", 45.4950, -73.5830, "1650 Rue Cedar, Montréal"),
    sf("Hôpital Notre-Dame", 45.5153, -73.5550, "1560 Rue Sherbrooke Est, Montréal"),
    sf("Hôpital Sainte-Justine", 45.5230, -73.6180, "3175 Chemin de la Côte-Sainte-Catherine, Montréal"),
    sf("Hôpital Royal Victoria", 45.5045, -73.5830, "1001 Boulevard Décarie, Montréal"),
];

const MONTREAL_POLICE: &[StaticFacility] = &[
    sf("Poste 21 - PDQ 21", 45.5100, -73.5650, "1701 Rue Parthenais, Montréal"),
    sf("Poste 38 - PDQ 38", 45.5250, -73.5900, "4300 Rue Saint-Denis, Montréal"),
    sf("Poste 22 - PDQ 22", 45.4950, -73.5750, "2100 Rue Mullins, Montréal"),
    sf("Poste 25 - PDQ 25", 45.4800, -73.5950, "4110 Rue Wellington, Montréal"),
];

fn montreal_list(kind: ServiceKind) -> &'static [StaticFacility] {
    match kind {
        ServiceKind::FireStation => MONTREAL_FIRE_STATIONS,
        ServiceKind::Hospital => MONTREAL_HOSPITALS,
        ServiceKind::Police => MONTREAL_POLICE,
    }
}

/// Nearest static facility of `kind`; outside Montréal a single synthetic
/// facility placed near the region center.
pub fn static_facility(point: GeoPoint, region: Option<Region>, kind: ServiceKind) -> Facility {
    if region == Some(Region::Montreal) {
        let nearest = montreal_list(kind)
            .iter()
            .map(|f| (f, point.distance_m(&GeoPoint::new(f.lat, f.lon))))
            .fold(None, |best: Option<(&StaticFacility, f64)>, (f, d)| match best {
                Some((_, min)) if d >= min => best,
                _ => Some((f, d)),
            });
        if let Some((f, d)) = nearest {
            return Facility::at(f.name.to_string(), f.address.to_string(), d);
        }
    }

    let label = region.map_or(crate::geo::region::PROVINCE_LABEL, |r| r.name());
    let center = region.map_or(PROVINCE_CENTER, |r| r.center());
    let location = match kind {
        ServiceKind::FireStation => center,
        ServiceKind::Hospital => center.offset(0.01, 0.01),
        ServiceKind::Police => center.offset(-0.01, -0.01),
    };
    Facility::at(
        format!("{} - {label}", kind.title()),
        String::new(),
        point.distance_m(&location),
    )
}

// ─── Live lookup ──────────────────────────────────────────────

fn facility_from_element(origin: GeoPoint, kind: ServiceKind, el: &Element) -> Option<Facility> {
    let location = el.point()?;
    let address = ["addr:housenumber", "addr:street", "addr:city"]
        .iter()
        .filter_map(|key| el.tag(key))
        .collect::<Vec<_>>()
        .join(" ");
    let name = el
        .tag("name")
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} (unnamed)", kind.title()));
    let address = if address.is_empty() { "address unavailable".to_string() } else { address };
    Some(Facility::at(name, address, origin.distance_m(&location)))
}

/// Nearest element per kind.
pub fn nearest_by_kind(origin: GeoPoint, elements: &[Element]) -> Vec<(ServiceKind, Facility)> {
    let mut nearest: Vec<(ServiceKind, Facility)> = Vec::new();
    for el in elements {
        let Some(kind) = el.tag("amenity").and_then(ServiceKind::from_amenity) else {
            continue;
        };
        let Some(candidate) = facility_from_element(origin, kind, el) else {
            continue;
        };
        match nearest.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, current)) if candidate.distance < current.distance => *current = candidate,
            Some(_) => {}
            None => nearest.push((kind, candidate)),
        }
    }
    nearest
}

pub struct ServicesConnector {
    client: HttpClient,
    mirrors: Vec<String>,
}

impl ServicesConnector {
    pub fn new(client: HttpClient, mirrors: Vec<String>) -> Self {
        Self { client, mirrors }
    }

    fn query_live(&self, request: &FetchRequest) -> Result<Option<EmergencyServices>, SourceUnavailable> {
        let radius = request.radius_or(SEARCH_RADIUS_M);
        let query = overpass::emergency_services_query(request.point, radius);
        let response = overpass::run(&self.client, &self.mirrors, &query)?;

        let mut result = EmergencyServices {
            source: "OpenStreetMap (Overpass API)".into(),
            data_quality: DataQuality::Haute,
            ..EmergencyServices::unavailable(request.region())
        };
        for (kind, facility) in nearest_by_kind(request.point, &response.elements) {
            *result.slot(kind) = Some(facility);
        }

        match result.found() {
            0 => Ok(None),
            3 => Ok(Some(result)),
            _ => {
                tracing::debug!(found = result.found(), "live services incomplete, filling from static list");
                let region = request.region_kind();
                for kind in ServiceKind::ALL {
                    let slot = result.slot(kind);
                    if slot.is_none() {
                        *slot = Some(static_facility(request.point, region, kind));
                    }
                }
                result.source = "OpenStreetMap + static reference list".into();
                result.data_quality = DataQuality::Moyenne;
                Ok(Some(result))
            }
        }
    }
}

fn static_services(request: &FetchRequest) -> EmergencyServices {
    let region = request.region_kind();
    let label = request.region();
    EmergencyServices {
        fire_station: Some(static_facility(request.point, region, ServiceKind::FireStation)),
        hospital: Some(static_facility(request.point, region, ServiceKind::Hospital)),
        police_station: Some(static_facility(request.point, region, ServiceKind::Police)),
        source: format!("static reference list - {label}"),
        data_quality: DataQuality::Basse,
        region: label.to_string(),
    }
}

impl SourceConnector for ServicesConnector {
    type Output = EmergencyServices;

    fn fetch(&self, request: &FetchRequest) -> EmergencyServices {
        FallbackChain::new()
            .tier("OpenStreetMap amenities", || self.query_live(request))
            .tier("static facilities", || Ok(Some(static_services(request))))
            .run(request.region())
    }
}
