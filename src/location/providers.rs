//! Geocoding providers: the provincial address service and Nominatim.

use super::types::{GeocoderSource, ResolvedAddress};
use crate::error::{ResolutionFailure, SourceUnavailable};
use crate::geo::{region_label, GeoPoint};
use crate::sources::http::HttpClient;
use serde::Deserialize;

pub const PROVINCE_SUFFIX: &str = "Québec, Canada";

// ─── Provincial geocoder ────────────────────────────────────────

#[derive(Deserialize, Debug)]
pub struct ProvincialResponse {
    #[serde(default)]
    pub features: Vec<ProvincialFeature>,
}

#[derive(Deserialize, Debug)]
pub struct ProvincialFeature {
    pub geometry: PointGeometry,
    #[serde(default)]
    pub properties: ProvincialProperties,
}

/// GeoJSON point, `[lon, lat]`.
#[derive(Deserialize, Debug)]
pub struct PointGeometry {
    pub coordinates: Vec<f64>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ProvincialProperties {
    #[serde(default)]
    pub numero: Option<serde_json::Value>,
    #[serde(default)]
    pub nom_rue: Option<String>,
    #[serde(default)]
    pub municipalite: Option<String>,
    #[serde(default)]
    pub ville: Option<String>,
}

/// `"[numero] [nom_rue], [municipality or city], Québec, Canada"`.
pub fn format_provincial_address(props: &ProvincialProperties) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(numero) = props.numero.as_ref().and_then(value_as_text) {
        parts.push(numero);
    }
    if let Some(street) = non_empty(props.nom_rue.as_deref()) {
        parts.push(street.to_string());
    }
    if let Some(place) =
        non_empty(props.municipalite.as_deref()).or_else(|| non_empty(props.ville.as_deref()))
    {
        parts.push(place.to_string());
    }
    parts.push(PROVINCE_SUFFIX.to_string());
    parts.join(", ")
}

fn value_as_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Query the provincial geocoder for the single best match.
///
/// `Ok(None)` means the service answered but matched nothing.
pub fn provincial_geocode(
    client: &HttpClient,
    url: &str,
    query: &str,
) -> Result<Option<ResolvedAddress>, SourceUnavailable> {
    let response: ProvincialResponse = client.get_json(url, &[("q", query), ("limit", "1")])?;

    let Some(feature) = response.features.into_iter().next() else {
        return Ok(None);
    };
    let (lon, lat) = match feature.geometry.coordinates.as_slice() {
        [lon, lat, ..] => (*lon, *lat),
        _ => return Err(SourceUnavailable::Decode("point without coordinates".into())),
    };
    let point = GeoPoint::new(lat, lon);
    if !point.is_valid() {
        return Err(SourceUnavailable::Decode(format!("coordinates out of range: {point}")));
    }

    let props = &feature.properties;
    let municipality = non_empty(props.municipalite.as_deref()).map(str::to_string);
    let city = non_empty(props.ville.as_deref())
        .map(str::to_string)
        .or_else(|| municipality.clone());

    Ok(Some(ResolvedAddress {
        latitude: lat,
        longitude: lon,
        formatted_address: format_provincial_address(props),
        municipality,
        city,
        region: region_label(point).to_string(),
        source: GeocoderSource::Provincial,
    }))
}

// ─── Nominatim ──────────────────────────────────────────────────

#[derive(Deserialize, Debug, Clone)]
pub struct NominatimResult {
    pub lat: String,
    pub lon: String,
    pub display_name: String,
    #[serde(default)]
    pub address: NominatimAddress,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct NominatimAddress {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub town: Option<String>,
    #[serde(default)]
    pub village: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl NominatimAddress {
    pub fn municipality(&self) -> Option<String> {
        non_empty(self.city.as_deref())
            .or_else(|| non_empty(self.town.as_deref()))
            .or_else(|| non_empty(self.village.as_deref()))
            .map(str::to_string)
    }

    /// Province named by the geocoder; assumed Québec when absent.
    pub fn state_or_default(&self) -> &str {
        non_empty(self.state.as_deref()).unwrap_or("Québec")
    }
}

/// Case-insensitive check that a geocoder's region names the province.
pub fn is_province(state: &str) -> bool {
    let s = state.to_lowercase();
    s.contains("québec") || s.contains("quebec")
}

/// Resolve through Nominatim, restricted to Canada, with structured parts.
pub fn nominatim_geocode(
    client: &HttpClient,
    url: &str,
    query: &str,
) -> Result<ResolvedAddress, ResolutionFailure> {
    let results: Vec<NominatimResult> = client
        .get_json(
            url,
            &[
                ("q", query),
                ("format", "json"),
                ("limit", "1"),
                ("countrycodes", "ca"),
                ("addressdetails", "1"),
            ],
        )
        .map_err(|e| ResolutionFailure::Geocoder(e.to_string()))?;

    let Some(top) = results.into_iter().next() else {
        return Err(ResolutionFailure::NotFound { query: query.to_string() });
    };

    let state = top.address.state_or_default();
    if !is_province(state) {
        return Err(ResolutionFailure::OutsideProvince { region: state.to_string() });
    }

    let lat: f64 = top
        .lat
        .trim()
        .parse()
        .map_err(|_| ResolutionFailure::Geocoder(format!("invalid latitude '{}'", top.lat)))?;
    let lon: f64 = top
        .lon
        .trim()
        .parse()
        .map_err(|_| ResolutionFailure::Geocoder(format!("invalid longitude '{}'", top.lon)))?;
    let point = GeoPoint::new(lat, lon);
    if !point.is_valid() {
        return Err(ResolutionFailure::InvalidCoordinates);
    }

    let municipality = top.address.municipality();
    Ok(ResolvedAddress {
        latitude: lat,
        longitude: lon,
        formatted_address: top.display_name,
        city: municipality.clone(),
        municipality,
        region: region_label(point).to_string(),
        source: GeocoderSource::Nominatim,
    })
}
