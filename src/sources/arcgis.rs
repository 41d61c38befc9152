//! ArcGIS REST feature-service queries (flood zones, contaminated sites).

use super::http::HttpClient;
use crate::error::SourceUnavailable;
use crate::geo::GeoPoint;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Point geometry filter in WGS84: `{x: lon, y: lat, spatialReference: {wkid: 4326}}`.
pub fn point_geometry(point: GeoPoint) -> String {
    serde_json::json!({
        "x": point.longitude,
        "y": point.latitude,
        "spatialReference": { "wkid": 4326 }
    })
    .to_string()
}

#[derive(Deserialize, Debug, Default)]
pub struct FeatureSet {
    #[serde(default)]
    pub features: Vec<Feature>,
    /// Services report some failures inside a 200 body.
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct Feature {
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub geometry: Option<Value>,
}

impl Feature {
    pub fn text(&self, key: &str) -> Option<String> {
        match self.attributes.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        number_of(self.attributes.get(key)?)
    }

    /// Point location from the geometry, else from the given attribute pair.
    pub fn location(&self, lat_attr: &str, lon_attr: &str) -> Option<GeoPoint> {
        let from_geometry = self.geometry.as_ref().and_then(|g| {
            let x = number_of(g.get("x")?)?;
            let y = number_of(g.get("y")?)?;
            Some(GeoPoint::new(y, x))
        });
        from_geometry
            .or_else(|| Some(GeoPoint::new(self.number(lat_attr)?, self.number(lon_attr)?)))
            .filter(|p| p.is_valid() && (p.latitude != 0.0 || p.longitude != 0.0))
    }
}

pub(crate) fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Spatial query options shared by the feature services.
pub struct SpatialQuery<'a> {
    pub point: GeoPoint,
    pub out_fields: &'a str,
    pub distance_m: Option<f64>,
    pub return_geometry: bool,
    pub record_count: Option<u32>,
}

/// Run an intersect (optionally buffered) query against a feature layer.
pub fn query(client: &HttpClient, url: &str, q: &SpatialQuery<'_>) -> Result<FeatureSet, SourceUnavailable> {
    let geometry = point_geometry(q.point);
    let distance = q.distance_m.map(|d| format!("{}", d.round() as i64));
    let record_count = q.record_count.map(|n| n.to_string());

    let mut params: Vec<(&str, &str)> = vec![
        ("where", "1=1"),
        ("geometry", &geometry),
        ("geometryType", "esriGeometryPoint"),
        ("spatialRel", "esriSpatialRelIntersects"),
        ("outFields", q.out_fields),
        ("returnGeometry", if q.return_geometry { "true" } else { "false" }),
        ("outSR", "4326"),
        ("f", "json"),
    ];
    if let Some(d) = distance.as_deref() {
        params.push(("distance", d));
        params.push(("units", "esriSRUnit_Meter"));
    }
    if let Some(n) = record_count.as_deref() {
        params.push(("resultRecordCount", n));
    }

    let set: FeatureSet = client.get_json(url, &params)?;
    if let Some(err) = set.error {
        return Err(SourceUnavailable::Service(err.to_string()));
    }
    Ok(set)
}
