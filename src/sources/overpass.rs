//! Overpass (OpenStreetMap) around-radius queries with mirror failover.

use super::http::HttpClient;
use crate::error::SourceUnavailable;
use crate::geo::GeoPoint;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Deserialize, Debug, Default)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<Element>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct Element {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    /// Present on ways queried with `out center`.
    #[serde(default)]
    pub center: Option<Center>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Deserialize, Debug, Default, Clone, Copy)]
pub struct Center {
    pub lat: f64,
    pub lon: f64,
}

impl Element {
    /// Node position, else the way's center.
    pub fn point(&self) -> Option<GeoPoint> {
        match (self.lat, self.lon, self.center) {
            (Some(lat), Some(lon), _) => Some(GeoPoint::new(lat, lon)),
            (_, _, Some(c)) => Some(GeoPoint::new(c.lat, c.lon)),
            _ => None,
        }
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str).filter(|v| !v.trim().is_empty())
    }
}

/// Fire stations, hospitals and police (nodes and ways) around a point.
pub fn emergency_services_query(point: GeoPoint, radius_m: f64) -> String {
    let around = around(point, radius_m);
    format!(
        "[out:json][timeout:20];\n(\n  \
         node[\"amenity\"=\"fire_station\"]{around};\n  \
         way[\"amenity\"=\"fire_station\"]{around};\n  \
         node[\"amenity\"=\"hospital\"]{around};\n  \
         way[\"amenity\"=\"hospital\"]{around};\n  \
         node[\"amenity\"=\"police\"]{around};\n  \
         way[\"amenity\"=\"police\"]{around};\n\
         );\nout center body;"
    )
}

/// Fire hydrant nodes around a point.
pub fn hydrants_query(point: GeoPoint, radius_m: f64) -> String {
    let around = around(point, radius_m);
    format!("[out:json][timeout:20];\nnode[\"emergency\"=\"fire_hydrant\"]{around};\nout body;")
}

fn around(point: GeoPoint, radius_m: f64) -> String {
    format!("(around:{},{},{})", radius_m.round() as i64, point.latitude, point.longitude)
}

/// POST the query to each mirror in turn; the first 200 wins.
pub fn run(client: &HttpClient, mirrors: &[String], query: &str) -> Result<OverpassResponse, SourceUnavailable> {
    let mut last_err = SourceUnavailable::Service("no Overpass endpoint configured".into());
    for url in mirrors {
        match client.post_form_json::<OverpassResponse>(url, &[("data", query)]) {
            Ok(response) => return Ok(response),
            Err(err) => {
                tracing::debug!(url = %url, error = %err, "Overpass mirror failed");
                last_err = err;
            }
        }
    }
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_point_from_node_or_center() {
        let node: Element = serde_json::from_value(serde_json::json!({"lat": 45.5, "lon": -73.6})).unwrap();
        assert_eq!(node.point(), Some(GeoPoint::new(45.5, -73.6)));

        let way: Element =
            serde_json::from_value(serde_json::json!({"center": {"lat": 46.8, "lon": -71.2}})).unwrap();
        assert_eq!(way.point(), Some(GeoPoint::new(46.8, -71.2)));

        assert_eq!(Element::default().point(), None);
    }

    #[test]
    fn test_queries_embed_radius_and_point() {
        let q = emergency_services_query(GeoPoint::new(45.5, -73.6), 5000.0);
        assert!(q.contains("(around:5000,45.5,-73.6)"));
        assert!(q.contains("way[\"amenity\"=\"police\"]"));
        assert!(q.ends_with("out center body;"));

        let q = hydrants_query(GeoPoint::new(45.5, -73.6), 500.0);
        assert!(q.contains("node[\"emergency\"=\"fire_hydrant\"](around:500,45.5,-73.6)"));
    }

    #[test]
    fn test_no_mirrors_is_unavailable() {
        let result = run(&HttpClient::default(), &[], "[out:json];");
        assert!(matches!(result, Err(SourceUnavailable::Service(_))));
    }

    #[test]
    fn test_blank_tag_ignored() {
        let el: Element = serde_json::from_value(serde_json::json!({"tags": {"name": " ", "amenity": "police"}})).unwrap();
        assert_eq!(el.tag("name"), None);
        assert_eq!(el.tag("amenity"), Some("police"));
    }
}
