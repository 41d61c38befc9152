//! Montréal open-data portal (CKAN `datastore_search_sql`).

use super::arcgis::number_of;
use super::http::HttpClient;
use crate::error::SourceUnavailable;
use crate::geo::GeoPoint;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Meters per degree of latitude, used for bounding boxes.
pub const METERS_PER_DEGREE: f64 = 111_000.0;

pub const HYDRANTS_RESOURCE: &str = "4de4f5e4-a373-4b20-89e7-9c09f735f782";
pub const CRIMES_RESOURCE: &str = "c005e27f-a20e-4d2d-bf5b-1ae1e4d4d5f5";

#[derive(Deserialize, Debug)]
struct SqlResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    result: Option<SqlResult>,
}

#[derive(Deserialize, Debug, Default)]
struct SqlResult {
    #[serde(default)]
    records: Vec<Record>,
}

/// One datastore row.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(transparent)]
pub struct Record(pub Map<String, Value>);

impl Record {
    pub fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn point(&self) -> Option<GeoPoint> {
        let lat = number_of(self.0.get("LATITUDE")?)?;
        let lon = number_of(self.0.get("LONGITUDE")?)?;
        Some(GeoPoint::new(lat, lon)).filter(GeoPoint::is_valid)
    }
}

/// `SELECT <columns> FROM "<resource>"` restricted to a square around `point`.
pub fn bbox_sql(resource: &str, columns: &str, point: GeoPoint, half_side_m: f64, limit: u32) -> String {
    let delta = half_side_m / METERS_PER_DEGREE;
    format!(
        "SELECT {columns} FROM \"{resource}\" \
         WHERE \"LATITUDE\" BETWEEN {} AND {} \
         AND \"LONGITUDE\" BETWEEN {} AND {} \
         LIMIT {limit}",
        point.latitude - delta,
        point.latitude + delta,
        point.longitude - delta,
        point.longitude + delta,
    )
}

pub fn search_sql(client: &HttpClient, url: &str, sql: &str) -> Result<Vec<Record>, SourceUnavailable> {
    let response: SqlResponse = client.get_json(url, &[("sql", sql)])?;
    if response.success == Some(false) {
        return Err(SourceUnavailable::Service("datastore query rejected".into()));
    }
    Ok(response.result.unwrap_or_default().records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_sql_bounds() {
        let sql = bbox_sql(HYDRANTS_RESOURCE, "\"LATITUDE\", \"LONGITUDE\"", GeoPoint::new(45.0, -73.0), 55_500.0, 100);
        assert!(sql.contains("FROM \"4de4f5e4-a373-4b20-89e7-9c09f735f782\""));
        assert!(sql.contains("BETWEEN 44.5 AND 45.5"));
        assert!(sql.contains("BETWEEN -73.5 AND -72.5"));
        assert!(sql.ends_with("LIMIT 100"));
    }

    #[test]
    fn test_record_point_accepts_strings() {
        let record: Record =
            serde_json::from_value(serde_json::json!({"LATITUDE": "45.51", "LONGITUDE": -73.56})).unwrap();
        assert_eq!(record.point(), Some(GeoPoint::new(45.51, -73.56)));
    }

    #[test]
    fn test_record_without_coordinates() {
        let record: Record = serde_json::from_value(serde_json::json!({"CATEGORIE": "Vol"})).unwrap();
        assert_eq!(record.point(), None);
        assert_eq!(record.text("CATEGORIE").as_deref(), Some("Vol"));
    }
}
