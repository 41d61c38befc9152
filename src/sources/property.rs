//! Property assessment from the pre-loaded PostGIS store.
//!
//! The store is filled by an offline ETL job. Each request checks out exactly
//! one pooled connection; it goes back to the pool when dropped, error or not.

use super::{unavailable_source, DataQuality, DomainRecord, FetchRequest};
use crate::config::StoreConfig;
use crate::error::SourceUnavailable;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

pub const SEARCH_RADIUS_M: f64 = 500.0;

const NEAREST_ASSESSMENT_SQL: &str = "\
    SELECT matricule::text AS matricule,
           civic_number::text AS civic_number,
           street_name::text AS street_name,
           municipality::text AS municipality,
           land_value::bigint AS land_value,
           building_value::bigint AS building_value,
           total_value::bigint AS total_value,
           year_built::int AS year_built,
           lot_area_sqm::float8 AS lot_area_sqm,
           building_area_sqm::float8 AS building_area_sqm,
           use_code::text AS use_code,
           ST_Distance(geom::geography, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography) AS distance
    FROM property_assessments
    WHERE geom IS NOT NULL
      AND ST_DWithin(geom::geography, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography, $3)
    ORDER BY distance
    LIMIT 1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyAssessment {
    pub matricule: Option<String>,
    pub address: Option<String>,
    pub land_value: Option<i64>,
    pub building_value: Option<i64>,
    pub total_value: Option<i64>,
    pub building_year: Option<i32>,
    pub lot_area_sqm: Option<f64>,
    pub building_area_sqm: Option<f64>,
    pub property_type: Option<String>,
    /// Meters between the request point and the matched parcel.
    pub match_distance_m: Option<f64>,
    pub source: String,
    pub data_quality: DataQuality,
    pub region: String,
}

impl DomainRecord for PropertyAssessment {
    const DOMAIN: &'static str = "property_assessment";

    fn unavailable(region: &str) -> Self {
        Self {
            matricule: None,
            address: None,
            land_value: None,
            building_value: None,
            total_value: None,
            building_year: None,
            lot_area_sqm: None,
            building_area_sqm: None,
            property_type: None,
            match_distance_m: None,
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

#[derive(sqlx::FromRow)]
struct AssessmentRow {
    matricule: Option<String>,
    civic_number: Option<String>,
    street_name: Option<String>,
    municipality: Option<String>,
    land_value: Option<i64>,
    building_value: Option<i64>,
    total_value: Option<i64>,
    year_built: Option<i32>,
    lot_area_sqm: Option<f64>,
    building_area_sqm: Option<f64>,
    use_code: Option<String>,
    distance: Option<f64>,
}

impl AssessmentRow {
    fn into_assessment(self, region: &str) -> PropertyAssessment {
        let address = [self.civic_number, self.street_name, self.municipality]
            .into_iter()
            .flatten()
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>();
        PropertyAssessment {
            matricule: self.matricule,
            address: (!address.is_empty()).then(|| address.join(" ")),
            land_value: self.land_value,
            building_value: self.building_value,
            total_value: self.total_value,
            building_year: self.year_built,
            lot_area_sqm: self.lot_area_sqm.filter(|a| *a > 0.0),
            building_area_sqm: self.building_area_sqm.filter(|a| *a > 0.0),
            property_type: self.use_code,
            match_distance_m: self.distance.map(f64::round),
            source: "Québec property assessment roll (PostGIS)".into(),
            data_quality: DataQuality::Haute,
            region: region.to_string(),
        }
    }
}

/// Async connector backed by a bounded Postgres pool.
#[derive(Clone, Default)]
pub struct PropertyConnector {
    pool: Option<PgPool>,
}

impl PropertyConnector {
    pub fn new(pool: Option<PgPool>) -> Self {
        Self { pool }
    }

    /// Lazily connecting pool from the store settings; no DSN means no store.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_config(store: &StoreConfig) -> Self {
        let Some(dsn) = store.dsn.as_deref() else {
            tracing::warn!("VIGIE_DB_DSN not set, property assessments unavailable");
            return Self::default();
        };
        let pool = PgPoolOptions::new()
            .max_connections(store.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy(dsn);
        match pool {
            Ok(pool) => Self::new(Some(pool)),
            Err(err) => {
                tracing::warn!(error = %err, "invalid property store DSN, property assessments unavailable");
                Self::default()
            }
        }
    }

    pub async fn fetch(&self, request: &FetchRequest) -> PropertyAssessment {
        let region = request.region();
        tracing::debug!(domain = PropertyAssessment::DOMAIN, tier = "property store", "trying tier");
        match self.query_store(request).await {
            Ok(Some(assessment)) => {
                tracing::info!(domain = PropertyAssessment::DOMAIN, tier = "property store", "tier answered");
                assessment
            }
            Ok(None) => {
                tracing::debug!(domain = PropertyAssessment::DOMAIN, "no assessed parcel within range");
                PropertyAssessment::unavailable(region)
            }
            Err(err) => {
                tracing::warn!(domain = PropertyAssessment::DOMAIN, error = %err, "tier unavailable");
                PropertyAssessment::unavailable(region)
            }
        }
    }

    async fn query_store(&self, request: &FetchRequest) -> Result<Option<PropertyAssessment>, SourceUnavailable> {
        let Some(pool) = &self.pool else {
            return Err(SourceUnavailable::Store("no property store configured".into()));
        };
        let mut conn = pool.acquire().await?;
        let row = sqlx::query_as::<_, AssessmentRow>(NEAREST_ASSESSMENT_SQL)
            .bind(request.point.longitude)
            .bind(request.point.latitude)
            .bind(request.radius_or(SEARCH_RADIUS_M))
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.map(|r| r.into_assessment(request.region())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;

    fn row() -> AssessmentRow {
        AssessmentRow {
            matricule: Some("9739-04-1234".into()),
            civic_number: Some("1000".into()),
            street_name: Some(" Rue Sainte-Catherine ".into()),
            municipality: Some("Montréal".into()),
            land_value: Some(250_000),
            building_value: Some(400_000),
            total_value: Some(650_000),
            year_built: Some(1925),
            lot_area_sqm: Some(0.0),
            building_area_sqm: Some(180.5),
            use_code: Some("1000".into()),
            distance: Some(12.4),
        }
    }

    #[test]
    fn test_row_mapping() {
        let assessment = row().into_assessment("Montréal");
        assert_eq!(assessment.address.as_deref(), Some("1000 Rue Sainte-Catherine Montréal"));
        assert_eq!(assessment.total_value, Some(650_000));
        assert_eq!(assessment.lot_area_sqm, None);
        assert_eq!(assessment.match_distance_m, Some(12.0));
        assert_eq!(assessment.data_quality, DataQuality::Haute);
    }

    #[tokio::test]
    async fn test_no_store_is_unavailable() {
        let connector = PropertyConnector::from_config(&StoreConfig::default());
        let result = connector.fetch(&FetchRequest::new(GeoPoint::new(45.5, -73.6))).await;
        assert_eq!(result.data_quality, DataQuality::Indisponible);
        assert_eq!(result.source, "Data unavailable (Montréal)");
    }

    #[tokio::test]
    async fn test_unreachable_store_is_unavailable() {
        let connector = PropertyConnector::from_config(&StoreConfig {
            dsn: Some("postgres://vigie@127.0.0.1:9/vigie".into()),
            max_connections: 1,
        });
        let result = connector.fetch(&FetchRequest::new(GeoPoint::new(45.5, -73.6))).await;
        assert_eq!(result.data_quality, DataQuality::Indisponible);
    }
}
