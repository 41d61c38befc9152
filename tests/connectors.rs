use serde_json::json;
use std::sync::Arc;
use vigie_immo::geo::GeoPoint;
use vigie_immo::sources::contamination::ContaminationConnector;
use vigie_immo::sources::crime::{CrimeConnector, CrimeDensity};
use vigie_immo::sources::http::HttpClient;
use vigie_immo::sources::hydrants::HydrantConnector;
use vigie_immo::sources::seismic::SeismicConnector;
use vigie_immo::sources::services::ServicesConnector;
use vigie_immo::sources::{DataQuality, FetchRequest, RiskLevel, SourceConnector};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ORIGIN: GeoPoint = GeoPoint::new(45.5088, -73.5540);

async fn fetch<C: SourceConnector>(connector: C, request: FetchRequest) -> C::Output {
    let connector = Arc::new(connector);
    tokio::task::spawn_blocking(move || connector.fetch(&request))
        .await
        .unwrap()
}

fn crime_record(category: &str, pdq: &str, lat: f64, lon: f64) -> serde_json::Value {
    json!({"CATEGORIE": category, "PDQ": pdq, "LATITUDE": lat, "LONGITUDE": lon, "DATE": "2024-05-01"})
}

#[tokio::test(flavor = "multi_thread")]
async fn test_crime_counts_incidents_within_one_km() {
    let server = MockServer::start().await;
    let mut records = vec![
        crime_record("Vol de véhicule à moteur", "21", 45.5090, -73.5545),
        crime_record("Méfait", "21", 45.5100, -73.5530),
        crime_record("Méfait", "20", 45.5080, -73.5550),
        crime_record("Vol de véhicule à moteur", "21", 45.5070, -73.5540),
        // Outside the circle, inside the bounding square.
        crime_record("Introduction", "22", 45.5170, -73.5640),
        // Null island rows are dropped.
        crime_record("Méfait", "21", 0.0, 0.0),
    ];
    for _ in 0..8 {
        records.push(crime_record("Méfaits et vols", "21", 45.5089, -73.5541));
    }
    Mock::given(method("GET"))
        .and(path("/datastore_search_sql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": {"records": records}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let connector = CrimeConnector::new(HttpClient::default(), format!("{}/datastore_search_sql", server.uri()));
    let stats = fetch(connector, FetchRequest::new(ORIGIN)).await;

    assert_eq!(stats.data_quality, DataQuality::Haute);
    assert_eq!(stats.incidents_1km, Some(12));
    assert_eq!(stats.crime_density, Some(CrimeDensity::Moderate));
    assert_eq!(stats.risk_level, RiskLevel::Medium);
    assert_eq!(stats.most_common_category.as_deref(), Some("Méfaits et vols"));
    assert_eq!(stats.pdq.as_deref(), Some("21"));
    assert_eq!(stats.incidents_by_category[0], ("Vol de véhicule à moteur".to_string(), 2));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_crime_rejected_query_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(path("/datastore_search_sql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false, "error": {"message": "bad sql"}})))
        .mount(&server)
        .await;

    let connector = CrimeConnector::new(HttpClient::default(), format!("{}/datastore_search_sql", server.uri()));
    let stats = fetch(connector, FetchRequest::new(ORIGIN)).await;
    assert_eq!(stats.data_quality, DataQuality::Indisponible);
    assert_eq!(stats.source, "Data unavailable (Montréal)");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_contamination_on_site_and_nearby() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/contamination/query"))
        .and(query_param("distance", "500"))
        .and(query_param("units", "esriSRUnit_Meter"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "features": [
                {
                    "attributes": {"NO_MEF_LIEU": 7412, "ADR_CIV_LIEU": "1200 rue Peel\n", "NB_FICHES": 2,
                                   "DESC_MILIEU_RECEPT": "Sol", "LST_MRC_REG_ADM": "Montréal"},
                    "geometry": {"x": -73.5560, "y": 45.5110}
                },
                {
                    "attributes": {"NO_MEF_LIEU": "9001", "LATITUDE": 45.50885, "LONGITUDE": -73.55405},
                    "geometry": null
                }
            ]
        })))
        .mount(&server)
        .await;

    let connector = ContaminationConnector::new(HttpClient::default(), format!("{}/contamination/query", server.uri()));
    let report = fetch(connector, FetchRequest::new(ORIGIN)).await;

    assert_eq!(report.data_quality, DataQuality::Haute);
    assert!(report.is_contaminated);
    assert_eq!(report.nearby_count, 2);
    assert_eq!(report.sites[0].name, "Site 9001");
    assert_eq!(report.sites[0].address, "address unavailable");
    assert_eq!(report.sites[1].record_count, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_contamination_service_error_object() {
    let server = MockServer::start().await;
    Mock::given(path("/contamination/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": {"code": 400, "message": "Invalid query"}})))
        .mount(&server)
        .await;

    let connector = ContaminationConnector::new(HttpClient::default(), format!("{}/contamination/query", server.uri()));
    let report = fetch(connector, FetchRequest::new(ORIGIN)).await;
    assert_eq!(report.data_quality, DataQuality::Indisponible);
    assert!(!report.is_contaminated);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_hydrants_fall_back_to_montreal_datastore() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/overpass"))
        .respond_with(ResponseTemplate::new(504))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/overpass-mirror"))
        .and(body_string_contains("fire_hydrant"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/datastore_search_sql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": {"records": [
                {"LATITUDE": "45.5100", "LONGITUDE": "-73.5540"},
                {"LATITUDE": 45.5090, "LONGITUDE": -73.5540},
                {"LATITUDE": 45.5130, "LONGITUDE": -73.5600}
            ]}
        })))
        .mount(&server)
        .await;

    let connector = HydrantConnector::new(
        HttpClient::default(),
        vec![format!("{}/overpass", server.uri()), format!("{}/overpass-mirror", server.uri())],
        format!("{}/datastore_search_sql", server.uri()),
    );
    let coverage = fetch(connector, FetchRequest::new(ORIGIN)).await;

    assert_eq!(coverage.data_quality, DataQuality::Moyenne);
    assert_eq!(coverage.hydrants_count_200m, 2);
    assert_eq!(coverage.hydrants_count_500m, 2);
    let nearest = coverage.nearest_hydrant.unwrap();
    assert!(nearest.distance < 30.0);
    assert_eq!(coverage.risk_level, RiskLevel::Low);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_seismic_interpolation_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/seismic"))
        .and(query_param("code", "nbc2020"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sa": {"0.0": {"2%/50yrs": "0.41237", "10%/50yrs": 0.12}}
        })))
        .mount(&server)
        .await;

    let connector = SeismicConnector::new(HttpClient::default(), format!("{}/seismic", server.uri()));
    let hazard = fetch(connector, FetchRequest::new(GeoPoint::new(47.55, -70.3))).await;

    assert_eq!(hazard.data_quality, DataQuality::Haute);
    assert_eq!(hazard.pga_2percent_50yr, Some(0.4124));
    assert_eq!(hazard.risk_level, RiskLevel::High);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_seismic_without_pga_uses_regional_table() {
    let server = MockServer::start().await;
    Mock::given(path("/seismic"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sa": {}})))
        .mount(&server)
        .await;

    let connector = SeismicConnector::new(HttpClient::default(), format!("{}/seismic", server.uri()));
    let hazard = fetch(connector, FetchRequest::new(ORIGIN)).await;

    assert_eq!(hazard.data_quality, DataQuality::Moyenne);
    assert_eq!(hazard.seismic_zone, "Ouest du Québec");
    assert_eq!(hazard.risk_level, RiskLevel::Medium);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_partial_live_services_filled_from_static_list() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/overpass"))
        .and(body_string_contains("fire_station"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "elements": [
                {"type": "node", "lat": 45.5095, "lon": -73.5545, "tags": {"amenity": "fire_station", "name": "Caserne 3"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let connector = ServicesConnector::new(HttpClient::default(), vec![format!("{}/overpass", server.uri())]);
    let services = fetch(connector, FetchRequest::new(ORIGIN)).await;

    assert_eq!(services.data_quality, DataQuality::Moyenne);
    assert_eq!(services.source, "OpenStreetMap + static reference list");
    assert_eq!(services.fire_station.unwrap().name, "Caserne 3");
    let hospital = services.hospital.unwrap();
    assert_eq!(hospital.name, "CHUM");
    assert_eq!(hospital.address, "1051 Rue Sanguinet, Montréal");
    assert_eq!(services.police_station.unwrap().name, "Poste 21 - PDQ 21");
}
