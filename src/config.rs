//! Runtime configuration read from the environment (and an optional `.env`).

use std::env;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_USER_AGENT: &str = "VigieImmo/2.0";

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telemetry: TelemetryConfig,
    pub http: HttpConfig,
    pub timeouts: TimeoutConfig,
    pub store: StoreConfig,
    pub endpoints: Endpoints,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let log_level = env::var("VIGIE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let http = HttpConfig {
            user_agent: env::var("VIGIE_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
            timeout: Duration::from_secs(parse_var("VIGIE_HTTP_TIMEOUT_SECS", 15)?),
        };

        let timeouts = TimeoutConfig {
            connector: Duration::from_secs(parse_var("VIGIE_CONNECTOR_TIMEOUT_SECS", 30)?),
            request: Duration::from_secs(parse_var("VIGIE_REQUEST_DEADLINE_SECS", 60)?),
        };

        let store = StoreConfig {
            dsn: env::var("VIGIE_DB_DSN").ok().filter(|s| !s.trim().is_empty()),
            max_connections: parse_var("VIGIE_DB_MAX_CONNECTIONS", 5)?,
        };

        Ok(Self {
            telemetry: TelemetryConfig { log_level },
            http,
            timeouts,
            store,
            endpoints: Endpoints::from_env(),
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Settings of the shared outbound HTTP agent.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

/// Wall-clock budgets for connector calls.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutConfig {
    /// Budget of a single connector, all of its tiers included.
    pub connector: Duration,
    /// Deadline bounding every connector of one request.
    pub request: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connector: Duration::from_secs(30),
            request: Duration::from_secs(60),
        }
    }
}

/// Property-assessment store connection.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    pub dsn: Option<String>,
    pub max_connections: u32,
}

/// Outbound service URLs.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub provincial_geocoder: String,
    pub nominatim: String,
    pub flood_zones: String,
    pub contaminated_sites: String,
    pub overpass: Vec<String>,
    pub montreal_datastore: String,
    pub seismic: String,
    pub air_quality_csv: String,
    pub disaster_history: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            provincial_geocoder: "https://ws.mapserver.transports.gouv.qc.ca/swtq".into(),
            nominatim: "https://nominatim.openstreetmap.org/search".into(),
            flood_zones: "https://services1.arcgis.com/QZKc6I4nVMd4XrMx/arcgis/rest/services/Zones_inondables/FeatureServer/0/query".into(),
            contaminated_sites: "https://www.servicesgeo.enviroweb.gouv.qc.ca/donnees/rest/services/Public/Themes_publics/MapServer/12/query".into(),
            overpass: vec![
                "https://overpass-api.de/api/interpreter".into(),
                "https://overpass.kumi.systems/api/interpreter".into(),
            ],
            montreal_datastore: "https://donnees.montreal.ca/api/3/action/datastore_search_sql".into(),
            seismic: "https://www.earthquakescanada.nrcan.gc.ca/hazard-alea/interpolat/nbc-cnb-en.php".into(),
            air_quality_csv: "https://donnees.montreal.ca/dataset/8f3acae0-eb64-4e27-a356-25e33a9ddfab/resource/2ae670a4-0851-4486-81c4-e46dab5b02f5/download/rsqa-indice-qualite-air.csv".into(),
            disaster_history: "https://geoegl.msp.gouv.qc.ca/apis/wss/historiquesc.fcgi".into(),
        }
    }
}

impl Endpoints {
    /// Defaults, overridden per service by `VIGIE_<SERVICE>_URL`.
    pub fn from_env() -> Self {
        let mut endpoints = Self::default();
        let overrides: [(&str, &mut String); 8] = [
            ("VIGIE_GEOCODER_URL", &mut endpoints.provincial_geocoder),
            ("VIGIE_NOMINATIM_URL", &mut endpoints.nominatim),
            ("VIGIE_FLOOD_URL", &mut endpoints.flood_zones),
            ("VIGIE_CONTAMINATION_URL", &mut endpoints.contaminated_sites),
            ("VIGIE_MONTREAL_DATASTORE_URL", &mut endpoints.montreal_datastore),
            ("VIGIE_SEISMIC_URL", &mut endpoints.seismic),
            ("VIGIE_AIR_QUALITY_URL", &mut endpoints.air_quality_csv),
            ("VIGIE_DISASTER_URL", &mut endpoints.disaster_history),
        ];
        for (name, slot) in overrides {
            if let Ok(value) = env::var(name) {
                if !value.trim().is_empty() {
                    *slot = value.trim().to_string();
                }
            }
        }
        if let Ok(list) = env::var("VIGIE_OVERPASS_URL") {
            let urls = split_url_list(&list);
            if !urls.is_empty() {
                endpoints.overpass = urls;
            }
        }
        endpoints
    }

    /// Every service at the same base URL; handy for pointing a whole
    /// pipeline at one mock server.
    pub fn all_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            provincial_geocoder: format!("{base}/geocoder"),
            nominatim: format!("{base}/nominatim"),
            flood_zones: format!("{base}/flood/query"),
            contaminated_sites: format!("{base}/contamination/query"),
            overpass: vec![format!("{base}/overpass"), format!("{base}/overpass-mirror")],
            montreal_datastore: format!("{base}/datastore_search_sql"),
            seismic: format!("{base}/seismic"),
            air_quality_csv: format!("{base}/rsqa.csv"),
            disaster_history: format!("{base}/disasters"),
        }
    }
}

fn split_url_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a non-negative integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints_have_two_overpass_mirrors() {
        let endpoints = Endpoints::default();
        assert_eq!(endpoints.overpass.len(), 2);
        assert!(endpoints.nominatim.starts_with("https://"));
    }

    #[test]
    fn test_all_at_strips_trailing_slash() {
        let endpoints = Endpoints::all_at("http://127.0.0.1:9000/");
        assert_eq!(endpoints.seismic, "http://127.0.0.1:9000/seismic");
        assert_eq!(endpoints.overpass[1], "http://127.0.0.1:9000/overpass-mirror");
    }

    #[test]
    fn test_split_url_list() {
        assert_eq!(
            split_url_list(" http://a , ,http://b"),
            vec!["http://a".to_string(), "http://b".to_string()]
        );
        assert!(split_url_list(" , ").is_empty());
    }

    #[test]
    fn test_parse_var_default_when_unset() {
        let value: u64 = parse_var("VIGIE_TEST_SURELY_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }
}
