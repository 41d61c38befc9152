//! Analysis pipeline: resolve the address, query the nine domains
//! concurrently, score.
//!
//! Resolution failure is the only error; nothing is queried in that case.
//! Each blocking connector runs on the blocking pool under its own timeout,
//! capped by the request deadline. A connector that overruns, or whose task
//! panics, is replaced by its terminal record without touching its siblings.

use crate::config::{AppConfig, Endpoints, TimeoutConfig};
use crate::error::ResolutionFailure;
use crate::geo::GeoPoint;
use crate::location::{AddressResolution, AddressResolver, ResolvedAddress};
use crate::risk::{self, RiskAssessment};
use crate::sources::air_quality::AirQualityConnector;
use crate::sources::contamination::ContaminationConnector;
use crate::sources::crime::CrimeConnector;
use crate::sources::disaster::DisasterConnector;
use crate::sources::flood::FloodConnector;
use crate::sources::http::HttpClient;
use crate::sources::hydrants::HydrantConnector;
use crate::sources::property::{PropertyAssessment, PropertyConnector};
use crate::sources::seismic::SeismicConnector;
use crate::sources::services::ServicesConnector;
use crate::sources::{DataQuality, DomainRecord, DomainResults, FetchRequest, SourceConnector};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Full report for one address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub input: String,
    pub address: ResolvedAddress,
    #[serde(flatten)]
    pub domains: DomainResults,
    pub risk_assessment: RiskAssessment,
    pub generated_at: DateTime<Utc>,
}

impl AnalysisReport {
    pub fn resolution(&self) -> AddressResolution {
        AddressResolution::from(&Ok(self.address.clone()))
    }
}

/// Owns the resolver and one instance of every connector; shareable across
/// requests.
pub struct Analyzer {
    resolver: AddressResolver,
    flood: Arc<FloodConnector>,
    contamination: Arc<ContaminationConnector>,
    services: Arc<ServicesConnector>,
    hydrants: Arc<HydrantConnector>,
    seismic: Arc<SeismicConnector>,
    air_quality: Arc<AirQualityConnector>,
    disaster: Arc<DisasterConnector>,
    crime: Arc<CrimeConnector>,
    property: PropertyConnector,
    timeouts: TimeoutConfig,
}

impl Analyzer {
    pub fn new(
        client: HttpClient,
        endpoints: &Endpoints,
        property: PropertyConnector,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            resolver: AddressResolver::new(
                client.clone(),
                endpoints.provincial_geocoder.clone(),
                endpoints.nominatim.clone(),
            ),
            flood: Arc::new(FloodConnector::new(client.clone(), endpoints.flood_zones.clone())),
            contamination: Arc::new(ContaminationConnector::new(
                client.clone(),
                endpoints.contaminated_sites.clone(),
            )),
            services: Arc::new(ServicesConnector::new(client.clone(), endpoints.overpass.clone())),
            hydrants: Arc::new(HydrantConnector::new(
                client.clone(),
                endpoints.overpass.clone(),
                endpoints.montreal_datastore.clone(),
            )),
            seismic: Arc::new(SeismicConnector::new(client.clone(), endpoints.seismic.clone())),
            air_quality: Arc::new(AirQualityConnector::new(client.clone(), endpoints.air_quality_csv.clone())),
            disaster: Arc::new(DisasterConnector::new(client.clone(), endpoints.disaster_history.clone())),
            crime: Arc::new(CrimeConnector::new(client, endpoints.montreal_datastore.clone())),
            property,
            timeouts,
        }
    }

    /// Build from configuration. Must be called from within a Tokio runtime.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            HttpClient::new(&config.http),
            &config.endpoints,
            PropertyConnector::from_config(&config.store),
            config.timeouts,
        )
    }

    /// Resolve `address` and build the full report.
    pub async fn analyze(&self, address: &str) -> Result<AnalysisReport, ResolutionFailure> {
        let resolver = self.resolver.clone();
        let raw = address.to_string();
        let resolved = tokio::task::spawn_blocking(move || resolver.resolve(&raw))
            .await
            .map_err(|err| ResolutionFailure::Geocoder(format!("resolver task failed: {err}")))??;
        Ok(self.report(address, resolved).await)
    }

    /// Report for a known coordinate, skipping the geocoders.
    pub async fn analyze_point(
        &self,
        point: GeoPoint,
        municipality: Option<&str>,
    ) -> Result<AnalysisReport, ResolutionFailure> {
        let resolved = AddressResolver::from_coordinates(point, municipality)?;
        let input = resolved.formatted_address.clone();
        Ok(self.report(&input, resolved).await)
    }

    async fn report(&self, input: &str, address: ResolvedAddress) -> AnalysisReport {
        let request = FetchRequest::new(address.point()).with_municipality(address.municipality.clone());
        let domains = self.collect(&request).await;
        let risk_assessment = risk::score(&domains);
        tracing::info!(
            address = %address.formatted_address,
            region = %address.region,
            score = risk_assessment.score,
            level = %risk_assessment.level,
            degraded = domains.qualities().iter().filter(|(_, q)| *q == DataQuality::Indisponible).count(),
            "analysis complete"
        );
        AnalysisReport {
            input: input.to_string(),
            address,
            domains,
            risk_assessment,
            generated_at: Utc::now(),
        }
    }

    /// Query all nine domains concurrently; always yields every result.
    pub async fn collect(&self, request: &FetchRequest) -> DomainResults {
        let deadline = Instant::now() + self.timeouts.request;
        let budget = self.timeouts.connector;
        let (
            flood,
            contamination,
            services,
            hydrants,
            seismic,
            air_quality,
            disaster_history,
            crime,
            property_assessment,
        ) = tokio::join!(
            run_blocking(&self.flood, request, budget, deadline),
            run_blocking(&self.contamination, request, budget, deadline),
            run_blocking(&self.services, request, budget, deadline),
            run_blocking(&self.hydrants, request, budget, deadline),
            run_blocking(&self.seismic, request, budget, deadline),
            run_blocking(&self.air_quality, request, budget, deadline),
            run_blocking(&self.disaster, request, budget, deadline),
            run_blocking(&self.crime, request, budget, deadline),
            self.fetch_property(request, budget, deadline),
        );
        DomainResults {
            flood,
            contamination,
            services,
            hydrants,
            seismic,
            air_quality,
            disaster_history,
            property_assessment,
            crime,
        }
    }

    async fn fetch_property(&self, request: &FetchRequest, budget: Duration, deadline: Instant) -> PropertyAssessment {
        let limit = time_left(budget, deadline);
        match tokio::time::timeout(limit, self.property.fetch(request)).await {
            Ok(assessment) => assessment,
            Err(_) => {
                tracing::warn!(domain = PropertyAssessment::DOMAIN, ?limit, "connector timed out");
                PropertyAssessment::unavailable(request.region())
            }
        }
    }
}

fn time_left(budget: Duration, deadline: Instant) -> Duration {
    budget.min(deadline.saturating_duration_since(Instant::now()))
}

/// Run a blocking connector on the blocking pool under a timeout.
async fn run_blocking<C: SourceConnector>(
    connector: &Arc<C>,
    request: &FetchRequest,
    budget: Duration,
    deadline: Instant,
) -> C::Output {
    let limit = time_left(budget, deadline);
    let task = {
        let connector = Arc::clone(connector);
        let request = request.clone();
        tokio::task::spawn_blocking(move || connector.fetch(&request))
    };
    let domain = <C::Output as DomainRecord>::DOMAIN;
    match tokio::time::timeout(limit, task).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => {
            tracing::error!(domain, error = %err, "connector task failed");
            C::Output::unavailable(request.region())
        }
        Err(_) => {
            // The blocking call is left to finish; its result is discarded.
            tracing::warn!(domain, ?limit, "connector timed out");
            C::Output::unavailable(request.region())
        }
    }
}
