//! Seismic hazard (peak ground acceleration, 2% in 50 years).

use super::arcgis::number_of;
use super::http::HttpClient;
use super::{unavailable_source, DataQuality, DomainRecord, FallbackChain, FetchRequest, RiskLevel, SourceConnector};
use crate::error::SourceUnavailable;
use crate::geo::Region;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeismicHazard {
    pub seismic_zone: String,
    pub pga_2percent_50yr: Option<f64>,
    pub risk_level: RiskLevel,
    pub source: String,
    pub data_quality: DataQuality,
    pub region: String,
}

impl DomainRecord for SeismicHazard {
    const DOMAIN: &'static str = "seismic";

    fn unavailable(region: &str) -> Self {
        Self {
            seismic_zone: region.to_string(),
            pga_2percent_50yr: None,
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

/// PGA ≥ 0.40 g → high, ≥ 0.15 g → medium, else low.
pub fn risk_from_pga(pga: f64) -> RiskLevel {
    if pga >= 0.40 {
        RiskLevel::High
    } else if pga >= 0.15 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Regional zone name, reference PGA and risk.
///
/// The risk column is curated and does not always follow [`risk_from_pga`].
pub fn regional_zone(region: Region) -> (&'static str, f64, RiskLevel) {
    use RiskLevel::{Low, Medium};
    match region {
        Region::CapitaleNationale => ("Québec-Charlevoix", 0.35, Medium),
        Region::BasSaintLaurent => ("Bas-Saint-Laurent", 0.20, Medium),
        Region::SaguenayLacSaintJean => ("Saguenay", 0.18, Medium),
        Region::Montreal => ("Ouest du Québec", 0.17, Medium),
        Region::Laval => ("Ouest du Québec", 0.17, Medium),
        Region::Monteregie => ("Ouest du Québec", 0.15, Low),
        Region::Outaouais => ("Ouest du Québec", 0.24, Medium),
        Region::Estrie => ("Estrie", 0.12, Low),
        Region::Mauricie => ("Mauricie", 0.14, Low),
        Region::Laurentides => ("Laurentides", 0.16, Low),
        Region::Lanaudiere => ("Lanaudière", 0.15, Low),
        Region::CentreDuQuebec => ("Centre-du-Québec", 0.12, Low),
        Region::ChaudiereAppalaches => ("Chaudière-Appalaches", 0.20, Medium),
        Region::CoteNord => ("Côte-Nord", 0.15, Low),
        Region::AbitibiTemiscamingue => ("Abitibi", 0.08, Low),
        Region::NordDuQuebec => ("Nord-du-Québec", 0.06, Low),
        Region::GaspesieIlesDeLaMadeleine => ("Gaspésie", 0.12, Low),
    }
}

#[derive(Deserialize, Debug, Default)]
struct InterpolationResponse {
    #[serde(default)]
    sa: HashMap<String, HashMap<String, Value>>,
}

impl InterpolationResponse {
    fn pga(&self) -> Option<f64> {
        number_of(self.sa.get("0.0")?.get("2%/50yrs")?)
    }
}

pub struct SeismicConnector {
    client: HttpClient,
    url: String,
}

impl SeismicConnector {
    pub fn new(client: HttpClient, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }

    fn query_nbc(&self, request: &FetchRequest) -> Result<Option<SeismicHazard>, SourceUnavailable> {
        let lat = request.point.latitude.to_string();
        let lon = request.point.longitude.to_string();
        let response: InterpolationResponse = self.client.get_json(
            &self.url,
            &[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("code", "nbc2020"),
                ("siteDesignation", "XS"),
                ("siteDesignationXS", "C"),
            ],
        )?;
        let Some(pga) = response.pga() else {
            return Ok(None);
        };

        let region = request.region();
        let zone = request
            .region_kind()
            .map_or(region, |r| regional_zone(r).0);
        Ok(Some(SeismicHazard {
            seismic_zone: zone.to_string(),
            pga_2percent_50yr: Some((pga * 10_000.0).round() / 10_000.0),
            risk_level: risk_from_pga(pga),
            source: "Geological Survey of Canada (NBC 2020)".into(),
            data_quality: DataQuality::Haute,
            region: region.to_string(),
        }))
    }
}

fn regional_estimate(request: &FetchRequest) -> Option<SeismicHazard> {
    let region = request.region_kind()?;
    let (zone, pga, risk_level) = regional_zone(region);
    Some(SeismicHazard {
        seismic_zone: zone.to_string(),
        pga_2percent_50yr: Some(pga),
        risk_level,
        source: format!("regional estimate - {region}"),
        data_quality: DataQuality::Moyenne,
        region: region.name().to_string(),
    })
}

impl SourceConnector for SeismicConnector {
    type Output = SeismicHazard;

    fn fetch(&self, request: &FetchRequest) -> SeismicHazard {
        FallbackChain::new()
            .tier("NBC 2020 interpolation", || self.query_nbc(request))
            .tier("regional seismic table", || Ok(regional_estimate(request)))
            .run(request.region())
    }
}
