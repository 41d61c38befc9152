//! Composite risk score.
//!
//! A pure function of the nine domain results: start at 50, add one delta
//! per triggered condition, clamp to `0..=100`, then band into a level.
//!
//! | Condition | Delta |
//! |---|---|
//! | in flood zone (high / medium / low) | +30 / +20 / +10 |
//! | site listed contaminated | +25 |
//! | contaminated sites nearby | +min(5 × count, 20) |
//! | no hydrant within 500 m | +15 |
//! | nearest hydrant in (200, 500] m | +5 |
//! | high seismic zone | +10 |
//! | air quality medium / high | +5 / +10 |
//! | disaster events nearby (> 5 / 1 to 5) | +10 / +5 |
//! | crime medium / high | +5 / +10 |

use crate::sources::{DataQuality, DomainResults, RiskLevel};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const BASE_SCORE: i32 = 50;
const NO_FACTOR: &str = "no major risk factor identified";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: u8,
    pub level: RiskLevel,
    pub recommendation: String,
    pub factors: Vec<String>,
}

impl RiskAssessment {
    /// Returned when the inputs cannot be scored.
    pub fn unavailable() -> Self {
        Self {
            score: 50,
            level: RiskLevel::Unknown,
            recommendation: "assessment unavailable".into(),
            factors: vec!["insufficient data".into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    #[error("{field} is not a finite number ({value})")]
    NonFinite { field: &'static str, value: f64 },
}

pub fn level_for(score: u8) -> RiskLevel {
    if score >= 70 {
        RiskLevel::High
    } else if score >= 40 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

pub fn recommendation_for(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::High => "High risk: an in-depth professional assessment is recommended.",
        RiskLevel::Medium => "Moderate risk: stay vigilant.",
        RiskLevel::Low => "Low risk: normal situation.",
        RiskLevel::Unknown => "assessment unavailable",
    }
}

/// Score the domain results. Never fails; unscorable input yields
/// [`RiskAssessment::unavailable`].
pub fn score(results: &DomainResults) -> RiskAssessment {
    try_score(results).unwrap_or_else(|err| {
        tracing::error!(error = %err, "risk scoring failed, returning neutral assessment");
        RiskAssessment::unavailable()
    })
}

pub fn try_score(results: &DomainResults) -> Result<RiskAssessment, ScoreError> {
    let mut total = BASE_SCORE;
    let mut factors = Vec::new();
    let mut add = |delta: i32, factor: String| {
        total += delta;
        factors.push(factor);
    };

    let flood = &results.flood;
    if flood.in_zone {
        let delta = match flood.risk_level {
            RiskLevel::High => 30,
            RiskLevel::Medium => 20,
            RiskLevel::Low => 10,
            RiskLevel::Unknown => 0,
        };
        add(delta, "in flood zone".into());
    }

    let contamination = &results.contamination;
    if contamination.is_contaminated {
        add(25, "site listed contaminated".into());
    }
    if contamination.nearby_count > 0 {
        let count = contamination.nearby_count;
        let delta = count.saturating_mul(5).min(20) as i32;
        add(delta, format!("{count} contaminated site(s) nearby"));
    }

    let hydrants = &results.hydrants;
    if hydrants.data_quality != DataQuality::Indisponible {
        match hydrants.nearest_distance() {
            Some(d) if !d.is_finite() => {
                return Err(ScoreError::NonFinite { field: "nearest hydrant distance", value: d });
            }
            Some(d) if d <= 200.0 => {}
            Some(d) if d <= 500.0 => add(5, "hydrant between 200–500m".into()),
            _ => add(15, "no hydrant within 500m".into()),
        }
    }

    if results.seismic.risk_level == RiskLevel::High {
        add(10, "high seismic zone".into());
    }

    let air = &results.air_quality;
    match air.risk_level {
        RiskLevel::Medium => add(5, format!("air quality: {}", air.aqi_category)),
        RiskLevel::High => add(10, format!("air quality: {}", air.aqi_category)),
        _ => {}
    }

    let events = results.disaster_history.nearby_events_count;
    if events > 0 {
        let delta = if events > 5 { 10 } else { 5 };
        add(delta, format!("{events} disaster event(s) nearby"));
    }

    let crime = &results.crime;
    let density = crime
        .crime_density
        .map_or_else(|| crime.risk_level.to_string(), |d| d.to_string());
    match crime.risk_level {
        RiskLevel::Medium => add(5, format!("crime: {density}")),
        RiskLevel::High => add(10, format!("crime: {density}")),
        _ => {}
    }

    if factors.is_empty() {
        factors.push(NO_FACTOR.to_string());
    }
    let score = total.clamp(0, 100) as u8;
    let level = level_for(score);
    Ok(RiskAssessment {
        score,
        level,
        recommendation: recommendation_for(level).to_string(),
        factors,
    })
}
