//! Failure taxonomy of the analysis pipeline.
//!
//! [`ResolutionFailure`] is the only error a caller ever sees. Every
//! [`SourceUnavailable`] is absorbed by the connector that raised it and
//! surfaces solely as a lower `data_quality` on that domain's result.

use thiserror::Error;

/// The address could not be turned into a coordinate inside the province.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionFailure {
    #[error("address not found: '{query}'")]
    NotFound { query: String },

    #[error("address outside Québec (geocoder placed it in '{region}')")]
    OutsideProvince { region: String },

    #[error("geocoding error: {0}")]
    Geocoder(String),

    #[error("invalid coordinates: latitude must be in -90..90 and longitude in -180..180")]
    InvalidCoordinates,

    #[error("no address specified")]
    NoInput,
}

/// One tier of a source connector produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceUnavailable {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("service reported an error: {0}")]
    Service(String),

    #[error("property store error: {0}")]
    Store(String),

    #[error("timed out")]
    Timeout,
}

impl From<ureq::Error> for SourceUnavailable {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, _) => Self::Status(code),
            ureq::Error::Transport(t) => Self::Transport(t.to_string()),
        }
    }
}

impl From<std::io::Error> for SourceUnavailable {
    fn from(err: std::io::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<serde_json::Error> for SourceUnavailable {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<csv::Error> for SourceUnavailable {
    fn from(err: csv::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<sqlx::Error> for SourceUnavailable {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_messages() {
        let err = ResolutionFailure::NotFound { query: "1 rue X".into() };
        assert_eq!(err.to_string(), "address not found: '1 rue X'");
        let err = ResolutionFailure::OutsideProvince { region: "Ontario".into() };
        assert!(err.to_string().contains("Ontario"));
    }

    #[test]
    fn test_source_messages() {
        assert_eq!(SourceUnavailable::Status(503).to_string(), "unexpected HTTP status 503");
        assert_eq!(SourceUnavailable::Timeout.to_string(), "timed out");
    }
}
