//! Error types shared by the geocoder, the provider adapters and configuration.

use thiserror::Error;

/// Failure of a single provider adapter call.
///
/// These never escape the orchestrator: the routing policy treats them as a
/// signal to try the next provider and the merger reports them in the notice.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("geocoding failed: {0}")]
    GeocodeFailed(String),

    #[error("{}", fetch_failed_message(.status, .detail))]
    FetchFailed { status: Option<u16>, detail: String },

    #[error("malformed provider payload: {0}")]
    ParseFailed(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

fn fetch_failed_message(status: &Option<u16>, detail: &str) -> String {
    match status {
        Some(code) => format!("request failed with status {code}: {detail}"),
        None => format!("request failed: {detail}"),
    }
}

impl ProviderError {
    pub fn fetch_status(status: reqwest::StatusCode, body: &str) -> Self {
        Self::FetchFailed {
            status: Some(status.as_u16()),
            detail: truncate_body(body),
        }
    }

    pub fn transport(err: &reqwest::Error) -> Self {
        Self::FetchFailed {
            status: err.status().map(|s| s.as_u16()),
            detail: err.to_string(),
        }
    }

    /// Short machine-readable code, used in notices and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::GeocodeFailed(_) => "geocode_failed",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::ParseFailed(_) => "parse_failed",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("no coordinates found for '{0}'")]
    NotFound(String),

    #[error("geocoding request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl From<GeocodeError> for ProviderError {
    fn from(err: GeocodeError) -> Self {
        ProviderError::GeocodeFailed(err.to_string())
    }
}

/// Why a query ended without usable weather data.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unresolved {
    #[error("no data available from any provider")]
    NoDataAvailable,

    #[error("step budget of {0} exhausted before a provider answered")]
    StepBudgetExceeded(usize),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "missing required configuration: {}.\n\
         Hint: export the variables or run `rainwatch configure`.",
        .0.join(", ")
    )]
    Missing(Vec<&'static str>),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
