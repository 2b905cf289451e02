//! Core library for the `rainwatch` service.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Adapters over the regional dataset and the two forecast services
//! - The routing policy and the orchestrator that drives it per query
//! - Merging of provider evidence into a single rain prediction
//!
//! It is used by `rainwatch-cli` for both the HTTP endpoint and the
//! command-line `predict` command.

pub mod chart;
pub mod config;
pub mod error;
pub mod geocode;
pub mod merge;
pub mod model;
pub mod orchestrator;
pub mod provider;
pub mod remark;
pub mod routing;

pub use config::{Config, Credentials};
pub use error::{ConfigError, GeocodeError, ProviderError, Unresolved};
pub use model::{
    Chart, CityQuery, DailySeries, GeoCoordinate, HourlySeries, Prediction, ProviderResult,
    RainOutlook, Sample, WeatherPayload,
};
pub use orchestrator::Orchestrator;
pub use provider::{ProviderId, WeatherProvider};
pub use routing::{EvidenceState, PriorityPolicy, RoutingDecision, RoutingPolicy};
