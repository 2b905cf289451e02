use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ProviderError;
use crate::provider::ProviderId;

/// A single "will it rain in ..." request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityQuery {
    name: String,
    detailed: bool,
}

impl CityQuery {
    /// Returns `None` when the name is blank.
    pub fn new(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            detailed: false,
        })
    }

    /// Ask for an hourly forecast even when a regional dataset would apply.
    pub fn detailed(mut self, detailed: bool) -> Self {
        self.detailed = detailed;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_detailed(&self) -> bool {
        self.detailed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub at: DateTime<Utc>,
    pub value: f64,
}

/// Hourly forecast normalized into one series per parameter.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct HourlySeries {
    pub coordinate: Option<GeoCoordinate>,
    pub temperature_c: Vec<Sample>,
    pub humidity_pct: Vec<Sample>,
    pub pressure_hpa: Vec<Sample>,
    pub precipitation_probability_pct: Vec<Sample>,
}

impl HourlySeries {
    pub fn is_empty(&self) -> bool {
        self.temperature_c.is_empty()
            && self.humidity_pct.is_empty()
            && self.pressure_hpa.is_empty()
            && self.precipitation_probability_pct.is_empty()
    }
}

/// Daily aggregates keyed by `YYYYMMDD`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DailySeries {
    pub temperature: Option<BTreeMap<String, f64>>,
    pub humidity: Option<BTreeMap<String, f64>>,
    pub precipitation: Option<BTreeMap<String, f64>>,
}

/// Structured weather data carried by a successful provider call.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherPayload {
    Regional(serde_json::Value),
    Hourly(HourlySeries),
    Daily(DailySeries),
}

/// Outcome of exactly one adapter call.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResult {
    Success(WeatherPayload),
    Empty,
    Error(ProviderError),
}

impl ProviderResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Empty => "empty",
            Self::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RainOutlook {
    Rain,
    NoRain,
    Undetermined,
}

/// An encoded chart image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chart {
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl Chart {
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

fn chart_as_base64<S: Serializer>(chart: &Option<Chart>, s: S) -> Result<S::Ok, S::Error> {
    match chart {
        Some(chart) => s.serialize_str(&chart.to_base64()),
        None => s.serialize_none(),
    }
}

/// Final answer for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub prediction: String,
    pub outlook: RainOutlook,
    #[serde(rename = "fun_fact")]
    pub explanation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<serde_json::Value>,
    #[serde(
        rename = "plot",
        skip_serializing_if = "Option::is_none",
        serialize_with = "chart_as_base64"
    )]
    pub chart: Option<Chart>,
    pub source: Option<ProviderId>,
    pub attempted: Vec<ProviderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}
