use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::{
    CityQuery, GeoCoordinate, HourlySeries, ProviderResult, Sample, WeatherPayload,
    error::ProviderError, geocode::Geocoder,
};

use super::{ProviderId, WeatherProvider};

const PARAM_TEMPERATURE: &str = "t_2m:C";
const PARAM_HUMIDITY: &str = "relative_humidity_2m:p";
const PARAM_PRESSURE: &str = "msl_pressure:hPa";
const PARAM_PRECIP_PROBABILITY: &str = "prob_precip_1h:p";

const FORECAST_DAYS: i64 = 3;
const INTERVAL: &str = "PT1H";

/// Hourly multi-day forecast from the Meteomatics API, authenticated with basic auth.
#[derive(Clone)]
pub struct MeteomaticsProvider {
    http: Client,
    base_url: String,
    username: String,
    password: String,
    geocoder: Arc<dyn Geocoder>,
}

impl std::fmt::Debug for MeteomaticsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeteomaticsProvider")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl MeteomaticsProvider {
    pub fn new(
        http: Client,
        base_url: String,
        username: String,
        password: String,
        geocoder: Arc<dyn Geocoder>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            password,
            geocoder,
        }
    }

    fn forecast_url(&self, coord: GeoCoordinate, start: DateTime<Utc>) -> String {
        let end = start + Duration::days(FORECAST_DAYS);
        let parameters = [
            PARAM_TEMPERATURE,
            PARAM_HUMIDITY,
            PARAM_PRESSURE,
            PARAM_PRECIP_PROBABILITY,
        ]
        .join(",");

        format!(
            "{}/{}--{}:{}/{}/{},{}/json",
            self.base_url,
            start.format("%Y-%m-%dT%H:%M:%SZ"),
            end.format("%Y-%m-%dT%H:%M:%SZ"),
            INTERVAL,
            parameters,
            coord.latitude,
            coord.longitude,
        )
    }

    async fn fetch_series(&self, coord: GeoCoordinate) -> Result<HourlySeries, ProviderError> {
        let url = self.forecast_url(coord, Utc::now());
        tracing::debug!("Meteomatics request: {}", url);

        let res = self
            .http
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| ProviderError::transport(&e))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| ProviderError::transport(&e))?;

        if !status.is_success() {
            return Err(ProviderError::fetch_status(status, &body));
        }

        let parsed: MmResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::ParseFailed(format!("meteomatics JSON: {e}")))?;

        let series = normalize(parsed, coord);
        if series.is_empty() {
            return Err(ProviderError::ParseFailed(
                "meteomatics response contained no hourly samples".to_string(),
            ));
        }
        Ok(series)
    }
}

#[derive(Debug, Deserialize)]
struct MmResponse {
    data: Vec<MmParameter>,
}

#[derive(Debug, Deserialize)]
struct MmParameter {
    parameter: String,
    coordinates: Vec<MmCoordinate>,
}

#[derive(Debug, Deserialize)]
struct MmCoordinate {
    dates: Vec<MmDate>,
}

#[derive(Debug, Deserialize)]
struct MmDate {
    date: DateTime<Utc>,
    value: Option<f64>,
}

/// Flatten `data[].coordinates[].dates[]` into one named series per parameter.
fn normalize(response: MmResponse, coord: GeoCoordinate) -> HourlySeries {
    let mut series = HourlySeries {
        coordinate: Some(coord),
        ..HourlySeries::default()
    };

    for param in response.data {
        let slot = match param.parameter.as_str() {
            PARAM_TEMPERATURE => &mut series.temperature_c,
            PARAM_HUMIDITY => &mut series.humidity_pct,
            PARAM_PRESSURE => &mut series.pressure_hpa,
            PARAM_PRECIP_PROBABILITY => &mut series.precipitation_probability_pct,
            other => {
                tracing::debug!("Ignoring unexpected Meteomatics parameter '{}'", other);
                continue;
            }
        };

        let Some(first) = param.coordinates.into_iter().next() else {
            continue;
        };
        slot.extend(
            first
                .dates
                .into_iter()
                .filter_map(|d| d.value.map(|value| Sample { at: d.date, value })),
        );
    }

    series
}

#[async_trait]
impl WeatherProvider for MeteomaticsProvider {
    fn id(&self) -> ProviderId {
        ProviderId::PrimaryForecast
    }

    async fn fetch(&self, query: &CityQuery) -> ProviderResult {
        let coord = match self.geocoder.resolve(query.name()).await {
            Ok(coord) => coord,
            Err(err) => return ProviderResult::Error(err.into()),
        };

        match self.fetch_series(coord).await {
            Ok(series) => ProviderResult::Success(WeatherPayload::Hourly(series)),
            Err(err) => ProviderResult::Error(err),
        }
    }
}
