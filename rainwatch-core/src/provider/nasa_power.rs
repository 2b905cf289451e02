use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    CityQuery, DailySeries, GeoCoordinate, ProviderResult, WeatherPayload, config::DateWindow,
    error::ProviderError, geocode::Geocoder,
};

use super::{ProviderId, WeatherProvider};

const PARAM_TEMPERATURE: &str = "T2M";
const PARAM_HUMIDITY: &str = "RH2M";
const PARAM_PRECIPITATION: &str = "PRECTOTCORR";

/// Daily satellite-derived aggregates from NASA's POWER API.
#[derive(Clone)]
pub struct NasaPowerProvider {
    http: Client,
    base_url: String,
    api_key: String,
    window: DateWindow,
    geocoder: Arc<dyn Geocoder>,
}

impl std::fmt::Debug for NasaPowerProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NasaPowerProvider")
            .field("base_url", &self.base_url)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl NasaPowerProvider {
    pub fn new(
        http: Client,
        base_url: String,
        api_key: String,
        window: DateWindow,
        geocoder: Arc<dyn Geocoder>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            window,
            geocoder,
        }
    }

    async fn fetch_daily(&self, coord: GeoCoordinate) -> Result<DailySeries, ProviderError> {
        let url = format!("{}/api/temporal/daily/point", self.base_url);
        let parameters = [PARAM_TEMPERATURE, PARAM_HUMIDITY, PARAM_PRECIPITATION].join(",");
        let start = self.window.start.format("%Y%m%d").to_string();
        let end = self.window.end.format("%Y%m%d").to_string();
        let longitude = coord.longitude.to_string();
        let latitude = coord.latitude.to_string();

        let res = self
            .http
            .get(&url)
            .query(&[
                ("parameters", parameters.as_str()),
                ("community", "RE"),
                ("longitude", longitude.as_str()),
                ("latitude", latitude.as_str()),
                ("start", start.as_str()),
                ("end", end.as_str()),
                ("format", "JSON"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::transport(&e))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| ProviderError::transport(&e))?;

        if !status.is_success() {
            return Err(ProviderError::fetch_status(status, &body));
        }

        let parsed: PowerResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::ParseFailed(format!("POWER JSON: {e}")))?;

        let series = flatten(parsed);
        if series.temperature.is_none()
            && series.humidity.is_none()
            && series.precipitation.is_none()
        {
            return Err(ProviderError::ParseFailed(
                "POWER response carried none of T2M, RH2M, PRECTOTCORR".to_string(),
            ));
        }
        Ok(series)
    }
}

#[derive(Debug, Default, Deserialize)]
struct PowerResponse {
    #[serde(default)]
    properties: PowerProperties,
}

#[derive(Debug, Default, Deserialize)]
struct PowerProperties {
    #[serde(default)]
    parameter: BTreeMap<String, BTreeMap<String, f64>>,
}

/// Lift the nested `properties.parameter` maps into flat named series.
fn flatten(response: PowerResponse) -> DailySeries {
    let mut params = response.properties.parameter;
    DailySeries {
        temperature: params.remove(PARAM_TEMPERATURE),
        humidity: params.remove(PARAM_HUMIDITY),
        precipitation: params.remove(PARAM_PRECIPITATION),
    }
}

#[async_trait]
impl WeatherProvider for NasaPowerProvider {
    fn id(&self) -> ProviderId {
        ProviderId::FallbackForecast
    }

    async fn fetch(&self, query: &CityQuery) -> ProviderResult {
        let coord = match self.geocoder.resolve(query.name()).await {
            Ok(coord) => coord,
            Err(err) => return ProviderResult::Error(err.into()),
        };

        match self.fetch_daily(coord).await {
            Ok(series) => ProviderResult::Success(WeatherPayload::Daily(series)),
            Err(err) => ProviderResult::Error(err),
        }
    }
}
