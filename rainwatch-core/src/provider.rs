use crate::{
    CityQuery, Config, ProviderResult,
    config::Credentials,
    geocode::{Geocoder, OpenMeteoGeocoder},
    provider::{
        meteomatics::MeteomaticsProvider, nasa_power::NasaPowerProvider,
        regional_db::RegionalDbProvider,
    },
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::{fmt::Debug, sync::Arc};

pub mod meteomatics;
pub mod nasa_power;
pub mod regional_db;

/// Provider identities, declared in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ProviderId {
    #[serde(rename = "firebase")]
    RegionalDb,
    #[serde(rename = "meteomatics")]
    PrimaryForecast,
    #[serde(rename = "nasa_power")]
    FallbackForecast,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::RegionalDb => "firebase",
            ProviderId::PrimaryForecast => "meteomatics",
            ProviderId::FallbackForecast => "nasa_power",
        }
    }

    /// All providers, highest priority first.
    pub const fn all() -> &'static [ProviderId] {
        &[
            ProviderId::RegionalDb,
            ProviderId::PrimaryForecast,
            ProviderId::FallbackForecast,
        ]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform contract over one external weather source.
///
/// Implementations never fail: every outcome, including transport errors and
/// malformed payloads, is folded into the returned [`ProviderResult`].
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    async fn fetch(&self, query: &CityQuery) -> ProviderResult;
}

/// Build the shared HTTP client with the configured request timeout.
pub fn http_client(config: &Config) -> anyhow::Result<Client> {
    let client = Client::builder()
        .timeout(config.http_timeout())
        .user_agent(concat!("rainwatch/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Construct a provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
    credentials: &Credentials,
    http: &Client,
    geocoder: Arc<dyn Geocoder>,
) -> Arc<dyn WeatherProvider> {
    match id {
        ProviderId::RegionalDb => Arc::new(RegionalDbProvider::new(
            http.clone(),
            credentials.database_url.clone(),
        )),
        ProviderId::PrimaryForecast => Arc::new(MeteomaticsProvider::new(
            http.clone(),
            config.endpoints.meteomatics.clone(),
            credentials.meteomatics_username.clone(),
            credentials.meteomatics_password.clone(),
            geocoder,
        )),
        ProviderId::FallbackForecast => Arc::new(NasaPowerProvider::new(
            http.clone(),
            config.endpoints.nasa_power.clone(),
            credentials.nasa_api_key.clone(),
            config.daily_window,
            geocoder,
        )),
    }
}

/// Construct every provider, in priority order, sharing one geocoder.
pub fn providers_from_config(
    config: &Config,
    credentials: &Credentials,
    http: &Client,
) -> Vec<Arc<dyn WeatherProvider>> {
    let geocoder: Arc<dyn Geocoder> = Arc::new(OpenMeteoGeocoder::new(
        http.clone(),
        config.endpoints.geocoding.clone(),
    ));

    ProviderId::all()
        .iter()
        .map(|id| provider_from_config(*id, config, credentials, http, geocoder.clone()))
        .collect()
}
