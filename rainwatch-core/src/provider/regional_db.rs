use async_trait::async_trait;
use reqwest::Client;

use crate::{CityQuery, ProviderResult, WeatherPayload, error::ProviderError};

use super::{ProviderId, WeatherProvider};

/// City and country names covered by the regional dataset.
const SUPPORTED_NAMES: &[&str] = &["cairo", "alexandria", "giza", "luxor", "aswan", "egypt"];

/// Whether the regional dataset covers this city (case-insensitive exact match).
pub fn is_supported_city(name: &str) -> bool {
    let name = name.trim().to_lowercase();
    SUPPORTED_NAMES.contains(&name.as_str())
}

/// Egyptian weather data kept as a single document in a Firebase Realtime Database.
#[derive(Debug, Clone)]
pub struct RegionalDbProvider {
    http: Client,
    database_url: String,
}

impl RegionalDbProvider {
    pub fn new(http: Client, database_url: String) -> Self {
        Self { http, database_url }
    }

    fn document_url(&self) -> String {
        // The data sits at the root of the database.
        format!("{}/.json", self.database_url.trim_end_matches('/'))
    }

    async fn fetch_document(&self) -> Result<Option<serde_json::Value>, ProviderError> {
        let res = self
            .http
            .get(self.document_url())
            .send()
            .await
            .map_err(|e| ProviderError::transport(&e))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| ProviderError::transport(&e))?;

        if !status.is_success() {
            return Err(ProviderError::fetch_status(status, &body));
        }

        let document: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| ProviderError::ParseFailed(format!("regional document: {e}")))?;

        Ok((!document.is_null()).then_some(document))
    }
}

#[async_trait]
impl WeatherProvider for RegionalDbProvider {
    fn id(&self) -> ProviderId {
        ProviderId::RegionalDb
    }

    async fn fetch(&self, query: &CityQuery) -> ProviderResult {
        if !is_supported_city(query.name()) {
            tracing::debug!("'{}' is outside the regional dataset", query.name());
            return ProviderResult::Empty;
        }

        match self.fetch_document().await {
            Ok(Some(document)) => ProviderResult::Success(WeatherPayload::Regional(document)),
            Ok(None) => ProviderResult::Empty,
            Err(err) => ProviderResult::Error(err),
        }
    }
}
