//! Forward geocoding: city name to coordinates.
//! Uses the Open-Meteo geocoding API - free, no API key required.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::fmt::Debug;

use crate::error::GeocodeError;
use crate::model::GeoCoordinate;

#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    /// Resolve a city name to the first matching coordinate.
    async fn resolve(&self, city: &str) -> Result<GeoCoordinate, GeocodeError>;
}

#[derive(Debug, Clone)]
pub struct OpenMeteoGeocoder {
    http: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Option<Vec<SearchResult>>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

impl OpenMeteoGeocoder {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Geocoder for OpenMeteoGeocoder {
    async fn resolve(&self, city: &str) -> Result<GeoCoordinate, GeocodeError> {
        let url = format!("{}/v1/search", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[("name", city), ("count", "1"), ("language", "en"), ("format", "json")])
            .send()
            .await?;

        if !res.status().is_success() {
            tracing::debug!("Geocoding '{}' returned status {}", city, res.status());
            return Err(GeocodeError::NotFound(city.to_string()));
        }

        let body: SearchResponse = res.json().await?;
        let first = body
            .results
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| GeocodeError::NotFound(city.to_string()))?;

        tracing::debug!(
            "Geocoded '{}' to {}, {} ({:.4}, {:.4})",
            city,
            first.name.as_deref().unwrap_or("?"),
            first.country.as_deref().unwrap_or("?"),
            first.latitude,
            first.longitude
        );

        Ok(GeoCoordinate {
            latitude: first.latitude,
            longitude: first.longitude,
        })
    }
}
