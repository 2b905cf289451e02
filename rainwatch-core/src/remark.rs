//! Optional rewrite of the fun fact by a text-generation service.
//!
//! The remark never influences routing or the rain classification; when the
//! service fails the merger's own remark is kept.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::{Prediction, error::truncate_body};

#[async_trait]
pub trait RemarkWriter: Send + Sync + Debug {
    async fn write(&self, city: &str, prediction: &Prediction) -> Result<String>;
}

#[derive(Clone)]
pub struct GeminiRemarkWriter {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl Debug for GeminiRemarkWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiRemarkWriter")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GeminiRemarkWriter {
    pub fn new(http: Client, base_url: String, model: String, api_key: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
        }
    }

    fn prompt(city: &str, prediction: &Prediction) -> String {
        format!(
            "You write one short, friendly, weather-related tip for a traveller.\n\
             City: {city}\n\
             Forecast: {}\n\
             Reply with the tip only, at most 20 words. Examples: \"Don't forget your umbrella!\", \
             \"Wear something heavy.\", \"Wear a good sun block with SPF 30.\"",
            prediction.prediction
        )
    }
}

#[async_trait]
impl RemarkWriter for GeminiRemarkWriter {
    async fn write(&self, city: &str, prediction: &Prediction) -> Result<String> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let prompt = Self::prompt(city, prediction);
        let request = GenerateRequest {
            contents: [Content {
                parts: [Part { text: &prompt }],
            }],
        };

        let res = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Gemini")?;

        let status = res.status();
        let body = res.text().await.context("Failed to read Gemini response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "Gemini request failed with status {}: {}",
                status,
                truncate_body(&body)
            ));
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).context("Failed to parse Gemini JSON")?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("Gemini response contained no text"))?;

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RainOutlook;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn prediction() -> Prediction {
        Prediction {
            prediction: "Yes, rain is expected in Paris over the next three days.".into(),
            outlook: RainOutlook::Rain,
            explanation: "Don't forget your umbrella!".into(),
            raw_data: None,
            chart: None,
            source: None,
            attempted: vec![],
            notice: None,
        }
    }

    fn writer(base: String) -> GeminiRemarkWriter {
        GeminiRemarkWriter::new(Client::new(), base, "gemini-test".into(), "g-key".into())
    }

    #[tokio::test]
    async fn test_write_returns_first_candidate_text() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-test:generateContent"))
            .and(query_param("key", "g-key"))
            .and(body_string_contains("City: Paris"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [
                    { "content": { "parts": [{ "text": "  Pack a raincoat, Paris is getting wet!\n" }] } }
                ]
            })))
            .mount(&mock_server)
            .await;

        let text = writer(mock_server.uri()).write("Paris", &prediction()).await.unwrap();
        assert_eq!(text, "Pack a raincoat, Paris is getting wet!");
    }

    #[tokio::test]
    async fn test_write_fails_without_candidates() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": []
            })))
            .mount(&mock_server)
            .await;

        let err = writer(mock_server.uri()).write("Paris", &prediction()).await.unwrap_err();
        assert!(err.to_string().contains("no text"));
    }

    #[tokio::test]
    async fn test_write_fails_on_error_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
            .mount(&mock_server)
            .await;

        let err = writer(mock_server.uri()).write("Paris", &prediction()).await.unwrap_err();
        assert!(err.to_string().contains("429"));
    }
}
