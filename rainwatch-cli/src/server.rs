//! HTTP surface: `GET /predict?city=<name>[&detailed=true]`.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use rainwatch_core::{CityQuery, Orchestrator};
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

pub const MISSING_CITY: &str = "City parameter is required";
const INVALID_DETAILED: &str = "detailed must be one of true, false, 1, 0, yes, no";

#[derive(Debug, Deserialize)]
pub struct PredictParams {
    city: Option<String>,
    detailed: Option<String>,
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": message }))).into_response()
}

/// Absent or blank means `false`.
fn parse_flag(raw: Option<&str>) -> Option<bool> {
    match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("" | "false" | "0" | "no") => Some(false),
        Some("true" | "1" | "yes") => Some(true),
        Some(_) => None,
    }
}

pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/predict", get(predict))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(orchestrator)
}

async fn predict(
    State(orchestrator): State<Arc<Orchestrator>>,
    params: Result<Query<PredictParams>, QueryRejection>,
) -> Response {
    let params = match params {
        Ok(Query(params)) => params,
        Err(rejection) => {
            warn!("Rejected malformed /predict query: {}", rejection.body_text());
            return bad_request(&rejection.body_text());
        }
    };

    let Some(query) = params.city.as_deref().and_then(CityQuery::new) else {
        warn!("Rejected /predict request without a city");
        return bad_request(MISSING_CITY);
    };
    let Some(detailed) = parse_flag(params.detailed.as_deref()) else {
        warn!(city = query.name(), "Rejected /predict request with invalid detailed flag");
        return bad_request(INVALID_DETAILED);
    };

    let prediction = orchestrator.run(&query.detailed(detailed)).await;
    Json(prediction).into_response()
}

/// Bind and serve until Ctrl+C.
pub async fn serve(addr: SocketAddr, orchestrator: Arc<Orchestrator>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("rainwatch listening on {}", addr);

    axum::serve(listener, router(orchestrator))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use rainwatch_core::{
        DailySeries, ProviderError, ProviderId, ProviderResult, WeatherPayload, WeatherProvider,
    };
    use std::collections::BTreeMap;
    use tower::ServiceExt;

    #[derive(Debug)]
    struct Canned(ProviderId, ProviderResult);

    #[async_trait]
    impl WeatherProvider for Canned {
        fn id(&self) -> ProviderId {
            self.0
        }

        async fn fetch(&self, _query: &CityQuery) -> ProviderResult {
            self.1.clone()
        }
    }

    fn app() -> Router {
        let providers: Vec<Arc<dyn WeatherProvider>> = vec![
            Arc::new(Canned(
                ProviderId::RegionalDb,
                ProviderResult::Success(WeatherPayload::Regional(
                    serde_json::json!({ "giza": { "precipitation": 1.5 } }),
                )),
            )),
            Arc::new(Canned(
                ProviderId::PrimaryForecast,
                ProviderResult::Error(ProviderError::GeocodeFailed("Paris".into())),
            )),
            Arc::new(Canned(
                ProviderId::FallbackForecast,
                ProviderResult::Success(WeatherPayload::Daily(DailySeries {
                    precipitation: Some(BTreeMap::from([("20230101".to_string(), 0.0)])),
                    ..DailySeries::default()
                })),
            )),
        ];
        router(Arc::new(Orchestrator::new(providers, 5)))
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn missing_city_is_bad_request() {
        for uri in ["/predict", "/predict?city=", "/predict?city=%20%20"] {
            let (status, body) = get_json(uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body, serde_json::json!({ "error": "City parameter is required" }));
        }
    }

    #[tokio::test]
    async fn regional_city_returns_raw_data() {
        let (status, body) = get_json("/predict?city=Giza").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "firebase");
        assert_eq!(body["outlook"], "rain");
        assert_eq!(body["raw_data"]["giza"]["precipitation"], 1.5);
        assert!(body["fun_fact"].as_str().is_some());
    }

    #[tokio::test]
    async fn fallback_answer_carries_notice() {
        let (status, body) = get_json("/predict?city=Paris").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "nasa_power");
        assert_eq!(body["outlook"], "no_rain");
        assert_eq!(body["attempted"], serde_json::json!(["meteomatics", "nasa_power"]));
        assert!(body["notice"].as_str().unwrap().contains("unsuccessful"));
    }

    #[tokio::test]
    async fn detailed_flag_bypasses_regional_data() {
        for uri in ["/predict?city=Giza&detailed=true", "/predict?city=Giza&detailed=YES"] {
            let (_, body) = get_json(uri).await;
            assert_eq!(body["source"], "nasa_power", "{uri}");
        }

        let (_, body) = get_json("/predict?city=Giza&detailed=").await;
        assert_eq!(body["source"], "firebase");
    }

    #[tokio::test]
    async fn invalid_detailed_flag_is_json_bad_request() {
        let (status, body) = get_json("/predict?city=Giza&detailed=maybe").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], INVALID_DETAILED);
    }

    #[tokio::test]
    async fn malformed_query_string_is_json_bad_request() {
        let (status, body) = get_json("/predict?city=Giza&city=Cairo").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
    }

    #[test]
    fn flag_parsing() {
        assert_eq!(parse_flag(None), Some(false));
        assert_eq!(parse_flag(Some(" 1 ")), Some(true));
        assert_eq!(parse_flag(Some("No")), Some(false));
        assert_eq!(parse_flag(Some("sometimes")), None);
    }
}
