use rainwatch_core::{
    CityQuery, Config, Orchestrator, ProviderId, RainOutlook,
    config::{
        ENV_DATABASE_URL, ENV_GOOGLE_API_KEY, ENV_METEOMATICS_PASSWORD, ENV_METEOMATICS_USERNAME,
        ENV_NASA_API_KEY,
    },
};
use serde_json::json;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

/// Every external service points at the same mock server.
fn config_for(server: &MockServer) -> Config {
    let mut cfg = Config {
        remarks: false,
        ..Config::default()
    };
    cfg.endpoints.geocoding = server.uri();
    cfg.endpoints.meteomatics = server.uri();
    cfg.endpoints.nasa_power = server.uri();
    cfg.endpoints.gemini = server.uri();

    for (name, value) in [
        (ENV_DATABASE_URL, format!("{}/db", server.uri())),
        (ENV_METEOMATICS_USERNAME, "mm-user".to_string()),
        (ENV_METEOMATICS_PASSWORD, "mm-pass".to_string()),
        (ENV_NASA_API_KEY, "nasa-key".to_string()),
        (ENV_GOOGLE_API_KEY, "g-key".to_string()),
    ] {
        cfg.set_secret(name, value).unwrap();
    }
    cfg
}

async fn mount_geocoder(server: &MockServer, city: &str, found: bool) {
    let body = if found {
        json!({ "results": [{ "name": city, "country": "France", "latitude": 48.85, "longitude": 2.35 }] })
    } else {
        json!({ "generationtime_ms": 0.2 })
    };
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("name", city))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn hourly_forecast() -> serde_json::Value {
    let dates = |a: f64, b: f64| {
        json!([
            { "date": "2025-06-01T00:00:00Z", "value": a },
            { "date": "2025-06-01T01:00:00Z", "value": b }
        ])
    };
    json!({
        "version": "3.0",
        "status": "OK",
        "data": [
            { "parameter": "t_2m:C", "coordinates": [{ "lat": 48.85, "lon": 2.35, "dates": dates(16.0, 15.5) }] },
            { "parameter": "relative_humidity_2m:p", "coordinates": [{ "lat": 48.85, "lon": 2.35, "dates": dates(70.0, 72.0) }] },
            { "parameter": "msl_pressure:hPa", "coordinates": [{ "lat": 48.85, "lon": 2.35, "dates": dates(1013.0, 1012.0) }] },
            { "parameter": "prob_precip_1h:p", "coordinates": [{ "lat": 48.85, "lon": 2.35, "dates": dates(0.0, 55.0) }] }
        ]
    })
}

fn daily_records() -> serde_json::Value {
    json!({
        "properties": {
            "parameter": {
                "T2M": { "20230101": 12.0, "20230102": 13.0 },
                "RH2M": { "20230101": 80.0, "20230102": 82.0 },
                "PRECTOTCORR": { "20230101": 0.0, "20230102": 0.0 }
            }
        }
    })
}

fn forecast_route() -> MockBuilder {
    Mock::given(method("GET")).and(path_regex(r"^/.+:PT1H/.+/json$"))
}

fn daily_route() -> MockBuilder {
    Mock::given(method("GET")).and(path("/api/temporal/daily/point"))
}

#[tokio::test]
async fn regional_city_is_answered_from_regional_dataset() {
    let server = MockServer::start().await;
    let document = json!({ "cairo": { "temperature": 34, "precipitation": 0 } });

    Mock::given(method("GET"))
        .and(path("/db/.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(document.clone()))
        .expect(1)
        .mount(&server)
        .await;
    forecast_route()
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    daily_route()
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::from_config(&config_for(&server)).unwrap();
    let p = orchestrator.run(&CityQuery::new("Cairo").unwrap()).await;

    assert_eq!(p.source, Some(ProviderId::RegionalDb));
    assert_eq!(p.outlook, RainOutlook::NoRain);
    assert_eq!(p.explanation, "Wear a good sun block with SPF 50.");

    let body = serde_json::to_value(&p).unwrap();
    assert_eq!(body["raw_data"], document);
    assert!(body.get("plot").is_none());
}

#[tokio::test]
async fn other_city_gets_hourly_forecast_with_plot() {
    let server = MockServer::start().await;
    mount_geocoder(&server, "Paris", true).await;

    Mock::given(method("GET"))
        .and(path("/db/.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;
    forecast_route()
        .respond_with(ResponseTemplate::new(200).set_body_json(hourly_forecast()))
        .expect(1)
        .mount(&server)
        .await;
    daily_route()
        .respond_with(ResponseTemplate::new(200).set_body_json(daily_records()))
        .expect(0)
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::from_config(&config_for(&server)).unwrap();
    let p = orchestrator.run(&CityQuery::new("Paris").unwrap()).await;

    assert_eq!(p.source, Some(ProviderId::PrimaryForecast));
    assert_eq!(p.outlook, RainOutlook::Rain);
    assert!(p.prediction.contains("55.0%"));
    assert_eq!(p.notice, None);

    let body = serde_json::to_value(&p).unwrap();
    assert!(body["plot"].as_str().is_some_and(|s| !s.is_empty()));
    assert!(body.get("raw_data").is_none());
}

#[tokio::test]
async fn rejected_forecast_falls_back_to_daily_records() {
    let server = MockServer::start().await;
    mount_geocoder(&server, "Paris", true).await;

    forecast_route()
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .expect(1)
        .mount(&server)
        .await;
    daily_route()
        .and(query_param("key", "nasa-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(daily_records()))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::from_config(&config_for(&server)).unwrap();
    let p = orchestrator.run(&CityQuery::new("Paris").unwrap()).await;

    assert_eq!(p.source, Some(ProviderId::FallbackForecast));
    assert_eq!(p.outlook, RainOutlook::NoRain);
    assert_eq!(
        p.attempted,
        vec![ProviderId::PrimaryForecast, ProviderId::FallbackForecast]
    );
    assert_eq!(
        p.notice.as_deref(),
        Some("answered by 'nasa_power' after 1 unsuccessful attempt(s)")
    );
    assert_eq!(p.raw_data.unwrap()["temperature"]["20230102"], 13.0);
    assert!(p.chart.is_none());
}

#[tokio::test]
async fn detailed_query_for_regional_city_skips_regional_dataset() {
    let server = MockServer::start().await;
    mount_geocoder(&server, "Luxor", true).await;

    Mock::given(method("GET"))
        .and(path("/db/.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "rain": 3 })))
        .expect(0)
        .mount(&server)
        .await;
    forecast_route()
        .respond_with(ResponseTemplate::new(200).set_body_json(hourly_forecast()))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::from_config(&config_for(&server)).unwrap();
    let query = CityQuery::new("Luxor").unwrap().detailed(true);
    let p = orchestrator.run(&query).await;

    assert_eq!(p.source, Some(ProviderId::PrimaryForecast));
    assert!(p.chart.is_some());
}

#[tokio::test]
async fn unknown_city_ends_with_no_data() {
    let server = MockServer::start().await;
    mount_geocoder(&server, "Atlantis", false).await;

    forecast_route()
        .respond_with(ResponseTemplate::new(200).set_body_json(hourly_forecast()))
        .expect(0)
        .mount(&server)
        .await;
    daily_route()
        .respond_with(ResponseTemplate::new(200).set_body_json(daily_records()))
        .expect(0)
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::from_config(&config_for(&server)).unwrap();
    let p = orchestrator.run(&CityQuery::new("Atlantis").unwrap()).await;

    assert_eq!(p.source, None);
    assert_eq!(p.outlook, RainOutlook::Undetermined);
    assert!(p.prediction.contains("no data available"));
    assert_eq!(
        p.attempted,
        vec![ProviderId::PrimaryForecast, ProviderId::FallbackForecast]
    );

    let notice = p.notice.unwrap();
    assert!(notice.starts_with("no data available from any provider"));
    assert!(notice.contains("meteomatics"));
    assert!(notice.contains("nasa_power"));
}

#[tokio::test]
async fn every_provider_failing_for_regional_city_reports_all_three() {
    let server = MockServer::start().await;
    mount_geocoder(&server, "Giza", true).await;

    Mock::given(method("GET"))
        .and(path("/db/.json"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    forecast_route()
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    daily_route()
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "messages": ["rate limited"] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::from_config(&config_for(&server)).unwrap();
    let p = orchestrator.run(&CityQuery::new("Giza").unwrap()).await;

    assert_eq!(p.source, None);
    assert_eq!(p.attempted, ProviderId::all());
    assert!(p.notice.unwrap().contains("firebase"));
}

#[test]
fn missing_credentials_prevent_startup() {
    let err = Orchestrator::from_config(&Config::default()).unwrap_err();
    assert!(err.to_string().contains("missing required configuration"));
}
