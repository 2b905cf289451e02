//! Turns accumulated evidence into the final [`Prediction`].

use crate::{
    CityQuery, DailySeries, HourlySeries, Prediction, ProviderResult, RainOutlook, WeatherPayload,
    chart,
    error::Unresolved,
    provider::ProviderId,
    routing::EvidenceState,
};

const COUNTRY_WIDE: &str = "egypt";

/// What a payload says about precipitation and temperature.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Reading {
    outlook: RainOutlook,
    peak_precipitation: Option<f64>,
    mean_temperature: Option<f64>,
}

/// Merge evidence, reporting "no data available" when nothing succeeded.
pub fn merge(query: &CityQuery, evidence: &EvidenceState) -> Prediction {
    merge_or(query, evidence, Unresolved::NoDataAvailable)
}

/// Merge evidence, reporting `unresolved` when nothing succeeded.
pub fn merge_or(query: &CityQuery, evidence: &EvidenceState, unresolved: Unresolved) -> Prediction {
    let attempted = evidence.attempted();

    let Some((source, payload)) = evidence.best_success() else {
        return unresolved_prediction(query, evidence, unresolved, attempted);
    };

    let reading = read_payload(query.name(), payload);
    let prediction = describe(query.name(), source, &reading);
    let explanation = remark(reading.outlook, reading.mean_temperature).to_string();

    let (raw_data, chart) = match payload {
        WeatherPayload::Regional(document) => (Some(document.clone()), None),
        WeatherPayload::Daily(series) => (serde_json::to_value(series).ok(), None),
        WeatherPayload::Hourly(series) => match chart::render_hourly(query.name(), series) {
            Some(chart) => (None, Some(chart)),
            None => (serde_json::to_value(series).ok(), None),
        },
    };

    let failures = evidence
        .entries()
        .iter()
        .filter(|e| !e.result.is_success())
        .count();
    let notice = (failures > 0).then(|| {
        format!(
            "answered by '{}' after {} unsuccessful attempt(s)",
            source, failures
        )
    });

    Prediction {
        prediction,
        outlook: reading.outlook,
        explanation,
        raw_data,
        chart,
        source: Some(source),
        attempted,
        notice,
    }
}

fn unresolved_prediction(
    query: &CityQuery,
    evidence: &EvidenceState,
    unresolved: Unresolved,
    attempted: Vec<ProviderId>,
) -> Prediction {
    let reasons: Vec<String> = evidence
        .entries()
        .iter()
        .map(|e| match &e.result {
            ProviderResult::Error(err) => format!("{}: {}", e.provider, err),
            other => format!("{}: {}", e.provider, other.label()),
        })
        .collect();

    let notice = if reasons.is_empty() {
        unresolved.to_string()
    } else {
        format!("{} ({})", unresolved, reasons.join("; "))
    };

    Prediction {
        prediction: format!(
            "Unable to determine whether it will rain in {}: no data available.",
            query.name()
        ),
        outlook: RainOutlook::Undetermined,
        explanation: remark(RainOutlook::Undetermined, None).to_string(),
        raw_data: None,
        chart: None,
        source: None,
        attempted,
        notice: Some(notice),
    }
}

fn describe(city: &str, source: ProviderId, reading: &Reading) -> String {
    let horizon = match source {
        ProviderId::RegionalDb => "according to the regional dataset",
        ProviderId::PrimaryForecast => "over the next three days",
        ProviderId::FallbackForecast => "based on recent daily satellite records",
    };
    let unit = match source {
        ProviderId::PrimaryForecast => "%",
        _ => " mm",
    };

    match (reading.outlook, reading.peak_precipitation) {
        (RainOutlook::Rain, Some(peak)) => format!(
            "Yes, rain is expected in {city} {horizon} \
             (peak precipitation {peak:.1}{unit})."
        ),
        (RainOutlook::Rain, None) => format!("Yes, rain is expected in {city} {horizon}."),
        (RainOutlook::NoRain, _) => format!("No rain is expected in {city} {horizon}."),
        (RainOutlook::Undetermined, _) => format!(
            "Weather data for {city} was found {horizon}, but it carries no precipitation figures."
        ),
    }
}

/// Short weather-appropriate tip.
fn remark(outlook: RainOutlook, mean_temperature: Option<f64>) -> &'static str {
    match (outlook, mean_temperature) {
        (RainOutlook::Rain, Some(t)) if t <= 10.0 => {
            "Don't forget your umbrella, and wear something heavy!"
        }
        (RainOutlook::Rain, _) => "Don't forget your umbrella!",
        (RainOutlook::Undetermined, _) => "Keep an eye on the sky before heading out.",
        (RainOutlook::NoRain, Some(t)) if t >= 30.0 => "Wear a good sun block with SPF 50.",
        (RainOutlook::NoRain, Some(t)) if t >= 22.0 => "Wear a good sun block with SPF 30.",
        (RainOutlook::NoRain, Some(t)) if t <= 10.0 => "Wear something heavy.",
        (RainOutlook::NoRain, _) => "Dry skies ahead, a good day for a walk.",
    }
}

fn read_payload(city: &str, payload: &WeatherPayload) -> Reading {
    match payload {
        WeatherPayload::Hourly(series) => read_hourly(series),
        WeatherPayload::Daily(series) => read_daily(series),
        WeatherPayload::Regional(document) => read_regional(city, document),
    }
}

fn read_hourly(series: &HourlySeries) -> Reading {
    let precip: Vec<f64> = series
        .precipitation_probability_pct
        .iter()
        .map(|s| s.value)
        .collect();
    let temps: Vec<f64> = series.temperature_c.iter().map(|s| s.value).collect();
    reading_from(&precip, &temps)
}

fn read_daily(series: &DailySeries) -> Reading {
    let values = |m: &Option<std::collections::BTreeMap<String, f64>>| -> Vec<f64> {
        m.iter().flat_map(|m| m.values().copied()).collect()
    };
    reading_from(&values(&series.precipitation), &values(&series.temperature))
}

/// Only the queried city's entry is read when the document has one; a
/// country-wide query or an unmatched city reads the whole document.
fn read_regional(city: &str, document: &serde_json::Value) -> Reading {
    let city = city.trim();
    let scope = if city.eq_ignore_ascii_case(COUNTRY_WIDE) {
        document
    } else {
        find_city(document, city).unwrap_or(document)
    };

    let mut precip = Vec::new();
    let mut temps = Vec::new();
    scan_regional(scope, &mut precip, &mut temps);
    reading_from(&precip, &temps)
}

/// First subtree whose key names `city`; each level's own keys are checked before descending.
fn find_city<'a>(value: &'a serde_json::Value, city: &str) -> Option<&'a serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map
            .iter()
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(city))
            .map(|(_, child)| child)
            .or_else(|| map.values().find_map(|child| find_city(child, city))),
        serde_json::Value::Array(items) => items.iter().find_map(|item| find_city(item, city)),
        _ => None,
    }
}

/// Negative values are provider fill values (e.g. -999) and count as missing.
fn reading_from(precipitation: &[f64], temperatures: &[f64]) -> Reading {
    let precip: Vec<f64> = precipitation
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .collect();
    let temps: Vec<f64> = temperatures
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v > -100.0)
        .collect();

    let peak_precipitation = precip.iter().copied().reduce(f64::max);
    let outlook = match peak_precipitation {
        None => RainOutlook::Undetermined,
        Some(peak) if peak > 0.0 => RainOutlook::Rain,
        Some(_) => RainOutlook::NoRain,
    };
    let mean_temperature =
        (!temps.is_empty()).then(|| temps.iter().sum::<f64>() / temps.len() as f64);

    Reading {
        outlook,
        peak_precipitation,
        mean_temperature,
    }
}

fn is_precipitation_key(key: &str) -> bool {
    let key = key.to_lowercase();
    key.contains("precip") || key.contains("rain")
}

fn is_temperature_key(key: &str) -> bool {
    let key = key.to_lowercase();
    key.contains("temp") || key == "t2m"
}

/// Walk a document of unknown shape, collecting numbers found under
/// precipitation-like and temperature-like keys.
fn scan_regional(value: &serde_json::Value, precip: &mut Vec<f64>, temps: &mut Vec<f64>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                if is_precipitation_key(key) {
                    collect_numbers(child, precip);
                } else if is_temperature_key(key) {
                    collect_numbers(child, temps);
                } else {
                    scan_regional(child, precip, temps);
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                scan_regional(item, precip, temps);
            }
        }
        _ => {}
    }
}

fn collect_numbers(value: &serde_json::Value, out: &mut Vec<f64>) {
    match value {
        serde_json::Value::Number(n) => out.extend(n.as_f64()),
        serde_json::Value::String(s) => out.extend(s.trim().parse::<f64>().ok()),
        serde_json::Value::Array(items) => items.iter().for_each(|v| collect_numbers(v, out)),
        serde_json::Value::Object(map) => map.values().for_each(|v| collect_numbers(v, out)),
        _ => {}
    }
}
