//! Four-panel SVG chart of an hourly forecast.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::{Chart, HourlySeries, Sample};

pub const SVG_MIME: &str = "image/svg+xml";

const WIDTH: f64 = 800.0;
const PANEL_HEIGHT: f64 = 150.0;
const HEADER: f64 = 40.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 20.0;
const PANEL_GAP: f64 = 30.0;

struct Panel<'a> {
    title: &'static str,
    unit: &'static str,
    color: &'static str,
    samples: &'a [Sample],
}

/// Render temperature, humidity, pressure and precipitation probability as
/// stacked line panels. Returns `None` when there is nothing to draw.
pub fn render_hourly(city: &str, series: &HourlySeries) -> Option<Chart> {
    if series.is_empty() {
        return None;
    }

    let panels = [
        Panel {
            title: "Temperature",
            unit: "°C",
            color: "#d62728",
            samples: &series.temperature_c,
        },
        Panel {
            title: "Relative humidity",
            unit: "%",
            color: "#1f77b4",
            samples: &series.humidity_pct,
        },
        Panel {
            title: "Pressure",
            unit: "hPa",
            color: "#2ca02c",
            samples: &series.pressure_hpa,
        },
        Panel {
            title: "Precipitation probability",
            unit: "%",
            color: "#9467bd",
            samples: &series.precipitation_probability_pct,
        },
    ];

    let (start, end) = time_range(&panels)?;
    let height = HEADER + panels.len() as f64 * (PANEL_HEIGHT + PANEL_GAP);

    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{height}" viewBox="0 0 {WIDTH} {height}" font-family="sans-serif" font-size="12">"#
    );
    let _ = write!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = write!(
        svg,
        r#"<text x="{}" y="24" font-size="16" text-anchor="middle">Hourly forecast for {} ({} to {})</text>"#,
        WIDTH / 2.0,
        escape(city),
        start.format("%Y-%m-%d %H:%M"),
        end.format("%Y-%m-%d %H:%M"),
    );

    for (i, panel) in panels.iter().enumerate() {
        let top = HEADER + i as f64 * (PANEL_HEIGHT + PANEL_GAP);
        draw_panel(&mut svg, panel, top, start, end);
    }

    svg.push_str("</svg>");

    Some(Chart {
        mime: SVG_MIME,
        bytes: svg.into_bytes(),
    })
}

fn time_range(panels: &[Panel<'_>]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let times = panels.iter().flat_map(|p| p.samples.iter().map(|s| s.at));
    let start = times.clone().min()?;
    let end = times.max()?;
    Some((start, end))
}

fn draw_panel(
    svg: &mut String,
    panel: &Panel<'_>,
    top: f64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) {
    let plot_width = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let _ = write!(
        svg,
        r##"<rect x="{MARGIN_LEFT}" y="{top}" width="{plot_width}" height="{PANEL_HEIGHT}" fill="none" stroke="#888"/>"##
    );
    let _ = write!(
        svg,
        r#"<text x="{}" y="{}">{} ({})</text>"#,
        MARGIN_LEFT,
        top - 6.0,
        panel.title,
        panel.unit
    );

    let values = panel.samples.iter().map(|s| s.value);
    let (Some(min), Some(max)) = (values.clone().reduce(f64::min), values.reduce(f64::max)) else {
        let _ = write!(
            svg,
            r##"<text x="{}" y="{}" text-anchor="middle" fill="#888">no data</text>"##,
            MARGIN_LEFT + plot_width / 2.0,
            top + PANEL_HEIGHT / 2.0
        );
        return;
    };

    // Flat series still get a visible band.
    let (lo, hi) = if (max - min).abs() < f64::EPSILON {
        (min - 1.0, max + 1.0)
    } else {
        (min, max)
    };
    let span_secs = (end - start).num_seconds().max(1) as f64;

    let points: Vec<String> = panel
        .samples
        .iter()
        .map(|s| {
            let x = MARGIN_LEFT + (s.at - start).num_seconds() as f64 / span_secs * plot_width;
            let y = top + PANEL_HEIGHT - (s.value - lo) / (hi - lo) * PANEL_HEIGHT;
            format!("{x:.1},{y:.1}")
        })
        .collect();

    let _ = write!(
        svg,
        r#"<polyline fill="none" stroke="{}" stroke-width="2" points="{}"/>"#,
        panel.color,
        points.join(" ")
    );
    let _ = write!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="end">{:.1}</text><text x="{}" y="{}" text-anchor="end">{:.1}</text>"#,
        MARGIN_LEFT - 6.0,
        top + 12.0,
        max,
        MARGIN_LEFT - 6.0,
        top + PANEL_HEIGHT,
        min
    );
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
