use std::{fmt::Write as _, net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Text};
use rainwatch_core::{
    CityQuery, Config, Orchestrator, Prediction,
    config::{
        ENV_DATABASE_URL, ENV_GOOGLE_API_KEY, ENV_METEOMATICS_PASSWORD, ENV_METEOMATICS_USERNAME,
        ENV_NASA_API_KEY,
    },
};

use crate::server;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "rainwatch", version, about = "Will it rain? Multi-source rain prediction")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Keep the built-in fun fact instead of asking the text-generation service.
    #[arg(long, global = true)]
    pub no_remarks: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store credentials in the config file.
    Configure,

    /// Serve `GET /predict?city=<name>` over HTTP.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8000")]
        addr: SocketAddr,
    },

    /// Predict rain for one city and exit.
    Predict {
        city: String,

        /// Prefer the hourly forecast even for cities covered by the regional dataset.
        #[arg(long)]
        detailed: bool,

        /// Print the full JSON response instead of a summary.
        #[arg(long)]
        json: bool,

        /// Write the hourly chart, when one is produced, to this SVG file.
        #[arg(long, value_name = "PATH")]
        chart: Option<PathBuf>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Serve { addr } => {
                let orchestrator = build_orchestrator(self.no_remarks)?;
                server::serve(addr, Arc::new(orchestrator)).await
            }
            Command::Predict {
                city,
                detailed,
                json,
                chart,
            } => {
                let query = CityQuery::new(&city)
                    .ok_or_else(|| anyhow!(server::MISSING_CITY))?
                    .detailed(detailed);
                let orchestrator = build_orchestrator(self.no_remarks)?;
                let prediction = orchestrator.run(&query).await;

                if let (Some(path), Some(svg)) = (&chart, &prediction.chart) {
                    std::fs::write(path, &svg.bytes)
                        .with_context(|| format!("Failed to write chart to {}", path.display()))?;
                }

                if json {
                    println!("{}", serde_json::to_string_pretty(&prediction)?);
                } else {
                    print!("{}", summary(query.name(), &prediction));
                }
                Ok(())
            }
        }
    }
}

/// Config file overlaid with the environment; fails fast on missing credentials.
fn build_orchestrator(no_remarks: bool) -> anyhow::Result<Orchestrator> {
    let mut config = Config::from_env()?;
    if no_remarks {
        config.remarks = false;
    }
    Orchestrator::from_config(&config)
}

/// Prompt for every credential. Blank answers keep the stored value.
fn configure() -> anyhow::Result<()> {
    // File only: environment values are never written back.
    let mut config = Config::load()?;

    let plain = [
        (ENV_DATABASE_URL, "Regional database URL:"),
        (ENV_METEOMATICS_USERNAME, "Meteomatics username:"),
    ];
    for (name, message) in plain {
        let value = Text::new(message)
            .with_help_message("leave blank to keep the current value")
            .prompt()?;
        store(&mut config, name, value)?;
    }

    let secret = [
        (ENV_METEOMATICS_PASSWORD, "Meteomatics password:"),
        (ENV_NASA_API_KEY, "NASA POWER API key:"),
        (ENV_GOOGLE_API_KEY, "Google API key:"),
    ];
    for (name, message) in secret {
        let value = Password::new(message)
            .without_confirmation()
            .with_display_mode(PasswordDisplayMode::Masked)
            .with_help_message("leave blank to keep the current value")
            .prompt()?;
        store(&mut config, name, value)?;
    }

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());

    if let Err(err) = config.credentials() {
        println!("{err}");
    }
    Ok(())
}

fn store(config: &mut Config, name: &str, value: String) -> anyhow::Result<()> {
    let value = value.trim();
    if !value.is_empty() {
        config.set_secret(name, value.to_string())?;
    }
    Ok(())
}

fn summary(city: &str, prediction: &Prediction) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", prediction.prediction);
    let _ = writeln!(out, "Tip: {}", prediction.explanation);

    match prediction.source {
        Some(source) => {
            let _ = writeln!(out, "Source: {source}");
        }
        None => {
            let _ = writeln!(out, "Source: none ({city} could not be resolved)");
        }
    }
    if let Some(notice) = &prediction.notice {
        let _ = writeln!(out, "Note: {notice}");
    }
    if prediction.chart.is_some() {
        let _ = writeln!(out, "Hourly chart available (use --chart <PATH> or --json).");
    }
    out
}
