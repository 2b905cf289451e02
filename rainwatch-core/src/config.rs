use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::ConfigError;

pub const ENV_DATABASE_URL: &str = "FIREBASE_DATABASE_URL";
pub const ENV_METEOMATICS_USERNAME: &str = "METEOMATICS_USERNAME";
pub const ENV_METEOMATICS_PASSWORD: &str = "METEOMATICS_PASSWORD";
pub const ENV_NASA_API_KEY: &str = "NASA_API_KEY";
pub const ENV_GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
pub const ENV_STEP_BUDGET: &str = "RAINWATCH_STEP_BUDGET";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "RAINWATCH_HTTP_TIMEOUT_SECS";

/// Secrets and the regional database location, as stored on disk.
///
/// Example TOML:
/// [secrets]
/// database_url = "https://example-default-rtdb.firebaseio.com/"
/// nasa_api_key = "..."
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecretsConfig {
    pub database_url: Option<String>,
    pub meteomatics_username: Option<String>,
    pub meteomatics_password: Option<String>,
    pub nasa_api_key: Option<String>,
    pub google_api_key: Option<String>,
}

impl fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("SecretsConfig")
            .field("database_url", &self.database_url)
            .field("meteomatics_username", &set(&self.meteomatics_username))
            .field("meteomatics_password", &set(&self.meteomatics_password))
            .field("nasa_api_key", &set(&self.nasa_api_key))
            .field("google_api_key", &set(&self.google_api_key))
            .finish()
    }
}

/// Base URLs of the external services. Overridable so tests can use a mock server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Endpoints {
    pub geocoding: String,
    pub meteomatics: String,
    pub nasa_power: String,
    pub gemini: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            geocoding: "https://geocoding-api.open-meteo.com".to_string(),
            meteomatics: "https://api.meteomatics.com".to_string(),
            nasa_power: "https://power.larc.nasa.gov".to_string(),
            gemini: "https://generativelanguage.googleapis.com".to_string(),
        }
    }
}

/// Historical window requested from the satellite-data provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Default for DateWindow {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or(NaiveDate::MIN),
            end: NaiveDate::from_ymd_opt(2023, 1, 5).unwrap_or(NaiveDate::MIN),
        }
    }
}

/// Top-level configuration stored on disk, overlaid with the process environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Maximum number of routing decisions per query.
    pub step_budget: usize,
    pub http_timeout_secs: u64,

    /// Let the text-generation service write the fun fact.
    pub remarks: bool,
    pub gemini_model: String,

    pub secrets: SecretsConfig,
    pub endpoints: Endpoints,
    pub daily_window: DateWindow,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            step_budget: 5,
            http_timeout_secs: 10,
            remarks: true,
            gemini_model: "gemini-2.5-pro".to_string(),
            secrets: SecretsConfig::default(),
            endpoints: Endpoints::default(),
            daily_window: DateWindow::default(),
        }
    }
}

/// Validated credentials. Only obtainable through [`Config::credentials`].
#[derive(Clone)]
pub struct Credentials {
    pub database_url: String,
    pub meteomatics_username: String,
    pub meteomatics_password: String,
    pub nasa_api_key: String,
    pub google_api_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("database_url", &self.database_url)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Load from disk, then overlay a `.env` file (searched from the working
    /// directory upwards) and finally the process environment.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::load()?;

        match dotenvy::dotenv_iter() {
            Ok(vars) => cfg.apply_dotenv_vars(vars)?,
            Err(err) if err.not_found() => {}
            Err(err) => return Err(err).context("Failed to read .env file"),
        }

        cfg.apply_env(|name| std::env::var(name).ok())?;
        Ok(cfg)
    }

    /// Overlay variables from a `.env`-formatted file without touching the
    /// process environment.
    pub fn apply_dotenv(&mut self, path: &Path) -> Result<()> {
        let vars = dotenvy::from_path_iter(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        self.apply_dotenv_vars(vars)
    }

    fn apply_dotenv_vars<R: std::io::Read>(&mut self, vars: dotenvy::Iter<R>) -> Result<()> {
        let vars = vars
            .collect::<Result<HashMap<String, String>, _>>()
            .context("Failed to parse .env file")?;
        self.apply_env(|name| vars.get(name).cloned())?;
        Ok(())
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "rainwatch", "rainwatch")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Overlay values from an environment lookup. Blank values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        for (name, slot) in [
            (ENV_DATABASE_URL, &mut self.secrets.database_url),
            (ENV_METEOMATICS_USERNAME, &mut self.secrets.meteomatics_username),
            (ENV_METEOMATICS_PASSWORD, &mut self.secrets.meteomatics_password),
            (ENV_NASA_API_KEY, &mut self.secrets.nasa_api_key),
            (ENV_GOOGLE_API_KEY, &mut self.secrets.google_api_key),
        ] {
            if let Some(value) = get(name) {
                *slot = Some(value);
            }
        }

        if let Some(raw) = get(ENV_STEP_BUDGET) {
            self.step_budget = parse_positive(ENV_STEP_BUDGET, &raw)?;
        }
        if let Some(raw) = get(ENV_HTTP_TIMEOUT_SECS) {
            self.http_timeout_secs = parse_positive(ENV_HTTP_TIMEOUT_SECS, &raw)?;
        }

        Ok(())
    }

    /// Store a secret by its environment variable name.
    pub fn set_secret(&mut self, name: &str, value: String) -> Result<(), ConfigError> {
        let slot = match name {
            ENV_DATABASE_URL => &mut self.secrets.database_url,
            ENV_METEOMATICS_USERNAME => &mut self.secrets.meteomatics_username,
            ENV_METEOMATICS_PASSWORD => &mut self.secrets.meteomatics_password,
            ENV_NASA_API_KEY => &mut self.secrets.nasa_api_key,
            ENV_GOOGLE_API_KEY => &mut self.secrets.google_api_key,
            _ => {
                return Err(ConfigError::Invalid {
                    name: "secret",
                    reason: format!("unknown secret '{name}'"),
                });
            }
        };
        *slot = Some(value);
        Ok(())
    }

    /// Validate that every required value is present.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let s = &self.secrets;
        let mut missing = Vec::new();
        let mut take = |name: &'static str, value: &Option<String>| match value {
            Some(v) => v.clone(),
            None => {
                missing.push(name);
                String::new()
            }
        };

        let creds = Credentials {
            database_url: take(ENV_DATABASE_URL, &s.database_url),
            meteomatics_username: take(ENV_METEOMATICS_USERNAME, &s.meteomatics_username),
            meteomatics_password: take(ENV_METEOMATICS_PASSWORD, &s.meteomatics_password),
            nasa_api_key: take(ENV_NASA_API_KEY, &s.nasa_api_key),
            google_api_key: take(ENV_GOOGLE_API_KEY, &s.google_api_key),
        };

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }
        if self.step_budget == 0 {
            return Err(ConfigError::Invalid {
                name: "step_budget",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "http_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(creds)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn parse_positive<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
{
    match raw.trim().parse::<T>() {
        Ok(v) if v != T::default() => Ok(v),
        _ => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a positive integer, got '{raw}'"),
        }),
    }
}
