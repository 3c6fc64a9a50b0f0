//! Settings for the `barista` binary.
//!
//! Sources, lowest precedence first: the TOML config file, `.env`, process
//! environment, command-line flags.

use crate::cli::Cli;
use anyhow::{Context, Result, bail};
use barista_realtime::gemini::DEFAULT_MODEL;
use barista_realtime::prompt::DEFAULT_VOICE;
use barista_telemetry::LogFormat;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_ORDER_SUCCESS_RATE: f64 = 0.9;

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub log_format: Option<LogFormat>,
    pub log_filter: Option<String>,
    pub otlp_endpoint: Option<String>,
    pub order_success_rate: Option<f64>,
}

impl FileConfig {
    /// `<config dir>/barista/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("barista").join("config.toml"))
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Read the default file if it exists.
    pub fn read_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::read(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// Fully resolved settings.
#[derive(Debug)]
pub struct Settings {
    pub api_key: SecretString,
    pub model: String,
    pub voice: String,
    pub log_format: LogFormat,
    pub log_filter: String,
    pub otlp_endpoint: Option<String>,
    pub order_success_rate: f64,
    pub audio: bool,
}

impl Settings {
    pub fn load(cli: &Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::read_default()?,
        };
        // A missing .env is fine.
        let _ = dotenvy::dotenv();
        Self::resolve(file, |key| std::env::var(key).ok().filter(|v| !v.is_empty()), cli)
    }

    /// Merge the layers. `env` looks up an environment variable.
    pub fn resolve(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
        cli: &Cli,
    ) -> Result<Self> {
        let api_key = env("GOOGLE_API_KEY")
            .or_else(|| env("GEMINI_API_KEY"))
            .or(file.api_key)
            .context("GOOGLE_API_KEY or GEMINI_API_KEY environment variable not set")?;

        let model = cli
            .model
            .clone()
            .or_else(|| env("BARISTA_MODEL"))
            .or(file.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let order_success_rate = cli
            .order_success_rate
            .or(file.order_success_rate)
            .unwrap_or(DEFAULT_ORDER_SUCCESS_RATE);
        if !(0.0..=1.0).contains(&order_success_rate) {
            bail!("order_success_rate must be between 0 and 1, got {}", order_success_rate);
        }

        Ok(Self {
            api_key: SecretString::from(api_key),
            model,
            voice: cli.voice.clone().or(file.voice).unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            log_format: cli.log_format.or(file.log_format).unwrap_or_default(),
            log_filter: file.log_filter.unwrap_or_else(|| "warn".to_string()),
            otlp_endpoint: cli.otlp_endpoint.clone().or(file.otlp_endpoint),
            order_success_rate,
            audio: !cli.no_audio,
        })
    }
}
