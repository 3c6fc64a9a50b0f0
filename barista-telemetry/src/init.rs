//! Telemetry initialization and configuration

use serde::Deserialize;
use std::str::FromStr;
use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Errors raised while installing the global subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("OTLP pipeline error: {0}")]
    Otlp(String),

    #[error("Subscriber already set: {0}")]
    Subscriber(String),
}

/// How log lines are written to stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{}', expected text or json", other)),
        }
    }
}

/// Settings for [`TelemetryConfig::init`].
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub format: LogFormat,
    /// Filter used when `RUST_LOG` is unset.
    pub default_filter: String,
    /// OTLP collector endpoint, e.g. `http://localhost:4317`.
    pub otlp_endpoint: Option<String>,
}

impl TelemetryConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            format: LogFormat::Text,
            default_filter: "info".to_string(),
            otlp_endpoint: None,
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }

    pub fn with_otlp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }

    /// Install the global subscriber.
    ///
    /// Only the first call in a process installs anything; later calls return `Ok(())`.
    /// OTLP export needs a running Tokio runtime.
    pub fn init(&self) -> Result<(), TelemetryError> {
        let mut result = Ok(());
        INIT.call_once(|| result = install(self));
        result
    }
}

/// Initialize console logging
///
/// # Example
/// ```
/// use barista_telemetry::init_telemetry;
/// init_telemetry("barista").expect("Failed to initialize telemetry");
/// ```
pub fn init_telemetry(service_name: &str) -> Result<(), TelemetryError> {
    TelemetryConfig::new(service_name).init()
}

/// Initialize console logging plus OTLP span and metric export.
///
/// # Example
/// ```no_run
/// use barista_telemetry::init_with_otlp;
/// # #[tokio::main] async fn main() {
/// init_with_otlp("barista", "http://localhost:4317")
///     .expect("Failed to initialize telemetry");
/// # }
/// ```
pub fn init_with_otlp(service_name: &str, endpoint: &str) -> Result<(), TelemetryError> {
    TelemetryConfig::new(service_name).with_otlp_endpoint(endpoint).init()
}

/// Flush pending spans. Call before exit when OTLP export is on.
pub fn shutdown_telemetry() {
    opentelemetry::global::shutdown_tracer_provider();
}

fn install(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    use tracing_opentelemetry::OpenTelemetryLayer;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_filter))
        .map_err(|e| TelemetryError::Filter(e.to_string()))?;

    let tracer = match &config.otlp_endpoint {
        Some(endpoint) => Some(install_otlp(&config.service_name, endpoint)?),
        None => None,
    };

    let json = config.format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(filter)
        .with((!json).then(|| {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
        }))
        .with(json.then(|| {
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .with_span_list(false)
        }))
        .with(tracer.map(OpenTelemetryLayer::new))
        .try_init()
        .map_err(|e| TelemetryError::Subscriber(e.to_string()))?;

    tracing::info!(
        service.name = %config.service_name,
        format = ?config.format,
        otlp.endpoint = ?config.otlp_endpoint,
        "Telemetry initialized"
    );
    Ok(())
}

fn install_otlp(
    service_name: &str,
    endpoint: &str,
) -> Result<opentelemetry_sdk::trace::Tracer, TelemetryError> {
    use opentelemetry_otlp::WithExportConfig;

    let resource = opentelemetry_sdk::Resource::new(vec![opentelemetry::KeyValue::new(
        "service.name",
        service_name.to_string(),
    )]);

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint))
        .with_trace_config(opentelemetry_sdk::trace::config().with_resource(resource.clone()))
        .install_batch(opentelemetry_sdk::runtime::Tokio)
        .map_err(|e| TelemetryError::Otlp(e.to_string()))?;

    let meter_provider = opentelemetry_otlp::new_pipeline()
        .metrics(opentelemetry_sdk::runtime::Tokio)
        .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint))
        .with_resource(resource)
        .build()
        .map_err(|e| TelemetryError::Otlp(e.to_string()))?;
    opentelemetry::global::set_meter_provider(meter_provider);

    Ok(tracer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("text".parse::<LogFormat>(), Ok(LogFormat::Text));
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config = TelemetryConfig::new("barista");
        assert_eq!(config.format, LogFormat::Text);
        assert_eq!(config.default_filter, "info");
        assert!(config.otlp_endpoint.is_none());
    }

    #[test]
    fn test_init_twice_is_ok() {
        assert!(init_telemetry("barista-test").is_ok());
        assert!(init_telemetry("barista-test").is_ok());
    }
}
