use barista_telemetry::LogFormat;
use clap::Parser;
use std::path::PathBuf;

/// Talk to the Reykal Coffee voice barista.
///
/// Press Enter to start or stop the conversation, `m` then Enter to mute the
/// speaker, `q` then Enter to quit.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "barista")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML config file (defaults to the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Gemini Live model (overrides BARISTA_MODEL)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Prebuilt voice for the assistant
    #[arg(long)]
    pub voice: Option<String>,

    /// Log line format: text or json
    #[arg(long)]
    pub log_format: Option<LogFormat>,

    /// Export spans and metrics to this OTLP collector
    #[arg(long)]
    pub otlp_endpoint: Option<String>,

    /// Probability that the simulated order system accepts an order
    #[arg(long)]
    pub order_success_rate: Option<f64>,

    /// Run without microphone and speaker
    #[arg(long)]
    pub no_audio: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::parse_from([
            "barista",
            "--model",
            "models/custom",
            "--log-format",
            "json",
            "--no-audio",
        ]);
        assert_eq!(cli.model.as_deref(), Some("models/custom"));
        assert_eq!(cli.log_format, Some(LogFormat::Json));
        assert!(cli.no_audio);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        assert!(Cli::try_parse_from(["barista", "--log-format", "yaml"]).is_err());
    }
}
