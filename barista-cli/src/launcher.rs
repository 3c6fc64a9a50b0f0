//! Wires settings, devices and the conversation together and runs it.

use crate::cli::Cli;
use crate::config::Settings;
use crate::console::Console;
use anyhow::{Context, Result};
use async_trait::async_trait;
use barista_realtime::capture::SampleCallback;
use barista_realtime::gemini::GeminiRealtimeModel;
use barista_realtime::tools::{self, OrderToolHandler, SimulatedOrderSink};
use barista_realtime::{
    AudioInput, AudioOutput, ConversationCommand, ConversationController, InputStream, NullOutput,
    RealtimeError, SessionOrchestrator, prompt,
};
use barista_telemetry::TelemetryConfig;
use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::mpsc;

const HELP: &str = "Keys: Enter = start/stop talking, m = mute speaker, q = quit";

/// Stand-in microphone when audio devices are off.
#[derive(Debug, Default)]
pub struct NoMicrophone;

#[async_trait]
impl AudioInput for NoMicrophone {
    async fn open(
        &self,
        _on_samples: SampleCallback,
    ) -> barista_realtime::Result<Box<dyn InputStream>> {
        Err(RealtimeError::device(
            "no microphone available; build with --features desktop-audio and omit --no-audio",
        ))
    }
}

/// Map one line of keyboard input to a command.
pub fn parse_command(line: &str) -> Option<ConversationCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "" => Some(ConversationCommand::ToggleRecording),
        "m" | "mute" => Some(ConversationCommand::ToggleMute),
        "q" | "quit" | "exit" => Some(ConversationCommand::Quit),
        _ => None,
    }
}

pub fn build_orchestrator(settings: &Settings) -> Result<SessionOrchestrator> {
    let model = GeminiRealtimeModel::new(settings.api_key.clone(), settings.model.clone())?;
    let sink = SimulatedOrderSink::new().with_success_rate(settings.order_success_rate);
    let orchestrator = SessionOrchestrator::builder()
        .model(Arc::new(model))
        .instruction(prompt::BARISTA_INSTRUCTION)
        .voice(settings.voice.clone())
        .tool(tools::submit_order_tool(), OrderToolHandler::new(Arc::new(sink)))
        .build()?;
    Ok(orchestrator)
}

#[cfg(feature = "desktop-audio")]
fn open_devices(settings: &Settings) -> (Arc<dyn AudioInput>, Arc<dyn AudioOutput>) {
    use barista_realtime::device::{CpalInput, CpalOutput};

    if !settings.audio {
        return (Arc::new(NoMicrophone), Arc::new(NullOutput));
    }
    let output: Arc<dyn AudioOutput> = match CpalOutput::open() {
        Ok(output) => Arc::new(output),
        Err(e) => {
            tracing::warn!(error = %e, "Speaker unavailable, replies will be silent");
            eprintln!("Speaker unavailable ({}), replies will be silent", e);
            Arc::new(NullOutput)
        }
    };
    (Arc::new(CpalInput::new()), output)
}

#[cfg(not(feature = "desktop-audio"))]
fn open_devices(_settings: &Settings) -> (Arc<dyn AudioInput>, Arc<dyn AudioOutput>) {
    (Arc::new(NoMicrophone), Arc::new(NullOutput))
}

/// Read keyboard lines on a dedicated thread. EOF quits.
fn spawn_keyboard(commands: mpsc::UnboundedSender<ConversationCommand>) -> Result<()> {
    std::thread::Builder::new()
        .name("barista-keyboard".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match parse_command(&line) {
                    Some(command) => {
                        if commands.send(command).is_err() || command == ConversationCommand::Quit {
                            return;
                        }
                    }
                    None => eprintln!("{}", HELP),
                }
            }
            let _ = commands.send(ConversationCommand::Quit);
        })
        .context("Failed to spawn keyboard thread")?;
    Ok(())
}

/// Run the assistant until the user quits.
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(&cli)?;

    let mut telemetry = TelemetryConfig::new("barista")
        .with_format(settings.log_format)
        .with_default_filter(settings.log_filter.clone());
    if let Some(endpoint) = &settings.otlp_endpoint {
        telemetry = telemetry.with_otlp_endpoint(endpoint.clone());
    }
    telemetry.init()?;

    let orchestrator = build_orchestrator(&settings)?;
    let (input, output) = open_devices(&settings);
    let mut conversation = ConversationController::new(orchestrator, input, output);

    let mut updates = conversation.subscribe();
    let renderer = tokio::spawn(async move {
        let mut console = Console::new();
        while let Some(update) = updates.recv().await {
            if let Err(e) = console.show(&update) {
                tracing::debug!(error = %e, "Failed to write to terminal");
            }
        }
    });

    let (commands_tx, commands) = mpsc::unbounded_channel();
    spawn_keyboard(commands_tx.clone())?;
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = commands_tx.send(ConversationCommand::Quit);
        }
    });

    println!("Reykal Coffee voice barista ({})", settings.model);
    println!("{}", HELP);
    tracing::info!(model = %settings.model, voice = %settings.voice, "Barista ready");

    conversation.run(commands).await;
    drop(conversation);
    let _ = renderer.await;

    barista_telemetry::shutdown_telemetry();
    println!("Goodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn settings() -> Settings {
        Settings {
            api_key: SecretString::from("test-key".to_string()),
            model: "models/test".into(),
            voice: "Aoede".into(),
            log_format: Default::default(),
            log_filter: "warn".into(),
            otlp_endpoint: None,
            order_success_rate: 1.0,
            audio: false,
        }
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command(""), Some(ConversationCommand::ToggleRecording));
        assert_eq!(parse_command("  M "), Some(ConversationCommand::ToggleMute));
        assert_eq!(parse_command("quit"), Some(ConversationCommand::Quit));
        assert_eq!(parse_command("latte"), None);
    }

    #[test]
    fn test_orchestrator_declares_submit_order() {
        let orchestrator = build_orchestrator(&settings()).unwrap();
        let config = orchestrator.session_config();
        assert_eq!(config.tools.len(), 1);
        assert_eq!(config.tools[0].name, tools::SUBMIT_ORDER);
        assert_eq!(config.voice.as_deref(), Some("Aoede"));
    }

    #[tokio::test]
    async fn test_no_microphone_reports_device_error() {
        let err = NoMicrophone.open(Box::new(|_, _| {})).await.err().unwrap();
        assert!(matches!(err, RealtimeError::DeviceError(_)));
    }
}
