//! Configuration types for realtime sessions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool/function definition for realtime sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Tool description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl ToolDefinition {
    /// Create a new tool definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), description: None, parameters: None }
    }

    /// Set the tool description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Set the parameters schema.
    pub fn with_parameters(mut self, schema: Value) -> Self {
        self.parameters = Some(schema);
        self
    }
}

/// Output modality requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    /// Synthesized speech.
    #[default]
    Audio,
    /// Plain text.
    Text,
}

/// Configuration for a realtime session.
///
/// Fixed at connect time. The orchestrator builds one per connection attempt
/// and attaches the stored resumption handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// System instruction for the assistant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,

    /// Voice to use for audio output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// Requested output modalities.
    pub modalities: Vec<Modality>,

    /// Transcribe the user's speech.
    pub input_transcription: bool,

    /// Transcribe the synthesized speech.
    pub output_transcription: bool,

    /// Available tools/functions.
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,

    /// Sliding-window context compression.
    pub context_compression: bool,

    /// Ask the server for resumption handles.
    pub session_resumption: bool,

    /// Handle of a previous session to resume.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resumption_handle: Option<String>,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            instruction: None,
            voice: None,
            modalities: vec![Modality::Audio],
            input_transcription: false,
            output_transcription: false,
            tools: Vec::new(),
            context_compression: false,
            session_resumption: false,
            resumption_handle: None,
        }
    }
}

impl RealtimeConfig {
    /// Create a new configuration with audio output only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for RealtimeConfig.
    pub fn builder() -> RealtimeConfigBuilder {
        RealtimeConfigBuilder::new()
    }

    /// Set the system instruction.
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    /// Set the voice.
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    /// Enable both transcription channels.
    pub fn with_transcription(mut self) -> Self {
        self.input_transcription = true;
        self.output_transcription = true;
        self
    }

    /// Add a tool.
    pub fn with_tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.push(tool);
        self
    }

    /// Enable sliding-window context compression.
    pub fn with_context_compression(mut self) -> Self {
        self.context_compression = true;
        self
    }

    /// Enable session resumption, resuming `handle` when present.
    pub fn with_resumption(mut self, handle: Option<String>) -> Self {
        self.session_resumption = true;
        self.resumption_handle = handle;
        self
    }
}

/// Builder for RealtimeConfig.
#[derive(Debug, Default)]
pub struct RealtimeConfigBuilder {
    config: RealtimeConfig,
}

impl RealtimeConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the system instruction.
    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.config.instruction = Some(instruction.into());
        self
    }

    /// Set the voice.
    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.config.voice = Some(voice.into());
        self
    }

    /// Set output modalities.
    pub fn modalities(mut self, modalities: Vec<Modality>) -> Self {
        self.config.modalities = modalities;
        self
    }

    /// Enable or disable transcription of the user's speech.
    pub fn input_transcription(mut self, enabled: bool) -> Self {
        self.config.input_transcription = enabled;
        self
    }

    /// Enable or disable transcription of the synthesized speech.
    pub fn output_transcription(mut self, enabled: bool) -> Self {
        self.config.output_transcription = enabled;
        self
    }

    /// Add a tool.
    pub fn tool(mut self, tool: ToolDefinition) -> Self {
        self.config.tools.push(tool);
        self
    }

    /// Enable or disable context compression.
    pub fn context_compression(mut self, enabled: bool) -> Self {
        self.config.context_compression = enabled;
        self
    }

    /// Enable resumption, optionally resuming a previous session.
    pub fn resumption(mut self, handle: Option<String>) -> Self {
        self.config.session_resumption = true;
        self.config.resumption_handle = handle;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> RealtimeConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_audio_only() {
        let config = RealtimeConfig::default();
        assert_eq!(config.modalities, vec![Modality::Audio]);
        assert!(!config.session_resumption);
        assert!(config.resumption_handle.is_none());
    }

    #[test]
    fn test_builder() {
        let config = RealtimeConfig::builder()
            .instruction("Be brief.")
            .input_transcription(true)
            .output_transcription(true)
            .tool(ToolDefinition::new("submit_order"))
            .context_compression(true)
            .resumption(Some("h-1".to_string()))
            .build();

        assert_eq!(config.instruction.as_deref(), Some("Be brief."));
        assert!(config.input_transcription && config.output_transcription);
        assert_eq!(config.tools.len(), 1);
        assert!(config.context_compression);
        assert!(config.session_resumption);
        assert_eq!(config.resumption_handle.as_deref(), Some("h-1"));
    }

    #[test]
    fn test_modality_serializes_uppercase() {
        assert_eq!(serde_json::to_value(Modality::Audio).unwrap(), "AUDIO");
    }
}
