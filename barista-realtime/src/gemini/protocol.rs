//! Gemini Live wire messages and their translation to [`ServerEvent`]s.

use crate::audio::AudioChunk;
use crate::config::{Modality, RealtimeConfig, ToolDefinition};
use crate::error::{RealtimeError, Result};
use crate::events::{FunctionResponseData, ServerEvent, ToolCall, ToolResponse};
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

// ── Client messages ─────────────────────────────────────────────────────

/// Top-level client message; exactly one field is set.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClientMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    setup: Option<Setup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    realtime_input: Option<RealtimeInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_response: Option<ToolResponseMessage>,
}

/// Serializes as `{}`; the API enables a feature by the field's presence.
#[derive(Debug, Clone, Default, Serialize)]
struct Enabled {}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Setup {
    model: String,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_audio_transcription: Option<Enabled>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_audio_transcription: Option<Enabled>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context_window_compression: Option<ContextWindowCompression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_resumption: Option<SessionResumption>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<Modality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    parts: Vec<TextPart>,
}

#[derive(Debug, Clone, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextWindowCompression {
    sliding_window: Enabled,
}

#[derive(Debug, Clone, Serialize)]
struct SessionResumption {
    #[serde(skip_serializing_if = "Option::is_none")]
    handle: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct RealtimeInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    audio: Option<Blob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_stream_end: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    data: String,
    mime_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolResponseMessage {
    function_responses: Vec<FunctionResponse>,
}

#[derive(Debug, Clone, Serialize)]
struct FunctionResponse {
    id: String,
    name: String,
    response: FunctionResponseData,
}

impl ClientMessage {
    /// Session setup, sent once right after the socket opens.
    pub(crate) fn setup(model: &str, config: RealtimeConfig) -> Self {
        let speech_config = config.voice.map(|voice| {
            json!({
                "voiceConfig": {
                    "prebuiltVoiceConfig": { "voiceName": voice }
                }
            })
        });

        let setup = Setup {
            model: model.to_string(),
            generation_config: GenerationConfig {
                response_modalities: config.modalities,
                speech_config,
            },
            system_instruction: config
                .instruction
                .map(|text| Content { parts: vec![TextPart { text }] }),
            tools: convert_tools(config.tools),
            input_audio_transcription: config.input_transcription.then(Enabled::default),
            output_audio_transcription: config.output_transcription.then(Enabled::default),
            context_window_compression: config
                .context_compression
                .then(|| ContextWindowCompression { sliding_window: Enabled::default() }),
            session_resumption: config
                .session_resumption
                .then(|| SessionResumption { handle: config.resumption_handle }),
        };
        Self { setup: Some(setup), ..Default::default() }
    }

    /// One chunk of microphone audio.
    pub(crate) fn audio(chunk: &AudioChunk) -> Self {
        Self {
            realtime_input: Some(RealtimeInput {
                audio: Some(Blob { data: chunk.to_base64(), mime_type: chunk.format.mime_type() }),
                audio_stream_end: None,
            }),
            ..Default::default()
        }
    }

    /// End of the user's utterance.
    pub(crate) fn audio_stream_end() -> Self {
        Self {
            realtime_input: Some(RealtimeInput { audio: None, audio_stream_end: Some(true) }),
            ..Default::default()
        }
    }

    /// All responses for one tool-call message.
    pub(crate) fn tool_responses(responses: Vec<ToolResponse>) -> Self {
        let function_responses = responses
            .into_iter()
            .map(|r| FunctionResponse { id: r.call_id, name: r.name, response: r.output })
            .collect();
        let tool_response = Some(ToolResponseMessage { function_responses });
        Self { tool_response, ..Default::default() }
    }
}

pub(crate) fn convert_tools(tools: Vec<ToolDefinition>) -> Option<Vec<Value>> {
    if tools.is_empty() {
        return None;
    }
    let function_declarations: Vec<Value> = tools
        .into_iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description.unwrap_or_default(),
                "parameters": t
                    .parameters
                    .unwrap_or_else(|| json!({ "type": "object", "properties": {} }))
            })
        })
        .collect();

    Some(vec![json!({ "functionDeclarations": function_declarations })])
}

// ── Server messages ─────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerMessage {
    setup_complete: Option<Value>,
    server_content: Option<ServerContent>,
    tool_call: Option<ToolCallMessage>,
    tool_call_cancellation: Option<ToolCallCancellation>,
    session_resumption_update: Option<SessionResumptionUpdate>,
    go_away: Option<GoAway>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
    model_turn: Option<ModelTurn>,
    input_transcription: Option<Transcription>,
    output_transcription: Option<Transcription>,
    #[serde(default)]
    interrupted: bool,
    #[serde(default)]
    generation_complete: bool,
    #[serde(default)]
    turn_complete: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ModelTurn {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    data: String,
}

#[derive(Debug, Default, Deserialize)]
struct Transcription {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallMessage {
    #[serde(default)]
    function_calls: Vec<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolCallCancellation {
    #[serde(default)]
    ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResumptionUpdate {
    new_handle: Option<String>,
    #[serde(default)]
    resumable: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoAway {
    time_left: Option<String>,
}

/// Split one raw server message into events in application order.
///
/// The resumption update comes first so the handle is stored before anything
/// else in the same message is processed; audio precedes turn completion so a
/// single message can both deliver and flush speech.
pub(crate) fn translate(raw: &str) -> Result<Vec<ServerEvent>> {
    let message: ServerMessage = serde_json::from_str(raw)
        .map_err(|e| RealtimeError::protocol(format!("Parse error: {}, raw: {}", e, raw)))?;

    let mut events = Vec::new();

    if let Some(update) = message.session_resumption_update {
        events.push(ServerEvent::ResumptionUpdate {
            handle: update.new_handle,
            resumable: update.resumable,
        });
    }

    if message.setup_complete.is_some() {
        events.push(ServerEvent::SetupComplete);
    }

    if let Some(content) = message.server_content {
        if let Some(text) = content.input_transcription.and_then(|t| t.text) {
            if !text.is_empty() {
                events.push(ServerEvent::InputTranscription { text });
            }
        }
        if let Some(text) = content.output_transcription.and_then(|t| t.text) {
            if !text.is_empty() {
                events.push(ServerEvent::OutputTranscription { text });
            }
        }
        if content.interrupted {
            events.push(ServerEvent::Interrupted);
        }
        for part in content.model_turn.map(|t| t.parts).unwrap_or_default() {
            let Some(inline) = part.inline_data else { continue };
            // A bad audio part costs that part only; the rest of the message still counts.
            match base64::engine::general_purpose::STANDARD.decode(&inline.data) {
                Ok(decoded) => events.push(ServerEvent::AudioDelta { delta: Bytes::from(decoded) }),
                Err(e) => tracing::warn!(error = %e, "Skipping undecodable inline audio"),
            }
        }
        if content.generation_complete {
            events.push(ServerEvent::GenerationComplete);
        }
        if content.turn_complete {
            events.push(ServerEvent::TurnComplete);
        }
    }

    if let Some(tool_call) = message.tool_call {
        let calls: Vec<ToolCall> = tool_call
            .function_calls
            .into_iter()
            .map(|fc| ToolCall {
                call_id: fc.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                name: fc.name,
                arguments: fc.args,
            })
            .collect();
        if !calls.is_empty() {
            events.push(ServerEvent::ToolCall { calls });
        }
    }

    if let Some(cancellation) = message.tool_call_cancellation {
        events.push(ServerEvent::ToolCallCancellation { ids: cancellation.ids });
    }

    if let Some(go_away) = message.go_away {
        events.push(ServerEvent::GoAway { time_left: go_away.time_left });
    }

    if events.is_empty() {
        events.push(ServerEvent::Unknown);
    }
    Ok(events)
}

/// Whether a close reason reports that the resumption handle was refused.
pub(crate) fn is_resumption_rejection(reason: &str) -> bool {
    let reason = reason.to_lowercase();
    reason.contains("session")
        && ["invalid", "expired", "not found"].iter().any(|word| reason.contains(word))
}
