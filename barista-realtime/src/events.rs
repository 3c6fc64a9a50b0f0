//! Event types for realtime communication.
//!
//! One server message from the provider may carry several signals at once
//! (a transcription fragment, an audio part and a turn-complete flag, say).
//! Transports split such a message into a sequence of [`ServerEvent`]s in the
//! order the orchestrator must apply them.
//!
//! Audio data is transported as raw bytes internally but serialized as base64
//! for JSON compatibility.

use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Custom serde for base64-encoded audio ───────────────────────────────

fn deserialize_audio_bytes<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    base64::engine::general_purpose::STANDARD
        .decode(&s)
        .map(Bytes::from)
        .map_err(serde::de::Error::custom)
}

fn serialize_audio_bytes<S>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let s = base64::engine::general_purpose::STANDARD.encode(bytes);
    serializer.serialize_str(&s)
}

// ── Server Events ───────────────────────────────────────────────────────

/// Events received from the realtime server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// The server accepted the setup message.
    SetupComplete,

    /// A new resumption handle for the current session.
    ResumptionUpdate {
        /// Opaque handle, absent when the server has none to offer.
        #[serde(skip_serializing_if = "Option::is_none")]
        handle: Option<String>,
        /// Whether the session can be resumed at this point.
        resumable: bool,
    },

    /// Cumulative recognition of the user's current utterance.
    InputTranscription {
        /// Snapshot of the utterance so far.
        text: String,
    },

    /// Incremental transcription of the synthesized speech.
    OutputTranscription {
        /// Text to append to the in-flight message.
        text: String,
    },

    /// The user spoke over the assistant.
    Interrupted,

    /// Synthesized speech (24 kHz PCM16).
    AudioDelta {
        /// Raw audio bytes.
        #[serde(
            serialize_with = "serialize_audio_bytes",
            deserialize_with = "deserialize_audio_bytes"
        )]
        delta: Bytes,
    },

    /// The model finished generating; playback may lag behind.
    GenerationComplete,

    /// The assistant's turn ended.
    TurnComplete,

    /// The model requests one or more tool invocations.
    ToolCall {
        /// Requested calls in order.
        calls: Vec<ToolCall>,
    },

    /// Previously requested calls should be abandoned.
    ToolCallCancellation {
        /// Call identifiers being cancelled.
        ids: Vec<String>,
    },

    /// The server will close the connection soon.
    GoAway {
        /// Remaining time as reported by the server.
        #[serde(skip_serializing_if = "Option::is_none")]
        time_left: Option<String>,
    },

    /// The server closed the connection.
    Closed {
        /// WebSocket close code.
        code: u16,
        /// Close reason, possibly empty.
        reason: String,
    },

    /// Unrecognized message.
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetupComplete => "setup_complete",
            Self::ResumptionUpdate { .. } => "resumption_update",
            Self::InputTranscription { .. } => "input_transcription",
            Self::OutputTranscription { .. } => "output_transcription",
            Self::Interrupted => "interrupted",
            Self::AudioDelta { .. } => "audio_delta",
            Self::GenerationComplete => "generation_complete",
            Self::TurnComplete => "turn_complete",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolCallCancellation { .. } => "tool_call_cancellation",
            Self::GoAway { .. } => "go_away",
            Self::Closed { .. } => "closed",
            Self::Unknown => "unknown",
        }
    }

    /// The resumption handle carried by this event, if it is usable.
    pub fn usable_resumption_handle(&self) -> Option<&str> {
        match self {
            Self::ResumptionUpdate { handle: Some(handle), resumable: true }
                if !handle.is_empty() =>
            {
                Some(handle)
            }
            _ => None,
        }
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (used for responses).
    pub call_id: String,
    /// Tool/function name.
    pub name: String,
    /// Arguments as JSON; `None` when the model sent none.
    pub arguments: Option<Value>,
}

impl ToolCall {
    /// Create a new tool call.
    pub fn new(call_id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self { call_id: call_id.into(), name: name.into(), arguments: Some(arguments) }
    }
}

/// Outcome reported back to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// The call did what was asked.
    Success,
    /// The call could not be completed.
    Failure,
    /// The call returned information only.
    Information,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Information => "information",
        }
    }
}

/// Structured body of a tool response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponseData {
    /// Outcome of the call.
    pub status: ResponseStatus,
    /// Human-readable message the model may narrate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Structured payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl FunctionResponseData {
    /// A successful outcome.
    pub fn success(message: impl Into<String>) -> Self {
        Self { status: ResponseStatus::Success, message: Some(message.into()), data: None }
    }

    /// A failed outcome.
    pub fn failure(message: impl Into<String>) -> Self {
        Self { status: ResponseStatus::Failure, message: Some(message.into()), data: None }
    }

    /// An informational outcome.
    pub fn information(message: impl Into<String>) -> Self {
        Self { status: ResponseStatus::Information, message: Some(message.into()), data: None }
    }

    /// Attach a structured payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Whether the call failed.
    pub fn is_failure(&self) -> bool {
        self.status == ResponseStatus::Failure
    }
}

/// A tool response to send back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    /// The call ID being responded to.
    pub call_id: String,
    /// Function name of the call.
    pub name: String,
    /// The result of the tool execution.
    pub output: FunctionResponseData,
}

impl ToolResponse {
    /// Create a response for `call`.
    pub fn new(call: &ToolCall, output: FunctionResponseData) -> Self {
        Self { call_id: call.call_id.clone(), name: call.name.clone(), output }
    }

    /// Create a failure response for `call`.
    pub fn failure(call: &ToolCall, message: impl Into<String>) -> Self {
        Self::new(call, FunctionResponseData::failure(message))
    }

    /// Human-readable summary for transcripts.
    pub fn summary(&self) -> String {
        match &self.output.message {
            Some(message) => message.clone(),
            None => serde_json::to_string(&self.output).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_usable_resumption_handle() {
        let usable =
            ServerEvent::ResumptionUpdate { handle: Some("abc".to_string()), resumable: true };
        assert_eq!(usable.usable_resumption_handle(), Some("abc"));

        let not_resumable =
            ServerEvent::ResumptionUpdate { handle: Some("abc".to_string()), resumable: false };
        assert_eq!(not_resumable.usable_resumption_handle(), None);

        let empty = ServerEvent::ResumptionUpdate { handle: Some(String::new()), resumable: true };
        assert_eq!(empty.usable_resumption_handle(), None);

        assert_eq!(ServerEvent::TurnComplete.usable_resumption_handle(), None);
    }

    #[test]
    fn test_function_response_serialization() {
        let data = FunctionResponseData::failure("missing order_details");
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value, json!({"status": "failure", "message": "missing order_details"}));
    }

    #[test]
    fn test_tool_response_summary_falls_back_to_json() {
        let call = ToolCall::new("c1", "submit_order", json!({}));
        let response = ToolResponse::new(
            &call,
            FunctionResponseData {
                status: ResponseStatus::Information,
                message: None,
                data: Some(json!({"open": true})),
            },
        );
        assert_eq!(response.summary(), r#"{"status":"information","data":{"open":true}}"#);
    }

    #[test]
    fn test_audio_delta_serializes_base64() {
        let event = ServerEvent::AudioDelta { delta: Bytes::from_static(&[1, 2, 3]) };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, json!({"type": "audio_delta", "delta": "AQID"}));
        let back: ServerEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }
}
