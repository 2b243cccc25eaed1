//! Generic model-stream events, as produced by an upstream adapter.
//!
//! The wire shape follows the AI SDK stream protocol: objects tagged by a
//! kebab-case `type` with camelCase fields, e.g.
//! `{"type":"tool-input-start","id":"call_1","toolName":"read_file"}`.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum StreamEvent {
    Start,
    TextStart {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    TextDelta {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        delta: String,
    },
    TextEnd {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    ReasoningStart {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    ReasoningDelta {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        delta: String,
    },
    ReasoningEnd {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    /// Announces a tool call whose arguments will stream as
    /// [`StreamEvent::ToolInputDelta`]s.
    ToolInputStart {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        tool_name: Option<String>,
    },
    ToolInputDelta {
        #[serde(default)]
        id: Option<String>,
        delta: String,
    },
    ToolInputEnd {
        #[serde(default)]
        id: Option<String>,
    },
    /// A tool call with its complete input.
    ///
    /// `input` is usually an object, but some backends send the arguments as
    /// a JSON-encoded string.
    ToolCall {
        #[serde(default)]
        tool_call_id: Option<String>,
        #[serde(default)]
        tool_name: Option<String>,
        #[serde(default)]
        input: Option<serde_json::Value>,
    },
    FinishStep {
        #[serde(default)]
        finish_reason: Option<String>,
        #[serde(default)]
        usage: Option<Usage>,
    },
    Finish,
    Error {
        #[serde(default)]
        error: serde_json::Value,
    },
    /// Any event kind this crate does not translate (`start-step`, `source`,
    /// `file`, `raw`, ...).
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    /// The `type` tag of this event.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Start => "start",
            StreamEvent::TextStart { .. } => "text-start",
            StreamEvent::TextDelta { .. } => "text-delta",
            StreamEvent::TextEnd { .. } => "text-end",
            StreamEvent::ReasoningStart { .. } => "reasoning-start",
            StreamEvent::ReasoningDelta { .. } => "reasoning-delta",
            StreamEvent::ReasoningEnd { .. } => "reasoning-end",
            StreamEvent::ToolInputStart { .. } => "tool-input-start",
            StreamEvent::ToolInputDelta { .. } => "tool-input-delta",
            StreamEvent::ToolInputEnd { .. } => "tool-input-end",
            StreamEvent::ToolCall { .. } => "tool-call",
            StreamEvent::FinishStep { .. } => "finish-step",
            StreamEvent::Finish => "finish",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Unknown => "unknown",
        }
    }
}

/// Token accounting reported with `finish-step`. Missing counts are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    #[serde(alias = "cachedInputTokens")]
    pub cache_read_input_tokens: u64,
}

/// Maps a generic finish reason onto an Anthropic `stop_reason`.
#[must_use]
pub fn map_finish_reason(reason: Option<&str>) -> &'static str {
    match reason {
        Some("length") => "max_tokens",
        Some("tool-calls" | "tool_calls") => "tool_use",
        Some("content-filter" | "content_filter") => "refusal",
        Some("stop-sequence" | "stop_sequence") => "stop_sequence",
        _ => "end_turn",
    }
}

/// Best-effort human readable text for an `error` event payload.
pub(crate) fn error_message(error: &serde_json::Value) -> String {
    match error {
        serde_json::Value::String(message) => message.clone(),
        serde_json::Value::Object(map) => match map.get("message") {
            Some(serde_json::Value::String(message)) => message.clone(),
            _ => error.to_string(),
        },
        serde_json::Value::Null => "unknown error".to_string(),
        other => other.to_string(),
    }
}
