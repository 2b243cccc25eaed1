//! Anthropic Messages streaming events and their SSE framing.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicChunk {
    MessageStart {
        message: MessageStart,
    },
    ContentBlockStart {
        index: usize,
        content_block: ContentBlock,
    },
    ContentBlockDelta {
        index: usize,
        delta: ContentDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        delta: MessageDelta,
        usage: ChunkUsage,
    },
    MessageStop,
    Error {
        error: ApiError,
    },
}

/// The message envelope carried by `message_start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageStart {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub role: String,
    pub content: Vec<serde_json::Value>,
    pub model: String,
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
    pub usage: ChunkUsage,
}

impl MessageStart {
    /// An empty assistant message with zeroed usage.
    #[must_use]
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: "message".to_string(),
            role: "assistant".to_string(),
            content: Vec::new(),
            model: model.into(),
            stop_reason: None,
            stop_sequence: None,
            usage: ChunkUsage::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentDelta {
    TextDelta { text: String },
    ThinkingDelta { thinking: String },
    InputJsonDelta { partial_json: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDelta {
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

impl AnthropicChunk {
    /// The SSE `event:` name, which is also the chunk's `type` tag.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            AnthropicChunk::MessageStart { .. } => "message_start",
            AnthropicChunk::ContentBlockStart { .. } => "content_block_start",
            AnthropicChunk::ContentBlockDelta { .. } => "content_block_delta",
            AnthropicChunk::ContentBlockStop { .. } => "content_block_stop",
            AnthropicChunk::MessageDelta { .. } => "message_delta",
            AnthropicChunk::MessageStop => "message_stop",
            AnthropicChunk::Error { .. } => "error",
        }
    }

    /// The content block index this chunk belongs to, if any.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        match self {
            AnthropicChunk::ContentBlockStart { index, .. }
            | AnthropicChunk::ContentBlockDelta { index, .. }
            | AnthropicChunk::ContentBlockStop { index } => Some(*index),
            _ => None,
        }
    }

    /// Renders the chunk as one SSE frame: `event: <name>\ndata: <json>\n\n`.
    ///
    /// # Errors
    ///
    /// Only if a tool input holds something `serde_json` refuses to encode.
    pub fn to_sse(&self) -> Result<String, serde_json::Error> {
        let data = serde_json::to_string(self)?;
        Ok(format!("event: {}\ndata: {data}\n\n", self.event_name()))
    }
}
