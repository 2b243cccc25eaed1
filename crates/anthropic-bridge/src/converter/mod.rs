//! Translation of generic model-stream events into Anthropic stream chunks.
//!
//! [`StreamConverter`] is a push-driven state machine: every call to
//! [`StreamConverter::process`] returns the chunks that event produces, in
//! order, and nothing is held back for batching. It keeps Anthropic's block
//! lifecycle intact: each `content_block_start` at index *i* is followed by
//! its deltas and exactly one `content_block_stop` before the next block
//! opens, and each message ends in exactly one `message_stop`, which
//! [`StreamConverter::finish`] supplies if the upstream never does.
//!
//! # Examples
//!
//! ```rust
//! use anthropic_bridge::{AnthropicChunk, ConverterOptions, StreamConverter, StreamEvent};
//!
//! let mut converter = StreamConverter::new(ConverterOptions::default());
//! let mut chunks = Vec::new();
//! for event in [
//!     StreamEvent::Start,
//!     StreamEvent::TextStart { id: None },
//!     StreamEvent::TextDelta { id: None, delta: "Hi".into() },
//!     StreamEvent::TextEnd { id: None },
//! ] {
//!     chunks.extend(converter.process(event));
//! }
//! chunks.extend(converter.finish());
//!
//! let names: Vec<_> = chunks.iter().map(AnthropicChunk::event_name).collect();
//! assert_eq!(
//!     names,
//!     [
//!         "message_start",
//!         "content_block_start",
//!         "content_block_delta",
//!         "content_block_stop",
//!         "message_stop",
//!     ]
//! );
//! ```

mod chunk;
mod event;
mod stream;
#[cfg(test)]
mod tests;

use std::collections::{BTreeSet, HashMap, HashSet};

pub use chunk::{
    AnthropicChunk, ApiError, ChunkUsage, ContentBlock, ContentDelta, MessageDelta, MessageStart,
};
pub(crate) use event::error_message;
pub use event::{StreamEvent, Usage, map_finish_reason};
pub use stream::convert_stream;
use tracing::{debug, trace, warn};

use crate::options::ConverterOptions;

/// A tool whose arguments are streaming as `tool-input-delta`s.
#[derive(Debug, Clone)]
struct StreamingTool {
    name: String,
    index: usize,
    received_delta: bool,
}

/// A tool block that was opened but got no argument deltas; it stays open
/// until the matching `tool-call` supplies the input.
#[derive(Debug, Clone)]
struct PendingTool {
    name: String,
    index: usize,
}

#[derive(Debug)]
pub struct StreamConverter {
    options: ConverterOptions,
    message_id: String,

    /// Index the next content block will get.
    index: usize,
    streaming: HashMap<String, StreamingTool>,
    streamed_ids: HashSet<String>,
    pending: HashMap<String, PendingTool>,
    open_blocks: BTreeSet<usize>,
    reasoning: String,

    start_suppressed: bool,
    message_stop_sent: bool,
}

impl Default for StreamConverter {
    fn default() -> Self {
        Self::new(ConverterOptions::default())
    }
}

impl StreamConverter {
    #[must_use]
    pub fn new(options: ConverterOptions) -> Self {
        let message_id = message_id(&options);
        Self {
            options,
            message_id,
            index: 0,
            streaming: HashMap::new(),
            streamed_ids: HashSet::new(),
            pending: HashMap::new(),
            open_blocks: BTreeSet::new(),
            reasoning: String::new(),
            start_suppressed: false,
            message_stop_sent: false,
        }
    }

    /// The id reported in the current message's `message_start`.
    #[must_use]
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Reasoning text accumulated for the current thinking block.
    #[must_use]
    pub fn reasoning_text(&self) -> &str {
        &self.reasoning
    }

    /// Translates one event.
    pub fn process(&mut self, event: StreamEvent) -> Vec<AnthropicChunk> {
        let mut out = Vec::new();
        match event {
            StreamEvent::Start => self.on_start(&mut out),
            StreamEvent::TextStart { .. } => {
                self.open_block(ContentBlock::Text { text: String::new() }, &mut out);
            }
            StreamEvent::TextDelta { delta, .. } => out.push(AnthropicChunk::ContentBlockDelta {
                index: self.index,
                delta: ContentDelta::TextDelta { text: delta },
            }),
            StreamEvent::TextEnd { .. } | StreamEvent::ReasoningEnd { .. } => {
                self.close_block(self.index, &mut out);
            }
            StreamEvent::ReasoningStart { .. } => {
                self.reasoning.clear();
                self.open_block(
                    ContentBlock::Thinking {
                        thinking: String::new(),
                    },
                    &mut out,
                );
            }
            StreamEvent::ReasoningDelta { delta, .. } => {
                self.reasoning.push_str(&delta);
                out.push(AnthropicChunk::ContentBlockDelta {
                    index: self.index,
                    delta: ContentDelta::ThinkingDelta { thinking: delta },
                });
            }
            StreamEvent::ToolInputStart { id, tool_name } => {
                self.on_tool_input_start(id, tool_name, &mut out);
            }
            StreamEvent::ToolInputDelta { id, delta } => {
                self.on_tool_input_delta(id.as_deref(), delta, &mut out);
            }
            StreamEvent::ToolInputEnd { id } => self.on_tool_input_end(id.as_deref(), &mut out),
            StreamEvent::ToolCall {
                tool_call_id,
                tool_name,
                input,
            } => self.on_tool_call(tool_call_id, tool_name, input, &mut out),
            StreamEvent::FinishStep {
                finish_reason,
                usage,
            } => {
                let usage = usage.unwrap_or_default();
                out.push(AnthropicChunk::MessageDelta {
                    delta: MessageDelta {
                        stop_reason: Some(map_finish_reason(finish_reason.as_deref()).to_string()),
                        stop_sequence: None,
                    },
                    usage: ChunkUsage {
                        input_tokens: usage.input_tokens,
                        output_tokens: usage.output_tokens,
                        cache_creation_input_tokens: usage.cache_creation_input_tokens,
                        cache_read_input_tokens: usage.cache_read_input_tokens,
                    },
                });
            }
            StreamEvent::Finish => {
                out.push(AnthropicChunk::MessageStop);
                self.end_message();
                return out;
            }
            StreamEvent::Error { error } => out.push(AnthropicChunk::Error {
                error: ApiError {
                    kind: "api_error".to_string(),
                    message: error_message(&error),
                },
            }),
            StreamEvent::Unknown => trace!("dropping unrecognized stream event"),
        }
        out
    }

    /// Ends the event stream.
    ///
    /// If the current message has not been terminated, closes every block
    /// still open in index order and emits a single `message_stop`. Returns
    /// nothing when the upstream already sent `finish`.
    pub fn finish(&mut self) -> Vec<AnthropicChunk> {
        if self.message_stop_sent {
            return Vec::new();
        }
        debug!(
            open_blocks = self.open_blocks.len(),
            "stream ended without finish; closing message"
        );

        let mut out: Vec<_> = std::mem::take(&mut self.open_blocks)
            .into_iter()
            .map(|index| AnthropicChunk::ContentBlockStop { index })
            .collect();
        out.push(AnthropicChunk::MessageStop);
        self.end_message();
        out
    }

    /// Returns the converter to its freshly constructed state.
    pub fn reset(&mut self) {
        *self = Self::new(std::mem::take(&mut self.options));
    }

    fn on_start(&mut self, out: &mut Vec<AnthropicChunk>) {
        if self.options.suppress_initial_message_start && !self.start_suppressed {
            self.start_suppressed = true;
            debug!("suppressing initial message_start");
            return;
        }
        self.message_stop_sent = false;
        out.push(AnthropicChunk::MessageStart {
            message: MessageStart::new(&self.message_id, &self.options.model),
        });
    }

    fn on_tool_input_start(
        &mut self,
        id: Option<String>,
        tool_name: Option<String>,
        out: &mut Vec<AnthropicChunk>,
    ) {
        let (Some(id), Some(name)) = (non_empty(id), non_empty(tool_name)) else {
            warn!("dropping tool-input-start without id or tool name");
            return;
        };

        self.streaming.insert(
            id.clone(),
            StreamingTool {
                name: name.clone(),
                index: self.index,
                received_delta: false,
            },
        );
        self.streamed_ids.insert(id.clone());
        self.open_block(
            ContentBlock::ToolUse {
                id,
                name,
                input: serde_json::Value::Object(serde_json::Map::new()),
            },
            out,
        );
    }

    fn on_tool_input_delta(&mut self, id: Option<&str>, delta: String, out: &mut Vec<AnthropicChunk>) {
        let Some(tool) = id.and_then(|id| self.streaming.get_mut(id)) else {
            warn!(id, "dropping tool-input-delta for unknown tool call");
            return;
        };
        tool.received_delta = true;
        out.push(AnthropicChunk::ContentBlockDelta {
            index: tool.index,
            delta: ContentDelta::InputJsonDelta {
                partial_json: delta,
            },
        });
    }

    fn on_tool_input_end(&mut self, id: Option<&str>, out: &mut Vec<AnthropicChunk>) {
        let Some((id, tool)) = id.and_then(|id| self.streaming.remove_entry(id)) else {
            warn!(id, "dropping tool-input-end for unknown tool call");
            return;
        };

        if tool.received_delta {
            self.close_block(tool.index, out);
            return;
        }

        debug!(%id, name = %tool.name, index = tool.index, "tool input arrives atomically; holding block open");
        // The block stays open, but later blocks must not reuse its index.
        self.index = self.index.max(tool.index + 1);
        self.pending.insert(
            id,
            PendingTool {
                name: tool.name,
                index: tool.index,
            },
        );
    }

    fn on_tool_call(
        &mut self,
        id: Option<String>,
        name: Option<String>,
        input: Option<serde_json::Value>,
        out: &mut Vec<AnthropicChunk>,
    ) {
        if let Some((id, pending)) = id.as_deref().and_then(|id| self.pending.remove_entry(id)) {
            let input = normalize_input(input);
            trace!(%id, name = %pending.name, "completing pending tool block");
            out.push(AnthropicChunk::ContentBlockDelta {
                index: pending.index,
                delta: ContentDelta::InputJsonDelta {
                    partial_json: input.to_string(),
                },
            });
            self.open_blocks.remove(&pending.index);
            out.push(AnthropicChunk::ContentBlockStop {
                index: pending.index,
            });
            self.index = self.index.max(pending.index + 1);
            return;
        }

        if id.as_ref().is_some_and(|id| self.streamed_ids.contains(id)) {
            trace!(?id, "skipping tool-call already streamed");
            return;
        }

        let (Some(id), Some(name)) = (non_empty(id), non_empty(name)) else {
            warn!("dropping tool-call without id or tool name");
            return;
        };

        self.streamed_ids.insert(id.clone());
        self.message_stop_sent = false;
        let index = self.index;
        out.push(AnthropicChunk::ContentBlockStart {
            index,
            content_block: ContentBlock::ToolUse {
                id,
                name,
                input: normalize_input(input),
            },
        });
        out.push(AnthropicChunk::ContentBlockStop { index });
        self.index += 1;
    }

    /// Opening a block or a `message_start` begins a new message; nothing
    /// else re-arms the safety net after a `message_stop`.
    fn open_block(&mut self, content_block: ContentBlock, out: &mut Vec<AnthropicChunk>) {
        self.message_stop_sent = false;
        self.open_blocks.insert(self.index);
        out.push(AnthropicChunk::ContentBlockStart {
            index: self.index,
            content_block,
        });
    }

    fn close_block(&mut self, index: usize, out: &mut Vec<AnthropicChunk>) {
        self.open_blocks.remove(&index);
        out.push(AnthropicChunk::ContentBlockStop { index });
        self.index = self.index.max(index + 1);
    }

    /// Clears per-message state after a `message_stop`.
    fn end_message(&mut self) {
        self.index = 0;
        self.streaming.clear();
        self.streamed_ids.clear();
        self.pending.clear();
        self.open_blocks.clear();
        self.reasoning.clear();
        self.message_stop_sent = true;
        self.message_id = message_id(&self.options);
    }
}

fn message_id(options: &ConverterOptions) -> String {
    options
        .message_id
        .clone()
        .unwrap_or_else(|| format!("msg_{}", uuid::Uuid::new_v4().simple()))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Tool input must be an object. A JSON string holding an object is decoded;
/// anything else becomes `{}`.
fn normalize_input(input: Option<serde_json::Value>) -> serde_json::Value {
    match input {
        Some(object @ serde_json::Value::Object(_)) => object,
        Some(serde_json::Value::String(text)) => match serde_json::from_str(&text) {
            Ok(object @ serde_json::Value::Object(_)) => object,
            _ => {
                debug!("tool input string is not a JSON object; using {{}}");
                serde_json::Value::Object(serde_json::Map::new())
            }
        },
        other => {
            if other.is_some() {
                debug!("tool input is not an object; using {{}}");
            }
            serde_json::Value::Object(serde_json::Map::new())
        }
    }
}
