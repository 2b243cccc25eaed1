use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::{
    AdapterError,
    types::{ChatCompletionChunk, ChoiceDelta, CompletionUsage, ToolCallDelta},
};
use crate::{
    converter::{StreamEvent, Usage},
    options::ParserOptions,
    parser::IncrementalParser,
    value::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Text,
    Reasoning,
}

/// Argument assembly for one OpenAI tool call, keyed by its `index`.
#[derive(Debug)]
struct ToolState {
    id: Option<String>,
    name: Option<String>,
    /// `tool-input-start` has been emitted.
    started: bool,
    /// The name was taken from a `{"name": …, "arguments": …}` envelope in
    /// the argument text, so the text itself is not the tool input.
    envelope: bool,
    /// Argument text received before the tool could be started.
    held: String,
    parser: IncrementalParser,
    failed: bool,
}

impl ToolState {
    fn new(options: ParserOptions) -> Self {
        Self {
            id: None,
            name: None,
            started: false,
            envelope: false,
            held: String::new(),
            parser: IncrementalParser::new(options),
            failed: false,
        }
    }
}

/// Turns OpenAI `chat.completion.chunk`s into generic [`StreamEvent`]s.
///
/// Text and reasoning become segments, closing the other kind on a switch.
/// Tool arguments are forwarded as `tool-input-delta`s while also being fed
/// to an [`IncrementalParser`], whose result becomes the input of the
/// closing `tool-call`.
#[derive(Debug)]
pub struct ChunkAdapter {
    parser_options: ParserOptions,
    started: bool,
    finished: bool,
    segment: Option<Segment>,
    segment_count: usize,
    tools: BTreeMap<u32, ToolState>,
    finish_reason: Option<String>,
    usage: Option<CompletionUsage>,
}

impl Default for ChunkAdapter {
    fn default() -> Self {
        Self::new(ParserOptions::default())
    }
}

impl ChunkAdapter {
    #[must_use]
    pub fn new(parser_options: ParserOptions) -> Self {
        Self {
            parser_options,
            started: false,
            finished: false,
            segment: None,
            segment_count: 0,
            tools: BTreeMap::new(),
            finish_reason: None,
            usage: None,
        }
    }

    /// Decodes and translates one SSE `data:` payload.
    ///
    /// # Errors
    ///
    /// [`AdapterError::Decode`] if the payload is not a completion chunk.
    pub fn push_data(&mut self, data: &str) -> Result<Vec<StreamEvent>, AdapterError> {
        let chunk: ChatCompletionChunk = serde_json::from_str(data).map_err(AdapterError::Decode)?;
        Ok(self.push(&chunk))
    }

    pub fn push(&mut self, chunk: &ChatCompletionChunk) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        if self.finished {
            debug!("ignoring chunk after end of stream");
            return out;
        }
        if !self.started {
            self.started = true;
            out.push(StreamEvent::Start);
        }
        if let Some(usage) = chunk.usage {
            self.usage = Some(usage);
        }

        // Only the first choice is translated; the proxy never requests n > 1.
        let Some(choice) = chunk.choices.first() else {
            return out;
        };
        self.push_delta(&choice.delta, &mut out);
        if let Some(reason) = &choice.finish_reason {
            self.close_all(&mut out);
            self.finish_reason = Some(reason.clone());
        }
        out
    }

    /// Ends the stream: closes what is still open and reports the finish
    /// reason and usage. Later calls return nothing.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }
        self.finished = true;
        if !self.started {
            out.push(StreamEvent::Start);
        }
        self.close_all(&mut out);
        out.push(StreamEvent::FinishStep {
            finish_reason: Some(normalize_finish_reason(self.finish_reason.as_deref())),
            usage: self.usage.map(|usage| Usage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
                cache_creation_input_tokens: 0,
                cache_read_input_tokens: usage
                    .prompt_tokens_details
                    .map_or(0, |details| details.cached_tokens),
            }),
        });
        out.push(StreamEvent::Finish);
        out
    }

    fn push_delta(&mut self, delta: &ChoiceDelta, out: &mut Vec<StreamEvent>) {
        if let Some(reasoning) = delta.reasoning_content.as_deref().filter(|s| !s.is_empty()) {
            self.enter_segment(Segment::Reasoning, out);
            out.push(StreamEvent::ReasoningDelta {
                id: Some(self.segment_id()),
                delta: reasoning.to_string(),
            });
        }
        if let Some(text) = delta.content.as_deref().filter(|s| !s.is_empty()) {
            self.enter_segment(Segment::Text, out);
            out.push(StreamEvent::TextDelta {
                id: Some(self.segment_id()),
                delta: text.to_string(),
            });
        }
        for call in delta.tool_calls.iter().flatten() {
            self.close_segment(out);
            self.push_tool_call(call, out);
        }
    }

    fn enter_segment(&mut self, segment: Segment, out: &mut Vec<StreamEvent>) {
        if self.segment == Some(segment) {
            return;
        }
        self.close_segment(out);
        // Content after a tool call opens a new block; the tools are done.
        self.close_tools(out);
        self.segment = Some(segment);
        let id = Some(self.segment_id());
        out.push(match segment {
            Segment::Text => StreamEvent::TextStart { id },
            Segment::Reasoning => StreamEvent::ReasoningStart { id },
        });
    }

    fn close_segment(&mut self, out: &mut Vec<StreamEvent>) {
        let Some(segment) = self.segment.take() else {
            return;
        };
        let id = Some(self.segment_id());
        out.push(match segment {
            Segment::Text => StreamEvent::TextEnd { id },
            Segment::Reasoning => StreamEvent::ReasoningEnd { id },
        });
        self.segment_count += 1;
    }

    fn segment_id(&self) -> String {
        self.segment_count.to_string()
    }

    fn push_tool_call(&mut self, call: &ToolCallDelta, out: &mut Vec<StreamEvent>) {
        // A new index means the model moved on to its next call.
        let finished: Vec<u32> = self.tools.keys().copied().filter(|&i| i != call.index).collect();
        for index in finished {
            self.close_tool(index, out);
        }

        let options = self.parser_options;
        let tool = self
            .tools
            .entry(call.index)
            .or_insert_with(|| ToolState::new(options));

        if let Some(id) = call.id.as_deref().filter(|s| !s.is_empty()) {
            tool.id.get_or_insert_with(|| id.to_string());
        }
        let function = call.function.as_ref();
        if let Some(name) = function.and_then(|f| f.name.as_deref()).filter(|s| !s.is_empty()) {
            tool.name.get_or_insert_with(|| name.to_string());
        }

        let fragment = function.and_then(|f| f.arguments.as_deref()).unwrap_or_default();
        if !fragment.is_empty() && !tool.failed {
            if let Err(err) = tool.parser.feed(fragment) {
                warn!(error = %err, "tool arguments are not valid JSON; forwarding raw text");
                tool.failed = true;
            }
        }

        if !tool.started && tool.name.is_none() {
            adopt_envelope_name(tool);
        }
        if tool.started {
            if !fragment.is_empty() && !tool.envelope {
                out.push(StreamEvent::ToolInputDelta {
                    id: tool.id.clone(),
                    delta: fragment.to_string(),
                });
            }
        } else {
            tool.held.push_str(fragment);
            if tool.name.is_some() {
                start_tool(tool, out);
            }
        }
    }

    fn close_all(&mut self, out: &mut Vec<StreamEvent>) {
        self.close_segment(out);
        self.close_tools(out);
    }

    fn close_tools(&mut self, out: &mut Vec<StreamEvent>) {
        let indices: Vec<u32> = self.tools.keys().copied().collect();
        for index in indices {
            self.close_tool(index, out);
        }
    }

    fn close_tool(&mut self, index: u32, out: &mut Vec<StreamEvent>) {
        let Some(mut tool) = self.tools.remove(&index) else {
            return;
        };
        if !tool.failed {
            if let Err(err) = tool.parser.finish() {
                warn!(error = %err, "tool arguments are not valid JSON");
                tool.failed = true;
            }
        }
        if !tool.started {
            adopt_envelope_name(&mut tool);
            if tool.name.is_none() {
                warn!(index, "dropping tool call that never named its function");
                return;
            }
            start_tool(&mut tool, out);
        }

        let input = tool_input(&tool);
        out.push(StreamEvent::ToolInputEnd {
            id: tool.id.clone(),
        });
        out.push(StreamEvent::ToolCall {
            tool_call_id: tool.id,
            tool_name: tool.name,
            input: Some(input),
        });
    }
}

const ENVELOPE_ARGUMENT_KEYS: [&str; 3] = ["arguments", "input", "parameters"];

/// Takes the tool name from a `{"name": …, "arguments": …}` envelope in the
/// argument text. A `name` among ordinary arguments is left alone; the text
/// stays held until the function name arrives.
fn adopt_envelope_name(tool: &mut ToolState) {
    let Some(info) = tool.parser.tool_info() else {
        return;
    };
    let is_envelope = tool
        .parser
        .current_object()
        .is_some_and(|root| ENVELOPE_ARGUMENT_KEYS.iter().any(|key| root.get(key).is_some()));
    if !is_envelope {
        return;
    }
    debug!(name = %info.name, "tool name found inside the arguments");
    tool.name = Some(info.name.clone());
    if tool.id.is_none() {
        tool.id.clone_from(&info.id);
    }
    tool.envelope = true;
}

fn start_tool(tool: &mut ToolState, out: &mut Vec<StreamEvent>) {
    let id = tool
        .id
        .get_or_insert_with(|| format!("call_{}", uuid::Uuid::new_v4().simple()))
        .clone();
    tool.started = true;
    out.push(StreamEvent::ToolInputStart {
        id: Some(id.clone()),
        tool_name: tool.name.clone(),
    });

    let held = std::mem::take(&mut tool.held);
    if !held.is_empty() && !tool.envelope {
        out.push(StreamEvent::ToolInputDelta {
            id: Some(id),
            delta: held,
        });
    }
}

/// The parsed arguments, or `{}` when they never formed a complete object.
fn tool_input(tool: &ToolState) -> serde_json::Value {
    let empty = || serde_json::Value::Object(serde_json::Map::new());
    if tool.failed || !tool.parser.is_complete() {
        if !tool.parser.raw_input().trim().is_empty() {
            warn!(id = ?tool.id, "incomplete tool arguments; using {{}}");
        }
        return empty();
    }

    let Some(root) = tool.parser.current_object() else {
        return empty();
    };
    let input = if tool.envelope {
        ENVELOPE_ARGUMENT_KEYS
            .iter()
            .find_map(|key| root.get(key))
    } else {
        Some(root)
    };
    match input {
        // Some runtimes double-encode envelope arguments as a string.
        Some(Value::String(text)) => serde_json::from_str(text).unwrap_or_else(|_| empty()),
        Some(value @ Value::Object(_)) => value.clone().into(),
        _ => empty(),
    }
}

fn normalize_finish_reason(reason: Option<&str>) -> String {
    match reason {
        Some("tool_calls" | "function_call") => "tool-calls".to_string(),
        Some("content_filter") => "content-filter".to_string(),
        Some(other) => other.replace('_', "-"),
        None => "stop".to_string(),
    }
}
