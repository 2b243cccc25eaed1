#![no_main]
use anthropic_bridge::{AnthropicChunk, StreamConverter, StreamEvent};
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

/// A compact event alphabet; ids are drawn from a tiny pool so that
/// start/delta/end/call sequences for the same tool actually meet.
#[derive(Debug, Arbitrary)]
enum Op {
    Start,
    TextStart,
    TextDelta,
    TextEnd,
    ReasoningStart,
    ReasoningEnd,
    ToolInputStart(u8),
    ToolInputDelta(u8),
    ToolInputEnd(u8),
    ToolCall(u8, bool),
    FinishStep,
    Unknown,
}

fn id(n: u8) -> Option<String> {
    Some(format!("call_{}", n % 3))
}

fn event(op: Op) -> StreamEvent {
    match op {
        Op::Start => StreamEvent::Start,
        Op::TextStart => StreamEvent::TextStart { id: None },
        Op::TextDelta => StreamEvent::TextDelta {
            id: None,
            delta: "x".into(),
        },
        Op::TextEnd => StreamEvent::TextEnd { id: None },
        Op::ReasoningStart => StreamEvent::ReasoningStart { id: None },
        Op::ReasoningEnd => StreamEvent::ReasoningEnd { id: None },
        Op::ToolInputStart(n) => StreamEvent::ToolInputStart {
            id: id(n),
            tool_name: Some("tool".into()),
        },
        Op::ToolInputDelta(n) => StreamEvent::ToolInputDelta {
            id: id(n),
            delta: "{}".into(),
        },
        Op::ToolInputEnd(n) => StreamEvent::ToolInputEnd { id: id(n) },
        Op::ToolCall(n, object) => StreamEvent::ToolCall {
            tool_call_id: id(n),
            tool_name: Some("tool".into()),
            input: Some(if object {
                serde_json::json!({"a": 1})
            } else {
                serde_json::json!("text")
            }),
        },
        Op::FinishStep => StreamEvent::FinishStep {
            finish_reason: None,
            usage: None,
        },
        Op::Unknown => StreamEvent::Unknown,
    }
}

fuzz_target!(|ops: Vec<Op>| {
    let mut converter = StreamConverter::default();
    let mut chunks: Vec<AnthropicChunk> = ops
        .into_iter()
        .flat_map(|op| converter.process(event(op)))
        .collect();
    chunks.extend(converter.finish());

    // Exactly one terminal message_stop, and it comes last.
    let stops = chunks
        .iter()
        .filter(|c| matches!(c, AnthropicChunk::MessageStop))
        .count();
    assert_eq!(stops, 1);
    assert!(matches!(chunks.last(), Some(AnthropicChunk::MessageStop)));
    assert!(converter.finish().is_empty());
});
