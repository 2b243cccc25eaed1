use futures_util::{StreamExt, stream};
use rstest::rstest;
use serde_json::json;

use super::*;

fn options() -> ConverterOptions {
    ConverterOptions {
        model: "qwen3-coder".into(),
        message_id: Some("msg_test".into()),
        suppress_initial_message_start: false,
    }
}

fn run(converter: &mut StreamConverter, events: Vec<StreamEvent>) -> Vec<AnthropicChunk> {
    events.into_iter().flat_map(|e| converter.process(e)).collect()
}

fn names(chunks: &[AnthropicChunk]) -> Vec<&'static str> {
    chunks.iter().map(AnthropicChunk::event_name).collect()
}

fn event(value: serde_json::Value) -> StreamEvent {
    serde_json::from_value(value).unwrap()
}

fn tool_start(id: &str, name: &str) -> StreamEvent {
    StreamEvent::ToolInputStart {
        id: Some(id.into()),
        tool_name: Some(name.into()),
    }
}

fn tool_call(id: &str, name: &str, input: serde_json::Value) -> StreamEvent {
    StreamEvent::ToolCall {
        tool_call_id: Some(id.into()),
        tool_name: Some(name.into()),
        input: Some(input),
    }
}

#[test]
fn canonical_text_sequence() {
    let mut converter = StreamConverter::new(options());
    let chunks = run(
        &mut converter,
        vec![
            StreamEvent::Start,
            StreamEvent::TextStart { id: None },
            StreamEvent::TextDelta {
                id: None,
                delta: "Hi".into(),
            },
            StreamEvent::TextEnd { id: None },
            StreamEvent::FinishStep {
                finish_reason: Some("stop".into()),
                usage: None,
            },
            StreamEvent::Finish,
        ],
    );

    assert_eq!(
        chunks,
        vec![
            AnthropicChunk::MessageStart {
                message: MessageStart::new("msg_test", "qwen3-coder"),
            },
            AnthropicChunk::ContentBlockStart {
                index: 0,
                content_block: ContentBlock::Text {
                    text: String::new()
                },
            },
            AnthropicChunk::ContentBlockDelta {
                index: 0,
                delta: ContentDelta::TextDelta { text: "Hi".into() },
            },
            AnthropicChunk::ContentBlockStop { index: 0 },
            AnthropicChunk::MessageDelta {
                delta: MessageDelta {
                    stop_reason: Some("end_turn".into()),
                    stop_sequence: None,
                },
                usage: ChunkUsage::default(),
            },
            AnthropicChunk::MessageStop,
        ]
    );
    assert!(converter.finish().is_empty());
}

#[test]
fn wire_shapes() {
    let start = AnthropicChunk::MessageStart {
        message: MessageStart::new("msg_1", "m"),
    };
    assert_eq!(
        serde_json::to_value(&start).unwrap(),
        json!({
            "type": "message_start",
            "message": {
                "id": "msg_1",
                "type": "message",
                "role": "assistant",
                "content": [],
                "model": "m",
                "stop_reason": null,
                "stop_sequence": null,
                "usage": {
                    "input_tokens": 0,
                    "output_tokens": 0,
                    "cache_creation_input_tokens": 0,
                    "cache_read_input_tokens": 0
                }
            }
        })
    );

    let delta = AnthropicChunk::ContentBlockDelta {
        index: 2,
        delta: ContentDelta::InputJsonDelta {
            partial_json: "{\"a\":".into(),
        },
    };
    assert_eq!(
        delta.to_sse().unwrap(),
        "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":2,\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"{\\\"a\\\":\"}}\n\n"
    );
    assert_eq!(
        AnthropicChunk::MessageStop.to_sse().unwrap(),
        "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n"
    );
}

#[test]
fn streamed_tool_call() {
    let mut converter = StreamConverter::new(options());
    let chunks = run(
        &mut converter,
        vec![
            tool_start("call_1", "read_file"),
            StreamEvent::ToolInputDelta {
                id: Some("call_1".into()),
                delta: "{\"file_path\":".into(),
            },
            StreamEvent::ToolInputDelta {
                id: Some("call_1".into()),
                delta: "\"a.txt\"}".into(),
            },
            StreamEvent::ToolInputEnd {
                id: Some("call_1".into()),
            },
            // Providers echo the full call after streaming it.
            tool_call("call_1", "read_file", json!({"file_path": "a.txt"})),
            StreamEvent::TextStart { id: None },
        ],
    );

    assert_eq!(
        names(&chunks),
        [
            "content_block_start",
            "content_block_delta",
            "content_block_delta",
            "content_block_stop",
            "content_block_start",
        ]
    );
    assert_eq!(
        chunks[0],
        AnthropicChunk::ContentBlockStart {
            index: 0,
            content_block: ContentBlock::ToolUse {
                id: "call_1".into(),
                name: "read_file".into(),
                input: json!({}),
            },
        }
    );
    assert_eq!(chunks[3].index(), Some(0));
    assert_eq!(chunks[4].index(), Some(1));
}

#[test]
fn tool_input_end_without_deltas_waits_for_tool_call() {
    let mut converter = StreamConverter::new(options());
    let mut chunks = run(
        &mut converter,
        vec![
            tool_start("call_1", "write_file"),
            StreamEvent::ToolInputEnd {
                id: Some("call_1".into()),
            },
        ],
    );
    assert_eq!(names(&chunks), ["content_block_start"]);

    chunks.extend(converter.process(tool_call(
        "call_1",
        "write_file",
        json!({"file_path": "a.txt"}),
    )));

    assert_eq!(
        chunks,
        vec![
            AnthropicChunk::ContentBlockStart {
                index: 0,
                content_block: ContentBlock::ToolUse {
                    id: "call_1".into(),
                    name: "write_file".into(),
                    input: json!({}),
                },
            },
            AnthropicChunk::ContentBlockDelta {
                index: 0,
                delta: ContentDelta::InputJsonDelta {
                    partial_json: r#"{"file_path":"a.txt"}"#.into(),
                },
            },
            AnthropicChunk::ContentBlockStop { index: 0 },
        ]
    );

    // A repeated tool-call for the same id is a duplicate.
    assert!(
        converter
            .process(tool_call("call_1", "write_file", json!({})))
            .is_empty()
    );
}

#[test]
fn pending_tool_does_not_share_its_index() {
    let mut converter = StreamConverter::new(options());
    let chunks = run(
        &mut converter,
        vec![
            tool_start("call_1", "a"),
            StreamEvent::ToolInputEnd {
                id: Some("call_1".into()),
            },
            tool_start("call_2", "b"),
            StreamEvent::ToolInputDelta {
                id: Some("call_2".into()),
                delta: "{}".into(),
            },
            StreamEvent::ToolInputEnd {
                id: Some("call_2".into()),
            },
            tool_call("call_1", "a", json!({"x": 1})),
            StreamEvent::TextStart { id: None },
        ],
    );

    let indices: Vec<_> = chunks.iter().filter_map(AnthropicChunk::index).collect();
    assert_eq!(indices, [0, 1, 1, 1, 0, 0, 2]);
}

#[test]
fn atomic_tool_call() {
    let mut converter = StreamConverter::new(options());
    let chunks = run(
        &mut converter,
        vec![
            StreamEvent::TextStart { id: None },
            StreamEvent::TextEnd { id: None },
            tool_call("call_7", "ls", json!({"path": "."})),
        ],
    );
    assert_eq!(
        chunks[2..],
        [
            AnthropicChunk::ContentBlockStart {
                index: 1,
                content_block: ContentBlock::ToolUse {
                    id: "call_7".into(),
                    name: "ls".into(),
                    input: json!({"path": "."}),
                },
            },
            AnthropicChunk::ContentBlockStop { index: 1 },
        ]
    );
}

#[rstest]
#[case(Some(json!("{\"path\": \".\"}")), json!({"path": "."}))]
#[case(Some(json!("not json")), json!({}))]
#[case(Some(json!("[1]")), json!({}))]
#[case(Some(json!([1, 2])), json!({}))]
#[case(Some(json!(null)), json!({}))]
#[case(None, json!({}))]
fn non_object_input_becomes_empty_object(
    #[case] input: Option<serde_json::Value>,
    #[case] expected: serde_json::Value,
) {
    let mut converter = StreamConverter::new(options());
    let chunks = converter.process(StreamEvent::ToolCall {
        tool_call_id: Some("call_1".into()),
        tool_name: Some("ls".into()),
        input,
    });
    let AnthropicChunk::ContentBlockStart {
        content_block: ContentBlock::ToolUse { input, .. },
        ..
    } = &chunks[0]
    else {
        panic!("expected a tool_use block, got {:?}", chunks[0]);
    };
    assert_eq!(input, &expected);
}

#[rstest]
#[case(tool_start("", "read_file"))]
#[case(StreamEvent::ToolInputStart { id: Some("call_1".into()), tool_name: None })]
#[case(StreamEvent::ToolInputDelta { id: Some("nope".into()), delta: "{".into() })]
#[case(StreamEvent::ToolInputEnd { id: None })]
#[case(StreamEvent::ToolCall { tool_call_id: Some("call_1".into()), tool_name: Some(String::new()), input: None })]
#[case(StreamEvent::ToolCall { tool_call_id: None, tool_name: Some("ls".into()), input: None })]
fn malformed_tool_events_are_dropped(#[case] malformed: StreamEvent) {
    let mut converter = StreamConverter::new(options());
    let chunks = run(
        &mut converter,
        vec![
            StreamEvent::TextStart { id: None },
            malformed,
            StreamEvent::TextEnd { id: None },
        ],
    );
    assert_eq!(names(&chunks), ["content_block_start", "content_block_stop"]);
}

#[test]
fn reasoning_uses_thinking_blocks() {
    let mut converter = StreamConverter::new(options());
    let chunks = run(
        &mut converter,
        vec![
            StreamEvent::ReasoningStart { id: None },
            StreamEvent::ReasoningDelta {
                id: None,
                delta: "Let me ".into(),
            },
            StreamEvent::ReasoningDelta {
                id: None,
                delta: "think.".into(),
            },
        ],
    );
    assert_eq!(converter.reasoning_text(), "Let me think.");
    assert_eq!(
        chunks[0],
        AnthropicChunk::ContentBlockStart {
            index: 0,
            content_block: ContentBlock::Thinking {
                thinking: String::new()
            },
        }
    );
    assert_eq!(
        chunks[2],
        AnthropicChunk::ContentBlockDelta {
            index: 0,
            delta: ContentDelta::ThinkingDelta {
                thinking: "think.".into()
            },
        }
    );

    let rest = run(
        &mut converter,
        vec![
            StreamEvent::ReasoningEnd { id: None },
            StreamEvent::TextStart { id: None },
        ],
    );
    assert_eq!(rest[1].index(), Some(1));
}

#[test]
fn safety_net_closes_open_blocks_once() {
    let mut converter = StreamConverter::new(options());
    run(
        &mut converter,
        vec![
            StreamEvent::Start,
            tool_start("call_1", "a"),
            StreamEvent::ToolInputEnd {
                id: Some("call_1".into()),
            },
            StreamEvent::TextStart { id: None },
            StreamEvent::TextDelta {
                id: None,
                delta: "cut off".into(),
            },
        ],
    );

    assert_eq!(
        converter.finish(),
        vec![
            AnthropicChunk::ContentBlockStop { index: 0 },
            AnthropicChunk::ContentBlockStop { index: 1 },
            AnthropicChunk::MessageStop,
        ]
    );
    assert!(converter.finish().is_empty());
}

#[test]
fn safety_net_on_empty_stream() {
    let mut converter = StreamConverter::new(options());
    assert_eq!(converter.finish(), vec![AnthropicChunk::MessageStop]);
}

#[test]
fn late_events_after_finish_do_not_reopen_the_message() {
    let mut converter = StreamConverter::new(options());
    let mut chunks = run(
        &mut converter,
        vec![
            StreamEvent::Start,
            StreamEvent::Finish,
            StreamEvent::Error {
                error: json!("late"),
            },
            StreamEvent::FinishStep {
                finish_reason: None,
                usage: None,
            },
        ],
    );
    chunks.extend(converter.finish());

    assert_eq!(
        names(&chunks),
        ["message_start", "message_stop", "error", "message_delta"]
    );
}

#[test]
fn finish_resets_for_next_message() {
    let mut converter = StreamConverter::new(ConverterOptions::default());
    let first = run(
        &mut converter,
        vec![
            StreamEvent::Start,
            tool_call("call_1", "ls", json!({})),
            StreamEvent::Finish,
        ],
    );
    let second = run(
        &mut converter,
        vec![
            StreamEvent::Start,
            tool_call("call_1", "ls", json!({})),
        ],
    );

    // Same id in a new message is not a duplicate, and indices restart.
    assert_eq!(second[1].index(), Some(0));
    let (AnthropicChunk::MessageStart { message: a }, AnthropicChunk::MessageStart { message: b }) =
        (&first[0], &second[0])
    else {
        panic!("expected message_start chunks");
    };
    assert_ne!(a.id, b.id);
    assert!(a.id.starts_with("msg_"));
    assert_eq!(a.model, "unknown");

    assert_eq!(converter.finish(), vec![AnthropicChunk::MessageStop]);
}

#[test]
fn only_first_start_is_suppressed() {
    let mut converter = StreamConverter::new(ConverterOptions {
        suppress_initial_message_start: true,
        ..options()
    });
    assert!(converter.process(StreamEvent::Start).is_empty());
    assert_eq!(names(&converter.process(StreamEvent::Start)), ["message_start"]);
    converter.process(StreamEvent::Finish);
    assert_eq!(names(&converter.process(StreamEvent::Start)), ["message_start"]);

    converter.reset();
    assert!(converter.process(StreamEvent::Start).is_empty());
}

#[rstest]
#[case(Some("stop"), "end_turn")]
#[case(Some("length"), "max_tokens")]
#[case(Some("tool-calls"), "tool_use")]
#[case(Some("tool_calls"), "tool_use")]
#[case(Some("content-filter"), "refusal")]
#[case(Some("stop-sequence"), "stop_sequence")]
#[case(Some("other"), "end_turn")]
#[case(None, "end_turn")]
fn stop_reasons(#[case] reason: Option<&str>, #[case] expected: &str) {
    assert_eq!(map_finish_reason(reason), expected);
}

#[test]
fn finish_step_usage() {
    let mut converter = StreamConverter::new(options());
    let chunks = converter.process(event(json!({
        "type": "finish-step",
        "finishReason": "tool-calls",
        "usage": {"inputTokens": 12, "outputTokens": 34, "cachedInputTokens": 5}
    })));
    assert_eq!(
        serde_json::to_value(&chunks[0]).unwrap(),
        json!({
            "type": "message_delta",
            "delta": {"stop_reason": "tool_use", "stop_sequence": null},
            "usage": {
                "input_tokens": 12,
                "output_tokens": 34,
                "cache_creation_input_tokens": 0,
                "cache_read_input_tokens": 5
            }
        })
    );
}

#[rstest]
#[case(json!("backend exploded"), "backend exploded")]
#[case(json!({"message": "rate limited", "code": 429}), "rate limited")]
#[case(json!({"code": 500}), r#"{"code":500}"#)]
fn error_chunks(#[case] error: serde_json::Value, #[case] message: &str) {
    let mut converter = StreamConverter::new(options());
    let chunks = converter.process(StreamEvent::Error { error });
    assert_eq!(
        chunks,
        vec![AnthropicChunk::Error {
            error: ApiError {
                kind: "api_error".into(),
                message: message.into(),
            },
        }]
    );
}

#[test]
fn events_deserialize_from_sdk_json() {
    assert_eq!(
        event(json!({"type": "tool-input-start", "id": "call_1", "toolName": "ls"})),
        tool_start("call_1", "ls")
    );
    assert_eq!(
        event(json!({"type": "tool-call", "toolCallId": "c", "toolName": "ls", "input": {"a": 1}})),
        tool_call("c", "ls", json!({"a": 1}))
    );
    assert_eq!(
        event(json!({"type": "text-delta", "id": "t0", "delta": "x"})),
        StreamEvent::TextDelta {
            id: Some("t0".into()),
            delta: "x".into()
        }
    );
    assert_eq!(
        event(json!({"type": "finish", "finishReason": "stop"})),
        StreamEvent::Finish
    );
    for kind in ["start-step", "source", "file", "raw", "made-up"] {
        assert_eq!(event(json!({"type": kind, "anything": [1]})), StreamEvent::Unknown);
    }
}

#[test]
fn unknown_events_do_not_disturb_the_sequence() {
    let mut converter = StreamConverter::new(options());
    let chunks = run(
        &mut converter,
        vec![
            StreamEvent::Start,
            StreamEvent::Unknown,
            StreamEvent::TextStart { id: None },
            StreamEvent::Unknown,
            StreamEvent::TextEnd { id: None },
            StreamEvent::Finish,
        ],
    );
    assert_eq!(
        names(&chunks),
        [
            "message_start",
            "content_block_start",
            "content_block_stop",
            "message_stop"
        ]
    );
}

#[tokio::test]
async fn stream_driver_runs_safety_net_after_upstream_error() {
    let events: Vec<Result<StreamEvent, String>> = vec![
        Ok(StreamEvent::Start),
        Ok(StreamEvent::TextStart { id: None }),
        Err("connection reset".into()),
        Ok(StreamEvent::TextEnd { id: None }),
    ];
    let chunks: Vec<_> = convert_stream(StreamConverter::new(options()), stream::iter(events))
        .collect()
        .await;

    assert_eq!(
        names(&chunks),
        [
            "message_start",
            "content_block_start",
            "content_block_stop",
            "message_stop"
        ]
    );
}

#[tokio::test]
async fn stream_driver_passes_clean_streams_through() {
    let events = [StreamEvent::Start, StreamEvent::Finish]
        .into_iter()
        .map(Ok::<_, std::convert::Infallible>);
    let chunks: Vec<_> = convert_stream(StreamConverter::default(), stream::iter(events))
        .collect()
        .await;
    assert_eq!(names(&chunks), ["message_start", "message_stop"]);
}
