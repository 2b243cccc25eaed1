#![expect(missing_docs)]

mod common;

use anthropic_bridge::{
    AnthropicChunk, ConverterOptions, ParserOptions, StreamConverter, convert_stream,
    openai::adapt_sse_stream, translate_sse,
};
use common::{BACKEND_SSE, frames, pieces};
use futures_util::{StreamExt, stream};
use rstest::rstest;
use serde_json::json;

fn options() -> ConverterOptions {
    ConverterOptions {
        model: "qwen3".into(),
        message_id: Some("msg_fixed".into()),
        suppress_initial_message_start: false,
    }
}

/// Checks the Anthropic block lifecycle: blocks open in index order and each
/// is stopped exactly once before the next one opens.
fn assert_lifecycle(frames: &[(String, serde_json::Value)]) {
    assert_eq!(frames.first().map(|f| f.0.as_str()), Some("message_start"));
    assert_eq!(frames.last().map(|f| f.0.as_str()), Some("message_stop"));
    assert_eq!(frames.iter().filter(|f| f.0 == "message_stop").count(), 1);

    let mut open: Option<u64> = None;
    let mut next = 0;
    for (event, data) in frames {
        let index = data["index"].as_u64();
        match event.as_str() {
            "content_block_start" => {
                assert_eq!(open, None, "block opened while another is open");
                assert_eq!(index, Some(next));
                open = index;
                next += 1;
            }
            "content_block_delta" => assert_eq!(index, open),
            "content_block_stop" => {
                assert_eq!(index, open);
                open = None;
            }
            _ => {}
        }
    }
    assert_eq!(open, None);
}

#[test]
fn translates_a_full_response() {
    let out = translate_sse(BACKEND_SSE, ParserOptions::default(), options()).unwrap();
    let frames = frames(&out);
    assert_lifecycle(&frames);

    let names: Vec<_> = frames.iter().map(|f| f.0.as_str()).collect();
    assert_eq!(
        names,
        [
            "message_start",
            "content_block_start",
            "content_block_delta",
            "content_block_stop",
            "content_block_start",
            "content_block_delta",
            "content_block_stop",
            "content_block_start",
            "content_block_delta",
            "content_block_delta",
            "content_block_stop",
            "message_delta",
            "message_stop",
        ]
    );

    assert_eq!(frames[0].1["message"]["id"], "msg_fixed");
    assert_eq!(frames[1].1["content_block"], json!({"type": "thinking", "thinking": ""}));
    assert_eq!(
        frames[2].1["delta"],
        json!({"type": "thinking_delta", "thinking": "Need the file."})
    );
    assert_eq!(frames[5].1["delta"]["text"], "Reading it.");
    assert_eq!(
        frames[7].1["content_block"],
        json!({"type": "tool_use", "id": "call_42", "name": "read_file", "input": {}})
    );

    let arguments: String = frames[8..10]
        .iter()
        .map(|f| f.1["delta"]["partial_json"].as_str().unwrap())
        .collect();
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&arguments).unwrap(),
        json!({"file_path": "src/main.rs"})
    );

    assert_eq!(
        frames[11].1,
        json!({
            "type": "message_delta",
            "delta": {"stop_reason": "tool_use", "stop_sequence": null},
            "usage": {
                "input_tokens": 120,
                "output_tokens": 18,
                "cache_creation_input_tokens": 0,
                "cache_read_input_tokens": 0
            }
        })
    );
}

#[test]
fn truncated_body_still_ends_cleanly() {
    let cut = BACKEND_SSE.find("\"finish_reason\"").unwrap();
    let out = translate_sse(&BACKEND_SSE[..cut], ParserOptions::default(), options()).unwrap();
    let frames = frames(&out);
    assert_lifecycle(&frames);
    assert_eq!(frames[frames.len() - 2].1["delta"]["stop_reason"], "end_turn");
}

#[test]
fn garbage_frames_are_skipped() {
    let body = format!("data: {{not json\n\n{BACKEND_SSE}");
    let out = translate_sse(&body, ParserOptions::default(), options()).unwrap();
    assert_lifecycle(&frames(&out));
}

#[rstest]
#[case(1)]
#[case(7)]
#[case(64)]
#[tokio::test]
async fn streaming_matches_one_shot(#[case] size: usize) {
    let expected = translate_sse(BACKEND_SSE, ParserOptions::default(), options()).unwrap();

    let body = stream::iter(pieces(BACKEND_SSE, size).into_iter().map(Ok::<_, String>));
    let events = adapt_sse_stream(ParserOptions::default(), body);
    let chunks: Vec<AnthropicChunk> = convert_stream(StreamConverter::new(options()), events)
        .collect()
        .await;
    let streamed: String = chunks.iter().map(|c| c.to_sse().unwrap()).collect();

    assert_eq!(streamed, expected);
}
