//! Adapter from OpenAI-style chat-completions streams.
//!
//! Local model runtimes (vLLM, llama.cpp, Ollama, LM Studio) stream
//! `chat.completion.chunk` objects over SSE. [`ChunkAdapter`] normalizes them
//! into [`StreamEvent`]s for the [`StreamConverter`]; [`translate_sse`] runs
//! the whole pipeline over a complete response body.

mod adapter;
mod sse;
mod types;

pub use adapter::ChunkAdapter;
use async_stream::stream;
use futures_core::Stream;
use futures_util::{StreamExt, pin_mut};
pub use sse::{SseDecoder, SseFrame};
use thiserror::Error;
use tracing::warn;
pub use types::{
    ChatCompletionChunk, ChoiceDelta, ChunkChoice, CompletionUsage, FunctionDelta,
    PromptTokensDetails, ToolCallDelta,
};

use crate::{
    converter::{StreamConverter, StreamEvent},
    options::{ConverterOptions, ParserOptions},
};

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("invalid completion chunk: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode chunk: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Translates a complete OpenAI SSE response body into Anthropic SSE frames.
///
/// Frames that do not hold a completion chunk are logged and skipped.
///
/// # Errors
///
/// [`AdapterError::Encode`] if an outgoing chunk cannot be serialized.
///
/// # Examples
///
/// ```rust
/// use anthropic_bridge::{ConverterOptions, ParserOptions, translate_sse};
///
/// let body = concat!(
///     "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
///     "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
///     "data: [DONE]\n\n",
/// );
/// let out = translate_sse(body, ParserOptions::default(), ConverterOptions::default()).unwrap();
/// assert!(out.starts_with("event: message_start\n"));
/// assert!(out.contains("\"stop_reason\":\"end_turn\""));
/// assert!(out.ends_with("event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n"));
/// ```
pub fn translate_sse(
    body: &str,
    parser_options: ParserOptions,
    converter_options: ConverterOptions,
) -> Result<String, AdapterError> {
    let mut decoder = SseDecoder::new();
    let mut adapter = ChunkAdapter::new(parser_options);
    let mut converter = StreamConverter::new(converter_options);

    let mut frames = decoder.push(body);
    frames.extend(decoder.finish());

    let mut events = Vec::new();
    for frame in frames {
        match frame {
            SseFrame::Data(data) => match adapter.push_data(&data) {
                Ok(more) => events.extend(more),
                Err(err) => warn!("skipping frame: {err}"),
            },
            SseFrame::Done => break,
        }
    }
    events.extend(adapter.finish());

    let mut chunks: Vec<_> = events
        .into_iter()
        .flat_map(|event| converter.process(event))
        .collect();
    chunks.extend(converter.finish());

    let mut out = String::new();
    for chunk in chunks {
        out.push_str(&chunk.to_sse().map_err(AdapterError::Encode)?);
    }
    Ok(out)
}

/// Decodes a stream of SSE text pieces into generic events.
///
/// A transport error is passed through and ends the stream; a clean end (or
/// `[DONE]`) yields the adapter's closing events first.
pub fn adapt_sse_stream<S, E>(
    parser_options: ParserOptions,
    body: S,
) -> impl Stream<Item = Result<StreamEvent, E>>
where
    S: Stream<Item = Result<String, E>>,
{
    stream! {
        pin_mut!(body);
        let mut decoder = SseDecoder::new();
        let mut adapter = ChunkAdapter::new(parser_options);
        let mut done = false;
        'body: while let Some(next) = body.next().await {
            let text = match next {
                Ok(text) => text,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            for frame in decoder.push(&text) {
                match frame {
                    SseFrame::Data(data) => match adapter.push_data(&data) {
                        Ok(events) => {
                            for event in events {
                                yield Ok(event);
                            }
                        }
                        Err(err) => warn!("skipping frame: {err}"),
                    },
                    SseFrame::Done => {
                        done = true;
                        break 'body;
                    }
                }
            }
        }
        let rest = if done { Vec::new() } else { decoder.finish() };
        for frame in rest {
            if let SseFrame::Data(data) = frame {
                match adapter.push_data(&data) {
                    Ok(events) => {
                        for event in events {
                            yield Ok(event);
                        }
                    }
                    Err(err) => warn!("skipping frame: {err}"),
                }
            }
        }
        for event in adapter.finish() {
            yield Ok(event);
        }
    }
}
