use std::fmt::Display;

use async_stream::stream;
use futures_core::Stream;
use futures_util::{StreamExt, pin_mut};
use tracing::warn;

use super::{AnthropicChunk, StreamConverter, StreamEvent};

/// Drives `converter` over an upstream event stream.
///
/// Chunks are yielded in the order their events arrive. An upstream error is
/// logged and ends the conversion the same way a clean end does: the
/// converter's [`finish`](StreamConverter::finish) closes whatever is still
/// open, so the client always receives a terminal `message_stop`. Dropping the
/// returned stream stops pulling from `events`.
pub fn convert_stream<S, E>(
    mut converter: StreamConverter,
    events: S,
) -> impl Stream<Item = AnthropicChunk>
where
    S: Stream<Item = Result<StreamEvent, E>>,
    E: Display,
{
    stream! {
        pin_mut!(events);
        while let Some(next) = events.next().await {
            match next {
                Ok(event) => {
                    for chunk in converter.process(event) {
                        yield chunk;
                    }
                }
                Err(e) => {
                    warn!("upstream event stream failed: {e}");
                    break;
                }
            }
        }
        for chunk in converter.finish() {
            yield chunk;
        }
    }
}
