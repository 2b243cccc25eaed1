//! Streaming translation engine for an Anthropic-to-OpenAI compatibility proxy.
//!
//! Two pieces carry the protocol guarantees:
//!
//! * [`Tokenizer`] and [`IncrementalParser`] recognize tool-call payloads
//!   character by character, exposing the partial document, the newly seen
//!   input and the tool name before the JSON is complete.
//! * [`StreamConverter`] turns generic model-stream events into Anthropic
//!   Messages stream chunks in a legal block and message lifecycle.
//!
//! The [`openai`] module decodes OpenAI `chat.completion.chunk` streams into
//! those generic events.

#![allow(missing_docs)]

mod error;
mod options;
mod parser;
mod path;
mod tokenizer;
mod value;

pub mod converter;
pub mod openai;


pub use converter::{AnthropicChunk, StreamConverter, StreamEvent, convert_stream};
pub use error::{ErrorSource, LimitError, ParserError, SyntaxError};
pub use openai::{AdapterError, ChunkAdapter, translate_sse};
pub use options::{ConverterOptions, ParserOptions};
pub use parser::{IncrementalParser, ParseResult, ToolInfo};
pub use path::{Path, PathItem, PathItemFrom, parse_dotted};
pub use tokenizer::{LexState, Token, Tokenizer};
pub use value::{Array, Map, Value};

/// Macro to build a `Vec<PathItem>` from a heterogeneous list of keys and
/// indices.
///
/// ```rust
/// # use anthropic_bridge::{path, PathItem};
/// let p = path!["edits", 0, "old_string"];
/// assert_eq!(
///     p,
///     vec![
///         PathItem::Key("edits".into()),
///         PathItem::Index(0),
///         PathItem::Key("old_string".into())
///     ]
/// );
/// ```
#[macro_export]
macro_rules! path {
    ( $( $elem:expr ),* $(,)? ) => {{
        #[allow(unused_imports)]
        use $crate::PathItemFrom;
        ::std::vec![$($crate::PathItem::from_path_component($elem)),*]
    }};
}
