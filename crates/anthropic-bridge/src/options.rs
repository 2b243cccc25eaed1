use std::time::Duration;

use serde::Deserialize;

/// Limits applied to a single [`IncrementalParser`](crate::IncrementalParser)
/// run.
///
/// All three exist to bound memory and CPU against runaway model output. Each
/// violation is fatal to the current parse.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use anthropic_bridge::{IncrementalParser, ParserOptions};
///
/// let parser = IncrementalParser::new(ParserOptions {
///     max_nesting_depth: 16,
///     parse_timeout: Duration::from_secs(5),
///     ..Default::default()
/// });
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// Largest number of bytes a single string, number or keyword token may
    /// accumulate before the tokenizer gives up.
    ///
    /// # Default
    ///
    /// 1 MiB
    pub max_buffer_size: usize,

    /// Deepest container nesting accepted. The root object counts as depth 1.
    ///
    /// # Default
    ///
    /// `64`
    pub max_nesting_depth: usize,

    /// Wall-clock budget measured from the first `feed` call. This is a single
    /// deadline, not a per-chunk idle timeout.
    ///
    /// Deserialized from an integer number of milliseconds.
    ///
    /// # Default
    ///
    /// 30 seconds
    #[serde(rename = "parse_timeout_ms", deserialize_with = "millis")]
    pub parse_timeout: Duration,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_buffer_size: 1024 * 1024,
            max_nesting_depth: 64,
            parse_timeout: Duration::from_millis(30_000),
        }
    }
}

fn millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

/// Settings for one [`StreamConverter`](crate::StreamConverter).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConverterOptions {
    /// Model name reported in `message_start`.
    pub model: String,

    /// Message id reported in `message_start`. A fresh `msg_…` id is generated
    /// for every message when unset.
    pub message_id: Option<String>,

    /// Drop the first `start` event because the caller has already written a
    /// `message_start` to the client. Only the first occurrence is dropped.
    ///
    /// # Default
    ///
    /// `false`
    pub suppress_initial_message_start: bool,
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self {
            model: String::from("unknown"),
            message_id: None,
            suppress_initial_message_start: false,
        }
    }
}
