//! Early tool-call detection.
//!
//! The raw-text scan is deliberately blind to structure: it reports a `"name"`
//! field as soon as its closing quote arrives, long before the enclosing object
//! is syntactically complete. That also means it can latch onto a nested
//! argument that happens to be called `name`; [`ToolInfo::confirmed`] tells
//! the caller whether the parsed root object agrees.
use std::sync::LazyLock;

use regex::Regex;

use crate::value::Value;

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""name"\s*:\s*"([^"\\]+)""#).expect("name pattern compiles"));

static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""id"\s*:\s*"([^"\\]+)""#).expect("id pattern compiles"));

/// What is known about the tool call being parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInfo {
    pub name: String,
    pub id: Option<String>,
    /// `true` once the root object's own `name` field holds [`ToolInfo::name`].
    /// Until then the name is provisional.
    pub confirmed: bool,
}

#[derive(Debug, Default)]
pub(crate) struct ToolDetector {
    name: Option<String>,
    id: Option<String>,
    /// Byte offsets into the raw input before which no match can start.
    name_from: usize,
    id_from: usize,
}

impl ToolDetector {
    /// Re-examines the input after `new_text` was appended to `raw`.
    pub fn detect(&mut self, raw: &str, new_text: &str, root: Option<&Value>) -> Option<ToolInfo> {
        // Every match ends in a quote, so a chunk without one cannot add a match.
        if new_text.contains('"') {
            if self.name.is_none() {
                self.name = scan(&NAME_PATTERN, r#""name""#, raw, &mut self.name_from);
            }
            if self.id.is_none() {
                self.id = scan(&ID_PATTERN, r#""id""#, raw, &mut self.id_from);
            }
        }

        let structural_name = root.and_then(|v| v.get("name")).and_then(Value::as_str);
        let structural_id = root.and_then(|v| v.get("id")).and_then(Value::as_str);

        let name = self.name.as_deref().or(structural_name)?;
        Some(ToolInfo {
            name: name.to_string(),
            id: self.id.as_deref().or(structural_id).map(str::to_string),
            confirmed: structural_name == Some(name),
        })
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Matches `pattern` against the part of `raw` after `from`, then moves
/// `from` up to the earliest place a later match could still start.
fn scan(pattern: &Regex, key: &str, raw: &str, from: &mut usize) -> Option<String> {
    let text = &raw[*from..];
    let found = capture(pattern, text);
    if found.is_none() {
        *from += resume_offset(text, key);
    }
    found
}

/// Offset in `text` of the last `key` occurrence that may still grow into a
/// match, or of a `key` cut off at the very end.
fn resume_offset(text: &str, key: &str) -> usize {
    if let Some(at) = text
        .rfind(key)
        .filter(|&at| may_still_match(&text[at + key.len()..]))
    {
        return at;
    }
    let mut at = text.len().saturating_sub(key.len() - 1);
    while !text.is_char_boundary(at) {
        at -= 1;
    }
    at
}

/// Whether `rest`, the text after a key, is a prefix of `\s*:\s*"[^"\\]*`.
fn may_still_match(rest: &str) -> bool {
    let rest = rest.trim_start();
    let Some(rest) = rest.strip_prefix(':') else {
        return rest.is_empty();
    };
    let rest = rest.trim_start();
    let Some(rest) = rest.strip_prefix('"') else {
        return rest.is_empty();
    };
    !rest.contains(['"', '\\'])
}

fn capture(pattern: &Regex, haystack: &str) -> Option<String> {
    pattern
        .captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
