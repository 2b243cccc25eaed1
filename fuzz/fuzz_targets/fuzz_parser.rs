#![no_main]
use anthropic_bridge::{IncrementalParser, ParserOptions, Value};
use libfuzzer_sys::fuzz_target;

const HEADER: usize = 5; // 1 flag + 4-byte seed

fn parser(data: &[u8]) {
    if data.len() < HEADER {
        return;
    }

    let flags = data[0];
    let split_seed = u32::from_le_bytes(data[1..5].try_into().unwrap()) as u64;
    let text = String::from_utf8_lossy(&data[HEADER..]).into_owned();
    if text.is_empty() {
        return;
    }

    let mut parser = IncrementalParser::new(ParserOptions {
        // Small limits keep the error paths busy.
        max_nesting_depth: if flags & 1 != 0 { 4 } else { 64 },
        max_buffer_size: if flags & 2 != 0 { 16 } else { 1024 * 1024 },
        ..Default::default()
    });

    let mut joined = String::new();
    let mut failed = false;
    for chunk in split_into_safe_chunks(&text, split_seed) {
        match parser.feed(chunk) {
            Ok(result) => joined.push_str(result.delta),
            Err(_) => {
                failed = true;
                break;
            }
        }
    }
    if failed || parser.finish().is_err() {
        return;
    }

    // Deltas partition the sanitized input.
    assert_eq!(joined, parser.raw_input());

    if let Ok(expected @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) =
        serde_json::from_str::<serde_json::Value>(&text)
    {
        if !text.chars().any(|c| c.is_ascii_control()) {
            assert!(parser.is_complete());
            assert_eq!(parser.current_object(), Some(&Value::from(expected)));
        }
    }
}

fuzz_target!(|data: &[u8]| parser(data));

/// Split a UTF-8 `&str` into boundary-safe chunks using a deterministic random
/// value to generate splits.
///
/// * `split_seed` may be any `u64`.
/// * Each chunk is at least one byte.
/// * Every slice ends on a valid UTF-8 boundary, so it can’t panic.
fn split_into_safe_chunks(serialized: &str, split_seed: u64) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let len = serialized.len();

    while start < len {
        let remaining = len - start;

        let mut size = (split_seed as usize % remaining) + 1;

        // Bump `size` forward until it lands on a char boundary.
        while start + size < len && !serialized.is_char_boundary(start + size) {
            size += 1;
        }

        chunks.push(&serialized[start..start + size]);
        start += size;
    }

    chunks
}
