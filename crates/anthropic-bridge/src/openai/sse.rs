/// One decoded server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// The joined `data:` lines of an event.
    Data(String),
    /// The `[DONE]` sentinel closing an OpenAI stream.
    Done,
}

/// Splits a server-sent event stream into frames.
///
/// Text may be pushed in arbitrary pieces; a frame is yielded once its
/// terminating blank line has arrived. Comment lines and fields other than
/// `data` are ignored.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: &str) -> Vec<SseFrame> {
        self.buffer.push_str(text);
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut frames = Vec::new();
        while let Some(end) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..end + 2).collect();
            frames.extend(parse_block(&block));
        }
        frames
    }

    /// Decodes whatever is left once the stream has ended, even without a
    /// closing blank line.
    pub fn finish(&mut self) -> Vec<SseFrame> {
        let block = std::mem::take(&mut self.buffer);
        parse_block(&block).into_iter().collect()
    }
}

fn parse_block(block: &str) -> Option<SseFrame> {
    let mut data: Option<String> = None;
    for line in block.lines() {
        let Some(value) = line.strip_prefix("data:") else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match data.as_mut() {
            Some(data) => {
                data.push('\n');
                data.push_str(value);
            }
            None => data = Some(value.to_string()),
        }
    }

    match data? {
        data if data.trim() == "[DONE]" => Some(SseFrame::Done),
        data => Some(SseFrame::Data(data)),
    }
}
