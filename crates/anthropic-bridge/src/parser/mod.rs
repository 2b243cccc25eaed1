//! Incremental parser for streamed tool-call payloads.
//!
//! [`IncrementalParser`] is fed the argument text of one tool call as the
//! backend produces it. After every chunk it reports whether the document is
//! complete, the partially built [`Value`], the slice of input that is new
//! since the previous call, and whatever could be learned about the tool so
//! far.
//!
//! Only objects and arrays are accepted at the root: tool payloads are never
//! bare scalars, and a scalar root would have no closing delimiter to mark
//! completeness.
//!
//! # Examples
//!
//! ```rust
//! use anthropic_bridge::{IncrementalParser, ParserOptions, Value, path};
//!
//! let mut parser = IncrementalParser::new(ParserOptions::default());
//!
//! let first = parser.feed(r#"{"name": "read_file", "input": {"pa"#).unwrap();
//! assert!(!first.is_complete);
//! assert_eq!(first.tool_info.unwrap().name, "read_file");
//!
//! let second = parser.feed(r#"th": "a.txt"}}"#).unwrap();
//! assert!(second.is_complete);
//! assert_eq!(second.delta, r#"th": "a.txt"}}"#);
//! assert_eq!(
//!     parser.get_field(&path!["input", "path"]),
//!     Some(&Value::String("a.txt".into()))
//! );
//! ```

mod detect;

use std::time::Instant;

pub use detect::ToolInfo;
use detect::ToolDetector;
use tracing::trace;

use crate::{
    error::{ErrorSource, LimitError, ParserError, SyntaxError},
    options::ParserOptions,
    path::PathItem,
    tokenizer::{Token, Tokenizer},
    value::{Map, Value},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Initial,
    InObject,
    InArray,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectStep {
    KeyOrEnd,
    Colon,
    Value,
    CommaOrEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayStep {
    ValueOrEnd,
    CommaOrEnd,
}

/// Stack entry – one per open container
#[derive(Debug, Clone)]
enum Frame {
    Object {
        pending_key: Option<String>, // key waiting for its value
        step: ObjectStep,
    },
    Array {
        step: ArrayStep,
    },
}

impl Frame {
    fn new_object_frame() -> Self {
        Frame::Object {
            pending_key: None,
            step: ObjectStep::KeyOrEnd,
        }
    }

    fn new_array_frame() -> Self {
        Frame::Array {
            step: ArrayStep::ValueOrEnd,
        }
    }

    fn state(&self) -> ParseState {
        match self {
            Frame::Object { .. } => ParseState::InObject,
            Frame::Array { .. } => ParseState::InArray,
        }
    }

    /// Marks the value slot as filled.
    fn value_done(&mut self) {
        match self {
            Frame::Object { pending_key, step } => {
                *pending_key = None;
                *step = ObjectStep::CommaOrEnd;
            }
            Frame::Array { step } => *step = ArrayStep::CommaOrEnd,
        }
    }
}

/// The outcome of one [`IncrementalParser::feed`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult<'a> {
    pub is_complete: bool,
    /// The document as parsed so far; `None` until the root container opens.
    pub object: Option<&'a Value>,
    /// Input not returned by any earlier call.
    pub delta: &'a str,
    /// Byte offset of `delta` in the cumulative input.
    pub delta_start: usize,
    pub delta_end: usize,
    pub tool_info: Option<ToolInfo>,
}

#[derive(Debug)]
pub struct IncrementalParser {
    options: ParserOptions,
    tokenizer: Tokenizer,

    state: ParseState,
    frames: Vec<Frame>,
    /// Where each nested container lives inside its parent; one entry per
    /// frame except the root.
    handles: Vec<PathItem>,
    root: Option<Value>,

    /// Sanitized input seen so far.
    raw: String,
    delta_start: usize,
    delta_end: usize,
    started_at: Option<Instant>,

    detector: ToolDetector,
    tool_info: Option<ToolInfo>,
}

impl Default for IncrementalParser {
    fn default() -> Self {
        Self::new(ParserOptions::default())
    }
}

impl IncrementalParser {
    #[must_use]
    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            tokenizer: Tokenizer::new(options.max_buffer_size),
            state: ParseState::Initial,
            frames: Vec::with_capacity(16),
            handles: Vec::with_capacity(16),
            root: None,
            raw: String::new(),
            delta_start: 0,
            delta_end: 0,
            started_at: None,
            detector: ToolDetector::default(),
            tool_info: None,
        }
    }

    /// Feeds a chunk of raw payload text.
    ///
    /// C0 control characters other than `\n`, `\r` and `\t` are stripped
    /// before anything else sees the chunk. A number or keyword at the very
    /// end of the chunk stays open, since the next chunk may extend it; call
    /// [`IncrementalParser::finish`] when no more input will come.
    ///
    /// # Errors
    ///
    /// Lexical, structural and limit errors. Before returning one, the parser
    /// drops its tokenizer state, open containers and partial document; the
    /// raw input record and tool detection survive until
    /// [`IncrementalParser::reset`].
    pub fn feed(&mut self, chunk: &str) -> Result<ParseResult<'_>, ParserError> {
        let started_at = *self.started_at.get_or_insert_with(Instant::now);
        if started_at.elapsed() > self.options.parse_timeout {
            let err = self.error(LimitError::Timeout(self.options.parse_timeout).into());
            self.reset_structure();
            return Err(err);
        }

        let sanitized: String = chunk.chars().filter(|c| !is_stripped_control(*c)).collect();
        self.raw.push_str(&sanitized);

        let consumed = sanitized
            .chars()
            .try_for_each(|c| self.consume_char(c))
            .and_then(|()| self.drain_pending());
        if let Err(err) = consumed {
            self.reset_structure();
            return Err(err);
        }

        self.tool_info = self
            .detector
            .detect(&self.raw, &sanitized, self.root.as_ref());
        Ok(self.result())
    }

    /// Ends the input, finalizing a trailing number or keyword.
    ///
    /// # Errors
    ///
    /// Fails if the trailing token is malformed; the parser is reset the same
    /// way as for [`IncrementalParser::feed`].
    pub fn finish(&mut self) -> Result<ParseResult<'_>, ParserError> {
        loop {
            let flushed = self.tokenizer.flush().and_then(|token| match token {
                Some(token) => self.process(token).map(|()| true),
                None => Ok(false),
            });
            match flushed {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => {
                    self.reset_structure();
                    return Err(err);
                }
            }
        }
        self.tool_info = self.detector.detect(&self.raw, "", self.root.as_ref());
        Ok(self.result())
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state == ParseState::Complete
    }

    /// The document parsed so far.
    #[must_use]
    pub fn current_object(&self) -> Option<&Value> {
        self.root.as_ref()
    }

    /// Looks up a value in the partial document.
    #[must_use]
    pub fn get_field(&self, path: &[PathItem]) -> Option<&Value> {
        self.root.as_ref()?.pointer(path)
    }

    /// The delta returned by the most recent `feed` or `finish`.
    #[must_use]
    pub fn get_delta(&self) -> &str {
        &self.raw[self.delta_start..self.delta_end]
    }

    /// All sanitized input seen so far.
    #[must_use]
    pub fn raw_input(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn tool_info(&self) -> Option<&ToolInfo> {
        self.tool_info.as_ref()
    }

    /// Makes the parser ready for a new document, clearing input, deadline and
    /// tool detection as well as the parse state.
    pub fn reset(&mut self) {
        self.reset_structure();
        self.raw.clear();
        self.delta_start = 0;
        self.delta_end = 0;
        self.started_at = None;
        self.detector.reset();
        self.tool_info = None;
    }

    fn reset_structure(&mut self) {
        self.tokenizer.reset();
        self.state = ParseState::Initial;
        self.frames.clear();
        self.handles.clear();
        self.root = None;
    }

    fn result(&mut self) -> ParseResult<'_> {
        self.delta_start = self.delta_end;
        self.delta_end = self.raw.len();
        ParseResult {
            is_complete: self.is_complete(),
            object: self.root.as_ref(),
            delta: &self.raw[self.delta_start..self.delta_end],
            delta_start: self.delta_start,
            delta_end: self.delta_end,
            tool_info: self.tool_info.clone(),
        }
    }

    fn consume_char(&mut self, c: char) -> Result<(), ParserError> {
        self.drain_pending()?;
        // Trailing text after the closing delimiter is recorded, never lexed.
        if self.is_complete() {
            return Ok(());
        }
        match self.tokenizer.next_token(c)? {
            Some(token) => self.process(token),
            None => Ok(()),
        }
    }

    fn drain_pending(&mut self) -> Result<(), ParserError> {
        while let Some(token) = self.tokenizer.take_pending() {
            self.process(token)?;
        }
        Ok(())
    }

    fn process(&mut self, token: Token) -> Result<(), ParserError> {
        let processed = match self.state {
            ParseState::Initial => self.process_initial(token),
            ParseState::InObject | ParseState::InArray => self.process_in_container(token),
            ParseState::Complete => {
                trace!(%token, "ignoring token after complete document");
                Ok(())
            }
        };
        processed.map_err(|source| self.error(source))
    }

    fn process_initial(&mut self, token: Token) -> Result<(), ErrorSource> {
        match token {
            Token::Punctuator(b'{') => {
                self.root = Some(Value::Object(Map::new()));
                self.push_frame(Frame::new_object_frame())
            }
            Token::Punctuator(b'[') => {
                self.root = Some(Value::Array(Vec::new()));
                self.push_frame(Frame::new_array_frame())
            }
            token => Err(unexpected(&token)),
        }
    }

    fn process_in_container(&mut self, token: Token) -> Result<(), ErrorSource> {
        let Some(frame) = self.frames.last_mut() else {
            return Err(unexpected(&token));
        };

        match frame {
            Frame::Object { pending_key, step } => match (*step, token) {
                (ObjectStep::KeyOrEnd, Token::String(key)) => {
                    *pending_key = Some(key);
                    *step = ObjectStep::Colon;
                    Ok(())
                }
                (ObjectStep::KeyOrEnd | ObjectStep::CommaOrEnd, Token::Punctuator(b'}')) => {
                    self.close_container();
                    Ok(())
                }
                (ObjectStep::Colon, Token::Punctuator(b':')) => {
                    *step = ObjectStep::Value;
                    Ok(())
                }
                (ObjectStep::CommaOrEnd, Token::Punctuator(b',')) => {
                    *step = ObjectStep::KeyOrEnd;
                    Ok(())
                }
                (ObjectStep::Value, token) => self.process_value(token),
                (_, token) => Err(unexpected(&token)),
            },
            Frame::Array { step } => match (*step, token) {
                (ArrayStep::ValueOrEnd | ArrayStep::CommaOrEnd, Token::Punctuator(b']')) => {
                    self.close_container();
                    Ok(())
                }
                (ArrayStep::CommaOrEnd, Token::Punctuator(b',')) => {
                    *step = ArrayStep::ValueOrEnd;
                    Ok(())
                }
                (ArrayStep::ValueOrEnd, token) => self.process_value(token),
                (_, token) => Err(unexpected(&token)),
            },
        }
    }

    /// Stores a value in the slot the top frame is waiting to fill.
    fn process_value(&mut self, token: Token) -> Result<(), ErrorSource> {
        let (value, frame) = match token {
            Token::String(s) => (Value::String(s), None),
            Token::Number(n) => (Value::Number(n), None),
            Token::Boolean(b) => (Value::Boolean(b), None),
            Token::Null => (Value::Null, None),
            Token::Punctuator(b'{') => (Value::Object(Map::new()), Some(Frame::new_object_frame())),
            Token::Punctuator(b'[') => (Value::Array(Vec::new()), Some(Frame::new_array_frame())),
            token @ Token::Punctuator(_) => return Err(unexpected(&token)),
        };

        let handle = self.store(value)?;
        if let Some(top) = self.frames.last_mut() {
            top.value_done();
        }
        if let Some(frame) = frame {
            self.handles.push(handle);
            self.push_frame(frame)?;
        }
        Ok(())
    }

    /// Inserts `value` into the current container and returns its handle.
    fn store(&mut self, value: Value) -> Result<PathItem, ErrorSource> {
        let key = match self.frames.last_mut() {
            Some(Frame::Object { pending_key, .. }) => pending_key.take(),
            _ => None,
        };
        let container = self
            .root
            .as_mut()
            .and_then(|root| root.pointer_mut(&self.handles));

        match (container, key) {
            (Some(Value::Object(map)), Some(key)) => {
                map.insert(key.clone(), value);
                Ok(PathItem::Key(key))
            }
            (Some(Value::Array(items)), _) => {
                items.push(value);
                Ok(PathItem::Index(items.len() - 1))
            }
            (Some(Value::Object(_)), None) => {
                Err(ErrorSource::Corrupted("object value without a key"))
            }
            _ => Err(ErrorSource::Corrupted("no open container for value")),
        }
    }

    fn push_frame(&mut self, frame: Frame) -> Result<(), ErrorSource> {
        if self.frames.len() >= self.options.max_nesting_depth {
            return Err(LimitError::NestingTooDeep {
                max: self.options.max_nesting_depth,
            }
            .into());
        }
        self.state = frame.state();
        self.frames.push(frame);
        Ok(())
    }

    fn close_container(&mut self) {
        self.frames.pop();
        match self.frames.last() {
            None => self.state = ParseState::Complete,
            Some(parent) => {
                self.handles.pop();
                self.state = parent.state();
            }
        }
    }

    fn error(&self, source: ErrorSource) -> ParserError {
        let (line, column) = self.tokenizer.position();
        ParserError::new(source, line, column)
    }
}

fn unexpected(token: &Token) -> ErrorSource {
    SyntaxError::UnexpectedToken(token.to_string()).into()
}

fn is_stripped_control(c: char) -> bool {
    c.is_ascii_control() && !matches!(c, '\n' | '\r' | '\t' | '\u{7f}')
}
