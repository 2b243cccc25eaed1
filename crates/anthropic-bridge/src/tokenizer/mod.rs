//! Character-driven JSON lexer.
//!
//! The [`Tokenizer`] is pushed one `char` at a time and knows nothing about
//! JSON structure above the token level. Strings, numbers and keywords may
//! span any number of input chunks: their text is held in a bounded
//! accumulation buffer until the token ends.
//!
//! Numbers and keywords have no closing delimiter of their own, so the
//! character that ends them is also the start of the next token. That next
//! token is parked in a one-slot queue and handed out by the following call to
//! [`Tokenizer::next_token`], [`Tokenizer::take_pending`] or
//! [`Tokenizer::flush`]. While a token is parked the lexer is always idle, so
//! one slot is enough.
//!
//! # Examples
//!
//! ```rust
//! use anthropic_bridge::{Token, Tokenizer};
//!
//! let mut tokenizer = Tokenizer::default();
//! let mut tokens = Vec::new();
//! for c in "[12,true]".chars() {
//!     tokens.extend(tokenizer.next_token(c).unwrap());
//! }
//! tokens.extend(tokenizer.flush().unwrap());
//! assert_eq!(
//!     tokens,
//!     vec![
//!         Token::Punctuator(b'['),
//!         Token::Number(12.0),
//!         Token::Punctuator(b','),
//!         Token::Boolean(true),
//!         Token::Punctuator(b']'),
//!     ]
//! );
//! ```

mod escape_buffer;

use std::fmt;

use escape_buffer::UnicodeEscapeBuffer;

use crate::{
    error::{ErrorSource, LimitError, ParserError, SyntaxError},
    value::write_escaped_string,
};

const REPLACEMENT: char = '\u{FFFD}';

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
    /// Must be one of: `{` `}` `[` `]` `:` `,`
    Punctuator(u8),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::String(s) => {
                f.write_str("\"")?;
                write_escaped_string(s, f)?;
                f.write_str("\"")
            }
            Token::Number(n) => write!(f, "{n}"),
            Token::Boolean(b) => write!(f, "{b}"),
            Token::Null => f.write_str("null"),
            Token::Punctuator(p) => write!(f, "'{}'", *p as char),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LexState {
    #[default]
    Idle,
    InString,
    InNumber,
    InKeyword,
}

#[derive(Debug)]
pub struct Tokenizer {
    state: LexState,
    /// Text of the string, number or keyword being lexed.
    buffer: String,
    max_buffer_size: usize,

    escape: bool,
    unicode_escape: Option<UnicodeEscapeBuffer>,
    high_surrogate: Option<u16>,

    seen_decimal_point: bool,
    seen_exponent: bool,

    pending: Option<Token>,
    poisoned: bool,

    line: usize,
    column: usize,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(crate::ParserOptions::default().max_buffer_size)
    }
}

impl Tokenizer {
    #[must_use]
    pub fn new(max_buffer_size: usize) -> Self {
        Self {
            state: LexState::Idle,
            buffer: String::new(),
            max_buffer_size,
            escape: false,
            unicode_escape: None,
            high_surrogate: None,
            seen_decimal_point: false,
            seen_exponent: false,
            pending: None,
            poisoned: false,
            line: 1,
            column: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> LexState {
        self.state
    }

    /// Line and column of the last character seen, both 1-based.
    #[must_use]
    pub fn position(&self) -> (usize, usize) {
        (self.line, self.column.max(1))
    }

    /// Lexes one character.
    ///
    /// Returns the oldest finished token, if any. When a number or keyword is
    /// terminated by `c`, the token `c` itself produces stays queued.
    ///
    /// # Errors
    ///
    /// Lexical errors and buffer overflows are fatal: every later call fails
    /// with [`ErrorSource::NeedsReset`] until [`Tokenizer::reset`].
    pub fn next_token(&mut self, c: char) -> Result<Option<Token>, ParserError> {
        if self.poisoned {
            return Err(self.error(ErrorSource::NeedsReset));
        }
        self.advance_position(c);

        let queued = self.pending.take();
        let lexed = match self.lex(c) {
            Ok(token) => token,
            Err(source) => return Err(self.fail(source)),
        };

        match queued {
            Some(queued) => {
                debug_assert!(self.pending.is_none(), "queue holds at most one token");
                self.pending = lexed;
                Ok(Some(queued))
            }
            None => Ok(lexed),
        }
    }

    /// Removes the queued token without finalizing anything in flight.
    pub fn take_pending(&mut self) -> Option<Token> {
        self.pending.take()
    }

    /// Ends the input.
    ///
    /// Hands out the queued token first. Otherwise a trailing number or
    /// keyword is treated as complete. An unterminated string yields `None`
    /// and stays buffered, so a later chunk may still close it.
    ///
    /// # Errors
    ///
    /// Fails if the trailing number or keyword is malformed.
    pub fn flush(&mut self) -> Result<Option<Token>, ParserError> {
        if self.poisoned {
            return Err(self.error(ErrorSource::NeedsReset));
        }
        if let Some(token) = self.pending.take() {
            return Ok(Some(token));
        }

        let finished = match self.state {
            LexState::Idle | LexState::InString => return Ok(None),
            LexState::InNumber => self.finish_number(),
            LexState::InKeyword => self.finish_keyword(),
        };
        match finished {
            Ok(token) => Ok(Some(token)),
            Err(source) => Err(self.fail(source)),
        }
    }

    /// Returns the tokenizer to its initial state, keeping its buffer limit.
    pub fn reset(&mut self) {
        *self = Self::new(self.max_buffer_size);
    }

    fn lex(&mut self, c: char) -> Result<Option<Token>, ErrorSource> {
        match self.state {
            LexState::Idle => self.lex_idle(c),
            LexState::InString => self.lex_string(c),
            LexState::InNumber => {
                if self.number_accepts(c) {
                    self.push(c)?;
                    return Ok(None);
                }
                let number = self.finish_number()?;
                self.pending = self.lex_idle(c)?;
                Ok(Some(number))
            }
            LexState::InKeyword => {
                if c.is_ascii_lowercase() {
                    self.push(c)?;
                    return Ok(None);
                }
                let keyword = self.finish_keyword()?;
                self.pending = self.lex_idle(c)?;
                Ok(Some(keyword))
            }
        }
    }

    fn lex_idle(&mut self, c: char) -> Result<Option<Token>, ErrorSource> {
        match c {
            ' ' | '\t' | '\n' | '\r' => Ok(None),
            '{' | '}' | '[' | ']' | ':' | ',' => {
                #[allow(clippy::cast_possible_truncation)]
                Ok(Some(Token::Punctuator(c as u8)))
            }
            '"' => {
                self.begin(LexState::InString);
                Ok(None)
            }
            '0'..='9' | '-' => {
                self.begin(LexState::InNumber);
                self.push(c)?;
                Ok(None)
            }
            't' | 'f' | 'n' => {
                self.begin(LexState::InKeyword);
                self.push(c)?;
                Ok(None)
            }
            c => Err(SyntaxError::InvalidCharacter(c).into()),
        }
    }

    fn lex_string(&mut self, c: char) -> Result<Option<Token>, ErrorSource> {
        if let Some(escape) = self.unicode_escape.as_mut() {
            if let Some(unit) = escape.feed(c)? {
                self.unicode_escape = None;
                self.push_code_unit(unit)?;
            }
            return Ok(None);
        }

        if self.escape {
            self.escape = false;
            let decoded = match c {
                'u' => {
                    self.unicode_escape = Some(UnicodeEscapeBuffer::new());
                    return Ok(None);
                }
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                'b' => '\u{8}',
                'f' => '\u{c}',
                // `"`, `\`, `/` and anything unrecognized stand for themselves.
                other => other,
            };
            self.flush_surrogate()?;
            self.push(decoded)?;
            return Ok(None);
        }

        match c {
            '\\' => {
                self.escape = true;
                Ok(None)
            }
            '"' => {
                self.flush_surrogate()?;
                self.state = LexState::Idle;
                Ok(Some(Token::String(std::mem::take(&mut self.buffer))))
            }
            c => {
                self.flush_surrogate()?;
                self.push(c)?;
                Ok(None)
            }
        }
    }

    fn push_code_unit(&mut self, unit: u16) -> Result<(), ErrorSource> {
        match (self.high_surrogate.take(), unit) {
            (Some(high), 0xDC00..=0xDFFF) => {
                let code = 0x10000 + ((u32::from(high) - 0xD800) << 10) + (u32::from(unit) - 0xDC00);
                self.push(char::from_u32(code).unwrap_or(REPLACEMENT))
            }
            (high, 0xD800..=0xDBFF) => {
                if high.is_some() {
                    self.push(REPLACEMENT)?;
                }
                self.high_surrogate = Some(unit);
                Ok(())
            }
            (high, unit) => {
                if high.is_some() {
                    self.push(REPLACEMENT)?;
                }
                self.push(char::from_u32(u32::from(unit)).unwrap_or(REPLACEMENT))
            }
        }
    }

    /// A high surrogate not followed by its low half decodes to U+FFFD.
    fn flush_surrogate(&mut self) -> Result<(), ErrorSource> {
        if self.high_surrogate.take().is_some() {
            self.push(REPLACEMENT)?;
        }
        Ok(())
    }

    fn number_accepts(&mut self, c: char) -> bool {
        match c {
            '0'..='9' => true,
            '.' if !self.seen_decimal_point && !self.seen_exponent => {
                self.seen_decimal_point = true;
                true
            }
            'e' | 'E' if !self.seen_exponent => {
                self.seen_exponent = true;
                true
            }
            '+' | '-' => self.buffer.ends_with(['e', 'E']),
            _ => false,
        }
    }

    fn finish_number(&mut self) -> Result<Token, ErrorSource> {
        self.state = LexState::Idle;
        let text = std::mem::take(&mut self.buffer);
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| SyntaxError::InvalidNumber(text).into())
    }

    fn finish_keyword(&mut self) -> Result<Token, ErrorSource> {
        self.state = LexState::Idle;
        let text = std::mem::take(&mut self.buffer);
        match text.as_str() {
            "true" => Ok(Token::Boolean(true)),
            "false" => Ok(Token::Boolean(false)),
            "null" => Ok(Token::Null),
            _ => Err(SyntaxError::InvalidKeyword(text).into()),
        }
    }

    fn begin(&mut self, state: LexState) {
        self.state = state;
        self.buffer.clear();
        self.escape = false;
        self.unicode_escape = None;
        self.high_surrogate = None;
        self.seen_decimal_point = false;
        self.seen_exponent = false;
    }

    fn push(&mut self, c: char) -> Result<(), ErrorSource> {
        if self.buffer.len() + c.len_utf8() > self.max_buffer_size {
            return Err(LimitError::BufferOverflow {
                max: self.max_buffer_size,
            }
            .into());
        }
        self.buffer.push(c);
        Ok(())
    }

    fn advance_position(&mut self, c: char) {
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
    }

    fn fail(&mut self, source: ErrorSource) -> ParserError {
        self.poisoned = true;
        self.error(source)
    }

    fn error(&self, source: ErrorSource) -> ParserError {
        let (line, column) = self.position();
        ParserError::new(source, line, column)
    }
}
