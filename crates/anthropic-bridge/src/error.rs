use std::time::Duration;

use thiserror::Error;

/// Fatal error raised by the [`Tokenizer`](crate::Tokenizer) or the
/// [`IncrementalParser`](crate::IncrementalParser).
///
/// Both components must be reset before reuse after returning one of these;
/// the parser does so on its own before handing the error back.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{source} at {line}:{column}")]
pub struct ParserError {
    pub source: ErrorSource,
    pub line: usize,
    pub column: usize,
}

impl ParserError {
    pub(crate) fn new(source: impl Into<ErrorSource>, line: usize, column: usize) -> Self {
        Self {
            source: source.into(),
            line,
            column,
        }
    }

    /// Returns `true` for buffer, nesting and timeout violations.
    #[must_use]
    pub fn is_limit(&self) -> bool {
        matches!(self.source, ErrorSource::Limit(_))
    }

    /// Returns `true` for lexical and structural errors.
    #[must_use]
    pub fn is_syntax(&self) -> bool {
        matches!(self.source, ErrorSource::Syntax(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorSource {
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),
    #[error("limit exceeded: {0}")]
    Limit(#[from] LimitError),
    #[error("used after a fatal error without reset")]
    NeedsReset,
    /// The document and the frame stack disagree; the parser resets.
    #[error("parser state corrupted: {0}")]
    Corrupted(&'static str),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyntaxError {
    #[error("invalid character '{0}'")]
    InvalidCharacter(char),
    #[error("invalid unicode escape sequence at character: '{0}'")]
    InvalidUnicodeEscapeChar(char),
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),
    #[error("invalid keyword '{0}'")]
    InvalidKeyword(String),
    #[error("unexpected token {0}")]
    UnexpectedToken(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LimitError {
    #[error("token buffer exceeded {max} bytes")]
    BufferOverflow { max: usize },
    #[error("nesting depth exceeded {max}")]
    NestingTooDeep { max: usize },
    #[error("parse did not complete within {0:?}")]
    Timeout(Duration),
}
