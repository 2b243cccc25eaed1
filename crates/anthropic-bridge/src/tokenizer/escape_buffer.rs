//! Accumulates the four hexadecimal digits of a `\uXXXX` escape.
//!
//! The buffer yields a UTF-16 code unit rather than a `char`: surrogate pairs
//! span two escapes, so pairing them up is left to the tokenizer.

use crate::error::SyntaxError;

#[derive(Debug, Default)]
pub(crate) struct UnicodeEscapeBuffer {
    buffer: [u8; 4],
    len: u8,
}

impl UnicodeEscapeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one hexadecimal digit.
    ///
    /// Returns `Ok(None)` until the fourth digit arrives, then the decoded code
    /// unit. A non-hex character is an error.
    pub fn feed(&mut self, c: char) -> Result<Option<u16>, SyntaxError> {
        let Some(digit) = c.to_digit(16) else {
            return Err(SyntaxError::InvalidUnicodeEscapeChar(c));
        };

        #[allow(clippy::cast_possible_truncation)]
        {
            self.buffer[self.len as usize] = digit as u8;
        }
        self.len += 1;

        if self.len < 4 {
            return Ok(None);
        }

        let unit = self
            .buffer
            .iter()
            .fold(0u16, |acc, d| (acc << 4) | u16::from(*d));
        self.len = 0;
        Ok(Some(unit))
    }
}
