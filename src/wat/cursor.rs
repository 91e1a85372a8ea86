//! Character-level cursor over source text.
//!
//! Tracks byte offset, line and column while the lexer walks the source, so
//! every token and error can carry an exact position.

use super::token::Span;

/// A saved position in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Byte offset from start of source.
    pub offset: usize,
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed, counts characters).
    pub column: u32,
}

impl Position {
    /// Create a span from this position to another position.
    #[must_use]
    pub fn span_to(self, end: &Position) -> Span {
        Span::new(self.offset, end.offset, self.line, self.column)
    }
}

/// A cursor for navigating through source text character by character.
pub struct Cursor<'a> {
    source: &'a str,
    /// Slice of `source` starting at the current position.
    remaining: &'a str,
    offset: usize,
    line: u32,
    column: u32,
}

impl<'a> Cursor<'a> {
    /// Create a new cursor at the start of the source text.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            remaining: source,
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    /// Get the current position.
    pub fn position(&self) -> Position {
        Position {
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    /// The unconsumed rest of the source.
    pub fn rest(&self) -> &'a str {
        self.remaining
    }

    /// Peek at the next character without consuming it.
    pub fn peek(&self) -> Option<char> {
        self.remaining.chars().next()
    }

    /// Peek at the character after the next one.
    pub fn peek_second(&self) -> Option<char> {
        let mut chars = self.remaining.chars();
        chars.next();
        chars.next()
    }

    /// Consume and return the next character, updating line and column.
    pub fn advance(&mut self) -> Option<char> {
        let c = self.remaining.chars().next()?;
        let char_len = c.len_utf8();

        self.remaining = &self.remaining[char_len..];
        self.offset += char_len;

        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        Some(c)
    }

    /// Consume `len` bytes. `len` must fall on a character boundary; any
    /// partial character at the end is consumed whole.
    pub fn advance_bytes(&mut self, len: usize) {
        let target = self.offset + len;
        while self.offset < target && self.advance().is_some() {}
    }

    /// Consume characters while the predicate returns true.
    ///
    /// Returns the number of characters consumed.
    pub fn skip_while(&mut self, predicate: impl Fn(char) -> bool) -> usize {
        let mut count = 0;
        while let Some(c) = self.peek() {
            if !predicate(c) {
                break;
            }
            self.advance();
            count += 1;
        }
        count
    }

    /// Consume characters while the predicate returns true, returning the
    /// consumed text.
    pub fn take_while(&mut self, predicate: impl Fn(char) -> bool) -> &'a str {
        let start = self.position();
        self.skip_while(predicate);
        self.slice_from(&start)
    }

    /// Extract a slice from a position to the current position.
    pub fn slice_from(&self, start: &Position) -> &'a str {
        &self.source[start.offset..self.offset]
    }
}
