//! Token types for the text lexer.
//!
//! Tokens borrow their text from the source. Every token is one of a small,
//! closed set of kinds: the lexer only classifies, it never interprets values.

use std::fmt;

/// A location in source text.
///
/// Spans track both byte offsets (for slicing) and line/column (for errors).
/// Columns count Unicode characters, not bytes, for accurate display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Byte offset where this span starts.
    pub start: usize,
    /// Byte offset just past the end of this span.
    pub end: usize,
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed, counting characters not bytes).
    pub column: u32,
}

impl Span {
    /// A zero-length span at the start of source, for errors without position.
    pub const ZERO: Span = Span {
        start: 0,
        end: 0,
        line: 1,
        column: 1,
    };

    /// Create a new span.
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// The length of this span in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether this span is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// A span covering both `self` and `other`, positioned at `self`.
    #[must_use]
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start, other.end.max(self.end), self.line, self.column)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `;; line` or `(; block ;)` comment.
    Comment,
    /// A double-quoted string literal. The value excludes the quotes and
    /// still contains its escape sequences.
    String,
    /// One of the reserved parameter keywords `offset`, `align`, `shared`
    /// or `funcref`, including a trailing `=` when present.
    Reserved,
    /// A hexadecimal literal: `0x1F`, `-0x1.8p3`, `nan:0x200000`.
    Hex,
    /// A decimal number, or one of `inf`/`nan` with an optional sign.
    Number,
    /// A bare keyword starting with a lowercase letter: `module`, `i32.add`.
    Instr,
    /// A `$name` reference. The value excludes the `$`.
    Label,
    /// Opening parenthesis `(`.
    LeftParen,
    /// Closing parenthesis `)`.
    RightParen,
    /// A run of whitespace.
    Whitespace,
    /// Input that fits no other category.
    Error,
    /// End of input. Produced once, after the last real token.
    Eof,
}

impl TokenKind {
    /// Whether the parser never sees tokens of this kind.
    #[must_use]
    pub fn is_trivia(self) -> bool {
        matches!(self, TokenKind::Comment | TokenKind::Whitespace)
    }

    /// Name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Comment => "comment",
            TokenKind::String => "string",
            TokenKind::Reserved => "reserved word",
            TokenKind::Hex => "hex literal",
            TokenKind::Number => "number",
            TokenKind::Instr => "instruction",
            TokenKind::Label => "label",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::Whitespace => "whitespace",
            TokenKind::Error => "invalid token",
            TokenKind::Eof => "end of input",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A lexical token with its location in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// What kind of token this is.
    pub kind: TokenKind,
    /// The token's value: its source text, minus quotes for strings and the
    /// `$` sigil for labels.
    pub value: &'a str,
    /// Where in the source this token appears.
    pub span: Span,
}

impl<'a> Token<'a> {
    /// Create a new token.
    pub fn new(kind: TokenKind, value: &'a str, span: Span) -> Self {
        Self { kind, value, span }
    }

    /// Get the original source text for this token.
    ///
    /// # Example
    ///
    /// ```
    /// use watc::wat::{Lexer, TokenKind};
    ///
    /// let source = "(module $m)";
    /// let tokens = Lexer::tokenise(source);
    /// assert_eq!(tokens[3].kind, TokenKind::Label);
    /// assert_eq!(tokens[3].value, "m");
    /// assert_eq!(tokens[3].text(source), "$m");
    /// ```
    #[must_use]
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        &source[self.span.start..self.span.end]
    }

    /// Whether this token has the given kind and value.
    #[must_use]
    pub fn is(&self, kind: TokenKind, value: &str) -> bool {
        self.kind == kind && self.value == value
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "end of input at {}", self.span),
            TokenKind::Label => write!(f, "${} at {}", self.value, self.span),
            TokenKind::String => write!(f, "\"{}\" at {}", self.value, self.span),
            _ => write!(f, "{} at {}", self.value, self.span),
        }
    }
}
