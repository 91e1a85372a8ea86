//! Error type for text parsing.

use super::token::{Span, Token, TokenKind};
use std::fmt;

/// A syntax error. Parsing stops at the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct ParseError {
    /// Human-readable description of the error.
    pub message: String,
    /// Location in source where the error occurred.
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    /// Creates an "expected X, found Y" error for `found`.
    ///
    /// `value` narrows the expectation to a specific token text, as in
    /// `expected instruction "end"`.
    pub fn expected(kind: TokenKind, value: Option<&str>, found: &Token<'_>) -> Self {
        let expected = match value {
            Some(v) => format!("{} \"{}\"", kind, v),
            None => kind.to_string(),
        };
        Self::new(
            format!(
                "unexpected token \"{}\": expected {}, found {}",
                found.value, expected, found.kind
            ),
            found.span,
        )
    }

    /// Byte offset of the error in the source.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.span.start
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at line {}, column {} (offset {})",
            self.message, self.span.line, self.span.column, self.span.start
        )
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ParseError::new("unterminated string", Span::new(10, 11, 3, 5));
        assert_eq!(format!("{}", err), "unterminated string at line 3, column 5 (offset 10)");
    }

    #[test]
    fn expected_with_value() {
        let found = Token::new(TokenKind::RightParen, ")", Span::new(4, 5, 1, 5));
        let err = ParseError::expected(TokenKind::Instr, Some("end"), &found);
        assert_eq!(err.message, "unexpected token \")\": expected instruction \"end\", found )");
        assert_eq!(err.offset(), 4);
    }

    #[test]
    fn expected_kind_only() {
        let found = Token::new(TokenKind::Eof, "", Span::new(9, 9, 2, 1));
        let err = ParseError::expected(TokenKind::RightParen, None, &found);
        assert_eq!(err.message, "unexpected token \"\": expected ), found end of input");
    }
}
