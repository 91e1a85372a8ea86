//! Token cursor used by the parser.
//!
//! Wraps the [`Lexer`] with trivia skipping and the lookahead primitives the
//! recursive-descent parser is written against: `peek`, `accept` and
//! `expect`, each optionally constrained to a token value.

use super::error::ParseError;
use super::lexer::Lexer;
use super::token::{Token, TokenKind};

/// A restartable cursor over the significant tokens of a source.
///
/// Holds the current token and one token of extra lookahead.
pub struct TokenStream<'a> {
    source: &'a str,
    lexer: Lexer<'a>,
    current: Token<'a>,
    next: Token<'a>,
}

impl<'a> TokenStream<'a> {
    /// Create a stream positioned at the first significant token.
    pub fn new(source: &'a str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = next_significant(&mut lexer);
        let next = next_significant(&mut lexer);
        Self {
            source,
            lexer,
            current,
            next,
        }
    }

    /// Rewind to the first significant token.
    pub fn start(&mut self) {
        *self = TokenStream::new(self.source);
    }

    /// Move past the current token, returning it.
    ///
    /// At end of input the stream stays on the Eof token.
    pub fn advance(&mut self) -> Token<'a> {
        let token = self.current;
        if token.kind != TokenKind::Eof {
            self.current = self.next;
            self.next = next_significant(&mut self.lexer);
        }
        token
    }

    /// The current token.
    pub fn peek(&self) -> &Token<'a> {
        &self.current
    }

    /// The token after the current one.
    pub fn peek_second(&self) -> &Token<'a> {
        &self.next
    }

    /// Whether the current token has the given kind.
    pub fn peek_is(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    /// Whether the current token has the given kind and value.
    pub fn peek_value(&self, kind: TokenKind, value: &str) -> bool {
        self.current.is(kind, value)
    }

    /// Consume the current token if it has the given kind.
    pub fn accept(&mut self, kind: TokenKind) -> Option<Token<'a>> {
        if self.peek_is(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    /// Consume the current token if it has the given kind and value.
    pub fn accept_value(&mut self, kind: TokenKind, value: &str) -> Option<Token<'a>> {
        if self.peek_value(kind, value) {
            Some(self.advance())
        } else {
            None
        }
    }

    /// Consume a token of the given kind or fail.
    pub fn expect(&mut self, kind: TokenKind) -> Result<Token<'a>, ParseError> {
        self.accept(kind)
            .ok_or_else(|| ParseError::expected(kind, None, &self.current))
    }

    /// Consume a token of the given kind and value or fail.
    pub fn expect_value(&mut self, kind: TokenKind, value: &str) -> Result<Token<'a>, ParseError> {
        self.accept_value(kind, value)
            .ok_or_else(|| ParseError::expected(kind, Some(value), &self.current))
    }
}

fn next_significant<'a>(lexer: &mut Lexer<'a>) -> Token<'a> {
    loop {
        match lexer.next() {
            Some(token) if token.kind.is_trivia() => continue,
            Some(token) => return token,
            None => return Token::new(TokenKind::Eof, "", super::token::Span::ZERO),
        }
    }
}
