//! Lexer for the text instruction language.
//!
//! The lexer is an iterator producing classified tokens lazily. It never
//! fails: input that fits no category becomes an [`TokenKind::Error`] token,
//! and it is up to the parser to reject it. Comments and whitespace are
//! produced as tokens too; [`TokenStream`](super::TokenStream) drops them.
//!
//! # Example
//!
//! ```
//! use watc::wat::{Lexer, TokenKind};
//!
//! let kinds: Vec<_> = Lexer::new("(i32.const 0x2a)")
//!     .map(|t| t.kind)
//!     .filter(|k| !k.is_trivia())
//!     .collect();
//! assert_eq!(
//!     kinds,
//!     [TokenKind::LeftParen, TokenKind::Instr, TokenKind::Hex, TokenKind::RightParen, TokenKind::Eof]
//! );
//! ```

use super::cursor::{Cursor, Position};
use super::token::{Token, TokenKind};

/// Keywords lexed as [`TokenKind::Reserved`], alone or followed by `=`.
const RESERVED_WORDS: [&str; 4] = ["offset", "align", "shared", "funcref"];

// ============================================================================
// Lexer
// ============================================================================

/// Lexer over a source string.
///
/// Yields every token, trivia included, followed by exactly one
/// [`TokenKind::Eof`] token.
pub struct Lexer<'a> {
    cursor: Cursor<'a>,
    done: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source text.
    pub fn new(source: &'a str) -> Self {
        Self {
            cursor: Cursor::new(source),
            done: false,
        }
    }

    /// Tokenise the entire source.
    pub fn tokenise(source: &'a str) -> Vec<Token<'a>> {
        Lexer::new(source).collect()
    }

    fn token(&self, kind: TokenKind, value: &'a str, start: Position) -> Token<'a> {
        Token::new(kind, value, start.span_to(&self.cursor.position()))
    }

    /// Token covering everything consumed since `start`.
    fn token_from(&self, kind: TokenKind, start: Position) -> Token<'a> {
        self.token(kind, self.cursor.slice_from(&start), start)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let start = self.cursor.position();
        let token = match (self.cursor.peek(), self.cursor.peek_second()) {
            (None, _) => {
                self.done = true;
                self.token(TokenKind::Eof, "", start)
            }
            (Some(c), _) if c.is_whitespace() => {
                self.cursor.skip_while(char::is_whitespace);
                self.token_from(TokenKind::Whitespace, start)
            }
            (Some(';'), Some(';')) => {
                self.cursor.skip_while(|c| c != '\n');
                self.token_from(TokenKind::Comment, start)
            }
            (Some('('), Some(';')) => self.lex_block_comment(start),
            (Some('('), _) => {
                self.cursor.advance();
                self.token_from(TokenKind::LeftParen, start)
            }
            (Some(')'), _) => {
                self.cursor.advance();
                self.token_from(TokenKind::RightParen, start)
            }
            (Some('"'), _) => self.lex_string(start),
            (Some('$'), _) => self.lex_label(start),
            (Some(c), _) if is_idchar(c) => self.lex_atom(start),
            (Some(_), _) => {
                self.cursor.advance();
                self.token_from(TokenKind::Error, start)
            }
        };

        Some(token)
    }
}

// ============================================================================
// Comments and strings
// ============================================================================

impl<'a> Lexer<'a> {
    /// Lex a `(; ... ;)` comment, honouring nesting. An unterminated comment
    /// swallows the rest of the input as an error token.
    fn lex_block_comment(&mut self, start: Position) -> Token<'a> {
        self.cursor.advance();
        self.cursor.advance();

        let mut depth = 1;
        while depth > 0 {
            match (self.cursor.peek(), self.cursor.peek_second()) {
                (None, _) => return self.token_from(TokenKind::Error, start),
                (Some('('), Some(';')) => {
                    self.cursor.advance();
                    self.cursor.advance();
                    depth += 1;
                }
                (Some(';'), Some(')')) => {
                    self.cursor.advance();
                    self.cursor.advance();
                    depth -= 1;
                }
                _ => {
                    self.cursor.advance();
                }
            }
        }

        self.token_from(TokenKind::Comment, start)
    }

    /// Lex a string literal. The value is the raw text between the quotes;
    /// escapes are decoded by the parser.
    fn lex_string(&mut self, start: Position) -> Token<'a> {
        self.cursor.advance();
        let body = self.cursor.position();

        loop {
            match self.cursor.peek() {
                None => return self.token_from(TokenKind::Error, start),
                Some('"') => break,
                Some('\\') => {
                    self.cursor.advance();
                    self.cursor.advance();
                }
                Some(_) => {
                    self.cursor.advance();
                }
            }
        }

        let value = self.cursor.slice_from(&body);
        self.cursor.advance();
        self.token(TokenKind::String, value, start)
    }
}

// ============================================================================
// Labels and atoms
// ============================================================================

impl<'a> Lexer<'a> {
    fn lex_label(&mut self, start: Position) -> Token<'a> {
        self.cursor.advance();
        let name = self.cursor.take_while(is_idchar);
        if name.is_empty() {
            return self.token_from(TokenKind::Error, start);
        }
        self.token(TokenKind::Label, name, start)
    }

    /// Lex a run of identifier characters and classify it.
    ///
    /// Reserved words stop after their `=` so the attached value lexes as its
    /// own token: `offset=8` is `Reserved("offset=")` then `Number("8")`.
    fn lex_atom(&mut self, start: Position) -> Token<'a> {
        let rest = self.cursor.rest();
        let atom_len = rest.find(|c: char| !is_idchar(c)).unwrap_or(rest.len());
        let atom = &rest[..atom_len];

        let (kind, len) = classify_atom(atom);
        self.cursor.advance_bytes(len);
        self.token_from(kind, start)
    }
}

/// Classify an atom, returning its kind and how many of its bytes belong to
/// the token.
fn classify_atom(atom: &str) -> (TokenKind, usize) {
    for word in RESERVED_WORDS {
        if let Some(after) = atom.strip_prefix(word) {
            if after.is_empty() {
                return (TokenKind::Reserved, word.len());
            }
            if after.starts_with('=') {
                return (TokenKind::Reserved, word.len() + 1);
            }
        }
    }

    let unsigned = atom.strip_prefix(&['+', '-'][..]).unwrap_or(atom);
    let kind = if unsigned.starts_with("0x") || unsigned.starts_with("0X") || unsigned.starts_with("nan:0x") {
        TokenKind::Hex
    } else if unsigned.starts_with(|c: char| c.is_ascii_digit()) || unsigned == "inf" || unsigned == "nan" {
        TokenKind::Number
    } else if unsigned.len() == atom.len() && atom.starts_with(|c: char| c.is_ascii_lowercase()) {
        TokenKind::Instr
    } else {
        TokenKind::Error
    };
    (kind, atom.len())
}

/// Check if a character is valid in an identifier or keyword.
///
/// The set is deliberately permissive so names like `$add/sub` or `$a.b.c`
/// and keywords like `i64.extend_i32_u` lex as a single token.
fn is_idchar(c: char) -> bool {
    matches!(
        c,
        '0'..='9'
            | 'a'..='z'
            | 'A'..='Z'
            | '!'
            | '#'
            | '$'
            | '%'
            | '&'
            | '\''
            | '*'
            | '+'
            | '-'
            | '.'
            | '/'
            | ':'
            | '<'
            | '='
            | '>'
            | '?'
            | '@'
            | '\\'
            | '^'
            | '_'
            | '`'
            | '|'
            | '~'
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Tokenise and return the non-trivia kinds, without the trailing Eof.
    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut kinds: Vec<_> = Lexer::new(source)
            .map(|t| t.kind)
            .filter(|k| !k.is_trivia())
            .collect();
        assert_eq!(kinds.pop(), Some(TokenKind::Eof));
        kinds
    }

    /// Tokenise and return (kind, value) for non-trivia tokens, without Eof.
    fn values(source: &str) -> Vec<(TokenKind, &str)> {
        Lexer::new(source)
            .filter(|t| !t.kind.is_trivia() && t.kind != TokenKind::Eof)
            .map(|t| (t.kind, t.value))
            .collect()
    }

    use TokenKind::*;

    #[test]
    fn empty_input() {
        let tokens = Lexer::tokenise("");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, Eof);
    }

    #[test]
    fn parens_and_whitespace() {
        assert_eq!(kinds("( ) \n\t()"), vec![LeftParen, RightParen, LeftParen, RightParen]);
        let all: Vec<_> = Lexer::new("( )").map(|t| t.kind).collect();
        assert_eq!(all, vec![LeftParen, Whitespace, RightParen, Eof]);
    }

    #[test]
    fn instructions_and_labels() {
        assert_eq!(
            values("(func $add i32.add local.get)"),
            vec![
                (LeftParen, "("),
                (Instr, "func"),
                (Label, "add"),
                (Instr, "i32.add"),
                (Instr, "local.get"),
                (RightParen, ")"),
            ]
        );
    }

    #[test]
    fn label_with_special_chars() {
        assert_eq!(values("$a/b.c_1"), vec![(Label, "a/b.c_1")]);
        assert_eq!(values("$0"), vec![(Label, "0")]);
    }

    #[test]
    fn bare_dollar_is_error() {
        assert_eq!(values("$ x"), vec![(Error, "$"), (Instr, "x")]);
    }

    #[test]
    fn line_comments_are_trivia() {
        let tokens = Lexer::tokenise(";; hello\nnop");
        assert_eq!(tokens[0].kind, Comment);
        assert_eq!(tokens[0].value, ";; hello");
        assert_eq!(kinds(";; hello\nnop ;; trailing"), vec![Instr]);
    }

    #[test]
    fn block_comments_nest() {
        assert_eq!(kinds("(; outer (; inner ;) still ;) nop"), vec![Instr]);
    }

    #[test]
    fn unterminated_block_comment_is_error() {
        assert_eq!(kinds("nop (; never closed"), vec![Instr, Error]);
    }

    #[test]
    fn strings_keep_raw_escapes() {
        assert_eq!(values(r#""hello""#), vec![(String, "hello")]);
        assert_eq!(values(r#""a\"b""#), vec![(String, r#"a\"b"#)]);
        assert_eq!(values(r#""\00\ff""#), vec![(String, r"\00\ff")]);
        assert_eq!(values(r#""""#), vec![(String, "")]);
    }

    #[test]
    fn adjacent_strings() {
        assert_eq!(values(r#""a""b""#), vec![(String, "a"), (String, "b")]);
    }

    #[test]
    fn unterminated_string_is_error() {
        assert_eq!(kinds("\"open"), vec![Error]);
        assert_eq!(kinds("\"open\\\""), vec![Error]);
    }

    #[test]
    fn numbers() {
        assert_eq!(
            values("0 42 -7 +3 1_000 1.5 -2.5e10 inf -inf nan +nan"),
            vec![
                (Number, "0"),
                (Number, "42"),
                (Number, "-7"),
                (Number, "+3"),
                (Number, "1_000"),
                (Number, "1.5"),
                (Number, "-2.5e10"),
                (Number, "inf"),
                (Number, "-inf"),
                (Number, "nan"),
                (Number, "+nan"),
            ]
        );
    }

    #[test]
    fn hex_literals() {
        assert_eq!(
            values("0x2A -0xff 0x1.8p3 nan:0x200000 -nan:0x1 0xFF_FF"),
            vec![
                (Hex, "0x2A"),
                (Hex, "-0xff"),
                (Hex, "0x1.8p3"),
                (Hex, "nan:0x200000"),
                (Hex, "-nan:0x1"),
                (Hex, "0xFF_FF"),
            ]
        );
    }

    #[test]
    fn reserved_words_split_at_equals() {
        assert_eq!(
            values("offset=8 align=0x4 shared funcref"),
            vec![
                (Reserved, "offset="),
                (Number, "8"),
                (Reserved, "align="),
                (Hex, "0x4"),
                (Reserved, "shared"),
                (Reserved, "funcref"),
            ]
        );
    }

    #[test]
    fn reserved_prefix_is_not_reserved() {
        // `offsets` is an ordinary keyword, not `offset` + junk.
        assert_eq!(values("offsets"), vec![(Instr, "offsets")]);
    }

    #[test]
    fn offset_as_form_head() {
        assert_eq!(kinds("(offset (i32.const 0))"), vec![LeftParen, Reserved, LeftParen, Instr, Number, RightParen, RightParen]);
    }

    #[test]
    fn unclassifiable_input() {
        assert_eq!(values("{"), vec![(Error, "{")]);
        assert_eq!(values("Foo"), vec![(Error, "Foo")]);
        assert_eq!(values("+x"), vec![(Error, "+x")]);
        assert_eq!(values("; nop"), vec![(Error, ";"), (Instr, "nop")]);
    }

    #[test]
    fn token_positions() {
        let tokens: Vec<_> = Lexer::new("(module\n  (func))")
            .filter(|t| !t.kind.is_trivia())
            .collect();
        assert_eq!(tokens[0].span.start, 0);
        assert_eq!(tokens[1].span.start, 1);
        assert_eq!(tokens[2].span.line, 2);
        assert_eq!(tokens[2].span.column, 3);
        assert_eq!(tokens[3].value, "func");
        assert_eq!(tokens[3].span.column, 4);
    }

    // ========================================================================
    // Property-based tests
    // ========================================================================

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// The lexer must never panic on arbitrary input.
            #[test]
            fn never_panics(source in "\\PC{0,500}") {
                for token in Lexer::new(&source) {
                    let _ = token;
                }
            }

            /// Tokens tile the input: each starts where the previous ended
            /// and the last one is Eof at the end of input.
            #[test]
            fn tokens_cover_source(source in "\\PC{0,200}") {
                let tokens = Lexer::tokenise(&source);
                let mut offset = 0;
                for token in &tokens {
                    prop_assert_eq!(token.span.start, offset);
                    prop_assert!(token.span.end >= token.span.start);
                    offset = token.span.end;
                }
                prop_assert_eq!(offset, source.len());
                prop_assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
            }

            /// Only the final token is Eof.
            #[test]
            fn single_eof(source in "[a-z0-9$()\" ;=]{0,100}") {
                let eofs = Lexer::new(&source).filter(|t| t.kind == TokenKind::Eof).count();
                prop_assert_eq!(eofs, 1);
            }

            /// Labels extracted via text() are '$' + the value.
            #[test]
            fn label_text_matches(source in "\\$[a-z_][a-z0-9_]{0,10}( \\$[a-z_][a-z0-9_]{0,10}){0,5}") {
                for token in Lexer::new(&source) {
                    if token.kind == TokenKind::Label {
                        let expected = format!("${}", token.value);
                        prop_assert_eq!(token.text(&source), expected.as_str());
                    }
                }
            }

            /// Line numbers must be monotonically non-decreasing.
            #[test]
            fn line_numbers_increase(source in "[a-z0-9()\\n ]{0,100}") {
                let mut last_line = 0u32;
                for token in Lexer::new(&source) {
                    prop_assert!(token.span.line >= last_line);
                    last_line = token.span.line;
                }
            }
        }
    }
}
