#![no_main]

use libfuzzer_sys::fuzz_target;

use watc::wat::{Lexer, TokenKind};

fuzz_target!(|data: &[u8]| {
    let source = String::from_utf8_lossy(data);

    // The lexer must always terminate with a single Eof token
    let tokens = Lexer::tokenise(&source);
    assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
});
