//! Recursive-descent parser: token stream -> syntax tree.
//!
//! # Grammar
//!
//! ```text
//! expr   ::= label                                  ;; Expr::Ref
//!          | string+                                ;; Expr::Data
//!          | '(' head label? param* expr* param* ')'
//!          | 'block' label? param* expr* 'end' label?
//!          | 'loop'  label? param* expr* 'end' label?
//!          | 'if'    label? param* expr* ('else' label? expr*)? 'end' label?
//!          | instr label? param*
//! param  ::= number | hex | string | label | reserved ('=' (number | hex))?
//! ```
//!
//! A source is either one `(module ...)` form or a sequence of module fields,
//! which is parsed as if wrapped in `(module ...)`.
//!
//! The parser does not know what any instruction means: `(param i32)` is a
//! `param` node with a flat `i32` child, exactly like `(i32.eqz (nop))`.

use super::ast::{Expr, Name, Node, Param, ParamKind, Reserved};
use super::error::ParseError;
use super::stream::TokenStream;
use super::token::{Span, Token, TokenKind};

/// Parse source text into a `module` node.
///
/// # Example
///
/// ```
/// let module = watc::wat::parse("(func $f (result i32) i32.const 1)").unwrap();
/// assert_eq!(module.instr, "module");
/// let func = module.children[0].as_node().unwrap();
/// assert_eq!(func.name.as_ref().unwrap().name, "f");
/// assert_eq!(func.children.len(), 2);
/// ```
pub fn parse(source: &str) -> Result<Node, ParseError> {
    let mut parser = Parser {
        tokens: TokenStream::new(source),
    };
    parser.module()
}

struct Parser<'a> {
    tokens: TokenStream<'a>,
}

impl<'a> Parser<'a> {
    fn module(&mut self) -> Result<Node, ParseError> {
        self.tokens.start();

        let mut forms = Vec::new();
        while !self.tokens.peek_is(TokenKind::Eof) {
            match self.expr()? {
                Some(expr) => forms.push(expr),
                None => return Err(ParseError::expected(TokenKind::LeftParen, None, self.tokens.peek())),
            }
        }

        if forms.len() == 1 && forms[0].is_node("module") {
            if let Some(Expr::Node(module)) = forms.pop() {
                return Ok(module);
            }
        }

        let end = self.tokens.peek().span.end;
        let mut module = Node::new("module", Span::new(0, end, 1, 1));
        module.children = forms;
        Ok(module)
    }

    /// Parse one expression, or return `None` when the current token cannot
    /// start one.
    fn expr(&mut self) -> Result<Option<Expr>, ParseError> {
        if let Some(label) = self.tokens.accept(TokenKind::Label) {
            return Ok(Some(Expr::Ref {
                name: label.value.to_string(),
                span: label.span,
            }));
        }

        if self.tokens.peek_is(TokenKind::String) {
            return self.data().map(Some);
        }

        let open = self.tokens.accept(TokenKind::LeftParen);
        let head = match open {
            Some(_) => self.head()?,
            None => match self.tokens.accept(TokenKind::Instr) {
                Some(token) => token,
                None => return Ok(None),
            },
        };

        let mut node = Node::new(head.value.trim_end_matches('='), head.span);
        node.name = self.tokens.accept(TokenKind::Label).map(|t| Name {
            name: t.value.to_string(),
            span: t.span,
        });
        self.params(&mut node.params)?;

        match open {
            Some(open) => {
                self.children_until(&mut node.children, |_| false)?;
                self.params(&mut node.params)?;
                let close = self.tokens.expect(TokenKind::RightParen)?;
                node.span = open.span.to(close.span);
            }
            None => match node.instr.as_str() {
                "block" | "loop" => self.flat_block(&mut node)?,
                "if" => self.flat_if(&mut node)?,
                "call_indirect" => self.flat_type_use(&mut node)?,
                _ => {}
            },
        }

        Ok(Some(Expr::Node(node)))
    }

    /// The head of a parenthesised form: an instruction, or a reserved word
    /// used as one, as in `(offset (i32.const 0))`.
    fn head(&mut self) -> Result<Token<'a>, ParseError> {
        if let Some(token) = self.tokens.accept(TokenKind::Reserved) {
            return Ok(token);
        }
        self.tokens.expect(TokenKind::Instr)
    }

    /// Consecutive string literals, concatenated into one data expression.
    fn data(&mut self) -> Result<Expr, ParseError> {
        let mut bytes = Vec::new();
        let mut span = self.tokens.peek().span;
        while let Some(token) = self.tokens.accept(TokenKind::String) {
            bytes.extend(decode_string(token.value, token.span)?);
            span = span.to(token.span);
        }
        Ok(Expr::Data { bytes, span })
    }

    /// Greedily consume leaf parameters.
    fn params(&mut self, params: &mut Vec<Param>) -> Result<(), ParseError> {
        loop {
            let token = *self.tokens.peek();
            let kind = match token.kind {
                TokenKind::Number => ParamKind::Number(strip_separators(token.value)),
                TokenKind::Hex => ParamKind::Hex(strip_separators(token.value)),
                TokenKind::String => ParamKind::Str(decode_string(token.value, token.span)?),
                TokenKind::Label => ParamKind::Label(token.value.to_string()),
                TokenKind::Reserved => {
                    self.tokens.advance();
                    params.push(self.reserved(token)?);
                    continue;
                }
                _ => return Ok(()),
            };
            self.tokens.advance();
            params.push(Param {
                kind,
                span: token.span,
            });
        }
    }

    /// A reserved keyword, with its value when written as `key=value`.
    fn reserved(&mut self, token: Token<'a>) -> Result<Param, ParseError> {
        let word = token.value.trim_end_matches('=');
        let key = Reserved::from_word(word)
            .ok_or_else(|| ParseError::new(format!("unknown reserved word: {word}"), token.span))?;

        let mut span = token.span;
        let value = if token.value.ends_with('=') {
            let value = match self.tokens.accept(TokenKind::Number) {
                Some(v) => v,
                None => self.tokens.expect(TokenKind::Hex)?,
            };
            span = span.to(value.span);
            Some(strip_separators(value.value))
        } else {
            None
        };

        Ok(Param {
            kind: ParamKind::Reserved { key, value },
            span,
        })
    }

    /// Parse child expressions until end of input, a token that cannot start
    /// an expression, or a token for which `stop` returns true.
    fn children_until(&mut self, children: &mut Vec<Expr>, stop: impl Fn(&Token<'a>) -> bool) -> Result<(), ParseError> {
        while !self.tokens.peek_is(TokenKind::Eof) && !stop(self.tokens.peek()) {
            match self.expr()? {
                Some(child) => children.push(child),
                None => break,
            }
        }
        Ok(())
    }

    /// Body of a flat `block` or `loop`, through its `end`.
    fn flat_block(&mut self, node: &mut Node) -> Result<(), ParseError> {
        self.children_until(&mut node.children, |t| t.is(TokenKind::Instr, "end"))?;
        let end = self.tokens.expect_value(TokenKind::Instr, "end")?;
        node.span = node.span.to(end.span);
        self.end_label(node)
    }

    /// Body of a flat `if`, split at `else` into synthesized `then` and
    /// `else` children, matching the folded form.
    fn flat_if(&mut self, node: &mut Node) -> Result<(), ParseError> {
        let is_branch_end = |t: &Token<'_>| t.is(TokenKind::Instr, "end") || t.is(TokenKind::Instr, "else");

        let mut body = Vec::new();
        self.children_until(&mut body, is_branch_end)?;

        let (signature, then_body): (Vec<_>, Vec<_>) = body
            .into_iter()
            .partition(|e| e.is_node("result") || e.is_node("param") || e.is_node("type"));
        node.children = signature;

        let mut then = Node::new("then", node.span);
        then.children = then_body;
        node.children.push(Expr::Node(then));

        if let Some(else_token) = self.tokens.accept_value(TokenKind::Instr, "else") {
            self.end_label(node)?;
            let mut otherwise = Node::new("else", else_token.span);
            self.children_until(&mut otherwise.children, |t| t.is(TokenKind::Instr, "end"))?;
            node.children.push(Expr::Node(otherwise));
        }

        let end = self.tokens.expect_value(TokenKind::Instr, "end")?;
        node.span = node.span.to(end.span);
        self.end_label(node)
    }

    /// Attach a flat `call_indirect`'s `(type ...)`, `(param ...)` and
    /// `(result ...)` forms, which would otherwise parse as siblings.
    fn flat_type_use(&mut self, node: &mut Node) -> Result<(), ParseError> {
        loop {
            let second = self.tokens.peek_second();
            let is_type_use = self.tokens.peek_is(TokenKind::LeftParen)
                && second.kind == TokenKind::Instr
                && matches!(second.value, "type" | "param" | "result");
            if !is_type_use {
                return Ok(());
            }
            if let Some(child) = self.expr()? {
                node.span = node.span.to(child.span());
                node.children.push(child);
            }
        }
    }

    /// An optional label after `end` or `else` must repeat the construct's
    /// own label.
    fn end_label(&mut self, node: &Node) -> Result<(), ParseError> {
        let label = match self.tokens.accept(TokenKind::Label) {
            Some(label) => label,
            None => return Ok(()),
        };
        match &node.name {
            Some(name) if name.name == label.value => Ok(()),
            _ => Err(ParseError::new(format!("mismatching label ${}", label.value), label.span)),
        }
    }
}

/// Remove `_` digit-group separators from numeric text.
fn strip_separators(text: &str) -> String {
    text.chars().filter(|&c| c != '_').collect()
}

/// Decode the escape sequences of a string literal's raw text.
fn decode_string(raw: &str, span: Span) -> Result<Vec<u8>, ParseError> {
    let mut bytes = Vec::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }

        let escape = chars
            .next()
            .ok_or_else(|| ParseError::new("unterminated escape sequence", span))?;
        match escape {
            't' => bytes.push(0x09),
            'n' => bytes.push(0x0A),
            'r' => bytes.push(0x0D),
            '"' => bytes.push(0x22),
            '\'' => bytes.push(0x27),
            '\\' => bytes.push(0x5C),
            'u' => {
                let rest = chars.as_str();
                let digits = rest
                    .strip_prefix('{')
                    .and_then(|r| r.split_once('}'))
                    .map(|(digits, _)| digits)
                    .ok_or_else(|| ParseError::new("malformed unicode escape", span))?;
                let c = u32::from_str_radix(digits, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| ParseError::new(format!("invalid unicode escape: \\u{{{digits}}}"), span))?;
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                // Skip "{digits}".
                chars = rest[digits.len() + 2..].chars();
            }
            high if high.is_ascii_hexdigit() => {
                let low = chars
                    .next()
                    .filter(char::is_ascii_hexdigit)
                    .ok_or_else(|| ParseError::new("invalid hex escape", span))?;
                let (high, low) = (hex_value(high), hex_value(low));
                bytes.push((high << 4) | low);
            }
            other => {
                return Err(ParseError::new(format!("invalid escape sequence: \\{other}"), span));
            }
        }
    }

    Ok(bytes)
}

fn hex_value(c: char) -> u8 {
    c.to_digit(16).map_or(0, |d| d as u8)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn node(expr: &Expr) -> &Node {
        expr.as_node().expect("expected a node")
    }

    fn instrs(node: &Node) -> Vec<&str> {
        node.child_nodes().map(|n| n.instr.as_str()).collect()
    }

    #[test]
    fn explicit_module() {
        let module = parse("(module $m (func))").unwrap();
        assert_eq!(module.instr, "module");
        assert_eq!(module.name.as_ref().map(|n| n.name.as_str()), Some("m"));
        assert_eq!(instrs(&module), vec!["func"]);
    }

    #[test]
    fn bare_fields_are_wrapped() {
        let module = parse("(memory 1) (func)").unwrap();
        assert_eq!(module.instr, "module");
        assert_eq!(instrs(&module), vec!["memory", "func"]);
    }

    #[test]
    fn empty_source_is_empty_module() {
        let module = parse("  ;; nothing\n").unwrap();
        assert_eq!(module.instr, "module");
        assert!(module.children.is_empty());
    }

    #[test]
    fn folded_params_and_children() {
        let module = parse(r#"(export "add" (func $add))"#).unwrap();
        let export = node(&module.children[0]);
        assert_eq!(export.params[0].kind, ParamKind::Str(b"add".to_vec()));
        let func = node(&export.children[0]);
        assert_eq!(func.instr, "func");
        assert_eq!(func.name.as_ref().unwrap().name, "add");
    }

    #[test]
    fn trailing_params_after_children() {
        let module = parse(r#"(memory $m (export "mem") 1 2)"#).unwrap();
        let memory = node(&module.children[0]);
        assert_eq!(instrs(memory), vec!["export"]);
        assert_eq!(
            memory.params.iter().map(|p| p.kind.clone()).collect::<Vec<_>>(),
            vec![ParamKind::Number("1".into()), ParamKind::Number("2".into())]
        );
    }

    #[test]
    fn value_types_are_flat_children() {
        let module = parse("(func (param $a i32) (param i64 f32) (result f64))").unwrap();
        let func = node(&module.children[0]);
        let first = node(&func.children[0]);
        assert_eq!(first.name.as_ref().unwrap().name, "a");
        assert_eq!(instrs(first), vec!["i32"]);
        assert_eq!(instrs(node(&func.children[1])), vec!["i64", "f32"]);
    }

    #[test]
    fn flat_instructions_take_params() {
        let module = parse("(func local.get 0 local.get $x i32.add call $f)").unwrap();
        let func = node(&module.children[0]);
        assert_eq!(instrs(func), vec!["local.get", "local.get", "i32.add", "call"]);
        assert_eq!(node(&func.children[0]).params[0].kind, ParamKind::Number("0".into()));
        assert_eq!(node(&func.children[1]).name.as_ref().unwrap().name, "x");
        assert!(node(&func.children[2]).params.is_empty());
        assert_eq!(node(&func.children[3]).name.as_ref().unwrap().name, "f");
    }

    #[test]
    fn flat_block_runs_until_end() {
        let module = parse("(func block $b (result i32) i32.const 1 br $b end $b nop)").unwrap();
        let func = node(&module.children[0]);
        assert_eq!(instrs(func), vec!["block", "nop"]);
        let block = node(&func.children[0]);
        assert_eq!(block.name.as_ref().unwrap().name, "b");
        assert_eq!(instrs(block), vec!["result", "i32.const", "br"]);
    }

    #[test]
    fn nested_flat_blocks() {
        let module = parse("(func loop block br 1 end end)").unwrap();
        let func = node(&module.children[0]);
        let outer = node(&func.children[0]);
        assert_eq!(outer.instr, "loop");
        let inner = node(&outer.children[0]);
        assert_eq!(inner.instr, "block");
        assert_eq!(instrs(inner), vec!["br"]);
    }

    #[test]
    fn mismatched_end_label() {
        let err = parse("(func block $a end $b)").unwrap_err();
        assert_eq!(err.message, "mismatching label $b");
        let err = parse("(func block end $b)").unwrap_err();
        assert_eq!(err.message, "mismatching label $b");
    }

    #[test]
    fn missing_end() {
        let err = parse("(func block nop)").unwrap_err();
        assert_eq!(err.message, "unexpected token \")\": expected instruction \"end\", found )");
    }

    #[test]
    fn flat_if_builds_then_and_else() {
        let module = parse("(func if (result i32) i32.const 1 else i32.const 2 end)").unwrap();
        let func = node(&module.children[0]);
        let if_node = node(&func.children[0]);
        assert_eq!(instrs(if_node), vec!["result", "then", "else"]);
        assert_eq!(instrs(if_node.child("then").unwrap()), vec!["i32.const"]);
        assert_eq!(instrs(if_node.child("else").unwrap()), vec!["i32.const"]);
    }

    #[test]
    fn flat_if_without_else() {
        let module = parse("(func if $l nop end $l)").unwrap();
        let if_node = node(&node(&module.children[0]).children[0]);
        assert_eq!(instrs(if_node), vec!["then"]);
    }

    #[test]
    fn flat_call_indirect_keeps_type_use() {
        let module = parse("(func call_indirect (type $t) (param i32) drop)").unwrap();
        let func = node(&module.children[0]);
        assert_eq!(instrs(func), vec!["call_indirect", "drop"]);
        assert_eq!(instrs(node(&func.children[0])), vec!["type", "param"]);
    }

    #[test]
    fn bare_labels_become_refs() {
        let module = parse("(elem (i32.const 0) $a $b)").unwrap();
        let elem = node(&module.children[0]);
        // Labels that follow a child form are refs, not params.
        assert!(elem.name.is_none());
        assert_eq!(elem.children.len(), 3);
        assert!(matches!(&elem.children[1], Expr::Ref { name, .. } if name == "a"));
        assert!(matches!(&elem.children[2], Expr::Ref { name, .. } if name == "b"));
    }

    #[test]
    fn data_strings_concatenate() {
        let module = parse(r#"(data (i32.const 8) "ab" "\01\ff" "\u{e9}")"#).unwrap();
        let data = node(&module.children[0]);
        match &data.children[1] {
            Expr::Data { bytes, .. } => assert_eq!(bytes, &vec![b'a', b'b', 0x01, 0xff, 0xc3, 0xa9]),
            other => panic!("expected data, got {other:?}"),
        }
    }

    #[test]
    fn reserved_params() {
        let module = parse("(func (i32.load offset=0x10 align=4 (i32.const 0)) (memory 1 2 shared))").unwrap();
        let func = node(&module.children[0]);
        let load = node(&func.children[0]);
        assert_eq!(
            load.params[0].kind,
            ParamKind::Reserved {
                key: Reserved::Offset,
                value: Some("0x10".into())
            }
        );
        assert_eq!(
            load.params[1].kind,
            ParamKind::Reserved {
                key: Reserved::Align,
                value: Some("4".into())
            }
        );
        let memory = node(&func.children[1]);
        assert_eq!(
            memory.params[2].kind,
            ParamKind::Reserved {
                key: Reserved::Shared,
                value: None
            }
        );
    }

    #[test]
    fn reserved_word_as_head() {
        let module = parse("(data (offset (i32.const 0)) \"x\")").unwrap();
        let data = node(&module.children[0]);
        let offset = node(&data.children[0]);
        assert_eq!(offset.instr, "offset");
        assert_eq!(instrs(offset), vec!["i32.const"]);
    }

    #[test]
    fn separators_are_stripped() {
        let module = parse("(i64.const 1_000_000) (f32.const 0x1_0.8p1)").unwrap();
        assert_eq!(node(&module.children[0]).params[0].kind, ParamKind::Number("1000000".into()));
        assert_eq!(node(&module.children[1]).params[0].kind, ParamKind::Hex("0x10.8p1".into()));
    }

    #[test]
    fn reserved_without_value_after_equals() {
        let err = parse("(i32.load offset= )").unwrap_err();
        assert_eq!(err.message, "unexpected token \")\": expected hex literal, found )");
    }

    #[test]
    fn error_token_surfaces_at_parse() {
        let err = parse("(module {)").unwrap_err();
        assert!(err.message.contains("found invalid token"), "{}", err.message);
        assert_eq!(err.offset(), 8);
    }

    #[test]
    fn unbalanced_parens() {
        let err = parse("(module (func)").unwrap_err();
        assert!(err.message.contains("expected ), found end of input"), "{}", err.message);

        let err = parse("(module))").unwrap_err();
        assert!(err.message.contains("expected (, found )"), "{}", err.message);
    }

    #[test]
    fn form_needs_instruction_head() {
        let err = parse("(42)").unwrap_err();
        assert_eq!(err.message, "unexpected token \"42\": expected instruction, found number");
    }

    #[test]
    fn invalid_escape() {
        let err = parse(r#"(data "\q")"#).unwrap_err();
        assert_eq!(err.message, "invalid escape sequence: \\q");
    }

    #[test]
    fn decode_escapes() {
        let span = Span::ZERO;
        assert_eq!(decode_string(r#"a\tb\n\"\'\\"#, span).unwrap(), b"a\tb\n\"'\\".to_vec());
        assert_eq!(decode_string(r"\u{1F600}!", span).unwrap(), "\u{1F600}!".as_bytes().to_vec());
        assert!(decode_string(r"\u{110000}", span).is_err());
        assert!(decode_string(r"\4", span).is_err());
    }
}
