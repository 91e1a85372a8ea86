//! Syntax tree produced by the parser.
//!
//! The tree is deliberately untyped: every form, from `module` down to
//! `i32.add`, is a [`Node`] with an instruction name, an optional name label,
//! leaf parameters and child expressions. Giving forms meaning is the
//! compiler's job.

use super::token::Span;

/// One expression in the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A bare `$name` appearing where an expression is expected, such as the
    /// function references of an `elem` segment.
    Ref { name: String, span: Span },
    /// One or more adjacent string literals used as inline bytes.
    Data { bytes: Vec<u8>, span: Span },
    /// An instruction or structural form.
    Node(Node),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Ref { span, .. } | Expr::Data { span, .. } => *span,
            Expr::Node(node) => node.span,
        }
    }

    /// The node, if this expression is one.
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Expr::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Whether this is a node with the given instruction name.
    pub fn is_node(&self, instr: &str) -> bool {
        self.as_node().map_or(false, |n| n.instr == instr)
    }
}

/// A `$name` label attached to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    pub name: String,
    pub span: Span,
}

/// An instruction form: `(instr $name params... children... params...)` or
/// its flat equivalent.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub instr: String,
    pub name: Option<Name>,
    pub params: Vec<Param>,
    pub children: Vec<Expr>,
    pub span: Span,
}

impl Node {
    pub fn new(instr: impl Into<String>, span: Span) -> Self {
        Self {
            instr: instr.into(),
            name: None,
            params: Vec::new(),
            children: Vec::new(),
            span,
        }
    }

    /// Child nodes, skipping refs and data.
    pub fn child_nodes(&self) -> impl Iterator<Item = &Node> {
        self.children.iter().filter_map(Expr::as_node)
    }

    /// The first child node with the given instruction name.
    pub fn child(&self, instr: &str) -> Option<&Node> {
        self.child_nodes().find(|n| n.instr == instr)
    }

    /// Whether the node has any child node with the given instruction name.
    pub fn has_child(&self, instr: &str) -> bool {
        self.child(instr).is_some()
    }
}

/// A leaf parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub kind: ParamKind,
    pub span: Span,
}

/// The tagged value of a leaf parameter.
///
/// Numeric text has its digit-group separators removed.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    /// Decimal integer or float, `inf` or `nan`, with optional sign.
    Number(String),
    /// Hexadecimal integer or float, or a `nan:0x...` payload form.
    Hex(String),
    /// A string literal with escapes decoded.
    Str(Vec<u8>),
    /// A `$name` reference, without the `$`.
    Label(String),
    /// A reserved keyword with its attached value, if any: `offset=8`.
    Reserved { key: Reserved, value: Option<String> },
}

impl ParamKind {
    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            ParamKind::Number(text) | ParamKind::Hex(text) => text.clone(),
            ParamKind::Str(bytes) => format!("\"{}\"", String::from_utf8_lossy(bytes)),
            ParamKind::Label(name) => format!("${name}"),
            ParamKind::Reserved { key, value: Some(v) } => format!("{}={}", key.as_str(), v),
            ParamKind::Reserved { key, value: None } => key.as_str().to_string(),
        }
    }
}

/// Reserved parameter keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reserved {
    Offset,
    Align,
    Shared,
    Funcref,
}

impl Reserved {
    pub fn from_word(word: &str) -> Option<Reserved> {
        match word {
            "offset" => Some(Reserved::Offset),
            "align" => Some(Reserved::Align),
            "shared" => Some(Reserved::Shared),
            "funcref" => Some(Reserved::Funcref),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Reserved::Offset => "offset",
            Reserved::Align => "align",
            Reserved::Shared => "shared",
            Reserved::Funcref => "funcref",
        }
    }
}
