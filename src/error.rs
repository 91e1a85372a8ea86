//! Errors raised while compiling a module.

use crate::compiler::context::Namespace;
use crate::wat::{ParseError, Span};
use thiserror::Error;

/// A fatal compilation error. Compilation stops at the first one and produces
/// no output.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("syntax error: {0}")]
    Syntax(#[from] ParseError),

    #[error("unknown instruction \"{name}\" at {span}")]
    UnknownInstruction { name: String, span: Span },

    #[error("unknown {space} ${name} at {span}")]
    Unresolved {
        space: Namespace,
        name: String,
        span: Span,
    },

    #[error("invalid {ty} literal \"{literal}\" at {span}")]
    InvalidLiteral {
        literal: String,
        ty: &'static str,
        span: Span,
    },

    #[error("{message} at {span}")]
    Malformed { message: String, span: Span },
}

impl CompileError {
    pub fn malformed(message: impl Into<String>, span: Span) -> Self {
        CompileError::Malformed {
            message: message.into(),
            span,
        }
    }

    pub fn unresolved(space: Namespace, name: &str, span: Span) -> Self {
        CompileError::Unresolved {
            space,
            name: name.to_string(),
            span,
        }
    }

    pub fn invalid_literal(literal: &str, ty: &'static str, span: Span) -> Self {
        CompileError::InvalidLiteral {
            literal: literal.to_string(),
            ty,
            span,
        }
    }

    /// Source location of the error.
    pub fn span(&self) -> Span {
        match self {
            CompileError::Syntax(err) => err.span,
            CompileError::UnknownInstruction { span, .. }
            | CompileError::Unresolved { span, .. }
            | CompileError::InvalidLiteral { span, .. }
            | CompileError::Malformed { span, .. } => *span,
        }
    }
}
