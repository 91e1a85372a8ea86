//! Text front end: lexing and parsing the instruction language.
//!
//! Source goes through the [`Lexer`], which classifies tokens without ever
//! failing, then the parser, which builds an untyped [`Node`] tree.
//!
//! # Example
//!
//! ```
//! use watc::wat;
//!
//! let module = wat::parse(r#"
//!     (module
//!         (func $add (export "add") (param i32 i32) (result i32)
//!             local.get 0
//!             local.get 1
//!             i32.add))
//! "#).unwrap();
//!
//! let func = module.children[0].as_node().unwrap();
//! assert_eq!(func.instr, "func");
//! assert_eq!(func.child_nodes().filter(|n| n.instr == "local.get").count(), 2);
//! ```
//!
//! # Error Handling
//!
//! Parsing stops at the first syntax error:
//!
//! ```
//! let err = watc::wat::parse("(module (func)").unwrap_err();
//! assert_eq!(err.span.line, 1);
//! ```

mod ast;
mod cursor;
mod error;
mod lexer;
mod parser;
mod stream;
mod token;

pub use ast::{Expr, Name, Node, Param, ParamKind, Reserved};
pub use error::ParseError;
pub use lexer::Lexer;
pub use parser::parse;
pub use stream::TokenStream;
pub use token::{Span, Token, TokenKind};
