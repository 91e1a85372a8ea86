//! A compiler from the WebAssembly text instruction language to binary
//! modules.
//!
//! The pipeline runs in stages, each usable on its own:
//!
//! - [`wat`] -- Lexer and parser. Reads source text into an untyped tree of
//!   instruction nodes.
//! - [`compiler`] -- Symbol resolution and code generation. Registers the
//!   tree's declarations, resolves every `$name` and encodes function bodies.
//! - [`builder`] -- Module builder. Deduplicates signatures, assigns indices
//!   and lays out the sections.
//! - [`encoding`] -- LEB128, IEEE 754, vector and section framing primitives.
//!
//! # Example
//!
//! ```
//! let bytes = watc::compile(r#"
//!     (module
//!         (func (export "add") (param i32 i32) (result i32)
//!             local.get 0
//!             local.get 1
//!             i32.add))
//! "#).unwrap();
//!
//! assert_eq!(&bytes[0..4], b"\0asm");
//! assert_eq!(bytes.len(), 41);
//! ```

pub mod builder;
pub mod compiler;
pub mod encoding;
pub mod error;
pub mod wat;

pub use error::CompileError;

/// Compile source text to a binary module.
pub fn compile(source: &str) -> Result<Vec<u8>, CompileError> {
    let module = wat::parse(source)?;
    log::debug!("parsed module with {} fields", module.children.len());
    compiler::compile_module(&module)
}
