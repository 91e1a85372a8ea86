//! Symbol tables used to turn `$names` into indices.
//!
//! Module-level names live in a [`GlobalContext`], one [`Scope`] per index
//! space. Each function body is compiled with a [`FunctionContext`] holding
//! its locals and the stack of enclosing block labels.

use std::collections::HashMap;
use std::fmt;

use crate::error::CompileError;
use crate::wat::Span;

/// The index spaces a name can be resolved in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Type,
    Function,
    Table,
    Memory,
    Global,
    Local,
    Label,
}

impl Namespace {
    pub fn name(self) -> &'static str {
        match self {
            Namespace::Type => "type",
            Namespace::Function => "function",
            Namespace::Table => "table",
            Namespace::Memory => "memory",
            Namespace::Global => "global",
            Namespace::Local => "local",
            Namespace::Label => "label",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A map of names to indices. Binding a name again shadows the earlier
/// binding.
#[derive(Debug, Default, Clone)]
pub struct Scope {
    names: HashMap<String, u32>,
}

impl Scope {
    pub fn bind(&mut self, name: &str, index: u32) {
        self.names.insert(name.to_string(), index);
    }

    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.names.get(name).copied()
    }
}

/// Module-scope names for every index space but locals and labels.
#[derive(Debug, Default)]
pub struct GlobalContext {
    types: Scope,
    functions: Scope,
    tables: Scope,
    memories: Scope,
    globals: Scope,
}

impl GlobalContext {
    fn scope(&self, space: Namespace) -> Option<&Scope> {
        match space {
            Namespace::Type => Some(&self.types),
            Namespace::Function => Some(&self.functions),
            Namespace::Table => Some(&self.tables),
            Namespace::Memory => Some(&self.memories),
            Namespace::Global => Some(&self.globals),
            Namespace::Local | Namespace::Label => None,
        }
    }

    pub fn bind(&mut self, space: Namespace, name: &str, index: u32) {
        let scope = match space {
            Namespace::Type => &mut self.types,
            Namespace::Function => &mut self.functions,
            Namespace::Table => &mut self.tables,
            Namespace::Memory => &mut self.memories,
            Namespace::Global => &mut self.globals,
            // Function-scoped names never reach the module scope.
            Namespace::Local | Namespace::Label => return,
        };
        scope.bind(name, index);
    }

    pub fn lookup(&self, space: Namespace, name: &str) -> Option<u32> {
        self.scope(space).and_then(|scope| scope.lookup(name))
    }

    /// Look up a name, failing with [`CompileError::Unresolved`].
    pub fn resolve(&self, space: Namespace, name: &str, span: Span) -> Result<u32, CompileError> {
        self.lookup(space, name)
            .ok_or_else(|| CompileError::unresolved(space, name, span))
    }
}

/// Names of the enclosing `block`, `loop` and `if` forms, innermost last.
#[derive(Debug, Default)]
pub struct LabelStack {
    labels: Vec<Option<String>>,
}

impl LabelStack {
    /// Enter a structured construct, named or not.
    pub fn push(&mut self, label: Option<&str>) {
        self.labels.push(label.map(str::to_string));
    }

    pub fn pop(&mut self) {
        self.labels.pop();
    }

    /// Relative branch depth of the innermost construct carrying `name`:
    /// 0 is the innermost open construct.
    pub fn depth_of(&self, name: &str) -> Option<u32> {
        self.labels
            .iter()
            .rev()
            .position(|label| label.as_deref() == Some(name))
            .map(|depth| depth as u32)
    }
}

/// Per-function state: parameters and locals share one index space, in
/// declaration order.
#[derive(Debug, Default)]
pub struct FunctionContext {
    locals: Scope,
    local_count: u32,
    pub labels: LabelStack,
}

impl FunctionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the next parameter or local, returning its index.
    pub fn declare_local(&mut self, name: Option<&str>) -> u32 {
        let index = self.local_count;
        if let Some(name) = name {
            self.locals.bind(name, index);
        }
        self.local_count += 1;
        index
    }

    pub fn resolve_local(&self, name: &str, span: Span) -> Result<u32, CompileError> {
        self.locals
            .lookup(name)
            .ok_or_else(|| CompileError::unresolved(Namespace::Local, name, span))
    }

    pub fn resolve_label(&self, name: &str, span: Span) -> Result<u32, CompileError> {
        self.labels
            .depth_of(name)
            .ok_or_else(|| CompileError::unresolved(Namespace::Label, name, span))
    }
}
