//! Module builder: the registry of declarations and the final byte layout.
//!
//! The compiler registers every declaration here while walking the tree,
//! resolving names against the builder's [`GlobalContext`]. [`ModuleBuilder::build`]
//! then serialises the module once, in the fixed section order of the binary
//! format:
//!
//! ```text
//! module ::= magic version
//!            typesec importsec? funcsec tablesec? memsec? globalsec?
//!            exportsec? startsec? elemsec? codesec datasec?
//! ```
//!
//! The type, function and code sections are always present, even when empty.

use std::collections::HashMap;

use log::{debug, trace};

use crate::compiler::context::{GlobalContext, Namespace};
use crate::encoding::{
    write_name, write_section, write_u8vec, write_vec, write_vs64, write_vu32, BLOCK_TYPE_EMPTY, DESC_FUNC, DESC_GLOBAL,
    DESC_MEMORY, DESC_TABLE, GLOBAL_CONST, GLOBAL_VAR, LIMITS_MIN, LIMITS_MIN_MAX, LIMITS_SHARED, MAGIC, OP_END,
    SECTION_CODE, SECTION_DATA, SECTION_ELEMENT, SECTION_EXPORT, SECTION_FUNCTION, SECTION_GLOBAL, SECTION_IMPORT,
    SECTION_MEMORY, SECTION_START, SECTION_TABLE, SECTION_TYPE, TYPE_F32, TYPE_F64, TYPE_FUNC, TYPE_FUNCREF,
    TYPE_I32, TYPE_I64, VERSION,
};
use crate::error::CompileError;
use crate::wat::Span;

// ===========================================================================
// Declarations
// ===========================================================================

/// A number type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValType {
    I32,
    I64,
    F32,
    F64,
}

impl ValType {
    pub fn from_name(name: &str) -> Option<ValType> {
        match name {
            "i32" => Some(ValType::I32),
            "i64" => Some(ValType::I64),
            "f32" => Some(ValType::F32),
            "f64" => Some(ValType::F64),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ValType::I32 => "i32",
            ValType::I64 => "i64",
            ValType::F32 => "f32",
            ValType::F64 => "f64",
        }
    }

    pub fn byte(self) -> u8 {
        match self {
            ValType::I32 => TYPE_I32,
            ValType::I64 => TYPE_I64,
            ValType::F32 => TYPE_F32,
            ValType::F64 => TYPE_F64,
        }
    }
}

/// A function signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FuncType {
    pub params: Vec<ValType>,
    pub results: Vec<ValType>,
}

impl FuncType {
    pub fn new(params: Vec<ValType>, results: Vec<ValType>) -> Self {
        Self { params, results }
    }

    /// The key structurally identical signatures share, e.g. `i32,i32/i64`.
    pub fn key(&self) -> String {
        let join = |types: &[ValType]| types.iter().map(|t| t.name()).collect::<Vec<_>>().join(",");
        format!("{}/{}", join(&self.params), join(&self.results))
    }
}

/// Size limits of a memory or table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Limits {
    pub min: u32,
    pub max: Option<u32>,
    pub shared: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportDesc {
    Func(u32),
    Memory(Limits),
    Global { ty: ValType, mutable: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub module: String,
    pub field: String,
    pub desc: ImportDesc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub ty: ValType,
    pub mutable: bool,
    /// Constant initialiser expression, without its `end`.
    pub init: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Func,
    Table,
    Memory,
    Global,
}

impl ExportKind {
    pub fn from_name(name: &str) -> Option<ExportKind> {
        match name {
            "func" => Some(ExportKind::Func),
            "table" => Some(ExportKind::Table),
            "memory" => Some(ExportKind::Memory),
            "global" => Some(ExportKind::Global),
            _ => None,
        }
    }

    pub fn namespace(self) -> Namespace {
        match self {
            ExportKind::Func => Namespace::Function,
            ExportKind::Table => Namespace::Table,
            ExportKind::Memory => Namespace::Memory,
            ExportKind::Global => Namespace::Global,
        }
    }

    fn desc(self) -> u8 {
        match self {
            ExportKind::Func => DESC_FUNC,
            ExportKind::Table => DESC_TABLE,
            ExportKind::Memory => DESC_MEMORY,
            ExportKind::Global => DESC_GLOBAL,
        }
    }
}

/// A reference to a module-scope entity that is resolved when the module is
/// built, after every declaration is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Name(String, Span),
    Index(u32, Span),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub name: String,
    pub kind: ExportKind,
    pub target: Target,
}

/// An active element segment for table 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub offset: Vec<u8>,
    pub funcs: Vec<Target>,
    pub span: Span,
}

/// An active data segment for memory 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    pub offset: Vec<u8>,
    pub bytes: Vec<u8>,
}

/// An entry in the function index space.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub index: u32,
    pub type_idx: u32,
    pub imported: bool,
    /// Declared locals, excluding parameters.
    pub locals: Vec<ValType>,
    /// Instruction bytes, without the final `end`.
    pub body: Vec<u8>,
}

// ===========================================================================
// Builder
// ===========================================================================

/// Accumulates a module's declarations and serialises it.
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    context: GlobalContext,
    types: Vec<FuncType>,
    type_keys: HashMap<String, u32>,
    imports: Vec<Import>,
    functions: Vec<Function>,
    tables: Vec<Limits>,
    memories: Vec<Limits>,
    imported_memories: u32,
    globals: Vec<Global>,
    imported_globals: u32,
    exports: Vec<Export>,
    start: Option<Target>,
    elements: Vec<Element>,
    data: Vec<Data>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn resolve(&self, space: Namespace, name: &str, span: Span) -> Result<u32, CompileError> {
        self.context.resolve(space, name, span)
    }

    pub fn get_type(&self, name: &str, span: Span) -> Result<u32, CompileError> {
        self.resolve(Namespace::Type, name, span)
    }

    /// The signature at a type index.
    pub fn type_at(&self, index: u32) -> Option<&FuncType> {
        self.types.get(index as usize)
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register a signature, returning the index of the structurally
    /// identical entry if one exists.
    pub fn find_or_add_type(&mut self, ty: FuncType) -> u32 {
        let key = ty.key();
        if let Some(&index) = self.type_keys.get(&key) {
            return index;
        }
        let index = self.types.len() as u32;
        trace!("type {index}: {key}");
        self.type_keys.insert(key, index);
        self.types.push(ty);
        index
    }

    /// Register an explicit `(type)` declaration.
    pub fn add_type(&mut self, name: Option<&str>, ty: FuncType) -> u32 {
        let index = self.find_or_add_type(ty);
        if let Some(name) = name {
            self.context.bind(Namespace::Type, name, index);
        }
        index
    }

    pub fn import_func(
        &mut self,
        name: Option<&str>,
        module: &str,
        field: &str,
        type_idx: u32,
        span: Span,
    ) -> Result<u32, CompileError> {
        if self.functions.iter().any(|f| !f.imported) {
            return Err(CompileError::malformed("import after function", span));
        }
        self.push_import(module, field, ImportDesc::Func(type_idx));
        let index = self.push_function(name, type_idx, true);
        Ok(index)
    }

    pub fn import_memory(
        &mut self,
        name: Option<&str>,
        module: &str,
        field: &str,
        limits: Limits,
        span: Span,
    ) -> Result<u32, CompileError> {
        if !self.memories.is_empty() {
            return Err(CompileError::malformed("import after memory", span));
        }
        self.push_import(module, field, ImportDesc::Memory(limits));
        let index = self.imported_memories;
        self.imported_memories += 1;
        self.bind(Namespace::Memory, name, index);
        Ok(index)
    }

    pub fn import_global(
        &mut self,
        name: Option<&str>,
        module: &str,
        field: &str,
        ty: ValType,
        mutable: bool,
        span: Span,
    ) -> Result<u32, CompileError> {
        if !self.globals.is_empty() {
            return Err(CompileError::malformed("import after global", span));
        }
        self.push_import(module, field, ImportDesc::Global { ty, mutable });
        let index = self.imported_globals;
        self.imported_globals += 1;
        self.bind(Namespace::Global, name, index);
        Ok(index)
    }

    /// Register a defined function's signature. Its body is attached later
    /// with [`set_body`](Self::set_body).
    pub fn func(&mut self, name: Option<&str>, type_idx: u32) -> u32 {
        self.push_function(name, type_idx, false)
    }

    pub fn set_body(&mut self, index: u32, locals: Vec<ValType>, body: Vec<u8>) {
        if let Some(func) = self.functions.get_mut(index as usize) {
            func.locals = locals;
            func.body = body;
        }
    }

    pub fn table(&mut self, name: Option<&str>, limits: Limits) -> u32 {
        let index = self.tables.len() as u32;
        trace!("table {index}: {limits:?}");
        self.tables.push(limits);
        self.bind(Namespace::Table, name, index);
        index
    }

    pub fn memory(&mut self, name: Option<&str>, limits: Limits, span: Span) -> Result<u32, CompileError> {
        if limits.shared && limits.max.is_none() {
            return Err(CompileError::malformed("shared memory must have maximum", span));
        }
        let index = self.imported_memories + self.memories.len() as u32;
        trace!("memory {index}: {limits:?}");
        self.memories.push(limits);
        self.bind(Namespace::Memory, name, index);
        Ok(index)
    }

    pub fn global(&mut self, name: Option<&str>, global: Global) -> u32 {
        let index = self.imported_globals + self.globals.len() as u32;
        trace!("global {index}: {} mutable={}", global.ty.name(), global.mutable);
        self.globals.push(global);
        self.bind(Namespace::Global, name, index);
        index
    }

    pub fn export(&mut self, name: &str, kind: ExportKind, target: Target) {
        trace!("export \"{name}\": {kind:?} {target:?}");
        self.exports.push(Export {
            name: name.to_string(),
            kind,
            target,
        });
    }

    pub fn start(&mut self, target: Target) {
        self.start = Some(target);
    }

    pub fn elem(&mut self, offset: Vec<u8>, funcs: Vec<Target>, span: Span) {
        self.elements.push(Element { offset, funcs, span });
    }

    pub fn data(&mut self, offset: Vec<u8>, bytes: Vec<u8>) {
        trace!("data segment: {} bytes", bytes.len());
        self.data.push(Data { offset, bytes });
    }

    fn bind(&mut self, space: Namespace, name: Option<&str>, index: u32) {
        if let Some(name) = name {
            self.context.bind(space, name, index);
        }
    }

    fn push_import(&mut self, module: &str, field: &str, desc: ImportDesc) {
        trace!("import \"{module}\" \"{field}\": {desc:?}");
        self.imports.push(Import {
            module: module.to_string(),
            field: field.to_string(),
            desc,
        });
    }

    fn push_function(&mut self, name: Option<&str>, type_idx: u32, imported: bool) -> u32 {
        let index = self.functions.len() as u32;
        trace!("func {index} {name:?}: type {type_idx}");
        self.functions.push(Function {
            index,
            type_idx,
            imported,
            locals: Vec::new(),
            body: Vec::new(),
        });
        self.bind(Namespace::Function, name, index);
        index
    }

    fn count(&self, space: Namespace) -> u32 {
        match space {
            Namespace::Type => self.types.len() as u32,
            Namespace::Function => self.functions.len() as u32,
            Namespace::Table => self.tables.len() as u32,
            Namespace::Memory => self.imported_memories + self.memories.len() as u32,
            Namespace::Global => self.imported_globals + self.globals.len() as u32,
            Namespace::Local | Namespace::Label => 0,
        }
    }

    /// Resolve a deferred reference to an index in `space`.
    pub fn resolve_target(&self, space: Namespace, target: &Target) -> Result<u32, CompileError> {
        match target {
            Target::Name(name, span) => self.resolve(space, name, *span),
            Target::Index(index, span) => {
                if *index < self.count(space) {
                    Ok(*index)
                } else {
                    Err(CompileError::malformed(format!("unknown {space} {index}"), *span))
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Serialisation
    // -----------------------------------------------------------------------

    /// Serialise the module.
    pub fn build(&self) -> Result<Vec<u8>, CompileError> {
        let export_indices = self
            .exports
            .iter()
            .map(|e| self.resolve_target(e.kind.namespace(), &e.target))
            .collect::<Result<Vec<_>, _>>()?;
        let start = self
            .start
            .as_ref()
            .map(|t| self.resolve_target(Namespace::Function, t))
            .transpose()?;
        let element_funcs = self
            .elements
            .iter()
            .map(|e| {
                e.funcs
                    .iter()
                    .map(|t| self.resolve_target(Namespace::Function, t))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&VERSION.to_le_bytes());

        self.encode_type_section(&mut buf);
        self.encode_import_section(&mut buf);
        self.encode_function_section(&mut buf);
        self.encode_table_section(&mut buf)?;
        self.encode_memory_section(&mut buf);
        self.encode_global_section(&mut buf);
        self.encode_export_section(&mut buf, &export_indices);
        encode_start_section(&mut buf, start);
        self.encode_element_section(&mut buf, &element_funcs);
        self.encode_code_section(&mut buf);
        self.encode_data_section(&mut buf);

        debug!(
            "built module: {} types, {} functions, {} exports, {} bytes",
            self.types.len(),
            self.functions.len(),
            self.exports.len(),
            buf.len()
        );
        Ok(buf)
    }

    /// Type section (id 1).
    ///
    /// ```text
    /// typesec  ::= section_1(vec(functype))
    /// functype ::= 0x60 vec(valtype) vec(valtype)
    /// ```
    fn encode_type_section(&self, buf: &mut Vec<u8>) {
        let mut contents = Vec::new();
        write_vec(&mut contents, &self.types, |out, ty| {
            out.push(TYPE_FUNC);
            write_vec(out, &ty.params, |out, t| out.push(t.byte()));
            write_vec(out, &ty.results, |out, t| out.push(t.byte()));
        });
        emit_section(buf, SECTION_TYPE, &contents);
    }

    /// Import section (id 2), omitted when empty.
    ///
    /// ```text
    /// importsec  ::= section_2(vec(import))
    /// import     ::= module:name name:name importdesc
    /// importdesc ::= 0x00 typeidx | 0x02 memtype | 0x03 globaltype
    /// ```
    fn encode_import_section(&self, buf: &mut Vec<u8>) {
        if self.imports.is_empty() {
            return;
        }

        let mut contents = Vec::new();
        write_vec(&mut contents, &self.imports, |out, import| {
            write_name(out, &import.module);
            write_name(out, &import.field);
            match &import.desc {
                ImportDesc::Func(type_idx) => {
                    out.push(DESC_FUNC);
                    write_vu32(out, *type_idx);
                }
                ImportDesc::Memory(limits) => {
                    out.push(DESC_MEMORY);
                    emit_limits(out, limits);
                }
                ImportDesc::Global { ty, mutable } => {
                    out.push(DESC_GLOBAL);
                    out.push(ty.byte());
                    out.push(if *mutable { GLOBAL_VAR } else { GLOBAL_CONST });
                }
            }
        });
        emit_section(buf, SECTION_IMPORT, &contents);
    }

    /// Function section (id 3): type index per defined function.
    ///
    /// ```text
    /// funcsec ::= section_3(vec(typeidx))
    /// ```
    fn encode_function_section(&self, buf: &mut Vec<u8>) {
        let defined: Vec<_> = self.functions.iter().filter(|f| !f.imported).collect();
        let mut contents = Vec::new();
        write_vec(&mut contents, &defined, |out, func| write_vu32(out, func.type_idx));
        emit_section(buf, SECTION_FUNCTION, &contents);
    }

    /// Table section (id 4), only when something refers to a table: an
    /// element segment or a table export.
    ///
    /// ```text
    /// tablesec ::= section_4(vec(tabletype))
    /// tabletype ::= 0x70 limits
    /// ```
    fn encode_table_section(&self, buf: &mut Vec<u8>) -> Result<(), CompileError> {
        let exported = self.exports.iter().any(|e| e.kind == ExportKind::Table);
        if self.elements.is_empty() && !exported {
            return Ok(());
        }
        if self.tables.is_empty() {
            let span = self.elements.first().map_or(Span::ZERO, |e| e.span);
            return Err(CompileError::malformed("element segment requires a table", span));
        }

        let mut contents = Vec::new();
        write_vec(&mut contents, &self.tables, |out, limits| {
            out.push(TYPE_FUNCREF);
            emit_limits(out, limits);
        });
        emit_section(buf, SECTION_TABLE, &contents);
        Ok(())
    }

    /// Memory section (id 5), omitted when empty.
    ///
    /// ```text
    /// memsec ::= section_5(vec(limits))
    /// ```
    fn encode_memory_section(&self, buf: &mut Vec<u8>) {
        if self.memories.is_empty() {
            return;
        }

        let mut contents = Vec::new();
        write_vec(&mut contents, &self.memories, emit_limits);
        emit_section(buf, SECTION_MEMORY, &contents);
    }

    /// Global section (id 6), omitted when empty.
    ///
    /// ```text
    /// globalsec  ::= section_6(vec(global))
    /// global     ::= valtype mut expr
    /// mut        ::= 0x00 (const) | 0x01 (var)
    /// ```
    fn encode_global_section(&self, buf: &mut Vec<u8>) {
        if self.globals.is_empty() {
            return;
        }

        let mut contents = Vec::new();
        write_vec(&mut contents, &self.globals, |out, global| {
            out.push(global.ty.byte());
            out.push(if global.mutable { GLOBAL_VAR } else { GLOBAL_CONST });
            emit_expression(out, &global.init);
        });
        emit_section(buf, SECTION_GLOBAL, &contents);
    }

    /// Export section (id 7), omitted when empty.
    ///
    /// ```text
    /// exportsec  ::= section_7(vec(export))
    /// export     ::= name exportdesc
    /// exportdesc ::= 0x00 funcidx | 0x01 tableidx | 0x02 memidx | 0x03 globalidx
    /// ```
    fn encode_export_section(&self, buf: &mut Vec<u8>, indices: &[u32]) {
        if self.exports.is_empty() {
            return;
        }

        let entries: Vec<_> = self.exports.iter().zip(indices).collect();
        let mut contents = Vec::new();
        write_vec(&mut contents, &entries, |out, (export, index)| {
            write_name(out, &export.name);
            out.push(export.kind.desc());
            write_vu32(out, **index);
        });
        emit_section(buf, SECTION_EXPORT, &contents);
    }

    /// Element section (id 9), omitted when empty.
    ///
    /// ```text
    /// elemsec ::= section_9(vec(elem))
    /// elem    ::= 0x00 expr vec(funcidx)
    /// ```
    fn encode_element_section(&self, buf: &mut Vec<u8>, funcs: &[Vec<u32>]) {
        if self.elements.is_empty() {
            return;
        }

        let entries: Vec<_> = self.elements.iter().zip(funcs).collect();
        let mut contents = Vec::new();
        write_vec(&mut contents, &entries, |out, (element, funcs)| {
            write_vu32(out, 0);
            emit_expression(out, &element.offset);
            write_vec(out, funcs.as_slice(), |out, index| write_vu32(out, *index));
        });
        emit_section(buf, SECTION_ELEMENT, &contents);
    }

    /// Code section (id 10): locals and instructions per defined function.
    ///
    /// ```text
    /// codesec ::= section_10(vec(code))
    /// code    ::= size:u32 vec(locals) expr
    /// locals  ::= n:u32 valtype
    /// ```
    fn encode_code_section(&self, buf: &mut Vec<u8>) {
        let defined: Vec<_> = self.functions.iter().filter(|f| !f.imported).collect();
        let mut contents = Vec::new();
        write_vec(&mut contents, &defined, |out, func| {
            let mut func_buf = Vec::new();
            write_vec(&mut func_buf, &compress_locals(&func.locals), |out, (count, ty)| {
                write_vu32(out, *count);
                out.push(ty.byte());
            });
            emit_expression(&mut func_buf, &func.body);
            write_u8vec(out, &func_buf);
        });
        emit_section(buf, SECTION_CODE, &contents);
    }

    /// Data section (id 11), omitted when empty.
    ///
    /// ```text
    /// datasec ::= section_11(vec(data))
    /// data    ::= 0x00 expr vec(byte)
    /// ```
    fn encode_data_section(&self, buf: &mut Vec<u8>) {
        if self.data.is_empty() {
            return;
        }

        let mut contents = Vec::new();
        write_vec(&mut contents, &self.data, |out, segment| {
            write_vu32(out, 0);
            emit_expression(out, &segment.offset);
            write_u8vec(out, &segment.bytes);
        });
        emit_section(buf, SECTION_DATA, &contents);
    }
}

/// Start section (id 8).
///
/// ```text
/// startsec ::= section_8(funcidx)
/// ```
fn encode_start_section(buf: &mut Vec<u8>, start: Option<u32>) {
    if let Some(index) = start {
        let mut contents = Vec::new();
        write_vu32(&mut contents, index);
        emit_section(buf, SECTION_START, &contents);
    }
}

fn emit_section(buf: &mut Vec<u8>, id: u8, contents: &[u8]) {
    trace!("section {id}: {} bytes", contents.len());
    write_section(buf, id, contents);
}

/// Encodes limits.
///
/// ```text
/// limits ::= 0x00 min:u32 | 0x01 min:u32 max:u32 | 0x03 min:u32 max:u32
/// ```
fn emit_limits(buf: &mut Vec<u8>, limits: &Limits) {
    match limits.max {
        Some(max) => {
            buf.push(if limits.shared { LIMITS_SHARED } else { LIMITS_MIN_MAX });
            write_vu32(buf, limits.min);
            write_vu32(buf, max);
        }
        None => {
            buf.push(LIMITS_MIN);
            write_vu32(buf, limits.min);
        }
    }
}

fn emit_expression(buf: &mut Vec<u8>, instructions: &[u8]) {
    buf.extend_from_slice(instructions);
    buf.push(OP_END);
}

/// Encodes a block signature as it appears after `block`, `loop` or `if`.
/// A written type use keeps its index; otherwise the empty type, a single
/// result type, or a registered type index.
pub fn block_type(builder: &mut ModuleBuilder, ty: FuncType, type_use: Option<u32>, buf: &mut Vec<u8>) {
    if let Some(index) = type_use {
        write_vs64(buf, i64::from(index));
        return;
    }
    match (ty.params.as_slice(), ty.results.as_slice()) {
        ([], []) => buf.push(BLOCK_TYPE_EMPTY),
        ([], [result]) => buf.push(result.byte()),
        _ => {
            let index = builder.find_or_add_type(ty);
            write_vs64(buf, i64::from(index));
        }
    }
}

/// Merge adjacent locals of the same type into `(count, type)` runs.
fn compress_locals(locals: &[ValType]) -> Vec<(u32, ValType)> {
    let mut result = Vec::new();
    let mut iter = locals.iter().peekable();

    while let Some(&ty) = iter.next() {
        let mut count = 1u32;
        while iter.peek() == Some(&&ty) {
            iter.next();
            count += 1;
        }
        result.push((count, ty));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(params: &[ValType], results: &[ValType]) -> FuncType {
        FuncType::new(params.to_vec(), results.to_vec())
    }

    const HEADER: [u8; 8] = [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];

    #[test]
    fn empty_module_has_mandatory_sections() {
        let bytes = ModuleBuilder::new().build().unwrap();
        let mut expected = HEADER.to_vec();
        expected.extend([0x01, 0x01, 0x00, 0x03, 0x01, 0x00, 0x0a, 0x01, 0x00]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn identical_signatures_share_a_type() {
        let mut builder = ModuleBuilder::new();
        let a = builder.find_or_add_type(sig(&[ValType::I32], &[ValType::I32]));
        let b = builder.add_type(Some("t"), sig(&[ValType::I32], &[ValType::I32]));
        let c = builder.find_or_add_type(sig(&[ValType::I64], &[]));
        assert_eq!((a, b, c), (0, 0, 1));
        assert_eq!(builder.type_count(), 2);
        assert_eq!(builder.get_type("t", Span::ZERO).unwrap(), 0);
    }

    #[test]
    fn signature_key() {
        assert_eq!(sig(&[ValType::I32, ValType::F64], &[ValType::I64]).key(), "i32,f64/i64");
        assert_eq!(sig(&[], &[]).key(), "/");
    }

    #[test]
    fn locals_merge_only_when_adjacent() {
        use ValType::*;
        assert_eq!(compress_locals(&[I32, I32, I64]), vec![(2, I32), (1, I64)]);
        assert_eq!(compress_locals(&[I32, I64, I32]), vec![(1, I32), (1, I64), (1, I32)]);
        assert_eq!(compress_locals(&[]), vec![]);
    }

    #[test]
    fn imports_take_low_indices() {
        let mut builder = ModuleBuilder::new();
        let ty = builder.find_or_add_type(FuncType::default());
        assert_eq!(builder.import_func(Some("log"), "env", "log", ty, Span::ZERO).unwrap(), 0);
        assert_eq!(builder.func(Some("main"), ty), 1);
        assert_eq!(builder.resolve(Namespace::Function, "main", Span::ZERO).unwrap(), 1);

        let err = builder.import_func(None, "env", "late", ty, Span::ZERO).unwrap_err();
        assert_eq!(err, CompileError::malformed("import after function", Span::ZERO));
    }

    #[test]
    fn memory_and_global_indices_follow_imports() {
        let mut builder = ModuleBuilder::new();
        let limits = Limits { min: 1, ..Limits::default() };
        builder.import_memory(None, "env", "mem", limits, Span::ZERO).unwrap();
        assert_eq!(builder.memory(Some("m"), limits, Span::ZERO).unwrap(), 1);

        builder
            .import_global(Some("g0"), "env", "g", ValType::I32, false, Span::ZERO)
            .unwrap();
        let global = Global {
            ty: ValType::I64,
            mutable: true,
            init: vec![0x42, 0x00],
        };
        assert_eq!(builder.global(Some("g1"), global.clone()), 1);
        assert!(builder
            .import_global(None, "env", "late", ValType::I32, false, Span::ZERO)
            .is_err());
    }

    #[test]
    fn shared_memory_requires_maximum() {
        let mut builder = ModuleBuilder::new();
        let limits = Limits {
            min: 1,
            max: None,
            shared: true,
        };
        assert!(builder.memory(None, limits, Span::ZERO).is_err());
    }

    #[test]
    fn limits_encoding() {
        let mut buf = Vec::new();
        emit_limits(&mut buf, &Limits { min: 1, max: None, shared: false });
        emit_limits(&mut buf, &Limits { min: 1, max: Some(2), shared: false });
        emit_limits(&mut buf, &Limits { min: 1, max: Some(2), shared: true });
        assert_eq!(buf, vec![0x00, 0x01, 0x01, 0x01, 0x02, 0x03, 0x01, 0x02]);
    }

    #[test]
    fn elements_without_table_fail() {
        let mut builder = ModuleBuilder::new();
        let ty = builder.find_or_add_type(FuncType::default());
        let f = builder.func(None, ty);
        builder.elem(vec![0x41, 0x00], vec![Target::Index(f, Span::ZERO)], Span::ZERO);
        let err = builder.build().unwrap_err();
        assert_eq!(err, CompileError::malformed("element segment requires a table", Span::ZERO));
    }

    #[test]
    fn unresolved_export_fails_at_build() {
        let mut builder = ModuleBuilder::new();
        builder.export("f", ExportKind::Func, Target::Name("nope".into(), Span::ZERO));
        let err = builder.build().unwrap_err();
        assert!(matches!(err, CompileError::Unresolved { space: Namespace::Function, .. }));

        let mut builder = ModuleBuilder::new();
        builder.export("f", ExportKind::Func, Target::Index(0, Span::ZERO));
        assert!(matches!(builder.build(), Err(CompileError::Malformed { .. })));
    }

    #[test]
    fn export_may_reference_later_declaration() {
        let mut builder = ModuleBuilder::new();
        builder.export("f", ExportKind::Func, Target::Name("f".into(), Span::ZERO));
        let ty = builder.find_or_add_type(FuncType::default());
        builder.func(Some("f"), ty);
        let bytes = builder.build().unwrap();
        let export_section = [0x07, 0x05, 0x01, 0x01, b'f', 0x00, 0x00];
        assert!(bytes
            .windows(export_section.len())
            .any(|w| w == export_section));
    }

    #[test]
    fn block_types() {
        let mut builder = ModuleBuilder::new();
        let mut buf = Vec::new();
        block_type(&mut builder, sig(&[], &[]), None, &mut buf);
        block_type(&mut builder, sig(&[], &[ValType::F32]), None, &mut buf);
        block_type(&mut builder, sig(&[ValType::I32], &[ValType::I32]), None, &mut buf);
        assert_eq!(buf, vec![0x40, 0x7d, 0x00]);
        assert_eq!(builder.type_count(), 1);
    }

    #[test]
    fn block_type_keeps_written_type_use() {
        let mut builder = ModuleBuilder::new();
        let index = builder.add_type(Some("r"), sig(&[], &[ValType::I32]));
        let mut buf = Vec::new();
        block_type(&mut builder, sig(&[], &[ValType::I32]), Some(index), &mut buf);
        assert_eq!(buf, vec![0x00]);
    }

    #[test]
    fn code_section_layout() {
        let mut builder = ModuleBuilder::new();
        let ty = builder.find_or_add_type(FuncType::default());
        let f = builder.func(None, ty);
        builder.set_body(f, vec![ValType::I32, ValType::I32], vec![0x01]);
        let bytes = builder.build().unwrap();
        // size 5: one run (2 x i32), nop, end
        assert!(bytes.ends_with(&[0x0a, 0x07, 0x01, 0x05, 0x01, 0x02, 0x7f, 0x01, 0x0b]));
    }
}
