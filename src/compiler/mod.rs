//! Symbol resolution and compilation of a parsed module.
//!
//! Compilation runs in phases over the module's fields:
//!
//! 1. every `type` is registered, so type uses may precede their definition;
//! 2. every other declaration is registered with the [`ModuleBuilder`],
//!    assigning indices and binding names; function bodies are set aside;
//! 3. each function body is compiled, in declaration order, now that every
//!    module-scope name is known.
//!
//! References from exports, the start function and element segments are
//! resolved when the module is built.

pub mod codegen;
pub mod context;
pub mod literal;
pub mod opcode;

use log::debug;

use crate::builder::{ExportKind, FuncType, Global, Limits, ModuleBuilder, Target, ValType};
use crate::error::CompileError;
use crate::wat::{Expr, Node, ParamKind, Reserved, Span};
use codegen::{matched_type_use, signature, signature_index, value_type, value_types, FunctionCompiler};
use context::FunctionContext;
use literal::parse_u32;

/// Compile a `module` node into a binary module.
pub fn compile_module(module: &Node) -> Result<Vec<u8>, CompileError> {
    if module.instr != "module" {
        return Err(CompileError::malformed("expected a module", module.span));
    }

    let mut compiler = Compiler {
        builder: ModuleBuilder::new(),
        bodies: Vec::new(),
    };

    for field in module.child_nodes().filter(|n| n.instr == "type") {
        compiler.declare_type(field)?;
    }
    debug!("registered {} types", compiler.builder.type_count());

    for field in &module.children {
        compiler.declare(field)?;
    }
    debug!(
        "declared {} functions, {} bodies pending",
        compiler.builder.functions().len(),
        compiler.bodies.len()
    );

    compiler.codegen()?;
    compiler.builder.build()
}

/// A defined function whose body is compiled once all declarations are
/// registered.
struct PendingBody<'a> {
    index: u32,
    /// Parameters then locals, in declaration order.
    slots: Vec<(Option<&'a str>, ValType)>,
    param_count: usize,
    body: Vec<&'a Expr>,
}

struct Compiler<'a> {
    builder: ModuleBuilder,
    bodies: Vec<PendingBody<'a>>,
}

impl<'a> Compiler<'a> {
    fn declare_type(&mut self, node: &Node) -> Result<(), CompileError> {
        let func = node
            .child("func")
            .ok_or_else(|| CompileError::malformed("type requires a func signature", node.span))?;
        let (ty, _) = signature(&self.builder, func)?;
        let name = node.name.as_ref().map(|n| n.name.as_str());
        self.builder.add_type(name, ty);
        Ok(())
    }

    fn declare(&mut self, field: &'a Expr) -> Result<(), CompileError> {
        let node = match field {
            Expr::Node(node) => node,
            other => return Err(CompileError::malformed("unexpected module field", other.span())),
        };

        match node.instr.as_str() {
            "type" => Ok(()),
            "import" => self.import(node),
            "func" => self.func(node),
            "memory" => self.memory(node),
            "table" => self.table(node),
            "global" => self.global(node),
            "export" => self.export(node),
            "elem" => self.elem(node),
            "data" => self.data(node),
            "start" => self.start(node),
            other => Err(CompileError::malformed(
                format!("unexpected module field {other}"),
                node.span,
            )),
        }
    }

    fn codegen(&mut self) -> Result<(), CompileError> {
        for pending in std::mem::take(&mut self.bodies) {
            let mut ctx = FunctionContext::new();
            for (name, _) in &pending.slots {
                ctx.declare_local(*name);
            }

            let mut out = Vec::new();
            let mut compiler = FunctionCompiler::new(&mut self.builder, ctx);
            compiler.evaluate_all(pending.body.iter().copied(), &mut out)?;

            let locals = pending.slots[pending.param_count..].iter().map(|(_, ty)| *ty).collect();
            debug!("func {}: {} body bytes", pending.index, out.len());
            self.builder.set_body(pending.index, locals, out);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Module fields
    // -----------------------------------------------------------------------

    /// `(import "module" "field" (func|memory|global ...))`
    fn import(&mut self, node: &Node) -> Result<(), CompileError> {
        let (module, field) = import_names(node)?;
        let desc = node
            .child_nodes()
            .next()
            .ok_or_else(|| CompileError::malformed("import requires a descriptor", node.span))?;
        let name = desc.name.as_ref().map(|n| n.name.as_str());

        match desc.instr.as_str() {
            "func" => {
                let type_idx = signature_index(&mut self.builder, desc)?;
                self.builder.import_func(name, &module, &field, type_idx, desc.span)?;
            }
            "memory" => {
                let limits = limits(desc, false)?;
                self.builder.import_memory(name, &module, &field, limits, desc.span)?;
            }
            "global" => {
                let ty = desc
                    .children
                    .first()
                    .ok_or_else(|| CompileError::malformed("global requires a type", desc.span))?;
                let (ty, mutable) = global_type(ty)?;
                self.builder.import_global(name, &module, &field, ty, mutable, desc.span)?;
            }
            other => {
                return Err(CompileError::malformed(format!("unsupported import {other}"), desc.span));
            }
        }
        Ok(())
    }

    /// `(func $name (export "e")* (import "m" "f")? (type $t)? (param ...)* (result ...)* (local ...)* instr*)`
    fn func(&mut self, node: &'a Node) -> Result<(), CompileError> {
        let name = node.name.as_ref().map(|n| n.name.as_str());
        let mut inline = FuncType::default();
        let mut written = false;
        let mut slots = Vec::new();
        let mut locals = Vec::new();
        let mut exports = Vec::new();
        let mut import = None;
        let mut body = Vec::new();

        for child in &node.children {
            let child_node = match child {
                Expr::Node(n) => n,
                other => {
                    body.push(other);
                    continue;
                }
            };
            match child_node.instr.as_str() {
                "type" => {}
                "export" => exports.push(export_name(child_node)?),
                "import" => import = Some((child_node, import_names(child_node)?)),
                "param" => {
                    written = true;
                    for slot in named_slots(child_node)? {
                        inline.params.push(slot.1);
                        slots.push(slot);
                    }
                }
                "result" => {
                    written = true;
                    inline.results.extend(value_types(child_node)?);
                }
                "local" => locals.extend(named_slots(child_node)?),
                _ => body.push(child),
            }
        }

        let type_idx = match node.child("type") {
            Some(use_node) => {
                let index = matched_type_use(&self.builder, use_node, written.then_some(&inline))?;
                if !written {
                    let params = self.builder.type_at(index).map(|t| t.params.clone()).unwrap_or_default();
                    slots.extend(params.into_iter().map(|t| (None, t)));
                }
                index
            }
            None => self.builder.find_or_add_type(inline),
        };
        let index = match import {
            Some((import_node, (module, field))) => {
                if !body.is_empty() || !locals.is_empty() {
                    let span = body.first().map_or(node.span, |e| e.span());
                    return Err(CompileError::malformed("imported function cannot have a body", span));
                }
                self.builder.import_func(name, &module, &field, type_idx, import_node.span)?
            }
            None => {
                let index = self.builder.func(name, type_idx);
                let param_count = slots.len();
                slots.extend(locals);
                self.bodies.push(PendingBody {
                    index,
                    slots,
                    param_count,
                    body,
                });
                index
            }
        };

        for (export, span) in exports {
            self.builder.export(&export, ExportKind::Func, Target::Index(index, span));
        }
        Ok(())
    }

    /// `(memory $name (export "e")* min max? shared?)`
    fn memory(&mut self, node: &Node) -> Result<(), CompileError> {
        let name = node.name.as_ref().map(|n| n.name.as_str());
        let limits = limits(node, false)?;
        let index = self.builder.memory(name, limits, node.span)?;
        self.inline_exports(node, ExportKind::Memory, index)
    }

    /// `(table $name (export "e")* min max? funcref)`
    fn table(&mut self, node: &Node) -> Result<(), CompileError> {
        let name = node.name.as_ref().map(|n| n.name.as_str());
        let limits = limits(node, true)?;
        let index = self.builder.table(name, limits);
        self.inline_exports(node, ExportKind::Table, index)
    }

    /// `(global $name (export "e")* type init)` with `type` either a value
    /// type or `(mut valtype)`.
    fn global(&mut self, node: &Node) -> Result<(), CompileError> {
        let name = node.name.as_ref().map(|n| n.name.as_str());
        let mut rest = node.children.iter().filter(|e| !e.is_node("export"));
        let ty = rest
            .next()
            .ok_or_else(|| CompileError::malformed("global requires a type", node.span))?;
        let (ty, mutable) = global_type(ty)?;

        let mut init = Vec::new();
        FunctionCompiler::new(&mut self.builder, FunctionContext::new()).evaluate_all(rest, &mut init)?;

        let index = self.builder.global(name, Global { ty, mutable, init });
        self.inline_exports(node, ExportKind::Global, index)
    }

    /// `(export "name" (func|memory|global|table $name-or-index))`
    fn export(&mut self, node: &Node) -> Result<(), CompileError> {
        let (name, _) = export_name(node)?;
        let desc = node
            .child_nodes()
            .next()
            .ok_or_else(|| CompileError::malformed("export requires a descriptor", node.span))?;
        let kind = ExportKind::from_name(&desc.instr)
            .ok_or_else(|| CompileError::malformed(format!("unsupported export {}", desc.instr), desc.span))?;
        self.builder.export(&name, kind, target(desc)?);
        Ok(())
    }

    /// `(elem offset-expr func-ref*)`, where the offset may be wrapped in
    /// `(offset ...)` and the references may follow a `func` keyword.
    fn elem(&mut self, node: &Node) -> Result<(), CompileError> {
        let mut children = node.children.iter();
        let offset_expr = children
            .next()
            .and_then(Expr::as_node)
            .ok_or_else(|| CompileError::malformed("elem requires an offset", node.span))?;
        let offset = self.offset(offset_expr)?;

        let mut funcs = Vec::new();
        for child in children {
            match child {
                Expr::Ref { name, span } => funcs.push(Target::Name(name.clone(), *span)),
                Expr::Node(func) if func.instr == "func" => {
                    if let Some(name) = &func.name {
                        funcs.push(Target::Name(name.name.clone(), name.span));
                    }
                    for param in &func.params {
                        funcs.push(param_target(&param.kind, param.span)?);
                    }
                }
                other => return Err(CompileError::malformed("expected a function reference", other.span())),
            }
        }
        for param in &node.params {
            funcs.push(param_target(&param.kind, param.span)?);
        }

        self.builder.elem(offset, funcs, node.span);
        Ok(())
    }

    /// `(data offset-expr "bytes"*)`
    fn data(&mut self, node: &Node) -> Result<(), CompileError> {
        let mut children = node.children.iter();
        let offset_expr = children
            .next()
            .and_then(Expr::as_node)
            .ok_or_else(|| CompileError::malformed("data requires an offset", node.span))?;
        let offset = self.offset(offset_expr)?;

        let mut bytes = Vec::new();
        for child in children {
            match child {
                Expr::Data { bytes: data, .. } => bytes.extend_from_slice(data),
                other => return Err(CompileError::malformed("expected a string", other.span())),
            }
        }
        for param in &node.params {
            match &param.kind {
                ParamKind::Str(data) => bytes.extend_from_slice(data),
                other => {
                    return Err(CompileError::malformed(
                        format!("unexpected argument {}", other.describe()),
                        param.span,
                    ));
                }
            }
        }

        self.builder.data(offset, bytes);
        Ok(())
    }

    /// `(start $name-or-index)`
    fn start(&mut self, node: &Node) -> Result<(), CompileError> {
        let target = target(node)?;
        self.builder.start(target);
        Ok(())
    }

    /// Evaluate an offset expression, unwrapping `(offset ...)`.
    fn offset(&mut self, node: &Node) -> Result<Vec<u8>, CompileError> {
        let mut out = Vec::new();
        let mut compiler = FunctionCompiler::new(&mut self.builder, FunctionContext::new());
        if node.instr == Reserved::Offset.as_str() {
            compiler.evaluate_all(&node.children, &mut out)?;
        } else {
            compiler.evaluate_node(node, &mut out)?;
        }
        Ok(out)
    }

    fn inline_exports(&mut self, node: &Node, kind: ExportKind, index: u32) -> Result<(), CompileError> {
        for export in node.child_nodes().filter(|n| n.instr == "export") {
            let (name, span) = export_name(export)?;
            self.builder.export(&name, kind, Target::Index(index, span));
        }
        Ok(())
    }
}

// ===========================================================================
// Field shapes
// ===========================================================================

fn string_param(node: &Node, position: usize, what: &str) -> Result<String, CompileError> {
    match node.params.get(position).map(|p| &p.kind) {
        Some(ParamKind::Str(bytes)) => String::from_utf8(bytes.clone())
            .map_err(|_| CompileError::malformed(format!("{what} must be valid UTF-8"), node.params[position].span)),
        _ => Err(CompileError::malformed(format!("{} requires a {what}", node.instr), node.span)),
    }
}

fn import_names(node: &Node) -> Result<(String, String), CompileError> {
    Ok((string_param(node, 0, "module name")?, string_param(node, 1, "field name")?))
}

fn export_name(node: &Node) -> Result<(String, Span), CompileError> {
    Ok((string_param(node, 0, "name")?, node.span))
}

/// The named entity of an `export` descriptor or `start`: its name label or
/// a numeric index.
fn target(node: &Node) -> Result<Target, CompileError> {
    if let Some(name) = &node.name {
        return Ok(Target::Name(name.name.clone(), name.span));
    }
    match node.params.as_slice() {
        [param] => param_target(&param.kind, param.span),
        _ => Err(CompileError::malformed(format!("{} requires a reference", node.instr), node.span)),
    }
}

fn param_target(kind: &ParamKind, span: Span) -> Result<Target, CompileError> {
    match kind {
        ParamKind::Label(name) => Ok(Target::Name(name.clone(), span)),
        ParamKind::Number(text) | ParamKind::Hex(text) => Ok(Target::Index(parse_u32(text, span)?, span)),
        other => Err(CompileError::malformed(format!("unexpected argument {}", other.describe()), span)),
    }
}

/// The slots declared by a `param` or `local` node. A named declaration
/// holds exactly one type; an anonymous one declares a slot per type.
fn named_slots(node: &Node) -> Result<Vec<(Option<&str>, ValType)>, CompileError> {
    let types = value_types(node)?;
    match &node.name {
        Some(name) if types.len() == 1 => Ok(vec![(Some(name.name.as_str()), types[0])]),
        Some(name) => Err(CompileError::malformed(
            format!("{} ${} must have exactly one type", node.instr, name.name),
            node.span,
        )),
        None => Ok(types.into_iter().map(|t| (None, t)).collect()),
    }
}

/// A global's type: `valtype` or `(mut valtype)`.
fn global_type(expr: &Expr) -> Result<(ValType, bool), CompileError> {
    match expr.as_node() {
        Some(node) if node.instr == "mut" => match node.children.as_slice() {
            [inner] => Ok((value_type(inner)?, true)),
            _ => Err(CompileError::malformed("mut requires one value type", node.span)),
        },
        _ => Ok((value_type(expr)?, false)),
    }
}

/// Limits from numeric parameters, with `shared` for memories and
/// `funcref` for tables.
fn limits(node: &Node, table: bool) -> Result<Limits, CompileError> {
    let mut bounds = Vec::new();
    let mut shared = false;

    for param in &node.params {
        match &param.kind {
            ParamKind::Number(text) | ParamKind::Hex(text) => bounds.push(parse_u32(text, param.span)?),
            ParamKind::Reserved {
                key: Reserved::Shared,
                value: None,
            } if !table => shared = true,
            ParamKind::Reserved {
                key: Reserved::Funcref,
                value: None,
            } if table => {}
            other => {
                return Err(CompileError::malformed(
                    format!("unexpected argument {}", other.describe()),
                    param.span,
                ));
            }
        }
    }

    match bounds.as_slice() {
        [min] => Ok(Limits { min: *min, max: None, shared }),
        [min, max] => Ok(Limits {
            min: *min,
            max: Some(*max),
            shared,
        }),
        _ => Err(CompileError::malformed(format!("{} requires limits", node.instr), node.span)),
    }
}
