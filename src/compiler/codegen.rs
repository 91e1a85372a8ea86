//! Instruction evaluation: tree nodes to instruction bytes.
//!
//! A plain instruction is emitted as its folded operands, then its opcode
//! byte, then its immediates. The instruction's name label and leaf
//! parameters together make up the immediate arguments, so `call $f`,
//! `(call $f)` and `call 3` all take the same path.
//!
//! Symbolic arguments resolve in the index space the immediate's kind
//! dictates: locals for `local.*`, functions for `call`, label depth for the
//! branch family, and so on. There is no fallback between spaces.

use log::trace;

use super::context::{FunctionContext, Namespace};
use super::literal::{parse_f32, parse_f64, parse_i32, parse_i64, parse_u32};
use super::opcode::{Immediate, Opcode};
use crate::builder::{block_type, FuncType, ModuleBuilder, ValType};
use crate::encoding::{write_f32, write_f64, write_vs32, write_vs64, write_vu32, OP_ELSE, OP_END};
use crate::error::CompileError;
use crate::wat::{Expr, Node, Param, ParamKind, Reserved, Span};

/// Compiles instruction sequences within one function's scope.
pub struct FunctionCompiler<'b> {
    builder: &'b mut ModuleBuilder,
    ctx: FunctionContext,
}

impl<'b> FunctionCompiler<'b> {
    pub fn new(builder: &'b mut ModuleBuilder, ctx: FunctionContext) -> Self {
        Self { builder, ctx }
    }

    /// Evaluate a sequence of expressions, appending their bytes to `out`.
    pub fn evaluate_all<'e>(
        &mut self,
        exprs: impl IntoIterator<Item = &'e Expr>,
        out: &mut Vec<u8>,
    ) -> Result<(), CompileError> {
        for expr in exprs {
            self.evaluate(expr, out)?;
        }
        Ok(())
    }

    pub fn evaluate(&mut self, expr: &Expr, out: &mut Vec<u8>) -> Result<(), CompileError> {
        let node = match expr {
            Expr::Node(node) => node,
            Expr::Ref { name, span } => {
                return Err(CompileError::malformed(format!("unexpected reference ${name}"), *span));
            }
            Expr::Data { span, .. } => return Err(CompileError::malformed("unexpected string", *span)),
        };
        self.evaluate_node(node, out)
    }

    pub fn evaluate_node(&mut self, node: &Node, out: &mut Vec<u8>) -> Result<(), CompileError> {
        let op = match Opcode::from_name(&node.instr) {
            Some(op) => op,
            None if matches!(node.instr.as_str(), "then" | "else" | "end") => {
                return Err(CompileError::malformed(format!("unexpected {}", node.instr), node.span));
            }
            None => {
                return Err(CompileError::UnknownInstruction {
                    name: node.instr.clone(),
                    span: node.span,
                });
            }
        };

        match op.immediate() {
            Immediate::Structured => self.structured(op, node, out),
            Immediate::CallIndirect => self.call_indirect(node, out),
            immediate => {
                self.evaluate_all(&node.children, out)?;
                out.push(op.byte());
                self.immediates(op, immediate, node, out)
            }
        }
    }

    fn immediates(&mut self, op: Opcode, immediate: Immediate, node: &Node, out: &mut Vec<u8>) -> Result<(), CompileError> {
        let args = arguments(node);
        let single = || one_argument(op, &args, node.span);

        match immediate {
            Immediate::None => no_arguments(op, &args),
            Immediate::Label => {
                let depth = self.label_depth(single()?)?;
                write_vu32(out, depth);
                Ok(())
            }
            Immediate::LabelTable => {
                if args.is_empty() {
                    return Err(missing_immediate(op, node.span));
                }
                let depths = args
                    .iter()
                    .map(|arg| self.label_depth(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                write_vu32(out, depths.len() as u32 - 1);
                for depth in depths {
                    write_vu32(out, depth);
                }
                Ok(())
            }
            Immediate::Func => self.index(Namespace::Function, single()?, out),
            Immediate::Local => self.index(Namespace::Local, single()?, out),
            Immediate::Global => self.index(Namespace::Global, single()?, out),
            Immediate::MemArg(natural) => memarg(natural, &args, out),
            Immediate::MemoryIndex => {
                no_arguments(op, &args)?;
                out.push(0x00);
                Ok(())
            }
            Immediate::I32 => {
                let (text, span) = numeric(single()?)?;
                write_vs32(out, parse_i32(text, span)?);
                Ok(())
            }
            Immediate::I64 => {
                let (text, span) = numeric(single()?)?;
                write_vs64(out, parse_i64(text, span)?);
                Ok(())
            }
            Immediate::F32 => {
                let (text, span) = numeric(single()?)?;
                write_f32(out, parse_f32(text, span)?);
                Ok(())
            }
            Immediate::F64 => {
                let (text, span) = numeric(single()?)?;
                write_f64(out, parse_f64(text, span)?);
                Ok(())
            }
            Immediate::Structured | Immediate::CallIndirect => Ok(()),
        }
    }

    /// `block`, `loop` and `if`.
    ///
    /// ```text
    /// block bt instr* end
    /// loop  bt instr* end
    /// if    bt instr* (else instr*)? end
    /// ```
    fn structured(&mut self, op: Opcode, node: &Node, out: &mut Vec<u8>) -> Result<(), CompileError> {
        let (ty, type_use) = signature(self.builder, node)?;
        let body = node.children.iter().filter(|e| !is_signature(e));
        let label = node.name.as_ref().map(|n| n.name.as_str());

        if op != Opcode::If {
            out.push(op.byte());
            block_type(self.builder, ty, type_use, out);
            self.ctx.labels.push(label);
            self.evaluate_all(body, out)?;
            self.ctx.labels.pop();
            out.push(OP_END);
            return Ok(());
        }

        // The folded condition runs before the `if`, outside its label.
        let condition = body.filter(|e| !e.is_node("then") && !e.is_node("else"));
        self.evaluate_all(condition, out)?;

        let then = node
            .child("then")
            .ok_or_else(|| CompileError::malformed("if requires a then branch", node.span))?;
        out.push(op.byte());
        block_type(self.builder, ty, type_use, out);
        self.ctx.labels.push(label);
        self.evaluate_all(&then.children, out)?;
        if let Some(otherwise) = node.child("else") {
            out.push(OP_ELSE);
            self.evaluate_all(&otherwise.children, out)?;
        }
        self.ctx.labels.pop();
        out.push(OP_END);
        Ok(())
    }

    /// `call_indirect` with a `(type)` use or an inline signature, and the
    /// table slot as its trailing operand.
    fn call_indirect(&mut self, node: &Node, out: &mut Vec<u8>) -> Result<(), CompileError> {
        let args = arguments(node);
        let type_idx = match (args.first(), node.has_child("type")) {
            (Some(arg), false) => {
                if args.len() > 1 {
                    return Err(CompileError::malformed("call_indirect takes one type", args[1].span));
                }
                type_index(self.builder, arg)?
            }
            (Some(arg), true) => return Err(CompileError::malformed("call_indirect takes one type", arg.span)),
            (None, _) => signature_index(self.builder, node)?,
        };

        let operands = node.children.iter().filter(|e| !is_signature(e));
        self.evaluate_all(operands, out)?;
        out.push(Opcode::CallIndirect.byte());
        write_vu32(out, type_idx);
        out.push(0x00);
        Ok(())
    }

    fn label_depth(&self, arg: &Param) -> Result<u32, CompileError> {
        match &arg.kind {
            ParamKind::Label(name) => self.ctx.resolve_label(name, arg.span),
            ParamKind::Number(text) | ParamKind::Hex(text) => parse_u32(text, arg.span),
            other => Err(unexpected_argument(other, arg.span)),
        }
    }

    fn index(&self, space: Namespace, arg: &Param, out: &mut Vec<u8>) -> Result<(), CompileError> {
        let index = match &arg.kind {
            ParamKind::Label(name) if space == Namespace::Local => self.ctx.resolve_local(name, arg.span)?,
            ParamKind::Label(name) => self.builder.resolve(space, name, arg.span)?,
            ParamKind::Number(text) | ParamKind::Hex(text) => parse_u32(text, arg.span)?,
            other => return Err(unexpected_argument(other, arg.span)),
        };
        trace!("{space} {} -> {index}", arg.kind.describe());
        write_vu32(out, index);
        Ok(())
    }
}

// ===========================================================================
// Arguments
// ===========================================================================

/// The immediate arguments of a node: its name label, then its parameters.
fn arguments(node: &Node) -> Vec<Param> {
    let name = node.name.iter().map(|n| Param {
        kind: ParamKind::Label(n.name.clone()),
        span: n.span,
    });
    name.chain(node.params.iter().cloned()).collect()
}

fn one_argument<'p>(op: Opcode, args: &'p [Param], span: Span) -> Result<&'p Param, CompileError> {
    match args {
        [arg] => Ok(arg),
        [] => Err(missing_immediate(op, span)),
        [_, extra, ..] => Err(unexpected_argument(&extra.kind, extra.span)),
    }
}

fn no_arguments(op: Opcode, args: &[Param]) -> Result<(), CompileError> {
    match args.first() {
        None => Ok(()),
        Some(arg) => Err(CompileError::malformed(
            format!("unexpected immediate {} for {}", arg.kind.describe(), op.name()),
            arg.span,
        )),
    }
}

fn numeric(arg: &Param) -> Result<(&str, Span), CompileError> {
    match &arg.kind {
        ParamKind::Number(text) | ParamKind::Hex(text) => Ok((text.as_str(), arg.span)),
        other => Err(unexpected_argument(other, arg.span)),
    }
}

fn missing_immediate(op: Opcode, span: Span) -> CompileError {
    CompileError::malformed(format!("missing immediate for {}", op.name()), span)
}

fn unexpected_argument(kind: &ParamKind, span: Span) -> CompileError {
    CompileError::malformed(format!("unexpected argument {}", kind.describe()), span)
}

/// Encodes a memory immediate.
///
/// ```text
/// memarg ::= align:u32 offset:u32
/// ```
///
/// `align` is the exponent: `align=8` is written as 3.
fn memarg(natural: u32, args: &[Param], out: &mut Vec<u8>) -> Result<(), CompileError> {
    let mut align = natural;
    let mut offset = 0;

    for arg in args {
        match &arg.kind {
            ParamKind::Reserved {
                key: Reserved::Offset,
                value: Some(text),
            } => offset = parse_u32(text, arg.span)?,
            ParamKind::Reserved {
                key: Reserved::Align,
                value: Some(text),
            } => {
                let bytes = parse_u32(text, arg.span)?;
                if !bytes.is_power_of_two() {
                    return Err(CompileError::malformed("alignment must be a power of two", arg.span));
                }
                align = bytes.trailing_zeros();
            }
            other => return Err(unexpected_argument(other, arg.span)),
        }
    }

    write_vu32(out, align);
    write_vu32(out, offset);
    Ok(())
}

// ===========================================================================
// Types
// ===========================================================================

pub(super) fn is_signature(expr: &Expr) -> bool {
    expr.is_node("param") || expr.is_node("result") || expr.is_node("type")
}

/// The value types listed as children of a `param`, `result` or `local`
/// node.
pub(super) fn value_types(node: &Node) -> Result<Vec<ValType>, CompileError> {
    node.children.iter().map(value_type).collect()
}

pub(super) fn value_type(expr: &Expr) -> Result<ValType, CompileError> {
    match expr.as_node() {
        Some(node) if node.params.is_empty() && node.children.is_empty() && node.name.is_none() => {
            ValType::from_name(&node.instr)
                .ok_or_else(|| CompileError::malformed(format!("unknown value type {}", node.instr), node.span))
        }
        _ => Err(CompileError::malformed("expected a value type", expr.span())),
    }
}

/// Resolve a type reference: `$name` or a numeric index.
pub(super) fn type_index(builder: &ModuleBuilder, arg: &Param) -> Result<u32, CompileError> {
    let index = match &arg.kind {
        ParamKind::Label(name) => builder.get_type(name, arg.span)?,
        ParamKind::Number(text) | ParamKind::Hex(text) => parse_u32(text, arg.span)?,
        other => return Err(unexpected_argument(other, arg.span)),
    };
    match builder.type_at(index) {
        Some(_) => Ok(index),
        None => Err(CompileError::malformed(format!("unknown type {index}"), arg.span)),
    }
}

/// The index named by a `(type $t)` or `(type 0)` node.
pub(super) fn type_use(builder: &ModuleBuilder, node: &Node) -> Result<u32, CompileError> {
    let args = arguments(node);
    match args.as_slice() {
        [arg] => type_index(builder, arg),
        _ => Err(CompileError::malformed("expected one type reference", node.span)),
    }
}

/// Resolve a `(type)` use. Inline params and results written beside it
/// must repeat the used signature exactly.
pub(super) fn matched_type_use(
    builder: &ModuleBuilder,
    use_node: &Node,
    inline: Option<&FuncType>,
) -> Result<u32, CompileError> {
    let index = type_use(builder, use_node)?;
    match (builder.type_at(index), inline) {
        (Some(used), Some(inline)) if used != inline => {
            Err(CompileError::malformed("inline function type", use_node.span))
        }
        _ => Ok(index),
    }
}

/// The signature given by a node's `(type)`, `(param)` and `(result)`
/// children, with the type index when a type use was written.
pub(super) fn signature(builder: &ModuleBuilder, node: &Node) -> Result<(FuncType, Option<u32>), CompileError> {
    let mut inline = FuncType::default();
    let mut written = false;
    for child in node.child_nodes() {
        match child.instr.as_str() {
            "param" => inline.params.extend(value_types(child)?),
            "result" => inline.results.extend(value_types(child)?),
            _ => continue,
        }
        written = true;
    }

    match node.child("type") {
        Some(use_node) => {
            let index = matched_type_use(builder, use_node, written.then_some(&inline))?;
            let ty = builder.type_at(index).cloned().unwrap_or_default();
            Ok((ty, Some(index)))
        }
        None => Ok((inline, None)),
    }
}

/// The type index of a node's signature, registering an inline one.
pub(super) fn signature_index(builder: &mut ModuleBuilder, node: &Node) -> Result<u32, CompileError> {
    match signature(builder, node)? {
        (_, Some(index)) => Ok(index),
        (ty, None) => Ok(builder.find_or_add_type(ty)),
    }
}
