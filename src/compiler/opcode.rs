//! The closed set of instructions the compiler knows how to encode.
//!
//! Each opcode carries its text name, its byte and the shape of the
//! immediates that follow the byte. Text names are mapped once, in
//! [`Opcode::from_name`]; everything after that is an exhaustive `match`.

/// The immediates following an opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Immediate {
    None,
    /// `block`, `loop` and `if`: a block type, a body and `end`.
    Structured,
    /// A branch target depth.
    Label,
    /// A vector of depths and a default depth.
    LabelTable,
    Func,
    /// A type index and the table index.
    CallIndirect,
    Local,
    Global,
    /// Alignment exponent and offset. Holds the natural alignment exponent.
    MemArg(u32),
    /// The reserved memory index byte of `memory.size` and `memory.grow`.
    MemoryIndex,
    I32,
    I64,
    F32,
    F64,
}

macro_rules! opcodes {
    ($($variant:ident = $name:literal, $byte:literal, $imm:ident $(($arg:expr))?;)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $($variant,)*
        }

        impl Opcode {
            pub fn from_name(name: &str) -> Option<Opcode> {
                match name {
                    $($name => Some(Opcode::$variant),)*
                    _ => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(Opcode::$variant => $name,)*
                }
            }

            pub fn byte(self) -> u8 {
                match self {
                    $(Opcode::$variant => $byte,)*
                }
            }

            pub fn immediate(self) -> Immediate {
                match self {
                    $(Opcode::$variant => Immediate::$imm $(($arg))?,)*
                }
            }

            /// Every opcode, in byte order.
            pub const ALL: &'static [Opcode] = &[$(Opcode::$variant,)*];
        }
    };
}

opcodes! {
    // Control
    Unreachable = "unreachable", 0x00, None;
    Nop = "nop", 0x01, None;
    Block = "block", 0x02, Structured;
    Loop = "loop", 0x03, Structured;
    If = "if", 0x04, Structured;
    Br = "br", 0x0C, Label;
    BrIf = "br_if", 0x0D, Label;
    BrTable = "br_table", 0x0E, LabelTable;
    Return = "return", 0x0F, None;
    Call = "call", 0x10, Func;
    CallIndirect = "call_indirect", 0x11, CallIndirect;

    // Parametric
    Drop = "drop", 0x1A, None;
    Select = "select", 0x1B, None;

    // Variables
    LocalGet = "local.get", 0x20, Local;
    LocalSet = "local.set", 0x21, Local;
    LocalTee = "local.tee", 0x22, Local;
    GlobalGet = "global.get", 0x23, Global;
    GlobalSet = "global.set", 0x24, Global;

    // Memory
    I32Load = "i32.load", 0x28, MemArg(2);
    I64Load = "i64.load", 0x29, MemArg(3);
    F32Load = "f32.load", 0x2A, MemArg(2);
    F64Load = "f64.load", 0x2B, MemArg(3);
    I32Load8S = "i32.load8_s", 0x2C, MemArg(0);
    I32Load8U = "i32.load8_u", 0x2D, MemArg(0);
    I32Load16S = "i32.load16_s", 0x2E, MemArg(1);
    I32Load16U = "i32.load16_u", 0x2F, MemArg(1);
    I64Load8S = "i64.load8_s", 0x30, MemArg(0);
    I64Load8U = "i64.load8_u", 0x31, MemArg(0);
    I64Load16S = "i64.load16_s", 0x32, MemArg(1);
    I64Load16U = "i64.load16_u", 0x33, MemArg(1);
    I64Load32S = "i64.load32_s", 0x34, MemArg(2);
    I64Load32U = "i64.load32_u", 0x35, MemArg(2);
    I32Store = "i32.store", 0x36, MemArg(2);
    I64Store = "i64.store", 0x37, MemArg(3);
    F32Store = "f32.store", 0x38, MemArg(2);
    F64Store = "f64.store", 0x39, MemArg(3);
    I32Store8 = "i32.store8", 0x3A, MemArg(0);
    I32Store16 = "i32.store16", 0x3B, MemArg(1);
    I64Store8 = "i64.store8", 0x3C, MemArg(0);
    I64Store16 = "i64.store16", 0x3D, MemArg(1);
    I64Store32 = "i64.store32", 0x3E, MemArg(2);
    MemorySize = "memory.size", 0x3F, MemoryIndex;
    MemoryGrow = "memory.grow", 0x40, MemoryIndex;

    // Constants
    I32Const = "i32.const", 0x41, I32;
    I64Const = "i64.const", 0x42, I64;
    F32Const = "f32.const", 0x43, F32;
    F64Const = "f64.const", 0x44, F64;

    // Comparison
    I32Eqz = "i32.eqz", 0x45, None;
    I32Eq = "i32.eq", 0x46, None;
    I32Ne = "i32.ne", 0x47, None;
    I32LtS = "i32.lt_s", 0x48, None;
    I32LtU = "i32.lt_u", 0x49, None;
    I32GtS = "i32.gt_s", 0x4A, None;
    I32GtU = "i32.gt_u", 0x4B, None;
    I32LeS = "i32.le_s", 0x4C, None;
    I32LeU = "i32.le_u", 0x4D, None;
    I32GeS = "i32.ge_s", 0x4E, None;
    I32GeU = "i32.ge_u", 0x4F, None;
    I64Eqz = "i64.eqz", 0x50, None;
    I64Eq = "i64.eq", 0x51, None;
    I64Ne = "i64.ne", 0x52, None;
    I64LtS = "i64.lt_s", 0x53, None;
    I64LtU = "i64.lt_u", 0x54, None;
    I64GtS = "i64.gt_s", 0x55, None;
    I64GtU = "i64.gt_u", 0x56, None;
    I64LeS = "i64.le_s", 0x57, None;
    I64LeU = "i64.le_u", 0x58, None;
    I64GeS = "i64.ge_s", 0x59, None;
    I64GeU = "i64.ge_u", 0x5A, None;
    F32Eq = "f32.eq", 0x5B, None;
    F32Ne = "f32.ne", 0x5C, None;
    F32Lt = "f32.lt", 0x5D, None;
    F32Gt = "f32.gt", 0x5E, None;
    F32Le = "f32.le", 0x5F, None;
    F32Ge = "f32.ge", 0x60, None;
    F64Eq = "f64.eq", 0x61, None;
    F64Ne = "f64.ne", 0x62, None;
    F64Lt = "f64.lt", 0x63, None;
    F64Gt = "f64.gt", 0x64, None;
    F64Le = "f64.le", 0x65, None;
    F64Ge = "f64.ge", 0x66, None;

    // Numeric
    I32Clz = "i32.clz", 0x67, None;
    I32Ctz = "i32.ctz", 0x68, None;
    I32Popcnt = "i32.popcnt", 0x69, None;
    I32Add = "i32.add", 0x6A, None;
    I32Sub = "i32.sub", 0x6B, None;
    I32Mul = "i32.mul", 0x6C, None;
    I32DivS = "i32.div_s", 0x6D, None;
    I32DivU = "i32.div_u", 0x6E, None;
    I32RemS = "i32.rem_s", 0x6F, None;
    I32RemU = "i32.rem_u", 0x70, None;
    I32And = "i32.and", 0x71, None;
    I32Or = "i32.or", 0x72, None;
    I32Xor = "i32.xor", 0x73, None;
    I32Shl = "i32.shl", 0x74, None;
    I32ShrS = "i32.shr_s", 0x75, None;
    I32ShrU = "i32.shr_u", 0x76, None;
    I32Rotl = "i32.rotl", 0x77, None;
    I32Rotr = "i32.rotr", 0x78, None;
    I64Clz = "i64.clz", 0x79, None;
    I64Ctz = "i64.ctz", 0x7A, None;
    I64Popcnt = "i64.popcnt", 0x7B, None;
    I64Add = "i64.add", 0x7C, None;
    I64Sub = "i64.sub", 0x7D, None;
    I64Mul = "i64.mul", 0x7E, None;
    I64DivS = "i64.div_s", 0x7F, None;
    I64DivU = "i64.div_u", 0x80, None;
    I64RemS = "i64.rem_s", 0x81, None;
    I64RemU = "i64.rem_u", 0x82, None;
    I64And = "i64.and", 0x83, None;
    I64Or = "i64.or", 0x84, None;
    I64Xor = "i64.xor", 0x85, None;
    I64Shl = "i64.shl", 0x86, None;
    I64ShrS = "i64.shr_s", 0x87, None;
    I64ShrU = "i64.shr_u", 0x88, None;
    I64Rotl = "i64.rotl", 0x89, None;
    I64Rotr = "i64.rotr", 0x8A, None;
    F32Abs = "f32.abs", 0x8B, None;
    F32Neg = "f32.neg", 0x8C, None;
    F32Ceil = "f32.ceil", 0x8D, None;
    F32Floor = "f32.floor", 0x8E, None;
    F32Trunc = "f32.trunc", 0x8F, None;
    F32Nearest = "f32.nearest", 0x90, None;
    F32Sqrt = "f32.sqrt", 0x91, None;
    F32Add = "f32.add", 0x92, None;
    F32Sub = "f32.sub", 0x93, None;
    F32Mul = "f32.mul", 0x94, None;
    F32Div = "f32.div", 0x95, None;
    F32Min = "f32.min", 0x96, None;
    F32Max = "f32.max", 0x97, None;
    F32Copysign = "f32.copysign", 0x98, None;
    F64Abs = "f64.abs", 0x99, None;
    F64Neg = "f64.neg", 0x9A, None;
    F64Ceil = "f64.ceil", 0x9B, None;
    F64Floor = "f64.floor", 0x9C, None;
    F64Trunc = "f64.trunc", 0x9D, None;
    F64Nearest = "f64.nearest", 0x9E, None;
    F64Sqrt = "f64.sqrt", 0x9F, None;
    F64Add = "f64.add", 0xA0, None;
    F64Sub = "f64.sub", 0xA1, None;
    F64Mul = "f64.mul", 0xA2, None;
    F64Div = "f64.div", 0xA3, None;
    F64Min = "f64.min", 0xA4, None;
    F64Max = "f64.max", 0xA5, None;
    F64Copysign = "f64.copysign", 0xA6, None;

    // Conversions
    I32WrapI64 = "i32.wrap_i64", 0xA7, None;
    I32TruncF32S = "i32.trunc_f32_s", 0xA8, None;
    I32TruncF32U = "i32.trunc_f32_u", 0xA9, None;
    I32TruncF64S = "i32.trunc_f64_s", 0xAA, None;
    I32TruncF64U = "i32.trunc_f64_u", 0xAB, None;
    I64ExtendI32S = "i64.extend_i32_s", 0xAC, None;
    I64ExtendI32U = "i64.extend_i32_u", 0xAD, None;
    I64TruncF32S = "i64.trunc_f32_s", 0xAE, None;
    I64TruncF32U = "i64.trunc_f32_u", 0xAF, None;
    I64TruncF64S = "i64.trunc_f64_s", 0xB0, None;
    I64TruncF64U = "i64.trunc_f64_u", 0xB1, None;
    F32ConvertI32S = "f32.convert_i32_s", 0xB2, None;
    F32ConvertI32U = "f32.convert_i32_u", 0xB3, None;
    F32ConvertI64S = "f32.convert_i64_s", 0xB4, None;
    F32ConvertI64U = "f32.convert_i64_u", 0xB5, None;
    F32DemoteF64 = "f32.demote_f64", 0xB6, None;
    F64ConvertI32S = "f64.convert_i32_s", 0xB7, None;
    F64ConvertI32U = "f64.convert_i32_u", 0xB8, None;
    F64ConvertI64S = "f64.convert_i64_s", 0xB9, None;
    F64ConvertI64U = "f64.convert_i64_u", 0xBA, None;
    F64PromoteF32 = "f64.promote_f32", 0xBB, None;
    I32ReinterpretF32 = "i32.reinterpret_f32", 0xBC, None;
    I64ReinterpretF64 = "i64.reinterpret_f64", 0xBD, None;
    F32ReinterpretI32 = "f32.reinterpret_i32", 0xBE, None;
    F64ReinterpretI64 = "f64.reinterpret_i64", 0xBF, None;

    // Sign extension
    I32Extend8S = "i32.extend8_s", 0xC0, None;
    I32Extend16S = "i32.extend16_s", 0xC1, None;
    I64Extend8S = "i64.extend8_s", 0xC2, None;
    I64Extend16S = "i64.extend16_s", 0xC3, None;
    I64Extend32S = "i64.extend32_s", 0xC4, None;
}
