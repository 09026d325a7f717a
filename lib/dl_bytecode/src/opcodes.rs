//! Dalvik opcode table.
//!
//! Every opcode is described once, with its encoding value, mnemonic,
//! format and family, through the `opcode_derive::Opcode` derive. Unused
//! opcode values and the method-handle related opcodes (`0xfa`-`0xff`) are
//! deliberately absent: decoding them yields no [`Opcode`].

use crate::formats::Format;
use opcode_derive::Opcode;
use serde::Serialize;
use std::fmt;

/// Opcode families, each one being handled by a single lowering rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Family {
    Nop,
    Move,
    MoveResult,
    MoveException,
    ReturnVoid,
    Return,
    Const,
    ConstString,
    ConstClass,
    MonitorEnter,
    MonitorExit,
    CheckCast,
    InstanceOf,
    ArrayLength,
    NewInstance,
    NewArray,
    FilledNewArray,
    FillArrayData,
    Throw,
    Goto,
    Switch,
    Cmp,
    If,
    IfZ,
    Aget,
    Aput,
    Iget,
    Iput,
    Sget,
    Sput,
    Invoke,
    Neg,
    Not,
    Convert,
    Binop,
    Binop2addr,
    BinopLit,
}

/// Operand kind declared by an opcode.
///
/// `Narrow` and `Wide` are the untyped single and double register
/// variants (`move`, `aget-wide`, `const/4`, ...), the sub-int kinds are
/// only used by array and field accessors and by int narrowing conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OperandKind {
    Int,
    Long,
    Float,
    Double,
    Object,
    Narrow,
    Wide,
    Boolean,
    Byte,
    Char,
    Short,
}

impl OperandKind {
    #[must_use]
    pub const fn is_wide(self) -> bool {
        matches!(self, Self::Long | Self::Double | Self::Wide)
    }
}

/// Constant pool section referenced by an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReferenceKind {
    String,
    Type,
    Field,
    Method,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Type => write!(f, "type"),
            Self::Field => write!(f, "field"),
            Self::Method => write!(f, "method"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Opcode)]
pub enum Opcode {
    #[opcode(value = 0x00, mnemonic = "nop", format = "10x", family = "Nop")]
    Nop,
    #[opcode(value = 0x01, mnemonic = "move", format = "12x", family = "Move", kind = "Narrow")]
    Move,
    #[opcode(value = 0x02, mnemonic = "move/from16", format = "22x", family = "Move", kind = "Narrow")]
    MoveFrom16,
    #[opcode(value = 0x03, mnemonic = "move/16", format = "32x", family = "Move", kind = "Narrow")]
    Move16,
    #[opcode(value = 0x04, mnemonic = "move-wide", format = "12x", family = "Move", kind = "Wide")]
    MoveWide,
    #[opcode(value = 0x05, mnemonic = "move-wide/from16", format = "22x", family = "Move", kind = "Wide")]
    MoveWideFrom16,
    #[opcode(value = 0x06, mnemonic = "move-wide/16", format = "32x", family = "Move", kind = "Wide")]
    MoveWide16,
    #[opcode(value = 0x07, mnemonic = "move-object", format = "12x", family = "Move", kind = "Object")]
    MoveObject,
    #[opcode(value = 0x08, mnemonic = "move-object/from16", format = "22x", family = "Move", kind = "Object")]
    MoveObjectFrom16,
    #[opcode(value = 0x09, mnemonic = "move-object/16", format = "32x", family = "Move", kind = "Object")]
    MoveObject16,
    #[opcode(value = 0x0a, mnemonic = "move-result", format = "11x", family = "MoveResult", kind = "Narrow")]
    MoveResult,
    #[opcode(value = 0x0b, mnemonic = "move-result-wide", format = "11x", family = "MoveResult", kind = "Wide")]
    MoveResultWide,
    #[opcode(value = 0x0c, mnemonic = "move-result-object", format = "11x", family = "MoveResult", kind = "Object")]
    MoveResultObject,
    #[opcode(value = 0x0d, mnemonic = "move-exception", format = "11x", family = "MoveException", kind = "Object")]
    MoveException,
    #[opcode(value = 0x0e, mnemonic = "return-void", format = "10x", family = "ReturnVoid")]
    ReturnVoid,
    #[opcode(value = 0x0f, mnemonic = "return", format = "11x", family = "Return", kind = "Narrow")]
    Return,
    #[opcode(value = 0x10, mnemonic = "return-wide", format = "11x", family = "Return", kind = "Wide")]
    ReturnWide,
    #[opcode(value = 0x11, mnemonic = "return-object", format = "11x", family = "Return", kind = "Object")]
    ReturnObject,
    #[opcode(value = 0x12, mnemonic = "const/4", format = "11n", family = "Const", kind = "Narrow")]
    Const4,
    #[opcode(value = 0x13, mnemonic = "const/16", format = "21s", family = "Const", kind = "Narrow")]
    Const16,
    #[opcode(value = 0x14, mnemonic = "const", format = "31i", family = "Const", kind = "Narrow")]
    Const,
    #[opcode(value = 0x15, mnemonic = "const/high16", format = "21h", family = "Const", kind = "Narrow")]
    ConstHigh16,
    #[opcode(value = 0x16, mnemonic = "const-wide/16", format = "21s", family = "Const", kind = "Wide")]
    ConstWide16,
    #[opcode(value = 0x17, mnemonic = "const-wide/32", format = "31i", family = "Const", kind = "Wide")]
    ConstWide32,
    #[opcode(value = 0x18, mnemonic = "const-wide", format = "51l", family = "Const", kind = "Wide")]
    ConstWide,
    #[opcode(value = 0x19, mnemonic = "const-wide/high16", format = "21h", family = "Const", kind = "Wide")]
    ConstWideHigh16,
    #[opcode(value = 0x1a, mnemonic = "const-string", format = "21c", family = "ConstString", kind = "Object")]
    ConstString,
    #[opcode(value = 0x1b, mnemonic = "const-string/jumbo", format = "31c", family = "ConstString", kind = "Object")]
    ConstStringJumbo,
    #[opcode(value = 0x1c, mnemonic = "const-class", format = "21c", family = "ConstClass", kind = "Object", can_throw)]
    ConstClass,
    #[opcode(value = 0x1d, mnemonic = "monitor-enter", format = "11x", family = "MonitorEnter", kind = "Object", can_throw)]
    MonitorEnter,
    #[opcode(value = 0x1e, mnemonic = "monitor-exit", format = "11x", family = "MonitorExit", kind = "Object", can_throw)]
    MonitorExit,
    #[opcode(value = 0x1f, mnemonic = "check-cast", format = "21c", family = "CheckCast", kind = "Object", can_throw)]
    CheckCast,
    #[opcode(value = 0x20, mnemonic = "instance-of", format = "22c", family = "InstanceOf", kind = "Object", can_throw)]
    InstanceOf,
    #[opcode(value = 0x21, mnemonic = "array-length", format = "12x", family = "ArrayLength", kind = "Object", can_throw)]
    ArrayLength,
    #[opcode(value = 0x22, mnemonic = "new-instance", format = "21c", family = "NewInstance", kind = "Object", can_throw)]
    NewInstance,
    #[opcode(value = 0x23, mnemonic = "new-array", format = "22c", family = "NewArray", kind = "Object", can_throw)]
    NewArray,
    #[opcode(value = 0x24, mnemonic = "filled-new-array", format = "35c", family = "FilledNewArray", kind = "Object", can_throw)]
    FilledNewArray,
    #[opcode(value = 0x25, mnemonic = "filled-new-array/range", format = "3rc", family = "FilledNewArray", kind = "Object", can_throw)]
    FilledNewArrayRange,
    #[opcode(value = 0x26, mnemonic = "fill-array-data", format = "31t", family = "FillArrayData", kind = "Object", can_throw)]
    FillArrayData,
    #[opcode(value = 0x27, mnemonic = "throw", format = "11x", family = "Throw", kind = "Object", can_throw)]
    Throw,
    #[opcode(value = 0x28, mnemonic = "goto", format = "10t", family = "Goto")]
    Goto,
    #[opcode(value = 0x29, mnemonic = "goto/16", format = "20t", family = "Goto")]
    Goto16,
    #[opcode(value = 0x2a, mnemonic = "goto/32", format = "30t", family = "Goto")]
    Goto32,
    #[opcode(value = 0x2b, mnemonic = "packed-switch", format = "31t", family = "Switch", kind = "Int")]
    PackedSwitch,
    #[opcode(value = 0x2c, mnemonic = "sparse-switch", format = "31t", family = "Switch", kind = "Int")]
    SparseSwitch,
    #[opcode(value = 0x2d, mnemonic = "cmpl-float", format = "23x", family = "Cmp", kind = "Float")]
    CmplFloat,
    #[opcode(value = 0x2e, mnemonic = "cmpg-float", format = "23x", family = "Cmp", kind = "Float")]
    CmpgFloat,
    #[opcode(value = 0x2f, mnemonic = "cmpl-double", format = "23x", family = "Cmp", kind = "Double")]
    CmplDouble,
    #[opcode(value = 0x30, mnemonic = "cmpg-double", format = "23x", family = "Cmp", kind = "Double")]
    CmpgDouble,
    #[opcode(value = 0x31, mnemonic = "cmp-long", format = "23x", family = "Cmp", kind = "Long")]
    CmpLong,
    #[opcode(value = 0x32, mnemonic = "if-eq", format = "22t", family = "If")]
    IfEq,
    #[opcode(value = 0x33, mnemonic = "if-ne", format = "22t", family = "If")]
    IfNe,
    #[opcode(value = 0x34, mnemonic = "if-lt", format = "22t", family = "If")]
    IfLt,
    #[opcode(value = 0x35, mnemonic = "if-ge", format = "22t", family = "If")]
    IfGe,
    #[opcode(value = 0x36, mnemonic = "if-gt", format = "22t", family = "If")]
    IfGt,
    #[opcode(value = 0x37, mnemonic = "if-le", format = "22t", family = "If")]
    IfLe,
    #[opcode(value = 0x38, mnemonic = "if-eqz", format = "21t", family = "IfZ")]
    IfEqz,
    #[opcode(value = 0x39, mnemonic = "if-nez", format = "21t", family = "IfZ")]
    IfNez,
    #[opcode(value = 0x3a, mnemonic = "if-ltz", format = "21t", family = "IfZ")]
    IfLtz,
    #[opcode(value = 0x3b, mnemonic = "if-gez", format = "21t", family = "IfZ")]
    IfGez,
    #[opcode(value = 0x3c, mnemonic = "if-gtz", format = "21t", family = "IfZ")]
    IfGtz,
    #[opcode(value = 0x3d, mnemonic = "if-lez", format = "21t", family = "IfZ")]
    IfLez,
    #[opcode(value = 0x44, mnemonic = "aget", format = "23x", family = "Aget", kind = "Narrow", can_throw)]
    Aget,
    #[opcode(value = 0x45, mnemonic = "aget-wide", format = "23x", family = "Aget", kind = "Wide", can_throw)]
    AgetWide,
    #[opcode(value = 0x46, mnemonic = "aget-object", format = "23x", family = "Aget", kind = "Object", can_throw)]
    AgetObject,
    #[opcode(value = 0x47, mnemonic = "aget-boolean", format = "23x", family = "Aget", kind = "Boolean", can_throw)]
    AgetBoolean,
    #[opcode(value = 0x48, mnemonic = "aget-byte", format = "23x", family = "Aget", kind = "Byte", can_throw)]
    AgetByte,
    #[opcode(value = 0x49, mnemonic = "aget-char", format = "23x", family = "Aget", kind = "Char", can_throw)]
    AgetChar,
    #[opcode(value = 0x4a, mnemonic = "aget-short", format = "23x", family = "Aget", kind = "Short", can_throw)]
    AgetShort,
    #[opcode(value = 0x4b, mnemonic = "aput", format = "23x", family = "Aput", kind = "Narrow", can_throw)]
    Aput,
    #[opcode(value = 0x4c, mnemonic = "aput-wide", format = "23x", family = "Aput", kind = "Wide", can_throw)]
    AputWide,
    #[opcode(value = 0x4d, mnemonic = "aput-object", format = "23x", family = "Aput", kind = "Object", can_throw)]
    AputObject,
    #[opcode(value = 0x4e, mnemonic = "aput-boolean", format = "23x", family = "Aput", kind = "Boolean", can_throw)]
    AputBoolean,
    #[opcode(value = 0x4f, mnemonic = "aput-byte", format = "23x", family = "Aput", kind = "Byte", can_throw)]
    AputByte,
    #[opcode(value = 0x50, mnemonic = "aput-char", format = "23x", family = "Aput", kind = "Char", can_throw)]
    AputChar,
    #[opcode(value = 0x51, mnemonic = "aput-short", format = "23x", family = "Aput", kind = "Short", can_throw)]
    AputShort,
    #[opcode(value = 0x52, mnemonic = "iget", format = "22c", family = "Iget", kind = "Narrow", can_throw)]
    Iget,
    #[opcode(value = 0x53, mnemonic = "iget-wide", format = "22c", family = "Iget", kind = "Wide", can_throw)]
    IgetWide,
    #[opcode(value = 0x54, mnemonic = "iget-object", format = "22c", family = "Iget", kind = "Object", can_throw)]
    IgetObject,
    #[opcode(value = 0x55, mnemonic = "iget-boolean", format = "22c", family = "Iget", kind = "Boolean", can_throw)]
    IgetBoolean,
    #[opcode(value = 0x56, mnemonic = "iget-byte", format = "22c", family = "Iget", kind = "Byte", can_throw)]
    IgetByte,
    #[opcode(value = 0x57, mnemonic = "iget-char", format = "22c", family = "Iget", kind = "Char", can_throw)]
    IgetChar,
    #[opcode(value = 0x58, mnemonic = "iget-short", format = "22c", family = "Iget", kind = "Short", can_throw)]
    IgetShort,
    #[opcode(value = 0x59, mnemonic = "iput", format = "22c", family = "Iput", kind = "Narrow", can_throw)]
    Iput,
    #[opcode(value = 0x5a, mnemonic = "iput-wide", format = "22c", family = "Iput", kind = "Wide", can_throw)]
    IputWide,
    #[opcode(value = 0x5b, mnemonic = "iput-object", format = "22c", family = "Iput", kind = "Object", can_throw)]
    IputObject,
    #[opcode(value = 0x5c, mnemonic = "iput-boolean", format = "22c", family = "Iput", kind = "Boolean", can_throw)]
    IputBoolean,
    #[opcode(value = 0x5d, mnemonic = "iput-byte", format = "22c", family = "Iput", kind = "Byte", can_throw)]
    IputByte,
    #[opcode(value = 0x5e, mnemonic = "iput-char", format = "22c", family = "Iput", kind = "Char", can_throw)]
    IputChar,
    #[opcode(value = 0x5f, mnemonic = "iput-short", format = "22c", family = "Iput", kind = "Short", can_throw)]
    IputShort,
    #[opcode(value = 0x60, mnemonic = "sget", format = "21c", family = "Sget", kind = "Narrow", can_throw)]
    Sget,
    #[opcode(value = 0x61, mnemonic = "sget-wide", format = "21c", family = "Sget", kind = "Wide", can_throw)]
    SgetWide,
    #[opcode(value = 0x62, mnemonic = "sget-object", format = "21c", family = "Sget", kind = "Object", can_throw)]
    SgetObject,
    #[opcode(value = 0x63, mnemonic = "sget-boolean", format = "21c", family = "Sget", kind = "Boolean", can_throw)]
    SgetBoolean,
    #[opcode(value = 0x64, mnemonic = "sget-byte", format = "21c", family = "Sget", kind = "Byte", can_throw)]
    SgetByte,
    #[opcode(value = 0x65, mnemonic = "sget-char", format = "21c", family = "Sget", kind = "Char", can_throw)]
    SgetChar,
    #[opcode(value = 0x66, mnemonic = "sget-short", format = "21c", family = "Sget", kind = "Short", can_throw)]
    SgetShort,
    #[opcode(value = 0x67, mnemonic = "sput", format = "21c", family = "Sput", kind = "Narrow", can_throw)]
    Sput,
    #[opcode(value = 0x68, mnemonic = "sput-wide", format = "21c", family = "Sput", kind = "Wide", can_throw)]
    SputWide,
    #[opcode(value = 0x69, mnemonic = "sput-object", format = "21c", family = "Sput", kind = "Object", can_throw)]
    SputObject,
    #[opcode(value = 0x6a, mnemonic = "sput-boolean", format = "21c", family = "Sput", kind = "Boolean", can_throw)]
    SputBoolean,
    #[opcode(value = 0x6b, mnemonic = "sput-byte", format = "21c", family = "Sput", kind = "Byte", can_throw)]
    SputByte,
    #[opcode(value = 0x6c, mnemonic = "sput-char", format = "21c", family = "Sput", kind = "Char", can_throw)]
    SputChar,
    #[opcode(value = 0x6d, mnemonic = "sput-short", format = "21c", family = "Sput", kind = "Short", can_throw)]
    SputShort,
    #[opcode(value = 0x6e, mnemonic = "invoke-virtual", format = "35c", family = "Invoke", can_throw)]
    InvokeVirtual,
    #[opcode(value = 0x6f, mnemonic = "invoke-super", format = "35c", family = "Invoke", can_throw)]
    InvokeSuper,
    #[opcode(value = 0x70, mnemonic = "invoke-direct", format = "35c", family = "Invoke", can_throw)]
    InvokeDirect,
    #[opcode(value = 0x71, mnemonic = "invoke-static", format = "35c", family = "Invoke", can_throw)]
    InvokeStatic,
    #[opcode(value = 0x72, mnemonic = "invoke-interface", format = "35c", family = "Invoke", can_throw)]
    InvokeInterface,
    #[opcode(value = 0x74, mnemonic = "invoke-virtual/range", format = "3rc", family = "Invoke", can_throw)]
    InvokeVirtualRange,
    #[opcode(value = 0x75, mnemonic = "invoke-super/range", format = "3rc", family = "Invoke", can_throw)]
    InvokeSuperRange,
    #[opcode(value = 0x76, mnemonic = "invoke-direct/range", format = "3rc", family = "Invoke", can_throw)]
    InvokeDirectRange,
    #[opcode(value = 0x77, mnemonic = "invoke-static/range", format = "3rc", family = "Invoke", can_throw)]
    InvokeStaticRange,
    #[opcode(value = 0x78, mnemonic = "invoke-interface/range", format = "3rc", family = "Invoke", can_throw)]
    InvokeInterfaceRange,
    #[opcode(value = 0x7b, mnemonic = "neg-int", format = "12x", family = "Neg", kind = "Int")]
    NegInt,
    #[opcode(value = 0x7c, mnemonic = "not-int", format = "12x", family = "Not", kind = "Int")]
    NotInt,
    #[opcode(value = 0x7d, mnemonic = "neg-long", format = "12x", family = "Neg", kind = "Long")]
    NegLong,
    #[opcode(value = 0x7e, mnemonic = "not-long", format = "12x", family = "Not", kind = "Long")]
    NotLong,
    #[opcode(value = 0x7f, mnemonic = "neg-float", format = "12x", family = "Neg", kind = "Float")]
    NegFloat,
    #[opcode(value = 0x80, mnemonic = "neg-double", format = "12x", family = "Neg", kind = "Double")]
    NegDouble,
    #[opcode(value = 0x81, mnemonic = "int-to-long", format = "12x", family = "Convert", kind = "Int", to = "Long")]
    IntToLong,
    #[opcode(value = 0x82, mnemonic = "int-to-float", format = "12x", family = "Convert", kind = "Int", to = "Float")]
    IntToFloat,
    #[opcode(value = 0x83, mnemonic = "int-to-double", format = "12x", family = "Convert", kind = "Int", to = "Double")]
    IntToDouble,
    #[opcode(value = 0x84, mnemonic = "long-to-int", format = "12x", family = "Convert", kind = "Long", to = "Int")]
    LongToInt,
    #[opcode(value = 0x85, mnemonic = "long-to-float", format = "12x", family = "Convert", kind = "Long", to = "Float")]
    LongToFloat,
    #[opcode(value = 0x86, mnemonic = "long-to-double", format = "12x", family = "Convert", kind = "Long", to = "Double")]
    LongToDouble,
    #[opcode(value = 0x87, mnemonic = "float-to-int", format = "12x", family = "Convert", kind = "Float", to = "Int")]
    FloatToInt,
    #[opcode(value = 0x88, mnemonic = "float-to-long", format = "12x", family = "Convert", kind = "Float", to = "Long")]
    FloatToLong,
    #[opcode(value = 0x89, mnemonic = "float-to-double", format = "12x", family = "Convert", kind = "Float", to = "Double")]
    FloatToDouble,
    #[opcode(value = 0x8a, mnemonic = "double-to-int", format = "12x", family = "Convert", kind = "Double", to = "Int")]
    DoubleToInt,
    #[opcode(value = 0x8b, mnemonic = "double-to-long", format = "12x", family = "Convert", kind = "Double", to = "Long")]
    DoubleToLong,
    #[opcode(value = 0x8c, mnemonic = "double-to-float", format = "12x", family = "Convert", kind = "Double", to = "Float")]
    DoubleToFloat,
    #[opcode(value = 0x8d, mnemonic = "int-to-byte", format = "12x", family = "Convert", kind = "Int", to = "Byte")]
    IntToByte,
    #[opcode(value = 0x8e, mnemonic = "int-to-char", format = "12x", family = "Convert", kind = "Int", to = "Char")]
    IntToChar,
    #[opcode(value = 0x8f, mnemonic = "int-to-short", format = "12x", family = "Convert", kind = "Int", to = "Short")]
    IntToShort,
    #[opcode(value = 0x90, mnemonic = "add-int", format = "23x", family = "Binop", kind = "Int")]
    AddInt,
    #[opcode(value = 0x91, mnemonic = "sub-int", format = "23x", family = "Binop", kind = "Int")]
    SubInt,
    #[opcode(value = 0x92, mnemonic = "mul-int", format = "23x", family = "Binop", kind = "Int")]
    MulInt,
    #[opcode(value = 0x93, mnemonic = "div-int", format = "23x", family = "Binop", kind = "Int", can_throw)]
    DivInt,
    #[opcode(value = 0x94, mnemonic = "rem-int", format = "23x", family = "Binop", kind = "Int", can_throw)]
    RemInt,
    #[opcode(value = 0x95, mnemonic = "and-int", format = "23x", family = "Binop", kind = "Int")]
    AndInt,
    #[opcode(value = 0x96, mnemonic = "or-int", format = "23x", family = "Binop", kind = "Int")]
    OrInt,
    #[opcode(value = 0x97, mnemonic = "xor-int", format = "23x", family = "Binop", kind = "Int")]
    XorInt,
    #[opcode(value = 0x98, mnemonic = "shl-int", format = "23x", family = "Binop", kind = "Int")]
    ShlInt,
    #[opcode(value = 0x99, mnemonic = "shr-int", format = "23x", family = "Binop", kind = "Int")]
    ShrInt,
    #[opcode(value = 0x9a, mnemonic = "ushr-int", format = "23x", family = "Binop", kind = "Int")]
    UshrInt,
    #[opcode(value = 0x9b, mnemonic = "add-long", format = "23x", family = "Binop", kind = "Long")]
    AddLong,
    #[opcode(value = 0x9c, mnemonic = "sub-long", format = "23x", family = "Binop", kind = "Long")]
    SubLong,
    #[opcode(value = 0x9d, mnemonic = "mul-long", format = "23x", family = "Binop", kind = "Long")]
    MulLong,
    #[opcode(value = 0x9e, mnemonic = "div-long", format = "23x", family = "Binop", kind = "Long", can_throw)]
    DivLong,
    #[opcode(value = 0x9f, mnemonic = "rem-long", format = "23x", family = "Binop", kind = "Long", can_throw)]
    RemLong,
    #[opcode(value = 0xa0, mnemonic = "and-long", format = "23x", family = "Binop", kind = "Long")]
    AndLong,
    #[opcode(value = 0xa1, mnemonic = "or-long", format = "23x", family = "Binop", kind = "Long")]
    OrLong,
    #[opcode(value = 0xa2, mnemonic = "xor-long", format = "23x", family = "Binop", kind = "Long")]
    XorLong,
    #[opcode(value = 0xa3, mnemonic = "shl-long", format = "23x", family = "Binop", kind = "Long")]
    ShlLong,
    #[opcode(value = 0xa4, mnemonic = "shr-long", format = "23x", family = "Binop", kind = "Long")]
    ShrLong,
    #[opcode(value = 0xa5, mnemonic = "ushr-long", format = "23x", family = "Binop", kind = "Long")]
    UshrLong,
    #[opcode(value = 0xa6, mnemonic = "add-float", format = "23x", family = "Binop", kind = "Float")]
    AddFloat,
    #[opcode(value = 0xa7, mnemonic = "sub-float", format = "23x", family = "Binop", kind = "Float")]
    SubFloat,
    #[opcode(value = 0xa8, mnemonic = "mul-float", format = "23x", family = "Binop", kind = "Float")]
    MulFloat,
    #[opcode(value = 0xa9, mnemonic = "div-float", format = "23x", family = "Binop", kind = "Float")]
    DivFloat,
    #[opcode(value = 0xaa, mnemonic = "rem-float", format = "23x", family = "Binop", kind = "Float")]
    RemFloat,
    #[opcode(value = 0xab, mnemonic = "add-double", format = "23x", family = "Binop", kind = "Double")]
    AddDouble,
    #[opcode(value = 0xac, mnemonic = "sub-double", format = "23x", family = "Binop", kind = "Double")]
    SubDouble,
    #[opcode(value = 0xad, mnemonic = "mul-double", format = "23x", family = "Binop", kind = "Double")]
    MulDouble,
    #[opcode(value = 0xae, mnemonic = "div-double", format = "23x", family = "Binop", kind = "Double")]
    DivDouble,
    #[opcode(value = 0xaf, mnemonic = "rem-double", format = "23x", family = "Binop", kind = "Double")]
    RemDouble,
    #[opcode(value = 0xb0, mnemonic = "add-int/2addr", format = "12x", family = "Binop2addr", kind = "Int")]
    AddInt2addr,
    #[opcode(value = 0xb1, mnemonic = "sub-int/2addr", format = "12x", family = "Binop2addr", kind = "Int")]
    SubInt2addr,
    #[opcode(value = 0xb2, mnemonic = "mul-int/2addr", format = "12x", family = "Binop2addr", kind = "Int")]
    MulInt2addr,
    #[opcode(value = 0xb3, mnemonic = "div-int/2addr", format = "12x", family = "Binop2addr", kind = "Int", can_throw)]
    DivInt2addr,
    #[opcode(value = 0xb4, mnemonic = "rem-int/2addr", format = "12x", family = "Binop2addr", kind = "Int", can_throw)]
    RemInt2addr,
    #[opcode(value = 0xb5, mnemonic = "and-int/2addr", format = "12x", family = "Binop2addr", kind = "Int")]
    AndInt2addr,
    #[opcode(value = 0xb6, mnemonic = "or-int/2addr", format = "12x", family = "Binop2addr", kind = "Int")]
    OrInt2addr,
    #[opcode(value = 0xb7, mnemonic = "xor-int/2addr", format = "12x", family = "Binop2addr", kind = "Int")]
    XorInt2addr,
    #[opcode(value = 0xb8, mnemonic = "shl-int/2addr", format = "12x", family = "Binop2addr", kind = "Int")]
    ShlInt2addr,
    #[opcode(value = 0xb9, mnemonic = "shr-int/2addr", format = "12x", family = "Binop2addr", kind = "Int")]
    ShrInt2addr,
    #[opcode(value = 0xba, mnemonic = "ushr-int/2addr", format = "12x", family = "Binop2addr", kind = "Int")]
    UshrInt2addr,
    #[opcode(value = 0xbb, mnemonic = "add-long/2addr", format = "12x", family = "Binop2addr", kind = "Long")]
    AddLong2addr,
    #[opcode(value = 0xbc, mnemonic = "sub-long/2addr", format = "12x", family = "Binop2addr", kind = "Long")]
    SubLong2addr,
    #[opcode(value = 0xbd, mnemonic = "mul-long/2addr", format = "12x", family = "Binop2addr", kind = "Long")]
    MulLong2addr,
    #[opcode(value = 0xbe, mnemonic = "div-long/2addr", format = "12x", family = "Binop2addr", kind = "Long", can_throw)]
    DivLong2addr,
    #[opcode(value = 0xbf, mnemonic = "rem-long/2addr", format = "12x", family = "Binop2addr", kind = "Long", can_throw)]
    RemLong2addr,
    #[opcode(value = 0xc0, mnemonic = "and-long/2addr", format = "12x", family = "Binop2addr", kind = "Long")]
    AndLong2addr,
    #[opcode(value = 0xc1, mnemonic = "or-long/2addr", format = "12x", family = "Binop2addr", kind = "Long")]
    OrLong2addr,
    #[opcode(value = 0xc2, mnemonic = "xor-long/2addr", format = "12x", family = "Binop2addr", kind = "Long")]
    XorLong2addr,
    #[opcode(value = 0xc3, mnemonic = "shl-long/2addr", format = "12x", family = "Binop2addr", kind = "Long")]
    ShlLong2addr,
    #[opcode(value = 0xc4, mnemonic = "shr-long/2addr", format = "12x", family = "Binop2addr", kind = "Long")]
    ShrLong2addr,
    #[opcode(value = 0xc5, mnemonic = "ushr-long/2addr", format = "12x", family = "Binop2addr", kind = "Long")]
    UshrLong2addr,
    #[opcode(value = 0xc6, mnemonic = "add-float/2addr", format = "12x", family = "Binop2addr", kind = "Float")]
    AddFloat2addr,
    #[opcode(value = 0xc7, mnemonic = "sub-float/2addr", format = "12x", family = "Binop2addr", kind = "Float")]
    SubFloat2addr,
    #[opcode(value = 0xc8, mnemonic = "mul-float/2addr", format = "12x", family = "Binop2addr", kind = "Float")]
    MulFloat2addr,
    #[opcode(value = 0xc9, mnemonic = "div-float/2addr", format = "12x", family = "Binop2addr", kind = "Float")]
    DivFloat2addr,
    #[opcode(value = 0xca, mnemonic = "rem-float/2addr", format = "12x", family = "Binop2addr", kind = "Float")]
    RemFloat2addr,
    #[opcode(value = 0xcb, mnemonic = "add-double/2addr", format = "12x", family = "Binop2addr", kind = "Double")]
    AddDouble2addr,
    #[opcode(value = 0xcc, mnemonic = "sub-double/2addr", format = "12x", family = "Binop2addr", kind = "Double")]
    SubDouble2addr,
    #[opcode(value = 0xcd, mnemonic = "mul-double/2addr", format = "12x", family = "Binop2addr", kind = "Double")]
    MulDouble2addr,
    #[opcode(value = 0xce, mnemonic = "div-double/2addr", format = "12x", family = "Binop2addr", kind = "Double")]
    DivDouble2addr,
    #[opcode(value = 0xcf, mnemonic = "rem-double/2addr", format = "12x", family = "Binop2addr", kind = "Double")]
    RemDouble2addr,
    #[opcode(value = 0xd0, mnemonic = "add-int/lit16", format = "22s", family = "BinopLit", kind = "Int")]
    AddIntLit16,
    #[opcode(value = 0xd1, mnemonic = "rsub-int", format = "22s", family = "BinopLit", kind = "Int")]
    RsubInt,
    #[opcode(value = 0xd2, mnemonic = "mul-int/lit16", format = "22s", family = "BinopLit", kind = "Int")]
    MulIntLit16,
    #[opcode(value = 0xd3, mnemonic = "div-int/lit16", format = "22s", family = "BinopLit", kind = "Int", can_throw)]
    DivIntLit16,
    #[opcode(value = 0xd4, mnemonic = "rem-int/lit16", format = "22s", family = "BinopLit", kind = "Int", can_throw)]
    RemIntLit16,
    #[opcode(value = 0xd5, mnemonic = "and-int/lit16", format = "22s", family = "BinopLit", kind = "Int")]
    AndIntLit16,
    #[opcode(value = 0xd6, mnemonic = "or-int/lit16", format = "22s", family = "BinopLit", kind = "Int")]
    OrIntLit16,
    #[opcode(value = 0xd7, mnemonic = "xor-int/lit16", format = "22s", family = "BinopLit", kind = "Int")]
    XorIntLit16,
    #[opcode(value = 0xd8, mnemonic = "add-int/lit8", format = "22b", family = "BinopLit", kind = "Int")]
    AddIntLit8,
    #[opcode(value = 0xd9, mnemonic = "rsub-int/lit8", format = "22b", family = "BinopLit", kind = "Int")]
    RsubIntLit8,
    #[opcode(value = 0xda, mnemonic = "mul-int/lit8", format = "22b", family = "BinopLit", kind = "Int")]
    MulIntLit8,
    #[opcode(value = 0xdb, mnemonic = "div-int/lit8", format = "22b", family = "BinopLit", kind = "Int", can_throw)]
    DivIntLit8,
    #[opcode(value = 0xdc, mnemonic = "rem-int/lit8", format = "22b", family = "BinopLit", kind = "Int", can_throw)]
    RemIntLit8,
    #[opcode(value = 0xdd, mnemonic = "and-int/lit8", format = "22b", family = "BinopLit", kind = "Int")]
    AndIntLit8,
    #[opcode(value = 0xde, mnemonic = "or-int/lit8", format = "22b", family = "BinopLit", kind = "Int")]
    OrIntLit8,
    #[opcode(value = 0xdf, mnemonic = "xor-int/lit8", format = "22b", family = "BinopLit", kind = "Int")]
    XorIntLit8,
    #[opcode(value = 0xe0, mnemonic = "shl-int/lit8", format = "22b", family = "BinopLit", kind = "Int")]
    ShlIntLit8,
    #[opcode(value = 0xe1, mnemonic = "shr-int/lit8", format = "22b", family = "BinopLit", kind = "Int")]
    ShrIntLit8,
    #[opcode(value = 0xe2, mnemonic = "ushr-int/lit8", format = "22b", family = "BinopLit", kind = "Int")]
    UshrIntLit8,
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

impl Serialize for Opcode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.mnemonic())
    }
}

impl Opcode {
    /// Constant pool section referenced by the instruction, if any.
    #[must_use]
    pub const fn reference(self) -> Option<ReferenceKind> {
        match self.family() {
            Family::ConstString => Some(ReferenceKind::String),
            Family::ConstClass
            | Family::CheckCast
            | Family::InstanceOf
            | Family::NewInstance
            | Family::NewArray
            | Family::FilledNewArray => Some(ReferenceKind::Type),
            Family::Iget | Family::Iput | Family::Sget | Family::Sput => {
                Some(ReferenceKind::Field)
            }
            Family::Invoke => Some(ReferenceKind::Method),
            _ => None,
        }
    }

    /// Checks if the instruction never falls through to the next one.
    #[must_use]
    pub const fn ends_flow(self) -> bool {
        matches!(
            self.family(),
            Family::ReturnVoid | Family::Return | Family::Throw | Family::Goto
        )
    }

    /// Checks if the instruction produces a result for a following `move-result*`.
    #[must_use]
    pub const fn has_result(self) -> bool {
        matches!(self.family(), Family::Invoke | Family::FilledNewArray)
    }

    /// Checks if the instruction has a `/range` register operand.
    #[must_use]
    pub const fn is_range(self) -> bool {
        matches!(self.format(), Format::F3rc)
    }

    /// Left shift applied to the 16-bit literal of `/high16` constants.
    #[must_use]
    pub const fn literal_shift(self) -> u32 {
        match self {
            Self::ConstHigh16 => 16,
            Self::ConstWideHigh16 => 48,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lookup() {
        assert_eq!(Opcode::from_value(0x7b), Some(Opcode::NegInt));
        assert_eq!(Opcode::NegInt.mnemonic(), "neg-int");
        assert_eq!(Opcode::NegInt.format(), Format::F12x);
        assert_eq!(Opcode::NegInt.family(), Family::Neg);
        assert_eq!(Opcode::NegInt.kind(), Some(OperandKind::Int));
        assert_eq!(Opcode::from_mnemonic("int-to-float"), Some(Opcode::IntToFloat));
        assert_eq!(
            Opcode::IntToFloat.target_kind(),
            Some(OperandKind::Float)
        );
        assert!(Opcode::DivIntLit8.can_throw());
        assert!(!Opcode::AddIntLit8.can_throw());
    }

    #[test]
    fn unsupported_values_are_absent() {
        for value in [0x3e, 0x43, 0x73, 0x79, 0x7a, 0xe3, 0xfa, 0xfc, 0xfe, 0xff] {
            assert_eq!(Opcode::from_value(value), None, "value {value:#x}");
        }
    }

    #[test]
    fn table_is_consistent() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_value(op.value()), Some(*op));
            assert_eq!(Opcode::from_mnemonic(op.mnemonic()), Some(*op));
            if op.family() == Family::Convert {
                assert!(op.kind().is_some() && op.target_kind().is_some());
            }
        }
        assert_eq!(Opcode::ALL.len(), 218);
    }

    #[test]
    fn references() {
        assert_eq!(Opcode::InvokeStaticRange.reference(), Some(ReferenceKind::Method));
        assert!(Opcode::InvokeStaticRange.is_range());
        assert_eq!(Opcode::SgetWide.reference(), Some(ReferenceKind::Field));
        assert_eq!(Opcode::AddInt.reference(), None);
        assert!(Opcode::Goto16.ends_flow());
        assert!(!Opcode::IfEq.ends_flow());
    }
}
