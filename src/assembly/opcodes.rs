//! CIL opcode table (ECMA-335 Partition III).
//!
//! Single-byte opcodes are looked up by their byte, two-byte opcodes by the byte following
//! [`FE_PREFIX`]. Reserved encodings have no entry.

use crate::assembly::{FlowType, OperandType};

/// First byte of every two-byte opcode.
pub const FE_PREFIX: u8 = 0xFE;

/// `ldnull`
pub const LDNULL: u8 = 0x14;
/// `ret`
pub const RET: u8 = 0x2A;
/// `throw`
pub const THROW: u8 = 0x7A;

/// Static description of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpCode {
    /// Mnemonic
    pub mnemonic: &'static str,
    /// Operand encoding
    pub operand: OperandType,
    /// Control flow behaviour
    pub flow: FlowType,
}

const fn op(mnemonic: &'static str, operand: OperandType, flow: FlowType) -> Option<OpCode> {
    Some(OpCode {
        mnemonic,
        operand,
        flow,
    })
}

const fn seq(mnemonic: &'static str) -> Option<OpCode> {
    op(mnemonic, OperandType::None, FlowType::Sequential)
}

/// Looks up a single-byte opcode.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn lookup(opcode: u8) -> Option<OpCode> {
    use FlowType::{Call, ConditionalBranch as Cond, Leave, Return, Throw, UnconditionalBranch as Br};
    use OperandType as O;

    match opcode {
        0x00 => seq("nop"),
        0x01 => seq("break"),
        0x02 => seq("ldarg.0"),
        0x03 => seq("ldarg.1"),
        0x04 => seq("ldarg.2"),
        0x05 => seq("ldarg.3"),
        0x06 => seq("ldloc.0"),
        0x07 => seq("ldloc.1"),
        0x08 => seq("ldloc.2"),
        0x09 => seq("ldloc.3"),
        0x0A => seq("stloc.0"),
        0x0B => seq("stloc.1"),
        0x0C => seq("stloc.2"),
        0x0D => seq("stloc.3"),
        0x0E => op("ldarg.s", O::UInt8, FlowType::Sequential),
        0x0F => op("ldarga.s", O::UInt8, FlowType::Sequential),
        0x10 => op("starg.s", O::UInt8, FlowType::Sequential),
        0x11 => op("ldloc.s", O::UInt8, FlowType::Sequential),
        0x12 => op("ldloca.s", O::UInt8, FlowType::Sequential),
        0x13 => op("stloc.s", O::UInt8, FlowType::Sequential),
        0x14 => seq("ldnull"),
        0x15 => seq("ldc.i4.m1"),
        0x16 => seq("ldc.i4.0"),
        0x17 => seq("ldc.i4.1"),
        0x18 => seq("ldc.i4.2"),
        0x19 => seq("ldc.i4.3"),
        0x1A => seq("ldc.i4.4"),
        0x1B => seq("ldc.i4.5"),
        0x1C => seq("ldc.i4.6"),
        0x1D => seq("ldc.i4.7"),
        0x1E => seq("ldc.i4.8"),
        0x1F => op("ldc.i4.s", O::Int8, FlowType::Sequential),
        0x20 => op("ldc.i4", O::Int32, FlowType::Sequential),
        0x21 => op("ldc.i8", O::Int64, FlowType::Sequential),
        0x22 => op("ldc.r4", O::Float32, FlowType::Sequential),
        0x23 => op("ldc.r8", O::Float64, FlowType::Sequential),
        0x25 => seq("dup"),
        0x26 => seq("pop"),
        0x27 => op("jmp", O::Token, Return),
        0x28 => op("call", O::Token, Call),
        0x29 => op("calli", O::Token, Call),
        0x2A => op("ret", O::None, Return),
        0x2B => op("br.s", O::Int8, Br),
        0x2C => op("brfalse.s", O::Int8, Cond),
        0x2D => op("brtrue.s", O::Int8, Cond),
        0x2E => op("beq.s", O::Int8, Cond),
        0x2F => op("bge.s", O::Int8, Cond),
        0x30 => op("bgt.s", O::Int8, Cond),
        0x31 => op("ble.s", O::Int8, Cond),
        0x32 => op("blt.s", O::Int8, Cond),
        0x33 => op("bne.un.s", O::Int8, Cond),
        0x34 => op("bge.un.s", O::Int8, Cond),
        0x35 => op("bgt.un.s", O::Int8, Cond),
        0x36 => op("ble.un.s", O::Int8, Cond),
        0x37 => op("blt.un.s", O::Int8, Cond),
        0x38 => op("br", O::Int32, Br),
        0x39 => op("brfalse", O::Int32, Cond),
        0x3A => op("brtrue", O::Int32, Cond),
        0x3B => op("beq", O::Int32, Cond),
        0x3C => op("bge", O::Int32, Cond),
        0x3D => op("bgt", O::Int32, Cond),
        0x3E => op("ble", O::Int32, Cond),
        0x3F => op("blt", O::Int32, Cond),
        0x40 => op("bne.un", O::Int32, Cond),
        0x41 => op("bge.un", O::Int32, Cond),
        0x42 => op("bgt.un", O::Int32, Cond),
        0x43 => op("ble.un", O::Int32, Cond),
        0x44 => op("blt.un", O::Int32, Cond),
        0x45 => op("switch", O::Switch, FlowType::Switch),
        0x46 => seq("ldind.i1"),
        0x47 => seq("ldind.u1"),
        0x48 => seq("ldind.i2"),
        0x49 => seq("ldind.u2"),
        0x4A => seq("ldind.i4"),
        0x4B => seq("ldind.u4"),
        0x4C => seq("ldind.i8"),
        0x4D => seq("ldind.i"),
        0x4E => seq("ldind.r4"),
        0x4F => seq("ldind.r8"),
        0x50 => seq("ldind.ref"),
        0x51 => seq("stind.ref"),
        0x52 => seq("stind.i1"),
        0x53 => seq("stind.i2"),
        0x54 => seq("stind.i4"),
        0x55 => seq("stind.i8"),
        0x56 => seq("stind.r4"),
        0x57 => seq("stind.r8"),
        0x58 => seq("add"),
        0x59 => seq("sub"),
        0x5A => seq("mul"),
        0x5B => seq("div"),
        0x5C => seq("div.un"),
        0x5D => seq("rem"),
        0x5E => seq("rem.un"),
        0x5F => seq("and"),
        0x60 => seq("or"),
        0x61 => seq("xor"),
        0x62 => seq("shl"),
        0x63 => seq("shr"),
        0x64 => seq("shr.un"),
        0x65 => seq("neg"),
        0x66 => seq("not"),
        0x67 => seq("conv.i1"),
        0x68 => seq("conv.i2"),
        0x69 => seq("conv.i4"),
        0x6A => seq("conv.i8"),
        0x6B => seq("conv.r4"),
        0x6C => seq("conv.r8"),
        0x6D => seq("conv.u4"),
        0x6E => seq("conv.u8"),
        0x6F => op("callvirt", O::Token, Call),
        0x70 => op("cpobj", O::Token, FlowType::Sequential),
        0x71 => op("ldobj", O::Token, FlowType::Sequential),
        0x72 => op("ldstr", O::Token, FlowType::Sequential),
        0x73 => op("newobj", O::Token, Call),
        0x74 => op("castclass", O::Token, FlowType::Sequential),
        0x75 => op("isinst", O::Token, FlowType::Sequential),
        0x76 => seq("conv.r.un"),
        0x79 => op("unbox", O::Token, FlowType::Sequential),
        0x7A => op("throw", O::None, Throw),
        0x7B => op("ldfld", O::Token, FlowType::Sequential),
        0x7C => op("ldflda", O::Token, FlowType::Sequential),
        0x7D => op("stfld", O::Token, FlowType::Sequential),
        0x7E => op("ldsfld", O::Token, FlowType::Sequential),
        0x7F => op("ldsflda", O::Token, FlowType::Sequential),
        0x80 => op("stsfld", O::Token, FlowType::Sequential),
        0x81 => op("stobj", O::Token, FlowType::Sequential),
        0x82 => seq("conv.ovf.i1.un"),
        0x83 => seq("conv.ovf.i2.un"),
        0x84 => seq("conv.ovf.i4.un"),
        0x85 => seq("conv.ovf.i8.un"),
        0x86 => seq("conv.ovf.u1.un"),
        0x87 => seq("conv.ovf.u2.un"),
        0x88 => seq("conv.ovf.u4.un"),
        0x89 => seq("conv.ovf.u8.un"),
        0x8A => seq("conv.ovf.i.un"),
        0x8B => seq("conv.ovf.u.un"),
        0x8C => op("box", O::Token, FlowType::Sequential),
        0x8D => op("newarr", O::Token, FlowType::Sequential),
        0x8E => seq("ldlen"),
        0x8F => op("ldelema", O::Token, FlowType::Sequential),
        0x90 => seq("ldelem.i1"),
        0x91 => seq("ldelem.u1"),
        0x92 => seq("ldelem.i2"),
        0x93 => seq("ldelem.u2"),
        0x94 => seq("ldelem.i4"),
        0x95 => seq("ldelem.u4"),
        0x96 => seq("ldelem.i8"),
        0x97 => seq("ldelem.i"),
        0x98 => seq("ldelem.r4"),
        0x99 => seq("ldelem.r8"),
        0x9A => seq("ldelem.ref"),
        0x9B => seq("stelem.i"),
        0x9C => seq("stelem.i1"),
        0x9D => seq("stelem.i2"),
        0x9E => seq("stelem.i4"),
        0x9F => seq("stelem.i8"),
        0xA0 => seq("stelem.r4"),
        0xA1 => seq("stelem.r8"),
        0xA2 => seq("stelem.ref"),
        0xA3 => op("ldelem", O::Token, FlowType::Sequential),
        0xA4 => op("stelem", O::Token, FlowType::Sequential),
        0xA5 => op("unbox.any", O::Token, FlowType::Sequential),
        0xB3 => seq("conv.ovf.i1"),
        0xB4 => seq("conv.ovf.u1"),
        0xB5 => seq("conv.ovf.i2"),
        0xB6 => seq("conv.ovf.u2"),
        0xB7 => seq("conv.ovf.i4"),
        0xB8 => seq("conv.ovf.u4"),
        0xB9 => seq("conv.ovf.i8"),
        0xBA => seq("conv.ovf.u8"),
        0xC2 => op("refanyval", O::Token, FlowType::Sequential),
        0xC3 => seq("ckfinite"),
        0xC6 => op("mkrefany", O::Token, FlowType::Sequential),
        0xD0 => op("ldtoken", O::Token, FlowType::Sequential),
        0xD1 => seq("conv.u2"),
        0xD2 => seq("conv.u1"),
        0xD3 => seq("conv.i"),
        0xD4 => seq("conv.ovf.i"),
        0xD5 => seq("conv.ovf.u"),
        0xD6 => seq("add.ovf"),
        0xD7 => seq("add.ovf.un"),
        0xD8 => seq("mul.ovf"),
        0xD9 => seq("mul.ovf.un"),
        0xDA => seq("sub.ovf"),
        0xDB => seq("sub.ovf.un"),
        0xDC => op("endfinally", O::None, FlowType::EndFinally),
        0xDD => op("leave", O::Int32, Leave),
        0xDE => op("leave.s", O::Int8, Leave),
        0xDF => seq("stind.i"),
        0xE0 => seq("conv.u"),
        _ => None,
    }
}

/// Looks up the second byte of a two-byte opcode.
#[must_use]
pub fn lookup_fe(opcode: u8) -> Option<OpCode> {
    use OperandType as O;

    match opcode {
        0x00 => seq("arglist"),
        0x01 => seq("ceq"),
        0x02 => seq("cgt"),
        0x03 => seq("cgt.un"),
        0x04 => seq("clt"),
        0x05 => seq("clt.un"),
        0x06 => op("ldftn", O::Token, FlowType::Sequential),
        0x07 => op("ldvirtftn", O::Token, FlowType::Sequential),
        0x09 => op("ldarg", O::UInt16, FlowType::Sequential),
        0x0A => op("ldarga", O::UInt16, FlowType::Sequential),
        0x0B => op("starg", O::UInt16, FlowType::Sequential),
        0x0C => op("ldloc", O::UInt16, FlowType::Sequential),
        0x0D => op("ldloca", O::UInt16, FlowType::Sequential),
        0x0E => op("stloc", O::UInt16, FlowType::Sequential),
        0x0F => seq("localloc"),
        0x11 => op("endfilter", O::None, FlowType::EndFinally),
        0x12 => op("unaligned.", O::UInt8, FlowType::Sequential),
        0x13 => seq("volatile."),
        0x14 => seq("tail."),
        0x15 => op("initobj", O::Token, FlowType::Sequential),
        0x16 => op("constrained.", O::Token, FlowType::Sequential),
        0x17 => seq("cpblk"),
        0x18 => seq("initblk"),
        0x19 => op("no.", O::UInt8, FlowType::Sequential),
        0x1A => op("rethrow", O::None, FlowType::Throw),
        0x1C => op("sizeof", O::Token, FlowType::Sequential),
        0x1D => seq("refanytype"),
        0x1E => seq("readonly."),
        _ => None,
    }
}
