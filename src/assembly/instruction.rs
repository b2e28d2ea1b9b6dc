//! Decoded CIL instruction model.

use std::fmt;

use crate::metadata::token::Token;

/// Encoding of the operand that follows an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// No operand
    None,
    /// Signed byte, branch offsets and `ldc.i4.s`
    Int8,
    /// Unsigned byte, short-form local and argument indexes
    UInt8,
    /// Unsigned 16-bit, long-form local and argument indexes
    UInt16,
    /// Signed 32-bit, branch offsets and `ldc.i4`
    Int32,
    /// Signed 64-bit, `ldc.i8`
    Int64,
    /// 32-bit float, `ldc.r4`
    Float32,
    /// 64-bit float, `ldc.r8`
    Float64,
    /// Metadata token
    Token,
    /// Jump table of `switch`
    Switch,
}

impl OperandType {
    /// Size of the operand in bytes, `None` for the variable-length switch table.
    #[must_use]
    pub const fn size(&self) -> Option<usize> {
        match self {
            OperandType::None => Some(0),
            OperandType::Int8 | OperandType::UInt8 => Some(1),
            OperandType::UInt16 => Some(2),
            OperandType::Int32 | OperandType::Float32 | OperandType::Token => Some(4),
            OperandType::Int64 | OperandType::Float64 => Some(8),
            OperandType::Switch => None,
        }
    }
}

/// An immediate operand value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Immediate {
    /// Signed byte
    Int8(i8),
    /// Unsigned byte
    UInt8(u8),
    /// Unsigned 16-bit
    UInt16(u16),
    /// Signed 32-bit
    Int32(i32),
    /// Signed 64-bit
    Int64(i64),
    /// 32-bit float
    Float32(f32),
    /// 64-bit float
    Float64(f64),
}

/// The operand of a decoded instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand
    None,
    /// Immediate value or relative branch offset
    Immediate(Immediate),
    /// Metadata token
    Token(Token),
    /// Relative targets of a `switch`
    Switch(Vec<i32>),
}

/// How control leaves an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Falls through to the next instruction
    Sequential,
    /// Branches or falls through
    ConditionalBranch,
    /// Always branches
    UnconditionalBranch,
    /// Calls and continues
    Call,
    /// Returns from the method
    Return,
    /// Multi-way branch
    Switch,
    /// Raises an exception
    Throw,
    /// Ends a finally, fault or filter block
    EndFinally,
    /// Leaves a protected region
    Leave,
}

/// A single decoded CIL instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Offset from the start of the method's code
    pub offset: u32,
    /// Encoded size in bytes, opcode and operand included
    pub size: u32,
    /// Opcode byte, the second byte for `0xFE`-prefixed instructions
    pub opcode: u8,
    /// `0xFE` for two-byte opcodes, otherwise 0
    pub prefix: u8,
    /// Mnemonic, e.g. `ldnull`
    pub mnemonic: &'static str,
    /// Control flow behaviour
    pub flow_type: FlowType,
    /// Operand
    pub operand: Operand,
}

impl Instruction {
    /// `true` if control never falls through to the next instruction.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.flow_type,
            FlowType::UnconditionalBranch
                | FlowType::Return
                | FlowType::Throw
                | FlowType::EndFinally
                | FlowType::Leave
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04x}: {}", self.offset, self.mnemonic)?;
        match &self.operand {
            Operand::None => Ok(()),
            Operand::Immediate(value) => match value {
                Immediate::Int8(v) => write!(f, " {v}"),
                Immediate::UInt8(v) => write!(f, " {v}"),
                Immediate::UInt16(v) => write!(f, " {v}"),
                Immediate::Int32(v) => write!(f, " {v}"),
                Immediate::Int64(v) => write!(f, " {v}"),
                Immediate::Float32(v) => write!(f, " {v}"),
                Immediate::Float64(v) => write!(f, " {v}"),
            },
            Operand::Token(token) => write!(f, " {token}"),
            Operand::Switch(targets) => write!(f, " ({} targets)", targets.len()),
        }
    }
}
