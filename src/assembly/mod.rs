//! CIL instruction decoding and encoding.
//!
//! Method bodies are decoded into [`crate::assembly::Instruction`] sequences when a module is
//! read, and replacement bodies are encoded back into bytes when it is written. The rewriter
//! never looks inside a sequence; it only swaps whole bodies.

mod decoder;
mod encoder;
mod instruction;
pub mod opcodes;

pub use decoder::{decode_instruction, decode_stream};
pub use encoder::{encode_instructions, InstructionEncoder};
pub use instruction::{FlowType, Immediate, Instruction, Operand, OperandType};
