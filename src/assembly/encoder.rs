//! CIL encoding, the inverse of [`crate::assembly::decode_stream`].

use crate::{
    assembly::{
        opcodes::{lookup, lookup_fe, FE_PREFIX},
        Immediate, Instruction, Operand, OperandType,
    },
    Result,
};

/// Accumulates encoded instructions.
#[derive(Debug, Default)]
pub struct InstructionEncoder {
    bytecode: Vec<u8>,
}

impl InstructionEncoder {
    /// Creates an empty encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `instruction`, checking its operand against the opcode table.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an unknown opcode or an operand that does
    /// not match the opcode's operand type.
    pub fn emit(&mut self, instruction: &Instruction) -> Result<()> {
        let op = match instruction.prefix {
            0 => lookup(instruction.opcode),
            FE_PREFIX => lookup_fe(instruction.opcode),
            _ => None,
        }
        .ok_or_else(|| {
            malformed_error!(
                "Cannot encode opcode {:02X} {:02X}",
                instruction.prefix,
                instruction.opcode
            )
        })?;

        if instruction.prefix != 0 {
            self.bytecode.push(instruction.prefix);
        }
        self.bytecode.push(instruction.opcode);

        match (op.operand, &instruction.operand) {
            (OperandType::None, Operand::None) => {}
            (OperandType::Int8, Operand::Immediate(Immediate::Int8(v))) => {
                self.bytecode.extend_from_slice(&v.to_le_bytes());
            }
            (OperandType::UInt8, Operand::Immediate(Immediate::UInt8(v))) => {
                self.bytecode.push(*v);
            }
            (OperandType::UInt16, Operand::Immediate(Immediate::UInt16(v))) => {
                self.bytecode.extend_from_slice(&v.to_le_bytes());
            }
            (OperandType::Int32, Operand::Immediate(Immediate::Int32(v))) => {
                self.bytecode.extend_from_slice(&v.to_le_bytes());
            }
            (OperandType::Int64, Operand::Immediate(Immediate::Int64(v))) => {
                self.bytecode.extend_from_slice(&v.to_le_bytes());
            }
            (OperandType::Float32, Operand::Immediate(Immediate::Float32(v))) => {
                self.bytecode.extend_from_slice(&v.to_le_bytes());
            }
            (OperandType::Float64, Operand::Immediate(Immediate::Float64(v))) => {
                self.bytecode.extend_from_slice(&v.to_le_bytes());
            }
            (OperandType::Token, Operand::Token(token)) => {
                self.bytecode.extend_from_slice(&token.value().to_le_bytes());
            }
            (OperandType::Switch, Operand::Switch(targets)) => {
                let count = u32::try_from(targets.len())
                    .map_err(|_| malformed_error!("Too many switch targets"))?;
                self.bytecode.extend_from_slice(&count.to_le_bytes());
                for target in targets {
                    self.bytecode.extend_from_slice(&target.to_le_bytes());
                }
            }
            (expected, actual) => {
                return Err(malformed_error!(
                    "Operand {:?} does not match {} ({:?})",
                    actual,
                    op.mnemonic,
                    expected
                ))
            }
        }

        Ok(())
    }

    /// Current size of the encoded code.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytecode.len()
    }

    /// `true` if nothing has been emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytecode.is_empty()
    }

    /// Returns the encoded code.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.bytecode
    }
}

/// Encodes a sequence of instructions into code bytes.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if an instruction cannot be encoded.
pub fn encode_instructions(instructions: &[Instruction]) -> Result<Vec<u8>> {
    let mut encoder = InstructionEncoder::new();
    for instruction in instructions {
        encoder.emit(instruction)?;
    }
    Ok(encoder.finish())
}
