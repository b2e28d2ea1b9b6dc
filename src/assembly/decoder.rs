//! Linear CIL decoding.

use crate::{
    assembly::{
        opcodes::{lookup, lookup_fe, FE_PREFIX},
        Immediate, Instruction, Operand, OperandType,
    },
    file::parser::Parser,
    metadata::token::Token,
    Result,
};

/// Decodes all instructions of a method's code, front to back.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for reserved opcodes and
/// [`crate::Error::OutOfBounds`] for truncated operands.
///
/// # Examples
///
/// ```rust
/// use publicizer::{assembly::decode_stream, Parser};
///
/// let mut parser = Parser::new(&[0x14, 0x7A]);
/// let instructions = decode_stream(&mut parser)?;
///
/// assert_eq!(instructions[0].mnemonic, "ldnull");
/// assert_eq!(instructions[1].mnemonic, "throw");
/// # Ok::<(), publicizer::Error>(())
/// ```
pub fn decode_stream(parser: &mut Parser) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::new();

    while parser.has_more_data() {
        instructions.push(decode_instruction(parser)?);
    }

    Ok(instructions)
}

/// Decodes the instruction at the parser's position.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for a reserved opcode and
/// [`crate::Error::OutOfBounds`] for a truncated operand.
pub fn decode_instruction(parser: &mut Parser) -> Result<Instruction> {
    let start = parser.pos();
    let first_byte = parser.read_le::<u8>()?;

    let (op, prefix, opcode) = if first_byte == FE_PREFIX {
        let second_byte = parser.read_le::<u8>()?;
        match lookup_fe(second_byte) {
            Some(op) => (op, FE_PREFIX, second_byte),
            None => return Err(malformed_error!("Invalid opcode: FE {:02X}", second_byte)),
        }
    } else {
        match lookup(first_byte) {
            Some(op) => (op, 0, first_byte),
            None => return Err(malformed_error!("Invalid opcode: {:02X}", first_byte)),
        }
    };

    let operand = match op.operand {
        OperandType::None => Operand::None,
        OperandType::Int8 => Operand::Immediate(Immediate::Int8(parser.read_le::<i8>()?)),
        OperandType::UInt8 => Operand::Immediate(Immediate::UInt8(parser.read_le::<u8>()?)),
        OperandType::UInt16 => Operand::Immediate(Immediate::UInt16(parser.read_le::<u16>()?)),
        OperandType::Int32 => Operand::Immediate(Immediate::Int32(parser.read_le::<i32>()?)),
        OperandType::Int64 => Operand::Immediate(Immediate::Int64(parser.read_le::<i64>()?)),
        OperandType::Float32 => Operand::Immediate(Immediate::Float32(parser.read_le::<f32>()?)),
        OperandType::Float64 => Operand::Immediate(Immediate::Float64(parser.read_le::<f64>()?)),
        OperandType::Token => Operand::Token(Token::new(parser.read_le::<u32>()?)),
        OperandType::Switch => {
            let case_count = parser.read_le::<u32>()? as usize;
            if case_count.saturating_mul(4) > parser.remaining() {
                return Err(out_of_bounds_error!());
            }

            let mut targets = Vec::with_capacity(case_count);
            for _ in 0..case_count {
                targets.push(parser.read_le::<i32>()?);
            }
            Operand::Switch(targets)
        }
    };

    let offset = u32::try_from(start)
        .map_err(|_| malformed_error!("Instruction offset too large - {}", start))?;
    let size = u32::try_from(parser.pos() - start)
        .map_err(|_| malformed_error!("Instruction too large at offset {}", start))?;

    Ok(Instruction {
        offset,
        size,
        opcode,
        prefix,
        mnemonic: op.mnemonic,
        flow_type: op.flow,
        operand,
    })
}
