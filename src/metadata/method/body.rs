//! Parsing and encoding of CIL method bodies (ECMA-335 II.25.4).
//!
//! A [`crate::metadata::method::MethodBody`] keeps the header facts, exception handling
//! clauses and the decoded instruction stream of one method, together with where it came
//! from. Bodies read from an image remember their on-disk extent so the writer can reuse
//! the space once no method points there any more; replaced bodies are encoded from their
//! instructions when the module is written.
//!
//! # Examples
//!
//! ```rust
//! use publicizer::metadata::method::MethodBody;
//!
//! let stub = MethodBody::throw_stub();
//! assert_eq!(stub.encode()?, vec![0x0A, 0x14, 0x7A]);
//! # Ok::<(), publicizer::Error>(())
//! ```

use crate::{
    assembly::{
        decode_stream, encode_instructions,
        opcodes::{LDNULL, THROW},
        FlowType, Instruction, Operand,
    },
    file::{
        io::{read_le, read_le_at, write_le_at},
        parser::Parser,
    },
    metadata::method::{ExceptionHandler, ExceptionHandlerFlags, MethodBodyFlags, SectionFlags},
    Result,
};

/// Largest code size a tiny header can describe.
pub const TINY_MAX_CODE_SIZE: usize = 63;
/// Stack depth implied by a tiny header.
pub const TINY_MAX_STACK: u16 = 8;
/// Size of a fat header in bytes.
pub const FAT_HEADER_SIZE: usize = 12;

/// Where the bytes of a body live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyOrigin {
    /// Read from the image and never modified.
    Original {
        /// RVA of the header
        rva: u32,
        /// File offset of the header
        offset: usize,
        /// Header, code and data sections, in bytes
        size: usize,
    },
    /// Built in memory; bytes are produced by [`MethodBody::encode`].
    Replaced,
}

/// Describes one method that has been compiled to CIL bytecode.
#[derive(Debug, Clone)]
pub struct MethodBody {
    /// Size of the code, not counting the header, in bytes
    pub size_code: usize,
    /// Size of the method header in bytes
    pub size_header: usize,
    /// Token of the local variable signature, 0 if there are no locals
    pub local_var_sig_token: u32,
    /// Maximum number of items on the operand stack
    pub max_stack: u16,
    /// Fat header format
    pub is_fat: bool,
    /// Locals are zero-initialized
    pub is_init_local: bool,
    /// Exception handling clauses in declaration order
    pub exception_handlers: Vec<ExceptionHandler>,
    /// Decoded code, empty when decoding was skipped
    pub instructions: Vec<Instruction>,
    /// Provenance of the bytes
    pub origin: BodyOrigin,
}

impl MethodBody {
    /// Parses the body at the start of `data`.
    ///
    /// `data` runs from the header to the end of the enclosing section; `rva` and `offset`
    /// locate the header in the image. With `decode` set the code is decoded into
    /// [`MethodBody::instructions`].
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an unknown header format or invalid code and
    /// [`crate::Error::OutOfBounds`] if the body does not fit into `data`.
    pub fn parse(data: &[u8], rva: u32, offset: usize, decode: bool) -> Result<MethodBody> {
        if data.is_empty() {
            return Err(malformed_error!("Provided data for body parsing is empty"));
        }

        let first_byte = read_le::<u8>(data)?;
        let mut body = match MethodBodyFlags::from_bits_truncate(u16::from(first_byte & 0b11)) {
            MethodBodyFlags::TINY_FORMAT => {
                let size_code = (first_byte >> 2) as usize;
                if size_code + 1 > data.len() {
                    return Err(out_of_bounds_error!());
                }

                MethodBody {
                    size_code,
                    size_header: 1,
                    local_var_sig_token: 0,
                    max_stack: TINY_MAX_STACK,
                    is_fat: false,
                    is_init_local: false,
                    exception_handlers: Vec::new(),
                    instructions: Vec::new(),
                    origin: BodyOrigin::Original {
                        rva,
                        offset,
                        size: size_code + 1,
                    },
                }
            }
            MethodBodyFlags::FAT_FORMAT => {
                if data.len() < FAT_HEADER_SIZE {
                    return Err(out_of_bounds_error!());
                }

                let first_duo = read_le::<u16>(data)?;
                let size_header = ((first_duo >> 12) * 4) as usize;
                if size_header < FAT_HEADER_SIZE {
                    return Err(malformed_error!("Fat header too small - {}", size_header));
                }

                let size_code = read_le::<u32>(&data[4..])? as usize;
                let Some(code_end) = size_header.checked_add(size_code) else {
                    return Err(out_of_bounds_error!());
                };
                if data.len() < code_end {
                    return Err(out_of_bounds_error!());
                }

                let flags_header = MethodBodyFlags::from_bits_truncate(first_duo & 0x0FFF);
                let (exception_handlers, end) = if flags_header.contains(MethodBodyFlags::MORE_SECTS)
                {
                    Self::parse_sections(data, code_end)?
                } else {
                    (Vec::new(), code_end)
                };

                MethodBody {
                    size_code,
                    size_header,
                    local_var_sig_token: read_le::<u32>(&data[8..])?,
                    max_stack: read_le::<u16>(&data[2..])?,
                    is_fat: true,
                    is_init_local: flags_header.contains(MethodBodyFlags::INIT_LOCALS),
                    exception_handlers,
                    instructions: Vec::new(),
                    origin: BodyOrigin::Original {
                        rva,
                        offset,
                        size: end,
                    },
                }
            }
            _ => {
                return Err(malformed_error!(
                    "MethodHeader is neither FAT nor TINY - {}",
                    first_byte
                ))
            }
        };

        if decode {
            let code = &data[body.size_header..body.size_header + body.size_code];
            body.instructions = decode_stream(&mut Parser::new(code))?;
        }

        Ok(body)
    }

    /// Exception handling sections (II.25.4.5); returns the clauses and the end of the last
    /// section relative to the header.
    fn parse_sections(data: &[u8], code_end: usize) -> Result<(Vec<ExceptionHandler>, usize)> {
        let mut exception_handlers = Vec::new();
        let mut section_start = (code_end + 3) & !3;
        let mut end = code_end;

        while data.len() >= section_start + 4 {
            let section_flags = SectionFlags::from_bits_truncate(data[section_start]);
            if !section_flags.contains(SectionFlags::EHTABLE) {
                break;
            }

            let mut cursor = section_start + 1;
            let (section_size, clause_size) = if section_flags.contains(SectionFlags::FAT_FORMAT) {
                let low = u32::from(read_le_at::<u16>(data, &mut cursor)?);
                let high = u32::from(read_le_at::<u8>(data, &mut cursor)?);
                (((high << 16) | low) as usize, 24)
            } else {
                (read_le_at::<u8>(data, &mut cursor)? as usize, 12)
            };

            if section_size < 4 || data.len() < section_start + section_size {
                return Err(malformed_error!(
                    "Invalid exception section size {} at {}",
                    section_size,
                    section_start
                ));
            }

            cursor = section_start + 4;
            for _ in 0..(section_size - 4) / clause_size {
                let handler = if clause_size == 24 {
                    ExceptionHandler {
                        // Flags are declared as u32 in the fat layout, only the low bits are used
                        #[allow(clippy::cast_possible_truncation)]
                        flags: ExceptionHandlerFlags::from_bits_truncate(
                            read_le_at::<u32>(data, &mut cursor)? as u16,
                        ),
                        try_offset: read_le_at::<u32>(data, &mut cursor)?,
                        try_length: read_le_at::<u32>(data, &mut cursor)?,
                        handler_offset: read_le_at::<u32>(data, &mut cursor)?,
                        handler_length: read_le_at::<u32>(data, &mut cursor)?,
                        class_token_or_filter: read_le_at::<u32>(data, &mut cursor)?,
                    }
                } else {
                    ExceptionHandler {
                        flags: ExceptionHandlerFlags::from_bits_truncate(read_le_at::<u16>(
                            data,
                            &mut cursor,
                        )?),
                        try_offset: u32::from(read_le_at::<u16>(data, &mut cursor)?),
                        try_length: u32::from(read_le_at::<u8>(data, &mut cursor)?),
                        handler_offset: u32::from(read_le_at::<u16>(data, &mut cursor)?),
                        handler_length: u32::from(read_le_at::<u8>(data, &mut cursor)?),
                        class_token_or_filter: read_le_at::<u32>(data, &mut cursor)?,
                    }
                };
                exception_handlers.push(handler);
            }

            end = section_start + section_size;
            if !section_flags.contains(SectionFlags::MORE_SECTS) {
                break;
            }
            section_start = (end + 3) & !3;
        }

        Ok((exception_handlers, end))
    }

    /// A replacement body which throws a null reference on entry: `ldnull; throw`.
    #[must_use]
    pub fn throw_stub() -> MethodBody {
        let instructions = vec![
            Instruction {
                offset: 0,
                size: 1,
                opcode: LDNULL,
                prefix: 0,
                mnemonic: "ldnull",
                flow_type: FlowType::Sequential,
                operand: Operand::None,
            },
            Instruction {
                offset: 1,
                size: 1,
                opcode: THROW,
                prefix: 0,
                mnemonic: "throw",
                flow_type: FlowType::Throw,
                operand: Operand::None,
            },
        ];

        MethodBody {
            size_code: 2,
            size_header: 1,
            local_var_sig_token: 0,
            max_stack: 1,
            is_fat: false,
            is_init_local: false,
            exception_handlers: Vec::new(),
            instructions,
            origin: BodyOrigin::Replaced,
        }
    }

    /// `true` if the body was built in memory rather than read from the image.
    #[must_use]
    pub fn is_replaced(&self) -> bool {
        self.origin == BodyOrigin::Replaced
    }

    /// Header, code and data sections, in bytes, of a body read from the image.
    #[must_use]
    pub fn size(&self) -> usize {
        match self.origin {
            BodyOrigin::Original { size, .. } => size,
            BodyOrigin::Replaced => self.size_header + self.size_code,
        }
    }

    /// Encodes the body: a tiny header when the code, stack, locals and clauses allow it,
    /// otherwise a fat header followed by a fat exception section.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if an instruction cannot be encoded or the body
    /// exceeds the sizes a header can describe.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let code = encode_instructions(&self.instructions)?;

        let tiny = code.len() <= TINY_MAX_CODE_SIZE
            && self.max_stack <= TINY_MAX_STACK
            && self.local_var_sig_token == 0
            && !self.is_init_local
            && self.exception_handlers.is_empty();

        if tiny {
            let mut bytes = Vec::with_capacity(code.len() + 1);
            // Bounded by TINY_MAX_CODE_SIZE
            #[allow(clippy::cast_possible_truncation)]
            bytes.push(((code.len() as u8) << 2) | MethodBodyFlags::TINY_FORMAT.bits() as u8);
            bytes.extend_from_slice(&code);
            return Ok(bytes);
        }

        let code_size = u32::try_from(code.len())
            .map_err(|_| malformed_error!("Method code too large - {}", code.len()))?;

        let mut flags = MethodBodyFlags::FAT_FORMAT;
        if self.is_init_local {
            flags |= MethodBodyFlags::INIT_LOCALS;
        }
        if !self.exception_handlers.is_empty() {
            flags |= MethodBodyFlags::MORE_SECTS;
        }

        let mut bytes = vec![0_u8; FAT_HEADER_SIZE];
        let mut cursor = 0;
        write_le_at::<u16>(&mut bytes, &mut cursor, flags.bits() | (3 << 12))?;
        write_le_at::<u16>(&mut bytes, &mut cursor, self.max_stack)?;
        write_le_at::<u32>(&mut bytes, &mut cursor, code_size)?;
        write_le_at::<u32>(&mut bytes, &mut cursor, self.local_var_sig_token)?;
        bytes.extend_from_slice(&code);

        if !self.exception_handlers.is_empty() {
            bytes.resize((bytes.len() + 3) & !3, 0);

            let section_size = 4 + 24 * self.exception_handlers.len();
            if section_size > 0x00FF_FFFF {
                return Err(malformed_error!(
                    "Too many exception handlers - {}",
                    self.exception_handlers.len()
                ));
            }

            let mut section = vec![0_u8; section_size];
            let mut cursor = 0;
            // Bounded by the check above
            #[allow(clippy::cast_possible_truncation)]
            let header = (section_size as u32) << 8
                | u32::from((SectionFlags::EHTABLE | SectionFlags::FAT_FORMAT).bits());
            write_le_at::<u32>(&mut section, &mut cursor, header)?;
            for handler in &self.exception_handlers {
                write_le_at::<u32>(&mut section, &mut cursor, u32::from(handler.flags.bits()))?;
                write_le_at::<u32>(&mut section, &mut cursor, handler.try_offset)?;
                write_le_at::<u32>(&mut section, &mut cursor, handler.try_length)?;
                write_le_at::<u32>(&mut section, &mut cursor, handler.handler_offset)?;
                write_le_at::<u32>(&mut section, &mut cursor, handler.handler_length)?;
                write_le_at::<u32>(&mut section, &mut cursor, handler.class_token_or_filter)?;
            }
            bytes.extend_from_slice(&section);
        }

        Ok(bytes)
    }
}

/// Required alignment of an encoded body inside the image: fat headers sit on a 4-byte
/// boundary, tiny ones anywhere.
#[must_use]
pub fn encoded_alignment(encoded: &[u8]) -> usize {
    match encoded.first() {
        Some(first) if first & 0b11 == 0b11 => 4,
        _ => 1,
    }
}
