//! PE image access for .NET modules.
//!
//! A [`crate::file::File`] owns the bytes of a PE image, either memory-mapped from disk or
//! held in a buffer, together with the `goblin` view of its headers. The view borrows from
//! the bytes, which is why the struct is built with `ouroboros`.
//!
//! Loading validates that the image is a PE file with an optional header and a CLR runtime
//! header data directory; everything else about the CLI layer is parsed by
//! [`crate::metadata`].
//!
//! # Key Components
//!
//! - [`crate::file::File`] - PE image with address translation and header access
//! - [`crate::file::Backend`] - Source of the image bytes
//! - [`crate::file::parser::Parser`] - Cursor used by the metadata and IL readers
//! - [`crate::file::io`] - Little-endian primitives
//!
//! # Examples
//!
//! ```rust,no_run
//! use publicizer::File;
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("Foo.dll"))?;
//! let (clr_rva, clr_size) = file.clr();
//! let clr_offset = file.rva_to_offset(clr_rva)?;
//! println!("CLI header at 0x{clr_offset:x}, {clr_size} bytes");
//! # Ok::<(), publicizer::Error>(())
//! ```

pub mod io;
pub mod parser;

mod memory;
mod physical;

use std::path::Path;

use crate::{
    file::io::read_le_at,
    Error::{Empty, GoblinErr},
    Result,
};
use goblin::pe::{
    header::{DosHeader, Header},
    optional_header::OptionalHeader,
    section_table::SectionTable,
    PE,
};
use memory::Memory;
use ouroboros::self_referencing;
use physical::Physical;

/// Offset of the `CheckSum` field within the optional header.
pub const OPTIONAL_HEADER_CHECKSUM_OFFSET: usize = 64;
/// Offset of the `SizeOfImage` field within the optional header.
pub const OPTIONAL_HEADER_SIZE_OF_IMAGE_OFFSET: usize = 56;
/// Size of one entry of the section table.
pub const SECTION_HEADER_SIZE: usize = 40;
/// Offset of `NumberOfSections` from the PE signature.
pub const COFF_NUMBER_OF_SECTIONS_OFFSET: usize = 6;
/// Index of the attribute certificate table among the data directories.
pub const CERTIFICATE_TABLE_INDEX: usize = 4;

/// Source of the bytes of a PE image.
///
/// Implementations must be thread-safe, modules are read on one thread and rewritten on
/// others.
pub trait Backend: Send + Sync {
    /// Returns `len` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range is outside the data.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize;
}

#[self_referencing]
/// A loaded PE image which carries a CLR runtime header.
pub struct File {
    /// The underlying data source (memory or file).
    data: Box<dyn Backend>,
    /// The parsed PE structure, referencing the data.
    #[borrows(data)]
    #[not_covariant]
    pe: PE<'this>,
}

impl File {
    /// Memory-maps and parses the PE image at `file`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened, and a parsing error if
    /// it is empty, not a PE image, or has no CLR runtime header.
    pub fn from_file(file: &Path) -> Result<File> {
        let input = Physical::new(file)?;

        Self::load(input)
    }

    /// Parses a PE image held in memory.
    ///
    /// # Errors
    /// Returns a parsing error if `data` is empty, not a PE image, or has no CLR runtime
    /// header.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        let input = Memory::new(data);

        Self::load(input)
    }

    fn load<T: Backend + 'static>(data: T) -> Result<File> {
        if data.len() == 0 {
            return Err(Empty);
        }

        let data = Box::new(data);

        File::try_new(data, |data| {
            let data = data.as_ref();
            match PE::parse(data.data()) {
                Ok(pe) => match pe.header.optional_header {
                    Some(optional_header) => {
                        if optional_header
                            .data_directories
                            .get_clr_runtime_header()
                            .is_none()
                        {
                            Err(malformed_error!(
                                "File does not have a CLR runtime header directory"
                            ))
                        } else {
                            Ok(pe)
                        }
                    }
                    None => Err(malformed_error!("File does not have an OptionalHeader")),
                },
                Err(error) => Err(GoblinErr(error)),
            }
        })
    }

    /// Returns the total size of the image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.with_data(|data| data.len())
    }

    /// Returns `true` if the image holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the COFF header with its optional header.
    #[must_use]
    pub fn header(&self) -> &Header {
        self.with_pe(|pe| &pe.header)
    }

    /// Returns the DOS header.
    #[must_use]
    pub fn header_dos(&self) -> &DosHeader {
        self.with_pe(|pe| &pe.header.dos_header)
    }

    /// Returns the optional header. Always present for a successfully loaded image.
    #[must_use]
    pub fn header_optional(&self) -> &Option<OptionalHeader> {
        self.with_pe(|pe| &pe.header.optional_header)
    }

    /// File offset of the optional header.
    #[must_use]
    pub fn optional_header_offset(&self) -> usize {
        // PE signature (4) + COFF file header (20)
        self.header_dos().pe_pointer as usize + 24
    }

    /// File offset of the first section table entry.
    #[must_use]
    pub fn section_table_offset(&self) -> usize {
        self.optional_header_offset() + self.header().coff_header.size_of_optional_header as usize
    }

    /// Returns the RVA and size of the CLR runtime header, `(0, 0)` if absent.
    #[must_use]
    pub fn clr(&self) -> (usize, usize) {
        self.with_pe(|pe| {
            match pe
                .header
                .optional_header
                .and_then(|oh| oh.data_directories.get_clr_runtime_header().copied())
            {
                Some(dir) => (dir.virtual_address as usize, dir.size as usize),
                None => (0, 0),
            }
        })
    }

    /// Returns the stored PE checksum.
    #[must_use]
    pub fn checksum(&self) -> u32 {
        self.with_pe(|pe| {
            pe.header
                .optional_header
                .map_or(0, |oh| oh.windows_fields.check_sum)
        })
    }

    /// Returns the file alignment, falling back to the common 0x200 when absent.
    #[must_use]
    pub fn file_alignment(&self) -> u32 {
        self.with_pe(|pe| {
            pe.header
                .optional_header
                .map_or(0x200, |oh| oh.windows_fields.file_alignment)
        })
    }

    /// Returns the combined size of all headers as declared in the optional header.
    #[must_use]
    pub fn size_of_headers(&self) -> u32 {
        self.with_pe(|pe| {
            pe.header
                .optional_header
                .map_or(0, |oh| oh.windows_fields.size_of_headers)
        })
    }

    /// File offset of the data directory table.
    #[must_use]
    pub fn data_directory_offset(&self) -> usize {
        let pe32_plus = self
            .header_optional()
            .as_ref()
            .is_some_and(|oh| oh.standard_fields.magic == 0x020B);
        self.optional_header_offset() + if pe32_plus { 112 } else { 96 }
    }

    /// Returns the `(RVA, size)` of every data directory the optional header declares.
    ///
    /// The certificate table entry holds a file offset instead of an RVA.
    #[must_use]
    pub fn data_directories(&self) -> Vec<(u32, u32)> {
        let count = self.with_pe(|pe| {
            pe.header
                .optional_header
                .map_or(0, |oh| oh.windows_fields.number_of_rva_and_sizes)
        });

        let data = self.data();
        let mut offset = self.data_directory_offset();
        let mut directories = Vec::with_capacity(count.min(16) as usize);
        for _ in 0..count.min(16) {
            let (Ok(rva), Ok(size)) = (
                read_le_at::<u32>(data, &mut offset),
                read_le_at::<u32>(data, &mut offset),
            ) else {
                break;
            };
            directories.push((rva, size));
        }
        directories
    }

    /// Returns the section alignment, falling back to the common 0x2000 when absent.
    #[must_use]
    pub fn section_alignment(&self) -> u32 {
        self.with_pe(|pe| {
            pe.header
                .optional_header
                .map_or(0x2000, |oh| oh.windows_fields.section_alignment)
        })
    }

    /// Returns an iterator over the section table.
    pub fn sections(&self) -> impl Iterator<Item = &SectionTable> {
        self.with_pe(|pe| pe.sections.iter())
    }

    /// Returns the entire image.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.with_data(|data| data.data())
    }

    /// Returns `len` bytes of the image starting at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range is outside the image.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.with_data(|data| data.data_slice(offset, len))
    }

    /// Converts a relative virtual address into a file offset.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if no section contains `rva`.
    pub fn rva_to_offset(&self, rva: usize) -> Result<usize> {
        self.with_pe(|pe| {
            let rva_u32 = u32::try_from(rva)
                .map_err(|_| malformed_error!("RVA too large to fit in u32: {}", rva))?;

            for section in &pe.sections {
                let Some(section_max) = section
                    .virtual_address
                    .checked_add(section.virtual_size.max(section.size_of_raw_data))
                else {
                    return Err(malformed_error!(
                        "Section malformed, causing integer overflow - {} + {}",
                        section.virtual_address,
                        section.virtual_size
                    ));
                };

                if section.virtual_address <= rva_u32 && section_max > rva_u32 {
                    return Ok((rva - section.virtual_address as usize)
                        + section.pointer_to_raw_data as usize);
                }
            }

            Err(malformed_error!(
                "RVA could not be converted to offset - {}",
                rva
            ))
        })
    }

    /// Converts a file offset into a relative virtual address.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if no section's raw data contains `offset`.
    pub fn offset_to_rva(&self, offset: usize) -> Result<usize> {
        self.with_pe(|pe| {
            let offset_u32 = u32::try_from(offset)
                .map_err(|_| malformed_error!("Offset too large to fit in u32: {}", offset))?;

            for section in &pe.sections {
                let Some(section_max) = section
                    .pointer_to_raw_data
                    .checked_add(section.size_of_raw_data)
                else {
                    return Err(malformed_error!(
                        "Section malformed, causing integer overflow - {} + {}",
                        section.pointer_to_raw_data,
                        section.size_of_raw_data
                    ));
                };

                if section.pointer_to_raw_data <= offset_u32 && section_max > offset_u32 {
                    return Ok((offset - section.pointer_to_raw_data as usize)
                        + section.virtual_address as usize);
                }
            }

            Err(malformed_error!(
                "Offset could not be converted to RVA - {}",
                offset
            ))
        })
    }

    /// Returns the index of the section whose virtual range contains `rva`.
    #[must_use]
    pub fn section_index_of_rva(&self, rva: u32) -> Option<usize> {
        self.with_pe(|pe| {
            pe.sections.iter().position(|section| {
                let span = section.virtual_size.max(section.size_of_raw_data);
                section.virtual_address <= rva
                    && section
                        .virtual_address
                        .checked_add(span)
                        .is_some_and(|end| end > rva)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input() {
        assert!(matches!(File::from_mem(Vec::new()), Err(crate::Error::Empty)));
    }

    #[test]
    fn not_a_pe() {
        let result = File::from_mem(vec![0x42; 512]);
        assert!(result.is_err());
        assert!(result.err().is_some_and(|e| e.is_bad_image()));
    }

    #[test]
    fn missing_file() {
        let result = File::from_file(Path::new("/definitely/not/here.dll"));
        assert!(matches!(result, Err(crate::Error::FileError(_))));
    }
}
