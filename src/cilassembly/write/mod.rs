//! Emission of modified modules.
//!
//! The writer patches a copy of the original image instead of rebuilding it. Every row
//! whose accessibility may have changed is rewritten in place, replaced bodies are laid
//! out by [`layout`], and the checksum is recomputed when the image carried one. The
//! result is written through [`output::Output`], so the target is replaced atomically or
//! not at all.
//!
//! Bodies that fit neither into freed extents nor into section slack make the image grow:
//! the last section is extended past the end of the file, or a section is appended.
//!
//! Since the metadata keeps its size, heap and table indexes stay valid, and bytes the
//! model does not describe (resources, signatures, debug directories, strong name
//! signature) are carried over unchanged.

mod checksum;
mod layout;
mod output;

pub use checksum::pe_checksum;
pub use output::{discard_pending, Output};

use std::{fs, path::Path};

use log::{debug, info};

use crate::{
    file::{
        io::write_le_at, COFF_NUMBER_OF_SECTIONS_OFFSET, OPTIONAL_HEADER_CHECKSUM_OFFSET,
        OPTIONAL_HEADER_SIZE_OF_IMAGE_OFFSET, SECTION_HEADER_SIZE,
    },
    metadata::{module::CilModule, tables::MethodDefRaw},
    Result,
};

use layout::{ImageGrowth, APPENDED_SECTION_CHARACTERISTICS, APPENDED_SECTION_NAME};

/// Offset of `VirtualSize` within a section header.
const SECTION_VIRTUAL_SIZE_OFFSET: usize = 8;

/// Writes `module` with all changes to its entities to `path`.
///
/// A sidecar pdb is staged next to the module and both are renamed into place together,
/// so a failure leaves neither behind.
///
/// # Errors
/// Returns [`crate::Error::Layout`] if replaced bodies cannot be placed and
/// [`crate::Error::FileError`] if the output cannot be written.
pub(crate) fn write_module(module: &CilModule, path: &Path) -> Result<()> {
    let original = module.file().data();
    let body_layout = layout::plan(module)?;
    let file_size = body_layout
        .growth
        .as_ref()
        .map_or(original.len(), |growth| growth.file_size);

    let mut output = Output::create(path, file_size as u64)?;
    let buffer = output.as_mut_slice();
    buffer[..original.len()].copy_from_slice(original);

    patch_rows(module, buffer, &body_layout.rvas)?;

    for (offset, encoded) in &body_layout.writes {
        let Some(target) = buffer.get_mut(*offset..*offset + encoded.len()) else {
            return Err(out_of_bounds_error!());
        };
        target.copy_from_slice(encoded);
    }

    let file = module.file();
    if let Some(growth) = &body_layout.growth {
        patch_sections(module, buffer, growth)?;
    }

    if file.checksum() != 0 && buffer[..] != original[..] {
        let checksum_offset = file.optional_header_offset() + OPTIONAL_HEADER_CHECKSUM_OFFSET;
        let checksum = pe_checksum(buffer, checksum_offset);
        let mut offset = checksum_offset;
        write_le_at::<u32>(buffer, &mut offset, checksum)?;
    }

    let symbols = stage_symbols(module, path)?;
    let symbols_target = symbols.is_some().then(|| path.with_extension("pdb"));
    if let Some(symbols) = symbols {
        symbols.finalize()?;
    }
    if let Err(error) = output.finalize() {
        if let Some(target) = symbols_target {
            let _ = fs::remove_file(target);
        }
        return Err(error);
    }

    info!(
        "Wrote {} ({} bodies replaced)",
        path.display(),
        body_layout.rvas.len()
    );
    Ok(())
}

/// Copies the sidecar pdb of `module` into a temporary file next to `path`.
fn stage_symbols(module: &CilModule, path: &Path) -> Result<Option<Output>> {
    let Some(source) = module.symbols() else {
        return Ok(None);
    };
    let target = path.with_extension("pdb");
    if target == source {
        return Ok(None);
    }

    let data = fs::read(source)?;
    if data.is_empty() {
        debug!("Skipped empty symbols {}", source.display());
        return Ok(None);
    }

    let mut output = Output::create(&target, data.len() as u64)?;
    output.write_at(0, &data)?;
    debug!("Staged symbols for {}", target.display());
    Ok(Some(output))
}

/// Writes the grown and appended section headers and the new image size.
fn patch_sections(module: &CilModule, buffer: &mut [u8], growth: &ImageGrowth) -> Result<()> {
    let file = module.file();
    let table = file.section_table_offset();
    let mut appended = 0u16;

    for section in &growth.sections {
        let header = table + section.index * SECTION_HEADER_SIZE;
        if section.appended {
            let Some(name) = buffer.get_mut(header..header + APPENDED_SECTION_NAME.len()) else {
                return Err(out_of_bounds_error!());
            };
            name.copy_from_slice(&APPENDED_SECTION_NAME);
            appended += 1;
        }

        let mut offset = header + SECTION_VIRTUAL_SIZE_OFFSET;
        write_le_at::<u32>(buffer, &mut offset, section.virtual_size)?;
        write_le_at::<u32>(buffer, &mut offset, section.virtual_address)?;
        write_le_at::<u32>(buffer, &mut offset, section.size_of_raw_data)?;
        write_le_at::<u32>(buffer, &mut offset, section.pointer_to_raw_data)?;

        if section.appended {
            // No relocations or line numbers
            for _ in 0..3 {
                write_le_at::<u32>(buffer, &mut offset, 0)?;
            }
            write_le_at::<u32>(buffer, &mut offset, APPENDED_SECTION_CHARACTERISTICS)?;
        }
    }

    if appended != 0 {
        let count = u16::try_from(file.sections().count())
            .map_err(|_| malformed_error!("Too many sections"))?;
        let mut offset = file.header_dos().pe_pointer as usize
            + COFF_NUMBER_OF_SECTIONS_OFFSET;
        write_le_at::<u16>(buffer, &mut offset, count + appended)?;
    }

    let mut offset = file.optional_header_offset() + OPTIONAL_HEADER_SIZE_OF_IMAGE_OFFSET;
    write_le_at::<u32>(buffer, &mut offset, growth.size_of_image)
}

/// Rewrites the flags of every `TypeDef`, `Field` and `MethodDef` row, and the RVA of every
/// method with a replaced body.
fn patch_rows(
    module: &CilModule,
    buffer: &mut [u8],
    rvas: &std::collections::HashMap<u32, u32>,
) -> Result<()> {
    let rows = module.rows();
    let row_offset = |offsets: &[usize], rid: u32| {
        offsets
            .get(rid as usize - 1)
            .copied()
            .ok_or_else(|| malformed_error!("Row {} has no recorded offset", rid))
    };

    for ty in module.types() {
        let mut offset = row_offset(&rows.types, ty.rid)?;
        write_le_at::<u32>(buffer, &mut offset, ty.encoded_flags())?;

        for field in &ty.fields {
            let mut offset = row_offset(&rows.fields, field.rid)?;
            write_le_at::<u16>(buffer, &mut offset, field.encoded_flags())?;
        }

        for method in &ty.methods {
            let row = row_offset(&rows.methods, method.rid)?;

            let mut offset = row + MethodDefRaw::FLAGS_OFFSET;
            write_le_at::<u16>(buffer, &mut offset, method.encoded_flags())?;

            if let Some(rva) = rvas.get(&method.rid) {
                let mut offset = row + MethodDefRaw::RVA_OFFSET;
                write_le_at::<u32>(buffer, &mut offset, *rva)?;
            }
        }
    }

    Ok(())
}
