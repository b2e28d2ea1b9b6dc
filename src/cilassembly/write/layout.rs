//! Placement of replaced method bodies.
//!
//! Bodies are patched into the existing image, so the layout never moves sections or
//! metadata. A replaced body goes, in order of preference, to
//!
//! 1. an identical replaced body that was already placed,
//! 2. an original body extent no surviving method references any more,
//! 3. the raw-data slack behind the last byte in use of the section holding the method
//!    bodies, whose virtual size is grown to cover it,
//! 4. new raw data of that section past the end of the file, when it is the last section,
//! 5. a section appended for the purpose.
//!
//! The bytes in use are everything the CLI header, metadata, method bodies and data
//! directories cover, so a section declaring a virtual size that is too small is not
//! mistaken for free space. Images ending in an attribute certificate table, and images
//! without header room for another section entry, fail with [`crate::Error::Layout`]
//! when the first three options are exhausted.

use std::collections::{BTreeSet, HashMap};

use goblin::pe::section_table::SectionTable;
use log::debug;

use crate::{
    file::{File, CERTIFICATE_TABLE_INDEX, SECTION_HEADER_SIZE},
    metadata::{method::encoded_alignment, module::CilModule},
    Error, Result,
};

/// Name of the section appended for bodies that fit nowhere else.
pub(crate) const APPENDED_SECTION_NAME: [u8; 8] = *b".stub\0\0\0";
/// `CNT_CODE | MEM_EXECUTE | MEM_READ`
pub(crate) const APPENDED_SECTION_CHARACTERISTICS: u32 = 0x6000_0020;

/// A contiguous range of reusable file bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Extent {
    start: usize,
    end: usize,
}

impl Extent {
    /// Reserves `len` bytes aligned to `alignment`, returning the start.
    fn take(&mut self, len: usize, alignment: usize) -> Option<usize> {
        let start = self.start.next_multiple_of(alignment);
        let end = start.checked_add(len)?;
        if end > self.end {
            return None;
        }
        self.start = end;
        Some(start)
    }
}

/// New geometry of a section that received bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SectionUpdate {
    /// Index into the section table
    pub index: usize,
    pub virtual_address: u32,
    pub virtual_size: u32,
    pub pointer_to_raw_data: u32,
    pub size_of_raw_data: u32,
    /// The section table gets a new entry for this section
    pub appended: bool,
}

/// Changes to the image geometry caused by placing bodies outside freed extents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImageGrowth {
    pub sections: Vec<SectionUpdate>,
    /// New `SizeOfImage`
    pub size_of_image: u32,
    /// Length of the written file
    pub file_size: usize,
}

/// Where every replaced body goes.
#[derive(Debug, Default)]
pub(crate) struct BodyLayout {
    /// New RVA per `MethodDef` row id
    pub rvas: HashMap<u32, u32>,
    /// Encoded bodies and the file offsets they are written to
    pub writes: Vec<(usize, Vec<u8>)>,
    /// Geometry changes, if bodies went past the original section contents
    pub growth: Option<ImageGrowth>,
}

/// The free end of a section that bodies are appended to.
#[derive(Debug)]
struct Tail {
    index: usize,
    virtual_address: u32,
    virtual_size: u32,
    raw_start: usize,
    size_of_raw_data: u32,
    /// Next free file offset
    cursor: usize,
    /// End of the usable raw data, `None` if the section may grow past the end of the file
    limit: Option<usize>,
    /// First RVA the section must not reach
    virtual_limit: u32,
    appended: bool,
    used: bool,
}

impl Tail {
    /// Reserves `len` bytes aligned to `alignment`, returning the file offset and RVA.
    fn take(&mut self, len: usize, alignment: usize) -> Option<(usize, u32)> {
        let start = self.cursor.next_multiple_of(alignment);
        let end = start.checked_add(len)?;
        if self.limit.is_some_and(|limit| end > limit) {
            return None;
        }

        let used = u32::try_from(end - self.raw_start).ok()?;
        if self.virtual_address.checked_add(used)? > self.virtual_limit {
            return None;
        }

        let rva = self.virtual_address + u32::try_from(start - self.raw_start).ok()?;
        self.cursor = end;
        self.used = true;
        Some((start, rva))
    }

    /// Geometry of the section after placement, `None` if nothing changes.
    fn update(&self, file_alignment: u32) -> Option<SectionUpdate> {
        if !self.used {
            return None;
        }

        let used = u32::try_from(self.cursor - self.raw_start).ok()?;
        let virtual_size = self.virtual_size.max(used);
        let size_of_raw_data = self
            .size_of_raw_data
            .max(used.next_multiple_of(file_alignment));
        if !self.appended
            && virtual_size == self.virtual_size
            && size_of_raw_data == self.size_of_raw_data
        {
            return None;
        }

        Some(SectionUpdate {
            index: self.index,
            virtual_address: self.virtual_address,
            virtual_size,
            pointer_to_raw_data: u32::try_from(self.raw_start).ok()?,
            size_of_raw_data,
            appended: self.appended,
        })
    }
}

/// Image geometry the layout works against.
struct Geometry {
    sections: Vec<SectionTable>,
    directories: Vec<(u32, u32)>,
    file_len: usize,
    file_alignment: u32,
    section_alignment: u32,
    size_of_headers: usize,
    section_table_offset: usize,
    size_of_image: u32,
}

impl Geometry {
    fn new(file: &File) -> Self {
        Geometry {
            sections: file.sections().cloned().collect(),
            directories: file.data_directories(),
            file_len: file.len(),
            file_alignment: file.file_alignment().max(1),
            section_alignment: file.section_alignment().max(1),
            size_of_headers: file.size_of_headers() as usize,
            section_table_offset: file.section_table_offset(),
            size_of_image: file
                .header_optional()
                .as_ref()
                .map_or(0, |oh| oh.windows_fields.size_of_image),
        }
    }

    /// Returns `true` if the image ends in an attribute certificate table.
    fn has_certificate(&self) -> bool {
        self.directories
            .get(CERTIFICATE_TABLE_INDEX)
            .is_some_and(|(offset, size)| *offset != 0 && *size != 0)
    }
}

/// Plans the placement of all replaced bodies of `module`.
///
/// # Errors
/// Returns [`crate::Error::Layout`] if a body does not fit anywhere, and
/// [`crate::Error::Malformed`] if a body cannot be encoded.
pub(crate) fn plan(module: &CilModule) -> Result<BodyLayout> {
    let mut layout = BodyLayout::default();

    let mut replaced = Vec::new();
    let mut replaced_rvas = BTreeSet::new();
    let mut surviving_rvas = BTreeSet::new();
    for method in module.types().iter().flat_map(|ty| ty.methods.iter()) {
        match &method.body {
            Some(body) if body.is_replaced() => {
                replaced.push((method.rid, body.encode()?));
                if method.rva != 0 {
                    replaced_rvas.insert(method.rva);
                }
            }
            _ if method.rva != 0 => {
                surviving_rvas.insert(method.rva);
            }
            _ => {}
        }
    }

    if replaced.is_empty() {
        return Ok(layout);
    }

    let mut free: Vec<Extent> = replaced_rvas
        .difference(&surviving_rvas)
        .filter_map(|rva| module.body_extent(*rva))
        .map(|extent| Extent {
            start: extent.offset,
            end: extent.offset + extent.size,
        })
        .collect();
    free.sort_by_key(|extent| extent.start);
    free.dedup_by(|next, prev| {
        if next.start <= prev.end {
            prev.end = prev.end.max(next.end);
            true
        } else {
            false
        }
    });

    let file = module.file();
    let geometry = Geometry::new(file);
    let body_rva = replaced_rvas
        .first()
        .copied()
        .unwrap_or(module.header().meta_data_rva);
    let mut body = body_tail(module, &geometry, body_rva);
    let mut appended: Option<Tail> = None;

    let mut placed: HashMap<Vec<u8>, u32> = HashMap::new();
    for (rid, encoded) in replaced {
        if let Some(rva) = placed.get(&encoded) {
            layout.rvas.insert(rid, *rva);
            continue;
        }

        let alignment = encoded_alignment(&encoded);
        let reused = free
            .iter_mut()
            .find_map(|extent| extent.take(encoded.len(), alignment));
        let (offset, rva) = match reused {
            Some(offset) => {
                let rva = u32::try_from(file.offset_to_rva(offset)?)
                    .map_err(|_| Error::Layout(format!("Offset {offset} has no 32-bit RVA")))?;
                (offset, rva)
            }
            None => match body
                .as_mut()
                .and_then(|tail| tail.take(encoded.len(), alignment))
            {
                Some(location) => location,
                None => {
                    if appended.is_none() {
                        appended = Some(appended_tail(module, &geometry)?);
                    }
                    appended
                        .as_mut()
                        .and_then(|tail| tail.take(encoded.len(), alignment))
                        .ok_or_else(|| {
                            Error::Layout(format!(
                                "No space for the body of method 0x{:08x} in {}",
                                0x0600_0000 | rid,
                                module.path().display()
                            ))
                        })?
                }
            },
        };

        placed.insert(encoded.clone(), rva);
        layout.rvas.insert(rid, rva);
        layout.writes.push((offset, encoded));
    }

    let updates: Vec<SectionUpdate> = [body, appended]
        .iter()
        .flatten()
        .filter_map(|tail| tail.update(geometry.file_alignment))
        .collect();
    if updates.is_empty() {
        return Ok(layout);
    }

    for update in &updates {
        debug!(
            "{} section {} of {} to 0x{:x} bytes at 0x{:08x}",
            if update.appended { "Appending" } else { "Growing" },
            update.index,
            module.path().display(),
            update.virtual_size,
            update.virtual_address
        );
    }

    let section_end = |virtual_address: u32, virtual_size: u32, size_of_raw_data: u32| {
        virtual_address.saturating_add(virtual_size.max(size_of_raw_data))
    };
    let size_of_image = geometry
        .sections
        .iter()
        .enumerate()
        .filter(|(index, _)| !updates.iter().any(|update| update.index == *index))
        .map(|(_, section)| {
            section_end(
                section.virtual_address,
                section.virtual_size,
                section.size_of_raw_data,
            )
        })
        .chain(updates.iter().map(|update| {
            section_end(
                update.virtual_address,
                update.virtual_size,
                update.size_of_raw_data,
            )
        }))
        .max()
        .unwrap_or(0)
        .next_multiple_of(geometry.section_alignment)
        .max(geometry.size_of_image);
    let file_size = updates
        .iter()
        .map(|update| update.pointer_to_raw_data as usize + update.size_of_raw_data as usize)
        .fold(geometry.file_len, usize::max);

    layout.growth = Some(ImageGrowth {
        sections: updates,
        size_of_image,
        file_size,
    });
    Ok(layout)
}

/// The free end of the section holding the method bodies.
///
/// Free space starts behind the last byte the section declares or anything in the image
/// references, whichever comes later.
fn body_tail(module: &CilModule, geometry: &Geometry, body_rva: u32) -> Option<Tail> {
    let index = module.file().section_index_of_rva(body_rva)?;
    let section = geometry.sections.get(index)?;

    let virtual_address = section.virtual_address;
    let span = section.virtual_size.max(section.size_of_raw_data);
    let raw_start = section.pointer_to_raw_data as usize;
    let raw_end = raw_start + section.size_of_raw_data as usize;

    let end_in_section = |rva: u32, size: u32| {
        (rva != 0 && rva >= virtual_address && rva - virtual_address < span)
            .then(|| raw_start + (rva - virtual_address) as usize + size as usize)
    };

    let header = module.header();
    let referenced = [
        (header.meta_data_rva, header.meta_data_size),
        (header.resource_rva, header.resource_size),
        (
            header.strong_name_signature_rva,
            header.strong_name_signature_size,
        ),
        (header.vtable_fixups_rva, header.vtable_fixups_size),
    ]
    .into_iter()
    .chain(
        geometry
            .directories
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != CERTIFICATE_TABLE_INDEX)
            .map(|(_, directory)| *directory),
    )
    .filter_map(|(rva, size)| end_in_section(rva, size));

    let bodies = module
        .body_extents()
        .filter(|extent| extent.offset >= raw_start && extent.offset < raw_end)
        .map(|extent| extent.offset + extent.size);

    let occupied = referenced
        .chain(bodies)
        .fold(raw_start + section.virtual_size as usize, usize::max);

    let is_last = geometry
        .sections
        .iter()
        .all(|other| other.virtual_address <= virtual_address);
    let extensible = is_last && raw_end >= geometry.file_len && !geometry.has_certificate();
    let virtual_limit = geometry
        .sections
        .iter()
        .filter(|other| other.virtual_address > virtual_address)
        .map(|other| other.virtual_address)
        .min()
        .unwrap_or(u32::MAX);

    Some(Tail {
        index,
        virtual_address,
        virtual_size: section.virtual_size,
        raw_start,
        size_of_raw_data: section.size_of_raw_data,
        cursor: occupied,
        limit: (!extensible).then_some(raw_end),
        virtual_limit,
        appended: false,
        used: false,
    })
}

/// A new section behind all existing ones, in virtual memory and in the file.
fn appended_tail(module: &CilModule, geometry: &Geometry) -> Result<Tail> {
    if geometry.has_certificate() {
        return Err(Error::Layout(format!(
            "{} ends in an attribute certificate table and cannot grow",
            module.path().display()
        )));
    }

    let index = geometry.sections.len();
    let entry_end = geometry.section_table_offset + (index + 1) * SECTION_HEADER_SIZE;
    let first_raw = geometry
        .sections
        .iter()
        .filter(|section| section.size_of_raw_data != 0)
        .map(|section| section.pointer_to_raw_data as usize)
        .min()
        .unwrap_or(usize::MAX);
    if entry_end > geometry.size_of_headers.min(first_raw) {
        return Err(Error::Layout(format!(
            "No header room for another section in {}",
            module.path().display()
        )));
    }

    let virtual_address = geometry
        .sections
        .iter()
        .map(|section| {
            section
                .virtual_address
                .saturating_add(section.virtual_size.max(section.size_of_raw_data))
        })
        .max()
        .unwrap_or(0)
        .next_multiple_of(geometry.section_alignment);
    let raw_start = geometry
        .file_len
        .next_multiple_of(geometry.file_alignment as usize);

    Ok(Tail {
        index,
        virtual_address,
        virtual_size: 0,
        raw_start,
        size_of_raw_data: 0,
        cursor: raw_start,
        limit: None,
        virtual_limit: u32::MAX,
        appended: true,
        used: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tail(limit: Option<usize>, virtual_limit: u32) -> Tail {
        Tail {
            index: 0,
            virtual_address: 0x2000,
            virtual_size: 0x80,
            raw_start: 0x200,
            size_of_raw_data: 0x200,
            cursor: 0x290,
            limit,
            virtual_limit,
            appended: false,
            used: false,
        }
    }

    #[test]
    fn extent_alignment() {
        let mut extent = Extent { start: 0x201, end: 0x210 };
        assert_eq!(extent.take(3, 1), Some(0x201));
        assert_eq!(extent.take(4, 4), Some(0x204));
        assert_eq!(extent.start, 0x208);
        assert_eq!(extent.take(12, 4), None);
        assert_eq!(extent.take(8, 4), Some(0x208));
        assert_eq!(extent.take(1, 1), None);
    }

    #[test]
    fn tail_within_raw_data() {
        let mut tail = tail(Some(0x400), 0x4000);
        assert_eq!(tail.update(0x200), None);

        assert_eq!(tail.take(0x10, 4), Some((0x290, 0x2090)));
        assert_eq!(tail.take(0x170, 1), None);
        assert_eq!(tail.take(0x100, 4), Some((0x2a0, 0x20a0)));

        let update = tail.update(0x200).unwrap();
        assert_eq!(update.virtual_size, 0x1a0);
        assert_eq!(update.size_of_raw_data, 0x200);
        assert!(!update.appended);
    }

    #[test]
    fn tail_past_end_of_file() {
        let mut tail = tail(None, 0x2400);
        assert_eq!(tail.take(0x300, 1), Some((0x290, 0x2090)));
        assert_eq!(tail.take(0x200, 1), None);

        let update = tail.update(0x200).unwrap();
        assert_eq!(update.virtual_size, 0x390);
        assert_eq!(update.size_of_raw_data, 0x400);
    }
}
