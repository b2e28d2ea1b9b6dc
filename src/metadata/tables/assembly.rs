use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::tables::{RowReadable, TableId, TableInfo},
    Result,
};

/// A row of the `Module` table (ECMA-335 II.22.30).
#[derive(Clone, Debug, PartialEq)]
pub struct ModuleRaw {
    /// 1-based row id
    pub rid: u32,
    /// Reserved, 0
    pub generation: u16,
    /// `#Strings` index of the module name
    pub name: u32,
    /// `#GUID` index of the module version id
    pub mvid: u32,
    /// `#GUID` index, reserved
    pub encid: u32,
    /// `#GUID` index, reserved
    pub encbaseid: u32,
}

impl RowReadable for ModuleRaw {
    const TABLE: TableId = TableId::Module;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(ModuleRaw {
            rid,
            generation: read_le_at::<u16>(data, offset)?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            mvid: read_le_at_dyn(data, offset, sizes.is_large_guid())?,
            encid: read_le_at_dyn(data, offset, sizes.is_large_guid())?,
            encbaseid: read_le_at_dyn(data, offset, sizes.is_large_guid())?,
        })
    }
}

/// A row of the `Assembly` table (ECMA-335 II.22.2).
#[derive(Clone, Debug, PartialEq)]
pub struct AssemblyRaw {
    /// 1-based row id
    pub rid: u32,
    /// Hash algorithm id
    pub hash_alg_id: u32,
    /// Major version
    pub major_version: u16,
    /// Minor version
    pub minor_version: u16,
    /// Build number
    pub build_number: u16,
    /// Revision number
    pub revision_number: u16,
    /// `AssemblyFlags` bits
    pub flags: u32,
    /// `#Blob` index of the public key
    pub public_key: u32,
    /// `#Strings` index of the name
    pub name: u32,
    /// `#Strings` index of the culture
    pub culture: u32,
}

impl RowReadable for AssemblyRaw {
    const TABLE: TableId = TableId::Assembly;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(AssemblyRaw {
            rid,
            hash_alg_id: read_le_at::<u32>(data, offset)?,
            major_version: read_le_at::<u16>(data, offset)?,
            minor_version: read_le_at::<u16>(data, offset)?,
            build_number: read_le_at::<u16>(data, offset)?,
            revision_number: read_le_at::<u16>(data, offset)?,
            flags: read_le_at::<u32>(data, offset)?,
            public_key: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            culture: read_le_at_dyn(data, offset, sizes.is_large_str())?,
        })
    }
}

/// A row of the `AssemblyRef` table (ECMA-335 II.22.5).
#[derive(Clone, Debug, PartialEq)]
pub struct AssemblyRefRaw {
    /// 1-based row id
    pub rid: u32,
    /// Major version
    pub major_version: u16,
    /// Minor version
    pub minor_version: u16,
    /// Build number
    pub build_number: u16,
    /// Revision number
    pub revision_number: u16,
    /// `AssemblyFlags` bits
    pub flags: u32,
    /// `#Blob` index of the public key or its token
    pub public_key_or_token: u32,
    /// `#Strings` index of the name
    pub name: u32,
    /// `#Strings` index of the culture
    pub culture: u32,
    /// `#Blob` index of the hash value
    pub hash_value: u32,
}

impl RowReadable for AssemblyRefRaw {
    const TABLE: TableId = TableId::AssemblyRef;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(AssemblyRefRaw {
            rid,
            major_version: read_le_at::<u16>(data, offset)?,
            minor_version: read_le_at::<u16>(data, offset)?,
            build_number: read_le_at::<u16>(data, offset)?,
            revision_number: read_le_at::<u16>(data, offset)?,
            flags: read_le_at::<u32>(data, offset)?,
            public_key_or_token: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            culture: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            hash_value: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}

/// A row of the `File` table (ECMA-335 II.22.19).
#[derive(Clone, Debug, PartialEq)]
pub struct FileRaw {
    /// 1-based row id
    pub rid: u32,
    /// `FileAttributes` bits, `0x0001` marks a file without metadata
    pub flags: u32,
    /// `#Strings` index of the file name
    pub name: u32,
    /// `#Blob` index of the hash value
    pub hash_value: u32,
}

impl FileRaw {
    /// `ContainsNoMetaData` flag.
    pub const CONTAINS_NO_METADATA: u32 = 0x0001;

    /// `true` if the file is a module with metadata, as opposed to a resource file.
    #[must_use]
    pub fn contains_metadata(&self) -> bool {
        self.flags & Self::CONTAINS_NO_METADATA == 0
    }
}

impl RowReadable for FileRaw {
    const TABLE: TableId = TableId::File;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(FileRaw {
            rid,
            flags: read_le_at::<u32>(data, offset)?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            hash_value: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}
