use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::{
        tables::{RowReadable, TableId, TableInfo},
        token::Token,
    },
    Result,
};

/// A row of the `Field` table (ECMA-335 II.22.15).
#[derive(Clone, Debug, PartialEq)]
pub struct FieldRaw {
    /// 1-based row id
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// Offset of the row within the tables stream
    pub offset: usize,
    /// `FieldAttributes` bits
    pub flags: u16,
    /// `#Strings` index of the name
    pub name: u32,
    /// `#Blob` index of the signature
    pub signature: u32,
}

impl RowReadable for FieldRaw {
    const TABLE: TableId = TableId::Field;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        let row_offset = *offset;
        Ok(FieldRaw {
            rid,
            token: Token::from_parts(TableId::Field, rid),
            offset: row_offset,
            flags: read_le_at::<u16>(data, offset)?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            signature: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}

/// A row of the `MethodDef` table (ECMA-335 II.22.26).
#[derive(Clone, Debug, PartialEq)]
pub struct MethodDefRaw {
    /// 1-based row id
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// Offset of the row within the tables stream
    pub offset: usize,
    /// RVA of the body, 0 for abstract, extern and runtime methods
    pub rva: u32,
    /// `MethodImplAttributes` bits
    pub impl_flags: u16,
    /// `MethodAttributes` bits
    pub flags: u16,
    /// `#Strings` index of the name
    pub name: u32,
    /// `#Blob` index of the signature
    pub signature: u32,
    /// First row of the parameter list
    pub param_list: u32,
}

impl MethodDefRaw {
    /// Offset of the `RVA` column within a row.
    pub const RVA_OFFSET: usize = 0;
    /// Offset of the `Flags` column within a row.
    pub const FLAGS_OFFSET: usize = 6;
}

impl RowReadable for MethodDefRaw {
    const TABLE: TableId = TableId::MethodDef;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        let row_offset = *offset;
        Ok(MethodDefRaw {
            rid,
            token: Token::from_parts(TableId::MethodDef, rid),
            offset: row_offset,
            rva: read_le_at::<u32>(data, offset)?,
            impl_flags: read_le_at::<u16>(data, offset)?,
            flags: read_le_at::<u16>(data, offset)?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            signature: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
            param_list: read_le_at_dyn(data, offset, sizes.is_large(TableId::Param))?,
        })
    }
}

/// A row of the `FieldPtr` table, present in uncompressed `#-` streams.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldPtrRaw {
    /// 1-based row id
    pub rid: u32,
    /// `Field` row this entry points to
    pub field: u32,
}

impl RowReadable for FieldPtrRaw {
    const TABLE: TableId = TableId::FieldPtr;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(FieldPtrRaw {
            rid,
            field: read_le_at_dyn(data, offset, sizes.is_large(TableId::Field))?,
        })
    }
}

/// A row of the `MethodPtr` table, present in uncompressed `#-` streams.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodPtrRaw {
    /// 1-based row id
    pub rid: u32,
    /// `MethodDef` row this entry points to
    pub method: u32,
}

impl RowReadable for MethodPtrRaw {
    const TABLE: TableId = TableId::MethodPtr;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(MethodPtrRaw {
            rid,
            method: read_le_at_dyn(data, offset, sizes.is_large(TableId::MethodDef))?,
        })
    }
}
