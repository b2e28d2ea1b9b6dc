use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::{
        tables::{CodedIndexType, RowReadable, TableId, TableInfo},
        token::Token,
    },
    Result,
};

/// A row of the `TypeDef` table (ECMA-335 II.22.37).
#[derive(Clone, Debug, PartialEq)]
pub struct TypeDefRaw {
    /// 1-based row id
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// Offset of the row within the tables stream
    pub offset: usize,
    /// `TypeAttributes` bits
    pub flags: u32,
    /// `#Strings` index of the name
    pub type_name: u32,
    /// `#Strings` index of the namespace
    pub type_namespace: u32,
    /// Base type, nil for interfaces and `<Module>`
    pub extends: Token,
    /// First row of the field list
    pub field_list: u32,
    /// First row of the method list
    pub method_list: u32,
}

impl RowReadable for TypeDefRaw {
    const TABLE: TableId = TableId::TypeDef;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        let row_offset = *offset;
        Ok(TypeDefRaw {
            rid,
            token: Token::from_parts(TableId::TypeDef, rid),
            offset: row_offset,
            flags: read_le_at::<u32>(data, offset)?,
            type_name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            type_namespace: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            extends: CodedIndexType::TypeDefOrRef.decode(read_le_at_dyn(
                data,
                offset,
                sizes.is_large_coded(CodedIndexType::TypeDefOrRef),
            )?)?,
            field_list: read_le_at_dyn(data, offset, sizes.is_large(TableId::Field))?,
            method_list: read_le_at_dyn(data, offset, sizes.is_large(TableId::MethodDef))?,
        })
    }
}

impl TypeDefRaw {
    /// Resolves the field and method list columns of all types into half-open ranges of
    /// logical row ids. A list runs until the list start of the next type, or to the end of
    /// the target table for the last type.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a list start lies beyond the target table or
    /// the list starts are not ascending.
    pub fn member_ranges(
        types: &[TypeDefRaw],
        field_rows: u32,
        method_rows: u32,
    ) -> Result<Vec<(std::ops::Range<u32>, std::ops::Range<u32>)>> {
        let mut ranges = Vec::with_capacity(types.len());

        for (index, row) in types.iter().enumerate() {
            let (field_end, method_end) = match types.get(index + 1) {
                Some(next) => (next.field_list, next.method_list),
                None => (field_rows + 1, method_rows + 1),
            };

            let fields = clamp_range(row.field_list, field_end, field_rows, "field")?;
            let methods = clamp_range(row.method_list, method_end, method_rows, "method")?;
            ranges.push((fields, methods));
        }

        Ok(ranges)
    }
}

fn clamp_range(start: u32, end: u32, rows: u32, kind: &str) -> Result<std::ops::Range<u32>> {
    // A list start of rows + 1 (or 0 on an empty table) marks an empty list
    let start = start.max(1);
    let end = end.max(1);
    if start > rows + 1 || end > rows + 1 || start > end {
        return Err(malformed_error!(
            "Invalid {} list {}..{} for {} rows",
            kind,
            start,
            end,
            rows
        ));
    }

    Ok(start..end)
}

/// A row of the `NestedClass` table (ECMA-335 II.22.32).
#[derive(Clone, Debug, PartialEq)]
pub struct NestedClassRaw {
    /// 1-based row id
    pub rid: u32,
    /// `TypeDef` row of the nested type
    pub nested_class: u32,
    /// `TypeDef` row of the enclosing type
    pub enclosing_class: u32,
}

impl RowReadable for NestedClassRaw {
    const TABLE: TableId = TableId::NestedClass;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(NestedClassRaw {
            rid,
            nested_class: read_le_at_dyn(data, offset, sizes.is_large(TableId::TypeDef))?,
            enclosing_class: read_le_at_dyn(data, offset, sizes.is_large(TableId::TypeDef))?,
        })
    }
}
