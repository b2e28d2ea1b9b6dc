//! Row counts and index widths of a metadata tables stream.

use std::sync::Arc;

use strum::{EnumCount, IntoEnumIterator};

use crate::{
    metadata::tables::{CodedIndexType, Column, TableId},
    Result,
};

/// Row count of one table, with the width of indexes into it.
#[derive(Clone, Copy, Default, PartialEq, Debug)]
pub struct TableRowInfo {
    /// Number of rows
    pub rows: u32,
    /// Bits needed to hold the largest row id
    pub bits: u8,
    /// `true` if simple indexes into this table are 4 bytes wide
    pub is_large: bool,
}

impl TableRowInfo {
    /// Computes the index information for a table with `rows` rows.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(rows: u32) -> Self {
        let bits = if rows == 0 {
            1
        } else {
            (32 - rows.leading_zeros()) as u8
        };

        Self {
            rows,
            bits,
            is_large: rows > u32::from(u16::MAX),
        }
    }
}

/// Row counts and heap index widths, from which every row size follows.
#[derive(Clone, Default, Debug)]
pub struct TableInfo {
    rows: Vec<TableRowInfo>,
    coded_indexes: Vec<u8>,
    is_large_index_str: bool,
    is_large_index_guid: bool,
    is_large_index_blob: bool,
}

/// Shared handle to a [`TableInfo`].
pub type TableInfoRef = Arc<TableInfo>;

impl TableInfo {
    /// Builds the table information from row counts and the `HeapSizes` byte.
    #[must_use]
    pub fn new(row_counts: &[(TableId, u32)], heap_sizes: u8) -> Self {
        let mut table_info = TableInfo {
            rows: vec![TableRowInfo::default(); TableId::COUNT],
            coded_indexes: vec![0; CodedIndexType::COUNT],
            is_large_index_str: heap_sizes & 0x01 != 0,
            is_large_index_guid: heap_sizes & 0x02 != 0,
            is_large_index_blob: heap_sizes & 0x04 != 0,
        };

        for (table, rows) in row_counts {
            table_info.rows[*table as usize] = TableRowInfo::new(*rows);
        }

        table_info.calculate_coded_index_bits();
        table_info
    }

    /// Row information of `table`.
    #[must_use]
    pub fn get(&self, table: TableId) -> &TableRowInfo {
        &self.rows[table as usize]
    }

    /// Number of rows in `table`.
    #[must_use]
    pub fn rows(&self, table: TableId) -> u32 {
        self.rows[table as usize].rows
    }

    /// `true` if simple indexes into `id` are 4 bytes wide.
    #[must_use]
    pub fn is_large(&self, id: TableId) -> bool {
        self.rows[id as usize].is_large
    }

    /// `true` if `#Strings` indexes are 4 bytes wide.
    #[must_use]
    pub fn is_large_str(&self) -> bool {
        self.is_large_index_str
    }

    /// `true` if `#GUID` indexes are 4 bytes wide.
    #[must_use]
    pub fn is_large_guid(&self) -> bool {
        self.is_large_index_guid
    }

    /// `true` if `#Blob` indexes are 4 bytes wide.
    #[must_use]
    pub fn is_large_blob(&self) -> bool {
        self.is_large_index_blob
    }

    /// Bits required to hold coded indexes of `coded_index_type`.
    #[must_use]
    pub fn coded_index_bits(&self, coded_index_type: CodedIndexType) -> u8 {
        self.coded_indexes[coded_index_type as usize]
    }

    /// `true` if coded indexes of `coded_index_type` are 4 bytes wide.
    #[must_use]
    pub fn is_large_coded(&self, coded_index_type: CodedIndexType) -> bool {
        self.coded_index_bits(coded_index_type) > 16
    }

    /// `true` if `column` is stored in 4 bytes.
    #[must_use]
    pub fn is_large_column(&self, column: Column) -> bool {
        match column {
            Column::U16 => false,
            Column::U32 => true,
            Column::Str => self.is_large_index_str,
            Column::Guid => self.is_large_index_guid,
            Column::Blob => self.is_large_index_blob,
            Column::Table(table) => self.is_large(table),
            Column::Coded(kind) => self.is_large_coded(kind),
        }
    }

    /// Size in bytes of one row of `table`.
    #[must_use]
    pub fn row_size(&self, table: TableId) -> usize {
        table
            .columns()
            .iter()
            .map(|column| if self.is_large_column(*column) { 4 } else { 2 })
            .sum()
    }

    /// Offset of `column` within a row of `table`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `table` has fewer columns.
    pub fn column_offset(&self, table: TableId, column: usize) -> Result<usize> {
        let columns = table.columns();
        if column >= columns.len() {
            return Err(out_of_bounds_error!());
        }

        Ok(columns[..column]
            .iter()
            .map(|column| if self.is_large_column(*column) { 4 } else { 2 })
            .sum())
    }

    fn calculate_coded_index_bits(&mut self) {
        for coded_index in CodedIndexType::iter() {
            let max_bits = coded_index
                .tables()
                .iter()
                .flatten()
                .map(|table| self.rows[*table as usize].bits)
                .max()
                .unwrap_or(1);

            self.coded_indexes[coded_index as usize] = max_bits + coded_index.tag_bits();
        }
    }
}
