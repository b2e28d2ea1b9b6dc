//! Header of the `#~` / `#-` tables stream (ECMA-335 II.24.2.6) and access to its rows.

use std::sync::Arc;

use strum::EnumCount;

use crate::{
    file::io::{read_le, read_le_at},
    metadata::tables::{RowReadable, TableId, TableInfo, TableInfoRef},
    Result,
};

/// `HeapSizes` flag announcing four bytes of extra data after the row counts.
pub const HEAP_SIZES_EXTRA_DATA: u8 = 0x40;

/// Parsed header of a tables stream, with the location of every present table.
pub struct TablesHeader<'a> {
    /// Major schema version, 2
    pub major_version: u8,
    /// Minor schema version, 0
    pub minor_version: u8,
    /// `HeapSizes` bit vector
    pub heap_sizes: u8,
    /// Bit vector of present tables
    pub valid: u64,
    /// Bit vector of sorted tables
    pub sorted: u64,
    /// Row counts and index widths
    pub info: TableInfoRef,
    data: &'a [u8],
    table_offsets: Vec<Option<usize>>,
}

impl<'a> TablesHeader<'a> {
    /// Parses the header of a tables stream and locates all tables within it.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] for table bits this reader has no layout for,
    /// and [`crate::Error::OutOfBounds`] if the tables exceed the stream.
    pub fn from(data: &'a [u8]) -> Result<TablesHeader<'a>> {
        if data.len() < 24 {
            return Err(out_of_bounds_error!());
        }

        let valid = read_le::<u64>(&data[8..])?;
        if valid >> TableId::COUNT != 0 {
            return Err(crate::Error::NotSupported);
        }

        let heap_sizes = read_le::<u8>(&data[6..])?;

        let mut offset = 24;
        let mut row_counts = Vec::with_capacity(valid.count_ones() as usize);
        for number in 0..TableId::COUNT {
            if valid & (1 << number) == 0 {
                continue;
            }

            #[allow(clippy::cast_possible_truncation)]
            let Some(table) = TableId::from_number(number as u8) else {
                return Err(crate::Error::NotSupported);
            };
            row_counts.push((table, read_le_at::<u32>(data, &mut offset)?));
        }

        if heap_sizes & HEAP_SIZES_EXTRA_DATA != 0 {
            offset += 4;
        }

        let info = TableInfo::new(&row_counts, heap_sizes);

        let mut table_offsets = vec![None; TableId::COUNT];
        for (table, rows) in &row_counts {
            table_offsets[*table as usize] = Some(offset);

            let Some(size) = (*rows as usize).checked_mul(info.row_size(*table)) else {
                return Err(malformed_error!("Table {:?} size overflows", table));
            };
            offset += size;
            if offset > data.len() {
                return Err(out_of_bounds_error!());
            }
        }

        Ok(TablesHeader {
            major_version: read_le::<u8>(&data[4..])?,
            minor_version: read_le::<u8>(&data[5..])?,
            heap_sizes,
            valid,
            sorted: read_le::<u64>(&data[16..])?,
            info: Arc::new(info),
            data,
            table_offsets,
        })
    }

    /// `true` if `table` is present in this stream.
    #[must_use]
    pub fn has_table(&self, table: TableId) -> bool {
        self.valid & (1u64 << (table as u8)) != 0
    }

    /// Number of rows of `table`, 0 if absent.
    #[must_use]
    pub fn table_row_count(&self, table: TableId) -> u32 {
        self.info.rows(table)
    }

    /// Offset of row `rid` (1-based) of `table` within the stream.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for an absent table or a row id out of range.
    pub fn row_offset(&self, table: TableId, rid: u32) -> Result<usize> {
        let Some(start) = self.table_offsets[table as usize] else {
            return Err(out_of_bounds_error!());
        };
        if rid == 0 || rid > self.info.rows(table) {
            return Err(out_of_bounds_error!());
        }

        Ok(start + (rid as usize - 1) * self.info.row_size(table))
    }

    /// Reads all rows of the table holding `T`; an absent table yields no rows.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if a row extends past the stream.
    pub fn table<T: RowReadable>(&self) -> Result<Vec<T>> {
        let Some(mut offset) = self.table_offsets[T::TABLE as usize] else {
            return Ok(Vec::new());
        };

        let rows = self.info.rows(T::TABLE);
        let mut result = Vec::with_capacity(rows as usize);
        for rid in 1..=rows {
            result.push(T::row_read(self.data, &mut offset, rid, &self.info)?);
        }

        Ok(result)
    }

    /// Iterates over the present tables with their row counts.
    pub fn present_tables(&self) -> impl Iterator<Item = (TableId, u32)> + '_ {
        self.table_offsets
            .iter()
            .enumerate()
            .filter(|(_, offset)| offset.is_some())
            .filter_map(|(number, _)| {
                #[allow(clippy::cast_possible_truncation)]
                TableId::from_number(number as u8).map(|id| (id, self.info.rows(id)))
            })
    }
}
