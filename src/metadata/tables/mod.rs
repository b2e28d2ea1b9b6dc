//! Metadata tables of the `#~` and `#-` streams (ECMA-335 II.22).
//!
//! Every table defined for PE modules is sized from its column layout, so the offsets of all
//! tables are known even though only the tables the rewriter needs are decoded into rows:
//! `Module`, `TypeDef`, `FieldPtr`, `Field`, `MethodPtr`, `MethodDef`, `NestedClass`,
//! `Assembly`, `AssemblyRef` and `File`.

mod assembly;
mod codedindex;
mod member;
mod tableid;
mod tableinfo;
mod typedef;

pub use assembly::{AssemblyRaw, AssemblyRefRaw, FileRaw, ModuleRaw};
pub use codedindex::CodedIndexType;
pub use member::{FieldPtrRaw, FieldRaw, MethodDefRaw, MethodPtrRaw};
pub use tableid::{Column, TableId};
pub use tableinfo::{TableInfo, TableInfoRef, TableRowInfo};
pub use typedef::{NestedClassRaw, TypeDefRaw};

use crate::Result;

/// A row type that can be read from a metadata table.
pub trait RowReadable: Sized {
    /// The table holding rows of this type.
    const TABLE: TableId;

    /// Reads one row at `offset`, advancing `offset` past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the row extends past `data`.
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self>;
}
