//! Type definitions as the rewriter sees them.
//!
//! A module keeps its types in a flat arena, [`crate::metadata::module::CilModule::types`],
//! in `TypeDef` table order. Nesting is expressed as arena indices in both directions, so a
//! single type can be handed out as `&mut TypeDef` without borrowing its relatives.

use crate::metadata::{
    access::{TypeVisibility, TYPE_VISIBILITY_MASK},
    field::FieldDef,
    method::MethodDef,
    token::Token,
};

/// A type definition.
#[derive(Debug, Clone)]
pub struct TypeDef {
    /// Row id in the `TypeDef` table
    pub rid: u32,
    /// Metadata token
    pub token: Token,
    /// Namespace, empty for nested types and the global namespace
    pub namespace: String,
    /// Simple name
    pub name: String,
    /// `Namespace.Name`, with nested types written as `Outer/Inner`
    pub full_name: String,
    /// Visibility
    pub visibility: TypeVisibility,
    /// Raw `TypeAttributes` as read
    pub flags: u32,
    /// Fields in declaration order
    pub fields: Vec<FieldDef>,
    /// Methods in declaration order
    pub methods: Vec<MethodDef>,
    /// Arena index of the enclosing type
    pub enclosing: Option<usize>,
    /// Arena indices of the directly nested types
    pub nested: Vec<usize>,
}

impl TypeDef {
    /// `true` if the type is declared inside another type.
    #[must_use]
    pub fn is_nested(&self) -> bool {
        self.enclosing.is_some()
    }

    /// The `TypeAttributes` value to store: the original bits with the current visibility.
    #[must_use]
    pub fn encoded_flags(&self) -> u32 {
        (self.flags & !TYPE_VISIBILITY_MASK) | self.visibility.bits()
    }
}

/// Builds the full name of a top-level type.
#[must_use]
pub fn top_level_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}

/// Builds the full name of a type nested in `enclosing`.
#[must_use]
pub fn nested_name(enclosing: &str, name: &str) -> String {
    format!("{enclosing}/{name}")
}
