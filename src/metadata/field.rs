use crate::metadata::{
    access::{MemberAccess, MEMBER_ACCESS_MASK},
    token::Token,
};

/// A field definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Row id in the `Field` table
    pub rid: u32,
    /// Metadata token
    pub token: Token,
    /// Simple name
    pub name: String,
    /// Accessibility
    pub access: MemberAccess,
    /// Raw `FieldAttributes` as read
    pub flags: u16,
}

impl FieldDef {
    /// The `FieldAttributes` value to store: the original bits with the current access.
    #[must_use]
    pub fn encoded_flags(&self) -> u16 {
        (self.flags & !MEMBER_ACCESS_MASK) | self.access.bits()
    }
}
