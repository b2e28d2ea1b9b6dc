//! Methods of a type and their bodies.
//!
//! # Key Components
//!
//! - [`crate::metadata::method::MethodDef`] - One row of the `MethodDef` table
//! - [`crate::metadata::method::MethodBody`] - Header facts, clauses and instructions
//! - [`crate::metadata::method::ExceptionHandler`] - One exception handling clause
//! - Flag sets for method attributes, body headers and data sections

mod body;
mod exceptions;
mod types;

pub use body::{
    encoded_alignment, BodyOrigin, MethodBody, FAT_HEADER_SIZE, TINY_MAX_CODE_SIZE,
    TINY_MAX_STACK,
};
pub use exceptions::{ExceptionHandler, ExceptionHandlerFlags};
pub use types::{
    MethodBodyFlags, MethodImplCodeType, MethodModifiers, SectionFlags, METHOD_IMPL_CODE_TYPE_MASK,
};

use crate::metadata::{access::MemberAccess, token::Token};

/// `MethodImplAttributes` bit of methods implemented in unmanaged code.
pub const METHOD_IMPL_UNMANAGED: u16 = 0x0004;
/// `MethodImplAttributes` bit of methods implemented by the runtime itself.
pub const METHOD_IMPL_INTERNAL_CALL: u16 = 0x1000;

/// A method definition.
#[derive(Debug, Clone)]
pub struct MethodDef {
    /// Row id in the `MethodDef` table
    pub rid: u32,
    /// Metadata token
    pub token: Token,
    /// Simple name
    pub name: String,
    /// Accessibility
    pub access: MemberAccess,
    /// `MethodAttributes` bits outside the access mask
    pub modifiers: MethodModifiers,
    /// Raw `MethodAttributes` as read, used to patch the row
    pub flags: u16,
    /// `MethodImplAttributes`
    pub impl_flags: u16,
    /// RVA of the body, 0 for abstract, runtime and P/Invoke methods
    pub rva: u32,
    /// Parsed body, `None` when the method has none or bodies were not read
    pub body: Option<MethodBody>,
}

impl MethodDef {
    /// The `MethodAttributes` value to store: the original bits with the current access.
    #[must_use]
    pub fn encoded_flags(&self) -> u16 {
        (self.flags & !crate::metadata::access::MEMBER_ACCESS_MASK) | self.access.bits()
    }

    /// `true` if the method carries CIL code in this image.
    #[must_use]
    pub fn has_il_body(&self) -> bool {
        self.rva != 0
            && MethodImplCodeType::from_impl_flags(self.impl_flags) == MethodImplCodeType::IL
            && self.impl_flags & (METHOD_IMPL_UNMANAGED | METHOD_IMPL_INTERNAL_CALL) == 0
            && !self.modifiers.contains(MethodModifiers::ABSTRACT)
            && !self.modifiers.contains(MethodModifiers::PINVOKE_IMPL)
    }

    /// `true` if the body was replaced and must be emitted on write.
    #[must_use]
    pub fn has_replaced_body(&self) -> bool {
        self.body.as_ref().is_some_and(MethodBody::is_replaced)
    }
}
