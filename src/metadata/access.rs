//! Accessibility domains of types and members (ECMA-335 II.23.1.15, II.23.1.5, II.23.1.10).
//!
//! Both are closed enums decoded from the low three bits of the respective flags. Every
//! value of the type domain is valid, while member access `7` is undefined and rejected.

use strum::{Display, EnumIter};

use crate::{Error, Result};

/// Mask of the visibility bits in `TypeAttributes`.
pub const TYPE_VISIBILITY_MASK: u32 = 0x0000_0007;
/// Mask of the access bits in `FieldAttributes` and `MethodAttributes`.
pub const MEMBER_ACCESS_MASK: u16 = 0x0007;

/// Visibility of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display)]
#[repr(u8)]
pub enum TypeVisibility {
    /// Top-level, visible inside its assembly only
    NotPublic = 0,
    /// Top-level, visible everywhere
    Public = 1,
    /// Nested, visible wherever the enclosing type is
    NestedPublic = 2,
    /// Nested, visible inside the enclosing type only
    NestedPrivate = 3,
    /// Nested, visible to the enclosing type and its subtypes
    NestedFamily = 4,
    /// Nested, visible inside the assembly
    NestedAssembly = 5,
    /// Nested, visible to subtypes inside the assembly
    NestedFamAndAssem = 6,
    /// Nested, visible to subtypes or inside the assembly
    NestedFamOrAssem = 7,
}

impl TypeVisibility {
    /// Decodes the visibility bits of `flags`.
    #[must_use]
    pub fn from_flags(flags: u32) -> Self {
        match flags & TYPE_VISIBILITY_MASK {
            0 => TypeVisibility::NotPublic,
            1 => TypeVisibility::Public,
            2 => TypeVisibility::NestedPublic,
            3 => TypeVisibility::NestedPrivate,
            4 => TypeVisibility::NestedFamily,
            5 => TypeVisibility::NestedAssembly,
            6 => TypeVisibility::NestedFamAndAssem,
            _ => TypeVisibility::NestedFamOrAssem,
        }
    }

    /// The visibility bits of this value.
    #[must_use]
    pub fn bits(self) -> u32 {
        self as u32
    }
}

/// Accessibility of a field or method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display)]
#[repr(u8)]
pub enum MemberAccess {
    /// Not referenceable
    CompilerControlled = 0,
    /// Declaring type only
    Private = 1,
    /// Subtypes inside the assembly
    FamAndAssem = 2,
    /// Inside the assembly
    Assembly = 3,
    /// Declaring type and subtypes
    Family = 4,
    /// Subtypes or inside the assembly
    FamOrAssem = 5,
    /// Everywhere
    Public = 6,
}

impl MemberAccess {
    /// Decodes the access bits of `flags`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Structural`] for the undefined value `7`.
    pub fn from_flags(flags: u16) -> Result<Self> {
        match flags & MEMBER_ACCESS_MASK {
            0 => Ok(MemberAccess::CompilerControlled),
            1 => Ok(MemberAccess::Private),
            2 => Ok(MemberAccess::FamAndAssem),
            3 => Ok(MemberAccess::Assembly),
            4 => Ok(MemberAccess::Family),
            5 => Ok(MemberAccess::FamOrAssem),
            6 => Ok(MemberAccess::Public),
            other => Err(Error::Structural(format!(
                "Unknown member access value {other} in flags 0x{flags:04x}"
            ))),
        }
    }

    /// The access bits of this value.
    #[must_use]
    pub fn bits(self) -> u16 {
        self as u16
    }
}
