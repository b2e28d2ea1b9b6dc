use bitflags::bitflags;

/// Mask of the code type bits in `MethodImplAttributes`.
pub const METHOD_IMPL_CODE_TYPE_MASK: u16 = 0x0003;

bitflags! {
    /// Code type of a method implementation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodImplCodeType: u16 {
        /// CIL code
        const IL = 0x0000;
        /// Native code
        const NATIVE = 0x0001;
        /// Optimized CIL, reserved
        const OPTIL = 0x0002;
        /// Provided by the runtime
        const RUNTIME = 0x0003;
    }
}

impl MethodImplCodeType {
    /// Extracts the code type from `MethodImplAttributes`.
    #[must_use]
    pub fn from_impl_flags(flags: u16) -> Self {
        Self::from_bits_truncate(flags & METHOD_IMPL_CODE_TYPE_MASK)
    }
}

bitflags! {
    /// `MethodAttributes` bits outside the access mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodModifiers: u16 {
        /// Exported through an unmanaged export
        const UNMANAGED_EXPORT = 0x0008;
        /// Static method
        const STATIC = 0x0010;
        /// Cannot be overridden
        const FINAL = 0x0020;
        /// Virtual method
        const VIRTUAL = 0x0040;
        /// Hidden by name and signature
        const HIDE_BY_SIG = 0x0080;
        /// Gets a new vtable slot
        const NEW_SLOT = 0x0100;
        /// Overridable only if accessible
        const STRICT = 0x0200;
        /// No implementation
        const ABSTRACT = 0x0400;
        /// Special name
        const SPECIAL_NAME = 0x0800;
        /// Name special to the runtime
        const RTSPECIAL_NAME = 0x1000;
        /// Implemented through P/Invoke
        const PINVOKE_IMPL = 0x2000;
        /// Has security attributes
        const HAS_SECURITY = 0x4000;
        /// Calls a method with security requirements
        const REQUIRE_SEC_OBJECT = 0x8000;
    }
}

bitflags! {
    /// Flags of a method body header (ECMA-335 II.25.4.1).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodBodyFlags: u16 {
        /// Tiny header format
        const TINY_FORMAT = 0x2;
        /// Fat header format
        const FAT_FORMAT = 0x3;
        /// Data sections follow the code
        const MORE_SECTS = 0x8;
        /// Locals are zero-initialized
        const INIT_LOCALS = 0x10;
    }
}

bitflags! {
    /// Flags of a method data section (ECMA-335 II.25.4.5).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags: u8 {
        /// Exception handling table
        const EHTABLE = 0x1;
        /// Reserved
        const OPT_ILTABLE = 0x2;
        /// Fat section layout
        const FAT_FORMAT = 0x40;
        /// Another section follows
        const MORE_SECTS = 0x80;
    }
}
