use strum::{EnumCount, EnumIter};

use crate::metadata::tables::CodedIndexType;

/// Identifiers of the metadata tables a `#~` or `#-` stream of a PE module may contain
/// (ECMA-335 II.22).
#[derive(Clone, Copy, PartialEq, Debug, EnumIter, EnumCount, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TableId {
    /// `0x00` - the current module
    Module = 0x00,
    /// `0x01` - references to types in other modules or assemblies
    TypeRef = 0x01,
    /// `0x02` - type definitions
    TypeDef = 0x02,
    /// `0x03` - indirection into the Field table, uncompressed streams only
    FieldPtr = 0x03,
    /// `0x04` - field definitions
    Field = 0x04,
    /// `0x05` - indirection into the MethodDef table, uncompressed streams only
    MethodPtr = 0x05,
    /// `0x06` - method definitions
    MethodDef = 0x06,
    /// `0x07` - indirection into the Param table
    ParamPtr = 0x07,
    /// `0x08` - method parameters
    Param = 0x08,
    /// `0x09` - implemented interfaces
    InterfaceImpl = 0x09,
    /// `0x0A` - member references
    MemberRef = 0x0A,
    /// `0x0B` - compile-time constants
    Constant = 0x0B,
    /// `0x0C` - custom attributes
    CustomAttribute = 0x0C,
    /// `0x0D` - marshalling descriptors
    FieldMarshal = 0x0D,
    /// `0x0E` - declarative security
    DeclSecurity = 0x0E,
    /// `0x0F` - explicit class layout
    ClassLayout = 0x0F,
    /// `0x10` - explicit field offsets
    FieldLayout = 0x10,
    /// `0x11` - standalone signatures
    StandAloneSig = 0x11,
    /// `0x12` - type to event list map
    EventMap = 0x12,
    /// `0x13` - indirection into the Event table
    EventPtr = 0x13,
    /// `0x14` - events
    Event = 0x14,
    /// `0x15` - type to property list map
    PropertyMap = 0x15,
    /// `0x16` - indirection into the Property table
    PropertyPtr = 0x16,
    /// `0x17` - properties
    Property = 0x17,
    /// `0x18` - property and event accessors
    MethodSemantics = 0x18,
    /// `0x19` - explicit method overrides
    MethodImpl = 0x19,
    /// `0x1A` - module references
    ModuleRef = 0x1A,
    /// `0x1B` - type specifications
    TypeSpec = 0x1B,
    /// `0x1C` - P/Invoke mappings
    ImplMap = 0x1C,
    /// `0x1D` - initial field data
    FieldRVA = 0x1D,
    /// `0x1E` - edit and continue log
    EncLog = 0x1E,
    /// `0x1F` - edit and continue map
    EncMap = 0x1F,
    /// `0x20` - the assembly manifest
    Assembly = 0x20,
    /// `0x21` - unused
    AssemblyProcessor = 0x21,
    /// `0x22` - unused
    AssemblyOS = 0x22,
    /// `0x23` - referenced assemblies
    AssemblyRef = 0x23,
    /// `0x24` - unused
    AssemblyRefProcessor = 0x24,
    /// `0x25` - unused
    AssemblyRefOS = 0x25,
    /// `0x26` - files of a multi-file assembly
    File = 0x26,
    /// `0x27` - types exported from other files or forwarded
    ExportedType = 0x27,
    /// `0x28` - manifest resources
    ManifestResource = 0x28,
    /// `0x29` - nested type to enclosing type map
    NestedClass = 0x29,
    /// `0x2A` - generic parameters
    GenericParam = 0x2A,
    /// `0x2B` - generic method instantiations
    MethodSpec = 0x2B,
    /// `0x2C` - generic parameter constraints
    GenericParamConstraint = 0x2C,
}

/// One column of a metadata table row.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Column {
    /// Fixed 2-byte value
    U16,
    /// Fixed 4-byte value
    U32,
    /// Index into `#Strings`
    Str,
    /// Index into `#GUID`
    Guid,
    /// Index into `#Blob`
    Blob,
    /// Simple index into another table
    Table(TableId),
    /// Coded index into one of several tables
    Coded(CodedIndexType),
}

impl TableId {
    /// Maps a table number from the `valid` bit vector to its id.
    #[must_use]
    pub fn from_number(number: u8) -> Option<TableId> {
        use strum::IntoEnumIterator;
        TableId::iter().find(|id| *id as u8 == number)
    }

    /// Number of table ids a PE module can carry.
    #[must_use]
    pub fn count() -> usize {
        TableId::COUNT
    }

    /// The column layout of a row of this table.
    #[must_use]
    pub fn columns(&self) -> &'static [Column] {
        use CodedIndexType as C;
        use Column::{Blob, Coded, Guid, Str, Table, U16, U32};

        match self {
            TableId::Module => &[U16, Str, Guid, Guid, Guid],
            TableId::TypeRef => &[Coded(C::ResolutionScope), Str, Str],
            TableId::TypeDef => &[
                U32,
                Str,
                Str,
                Coded(C::TypeDefOrRef),
                Table(TableId::Field),
                Table(TableId::MethodDef),
            ],
            TableId::FieldPtr => &[Table(TableId::Field)],
            TableId::Field => &[U16, Str, Blob],
            TableId::MethodPtr => &[Table(TableId::MethodDef)],
            TableId::MethodDef => &[U32, U16, U16, Str, Blob, Table(TableId::Param)],
            TableId::ParamPtr => &[Table(TableId::Param)],
            TableId::Param => &[U16, U16, Str],
            TableId::InterfaceImpl => &[Table(TableId::TypeDef), Coded(C::TypeDefOrRef)],
            TableId::MemberRef => &[Coded(C::MemberRefParent), Str, Blob],
            // Type is one byte followed by a padding byte
            TableId::Constant => &[U16, Coded(C::HasConstant), Blob],
            TableId::CustomAttribute => &[
                Coded(C::HasCustomAttribute),
                Coded(C::CustomAttributeType),
                Blob,
            ],
            TableId::FieldMarshal => &[Coded(C::HasFieldMarshal), Blob],
            TableId::DeclSecurity => &[U16, Coded(C::HasDeclSecurity), Blob],
            TableId::ClassLayout => &[U16, U32, Table(TableId::TypeDef)],
            TableId::FieldLayout => &[U32, Table(TableId::Field)],
            TableId::StandAloneSig => &[Blob],
            TableId::EventMap => &[Table(TableId::TypeDef), Table(TableId::Event)],
            TableId::EventPtr => &[Table(TableId::Event)],
            TableId::Event => &[U16, Str, Coded(C::TypeDefOrRef)],
            TableId::PropertyMap => &[Table(TableId::TypeDef), Table(TableId::Property)],
            TableId::PropertyPtr => &[Table(TableId::Property)],
            TableId::Property => &[U16, Str, Blob],
            TableId::MethodSemantics => {
                &[U16, Table(TableId::MethodDef), Coded(C::HasSemantics)]
            }
            TableId::MethodImpl => &[
                Table(TableId::TypeDef),
                Coded(C::MethodDefOrRef),
                Coded(C::MethodDefOrRef),
            ],
            TableId::ModuleRef => &[Str],
            TableId::TypeSpec => &[Blob],
            TableId::ImplMap => &[
                U16,
                Coded(C::MemberForwarded),
                Str,
                Table(TableId::ModuleRef),
            ],
            TableId::FieldRVA => &[U32, Table(TableId::Field)],
            TableId::EncLog => &[U32, U32],
            TableId::EncMap => &[U32],
            TableId::Assembly => &[U32, U16, U16, U16, U16, U32, Blob, Str, Str],
            TableId::AssemblyProcessor => &[U32],
            TableId::AssemblyOS => &[U32, U32, U32],
            TableId::AssemblyRef => &[U16, U16, U16, U16, U32, Blob, Str, Str, Blob],
            TableId::AssemblyRefProcessor => &[U32, Table(TableId::AssemblyRef)],
            TableId::AssemblyRefOS => &[U32, U32, U32, Table(TableId::AssemblyRef)],
            TableId::File => &[U32, Str, Blob],
            TableId::ExportedType => &[U32, U32, Str, Str, Coded(C::Implementation)],
            TableId::ManifestResource => &[U32, U32, Str, Coded(C::Implementation)],
            TableId::NestedClass => &[Table(TableId::TypeDef), Table(TableId::TypeDef)],
            TableId::GenericParam => &[U16, U16, Coded(C::TypeOrMethodDef), Str],
            TableId::MethodSpec => &[Coded(C::MethodDefOrRef), Blob],
            TableId::GenericParamConstraint => {
                &[Table(TableId::GenericParam), Coded(C::TypeDefOrRef)]
            }
        }
    }
}
