//! Metadata table identifiers and their column layout.

use strum::{EnumCount, EnumIter, IntoEnumIterator};

use crate::error::{Error, Result};
use crate::tables::CodedIndexKind;

/// Number of table slots addressable by the `valid` and `sorted` bit vectors.
pub const MAX_TABLES: usize = 64;

/// Tables whose rows must be sorted by their key column.
pub const SORTED_TYPE_SYSTEM_TABLES: u64 = 0x0000_1600_3301_FA00;

/// Debug tables whose rows must be sorted by their key column.
pub const SORTED_DEBUG_TABLES: u64 = (1 << TableId::LocalScope as u64)
    | (1 << TableId::StateMachineMethod as u64)
    | (1 << TableId::CustomDebugInformation as u64);

/// Metadata table identifiers (ECMA-335 II.22 and the Portable PDB tables).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, EnumCount)]
#[repr(u8)]
pub enum TableId {
    Module = 0x00,
    TypeRef = 0x01,
    TypeDef = 0x02,
    FieldPtr = 0x03,
    Field = 0x04,
    MethodPtr = 0x05,
    MethodDef = 0x06,
    ParamPtr = 0x07,
    Param = 0x08,
    InterfaceImpl = 0x09,
    MemberRef = 0x0A,
    Constant = 0x0B,
    CustomAttribute = 0x0C,
    FieldMarshal = 0x0D,
    DeclSecurity = 0x0E,
    ClassLayout = 0x0F,
    FieldLayout = 0x10,
    StandAloneSig = 0x11,
    EventMap = 0x12,
    EventPtr = 0x13,
    Event = 0x14,
    PropertyMap = 0x15,
    PropertyPtr = 0x16,
    Property = 0x17,
    MethodSemantics = 0x18,
    MethodImpl = 0x19,
    ModuleRef = 0x1A,
    TypeSpec = 0x1B,
    ImplMap = 0x1C,
    FieldRva = 0x1D,
    EncLog = 0x1E,
    EncMap = 0x1F,
    Assembly = 0x20,
    AssemblyProcessor = 0x21,
    AssemblyOs = 0x22,
    AssemblyRef = 0x23,
    AssemblyRefProcessor = 0x24,
    AssemblyRefOs = 0x25,
    File = 0x26,
    ExportedType = 0x27,
    ManifestResource = 0x28,
    NestedClass = 0x29,
    GenericParam = 0x2A,
    MethodSpec = 0x2B,
    GenericParamConstraint = 0x2C,
    Document = 0x30,
    MethodDebugInformation = 0x31,
    LocalScope = 0x32,
    LocalVariable = 0x33,
    LocalConstant = 0x34,
    ImportScope = 0x35,
    StateMachineMethod = 0x36,
    CustomDebugInformation = 0x37,
}

/// The storage class of one table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// Fixed 2-byte value.
    U16,
    /// Fixed 4-byte value.
    U32,
    /// Index into #Strings.
    String,
    /// Index into #GUID.
    Guid,
    /// Index into #Blob.
    Blob,
    /// Row id of a single table.
    Table(TableId),
    /// Coded index over several tables.
    Coded(CodedIndexKind),
}

impl TableId {
    /// Convert a raw table number.
    pub fn from_u8(value: u8) -> Result<Self> {
        Self::iter()
            .find(|t| *t as u8 == value)
            .ok_or(Error::InvalidTableId(value))
    }

    /// Bit of this table in the `valid` and `sorted` vectors.
    #[must_use]
    pub const fn mask(self) -> u64 {
        1u64 << (self as u8)
    }

    /// Token with this table in the high byte and `row` in the low 24 bits.
    #[must_use]
    pub const fn token(self, row: u32) -> u32 {
        ((self as u32) << 24) | row
    }

    /// The column layout of a row.
    #[must_use]
    pub const fn columns(self) -> &'static [Column] {
        use CodedIndexKind as K;
        use Column::{Blob, Coded, Guid, String, Table, U16, U32};
        match self {
            Self::Module => &[U16, String, Guid, Guid, Guid],
            Self::TypeRef => &[Coded(K::ResolutionScope), String, String],
            Self::TypeDef => &[
                U32,
                String,
                String,
                Coded(K::TypeDefOrRef),
                Table(Self::Field),
                Table(Self::MethodDef),
            ],
            Self::FieldPtr => &[Table(Self::Field)],
            Self::Field => &[U16, String, Blob],
            Self::MethodPtr => &[Table(Self::MethodDef)],
            Self::MethodDef => &[U32, U16, U16, String, Blob, Table(Self::Param)],
            Self::ParamPtr => &[Table(Self::Param)],
            Self::Param => &[U16, U16, String],
            Self::InterfaceImpl => &[Table(Self::TypeDef), Coded(K::TypeDefOrRef)],
            Self::MemberRef => &[Coded(K::MemberRefParent), String, Blob],
            Self::Constant => &[U16, Coded(K::HasConstant), Blob],
            Self::CustomAttribute => &[
                Coded(K::HasCustomAttribute),
                Coded(K::CustomAttributeType),
                Blob,
            ],
            Self::FieldMarshal => &[Coded(K::HasFieldMarshal), Blob],
            Self::DeclSecurity => &[U16, Coded(K::HasDeclSecurity), Blob],
            Self::ClassLayout => &[U16, U32, Table(Self::TypeDef)],
            Self::FieldLayout => &[U32, Table(Self::Field)],
            Self::StandAloneSig => &[Blob],
            Self::EventMap => &[Table(Self::TypeDef), Table(Self::Event)],
            Self::EventPtr => &[Table(Self::Event)],
            Self::Event => &[U16, String, Coded(K::TypeDefOrRef)],
            Self::PropertyMap => &[Table(Self::TypeDef), Table(Self::Property)],
            Self::PropertyPtr => &[Table(Self::Property)],
            Self::Property => &[U16, String, Blob],
            Self::MethodSemantics => &[U16, Table(Self::MethodDef), Coded(K::HasSemantics)],
            Self::MethodImpl => &[
                Table(Self::TypeDef),
                Coded(K::MethodDefOrRef),
                Coded(K::MethodDefOrRef),
            ],
            Self::ModuleRef => &[String],
            Self::TypeSpec => &[Blob],
            Self::ImplMap => &[
                U16,
                Coded(K::MemberForwarded),
                String,
                Table(Self::ModuleRef),
            ],
            Self::FieldRva => &[U32, Table(Self::Field)],
            Self::EncLog => &[U32, U32],
            Self::EncMap => &[U32],
            Self::Assembly => &[U32, U16, U16, U16, U16, U32, Blob, String, String],
            Self::AssemblyProcessor => &[U32],
            Self::AssemblyOs => &[U32, U32, U32],
            Self::AssemblyRef => &[U16, U16, U16, U16, U32, Blob, String, String, Blob],
            Self::AssemblyRefProcessor => &[U32, Table(Self::AssemblyRef)],
            Self::AssemblyRefOs => &[U32, U32, U32, Table(Self::AssemblyRef)],
            Self::File => &[U32, String, Blob],
            Self::ExportedType => &[U32, U32, String, String, Coded(K::Implementation)],
            Self::ManifestResource => &[U32, U32, String, Coded(K::Implementation)],
            Self::NestedClass => &[Table(Self::TypeDef), Table(Self::TypeDef)],
            Self::GenericParam => &[U16, U16, Coded(K::TypeOrMethodDef), String],
            Self::MethodSpec => &[Coded(K::MethodDefOrRef), Blob],
            Self::GenericParamConstraint => &[Table(Self::GenericParam), Coded(K::TypeDefOrRef)],
            Self::Document => &[Blob, Guid, Blob, Guid],
            Self::MethodDebugInformation => &[Table(Self::Document), Blob],
            Self::LocalScope => &[
                Table(Self::MethodDef),
                Table(Self::ImportScope),
                Table(Self::LocalVariable),
                Table(Self::LocalConstant),
                U32,
                U32,
            ],
            Self::LocalVariable => &[U16, U16, String],
            Self::LocalConstant => &[String, Blob],
            Self::ImportScope => &[Table(Self::ImportScope), Blob],
            Self::StateMachineMethod => &[Table(Self::MethodDef), Table(Self::MethodDef)],
            Self::CustomDebugInformation => &[
                Coded(K::HasCustomDebugInformation),
                Guid,
                Blob,
            ],
        }
    }
}
