//! Table row structures.
//!
//! One struct per table written by this crate. String columns hold virtual
//! [`StringIdx`] handles that are resolved when the row is serialized; every other
//! heap column already holds its final offset or index.

use crate::error::Result;
use crate::heaps::StringIdx;
use crate::tables::{CodedIndex, CodedIndexKind, RowWriter, TableId};

/// A row of one metadata table.
pub trait TableRow {
    /// The table this row belongs to.
    const TABLE: TableId;

    /// Serialize the row's columns in table order.
    fn write(&self, w: &mut RowWriter<'_>) -> Result<()>;

    /// Key the table is sorted by, for tables that are required to be sorted.
    fn sort_key(&self) -> (u64, u64) {
        (0, 0)
    }
}

/// Module table row (0x00).
#[derive(Debug, Clone, Default)]
pub struct ModuleRow {
    /// Generation (0 for a full image).
    pub generation: u16,
    /// Module name.
    pub name: StringIdx,
    /// Module GUID index into #GUID.
    pub mvid: u32,
    /// EncId GUID index.
    pub enc_id: u32,
    /// EncBaseId GUID index.
    pub enc_base_id: u32,
}

impl TableRow for ModuleRow {
    const TABLE: TableId = TableId::Module;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.u16(self.generation);
        w.string(self.name);
        w.guid(self.mvid);
        w.guid(self.enc_id);
        w.guid(self.enc_base_id);
        Ok(())
    }
}

/// TypeRef table row (0x01).
#[derive(Debug, Clone, Default)]
pub struct TypeRefRow {
    /// ResolutionScope coded index.
    pub resolution_scope: CodedIndex,
    /// Type name.
    pub type_name: StringIdx,
    /// Type namespace.
    pub type_namespace: StringIdx,
}

impl TableRow for TypeRefRow {
    const TABLE: TableId = TableId::TypeRef;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.coded(CodedIndexKind::ResolutionScope, self.resolution_scope)?;
        w.string(self.type_name);
        w.string(self.type_namespace);
        Ok(())
    }
}

/// TypeDef table row (0x02).
#[derive(Debug, Clone, Default)]
pub struct TypeDefRow {
    /// Type attributes (flags).
    pub flags: u32,
    /// Type name.
    pub type_name: StringIdx,
    /// Type namespace.
    pub type_namespace: StringIdx,
    /// Extends coded index (TypeDefOrRef).
    pub extends: CodedIndex,
    /// First field index into Field table.
    pub field_list: u32,
    /// First method index into MethodDef table.
    pub method_list: u32,
}

impl TableRow for TypeDefRow {
    const TABLE: TableId = TableId::TypeDef;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.u32(self.flags);
        w.string(self.type_name);
        w.string(self.type_namespace);
        w.coded(CodedIndexKind::TypeDefOrRef, self.extends)?;
        w.table(TableId::Field, self.field_list);
        w.table(TableId::MethodDef, self.method_list);
        Ok(())
    }
}

/// Field table row (0x04).
#[derive(Debug, Clone, Default)]
pub struct FieldRow {
    /// Field attributes (flags).
    pub flags: u16,
    /// Field name.
    pub name: StringIdx,
    /// Signature index into #Blob.
    pub signature: u32,
}

impl TableRow for FieldRow {
    const TABLE: TableId = TableId::Field;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.u16(self.flags);
        w.string(self.name);
        w.blob(self.signature);
        Ok(())
    }
}

/// MethodDef table row (0x06).
#[derive(Debug, Clone, Default)]
pub struct MethodDefRow {
    /// RVA of the method body.
    pub rva: u32,
    /// Implementation flags.
    pub impl_flags: u16,
    /// Method flags.
    pub flags: u16,
    /// Method name.
    pub name: StringIdx,
    /// Signature index into #Blob.
    pub signature: u32,
    /// First parameter index into Param table.
    pub param_list: u32,
}

impl TableRow for MethodDefRow {
    const TABLE: TableId = TableId::MethodDef;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.u32(self.rva);
        w.u16(self.impl_flags);
        w.u16(self.flags);
        w.string(self.name);
        w.blob(self.signature);
        w.table(TableId::Param, self.param_list);
        Ok(())
    }
}

/// Param table row (0x08).
#[derive(Debug, Clone, Default)]
pub struct ParamRow {
    /// Parameter flags.
    pub flags: u16,
    /// Parameter sequence number (0 is the return value).
    pub sequence: u16,
    /// Parameter name.
    pub name: StringIdx,
}

impl TableRow for ParamRow {
    const TABLE: TableId = TableId::Param;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.u16(self.flags);
        w.u16(self.sequence);
        w.string(self.name);
        Ok(())
    }
}

/// InterfaceImpl table row (0x09).
#[derive(Debug, Clone, Default)]
pub struct InterfaceImplRow {
    /// Implementing type.
    pub class: u32,
    /// Implemented interface (TypeDefOrRef).
    pub interface: CodedIndex,
}

impl TableRow for InterfaceImplRow {
    const TABLE: TableId = TableId::InterfaceImpl;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.table(TableId::TypeDef, self.class);
        w.coded(CodedIndexKind::TypeDefOrRef, self.interface)
    }

    fn sort_key(&self) -> (u64, u64) {
        (
            u64::from(self.class),
            self.interface.sort_key(CodedIndexKind::TypeDefOrRef),
        )
    }
}

/// MemberRef table row (0x0A).
#[derive(Debug, Clone, Default)]
pub struct MemberRefRow {
    /// Parent (MemberRefParent).
    pub class: CodedIndex,
    /// Member name.
    pub name: StringIdx,
    /// Signature index into #Blob.
    pub signature: u32,
}

impl TableRow for MemberRefRow {
    const TABLE: TableId = TableId::MemberRef;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.coded(CodedIndexKind::MemberRefParent, self.class)?;
        w.string(self.name);
        w.blob(self.signature);
        Ok(())
    }
}

/// Constant table row (0x0B).
#[derive(Debug, Clone, Default)]
pub struct ConstantRow {
    /// Element type of the value.
    pub constant_type: u8,
    /// Owner (HasConstant).
    pub parent: CodedIndex,
    /// Value index into #Blob.
    pub value: u32,
}

impl TableRow for ConstantRow {
    const TABLE: TableId = TableId::Constant;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        // Type byte followed by a zero padding byte.
        w.u16(u16::from(self.constant_type));
        w.coded(CodedIndexKind::HasConstant, self.parent)?;
        w.blob(self.value);
        Ok(())
    }

    fn sort_key(&self) -> (u64, u64) {
        (self.parent.sort_key(CodedIndexKind::HasConstant), 0)
    }
}

/// CustomAttribute table row (0x0C).
#[derive(Debug, Clone, Default)]
pub struct CustomAttributeRow {
    /// Owner (HasCustomAttribute).
    pub parent: CodedIndex,
    /// Constructor (CustomAttributeType).
    pub constructor: CodedIndex,
    /// Value index into #Blob.
    pub value: u32,
}

impl TableRow for CustomAttributeRow {
    const TABLE: TableId = TableId::CustomAttribute;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.coded(CodedIndexKind::HasCustomAttribute, self.parent)?;
        w.coded(CodedIndexKind::CustomAttributeType, self.constructor)?;
        w.blob(self.value);
        Ok(())
    }

    fn sort_key(&self) -> (u64, u64) {
        (self.parent.sort_key(CodedIndexKind::HasCustomAttribute), 0)
    }
}

/// FieldMarshal table row (0x0D).
#[derive(Debug, Clone, Default)]
pub struct FieldMarshalRow {
    /// Owner (HasFieldMarshal).
    pub parent: CodedIndex,
    /// Marshalling descriptor index into #Blob.
    pub native_type: u32,
}

impl TableRow for FieldMarshalRow {
    const TABLE: TableId = TableId::FieldMarshal;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.coded(CodedIndexKind::HasFieldMarshal, self.parent)?;
        w.blob(self.native_type);
        Ok(())
    }

    fn sort_key(&self) -> (u64, u64) {
        (self.parent.sort_key(CodedIndexKind::HasFieldMarshal), 0)
    }
}

/// DeclSecurity table row (0x0E).
#[derive(Debug, Clone, Default)]
pub struct DeclSecurityRow {
    /// Security action.
    pub action: u16,
    /// Owner (HasDeclSecurity).
    pub parent: CodedIndex,
    /// Permission set index into #Blob.
    pub permission_set: u32,
}

impl TableRow for DeclSecurityRow {
    const TABLE: TableId = TableId::DeclSecurity;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.u16(self.action);
        w.coded(CodedIndexKind::HasDeclSecurity, self.parent)?;
        w.blob(self.permission_set);
        Ok(())
    }

    fn sort_key(&self) -> (u64, u64) {
        (self.parent.sort_key(CodedIndexKind::HasDeclSecurity), 0)
    }
}

/// ClassLayout table row (0x0F).
#[derive(Debug, Clone, Default)]
pub struct ClassLayoutRow {
    /// Field alignment.
    pub packing_size: u16,
    /// Total size of the type.
    pub class_size: u32,
    /// Owning type.
    pub parent: u32,
}

impl TableRow for ClassLayoutRow {
    const TABLE: TableId = TableId::ClassLayout;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.u16(self.packing_size);
        w.u32(self.class_size);
        w.table(TableId::TypeDef, self.parent);
        Ok(())
    }

    fn sort_key(&self) -> (u64, u64) {
        (u64::from(self.parent), 0)
    }
}

/// FieldLayout table row (0x10).
#[derive(Debug, Clone, Default)]
pub struct FieldLayoutRow {
    /// Explicit field offset.
    pub offset: u32,
    /// Field.
    pub field: u32,
}

impl TableRow for FieldLayoutRow {
    const TABLE: TableId = TableId::FieldLayout;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.u32(self.offset);
        w.table(TableId::Field, self.field);
        Ok(())
    }

    fn sort_key(&self) -> (u64, u64) {
        (u64::from(self.field), 0)
    }
}

/// StandAloneSig table row (0x11).
#[derive(Debug, Clone, Default)]
pub struct StandAloneSigRow {
    /// Signature index into #Blob.
    pub signature: u32,
}

impl TableRow for StandAloneSigRow {
    const TABLE: TableId = TableId::StandAloneSig;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.blob(self.signature);
        Ok(())
    }
}

/// EventMap table row (0x12).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventMapRow {
    /// Owning type.
    pub parent: u32,
    /// First event of the run.
    pub event_list: u32,
}

impl TableRow for EventMapRow {
    const TABLE: TableId = TableId::EventMap;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.table(TableId::TypeDef, self.parent);
        w.table(TableId::Event, self.event_list);
        Ok(())
    }
}

/// Event table row (0x14).
#[derive(Debug, Clone, Default)]
pub struct EventRow {
    /// Event flags.
    pub flags: u16,
    /// Event name.
    pub name: StringIdx,
    /// Delegate type (TypeDefOrRef).
    pub event_type: CodedIndex,
}

impl TableRow for EventRow {
    const TABLE: TableId = TableId::Event;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.u16(self.flags);
        w.string(self.name);
        w.coded(CodedIndexKind::TypeDefOrRef, self.event_type)
    }
}

/// PropertyMap table row (0x15).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyMapRow {
    /// Owning type.
    pub parent: u32,
    /// First property of the run.
    pub property_list: u32,
}

impl TableRow for PropertyMapRow {
    const TABLE: TableId = TableId::PropertyMap;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.table(TableId::TypeDef, self.parent);
        w.table(TableId::Property, self.property_list);
        Ok(())
    }
}

/// Property table row (0x17).
#[derive(Debug, Clone, Default)]
pub struct PropertyRow {
    /// Property flags.
    pub flags: u16,
    /// Property name.
    pub name: StringIdx,
    /// Signature index into #Blob.
    pub signature: u32,
}

impl TableRow for PropertyRow {
    const TABLE: TableId = TableId::Property;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.u16(self.flags);
        w.string(self.name);
        w.blob(self.signature);
        Ok(())
    }
}

/// MethodSemantics table row (0x18).
#[derive(Debug, Clone, Default)]
pub struct MethodSemanticsRow {
    /// Semantics flags (getter, setter, adder ...).
    pub semantics: u16,
    /// Accessor method.
    pub method: u32,
    /// Owning event or property (HasSemantics).
    pub association: CodedIndex,
}

impl TableRow for MethodSemanticsRow {
    const TABLE: TableId = TableId::MethodSemantics;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.u16(self.semantics);
        w.table(TableId::MethodDef, self.method);
        w.coded(CodedIndexKind::HasSemantics, self.association)
    }

    fn sort_key(&self) -> (u64, u64) {
        (self.association.sort_key(CodedIndexKind::HasSemantics), 0)
    }
}

/// MethodImpl table row (0x19).
#[derive(Debug, Clone, Default)]
pub struct MethodImplRow {
    /// Implementing type.
    pub class: u32,
    /// Implementation (MethodDefOrRef).
    pub method_body: CodedIndex,
    /// Overridden declaration (MethodDefOrRef).
    pub method_declaration: CodedIndex,
}

impl TableRow for MethodImplRow {
    const TABLE: TableId = TableId::MethodImpl;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.table(TableId::TypeDef, self.class);
        w.coded(CodedIndexKind::MethodDefOrRef, self.method_body)?;
        w.coded(CodedIndexKind::MethodDefOrRef, self.method_declaration)
    }

    fn sort_key(&self) -> (u64, u64) {
        (u64::from(self.class), 0)
    }
}

/// ModuleRef table row (0x1A).
#[derive(Debug, Clone, Default)]
pub struct ModuleRefRow {
    /// Module name.
    pub name: StringIdx,
}

impl TableRow for ModuleRefRow {
    const TABLE: TableId = TableId::ModuleRef;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.string(self.name);
        Ok(())
    }
}

/// TypeSpec table row (0x1B).
#[derive(Debug, Clone, Default)]
pub struct TypeSpecRow {
    /// Signature index into #Blob.
    pub signature: u32,
}

impl TableRow for TypeSpecRow {
    const TABLE: TableId = TableId::TypeSpec;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.blob(self.signature);
        Ok(())
    }
}

/// ImplMap table row (0x1C).
#[derive(Debug, Clone, Default)]
pub struct ImplMapRow {
    /// P/Invoke flags.
    pub mapping_flags: u16,
    /// Forwarded member (MemberForwarded).
    pub member_forwarded: CodedIndex,
    /// Entry point name.
    pub import_name: StringIdx,
    /// Target module.
    pub import_scope: u32,
}

impl TableRow for ImplMapRow {
    const TABLE: TableId = TableId::ImplMap;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.u16(self.mapping_flags);
        w.coded(CodedIndexKind::MemberForwarded, self.member_forwarded)?;
        w.string(self.import_name);
        w.table(TableId::ModuleRef, self.import_scope);
        Ok(())
    }

    fn sort_key(&self) -> (u64, u64) {
        (self.member_forwarded.sort_key(CodedIndexKind::MemberForwarded), 0)
    }
}

/// FieldRVA table row (0x1D).
#[derive(Debug, Clone, Default)]
pub struct FieldRvaRow {
    /// Offset of the field data in the mapped data section.
    pub rva: u32,
    /// Field.
    pub field: u32,
}

impl TableRow for FieldRvaRow {
    const TABLE: TableId = TableId::FieldRva;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.u32(self.rva);
        w.table(TableId::Field, self.field);
        Ok(())
    }

    fn sort_key(&self) -> (u64, u64) {
        (u64::from(self.field), 0)
    }
}

/// EncLog table row (0x1E).
#[derive(Debug, Clone, Default)]
pub struct EncLogRow {
    /// Token of the changed row.
    pub token: u32,
    /// Edit operation (0 = default).
    pub func_code: u32,
}

impl TableRow for EncLogRow {
    const TABLE: TableId = TableId::EncLog;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.u32(self.token);
        w.u32(self.func_code);
        Ok(())
    }
}

/// EncMap table row (0x1F).
#[derive(Debug, Clone, Default)]
pub struct EncMapRow {
    /// Token of a row in this generation.
    pub token: u32,
}

impl TableRow for EncMapRow {
    const TABLE: TableId = TableId::EncMap;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.u32(self.token);
        Ok(())
    }
}

/// Assembly table row (0x20).
#[derive(Debug, Clone, Default)]
pub struct AssemblyRow {
    /// Hash algorithm id.
    pub hash_alg_id: u32,
    /// Major version.
    pub major_version: u16,
    /// Minor version.
    pub minor_version: u16,
    /// Build number.
    pub build_number: u16,
    /// Revision number.
    pub revision_number: u16,
    /// Assembly flags.
    pub flags: u32,
    /// Public key index into #Blob.
    pub public_key: u32,
    /// Assembly name.
    pub name: StringIdx,
    /// Culture.
    pub culture: StringIdx,
}

impl TableRow for AssemblyRow {
    const TABLE: TableId = TableId::Assembly;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.u32(self.hash_alg_id);
        w.u16(self.major_version);
        w.u16(self.minor_version);
        w.u16(self.build_number);
        w.u16(self.revision_number);
        w.u32(self.flags);
        w.blob(self.public_key);
        w.string(self.name);
        w.string(self.culture);
        Ok(())
    }
}

/// AssemblyRef table row (0x23).
#[derive(Debug, Clone, Default)]
pub struct AssemblyRefRow {
    /// Major version.
    pub major_version: u16,
    /// Minor version.
    pub minor_version: u16,
    /// Build number.
    pub build_number: u16,
    /// Revision number.
    pub revision_number: u16,
    /// Assembly flags.
    pub flags: u32,
    /// Public key or token index into #Blob.
    pub public_key_or_token: u32,
    /// Assembly name.
    pub name: StringIdx,
    /// Culture.
    pub culture: StringIdx,
    /// Hash value index into #Blob.
    pub hash_value: u32,
}

impl TableRow for AssemblyRefRow {
    const TABLE: TableId = TableId::AssemblyRef;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.u16(self.major_version);
        w.u16(self.minor_version);
        w.u16(self.build_number);
        w.u16(self.revision_number);
        w.u32(self.flags);
        w.blob(self.public_key_or_token);
        w.string(self.name);
        w.string(self.culture);
        w.blob(self.hash_value);
        Ok(())
    }
}

/// File table row (0x26).
#[derive(Debug, Clone, Default)]
pub struct FileRow {
    /// File flags (1 = contains no metadata).
    pub flags: u32,
    /// File name.
    pub name: StringIdx,
    /// Hash value index into #Blob.
    pub hash_value: u32,
}

impl TableRow for FileRow {
    const TABLE: TableId = TableId::File;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.u32(self.flags);
        w.string(self.name);
        w.blob(self.hash_value);
        Ok(())
    }
}

/// ExportedType table row (0x27).
#[derive(Debug, Clone, Default)]
pub struct ExportedTypeRow {
    /// Type attributes.
    pub flags: u32,
    /// TypeDef row hint in the defining module.
    pub type_def_id: u32,
    /// Type name.
    pub type_name: StringIdx,
    /// Type namespace.
    pub type_namespace: StringIdx,
    /// Where the type lives (Implementation).
    pub implementation: CodedIndex,
}

impl TableRow for ExportedTypeRow {
    const TABLE: TableId = TableId::ExportedType;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.u32(self.flags);
        w.u32(self.type_def_id);
        w.string(self.type_name);
        w.string(self.type_namespace);
        w.coded(CodedIndexKind::Implementation, self.implementation)
    }
}

/// ManifestResource table row (0x28).
#[derive(Debug, Clone, Default)]
pub struct ManifestResourceRow {
    /// Offset of the resource in the resources section.
    pub offset: u32,
    /// Visibility flags.
    pub flags: u32,
    /// Resource name.
    pub name: StringIdx,
    /// Where the resource lives (null for embedded).
    pub implementation: CodedIndex,
}

impl TableRow for ManifestResourceRow {
    const TABLE: TableId = TableId::ManifestResource;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.u32(self.offset);
        w.u32(self.flags);
        w.string(self.name);
        w.coded(CodedIndexKind::Implementation, self.implementation)
    }
}

/// NestedClass table row (0x29).
#[derive(Debug, Clone, Default)]
pub struct NestedClassRow {
    /// Nested type.
    pub nested_class: u32,
    /// Enclosing type.
    pub enclosing_class: u32,
}

impl TableRow for NestedClassRow {
    const TABLE: TableId = TableId::NestedClass;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.table(TableId::TypeDef, self.nested_class);
        w.table(TableId::TypeDef, self.enclosing_class);
        Ok(())
    }

    fn sort_key(&self) -> (u64, u64) {
        (u64::from(self.nested_class), 0)
    }
}

/// GenericParam table row (0x2A).
#[derive(Debug, Clone, Default)]
pub struct GenericParamRow {
    /// Ordinal within the owner.
    pub number: u16,
    /// Variance and constraint flags.
    pub flags: u16,
    /// Owner (TypeOrMethodDef).
    pub owner: CodedIndex,
    /// Parameter name.
    pub name: StringIdx,
}

impl TableRow for GenericParamRow {
    const TABLE: TableId = TableId::GenericParam;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.u16(self.number);
        w.u16(self.flags);
        w.coded(CodedIndexKind::TypeOrMethodDef, self.owner)?;
        w.string(self.name);
        Ok(())
    }

    fn sort_key(&self) -> (u64, u64) {
        (
            self.owner.sort_key(CodedIndexKind::TypeOrMethodDef),
            u64::from(self.number),
        )
    }
}

/// MethodSpec table row (0x2B).
#[derive(Debug, Clone, Default)]
pub struct MethodSpecRow {
    /// Generic method (MethodDefOrRef).
    pub method: CodedIndex,
    /// Instantiation signature index into #Blob.
    pub instantiation: u32,
}

impl TableRow for MethodSpecRow {
    const TABLE: TableId = TableId::MethodSpec;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.coded(CodedIndexKind::MethodDefOrRef, self.method)?;
        w.blob(self.instantiation);
        Ok(())
    }
}

/// GenericParamConstraint table row (0x2C).
#[derive(Debug, Clone, Default)]
pub struct GenericParamConstraintRow {
    /// Constrained generic parameter.
    pub owner: u32,
    /// Constraint type (TypeDefOrRef).
    pub constraint: CodedIndex,
}

impl TableRow for GenericParamConstraintRow {
    const TABLE: TableId = TableId::GenericParamConstraint;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.table(TableId::GenericParam, self.owner);
        w.coded(CodedIndexKind::TypeDefOrRef, self.constraint)
    }

    fn sort_key(&self) -> (u64, u64) {
        (u64::from(self.owner), 0)
    }
}

/// Document table row (0x30).
#[derive(Debug, Clone, Default)]
pub struct DocumentRow {
    /// Document name blob.
    pub name: u32,
    /// Hash algorithm GUID index.
    pub hash_algorithm: u32,
    /// Checksum blob.
    pub hash: u32,
    /// Language GUID index.
    pub language: u32,
}

impl TableRow for DocumentRow {
    const TABLE: TableId = TableId::Document;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.blob(self.name);
        w.guid(self.hash_algorithm);
        w.blob(self.hash);
        w.guid(self.language);
        Ok(())
    }
}

/// MethodDebugInformation table row (0x31).
#[derive(Debug, Clone, Default)]
pub struct MethodDebugInformationRow {
    /// Single document of the method, or 0 if it spans several.
    pub document: u32,
    /// Sequence points blob.
    pub sequence_points: u32,
}

impl TableRow for MethodDebugInformationRow {
    const TABLE: TableId = TableId::MethodDebugInformation;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.table(TableId::Document, self.document);
        w.blob(self.sequence_points);
        Ok(())
    }
}

/// LocalScope table row (0x32).
#[derive(Debug, Clone, Default)]
pub struct LocalScopeRow {
    /// Owning method.
    pub method: u32,
    /// Import scope in effect.
    pub import_scope: u32,
    /// First local variable.
    pub variable_list: u32,
    /// First local constant.
    pub constant_list: u32,
    /// IL offset of the scope start.
    pub start_offset: u32,
    /// Length of the scope in IL bytes.
    pub length: u32,
}

impl TableRow for LocalScopeRow {
    const TABLE: TableId = TableId::LocalScope;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.table(TableId::MethodDef, self.method);
        w.table(TableId::ImportScope, self.import_scope);
        w.table(TableId::LocalVariable, self.variable_list);
        w.table(TableId::LocalConstant, self.constant_list);
        w.u32(self.start_offset);
        w.u32(self.length);
        Ok(())
    }

    // Method, then start offset, then outer scopes before inner ones.
    fn sort_key(&self) -> (u64, u64) {
        (
            u64::from(self.method),
            (u64::from(self.start_offset) << 32) | u64::from(u32::MAX - self.length),
        )
    }
}

/// LocalVariable table row (0x33).
#[derive(Debug, Clone, Default)]
pub struct LocalVariableRow {
    /// Variable attributes (1 = debugger hidden).
    pub attributes: u16,
    /// Slot index.
    pub index: u16,
    /// Variable name.
    pub name: StringIdx,
}

impl TableRow for LocalVariableRow {
    const TABLE: TableId = TableId::LocalVariable;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.u16(self.attributes);
        w.u16(self.index);
        w.string(self.name);
        Ok(())
    }
}

/// LocalConstant table row (0x34).
#[derive(Debug, Clone, Default)]
pub struct LocalConstantRow {
    /// Constant name.
    pub name: StringIdx,
    /// Constant signature blob (type and value).
    pub signature: u32,
}

impl TableRow for LocalConstantRow {
    const TABLE: TableId = TableId::LocalConstant;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.string(self.name);
        w.blob(self.signature);
        Ok(())
    }
}

/// ImportScope table row (0x35).
#[derive(Debug, Clone, Default)]
pub struct ImportScopeRow {
    /// Enclosing scope.
    pub parent: u32,
    /// Imports blob.
    pub imports: u32,
}

impl TableRow for ImportScopeRow {
    const TABLE: TableId = TableId::ImportScope;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.table(TableId::ImportScope, self.parent);
        w.blob(self.imports);
        Ok(())
    }
}

/// StateMachineMethod table row (0x36).
#[derive(Debug, Clone, Default)]
pub struct StateMachineMethodRow {
    /// The generated MoveNext method.
    pub move_next_method: u32,
    /// The user-written method that starts the state machine.
    pub kickoff_method: u32,
}

impl TableRow for StateMachineMethodRow {
    const TABLE: TableId = TableId::StateMachineMethod;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.table(TableId::MethodDef, self.move_next_method);
        w.table(TableId::MethodDef, self.kickoff_method);
        Ok(())
    }

    fn sort_key(&self) -> (u64, u64) {
        (u64::from(self.move_next_method), 0)
    }
}

/// CustomDebugInformation table row (0x37).
#[derive(Debug, Clone, Default)]
pub struct CustomDebugInformationRow {
    /// Owner (HasCustomDebugInformation).
    pub parent: CodedIndex,
    /// Kind GUID index.
    pub kind: u32,
    /// Value blob.
    pub value: u32,
}

impl TableRow for CustomDebugInformationRow {
    const TABLE: TableId = TableId::CustomDebugInformation;

    fn write(&self, w: &mut RowWriter<'_>) -> Result<()> {
        w.coded(CodedIndexKind::HasCustomDebugInformation, self.parent)?;
        w.guid(self.kind);
        w.blob(self.value);
        Ok(())
    }

    fn sort_key(&self) -> (u64, u64) {
        (
            self.parent.sort_key(CodedIndexKind::HasCustomDebugInformation),
            0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heaps::StringHeapBuilder;
    use crate::tables::{MAX_TABLES, TableContext};
    use crate::writer::Writer;

    #[test]
    fn test_row_bytes_match_row_size() {
        let mut strings = StringHeapBuilder::new();
        let name = strings.add("Program");
        let strings = strings.freeze();
        let mut counts = [0u32; MAX_TABLES];
        counts[TableId::TypeDef as usize] = 1;
        let ctx = TableContext::new(0, counts);

        let row = TypeDefRow {
            flags: 0x0010_0001,
            type_name: name,
            extends: CodedIndex::new(TableId::TypeRef, 1),
            field_list: 1,
            method_list: 1,
            ..TypeDefRow::default()
        };
        let mut writer = Writer::new();
        row.write(&mut RowWriter::new(&mut writer, &ctx, &strings))
            .unwrap();
        let bytes = writer.to_vec();
        assert_eq!(bytes.len(), ctx.row_size(TableId::TypeDef));
        assert_eq!(&bytes[..4], &0x0010_0001u32.to_le_bytes());
        assert_eq!(&bytes[4..6], &(strings.resolve(name) as u16).to_le_bytes());
        assert_eq!(&bytes[8..10], &[(1 << 2) | 1, 0]);
    }

    #[test]
    fn test_constant_type_is_padded() {
        let strings = StringHeapBuilder::new().freeze();
        let ctx = TableContext::new(0, [0; MAX_TABLES]);
        let row = ConstantRow {
            constant_type: 0x08,
            parent: CodedIndex::new(TableId::Field, 1),
            value: 3,
        };
        let mut writer = Writer::new();
        row.write(&mut RowWriter::new(&mut writer, &ctx, &strings))
            .unwrap();
        assert_eq!(writer.to_vec(), vec![0x08, 0x00, 0x04, 0x00, 0x03, 0x00]);
    }

    #[test]
    fn test_local_scope_order() {
        let outer = LocalScopeRow {
            method: 1,
            start_offset: 0,
            length: 10,
            ..LocalScopeRow::default()
        };
        let inner = LocalScopeRow {
            method: 1,
            start_offset: 0,
            length: 4,
            ..LocalScopeRow::default()
        };
        assert!(outer.sort_key() < inner.sort_key());
    }
}
