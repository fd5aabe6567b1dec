//! Definitions: the rows this module owns.

use uguid::Guid;

use crate::attribute::CustomAttribute;
use crate::constant::ConstantValue;
use crate::resources::ResourceSource;

use super::body::MethodBody;
use super::{
    AssemblyRefId, EventDefId, FieldDefId, MemberRefId, MethodDefId, MethodSignature,
    ParameterType, PropertyDefId, TypeDefId, TypeRefId,
};

/// A generic parameter of a type or method.
#[derive(Debug, Clone, Default)]
pub struct GenericParameter {
    pub name: String,
    /// Variance and special constraint flags.
    pub flags: u16,
    pub constraints: Vec<TypeRefId>,
    pub attributes: Vec<CustomAttribute>,
}

impl GenericParameter {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A security attribute set attached to an assembly, type or method.
#[derive(Debug, Clone)]
pub struct SecurityAttribute {
    /// `System.Security.Permissions.SecurityAction` value.
    pub action: u16,
    pub attributes: Vec<CustomAttribute>,
}

/// An override of an interface or base method by a method of this type.
#[derive(Debug, Clone)]
pub struct MethodImplementation {
    pub body: MemberRefId,
    pub declaration: MemberRefId,
}

/// A type definition.
#[derive(Debug, Clone, Default)]
pub struct TypeDef {
    pub namespace: String,
    pub name: String,
    pub flags: u32,
    pub base_type: Option<TypeRefId>,
    pub interfaces: Vec<TypeRefId>,
    pub generic_parameters: Vec<GenericParameter>,
    pub method_implementations: Vec<MethodImplementation>,
    /// `(packing size, class size)` of an explicit layout.
    pub layout: Option<(u16, u32)>,
    pub is_value_type: bool,
    pub fields: Vec<FieldDefId>,
    pub methods: Vec<MethodDefId>,
    pub events: Vec<EventDefId>,
    pub properties: Vec<PropertyDefId>,
    pub nested_types: Vec<TypeDefId>,
    pub enclosing_type: Option<TypeDefId>,
    pub attributes: Vec<CustomAttribute>,
    pub security: Vec<SecurityAttribute>,
}

impl TypeDef {
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A field definition.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub flags: u16,
    pub field_type: ParameterType,
    /// Literal value for `const` fields.
    pub constant: Option<ConstantValue>,
    /// Explicit offset within an explicit-layout type.
    pub offset: Option<u32>,
    /// Initial data placed in the mapped field data section.
    pub mapped_data: Option<Vec<u8>>,
    /// Native marshalling descriptor blob.
    pub marshal: Option<Vec<u8>>,
    pub attributes: Vec<CustomAttribute>,
}

impl FieldDef {
    #[must_use]
    pub fn new(name: impl Into<String>, flags: u16, field_type: TypeRefId) -> Self {
        Self {
            name: name.into(),
            flags,
            field_type: ParameterType::new(field_type),
            constant: None,
            offset: None,
            mapped_data: None,
            marshal: None,
            attributes: Vec::new(),
        }
    }
}

/// A parameter row. Sequence 0 is the return value.
#[derive(Debug, Clone, Default)]
pub struct ParamDef {
    pub name: String,
    pub flags: u16,
    pub sequence: u16,
    pub default_value: Option<ConstantValue>,
    pub marshal: Option<Vec<u8>>,
    pub attributes: Vec<CustomAttribute>,
}

/// A P/Invoke import.
#[derive(Debug, Clone)]
pub struct PlatformInvoke {
    pub flags: u16,
    pub entry_point: String,
    pub module: String,
}

/// A method definition.
#[derive(Debug, Clone)]
pub struct MethodDef {
    pub name: String,
    pub flags: u16,
    pub impl_flags: u16,
    pub signature: MethodSignature,
    /// Parameter rows, in sequence order.
    pub params: Vec<ParamDef>,
    pub generic_parameters: Vec<GenericParameter>,
    pub body: Option<MethodBody>,
    pub pinvoke: Option<PlatformInvoke>,
    pub attributes: Vec<CustomAttribute>,
    pub security: Vec<SecurityAttribute>,
}

impl MethodDef {
    #[must_use]
    pub fn new(name: impl Into<String>, flags: u16, signature: MethodSignature) -> Self {
        Self {
            name: name.into(),
            flags,
            impl_flags: 0,
            signature,
            params: Vec::new(),
            generic_parameters: Vec::new(),
            body: None,
            pinvoke: None,
            attributes: Vec::new(),
            security: Vec::new(),
        }
    }
}

/// An event definition.
#[derive(Debug, Clone)]
pub struct EventDef {
    pub name: String,
    pub flags: u16,
    pub event_type: TypeRefId,
    pub adder: Option<MethodDefId>,
    pub remover: Option<MethodDefId>,
    pub caller: Option<MethodDefId>,
    pub others: Vec<MethodDefId>,
    pub attributes: Vec<CustomAttribute>,
}

/// A property definition.
#[derive(Debug, Clone)]
pub struct PropertyDef {
    pub name: String,
    pub flags: u16,
    pub has_this: bool,
    pub property_type: ParameterType,
    pub parameters: Vec<ParameterType>,
    pub default_value: Option<ConstantValue>,
    pub getter: Option<MethodDefId>,
    pub setter: Option<MethodDefId>,
    pub others: Vec<MethodDefId>,
    pub attributes: Vec<CustomAttribute>,
}

/// Identity of the assembly this module belongs to.
#[derive(Debug, Clone, Default)]
pub struct AssemblyDef {
    pub name: String,
    pub version: (u16, u16, u16, u16),
    pub culture: String,
    pub flags: u32,
    pub hash_algorithm: u32,
    pub public_key: Vec<u8>,
    pub attributes: Vec<CustomAttribute>,
    pub security: Vec<SecurityAttribute>,
}

/// A referenced assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyReference {
    pub name: String,
    pub version: (u16, u16, u16, u16),
    pub culture: String,
    /// Full public key or 8-byte token; a full key is reduced to its token.
    pub public_key_or_token: Vec<u8>,
    pub flags: u32,
}

impl AssemblyReference {
    #[must_use]
    pub fn new(name: impl Into<String>, version: (u16, u16, u16, u16)) -> Self {
        Self {
            name: name.into(),
            version,
            ..Self::default()
        }
    }
}

/// A type forwarded to, or defined in, another module or assembly.
#[derive(Debug, Clone)]
pub struct ExportedType {
    pub namespace: String,
    pub name: String,
    pub flags: u32,
    pub implementation: ExportedTypeImplementation,
}

/// Where an exported type lives.
#[derive(Debug, Clone)]
pub enum ExportedTypeImplementation {
    /// A forwarder to another assembly.
    Assembly(AssemblyRefId),
    /// Another file of this assembly.
    File(usize),
    /// Nested in another exported type, by index into [`Module::exported_types`](super::Module::exported_types).
    Enclosing(usize),
}

/// Another file of a multi-file assembly.
#[derive(Debug, Clone)]
pub struct FileReference {
    pub name: String,
    pub has_metadata: bool,
    pub hash: Vec<u8>,
}

/// A managed resource.
#[derive(Debug)]
pub struct ManagedResource {
    pub name: String,
    pub is_public: bool,
    pub location: ResourceLocation,
}

/// Where a managed resource's bytes come from.
#[derive(Debug)]
pub enum ResourceLocation {
    /// Embedded in the resources section.
    Embedded(Box<dyn ResourceSource>),
    /// Stored in another file of the assembly, by index into [`Module::files`](super::Module::files).
    File(usize),
    /// Defined in a referenced assembly.
    Assembly(AssemblyRefId),
}

/// A GUID-keyed blob attached to a debug entity.
#[derive(Debug, Clone)]
pub struct CustomDebugInfo {
    pub kind: Guid,
    pub value: Vec<u8>,
}
