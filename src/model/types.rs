//! Type and member references.
//!
//! Every reference lives in an arena owned by [`Module`](super::Module) and is named by a
//! [`TypeRefId`] or [`MemberRefId`]. Composite references (arrays, generic instances,
//! pointers) point at their components by id, so two ids can denote the same entity; the
//! emitter collapses those into one row by comparing the encoded form.

use crate::signature::ElementType;

use super::{AssemblyRefId, FieldDefId, MemberRefId, MethodDefId, TypeDefId, TypeRefId};

/// Built-in types with their own element type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Void,
    Boolean,
    Char,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    String,
    IntPtr,
    UIntPtr,
    Object,
    TypedReference,
}

impl PrimitiveType {
    /// Element type code used inside signatures.
    #[must_use]
    pub const fn element_type(self) -> ElementType {
        match self {
            Self::Void => ElementType::Void,
            Self::Boolean => ElementType::Boolean,
            Self::Char => ElementType::Char,
            Self::SByte => ElementType::I1,
            Self::Byte => ElementType::U1,
            Self::Int16 => ElementType::I2,
            Self::UInt16 => ElementType::U2,
            Self::Int32 => ElementType::I4,
            Self::UInt32 => ElementType::U4,
            Self::Int64 => ElementType::I8,
            Self::UInt64 => ElementType::U8,
            Self::Single => ElementType::R4,
            Self::Double => ElementType::R8,
            Self::String => ElementType::String,
            Self::IntPtr => ElementType::IntPtr,
            Self::UIntPtr => ElementType::UIntPtr,
            Self::Object => ElementType::Object,
            Self::TypedReference => ElementType::TypedByRef,
        }
    }

    /// Name of the type in the `System` namespace of the core library.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Void => "Void",
            Self::Boolean => "Boolean",
            Self::Char => "Char",
            Self::SByte => "SByte",
            Self::Byte => "Byte",
            Self::Int16 => "Int16",
            Self::UInt16 => "UInt16",
            Self::Int32 => "Int32",
            Self::UInt32 => "UInt32",
            Self::Int64 => "Int64",
            Self::UInt64 => "UInt64",
            Self::Single => "Single",
            Self::Double => "Double",
            Self::String => "String",
            Self::IntPtr => "IntPtr",
            Self::UIntPtr => "UIntPtr",
            Self::Object => "Object",
            Self::TypedReference => "TypedReference",
        }
    }

    /// Check if the type is a value type.
    #[must_use]
    pub const fn is_value_type(self) -> bool {
        !matches!(self, Self::String | Self::Object)
    }
}

/// Scope a namespace-level type reference is resolved in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolutionScope {
    /// The module being written.
    Module,
    /// Another module of the same assembly.
    ModuleRef(String),
    /// A referenced assembly.
    AssemblyRef(AssemblyRefId),
}

/// A `modreq`/`modopt` attached to a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomModifier {
    /// `modreq` when set, `modopt` otherwise.
    pub required: bool,
    /// The modifier type; must be a named type.
    pub modifier: TypeRefId,
}

/// A reference to a type, one variant per kind of reference.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeReference {
    /// A built-in type.
    Primitive(PrimitiveType),
    /// A type defined in this module.
    Definition(TypeDefId),
    /// A top-level type defined elsewhere.
    Namespace {
        scope: ResolutionScope,
        namespace: String,
        name: String,
        is_value_type: bool,
    },
    /// A nested type defined elsewhere.
    Nested {
        enclosing: TypeRefId,
        name: String,
        is_value_type: bool,
    },
    /// `G<A, B>`; `generic` must be a named type.
    GenericInstance {
        generic: TypeRefId,
        arguments: Vec<TypeRefId>,
    },
    /// Single-dimensional zero-based array.
    SzArray(TypeRefId),
    /// General array.
    Array {
        element: TypeRefId,
        rank: u32,
        sizes: Vec<u32>,
        lower_bounds: Vec<i32>,
    },
    /// Unmanaged pointer.
    Pointer(TypeRefId),
    /// Pinned local.
    Pinned(TypeRefId),
    /// A type with custom modifiers.
    Modified {
        modifiers: Vec<CustomModifier>,
        unmodified: TypeRefId,
    },
    /// `!n`
    GenericTypeParameter(u32),
    /// `!!n`
    GenericMethodParameter(u32),
    /// `method explicit ...*`
    FunctionPointer(Box<MethodSignature>),
}

/// A parameter, return or property type as it appears in a signature.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterType {
    /// Modifiers written before the type.
    pub modifiers: Vec<CustomModifier>,
    /// Passed by reference.
    pub by_ref: bool,
    pub type_ref: TypeRefId,
}

impl ParameterType {
    /// A by-value parameter without modifiers.
    #[must_use]
    pub fn new(type_ref: TypeRefId) -> Self {
        Self {
            modifiers: Vec::new(),
            by_ref: false,
            type_ref,
        }
    }

    /// A by-reference parameter.
    #[must_use]
    pub fn by_ref(type_ref: TypeRefId) -> Self {
        Self {
            by_ref: true,
            ..Self::new(type_ref)
        }
    }
}

/// Calling convention of a method signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MethodCallKind {
    #[default]
    Default,
    VarArg,
    /// Unmanaged calling conventions, used by function pointers.
    C,
    StdCall,
    ThisCall,
    FastCall,
}

/// A method signature.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSignature {
    pub kind: MethodCallKind,
    pub has_this: bool,
    pub explicit_this: bool,
    /// Number of generic method parameters; 0 for non-generic methods.
    pub generic_parameter_count: u32,
    pub return_type: ParameterType,
    pub parameters: Vec<ParameterType>,
    /// Extra arguments after the sentinel of a vararg call site.
    pub vararg_parameters: Vec<ParameterType>,
}

impl MethodSignature {
    /// A static method signature with the default calling convention.
    #[must_use]
    pub fn new_static(return_type: TypeRefId, parameters: Vec<TypeRefId>) -> Self {
        Self {
            kind: MethodCallKind::Default,
            has_this: false,
            explicit_this: false,
            generic_parameter_count: 0,
            return_type: ParameterType::new(return_type),
            parameters: parameters.into_iter().map(ParameterType::new).collect(),
            vararg_parameters: Vec::new(),
        }
    }

    /// An instance method signature with the default calling convention.
    #[must_use]
    pub fn new_instance(return_type: TypeRefId, parameters: Vec<TypeRefId>) -> Self {
        Self {
            has_this: true,
            ..Self::new_static(return_type, parameters)
        }
    }
}

/// A reference to a method or field, one variant per kind of reference.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberReference {
    /// A method defined in this module.
    Method(MethodDefId),
    /// A field defined in this module.
    Field(FieldDefId),
    /// A method of another type, or of an instantiated generic type.
    MethodRef {
        parent: TypeRefId,
        name: String,
        signature: MethodSignature,
    },
    /// A field of another type, or of an instantiated generic type.
    FieldRef {
        parent: TypeRefId,
        name: String,
        field_type: ParameterType,
    },
    /// An instantiation of a generic method.
    GenericMethodInstance {
        method: MemberRefId,
        arguments: Vec<TypeRefId>,
    },
}
