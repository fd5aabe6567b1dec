//! The object model consumed by the emitter.
//!
//! A [`Module`] owns every definition and reference in arenas. Entities are named by small
//! copyable ids handed out when they are added; the emitter keys all of its maps by these
//! ids, so two distinct references that happen to look alike are still distinct until the
//! emitter compares their encoded form.

mod body;
mod definitions;
mod types;

pub use body::{
    ExceptionRegion, ExceptionRegionKind, HIDDEN_LINE, IlOperand, Import, ImportScope,
    ImportTarget, LocalConstant, LocalScope, LocalVariable, MethodBody, SequencePoint,
    TokenFixup,
};
pub use definitions::{
    AssemblyDef, AssemblyReference, CustomDebugInfo, EventDef, ExportedType,
    ExportedTypeImplementation, FieldDef, FileReference, GenericParameter, ManagedResource,
    MethodDef, MethodImplementation, ParamDef, PlatformInvoke, PropertyDef, ResourceLocation,
    SecurityAttribute, TypeDef,
};
pub use types::{
    CustomModifier, MemberReference, MethodCallKind, MethodSignature, ParameterType,
    PrimitiveType, ResolutionScope, TypeReference,
};

use uguid::Guid;

use crate::attribute::CustomAttribute;
use crate::debug::DocumentChecksum;

macro_rules! arena_id {
    ($($(#[$meta:meta])* $name:ident;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(u32);

            impl $name {
                /// Position of the entity in its arena.
                #[must_use]
                pub const fn index(self) -> usize {
                    self.0 as usize
                }
            }
        )*
    };
}

arena_id! {
    /// Handle of a [`TypeDef`].
    TypeDefId;
    /// Handle of a [`FieldDef`].
    FieldDefId;
    /// Handle of a [`MethodDef`].
    MethodDefId;
    /// Handle of an [`EventDef`].
    EventDefId;
    /// Handle of a [`PropertyDef`].
    PropertyDefId;
    /// Handle of a [`TypeReference`].
    TypeRefId;
    /// Handle of a [`MemberReference`].
    MemberRefId;
    /// Handle of an [`AssemblyReference`].
    AssemblyRefId;
    /// Handle of a [`Document`].
    DocumentId;
    /// Handle of an [`ImportScope`].
    ImportScopeId;
}

fn push<T>(arena: &mut Vec<T>, value: T) -> u32 {
    arena.push(value);
    (arena.len() - 1) as u32
}

/// A source document referenced by sequence points.
#[derive(Debug)]
pub struct Document {
    pub name: String,
    pub language: Guid,
    pub checksum: Option<DocumentChecksum>,
}

/// The module being written.
#[derive(Debug, Default)]
pub struct Module {
    pub name: String,
    /// Module version id; derived from the content when absent.
    pub mvid: Option<Guid>,
    /// Present for the manifest module of an assembly, absent for a netmodule.
    pub assembly: Option<AssemblyDef>,
    /// Assembly that defines `System.Object` and the other primitive types.
    pub core_library: Option<AssemblyRefId>,
    pub entry_point: Option<MethodDefId>,
    pub attributes: Vec<CustomAttribute>,
    /// Assembly attributes of a netmodule, written on placeholder type references.
    pub netmodule_attributes: Vec<CustomAttribute>,
    /// Assembly security attributes of a netmodule.
    pub netmodule_security: Vec<SecurityAttribute>,
    pub exported_types: Vec<ExportedType>,
    pub files: Vec<FileReference>,
    pub resources: Vec<ManagedResource>,
    /// Custom debug information attached to the module.
    pub custom_debug_info: Vec<CustomDebugInfo>,
    top_level_types: Vec<TypeDefId>,
    types: Vec<TypeDef>,
    fields: Vec<FieldDef>,
    methods: Vec<MethodDef>,
    events: Vec<EventDef>,
    properties: Vec<PropertyDef>,
    type_refs: Vec<TypeReference>,
    member_refs: Vec<MemberReference>,
    assembly_refs: Vec<AssemblyReference>,
    documents: Vec<Document>,
    import_scopes: Vec<ImportScope>,
}

impl Module {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a top-level type.
    pub fn add_type(&mut self, mut def: TypeDef) -> TypeDefId {
        def.enclosing_type = None;
        let id = TypeDefId(push(&mut self.types, def));
        self.top_level_types.push(id);
        id
    }

    /// Add a type nested in `enclosing`.
    pub fn add_nested_type(&mut self, enclosing: TypeDefId, mut def: TypeDef) -> TypeDefId {
        def.enclosing_type = Some(enclosing);
        let id = TypeDefId(push(&mut self.types, def));
        self.types[enclosing.index()].nested_types.push(id);
        id
    }

    /// Add a field to `owner`.
    pub fn add_field(&mut self, owner: TypeDefId, def: FieldDef) -> FieldDefId {
        let id = FieldDefId(push(&mut self.fields, def));
        self.types[owner.index()].fields.push(id);
        id
    }

    /// Add a method to `owner`.
    pub fn add_method(&mut self, owner: TypeDefId, def: MethodDef) -> MethodDefId {
        let id = MethodDefId(push(&mut self.methods, def));
        self.types[owner.index()].methods.push(id);
        id
    }

    /// Add an event to `owner`.
    pub fn add_event(&mut self, owner: TypeDefId, def: EventDef) -> EventDefId {
        let id = EventDefId(push(&mut self.events, def));
        self.types[owner.index()].events.push(id);
        id
    }

    /// Add a property to `owner`.
    pub fn add_property(&mut self, owner: TypeDefId, def: PropertyDef) -> PropertyDefId {
        let id = PropertyDefId(push(&mut self.properties, def));
        self.types[owner.index()].properties.push(id);
        id
    }

    pub fn add_type_ref(&mut self, reference: TypeReference) -> TypeRefId {
        TypeRefId(push(&mut self.type_refs, reference))
    }

    /// Reference a primitive type.
    pub fn primitive(&mut self, primitive: PrimitiveType) -> TypeRefId {
        self.add_type_ref(TypeReference::Primitive(primitive))
    }

    /// Reference a type of this module.
    pub fn type_def_ref(&mut self, def: TypeDefId) -> TypeRefId {
        self.add_type_ref(TypeReference::Definition(def))
    }

    pub fn add_member_ref(&mut self, reference: MemberReference) -> MemberRefId {
        MemberRefId(push(&mut self.member_refs, reference))
    }

    /// Reference a method of this module.
    pub fn method_ref(&mut self, method: MethodDefId) -> MemberRefId {
        self.add_member_ref(MemberReference::Method(method))
    }

    pub fn add_assembly_ref(&mut self, reference: AssemblyReference) -> AssemblyRefId {
        AssemblyRefId(push(&mut self.assembly_refs, reference))
    }

    pub fn add_document(&mut self, document: Document) -> DocumentId {
        DocumentId(push(&mut self.documents, document))
    }

    pub fn add_import_scope(&mut self, scope: ImportScope) -> ImportScopeId {
        ImportScopeId(push(&mut self.import_scopes, scope))
    }

    /// Top-level types in definition order.
    pub fn top_level_types(&self) -> impl Iterator<Item = TypeDefId> + '_ {
        self.top_level_types.iter().copied()
    }

    #[must_use]
    pub fn type_def(&self, id: TypeDefId) -> &TypeDef {
        &self.types[id.index()]
    }

    pub fn type_def_mut(&mut self, id: TypeDefId) -> &mut TypeDef {
        &mut self.types[id.index()]
    }

    #[must_use]
    pub fn field(&self, id: FieldDefId) -> &FieldDef {
        &self.fields[id.index()]
    }

    pub fn field_mut(&mut self, id: FieldDefId) -> &mut FieldDef {
        &mut self.fields[id.index()]
    }

    #[must_use]
    pub fn method(&self, id: MethodDefId) -> &MethodDef {
        &self.methods[id.index()]
    }

    pub fn method_mut(&mut self, id: MethodDefId) -> &mut MethodDef {
        &mut self.methods[id.index()]
    }

    #[must_use]
    pub fn event(&self, id: EventDefId) -> &EventDef {
        &self.events[id.index()]
    }

    #[must_use]
    pub fn property(&self, id: PropertyDefId) -> &PropertyDef {
        &self.properties[id.index()]
    }

    #[must_use]
    pub fn type_ref(&self, id: TypeRefId) -> &TypeReference {
        &self.type_refs[id.index()]
    }

    #[must_use]
    pub fn member_ref(&self, id: MemberRefId) -> &MemberReference {
        &self.member_refs[id.index()]
    }

    #[must_use]
    pub fn assembly_ref(&self, id: AssemblyRefId) -> &AssemblyReference {
        &self.assembly_refs[id.index()]
    }

    #[must_use]
    pub fn document(&self, id: DocumentId) -> &Document {
        &self.documents[id.index()]
    }

    #[must_use]
    pub fn import_scope(&self, id: ImportScopeId) -> &ImportScope {
        &self.import_scopes[id.index()]
    }

    /// Every assembly reference, in the order they were added.
    pub fn assembly_refs(&self) -> impl Iterator<Item = (AssemblyRefId, &AssemblyReference)> {
        self.assembly_refs
            .iter()
            .enumerate()
            .map(|(i, r)| (AssemblyRefId(i as u32), r))
    }

    /// Every type definition, in the order they were added.
    pub fn type_defs(&self) -> impl Iterator<Item = (TypeDefId, &TypeDef)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, t)| (TypeDefId(i as u32), t))
    }

    /// Every document, in the order they were added.
    pub fn documents(&self) -> impl Iterator<Item = (DocumentId, &Document)> {
        self.documents
            .iter()
            .enumerate()
            .map(|(i, d)| (DocumentId(i as u32), d))
    }

    /// Number of type definitions.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.types.len()
    }
}
