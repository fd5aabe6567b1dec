//! Get-or-create of reference rows.
//!
//! Every reference goes through two maps: one keyed by the model id, so a reference is
//! resolved once, and one keyed by what the row stores, so two distinct ids that encode
//! to the same row share it.

use std::collections::HashMap;

use crate::body::BodyTokens;
use crate::content_id::public_key_token;
use crate::error::{Error, Result};
use crate::model::{
    AssemblyRefId, IlOperand, LocalVariable, MemberRefId, MemberReference, MethodSignature,
    Module, ParameterType, ResolutionScope, TypeRefId, TypeReference,
};
use crate::signature::{SignatureEncoder, TypeHandleResolver};
use crate::tables::{
    AssemblyRefRow, CodedIndex, MemberRefRow, MethodSpecRow, ModuleRefRow, StandAloneSigRow,
    TableId, TypeRefRow, TypeSpecRow,
};

use super::{ASSEMBLY_FLAG_PUBLIC_KEY, MetadataEmitter};

/// Namespace and name of the types netmodule assembly attributes are attached to.
const ATTRIBUTES_GO_HERE_NAMESPACE: &str = "System.Runtime.CompilerServices";
const ATTRIBUTES_GO_HERE: &str = "AssemblyAttributesGoHere";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AssemblyKey {
    name: String,
    version: (u16, u16, u16, u16),
    culture: String,
    token: Vec<u8>,
}

/// Reference rows handed out so far.
#[derive(Debug, Default)]
pub(super) struct References {
    types: HashMap<TypeRefId, CodedIndex>,
    type_refs: HashMap<(CodedIndex, String, String), u32>,
    type_specs: HashMap<u32, u32>,
    members: HashMap<MemberRefId, CodedIndex>,
    member_refs: HashMap<(CodedIndex, String, u32), u32>,
    method_specs: HashMap<(CodedIndex, u32), u32>,
    assemblies: HashMap<AssemblyRefId, u32>,
    assembly_rows: HashMap<AssemblyKey, u32>,
    module_refs: HashMap<String, u32>,
    stand_alone_sigs: HashMap<u32, u32>,
    /// Placeholder TypeRefs of netmodule attributes, by (security, allow multiple).
    placeholders: HashMap<(bool, bool), u32>,
}

/// Token of a row given as a coded index.
pub(super) fn token(index: CodedIndex) -> u32 {
    index.table.map_or(0, |table| table.token(index.row))
}

impl MetadataEmitter<'_> {
    /// Row of a type as a `TypeDefOrRef` coded index.
    pub(super) fn type_handle(&mut self, id: TypeRefId) -> Result<CodedIndex> {
        if let Some(&handle) = self.refs.types.get(&id) {
            return Ok(handle);
        }
        let module = self.module;
        let handle = match module.type_ref(id) {
            TypeReference::Definition(def) => {
                CodedIndex::new(TableId::TypeDef, self.index.type_row(*def)?)
            }
            TypeReference::Primitive(primitive) => {
                let scope = self.core_library_scope()?;
                self.type_ref_row(scope, "System", primitive.name())
            }
            TypeReference::Namespace {
                scope,
                namespace,
                name,
                ..
            } => {
                let scope = self.resolution_scope(scope)?;
                self.type_ref_row(scope, namespace, name)
            }
            TypeReference::Nested {
                enclosing, name, ..
            } => {
                let enclosing = self.type_handle(*enclosing)?;
                if enclosing.table != Some(TableId::TypeRef) {
                    return Err(Error::Unresolved(format!(
                        "nested type {name} is not enclosed by a type reference"
                    )));
                }
                self.type_ref_row(enclosing, "", name)
            }
            _ => {
                let mut encoder = SignatureEncoder::new(module, &mut *self);
                encoder.type_ref(id)?;
                let blob = encoder.finish();
                let signature = self.md.blobs.add(&blob)?;
                let row = match self.refs.type_specs.get(&signature) {
                    Some(&row) => row,
                    None => {
                        let row = self.md.tables.type_spec.add(TypeSpecRow { signature });
                        self.refs.type_specs.insert(signature, row);
                        row
                    }
                };
                CodedIndex::new(TableId::TypeSpec, row)
            }
        };
        self.refs.types.insert(id, handle);
        Ok(handle)
    }

    /// Token of a type.
    pub(super) fn type_token(&mut self, id: TypeRefId) -> Result<u32> {
        Ok(token(self.type_handle(id)?))
    }

    fn type_ref_row(&mut self, scope: CodedIndex, namespace: &str, name: &str) -> CodedIndex {
        let key = (scope, namespace.to_string(), name.to_string());
        let row = match self.refs.type_refs.get(&key) {
            Some(&row) => row,
            None => {
                let row = self.md.tables.type_ref.add(TypeRefRow {
                    resolution_scope: scope,
                    type_name: self.md.strings.add(name),
                    type_namespace: self.md.strings.add(namespace),
                });
                self.refs.type_refs.insert(key, row);
                row
            }
        };
        CodedIndex::new(TableId::TypeRef, row)
    }

    fn resolution_scope(&mut self, scope: &ResolutionScope) -> Result<CodedIndex> {
        Ok(match scope {
            ResolutionScope::Module => CodedIndex::new(TableId::Module, 1),
            ResolutionScope::ModuleRef(name) => {
                CodedIndex::new(TableId::ModuleRef, self.module_ref_row(name))
            }
            ResolutionScope::AssemblyRef(assembly) => {
                CodedIndex::new(TableId::AssemblyRef, self.assembly_ref_row(*assembly)?)
            }
        })
    }

    fn core_library_scope(&mut self) -> Result<CodedIndex> {
        let core = self
            .module
            .core_library
            .ok_or_else(|| Error::Unresolved("core library".to_string()))?;
        Ok(CodedIndex::new(TableId::AssemblyRef, self.assembly_ref_row(core)?))
    }

    /// AssemblyRef row, shared by references that differ only by public key form.
    pub(super) fn assembly_ref_row(&mut self, id: AssemblyRefId) -> Result<u32> {
        if let Some(&row) = self.refs.assemblies.get(&id) {
            return Ok(row);
        }
        let reference = self.module.assembly_ref(id);
        let token = match reference.public_key_or_token.len() {
            0 | 8 => reference.public_key_or_token.clone(),
            _ => public_key_token(&reference.public_key_or_token).to_vec(),
        };
        let key = AssemblyKey {
            name: reference.name.clone(),
            version: reference.version,
            culture: reference.culture.clone(),
            token,
        };
        let row = match self.refs.assembly_rows.get(&key) {
            Some(&row) => row,
            None => {
                let (major_version, minor_version, build_number, revision_number) =
                    reference.version;
                let row = AssemblyRefRow {
                    major_version,
                    minor_version,
                    build_number,
                    revision_number,
                    flags: reference.flags & !ASSEMBLY_FLAG_PUBLIC_KEY,
                    public_key_or_token: self.md.blobs.add(&key.token)?,
                    name: self.md.strings.add(&reference.name),
                    culture: self.md.strings.add(&reference.culture),
                    hash_value: 0,
                };
                let row = self.md.tables.assembly_ref.add(row);
                self.refs.assembly_rows.insert(key, row);
                row
            }
        };
        self.refs.assemblies.insert(id, row);
        Ok(row)
    }

    pub(super) fn module_ref_row(&mut self, name: &str) -> u32 {
        if let Some(&row) = self.refs.module_refs.get(name) {
            return row;
        }
        let row = self.md.tables.module_ref.add(ModuleRefRow {
            name: self.md.strings.add(name),
        });
        self.refs.module_refs.insert(name.to_string(), row);
        row
    }

    /// Row of a member as a MethodDef, Field, MemberRef or MethodSpec coded index.
    pub(super) fn member_handle(&mut self, id: MemberRefId) -> Result<CodedIndex> {
        if let Some(&handle) = self.refs.members.get(&id) {
            return Ok(handle);
        }
        let module = self.module;
        let handle = match module.member_ref(id) {
            MemberReference::Method(method) => {
                CodedIndex::new(TableId::MethodDef, self.index.method_row(*method)?)
            }
            MemberReference::Field(field) => {
                CodedIndex::new(TableId::Field, self.index.field_row(*field)?)
            }
            MemberReference::MethodRef {
                parent,
                name,
                signature,
            } => {
                let class = self.type_handle(*parent)?;
                let signature = self.method_signature_blob(signature)?;
                self.member_ref_row(class, name, signature)
            }
            MemberReference::FieldRef {
                parent,
                name,
                field_type,
            } => {
                let class = self.type_handle(*parent)?;
                let signature = self.field_signature_blob(field_type)?;
                self.member_ref_row(class, name, signature)
            }
            MemberReference::GenericMethodInstance { method, arguments } => {
                let method = self.member_handle(*method)?;
                debug_assert!(
                    matches!(method.table, Some(TableId::MethodDef | TableId::MemberRef)),
                    "generic method instance over {method:?}"
                );
                let mut encoder = SignatureEncoder::new(module, &mut *self);
                encoder.method_spec(arguments)?;
                let blob = encoder.finish();
                let instantiation = self.md.blobs.add(&blob)?;
                let row = match self.refs.method_specs.get(&(method, instantiation)) {
                    Some(&row) => row,
                    None => {
                        let row = self.md.tables.method_spec.add(MethodSpecRow {
                            method,
                            instantiation,
                        });
                        self.refs.method_specs.insert((method, instantiation), row);
                        row
                    }
                };
                CodedIndex::new(TableId::MethodSpec, row)
            }
        };
        self.refs.members.insert(id, handle);
        Ok(handle)
    }

    /// Token of a member.
    pub(super) fn member_token(&mut self, id: MemberRefId) -> Result<u32> {
        Ok(token(self.member_handle(id)?))
    }

    fn member_ref_row(&mut self, class: CodedIndex, name: &str, signature: u32) -> CodedIndex {
        let key = (class, name.to_string(), signature);
        let row = match self.refs.member_refs.get(&key) {
            Some(&row) => row,
            None => {
                let row = self.md.tables.member_ref.add(MemberRefRow {
                    class,
                    name: self.md.strings.add(name),
                    signature,
                });
                self.refs.member_refs.insert(key, row);
                row
            }
        };
        CodedIndex::new(TableId::MemberRef, row)
    }

    /// #Blob offset of a method signature.
    pub(super) fn method_signature_blob(&mut self, sig: &MethodSignature) -> Result<u32> {
        let module = self.module;
        let mut encoder = SignatureEncoder::new(module, &mut *self);
        encoder.method(sig)?;
        let blob = encoder.finish();
        self.md.blobs.add(&blob)
    }

    /// #Blob offset of a field signature.
    pub(super) fn field_signature_blob(&mut self, field_type: &ParameterType) -> Result<u32> {
        let module = self.module;
        let mut encoder = SignatureEncoder::new(module, &mut *self);
        encoder.field(field_type)?;
        let blob = encoder.finish();
        self.md.blobs.add(&blob)
    }

    /// #Blob offset of a property signature.
    pub(super) fn property_signature_blob(
        &mut self,
        has_this: bool,
        property_type: &ParameterType,
        parameters: &[ParameterType],
    ) -> Result<u32> {
        let module = self.module;
        let mut encoder = SignatureEncoder::new(module, &mut *self);
        encoder.property(has_this, property_type, parameters)?;
        let blob = encoder.finish();
        self.md.blobs.add(&blob)
    }

    fn stand_alone_sig_row(&mut self, signature: u32) -> u32 {
        if let Some(&row) = self.refs.stand_alone_sigs.get(&signature) {
            return row;
        }
        let row = self
            .md
            .tables
            .stand_alone_sig
            .add(StandAloneSigRow { signature });
        self.refs.stand_alone_sigs.insert(signature, row);
        row
    }

    /// StandAloneSig row of a body's locals, or 0 when it has none.
    pub(super) fn local_signature_row(&mut self, locals: &[LocalVariable]) -> Result<u32> {
        if locals.is_empty() {
            return Ok(0);
        }
        let module = self.module;
        let mut encoder = SignatureEncoder::new(module, &mut *self);
        encoder.locals(locals)?;
        let blob = encoder.finish();
        let signature = self.md.blobs.add(&blob)?;
        Ok(self.stand_alone_sig_row(signature))
    }

    /// TypeRef row `AssemblyAttributesGoHere{,M,S,SM}` carrying netmodule assembly attributes.
    pub(super) fn attribute_placeholder_row(
        &mut self,
        security: bool,
        allow_multiple: bool,
    ) -> Result<u32> {
        if let Some(&row) = self.refs.placeholders.get(&(security, allow_multiple)) {
            return Ok(row);
        }
        let suffix = match (security, allow_multiple) {
            (false, false) => "",
            (false, true) => "M",
            (true, false) => "S",
            (true, true) => "SM",
        };
        let scope = self.core_library_scope()?;
        let name = format!("{ATTRIBUTES_GO_HERE}{suffix}");
        let row = self
            .type_ref_row(scope, ATTRIBUTES_GO_HERE_NAMESPACE, &name)
            .row;
        self.refs.placeholders.insert((security, allow_multiple), row);
        Ok(row)
    }
}

impl TypeHandleResolver for MetadataEmitter<'_> {
    fn type_def_or_ref(&mut self, _module: &Module, id: TypeRefId) -> Result<CodedIndex> {
        self.type_handle(id)
    }
}

impl BodyTokens for MetadataEmitter<'_> {
    fn operand_token(&mut self, operand: &IlOperand) -> Result<u32> {
        match operand {
            IlOperand::Type(ty) => self.type_token(*ty),
            IlOperand::Member(member) => self.member_token(*member),
            IlOperand::String(s) => self.md.user_strings.add(s),
            IlOperand::Signature(sig) => {
                let signature = self.method_signature_blob(sig)?;
                Ok(TableId::StandAloneSig.token(self.stand_alone_sig_row(signature)))
            }
        }
    }

    fn catch_type_token(&mut self, ty: TypeRefId) -> Result<u32> {
        self.type_token(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::super::DefinitionIndex;
    use super::*;
    use crate::model::{AssemblyReference, PrimitiveType, TypeDef};
    use crate::options::WriterOptions;

    fn core_module() -> Module {
        let mut module = Module::new("m.dll");
        let core = module.add_assembly_ref(AssemblyReference::new("mscorlib", (4, 0, 0, 0)));
        module.core_library = Some(core);
        module
    }

    fn with_emitter<T>(module: &Module, f: impl FnOnce(&mut MetadataEmitter<'_>) -> T) -> T {
        let options = WriterOptions::new();
        let index = DefinitionIndex::build(module, &options).unwrap();
        let mut emitter = MetadataEmitter::new(module, &options, &index);
        f(&mut emitter)
    }

    #[test]
    fn test_primitives_resolve_into_core_library() {
        let mut module = core_module();
        let int = module.primitive(PrimitiveType::Int32);
        let again = module.primitive(PrimitiveType::Int32);
        with_emitter(&module, |emitter| {
            let a = emitter.type_handle(int).unwrap();
            let b = emitter.type_handle(again).unwrap();
            assert_eq!(a, CodedIndex::new(TableId::TypeRef, 1));
            assert_eq!(a, b);
            let row = emitter.md.tables.type_ref.get(1).unwrap();
            assert_eq!(row.resolution_scope, CodedIndex::new(TableId::AssemblyRef, 1));
        });
    }

    #[test]
    fn test_primitive_without_core_library() {
        let mut module = Module::new("m.dll");
        let int = module.primitive(PrimitiveType::Int32);
        with_emitter(&module, |emitter| {
            assert!(matches!(emitter.type_handle(int), Err(Error::Unresolved(_))));
        });
    }

    #[test]
    fn test_definitions_use_type_def_rows() {
        let mut module = core_module();
        module.add_type(TypeDef::new("", "A"));
        let b = module.add_type(TypeDef::new("", "B"));
        let b_ref = module.type_def_ref(b);
        with_emitter(&module, |emitter| {
            assert_eq!(
                emitter.type_handle(b_ref).unwrap(),
                CodedIndex::new(TableId::TypeDef, 2)
            );
            assert!(emitter.md.tables.type_ref.is_empty());
        });
    }

    #[test]
    fn test_type_specs_are_shared() {
        let mut module = core_module();
        let int = module.primitive(PrimitiveType::Int32);
        let a = module.add_type_ref(TypeReference::SzArray(int));
        let b = module.add_type_ref(TypeReference::SzArray(int));
        with_emitter(&module, |emitter| {
            let a = emitter.type_handle(a).unwrap();
            let b = emitter.type_handle(b).unwrap();
            assert_eq!(a, CodedIndex::new(TableId::TypeSpec, 1));
            assert_eq!(a, b);
            assert_eq!(emitter.md.tables.type_spec.len(), 1);
        });
    }

    #[test]
    fn test_member_refs_collapse_by_structure() {
        let mut module = core_module();
        let object = module.primitive(PrimitiveType::Object);
        let void = module.primitive(PrimitiveType::Void);
        let make = |module: &mut Module| {
            module.add_member_ref(MemberReference::MethodRef {
                parent: object,
                name: ".ctor".to_string(),
                signature: MethodSignature::new_instance(void, vec![]),
            })
        };
        let a = make(&mut module);
        let b = make(&mut module);
        with_emitter(&module, |emitter| {
            let a = emitter.member_token(a).unwrap();
            let b = emitter.member_token(b).unwrap();
            assert_eq!(a, 0x0A00_0001);
            assert_eq!(a, b);
            assert_eq!(emitter.md.tables.member_ref.len(), 1);
        });
    }

    #[test]
    fn test_assembly_refs_collapse_key_and_token() {
        let mut module = Module::new("m.dll");
        let key = vec![0x5A; 160];
        let token = public_key_token(&key).to_vec();
        let mut full = AssemblyReference::new("lib", (1, 0, 0, 0));
        full.public_key_or_token = key;
        full.flags = ASSEMBLY_FLAG_PUBLIC_KEY;
        let mut short = AssemblyReference::new("lib", (1, 0, 0, 0));
        short.public_key_or_token = token;
        let a = module.add_assembly_ref(full);
        let b = module.add_assembly_ref(short);
        with_emitter(&module, |emitter| {
            assert_eq!(emitter.assembly_ref_row(a).unwrap(), 1);
            assert_eq!(emitter.assembly_ref_row(b).unwrap(), 1);
            let row = emitter.md.tables.assembly_ref.get(1).unwrap();
            assert_eq!(row.flags, 0);
            assert_eq!(emitter.md.blobs.get(row.public_key_or_token).unwrap().len(), 8);
        });
    }

    #[test]
    fn test_locals_signature_is_shared() {
        let mut module = core_module();
        let int = module.primitive(PrimitiveType::Int32);
        let locals = vec![LocalVariable {
            name: None,
            pinned: false,
            local_type: ParameterType::new(int),
            hidden: false,
        }];
        with_emitter(&module, |emitter| {
            assert_eq!(emitter.local_signature_row(&[]).unwrap(), 0);
            assert_eq!(emitter.local_signature_row(&locals).unwrap(), 1);
            assert_eq!(emitter.local_signature_row(&locals).unwrap(), 1);
        });
    }

    #[test]
    fn test_attribute_placeholders() {
        let module = core_module();
        with_emitter(&module, |emitter| {
            let plain = emitter.attribute_placeholder_row(false, false).unwrap();
            let multiple = emitter.attribute_placeholder_row(false, true).unwrap();
            assert_ne!(plain, multiple);
            assert_eq!(emitter.attribute_placeholder_row(false, true).unwrap(), multiple);
            assert_eq!(emitter.md.tables.type_ref.len(), 2);
        });
    }
}
