//! First pass over the module: hands out rows for every reference, in the order the
//! references are first met.
//!
//! Population calls the same get-or-create functions again and finds the rows made here,
//! so the visitor only decides the order reference rows are numbered in.

use crate::attribute::CustomAttribute;
use crate::body::BodyTokens as _;
use crate::error::Result;
use crate::model::{
    ExceptionRegionKind, ExportedTypeImplementation, ImportScopeId, ImportTarget, MethodBody,
    MethodDefId, ResourceLocation, TypeDefId,
};

use super::MetadataEmitter;

impl MetadataEmitter<'_> {
    pub(super) fn visit_module(&mut self) -> Result<()> {
        let module = self.module;
        let index = self.index;

        for (id, _) in module.assembly_refs() {
            self.assembly_ref_row(id)?;
        }

        self.visit_attributes(&module.attributes)?;
        if let Some(assembly) = &module.assembly {
            self.visit_attributes(&assembly.attributes)?;
            for set in &assembly.security {
                self.visit_attributes(&set.attributes)?;
            }
        } else {
            for attribute in &module.netmodule_attributes {
                self.attribute_placeholder_row(false, attribute.allow_multiple)?;
                self.member_handle(attribute.constructor)?;
            }
            for set in &module.netmodule_security {
                for attribute in &set.attributes {
                    self.attribute_placeholder_row(true, attribute.allow_multiple)?;
                    self.member_handle(attribute.constructor)?;
                }
            }
        }

        for &ty in index.types() {
            if module.type_def(ty).enclosing_type.is_none() {
                self.options.cancellation.check()?;
            }
            self.visit_type(ty)?;
        }

        for exported in &module.exported_types {
            if let ExportedTypeImplementation::Assembly(assembly) = exported.implementation {
                self.assembly_ref_row(assembly)?;
            }
        }
        for resource in &module.resources {
            if let ResourceLocation::Assembly(assembly) = resource.location {
                self.assembly_ref_row(assembly)?;
            }
        }
        Ok(())
    }

    fn visit_attributes(&mut self, attributes: &[CustomAttribute]) -> Result<()> {
        for attribute in attributes {
            self.member_handle(attribute.constructor)?;
        }
        Ok(())
    }

    fn visit_type(&mut self, id: TypeDefId) -> Result<()> {
        let module = self.module;
        let def = module.type_def(id);

        self.visit_attributes(&def.attributes)?;
        for set in &def.security {
            self.visit_attributes(&set.attributes)?;
        }
        if let Some(base) = def.base_type {
            self.type_handle(base)?;
        }
        for &interface in &def.interfaces {
            self.type_handle(interface)?;
        }
        for param in &def.generic_parameters {
            for &constraint in &param.constraints {
                self.type_handle(constraint)?;
            }
            self.visit_attributes(&param.attributes)?;
        }
        for implementation in &def.method_implementations {
            self.member_handle(implementation.body)?;
            self.member_handle(implementation.declaration)?;
        }

        for &event in &def.events {
            let event = module.event(event);
            self.type_handle(event.event_type)?;
            self.visit_attributes(&event.attributes)?;
        }
        for &field in &def.fields {
            let field = module.field(field);
            self.field_signature_blob(&field.field_type)?;
            self.visit_attributes(&field.attributes)?;
        }
        for &method in &def.methods {
            self.visit_method(method)?;
        }
        for &property in &def.properties {
            let property = module.property(property);
            self.property_signature_blob(
                property.has_this,
                &property.property_type,
                &property.parameters,
            )?;
            self.visit_attributes(&property.attributes)?;
        }
        Ok(())
    }

    fn visit_method(&mut self, id: MethodDefId) -> Result<()> {
        let module = self.module;
        let def = module.method(id);

        self.method_signature_blob(&def.signature)?;
        self.visit_attributes(&def.attributes)?;
        for set in &def.security {
            self.visit_attributes(&set.attributes)?;
        }
        for param in &def.params {
            self.visit_attributes(&param.attributes)?;
        }
        for param in &def.generic_parameters {
            for &constraint in &param.constraints {
                self.type_handle(constraint)?;
            }
            self.visit_attributes(&param.attributes)?;
        }
        if let Some(pinvoke) = &def.pinvoke {
            self.module_ref_row(&pinvoke.module);
        }

        match &def.body {
            Some(body) if self.emits_bodies() => self.visit_body(body),
            _ => Ok(()),
        }
    }

    fn visit_body(&mut self, body: &MethodBody) -> Result<()> {
        self.local_signature_row(&body.locals)?;
        for fixup in &body.fixups {
            self.operand_token(&fixup.operand)?;
        }
        for region in &body.exception_regions {
            if let ExceptionRegionKind::Catch(ty) = region.kind {
                self.type_handle(ty)?;
            }
        }

        if self.pdb.is_some() {
            if let Some(scope) = body.import_scope {
                self.visit_import_scopes(scope)?;
            }
            for scope in &body.scopes {
                for constant in &scope.constants {
                    if let Some(ty) = constant.constant_type {
                        self.type_handle(ty)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Walk an import scope chain up to the first scope already visited.
    fn visit_import_scopes(&mut self, scope: ImportScopeId) -> Result<()> {
        let module = self.module;
        let mut current = Some(scope);
        while let Some(id) = current {
            if !self.visited_import_scopes.insert(id) {
                break;
            }
            let scope = module.import_scope(id);
            for import in &scope.imports {
                match &import.target {
                    ImportTarget::Namespace {
                        assembly: Some(assembly),
                        ..
                    }
                    | ImportTarget::AssemblyAlias(Some(assembly)) => {
                        self.assembly_ref_row(*assembly)?;
                    }
                    ImportTarget::Type(ty) => {
                        self.type_handle(*ty)?;
                    }
                    ImportTarget::Namespace { assembly: None, .. }
                    | ImportTarget::XmlNamespace(_)
                    | ImportTarget::AssemblyAlias(None) => {}
                }
            }
            current = scope.parent;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::{DefinitionIndex, MetadataEmitter};
    use crate::model::{
        AssemblyReference, Import, ImportScope, ImportTarget, MemberReference, MethodBody,
        MethodDef, MethodSignature, Module, PrimitiveType, ResolutionScope, TypeDef,
        TypeReference,
    };
    use crate::options::WriterOptions;
    use crate::tables::{CodedIndex, TableId};

    #[test]
    fn test_assembly_refs_come_first_in_module_order() {
        let mut module = Module::new("m.dll");
        let core = module.add_assembly_ref(AssemblyReference::new("mscorlib", (4, 0, 0, 0)));
        let other = module.add_assembly_ref(AssemblyReference::new("other", (1, 0, 0, 0)));
        module.core_library = Some(core);
        let base = module.add_type_ref(TypeReference::Namespace {
            scope: ResolutionScope::AssemblyRef(other),
            namespace: "N".to_string(),
            name: "Base".to_string(),
            is_value_type: false,
        });
        let mut def = TypeDef::new("", "T");
        def.base_type = Some(base);
        module.add_type(def);

        let options = WriterOptions::new();
        let index = DefinitionIndex::build(&module, &options).unwrap();
        let mut emitter = MetadataEmitter::new(&module, &options, &index);
        emitter.visit_module().unwrap();
        assert_eq!(emitter.assembly_ref_row(core).unwrap(), 1);
        assert_eq!(emitter.assembly_ref_row(other).unwrap(), 2);
        let row = emitter.md.tables.type_ref.get(1).unwrap();
        assert_eq!(row.resolution_scope, CodedIndex::new(TableId::AssemblyRef, 2));
    }

    #[test]
    fn test_metadata_only_skips_body_references() {
        let mut module = Module::new("m.dll");
        let core = module.add_assembly_ref(AssemblyReference::new("mscorlib", (4, 0, 0, 0)));
        module.core_library = Some(core);
        let ty = module.add_type(TypeDef::new("", "T"));
        let void = module.primitive(PrimitiveType::Void);
        let console = module.add_type_ref(TypeReference::Namespace {
            scope: ResolutionScope::AssemblyRef(core),
            namespace: "System".to_string(),
            name: "Console".to_string(),
            is_value_type: false,
        });
        let write = module.add_member_ref(MemberReference::MethodRef {
            parent: console,
            name: "WriteLine".to_string(),
            signature: MethodSignature::new_static(void, vec![]),
        });
        let mut body = MethodBody::new(vec![0x28, 0, 0, 0, 0, 0x2A], 0);
        body.fixups.push(crate::model::TokenFixup {
            offset: 1,
            operand: crate::model::IlOperand::Member(write),
        });
        let mut method = MethodDef::new("M", 0x16, MethodSignature::new_static(void, vec![]));
        method.body = Some(body);
        module.add_method(ty, method);

        for (metadata_only, member_refs) in [(false, 1), (true, 0)] {
            let options = WriterOptions::new().with_metadata_only(metadata_only);
            let index = DefinitionIndex::build(&module, &options).unwrap();
            let mut emitter = MetadataEmitter::new(&module, &options, &index);
            emitter.visit_module().unwrap();
            assert_eq!(emitter.md.tables.member_ref.len(), member_refs);
        }
    }

    #[test]
    fn test_import_scope_walk_stops_at_visited_ancestor() {
        let mut module = Module::new("m.dll");
        let root = module.add_import_scope(ImportScope {
            parent: None,
            imports: vec![Import {
                alias: None,
                target: ImportTarget::Namespace {
                    assembly: None,
                    namespace: "System".to_string(),
                },
            }],
        });
        let a = module.add_import_scope(ImportScope {
            parent: Some(root),
            imports: Vec::new(),
        });
        let b = module.add_import_scope(ImportScope {
            parent: Some(root),
            imports: Vec::new(),
        });

        let options = WriterOptions::new().with_debug_metadata(true);
        let index = DefinitionIndex::build(&module, &options).unwrap();
        let mut emitter = MetadataEmitter::new(&module, &options, &index);
        emitter.visit_import_scopes(a).unwrap();
        assert_eq!(emitter.visited_import_scopes.len(), 2);
        emitter.visit_import_scopes(b).unwrap();
        assert_eq!(emitter.visited_import_scopes.len(), 3);
        assert!(emitter.visited_import_scopes.contains(&root));
    }
}
