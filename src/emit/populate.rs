//! Second pass: definition rows and the tables hanging off them.

use crate::attribute::{CustomAttribute, permission_set_blob};
use crate::constant::ConstantValue;
use crate::error::{Error, Result};
use crate::model::{
    ExportedTypeImplementation, MethodDefId, ResourceLocation, SecurityAttribute,
};
use crate::tables::{
    AssemblyRow, ClassLayoutRow, CodedIndex, ConstantRow, CustomAttributeRow, DeclSecurityRow,
    EventRow, ExportedTypeRow, FieldLayoutRow, FieldMarshalRow, FieldRow, FieldRvaRow, FileRow,
    GenericParamConstraintRow, GenericParamRow, ImplMapRow, InterfaceImplRow,
    ManifestResourceRow, MethodDefRow, MethodImplRow, MethodSemanticsRow, ModuleRow,
    NestedClassRow, ParamRow, PropertyRow, TableId, TypeDefRow, event_map, property_map,
};

use super::index::GenericOwner;
use super::{ASSEMBLY_FLAG_PUBLIC_KEY, MAPPED_FIELD_DATA_ALIGNMENT, MetadataEmitter};

/// `ContainsNoMetaData` flag of a File row.
const FILE_CONTAINS_NO_METADATA: u32 = 0x0001;

/// Visibility flags of a ManifestResource row.
const RESOURCE_PUBLIC: u32 = 0x0001;
const RESOURCE_PRIVATE: u32 = 0x0002;

/// MethodSemantics attributes.
mod semantics {
    pub const SETTER: u16 = 0x0001;
    pub const GETTER: u16 = 0x0002;
    pub const OTHER: u16 = 0x0004;
    pub const ADD_ON: u16 = 0x0008;
    pub const REMOVE_ON: u16 = 0x0010;
    pub const FIRE: u16 = 0x0020;
}

impl MetadataEmitter<'_> {
    pub(super) fn populate(&mut self) -> Result<()> {
        self.add_documents()?;
        self.populate_module()?;
        self.populate_types()?;
        self.populate_fields()?;
        self.populate_methods()?;
        self.populate_events()?;
        self.populate_properties()?;
        self.populate_generic_params()?;
        self.populate_manifest()?;
        self.add_module_debug_info()?;
        log::debug!(
            "rows populated: {} types, {} type refs, {} member refs, {} custom attributes",
            self.md.tables.type_def.len(),
            self.md.tables.type_ref.len(),
            self.md.tables.member_ref.len(),
            self.md.tables.custom_attribute.len()
        );
        Ok(())
    }

    fn populate_module(&mut self) -> Result<()> {
        let module = self.module;
        let mvid = match (&self.options.delta, module.mvid) {
            (Some(delta), mvid) => self.md.guids.add(delta.mvid(mvid)?),
            (None, Some(mvid)) => self.md.guids.add(mvid),
            (None, None) => self.md.guids.add_reserved(),
        };
        let (generation, enc_id, enc_base_id) = match &self.options.delta {
            Some(delta) => (
                delta.generation,
                self.md.guids.add(delta.enc_id),
                self.md.guids.add(delta.enc_base_id),
            ),
            None => (0, 0, 0),
        };
        self.md.tables.module.add(ModuleRow {
            generation,
            name: self.md.strings.add(&module.name),
            mvid,
            enc_id,
            enc_base_id,
        });
        let module_parent = CodedIndex::new(TableId::Module, 1);
        self.add_custom_attributes(module_parent, &module.attributes)?;

        match &module.assembly {
            Some(assembly) => {
                let mut flags = assembly.flags;
                if !assembly.public_key.is_empty() {
                    flags |= ASSEMBLY_FLAG_PUBLIC_KEY;
                }
                let (major_version, minor_version, build_number, revision_number) =
                    assembly.version;
                let row = AssemblyRow {
                    hash_alg_id: assembly.hash_algorithm,
                    major_version,
                    minor_version,
                    build_number,
                    revision_number,
                    flags,
                    public_key: self.md.blobs.add(&assembly.public_key)?,
                    name: self.md.strings.add(&assembly.name),
                    culture: self.md.strings.add(&assembly.culture),
                };
                let row = self.md.tables.assembly.add(row);
                let parent = CodedIndex::new(TableId::Assembly, row);
                self.add_custom_attributes(parent, &assembly.attributes)?;
                self.add_security(parent, &assembly.security)?;
            }
            None => {
                for attribute in &module.netmodule_attributes {
                    let row = self.attribute_placeholder_row(false, attribute.allow_multiple)?;
                    let parent = CodedIndex::new(TableId::TypeRef, row);
                    self.add_custom_attributes(parent, std::slice::from_ref(attribute))?;
                }
                for set in &module.netmodule_security {
                    for attribute in &set.attributes {
                        let row = self.attribute_placeholder_row(true, attribute.allow_multiple)?;
                        let parent = CodedIndex::new(TableId::TypeRef, row);
                        self.add_custom_attributes(parent, std::slice::from_ref(attribute))?;
                    }
                }
            }
        }
        Ok(())
    }

    fn populate_types(&mut self) -> Result<()> {
        let module = self.module;
        let index = self.index;
        for &id in index.types() {
            let def = module.type_def(id);
            let lists = index.member_lists(id)?;
            let extends = match def.base_type {
                Some(base) => self.type_handle(base)?,
                None => CodedIndex::null(),
            };
            let row = self.md.tables.type_def.add(TypeDefRow {
                flags: def.flags,
                type_name: self.md.strings.add(&def.name),
                type_namespace: self.md.strings.add(&def.namespace),
                extends,
                field_list: lists.field_list,
                method_list: lists.method_list,
            });
            debug_assert_eq!(index.type_row(id).ok(), Some(row));

            let parent = CodedIndex::new(TableId::TypeDef, row);
            self.add_custom_attributes(parent, &def.attributes)?;
            self.add_security(parent, &def.security)?;

            if let Some(enclosing) = def.enclosing_type {
                self.md.tables.nested_class.add(NestedClassRow {
                    nested_class: row,
                    enclosing_class: index.type_row(enclosing)?,
                });
            }
            for &interface in &def.interfaces {
                let interface = self.type_handle(interface)?;
                self.md.tables.interface_impl.add(InterfaceImplRow {
                    class: row,
                    interface,
                });
            }
            if let Some((packing_size, class_size)) = def.layout {
                self.md.tables.class_layout.add(ClassLayoutRow {
                    packing_size,
                    class_size,
                    parent: row,
                });
            }
            for implementation in &def.method_implementations {
                let method_body = self.member_handle(implementation.body)?;
                let method_declaration = self.member_handle(implementation.declaration)?;
                self.md.tables.method_impl.add(MethodImplRow {
                    class: row,
                    method_body,
                    method_declaration,
                });
            }
        }
        Ok(())
    }

    fn populate_fields(&mut self) -> Result<()> {
        let module = self.module;
        let index = self.index;
        for &id in index.fields() {
            let def = module.field(id);
            let signature = self.field_signature_blob(&def.field_type)?;
            let row = self.md.tables.field.add(FieldRow {
                flags: def.flags,
                name: self.md.strings.add(&def.name),
                signature,
            });
            debug_assert_eq!(index.field_row(id).ok(), Some(row));

            let parent = CodedIndex::new(TableId::Field, row);
            if let Some(value) = &def.constant {
                self.add_constant(parent, value)?;
            }
            if let Some(native_type) = &def.marshal {
                self.add_marshal(parent, native_type)?;
            }
            if let Some(offset) = def.offset {
                self.md.tables.field_layout.add(FieldLayoutRow { offset, field: row });
            }
            if let Some(data) = &def.mapped_data {
                let rva = self.mapped_data.len() as u32;
                self.mapped_data.write_bytes(data);
                self.mapped_data.align(MAPPED_FIELD_DATA_ALIGNMENT);
                self.md.tables.field_rva.add(FieldRvaRow { rva, field: row });
            }
            self.add_custom_attributes(parent, &def.attributes)?;
        }
        Ok(())
    }

    fn populate_methods(&mut self) -> Result<()> {
        let module = self.module;
        let index = self.index;
        for &id in index.methods() {
            self.options.cancellation.check()?;
            let def = module.method(id);
            let body = def.body.as_ref().filter(|_| self.emits_bodies());

            let (rva, local_signature) = match body {
                Some(body) => {
                    let local_signature = self.local_signature_row(&body.locals)?;
                    let token = match local_signature {
                        0 => 0,
                        row => TableId::StandAloneSig.token(row),
                    };
                    let mut bodies = std::mem::take(&mut self.bodies);
                    let rva = bodies.add(body, token, self);
                    self.bodies = bodies;
                    (rva?, local_signature)
                }
                None => (0, 0),
            };

            let signature = self.method_signature_blob(&def.signature)?;
            let param_list = index.param_list(id)?;
            let row = self.md.tables.method_def.add(MethodDefRow {
                rva,
                impl_flags: def.impl_flags,
                flags: def.flags,
                name: self.md.strings.add(&def.name),
                signature,
                param_list,
            });
            debug_assert_eq!(index.method_row(id).ok(), Some(row));

            let parent = CodedIndex::new(TableId::MethodDef, row);
            self.add_custom_attributes(parent, &def.attributes)?;
            self.add_security(parent, &def.security)?;
            self.populate_params(id)?;
            if let Some(pinvoke) = &def.pinvoke {
                let import_scope = self.module_ref_row(&pinvoke.module);
                self.md.tables.impl_map.add(ImplMapRow {
                    mapping_flags: pinvoke.flags,
                    member_forwarded: parent,
                    import_name: self.md.strings.add(&pinvoke.entry_point),
                    import_scope,
                });
            }
            self.add_method_debug_info(row, body, local_signature)?;
        }
        Ok(())
    }

    fn populate_params(&mut self, method: MethodDefId) -> Result<()> {
        let def = self.module.method(method);
        for param in &def.params {
            let row = self.md.tables.param.add(ParamRow {
                flags: param.flags,
                sequence: param.sequence,
                name: self.md.strings.add(&param.name),
            });
            let parent = CodedIndex::new(TableId::Param, row);
            if let Some(value) = &param.default_value {
                self.add_constant(parent, value)?;
            }
            if let Some(native_type) = &param.marshal {
                self.add_marshal(parent, native_type)?;
            }
            self.add_custom_attributes(parent, &param.attributes)?;
        }
        Ok(())
    }

    fn populate_events(&mut self) -> Result<()> {
        let module = self.module;
        let index = self.index;
        let first_row = self.md.tables.event.next_row_id();
        let mut parents = Vec::with_capacity(index.events().len());
        for &ty in index.types() {
            let type_row = index.type_row(ty)?;
            for &id in &module.type_def(ty).events {
                let def = module.event(id);
                let event_type = self.type_handle(def.event_type)?;
                let row = self.md.tables.event.add(EventRow {
                    flags: def.flags,
                    name: self.md.strings.add(&def.name),
                    event_type,
                });
                debug_assert_eq!(index.event_row(id).ok(), Some(row));
                parents.push(type_row);

                let association = CodedIndex::new(TableId::Event, row);
                self.add_semantics(association, semantics::ADD_ON, def.adder)?;
                self.add_semantics(association, semantics::REMOVE_ON, def.remover)?;
                self.add_semantics(association, semantics::FIRE, def.caller)?;
                for &other in &def.others {
                    self.add_semantics(association, semantics::OTHER, Some(other))?;
                }
                self.add_custom_attributes(association, &def.attributes)?;
            }
        }
        for row in event_map(&parents, first_row) {
            self.md.tables.event_map.add(row);
        }
        Ok(())
    }

    fn populate_properties(&mut self) -> Result<()> {
        let module = self.module;
        let index = self.index;
        let first_row = self.md.tables.property.next_row_id();
        let mut parents = Vec::with_capacity(index.properties().len());
        for &ty in index.types() {
            let type_row = index.type_row(ty)?;
            for &id in &module.type_def(ty).properties {
                let def = module.property(id);
                let signature = self.property_signature_blob(
                    def.has_this,
                    &def.property_type,
                    &def.parameters,
                )?;
                let row = self.md.tables.property.add(PropertyRow {
                    flags: def.flags,
                    name: self.md.strings.add(&def.name),
                    signature,
                });
                debug_assert_eq!(index.property_row(id).ok(), Some(row));
                parents.push(type_row);

                let association = CodedIndex::new(TableId::Property, row);
                self.add_semantics(association, semantics::GETTER, def.getter)?;
                self.add_semantics(association, semantics::SETTER, def.setter)?;
                for &other in &def.others {
                    self.add_semantics(association, semantics::OTHER, Some(other))?;
                }
                if let Some(value) = &def.default_value {
                    self.add_constant(association, value)?;
                }
                self.add_custom_attributes(association, &def.attributes)?;
            }
        }
        for row in property_map(&parents, first_row) {
            self.md.tables.property_map.add(row);
        }
        Ok(())
    }

    fn populate_generic_params(&mut self) -> Result<()> {
        let module = self.module;
        let index = self.index;
        for entry in index.generic_params() {
            let param = match entry.owner {
                GenericOwner::Type(ty) => &module.type_def(ty).generic_parameters,
                GenericOwner::Method(method) => &module.method(method).generic_parameters,
            }
            .get(usize::from(entry.number))
            .ok_or_else(|| {
                Error::Unresolved(format!(
                    "generic parameter {} of {:?}",
                    entry.number, entry.owner
                ))
            })?;

            let row = self.md.tables.generic_param.add(GenericParamRow {
                number: entry.number,
                flags: param.flags,
                owner: index.owner_index(entry.owner)?,
                name: self.md.strings.add(&param.name),
            });
            for &constraint in &param.constraints {
                let constraint = self.type_handle(constraint)?;
                self.md
                    .tables
                    .generic_param_constraint
                    .add(GenericParamConstraintRow { owner: row, constraint });
            }
            let parent = CodedIndex::new(TableId::GenericParam, row);
            self.add_custom_attributes(parent, &param.attributes)?;
        }
        Ok(())
    }

    /// File, ExportedType and ManifestResource rows.
    fn populate_manifest(&mut self) -> Result<()> {
        let module = self.module;
        for file in &module.files {
            let row = FileRow {
                flags: if file.has_metadata {
                    0
                } else {
                    FILE_CONTAINS_NO_METADATA
                },
                name: self.md.strings.add(&file.name),
                hash_value: self.md.blobs.add(&file.hash)?,
            };
            self.md.tables.file.add(row);
        }

        for exported in &module.exported_types {
            let implementation = match exported.implementation {
                ExportedTypeImplementation::Assembly(assembly) => {
                    CodedIndex::new(TableId::AssemblyRef, self.assembly_ref_row(assembly)?)
                }
                ExportedTypeImplementation::File(file) => {
                    CodedIndex::new(TableId::File, file as u32 + 1)
                }
                ExportedTypeImplementation::Enclosing(enclosing) => {
                    CodedIndex::new(TableId::ExportedType, enclosing as u32 + 1)
                }
            };
            let row = ExportedTypeRow {
                flags: exported.flags,
                type_def_id: 0,
                type_name: self.md.strings.add(&exported.name),
                type_namespace: self.md.strings.add(&exported.namespace),
                implementation,
            };
            self.md.tables.exported_type.add(row);
        }

        for resource in &module.resources {
            let (offset, implementation) = match &resource.location {
                ResourceLocation::Embedded(source) => (
                    self.resources.add(&resource.name, source.as_ref())?,
                    CodedIndex::null(),
                ),
                ResourceLocation::File(file) => {
                    (0, CodedIndex::new(TableId::File, *file as u32 + 1))
                }
                ResourceLocation::Assembly(assembly) => (
                    0,
                    CodedIndex::new(TableId::AssemblyRef, self.assembly_ref_row(*assembly)?),
                ),
            };
            let row = ManifestResourceRow {
                offset,
                flags: if resource.is_public {
                    RESOURCE_PUBLIC
                } else {
                    RESOURCE_PRIVATE
                },
                name: self.md.strings.add(&resource.name),
                implementation,
            };
            self.md.tables.manifest_resource.add(row);
        }
        Ok(())
    }

    fn add_custom_attributes(
        &mut self,
        parent: CodedIndex,
        attributes: &[CustomAttribute],
    ) -> Result<()> {
        for attribute in attributes {
            let constructor = self.member_handle(attribute.constructor)?;
            debug_assert!(
                matches!(constructor.table, Some(TableId::MethodDef | TableId::MemberRef)),
                "attribute constructor {constructor:?}"
            );
            let value = self.md.blobs.add(&attribute.to_blob()?)?;
            self.md.tables.custom_attribute.add(CustomAttributeRow {
                parent,
                constructor,
                value,
            });
        }
        Ok(())
    }

    fn add_security(&mut self, parent: CodedIndex, sets: &[SecurityAttribute]) -> Result<()> {
        for set in sets {
            let blob = permission_set_blob(self.module, &set.attributes)?;
            let permission_set = self.md.blobs.add(&blob)?;
            self.md.tables.decl_security.add(DeclSecurityRow {
                action: set.action,
                parent,
                permission_set,
            });
        }
        Ok(())
    }

    fn add_constant(&mut self, parent: CodedIndex, value: &ConstantValue) -> Result<()> {
        let constant_type = value.element_type()? as u8;
        let value = self.md.blobs.add(&value.to_blob()?)?;
        self.md.tables.constant.add(ConstantRow {
            constant_type,
            parent,
            value,
        });
        Ok(())
    }

    fn add_marshal(&mut self, parent: CodedIndex, native_type: &[u8]) -> Result<()> {
        let native_type = self.md.blobs.add(native_type)?;
        self.md
            .tables
            .field_marshal
            .add(FieldMarshalRow { parent, native_type });
        Ok(())
    }

    fn add_semantics(
        &mut self,
        association: CodedIndex,
        semantics: u16,
        method: Option<MethodDefId>,
    ) -> Result<()> {
        if let Some(method) = method {
            let method = self.index.method_row(method)?;
            self.md.tables.method_semantics.add(MethodSemanticsRow {
                semantics,
                method,
                association,
            });
        }
        Ok(())
    }
}
