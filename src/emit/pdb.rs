//! Portable PDB debug tables.
//!
//! Debug metadata has its own heaps and tables but refers to type-system rows (MethodDef,
//! AssemblyRef, TypeRef ...) by the ids handed out for the module's metadata.

use std::collections::{HashMap, HashSet};

use crate::content_id::BlobContentId;
use crate::debug::{
    EncodedImport, document_name_blob, imports_blob, local_constant_blob, sequence_points_blob,
};
use crate::error::{Error, Result};
use crate::metadata::{MetadataBuilder, PdbStream, StreamLayout};
use crate::model::{
    CustomDebugInfo, DocumentId, ImportScopeId, ImportTarget, LocalScope, MethodBody, Module,
    SequencePoint,
};
use crate::options::WriterOptions;
use crate::root::PDB_VERSION;
use crate::tables::{
    CodedIndex, CodedIndexKind, CustomDebugInformationRow, DebugTables, DocumentRow,
    ImportScopeRow, LocalConstantRow, LocalScopeRow, LocalVariableRow, MAX_TABLES,
    MethodDebugInformationRow, StateMachineMethodRow, TableId,
};

use super::MetadataEmitter;

/// `DebuggerHidden` attribute of a local variable.
const LOCAL_VARIABLE_HIDDEN: u16 = 0x0001;

/// Debug metadata under construction.
#[derive(Debug)]
pub(super) struct PdbBuilder {
    md: MetadataBuilder<DebugTables>,
    import_scopes: HashMap<ImportScopeId, u32>,
    /// Documents already reported as having no checksum.
    unhashed: HashSet<DocumentId>,
}

impl PdbBuilder {
    pub(super) fn new() -> Self {
        Self {
            md: MetadataBuilder::new(),
            import_scopes: HashMap::new(),
            unhashed: HashSet::new(),
        }
    }

    fn add_custom_debug_info(&mut self, parent: CodedIndex, info: &CustomDebugInfo) -> Result<()> {
        let row = CustomDebugInformationRow {
            parent,
            kind: self.md.guids.add(info.kind),
            value: self.md.blobs.add(&info.value)?,
        };
        self.md.tables.custom_debug_information.add(row);
        Ok(())
    }

    fn warn_unhashed_documents(&mut self, module: &Module, points: &[SequencePoint]) {
        for point in points {
            if module.document(point.document).checksum.is_none()
                && self.unhashed.insert(point.document)
            {
                log::warn!(
                    "sequence point refers to document '{}' which has no checksum",
                    module.document(point.document).name
                );
            }
        }
    }

    /// Serialize the debug metadata and stamp it with an id derived from its bytes.
    pub(super) fn serialize(
        self,
        options: &WriterOptions,
        entry_point: u32,
        type_system_rows: [u32; MAX_TABLES],
    ) -> Result<(Vec<u8>, BlobContentId)> {
        let mut layout = StreamLayout::new(PDB_VERSION);
        layout.format_version = options.format_version;
        layout.external_row_counts = type_system_rows;
        layout.pdb = Some(PdbStream {
            entry_point,
            type_system_row_counts: type_system_rows,
        });

        let mut serialized = self.md.freeze().compute_sizes(layout)?.serialize()?;
        let bytes = serialized.to_vec();
        let id = BlobContentId::from_content([bytes.as_slice()]);
        serialized.fill_pdb_id(&id)?;
        log::debug!("PDB serialized: {} bytes", serialized.len());
        Ok((serialized.into_bytes(), id))
    }
}

/// Scopes in LocalScope order: by start offset, enclosing scopes first.
fn sorted_scopes(scopes: &[LocalScope]) -> Vec<&LocalScope> {
    let mut sorted: Vec<&LocalScope> = scopes.iter().collect();
    sorted.sort_by(|a, b| {
        a.start_offset
            .cmp(&b.start_offset)
            .then(b.length.cmp(&a.length))
    });
    sorted
}

impl MetadataEmitter<'_> {
    /// Document rows, one per document in module order.
    pub(super) fn add_documents(&mut self) -> Result<()> {
        let module = self.module;
        let Some(pdb) = self.pdb.as_mut() else {
            return Ok(());
        };
        for (_, document) in module.documents() {
            let name = document_name_blob(&document.name, &mut pdb.md.blobs)?;
            let (hash_algorithm, hash) = match &document.checksum {
                Some(checksum) => (
                    pdb.md.guids.add(checksum.algorithm().guid()),
                    pdb.md.blobs.add(checksum.hash()?)?,
                ),
                None => (0, 0),
            };
            let row = DocumentRow {
                name: pdb.md.blobs.add(&name)?,
                hash_algorithm,
                hash,
                language: pdb.md.guids.add(document.language),
            };
            pdb.md.tables.document.add(row);
        }
        log::debug!("documents: {}", pdb.md.tables.document.len());
        Ok(())
    }

    /// Debug rows of one method: MethodDebugInformation always, plus scopes, locals,
    /// constants, state machine and custom debug info when there is a body.
    ///
    /// `local_signature` is the StandAloneSig row of the body's locals, or 0.
    pub(super) fn add_method_debug_info(
        &mut self,
        method_row: u32,
        body: Option<&MethodBody>,
        local_signature: u32,
    ) -> Result<()> {
        if self.pdb.is_none() {
            return Ok(());
        }
        let Some(body) = body else {
            if let Some(pdb) = self.pdb.as_mut() {
                let row = MethodDebugInformationRow::default();
                pdb.md.tables.method_debug_information.add(row);
            }
            return Ok(());
        };

        let import_scope = match body.import_scope {
            Some(scope) => self.import_scope_row(scope)?,
            None => 0,
        };
        let scopes = sorted_scopes(&body.scopes);
        let mut constant_types = Vec::new();
        for scope in &scopes {
            for constant in &scope.constants {
                let handle = match constant.constant_type {
                    Some(ty) => Some(self.type_handle(ty)?.encode(CodedIndexKind::TypeDefOrRef)?),
                    None => None,
                };
                constant_types.push(handle);
            }
        }
        let kickoff = match body.state_machine_kickoff {
            Some(method) => Some(self.index.method_row(method)?),
            None => None,
        };

        let module = self.module;
        let Some(pdb) = self.pdb.as_mut() else {
            return Ok(());
        };

        let info = if body.sequence_points.is_empty() {
            MethodDebugInformationRow::default()
        } else {
            pdb.warn_unhashed_documents(module, &body.sequence_points);
            let encoded = sequence_points_blob(local_signature, &body.sequence_points, |doc| {
                Ok(doc.index() as u32 + 1)
            })?;
            MethodDebugInformationRow {
                document: encoded.single_document,
                sequence_points: pdb.md.blobs.add(&encoded.blob)?,
            }
        };
        pdb.md.tables.method_debug_information.add(info);

        let mut constant_types = constant_types.into_iter();
        for scope in scopes {
            let variable_list = pdb.md.tables.local_variable.next_row_id();
            let constant_list = pdb.md.tables.local_constant.next_row_id();
            for &slot in &scope.variables {
                let local = body
                    .locals
                    .get(slot)
                    .ok_or_else(|| Error::Unresolved(format!("local slot {slot}")))?;
                let Some(name) = &local.name else {
                    continue;
                };
                let row = LocalVariableRow {
                    attributes: if local.hidden { LOCAL_VARIABLE_HIDDEN } else { 0 },
                    index: slot as u16,
                    name: pdb.md.strings.add(name),
                };
                pdb.md.tables.local_variable.add(row);
            }
            for constant in &scope.constants {
                let type_handle = constant_types.next().flatten();
                let signature = local_constant_blob(&constant.value, type_handle)?;
                let row = LocalConstantRow {
                    name: pdb.md.strings.add(&constant.name),
                    signature: pdb.md.blobs.add(&signature)?,
                };
                pdb.md.tables.local_constant.add(row);
            }
            pdb.md.tables.local_scope.add(LocalScopeRow {
                method: method_row,
                import_scope,
                variable_list,
                constant_list,
                start_offset: scope.start_offset,
                length: scope.length,
            });
        }

        if let Some(kickoff_method) = kickoff {
            pdb.md.tables.state_machine_method.add(StateMachineMethodRow {
                move_next_method: method_row,
                kickoff_method,
            });
        }
        let parent = CodedIndex::new(TableId::MethodDef, method_row);
        for info in &body.custom_debug_info {
            pdb.add_custom_debug_info(parent, info)?;
        }
        Ok(())
    }

    /// Custom debug info attached to the module.
    pub(super) fn add_module_debug_info(&mut self) -> Result<()> {
        let module = self.module;
        let Some(pdb) = self.pdb.as_mut() else {
            return Ok(());
        };
        for info in &module.custom_debug_info {
            pdb.add_custom_debug_info(CodedIndex::new(TableId::Module, 1), info)?;
        }
        Ok(())
    }

    /// ImportScope row of `id`, adding rows for it and any ancestors that have none yet.
    fn import_scope_row(&mut self, id: ImportScopeId) -> Result<u32> {
        let module = self.module;
        let mut missing = Vec::new();
        let mut current = Some(id);
        while let Some(scope) = current {
            if self
                .pdb
                .as_ref()
                .is_some_and(|pdb| pdb.import_scopes.contains_key(&scope))
            {
                break;
            }
            missing.push(scope);
            current = module.import_scope(scope).parent;
        }

        for &scope_id in missing.iter().rev() {
            let scope = module.import_scope(scope_id);
            let mut imports = Vec::with_capacity(scope.imports.len());
            for import in &scope.imports {
                let alias = import.alias.as_deref();
                imports.push(match &import.target {
                    ImportTarget::Namespace {
                        assembly,
                        namespace,
                    } => EncodedImport::Namespace {
                        alias,
                        assembly: match assembly {
                            Some(assembly) => Some(self.assembly_ref_row(*assembly)?),
                            None => None,
                        },
                        namespace,
                    },
                    ImportTarget::Type(ty) => EncodedImport::Type {
                        alias,
                        target: self.type_handle(*ty)?,
                    },
                    ImportTarget::XmlNamespace(namespace) => EncodedImport::XmlNamespace {
                        prefix: alias.unwrap_or_default(),
                        namespace,
                    },
                    ImportTarget::AssemblyAlias(assembly) => EncodedImport::AssemblyAlias {
                        alias: alias.unwrap_or_default(),
                        assembly: match assembly {
                            Some(assembly) => Some(self.assembly_ref_row(*assembly)?),
                            None => None,
                        },
                    },
                });
            }

            let Some(pdb) = self.pdb.as_mut() else {
                return Ok(0);
            };
            let parent = match scope.parent {
                Some(parent) => pdb
                    .import_scopes
                    .get(&parent)
                    .copied()
                    .ok_or_else(|| Error::Unresolved(format!("{parent:?}")))?,
                None => 0,
            };
            let blob = imports_blob(&imports, &mut pdb.md.blobs)?;
            let row = pdb.md.tables.import_scope.add(ImportScopeRow {
                parent,
                imports: pdb.md.blobs.add(&blob)?,
            });
            pdb.import_scopes.insert(scope_id, row);
        }

        self.pdb
            .as_ref()
            .and_then(|pdb| pdb.import_scopes.get(&id).copied())
            .ok_or_else(|| Error::Unresolved(format!("{id:?}")))
    }
}
