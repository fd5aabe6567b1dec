//! Module emitter: turns a [`Module`] into metadata, IL, mapped field data, resources and,
//! optionally, Portable PDB debug metadata.
//!
//! An emit runs in three passes over the model:
//!
//! 1. [`DefinitionIndex::build`] numbers every definition, so any row can name any other
//!    before it is written.
//! 2. The visitor walks the module in declaration order and allocates rows for every
//!    reference (TypeRef, TypeSpec, MemberRef, MethodSpec, AssemblyRef, ModuleRef,
//!    StandAloneSig). Structurally equal references share one row.
//! 3. Population writes the definition rows and their satellite tables, then the whole
//!    builder goes through the serializer state machine.

mod index;
mod pdb;
mod populate;
mod references;
mod visitor;

use std::collections::HashSet;

use uguid::Guid;

use crate::body::MethodBodyStream;
use crate::content_id::BlobContentId;
use crate::error::Result;
use crate::metadata::{MetadataBuilder, StreamLayout};
use crate::model::{ImportScopeId, Module};
use crate::options::WriterOptions;
use crate::resources::ResourceWriter;
use crate::tables::{TableId, TableSet, TypeSystemTables};
use crate::writer::Writer;

pub use index::{DefinitionIndex, GenericOwner, GenericParamEntry, MemberLists};

use pdb::PdbBuilder;
use references::References;

/// `PublicKey` bit of assembly flags. Set on the Assembly row when a key is present,
/// cleared on AssemblyRef rows, which always store a token.
const ASSEMBLY_FLAG_PUBLIC_KEY: u32 = 0x0001;

/// Alignment of each entry of the mapped field data section.
const MAPPED_FIELD_DATA_ALIGNMENT: usize = 8;

/// Everything produced by one emit.
#[derive(Debug)]
pub struct EmitResult {
    /// The metadata blob (BSJB root and streams).
    pub metadata: Vec<u8>,
    /// The IL stream; method RVAs are offsets into it. Empty when metadata only.
    pub il: Vec<u8>,
    /// Initial values of fields with an RVA; FieldRVA rows hold offsets into it.
    pub mapped_field_data: Vec<u8>,
    /// Embedded managed resources; ManifestResource rows hold offsets into it.
    pub resources: Vec<u8>,
    /// Portable PDB metadata, when requested.
    pub pdb: Option<Vec<u8>>,
    /// Module version id, either supplied or derived from the output.
    pub mvid: Guid,
    /// Id written into the `#Pdb` stream.
    pub pdb_id: Option<BlobContentId>,
}

/// Emit `module` with `options`.
pub fn emit(module: &Module, options: &WriterOptions) -> Result<EmitResult> {
    let index = DefinitionIndex::build(module, options)?;
    let mut emitter = MetadataEmitter::new(module, options, &index);
    emitter.visit_module()?;
    emitter.populate()?;
    emitter.finish()
}

/// Working state of one emit.
pub(crate) struct MetadataEmitter<'a> {
    module: &'a Module,
    options: &'a WriterOptions,
    index: &'a DefinitionIndex,
    md: MetadataBuilder<TypeSystemTables>,
    refs: References,
    bodies: MethodBodyStream,
    mapped_data: Writer,
    resources: ResourceWriter,
    pdb: Option<PdbBuilder>,
    /// Import scopes already walked by the visitor.
    visited_import_scopes: HashSet<ImportScopeId>,
}

impl<'a> MetadataEmitter<'a> {
    fn new(module: &'a Module, options: &'a WriterOptions, index: &'a DefinitionIndex) -> Self {
        let md = match &options.delta {
            Some(delta) => MetadataBuilder::for_delta(delta),
            None => MetadataBuilder::new(),
        };
        Self {
            module,
            options,
            index,
            md,
            refs: References::default(),
            bodies: MethodBodyStream::new(),
            mapped_data: Writer::new(),
            resources: ResourceWriter::new(),
            pdb: options.emit_debug_metadata.then(PdbBuilder::new),
            visited_import_scopes: HashSet::new(),
        }
    }

    /// Check if method bodies are written.
    fn emits_bodies(&self) -> bool {
        !self.options.metadata_only
    }

    fn finish(self) -> Result<EmitResult> {
        let Self {
            module,
            options,
            index,
            mut md,
            bodies,
            mapped_data,
            resources,
            pdb,
            ..
        } = self;

        if options.delta.is_some() {
            md.tables.populate_enc_tables();
        }
        let frozen = md.freeze();
        let type_system_rows = frozen.tables().row_counts();

        let mut layout = StreamLayout::new(options.runtime_version.clone());
        layout.format_version = options.format_version;
        if let Some(delta) = &options.delta {
            layout.delta = Some(delta.minimal);
            layout.external_row_counts = delta.row_bases();
        }
        let mut metadata = frozen.compute_sizes(layout)?.serialize()?;

        let il = if options.metadata_only {
            Vec::new()
        } else {
            bodies.into_bytes()
        };
        let mapped_field_data = mapped_data.to_vec();
        let resources = resources.into_bytes();

        let mvid = match (&options.delta, module.mvid) {
            (Some(delta), mvid) => delta.mvid(mvid)?,
            (None, Some(mvid)) => mvid,
            (None, None) => {
                let bytes = metadata.to_vec();
                let id = BlobContentId::from_content([
                    bytes.as_slice(),
                    il.as_slice(),
                    mapped_field_data.as_slice(),
                    resources.as_slice(),
                ]);
                metadata.fill_mvid(id.guid)?;
                id.guid
            }
        };
        log::debug!(
            "metadata serialized: {} bytes, il {} bytes, mapped data {} bytes, resources {} bytes",
            metadata.len(),
            il.len(),
            mapped_field_data.len(),
            resources.len()
        );

        let (pdb, pdb_id) = match pdb {
            Some(pdb) => {
                let entry_point = match module.entry_point {
                    Some(method) => TableId::MethodDef.token(index.method_row(method)?),
                    None => 0,
                };
                let (bytes, id) = pdb.serialize(options, entry_point, type_system_rows)?;
                (Some(bytes), Some(id))
            }
            None => (None, None),
        };

        Ok(EmitResult {
            metadata: metadata.into_bytes(),
            il,
            mapped_field_data,
            resources,
            pdb,
            mvid,
            pdb_id,
        })
    }
}
