//! Metadata serializer.
//!
//! Serialization is a typestate pipeline: a [`MetadataBuilder`] collects heaps and rows,
//! [`MetadataBuilder::freeze`] sorts the tables and closes the #Strings heap,
//! [`FrozenMetadata::compute_sizes`] decides every index width and the stream layout, and
//! [`SizedMetadata::serialize`] writes the bytes. Each step consumes the previous state, so
//! nothing can be added once offsets are known.

use uguid::Guid;

use crate::buffer::Reservation;
use crate::content_id::BlobContentId;
use crate::error::Result;
use crate::heaps::{BlobHeap, FrozenStringHeap, GuidHeap, StringHeapBuilder, UserStringHeap};
use crate::options::DeltaOptions;
use crate::root::MetadataRoot;
use crate::stream::StreamHeader;
use crate::tables::{HeapSizes, MAX_TABLES, RowWriter, TableContext, TableSet, TablesHeader};
use crate::writer::Writer;

/// Content of the `#Pdb` stream, apart from the id that is backpatched.
#[derive(Debug, Clone)]
pub struct PdbStream {
    /// MethodDef token of the entry point, or 0.
    pub entry_point: u32,
    /// Row counts of the type-system tables the debug tables refer to.
    pub type_system_row_counts: [u32; MAX_TABLES],
}

impl PdbStream {
    fn referenced_tables(&self) -> u64 {
        self.type_system_row_counts
            .iter()
            .enumerate()
            .filter(|(_, rows)| **rows > 0)
            .fold(0, |mask, (i, _)| mask | (1u64 << i))
    }

    /// Size of the stream: id, entry point, table mask and one row count per table.
    #[must_use]
    pub fn size(&self) -> usize {
        BlobContentId::SIZE + 4 + 8 + self.referenced_tables().count_ones() as usize * 4
    }
}

/// How the streams of one metadata blob are laid out.
#[derive(Debug, Clone)]
pub struct StreamLayout {
    /// Version string of the metadata root.
    pub version: String,
    /// Major and minor version of the tables stream.
    pub format_version: (u8, u8),
    /// `None` for a full image, `Some(minimal)` for an edit-and-continue delta.
    pub delta: Option<bool>,
    /// Row counts of tables referenced from, but not stored in, this blob.
    pub external_row_counts: [u32; MAX_TABLES],
    /// Present for Portable PDB metadata.
    pub pdb: Option<PdbStream>,
}

impl StreamLayout {
    /// Layout of a full image with the given version string.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            format_version: (2, 0),
            delta: None,
            external_row_counts: [0; MAX_TABLES],
            pdb: None,
        }
    }

    fn tables_stream_name(&self) -> &'static str {
        if self.delta.is_some() {
            StreamHeader::TABLES_UNCOMPRESSED
        } else {
            StreamHeader::TABLES
        }
    }
}

/// Heap sizes of earlier generations.
#[derive(Debug, Clone, Copy, Default)]
struct HeapStarts {
    strings: usize,
    guid: usize,
    blob: usize,
}

/// Open state: rows and heap entries may be added.
#[derive(Debug, Default)]
pub struct MetadataBuilder<T: TableSet> {
    pub tables: T,
    pub strings: StringHeapBuilder,
    pub user_strings: UserStringHeap,
    pub guids: GuidHeap,
    pub blobs: BlobHeap,
    starts: HeapStarts,
}

impl<T: TableSet> MetadataBuilder<T> {
    /// Builder for a full image.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: T::default(),
            strings: StringHeapBuilder::new(),
            user_strings: UserStringHeap::new(),
            guids: GuidHeap::new(),
            blobs: BlobHeap::new(),
            starts: HeapStarts::default(),
        }
    }

    /// Builder for an edit-and-continue delta: heaps and row ids continue after the
    /// previous generation.
    #[must_use]
    pub fn for_delta(delta: &DeltaOptions) -> Self {
        let mut tables = T::default();
        tables.set_bases(&delta.row_bases());
        Self {
            tables,
            strings: StringHeapBuilder::with_start_offset(delta.string_heap_start),
            user_strings: UserStringHeap::with_start_offset(delta.user_string_heap_start),
            guids: GuidHeap::with_start_offset(delta.guid_heap_start),
            blobs: BlobHeap::with_start_offset(delta.blob_heap_start),
            starts: HeapStarts {
                strings: delta.string_heap_start as usize,
                guid: delta.guid_heap_start as usize,
                blob: delta.blob_heap_start as usize,
            },
        }
    }

    /// Sort the tables that must be sorted and close the #Strings heap.
    #[must_use]
    pub fn freeze(mut self) -> FrozenMetadata<T> {
        self.tables.sort(T::SORTED);
        let strings = self.strings.freeze();
        log::debug!(
            "heaps frozen: strings {} bytes, us {} bytes, guid {} bytes, blob {} bytes",
            strings.size(),
            self.user_strings.size(),
            self.guids.size(),
            self.blobs.size()
        );
        FrozenMetadata {
            tables: self.tables,
            strings,
            user_strings: self.user_strings,
            guids: self.guids,
            blobs: self.blobs,
            starts: self.starts,
        }
    }
}

/// Heaps closed; rows are final but index widths are not decided yet.
#[derive(Debug)]
pub struct FrozenMetadata<T: TableSet> {
    tables: T,
    strings: FrozenStringHeap,
    user_strings: UserStringHeap,
    guids: GuidHeap,
    blobs: BlobHeap,
    starts: HeapStarts,
}

impl<T: TableSet> FrozenMetadata<T> {
    #[must_use]
    pub fn tables(&self) -> &T {
        &self.tables
    }

    #[must_use]
    pub fn strings(&self) -> &FrozenStringHeap {
        &self.strings
    }

    /// Decide the index widths and the stream layout.
    pub fn compute_sizes(self, layout: StreamLayout) -> Result<SizedMetadata<T>> {
        let heaps = HeapSizes {
            strings: self.starts.strings + self.strings.size(),
            guid: self.starts.guid + self.guids.size(),
            blob: self.starts.blob + self.blobs.size(),
        };
        let ctx = TableContext::for_writing(
            self.tables.row_counts(),
            layout.external_row_counts,
            heaps,
            layout.delta,
        )?;

        let mut streams: Vec<(&str, usize)> = Vec::with_capacity(7);
        if let Some(pdb) = &layout.pdb {
            streams.push((StreamHeader::PDB, pdb.size()));
        }
        streams.push((layout.tables_stream_name(), ctx.tables_stream_size()));
        streams.push((StreamHeader::STRINGS, self.strings.aligned_size()));
        streams.push((StreamHeader::USER_STRINGS, self.user_strings.aligned_size()));
        streams.push((StreamHeader::GUID, self.guids.size()));
        streams.push((StreamHeader::BLOB, self.blobs.aligned_size()));
        if layout.delta == Some(true) {
            streams.push((StreamHeader::MINIMAL_DELTA, 0));
        }
        let root = MetadataRoot::layout(&layout.version, &streams);
        log::debug!(
            "metadata sizes computed: {} streams, {} bytes",
            root.streams.len(),
            root.total_size()
        );

        Ok(SizedMetadata {
            tables: self.tables,
            strings: self.strings,
            user_strings: self.user_strings,
            guids: self.guids,
            blobs: self.blobs,
            ctx,
            root,
            layout,
        })
    }
}

/// Every width and offset is known; ready to write.
#[derive(Debug)]
pub struct SizedMetadata<T: TableSet> {
    tables: T,
    strings: FrozenStringHeap,
    user_strings: UserStringHeap,
    guids: GuidHeap,
    blobs: BlobHeap,
    ctx: TableContext,
    root: MetadataRoot,
    layout: StreamLayout,
}

impl<T: TableSet> SizedMetadata<T> {
    #[must_use]
    pub fn context(&self) -> &TableContext {
        &self.ctx
    }

    #[must_use]
    pub fn root(&self) -> &MetadataRoot {
        &self.root
    }

    /// Write the root, the stream directory and every stream.
    pub fn serialize(self) -> Result<SerializedMetadata> {
        let mut w = Writer::new();
        self.root.write_to(&mut w);

        let pdb_id = match &self.layout.pdb {
            Some(pdb) => {
                let slot = w.reserve(BlobContentId::SIZE);
                w.write_u32(pdb.entry_point);
                let mask = pdb.referenced_tables();
                w.write_u64(mask);
                for (i, &rows) in pdb.type_system_row_counts.iter().enumerate() {
                    if mask & (1u64 << i) != 0 {
                        w.write_u32(rows);
                    }
                }
                Some(slot)
            }
            None => None,
        };

        let tables_start = w.len();
        TablesHeader::for_context(&self.ctx, self.layout.format_version, T::SORTED)
            .write_to(&mut w);
        {
            let mut rows = RowWriter::new(&mut w, &self.ctx, &self.strings);
            self.tables.write_rows(&mut rows)?;
        }
        w.write_u8(0);
        w.align(4);
        debug_assert_eq!(w.len() - tables_start, self.ctx.tables_stream_size());

        self.strings.write_to(&mut w);
        self.user_strings.write_to(&mut w);
        let mut reserved = self.guids.write_to(&mut w).into_iter();
        self.blobs.write_to(&mut w);
        debug_assert_eq!(w.len(), self.root.total_size());

        let mvid = reserved.next();
        debug_assert!(reserved.next().is_none(), "only the module version id is reserved");
        log::debug!("metadata serialized: {} bytes", w.len());

        Ok(SerializedMetadata {
            writer: w,
            mvid,
            pdb_id,
            root: self.root,
        })
    }
}

/// Written metadata with its content-derived ids still open.
#[derive(Debug)]
pub struct SerializedMetadata {
    writer: Writer,
    mvid: Option<Reservation>,
    pdb_id: Option<Reservation>,
    root: MetadataRoot,
}

impl SerializedMetadata {
    #[must_use]
    pub fn root(&self) -> &MetadataRoot {
        &self.root
    }

    /// Check if the module version id still has to be filled.
    #[must_use]
    pub fn needs_mvid(&self) -> bool {
        self.mvid.is_some()
    }

    /// Check if the PDB id still has to be filled.
    #[must_use]
    pub fn needs_pdb_id(&self) -> bool {
        self.pdb_id.is_some()
    }

    /// Fill the reserved module version id slot. Does nothing if no slot was reserved.
    pub fn fill_mvid(&mut self, mvid: Guid) -> Result<()> {
        match self.mvid.take() {
            Some(slot) => self.writer.fill(slot, &mvid.to_bytes()),
            None => Ok(()),
        }
    }

    /// Fill the reserved PDB id slot. Does nothing if no slot was reserved.
    pub fn fill_pdb_id(&mut self, id: &BlobContentId) -> Result<()> {
        match self.pdb_id.take() {
            Some(slot) => self.writer.fill(slot, &id.to_bytes()),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.writer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writer.is_empty()
    }

    /// The bytes written so far; open slots read as zeros.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.writer.to_vec()
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use uguid::guid;

    use super::*;
    use crate::reader::Reader;
    use crate::root::PDB_VERSION;
    use crate::tables::{
        DebugTables, DocumentRow, ModuleRow, TableId, TypeDefRow, TypeSystemTables,
    };

    fn one_type() -> MetadataBuilder<TypeSystemTables> {
        let mut builder = MetadataBuilder::<TypeSystemTables>::new();
        let name = builder.strings.add("m.dll");
        let mvid = builder.guids.add_reserved();
        builder.tables.module.add(ModuleRow {
            name,
            mvid,
            ..ModuleRow::default()
        });
        let type_name = builder.strings.add("T");
        builder.tables.type_def.add(TypeDefRow {
            type_name,
            field_list: 1,
            method_list: 1,
            ..TypeDefRow::default()
        });
        builder
    }

    #[test]
    fn test_full_image_streams() {
        let sized = one_type()
            .freeze()
            .compute_sizes(StreamLayout::new("v4.0.30319"))
            .unwrap();
        let mut serialized = sized.serialize().unwrap();
        assert!(serialized.needs_mvid());
        let names: Vec<_> = serialized.root().streams.iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, ["#~", "#Strings", "#US", "#GUID", "#Blob"]);

        let mvid = guid!("01234567-89ab-cdef-0123-456789abcdef");
        serialized.fill_mvid(mvid).unwrap();
        assert!(!serialized.needs_mvid());
        let bytes = serialized.into_bytes();

        let root = MetadataRoot::parse(&bytes).unwrap();
        assert_eq!(root.total_size(), bytes.len());
        let guid_stream = root.find_stream("#GUID").unwrap();
        let start = guid_stream.offset as usize;
        assert_eq!(&bytes[start..start + 16], &mvid.to_bytes());

        let tables = root.tables_stream().unwrap();
        let mut reader = Reader::new(&bytes[tables.offset as usize..]);
        let header = TablesHeader::parse(&mut reader).unwrap();
        assert_eq!(header.row_count(TableId::TypeDef), 1);
        assert_eq!(header.sorted, TypeSystemTables::SORTED);
    }

    #[test]
    fn test_minimal_delta_streams() {
        let delta = DeltaOptions {
            minimal: true,
            ..DeltaOptions::default()
        };
        let mut builder = MetadataBuilder::<TypeSystemTables>::for_delta(&delta);
        builder.tables.module.add(ModuleRow::default());
        let layout = StreamLayout {
            delta: Some(true),
            ..StreamLayout::new("v4.0.30319")
        };
        let serialized = builder.freeze().compute_sizes(layout).unwrap().serialize().unwrap();
        let names: Vec<_> = serialized.root().streams.iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, ["#-", "#Strings", "#US", "#GUID", "#Blob", "#JTD"]);
        assert!(!serialized.needs_mvid());
    }

    #[test]
    fn test_pdb_stream() {
        let mut builder = MetadataBuilder::<DebugTables>::new();
        builder.tables.document.add(DocumentRow::default());
        let mut counts = [0; MAX_TABLES];
        counts[TableId::TypeDef as usize] = 2;
        counts[TableId::MethodDef as usize] = 3;
        let layout = StreamLayout {
            external_row_counts: counts,
            pdb: Some(PdbStream {
                entry_point: 0x0600_0001,
                type_system_row_counts: counts,
            }),
            ..StreamLayout::new(PDB_VERSION)
        };
        let mut serialized = builder.freeze().compute_sizes(layout).unwrap().serialize().unwrap();
        assert!(serialized.needs_pdb_id());
        let id = BlobContentId::from_content([b"pdb".as_slice()]);
        serialized.fill_pdb_id(&id).unwrap();
        let bytes = serialized.into_bytes();

        let root = MetadataRoot::parse(&bytes).unwrap();
        let pdb = root.find_stream("#Pdb").unwrap();
        assert_eq!(root.streams[0].name, "#Pdb");
        assert_eq!(pdb.size, 20 + 4 + 8 + 8);
        let start = pdb.offset as usize;
        assert_eq!(&bytes[start..start + 20], &id.to_bytes());
        assert_eq!(&bytes[start + 20..start + 24], &[1, 0, 0, 6]);
        let mask = u64::from_le_bytes(bytes[start + 24..start + 32].try_into().unwrap());
        assert_eq!(mask, TableId::TypeDef.mask() | TableId::MethodDef.mask());
        assert_eq!(&bytes[start + 32..start + 40], &[2, 0, 0, 0, 3, 0, 0, 0]);
    }
}
