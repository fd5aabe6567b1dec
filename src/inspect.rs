//! Read-only view over serialized metadata.
//!
//! [`MetadataView`] decodes the root, the stream directory, the tables header and the heaps
//! of a blob produced by [`crate::emit`], so output can be checked without a second parser.
//! Rows are decoded generically through [`TableId::columns`]: every column comes back as a
//! raw `u32` (heap offset, row id or coded index value).

use uguid::Guid;
use widestring::U16String;

use crate::error::{Error, Result};
use crate::reader::Reader;
use crate::root::MetadataRoot;
use crate::stream::StreamHeader;
use crate::tables::{CodedIndex, CodedIndexKind, MAX_TABLES, TableContext, TableId, TablesHeader};

/// Size of the PDB id at the start of the `#Pdb` stream.
const PDB_ID_SIZE: usize = 20;

/// Contents of a `#Pdb` stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdbStreamInfo {
    /// 16-byte GUID followed by the 4-byte stamp.
    pub id: [u8; PDB_ID_SIZE],
    /// MethodDef token of the entry point, or 0.
    pub entry_point: u32,
    /// Row counts of the type-system tables the debug tables refer to.
    pub type_system_row_counts: [u32; MAX_TABLES],
}

/// A parsed view of one metadata blob.
#[derive(Debug, Clone)]
pub struct MetadataView<'a> {
    data: &'a [u8],
    root: MetadataRoot,
    header: TablesHeader,
    ctx: TableContext,
    /// Offset of each table's first row, relative to the start of `data`.
    table_offsets: [usize; MAX_TABLES],
    pdb: Option<PdbStreamInfo>,
}

impl<'a> MetadataView<'a> {
    /// Parse a standalone metadata blob.
    ///
    /// Portable PDB metadata takes the row counts of referenced type-system tables from its
    /// own `#Pdb` stream.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        Self::parse_with_external(data, [0; MAX_TABLES])
    }

    /// Parse a blob whose indices also count rows stored elsewhere, such as the rows of
    /// earlier generations referenced by an edit-and-continue delta.
    pub fn parse_with_external(data: &'a [u8], external: [u32; MAX_TABLES]) -> Result<Self> {
        let root = MetadataRoot::parse(data)?;

        let pdb = match root.find_stream(StreamHeader::PDB) {
            Some(stream) => Some(parse_pdb_stream(stream_bytes(data, stream)?)?),
            None => None,
        };

        let tables = root
            .tables_stream()
            .ok_or_else(|| Error::StreamNotFound(StreamHeader::TABLES.to_string()))?;
        let tables_data = stream_bytes(data, tables)?;
        let mut reader = Reader::new(tables_data);
        let header = TablesHeader::parse(&mut reader)?;

        let mut ctx = header.context();
        ctx.external_row_counts = external;
        if let Some(pdb) = &pdb {
            for (count, &rows) in ctx.external_row_counts.iter_mut().zip(&pdb.type_system_row_counts) {
                *count += rows;
            }
        }
        // Minimal deltas widen every index; the flag cannot be read back from the header.
        ctx.all_wide = root.find_stream(StreamHeader::MINIMAL_DELTA).is_some();

        let mut table_offsets = [0; MAX_TABLES];
        let mut offset = tables.offset as usize + reader.position();
        for (table, rows) in header.tables() {
            table_offsets[table as usize] = offset;
            offset += rows as usize * ctx.row_size(table);
        }
        if offset > tables.offset as usize + tables_data.len() {
            return Err(Error::UnexpectedEof {
                offset,
                needed: 0,
            });
        }

        log::debug!(
            "parsed metadata view: version {}, {} streams, {} tables",
            root.version,
            root.streams.len(),
            header.valid.count_ones()
        );

        Ok(Self {
            data,
            root,
            header,
            ctx,
            table_offsets,
            pdb,
        })
    }

    /// The metadata root and stream directory.
    #[must_use]
    pub fn root(&self) -> &MetadataRoot {
        &self.root
    }

    /// The tables stream header.
    #[must_use]
    pub fn tables_header(&self) -> &TablesHeader {
        &self.header
    }

    /// The index widths the rows were read with.
    #[must_use]
    pub fn context(&self) -> &TableContext {
        &self.ctx
    }

    /// The `#Pdb` stream, for Portable PDB metadata.
    #[must_use]
    pub fn pdb(&self) -> Option<&PdbStreamInfo> {
        self.pdb.as_ref()
    }

    /// Names of the streams in directory order.
    pub fn stream_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.root.streams.iter().map(|s| s.name.as_str())
    }

    /// Raw bytes of a stream, padding included.
    pub fn stream(&self, name: &str) -> Result<&'a [u8]> {
        let stream = self
            .root
            .find_stream(name)
            .ok_or_else(|| Error::StreamNotFound(name.to_string()))?;
        stream_bytes(self.data, stream)
    }

    #[must_use]
    pub fn row_count(&self, table: TableId) -> u32 {
        self.header.row_count(table)
    }

    /// Column values of row `rid` (1-based) of `table`.
    pub fn row(&self, table: TableId, rid: u32) -> Result<Vec<u32>> {
        if rid == 0 || rid > self.row_count(table) {
            return Err(Error::Unresolved(format!("{table:?} row {rid}")));
        }
        let row_size = self.ctx.row_size(table);
        let start = self.table_offsets[table as usize] + (rid as usize - 1) * row_size;
        let mut reader = Reader::new(self.data);
        reader.seek(start)?;
        table
            .columns()
            .iter()
            .map(|&column| reader.read_index(self.ctx.is_wide(column)))
            .collect()
    }

    /// All rows of `table` in order.
    pub fn rows(&self, table: TableId) -> Result<Vec<Vec<u32>>> {
        (1..=self.row_count(table)).map(|rid| self.row(table, rid)).collect()
    }

    /// Decode a coded index column value.
    #[must_use]
    pub fn coded(&self, kind: CodedIndexKind, value: u32) -> CodedIndex {
        CodedIndex::decode(kind, value)
    }

    /// A string from `#Strings`.
    pub fn string(&self, offset: u32) -> Result<&'a str> {
        let heap = self.stream(StreamHeader::STRINGS)?;
        let mut reader = Reader::new(heap);
        reader.seek(offset as usize)?;
        reader.read_null_str()
    }

    /// A blob from `#Blob`, without its length prefix.
    pub fn blob(&self, offset: u32) -> Result<&'a [u8]> {
        let heap = self.stream(StreamHeader::BLOB)?;
        let mut reader = Reader::new(heap);
        reader.seek(offset as usize)?;
        reader.read_blob()
    }

    /// A GUID from `#GUID` by 1-based index. Index 0 reads as nil.
    pub fn guid(&self, index: u32) -> Result<Guid> {
        if index == 0 {
            return Ok(Guid::ZERO);
        }
        let heap = self.stream(StreamHeader::GUID)?;
        let mut reader = Reader::new(heap);
        reader.seek((index as usize - 1) * 16)?;
        let bytes = reader.read_bytes(16)?;
        let mut guid = [0; 16];
        guid.copy_from_slice(bytes);
        Ok(Guid::from_bytes(guid))
    }

    /// A string from `#US`, without its trailing flag byte.
    pub fn user_string(&self, offset: u32) -> Result<U16String> {
        let heap = self.stream(StreamHeader::USER_STRINGS)?;
        let mut reader = Reader::new(heap);
        reader.seek(offset as usize)?;
        let bytes = reader.read_blob()?;
        let units = bytes
            .get(..bytes.len().saturating_sub(1))
            .unwrap_or_default()
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect::<Vec<_>>();
        Ok(U16String::from_vec(units))
    }
}

fn stream_bytes<'a>(data: &'a [u8], stream: &StreamHeader) -> Result<&'a [u8]> {
    let start = stream.offset as usize;
    let end = start + stream.size as usize;
    data.get(start..end).ok_or(Error::UnexpectedEof {
        offset: start,
        needed: stream.size as usize,
    })
}

fn parse_pdb_stream(bytes: &[u8]) -> Result<PdbStreamInfo> {
    let mut reader = Reader::new(bytes);
    let mut id = [0; PDB_ID_SIZE];
    id.copy_from_slice(reader.read_bytes(PDB_ID_SIZE)?);
    let entry_point = reader.read_u32()?;
    let referenced = reader.read_u64()?;
    let mut type_system_row_counts = [0; MAX_TABLES];
    for (i, count) in type_system_row_counts.iter_mut().enumerate() {
        if referenced & (1u64 << i) != 0 {
            *count = reader.read_u32()?;
        }
    }
    Ok(PdbStreamInfo {
        id,
        entry_point,
        type_system_row_counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MetadataBuilder, StreamLayout};
    use crate::tables::{ModuleRow, TypeDefRow, TypeSystemTables};

    fn two_types() -> Vec<u8> {
        let mut builder = MetadataBuilder::<TypeSystemTables>::new();
        let name = builder.strings.add("m.dll");
        let mvid = builder.guids.add(Guid::from_bytes([3; 16]));
        builder.tables.module.add(ModuleRow {
            name,
            mvid,
            ..ModuleRow::default()
        });
        for type_name in ["A", "B"] {
            let type_name = builder.strings.add(type_name);
            builder.tables.type_def.add(TypeDefRow {
                type_name,
                field_list: 1,
                method_list: 1,
                ..TypeDefRow::default()
            });
        }
        builder.user_strings.add(widestring::u16str!("hi")).unwrap();
        builder
            .freeze()
            .compute_sizes(StreamLayout::new("v4.0.30319"))
            .unwrap()
            .serialize()
            .unwrap()
            .into_bytes()
    }

    #[test]
    fn test_rows_and_heaps() {
        let bytes = two_types();
        let view = MetadataView::parse(&bytes).unwrap();
        assert_eq!(view.root().version, "v4.0.30319");
        assert_eq!(view.row_count(TableId::TypeDef), 2);
        assert!(view.pdb().is_none());

        let module = view.row(TableId::Module, 1).unwrap();
        assert_eq!(view.string(module[1]).unwrap(), "m.dll");
        assert_eq!(view.guid(module[2]).unwrap(), Guid::from_bytes([3; 16]));

        let names: Vec<_> = view
            .rows(TableId::TypeDef)
            .unwrap()
            .iter()
            .map(|row| view.string(row[1]).unwrap())
            .collect();
        assert_eq!(names, ["A", "B"]);
        assert_eq!(view.user_string(1).unwrap().to_string_lossy(), "hi");
    }

    #[test]
    fn test_row_out_of_range() {
        let bytes = two_types();
        let view = MetadataView::parse(&bytes).unwrap();
        assert!(view.row(TableId::TypeDef, 0).is_err());
        assert!(view.row(TableId::TypeDef, 3).is_err());
        assert!(view.row(TableId::Field, 1).is_err());
    }

    #[test]
    fn test_bad_signature() {
        assert!(matches!(
            MetadataView::parse(&[0; 32]),
            Err(Error::InvalidSignature(0))
        ));
    }
}
