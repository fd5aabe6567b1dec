//! Table context for calculating index sizes.
//!
//! The width of every heap index, table index and coded index column is decided once
//! from the final heap sizes and row counts. [`TableContext`] records that decision;
//! [`RowWriter`] applies it while rows are serialized.

use crate::error::{Error, Result};
use crate::heaps::{FrozenStringHeap, StringIdx};
use crate::tables::{CodedIndex, CodedIndexKind, Column, MAX_TABLES, TableId};
use crate::writer::{Writer, align_up};

/// #Strings uses 4-byte indices.
pub const HEAP_STRINGS_WIDE: u8 = 0x01;
/// #GUID uses 4-byte indices.
pub const HEAP_GUID_WIDE: u8 = 0x02;
/// #Blob uses 4-byte indices.
pub const HEAP_BLOB_WIDE: u8 = 0x04;
/// The stream is an edit-and-continue delta.
pub const HEAP_ENC_DELTAS: u8 = 0x20;
/// The stream may contain deleted-row markers.
pub const HEAP_DELETED_MARKS: u8 = 0x80;

/// Largest row id a metadata token can carry.
pub const MAX_ROW_ID: usize = 0x00FF_FFFF;

/// Final heap sizes that drive the heap index widths.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapSizes {
    /// Size of #Strings including earlier generations.
    pub strings: usize,
    /// Size of #GUID including earlier generations.
    pub guid: usize,
    /// Size of #Blob including earlier generations.
    pub blob: usize,
}

/// Context for reading/writing metadata tables.
/// Tracks heap sizes and row counts to determine index widths.
#[derive(Debug, Clone)]
pub struct TableContext {
    /// HeapSizes byte from tables header.
    pub heap_sizes: u8,
    /// Row counts for each table present in this stream (indexed by TableId).
    pub row_counts: [u32; MAX_TABLES],
    /// Row counts of tables that live elsewhere but are referenced from this stream.
    pub external_row_counts: [u32; MAX_TABLES],
    /// Force 4-byte indices everywhere.
    pub all_wide: bool,
}

impl TableContext {
    /// Create a table context from a parsed tables header.
    #[must_use]
    pub fn new(heap_sizes: u8, row_counts: [u32; MAX_TABLES]) -> Self {
        Self {
            heap_sizes,
            row_counts,
            external_row_counts: [0; MAX_TABLES],
            all_wide: false,
        }
    }

    /// Decide every index width for a stream about to be written.
    ///
    /// `delta` is `None` for a full image and `Some(minimal)` for an edit-and-continue delta.
    pub fn for_writing(
        row_counts: [u32; MAX_TABLES],
        external_row_counts: [u32; MAX_TABLES],
        heaps: HeapSizes,
        delta: Option<bool>,
    ) -> Result<Self> {
        for (id, &rows) in row_counts.iter().enumerate() {
            if rows as usize > MAX_ROW_ID {
                return Err(Error::TooManyRows {
                    table: TableId::from_u8(id as u8)?,
                    rows: rows as usize,
                });
            }
        }

        let all_wide = delta == Some(true);
        let mut heap_sizes = 0;
        if all_wide || heaps.strings > 0xFFFF {
            heap_sizes |= HEAP_STRINGS_WIDE;
        }
        if all_wide || heaps.guid > 0xFFFF {
            heap_sizes |= HEAP_GUID_WIDE;
        }
        if all_wide || heaps.blob > 0xFFFF {
            heap_sizes |= HEAP_BLOB_WIDE;
        }
        if delta.is_some() {
            heap_sizes |= HEAP_ENC_DELTAS | HEAP_DELETED_MARKS;
        }

        let ctx = Self {
            heap_sizes,
            row_counts,
            external_row_counts,
            all_wide,
        };
        log::debug!(
            "index widths: heaps {:#04x}, {} present tables",
            ctx.heap_sizes,
            ctx.present_tables().count_ones()
        );
        Ok(ctx)
    }

    /// Check if #Strings heap uses 4-byte indices.
    #[must_use]
    pub fn wide_string_indices(&self) -> bool {
        self.heap_sizes & HEAP_STRINGS_WIDE != 0
    }

    /// Check if #GUID heap uses 4-byte indices.
    #[must_use]
    pub fn wide_guid_indices(&self) -> bool {
        self.heap_sizes & HEAP_GUID_WIDE != 0
    }

    /// Check if #Blob heap uses 4-byte indices.
    #[must_use]
    pub fn wide_blob_indices(&self) -> bool {
        self.heap_sizes & HEAP_BLOB_WIDE != 0
    }

    /// Get the row count for a table.
    #[must_use]
    pub fn row_count(&self, table: TableId) -> u32 {
        self.row_counts[table as usize]
    }

    /// Bit vector of tables with at least one row.
    #[must_use]
    pub fn present_tables(&self) -> u64 {
        self.row_counts
            .iter()
            .enumerate()
            .filter(|(_, rows)| **rows > 0)
            .fold(0, |mask, (i, _)| mask | (1u64 << i))
    }

    fn combined_rows(&self, table: TableId) -> u32 {
        self.row_counts[table as usize] + self.external_row_counts[table as usize]
    }

    /// Check if a table index uses 4 bytes (row count > 65535).
    #[must_use]
    pub fn wide_table_index(&self, table: TableId) -> bool {
        self.all_wide || self.combined_rows(table) > 0xFFFF
    }

    /// Check if a coded index uses 4 bytes.
    #[must_use]
    pub fn wide_coded_index(&self, kind: CodedIndexKind) -> bool {
        let max_rows = kind.max_small_rows();
        self.all_wide
            || kind
                .tables()
                .iter()
                .filter_map(|&t| t)
                .any(|t| self.combined_rows(t) >= max_rows)
    }

    /// Check if a column is stored in 4 bytes.
    #[must_use]
    pub fn is_wide(&self, column: Column) -> bool {
        match column {
            Column::U16 => false,
            Column::U32 => true,
            Column::String => self.wide_string_indices(),
            Column::Guid => self.wide_guid_indices(),
            Column::Blob => self.wide_blob_indices(),
            Column::Table(table) => self.wide_table_index(table),
            Column::Coded(kind) => self.wide_coded_index(kind),
        }
    }

    /// Calculate the row size for a given table.
    #[must_use]
    pub fn row_size(&self, table: TableId) -> usize {
        table
            .columns()
            .iter()
            .map(|&c| if self.is_wide(c) { 4 } else { 2 })
            .sum()
    }

    /// Size of the tables stream header including the row counts.
    #[must_use]
    pub fn header_size(&self) -> usize {
        24 + self.present_tables().count_ones() as usize * 4
    }

    /// Size of the tables stream: header, rows and a terminating zero, padded to 4 bytes.
    #[must_use]
    pub fn tables_stream_size(&self) -> usize {
        let rows: usize = self
            .row_counts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .filter_map(|(id, count)| {
                TableId::from_u8(id as u8)
                    .ok()
                    .map(|t| *count as usize * self.row_size(t))
            })
            .sum();
        align_up(self.header_size() + rows + 1, 4)
    }
}

/// Writes row columns at the widths decided by a [`TableContext`].
pub struct RowWriter<'a> {
    writer: &'a mut Writer,
    ctx: &'a TableContext,
    strings: &'a FrozenStringHeap,
}

impl<'a> RowWriter<'a> {
    /// Wrap `writer`; string columns resolve through `strings`.
    pub fn new(writer: &'a mut Writer, ctx: &'a TableContext, strings: &'a FrozenStringHeap) -> Self {
        Self {
            writer,
            ctx,
            strings,
        }
    }

    /// Write a 2-byte constant column.
    pub fn u16(&mut self, value: u16) {
        self.writer.write_u16(value);
    }

    /// Write a 4-byte constant column.
    pub fn u32(&mut self, value: u32) {
        self.writer.write_u32(value);
    }

    /// Write a #Strings column.
    pub fn string(&mut self, idx: StringIdx) {
        let offset = self.strings.resolve(idx);
        self.writer
            .write_index(offset, self.ctx.wide_string_indices());
    }

    /// Write a #GUID column.
    pub fn guid(&mut self, index: u32) {
        self.writer.write_index(index, self.ctx.wide_guid_indices());
    }

    /// Write a #Blob column.
    pub fn blob(&mut self, offset: u32) {
        self.writer.write_index(offset, self.ctx.wide_blob_indices());
    }

    /// Write a row id of `table`.
    pub fn table(&mut self, table: TableId, row: u32) {
        self.writer.write_index(row, self.ctx.wide_table_index(table));
    }

    /// Write a coded index column.
    pub fn coded(&mut self, kind: CodedIndexKind, index: CodedIndex) -> Result<()> {
        let value = index.encode(kind)?;
        self.writer.write_index(value, self.ctx.wide_coded_index(kind));
        Ok(())
    }
}
