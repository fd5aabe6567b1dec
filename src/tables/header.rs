//! Tables stream (#~ and #-) header parsing and writing.

use crate::error::Result;
use crate::reader::Reader;
use crate::tables::{MAX_TABLES, TableContext, TableId};
use crate::writer::Writer;

/// The tables stream (#~) header.
#[derive(Debug, Clone)]
pub struct TablesHeader {
    /// Reserved (should be 0).
    pub reserved: u32,
    /// Major version (typically 2).
    pub major_version: u8,
    /// Minor version (typically 0).
    pub minor_version: u8,
    /// Heap size flags.
    /// - Bit 0: #Strings uses 4-byte indices
    /// - Bit 1: #GUID uses 4-byte indices
    /// - Bit 2: #Blob uses 4-byte indices
    /// - Bits 5 and 7: edit-and-continue delta
    pub heap_sizes: u8,
    /// Reserved (should be 1).
    pub reserved2: u8,
    /// Bitmask of valid (present) tables.
    pub valid: u64,
    /// Bitmask of sorted tables.
    pub sorted: u64,
    /// Row counts for each valid table.
    pub row_counts: [u32; MAX_TABLES],
}

impl TablesHeader {
    /// Build the header of a stream about to be written.
    #[must_use]
    pub fn for_context(ctx: &TableContext, format_version: (u8, u8), sorted: u64) -> Self {
        Self {
            reserved: 0,
            major_version: format_version.0,
            minor_version: format_version.1,
            heap_sizes: ctx.heap_sizes,
            reserved2: 1,
            valid: ctx.present_tables(),
            sorted,
            row_counts: ctx.row_counts,
        }
    }

    /// Parse the tables header from a reader.
    pub fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let reserved = reader.read_u32()?;
        let major_version = reader.read_u8()?;
        let minor_version = reader.read_u8()?;
        let heap_sizes = reader.read_u8()?;
        let reserved2 = reader.read_u8()?;
        let valid = reader.read_u64()?;
        let sorted = reader.read_u64()?;

        // Read row counts for each valid table
        let mut row_counts = [0u32; MAX_TABLES];
        for (i, count) in row_counts.iter_mut().enumerate() {
            if valid & (1u64 << i) != 0 {
                *count = reader.read_u32()?;
            }
        }

        Ok(Self {
            reserved,
            major_version,
            minor_version,
            heap_sizes,
            reserved2,
            valid,
            sorted,
            row_counts,
        })
    }

    /// Write the tables header to a writer.
    pub fn write_to(&self, writer: &mut Writer) {
        writer.write_u32(self.reserved);
        writer.write_u8(self.major_version);
        writer.write_u8(self.minor_version);
        writer.write_u8(self.heap_sizes);
        writer.write_u8(self.reserved2);
        writer.write_u64(self.valid);
        writer.write_u64(self.sorted);

        // Write row counts for each valid table
        for (i, count) in self.row_counts.iter().enumerate() {
            if self.valid & (1u64 << i) != 0 {
                writer.write_u32(*count);
            }
        }
    }

    /// Check if a table is present.
    #[must_use]
    pub fn has_table(&self, table: TableId) -> bool {
        self.valid & (1u64 << (table as u8)) != 0
    }

    /// Get the row count for a table.
    #[must_use]
    pub fn row_count(&self, table: TableId) -> u32 {
        self.row_counts[table as usize]
    }

    /// Create a table context from this header.
    #[must_use]
    pub fn context(&self) -> TableContext {
        TableContext::new(self.heap_sizes, self.row_counts)
    }

    /// Calculate the size of this header in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        let valid_count = self.valid.count_ones() as usize;
        24 + valid_count * 4 // header(24) + row_counts(4 each)
    }

    /// Iterate over valid tables with their row counts.
    pub fn tables(&self) -> impl Iterator<Item = (TableId, u32)> + '_ {
        (0..64u8).filter_map(move |i| {
            if self.valid & (1u64 << i) != 0 {
                TableId::from_u8(i).ok().map(|t| (t, self.row_counts[i as usize]))
            } else {
                None
            }
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_parse() {
        let mut row_counts = [0u32; MAX_TABLES];
        row_counts[TableId::Module as usize] = 1;
        row_counts[TableId::TypeDef as usize] = 3;
        let ctx = TableContext::new(0, row_counts);
        let header = TablesHeader::for_context(&ctx, (2, 0), 0x16003301fa00);

        let mut writer = Writer::new();
        header.write_to(&mut writer);
        let bytes = writer.to_vec();
        assert_eq!(bytes.len(), header.size());
        assert_eq!(bytes.len(), 24 + 8);
        assert_eq!(bytes[7], 1);

        let parsed = TablesHeader::parse(&mut Reader::new(&bytes)).unwrap();
        assert_eq!(parsed.major_version, 2);
        assert_eq!(parsed.sorted, 0x16003301fa00);
        assert!(parsed.has_table(TableId::TypeDef));
        assert!(!parsed.has_table(TableId::Field));
        assert_eq!(parsed.row_count(TableId::TypeDef), 3);
        let tables: Vec<_> = parsed.tables().collect();
        assert_eq!(tables, vec![(TableId::Module, 1), (TableId::TypeDef, 3)]);
    }
}
