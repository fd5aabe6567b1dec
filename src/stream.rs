//! Stream directory entries of the metadata root.

use crate::error::Result;
use crate::reader::Reader;
use crate::writer::{Writer, align_up};

/// One entry of the stream directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    /// Offset from the start of the metadata root.
    pub offset: u32,
    /// Size of the stream in bytes, padding included.
    pub size: u32,
    pub name: String,
}

impl StreamHeader {
    /// Portable PDB id, entry point and referenced type-system row counts.
    pub const PDB: &'static str = "#Pdb";
    pub const TABLES: &'static str = "#~";
    /// Uncompressed tables of an edit-and-continue delta.
    pub const TABLES_UNCOMPRESSED: &'static str = "#-";
    pub const STRINGS: &'static str = "#Strings";
    pub const USER_STRINGS: &'static str = "#US";
    pub const GUID: &'static str = "#GUID";
    pub const BLOB: &'static str = "#Blob";
    /// Empty marker stream of a minimal delta.
    pub const MINIMAL_DELTA: &'static str = "#JTD";

    #[must_use]
    pub fn new(name: &str, offset: u32, size: u32) -> Self {
        Self {
            offset,
            size,
            name: name.to_string(),
        }
    }

    /// Parse a directory entry.
    pub fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let offset = reader.read_u32()?;
        let size = reader.read_u32()?;

        let name_start = reader.position();
        let name = reader.read_null_str()?.to_string();

        // Names are padded to 4 bytes, terminator included.
        let consumed = reader.position() - name_start;
        let padding = align_up(consumed, 4) - consumed;
        if padding > 0 {
            reader.read_bytes(padding)?;
        }

        Ok(Self { offset, size, name })
    }

    /// Write the directory entry.
    pub fn write(&self, writer: &mut Writer) {
        writer.write_u32(self.offset);
        writer.write_u32(self.size);
        writer.write_null_str(&self.name);
        let written = self.name.len() + 1;
        writer.write_zeros(align_up(written, 4) - written);
    }

    /// Size of the directory entry.
    #[must_use]
    pub fn serialized_size(&self) -> usize {
        Self::entry_size(&self.name)
    }

    /// Size of the directory entry of a stream named `name`.
    #[must_use]
    pub fn entry_size(name: &str) -> usize {
        8 + align_up(name.len() + 1, 4)
    }

    /// Check if this is the tables stream (#~ or #-).
    #[must_use]
    pub fn is_tables(&self) -> bool {
        self.name == Self::TABLES || self.name == Self::TABLES_UNCOMPRESSED
    }
}
