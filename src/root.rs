//! Metadata root (BSJB header).

use crate::error::{Error, Result};
use crate::reader::Reader;
use crate::stream::StreamHeader;
use crate::writer::{Writer, align_up};

/// BSJB signature (0x424A5342 = "BSJB" in little-endian).
pub const METADATA_SIGNATURE: u32 = 0x424A5342;

/// Version string of Portable PDB metadata.
pub const PDB_VERSION: &str = "PDB v1.0";

/// The metadata root header and its stream directory.
#[derive(Debug, Clone)]
pub struct MetadataRoot {
    pub major_version: u16,
    pub minor_version: u16,
    pub reserved: u32,
    /// Runtime version string (e.g., "v4.0.30319").
    pub version: String,
    pub flags: u16,
    pub streams: Vec<StreamHeader>,
}

impl MetadataRoot {
    /// Lay out `streams` (name and size) one after another behind the header.
    ///
    /// Every stream starts on a 4-byte boundary.
    #[must_use]
    pub fn layout(version: &str, streams: &[(&str, usize)]) -> Self {
        let mut root = Self {
            major_version: 1,
            minor_version: 1,
            reserved: 0,
            version: version.to_string(),
            flags: 0,
            streams: streams
                .iter()
                .map(|(name, size)| StreamHeader::new(name, 0, *size as u32))
                .collect(),
        };
        let mut offset = root.header_size();
        for stream in &mut root.streams {
            stream.offset = offset as u32;
            offset = align_up(offset + stream.size as usize, 4);
        }
        root
    }

    /// Parse the metadata root from raw bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(data);
        let signature = reader.read_u32()?;
        if signature != METADATA_SIGNATURE {
            return Err(Error::InvalidSignature(signature));
        }

        let major_version = reader.read_u16()?;
        let minor_version = reader.read_u16()?;
        let reserved = reader.read_u32()?;

        let version_len = reader.read_u32()? as usize;
        let version_bytes = reader.read_bytes(version_len)?;
        let version = version_bytes
            .iter()
            .position(|&b| b == 0)
            .map_or(version_bytes, |pos| &version_bytes[..pos]);
        let version = std::str::from_utf8(version)
            .map_err(|_| Error::InvalidString(reader.position()))?
            .to_string();

        let flags = reader.read_u16()?;
        let stream_count = reader.read_u16()? as usize;
        let mut streams = Vec::with_capacity(stream_count);
        for _ in 0..stream_count {
            streams.push(StreamHeader::parse(&mut reader)?);
        }

        Ok(Self {
            major_version,
            minor_version,
            reserved,
            version,
            flags,
            streams,
        })
    }

    /// Write the header and the stream directory.
    pub fn write_to(&self, writer: &mut Writer) {
        writer.write_u32(METADATA_SIGNATURE);
        writer.write_u16(self.major_version);
        writer.write_u16(self.minor_version);
        writer.write_u32(self.reserved);

        let padded = self.padded_version_len();
        writer.write_u32(padded as u32);
        writer.write_bytes(self.version.as_bytes());
        writer.write_zeros(padded - self.version.len());

        writer.write_u16(self.flags);
        writer.write_u16(self.streams.len() as u16);
        for stream in &self.streams {
            stream.write(writer);
        }
    }

    /// Length of the version field: the string and its terminator, padded to 4 bytes.
    fn padded_version_len(&self) -> usize {
        align_up(self.version.len() + 1, 4)
    }

    /// Size of the header and the stream directory.
    #[must_use]
    pub fn header_size(&self) -> usize {
        // signature, versions, reserved, version length, flags, stream count
        let fixed = 4 + 2 + 2 + 4 + 4 + 2 + 2;
        let streams: usize = self.streams.iter().map(StreamHeader::serialized_size).sum();
        fixed + self.padded_version_len() + streams
    }

    /// Total size of the metadata described by this root.
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.streams
            .last()
            .map_or(self.header_size(), |s| align_up((s.offset + s.size) as usize, 4))
    }

    #[must_use]
    pub fn find_stream(&self, name: &str) -> Option<&StreamHeader> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// Find the tables stream (#~ or #-).
    #[must_use]
    pub fn tables_stream(&self) -> Option<&StreamHeader> {
        self.streams.iter().find(|s| s.is_tables())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_aligns_streams() {
        let root = MetadataRoot::layout(
            "v4.0.30319",
            &[("#~", 0x3E), ("#Strings", 0x10), ("#US", 0x4), ("#GUID", 0x10), ("#Blob", 0x8)],
        );
        // 32 bytes of header plus the directory.
        assert_eq!(root.header_size(), 32 + 12 + 20 + 12 + 16 + 16);
        let offsets: Vec<u32> = root.streams.iter().map(|s| s.offset).collect();
        assert_eq!(offsets[0], 108);
        assert_eq!(offsets[1], 108 + 0x40);
        assert!(offsets.iter().all(|o| o % 4 == 0));
    }

    #[test]
    fn test_write_then_parse() {
        let root = MetadataRoot::layout(PDB_VERSION, &[("#Pdb", 32), ("#~", 28)]);
        let mut writer = Writer::new();
        root.write_to(&mut writer);
        let bytes = writer.to_vec();
        assert_eq!(bytes.len(), root.header_size());
        assert_eq!(&bytes[..4], b"BSJB");
        // "PDB v1.0" plus terminator pads to 12 bytes.
        assert_eq!(&bytes[12..16], &[12, 0, 0, 0]);

        let parsed = MetadataRoot::parse(&bytes).unwrap();
        assert_eq!(parsed.version, PDB_VERSION);
        assert_eq!(parsed.streams, root.streams);
        assert_eq!(parsed.tables_stream().map(|s| s.size), Some(28));
    }

    #[test]
    fn test_bad_signature() {
        assert!(matches!(
            MetadataRoot::parse(&[0u8; 32]),
            Err(Error::InvalidSignature(0))
        ));
    }
}
