//! Managed resources section.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::writer::Writer;

/// Provides the bytes of an embedded managed resource.
pub trait ResourceSource: fmt::Debug {
    /// Produce the resource content. Called once per emit.
    fn read(&self) -> io::Result<Vec<u8>>;
}

impl ResourceSource for Vec<u8> {
    fn read(&self) -> io::Result<Vec<u8>> {
        Ok(self.clone())
    }
}

/// A resource read from a file when the module is written.
#[derive(Debug, Clone)]
pub struct FileResource(pub PathBuf);

impl ResourceSource for FileResource {
    fn read(&self) -> io::Result<Vec<u8>> {
        std::fs::read(&self.0)
    }
}

/// Accumulates embedded resources: each entry is a u32 length, the bytes, then padding
/// to 8 bytes.
#[derive(Debug, Default)]
pub struct ResourceWriter {
    writer: Writer,
}

impl ResourceWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resource and return its offset in the section.
    pub fn add(&mut self, name: &str, source: &dyn ResourceSource) -> Result<u32> {
        let data = source.read().map_err(|source| Error::ResourceWrite {
            name: name.to_string(),
            source,
        })?;
        if data.is_empty() {
            log::warn!("managed resource '{name}' is empty");
        }
        let offset = self.writer.len() as u32;
        self.writer.write_u32(data.len() as u32);
        self.writer.write_bytes(&data);
        self.writer.align(8);
        Ok(offset)
    }

    /// Size of the section so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.writer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writer.is_empty()
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Failing;

    impl ResourceSource for Failing {
        fn read(&self) -> io::Result<Vec<u8>> {
            Err(io::Error::new(io::ErrorKind::NotFound, "gone"))
        }
    }

    #[test]
    fn test_entries_are_aligned() {
        let mut resources = ResourceWriter::new();
        assert_eq!(resources.add("a", &vec![1u8, 2, 3]).unwrap(), 0);
        assert_eq!(resources.add("b", &vec![4u8]).unwrap(), 8);
        let bytes = resources.into_bytes();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[..8], &[3, 0, 0, 0, 1, 2, 3, 0]);
        assert_eq!(&bytes[8..13], &[1, 0, 0, 0, 4]);
    }

    #[test]
    fn test_provider_failure_names_resource() {
        let mut resources = ResourceWriter::new();
        let err = resources.add("strings.resources", &Failing).unwrap_err();
        match err {
            Error::ResourceWrite { name, source } => {
                assert_eq!(name, "strings.resources");
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
