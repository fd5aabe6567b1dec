//! #Blob heap - length-prefixed binary data.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::reader::Reader;
use crate::writer::{Writer, align_up};

/// The #Blob heap containing length-prefixed binary blobs.
#[derive(Debug, Clone)]
pub struct BlobHeap {
    /// Raw heap data.
    data: Vec<u8>,
    /// Blob to offset mapping for O(1) deduplication during writes.
    index_map: HashMap<Vec<u8>, u32>,
    /// Size of the heaps of earlier generations.
    start_offset: u32,
}

impl Default for BlobHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobHeap {
    /// Create a new empty blob heap.
    #[must_use]
    pub fn new() -> Self {
        Self::with_start_offset(0)
    }

    /// Create a heap whose offsets continue after `start_offset` bytes of earlier heaps.
    #[must_use]
    pub fn with_start_offset(start_offset: u32) -> Self {
        // Heap always starts with a null byte (empty blob at index 0)
        let mut index_map = HashMap::new();
        index_map.insert(Vec::new(), 0);
        Self {
            data: vec![0],
            index_map,
            start_offset,
        }
    }

    /// Get a blob at the given offset.
    pub fn get(&self, offset: u32) -> Result<&[u8]> {
        if offset == 0 {
            return Ok(&[]);
        }
        let local = offset
            .checked_sub(self.start_offset)
            .map(|o| o as usize)
            .filter(|&o| o < self.data.len())
            .ok_or(Error::UnexpectedEof {
                offset: offset as usize,
                needed: 1,
            })?;

        Reader::new(&self.data[local..]).read_blob()
    }

    /// Add a blob to the heap and return its offset.
    /// Deduplicates blobs that already exist in O(1) time.
    pub fn add(&mut self, blob: &[u8]) -> Result<u32> {
        if let Some(&offset) = self.index_map.get(blob) {
            return Ok(offset);
        }

        let offset = self.start_offset + self.data.len() as u32;

        let mut writer = Writer::new();
        writer.write_compressed_uint(blob.len() as u32)?;
        self.data.extend_from_slice(&writer.to_vec());
        self.data.extend_from_slice(blob);

        self.index_map.insert(blob.to_vec(), offset);
        Ok(offset)
    }

    /// Number of distinct blobs, the empty blob included.
    #[must_use]
    pub fn count(&self) -> usize {
        self.index_map.len()
    }

    /// Get the raw heap data.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get the size of the heap.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Get the size of the heap padded to 4 bytes.
    #[must_use]
    pub fn aligned_size(&self) -> usize {
        align_up(self.data.len(), 4)
    }

    /// Write the heap, padded to 4 bytes.
    pub fn write_to(&self, writer: &mut Writer) {
        writer.write_bytes(&self.data);
        writer.write_zeros(self.aligned_size() - self.data.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_blob_is_zero() {
        let mut heap = BlobHeap::new();
        assert_eq!(heap.add(&[]).unwrap(), 0);
        assert_eq!(heap.size(), 1);
        assert!(heap.get(0).unwrap().is_empty());
    }

    #[test]
    fn test_add_and_get() {
        let mut heap = BlobHeap::new();
        let offset = heap.add(&[0x06, 0x08]).unwrap();
        assert_eq!(offset, 1);
        assert_eq!(heap.get(offset).unwrap(), &[0x06, 0x08]);
        assert_eq!(heap.data(), &[0, 2, 0x06, 0x08]);
    }

    #[test]
    fn test_deduplication() {
        let mut heap = BlobHeap::new();
        let a = heap.add(&[1, 2, 3]).unwrap();
        let b = heap.add(&[4, 5]).unwrap();
        let c = heap.add(&[1, 2, 3]).unwrap();
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(heap.count(), 3);
        assert_eq!(heap.size(), 1 + 4 + 3);
    }

    #[test]
    fn test_long_blob_uses_two_byte_length() {
        let mut heap = BlobHeap::new();
        let blob = vec![0xAB; 200];
        let offset = heap.add(&blob).unwrap();
        assert_eq!(&heap.data()[1..3], &[0x80, 200]);
        assert_eq!(heap.get(offset).unwrap(), blob.as_slice());
    }

    #[test]
    fn test_start_offset() {
        let mut heap = BlobHeap::with_start_offset(0x20);
        let offset = heap.add(&[7]).unwrap();
        assert_eq!(offset, 0x21);
        assert_eq!(heap.get(offset).unwrap(), &[7]);
    }

    #[test]
    fn test_write_pads_to_four() {
        let mut heap = BlobHeap::new();
        heap.add(&[9]).unwrap();
        let mut writer = Writer::new();
        heap.write_to(&mut writer);
        assert_eq!(writer.to_vec(), vec![0, 1, 9, 0]);
    }
}
