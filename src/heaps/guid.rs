//! #GUID heap - 16-byte GUIDs with 1-based indexing.

use std::collections::HashMap;

use uguid::Guid;

use crate::buffer::Reservation;
use crate::error::{Error, Result};
use crate::writer::Writer;

/// The #GUID heap containing GUIDs (16-byte entries, 1-based indexing).
#[derive(Debug, Clone, Default)]
pub struct GuidHeap {
    /// Entries in index order; `None` marks a slot reserved for later.
    entries: Vec<Option<Guid>>,
    /// GUID bytes to index mapping for deduplication.
    index_map: HashMap<[u8; 16], u32>,
    /// Number of GUIDs in the heaps of earlier generations.
    start_count: u32,
}

impl GuidHeap {
    /// Create a new empty GUID heap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a heap whose indices continue after `start_offset` bytes of earlier heaps.
    #[must_use]
    pub fn with_start_offset(start_offset: u32) -> Self {
        Self {
            start_count: start_offset / 16,
            ..Self::default()
        }
    }

    /// Add a GUID and return its 1-based index. The nil GUID maps to 0.
    pub fn add(&mut self, guid: Guid) -> u32 {
        if guid == Guid::ZERO {
            return 0;
        }
        let key = guid.to_bytes();
        if let Some(&index) = self.index_map.get(&key) {
            return index;
        }
        self.entries.push(Some(guid));
        let index = self.start_count + self.entries.len() as u32;
        self.index_map.insert(key, index);
        index
    }

    /// Reserve a slot whose content is filled after serialization (the module version id).
    ///
    /// A reserved slot never takes part in deduplication.
    pub fn add_reserved(&mut self) -> u32 {
        self.entries.push(None);
        self.start_count + self.entries.len() as u32
    }

    /// Get a GUID by 1-based index. Index 0 and reserved slots read as nil.
    pub fn get(&self, index: u32) -> Result<Guid> {
        if index == 0 {
            return Ok(Guid::ZERO);
        }
        let local = index
            .checked_sub(self.start_count + 1)
            .map(|i| i as usize)
            .ok_or(Error::UnexpectedEof {
                offset: index as usize * 16,
                needed: 16,
            })?;
        match self.entries.get(local) {
            Some(entry) => Ok(entry.unwrap_or(Guid::ZERO)),
            None => Err(Error::UnexpectedEof {
                offset: index as usize * 16,
                needed: 16,
            }),
        }
    }

    /// Get the number of GUIDs in the heap.
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Get the size of the heap.
    #[must_use]
    pub fn size(&self) -> usize {
        self.entries.len() * 16
    }

    /// Write the heap. Reserved slots are written as zeros and handed back for patching.
    pub fn write_to(&self, writer: &mut Writer) -> Vec<Reservation> {
        let mut reserved = Vec::new();
        for entry in &self.entries {
            match entry {
                Some(guid) => writer.write_bytes(&guid.to_bytes()),
                None => reserved.push(writer.reserve(16)),
            }
        }
        reserved
    }
}
