//! #Strings heap - null-terminated UTF-8 strings with suffix folding.
//!
//! The heap is built in two phases. While open, [`StringHeapBuilder::add`] hands out
//! virtual [`StringIdx`] handles in first-seen order. [`StringHeapBuilder::freeze`]
//! consumes the builder, sorts the strings by their trailing characters and stores a
//! string only when it is not a suffix of the string written just before it. The
//! resulting [`FrozenStringHeap`] maps every handle to its final offset.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::writer::{Writer, align_up};

/// Virtual index of a #Strings entry, valid until the heap is frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StringIdx(u32);

impl StringIdx {
    /// The empty string, always stored at offset 0.
    pub const EMPTY: Self = Self(0);

    /// Check if this is the empty string.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// The open phase of the #Strings heap.
#[derive(Debug, Clone, Default)]
pub struct StringHeapBuilder {
    /// Strings in first-seen order; entry `i` has virtual index `i + 1`.
    strings: Vec<String>,
    /// String to virtual index mapping for deduplication.
    index_map: HashMap<String, StringIdx>,
    /// Size of the heaps of earlier generations.
    start_offset: u32,
}

impl StringHeapBuilder {
    /// Create a new empty heap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a heap whose offsets continue after `start_offset` bytes of earlier heaps.
    #[must_use]
    pub fn with_start_offset(start_offset: u32) -> Self {
        Self {
            start_offset,
            ..Self::default()
        }
    }

    /// Add a string and return its virtual index. Duplicates share an index.
    pub fn add(&mut self, s: &str) -> StringIdx {
        if s.is_empty() {
            return StringIdx::EMPTY;
        }
        if let Some(&idx) = self.index_map.get(s) {
            return idx;
        }
        self.strings.push(s.to_string());
        let idx = StringIdx(self.strings.len() as u32);
        self.index_map.insert(s.to_string(), idx);
        idx
    }

    /// Get the string behind a virtual index.
    #[must_use]
    pub fn get(&self, idx: StringIdx) -> Option<&str> {
        if idx.is_empty() {
            return Some("");
        }
        self.strings.get(idx.0 as usize - 1).map(String::as_str)
    }

    /// Number of distinct non-empty strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Check if no string other than the empty one was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Sort, fold shared suffixes and resolve every virtual index.
    #[must_use]
    pub fn freeze(self) -> FrozenStringHeap {
        let mut sorted: Vec<(Vec<u16>, usize)> = self
            .strings
            .iter()
            .enumerate()
            .map(|(i, s)| (s.encode_utf16().collect(), i))
            .collect();
        sorted.sort_by(|(x, _), (y, _)| suffix_order(x, y));

        let mut data = vec![0u8];
        let mut offsets = vec![0u32; self.strings.len() + 1];
        let mut prev: &str = "";
        for (_, i) in &sorted {
            let s = self.strings[*i].as_str();
            let position = self.start_offset + data.len() as u32;
            if prev.ends_with(s) {
                // Point into the tail of the previous string, before its terminator.
                offsets[i + 1] = position - (s.len() as u32 + 1);
            } else {
                offsets[i + 1] = position;
                data.extend_from_slice(s.as_bytes());
                data.push(0);
            }
            prev = s;
        }

        log::trace!(
            "#Strings frozen: {} strings in {} bytes",
            self.strings.len(),
            data.len()
        );

        FrozenStringHeap {
            data,
            offsets,
            start_offset: self.start_offset,
        }
    }
}

/// Compare two strings by UTF-16 code units from the end; on a tie the longer one sorts first.
fn suffix_order(x: &[u16], y: &[u16]) -> Ordering {
    for (a, b) in x.iter().rev().zip(y.iter().rev()) {
        match a.cmp(b) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    y.len().cmp(&x.len())
}

/// The closed phase of the #Strings heap.
#[derive(Debug, Clone)]
pub struct FrozenStringHeap {
    /// Heap bytes, starting with the empty string.
    data: Vec<u8>,
    /// Resolved offset per virtual index.
    offsets: Vec<u32>,
    start_offset: u32,
}

impl FrozenStringHeap {
    /// Resolve a virtual index to its heap offset.
    #[must_use]
    pub fn resolve(&self, idx: StringIdx) -> u32 {
        self.offsets[idx.0 as usize]
    }

    /// Get a string at the given heap offset.
    pub fn get(&self, offset: u32) -> Result<&str> {
        let local = if offset == 0 {
            0
        } else {
            offset
                .checked_sub(self.start_offset)
                .ok_or(Error::InvalidString(offset as usize))? as usize
        };
        if local >= self.data.len() {
            return Err(Error::InvalidString(offset as usize));
        }

        let end = self.data[local..]
            .iter()
            .position(|&b| b == 0)
            .ok_or(Error::InvalidString(offset as usize))?;

        std::str::from_utf8(&self.data[local..local + end])
            .map_err(|_| Error::InvalidString(offset as usize))
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
