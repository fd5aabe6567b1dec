//! #US (User Strings) heap - length-prefixed UTF-16LE strings.

use std::collections::HashMap;

use widestring::{U16Str, U16String};

use crate::error::{Error, Result};
use crate::reader::Reader;
use crate::writer::{Writer, align_up};

/// Table id byte that marks a metadata token as a user string.
pub const USER_STRING_TOKEN_TYPE: u32 = 0x7000_0000;

/// Largest heap offset a user string token can carry.
pub const MAX_USER_STRING_OFFSET: u32 = 0x00FF_FFFF;

/// The #US heap containing user strings (UTF-16LE with length prefix).
#[derive(Debug, Clone)]
pub struct UserStringHeap {
    /// Raw heap data.
    data: Writer,
    /// String to offset mapping for deduplication.
    index_map: HashMap<U16String, u32>,
    /// Size of the heaps of earlier generations.
    start_offset: u32,
}

impl Default for UserStringHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStringHeap {
    /// Create a new empty user strings heap.
    #[must_use]
    pub fn new() -> Self {
        Self::with_start_offset(0)
    }

    /// Create a heap whose offsets continue after `start_offset` bytes of earlier heaps.
    #[must_use]
    pub fn with_start_offset(start_offset: u32) -> Self {
        // Heap always starts with a null byte
        let mut data = Writer::new();
        data.write_u8(0);
        Self {
            data,
            index_map: HashMap::new(),
            start_offset,
        }
    }

    /// Add a user string and return its `0x70xxxxxx` token.
    ///
    /// Fails with [`Error::HeapFull`] once the entry offset no longer fits in 24 bits.
    pub fn add(&mut self, s: &U16Str) -> Result<u32> {
        if let Some(&offset) = self.index_map.get(s) {
            return Ok(USER_STRING_TOKEN_TYPE | offset);
        }

        let offset = self.start_offset + self.data.len() as u32;
        if offset > MAX_USER_STRING_OFFSET {
            return Err(Error::HeapFull {
                heap: "#US",
                limit: MAX_USER_STRING_OFFSET,
            });
        }

        // Blob length = string bytes + 1 (trailing flag byte)
        self.data.write_compressed_uint(s.len() as u32 * 2 + 1)?;
        self.data.write_utf16(s);
        self.data.write_u8(u8::from(needs_special_handling(s)));

        self.index_map.insert(s.to_ustring(), offset);
        Ok(USER_STRING_TOKEN_TYPE | offset)
    }

    /// Get a user string at the given heap offset.
    pub fn get(&self, offset: u32) -> Result<U16String> {
        let data = self.data.to_vec();
        let local = offset
            .checked_sub(self.start_offset)
            .map(|o| o as usize)
            .filter(|&o| o < data.len())
            .ok_or(Error::InvalidString(offset as usize))?;

        let mut reader = Reader::new(&data[local..]);
        let blob = reader.read_blob()?;
        let units: Vec<u16> = blob[..blob.len().saturating_sub(1)]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(U16String::from_vec(units))
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
        writer.write_bytes(&self.data.to_vec());
        writer.write_zeros(self.aligned_size() - self.data.len());
    }
}

/// Check whether the trailing byte of a user string entry must be 1.
fn needs_special_handling(s: &U16Str) -> bool {
    s.as_slice()
        .iter()
        .any(|&c| c >= 0x7F || matches!(c, 0x01..=0x08 | 0x0E..=0x1F | 0x27 | 0x2D))
}

#[cfg(test)]
mod tests {
    use widestring::u16str;

    use super::*;

    #[test]
    fn test_entry_layout() {
        let mut heap = UserStringHeap::new();
        let token = heap.add(u16str!("Hi")).unwrap();
        assert_eq!(token, 0x7000_0001);

        let mut writer = Writer::new();
        heap.write_to(&mut writer);
        // null byte, length 5, "H" "i" in UTF-16LE, flag 0, padding
        assert_eq!(writer.to_vec(), vec![0, 5, b'H', 0, b'i', 0, 0, 0]);
    }

    #[test]
    fn test_deduplication() {
        let mut heap = UserStringHeap::new();
        let first = heap.add(u16str!("Hello")).unwrap();
        let second = heap.add(u16str!("Hello")).unwrap();
        let other = heap.add(u16str!("World")).unwrap();
        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(heap.get(other & 0x00FF_FFFF).unwrap(), u16str!("World"));
    }

    #[test]
    fn test_special_flag() {
        assert!(!needs_special_handling(u16str!("plain text")));
        assert!(needs_special_handling(u16str!("it's")));
        assert!(needs_special_handling(u16str!("a-b")));
        assert!(needs_special_handling(u16str!("\u{7F}")));
        assert!(needs_special_handling(u16str!("caf\u{e9}")));
        assert!(needs_special_handling(u16str!("\u{1}")));
        assert!(!needs_special_handling(u16str!("\t\n\r")));
    }

    #[test]
    fn test_empty_string_entry() {
        let mut heap = UserStringHeap::new();
        let token = heap.add(u16str!("")).unwrap();
        assert_eq!(token, 0x7000_0001);
        assert_eq!(heap.size(), 3);
        assert!(heap.get(1).unwrap().is_empty());
    }

    #[test]
    fn test_start_offset_and_capacity() {
        let mut heap = UserStringHeap::with_start_offset(0x40);
        assert_eq!(heap.add(u16str!("x")).unwrap(), 0x7000_0041);

        let mut full = UserStringHeap::with_start_offset(MAX_USER_STRING_OFFSET);
        assert!(matches!(
            full.add(u16str!("y")),
            Err(Error::HeapFull { heap: "#US", .. })
        ));
    }
}
