//! Chunked output buffer with patch-back reservations.
//!
//! [`BlobBuilder`] stores its content as a list of fixed-capacity chunks. Appending
//! never moves bytes that were already written, linking another builder moves its
//! chunks instead of copying their contents, and a region can be reserved up front
//! and filled exactly once later through a [`Reservation`].

use std::io;

use crate::error::{Error, Result};

/// Default capacity of a freshly allocated chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 256;

/// A byte region reserved in a [`BlobBuilder`], redeemable once via [`BlobBuilder::fill`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a reservation must be filled or the region stays zeroed"]
pub struct Reservation {
    offset: usize,
    len: usize,
}

impl Reservation {
    /// Offset of the reserved region from the start of the builder.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Size of the reserved region in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the reservation covers no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A growable, chunked byte buffer.
#[derive(Debug, Clone)]
pub struct BlobBuilder {
    chunks: Vec<Vec<u8>>,
    /// Absolute start offset of each chunk.
    starts: Vec<usize>,
    chunk_size: usize,
    len: usize,
}

impl Default for BlobBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobBuilder {
    /// Create an empty builder using [`DEFAULT_CHUNK_SIZE`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    /// Create an empty builder whose chunks hold `chunk_size` bytes each.
    #[must_use]
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunks: Vec::new(),
            starts: Vec::new(),
            chunk_size: chunk_size.max(1),
            len: 0,
        }
    }

    /// Total number of bytes written.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of chunks currently backing the content.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Append bytes.
    pub fn write_bytes(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            let chunk = self.writable_chunk();
            let room = chunk.capacity() - chunk.len();
            let take = room.min(bytes.len());
            chunk.extend_from_slice(&bytes[..take]);
            self.len += take;
            bytes = &bytes[take..];
        }
    }

    /// Append `count` copies of `value`.
    pub fn write_repeated(&mut self, value: u8, mut count: usize) {
        while count > 0 {
            let chunk = self.writable_chunk();
            let room = chunk.capacity() - chunk.len();
            let take = room.min(count);
            chunk.resize(chunk.len() + take, value);
            self.len += take;
            count -= take;
        }
    }

    /// Reserve `len` zeroed bytes to be filled in later.
    pub fn reserve(&mut self, len: usize) -> Reservation {
        let offset = self.len;
        self.write_repeated(0, len);
        Reservation { offset, len }
    }

    /// Fill a reserved region. Writing more bytes than were reserved fails.
    pub fn fill(&mut self, reservation: Reservation, bytes: &[u8]) -> Result<()> {
        if bytes.len() > reservation.len {
            return Err(Error::ReservationOverflow {
                reserved: reservation.len,
                written: bytes.len(),
            });
        }
        if reservation.offset + reservation.len > self.len {
            return Err(Error::ReservationOutOfBounds {
                offset: reservation.offset,
                len: self.len,
            });
        }
        self.overwrite(reservation.offset, bytes);
        Ok(())
    }

    /// Append the content of `other`, taking ownership of its chunks without copying them.
    pub fn link_suffix(&mut self, other: BlobBuilder) {
        for chunk in other.chunks {
            if chunk.is_empty() {
                continue;
            }
            self.starts.push(self.len);
            self.len += chunk.len();
            self.chunks.push(chunk);
        }
    }

    /// Flatten the content into one contiguous vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for chunk in &self.chunks {
            out.extend_from_slice(chunk);
        }
        out
    }

    /// Copy the content into an [`io::Write`] sink.
    pub fn write_to<W: io::Write>(&self, sink: &mut W) -> io::Result<()> {
        for chunk in &self.chunks {
            sink.write_all(chunk)?;
        }
        Ok(())
    }

    fn writable_chunk(&mut self) -> &mut Vec<u8> {
        let full = self
            .chunks
            .last()
            .is_none_or(|c| c.len() == c.capacity());
        if full {
            self.starts.push(self.len);
            self.chunks.push(Vec::with_capacity(self.chunk_size));
        }
        let last = self.chunks.len() - 1;
        &mut self.chunks[last]
    }

    fn overwrite(&mut self, offset: usize, mut bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        // Index of the chunk containing `offset`.
        let mut index = self.starts.partition_point(|&s| s <= offset) - 1;
        let mut within = offset - self.starts[index];
        while !bytes.is_empty() {
            let chunk = &mut self.chunks[index];
            let take = (chunk.len() - within).min(bytes.len());
            chunk[within..within + take].copy_from_slice(&bytes[..take]);
            bytes = &bytes[take..];
            index += 1;
            within = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_spans_chunks() {
        let mut builder = BlobBuilder::with_chunk_size(4);
        builder.write_bytes(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(builder.len(), 10);
        assert_eq!(builder.chunk_count(), 3);
        assert_eq!(builder.to_vec(), vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);

        let mut sink = Vec::new();
        builder.write_to(&mut sink).unwrap();
        assert_eq!(sink, builder.to_vec());
    }

    #[test]
    fn test_reserve_and_fill_across_chunks() {
        let mut builder = BlobBuilder::with_chunk_size(4);
        builder.write_bytes(&[0xAA, 0xBB]);
        let slot = builder.reserve(5);
        builder.write_bytes(&[0xCC]);
        builder.fill(slot, &[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(builder.to_vec(), vec![0xAA, 0xBB, 1, 2, 3, 4, 5, 0xCC]);
    }

    #[test]
    fn test_fill_past_reservation_fails() {
        let mut builder = BlobBuilder::new();
        let slot = builder.reserve(2);
        builder.write_bytes(&[9, 9]);
        let err = builder.fill(slot, &[1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            Error::ReservationOverflow {
                reserved: 2,
                written: 3
            }
        ));
        // Adjacent bytes are untouched.
        assert_eq!(builder.to_vec(), vec![0, 0, 9, 9]);
    }

    #[test]
    fn test_link_suffix_moves_chunks() {
        let mut head = BlobBuilder::with_chunk_size(2);
        head.write_bytes(&[1, 2, 3]);
        let mut tail = BlobBuilder::with_chunk_size(2);
        tail.write_bytes(&[4, 5, 6]);
        head.link_suffix(tail);
        head.write_bytes(&[7]);
        assert_eq!(head.len(), 7);
        assert_eq!(head.to_vec(), vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_reservation_survives_link_suffix() {
        let mut head = BlobBuilder::with_chunk_size(3);
        let slot = head.reserve(4);
        let mut tail = BlobBuilder::new();
        tail.write_bytes(b"tail");
        head.link_suffix(tail);
        head.fill(slot, b"head").unwrap();
        assert_eq!(head.to_vec(), b"headtail".to_vec());
    }
}
