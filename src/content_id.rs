//! Content-derived identifiers and hashing helpers.
//!
//! Module version ids and Portable PDB ids are derived from a hash of the bytes they
//! describe, so identical input always produces identical output.

use sha1::Sha1;
use sha2::{Digest as _, Sha256};
use uguid::{Guid, guid};

/// A GUID plus a 4-byte timestamp derived from content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobContentId {
    /// Content GUID, shaped as an RFC 4122 version 4 GUID.
    pub guid: Guid,
    /// Timestamp with the high bit set.
    pub stamp: u32,
}

impl BlobContentId {
    /// Size of the id when written out (GUID then stamp).
    pub const SIZE: usize = 20;

    /// Derive an id from a hash of at least 20 bytes.
    #[must_use]
    pub fn from_hash(hash: &[u8; 32]) -> Self {
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash[..16]);
        bytes[7] = (bytes[7] & 0x0F) | 0x40;
        bytes[8] = (bytes[8] & 0x3F) | 0x80;

        let stamp = 0x8000_0000 | u32::from_le_bytes([hash[16], hash[17], hash[18], hash[19]]);
        Self {
            guid: Guid::from_bytes(bytes),
            stamp,
        }
    }

    /// Hash the given parts in order and derive an id.
    #[must_use]
    pub fn from_content<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        Self::from_hash(&hasher.finalize().into())
    }

    /// The 20 bytes written into an id slot.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..16].copy_from_slice(&self.guid.to_bytes());
        out[16..].copy_from_slice(&self.stamp.to_le_bytes());
        out
    }
}

/// Hash algorithm of a source document checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// SHA-1 (20 bytes).
    Sha1,
    /// SHA-256 (32 bytes).
    Sha256,
}

impl HashAlgorithm {
    /// The GUID identifying the algorithm in the Document table.
    #[must_use]
    pub fn guid(self) -> Guid {
        match self {
            Self::Sha1 => guid!("ff1816ec-aa5e-4d10-87f7-6f4963833460"),
            Self::Sha256 => guid!("8829d00f-11b8-4213-878b-770e8597ac16"),
        }
    }

    /// Hash `data` with this algorithm.
    #[must_use]
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => Sha1::digest(data).to_vec(),
            Self::Sha256 => Sha256::digest(data).to_vec(),
        }
    }
}

/// Compute the public key token from a public key.
///
/// The public key token is the last 8 bytes of the SHA-1 hash, reversed.
#[must_use]
pub fn public_key_token(public_key: &[u8]) -> [u8; 8] {
    let hash = Sha1::digest(public_key);
    let mut token = [0u8; 8];
    for (i, byte) in token.iter_mut().enumerate() {
        *byte = hash[19 - i];
    }
    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_token() {
        // SHA-1 of "abc" = a9993e364706816aba3e25717850c26c9cd0d89d
        // Last 8 bytes: 7850c26c9cd0d89d, reversed
        let token = public_key_token(b"abc");
        assert_eq!(token, [0x9d, 0xd8, 0xd0, 0x9c, 0x6c, 0xc2, 0x50, 0x78]);
    }

    #[test]
    fn test_sha1_digest() {
        let hash = HashAlgorithm::Sha1.digest(b"");
        assert_eq!(hash.len(), 20);
        assert_eq!(&hash[..4], &[0xda, 0x39, 0xa3, 0xee]);
    }

    #[test]
    fn test_from_hash_sets_version_bits() {
        let hash = [0xFFu8; 32];
        let id = BlobContentId::from_hash(&hash);
        let bytes = id.guid.to_bytes();
        assert_eq!(bytes[7], 0x4F);
        assert_eq!(bytes[8], 0xBF);
        assert_eq!(id.stamp, 0xFFFF_FFFF);

        let zeros = BlobContentId::from_hash(&[0u8; 32]);
        assert_eq!(zeros.guid.to_bytes()[7], 0x40);
        assert_eq!(zeros.guid.to_bytes()[8], 0x80);
        assert_eq!(zeros.stamp, 0x8000_0000);
    }

    #[test]
    fn test_from_content_is_deterministic() {
        let a = BlobContentId::from_content([b"meta".as_slice(), b"data".as_slice()]);
        let b = BlobContentId::from_content([b"metadata".as_slice()]);
        let c = BlobContentId::from_content([b"other".as_slice()]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(&a.to_bytes()[..16], &a.guid.to_bytes());
    }
}
