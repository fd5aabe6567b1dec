//! Error types for clremit.

use thiserror::Error;

use crate::tables::{CodedIndexKind, TableId};

/// Result type alias for clremit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or serializing metadata.
#[derive(Debug, Error)]
pub enum Error {
    /// Value does not fit the ECMA-335 compressed unsigned integer encoding.
    #[error("compressed unsigned integer out of range: 0x{0:X} (max 0x1FFFFFFF)")]
    CompressedUIntOverflow(u32),

    /// Value does not fit the ECMA-335 compressed signed integer encoding.
    #[error("compressed signed integer out of range: {0} (allowed -2^28..2^28-1)")]
    CompressedIntOverflow(i32),

    /// Row id does not fit in the bits left over by the coded index tag.
    #[error("row {row} does not fit in a {kind:?} coded index")]
    CodedIndexOverflow {
        /// The coded index kind being encoded.
        kind: CodedIndexKind,
        /// The offending row id.
        row: u32,
    },

    /// Table has more rows than a 24-bit token can address.
    #[error("table {table:?} has {rows} rows, max is 0xFFFFFF")]
    TooManyRows {
        /// The overflowing table.
        table: TableId,
        /// Number of rows.
        rows: usize,
    },

    /// Heap grew past the offsets its tokens can express.
    #[error("{heap} heap exceeded its capacity of 0x{limit:X} bytes")]
    HeapFull {
        /// Heap name.
        heap: &'static str,
        /// Largest valid offset.
        limit: u32,
    },

    /// More bytes were written into a reservation than it holds.
    #[error("reservation of {reserved} bytes cannot hold {written} bytes")]
    ReservationOverflow {
        /// Size of the reserved region.
        reserved: usize,
        /// Number of bytes offered.
        written: usize,
    },

    /// Reservation does not belong to the buffer it is redeemed against.
    #[error("reservation at offset {offset} lies outside the buffer (len {len})")]
    ReservationOutOfBounds {
        /// Start of the reservation.
        offset: usize,
        /// Length of the buffer.
        len: usize,
    },

    /// Constant of a type that has no metadata constant encoding.
    #[error("constant of type {0} cannot be encoded in metadata")]
    UnsupportedConstant(&'static str),

    /// A managed resource provider failed to produce content.
    #[error("failed to write resource '{name}'")]
    ResourceWrite {
        /// Resource name.
        name: String,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// A token was requested for an entity the indexer never saw.
    #[error("no token assigned for {0}")]
    Unresolved(String),

    /// A token fixup does not fit inside the method's IL.
    #[error("token fixup at offset {offset} does not fit in {il_len} bytes of IL")]
    InvalidFixup {
        /// Offset of the token within the IL.
        offset: u32,
        /// Length of the IL.
        il_len: usize,
    },

    /// A delta was requested for a module with no MVID and no baseline MVID.
    #[error("delta needs the baseline MVID")]
    MissingBaseMvid,

    /// The background computation of a document checksum failed.
    #[error("document checksum computation failed")]
    ChecksumFailed,

    /// Emit was cancelled by the caller.
    #[error("metadata emit was cancelled")]
    Cancelled,

    /// Invalid BSJB signature (expected 0x424A5342).
    #[error("invalid metadata signature: expected 0x424A5342, got 0x{0:08X}")]
    InvalidSignature(u32),

    /// Unexpected end of data while reading.
    #[error("unexpected end of data at offset {offset}, needed {needed} bytes")]
    UnexpectedEof {
        /// Offset where the read was attempted.
        offset: usize,
        /// Number of bytes needed.
        needed: usize,
    },

    /// Stream not found by name.
    #[error("stream not found: {0}")]
    StreamNotFound(String),

    /// Invalid UTF-8 string in #Strings heap.
    #[error("invalid UTF-8 string at offset {0}")]
    InvalidString(usize),

    /// Invalid table ID.
    #[error("invalid table ID: {0}")]
    InvalidTableId(u8),

    /// Invalid compressed integer encoding.
    #[error("invalid compressed integer at offset {0}")]
    InvalidCompressedInt(usize),
}
