//! Metadata heaps: #Strings, #US, #GUID, #Blob.

mod blob;
mod guid;
mod strings;
mod us;

pub use blob::BlobHeap;
pub use guid::GuidHeap;
pub use strings::{FrozenStringHeap, StringHeapBuilder, StringIdx};
pub use us::{MAX_USER_STRING_OFFSET, USER_STRING_TOKEN_TYPE, UserStringHeap};
