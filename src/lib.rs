//! # clremit
//!
//! ECMA-335 CLI/.NET metadata writer.
//!
//! This crate turns an in-memory module description into the byte images a PE writer
//! embeds: the metadata blob (BSJB root with `#~`, `#Strings`, `#US`, `#GUID` and `#Blob`),
//! the IL stream of method bodies, mapped field data, managed resources and, optionally,
//! Portable PDB debug metadata. It is PE-agnostic: placing these images in sections and
//! fixing up RVAs is left to the caller.
//!
//! ## Features
//!
//! - Deduplicating heap builders, with suffix-merged #Strings
//! - Reference tokens handed out in first-use order, structurally equal references share a row
//! - Index widths derived from final heap sizes and row counts
//! - Reserved regions for the MVID and PDB id, backpatched with content hashes
//! - Edit-and-continue deltas (`#-`, EncLog, EncMap, minimal `#JTD` deltas)
//! - A read-only [`inspect::MetadataView`] to check produced metadata
//!
//! ## Example
//!
//! ```ignore
//! use clremit::model::{MethodBody, MethodDef, MethodSignature, Module, PrimitiveType, TypeDef};
//! use clremit::{WriterOptions, emit};
//!
//! let mut module = Module::new("hello.dll");
//! let program = module.add_type(TypeDef::new("", "Program"));
//! let void = module.primitive(PrimitiveType::Void);
//! let mut main = MethodDef::new("Main", 0x0016, MethodSignature::new_static(void, vec![]));
//! main.body = Some(MethodBody::new(vec![0x2A], 0));
//! module.add_method(program, main);
//!
//! let output = emit(&module, &WriterOptions::new())?;
//! println!("metadata: {} bytes, mvid {}", output.metadata.len(), output.mvid);
//! ```

pub mod attribute;
pub mod body;
pub mod buffer;
pub mod constant;
pub mod content_id;
pub mod debug;
pub mod emit;
pub mod error;
pub mod heaps;
pub mod inspect;
pub mod metadata;
pub mod model;
pub mod options;
pub mod reader;
pub mod resources;
pub mod root;
pub mod signature;
pub mod stream;
pub mod tables;
pub mod writer;

// Re-export main types
pub use content_id::BlobContentId;
pub use emit::{EmitResult, emit};
pub use error::{Error, Result};
pub use inspect::MetadataView;
pub use metadata::{MetadataBuilder, StreamLayout};
pub use model::Module;
pub use options::{CancellationFlag, DeltaOptions, WriterOptions};
pub use root::MetadataRoot;
pub use stream::StreamHeader;

// Re-export heaps
pub use heaps::{BlobHeap, GuidHeap, StringHeapBuilder, UserStringHeap};

// Re-export tables
pub use tables::{CodedIndex, CodedIndexKind, TableId, TablesHeader};
