//! Metadata tables: identifiers, index widths, rows and row storage.

mod coded_index;
mod context;
mod header;
mod maps;
mod rows;
mod store;
mod table_id;

pub use coded_index::{CodedIndex, CodedIndexKind};
pub use context::{
    HEAP_BLOB_WIDE, HEAP_DELETED_MARKS, HEAP_ENC_DELTAS, HEAP_GUID_WIDE, HEAP_STRINGS_WIDE,
    HeapSizes, MAX_ROW_ID, RowWriter, TableContext,
};
pub use header::TablesHeader;
pub use maps::{contiguous_runs, event_map, property_map};
pub use rows::*;
pub use store::{DebugTables, Table, TableSet, TypeSystemTables};
pub use table_id::{Column, MAX_TABLES, SORTED_DEBUG_TABLES, SORTED_TYPE_SYSTEM_TABLES, TableId};
