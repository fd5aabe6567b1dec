//! Emit configuration.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use uguid::Guid;

use crate::error::{Error, Result};
use crate::tables::{MAX_TABLES, TableId};

/// Runtime version string written into the metadata root by default.
pub const DEFAULT_RUNTIME_VERSION: &str = "v4.0.30319";

/// Options controlling a metadata emit.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Version string of the metadata root header.
    pub runtime_version: String,
    /// Skip method bodies: no IL stream and every method RVA is 0.
    pub metadata_only: bool,
    /// Also produce Portable PDB debug metadata.
    pub emit_debug_metadata: bool,
    /// Write an edit-and-continue delta instead of a full image.
    pub delta: Option<DeltaOptions>,
    /// Major and minor version of the tables stream.
    pub format_version: (u8, u8),
    /// Cooperative cancellation checked while indexing.
    pub cancellation: CancellationFlag,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            runtime_version: DEFAULT_RUNTIME_VERSION.to_string(),
            metadata_only: false,
            emit_debug_metadata: false,
            delta: None,
            format_version: (2, 0),
            cancellation: CancellationFlag::default(),
        }
    }
}

impl WriterOptions {
    /// Create options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the runtime version string.
    #[must_use]
    pub fn with_runtime_version(mut self, version: impl Into<String>) -> Self {
        self.runtime_version = version.into();
        self
    }

    /// Skip method bodies.
    #[must_use]
    pub fn with_metadata_only(mut self, metadata_only: bool) -> Self {
        self.metadata_only = metadata_only;
        self
    }

    /// Produce Portable PDB debug metadata.
    #[must_use]
    pub fn with_debug_metadata(mut self, emit: bool) -> Self {
        self.emit_debug_metadata = emit;
        self
    }

    /// Emit an edit-and-continue delta.
    #[must_use]
    pub fn with_delta(mut self, delta: DeltaOptions) -> Self {
        self.delta = Some(delta);
        self
    }

    /// Set the cancellation flag.
    #[must_use]
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = flag;
        self
    }

    /// Check if a minimal delta (`#-` and `#JTD`, wide indices) is requested.
    #[must_use]
    pub fn is_minimal_delta(&self) -> bool {
        self.delta.as_ref().is_some_and(|d| d.minimal)
    }
}

/// State carried over from the previous generation of an edit-and-continue session.
#[derive(Debug, Clone)]
pub struct DeltaOptions {
    /// Generation number written into the Module row.
    pub generation: u16,
    /// Size of the previous #Strings heaps.
    pub string_heap_start: u32,
    /// Size of the previous #US heaps.
    pub user_string_heap_start: u32,
    /// Size of the previous #Blob heaps.
    pub blob_heap_start: u32,
    /// Size of the previous #GUID heaps.
    pub guid_heap_start: u32,
    /// Row counts of the previous generation, indexed by table id.
    pub previous_row_counts: [u32; MAX_TABLES],
    /// Write the uncompressed `#-` stream with the `#JTD` marker stream.
    pub minimal: bool,
    /// Id of this generation.
    pub enc_id: Guid,
    /// Id of the generation this delta applies to.
    pub enc_base_id: Guid,
    /// MVID of the baseline, used when the module does not carry one.
    pub base_mvid: Guid,
}

impl Default for DeltaOptions {
    fn default() -> Self {
        Self {
            generation: 0,
            string_heap_start: 0,
            user_string_heap_start: 0,
            blob_heap_start: 0,
            guid_heap_start: 0,
            previous_row_counts: [0; MAX_TABLES],
            minimal: false,
            enc_id: Guid::ZERO,
            enc_base_id: Guid::ZERO,
            base_mvid: Guid::ZERO,
        }
    }
}

impl DeltaOptions {
    /// Number of rows of `table` that precede this generation's rows.
    ///
    /// Every generation has exactly one Module row and it is always row 1, so the Module
    /// table is never biased.
    #[must_use]
    pub fn previous_rows(&self, table: TableId) -> u32 {
        match table {
            TableId::Module => 0,
            _ => self.previous_row_counts[table as usize],
        }
    }

    /// [`Self::previous_rows`] for every table, indexed by table id.
    #[must_use]
    pub fn row_bases(&self) -> [u32; MAX_TABLES] {
        let mut bases = self.previous_row_counts;
        bases[TableId::Module as usize] = 0;
        bases
    }

    /// The MVID a delta is written with: the module's own, or the baseline's.
    pub fn mvid(&self, module_mvid: Option<Guid>) -> Result<Guid> {
        match module_mvid {
            Some(mvid) => Ok(mvid),
            None if self.base_mvid != Guid::ZERO => Ok(self.base_mvid),
            None => Err(Error::MissingBaseMvid),
        }
    }
}

/// Shared flag polled between units of work; once set, emit fails with [`Error::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Create an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Check if cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Return [`Error::Cancelled`] if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}
