//! Import progress observation.

use taxon_core::ImportReport;

/// Position of a chunk within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkProgress {
    /// Entity table name.
    pub entity: &'static str,
    /// Taxonomy level, when the batch belongs to one.
    pub level: Option<u8>,
    pub chunk_index: usize,
    pub chunk_count: usize,
    pub rows: usize,
    /// `None` on success, the store's message otherwise.
    pub error: Option<String>,
}

/// Observer notified as an import advances.
///
/// Every method defaults to a no-op so observers only implement what they
/// display.
pub trait ImportProgress: Send + Sync {
    /// A taxonomy level is about to be persisted.
    fn level_started(&self, _level: u8, _rows: usize) {}

    /// A chunk finished, successfully or not.
    fn chunk_finished(&self, _chunk: &ChunkProgress) {}

    /// A taxonomy level finished.
    fn level_finished(&self, _level: u8, _report: &ImportReport) {}

    /// The whole import finished.
    fn import_finished(&self, _entity: &'static str, _report: &ImportReport) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ImportProgress for NoProgress {}
