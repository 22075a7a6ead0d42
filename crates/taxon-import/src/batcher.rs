//! Chunked idempotent upserts.
//!
//! Records are split into fixed-size chunks and each chunk is one `upsert`
//! call keyed on the entity's natural key. A failed chunk is reported with
//! its level, index and key range; chunks that succeeded stay committed.
//! Chunks of one batch may run concurrently, bounded by the configured
//! worker count, and their results are folded in a single place.

use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info};

use taxon_core::{Entity, EntityStore, ImportReport, Stored};

use crate::config::ImportConfig;
use crate::progress::{ChunkProgress, ImportProgress};

/// Persisted rows and the report of one batch.
#[derive(Debug, Clone)]
pub struct BatchOutcome<T> {
    /// Rows the store returned, in chunk order.
    pub stored: Vec<Stored<T>>,
    pub report: ImportReport,
}

struct ChunkResult<T> {
    index: usize,
    start: usize,
    len: usize,
    first_key: String,
    last_key: String,
    result: taxon_core::Result<Vec<Stored<T>>>,
}

/// Issues chunked upserts against one entity store.
pub struct UpsertBatcher<'a, E: Entity> {
    store: &'a dyn EntityStore<E>,
    chunk_size: usize,
    concurrency: usize,
    progress: &'a dyn ImportProgress,
}

impl<'a, E: Entity> UpsertBatcher<'a, E> {
    pub fn new(
        store: &'a dyn EntityStore<E>,
        config: &ImportConfig,
        progress: &'a dyn ImportProgress,
    ) -> Self {
        Self {
            store,
            chunk_size: config.chunk_size.max(1),
            concurrency: config.concurrency.max(1),
            progress,
        }
    }

    /// Upsert `rows`. `level` is carried into error context and progress
    /// events when the batch belongs to a taxonomy level.
    pub async fn run(&self, rows: Vec<E::Upsert>, level: Option<u8>) -> BatchOutcome<E::Upsert> {
        let start = Instant::now();
        let total = rows.len();
        let chunks = split_chunks(rows, self.chunk_size);
        let chunk_count = chunks.len();

        debug!(
            subsystem = "import",
            component = "batcher",
            entity = E::NAME,
            level,
            row_count = total,
            chunk_count,
            concurrency = self.concurrency,
            "Upserting batch"
        );

        let store = self.store;
        let chunk_size = self.chunk_size;
        let mut results: Vec<ChunkResult<E::Upsert>> =
            stream::iter(chunks.into_iter().enumerate().map(move |(index, chunk)| async move {
                let first_key = chunk.first().map(E::natural_key).unwrap_or_default();
                let last_key = chunk.last().map(E::natural_key).unwrap_or_default();
                let len = chunk.len();
                let result = store.upsert(chunk).await;
                ChunkResult {
                    index,
                    start: index * chunk_size,
                    len,
                    first_key,
                    last_key,
                    result,
                }
            }))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        // Single accumulation point
        results.sort_by_key(|r| r.index);
        let mut outcome = BatchOutcome {
            stored: Vec::with_capacity(total),
            report: ImportReport::new(),
        };
        for chunk in results {
            let mut progress = ChunkProgress {
                entity: E::NAME,
                level,
                chunk_index: chunk.index,
                chunk_count,
                rows: chunk.len,
                error: None,
            };
            match chunk.result {
                Ok(stored) => {
                    outcome.report.success_count += stored.len();
                    outcome.stored.extend(stored);
                }
                Err(ref e) => {
                    let context = chunk_context::<E>(level, &chunk, chunk_count);
                    error!(
                        subsystem = "import",
                        component = "batcher",
                        entity = E::NAME,
                        level,
                        chunk_index = chunk.index,
                        chunk_count,
                        row_count = chunk.len,
                        error = %e,
                        "Chunk rejected by store"
                    );
                    outcome.report.push_error(format!("{}: {}", context, e));
                    progress.error = Some(e.to_string());
                }
            }
            self.progress.chunk_finished(&progress);
        }

        info!(
            subsystem = "import",
            component = "batcher",
            entity = E::NAME,
            level,
            chunk_count,
            success_count = outcome.report.success_count,
            error_count = outcome.report.errors.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Batch upserted"
        );
        outcome
    }
}

fn split_chunks<T>(rows: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let mut chunks = Vec::with_capacity(rows.len().div_ceil(size));
    let mut iter = rows.into_iter().peekable();
    while iter.peek().is_some() {
        chunks.push(iter.by_ref().take(size).collect());
    }
    chunks
}

fn chunk_context<E: Entity>(
    level: Option<u8>,
    chunk: &ChunkResult<E::Upsert>,
    chunk_count: usize,
) -> String {
    let scope = match level {
        Some(level) => format!("level {}", level),
        None => E::NAME.to_string(),
    };
    format!(
        "{}, chunk {} of {} (items {}-{}, {} '{}' to '{}')",
        scope,
        chunk.index + 1,
        chunk_count,
        chunk.start + 1,
        chunk.start + chunk.len,
        E::CONFLICT_KEY,
        chunk.first_key,
        chunk.last_key
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use taxon_core::{Lexicon, UpsertLexiconTerm};
    use taxon_db::MemoryStore;

    fn terms(n: usize) -> Vec<UpsertLexiconTerm> {
        (0..n)
            .map(|i| UpsertLexiconTerm::new(format!("term{:03}", i), "definition"))
            .collect()
    }

    #[test]
    fn test_split_chunks() {
        let chunks = split_chunks((0..7).collect::<Vec<_>>(), 3);
        assert_eq!(chunks, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
        assert!(split_chunks(Vec::<u8>::new(), 3).is_empty());
    }

    #[tokio::test]
    async fn test_batches_by_chunk_size() {
        let store = MemoryStore::new();
        let config = ImportConfig::default().with_chunk_size(4);
        let batcher = UpsertBatcher::<Lexicon>::new(&store, &config, &NoProgress);

        let outcome = batcher.run(terms(10), None).await;
        assert_eq!(outcome.report.success_count, 10);
        assert!(outcome.report.is_clean());
        assert_eq!(outcome.stored.len(), 10);
        assert_eq!(store.upsert_calls("lexicon_term"), 3);
    }

    #[tokio::test]
    async fn test_failed_chunk_is_isolated() {
        let store = MemoryStore::new().fail_upserts_containing("term005");
        let config = ImportConfig::default().with_chunk_size(4).with_concurrency(2);
        let batcher = UpsertBatcher::<Lexicon>::new(&store, &config, &NoProgress);

        let outcome = batcher.run(terms(10), Some(3)).await;
        assert_eq!(outcome.report.success_count, 6);
        assert_eq!(outcome.report.errors.len(), 1);
        let error = &outcome.report.errors[0];
        assert!(error.starts_with("level 3, chunk 2 of 3 (items 5-8"), "{}", error);
        assert!(error.contains("'term004' to 'term007'"), "{}", error);
        assert_eq!(store.count::<Lexicon>(), 6);
    }

    #[tokio::test]
    async fn test_stored_rows_follow_chunk_order() {
        let store = MemoryStore::new();
        let config = ImportConfig::default().with_chunk_size(2).with_concurrency(4);
        let batcher = UpsertBatcher::<Lexicon>::new(&store, &config, &NoProgress);

        let outcome = batcher.run(terms(6), None).await;
        let keys: Vec<_> = outcome.stored.iter().map(|s| s.term.clone()).collect();
        assert_eq!(
            keys,
            vec!["term000", "term001", "term002", "term003", "term004", "term005"]
        );
    }
}
