//! Lexicon term import.

use std::time::Instant;

use tracing::info;

use taxon_core::{EntityStore, ImportReport, Lexicon, UpsertLexiconTerm};

use crate::batcher::UpsertBatcher;
use crate::config::ImportConfig;
use crate::keys::collapse_by_key;
use crate::progress::ImportProgress;

/// Upsert validated lexicon terms by normalized term.
pub async fn import_lexicon(
    store: &dyn EntityStore<Lexicon>,
    records: Vec<(usize, UpsertLexiconTerm)>,
    config: &ImportConfig,
    progress: &dyn ImportProgress,
) -> ImportReport {
    let start = Instant::now();
    let records = collapse_by_key("lexicon_term", records, |t| t.term_normalized.clone());
    let terms: Vec<UpsertLexiconTerm> = records.into_iter().map(|(_, t)| t).collect();

    let outcome = UpsertBatcher::<Lexicon>::new(store, config, progress)
        .run(terms, None)
        .await;

    info!(
        subsystem = "import",
        component = "lexicon",
        entity = "lexicon_term",
        success_count = outcome.report.success_count,
        error_count = outcome.report.errors.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Lexicon import finished"
    );
    outcome.report
}
