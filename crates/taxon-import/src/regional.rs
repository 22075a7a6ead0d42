//! Regional pronunciation merge.
//!
//! Incoming `(region, term, pronunciation)` rows are merged into each
//! region's existing map: terms not mentioned are kept, mentioned terms take
//! the incoming pronunciation. Regions are never created here.
//!
//! Only the incoming pairs are sent; the store merges them into the map it
//! holds, so pairs written by another import after the lookup survive.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;

use tracing::{debug, info, warn};

use taxon_core::{
    EntityStore, ImportReport, RegionalPronunciationRecord, Regions, Result, UpsertRegion,
};

use crate::batcher::UpsertBatcher;
use crate::config::ImportConfig;
use crate::keys::collapse_by_key;
use crate::progress::ImportProgress;
use crate::validate::row_error;

/// Merge validated pronunciation rows into their regions.
///
/// `success_count` counts merged pairs, not regions.
pub async fn import_regional(
    store: &dyn EntityStore<Regions>,
    records: Vec<(usize, RegionalPronunciationRecord)>,
    config: &ImportConfig,
    progress: &dyn ImportProgress,
) -> Result<ImportReport> {
    let start = Instant::now();
    let records = collapse_by_key("region", records, |r| {
        format!("{}|{}", r.region_code, r.term_key())
    });

    let mut by_region: BTreeMap<String, Vec<(usize, RegionalPronunciationRecord)>> =
        BTreeMap::new();
    for (line, record) in records {
        by_region
            .entry(record.region_code.clone())
            .or_default()
            .push((line, record));
    }

    let codes: Vec<String> = by_region.keys().cloned().collect();
    let existing: HashSet<String> = store
        .select_by_keys(&codes)
        .await?
        .into_iter()
        .map(|r| r.record.region_code)
        .collect();
    debug!(
        subsystem = "import",
        component = "regional",
        requested = codes.len(),
        found = existing.len(),
        "Looked up regions"
    );

    let mut report = ImportReport::new();
    let mut merged_pairs: HashMap<String, usize> = HashMap::new();
    let mut batch = Vec::with_capacity(existing.len());

    for (region_code, rows) in by_region {
        if !existing.contains(&region_code) {
            for (line, record) in rows {
                warn!(
                    subsystem = "import",
                    component = "regional",
                    line,
                    region_code = %region_code,
                    term = %record.term,
                    "Unknown region"
                );
                report.push_error(row_error(line, format!("region '{}' not found", region_code)));
            }
            continue;
        }

        let mut region = UpsertRegion {
            region_code: region_code.clone(),
            name: None,
            pronunciations: BTreeMap::new(),
        };
        let merged = region.merge_pronunciations(
            rows.into_iter()
                .map(|(_, r)| (r.term_key(), r.pronunciation)),
        );
        merged_pairs.insert(region_code, merged);
        batch.push(region);
    }

    if !batch.is_empty() {
        let outcome = UpsertBatcher::<Regions>::new(store, config, progress)
            .run(batch, None)
            .await;
        report.success_count += outcome
            .stored
            .iter()
            .filter_map(|r| merged_pairs.get(&r.region_code))
            .sum::<usize>();
        report.errors.extend(outcome.report.errors);
    }

    info!(
        subsystem = "import",
        component = "regional",
        entity = "region",
        success_count = report.success_count,
        error_count = report.errors.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Regional pronunciation merge finished"
    );
    Ok(report)
}
