//! Level-ordered taxonomy resolution.
//!
//! Records of one file may reference parents in the same file, in any
//! order. Levels are persisted strictly in ascending order so a parent
//! always has an id before any of its children is attempted; levels are
//! never processed concurrently.
//!
//! A parent must sit at a strictly smaller level than its child. When the
//! file itself carries the parent, the level in the file is the one checked,
//! not the level currently stored, so moving a node deeper cannot leave a
//! child pointing at a same-level parent or close a cycle. A parent that
//! cannot be resolved when its child's level is processed is reported once
//! for that row and the row is not retried.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use taxon_core::{
    EntityStore, ImportReport, Result, TaxonomyRecord, Taxonomy, TaxonomyNode,
    UpsertTaxonomyNode,
};

use crate::batcher::UpsertBatcher;
use crate::config::ImportConfig;
use crate::keys::collapse_by_key;
use crate::progress::ImportProgress;
use crate::validate::row_error;

/// Id and level of a persisted node, indexed by code.
type CodeMap = HashMap<String, (Uuid, u8)>;

/// Level each code is given by the file being imported.
type InputLevels = HashMap<String, u8>;

/// Resolves `parent_code` references and persists taxonomy nodes level by
/// level.
pub struct HierarchyResolver<'a> {
    store: &'a dyn EntityStore<Taxonomy>,
    config: &'a ImportConfig,
    progress: &'a dyn ImportProgress,
}

impl<'a> HierarchyResolver<'a> {
    pub fn new(
        store: &'a dyn EntityStore<Taxonomy>,
        config: &'a ImportConfig,
        progress: &'a dyn ImportProgress,
    ) -> Self {
        Self {
            store,
            config,
            progress,
        }
    }

    /// Persist validated `(line, record)` pairs.
    ///
    /// Returns `Err` only when the initial code lookup fails; everything
    /// after that is reported through the returned [`ImportReport`].
    pub async fn import(&self, records: Vec<(usize, TaxonomyRecord)>) -> Result<ImportReport> {
        let start = Instant::now();
        let records = collapse_by_key("taxonomy", records, |r| r.code.clone());
        let mut report = ImportReport::new();
        let input_levels: InputLevels = records
            .iter()
            .map(|(_, r)| (r.code.clone(), r.level))
            .collect();

        // Group by level, ascending
        let mut levels: BTreeMap<u8, Vec<(usize, TaxonomyRecord)>> = BTreeMap::new();
        for (line, record) in records {
            levels.entry(record.level).or_default().push((line, record));
        }

        info!(
            subsystem = "import",
            component = "hierarchy",
            entity = "taxonomy",
            row_count = levels.values().map(Vec::len).sum::<usize>(),
            level_count = levels.len(),
            "Starting taxonomy import"
        );

        // Pre-seed with every code mentioned anywhere in the input
        let mentioned: BTreeSet<String> = levels
            .values()
            .flatten()
            .flat_map(|(_, r)| std::iter::once(r.code.clone()).chain(r.parent_code.clone()))
            .collect();
        let mut codes = CodeMap::new();
        let existing = self
            .store
            .select_by_keys(&mentioned.into_iter().collect::<Vec<_>>())
            .await?;
        remember(&mut codes, existing);
        debug!(
            subsystem = "import",
            component = "hierarchy",
            known_codes = codes.len(),
            "Seeded code map from store"
        );

        let batcher = UpsertBatcher::<Taxonomy>::new(self.store, self.config, self.progress);

        for (level, rows) in levels {
            self.progress.level_started(level, rows.len());
            let mut level_report = ImportReport::new();

            self.refresh_parents(level, &rows, &mut codes, &mut level_report)
                .await;

            let mut batch: Vec<UpsertTaxonomyNode> = Vec::with_capacity(rows.len());
            for (line, record) in rows {
                match resolve_parent(&record, &codes, &input_levels) {
                    Ok(parent_id) => batch.push(record.into_upsert(parent_id)),
                    Err(message) => {
                        warn!(
                            subsystem = "import",
                            component = "hierarchy",
                            level,
                            line,
                            code = %record.code,
                            error = %message,
                            "Parent unresolved"
                        );
                        level_report.push_error(row_error(line, message));
                    }
                }
            }

            if !batch.is_empty() {
                let outcome = batcher.run(batch, Some(level)).await;
                remember(&mut codes, outcome.stored);
                level_report.absorb(outcome.report);
            }

            info!(
                subsystem = "import",
                component = "hierarchy",
                level,
                success_count = level_report.success_count,
                error_count = level_report.errors.len(),
                "Level complete"
            );
            self.progress.level_finished(level, &level_report);
            report.absorb(level_report);
        }

        info!(
            subsystem = "import",
            component = "hierarchy",
            entity = "taxonomy",
            success_count = report.success_count,
            error_count = report.errors.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Taxonomy import finished"
        );
        Ok(report)
    }

    /// Look up parents of this level that are still unknown. Covers parents
    /// written by another process since the initial lookup.
    async fn refresh_parents(
        &self,
        level: u8,
        rows: &[(usize, TaxonomyRecord)],
        codes: &mut CodeMap,
        report: &mut ImportReport,
    ) {
        let missing: Vec<String> = rows
            .iter()
            .filter_map(|(_, r)| r.parent_code.as_ref())
            .filter(|code| !codes.contains_key(*code))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if missing.is_empty() {
            return;
        }

        debug!(
            subsystem = "import",
            component = "hierarchy",
            level,
            missing = missing.len(),
            "Re-querying unresolved parents"
        );
        match self.store.select_by_keys(&missing).await {
            Ok(found) => remember(codes, found),
            Err(e) => {
                warn!(
                    subsystem = "import",
                    component = "hierarchy",
                    level,
                    error = %e,
                    "Parent lookup failed"
                );
                report.push_error(format!("level {}: parent lookup failed: {}", level, e));
            }
        }
    }
}

fn remember(codes: &mut CodeMap, nodes: Vec<TaxonomyNode>) {
    for node in nodes {
        codes.insert(node.record.code, (node.id, node.record.level));
    }
}

/// `Ok(None)` for roots, `Ok(Some(id))` for a resolved parent.
///
/// A parent listed in the same file is judged by its level in the file; its
/// stored level must already match, otherwise its own row failed this run.
fn resolve_parent(
    record: &TaxonomyRecord,
    codes: &CodeMap,
    input_levels: &InputLevels,
) -> std::result::Result<Option<Uuid>, String> {
    let Some(parent_code) = record.parent_code.as_ref() else {
        return Ok(None);
    };
    if let Some(&input_level) = input_levels.get(parent_code) {
        if input_level >= record.level {
            return Err(format!(
                "parent '{}' is at level {} in this file, must be shallower than level {} of code '{}'",
                parent_code, input_level, record.level, record.code
            ));
        }
    }
    let Some(&(id, stored_level)) = codes.get(parent_code) else {
        return Err(format!(
            "parent '{}' not found for code '{}' (level {})",
            parent_code, record.code, record.level
        ));
    };
    match input_levels.get(parent_code) {
        Some(&input_level) if input_level != stored_level => Err(format!(
            "parent '{}' was not saved at level {}, code '{}' skipped",
            parent_code, input_level, record.code
        )),
        _ if stored_level >= record.level => Err(format!(
            "parent '{}' is at level {}, must be shallower than level {} of code '{}'",
            parent_code, stored_level, record.level, record.code
        )),
        _ => Ok(Some(id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use taxon_core::TaxonomyStatus;
    use taxon_db::MemoryStore;

    fn record(code: &str, level: u8, parent: Option<&str>) -> TaxonomyRecord {
        TaxonomyRecord {
            code: code.to_string(),
            name: code.to_uppercase(),
            description: None,
            parent_code: parent.map(str::to_string),
            level,
            icon: None,
            color: None,
            status: TaxonomyStatus::Approved,
            synonyms: vec![],
            keywords: vec![],
        }
    }

    fn lines(records: Vec<TaxonomyRecord>) -> Vec<(usize, TaxonomyRecord)> {
        records
            .into_iter()
            .enumerate()
            .map(|(i, r)| (i + 2, r))
            .collect()
    }

    async fn node(store: &MemoryStore, code: &str) -> TaxonomyNode {
        EntityStore::<Taxonomy>::select_by_keys(store, &[code.to_string()])
            .await
            .unwrap()
            .pop()
            .unwrap()
    }

    #[tokio::test]
    async fn test_parent_and_child_in_same_batch() {
        let store = MemoryStore::new();
        let config = ImportConfig::default();
        let resolver = HierarchyResolver::new(&store, &config, &NoProgress);

        let report = resolver
            .import(lines(vec![
                record("pwa", 1, None),
                record("pwa.world", 2, Some("pwa")),
            ]))
            .await
            .unwrap();

        assert_eq!(report.success_count, 2);
        assert!(report.is_clean(), "{:?}", report.errors);
        let root = node(&store, "pwa").await;
        let child = node(&store, "pwa.world").await;
        assert_eq!(child.parent_id, Some(root.id));
        assert_eq!(root.parent_id, None);
    }

    #[tokio::test]
    async fn test_child_listed_before_parent() {
        let store = MemoryStore::new();
        let config = ImportConfig::default();
        let resolver = HierarchyResolver::new(&store, &config, &NoProgress);

        let report = resolver
            .import(lines(vec![
                record("a.b.c", 3, Some("a.b")),
                record("a.b", 2, Some("a")),
                record("a", 1, None),
            ]))
            .await
            .unwrap();

        assert_eq!(report.success_count, 3);
        let b = node(&store, "a.b").await;
        let c = node(&store, "a.b.c").await;
        assert_eq!(c.parent_id, Some(b.id));
        assert_eq!(store.upsert_calls("taxonomy"), 3);
    }

    #[tokio::test]
    async fn test_unresolved_parent_reported_once() {
        let store = MemoryStore::new();
        let config = ImportConfig::default();
        let resolver = HierarchyResolver::new(&store, &config, &NoProgress);

        let report = resolver
            .import(lines(vec![
                record("root", 1, None),
                record("root.a", 2, Some("root")),
                record("ghost.child", 2, Some("ghost")),
                record("ghost.child.leaf", 3, Some("ghost.child")),
            ]))
            .await
            .unwrap();

        assert_eq!(report.success_count, 2);
        let ghost_errors: Vec<_> = report
            .errors
            .iter()
            .filter(|e| e.contains("'ghost'"))
            .collect();
        assert_eq!(ghost_errors.len(), 1);
        assert!(ghost_errors[0].starts_with("row 4:"));
        // The grandchild fails on its own missing parent
        assert_eq!(report.errors.len(), 2);
    }

    #[tokio::test]
    async fn test_parent_from_previous_import() {
        let store = MemoryStore::new();
        let config = ImportConfig::default();
        let resolver = HierarchyResolver::new(&store, &config, &NoProgress);

        resolver
            .import(lines(vec![record("saude", 1, None)]))
            .await
            .unwrap();
        let report = resolver
            .import(lines(vec![record("saude.cardio", 2, Some("saude"))]))
            .await
            .unwrap();

        assert!(report.is_clean());
        let parent = node(&store, "saude").await;
        assert_eq!(node(&store, "saude.cardio").await.parent_id, Some(parent.id));
    }

    #[tokio::test]
    async fn test_same_level_parent_rejected() {
        let store = MemoryStore::new();
        let config = ImportConfig::default();
        let resolver = HierarchyResolver::new(&store, &config, &NoProgress);

        resolver
            .import(lines(vec![
                record("a", 1, None),
                record("a.x", 2, Some("a")),
            ]))
            .await
            .unwrap();
        let report = resolver
            .import(lines(vec![record("a.y", 2, Some("a.x"))]))
            .await
            .unwrap();

        assert_eq!(report.success_count, 0);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("must be shallower"));
    }

    #[tokio::test]
    async fn test_moved_parent_checked_at_its_new_level() {
        let store = MemoryStore::new();
        let config = ImportConfig::default();
        let resolver = HierarchyResolver::new(&store, &config, &NoProgress);
        resolver
            .import(lines(vec![record("r", 1, None), record("a", 1, None)]))
            .await
            .unwrap();

        // `a` moves under `r`; `a.x` still names it from the same level
        let report = resolver
            .import(lines(vec![
                record("a", 2, Some("r")),
                record("a.x", 2, Some("a")),
            ]))
            .await
            .unwrap();

        assert_eq!(report.success_count, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("row 3:"), "{}", report.errors[0]);
        assert!(report.errors[0].contains("level 2 in this file"));

        let a = node(&store, "a").await;
        assert_eq!(a.level, 2);
        assert_eq!(a.parent_id, Some(node(&store, "r").await.id));
        assert!(store.rows::<Taxonomy>().iter().all(|n| n.code != "a.x"));
    }

    #[tokio::test]
    async fn test_level_swap_cannot_close_a_cycle() {
        let store = MemoryStore::new();
        let config = ImportConfig::default();
        let resolver = HierarchyResolver::new(&store, &config, &NoProgress);
        resolver
            .import(lines(vec![record("p", 1, None), record("y", 2, Some("p"))]))
            .await
            .unwrap();

        let report = resolver
            .import(lines(vec![
                record("x", 3, Some("y")),
                record("y", 4, Some("x")),
            ]))
            .await
            .unwrap();

        assert_eq!(report.success_count, 0);
        let x_errors: Vec<_> = report
            .errors
            .iter()
            .filter(|e| e.starts_with("row 2:"))
            .collect();
        assert_eq!(x_errors.len(), 1);
        assert!(x_errors[0].contains("parent 'y' is at level 4 in this file"));

        // `y` is untouched and no stored link points at a parent that is not shallower
        let y = node(&store, "y").await;
        assert_eq!(y.level, 2);
        assert_eq!(y.parent_id, Some(node(&store, "p").await.id));
        assert_no_inverted_links(&store);
    }

    #[tokio::test]
    async fn test_failed_parent_move_skips_children() {
        let config = ImportConfig::default();
        let store = MemoryStore::new();
        HierarchyResolver::new(&store, &config, &NoProgress)
            .import(lines(vec![record("root", 1, None), record("mover", 1, None)]))
            .await
            .unwrap();

        let store = store.fail_upserts_containing("mover");
        let report = HierarchyResolver::new(&store, &config, &NoProgress)
            .import(lines(vec![
                record("mover", 2, Some("root")),
                record("mover.child", 3, Some("mover")),
            ]))
            .await
            .unwrap();

        assert_eq!(report.success_count, 0);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors[0].starts_with("level 2, chunk 1 of 1"));
        assert!(report.errors[1].contains("was not saved at level 2"));
        assert_eq!(node(&store, "mover").await.level, 1);
        assert_no_inverted_links(&store);
    }

    fn assert_no_inverted_links(store: &MemoryStore) {
        let nodes = store.rows::<Taxonomy>();
        for child in &nodes {
            if let Some(parent_id) = child.parent_id {
                let parent = nodes.iter().find(|n| n.id == parent_id).unwrap();
                assert!(
                    parent.level < child.level,
                    "{} (level {}) under {} (level {})",
                    child.code,
                    child.level,
                    parent.code,
                    parent.level
                );
            }
        }
    }

    #[tokio::test]
    async fn test_reimport_is_idempotent() {
        let store = MemoryStore::new();
        let config = ImportConfig::default().with_chunk_size(2);
        let resolver = HierarchyResolver::new(&store, &config, &NoProgress);
        let batch = || {
            lines(vec![
                record("a", 1, None),
                record("a.1", 2, Some("a")),
                record("a.2", 2, Some("a")),
                record("a.1.x", 3, Some("a.1")),
            ])
        };

        resolver.import(batch()).await.unwrap();
        let ids: Vec<Uuid> = store.rows::<Taxonomy>().iter().map(|n| n.id).collect();
        let report = resolver.import(batch()).await.unwrap();

        assert_eq!(report.success_count, 4);
        assert_eq!(store.count::<Taxonomy>(), 4);
        let again: Vec<Uuid> = store.rows::<Taxonomy>().iter().map(|n| n.id).collect();
        assert_eq!(ids, again);
    }

    #[tokio::test]
    async fn test_failed_parent_chunk_reports_children() {
        let store = MemoryStore::new().fail_upserts_containing("broken");
        let config = ImportConfig::default();
        let resolver = HierarchyResolver::new(&store, &config, &NoProgress);

        let report = resolver
            .import(lines(vec![
                record("broken", 1, None),
                record("broken.child", 2, Some("broken")),
            ]))
            .await
            .unwrap();

        assert_eq!(report.success_count, 0);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors[0].starts_with("level 1, chunk 1 of 1"));
        assert!(report.errors[1].contains("parent 'broken' not found"));
    }

    #[tokio::test]
    async fn test_duplicate_codes_last_wins() {
        let store = MemoryStore::new();
        let config = ImportConfig::default();
        let resolver = HierarchyResolver::new(&store, &config, &NoProgress);
        let mut second = record("dup", 1, None);
        second.name = "Second".to_string();

        let report = resolver
            .import(vec![(2, record("dup", 1, None)), (3, second)])
            .await
            .unwrap();

        assert_eq!(report.success_count, 1);
        assert!(report.is_clean());
        assert_eq!(node(&store, "dup").await.name, "Second");
    }
}
