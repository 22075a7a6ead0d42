//! In-memory store for dry runs and deterministic testing.
//!
//! Implements every store trait with the same natural-key semantics as the
//! PostgreSQL repositories. Upserts can be made to fail for chosen keys, and
//! every call is logged so tests can assert what reached the store.
//!
//! ## Usage
//!
//! ```rust
//! use taxon_db::MemoryStore;
//!
//! let store = MemoryStore::new().fail_upserts_containing("broken.code");
//! assert_eq!(store.upsert_calls("taxonomy"), 0);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use taxon_core::{
    Concepts, Entity, EntityStore, Error, Lexicon, NewTagMergeRule, Regions, Relations, Result,
    Stored, Tag, TagAuditEntry, TagMergeRule, TagStore, Taxonomy,
};

/// A store call recorded by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    /// Entity name, or "tag" for tag-graph operations.
    pub entity: &'static str,
    pub operation: &'static str,
    /// Number of keys, rows or ids passed in.
    pub size: usize,
}

/// Rows of one entity kind, in insertion order, indexed by natural key.
#[derive(Debug)]
pub struct Table<T> {
    rows: Vec<Stored<T>>,
    index: HashMap<String, usize>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }
}

/// Backing state of a [`MemoryStore`].
#[doc(hidden)]
#[derive(Default)]
pub struct MemoryState {
    taxonomy: Table<<Taxonomy as Entity>::Upsert>,
    lexicon: Table<<Lexicon as Entity>::Upsert>,
    regions: Table<<Regions as Entity>::Upsert>,
    concepts: Table<<Concepts as Entity>::Upsert>,
    relations: Table<<Relations as Entity>::Upsert>,
    tags: Vec<Tag>,
    document_tags: Vec<(Uuid, Uuid)>,
    merge_rules: Vec<TagMergeRule>,
    audit: Vec<TagAuditEntry>,
    calls: Vec<StoreCall>,
    failing_keys: HashSet<String>,
}

/// Entity kinds the in-memory store can hold.
#[doc(hidden)]
pub trait MemoryBacked: Entity {
    fn table(state: &mut MemoryState) -> &mut Table<Self::Upsert>;

    /// Apply an upsert to a row with the same natural key.
    fn update(existing: &mut Self::Upsert, incoming: Self::Upsert) {
        *existing = incoming;
    }
}

macro_rules! memory_backed {
    ($entity:ty, $field:ident) => {
        impl MemoryBacked for $entity {
            fn table(state: &mut MemoryState) -> &mut Table<Self::Upsert> {
                &mut state.$field
            }
        }
    };
}

memory_backed!(Taxonomy, taxonomy);
memory_backed!(Lexicon, lexicon);
memory_backed!(Concepts, concepts);
memory_backed!(Relations, relations);

/// Same as the `region` upsert: pronunciation pairs are merged into the
/// stored map and a missing name keeps the stored one.
impl MemoryBacked for Regions {
    fn table(state: &mut MemoryState) -> &mut Table<Self::Upsert> {
        &mut state.regions
    }

    fn update(existing: &mut Self::Upsert, incoming: Self::Upsert) {
        if incoming.name.is_some() {
            existing.name = incoming.name;
        }
        existing.pronunciations.extend(incoming.pronunciations);
    }
}

/// Thread-safe in-memory implementation of all store traits.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make any upsert whose batch contains `key` fail as a whole.
    pub fn fail_upserts_containing(self, key: impl Into<String>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.failing_keys.insert(key.into());
        }
        self
    }

    /// Seed the tag graph.
    pub fn with_tags(self, tags: Vec<Tag>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.tags.extend(tags);
        }
        self
    }

    /// Assign `tag_id` to a document.
    pub fn tag_document(&self, document_id: Uuid, tag_id: Uuid) {
        if let Ok(mut state) = self.state.lock() {
            if !state.document_tags.contains(&(document_id, tag_id)) {
                state.document_tags.push((document_id, tag_id));
            }
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| Error::Internal("memory store lock poisoned".to_string()))
    }

    /// Every persisted row of an entity kind, in insertion order.
    pub fn rows<E: MemoryBacked>(&self) -> Vec<Stored<E::Upsert>> {
        self.lock()
            .map(|mut state| E::table(&mut state).rows.clone())
            .unwrap_or_default()
    }

    /// Number of persisted rows of an entity kind.
    pub fn count<E: MemoryBacked>(&self) -> usize {
        self.lock()
            .map(|mut state| E::table(&mut state).rows.len())
            .unwrap_or(0)
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().map(|s| s.calls.clone()).unwrap_or_default()
    }

    /// Number of `upsert` calls against an entity name.
    pub fn upsert_calls(&self, entity: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.entity == entity && c.operation == "upsert")
            .count()
    }

    /// Current tags.
    pub fn tags(&self) -> Vec<Tag> {
        self.lock().map(|s| s.tags.clone()).unwrap_or_default()
    }

    /// Documents carrying `tag_id`.
    pub fn documents_with(&self, tag_id: Uuid) -> Vec<Uuid> {
        self.lock()
            .map(|s| {
                s.document_tags
                    .iter()
                    .filter(|(_, t)| *t == tag_id)
                    .map(|(d, _)| *d)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Recorded merge rules.
    pub fn merge_rules(&self) -> Vec<TagMergeRule> {
        self.lock().map(|s| s.merge_rules.clone()).unwrap_or_default()
    }

    /// Recorded audit entries.
    pub fn audit_log(&self) -> Vec<TagAuditEntry> {
        self.lock().map(|s| s.audit.clone()).unwrap_or_default()
    }
}

fn record(state: &mut MemoryState, entity: &'static str, operation: &'static str, size: usize) {
    state.calls.push(StoreCall {
        entity,
        operation,
        size,
    });
}

#[async_trait]
impl<E: MemoryBacked> EntityStore<E> for MemoryStore {
    async fn select_by_keys(&self, keys: &[String]) -> Result<Vec<Stored<E::Upsert>>> {
        let mut state = self.lock()?;
        record(&mut state, E::NAME, "select", keys.len());
        let table = E::table(&mut state);
        let mut seen = HashSet::new();
        Ok(keys
            .iter()
            .filter(|k| seen.insert(k.as_str()))
            .filter_map(|k| table.index.get(k).map(|&i| table.rows[i].clone()))
            .collect())
    }

    async fn upsert(&self, rows: Vec<E::Upsert>) -> Result<Vec<Stored<E::Upsert>>> {
        let mut state = self.lock()?;
        record(&mut state, E::NAME, "upsert", rows.len());

        if let Some(key) = rows
            .iter()
            .map(E::natural_key)
            .find(|k| state.failing_keys.contains(k))
        {
            return Err(Error::Store(format!(
                "{} rejected batch containing '{}'",
                E::NAME,
                key
            )));
        }

        let table = E::table(&mut state);
        let now = Utc::now();
        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            let key = E::natural_key(&row);
            let persisted = match table.index.get(&key) {
                Some(&i) => {
                    let existing = &mut table.rows[i];
                    E::update(&mut existing.record, row);
                    existing.updated_at = now;
                    existing.clone()
                }
                None => {
                    let persisted = Stored {
                        id: Uuid::now_v7(),
                        record: row,
                        updated_at: now,
                    };
                    table.index.insert(key, table.rows.len());
                    table.rows.push(persisted.clone());
                    persisted
                }
            };
            stored.push(persisted);
        }
        Ok(stored)
    }

    async fn delete_by_ids(&self, ids: &[Uuid]) -> Result<u64> {
        let mut state = self.lock()?;
        record(&mut state, E::NAME, "delete", ids.len());
        let table = E::table(&mut state);
        let before = table.rows.len();
        table.rows.retain(|r| !ids.contains(&r.id));
        table.index = table
            .rows
            .iter()
            .enumerate()
            .map(|(i, r)| (E::natural_key(&r.record), i))
            .collect();
        Ok((before - table.rows.len()) as u64)
    }
}

#[async_trait]
impl TagStore for MemoryStore {
    async fn list_tags(&self) -> Result<Vec<Tag>> {
        let mut state = self.lock()?;
        record(&mut state, "tag", "list", 0);
        Ok(state.tags.clone())
    }

    async fn set_parent(&self, tag_id: Uuid, parent_tag_id: Option<Uuid>) -> Result<()> {
        let mut state = self.lock()?;
        record(&mut state, "tag", "set_parent", 1);
        let tag = state
            .tags
            .iter_mut()
            .find(|t| t.id == tag_id)
            .ok_or_else(|| Error::NotFound(format!("tag {}", tag_id)))?;
        tag.parent_tag_id = parent_tag_id;
        Ok(())
    }

    async fn reparent_children(&self, from: Uuid, to: Uuid) -> Result<u64> {
        let mut state = self.lock()?;
        record(&mut state, "tag", "reparent_children", 1);
        let mut moved = 0;
        for tag in state.tags.iter_mut() {
            if tag.parent_tag_id == Some(from) && tag.id != to {
                tag.parent_tag_id = Some(to);
                moved += 1;
            }
        }
        Ok(moved)
    }

    async fn documents_for_tag(&self, tag_id: Uuid) -> Result<Vec<Uuid>> {
        let mut state = self.lock()?;
        record(&mut state, "tag", "documents_for_tag", 1);
        let mut docs: Vec<Uuid> = state
            .document_tags
            .iter()
            .filter(|(_, t)| *t == tag_id)
            .map(|(d, _)| *d)
            .collect();
        docs.sort();
        Ok(docs)
    }

    async fn retag_documents(&self, from: Uuid, to: Uuid) -> Result<u64> {
        let mut state = self.lock()?;
        record(&mut state, "tag", "retag_documents", 1);
        let already: HashSet<Uuid> = state
            .document_tags
            .iter()
            .filter(|(_, t)| *t == to)
            .map(|(d, _)| *d)
            .collect();
        let mut touched = 0;
        state.document_tags.retain_mut(|(doc, tag)| {
            if *tag != from {
                return true;
            }
            touched += 1;
            if already.contains(doc) {
                false
            } else {
                *tag = to;
                true
            }
        });
        Ok(touched)
    }

    async fn delete_tags(&self, ids: &[Uuid]) -> Result<u64> {
        let mut state = self.lock()?;
        record(&mut state, "tag", "delete", ids.len());
        let before = state.tags.len();
        state.tags.retain(|t| !ids.contains(&t.id));
        state.document_tags.retain(|(_, t)| !ids.contains(t));
        for tag in state.tags.iter_mut() {
            if tag.parent_tag_id.is_some_and(|p| ids.contains(&p)) {
                tag.parent_tag_id = None;
            }
        }
        Ok((before - state.tags.len()) as u64)
    }

    async fn upsert_merge_rule(&self, rule: NewTagMergeRule) -> Result<TagMergeRule> {
        let mut state = self.lock()?;
        record(&mut state, "tag", "upsert_merge_rule", 1);
        let normalized = rule.source_label_normalized();
        if let Some(existing) = state
            .merge_rules
            .iter_mut()
            .find(|r| r.source_label_normalized == normalized && r.context == rule.context)
        {
            existing.source_label = rule.source_label;
            existing.canonical_tag_id = rule.canonical_tag_id;
            existing.canonical_tag_name = rule.canonical_tag_name;
            existing.created_by = rule.created_by;
            return Ok(existing.clone());
        }
        let stored = TagMergeRule {
            id: Uuid::now_v7(),
            source_label: rule.source_label,
            source_label_normalized: normalized,
            canonical_tag_id: rule.canonical_tag_id,
            canonical_tag_name: rule.canonical_tag_name,
            context: rule.context,
            created_by: rule.created_by,
            created_at: Utc::now(),
        };
        state.merge_rules.push(stored.clone());
        Ok(stored)
    }

    async fn find_merge_rules(&self, label_normalized: &str) -> Result<Vec<TagMergeRule>> {
        let mut state = self.lock()?;
        record(&mut state, "tag", "find_merge_rules", 1);
        Ok(state
            .merge_rules
            .iter()
            .filter(|r| r.source_label_normalized == label_normalized)
            .cloned()
            .collect())
    }

    async fn record_audit(&self, entries: Vec<TagAuditEntry>) -> Result<()> {
        let mut state = self.lock()?;
        record(&mut state, "tag", "record_audit", entries.len());
        state.audit.extend(entries);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxon_core::{TaxonomyStatus, UpsertLexiconTerm, UpsertRegion, UpsertTaxonomyNode};

    fn node(code: &str) -> UpsertTaxonomyNode {
        UpsertTaxonomyNode {
            code: code.to_string(),
            name: code.to_uppercase(),
            description: None,
            parent_id: None,
            level: 1,
            icon: None,
            color: None,
            status: TaxonomyStatus::Pending,
            synonyms: vec![],
            keywords: vec![],
        }
    }

    #[tokio::test]
    async fn test_upsert_keeps_id_for_existing_key() {
        let store = MemoryStore::new();
        let first = EntityStore::<Taxonomy>::upsert(&store, vec![node("pwa")])
            .await
            .unwrap();
        let mut renamed = node("pwa");
        renamed.name = "Renamed".to_string();
        let second = EntityStore::<Taxonomy>::upsert(&store, vec![renamed])
            .await
            .unwrap();

        assert_eq!(first[0].id, second[0].id);
        assert_eq!(second[0].name, "Renamed");
        assert_eq!(store.count::<Taxonomy>(), 1);
    }

    #[tokio::test]
    async fn test_region_upsert_merges_pronunciations() {
        let region = |name: Option<&str>, pairs: &[(&str, &str)]| UpsertRegion {
            region_code: "pt-BR-BA".to_string(),
            name: name.map(str::to_string),
            pronunciations: pairs
                .iter()
                .map(|(t, p)| (t.to_string(), p.to_string()))
                .collect(),
        };
        let store = MemoryStore::new();
        EntityStore::<Regions>::upsert(
            &store,
            vec![region(Some("Bahia"), &[("oxe", "ó-xi"), ("tia", "ti-a")])],
        )
        .await
        .unwrap();
        let stored = EntityStore::<Regions>::upsert(
            &store,
            vec![region(None, &[("tia", "tchi-a"), ("dia", "dji-a")])],
        )
        .await
        .unwrap();

        assert_eq!(stored[0].name.as_deref(), Some("Bahia"));
        assert_eq!(stored[0].pronunciations.len(), 3);
        assert_eq!(stored[0].pronunciations["oxe"], "ó-xi");
        assert_eq!(stored[0].pronunciations["tia"], "tchi-a");
    }

    #[tokio::test]
    async fn test_select_by_keys_skips_unknown() {
        let store = MemoryStore::new();
        EntityStore::<Taxonomy>::upsert(&store, vec![node("a"), node("b")])
            .await
            .unwrap();
        let found = EntityStore::<Taxonomy>::select_by_keys(
            &store,
            &["a".to_string(), "missing".to_string(), "a".to_string()],
        )
        .await
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].code, "a");
    }

    #[tokio::test]
    async fn test_failing_key_rejects_whole_batch() {
        let store = MemoryStore::new().fail_upserts_containing("bad");
        let result = EntityStore::<Taxonomy>::upsert(&store, vec![node("good"), node("bad")]).await;
        assert!(matches!(result, Err(Error::Store(_))));
        assert_eq!(store.count::<Taxonomy>(), 0);
        assert_eq!(store.upsert_calls("taxonomy"), 1);
    }

    #[tokio::test]
    async fn test_delete_by_ids_reindexes() {
        let store = MemoryStore::new();
        let rows = EntityStore::<Lexicon>::upsert(
            &store,
            vec![
                UpsertLexiconTerm::new("alpha", "first"),
                UpsertLexiconTerm::new("beta", "second"),
            ],
        )
        .await
        .unwrap();
        let removed = EntityStore::<Lexicon>::delete_by_ids(&store, &[rows[0].id])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        let found = EntityStore::<Lexicon>::select_by_keys(&store, &["beta".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, rows[1].id);
    }

    #[tokio::test]
    async fn test_retag_documents_deduplicates() {
        let dup = Tag::new("cardiologia", None);
        let canonical = Tag::new("Cardiologia", None);
        let store = MemoryStore::new().with_tags(vec![dup.clone(), canonical.clone()]);
        let doc_a = Uuid::new_v4();
        let doc_b = Uuid::new_v4();
        store.tag_document(doc_a, dup.id);
        store.tag_document(doc_b, dup.id);
        store.tag_document(doc_b, canonical.id);

        let touched = store.retag_documents(dup.id, canonical.id).await.unwrap();
        assert_eq!(touched, 2);
        let mut docs = store.documents_with(canonical.id);
        docs.sort();
        let mut expected = vec![doc_a, doc_b];
        expected.sort();
        assert_eq!(docs, expected);
        assert!(store.documents_with(dup.id).is_empty());
    }

    #[tokio::test]
    async fn test_merge_rule_upsert_is_keyed_by_label_and_context() {
        let store = MemoryStore::new();
        let target = Uuid::new_v4();
        let rule = NewTagMergeRule {
            source_label: "cardiologia".to_string(),
            canonical_tag_id: target,
            canonical_tag_name: "Cardiologia".to_string(),
            context: None,
            created_by: "tester".to_string(),
        };
        let first = store.upsert_merge_rule(rule.clone()).await.unwrap();
        let second = store.upsert_merge_rule(rule).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.merge_rules().len(), 1);
    }
}
