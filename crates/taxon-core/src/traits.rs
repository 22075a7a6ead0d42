//! Store traits for taxon.
//!
//! Persistence is consumed through these traits only. Importers and the
//! unification engine receive a store as an argument; nothing reaches for a
//! global client.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::lexicon::UpsertLexiconTerm;
use crate::lexicon::UpsertRegion;
use crate::ontology::{UpsertConcept, UpsertRelation};
use crate::stored::Stored;
use crate::tags::{NewTagMergeRule, Tag, TagAuditEntry, TagMergeRule};
use crate::taxonomy::UpsertTaxonomyNode;

// =============================================================================
// ENTITIES
// =============================================================================

/// An importable entity kind with a natural unique key.
pub trait Entity: Send + Sync + 'static {
    /// Persist-ready payload.
    type Upsert: Clone + std::fmt::Debug + Send + Sync + 'static;

    /// Table / collection name.
    const NAME: &'static str;

    /// Column the upsert conflicts on.
    const CONFLICT_KEY: &'static str;

    /// Natural key of a payload.
    fn natural_key(row: &Self::Upsert) -> String;
}

/// Taxonomy nodes, keyed by `code`.
pub struct Taxonomy;

impl Entity for Taxonomy {
    type Upsert = UpsertTaxonomyNode;
    const NAME: &'static str = "taxonomy";
    const CONFLICT_KEY: &'static str = "code";

    fn natural_key(row: &UpsertTaxonomyNode) -> String {
        row.code.clone()
    }
}

/// Lexicon terms, keyed by `term_normalized`.
pub struct Lexicon;

impl Entity for Lexicon {
    type Upsert = UpsertLexiconTerm;
    const NAME: &'static str = "lexicon_term";
    const CONFLICT_KEY: &'static str = "term_normalized";

    fn natural_key(row: &UpsertLexiconTerm) -> String {
        row.term_normalized.clone()
    }
}

/// Regions holding pronunciation overrides, keyed by `region_code`.
pub struct Regions;

impl Entity for Regions {
    type Upsert = UpsertRegion;
    const NAME: &'static str = "region";
    const CONFLICT_KEY: &'static str = "region_code";

    fn natural_key(row: &UpsertRegion) -> String {
        row.region_code.clone()
    }
}

/// Ontology concepts, keyed by `name_normalized`.
pub struct Concepts;

impl Entity for Concepts {
    type Upsert = UpsertConcept;
    const NAME: &'static str = "ontology_concept";
    const CONFLICT_KEY: &'static str = "name_normalized";

    fn natural_key(row: &UpsertConcept) -> String {
        row.name_normalized.clone()
    }
}

/// Ontology relations, keyed by the `(subject, predicate, object)` triple.
pub struct Relations;

impl Entity for Relations {
    type Upsert = UpsertRelation;
    const NAME: &'static str = "ontology_relation";
    const CONFLICT_KEY: &'static str = "subject_id, predicate, object_id";

    fn natural_key(row: &UpsertRelation) -> String {
        row.triple_key()
    }
}

// =============================================================================
// ENTITY STORE
// =============================================================================

/// Opaque persistence for one entity kind.
///
/// Only a single `upsert` call is assumed atomic; nothing spans calls.
#[async_trait]
pub trait EntityStore<E: Entity>: Send + Sync {
    /// Fetch persisted rows whose natural key is in `keys`. Unknown keys are
    /// silently absent from the result.
    async fn select_by_keys(&self, keys: &[String]) -> Result<Vec<Stored<E::Upsert>>>;

    /// Insert or update `rows` by natural key and return them with ids.
    /// Existing keys keep their id.
    async fn upsert(&self, rows: Vec<E::Upsert>) -> Result<Vec<Stored<E::Upsert>>>;

    /// Delete rows by id, returning how many were removed.
    async fn delete_by_ids(&self, ids: &[Uuid]) -> Result<u64>;
}

// =============================================================================
// TAG STORE
// =============================================================================

/// Mutations the unification engine applies to the tag graph.
#[async_trait]
pub trait TagStore: Send + Sync {
    /// List every tag.
    async fn list_tags(&self) -> Result<Vec<Tag>>;

    /// Set (or clear) a tag's parent.
    async fn set_parent(&self, tag_id: Uuid, parent_tag_id: Option<Uuid>) -> Result<()>;

    /// Move every child of `from` under `to`. Returns the number moved.
    async fn reparent_children(&self, from: Uuid, to: Uuid) -> Result<u64>;

    /// Documents currently tagged with `tag_id`.
    async fn documents_for_tag(&self, tag_id: Uuid) -> Result<Vec<Uuid>>;

    /// Re-point document assignments from `from` to `to`, skipping documents
    /// that already carry `to`. Returns the number of documents touched.
    async fn retag_documents(&self, from: Uuid, to: Uuid) -> Result<u64>;

    /// Delete tags by id.
    async fn delete_tags(&self, ids: &[Uuid]) -> Result<u64>;

    /// Insert or update a merge rule keyed by `(source_label_normalized, context)`.
    async fn upsert_merge_rule(&self, rule: NewTagMergeRule) -> Result<TagMergeRule>;

    /// Rules whose folded source label equals `label_normalized`, in any context.
    async fn find_merge_rules(&self, label_normalized: &str) -> Result<Vec<TagMergeRule>>;

    /// Append audit-log entries.
    async fn record_audit(&self, entries: Vec<TagAuditEntry>) -> Result<()>;
}
