//! # taxon-core
//!
//! Core types, traits, and abstractions for the taxon curation console.
//!
//! This crate provides the data model shared by the importers and the tag
//! unification engine, together with the store traits every persistence
//! backend implements.

pub mod defaults;
pub mod error;
pub mod lexicon;
pub mod logging;
pub mod normalize;
pub mod ontology;
pub mod report;
pub mod stored;
pub mod tags;
pub mod taxonomy;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use lexicon::{
    pronunciation_key, LexiconTerm, Region, RegionalPronunciationRecord, UpsertLexiconTerm,
    UpsertRegion,
};
pub use normalize::normalize_key;
pub use ontology::{
    ConceptProperties, OntologyConcept, OntologyConceptRecord, OntologyPredicate,
    OntologyRelation, OntologyRelationRecord, PropertyValue, UpsertConcept, UpsertRelation,
};
pub use report::{ImportReport, PreviewReport};
pub use stored::Stored;
pub use tags::{NewTagMergeRule, Tag, TagAuditAction, TagAuditEntry, TagMergeRule};
pub use taxonomy::{TaxonomyNode, TaxonomyRecord, TaxonomyStatus, UpsertTaxonomyNode};
pub use traits::*;
