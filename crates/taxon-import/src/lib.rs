//! # taxon-import
//!
//! Bulk tabular import for taxon.
//!
//! This crate provides:
//! - Per-entity column schemas and downloadable templates
//! - A delimited-text parser and row validators with line-numbered errors
//! - Level-ordered taxonomy import that resolves `parent_code` to ids
//! - Chunked, idempotent upserts with bounded concurrency
//! - Lexicon, regional pronunciation and ontology importers
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use taxon_import::{EntityKind, ImportConfig, ImportService, ImportStores};
//! use taxon_db::MemoryStore;
//!
//! let stores = ImportStores::from_shared(Arc::new(MemoryStore::new()));
//! let service = ImportService::new(stores, ImportConfig::default());
//!
//! let preview = service.preview(EntityKind::Taxonomy, &text)?;
//! println!("{} of {} rows valid", preview.valid_rows, preview.total_rows);
//!
//! let report = service.import(EntityKind::Taxonomy, &text).await?;
//! for error in &report.errors {
//!     eprintln!("{}", error);
//! }
//! ```

pub mod batcher;
pub mod config;
pub mod hierarchy;
pub mod keys;
pub mod lexicon;
pub mod ontology;
pub mod parser;
pub mod progress;
pub mod regional;
pub mod schema;
pub mod service;
pub mod template;
pub mod validate;

pub use batcher::{BatchOutcome, UpsertBatcher};
pub use config::{parse_delimiter, ImportConfig};
pub use hierarchy::HierarchyResolver;
pub use lexicon::import_lexicon;
pub use ontology::{import_concepts, import_relations};
pub use parser::{parse_rows, RawRow};
pub use progress::{ChunkProgress, ImportProgress, NoProgress};
pub use regional::import_regional;
pub use schema::{Column, EntityKind, EntitySchema};
pub use service::{ImportService, ImportStores};
pub use template::template;
pub use validate::{validate_rows, Validated};

// Re-export core types for convenience
pub use taxon_core::{Error, ImportReport, PreviewReport, Result};
