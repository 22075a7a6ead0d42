//! # taxon-dedup
//!
//! Tag unification for taxon.
//!
//! This crate provides:
//! - Edit-distance label similarity
//! - Merge-reason heuristics (case, plural, typo, acronym, language, synonym)
//! - Merge and adopt suggestions over root tags and siblings
//! - A review session that confirms or dismisses suggestions
//! - Merge-rule lookup for incoming raw labels
//!
//! ## Example
//!
//! ```ignore
//! use taxon_dedup::{ApplyOptions, DedupConfig, SuggestionSession};
//!
//! let mut session = SuggestionSession::load(&store, &DedupConfig::default()).await?;
//! let ids: Vec<_> = session.pending().iter().map(|s| s.id).collect();
//! for id in ids {
//!     session.confirm(id, &ApplyOptions::default()).await?;
//! }
//! ```

pub mod config;
pub mod heuristics;
pub mod rules;
pub mod session;
pub mod similarity;
pub mod suggestions;

pub use config::DedupConfig;
pub use heuristics::{Assessment, Heuristics, MergeReason};
pub use rules::canonicalize_label;
pub use session::{ApplyOptions, ApplyOutcome, Decision, SuggestionSession, SuggestionStatus};
pub use similarity::similarity;
pub use suggestions::{propose_suggestions, suggestion_id, Suggestion, SuggestionKind, TagRef};
