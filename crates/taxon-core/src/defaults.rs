//! Centralized default constants for taxon.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates and the CLI reference these constants instead of defining their
//! own magic numbers.

// =============================================================================
// IMPORT
// =============================================================================

/// Rows per upsert call.
pub const IMPORT_CHUNK_SIZE: usize = 50;

/// Chunks of the same level that may be in flight at once.
pub const IMPORT_CONCURRENCY: usize = 4;

/// Column delimiter for tabular input.
pub const IMPORT_DELIMITER: u8 = b',';

/// Delimiter for multi-valued cells (synonyms, keywords, domain).
pub const MULTI_VALUE_DELIMITER: char = ';';

/// Shallowest taxonomy level (roots).
pub const TAXONOMY_MIN_LEVEL: u8 = 1;

/// Deepest taxonomy level accepted by the validator.
pub const TAXONOMY_MAX_LEVEL: u8 = 5;

/// Maximum length of a taxonomy `code`.
pub const TAXONOMY_CODE_MAX_LEN: usize = 100;

// =============================================================================
// DEDUPLICATION
// =============================================================================

/// Fallback similarity threshold when comparing root tags.
pub const DEDUP_ROOT_THRESHOLD: f64 = 0.7;

/// Fallback similarity threshold when comparing siblings under one parent.
pub const DEDUP_SIBLING_THRESHOLD: f64 = 0.6;

/// Minimum score for proposing that an orphan be adopted by a parent.
pub const DEDUP_ADOPT_THRESHOLD: f64 = 0.6;

/// Confidence assigned when two labels differ only by letter case.
pub const CONFIDENCE_CASE: f64 = 0.95;

/// Confidence assigned to singular/plural variants.
pub const CONFIDENCE_PLURAL: f64 = 0.9;

/// Confidence assigned to labels that differ only by diacritics.
pub const CONFIDENCE_DIACRITIC: f64 = 0.9;

/// Confidence for a single-edit typo; each further edit subtracts
/// [`CONFIDENCE_TYPO_STEP`].
pub const CONFIDENCE_TYPO: f64 = 0.85;

/// Confidence lost per additional edit in the typo heuristic.
pub const CONFIDENCE_TYPO_STEP: f64 = 0.1;

/// Confidence for a curated acronym entry.
pub const CONFIDENCE_ACRONYM_CURATED: f64 = 0.9;

/// Confidence for an acronym derived from word initials.
pub const CONFIDENCE_ACRONYM_INITIALS: f64 = 0.8;

/// Confidence for a curated cross-language pair.
pub const CONFIDENCE_LANGUAGE: f64 = 0.85;

/// Confidence for a curated synonym group.
pub const CONFIDENCE_SYNONYM: f64 = 0.8;

// =============================================================================
// DATABASE
// =============================================================================

/// Default database URL when `DATABASE_URL` is unset.
pub const DATABASE_URL: &str = "postgres://localhost/taxon";

/// Default maximum pool connections.
pub const DB_MAX_CONNECTIONS: u32 = 10;

// =============================================================================
// LOGGING
// =============================================================================

/// Default `RUST_LOG` filter for the CLI.
pub const LOG_FILTER: &str = "taxon=info,taxon_import=info,taxon_dedup=info,taxon_db=info";
