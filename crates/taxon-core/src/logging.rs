//! Structured logging field name constants for taxon.
//!
//! All crates use these names for structured `tracing` fields so that log
//! aggregation can query imports by level and chunk.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | A chunk was rejected by the store |
//! | WARN  | Row-level problem, duplicate natural key collapsed |
//! | INFO  | Import start/finish, per-level completion, merge applied |
//! | DEBUG | Lookup counts, decision points, config choices |
//! | TRACE | Per-row and per-pair iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "import", "dedup", "db", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "hierarchy", "batcher", "lexicon", "suggestions"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "import", "upsert_chunk", "propose", "apply"
pub const OPERATION: &str = "op";

/// Entity kind being imported ("taxonomy", "lexicon", ...).
pub const ENTITY: &str = "entity";

// ─── Position fields ───────────────────────────────────────────────────────

/// Taxonomy level being processed.
pub const LEVEL: &str = "level";

/// Zero-based chunk index within a batch.
pub const CHUNK_INDEX: &str = "chunk_index";

/// Number of chunks in a batch.
pub const CHUNK_COUNT: &str = "chunk_count";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Number of rows handled by an operation.
pub const ROW_COUNT: &str = "row_count";

/// Number of rows persisted.
pub const SUCCESS_COUNT: &str = "success_count";

/// Number of errors reported.
pub const ERROR_COUNT: &str = "error_count";

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
