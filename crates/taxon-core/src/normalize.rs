//! Text normalization for natural keys and label comparison.
//!
//! Natural keys (`term`, concept `name`, merge-rule labels) are compared in a
//! folded form: Unicode NFD decomposition, combining marks removed,
//! lower-cased, trimmed, inner whitespace collapsed to single spaces.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Remove diacritics while preserving letter case.
///
/// ```
/// use taxon_core::normalize::strip_diacritics;
///
/// assert_eq!(strip_diacritics("Índice de Preços"), "Indice de Precos");
/// ```
pub fn strip_diacritics(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Collapse runs of whitespace into single spaces and trim both ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fold a natural key into its case- and diacritic-insensitive form.
///
/// ```
/// use taxon_core::normalize::normalize_key;
///
/// assert_eq!(normalize_key("  Pressão   Arterial "), "pressao arterial");
/// ```
pub fn normalize_key(s: &str) -> String {
    collapse_whitespace(&strip_diacritics(s).to_lowercase())
}
