//! Edit-distance similarity between labels.

/// Similarity of two labels in `[0, 100]`.
///
/// Levenshtein distance over case-folded characters, normalized by the
/// longer label's character count. Two empty labels are identical.
///
/// ```
/// use taxon_dedup::similarity;
///
/// assert_eq!(similarity("Cardiologia", "cardiologia"), 100.0);
/// assert!(similarity("cardiologia", "cardiolgia") > 90.0);
/// ```
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 100.0;
    }
    let distance = strsim::levenshtein(&a, &b);
    (1.0 - distance as f64 / max_len as f64) * 100.0
}

/// Character edit distance between two already-folded labels.
pub(crate) fn edit_distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}
