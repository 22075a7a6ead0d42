//! Merge-reason heuristics.
//!
//! Each heuristic looks at a pair of labels and either stays silent or
//! fires with a confidence. Several may fire for one pair; the pair's
//! confidence is the highest of them, never their sum. A pair on which
//! nothing fires is still a candidate when its textual similarity reaches
//! the scope's fallback threshold.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use taxon_core::defaults::{
    CONFIDENCE_ACRONYM_CURATED, CONFIDENCE_ACRONYM_INITIALS, CONFIDENCE_CASE,
    CONFIDENCE_DIACRITIC, CONFIDENCE_LANGUAGE, CONFIDENCE_PLURAL, CONFIDENCE_SYNONYM,
    CONFIDENCE_TYPO, CONFIDENCE_TYPO_STEP,
};
use taxon_core::normalize::{collapse_whitespace, normalize_key};

use crate::config::DedupConfig;
use crate::similarity::{edit_distance, similarity};

/// Why two labels are probably the same tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeReason {
    /// Differ only by letter case.
    Case,
    /// Singular and plural forms.
    Plural,
    /// A few edits apart, or differ only by diacritics.
    Typo,
    /// One is the acronym of the other.
    Acronym,
    /// Known cross-language equivalents.
    Language,
    /// Members of one curated synonym group.
    Synonym,
    /// No heuristic fired; the labels are merely similar.
    TextualSimilarity,
}

impl MergeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Case => "case",
            Self::Plural => "plural",
            Self::Typo => "typo",
            Self::Acronym => "acronym",
            Self::Language => "language",
            Self::Synonym => "synonym",
            Self::TextualSimilarity => "textual_similarity",
        }
    }
}

impl std::fmt::Display for MergeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of comparing two labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// Textual similarity in [0, 100].
    pub similarity: f64,
    /// In (0, 1] for candidates, 0 otherwise.
    pub confidence: f64,
    /// Fired reasons, ordered and deduplicated. Empty when not a candidate.
    pub reasons: Vec<MergeReason>,
}

impl Assessment {
    pub fn is_candidate(&self) -> bool {
        !self.reasons.is_empty()
    }
}

/// Singular → plural suffix rules, applied to folded words.
const PLURAL_RULES: &[(&str, &str)] = &[
    ("", "s"),
    ("", "es"),
    ("ao", "oes"),
    ("ao", "aes"),
    ("al", "ais"),
    ("el", "eis"),
    ("ol", "ois"),
    ("ul", "uis"),
    ("il", "is"),
    ("m", "ns"),
    ("y", "ies"),
];

/// Shortest folded word the plural rules apply to.
const PLURAL_MIN_STEM: usize = 3;

/// Shortest folded label the typo heuristic looks at.
const TYPO_MIN_LEN: usize = 4;

/// Curated tables folded for lookup.
#[derive(Debug, Clone, Default)]
pub struct Heuristics {
    synonym_groups: HashMap<String, Vec<usize>>,
    language_pairs: HashSet<(String, String)>,
    acronyms: HashMap<String, String>,
}

impl Heuristics {
    pub fn new(config: &DedupConfig) -> Self {
        let mut synonym_groups: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, group) in config.synonyms.iter().enumerate() {
            for label in group {
                synonym_groups
                    .entry(normalize_key(label))
                    .or_default()
                    .push(index);
            }
        }

        let mut language_pairs = HashSet::new();
        for (a, b) in &config.language_pairs {
            let (a, b) = (normalize_key(a), normalize_key(b));
            language_pairs.insert((b.clone(), a.clone()));
            language_pairs.insert((a, b));
        }

        let acronyms = config
            .acronyms
            .iter()
            .map(|(acronym, expansion)| (normalize_key(acronym), normalize_key(expansion)))
            .collect();

        Self {
            synonym_groups,
            language_pairs,
            acronyms,
        }
    }

    /// Compare two labels. `fallback_threshold` (in (0, 1]) applies only
    /// when no heuristic fires.
    pub fn assess(&self, a: &str, b: &str, fallback_threshold: f64) -> Assessment {
        let similarity = similarity(a, b);
        let case_a = collapse_whitespace(&a.to_lowercase());
        let case_b = collapse_whitespace(&b.to_lowercase());
        let folded_a = normalize_key(a);
        let folded_b = normalize_key(b);

        let mut fired: Vec<(MergeReason, f64)> = Vec::new();

        if case_a == case_b {
            fired.push((MergeReason::Case, CONFIDENCE_CASE));
        } else if folded_a == folded_b {
            fired.push((MergeReason::Typo, CONFIDENCE_DIACRITIC));
        }

        if folded_a != folded_b {
            if is_plural_variant(&folded_a, &folded_b) {
                fired.push((MergeReason::Plural, CONFIDENCE_PLURAL));
            } else if let Some(confidence) = typo_confidence(&folded_a, &folded_b) {
                fired.push((MergeReason::Typo, confidence));
            }
            if let Some(confidence) = self.acronym_confidence(&folded_a, &folded_b) {
                fired.push((MergeReason::Acronym, confidence));
            }
            if self
                .language_pairs
                .contains(&(folded_a.clone(), folded_b.clone()))
            {
                fired.push((MergeReason::Language, CONFIDENCE_LANGUAGE));
            }
            if self.same_synonym_group(&folded_a, &folded_b) {
                fired.push((MergeReason::Synonym, CONFIDENCE_SYNONYM));
            }
        }

        if fired.is_empty() {
            let score = similarity / 100.0;
            return if score >= fallback_threshold {
                Assessment {
                    similarity,
                    confidence: score,
                    reasons: vec![MergeReason::TextualSimilarity],
                }
            } else {
                Assessment {
                    similarity,
                    confidence: 0.0,
                    reasons: Vec::new(),
                }
            };
        }

        let confidence = fired.iter().map(|(_, c)| *c).fold(0.0, f64::max);
        let reasons: BTreeSet<MergeReason> = fired.into_iter().map(|(r, _)| r).collect();
        Assessment {
            similarity,
            confidence,
            reasons: reasons.into_iter().collect(),
        }
    }

    fn acronym_confidence(&self, a: &str, b: &str) -> Option<f64> {
        let (short, long) = match (a.contains(' '), b.contains(' ')) {
            (false, true) => (a, b),
            (true, false) => (b, a),
            _ => return None,
        };

        if self.acronyms.get(short).is_some_and(|exp| exp == long) {
            return Some(CONFIDENCE_ACRONYM_CURATED);
        }

        let letters = short.chars().count();
        if !(2..=10).contains(&letters) || !short.chars().all(char::is_alphabetic) {
            return None;
        }
        let initials: String = long
            .split(' ')
            .filter_map(|word| word.chars().next())
            .collect();
        (initials == short).then_some(CONFIDENCE_ACRONYM_INITIALS)
    }

    fn same_synonym_group(&self, a: &str, b: &str) -> bool {
        match (self.synonym_groups.get(a), self.synonym_groups.get(b)) {
            (Some(ga), Some(gb)) => ga.iter().any(|g| gb.contains(g)),
            _ => false,
        }
    }
}

/// Every word pair is equal or a singular/plural pair, and at least one
/// pair differs.
fn is_plural_variant(a: &str, b: &str) -> bool {
    let words_a: Vec<&str> = a.split(' ').collect();
    let words_b: Vec<&str> = b.split(' ').collect();
    if words_a.len() != words_b.len() {
        return false;
    }
    let mut differs = false;
    for (x, y) in words_a.iter().zip(&words_b) {
        if x == y {
            continue;
        }
        if !(is_plural_of(x, y) || is_plural_of(y, x)) {
            return false;
        }
        differs = true;
    }
    differs
}

fn is_plural_of(plural: &str, singular: &str) -> bool {
    PLURAL_RULES.iter().any(|(singular_suffix, plural_suffix)| {
        match (
            singular.strip_suffix(singular_suffix),
            plural.strip_suffix(plural_suffix),
        ) {
            (Some(stem_s), Some(stem_p)) => {
                stem_s == stem_p && singular.chars().count() >= PLURAL_MIN_STEM
            }
            _ => false,
        }
    })
}

fn typo_confidence(a: &str, b: &str) -> Option<f64> {
    let len_a = a.chars().count();
    let len_b = b.chars().count();
    if len_a.min(len_b) < TYPO_MIN_LEN {
        return None;
    }
    let allowed = if len_a.max(len_b) <= 8 { 1 } else { 2 };
    let distance = edit_distance(a, b);
    if distance == 0 || distance > allowed {
        return None;
    }
    Some(CONFIDENCE_TYPO - CONFIDENCE_TYPO_STEP * (distance - 1) as f64)
}
