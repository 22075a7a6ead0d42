//! Lexicon and regional pronunciation types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::normalize::{collapse_whitespace, normalize_key};
use crate::stored::Stored;

/// Persist-ready lexicon term, upserted by `term_normalized`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertLexiconTerm {
    pub term: String,
    pub term_normalized: String,
    pub definition: String,
    pub definition_simple: Option<String>,
    pub pronunciation_ipa: Option<String>,
    pub pronunciation_phonetic: Option<String>,
    pub domain: Vec<String>,
    pub synonyms: Vec<String>,
}

impl UpsertLexiconTerm {
    /// Build a term with its normalized key derived from `term`.
    pub fn new(term: impl Into<String>, definition: impl Into<String>) -> Self {
        let term = collapse_whitespace(&term.into());
        Self {
            term_normalized: normalize_key(&term),
            term,
            definition: definition.into(),
            definition_simple: None,
            pronunciation_ipa: None,
            pronunciation_phonetic: None,
            domain: Vec::new(),
            synonyms: Vec::new(),
        }
    }
}

/// A persisted lexicon term.
pub type LexiconTerm = Stored<UpsertLexiconTerm>;

/// One `region_code, term, pronunciation` input row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalPronunciationRecord {
    pub region_code: String,
    pub term: String,
    pub pronunciation: String,
}

impl RegionalPronunciationRecord {
    /// Key under which the pronunciation is stored inside its region.
    ///
    /// Case and spacing are folded; diacritics are kept because they change
    /// pronunciation.
    pub fn term_key(&self) -> String {
        pronunciation_key(&self.term)
    }
}

/// Fold a term into the key used inside a region's pronunciation map.
pub fn pronunciation_key(term: &str) -> String {
    collapse_whitespace(&term.to_lowercase())
}

/// Persist-ready region, upserted by `region_code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertRegion {
    pub region_code: String,
    pub name: Option<String>,
    /// term key → pronunciation override.
    pub pronunciations: BTreeMap<String, String>,
}

impl UpsertRegion {
    /// Merge incoming overrides into the existing map. Terms not mentioned
    /// are retained; mentioned terms take the incoming pronunciation.
    pub fn merge_pronunciations<I>(&mut self, incoming: I) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut merged = 0;
        for (term, pronunciation) in incoming {
            self.pronunciations.insert(term, pronunciation);
            merged += 1;
        }
        merged
    }
}

/// A persisted region.
pub type Region = Stored<UpsertRegion>;
