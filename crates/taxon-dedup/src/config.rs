//! Deduplication configuration and curated tables.

use std::collections::BTreeMap;

use taxon_core::defaults::{
    DEDUP_ADOPT_THRESHOLD, DEDUP_ROOT_THRESHOLD, DEDUP_SIBLING_THRESHOLD,
};
use taxon_core::{Error, Result};

/// Thresholds and curated tables used by the suggestion engine.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupConfig {
    /// Fallback similarity threshold between root tags, in (0, 1].
    pub root_threshold: f64,
    /// Fallback similarity threshold between siblings, in (0, 1].
    pub sibling_threshold: f64,
    /// Minimum confidence for adopting an orphan, in (0, 1].
    pub adopt_threshold: f64,
    /// Groups of interchangeable labels.
    pub synonyms: Vec<Vec<String>>,
    /// Known cross-language equivalents.
    pub language_pairs: Vec<(String, String)>,
    /// Acronym → expansion.
    pub acronyms: BTreeMap<String, String>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            root_threshold: DEDUP_ROOT_THRESHOLD,
            sibling_threshold: DEDUP_SIBLING_THRESHOLD,
            adopt_threshold: DEDUP_ADOPT_THRESHOLD,
            synonyms: seed_synonyms(),
            language_pairs: seed_language_pairs(),
            acronyms: seed_acronyms(),
        }
    }
}

impl DedupConfig {
    /// Config with default thresholds and no curated entries.
    pub fn without_tables() -> Self {
        Self {
            synonyms: Vec::new(),
            language_pairs: Vec::new(),
            acronyms: BTreeMap::new(),
            ..Self::default()
        }
    }

    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DEDUP_ROOT_THRESHOLD` | `0.7` | Fallback threshold between roots |
    /// | `DEDUP_SIBLING_THRESHOLD` | `0.6` | Fallback threshold between siblings |
    /// | `DEDUP_ADOPT_THRESHOLD` | `0.6` | Minimum confidence for adoption |
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("DEDUP_ROOT_THRESHOLD") {
            config.root_threshold = parse_threshold("DEDUP_ROOT_THRESHOLD", &v)?;
        }
        if let Ok(v) = std::env::var("DEDUP_SIBLING_THRESHOLD") {
            config.sibling_threshold = parse_threshold("DEDUP_SIBLING_THRESHOLD", &v)?;
        }
        if let Ok(v) = std::env::var("DEDUP_ADOPT_THRESHOLD") {
            config.adopt_threshold = parse_threshold("DEDUP_ADOPT_THRESHOLD", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_root_threshold(mut self, threshold: f64) -> Self {
        self.root_threshold = threshold;
        self
    }

    pub fn with_sibling_threshold(mut self, threshold: f64) -> Self {
        self.sibling_threshold = threshold;
        self
    }

    pub fn with_adopt_threshold(mut self, threshold: f64) -> Self {
        self.adopt_threshold = threshold;
        self
    }

    /// Add a group of interchangeable labels.
    pub fn with_synonym_group<I, S>(mut self, group: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms.push(group.into_iter().map(Into::into).collect());
        self
    }

    /// Add a cross-language pair.
    pub fn with_language_pair(mut self, a: impl Into<String>, b: impl Into<String>) -> Self {
        self.language_pairs.push((a.into(), b.into()));
        self
    }

    /// Add a curated acronym.
    pub fn with_acronym(mut self, acronym: impl Into<String>, expansion: impl Into<String>) -> Self {
        self.acronyms.insert(acronym.into(), expansion.into());
        self
    }

    /// Reject thresholds outside (0, 1].
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("root threshold", self.root_threshold),
            ("sibling threshold", self.sibling_threshold),
            ("adopt threshold", self.adopt_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(Error::Config(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

fn parse_threshold(name: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| Error::Config(format!("{} must be a number, got '{}'", name, raw)))
}

fn seed_synonyms() -> Vec<Vec<String>> {
    [
        &["hipertensão", "pressão alta"][..],
        &["infarto", "enfarte", "ataque cardíaco"][..],
        &["câncer", "cancro", "neoplasia"][..],
        &["automóvel", "carro", "veículo"][..],
    ]
    .iter()
    .map(|group| group.iter().map(|s| s.to_string()).collect())
    .collect()
}

fn seed_language_pairs() -> Vec<(String, String)> {
    [
        ("saúde", "health"),
        ("cardiologia", "cardiology"),
        ("educação", "education"),
        ("economia", "economy"),
        ("inflação", "inflation"),
        ("tecnologia", "technology"),
        ("meio ambiente", "environment"),
    ]
    .iter()
    .map(|(a, b)| (a.to_string(), b.to_string()))
    .collect()
}

fn seed_acronyms() -> BTreeMap<String, String> {
    [
        ("SUS", "Sistema Único de Saúde"),
        ("PIB", "Produto Interno Bruto"),
        ("ONU", "Organização das Nações Unidas"),
        ("OMS", "Organização Mundial da Saúde"),
    ]
    .iter()
    .map(|(a, b)| (a.to_string(), b.to_string()))
    .collect()
}
