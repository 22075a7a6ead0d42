//! Import configuration.

use taxon_core::defaults::{
    IMPORT_CHUNK_SIZE, IMPORT_CONCURRENCY, IMPORT_DELIMITER, TAXONOMY_MAX_LEVEL,
    TAXONOMY_MIN_LEVEL,
};
use taxon_core::{Error, Result};

/// Configuration for an import run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    /// Rows per upsert call.
    pub chunk_size: usize,
    /// Chunks of one level that may be in flight at once.
    pub concurrency: usize,
    /// Column delimiter of the tabular input.
    pub delimiter: u8,
    /// Deepest taxonomy level accepted.
    pub max_level: u8,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            chunk_size: IMPORT_CHUNK_SIZE,
            concurrency: IMPORT_CONCURRENCY,
            delimiter: IMPORT_DELIMITER,
            max_level: TAXONOMY_MAX_LEVEL,
        }
    }
}

impl ImportConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `IMPORT_CHUNK_SIZE` | `50` | Rows per upsert call |
    /// | `IMPORT_CONCURRENCY` | `4` | Concurrent chunks per level |
    /// | `IMPORT_DELIMITER` | `,` | Column delimiter (single ASCII char, or `tab`) |
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("IMPORT_CHUNK_SIZE") {
            config.chunk_size = parse_count("IMPORT_CHUNK_SIZE", &v)?;
        }
        if let Ok(v) = std::env::var("IMPORT_CONCURRENCY") {
            config.concurrency = parse_count("IMPORT_CONCURRENCY", &v)?;
        }
        if let Ok(v) = std::env::var("IMPORT_DELIMITER") {
            config.delimiter = parse_delimiter(&v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set rows per upsert call.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set concurrent chunks per level.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the column delimiter.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set the deepest accepted taxonomy level.
    pub fn with_max_level(mut self, max_level: u8) -> Self {
        self.max_level = max_level;
        self
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk size must be at least 1".to_string()));
        }
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }
        if self.delimiter == b'"' || self.delimiter == b'\n' || self.delimiter == b'\r' {
            return Err(Error::Config(format!(
                "'{}' cannot be used as a column delimiter",
                self.delimiter.escape_ascii()
            )));
        }
        if self.max_level < TAXONOMY_MIN_LEVEL {
            return Err(Error::Config("max level must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse_count(name: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|_| Error::Config(format!("{} must be a positive integer, got '{}'", name, raw)))
}

/// Parse a delimiter given as a single ASCII character or the word `tab`.
pub fn parse_delimiter(raw: &str) -> Result<u8> {
    if raw.eq_ignore_ascii_case("tab") || raw == "\\t" {
        return Ok(b'\t');
    }
    match raw.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ => Err(Error::Config(format!(
            "delimiter must be a single ASCII character, got '{}'",
            raw
        ))),
    }
}
