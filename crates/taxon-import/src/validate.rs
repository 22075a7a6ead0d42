//! Row validation.
//!
//! Each [`RawRow`] is decoded into a typed record. Every problem found in a
//! row is collected (not just the first) and the row is excluded from
//! persistence, but the batch never aborts.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{trace, warn};

use taxon_core::defaults::{TAXONOMY_CODE_MAX_LEN, TAXONOMY_MIN_LEVEL};
use taxon_core::{
    normalize_key, ConceptProperties, OntologyConceptRecord, OntologyPredicate,
    OntologyRelationRecord, RegionalPronunciationRecord, TaxonomyRecord, TaxonomyStatus,
    UpsertLexiconTerm,
};

use crate::parser::RawRow;

/// Caller-supplied check run on rows that passed field validation.
pub type CrossFieldValidator<T> = dyn Fn(&T) -> Vec<String> + Send + Sync;

/// Result of validating one row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowOutcome<T> {
    pub line: usize,
    pub record: Option<T>,
    pub errors: Vec<String>,
}

impl<T> RowOutcome<T> {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.record.is_some()
    }
}

/// Validated rows of one file.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated<T> {
    /// `(line, record)` for every valid row, in input order.
    pub rows: Vec<(usize, T)>,
    /// One formatted message per problem, prefixed with the row's line.
    pub errors: Vec<String>,
    pub total_rows: usize,
    pub invalid_rows: usize,
}

impl<T> Validated<T> {
    pub fn valid_rows(&self) -> usize {
        self.rows.len()
    }
}

/// Format a row-level error.
pub fn row_error(line: usize, message: impl std::fmt::Display) -> String {
    format!("row {}: {}", line, message)
}

/// Validate every row with `decode`, then `cross` on rows that decoded.
pub fn validate_rows<T>(
    rows: &[RawRow],
    decode: impl Fn(&RawRow) -> RowOutcome<T>,
    cross: Option<&CrossFieldValidator<T>>,
) -> Validated<T> {
    let mut validated = Validated {
        rows: Vec::with_capacity(rows.len()),
        errors: Vec::new(),
        total_rows: rows.len(),
        invalid_rows: 0,
    };

    for raw in rows {
        let mut outcome = decode(raw);
        if let (Some(record), Some(cross)) = (outcome.record.as_ref(), cross) {
            outcome.errors.extend(cross(record));
        }

        match outcome.record {
            Some(record) if outcome.errors.is_empty() => {
                trace!(
                    subsystem = "import",
                    component = "validator",
                    line = outcome.line,
                    "Row valid"
                );
                validated.rows.push((outcome.line, record));
            }
            _ => {
                validated.invalid_rows += 1;
                for error in &outcome.errors {
                    warn!(
                        subsystem = "import",
                        component = "validator",
                        line = outcome.line,
                        error = %error,
                        "Row rejected"
                    );
                }
                validated
                    .errors
                    .extend(outcome.errors.into_iter().map(|e| row_error(outcome.line, e)));
            }
        }
    }

    validated
}

/// Accumulates field errors while reading a row.
struct FieldReader<'a> {
    row: &'a RawRow,
    errors: Vec<String>,
}

impl<'a> FieldReader<'a> {
    fn new(row: &'a RawRow) -> Self {
        Self {
            row,
            errors: Vec::new(),
        }
    }

    fn required(&mut self, column: &str) -> String {
        match self.row.get(column) {
            Some(value) => value.to_string(),
            None => {
                self.errors.push(format!("{} is required", column));
                String::new()
            }
        }
    }

    fn optional(&self, column: &str) -> Option<String> {
        self.row.get(column).map(str::to_string)
    }

    fn list(&self, column: &str) -> Vec<String> {
        self.row.list(column)
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn finish<T>(self, record: T) -> RowOutcome<T> {
        RowOutcome {
            line: self.row.line,
            record: Some(record),
            errors: self.errors,
        }
    }
}

/// `#RGB` or `#RRGGBB`.
fn is_hex_color(value: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^#(?:[0-9A-Fa-f]{3}|[0-9A-Fa-f]{6})$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(value))
}

// =============================================================================
// TAXONOMY
// =============================================================================

/// Decode a taxonomy row. `max_level` bounds the accepted `level`.
pub fn decode_taxonomy(row: &RawRow, max_level: u8) -> RowOutcome<TaxonomyRecord> {
    let mut fields = FieldReader::new(row);

    let code = fields.required("code");
    if code.chars().count() > TAXONOMY_CODE_MAX_LEN {
        fields.error(format!(
            "code must be at most {} characters",
            TAXONOMY_CODE_MAX_LEN
        ));
    }
    if code.chars().any(char::is_whitespace) {
        fields.error(format!("code '{}' must not contain whitespace", code));
    }

    let name = fields.required("name");

    let level = match row.get("level") {
        None => {
            fields.error("level is required");
            0
        }
        Some(raw) => match raw.parse::<u8>() {
            Ok(level) if (TAXONOMY_MIN_LEVEL..=max_level).contains(&level) => level,
            _ => {
                fields.error(format!(
                    "level must be an integer between {} and {}, got '{}'",
                    TAXONOMY_MIN_LEVEL, max_level, raw
                ));
                0
            }
        },
    };

    let status = match row.get("status") {
        None => TaxonomyStatus::default(),
        Some(raw) => raw.parse::<TaxonomyStatus>().unwrap_or_else(|e| {
            fields.error(e);
            TaxonomyStatus::default()
        }),
    };

    let color = fields.optional("color");
    if let Some(color) = color.as_deref() {
        if !is_hex_color(color) {
            fields.error(format!("color '{}' must be #RGB or #RRGGBB", color));
        }
    }

    let record = TaxonomyRecord {
        code,
        name,
        description: fields.optional("description"),
        parent_code: fields.optional("parent_code"),
        level,
        icon: fields.optional("icon"),
        color,
        status,
        synonyms: fields.list("synonyms"),
        keywords: fields.list("keywords"),
    };
    fields.finish(record)
}

/// Structural rules between `level`, `code` and `parent_code`.
pub fn taxonomy_cross_fields(record: &TaxonomyRecord) -> Vec<String> {
    let mut errors = Vec::new();
    match (&record.parent_code, record.level) {
        (None, level) if level > TAXONOMY_MIN_LEVEL => {
            errors.push(format!("parent_code is required at level {}", level));
        }
        (Some(parent), TAXONOMY_MIN_LEVEL) => {
            errors.push(format!(
                "root node (level 1) must not have a parent_code, got '{}'",
                parent
            ));
        }
        (Some(parent), _) if *parent == record.code => {
            errors.push(format!("code '{}' cannot be its own parent", parent));
        }
        _ => {}
    }
    errors
}

// =============================================================================
// LEXICON
// =============================================================================

pub fn decode_lexicon(row: &RawRow) -> RowOutcome<UpsertLexiconTerm> {
    let mut fields = FieldReader::new(row);
    let term = fields.required("term");
    let definition = fields.required("definition");

    let mut record = UpsertLexiconTerm::new(term, definition);
    record.definition_simple = fields.optional("definition_simple");
    record.pronunciation_ipa = fields.optional("pronunciation_ipa");
    record.pronunciation_phonetic = fields.optional("pronunciation_phonetic");
    record.domain = fields.list("domain");
    record.synonyms = fields.list("synonyms");
    fields.finish(record)
}

// =============================================================================
// REGIONAL PRONUNCIATIONS
// =============================================================================

pub fn decode_regional(row: &RawRow) -> RowOutcome<RegionalPronunciationRecord> {
    let mut fields = FieldReader::new(row);
    let record = RegionalPronunciationRecord {
        region_code: fields.required("region_code"),
        term: fields.required("term"),
        pronunciation: fields.required("pronunciation"),
    };
    fields.finish(record)
}

// =============================================================================
// ONTOLOGY
// =============================================================================

pub fn decode_concept(row: &RawRow) -> RowOutcome<OntologyConceptRecord> {
    let mut fields = FieldReader::new(row);
    let name = fields.required("name");
    let properties = match row.get("properties") {
        None => ConceptProperties::default(),
        Some(raw) => ConceptProperties::parse(raw).unwrap_or_else(|e| {
            fields.error(format!("properties: {}", e));
            ConceptProperties::default()
        }),
    };

    let record = OntologyConceptRecord {
        name,
        taxonomy_code: fields.optional("taxonomy_code"),
        properties,
    };
    fields.finish(record)
}

pub fn decode_relation(row: &RawRow) -> RowOutcome<OntologyRelationRecord> {
    let mut fields = FieldReader::new(row);
    let subject = fields.required("subject");
    let object = fields.required("object");

    let predicate = match row.get("predicate") {
        None => {
            fields.error("predicate is required");
            OntologyPredicate::RelatedTo
        }
        Some(raw) => raw.parse::<OntologyPredicate>().unwrap_or_else(|e| {
            fields.error(e);
            OntologyPredicate::RelatedTo
        }),
    };

    let weight = match row.get("weight") {
        None => None,
        Some(raw) => match raw.parse::<f64>() {
            Ok(w) if (0.0..=1.0).contains(&w) => Some(w),
            _ => {
                fields.error(format!("weight must be a number in [0, 1], got '{}'", raw));
                None
            }
        },
    };

    let record = OntologyRelationRecord {
        subject,
        predicate,
        object,
        weight,
    };
    fields.finish(record)
}

/// Reject edges whose endpoints fold to the same concept.
pub fn relation_cross_fields(record: &OntologyRelationRecord) -> Vec<String> {
    if !record.subject.is_empty() && normalize_key(&record.subject) == normalize_key(&record.object)
    {
        vec![format!(
            "self-relation '{}' {} '{}' is not allowed",
            record.subject, record.predicate, record.object
        )]
    } else {
        Vec::new()
    }
}
