//! Tabular input parsing.
//!
//! Turns delimited text with a header row into [`RawRow`]s keyed by the
//! entity schema's column names. Only problems that make the whole file
//! unreadable are returned as errors; everything else is left to the
//! validator.

use std::collections::HashMap;

use tracing::{debug, warn};

use taxon_core::defaults::MULTI_VALUE_DELIMITER;
use taxon_core::{Error, Result};

use crate::schema::EntitySchema;

/// One data row, cells trimmed, empty cells absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// Line number in the source text (the header is line 1).
    pub line: usize,
    cells: HashMap<&'static str, String>,
}

impl RawRow {
    pub fn new(line: usize) -> Self {
        Self {
            line,
            cells: HashMap::new(),
        }
    }

    /// Builder used by tests and template checks.
    pub fn with(mut self, column: &'static str, value: impl Into<String>) -> Self {
        let value = value.into();
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            self.cells.insert(column, trimmed.to_string());
        }
        self
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }

    /// Split a multi-valued cell on `;`, dropping empty items.
    pub fn list(&self, column: &str) -> Vec<String> {
        self.get(column)
            .map(split_multi_value)
            .unwrap_or_default()
    }
}

/// Split a `;`-separated cell into trimmed, non-empty items.
pub fn split_multi_value(cell: &str) -> Vec<String> {
    cell.split(MULTI_VALUE_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `text` against `schema`.
///
/// Header names are trimmed and lower-cased; unknown columns are ignored; a
/// missing required column fails the whole file. A leading UTF-8 BOM is
/// stripped and blank lines are skipped.
pub fn parse_rows(text: &str, schema: &EntitySchema, delimiter: u8) -> Result<Vec<RawRow>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(Error::InvalidInput(format!(
            "{} input has no header row",
            schema.kind
        )));
    }

    // Column position → declared column name
    let mut positions: Vec<Option<&'static str>> = Vec::with_capacity(headers.len());
    for header in headers.iter() {
        let name = header.trim().to_lowercase();
        match schema.column(&name) {
            Some(column) => positions.push(Some(column.name)),
            None => {
                if !name.is_empty() {
                    debug!(
                        subsystem = "import",
                        component = "parser",
                        entity = %schema.kind,
                        column = %name,
                        "Ignoring unknown column"
                    );
                }
                positions.push(None);
            }
        }
    }

    let missing: Vec<&str> = schema
        .required_columns()
        .filter(|c| !positions.contains(&Some(c.name)))
        .map(|c| c.name)
        .collect();
    if !missing.is_empty() {
        return Err(Error::InvalidInput(format!(
            "{} input is missing required column(s): {}",
            schema.kind,
            missing.join(", ")
        )));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(rows.len() + 2);

        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        if record.len() > positions.len() {
            warn!(
                subsystem = "import",
                component = "parser",
                entity = %schema.kind,
                line,
                cells = record.len(),
                columns = positions.len(),
                "Row has more cells than the header; extra cells ignored"
            );
        }

        let mut row = RawRow::new(line);
        for (cell, column) in record.iter().zip(positions.iter().copied()) {
            if let Some(column) = column {
                row = row.with(column, cell);
            }
        }
        rows.push(row);
    }

    debug!(
        subsystem = "import",
        component = "parser",
        entity = %schema.kind,
        row_count = rows.len(),
        "Parsed tabular input"
    );
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EntityKind;

    #[test]
    fn test_parse_basic_rows() {
        let text = "code,name,level,parent_code\npwa,PWA,1,\npwa.world,World,2,pwa\n";
        let rows = parse_rows(text, EntityKind::Taxonomy.schema(), b',').unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[0].get("code"), Some("pwa"));
        assert_eq!(rows[0].get("parent_code"), None);
        assert_eq!(rows[1].get("parent_code"), Some("pwa"));
        assert_eq!(rows[1].line, 3);
    }

    #[test]
    fn test_header_is_case_insensitive_and_bom_stripped() {
        let text = "\u{feff} Code ,NAME,Level\nx,X,1\n";
        let rows = parse_rows(text, EntityKind::Taxonomy.schema(), b',').unwrap();
        assert_eq!(rows[0].get("code"), Some("x"));
        assert_eq!(rows[0].get("name"), Some("X"));
    }

    #[test]
    fn test_missing_required_column_fails_file() {
        let text = "code,name\nx,X\n";
        let err = parse_rows(text, EntityKind::Taxonomy.schema(), b',').unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("level"));
    }

    #[test]
    fn test_blank_lines_skipped_and_lines_tracked() {
        let text = "term,definition\na,first\n\n,\nb,second\n";
        let rows = parse_rows(text, EntityKind::Lexicon.schema(), b',').unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("term"), Some("b"));
        assert_eq!(rows[1].line, 5);
    }

    #[test]
    fn test_unknown_columns_ignored() {
        let text = "term,notes,definition\na,ignored,first\n";
        let rows = parse_rows(text, EntityKind::Lexicon.schema(), b',').unwrap();
        assert_eq!(rows[0].get("notes"), None);
        assert_eq!(rows[0].get("definition"), Some("first"));
    }

    #[test]
    fn test_semicolon_delimiter_and_quoted_cells() {
        let text = "term;definition;synonyms\n\"a; b\";\"x, y\";\"one; two ;\"\n";
        let rows = parse_rows(text, EntityKind::Lexicon.schema(), b';').unwrap();
        assert_eq!(rows[0].get("term"), Some("a; b"));
        assert_eq!(rows[0].list("synonyms"), vec!["one", "two"]);
    }

    #[test]
    fn test_short_rows_leave_cells_absent() {
        let text = "code,name,level,color\nx,X,1\n";
        let rows = parse_rows(text, EntityKind::Taxonomy.schema(), b',').unwrap();
        assert_eq!(rows[0].get("color"), None);
    }
}
