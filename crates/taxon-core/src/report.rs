//! Import result reporting.

use serde::{Deserialize, Serialize};

/// Outcome of an import: how many rows were persisted and a human-readable
/// error for every row or chunk that was not.
///
/// A non-empty `errors` list with a positive `success_count` is a normal,
/// inspectable end state: the import was partially applied and can be
/// re-run safely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub success_count: usize,
    pub errors: Vec<String>,
}

impl ImportReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Fold another report into this one.
    pub fn absorb(&mut self, other: ImportReport) {
        self.success_count += other.success_count;
        self.errors.extend(other.errors);
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Counts of valid and invalid rows, produced before anything is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewReport {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub invalid_rows: usize,
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serializes_camel_case() {
        let report = ImportReport {
            success_count: 2,
            errors: vec!["row 3: name is required".to_string()],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["successCount"], 2);
        assert_eq!(json["errors"][0], "row 3: name is required");
    }

    #[test]
    fn test_absorb_adds_counts_and_errors() {
        let mut total = ImportReport::new();
        total.absorb(ImportReport {
            success_count: 3,
            errors: vec![],
        });
        total.absorb(ImportReport {
            success_count: 1,
            errors: vec!["level 2, chunk 0: rejected".to_string()],
        });
        assert_eq!(total.success_count, 4);
        assert_eq!(total.errors.len(), 1);
        assert!(!total.is_clean());
    }
}
