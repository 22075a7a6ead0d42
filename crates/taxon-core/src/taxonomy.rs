//! Taxonomy tree types.
//!
//! A taxonomy is a multi-level tree of categories identified by a stable
//! `code`. Input rows reference their parent by `parent_code`; persisted
//! nodes reference it by `parent_id`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::stored::Stored;

/// Editorial status of a taxonomy node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxonomyStatus {
    /// Reviewed and in use.
    Approved,
    /// Imported but not yet reviewed.
    #[default]
    Pending,
    /// Kept for history, not offered for new classification.
    Deprecated,
}

impl TaxonomyStatus {
    /// All accepted values, in display order.
    pub const ALL: [TaxonomyStatus; 3] = [Self::Approved, Self::Pending, Self::Deprecated];
}

impl std::fmt::Display for TaxonomyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approved => write!(f, "approved"),
            Self::Pending => write!(f, "pending"),
            Self::Deprecated => write!(f, "deprecated"),
        }
    }
}

impl std::str::FromStr for TaxonomyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "approved" => Ok(Self::Approved),
            "pending" => Ok(Self::Pending),
            "deprecated" => Ok(Self::Deprecated),
            _ => Err(format!(
                "Invalid status '{}': expected one of approved, pending, deprecated",
                s
            )),
        }
    }
}

/// A validated taxonomy input row, before its parent has been resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyRecord {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    /// `code` of the parent node; `None` for roots.
    pub parent_code: Option<String>,
    /// Depth in the tree, 1 = root.
    pub level: u8,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub status: TaxonomyStatus,
    pub synonyms: Vec<String>,
    pub keywords: Vec<String>,
}

impl TaxonomyRecord {
    /// Convert into a persist-ready node once the parent id is known.
    pub fn into_upsert(self, parent_id: Option<Uuid>) -> UpsertTaxonomyNode {
        UpsertTaxonomyNode {
            code: self.code,
            name: self.name,
            description: self.description,
            parent_id,
            level: self.level,
            icon: self.icon,
            color: self.color,
            status: self.status,
            synonyms: self.synonyms,
            keywords: self.keywords,
        }
    }
}

/// Persist-ready taxonomy node, upserted by `code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertTaxonomyNode {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub level: u8,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub status: TaxonomyStatus,
    pub synonyms: Vec<String>,
    pub keywords: Vec<String>,
}

/// A persisted taxonomy node.
pub type TaxonomyNode = Stored<UpsertTaxonomyNode>;
