//! Tag graph types used by the unification engine.
//!
//! Tags are created by automated tagging, not by the importers. The engine
//! only re-parents, deletes and records merge rules for them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::normalize::normalize_key;

/// A tag in the tag graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub tag_name: String,
    /// `None` for root tags.
    pub parent_tag_id: Option<Uuid>,
    /// Confidence of the tagger that produced it, in [0, 1].
    pub confidence: f64,
    pub source: String,
}

impl Tag {
    pub fn new(tag_name: impl Into<String>, parent_tag_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tag_name: tag_name.into(),
            parent_tag_id,
            confidence: 1.0,
            source: "manual".to_string(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_tag_id.is_none()
    }
}

/// Request to record a durable merge rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTagMergeRule {
    /// Raw label of the tag that was merged away.
    pub source_label: String,
    pub canonical_tag_id: Uuid,
    pub canonical_tag_name: String,
    /// Optional scope in which the rule applies; `None` applies everywhere.
    pub context: Option<String>,
    pub created_by: String,
}

impl NewTagMergeRule {
    /// Folded label used for lookups.
    pub fn source_label_normalized(&self) -> String {
        normalize_key(&self.source_label)
    }
}

/// A durable `source label → canonical tag` rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagMergeRule {
    pub id: Uuid,
    pub source_label: String,
    pub source_label_normalized: String,
    pub canonical_tag_id: Uuid,
    pub canonical_tag_name: String,
    pub context: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Kind of change recorded in the tag audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagAuditAction {
    /// A document's tag was renamed onto the canonical tag by a merge.
    Merged,
}

impl std::fmt::Display for TagAuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Merged => write!(f, "merged"),
        }
    }
}

/// One audit-log entry, written per affected document per renamed tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagAuditEntry {
    pub document_id: Uuid,
    pub action: TagAuditAction,
    pub old_tag_id: Uuid,
    pub old_tag_name: String,
    pub new_tag_id: Uuid,
    pub new_tag_name: String,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}
