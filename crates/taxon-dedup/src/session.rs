//! Operator review of suggestions.
//!
//! Each suggestion moves `proposed → confirmed` or `proposed → dismissed`
//! exactly once. Dismissals live only as long as the session. Confirming is
//! the only operation that writes to the tag store.

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use taxon_core::{
    Error, NewTagMergeRule, Result, TagAuditAction, TagAuditEntry, TagMergeRule, TagStore,
};

use crate::config::DedupConfig;
use crate::suggestions::{propose_suggestions, Suggestion, SuggestionKind};

/// Review state of a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Proposed,
    Confirmed,
    Dismissed,
}

impl std::fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Proposed => write!(f, "proposed"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Dismissed => write!(f, "dismissed"),
        }
    }
}

/// Operator decision on a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Confirm,
    Dismiss,
}

impl std::str::FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "confirm" => Ok(Self::Confirm),
            "dismiss" => Ok(Self::Dismiss),
            _ => Err(format!(
                "Invalid decision '{}': expected confirm or dismiss",
                s
            )),
        }
    }
}

/// Who applies a suggestion, and where the resulting merge rule applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOptions {
    pub actor: String,
    /// Scope of the merge rule; `None` applies everywhere.
    pub context: Option<String>,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            actor: "taxon".to_string(),
            context: None,
        }
    }
}

/// What applying a decision changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub children_moved: u64,
    pub documents_retagged: u64,
    pub audit_entries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_rule: Option<TagMergeRule>,
    /// Other suggestions dismissed because they referenced a deleted tag.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub superseded: Vec<Uuid>,
}

/// Suggestions under review against one tag store.
pub struct SuggestionSession<'a> {
    store: &'a dyn TagStore,
    suggestions: Vec<Suggestion>,
    status: HashMap<Uuid, SuggestionStatus>,
}

impl<'a> SuggestionSession<'a> {
    /// Read the tag graph and propose suggestions.
    pub async fn load(store: &'a dyn TagStore, config: &DedupConfig) -> Result<Self> {
        config.validate()?;
        let tags = store.list_tags().await?;
        let suggestions = propose_suggestions(&tags, config);
        Ok(Self::from_suggestions(store, suggestions))
    }

    /// Review an existing list of suggestions.
    pub fn from_suggestions(store: &'a dyn TagStore, suggestions: Vec<Suggestion>) -> Self {
        let status = suggestions
            .iter()
            .map(|s| (s.id, SuggestionStatus::Proposed))
            .collect();
        Self {
            store,
            suggestions,
            status,
        }
    }

    /// Every suggestion, in ranking order, whatever its status.
    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    /// Suggestions still awaiting a decision.
    pub fn pending(&self) -> Vec<&Suggestion> {
        self.suggestions
            .iter()
            .filter(|s| self.status(s.id) == Some(SuggestionStatus::Proposed))
            .collect()
    }

    pub fn get(&self, id: Uuid) -> Option<&Suggestion> {
        self.suggestions.iter().find(|s| s.id == id)
    }

    pub fn status(&self, id: Uuid) -> Option<SuggestionStatus> {
        self.status.get(&id).copied()
    }

    /// Apply an operator decision.
    pub async fn apply(
        &mut self,
        id: Uuid,
        decision: Decision,
        options: &ApplyOptions,
    ) -> Result<ApplyOutcome> {
        match decision {
            Decision::Confirm => self.confirm(id, options).await,
            Decision::Dismiss => {
                self.dismiss(id)?;
                Ok(ApplyOutcome::default())
            }
        }
    }

    /// Suppress a suggestion for the rest of the session. Dismissing twice
    /// is a no-op; dismissing a confirmed suggestion is a conflict.
    pub fn dismiss(&mut self, id: Uuid) -> Result<()> {
        match self.status(id) {
            None => Err(Error::NotFound(format!("suggestion {}", id))),
            Some(SuggestionStatus::Confirmed) => Err(Error::Conflict(format!(
                "suggestion {} is already confirmed",
                id
            ))),
            Some(_) => {
                self.status.insert(id, SuggestionStatus::Dismissed);
                debug!(
                    subsystem = "dedup",
                    component = "session",
                    op = "dismiss",
                    suggestion_id = %id,
                    "Suggestion dismissed"
                );
                Ok(())
            }
        }
    }

    /// Apply a proposed suggestion to the store.
    pub async fn confirm(&mut self, id: Uuid, options: &ApplyOptions) -> Result<ApplyOutcome> {
        let suggestion = self
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("suggestion {}", id)))?;
        match self.status(id) {
            Some(SuggestionStatus::Proposed) => {}
            Some(status) => {
                return Err(Error::Conflict(format!(
                    "suggestion {} is already {}",
                    id, status
                )))
            }
            None => return Err(Error::NotFound(format!("suggestion {}", id))),
        }

        let start = Instant::now();
        let mut outcome = match suggestion.kind {
            SuggestionKind::Merge => self.apply_merge(&suggestion, options).await?,
            SuggestionKind::Adopt => {
                self.store
                    .set_parent(suggestion.source.id, Some(suggestion.target.id))
                    .await?;
                ApplyOutcome::default()
            }
        };
        self.status.insert(id, SuggestionStatus::Confirmed);

        if suggestion.kind == SuggestionKind::Merge {
            outcome.superseded = self.supersede(suggestion.source.id);
        }

        info!(
            subsystem = "dedup",
            component = "session",
            op = "apply",
            suggestion_id = %id,
            kind = %suggestion.kind,
            source = %suggestion.source.name,
            target = %suggestion.target.name,
            children_moved = outcome.children_moved,
            documents_retagged = outcome.documents_retagged,
            audit_entries = outcome.audit_entries,
            superseded = outcome.superseded.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Suggestion applied"
        );
        Ok(outcome)
    }

    async fn apply_merge(
        &self,
        suggestion: &Suggestion,
        options: &ApplyOptions,
    ) -> Result<ApplyOutcome> {
        let canonical = &suggestion.target;
        let duplicate = &suggestion.source;

        let children_moved = self
            .store
            .reparent_children(duplicate.id, canonical.id)
            .await?;

        let documents = self.store.documents_for_tag(duplicate.id).await?;
        let documents_retagged = self
            .store
            .retag_documents(duplicate.id, canonical.id)
            .await?;

        let now = Utc::now();
        let entries: Vec<TagAuditEntry> = documents
            .into_iter()
            .map(|document_id| TagAuditEntry {
                document_id,
                action: TagAuditAction::Merged,
                old_tag_id: duplicate.id,
                old_tag_name: duplicate.name.clone(),
                new_tag_id: canonical.id,
                new_tag_name: canonical.name.clone(),
                actor: options.actor.clone(),
                created_at: now,
            })
            .collect();
        let audit_entries = entries.len();
        if !entries.is_empty() {
            self.store.record_audit(entries).await?;
        }

        self.store.delete_tags(&[duplicate.id]).await?;

        let rule = self
            .store
            .upsert_merge_rule(NewTagMergeRule {
                source_label: duplicate.name.clone(),
                canonical_tag_id: canonical.id,
                canonical_tag_name: canonical.name.clone(),
                context: options.context.clone(),
                created_by: options.actor.clone(),
            })
            .await?;

        Ok(ApplyOutcome {
            children_moved,
            documents_retagged,
            audit_entries,
            merge_rule: Some(rule),
            superseded: Vec::new(),
        })
    }

    /// Dismiss pending suggestions that reference a deleted tag.
    fn supersede(&mut self, deleted: Uuid) -> Vec<Uuid> {
        let stale: Vec<Uuid> = self
            .suggestions
            .iter()
            .filter(|s| s.source.id == deleted || s.target.id == deleted)
            .filter(|s| self.status(s.id) == Some(SuggestionStatus::Proposed))
            .map(|s| s.id)
            .collect();
        for id in &stale {
            self.status.insert(*id, SuggestionStatus::Dismissed);
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_parsing() {
        assert_eq!("Confirm".parse::<Decision>().unwrap(), Decision::Confirm);
        assert_eq!(" dismiss ".parse::<Decision>().unwrap(), Decision::Dismiss);
        assert!("maybe".parse::<Decision>().is_err());
    }

    #[test]
    fn test_outcome_serialization_skips_empty_fields() {
        let json = serde_json::to_value(ApplyOutcome::default()).unwrap();
        assert!(json.get("merge_rule").is_none());
        assert!(json.get("superseded").is_none());
        assert_eq!(json["children_moved"], 0);
    }
}
