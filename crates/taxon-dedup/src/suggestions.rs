//! Merge and adopt suggestions over the tag graph.
//!
//! [`propose_suggestions`] is pure: it reads a snapshot of tags and returns
//! ranked suggestions without touching any store. Applying them is the job
//! of [`SuggestionSession`](crate::session::SuggestionSession).
//!
//! Two passes run over the snapshot:
//! - **merge**: every unordered pair of root tags (root threshold) and of
//!   siblings under one parent (sibling threshold);
//! - **adopt**: every root tag without children against tags that already
//!   have children; each orphan keeps only its best parent.
//!
//! A root that has children counts as a parent, not an orphan: it is never
//! proposed for adoption, only offered as an adoption target.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use uuid::Uuid;

use taxon_core::Tag;

use crate::config::DedupConfig;
use crate::heuristics::{Assessment, Heuristics, MergeReason};

/// What confirming a suggestion does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    /// Fold `source` into `target` and delete `source`.
    Merge,
    /// Make `target` the parent of the orphan `source`.
    Adopt,
}

impl SuggestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Adopt => "adopt",
        }
    }
}

impl std::fmt::Display for SuggestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag id and name as seen when the suggestion was proposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRef {
    pub id: Uuid,
    pub name: String,
}

impl From<&Tag> for TagRef {
    fn from(tag: &Tag) -> Self {
        Self {
            id: tag.id,
            name: tag.tag_name.clone(),
        }
    }
}

/// A proposed edit to the tag graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Stable for the same pair and kind across runs.
    pub id: Uuid,
    pub kind: SuggestionKind,
    /// Canonical tag (merge) or proposed parent (adopt).
    pub target: TagRef,
    /// Duplicate tag (merge) or orphan (adopt).
    pub source: TagRef,
    /// Parent shared by a merged pair; `None` for roots and adoptions.
    pub scope_parent_id: Option<Uuid>,
    pub confidence: f64,
    pub similarity: f64,
    pub reasons: Vec<MergeReason>,
}

/// Deterministic suggestion id. Merge pairs are unordered; adopt pairs are
/// `(orphan, parent)`.
pub fn suggestion_id(kind: SuggestionKind, a: Uuid, b: Uuid) -> Uuid {
    let (first, second) = match kind {
        SuggestionKind::Merge if b < a => (b, a),
        _ => (a, b),
    };
    let name = format!("{}:{}:{}", kind, first, second);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

/// Propose merges and adoptions for `tags`, highest confidence first.
pub fn propose_suggestions(tags: &[Tag], config: &DedupConfig) -> Vec<Suggestion> {
    let start = Instant::now();
    let heuristics = Heuristics::new(config);

    let mut children: HashMap<Uuid, usize> = HashMap::new();
    for tag in tags {
        if let Some(parent) = tag.parent_tag_id {
            *children.entry(parent).or_default() += 1;
        }
    }

    let mut suggestions = merge_pass(tags, &heuristics, config, &children);
    let merged: HashSet<(Uuid, Uuid)> = suggestions
        .iter()
        .map(|s| unordered(s.source.id, s.target.id))
        .collect();
    let merge_count = suggestions.len();
    suggestions.extend(adopt_pass(tags, &heuristics, config, &children, &merged));

    suggestions.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| b.similarity.total_cmp(&a.similarity))
            .then_with(|| a.id.cmp(&b.id))
    });

    debug!(
        subsystem = "dedup",
        component = "suggestions",
        op = "propose",
        tag_count = tags.len(),
        merge_count,
        adopt_count = suggestions.len() - merge_count,
        duration_ms = start.elapsed().as_millis() as u64,
        "Proposed suggestions"
    );
    suggestions
}

fn merge_pass(
    tags: &[Tag],
    heuristics: &Heuristics,
    config: &DedupConfig,
    children: &HashMap<Uuid, usize>,
) -> Vec<Suggestion> {
    let mut scopes: BTreeMap<Option<Uuid>, Vec<&Tag>> = BTreeMap::new();
    for tag in tags {
        scopes.entry(tag.parent_tag_id).or_default().push(tag);
    }

    let mut suggestions = Vec::new();
    for (parent, members) in &scopes {
        let threshold = match parent {
            None => config.root_threshold,
            Some(_) => config.sibling_threshold,
        };
        for (i, a) in members.iter().enumerate() {
            for b in &members[i + 1..] {
                let assessment = heuristics.assess(&a.tag_name, &b.tag_name, threshold);
                trace!(
                    subsystem = "dedup",
                    component = "suggestions",
                    left = %a.tag_name,
                    right = %b.tag_name,
                    confidence = assessment.confidence,
                    "Compared siblings"
                );
                if !assessment.is_candidate() {
                    continue;
                }
                let (target, source) = canonical_first(a, b, children);
                suggestions.push(build(
                    SuggestionKind::Merge,
                    target,
                    source,
                    *parent,
                    assessment,
                ));
            }
        }
    }
    suggestions
}

fn adopt_pass(
    tags: &[Tag],
    heuristics: &Heuristics,
    config: &DedupConfig,
    children: &HashMap<Uuid, usize>,
    merged: &HashSet<(Uuid, Uuid)>,
) -> Vec<Suggestion> {
    let has_children = |tag: &Tag| children.get(&tag.id).copied().unwrap_or(0) > 0;
    let parents: Vec<&Tag> = tags.iter().filter(|t| has_children(t)).collect();

    let mut suggestions = Vec::new();
    for orphan in tags.iter().filter(|t| t.is_root() && !has_children(t)) {
        let mut best: Option<(&Tag, Assessment)> = None;
        for parent in parents.iter().copied() {
            if parent.id == orphan.id || merged.contains(&unordered(orphan.id, parent.id)) {
                continue;
            }
            let assessment =
                heuristics.assess(&orphan.tag_name, &parent.tag_name, config.adopt_threshold);
            if !assessment.is_candidate() || assessment.confidence < config.adopt_threshold {
                continue;
            }
            let better = match &best {
                None => true,
                Some((_, current)) => assessment
                    .confidence
                    .total_cmp(&current.confidence)
                    .then_with(|| assessment.similarity.total_cmp(&current.similarity))
                    .is_gt(),
            };
            if better {
                best = Some((parent, assessment));
            }
        }
        if let Some((parent, assessment)) = best {
            trace!(
                subsystem = "dedup",
                component = "suggestions",
                orphan = %orphan.tag_name,
                parent = %parent.tag_name,
                confidence = assessment.confidence,
                "Adoption candidate"
            );
            suggestions.push(build(SuggestionKind::Adopt, parent, orphan, None, assessment));
        }
    }
    suggestions
}

fn build(
    kind: SuggestionKind,
    target: &Tag,
    source: &Tag,
    scope_parent_id: Option<Uuid>,
    assessment: Assessment,
) -> Suggestion {
    let id = match kind {
        SuggestionKind::Merge => suggestion_id(kind, target.id, source.id),
        SuggestionKind::Adopt => suggestion_id(kind, source.id, target.id),
    };
    Suggestion {
        id,
        kind,
        target: target.into(),
        source: source.into(),
        scope_parent_id,
        confidence: assessment.confidence,
        similarity: assessment.similarity,
        reasons: assessment.reasons,
    }
}

/// Order a pair as `(canonical, duplicate)`: higher tagger confidence wins,
/// then more children, then the lexicographically smaller name.
fn canonical_first<'t>(
    a: &'t Tag,
    b: &'t Tag,
    children: &HashMap<Uuid, usize>,
) -> (&'t Tag, &'t Tag) {
    let count = |t: &Tag| children.get(&t.id).copied().unwrap_or(0);
    let order = b
        .confidence
        .total_cmp(&a.confidence)
        .then_with(|| count(b).cmp(&count(a)))
        .then_with(|| a.tag_name.cmp(&b.tag_name))
        .then_with(|| a.id.cmp(&b.id));
    if order.is_le() {
        (a, b)
    } else {
        (b, a)
    }
}

fn unordered(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
