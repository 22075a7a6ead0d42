//! Merge-rule lookup for incoming raw labels.

use tracing::debug;

use taxon_core::normalize::normalize_key;
use taxon_core::{Result, TagMergeRule, TagStore};

/// Find the merge rule that snaps `raw_label` to a canonical tag.
///
/// Labels are compared folded. A rule scoped to `context` beats a
/// context-free rule; rules scoped to other contexts never match.
pub async fn canonicalize_label(
    store: &dyn TagStore,
    raw_label: &str,
    context: Option<&str>,
) -> Result<Option<TagMergeRule>> {
    let normalized = normalize_key(raw_label);
    if normalized.is_empty() {
        return Ok(None);
    }
    let rules = store.find_merge_rules(&normalized).await?;

    let scoped = context.and_then(|ctx| {
        rules
            .iter()
            .find(|r| r.context.as_deref() == Some(ctx))
            .cloned()
    });
    let rule = scoped.or_else(|| rules.into_iter().find(|r| r.context.is_none()));

    debug!(
        subsystem = "dedup",
        component = "rules",
        op = "canonicalize",
        label = %normalized,
        context = context.unwrap_or(""),
        matched = rule.is_some(),
        "Merge rule lookup"
    );
    Ok(rule)
}
