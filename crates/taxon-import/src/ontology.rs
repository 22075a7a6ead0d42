//! Ontology concept and relation import.
//!
//! Concepts link to taxonomy nodes by `code`; relations link concepts by
//! normalized name. Unknown references are row errors.

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use taxon_core::normalize::collapse_whitespace;
use taxon_core::{
    normalize_key, Concepts, EntityStore, ImportReport, OntologyConceptRecord,
    OntologyRelationRecord, Relations, Result, Taxonomy, UpsertConcept, UpsertRelation,
};

use crate::batcher::UpsertBatcher;
use crate::config::ImportConfig;
use crate::keys::collapse_by_key;
use crate::progress::ImportProgress;
use crate::validate::row_error;

/// Upsert concepts by normalized name, resolving `taxonomy_code`.
pub async fn import_concepts(
    concepts: &dyn EntityStore<Concepts>,
    taxonomy: &dyn EntityStore<Taxonomy>,
    records: Vec<(usize, OntologyConceptRecord)>,
    config: &ImportConfig,
    progress: &dyn ImportProgress,
) -> Result<ImportReport> {
    let start = Instant::now();
    let records = collapse_by_key("ontology_concept", records, |r| normalize_key(&r.name));

    let codes: Vec<String> = records
        .iter()
        .filter_map(|(_, r)| r.taxonomy_code.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let nodes: HashMap<String, Uuid> = if codes.is_empty() {
        HashMap::new()
    } else {
        taxonomy
            .select_by_keys(&codes)
            .await?
            .into_iter()
            .map(|n| (n.record.code, n.id))
            .collect()
    };
    debug!(
        subsystem = "import",
        component = "ontology",
        requested = codes.len(),
        found = nodes.len(),
        "Resolved taxonomy codes"
    );

    let mut report = ImportReport::new();
    let mut batch = Vec::with_capacity(records.len());
    for (line, record) in records {
        let taxonomy_id = match record.taxonomy_code.as_ref() {
            None => None,
            Some(code) => match nodes.get(code) {
                Some(id) => Some(*id),
                None => {
                    warn!(
                        subsystem = "import",
                        component = "ontology",
                        line,
                        taxonomy_code = %code,
                        "Unknown taxonomy code"
                    );
                    report.push_error(row_error(
                        line,
                        format!(
                            "taxonomy code '{}' not found for concept '{}'",
                            code, record.name
                        ),
                    ));
                    continue;
                }
            },
        };
        batch.push(UpsertConcept {
            name_normalized: normalize_key(&record.name),
            name: collapse_whitespace(&record.name),
            taxonomy_id,
            properties: record.properties,
        });
    }

    if !batch.is_empty() {
        let outcome = UpsertBatcher::<Concepts>::new(concepts, config, progress)
            .run(batch, None)
            .await;
        report.absorb(outcome.report);
    }

    info!(
        subsystem = "import",
        component = "ontology",
        entity = "ontology_concept",
        success_count = report.success_count,
        error_count = report.errors.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Concept import finished"
    );
    Ok(report)
}

/// Upsert relations by `(subject, predicate, object)`, resolving concept
/// names.
///
/// Self-relations must already have been rejected by validation; the edge
/// constructor rejects any that fold to one id after lookup.
pub async fn import_relations(
    relations: &dyn EntityStore<Relations>,
    concepts: &dyn EntityStore<Concepts>,
    records: Vec<(usize, OntologyRelationRecord)>,
    config: &ImportConfig,
    progress: &dyn ImportProgress,
) -> Result<ImportReport> {
    let start = Instant::now();
    let mut report = ImportReport::new();
    if records.is_empty() {
        return Ok(report);
    }

    let names: Vec<String> = records
        .iter()
        .flat_map(|(_, r)| [normalize_key(&r.subject), normalize_key(&r.object)])
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let ids: HashMap<String, Uuid> = concepts
        .select_by_keys(&names)
        .await?
        .into_iter()
        .map(|c| (c.record.name_normalized, c.id))
        .collect();
    debug!(
        subsystem = "import",
        component = "ontology",
        requested = names.len(),
        found = ids.len(),
        "Resolved concept names"
    );

    let mut edges = Vec::with_capacity(records.len());
    for (line, record) in records {
        let subject = ids.get(&normalize_key(&record.subject));
        let object = ids.get(&normalize_key(&record.object));
        let (subject_id, object_id) = match (subject, object) {
            (Some(s), Some(o)) => (*s, *o),
            (s, o) => {
                let missing: Vec<&str> = [(s, &record.subject), (o, &record.object)]
                    .into_iter()
                    .filter(|(id, _)| id.is_none())
                    .map(|(_, name)| name.as_str())
                    .collect();
                report.push_error(row_error(
                    line,
                    format!("concept(s) not found: {}", missing.join(", ")),
                ));
                continue;
            }
        };
        match UpsertRelation::new(subject_id, record.predicate, object_id, record.weight) {
            Ok(edge) => edges.push((line, edge)),
            Err(e) => report.push_error(row_error(line, e)),
        }
    }

    let edges = collapse_by_key("ontology_relation", edges, UpsertRelation::triple_key);
    if !edges.is_empty() {
        let outcome = UpsertBatcher::<Relations>::new(relations, config, progress)
            .run(edges.into_iter().map(|(_, e)| e).collect(), None)
            .await;
        report.absorb(outcome.report);
    }

    info!(
        subsystem = "import",
        component = "ontology",
        entity = "ontology_relation",
        success_count = report.success_count,
        error_count = report.errors.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Relation import finished"
    );
    Ok(report)
}
