//! End-to-end import scenarios against the in-memory store.
//!
//! Each test drives `ImportService` with tabular text, the way the CLI
//! does, and inspects the rows and store calls left behind.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use taxon_core::{
    Concepts, EntityStore, ImportReport, Lexicon, Regions, Relations, Taxonomy, UpsertRegion,
};
use taxon_db::MemoryStore;
use taxon_import::{
    ChunkProgress, EntityKind, ImportConfig, ImportProgress, ImportService, ImportStores,
};

fn service(store: &Arc<MemoryStore>, config: ImportConfig) -> ImportService {
    ImportService::new(ImportStores::from_shared(store.clone()), config)
}

fn taxonomy_rows(rows: &[(&str, &str, u8, &str)]) -> String {
    let mut text = String::from("code,name,level,parent_code\n");
    for (code, name, level, parent) in rows {
        text.push_str(&format!("{},{},{},{}\n", code, name, level, parent));
    }
    text
}

// =============================================================================
// TAXONOMY
// =============================================================================

#[tokio::test]
async fn test_parent_and_child_resolved_in_one_file() {
    let store = Arc::new(MemoryStore::new());
    let text = taxonomy_rows(&[("pwa.world", "World", 2, "pwa"), ("pwa", "PWA", 1, "")]);

    let report = service(&store, ImportConfig::default())
        .import(EntityKind::Taxonomy, &text)
        .await
        .unwrap();

    assert_eq!(report.success_count, 2);
    assert!(report.is_clean(), "{:?}", report.errors);

    let rows = store.rows::<Taxonomy>();
    let root = rows.iter().find(|r| r.code == "pwa").unwrap();
    let child = rows.iter().find(|r| r.code == "pwa.world").unwrap();
    assert_eq!(root.parent_id, None);
    assert_eq!(child.parent_id, Some(root.id));
}

#[tokio::test]
async fn test_reimport_leaves_row_count_unchanged() {
    let store = Arc::new(MemoryStore::new());
    let text = taxonomy_rows(&[
        ("saude", "Saúde", 1, ""),
        ("saude.cardio", "Cardiologia", 2, "saude"),
        ("saude.cardio.has", "Hipertensão", 3, "saude.cardio"),
    ]);
    let service = service(&store, ImportConfig::default());

    service.import(EntityKind::Taxonomy, &text).await.unwrap();
    let ids: BTreeMap<String, uuid::Uuid> = store
        .rows::<Taxonomy>()
        .into_iter()
        .map(|r| (r.code.clone(), r.id))
        .collect();

    let report = service.import(EntityKind::Taxonomy, &text).await.unwrap();
    assert!(report.is_clean());
    assert_eq!(store.count::<Taxonomy>(), 3);
    for row in store.rows::<Taxonomy>() {
        assert_eq!(ids.get(&row.code), Some(&row.id));
    }
}

#[tokio::test]
async fn test_unresolved_parent_reported_exactly_once() {
    let store = Arc::new(MemoryStore::new());
    let text = taxonomy_rows(&[("root", "Root", 1, ""), ("orphan", "Orphan", 2, "ghost")]);

    let report = service(&store, ImportConfig::default())
        .import(EntityKind::Taxonomy, &text)
        .await
        .unwrap();

    assert_eq!(report.success_count, 1);
    let mentions: Vec<_> = report
        .errors
        .iter()
        .filter(|e| e.contains("ghost"))
        .collect();
    assert_eq!(mentions.len(), 1, "{:?}", report.errors);
    assert!(mentions[0].contains("orphan"));
    assert_eq!(store.count::<Taxonomy>(), 1);
}

#[tokio::test]
async fn test_invalid_rows_reported_with_line_numbers() {
    let store = Arc::new(MemoryStore::new());
    let text = "code,name,level,parent_code,color\n\
                ok,Fine,1,,#112233\n\
                bad,Bad,9,,\n\
                ,Nameless,1,,\n\
                tint,Tint,1,,red\n";

    let report = service(&store, ImportConfig::default())
        .import(EntityKind::Taxonomy, text)
        .await
        .unwrap();

    assert_eq!(report.success_count, 1);
    let lines: std::collections::BTreeSet<&str> = report
        .errors
        .iter()
        .filter_map(|e| e.split(':').next())
        .collect();
    assert_eq!(
        lines.into_iter().collect::<Vec<_>>(),
        vec!["row 3", "row 4", "row 5"],
        "{:?}",
        report.errors
    );
}

#[tokio::test]
async fn test_failed_chunk_does_not_roll_back_others() {
    let store = Arc::new(MemoryStore::new().fail_upserts_containing("n05"));
    let rows: Vec<(String, String, u8, &str)> = (0..9)
        .map(|i| (format!("n{:02}", i), format!("Node {}", i), 1, ""))
        .collect();
    let rows: Vec<(&str, &str, u8, &str)> = rows
        .iter()
        .map(|(c, n, l, p)| (c.as_str(), n.as_str(), *l, *p))
        .collect();
    let config = ImportConfig::default().with_chunk_size(3).with_concurrency(2);

    let report = service(&store, config)
        .import(EntityKind::Taxonomy, &taxonomy_rows(&rows))
        .await
        .unwrap();

    assert_eq!(report.success_count, 6);
    assert_eq!(report.errors.len(), 1);
    assert!(
        report.errors[0].starts_with("level 1, chunk 2 of 3 (items 4-6"),
        "{}",
        report.errors[0]
    );
    assert_eq!(store.count::<Taxonomy>(), 6);
}

#[tokio::test]
async fn test_missing_required_column_fails_whole_file() {
    let store = Arc::new(MemoryStore::new());
    let err = service(&store, ImportConfig::default())
        .import(EntityKind::Taxonomy, "code,name\nx,X\n")
        .await
        .unwrap_err();

    assert!(err.to_string().contains("level"));
    assert!(store.calls().is_empty());
}

// =============================================================================
// PREVIEW
// =============================================================================

#[test]
fn test_preview_counts_without_store_calls() {
    let store = Arc::new(MemoryStore::new());
    let text = "term,definition\n\
                Hipertensão,Pressão alta\n\
                ,missing term\n\
                Diabetes,\n\
                Asma,Doença respiratória\n";

    let preview = service(&store, ImportConfig::default())
        .preview(EntityKind::Lexicon, text)
        .unwrap();

    assert_eq!(preview.total_rows, 4);
    assert_eq!(preview.valid_rows, 2);
    assert_eq!(preview.invalid_rows, 2);
    assert_eq!(preview.errors.len(), 2);
    assert!(store.calls().is_empty());
}

// =============================================================================
// LEXICON AND REGIONAL
// =============================================================================

#[tokio::test]
async fn test_lexicon_upserts_by_normalized_term() {
    let store = Arc::new(MemoryStore::new());
    let service = service(&store, ImportConfig::default());

    service
        .import(EntityKind::Lexicon, "term,definition\nPressão Arterial,first\n")
        .await
        .unwrap();
    service
        .import(EntityKind::Lexicon, "term,definition\npressao  arterial,second\n")
        .await
        .unwrap();

    let rows = store.rows::<Lexicon>();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].term_normalized, "pressao arterial");
    assert_eq!(rows[0].definition, "second");
}

#[tokio::test]
async fn test_regional_overrides_merge_into_existing_map() {
    let store = Arc::new(MemoryStore::new());
    let mut region = UpsertRegion {
        region_code: "pt-BR-RJ".to_string(),
        name: Some("Rio de Janeiro".to_string()),
        pronunciations: BTreeMap::new(),
    };
    region
        .pronunciations
        .insert("festa".to_string(), "fésh-ta".to_string());
    EntityStore::<Regions>::upsert(store.as_ref(), vec![region])
        .await
        .unwrap();

    let text = "region_code,term,pronunciation\n\
                pt-BR-RJ,Mesmo,mêj-mu\n\
                pt-XX,mesmo,?\n";
    let report = service(&store, ImportConfig::default())
        .import(EntityKind::Regional, text)
        .await
        .unwrap();

    assert_eq!(report.success_count, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("region 'pt-XX' not found"));

    let regions = store.rows::<Regions>();
    assert_eq!(regions.len(), 1);
    let map = &regions[0].pronunciations;
    assert_eq!(map.get("festa").map(String::as_str), Some("fésh-ta"));
    assert_eq!(map.get("mesmo").map(String::as_str), Some("mêj-mu"));
}

// =============================================================================
// ONTOLOGY
// =============================================================================

#[tokio::test]
async fn test_concepts_link_to_taxonomy_codes() {
    let store = Arc::new(MemoryStore::new());
    let service = service(&store, ImportConfig::default());
    service
        .import(EntityKind::Taxonomy, &taxonomy_rows(&[("saude", "Saúde", 1, "")]))
        .await
        .unwrap();

    let text = "name,taxonomy_code,properties\n\
                Hipertensão,saude,\"{\"\"icd10\"\": \"\"I10\"\"}\"\n\
                Asma,nowhere,\n";
    let report = service.import(EntityKind::Concepts, text).await.unwrap();

    assert_eq!(report.success_count, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("taxonomy code 'nowhere' not found"));

    let taxonomy_id = store.rows::<Taxonomy>()[0].id;
    let concepts = store.rows::<Concepts>();
    assert_eq!(concepts[0].taxonomy_id, Some(taxonomy_id));
    assert_eq!(
        concepts[0].properties.to_json(),
        serde_json::json!({"icd10": "I10"})
    );
}

#[tokio::test]
async fn test_self_relation_rejected_before_store() {
    let store = Arc::new(MemoryStore::new());
    let text = "subject,predicate,object\nAsma,related_to,asma\n";

    let report = service(&store, ImportConfig::default())
        .import(EntityKind::Relations, text)
        .await
        .unwrap();

    assert_eq!(report.success_count, 0);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("self-relation"));
    assert!(store.calls().is_empty(), "{:?}", store.calls());
    assert_eq!(store.upsert_calls("ontology_relation"), 0);
}

#[tokio::test]
async fn test_relations_resolve_concepts_and_upsert_by_triple() {
    let store = Arc::new(MemoryStore::new());
    let service = service(&store, ImportConfig::default());
    service
        .import(EntityKind::Concepts, "name\nLosartana\nHipertensão\n")
        .await
        .unwrap();

    let text = "subject,predicate,object,weight\n\
                Losartana,treats,hipertensao,0.9\n\
                Losartana,treats,Hipertensão,0.7\n\
                Losartana,causes,Tosse,\n";
    let report = service.import(EntityKind::Relations, text).await.unwrap();

    assert_eq!(report.success_count, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("Tosse"));

    let edges = store.rows::<Relations>();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].weight, Some(0.7));
}

// =============================================================================
// PROGRESS
// =============================================================================

#[derive(Default)]
struct Recorder {
    levels: Mutex<Vec<u8>>,
    chunks: Mutex<Vec<ChunkProgress>>,
    finished: Mutex<Vec<(&'static str, usize)>>,
}

impl ImportProgress for Recorder {
    fn level_started(&self, level: u8, _rows: usize) {
        self.levels.lock().unwrap().push(level);
    }

    fn chunk_finished(&self, chunk: &ChunkProgress) {
        self.chunks.lock().unwrap().push(chunk.clone());
    }

    fn import_finished(&self, entity: &'static str, report: &ImportReport) {
        self.finished
            .lock()
            .unwrap()
            .push((entity, report.success_count));
    }
}

#[tokio::test]
async fn test_progress_follows_levels_in_order() {
    let store = Arc::new(MemoryStore::new());
    let recorder = Arc::new(Recorder::default());
    let text = taxonomy_rows(&[
        ("a.b.c", "C", 3, "a.b"),
        ("a.b", "B", 2, "a"),
        ("a", "A", 1, ""),
    ]);

    service(&store, ImportConfig::default())
        .with_progress(recorder.clone())
        .import(EntityKind::Taxonomy, &text)
        .await
        .unwrap();

    assert_eq!(*recorder.levels.lock().unwrap(), vec![1, 2, 3]);
    let chunks = recorder.chunks.lock().unwrap();
    assert_eq!(chunks.len(), 3);
    assert!(chunks.iter().all(|c| c.error.is_none()));
    assert_eq!(*recorder.finished.lock().unwrap(), vec![("taxonomy", 3)]);
}
