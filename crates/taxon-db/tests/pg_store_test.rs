//! PostgreSQL store integration tests.
//!
//! Require a running database; run with
//! `cargo test -p taxon-db --features migrations -- --ignored`.

use taxon_db::test_fixtures::TestDatabase;
use taxon_db::{
    EntityStore, Lexicon, NewTagMergeRule, OntologyPredicate, Relations, Taxonomy,
    TaxonomyStatus, UpsertLexiconTerm, UpsertRegion, UpsertRelation, UpsertTaxonomyNode,
};

async fn setup() -> TestDatabase {
    let test_db = TestDatabase::new()
        .await
        .expect("Failed to create test database");
    test_db.db.migrate().await.expect("Failed to run migrations");
    test_db
}

fn node(code: &str, level: u8, parent_id: Option<uuid::Uuid>) -> UpsertTaxonomyNode {
    UpsertTaxonomyNode {
        code: code.to_string(),
        name: code.to_uppercase(),
        description: None,
        parent_id,
        level,
        icon: None,
        color: Some("#336699".to_string()),
        status: TaxonomyStatus::Approved,
        synonyms: vec!["alt".to_string()],
        keywords: vec![],
    }
}

#[tokio::test]
#[ignore]
async fn test_taxonomy_upsert_is_idempotent() {
    let test_db = setup().await;
    let repo = &test_db.db.taxonomy;

    let first = repo.upsert(vec![node("pwa", 1, None)]).await.unwrap();
    let second = repo.upsert(vec![node("pwa", 1, None)]).await.unwrap();
    assert_eq!(first[0].id, second[0].id);

    let child = repo
        .upsert(vec![node("pwa.world", 2, Some(first[0].id))])
        .await
        .unwrap();
    assert_eq!(child[0].parent_id, Some(first[0].id));

    let found = repo
        .select_by_keys(&["pwa".to_string(), "pwa.world".to_string(), "nope".to_string()])
        .await
        .unwrap();
    assert_eq!(found.len(), 2);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn test_lexicon_conflicts_on_normalized_term() {
    let test_db = setup().await;
    let repo = &test_db.db.lexicon;

    let a = repo
        .upsert(vec![UpsertLexiconTerm::new("Hipertensão", "pressão alta")])
        .await
        .unwrap();
    let b = repo
        .upsert(vec![UpsertLexiconTerm::new("hipertensao", "pressão arterial alta")])
        .await
        .unwrap();
    assert_eq!(a[0].id, b[0].id);
    assert_eq!(b[0].definition, "pressão arterial alta");

    let removed = EntityStore::<Lexicon>::delete_by_ids(repo, &[a[0].id])
        .await
        .unwrap();
    assert_eq!(removed, 1);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn test_region_upsert_merges_pronunciations() {
    let test_db = setup().await;
    let repo = &test_db.db.regions;
    let region = |name: Option<&str>, term: &str, pronunciation: &str| UpsertRegion {
        region_code: "pt-BR-RS".to_string(),
        name: name.map(str::to_string),
        pronunciations: [(term.to_string(), pronunciation.to_string())].into(),
    };

    repo.upsert(vec![region(Some("Rio Grande do Sul"), "bah", "bá")])
        .await
        .unwrap();
    let merged = repo.upsert(vec![region(None, "tchê", "tchê")]).await.unwrap();

    assert_eq!(merged[0].name.as_deref(), Some("Rio Grande do Sul"));
    assert_eq!(merged[0].pronunciations.len(), 2);
    assert_eq!(merged[0].pronunciations["bah"], "bá");

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn test_relation_select_by_triple() {
    let test_db = setup().await;
    let db = &test_db.db;

    let nodes = EntityStore::<Taxonomy>::upsert(&db.taxonomy, vec![node("root", 1, None)])
        .await
        .unwrap();
    let concepts = db
        .concepts
        .upsert(vec![
            taxon_db::UpsertConcept {
                name: "Aspirina".to_string(),
                name_normalized: "aspirina".to_string(),
                taxonomy_id: Some(nodes[0].id),
                properties: Default::default(),
            },
            taxon_db::UpsertConcept {
                name: "Febre".to_string(),
                name_normalized: "febre".to_string(),
                taxonomy_id: None,
                properties: Default::default(),
            },
        ])
        .await
        .unwrap();

    let relation =
        UpsertRelation::new(concepts[0].id, OntologyPredicate::Treats, concepts[1].id, Some(0.8))
            .unwrap();
    let key = relation.triple_key();
    EntityStore::<Relations>::upsert(&db.relations, vec![relation])
        .await
        .unwrap();

    let found = EntityStore::<Relations>::select_by_keys(&db.relations, &[key])
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].weight, Some(0.8));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn test_merge_rule_context_is_part_of_key() {
    use taxon_db::TagStore;

    let test_db = setup().await;
    let tags = &test_db.db.tags;
    let canonical_id = uuid::Uuid::new_v4();
    sqlx::query("INSERT INTO tag (id, tag_name, confidence, source) VALUES ($1, 'IPCA', 1.0, 'manual')")
        .bind(canonical_id)
        .execute(test_db.pool())
        .await
        .unwrap();

    let rule = |context: Option<&str>| NewTagMergeRule {
        source_label: "ipca".to_string(),
        canonical_tag_id: canonical_id,
        canonical_tag_name: "IPCA".to_string(),
        context: context.map(str::to_string),
        created_by: "tester".to_string(),
    };
    tags.upsert_merge_rule(rule(None)).await.unwrap();
    tags.upsert_merge_rule(rule(Some("economia"))).await.unwrap();
    tags.upsert_merge_rule(rule(None)).await.unwrap();

    let rules = tags.find_merge_rules("ipca").await.unwrap();
    assert_eq!(rules.len(), 2);

    test_db.cleanup().await;
}
