//! Ontology concept and relation repository implementations.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use taxon_core::{
    ConceptProperties, Concepts, EntityStore, Error, OntologyConcept, OntologyPredicate,
    OntologyRelation, Relations, Result, Stored, UpsertConcept, UpsertRelation,
};

const CONCEPT_COLUMNS: &str = "id, name, name_normalized, taxonomy_id, properties, updated_at";

const RELATION_COLUMNS: &str = "id, subject_id, predicate, object_id, weight, updated_at";

// =============================================================================
// CONCEPTS
// =============================================================================

/// PostgreSQL implementation of the concept store.
#[derive(Clone)]
pub struct PgConceptRepository {
    pool: Pool<Postgres>,
}

impl PgConceptRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn row_to_concept(row: &sqlx::postgres::PgRow) -> Result<OntologyConcept> {
        let properties: serde_json::Value = row.try_get("properties")?;
        Ok(Stored {
            id: row.try_get("id")?,
            record: UpsertConcept {
                name: row.try_get("name")?,
                name_normalized: row.try_get("name_normalized")?,
                taxonomy_id: row.try_get("taxonomy_id")?,
                properties: ConceptProperties::from_json(&properties)?,
            },
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl EntityStore<Concepts> for PgConceptRepository {
    async fn select_by_keys(&self, keys: &[String]) -> Result<Vec<OntologyConcept>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {} FROM ontology_concept WHERE name_normalized = ANY($1)",
            CONCEPT_COLUMNS
        ))
        .bind(keys)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::row_to_concept).collect()
    }

    async fn upsert(&self, concepts: Vec<UpsertConcept>) -> Result<Vec<OntologyConcept>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut stored = Vec::with_capacity(concepts.len());

        for concept in concepts {
            let row = sqlx::query(&format!(
                r#"
                INSERT INTO ontology_concept
                    (id, name, name_normalized, taxonomy_id, properties, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $6)
                ON CONFLICT (name_normalized) DO UPDATE SET
                    name = EXCLUDED.name,
                    taxonomy_id = EXCLUDED.taxonomy_id,
                    properties = EXCLUDED.properties,
                    updated_at = EXCLUDED.updated_at
                RETURNING {}
                "#,
                CONCEPT_COLUMNS
            ))
            .bind(Uuid::now_v7())
            .bind(&concept.name)
            .bind(&concept.name_normalized)
            .bind(concept.taxonomy_id)
            .bind(concept.properties.to_json())
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(Error::Database)?;

            stored.push(Self::row_to_concept(&row)?);
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(stored)
    }

    async fn delete_by_ids(&self, ids: &[Uuid]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM ontology_concept WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}

// =============================================================================
// RELATIONS
// =============================================================================

/// PostgreSQL implementation of the relation store.
#[derive(Clone)]
pub struct PgRelationRepository {
    pool: Pool<Postgres>,
}

impl PgRelationRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn row_to_relation(row: &sqlx::postgres::PgRow) -> Result<OntologyRelation> {
        let predicate: String = row.try_get("predicate")?;
        Ok(Stored {
            id: row.try_get("id")?,
            record: UpsertRelation {
                subject_id: row.try_get("subject_id")?,
                predicate: predicate
                    .parse::<OntologyPredicate>()
                    .map_err(Error::Internal)?,
                object_id: row.try_get("object_id")?,
                weight: row.try_get("weight")?,
            },
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Split a `subject|predicate|object` key back into its parts.
fn parse_triple_key(key: &str) -> Option<(Uuid, String, Uuid)> {
    let mut parts = key.splitn(3, '|');
    let subject = Uuid::parse_str(parts.next()?).ok()?;
    let predicate = parts.next()?.to_string();
    let object = Uuid::parse_str(parts.next()?).ok()?;
    Some((subject, predicate, object))
}

#[async_trait]
impl EntityStore<Relations> for PgRelationRepository {
    async fn select_by_keys(&self, keys: &[String]) -> Result<Vec<OntologyRelation>> {
        let triples: Vec<(Uuid, String, Uuid)> =
            keys.iter().filter_map(|k| parse_triple_key(k)).collect();
        if triples.is_empty() {
            return Ok(Vec::new());
        }
        let subjects: Vec<Uuid> = triples.iter().map(|t| t.0).collect();
        let predicates: Vec<String> = triples.iter().map(|t| t.1.clone()).collect();
        let objects: Vec<Uuid> = triples.iter().map(|t| t.2).collect();

        let rows = sqlx::query(
            r#"
            SELECT r.id, r.subject_id, r.predicate, r.object_id, r.weight, r.updated_at
            FROM ontology_relation r
            JOIN UNNEST($1::uuid[], $2::text[], $3::uuid[]) AS k(subject_id, predicate, object_id)
              ON r.subject_id = k.subject_id
             AND r.predicate = k.predicate
             AND r.object_id = k.object_id
            "#,
        )
        .bind(&subjects)
        .bind(&predicates)
        .bind(&objects)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::row_to_relation).collect()
    }

    async fn upsert(&self, relations: Vec<UpsertRelation>) -> Result<Vec<OntologyRelation>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut stored = Vec::with_capacity(relations.len());

        for relation in relations {
            let row = sqlx::query(&format!(
                r#"
                INSERT INTO ontology_relation
                    (id, subject_id, predicate, object_id, weight, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $6)
                ON CONFLICT (subject_id, predicate, object_id) DO UPDATE SET
                    weight = EXCLUDED.weight,
                    updated_at = EXCLUDED.updated_at
                RETURNING {}
                "#,
                RELATION_COLUMNS
            ))
            .bind(Uuid::now_v7())
            .bind(relation.subject_id)
            .bind(relation.predicate.as_str())
            .bind(relation.object_id)
            .bind(relation.weight)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(Error::Database)?;

            stored.push(Self::row_to_relation(&row)?);
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(stored)
    }

    async fn delete_by_ids(&self, ids: &[Uuid]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM ontology_relation WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}
