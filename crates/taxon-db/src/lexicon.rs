//! Lexicon term and region repository implementations.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use taxon_core::{
    EntityStore, Error, Lexicon, LexiconTerm, Region, Regions, Result, Stored, UpsertLexiconTerm,
    UpsertRegion,
};

const TERM_COLUMNS: &str = r#"
    id, term, term_normalized, definition, definition_simple,
    pronunciation_ipa, pronunciation_phonetic, domain, synonyms, updated_at
"#;

const REGION_COLUMNS: &str = "id, region_code, name, pronunciations, updated_at";

// =============================================================================
// LEXICON
// =============================================================================

/// PostgreSQL implementation of the lexicon store.
#[derive(Clone)]
pub struct PgLexiconRepository {
    pool: Pool<Postgres>,
}

impl PgLexiconRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn row_to_term(row: &sqlx::postgres::PgRow) -> Result<LexiconTerm> {
        Ok(Stored {
            id: row.try_get("id")?,
            record: UpsertLexiconTerm {
                term: row.try_get("term")?,
                term_normalized: row.try_get("term_normalized")?,
                definition: row.try_get("definition")?,
                definition_simple: row.try_get("definition_simple")?,
                pronunciation_ipa: row.try_get("pronunciation_ipa")?,
                pronunciation_phonetic: row.try_get("pronunciation_phonetic")?,
                domain: row.try_get("domain")?,
                synonyms: row.try_get("synonyms")?,
            },
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl EntityStore<Lexicon> for PgLexiconRepository {
    async fn select_by_keys(&self, keys: &[String]) -> Result<Vec<LexiconTerm>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {} FROM lexicon_term WHERE term_normalized = ANY($1)",
            TERM_COLUMNS
        ))
        .bind(keys)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::row_to_term).collect()
    }

    async fn upsert(&self, terms: Vec<UpsertLexiconTerm>) -> Result<Vec<LexiconTerm>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut stored = Vec::with_capacity(terms.len());

        for term in terms {
            let row = sqlx::query(&format!(
                r#"
                INSERT INTO lexicon_term
                    (id, term, term_normalized, definition, definition_simple,
                     pronunciation_ipa, pronunciation_phonetic, domain, synonyms,
                     created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
                ON CONFLICT (term_normalized) DO UPDATE SET
                    term = EXCLUDED.term,
                    definition = EXCLUDED.definition,
                    definition_simple = EXCLUDED.definition_simple,
                    pronunciation_ipa = EXCLUDED.pronunciation_ipa,
                    pronunciation_phonetic = EXCLUDED.pronunciation_phonetic,
                    domain = EXCLUDED.domain,
                    synonyms = EXCLUDED.synonyms,
                    updated_at = EXCLUDED.updated_at
                RETURNING {}
                "#,
                TERM_COLUMNS
            ))
            .bind(Uuid::now_v7())
            .bind(&term.term)
            .bind(&term.term_normalized)
            .bind(&term.definition)
            .bind(&term.definition_simple)
            .bind(&term.pronunciation_ipa)
            .bind(&term.pronunciation_phonetic)
            .bind(&term.domain)
            .bind(&term.synonyms)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(Error::Database)?;

            stored.push(Self::row_to_term(&row)?);
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(stored)
    }

    async fn delete_by_ids(&self, ids: &[Uuid]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM lexicon_term WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}

// =============================================================================
// REGIONS
// =============================================================================

/// PostgreSQL implementation of the region store.
#[derive(Clone)]
pub struct PgRegionRepository {
    pool: Pool<Postgres>,
}

impl PgRegionRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn row_to_region(row: &sqlx::postgres::PgRow) -> Result<Region> {
        let pronunciations: serde_json::Value = row.try_get("pronunciations")?;
        let pronunciations: BTreeMap<String, String> = serde_json::from_value(pronunciations)?;
        Ok(Stored {
            id: row.try_get("id")?,
            record: UpsertRegion {
                region_code: row.try_get("region_code")?,
                name: row.try_get("name")?,
                pronunciations,
            },
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl EntityStore<Regions> for PgRegionRepository {
    async fn select_by_keys(&self, keys: &[String]) -> Result<Vec<Region>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {} FROM region WHERE region_code = ANY($1)",
            REGION_COLUMNS
        ))
        .bind(keys)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::row_to_region).collect()
    }

    /// Incoming pronunciation pairs are merged into the stored map with
    /// jsonb `||` inside the statement, so concurrent imports touching
    /// different terms of one region keep each other's pairs. A `None` name
    /// keeps the stored name.
    async fn upsert(&self, regions: Vec<UpsertRegion>) -> Result<Vec<Region>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut stored = Vec::with_capacity(regions.len());

        for region in regions {
            let row = sqlx::query(&format!(
                r#"
                INSERT INTO region (id, region_code, name, pronunciations, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $5)
                ON CONFLICT (region_code) DO UPDATE SET
                    name = COALESCE(EXCLUDED.name, region.name),
                    pronunciations = region.pronunciations || EXCLUDED.pronunciations,
                    updated_at = EXCLUDED.updated_at
                RETURNING {}
                "#,
                REGION_COLUMNS
            ))
            .bind(Uuid::now_v7())
            .bind(&region.region_code)
            .bind(&region.name)
            .bind(serde_json::to_value(&region.pronunciations)?)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(Error::Database)?;

            stored.push(Self::row_to_region(&row)?);
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(stored)
    }

    async fn delete_by_ids(&self, ids: &[Uuid]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM region WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}
