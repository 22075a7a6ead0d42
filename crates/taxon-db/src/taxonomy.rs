//! Taxonomy node repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use taxon_core::{
    EntityStore, Error, Result, Stored, Taxonomy, TaxonomyNode, TaxonomyStatus,
    UpsertTaxonomyNode,
};

/// Standard SELECT columns for taxonomy_node.
const NODE_COLUMNS: &str = r#"
    id, code, name, description, parent_id, level, icon, color,
    status, synonyms, keywords, updated_at
"#;

/// PostgreSQL implementation of the taxonomy store.
#[derive(Clone)]
pub struct PgTaxonomyRepository {
    pool: Pool<Postgres>,
}

impl PgTaxonomyRepository {
    /// Create a new PgTaxonomyRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn row_to_node(row: &sqlx::postgres::PgRow) -> Result<TaxonomyNode> {
        let status: String = row.try_get("status")?;
        let level: i16 = row.try_get("level")?;
        Ok(Stored {
            id: row.try_get("id")?,
            record: UpsertTaxonomyNode {
                code: row.try_get("code")?,
                name: row.try_get("name")?,
                description: row.try_get("description")?,
                parent_id: row.try_get("parent_id")?,
                level: u8::try_from(level)
                    .map_err(|_| Error::Internal(format!("level {} out of range", level)))?,
                icon: row.try_get("icon")?,
                color: row.try_get("color")?,
                status: status
                    .parse::<TaxonomyStatus>()
                    .map_err(Error::Internal)?,
                synonyms: row.try_get("synonyms")?,
                keywords: row.try_get("keywords")?,
            },
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl EntityStore<Taxonomy> for PgTaxonomyRepository {
    async fn select_by_keys(&self, keys: &[String]) -> Result<Vec<TaxonomyNode>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {} FROM taxonomy_node WHERE code = ANY($1)",
            NODE_COLUMNS
        ))
        .bind(keys)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::row_to_node).collect()
    }

    async fn upsert(&self, nodes: Vec<UpsertTaxonomyNode>) -> Result<Vec<TaxonomyNode>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut stored = Vec::with_capacity(nodes.len());

        for node in nodes {
            let row = sqlx::query(&format!(
                r#"
                INSERT INTO taxonomy_node
                    (id, code, name, description, parent_id, level, icon, color,
                     status, synonyms, keywords, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
                ON CONFLICT (code) DO UPDATE SET
                    name = EXCLUDED.name,
                    description = EXCLUDED.description,
                    parent_id = EXCLUDED.parent_id,
                    level = EXCLUDED.level,
                    icon = EXCLUDED.icon,
                    color = EXCLUDED.color,
                    status = EXCLUDED.status,
                    synonyms = EXCLUDED.synonyms,
                    keywords = EXCLUDED.keywords,
                    updated_at = EXCLUDED.updated_at
                RETURNING {}
                "#,
                NODE_COLUMNS
            ))
            .bind(Uuid::now_v7())
            .bind(&node.code)
            .bind(&node.name)
            .bind(&node.description)
            .bind(node.parent_id)
            .bind(i16::from(node.level))
            .bind(&node.icon)
            .bind(&node.color)
            .bind(node.status.to_string())
            .bind(&node.synonyms)
            .bind(&node.keywords)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(Error::Database)?;

            stored.push(Self::row_to_node(&row)?);
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(stored)
    }

    async fn delete_by_ids(&self, ids: &[Uuid]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM taxonomy_node WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}
