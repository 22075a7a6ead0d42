//! Tag graph repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use taxon_core::{
    Error, NewTagMergeRule, Result, Tag, TagAuditEntry, TagMergeRule, TagStore,
};

const MERGE_RULE_COLUMNS: &str = r#"
    id, source_label, source_label_normalized, canonical_tag_id,
    canonical_tag_name, context, created_by, created_at
"#;

/// PostgreSQL implementation of TagStore.
#[derive(Clone)]
pub struct PgTagRepository {
    pool: Pool<Postgres>,
}

impl PgTagRepository {
    /// Create a new PgTagRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn row_to_rule(row: &sqlx::postgres::PgRow) -> Result<TagMergeRule> {
        let context: String = row.try_get("context")?;
        Ok(TagMergeRule {
            id: row.try_get("id")?,
            source_label: row.try_get("source_label")?,
            source_label_normalized: row.try_get("source_label_normalized")?,
            canonical_tag_id: row.try_get("canonical_tag_id")?,
            canonical_tag_name: row.try_get("canonical_tag_name")?,
            // Empty string is the stored form of "no context"
            context: if context.is_empty() {
                None
            } else {
                Some(context)
            },
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl TagStore for PgTagRepository {
    async fn list_tags(&self) -> Result<Vec<Tag>> {
        let rows = sqlx::query(
            "SELECT id, tag_name, parent_tag_id, confidence, source FROM tag ORDER BY tag_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter()
            .map(|row| {
                Ok(Tag {
                    id: row.try_get("id")?,
                    tag_name: row.try_get("tag_name")?,
                    parent_tag_id: row.try_get("parent_tag_id")?,
                    confidence: row.try_get("confidence")?,
                    source: row.try_get("source")?,
                })
            })
            .collect()
    }

    async fn set_parent(&self, tag_id: Uuid, parent_tag_id: Option<Uuid>) -> Result<()> {
        let result = sqlx::query("UPDATE tag SET parent_tag_id = $1 WHERE id = $2")
            .bind(parent_tag_id)
            .bind(tag_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("tag {}", tag_id)));
        }
        Ok(())
    }

    async fn reparent_children(&self, from: Uuid, to: Uuid) -> Result<u64> {
        let result =
            sqlx::query("UPDATE tag SET parent_tag_id = $1 WHERE parent_tag_id = $2 AND id <> $1")
                .bind(to)
                .bind(from)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn documents_for_tag(&self, tag_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT document_id FROM document_tag WHERE tag_id = $1 ORDER BY document_id",
        )
        .bind(tag_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(ids)
    }

    async fn retag_documents(&self, from: Uuid, to: Uuid) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Use alias 'outer_row' so the NOT EXISTS subquery is unambiguous
        let moved = sqlx::query(
            r#"
            UPDATE document_tag AS outer_row
            SET tag_id = $1
            WHERE outer_row.tag_id = $2 AND NOT EXISTS (
                SELECT 1 FROM document_tag
                WHERE document_id = outer_row.document_id AND tag_id = $1
            )
            "#,
        )
        .bind(to)
        .bind(from)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        // Documents that already carried the canonical tag keep only that one
        let dropped = sqlx::query("DELETE FROM document_tag WHERE tag_id = $1")
            .bind(from)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(moved.rows_affected() + dropped.rows_affected())
    }

    async fn delete_tags(&self, ids: &[Uuid]) -> Result<u64> {
        let result = sqlx::query("DELETE FROM tag WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn upsert_merge_rule(&self, rule: NewTagMergeRule) -> Result<TagMergeRule> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO tag_merge_rule
                (id, source_label, source_label_normalized, canonical_tag_id,
                 canonical_tag_name, context, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (source_label_normalized, context) DO UPDATE SET
                source_label = EXCLUDED.source_label,
                canonical_tag_id = EXCLUDED.canonical_tag_id,
                canonical_tag_name = EXCLUDED.canonical_tag_name,
                created_by = EXCLUDED.created_by
            RETURNING {}
            "#,
            MERGE_RULE_COLUMNS
        ))
        .bind(Uuid::now_v7())
        .bind(&rule.source_label)
        .bind(rule.source_label_normalized())
        .bind(rule.canonical_tag_id)
        .bind(&rule.canonical_tag_name)
        .bind(rule.context.clone().unwrap_or_default())
        .bind(&rule.created_by)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Self::row_to_rule(&row)
    }

    async fn find_merge_rules(&self, label_normalized: &str) -> Result<Vec<TagMergeRule>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tag_merge_rule WHERE source_label_normalized = $1 ORDER BY created_at",
            MERGE_RULE_COLUMNS
        ))
        .bind(label_normalized)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::row_to_rule).collect()
    }

    async fn record_audit(&self, entries: Vec<TagAuditEntry>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO tag_audit_log
                    (id, document_id, action, old_tag_id, old_tag_name,
                     new_tag_id, new_tag_name, actor, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(Uuid::now_v7())
            .bind(entry.document_id)
            .bind(entry.action.to_string())
            .bind(entry.old_tag_id)
            .bind(&entry.old_tag_name)
            .bind(entry.new_tag_id)
            .bind(&entry.new_tag_name)
            .bind(&entry.actor)
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }
}
