//! Document repository implementation.
//!
//! Bodies live in `document_part`; the `document` row carries `part_count` so
//! reassembly can detect missing parts. Every write that touches parts holds
//! the document row lock for the whole transaction.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value as JsonValue};
use sha2::{Digest, Sha256};
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::{debug, info, trace};
use uuid::Uuid;

use quill_core::{
    defaults, normalize_tags, snippet, CreateDocumentRequest, Document, DocumentRepository,
    DocumentSummary, Error, ListDocumentsRequest, ListDocumentsResponse, Result,
    SearchDocumentsRequest, UpdateDocumentRequest,
};

use crate::chunking::{reassemble_parts, BodySplitter};

const DOCUMENT_COLUMNS: &str = "d.id, d.project_id, d.doc_type, d.title, d.tags, d.meta, \
     d.part_count, d.byte_len, d.content_hash, d.created_at_utc, d.updated_at_utc, d.deleted_at";

/// PostgreSQL implementation of DocumentRepository.
#[derive(Clone)]
pub struct PgDocumentRepository {
    pool: Pool<Postgres>,
    splitter: BodySplitter,
}

/// Document row without its body.
struct DocumentHead {
    id: Uuid,
    project_id: Uuid,
    doc_type: String,
    title: String,
    tags: Vec<String>,
    meta: JsonValue,
    part_count: i32,
    byte_len: i64,
    content_hash: String,
    created_at_utc: chrono::DateTime<Utc>,
    updated_at_utc: chrono::DateTime<Utc>,
    deleted_at: Option<chrono::DateTime<Utc>>,
}

impl DocumentHead {
    fn from_row(row: &sqlx::postgres::PgRow) -> Self {
        Self {
            id: row.get("id"),
            project_id: row.get("project_id"),
            doc_type: row.get("doc_type"),
            title: row.get("title"),
            tags: row.get("tags"),
            meta: row.get("meta"),
            part_count: row.get("part_count"),
            byte_len: row.get("byte_len"),
            content_hash: row.get("content_hash"),
            created_at_utc: row.get("created_at_utc"),
            updated_at_utc: row.get("updated_at_utc"),
            deleted_at: row.get("deleted_at"),
        }
    }

    fn with_body(self, body: String) -> Document {
        Document {
            id: self.id,
            project_id: self.project_id,
            doc_type: self.doc_type,
            title: self.title,
            body,
            tags: self.tags,
            meta: self.meta,
            part_count: self.part_count,
            byte_len: self.byte_len,
            content_hash: self.content_hash,
            created_at_utc: self.created_at_utc,
            updated_at_utc: self.updated_at_utc,
            deleted_at: self.deleted_at,
        }
    }
}

/// Map a summary row (document columns plus `first_part`, optional `score`).
fn map_summary_row(row: &sqlx::postgres::PgRow) -> DocumentSummary {
    let first_part: Option<String> = row.get("first_part");
    DocumentSummary {
        id: row.get("id"),
        project_id: row.get("project_id"),
        doc_type: row.get("doc_type"),
        title: row.get("title"),
        snippet: snippet(first_part.as_deref().unwrap_or("")),
        tags: row.get("tags"),
        meta: row.get("meta"),
        part_count: row.get("part_count"),
        byte_len: row.get("byte_len"),
        created_at_utc: row.get("created_at_utc"),
        updated_at_utc: row.get("updated_at_utc"),
        deleted_at: row.get("deleted_at"),
        score: row.try_get::<f32, _>("score").ok(),
    }
}

/// Content hash stored alongside each document.
pub fn hash_content(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Trim and lower-case a doc type, falling back to the default.
pub fn normalize_doc_type(doc_type: &str) -> String {
    let doc_type = doc_type.trim().to_lowercase();
    if doc_type.is_empty() {
        defaults::DOC_TYPE.to_string()
    } else {
        doc_type
    }
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::InvalidInput("document title is required".into()));
    }
    Ok(title.to_string())
}

/// `null` becomes an empty object; anything other than an object is rejected.
pub fn normalize_meta(meta: JsonValue) -> Result<JsonValue> {
    match meta {
        JsonValue::Null => Ok(JsonValue::Object(Map::new())),
        JsonValue::Object(_) => Ok(meta),
        _ => Err(Error::InvalidInput("meta must be a JSON object".into())),
    }
}

/// Merge `patch` keys into `existing`. A `null` value removes the key.
pub fn merge_meta(existing: &JsonValue, patch: &JsonValue) -> Result<JsonValue> {
    let JsonValue::Object(patch) = patch else {
        return Err(Error::InvalidInput("meta must be a JSON object".into()));
    };
    let mut merged = existing.as_object().cloned().unwrap_or_default();
    for (key, value) in patch {
        if value.is_null() {
            merged.remove(key);
        } else {
            merged.insert(key.clone(), value.clone());
        }
    }
    Ok(JsonValue::Object(merged))
}

fn page<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

impl PgDocumentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self::with_splitter(pool, BodySplitter::default())
    }

    pub fn with_splitter(pool: Pool<Postgres>, splitter: BodySplitter) -> Self {
        Self { pool, splitter }
    }

    pub fn splitter(&self) -> &BodySplitter {
        &self.splitter
    }

    /// Replace every part of a document. Caller must hold the row lock.
    async fn write_parts_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document_id: Uuid,
        parts: &[String],
    ) -> Result<i32> {
        let indices: Vec<i32> = (0..parts.len() as i32).collect();

        sqlx::query("DELETE FROM document_part WHERE document_id = $1")
            .bind(document_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO document_part (document_id, part_index, body)
             SELECT $1, idx, body FROM UNNEST($2::int4[], $3::text[]) AS p(idx, body)",
        )
        .bind(document_id)
        .bind(&indices)
        .bind(parts)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        trace!(
            subsystem = "db",
            component = "documents",
            op = "write_parts",
            document_id = %document_id,
            part_count = parts.len(),
            strategy = %self.splitter.strategy,
            "Document parts written"
        );
        Ok(parts.len() as i32)
    }

    async fn read_body_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document_id: Uuid,
        part_count: i32,
    ) -> Result<String> {
        let rows = sqlx::query(
            "SELECT part_index, body FROM document_part WHERE document_id = $1 ORDER BY part_index",
        )
        .bind(document_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(Error::Database)?;

        let parts = rows
            .iter()
            .map(|r| (r.get::<i32, _>("part_index"), r.get::<String, _>("body")))
            .collect();
        reassemble_parts(document_id, part_count, parts)
    }

    /// Insert a document within an existing transaction.
    pub async fn insert_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        req: CreateDocumentRequest,
    ) -> Result<Document> {
        let title = validate_title(&req.title)?;
        let doc_type = normalize_doc_type(&req.doc_type);
        let tags = normalize_tags(&req.tags);
        let meta = normalize_meta(req.meta)?;

        // Shared lock keeps the project from being deleted or blocked
        // underneath us.
        let blocked = sqlx::query_scalar::<_, bool>(
            "SELECT blocked FROM project WHERE id = $1 AND deleted_at IS NULL FOR SHARE",
        )
        .bind(req.project_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::ProjectNotFound(req.project_id))?;
        if blocked {
            return Err(Error::Blocked(req.project_id));
        }

        let id = Uuid::now_v7();
        let now = Utc::now();
        let byte_len = req.body.len() as i64;
        let content_hash = hash_content(&req.body);
        let parts = self.splitter.split(&req.body);
        let part_count = parts.len() as i32;

        sqlx::query(
            "INSERT INTO document (id, project_id, doc_type, title, tags, meta, part_count,
                                   byte_len, content_hash, created_at_utc, updated_at_utc)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)",
        )
        .bind(id)
        .bind(req.project_id)
        .bind(&doc_type)
        .bind(&title)
        .bind(&tags)
        .bind(&meta)
        .bind(part_count)
        .bind(byte_len)
        .bind(&content_hash)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        self.write_parts_tx(tx, id, &parts).await?;

        Ok(Document {
            id,
            project_id: req.project_id,
            doc_type,
            title,
            body: req.body,
            tags,
            meta,
            part_count,
            byte_len,
            content_hash,
            created_at_utc: now,
            updated_at_utc: now,
            deleted_at: None,
        })
    }

    /// Apply a partial update within an existing transaction.
    pub async fn update_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        req: UpdateDocumentRequest,
    ) -> Result<Document> {
        let row = sqlx::query(&format!(
            "SELECT {}, p.blocked AS project_blocked
             FROM document d JOIN project p ON p.id = d.project_id
             WHERE d.id = $1 AND d.deleted_at IS NULL AND p.deleted_at IS NULL
             FOR UPDATE OF d FOR SHARE OF p",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::DocumentNotFound(id))?;
        let mut head = DocumentHead::from_row(&row);
        if row.get::<bool, _>("project_blocked") {
            return Err(Error::Blocked(head.project_id));
        }

        if let Some(title) = &req.title {
            head.title = validate_title(title)?;
        }
        if let Some(doc_type) = &req.doc_type {
            head.doc_type = normalize_doc_type(doc_type);
        }
        if let Some(tags) = &req.tags {
            head.tags = normalize_tags(tags);
        }
        if let Some(patch) = &req.meta {
            head.meta = merge_meta(&head.meta, patch)?;
        }

        let body = match req.body {
            Some(body) => {
                let parts = self.splitter.split(&body);
                head.part_count = self.write_parts_tx(tx, id, &parts).await?;
                head.byte_len = body.len() as i64;
                head.content_hash = hash_content(&body);
                body
            }
            None => self.read_body_tx(tx, id, head.part_count).await?,
        };
        head.updated_at_utc = Utc::now();

        sqlx::query(
            "UPDATE document
             SET doc_type = $1, title = $2, tags = $3, meta = $4, part_count = $5,
                 byte_len = $6, content_hash = $7, updated_at_utc = $8
             WHERE id = $9",
        )
        .bind(&head.doc_type)
        .bind(&head.title)
        .bind(&head.tags)
        .bind(&head.meta)
        .bind(head.part_count)
        .bind(head.byte_len)
        .bind(&head.content_hash)
        .bind(head.updated_at_utc)
        .bind(id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(head.with_body(body))
    }

    async fn list_rows(
        &self,
        req: &ListDocumentsRequest,
        page_in_sql: Option<(i64, i64)>,
    ) -> Result<Vec<DocumentSummary>> {
        let mut sql = format!(
            "SELECT {},
                    (SELECT body FROM document_part
                     WHERE document_id = d.id AND part_index = 0) AS first_part
             FROM document d
             WHERE d.project_id = $1",
            DOCUMENT_COLUMNS
        );
        if !req.include_deleted {
            sql.push_str(" AND d.deleted_at IS NULL");
        }
        if req.filter.doc_type.is_some() {
            sql.push_str(" AND d.doc_type = $2");
        }
        sql.push_str(" ORDER BY d.created_at_utc ASC, d.id ASC");
        if page_in_sql.is_some() {
            let base = if req.filter.doc_type.is_some() { 3 } else { 2 };
            sql.push_str(&format!(" LIMIT ${} OFFSET ${}", base, base + 1));
        }

        let mut q = sqlx::query(&sql).bind(req.project_id);
        if let Some(doc_type) = &req.filter.doc_type {
            q = q.bind(doc_type);
        }
        if let Some((limit, offset)) = page_in_sql {
            q = q.bind(limit).bind(offset);
        }
        let rows = q.fetch_all(&self.pool).await.map_err(Error::Database)?;
        Ok(rows.iter().map(map_summary_row).collect())
    }

    async fn count_rows(&self, req: &ListDocumentsRequest) -> Result<i64> {
        let mut sql = String::from("SELECT COUNT(*) FROM document d WHERE d.project_id = $1");
        if !req.include_deleted {
            sql.push_str(" AND d.deleted_at IS NULL");
        }
        if req.filter.doc_type.is_some() {
            sql.push_str(" AND d.doc_type = $2");
        }
        let mut q = sqlx::query_scalar(&sql).bind(req.project_id);
        if let Some(doc_type) = &req.filter.doc_type {
            q = q.bind(doc_type);
        }
        q.fetch_one(&self.pool).await.map_err(Error::Database)
    }
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    async fn insert(&self, req: CreateDocumentRequest) -> Result<Document> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let doc = self.insert_tx(&mut tx, req).await?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "documents",
            op = "insert",
            project_id = %doc.project_id,
            document_id = %doc.id,
            part_count = doc.part_count,
            byte_len = doc.byte_len,
            duration_ms = start.elapsed().as_millis() as u64,
            "Document created"
        );
        Ok(doc)
    }

    async fn fetch(&self, id: Uuid) -> Result<Document> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        // FOR SHARE waits out any writer holding the row, so the part set we
        // read below matches part_count.
        let row = sqlx::query(&format!(
            "SELECT {} FROM document d JOIN project p ON p.id = d.project_id
             WHERE d.id = $1 AND d.deleted_at IS NULL AND p.deleted_at IS NULL
             FOR SHARE OF d",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::DocumentNotFound(id))?;
        let head = DocumentHead::from_row(&row);
        let body = self.read_body_tx(&mut tx, id, head.part_count).await?;
        tx.commit().await.map_err(Error::Database)?;

        Ok(head.with_body(body))
    }

    async fn owner(&self, id: Uuid) -> Result<Uuid> {
        sqlx::query_scalar("SELECT project_id FROM document WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::DocumentNotFound(id))
    }

    async fn update(&self, id: Uuid, req: UpdateDocumentRequest) -> Result<Document> {
        if req.is_empty() {
            return self.fetch(id).await;
        }
        let start = Instant::now();
        let body_changed = req.body.is_some();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let doc = self.update_tx(&mut tx, id, req).await?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "documents",
            op = "update",
            document_id = %id,
            body_changed,
            part_count = doc.part_count,
            duration_ms = start.elapsed().as_millis() as u64,
            "Document updated"
        );
        Ok(doc)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE document SET deleted_at = $1, updated_at_utc = $1
             WHERE id = $2 AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::DocumentNotFound(id));
        }
        info!(
            subsystem = "db",
            component = "documents",
            op = "soft_delete",
            document_id = %id,
            "Document soft-deleted"
        );
        Ok(())
    }

    async fn restore(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE document SET deleted_at = NULL, updated_at_utc = $1
             WHERE id = $2 AND deleted_at IS NOT NULL",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::DocumentNotFound(id));
        }
        info!(
            subsystem = "db",
            component = "documents",
            op = "restore",
            document_id = %id,
            "Document restored"
        );
        Ok(())
    }

    async fn list(&self, req: ListDocumentsRequest) -> Result<ListDocumentsResponse> {
        let limit = req.limit.unwrap_or(defaults::PAGE_LIMIT);
        let offset = req.offset.unwrap_or(defaults::PAGE_OFFSET);

        // doc_type is pushed into SQL; tag/meta constraints need every row.
        let needs_scan = !req.filter.tags.is_empty() || !req.filter.meta.is_empty();
        let (documents, total) = if needs_scan {
            let matched: Vec<DocumentSummary> = self
                .list_rows(&req, None)
                .await?
                .into_iter()
                .filter(|d| req.filter.matches_summary(d))
                .collect();
            let total = matched.len() as i64;
            (page(matched, limit, offset), total)
        } else {
            let total = self.count_rows(&req).await?;
            (self.list_rows(&req, Some((limit, offset))).await?, total)
        };

        debug!(
            subsystem = "db",
            component = "documents",
            op = "list",
            project_id = %req.project_id,
            in_process_filter = needs_scan,
            result_count = documents.len(),
            total,
            "Listed documents"
        );
        Ok(ListDocumentsResponse { documents, total })
    }

    async fn search(&self, req: SearchDocumentsRequest) -> Result<Vec<DocumentSummary>> {
        let query = req.query.trim();
        if query.is_empty() {
            return Err(Error::InvalidInput("search query is required".into()));
        }
        let limit = req.limit.unwrap_or(defaults::PAGE_LIMIT_SEARCH);
        let start = Instant::now();

        let sql = format!(
            "SELECT {},
                    (SELECT body FROM document_part
                     WHERE document_id = d.id AND part_index = 0) AS first_part,
                    s.score
             FROM document d
             JOIN project p ON p.id = d.project_id
             CROSS JOIN websearch_to_tsquery('english', $2) AS q(query)
             JOIN LATERAL (
                 SELECT (ts_rank(d.title_tsv, q.query) * 2.0
                         + COALESCE(MAX(ts_rank(dp.body_tsv, q.query)), 0))::real AS score,
                        COALESCE(BOOL_OR(dp.body_tsv @@ q.query), FALSE) AS body_hit
                 FROM document_part dp
                 WHERE dp.document_id = d.id
             ) s ON TRUE
             WHERE d.project_id = $1
               AND d.deleted_at IS NULL
               AND p.deleted_at IS NULL
               AND (d.title_tsv @@ q.query OR s.body_hit)
             ORDER BY s.score DESC, d.created_at_utc ASC",
            DOCUMENT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(req.project_id)
            .bind(query)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let candidates = rows.len();
        let results: Vec<DocumentSummary> = rows
            .iter()
            .map(map_summary_row)
            .filter(|d| req.filter.matches_summary(d))
            .take(limit.max(0) as usize)
            .collect();

        debug!(
            subsystem = "db",
            component = "documents",
            op = "search",
            project_id = %req.project_id,
            candidates,
            result_count = results.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Full-text search complete"
        );
        Ok(results)
    }

    async fn list_full(&self, project_id: Uuid) -> Result<Vec<Document>> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM document d
             WHERE d.project_id = $1 AND d.deleted_at IS NULL
             ORDER BY d.created_at_utc ASC, d.id ASC",
            DOCUMENT_COLUMNS
        ))
        .bind(project_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let part_rows = sqlx::query(
            "SELECT dp.document_id, dp.part_index, dp.body
             FROM document_part dp
             JOIN document d ON d.id = dp.document_id
             WHERE d.project_id = $1 AND d.deleted_at IS NULL",
        )
        .bind(project_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(Error::Database)?;
        tx.commit().await.map_err(Error::Database)?;

        let mut parts: HashMap<Uuid, Vec<(i32, String)>> = HashMap::new();
        for row in &part_rows {
            parts
                .entry(row.get("document_id"))
                .or_default()
                .push((row.get("part_index"), row.get("body")));
        }

        rows.iter()
            .map(|row| {
                let head = DocumentHead::from_row(row);
                let body = reassemble_parts(
                    head.id,
                    head.part_count,
                    parts.remove(&head.id).unwrap_or_default(),
                )?;
                Ok(head.with_body(body))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_content_format() {
        let hash = hash_content("hello");
        assert!(hash.starts_with("sha256:"));
        assert_eq!(hash.len(), "sha256:".len() + 64);
        assert_eq!(hash, hash_content("hello"));
        assert_ne!(hash, hash_content("hello "));
    }

    #[test]
    fn test_normalize_doc_type() {
        assert_eq!(normalize_doc_type(" Scene "), "scene");
        assert_eq!(normalize_doc_type(""), defaults::DOC_TYPE);
    }

    #[test]
    fn test_validate_title() {
        assert_eq!(validate_title("  Chapter One ").unwrap(), "Chapter One");
        assert!(validate_title(" \n ").is_err());
    }

    #[test]
    fn test_normalize_meta() {
        assert_eq!(normalize_meta(JsonValue::Null).unwrap(), json!({}));
        assert_eq!(normalize_meta(json!({"pov": "mara"})).unwrap(), json!({"pov": "mara"}));
        assert!(normalize_meta(json!(["pov"])).is_err());
        assert!(normalize_meta(json!("pov")).is_err());
    }

    #[test]
    fn test_merge_meta_adds_replaces_and_removes() {
        let existing = json!({"pov": "mara", "chapter": 3, "draft": true});
        let patch = json!({"chapter": 4, "draft": null, "location": "harbor"});
        let merged = merge_meta(&existing, &patch).unwrap();
        assert_eq!(merged, json!({"pov": "mara", "chapter": 4, "location": "harbor"}));
    }

    #[test]
    fn test_merge_meta_rejects_non_object_patch() {
        assert!(merge_meta(&json!({}), &json!([1, 2])).is_err());
    }

    #[test]
    fn test_page_bounds() {
        let items: Vec<i32> = (0..10).collect();
        assert_eq!(page(items.clone(), 3, 0), vec![0, 1, 2]);
        assert_eq!(page(items.clone(), 3, 8), vec![8, 9]);
        assert!(page(items, 3, 20).is_empty());
    }
}
