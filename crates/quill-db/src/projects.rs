//! Project repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use quill_core::{
    defaults, next_available_slug, slugify, CreateProjectRequest, Error, ListProjectsRequest,
    ListProjectsResponse, Project, ProjectKind, ProjectRepository, Result,
    UpdateProjectFlagsRequest,
};

use crate::escape_like;

const PROJECT_COLUMNS: &str = "id, name, slug, kind, parent_id, confirmed, require_confirmation, \
     blocked, created_at_utc, updated_at_utc, deleted_at";

/// PostgreSQL implementation of ProjectRepository.
#[derive(Clone)]
pub struct PgProjectRepository {
    pool: Pool<Postgres>,
}

impl PgProjectRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Trim and validate a project name.
    fn validate_name(name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("project name is required".into()));
        }
        if name.chars().count() > defaults::PROJECT_NAME_MAX_LEN {
            return Err(Error::InvalidInput(format!(
                "project name exceeds {} characters",
                defaults::PROJECT_NAME_MAX_LEN
            )));
        }
        Ok(name.to_string())
    }

    /// Check the kind/parent combination against the stored parent.
    async fn validate_parent_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        kind: ProjectKind,
        parent_id: Option<Uuid>,
    ) -> Result<()> {
        let Some(parent_id) = parent_id else {
            return Ok(());
        };
        if kind == ProjectKind::Series {
            return Err(Error::InvalidInput("a series cannot have a parent".into()));
        }
        let parent_kind: Option<String> = sqlx::query_scalar(
            "SELECT kind FROM project WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(parent_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        match parent_kind.as_deref() {
            None => Err(Error::InvalidInput(format!(
                "parent project {} not found",
                parent_id
            ))),
            Some("series") => Ok(()),
            Some(_) => Err(Error::InvalidInput(
                "a book's parent must be a series".into(),
            )),
        }
    }

    /// Insert a project within an existing transaction.
    pub async fn insert_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        req: CreateProjectRequest,
    ) -> Result<Project> {
        let name = Self::validate_name(&req.name)?;
        self.validate_parent_tx(tx, req.kind, req.parent_id).await?;

        // Names are unique case-insensitively, soft-deleted projects included.
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM project WHERE lower(name) = lower($1))",
        )
        .bind(&name)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)?;
        if taken {
            return Err(Error::Conflict(format!(
                "a project named '{}' already exists",
                name
            )));
        }

        let base = slugify(&name);
        let existing: Vec<String> = sqlx::query_scalar(
            "SELECT slug FROM project WHERE slug = $1 OR slug LIKE $2 ESCAPE '\\'",
        )
        .bind(&base)
        .bind(format!("{}-%", escape_like(&base)))
        .fetch_all(&mut **tx)
        .await
        .map_err(Error::Database)?;
        let slug = next_available_slug(&base, &existing);

        let id = Uuid::now_v7();
        let now = Utc::now();
        let row = sqlx::query(&format!(
            "INSERT INTO project (id, name, slug, kind, parent_id, confirmed, require_confirmation,
                                  blocked, created_at_utc, updated_at_utc)
             VALUES ($1, $2, $3, $4, $5, FALSE, $6, FALSE, $7, $7)
             RETURNING {}",
            PROJECT_COLUMNS
        ))
        .bind(id)
        .bind(&name)
        .bind(&slug)
        .bind(req.kind.as_str())
        .bind(req.parent_id)
        .bind(req.require_confirmation)
        .bind(now)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)
        .map_err(|e| {
            if e.is_unique_violation() {
                Error::Conflict(format!("a project named '{}' already exists", name))
            } else {
                e
            }
        })?;

        map_project_row(&row)
    }
}

/// Map a database row to a Project.
fn map_project_row(row: &sqlx::postgres::PgRow) -> Result<Project> {
    let kind: String = row.get("kind");
    Ok(Project {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        kind: kind.parse()?,
        parent_id: row.get("parent_id"),
        confirmed: row.get("confirmed"),
        require_confirmation: row.get("require_confirmation"),
        blocked: row.get("blocked"),
        created_at_utc: row.get("created_at_utc"),
        updated_at_utc: row.get("updated_at_utc"),
        deleted_at: row.get("deleted_at"),
    })
}

/// Bind list filters in the order their placeholders were numbered.
macro_rules! bind_project_filters {
    ($q:expr, $req:expr) => {{
        let mut q = $q;
        if let Some(kind) = &$req.kind {
            q = q.bind(kind.as_str());
        }
        if let Some(parent_id) = &$req.parent_id {
            q = q.bind(*parent_id);
        }
        q
    }};
}

fn project_list_where(req: &ListProjectsRequest) -> (String, usize) {
    let mut clauses: Vec<String> = Vec::new();
    let mut idx = 1;
    if !req.include_deleted {
        clauses.push("deleted_at IS NULL".into());
    }
    if req.kind.is_some() {
        clauses.push(format!("kind = ${}", idx));
        idx += 1;
    }
    if req.parent_id.is_some() {
        clauses.push(format!("parent_id = ${}", idx));
        idx += 1;
    }
    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    (where_clause, idx)
}

#[async_trait]
impl ProjectRepository for PgProjectRepository {
    async fn insert(&self, req: CreateProjectRequest) -> Result<Project> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let project = self.insert_tx(&mut tx, req).await?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "projects",
            op = "insert",
            project_id = %project.id,
            slug = %project.slug,
            "Project created"
        );
        Ok(project)
    }

    async fn fetch(&self, id: Uuid) -> Result<Project> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM project WHERE id = $1 AND deleted_at IS NULL",
            PROJECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::ProjectNotFound(id))?;

        map_project_row(&row)
    }

    async fn list(&self, req: ListProjectsRequest) -> Result<ListProjectsResponse> {
        let limit = req.limit.unwrap_or(defaults::PAGE_LIMIT);
        let offset = req.offset.unwrap_or(defaults::PAGE_OFFSET);
        let (where_clause, next_idx) = project_list_where(&req);

        let count_sql = format!("SELECT COUNT(*) FROM project {}", where_clause);
        let total: i64 = bind_project_filters!(sqlx::query_scalar(&count_sql), req)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;

        let list_sql = format!(
            "SELECT {} FROM project {} ORDER BY created_at_utc ASC, id ASC LIMIT ${} OFFSET ${}",
            PROJECT_COLUMNS,
            where_clause,
            next_idx,
            next_idx + 1
        );
        let rows = bind_project_filters!(sqlx::query(&list_sql), req)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let projects = rows
            .iter()
            .map(map_project_row)
            .collect::<Result<Vec<_>>>()?;

        debug!(
            subsystem = "db",
            component = "projects",
            op = "list",
            result_count = projects.len(),
            total,
            "Listed projects"
        );
        Ok(ListProjectsResponse { projects, total })
    }

    async fn confirm(&self, id: Uuid) -> Result<Project> {
        // Already-confirmed projects come back untouched.
        let row = sqlx::query(&format!(
            "UPDATE project
             SET confirmed = TRUE,
                 updated_at_utc = CASE WHEN confirmed THEN updated_at_utc ELSE $1 END
             WHERE id = $2 AND deleted_at IS NULL
             RETURNING {}",
            PROJECT_COLUMNS
        ))
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::ProjectNotFound(id))?;

        info!(
            subsystem = "db",
            component = "projects",
            op = "confirm",
            project_id = %id,
            "Project confirmed"
        );
        map_project_row(&row)
    }

    async fn update_flags(&self, id: Uuid, req: UpdateProjectFlagsRequest) -> Result<Project> {
        let row = sqlx::query(&format!(
            "UPDATE project
             SET require_confirmation = COALESCE($1, require_confirmation),
                 blocked = COALESCE($2, blocked),
                 updated_at_utc = $3
             WHERE id = $4 AND deleted_at IS NULL
             RETURNING {}",
            PROJECT_COLUMNS
        ))
        .bind(req.require_confirmation)
        .bind(req.blocked)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::ProjectNotFound(id))?;

        info!(
            subsystem = "db",
            component = "projects",
            op = "update_flags",
            project_id = %id,
            require_confirmation = ?req.require_confirmation,
            blocked = ?req.blocked,
            "Project flags updated"
        );
        map_project_row(&row)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE project SET deleted_at = $1, updated_at_utc = $1
             WHERE id = $2 AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::ProjectNotFound(id));
        }
        info!(
            subsystem = "db",
            component = "projects",
            op = "soft_delete",
            project_id = %id,
            "Project soft-deleted"
        );
        Ok(())
    }

    async fn restore(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE project SET deleted_at = NULL, updated_at_utc = $1
             WHERE id = $2 AND deleted_at IS NOT NULL",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::ProjectNotFound(id));
        }
        info!(
            subsystem = "db",
            component = "projects",
            op = "restore",
            project_id = %id,
            "Project restored"
        );
        Ok(())
    }
}
