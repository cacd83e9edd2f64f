//! HTTP handlers for quill-api.

pub mod documents;
pub mod export;
pub mod health;
pub mod projects;
pub mod rag;
pub mod stream;

use tracing::warn;
use uuid::Uuid;

use quill_core::{ensure_writable, is_bypassed, Project};

use crate::{ApiError, AppState};

/// Load a live project and check that documents in it may be written.
///
/// Repositories re-check `blocked` under the project row lock, so a project
/// blocked after this returns still rejects the write.
pub(crate) async fn writable_project(
    state: &AppState,
    project_id: Uuid,
    op: &'static str,
) -> Result<Project, ApiError> {
    let project = state.projects.fetch(project_id).await?;
    let bypass = state.config.bypass_confirmation;
    ensure_writable(&project, bypass)?;
    if is_bypassed(&project, bypass) {
        warn!(
            subsystem = "api",
            component = "gate",
            op,
            project_id = %project.id,
            "Writing to unconfirmed project because QUILL_BYPASS_CONFIRMATION is set"
        );
    }
    Ok(project)
}
