//! Write gate for project-scoped document mutations.

use crate::error::{Error, Result};
use crate::models::Project;

/// Whether a write against `project` may proceed.
///
/// Blocked projects reject every write. A project that requires
/// confirmation rejects writes until confirmed, unless `bypass` is set.
pub fn ensure_writable(project: &Project, bypass: bool) -> Result<()> {
    if project.blocked {
        return Err(Error::Blocked(project.id));
    }
    if project.require_confirmation && !project.confirmed && !bypass {
        return Err(Error::Unconfirmed(project.id));
    }
    Ok(())
}

/// True when the write only passes because of the bypass toggle.
pub fn is_bypassed(project: &Project, bypass: bool) -> bool {
    bypass && !project.blocked && project.require_confirmation && !project.confirmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProjectKind;
    use chrono::Utc;
    use uuid::Uuid;

    fn project(confirmed: bool, require_confirmation: bool, blocked: bool) -> Project {
        Project {
            id: Uuid::now_v7(),
            name: "The Long Night".into(),
            slug: "the-long-night".into(),
            kind: ProjectKind::Book,
            parent_id: None,
            confirmed,
            require_confirmation,
            blocked,
            created_at_utc: Utc::now(),
            updated_at_utc: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_confirmed_project_is_writable() {
        assert!(ensure_writable(&project(true, true, false), false).is_ok());
    }

    #[test]
    fn test_unconfirmed_project_rejected() {
        let p = project(false, true, false);
        assert!(matches!(ensure_writable(&p, false), Err(Error::Unconfirmed(id)) if id == p.id));
    }

    #[test]
    fn test_unconfirmed_without_requirement_is_writable() {
        assert!(ensure_writable(&project(false, false, false), false).is_ok());
    }

    #[test]
    fn test_bypass_allows_unconfirmed() {
        let p = project(false, true, false);
        assert!(ensure_writable(&p, true).is_ok());
        assert!(is_bypassed(&p, true));
        assert!(!is_bypassed(&project(true, true, false), true));
    }

    #[test]
    fn test_blocked_wins_over_bypass() {
        let p = project(true, false, true);
        assert!(matches!(ensure_writable(&p, true), Err(Error::Blocked(_))));
    }
}
