//! Markdown and JSON export rendering.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use quill_core::{slugify, Document, Error, Project, Result};

/// Separator placed between documents in a project export.
pub const DOCUMENT_RULE: &str = "\n\n* * *\n\n";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Markdown,
    Json,
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "markdown" | "md" => Ok(ExportFormat::Markdown),
            "json" => Ok(ExportFormat::Json),
            other => Err(Error::InvalidInput(format!(
                "unknown export format '{}' (expected 'markdown' or 'json')",
                other
            ))),
        }
    }
}

/// JSON export of a whole project.
#[derive(Debug, Serialize)]
pub struct ProjectExport {
    pub project: Project,
    pub documents: Vec<Document>,
    pub exported_at_utc: DateTime<Utc>,
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Front matter block followed by the body.
///
/// Strings, tags and meta are written as JSON, which YAML reads as flow
/// scalars and collections.
pub fn render_document_markdown(doc: &Document, project: &Project) -> Result<String> {
    let mut out = String::from("---\n");
    out.push_str(&format!("id: {}\n", doc.id));
    out.push_str(&format!("title: {}\n", serde_json::to_string(&doc.title)?));
    out.push_str(&format!("doc_type: {}\n", serde_json::to_string(&doc.doc_type)?));
    out.push_str(&format!("project: {}\n", serde_json::to_string(&project.name)?));
    out.push_str(&format!("created: {}\n", timestamp(&doc.created_at_utc)));
    out.push_str(&format!("updated: {}\n", timestamp(&doc.updated_at_utc)));
    out.push_str(&format!("tags: {}\n", serde_json::to_string(&doc.tags)?));
    out.push_str(&format!("meta: {}\n", serde_json::to_string(&doc.meta)?));
    out.push_str("---\n\n");
    out.push_str(&doc.body);
    if !doc.body.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

/// Every document of a project, oldest first, separated by a rule.
pub fn render_project_markdown(project: &Project, docs: &[Document]) -> Result<String> {
    let rendered = docs
        .iter()
        .map(|doc| render_document_markdown(doc, project))
        .collect::<Result<Vec<_>>>()?;
    Ok(rendered.join(DOCUMENT_RULE))
}

/// `Content-Disposition` value for a markdown download named after `name`.
pub fn attachment_disposition(name: &str) -> String {
    format!("attachment; filename=\"{}.md\"", slugify(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use quill_core::ProjectKind;
    use serde_json::json;
    use uuid::Uuid;

    fn project() -> Project {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        Project {
            id: Uuid::now_v7(),
            name: "The Long Night".into(),
            slug: "the-long-night".into(),
            kind: ProjectKind::Book,
            parent_id: None,
            confirmed: true,
            require_confirmation: true,
            blocked: false,
            created_at_utc: at,
            updated_at_utc: at,
            deleted_at: None,
        }
    }

    fn document(project: &Project, title: &str, body: &str) -> Document {
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 10, 30, 0).unwrap();
        Document {
            id: Uuid::now_v7(),
            project_id: project.id,
            doc_type: "scene".into(),
            title: title.into(),
            body: body.into(),
            tags: vec!["act-1".into(), "storm".into()],
            meta: json!({"pov": "mara"}),
            part_count: 1,
            byte_len: body.len() as i64,
            content_hash: String::new(),
            created_at_utc: at,
            updated_at_utc: at,
            deleted_at: None,
        }
    }

    #[test]
    fn test_document_front_matter() {
        let p = project();
        let doc = document(&p, "The \"Storm\"", "Rain hammered the glass.");
        let md = render_document_markdown(&doc, &p).unwrap();

        assert!(md.starts_with("---\n"));
        assert!(md.contains(&format!("id: {}\n", doc.id)));
        assert!(md.contains("title: \"The \\\"Storm\\\"\"\n"));
        assert!(md.contains("project: \"The Long Night\"\n"));
        assert!(md.contains("created: 2026-03-02T10:30:00Z\n"));
        assert!(md.contains("tags: [\"act-1\",\"storm\"]\n"));
        assert!(md.contains("meta: {\"pov\":\"mara\"}\n"));
        assert!(md.ends_with("---\n\nRain hammered the glass.\n"));
    }

    #[test]
    fn test_project_markdown_joins_documents() {
        let p = project();
        let docs = vec![document(&p, "One", "First.\n"), document(&p, "Two", "Second.")];
        let md = render_project_markdown(&p, &docs).unwrap();
        assert_eq!(md.matches(DOCUMENT_RULE).count(), 1);
        assert!(md.find("First.").unwrap() < md.find("Second.").unwrap());
    }

    #[test]
    fn test_export_format_parse() {
        assert_eq!("".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("pdf".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_attachment_disposition() {
        assert_eq!(
            attachment_disposition("Chapter 1: Arrival"),
            "attachment; filename=\"chapter-1-arrival.md\""
        );
    }
}
