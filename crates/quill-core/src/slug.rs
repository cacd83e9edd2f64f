//! URL slugs for project names.

use regex::Regex;
use std::sync::OnceLock;

fn non_alnum() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("static slug pattern compiles"))
}

/// Lower-case the name and collapse every run of non-alphanumerics to `-`.
///
/// Names with no ASCII alphanumerics fall back to `"project"`.
pub fn slugify(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let slug = non_alnum().replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "project".to_string()
    } else {
        slug.to_string()
    }
}

/// First of `base`, `base-2`, `base-3`, ... not present in `existing`.
pub fn next_available_slug(base: &str, existing: &[String]) -> String {
    if !existing.iter().any(|s| s == base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !existing.iter().any(|s| s == candidate))
        .unwrap_or_else(|| base.to_string())
}
