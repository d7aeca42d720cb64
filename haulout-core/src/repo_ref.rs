//! Source URL normalization into [`RepoRef`]s.
//!
//! Normalization is total: anything that is not a `github.com/<owner>/<repo>`
//! URL yields `None` and is dropped by the collectors, never an error.

use std::collections::HashSet;

use url::Url;

use crate::types::{Item, RepoRef};

/// Normalize a GitHub URL to `(owner, name)`.
///
/// Accepts `https://github.com/owner/repo`, trailing `.git`, trailing
/// slashes, deeper paths (`/tree/main/...`) and scheme-less input
/// (`github.com/owner/repo`). Only the first two path segments are used.
pub fn normalize(raw: &str) -> Option<RepoRef> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let url = if raw.contains("://") {
        Url::parse(raw).ok()?
    } else {
        Url::parse(&format!("https://{raw}")).ok()?
    };

    let host = url.host_str()?.trim_end_matches('.').to_lowercase();
    if host != "github.com" && host != "www.github.com" {
        return None;
    }

    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    let owner = segments.next()?;
    let raw_name = segments.next()?;
    let name = raw_name.strip_suffix(".git").unwrap_or(raw_name);
    if owner.is_empty() || name.is_empty() {
        return None;
    }

    Some(RepoRef {
        owner: owner.to_string(),
        name: name.to_string(),
        project_name: None,
        source_url: Some(raw.to_string()),
    })
}

/// Keep the first occurrence of every distinct [`RepoRef::key`], preserving
/// input order.
pub fn dedup(refs: impl IntoIterator<Item = RepoRef>) -> Vec<RepoRef> {
    let mut seen = HashSet::new();
    refs.into_iter()
        .filter(|r| seen.insert(r.key()))
        .collect()
}

/// Derive repository references from harvested items via their `github`
/// link. Items without a parseable link are skipped.
pub fn from_items(items: &[Item]) -> Vec<RepoRef> {
    let refs = items.iter().filter_map(|item| {
        let url = item.link("github")?;
        match normalize(url) {
            Some(repo) => Some(repo.with_project_name(item.project_name().map(str::to_owned))),
            None => {
                tracing::debug!(item = %item.id, url, "excluding unparseable github link");
                None
            }
        }
    });
    dedup(refs)
}

/// Parse a plain list of URLs, one per line. Blank lines and `#` comments
/// are ignored; unparseable lines are skipped.
pub fn from_url_list(text: &str) -> Vec<RepoRef> {
    let refs = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let parsed = normalize(line);
            if parsed.is_none() {
                tracing::debug!(line, "excluding unparseable repository URL");
            }
            parsed
        });
    dedup(refs)
}
