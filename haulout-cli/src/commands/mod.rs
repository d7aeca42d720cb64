pub mod fork;
pub mod harvest;
pub mod refs;
pub mod report;

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use haulout_core::{repo_ref, Item, RepoRef};

/// Load repository references from `input`.
///
/// A file whose content starts with `[` is read as a harvest (JSON array of
/// items, references taken from their `github` link); anything else is a
/// plain list of repository URLs.
pub fn load_repo_refs(input: &Path) -> Result<Vec<RepoRef>> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;

    if text.trim_start().starts_with('[') {
        let raw: Vec<Value> = serde_json::from_str(&text)
            .with_context(|| format!("{} is not a valid harvest file", input.display()))?;
        let items: Vec<Item> = raw.into_iter().filter_map(Item::from_value).collect();
        let refs = repo_ref::from_items(&items);
        tracing::info!(items = items.len(), repos = refs.len(), "loaded harvest");
        Ok(refs)
    } else {
        let refs = repo_ref::from_url_list(&text);
        tracing::info!(repos = refs.len(), "loaded URL list");
        Ok(refs)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn harvest_files_and_url_lists_are_both_accepted() {
        let dir = TempDir::new().expect("tempdir");

        let harvest = dir.path().join("projects.json");
        fs::write(
            &harvest,
            concat!(
                r#"[{"id": 7, "projectName": "Seven", "links": "#,
                r#"[{"type": "github", "url": "https://github.com/acme/seven.git"}]}]"#,
            ),
        )
        .expect("write");
        let refs = load_repo_refs(&harvest).expect("harvest refs");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].full_name(), "acme/seven");
        assert_eq!(refs[0].project_name.as_deref(), Some("Seven"));

        let list = dir.path().join("repos.txt");
        fs::write(
            &list,
            concat!(
                "# mirrors\nhttps://github.com/acme/one\n\n",
                "github.com/acme/two\nhttps://gitlab.com/x/y\n",
            ),
        )
        .expect("write");
        let refs = load_repo_refs(&list).expect("list refs");
        let names: Vec<String> = refs.iter().map(RepoRef::full_name).collect();
        assert_eq!(names, vec!["acme/one", "acme/two"]);
    }

    #[test]
    fn unreadable_input_names_the_file() {
        let err = load_repo_refs(Path::new("/definitely/missing.json")).expect_err("missing");
        assert!(format!("{err:#}").contains("missing.json"));
    }
}
