//! JSON persistence for harvest output and fork ledgers.
//!
//! Write flow: serialize → `<file>.tmp` sibling → `rename`. The temporary
//! file lives in the same directory as the target so the rename never
//! crosses filesystems.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{io_err, json_err, CoreError};
use crate::types::{Item, Ledger};

/// Default ledger report file name.
pub const REPORT_FILE: &str = "fork_report.json";

/// Default harvest output file name.
pub const HARVEST_FILE: &str = "projects.json";

/// Atomically write `value` as pretty-printed JSON to `path`.
pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), CoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let tmp = tmp_path(path);
    let mut json = serde_json::to_string_pretty(value).map_err(|e| json_err(path, e))?;
    json.push('\n');
    std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

/// Read and deserialize a JSON file.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, CoreError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_json::from_str(&contents).map_err(|e| json_err(path, e))
}

pub fn save_ledger(path: &Path, ledger: &Ledger) -> Result<(), CoreError> {
    save_json(path, ledger)
}

pub fn load_ledger(path: &Path) -> Result<Ledger, CoreError> {
    load_json(path)
}

pub fn save_items(path: &Path, items: &[Item]) -> Result<(), CoreError> {
    save_json(path, items)
}

pub fn load_items(path: &Path) -> Result<Vec<Item>, CoreError> {
    load_json(path)
}

fn tmp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    path.with_file_name(format!("{name}.tmp"))
}
