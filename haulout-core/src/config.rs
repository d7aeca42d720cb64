//! Layered runtime configuration.
//!
//! # Layering
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. Optional YAML file (`~/.haulout/config.yaml`, or an explicit path)
//! 3. Environment (`DEEPSURGE_COOKIE`, `FORK_TOKEN`/`GITHUB_TOKEN`,
//!    `TARGET_ORG`, `SYNC_EXISTING_FORKS`)
//!
//! Command-line flags are applied on top by the binary. The result is built
//! once at startup and passed by reference; nothing here is global.
//!
//! Like the rest of this crate, every function touching the home directory
//! has an `_at(home)` form used by tests.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{io_err, CoreError};

/// Fixed page size requested from the listing endpoint.
pub const PAGE_SIZE: u32 = 20;

pub const DEFAULT_LISTING_ENDPOINT: &str = "https://www.deepsurge.xyz/api/projects";
pub const DEFAULT_COLLECTION_ID: &str = "26f4d734-b30f-4009-9b41-edac04308c01";
pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_TARGET_ORG: &str = "walrus-haulout";
pub const DEFAULT_USER_AGENT: &str = concat!(
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) ",
    "AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
);

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Settings for the paginated listing harvester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingConfig {
    pub endpoint: String,
    /// Collection identifier sent as `hackathonId`.
    pub collection_id: String,
    /// Sent verbatim as the `Cookie` header when present.
    pub cookie: Option<String>,
    pub timeout: Duration,
    /// Courtesy pause between successive pages.
    pub page_delay: Duration,
    /// Pause before the single retry of a failed page.
    pub retry_cooldown: Duration,
    pub page_limit: usize,
}

/// Retry policy for fork requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkRetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// First exponential backoff delay; doubles on every backoff retry.
    pub base_backoff: Duration,
    /// Wait after a "submitted too quickly" rejection.
    pub throttle_cooldown: Duration,
    /// Wait used when `Retry-After` is present but not an integer.
    pub retry_after_fallback: Duration,
    /// Upper bound on any server-directed `Retry-After` wait.
    pub max_retry_after: Duration,
    /// Attempts per branch for a merge-upstream call that hits transport
    /// errors or 5xx responses.
    pub sync_max_attempts: u32,
}

/// Settings for the GitHub fork/sync orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubConfig {
    pub api_base: String,
    /// Sent as `Authorization: Bearer <token>` when present.
    pub token: Option<String>,
    pub target_org: String,
    pub sync_existing: bool,
    pub lookup_timeout: Duration,
    pub mutation_timeout: Duration,
    /// Pause between repositories (not after the last one).
    pub item_delay: Duration,
    pub fork_retry: ForkRetryConfig,
}

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Identification header (`User-Agent`) attached to every request.
    pub user_agent: String,
    pub listing: ListingConfig,
    pub github: GitHubConfig,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_LISTING_ENDPOINT.to_string(),
            collection_id: DEFAULT_COLLECTION_ID.to_string(),
            cookie: None,
            timeout: Duration::from_secs(30),
            page_delay: Duration::from_millis(1500),
            retry_cooldown: Duration::from_secs(3),
            page_limit: 50,
        }
    }
}

impl Default for ForkRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_backoff: Duration::from_secs(2),
            throttle_cooldown: Duration::from_secs(60),
            retry_after_fallback: Duration::from_secs(60),
            max_retry_after: Duration::from_secs(15 * 60),
            sync_max_attempts: 3,
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: None,
            target_org: DEFAULT_TARGET_ORG.to_string(),
            sync_existing: true,
            lookup_timeout: Duration::from_secs(10),
            mutation_timeout: Duration::from_secs(30),
            item_delay: Duration::from_secs(10),
            fork_retry: ForkRetryConfig::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            listing: ListingConfig::default(),
            github: GitHubConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// YAML file shape
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    user_agent: Option<String>,
    listing: ListingFile,
    github: GitHubFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ListingFile {
    endpoint: Option<String>,
    collection_id: Option<String>,
    cookie: Option<String>,
    timeout_secs: Option<u64>,
    page_delay_ms: Option<u64>,
    retry_cooldown_ms: Option<u64>,
    page_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct GitHubFile {
    api_base: Option<String>,
    token: Option<String>,
    target_org: Option<String>,
    sync_existing: Option<bool>,
    lookup_timeout_secs: Option<u64>,
    mutation_timeout_secs: Option<u64>,
    item_delay_ms: Option<u64>,
    max_attempts: Option<u32>,
    base_backoff_ms: Option<u64>,
    throttle_cooldown_secs: Option<u64>,
    retry_after_fallback_secs: Option<u64>,
    max_retry_after_secs: Option<u64>,
    sync_max_attempts: Option<u32>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// `<home>/.haulout/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".haulout").join("config.yaml")
}

impl Config {
    /// Build the configuration from defaults, the YAML file and the process
    /// environment.
    ///
    /// `explicit` must exist when given; the default location is optional.
    pub fn load_at(home: &Path, explicit: Option<&Path>) -> Result<Self, CoreError> {
        let mut config = Self::default();
        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(CoreError::ConfigNotFound {
                        path: path.to_path_buf(),
                    });
                }
                config.apply_file(path)?;
            }
            None => {
                let path = config_path_at(home);
                if path.exists() {
                    config.apply_file(&path)?;
                }
            }
        }
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// `load_at` convenience wrapper using `dirs::home_dir()`.
    pub fn load(explicit: Option<&Path>) -> Result<Self, CoreError> {
        let home = dirs::home_dir().ok_or(CoreError::HomeNotFound)?;
        Self::load_at(&home, explicit)
    }

    /// Overlay values from a YAML file.
    pub fn apply_file(&mut self, path: &Path) -> Result<(), CoreError> {
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        let file: ConfigFile = if contents.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml::from_str(&contents).map_err(|source| CoreError::Config {
                path: path.to_path_buf(),
                source,
            })?
        };
        tracing::debug!(path = %path.display(), "loaded config file");
        self.merge(file);
        Ok(())
    }

    /// Overlay values from environment variables, read through `lookup`.
    ///
    /// `FORK_TOKEN` takes precedence over `GITHUB_TOKEN`. Blank values are
    /// ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(cookie) = get("DEEPSURGE_COOKIE") {
            self.listing.cookie = Some(cookie);
        }
        if let Some(token) = get("FORK_TOKEN").or_else(|| get("GITHUB_TOKEN")) {
            self.github.token = Some(token);
        }
        if let Some(org) = get("TARGET_ORG") {
            self.github.target_org = org;
        }
        if let Some(flag) = get("SYNC_EXISTING_FORKS") {
            self.github.sync_existing = parse_flag(&flag);
        }
    }

    fn merge(&mut self, file: ConfigFile) {
        if let Some(ua) = file.user_agent {
            self.user_agent = ua;
        }

        let l = file.listing;
        let listing = &mut self.listing;
        if let Some(v) = l.endpoint {
            listing.endpoint = v;
        }
        if let Some(v) = l.collection_id {
            listing.collection_id = v;
        }
        if l.cookie.is_some() {
            listing.cookie = l.cookie;
        }
        if let Some(v) = l.timeout_secs {
            listing.timeout = Duration::from_secs(v);
        }
        if let Some(v) = l.page_delay_ms {
            listing.page_delay = Duration::from_millis(v);
        }
        if let Some(v) = l.retry_cooldown_ms {
            listing.retry_cooldown = Duration::from_millis(v);
        }
        if let Some(v) = l.page_limit {
            listing.page_limit = v;
        }

        let g = file.github;
        let github = &mut self.github;
        if let Some(v) = g.api_base {
            github.api_base = v;
        }
        if g.token.is_some() {
            github.token = g.token;
        }
        if let Some(v) = g.target_org {
            github.target_org = v;
        }
        if let Some(v) = g.sync_existing {
            github.sync_existing = v;
        }
        if let Some(v) = g.lookup_timeout_secs {
            github.lookup_timeout = Duration::from_secs(v);
        }
        if let Some(v) = g.mutation_timeout_secs {
            github.mutation_timeout = Duration::from_secs(v);
        }
        if let Some(v) = g.item_delay_ms {
            github.item_delay = Duration::from_millis(v);
        }
        if let Some(v) = g.max_attempts {
            github.fork_retry.max_attempts = v.max(1);
        }
        if let Some(v) = g.base_backoff_ms {
            github.fork_retry.base_backoff = Duration::from_millis(v);
        }
        if let Some(v) = g.throttle_cooldown_secs {
            github.fork_retry.throttle_cooldown = Duration::from_secs(v);
        }
        if let Some(v) = g.retry_after_fallback_secs {
            github.fork_retry.retry_after_fallback = Duration::from_secs(v);
        }
        if let Some(v) = g.max_retry_after_secs {
            github.fork_retry.max_retry_after = Duration::from_secs(v);
        }
        if let Some(v) = g.sync_max_attempts {
            github.fork_retry.sync_max_attempts = v.max(1);
        }
    }
}

/// `true`, `1` and `yes` (any case) enable a flag; anything else disables it.
pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::TempDir;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.listing.page_limit, 50);
        assert_eq!(config.listing.retry_cooldown, Duration::from_secs(3));
        assert_eq!(config.github.target_org, "walrus-haulout");
        assert!(config.github.sync_existing);
        assert_eq!(config.github.fork_retry.max_attempts, 10);
        assert_eq!(config.github.fork_retry.base_backoff, Duration::from_secs(2));
        assert_eq!(config.github.item_delay, Duration::from_secs(10));
        assert_eq!(config.github.fork_retry.max_retry_after, Duration::from_secs(900));
        assert_eq!(config.github.fork_retry.sync_max_attempts, 3);
    }

    #[test]
    fn fork_token_wins_over_github_token() {
        let mut config = Config::default();
        config.apply_env(env(&[("FORK_TOKEN", "fork"), ("GITHUB_TOKEN", "gh")]));
        assert_eq!(config.github.token.as_deref(), Some("fork"));

        let mut config = Config::default();
        config.apply_env(env(&[("FORK_TOKEN", " "), ("GITHUB_TOKEN", "gh")]));
        assert_eq!(config.github.token.as_deref(), Some("gh"));
    }

    #[test]
    fn sync_flag_parsing() {
        let cases = [
            ("true", true),
            ("YES", true),
            ("1", true),
            ("false", false),
            ("off", false),
        ];
        for (raw, expected) in cases {
            let mut config = Config::default();
            config.apply_env(env(&[("SYNC_EXISTING_FORKS", raw)]));
            assert_eq!(config.github.sync_existing, expected, "value {raw}");
        }
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let home = TempDir::new().expect("home");
        let path = config_path_at(home.path());
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(
            &path,
            concat!(
                "listing:\n  page_limit: 7\n  page_delay_ms: 0\n",
                "github:\n  target_org: mirrors\n  max_attempts: 3\n",
                "  max_retry_after_secs: 120\n  sync_max_attempts: 0\n",
            ),
        )
        .expect("write");

        let mut config = Config::default();
        config.apply_file(&path).expect("apply");
        assert_eq!(config.listing.page_limit, 7);
        assert_eq!(config.listing.page_delay, Duration::ZERO);
        assert_eq!(config.github.target_org, "mirrors");
        assert_eq!(config.github.fork_retry.max_attempts, 3);
        assert_eq!(config.github.fork_retry.max_retry_after, Duration::from_secs(120));
        // Zero attempts would never call the endpoint.
        assert_eq!(config.github.fork_retry.sync_max_attempts, 1);
        assert_eq!(config.github.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn unknown_keys_are_rejected_with_path() {
        let home = TempDir::new().expect("home");
        let path = home.path().join("bad.yaml");
        std::fs::write(&path, "listing:\n  pages: 3\n").expect("write");

        let err = Config::default().apply_file(&path).unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }), "got: {err}");
        assert!(err.to_string().contains("bad.yaml"));
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let home = TempDir::new().expect("home");
        let missing = home.path().join("nope.yaml");
        let err = Config::load_at(home.path(), Some(&missing)).unwrap_err();
        assert!(matches!(err, CoreError::ConfigNotFound { .. }));
    }
}
