//! `ConfigCatalog` (C1): the mutable snapshot of job definitions, tenancy
//! defaults, allowed clients, and bus-trigger lists that every other
//! component reads through.
//!
//! [`load_from_file`] reads the YAML catalog once at startup;
//! [`ConfigCatalog::spawn_watcher`] polls the file's mtime afterward and
//! swaps the snapshot in place when it changes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use anyhow::{Context, Result};
use gateway_types::{AllowedClient, PeriodicDefinition, PostsubmitDefinition, PresubmitDefinition};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One `(project, subscription)` pull-trigger pair (§4.7).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubsubTrigger {
    pub project: String,
    pub subscription: String,
}

/// A `(org_repo pattern, cluster pattern, tenant_id)` default entry.
/// Patterns may be `"*"` to match any value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenancyDefaultEntry {
    pub org_repo: String,
    pub cluster: String,
    pub tenant_id: String,
}

/// The YAML-deserialized shape of the configuration file (§6, `SPEC_FULL.md` §3).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub periodics: Vec<PeriodicDefinition>,
    #[serde(default)]
    pub presubmits: BTreeMap<String, Vec<PresubmitDefinition>>,
    #[serde(default)]
    pub postsubmits: BTreeMap<String, Vec<PostsubmitDefinition>>,
    #[serde(default)]
    pub tenancy_defaults: Vec<TenancyDefaultEntry>,
    #[serde(default)]
    pub allowed_clients: Vec<AllowedClient>,
    #[serde(default)]
    pub allowed_clusters: Vec<String>,
    #[serde(default)]
    pub pubsub_triggers: Vec<PubsubTrigger>,
    #[serde(default)]
    pub push_token: Option<String>,
    #[serde(default)]
    pub job_url_prefix: String,
    /// Org/repo prefixes excluded from any candidate listing (e.g. repo
    /// auto-discovery feeding the resolver). See [`filter_out_disabled`].
    #[serde(default)]
    pub disabled_projects: Vec<String>,
}

/// Remove every candidate whose value is prefixed by one of `disabled`'s
/// entries, then deduplicate while preserving first-seen order.
///
/// This resolves an ambiguity: a prefix-match-and-append loop over
/// `disabled × candidates` produces duplicate entries once more than one
/// disabled prefix fails to match the same candidate. The correct behavior
/// is "remove, then dedupe" rather than "append on non-match" (§9).
pub fn filter_out_disabled(candidates: &[String], disabled: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    candidates
        .iter()
        .filter(|c| !disabled.iter().any(|d| c.starts_with(d.as_str())))
        .filter(|c| seen.insert((*c).clone()))
        .cloned()
        .collect()
}

/// Load and parse a YAML configuration file.
pub fn load_from_file(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

/// Holds the current snapshot and hands out shared read-only views.
/// A single `RwLock` guards the pointer swap (§5): writers are rare,
/// readers frequent, and a read only ever clones the `Arc`.
pub struct ConfigCatalog {
    snapshot: RwLock<Arc<Config>>,
    subscribers: RwLock<Vec<mpsc::Sender<Arc<Config>>>>,
}

impl ConfigCatalog {
    pub fn new(initial: Config) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(initial)),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(load_from_file(path)?))
    }

    /// Lock-free-for-readers snapshot fetch: a read lock is held only long
    /// enough to clone the `Arc`.
    pub fn snapshot(&self) -> Arc<Config> {
        self.snapshot.read().expect("config lock poisoned").clone()
    }

    pub fn all_periodics(&self) -> Vec<PeriodicDefinition> {
        self.snapshot().periodics.clone()
    }

    pub fn presubmits_for(&self, org_repo: &str) -> Vec<PresubmitDefinition> {
        self.snapshot()
            .presubmits
            .get(org_repo)
            .cloned()
            .unwrap_or_default()
    }

    pub fn postsubmits_for(&self, org_repo: &str) -> Vec<PostsubmitDefinition> {
        self.snapshot()
            .postsubmits
            .get(org_repo)
            .cloned()
            .unwrap_or_default()
    }

    /// `defaultsFor(orgRepo, cluster)` (§4.1, §4.4): first tenancy-default
    /// entry whose org_repo and cluster patterns match (`"*"` matches any).
    pub fn defaults_for(&self, org_repo: &str, cluster: &str) -> Option<TenancyDefaultEntry> {
        self.snapshot()
            .tenancy_defaults
            .iter()
            .find(|d| {
                (d.org_repo == "*" || d.org_repo == org_repo)
                    && (d.cluster == "*" || d.cluster == cluster)
            })
            .cloned()
    }

    /// `identifyClient(requestMetadata)`: look up the allowed client by the
    /// identity extracted from request metadata by the trigger surface.
    pub fn identify_client(&self, identity: &str) -> Option<AllowedClient> {
        self.snapshot()
            .allowed_clients
            .iter()
            .find(|c| c.identity == identity)
            .cloned()
    }

    pub fn allowed_clusters(&self) -> Vec<String> {
        self.snapshot().allowed_clusters.clone()
    }

    /// Apply [`filter_out_disabled`] against the current snapshot's
    /// `disabled_projects` list.
    pub fn active_repos(&self, candidates: &[String]) -> Vec<String> {
        filter_out_disabled(candidates, &self.snapshot().disabled_projects)
    }

    pub fn pubsub_triggers(&self) -> Vec<PubsubTrigger> {
        self.snapshot().pubsub_triggers.clone()
    }

    pub fn push_token(&self) -> Option<String> {
        self.snapshot().push_token.clone()
    }

    pub fn job_url_prefix(&self) -> String {
        self.snapshot().job_url_prefix.clone()
    }

    /// Register a delta channel of capacity 2 (§3). Best-effort delivery:
    /// a reload that finds the channel full drops the notification rather
    /// than blocking — the subscriber is expected to re-read `snapshot()`
    /// the next time it wakes regardless.
    pub fn subscribe(&self) -> mpsc::Receiver<Arc<Config>> {
        let (tx, rx) = mpsc::channel(2);
        self.subscribers
            .write()
            .expect("subscribers lock poisoned")
            .push(tx);
        rx
    }

    /// Atomically replace the snapshot and best-effort notify subscribers.
    pub fn replace(&self, new: Config) {
        let new = Arc::new(new);
        {
            let mut guard = self.snapshot.write().expect("config lock poisoned");
            *guard = new.clone();
        }
        let subs = self.subscribers.read().expect("subscribers lock poisoned");
        for tx in subs.iter() {
            let _ = tx.try_send(new.clone());
        }
    }

    /// Reload from `path` if its reported JSON/YAML content changed since
    /// the current snapshot. Errors are logged by the caller and otherwise
    /// ignored — a malformed edit on disk should not crash the gateway.
    pub fn reload_from_file(&self, path: &Path) -> Result<bool> {
        let fresh = load_from_file(path)?;
        if *self.snapshot() == fresh {
            return Ok(false);
        }
        self.replace(fresh);
        Ok(true)
    }

    /// Poll `path`'s mtime on `poll_interval` and reload on change. No
    /// filesystem-notification dependency is taken; polling matches the
    /// rest of this workspace's dependency-light style. Returns only when
    /// `self` is dropped (the `Weak` upgrade fails) or the path becomes
    /// permanently unreadable.
    pub fn spawn_watcher(
        self: &Arc<Self>,
        path: PathBuf,
        poll_interval: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        let catalog = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut last_mtime: Option<SystemTime> = std::fs::metadata(&path)
                .and_then(|m| m.modified())
                .ok();
            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                ticker.tick().await;
                let Some(catalog) = catalog.upgrade() else {
                    return;
                };
                let mtime = match std::fs::metadata(&path).and_then(|m| m.modified()) {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "config file unreadable");
                        continue;
                    }
                };
                if Some(mtime) == last_mtime {
                    continue;
                }
                last_mtime = Some(mtime);
                match catalog.reload_from_file(&path) {
                    Ok(true) => tracing::info!(path = %path.display(), "config reloaded"),
                    Ok(false) => {}
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "config reload failed"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_types::JobFilter;
    use std::io::Write;

    fn sample_config() -> Config {
        let mut presubmits = BTreeMap::new();
        presubmits.insert(
            "k/r".to_string(),
            vec![PresubmitDefinition(gateway_types::job::JobDefinitionCommon {
                name: "unit".into(),
                cluster: "build".into(),
                tenant_id: "platform".into(),
                ..Default::default()
            })],
        );
        Config {
            periodics: vec![],
            presubmits,
            postsubmits: BTreeMap::new(),
            tenancy_defaults: vec![TenancyDefaultEntry {
                org_repo: "*".into(),
                cluster: "*".into(),
                tenant_id: "platform".into(),
            }],
            allowed_clients: vec![AllowedClient {
                identity: "ci-bot".into(),
                filters: vec![JobFilter {
                    tenant_id: "platform".into(),
                }],
            }],
            allowed_clusters: vec!["build".into()],
            pubsub_triggers: vec![PubsubTrigger {
                project: "p".into(),
                subscription: "s".into(),
            }],
            push_token: None,
            job_url_prefix: "https://gateway.example.com/view/".into(),
            disabled_projects: vec![],
        }
    }

    #[test]
    fn filter_out_disabled_removes_prefix_matches_and_dedupes() {
        let candidates = vec![
            "k/a".to_string(),
            "k/b".to_string(),
            "k/a".to_string(),
            "other/c".to_string(),
        ];
        let disabled = vec!["k/a".to_string(), "k/b".to_string()];
        assert_eq!(
            filter_out_disabled(&candidates, &disabled),
            vec!["other/c".to_string()]
        );
    }

    #[test]
    fn filter_out_disabled_with_no_disabled_entries_just_dedupes() {
        let candidates = vec!["a".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(
            filter_out_disabled(&candidates, &[]),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn filter_out_disabled_matches_by_prefix_not_exact_equality() {
        let candidates = vec!["k/repo-1".to_string(), "k/repo-2".to_string()];
        let disabled = vec!["k/repo-1".to_string()];
        assert_eq!(
            filter_out_disabled(&candidates, &disabled),
            vec!["k/repo-2".to_string()]
        );
    }

    #[test]
    fn active_repos_reads_disabled_projects_from_the_snapshot() {
        let mut config = sample_config();
        config.disabled_projects = vec!["k/".to_string()];
        let catalog = ConfigCatalog::new(config);
        let candidates = vec!["k/a".to_string(), "other/b".to_string()];
        assert_eq!(catalog.active_repos(&candidates), vec!["other/b".to_string()]);
    }

    #[test]
    fn presubmits_for_returns_the_keyed_list() {
        let catalog = ConfigCatalog::new(sample_config());
        assert_eq!(catalog.presubmits_for("k/r").len(), 1);
        assert!(catalog.presubmits_for("unknown/repo").is_empty());
    }

    #[test]
    fn defaults_for_matches_wildcard_entries() {
        let catalog = ConfigCatalog::new(sample_config());
        let default = catalog.defaults_for("k/r", "build").unwrap();
        assert_eq!(default.tenant_id, "platform");
    }

    #[test]
    fn identify_client_looks_up_by_identity() {
        let catalog = ConfigCatalog::new(sample_config());
        assert!(catalog.identify_client("ci-bot").is_some());
        assert!(catalog.identify_client("unknown").is_none());
    }

    #[tokio::test]
    async fn replace_notifies_subscribers() {
        let catalog = ConfigCatalog::new(sample_config());
        let mut rx = catalog.subscribe();
        let mut next = sample_config();
        next.job_url_prefix = "https://other/".into();
        catalog.replace(next.clone());
        let delivered = rx.recv().await.unwrap();
        assert_eq!(delivered.job_url_prefix, "https://other/");
    }

    #[test]
    fn load_from_file_parses_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "periodics: []\nallowed_clusters: [\"*\"]\njob_url_prefix: \"https://x/\"\n"
        )
        .unwrap();
        let config = load_from_file(file.path()).unwrap();
        assert_eq!(config.allowed_clusters, vec!["*".to_string()]);
    }

    #[test]
    fn reload_from_file_reports_whether_content_changed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "allowed_clusters: [\"a\"]\n").unwrap();
        let catalog = ConfigCatalog::from_file(file.path()).unwrap();
        assert!(!catalog.reload_from_file(file.path()).unwrap());

        let mut file2 = std::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(file.path())
            .unwrap();
        writeln!(file2, "allowed_clusters: [\"a\", \"b\"]\n").unwrap();
        assert!(catalog.reload_from_file(file.path()).unwrap());
        assert_eq!(catalog.allowed_clusters(), vec!["a".to_string(), "b".to_string()]);
    }
}
