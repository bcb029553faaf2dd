//! `RepoConfigCache` (C2): two independent bounded LRU caches guarding the
//! expensive repository-walk step that reads in-repo job configuration at
//! a specific `(base-sha, head-shas)` tuple.
//!
//! The repository walk itself is injected via [`RepoConfigFetcher`] — the
//! *RepoFetcher* collaborator named out of scope — so this crate can be
//! fully exercised without a real git clone.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use gateway_types::error::GatewayError;
use gateway_types::job::JobDefinitionCommon;
use gateway_types::{CacheKey, PostsubmitDefinition, PresubmitDefinition};
use lru::LruCache;
use serde::{Serialize, de::DeserializeOwned};

/// The expensive repository-walk collaborator. Implementations read in-repo
/// YAML at `base_sha`/`head_shas` and merge it with `static_jobs`, returning
/// a combined list guaranteed to already contain every entry in
/// `static_jobs` (Resolver relies on this guarantee — see `gateway-resolver`).
pub trait RepoConfigFetcher: Send + Sync {
    fn fetch_presubmits(
        &self,
        repo: &str,
        base_sha: &str,
        head_shas: &[String],
        static_jobs: &[PresubmitDefinition],
    ) -> Result<Vec<PresubmitDefinition>, GatewayError>;

    fn fetch_postsubmits(
        &self,
        repo: &str,
        base_sha: &str,
        static_jobs: &[PostsubmitDefinition],
    ) -> Result<Vec<PostsubmitDefinition>, GatewayError>;
}

/// Result of a cache lookup, reporting both whether the underlying LRU was
/// hit and whether an insert evicted an older entry (§8 boundary behavior).
#[derive(Debug, Clone, PartialEq)]
pub struct CacheOutcome<T> {
    pub jobs: Vec<T>,
    pub hit: bool,
    pub evicted: bool,
}

/// A single bounded LRU keyed by [`CacheKey`], storing values behind a
/// type-erased `serde_json::Value`. Storing through `Value` rather than the
/// native `Vec<T>` directly is what makes the §9 "cache self-healing"
/// behavior a real code path rather than a structural impossibility: a slot
/// can, in principle, be overwritten with a value of the wrong shape (e.g.
/// if this cache is later backed by shared/persisted storage), and
/// `get_or_construct` treats a failed decode exactly like a miss.
struct TypedLru {
    inner: Mutex<LruCache<CacheKey, serde_json::Value>>,
    /// Per-key construction locks (§8: concurrent lookups on the same key
    /// with a slow constructor must invoke it at most once). A thread that
    /// misses takes the key's lock before calling `construct`, so a second
    /// thread racing on the same key blocks on that lock instead of also
    /// calling `construct`, then observes the first thread's cached result.
    in_flight: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl TypedLru {
    fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    fn lookup<T>(&self, key: &CacheKey) -> Option<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let mut guard = self.inner.lock().expect("repo cache lock poisoned");
        let raw = guard.get(key)?.clone();
        match serde_json::from_value::<Vec<T>>(raw) {
            Ok(jobs) => Some(jobs),
            Err(_) => {
                tracing::warn!(key = %key, "repo config cache slot held the wrong shape, healing");
                None
            }
        }
    }

    /// Drop the key's construction lock once no other thread is still
    /// waiting on it, so `in_flight` doesn't grow without bound over the
    /// life of the process.
    fn release_in_flight(&self, key: &CacheKey, key_lock: &Arc<Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().expect("repo cache in-flight lock poisoned");
        if let Some(entry) = in_flight.get(key) {
            if Arc::ptr_eq(entry, key_lock) && Arc::strong_count(entry) == 2 {
                in_flight.remove(key);
            }
        }
    }

    fn get_or_construct<T, F>(&self, key: CacheKey, construct: F) -> Result<CacheOutcome<T>, GatewayError>
    where
        T: Clone + Serialize + DeserializeOwned,
        F: FnOnce() -> Result<Vec<T>, GatewayError>,
    {
        if let Some(jobs) = self.lookup::<T>(&key) {
            return Ok(CacheOutcome {
                jobs,
                hit: true,
                evicted: false,
            });
        }

        let key_lock = {
            let mut in_flight = self.in_flight.lock().expect("repo cache in-flight lock poisoned");
            in_flight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _key_guard = key_lock.lock().expect("repo cache per-key lock poisoned");

        // Another thread may have constructed this entry while we waited.
        if let Some(jobs) = self.lookup::<T>(&key) {
            self.release_in_flight(&key, &key_lock);
            return Ok(CacheOutcome {
                jobs,
                hit: true,
                evicted: false,
            });
        }

        let jobs = match construct() {
            Ok(jobs) => jobs,
            Err(e) => {
                self.release_in_flight(&key, &key_lock);
                return Err(e);
            }
        };
        let value = match serde_json::to_value(&jobs)
            .map_err(|e| GatewayError::Internal(format!("cache value did not serialize: {e}")))
        {
            Ok(value) => value,
            Err(e) => {
                self.release_in_flight(&key, &key_lock);
                return Err(e);
            }
        };

        let evicted = {
            let mut guard = self.inner.lock().expect("repo cache lock poisoned");
            guard.push(key.clone(), value).is_some()
        };

        self.release_in_flight(&key, &key_lock);

        Ok(CacheOutcome {
            jobs,
            hit: false,
            evicted,
        })
    }
}

/// Two independent bounded LRU caches (presubmit, postsubmit), both with the
/// same positive capacity.
pub struct RepoConfigCache {
    presubmit: TypedLru,
    postsubmit: TypedLru,
    fetcher: Box<dyn RepoConfigFetcher>,
}

impl RepoConfigCache {
    /// `capacity` must be positive; `capacity == 0` is an initialization
    /// failure (§4.2).
    pub fn new(capacity: usize, fetcher: Box<dyn RepoConfigFetcher>) -> Result<Self, GatewayError> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| GatewayError::Internal("repo config cache capacity must be > 0".into()))?;
        Ok(Self {
            presubmit: TypedLru::new(capacity),
            postsubmit: TypedLru::new(capacity),
            fetcher,
        })
    }

    /// Build a `CacheKey`, propagating getter failures as `BadGetter`.
    fn build_key(
        repo: &str,
        base_sha_getter: &dyn Fn() -> Result<String, GatewayError>,
        head_sha_getters: &[Box<dyn Fn() -> Result<String, GatewayError>>],
    ) -> Result<(CacheKey, String, Vec<String>), GatewayError> {
        let base_sha = base_sha_getter()?;
        let mut head_shas = Vec::with_capacity(head_sha_getters.len());
        for getter in head_sha_getters {
            head_shas.push(getter()?);
        }
        let key = CacheKey::new(repo, base_sha.clone(), head_shas.clone())?;
        Ok((key, base_sha, head_shas))
    }

    pub fn get_presubmits(
        &self,
        repo: &str,
        base_sha_getter: &dyn Fn() -> Result<String, GatewayError>,
        head_sha_getters: &[Box<dyn Fn() -> Result<String, GatewayError>>],
        static_jobs: &[PresubmitDefinition],
    ) -> Result<CacheOutcome<PresubmitDefinition>, GatewayError> {
        let (key, base_sha, head_shas) = Self::build_key(repo, base_sha_getter, head_sha_getters)?;
        let repo = repo.to_string();
        let fetcher = &self.fetcher;
        self.presubmit.get_or_construct(key, move || {
            fetcher.fetch_presubmits(&repo, &base_sha, &head_shas, static_jobs)
        })
    }

    pub fn get_postsubmits(
        &self,
        repo: &str,
        base_sha_getter: &dyn Fn() -> Result<String, GatewayError>,
        static_jobs: &[PostsubmitDefinition],
    ) -> Result<CacheOutcome<PostsubmitDefinition>, GatewayError> {
        let (key, base_sha, _) = Self::build_key(repo, base_sha_getter, &[])?;
        let repo = repo.to_string();
        let fetcher = &self.fetcher;
        self.postsubmit.get_or_construct(key, move || {
            fetcher.fetch_postsubmits(&repo, &base_sha, static_jobs)
        })
    }
}
