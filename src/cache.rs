//! # Cache Module
//!
//! File-backed TTL cache. Each key is one JSON document
//! `{value, fetched_at, ttl_seconds}` under the cache directory, so independent
//! lineages (usage, release checks) never block each other.
//!
//! Writers replace the file atomically; concurrent renders may both fetch and
//! the last rename wins. No locks are taken.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::QuotaError;
use crate::utils::write_atomic;

/// Cache key of the account usage lineage
pub const USAGE_CACHE_KEY: &str = "usage";

/// One persisted record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    pub fetched_at: DateTime<Utc>,
    pub ttl_seconds: i64,
}

impl<T> CacheEntry<T> {
    /// `now - fetched_at < ttl`
    pub fn is_fresh(&self, ttl_seconds: i64, now: DateTime<Utc>) -> bool {
        (now - self.fetched_at).num_milliseconds() < ttl_seconds.saturating_mul(1000)
    }
}

/// Where a looked-up value came from
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    /// Cached and within its TTL; `fetch` was not called
    Fresh(T),
    /// Just fetched and stored
    Refreshed(T),
    /// Fetch failed; serving the previous value past its TTL
    Stale(T),
    /// Fetch failed and nothing was cached
    Absent,
}

impl<T> Lookup<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Lookup::Fresh(v) | Lookup::Refreshed(v) | Lookup::Stale(v) => Some(v),
            Lookup::Absent => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Lookup::Fresh(v) | Lookup::Refreshed(v) | Lookup::Stale(v) => Some(v),
            Lookup::Absent => None,
        }
    }
}

pub struct CacheManager {
    dir: PathBuf,
    /// Keys already fetched by this process, so a key is fetched at most once
    attempted: HashSet<String>,
}

impl CacheManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        CacheManager {
            dir: dir.into(),
            attempted: HashSet::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Read the record for `key`. Missing and unreadable records both come back
    /// as `None`; a corrupt record is logged and otherwise ignored.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        let path = self.entry_path(key);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::debug!(key, error = %e, "cache entry unreadable");
                return None;
            }
        };
        match serde_json::from_slice::<CacheEntry<T>>(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                let err = QuotaError::MalformedCacheEntry(format!("{}: {e}", path.display()));
                tracing::warn!(key, error = %err, "discarding corrupt cache entry");
                None
            }
        }
    }

    pub fn write<T: Serialize>(&self, key: &str, entry: &CacheEntry<T>) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(entry)?;
        write_atomic(&self.entry_path(key), &json)
    }

    /// Drop the record for `key`, if any.
    pub fn invalidate(&self, key: &str) {
        if let Err(e) = fs::remove_file(self.entry_path(key)) {
            if e.kind() != ErrorKind::NotFound {
                tracing::debug!(key, error = %e, "could not remove cache entry");
            }
        }
    }

    /// Serve `key` from cache while fresh, otherwise call `fetch` and store the
    /// result. A failed fetch falls back to the previous value however old it
    /// is; with no previous value the result is [`Lookup::Absent`].
    pub fn get<T, F>(&mut self, key: &str, ttl_seconds: i64, now: DateTime<Utc>, fetch: F) -> Lookup<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, QuotaError>,
    {
        let prior = match self.read::<T>(key) {
            Some(entry) if entry.is_fresh(ttl_seconds, now) => {
                tracing::debug!(key, "cache fresh");
                return Lookup::Fresh(entry.value);
            }
            other => other,
        };
        self.fetch_over(key, ttl_seconds, now, prior, fetch)
    }

    /// Like [`get`](Self::get) but ignores freshness: fetch now, and fall back
    /// to whatever is cached if that fails.
    pub fn refresh<T, F>(&mut self, key: &str, ttl_seconds: i64, now: DateTime<Utc>, fetch: F) -> Lookup<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, QuotaError>,
    {
        let prior = self.read::<T>(key);
        self.fetch_over(key, ttl_seconds, now, prior, fetch)
    }

    fn fetch_over<T, F>(
        &mut self,
        key: &str,
        ttl_seconds: i64,
        now: DateTime<Utc>,
        prior: Option<CacheEntry<T>>,
        fetch: F,
    ) -> Lookup<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, QuotaError>,
    {
        if !self.attempted.insert(key.to_string()) {
            return match prior {
                Some(entry) => Lookup::Stale(entry.value),
                None => Lookup::Absent,
            };
        }

        match fetch() {
            Ok(value) => {
                let entry = CacheEntry {
                    value,
                    fetched_at: now,
                    ttl_seconds,
                };
                if let Err(e) = self.write(key, &entry) {
                    tracing::warn!(key, error = %e, "failed to persist cache entry");
                }
                Lookup::Refreshed(entry.value)
            }
            Err(err) => match prior {
                Some(entry) => {
                    tracing::warn!(key, error = %err, fetched_at = %entry.fetched_at, "fetch failed, serving stale value");
                    Lookup::Stale(entry.value)
                }
                None => {
                    tracing::warn!(key, error = %err, "fetch failed, nothing cached");
                    Lookup::Absent
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use std::cell::Cell;
    use tempfile::TempDir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 18, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_fresh_entry_skips_fetch() {
        let dir = TempDir::new().unwrap();
        let mut cache = CacheManager::new(dir.path());
        cache
            .write("usage", &CacheEntry { value: 7u32, fetched_at: t0(), ttl_seconds: 60 })
            .unwrap();

        let calls = Cell::new(0);
        let got = cache.get("usage", 60, t0() + TimeDelta::seconds(59), || {
            calls.set(calls.get() + 1);
            Ok(99u32)
        });
        assert_eq!(got, Lookup::Fresh(7));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_expired_entry_is_refreshed() {
        let dir = TempDir::new().unwrap();
        let mut cache = CacheManager::new(dir.path());
        cache
            .write("usage", &CacheEntry { value: 7u32, fetched_at: t0(), ttl_seconds: 60 })
            .unwrap();

        let later = t0() + TimeDelta::seconds(60);
        assert_eq!(cache.get("usage", 60, later, || Ok(8u32)), Lookup::Refreshed(8));

        let stored: CacheEntry<u32> = cache.read("usage").unwrap();
        assert_eq!(stored.value, 8);
        assert_eq!(stored.fetched_at, later);
    }

    #[test]
    fn test_failed_fetch_serves_stale_value() {
        let dir = TempDir::new().unwrap();
        let mut cache = CacheManager::new(dir.path());
        cache
            .write("usage", &CacheEntry { value: 7u32, fetched_at: t0(), ttl_seconds: 60 })
            .unwrap();

        let got = cache.get("usage", 60, t0() + TimeDelta::hours(5), || {
            Err::<u32, _>(QuotaError::NetworkTimeout)
        });
        assert_eq!(got, Lookup::Stale(7));
        // Stale value is kept as-is on disk
        assert_eq!(cache.read::<u32>("usage").unwrap().fetched_at, t0());
    }

    #[test]
    fn test_failed_fetch_without_prior_is_absent() {
        let dir = TempDir::new().unwrap();
        let mut cache = CacheManager::new(dir.path());
        let got = cache.get("usage", 60, t0(), || {
            Err::<u32, _>(QuotaError::CredentialsUnavailable)
        });
        assert_eq!(got, Lookup::Absent);
        assert!(!cache.entry_path("usage").exists());
    }

    #[test]
    fn test_corrupt_entry_is_treated_as_absent() {
        let dir = TempDir::new().unwrap();
        let mut cache = CacheManager::new(dir.path());
        fs::write(cache.entry_path("usage"), b"{\"value\": 3, \"fetched_at\": tru").unwrap();

        assert!(cache.read::<u32>("usage").is_none());
        assert_eq!(cache.get("usage", 60, t0(), || Ok(5u32)), Lookup::Refreshed(5));
    }

    #[test]
    fn test_fetch_runs_at_most_once_per_key() {
        let dir = TempDir::new().unwrap();
        let mut cache = CacheManager::new(dir.path());
        let calls = Cell::new(0);
        let failing = || {
            calls.set(calls.get() + 1);
            Err::<u32, _>(QuotaError::NetworkError("down".into()))
        };
        assert_eq!(cache.get("usage", 60, t0(), failing), Lookup::Absent);
        assert_eq!(cache.get("usage", 60, t0(), failing), Lookup::Absent);
        assert_eq!(calls.get(), 1);

        // A different lineage is unaffected
        assert_eq!(cache.get("release-self", 3600, t0(), || Ok(1u32)), Lookup::Refreshed(1));
    }

    #[test]
    fn test_ttl_of_caller_decides_freshness() {
        let entry = CacheEntry { value: (), fetched_at: t0(), ttl_seconds: 3600 };
        let now = t0() + TimeDelta::seconds(120);
        assert!(entry.is_fresh(3600, now));
        assert!(!entry.is_fresh(60, now));
        assert!(!entry.is_fresh(0, t0()));
    }

    #[test]
    fn test_refresh_ignores_freshness_but_keeps_fallback() {
        let dir = TempDir::new().unwrap();
        let mut cache = CacheManager::new(dir.path());
        cache
            .write("release-self", &CacheEntry { value: 1u32, fetched_at: t0(), ttl_seconds: 3600 })
            .unwrap();
        let got = cache.refresh("release-self", 3600, t0(), || {
            Err::<u32, _>(QuotaError::NetworkTimeout)
        });
        assert_eq!(got, Lookup::Stale(1));

        let mut cache = CacheManager::new(dir.path());
        assert_eq!(cache.refresh("release-self", 3600, t0(), || Ok(2u32)), Lookup::Refreshed(2));
    }

    #[test]
    fn test_invalidate_removes_entry() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path());
        cache
            .write("release-host", &CacheEntry { value: 1u8, fetched_at: t0(), ttl_seconds: 1 })
            .unwrap();
        cache.invalidate("release-host");
        cache.invalidate("release-host");
        assert!(cache.read::<u8>("release-host").is_none());
    }
}
