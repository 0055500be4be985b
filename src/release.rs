//! Release checks for this tool and for the host CLI.
//!
//! Each feed is its own cache lineage with an hour-long TTL. Network trouble
//! and unparsable versions never reach the user: the indicator is simply
//! left off.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;
use serde_json::Value;
use std::env;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::cache::CacheManager;
use crate::error::QuotaError;
use crate::models::{ReleaseStatus, Updates};

pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const RELEASE_TTL_SECONDS: i64 = 3600;
pub const TOOL_RELEASE_KEY: &str = "release-self";
pub const HOST_RELEASE_KEY: &str = "release-host";

const FETCH_TIMEOUT: Duration = Duration::from_secs(3);
const HOST_VERSION_TIMEOUT: Duration = Duration::from_secs(2);
const NPM_LATEST_URL: &str = "https://registry.npmjs.org/@anthropic-ai/claude-code/latest";

static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+\.\d+\.\d+(?:-[A-Za-z0-9.]+)?)").unwrap());

/// Parse a version leniently: a leading `v` is dropped and a missing minor or
/// patch number counts as zero.
pub fn parse_version(raw: &str) -> Option<Version> {
    let s = raw.trim().trim_start_matches(['v', 'V']);
    if let Ok(v) = Version::parse(s) {
        return Some(v);
    }
    let split = s.find(['-', '+']).unwrap_or(s.len());
    let (core, suffix) = s.split_at(split);
    let parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3 || parts.iter().any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit())) {
        return None;
    }
    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);
    Version::parse(&padded).ok()
}

/// True only when both versions parse and `latest` is strictly greater.
pub fn is_newer(current: &str, latest: &str) -> bool {
    match (parse_version(current), parse_version(latest)) {
        (Some(cur), Some(lat)) => lat > cur,
        _ => false,
    }
}

/// Where the latest published version of something can be found.
pub trait ReleaseFeed {
    fn cache_key(&self) -> &'static str;
    fn latest_version(&self) -> Result<String, QuotaError>;
}

fn agent() -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(FETCH_TIMEOUT))
        .build()
        .into()
}

fn get_json(url: &str) -> Result<Value, QuotaError> {
    let mut response = agent()
        .get(url)
        .header("User-Agent", concat!("claude-quotaline/", env!("CARGO_PKG_VERSION")))
        .header("Accept", "application/json")
        .call()?;
    Ok(response.body_mut().read_json::<Value>()?)
}

fn string_field(v: &Value, key: &str, url: &str) -> Result<String, QuotaError> {
    v.get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().trim_start_matches(['v', 'V']).to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| QuotaError::NetworkError(format!("{url}: missing '{key}'")))
}

/// Latest GitHub release of this tool
pub struct GithubReleaseFeed {
    url: String,
}

impl GithubReleaseFeed {
    /// `CLAUDE_QUOTALINE_RELEASES_URL`, else the GitHub repository named in
    /// the package metadata. `None` when the build has no published home.
    pub fn configured() -> Option<Self> {
        let url = env::var("CLAUDE_QUOTALINE_RELEASES_URL")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .or_else(|| latest_release_url(env!("CARGO_PKG_REPOSITORY")))?;
        Some(GithubReleaseFeed { url })
    }
}

/// `https://github.com/owner/repo` to its latest-release API endpoint.
fn latest_release_url(repository: &str) -> Option<String> {
    let path = repository.trim().strip_prefix("https://github.com/")?;
    let path = path.trim_end_matches('/').trim_end_matches(".git");
    let (owner, repo) = path.split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some(format!("https://api.github.com/repos/{owner}/{repo}/releases/latest"))
}

impl ReleaseFeed for GithubReleaseFeed {
    fn cache_key(&self) -> &'static str {
        TOOL_RELEASE_KEY
    }

    fn latest_version(&self) -> Result<String, QuotaError> {
        let body = get_json(&self.url)?;
        string_field(&body, "tag_name", &self.url)
    }
}

/// Latest npm release of the host CLI
#[derive(Default)]
pub struct NpmReleaseFeed;

impl ReleaseFeed for NpmReleaseFeed {
    fn cache_key(&self) -> &'static str {
        HOST_RELEASE_KEY
    }

    fn latest_version(&self) -> Result<String, QuotaError> {
        let body = get_json(NPM_LATEST_URL)?;
        string_field(&body, "version", NPM_LATEST_URL)
    }
}

/// Resolve one feed against the installed `current` version. `force` fetches
/// even when the cached answer is still fresh.
pub fn check(
    cache: &mut CacheManager,
    feed: &dyn ReleaseFeed,
    current: &str,
    now: DateTime<Utc>,
    force: bool,
) -> Option<ReleaseStatus> {
    let key = feed.cache_key();
    let fetch = || {
        let latest = feed.latest_version()?;
        tracing::debug!(key, current, latest = %latest, "release feed answered");
        Ok(ReleaseStatus::new(current, &latest))
    };
    let lookup = if force {
        cache.refresh(key, RELEASE_TTL_SECONDS, now, fetch)
    } else {
        cache.get(key, RELEASE_TTL_SECONDS, now, fetch)
    };
    lookup.into_value().map(|status| status.rebased(Some(current)))
}

/// Both indicators. The tool check needs a configured release feed; the host
/// check needs the host version, from the input channel or else from
/// `claude --version`.
pub fn check_all(
    cache: &mut CacheManager,
    host_version: Option<&str>,
    now: DateTime<Utc>,
    force: bool,
) -> Updates {
    let tool = GithubReleaseFeed::configured()
        .and_then(|feed| check(cache, &feed, TOOL_VERSION, now, force));
    let host = check_host(cache, &NpmReleaseFeed, host_version, installed_host_version, now, force);
    Updates { tool, host }
}

/// Without a reported version a fresh cached answer is served as is; the
/// installed binary is only asked when the feed has to be consulted anyway.
fn check_host(
    cache: &mut CacheManager,
    feed: &dyn ReleaseFeed,
    reported: Option<&str>,
    installed: impl FnOnce() -> Option<String>,
    now: DateTime<Utc>,
    force: bool,
) -> Option<ReleaseStatus> {
    if let Some(current) = reported {
        return check(cache, feed, current, now, force);
    }
    if !force {
        let cached = cache
            .read::<ReleaseStatus>(feed.cache_key())
            .filter(|entry| entry.is_fresh(RELEASE_TTL_SECONDS, now));
        if let Some(entry) = cached {
            return Some(entry.value);
        }
    }
    let current = installed()?;
    check(cache, feed, &current, now, force)
}

/// Version reported by `claude --version`, if the binary is on `PATH` and
/// answers within a couple of seconds.
pub fn installed_host_version() -> Option<String> {
    command_version("claude", HOST_VERSION_TIMEOUT)
}

fn command_version(program: &str, timeout: Duration) -> Option<String> {
    let output = output_within(Command::new(program).arg("--version"), timeout)?;
    if !output.status.success() {
        return None;
    }
    extract_version(&String::from_utf8_lossy(&output.stdout))
        .or_else(|| extract_version(&String::from_utf8_lossy(&output.stderr)))
}

/// Run `command` to completion, killing it once `timeout` has passed.
fn output_within(command: &mut Command, timeout: Duration) -> Option<Output> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .ok()?;
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return child.wait_with_output().ok(),
            Ok(None) if start.elapsed() < timeout => thread::sleep(Duration::from_millis(20)),
            Ok(None) | Err(_) => {
                tracing::debug!(?timeout, "version command did not finish, killing it");
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
        }
    }
}

fn extract_version(text: &str) -> Option<String> {
    VERSION_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheEntry;
    use chrono::{TimeDelta, TimeZone};
    use serial_test::serial;
    use std::cell::Cell;
    use tempfile::TempDir;

    struct FakeFeed {
        answer: Result<&'static str, ()>,
        calls: Cell<usize>,
    }

    impl FakeFeed {
        fn ok(v: &'static str) -> Self {
            FakeFeed { answer: Ok(v), calls: Cell::new(0) }
        }

        fn down() -> Self {
            FakeFeed { answer: Err(()), calls: Cell::new(0) }
        }
    }

    impl ReleaseFeed for FakeFeed {
        fn cache_key(&self) -> &'static str {
            HOST_RELEASE_KEY
        }

        fn latest_version(&self) -> Result<String, QuotaError> {
            self.calls.set(self.calls.get() + 1);
            self.answer
                .map(str::to_string)
                .map_err(|_| QuotaError::NetworkTimeout)
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 18, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_version_comparison() {
        assert!(is_newer("2.0.14", "2.0.15"));
        assert!(is_newer("v1.2.0", "1.10.0"));
        assert!(is_newer("1.2", "1.2.1"));
        assert!(!is_newer("1.2.0", "1.2"));
        assert!(!is_newer("2.1.0", "2.0.99"));
        assert!(!is_newer("1.0.0", "1.0.0"));
        assert!(is_newer("1.0.0-beta.1", "1.0.0"));
    }

    #[test]
    fn test_malformed_versions_mean_no_update() {
        assert!(!is_newer("1.0.0", "latest"));
        assert!(!is_newer("dev", "9.9.9"));
        assert!(!is_newer("1.0.0", ""));
        assert!(!is_newer("1.0.0", "1..2"));
        assert_eq!(parse_version("v3"), Some(Version::new(3, 0, 0)));
    }

    #[test]
    fn test_extract_version() {
        assert_eq!(extract_version("2.0.14 (Claude Code)").as_deref(), Some("2.0.14"));
        assert_eq!(extract_version("no digits"), None);
    }

    #[test]
    fn test_check_caches_for_an_hour() {
        let dir = TempDir::new().unwrap();
        let feed = FakeFeed::ok("2.1.0");

        let mut cache = CacheManager::new(dir.path());
        let status = check(&mut cache, &feed, "2.0.0", t0(), false).unwrap();
        assert!(status.update_available);
        assert_eq!(status.latest_version, "2.1.0");

        // next invocation, 59 minutes later
        let mut cache = CacheManager::new(dir.path());
        let status = check(&mut cache, &feed, "2.0.0", t0() + TimeDelta::minutes(59), false).unwrap();
        assert!(status.update_available);
        assert_eq!(feed.calls.get(), 1);

        let mut cache = CacheManager::new(dir.path());
        check(&mut cache, &feed, "2.0.0", t0() + TimeDelta::minutes(61), false).unwrap();
        assert_eq!(feed.calls.get(), 2);
    }

    #[test]
    fn test_upgrade_clears_cached_indicator() {
        let dir = TempDir::new().unwrap();
        let feed = FakeFeed::ok("2.1.0");
        let mut cache = CacheManager::new(dir.path());
        check(&mut cache, &feed, "2.0.0", t0(), false).unwrap();

        let mut cache = CacheManager::new(dir.path());
        let status = check(&mut cache, &feed, "2.1.0", t0() + TimeDelta::minutes(5), false).unwrap();
        assert!(!status.update_available);
        assert_eq!(feed.calls.get(), 1);
    }

    #[test]
    fn test_network_failure_is_silent() {
        let dir = TempDir::new().unwrap();
        let mut cache = CacheManager::new(dir.path());
        assert_eq!(check(&mut cache, &FakeFeed::down(), "2.0.0", t0(), false), None);

        let mut cache = CacheManager::new(dir.path());
        check(&mut cache, &FakeFeed::ok("2.2.0"), "2.0.0", t0(), false).unwrap();
        let mut cache = CacheManager::new(dir.path());
        let stale = check(&mut cache, &FakeFeed::down(), "2.0.0", t0() + TimeDelta::hours(3), false);
        assert!(stale.unwrap().update_available);
    }

    #[test]
    fn test_force_bypasses_freshness() {
        let dir = TempDir::new().unwrap();
        let mut cache = CacheManager::new(dir.path());
        check(&mut cache, &FakeFeed::ok("2.1.0"), "2.0.0", t0(), false).unwrap();

        let feed = FakeFeed::ok("2.2.0");
        let mut cache = CacheManager::new(dir.path());
        let status = check(&mut cache, &feed, "2.0.0", t0() + TimeDelta::minutes(1), true).unwrap();
        assert_eq!(feed.calls.get(), 1);
        assert_eq!(status.latest_version, "2.2.0");
    }

    #[test]
    fn test_latest_release_url() {
        assert_eq!(
            latest_release_url("https://github.com/acme/quota.git").as_deref(),
            Some("https://api.github.com/repos/acme/quota/releases/latest")
        );
        assert_eq!(
            latest_release_url("https://github.com/acme/quota/").as_deref(),
            Some("https://api.github.com/repos/acme/quota/releases/latest")
        );
        assert_eq!(latest_release_url(""), None);
        assert_eq!(latest_release_url("https://gitlab.com/acme/quota"), None);
        assert_eq!(latest_release_url("https://github.com/acme"), None);
    }

    #[test]
    #[serial]
    fn test_tool_feed_needs_a_published_home() {
        unsafe { env::remove_var("CLAUDE_QUOTALINE_RELEASES_URL") };
        let configured = GithubReleaseFeed::configured().map(|feed| feed.url);
        assert_eq!(configured, latest_release_url(env!("CARGO_PKG_REPOSITORY")));

        unsafe { env::set_var("CLAUDE_QUOTALINE_RELEASES_URL", "http://127.0.0.1:9/latest") };
        let feed = GithubReleaseFeed::configured().unwrap();
        assert_eq!(feed.url, "http://127.0.0.1:9/latest");
        unsafe { env::remove_var("CLAUDE_QUOTALINE_RELEASES_URL") };
    }

    #[test]
    fn test_fresh_host_entry_skips_installed_lookup() {
        let dir = TempDir::new().unwrap();
        let mut cache = CacheManager::new(dir.path());
        check(&mut cache, &FakeFeed::ok("2.1.0"), "2.0.0", t0(), false).unwrap();

        let asked = Cell::new(0);
        let installed = || {
            asked.set(asked.get() + 1);
            Some("2.0.0".to_string())
        };
        let feed = FakeFeed::ok("2.1.0");
        let mut cache = CacheManager::new(dir.path());
        let status = check_host(&mut cache, &feed, None, installed, t0() + TimeDelta::minutes(10), false).unwrap();
        assert!(status.update_available);
        assert_eq!(asked.get(), 0);
        assert_eq!(feed.calls.get(), 0);
    }

    #[test]
    fn test_stale_host_entry_asks_installed_binary() {
        let dir = TempDir::new().unwrap();
        let mut cache = CacheManager::new(dir.path());
        check(&mut cache, &FakeFeed::ok("2.1.0"), "2.0.0", t0(), false).unwrap();

        let asked = Cell::new(0);
        let installed = || {
            asked.set(asked.get() + 1);
            Some("2.1.0".to_string())
        };
        let feed = FakeFeed::ok("2.1.0");
        let mut cache = CacheManager::new(dir.path());
        let status = check_host(&mut cache, &feed, None, installed, t0() + TimeDelta::hours(2), false).unwrap();
        assert!(!status.update_available);
        assert_eq!(asked.get(), 1);
        assert_eq!(feed.calls.get(), 1);

        // nothing installed and nothing fresh: no indicator
        let mut cache = CacheManager::new(dir.path());
        let none = check_host(&mut cache, &feed, None, || None, t0() + TimeDelta::hours(4), false);
        assert_eq!(none, None);
    }

    #[cfg(unix)]
    fn fake_binary(dir: &std::path::Path, name: &str, body: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn test_hung_version_command_is_killed() {
        let dir = TempDir::new().unwrap();
        let quick = fake_binary(dir.path(), "quick", "echo '2.0.14 (Claude Code)'");
        let hung = fake_binary(dir.path(), "hung", "exec sleep 5");

        assert_eq!(
            command_version(quick.to_str().unwrap(), Duration::from_secs(2)).as_deref(),
            Some("2.0.14")
        );
        let start = Instant::now();
        assert_eq!(command_version(hung.to_str().unwrap(), Duration::from_millis(200)), None);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    /// Repeated renders with both release entries fresh never start the host CLI.
    #[cfg(unix)]
    #[test]
    #[serial]
    fn test_fresh_caches_never_spawn_host_cli() {
        let bin = TempDir::new().unwrap();
        let log = bin.path().join("runs.log");
        fake_binary(
            bin.path(),
            "claude",
            &format!("echo run >> '{}'\necho 2.0.0\nexec sleep 2", log.display()),
        );
        let old_path = env::var_os("PATH");
        unsafe { env::set_var("PATH", bin.path()) };
        unsafe { env::remove_var("CLAUDE_QUOTALINE_RELEASES_URL") };

        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path());
        for (key, current) in [(TOOL_RELEASE_KEY, TOOL_VERSION), (HOST_RELEASE_KEY, "2.0.0")] {
            let entry = CacheEntry {
                value: ReleaseStatus::new(current, "9.0.0"),
                fetched_at: t0(),
                ttl_seconds: RELEASE_TTL_SECONDS,
            };
            cache.write(key, &entry).unwrap();
        }

        let start = Instant::now();
        for tick in 0..3 {
            let mut cache = CacheManager::new(dir.path());
            let updates = check_all(&mut cache, None, t0() + TimeDelta::seconds(tick), false);
            assert!(updates.host_available());
        }

        match old_path {
            Some(p) => unsafe { env::set_var("PATH", p) },
            None => unsafe { env::remove_var("PATH") },
        }
        assert!(!log.exists(), "host CLI was started");
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
