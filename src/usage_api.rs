use chrono::{DateTime, Utc};
use serde_json::Value;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::QuotaError;
use crate::models::UsageSnapshot;
use crate::utils::parse_switch;

const USAGE_ENDPOINT: &str = "https://api.anthropic.com/api/oauth/usage";
const ANTHROPIC_BETA: &str = "oauth-2025-04-20";
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);
const TOKEN_ENV_VARS: [&str; 2] = ["CLAUDE_CODE_OAUTH_TOKEN", "ANTHROPIC_AUTH_TOKEN"];

/// Anything that can produce a fresh usage snapshot.
pub trait UsageSource {
    fn fetch(&self, now: DateTime<Utc>) -> Result<UsageSnapshot, QuotaError>;
}

/// OAuth access token plus the plan tier stored beside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    /// Raw tier, e.g. `default_claude_max_5x`
    pub rate_limit_tier: Option<String>,
}

impl Credentials {
    pub fn plan_label(&self) -> Option<String> {
        self.rate_limit_tier.as_deref().and_then(plan_label)
    }
}

/// Human label for a rate-limit tier.
pub fn plan_label(tier: &str) -> Option<String> {
    let tier = tier.trim();
    let known = match tier {
        "default_claude_pro" => Some("Pro"),
        "default_claude_max_5x" => Some("Max 5x"),
        "default_claude_max_20x" => Some("Max 20x"),
        _ => None,
    };
    if let Some(label) = known {
        return Some(label.to_string());
    }
    let words: Vec<String> = tier
        .trim_start_matches("default_claude_")
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();
    (!words.is_empty()).then(|| words.join(" "))
}

fn credentials_from_json(raw: &str) -> Option<Credentials> {
    let json: Value = serde_json::from_str(raw.trim()).ok()?;
    let oauth = json.get("claudeAiOauth")?;
    let token = oauth
        .get("accessToken")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())?;
    Some(Credentials {
        token: token.to_string(),
        rate_limit_tier: oauth
            .get("rateLimitTier")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn env_token() -> Option<String> {
    TOKEN_ENV_VARS.iter().find_map(|key| {
        env::var(key)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// Look for credentials in the environment, the macOS keychain, then each
/// `.credentials.json` under `claude_paths`. Read on every call; nothing here
/// is cached.
pub fn discover_credentials(claude_paths: &[PathBuf]) -> Option<Credentials> {
    let from_files = || {
        claude_paths
            .iter()
            .find_map(|base| read_credentials_file(&base.join(".credentials.json")))
    };

    if let Some(token) = env_token() {
        // The environment carries no tier; borrow it from the stored login
        let tier = read_from_keychain()
            .or_else(from_files)
            .and_then(|c| c.rate_limit_tier);
        return Some(Credentials {
            token,
            rate_limit_tier: tier,
        });
    }
    read_from_keychain().or_else(from_files)
}

fn read_credentials_file(path: &Path) -> Option<Credentials> {
    let raw = fs::read_to_string(path).ok()?;
    let creds = credentials_from_json(&raw);
    if creds.is_none() {
        tracing::debug!(path = %path.display(), "credentials file has no OAuth token");
    }
    creds
}

#[cfg(target_os = "macos")]
fn read_from_keychain() -> Option<Credentials> {
    use sha2::{Digest, Sha256};
    use std::process::Command;

    let username = env::var("USER").ok()?;
    let mut service_name = "Claude Code-credentials".to_string();

    // A custom config dir gets its own keychain item
    if let Ok(config_dir) = env::var("CLAUDE_CONFIG_DIR") {
        let hash = Sha256::digest(config_dir.as_bytes());
        let suffix: String = format!("{hash:x}").chars().take(8).collect();
        service_name.push('-');
        service_name.push_str(&suffix);
    }

    let output = Command::new("security")
        .args(["find-generic-password", "-a", &username, "-s", &service_name, "-w"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    credentials_from_json(&String::from_utf8_lossy(&output.stdout))
}

#[cfg(not(target_os = "macos"))]
fn read_from_keychain() -> Option<Credentials> {
    None
}

/// `CLAUDE_QUOTALINE_FETCH_USAGE=off` keeps the renderer fully offline.
pub fn fetch_enabled() -> bool {
    match env::var("CLAUDE_QUOTALINE_FETCH_USAGE") {
        Ok(val) if !val.trim().is_empty() => parse_switch(&val).unwrap_or(true),
        _ => true,
    }
}

/// The account usage endpoint, authenticated with an OAuth token.
pub struct OAuthUsageSource {
    credentials: Option<Credentials>,
}

impl OAuthUsageSource {
    pub fn new(credentials: Option<Credentials>) -> Self {
        OAuthUsageSource { credentials }
    }
}

impl UsageSource for OAuthUsageSource {
    fn fetch(&self, now: DateTime<Utc>) -> Result<UsageSnapshot, QuotaError> {
        if !fetch_enabled() {
            return Err(QuotaError::NetworkError("usage fetch disabled".into()));
        }
        let creds = self
            .credentials
            .as_ref()
            .ok_or(QuotaError::CredentialsUnavailable)?;

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(FETCH_TIMEOUT))
            .build()
            .into();
        let mut response = agent
            .get(USAGE_ENDPOINT)
            .header("Authorization", format!("Bearer {}", creds.token))
            .header("User-Agent", concat!("claude-quotaline/", env!("CARGO_PKG_VERSION")))
            .header("Accept", "application/json")
            .header("anthropic-beta", ANTHROPIC_BETA)
            .call()?;
        let body: Value = response.body_mut().read_json()?;
        Ok(UsageSnapshot::from_api_value(&body, now))
    }
}
