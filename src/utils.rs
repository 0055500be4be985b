use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::env;
use std::fs;
use std::io::{IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::error::QuotaError;

/// Directory name shared by the config and cache locations
pub const APP_DIR_NAME: &str = "claude-quotaline";

/// Width assumed when neither the terminal nor `COLUMNS` reports one
pub const FALLBACK_WIDTH: usize = 120;

static ANSI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*m").unwrap());

fn home_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|b| b.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~"))
}

/// Directory holding `config.json`.
///
/// `CLAUDE_QUOTALINE_CONFIG_DIR` wins, otherwise the platform config dir
/// (`~/.config/claude-quotaline` on Linux).
pub fn config_dir() -> PathBuf {
    if let Ok(custom) = env::var("CLAUDE_QUOTALINE_CONFIG_DIR") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    directories::BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| home_dir().join(".config"))
        .join(APP_DIR_NAME)
}

/// Directory holding one JSON file per cache lineage.
pub fn cache_dir() -> PathBuf {
    if let Ok(custom) = env::var("CLAUDE_QUOTALINE_CACHE_DIR") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    directories::BaseDirs::new()
        .map(|b| b.cache_dir().to_path_buf())
        .unwrap_or_else(|| home_dir().join(".cache"))
        .join(APP_DIR_NAME)
}

/// Claude Code data directories that may hold `.credentials.json`.
/// `CLAUDE_CONFIG_DIR` accepts a comma-separated list, like the host does.
pub fn claude_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(list) = env::var("CLAUDE_CONFIG_DIR") {
        for p in list.split(',') {
            let p = p.trim();
            if !p.is_empty() {
                paths.push(PathBuf::from(p));
            }
        }
    }
    let home = home_dir();
    let xdg_config = directories::BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| home.join(".config"));
    for base in [home.join(".claude"), xdg_config.join("claude")] {
        if !paths.contains(&base) {
            paths.push(base);
        }
    }
    paths
}

/// Replace `path` with `bytes` so readers only ever see the old or the new
/// document: write a uniquely named sibling, flush it, then rename over the target.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let dir = path
        .parent()
        .with_context(|| format!("no parent directory for {}", path.display()))?;
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("create temp file in {}", dir.display()))?;
    tmp.write_all(bytes).context("write temp file")?;
    tmp.as_file().sync_all().context("sync temp file")?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("rename into {}", path.display()))?;
    Ok(())
}

/// Read the host's JSON payload from stdin, giving up after `timeout`.
///
/// An interactive stdin is skipped entirely; a slow or silent producer yields
/// whatever arrived before the deadline (usually nothing).
pub fn read_stdin(timeout: Duration) -> Vec<u8> {
    if std::io::stdin().is_terminal() {
        return Vec::new();
    }
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = std::io::stdin().read_to_end(&mut buf);
        let _ = tx.send(buf);
    });
    match rx.recv_timeout(timeout) {
        Ok(buf) => buf,
        Err(_) => {
            tracing::debug!(?timeout, "stdin not closed in time, rendering without it");
            Vec::new()
        }
    }
}

/// Columns available for the line: explicit override, then the attached
/// terminal, then `$COLUMNS`.
pub fn terminal_width(override_cols: Option<usize>) -> Result<usize, QuotaError> {
    let attached = terminal_size::terminal_size().map(|(terminal_size::Width(w), _)| w as usize);
    pick_width(override_cols, attached, env::var("COLUMNS").ok().as_deref())
}

fn pick_width(
    override_cols: Option<usize>,
    attached: Option<usize>,
    columns: Option<&str>,
) -> Result<usize, QuotaError> {
    override_cols
        .filter(|w| *w > 0)
        .or(attached.filter(|w| *w > 0))
        .or_else(|| columns.and_then(|s| s.trim().parse::<usize>().ok()).filter(|w| *w > 0))
        .ok_or(QuotaError::TerminalWidthUnknown)
}

/// Width to render into; an unknown width becomes [`FALLBACK_WIDTH`].
pub fn line_width(override_cols: Option<usize>) -> usize {
    width_or_fallback(terminal_width(override_cols))
}

fn width_or_fallback(width: Result<usize, QuotaError>) -> usize {
    width.unwrap_or_else(|err| {
        tracing::debug!(error = %err, width = FALLBACK_WIDTH, "using fallback width");
        FALLBACK_WIDTH
    })
}

/// Whether escape sequences should be emitted at all (`NO_COLOR` convention).
pub fn colors_enabled() -> bool {
    env::var_os("NO_COLOR").is_none_or(|v| v.is_empty())
}

/// Parse an on/off style switch.
pub fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Remove SGR escape sequences, leaving only the visible glyphs.
pub fn strip_ansi(s: &str) -> String {
    ANSI_RE.replace_all(s, "").into_owned()
}

pub fn format_amount(v: f64) -> String {
    format!("{v:.2}")
}
