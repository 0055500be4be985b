//! Human-readable output for the query flags. Each builder returns the text so
//! the binary only has to print it.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use owo_colors::OwoColorize;
use std::fmt::Write as _;
use std::path::Path;

use crate::config::{Config, Part, ThemeName, Visibility, choice_name};
use crate::display::{RenderOptions, render_line};
use crate::models::{ReleaseStatus, SessionContext, Updates, UsageSnapshot};
use crate::release::TOOL_VERSION;
use crate::theme::resolve_text_color;

fn heading(text: &str, color: bool) -> String {
    if color {
        text.bold().to_string()
    } else {
        text.to_string()
    }
}

fn on_off(b: bool) -> &'static str {
    if b { "on" } else { "off" }
}

/// `--config`
pub fn config_report(config: &Config, path: &Path, color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", heading("claude-quotaline config", color), path.display());

    let text = choice_name(config.text_color);
    let text = if text == "auto" {
        let resolved = resolve_text_color(config.text_color, config.theme);
        format!("auto ({} for {} theme)", choice_name(resolved), choice_name(config.theme))
    } else {
        text
    };
    let (shown, hidden): (Vec<Part>, Vec<Part>) =
        Part::ALL.iter().partition(|p| config.show.is_visible(**p));
    let names = |parts: &[Part]| {
        if parts.is_empty() {
            "-".to_string()
        } else {
            parts.iter().map(|p| p.key()).collect::<Vec<_>>().join(", ")
        }
    };

    let rows = [
        ("Theme", choice_name(config.theme)),
        ("Text colour", text),
        ("Bar", format!("{} {}", choice_name(config.bar_size), choice_name(config.bar_style))),
        ("Layout", choice_name(config.layout)),
        ("Animation", on_off(config.animate).to_string()),
        ("Rainbow bars", on_off(config.rainbow_bars).to_string()),
        ("Currency", config.currency.clone()),
        ("Extra", choice_name(config.extra_display)),
        ("Cache TTL", format!("{}s", config.cache_ttl_seconds)),
        ("Shown", names(&shown)),
        ("Hidden", names(&hidden)),
    ];
    for (name, value) in rows {
        let _ = writeln!(out, "  {:<13} {}", format!("{name}:"), value);
    }
    out
}

/// `--themes`: the same sample line under every theme, animation frozen.
pub fn theme_previews(config: &Config, now: DateTime<Utc>, color: bool) -> String {
    let snapshot = UsageSnapshot {
        session_percent: Some(42.0),
        session_resets_at: None,
        weekly_percent: Some(67.0),
        extra: None,
        fetched_at: now,
    };
    let ctx = SessionContext {
        plan: Some("Max 20x".to_string()),
        ..SessionContext::default()
    };
    let opts = RenderOptions {
        color,
        ..RenderOptions::default()
    };

    let mut out = String::new();
    let _ = writeln!(out, "{}", heading("Theme previews:", color));
    for name in ThemeName::value_variants() {
        let demo = Config {
            theme: *name,
            animate: false,
            show: Visibility::only(&[Part::Session, Part::Weekly, Part::Plan]),
            ..config.clone()
        };
        let line = render_line(Some(&snapshot), &ctx, &demo, now, &opts);
        let marker = if *name == config.theme { " <<" } else { "" };
        let _ = writeln!(out, "  {:<10} {line}{marker}", choice_name(*name));
    }
    let _ = writeln!(out, "\n  Set with: claude-quotaline --theme <name>");
    out
}

fn status_row(out: &mut String, name: &str, status: Option<&ReleaseStatus>, unknown: &str) {
    let text = match status {
        Some(s) if s.update_available => {
            format!("{} -> {} (update available)", s.current_version, s.latest_version)
        }
        Some(s) => format!("{} (up to date, latest {})", s.current_version, s.latest_version),
        None => unknown.to_string(),
    };
    let _ = writeln!(out, "  {:<18} {}", format!("{name}:"), text);
}

/// `--check-updates`
pub fn update_report(updates: &Updates, color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", heading("Release check", color));
    status_row(
        &mut out,
        "claude-quotaline",
        updates.tool.as_ref(),
        &format!("{TOOL_VERSION} (latest release unknown)"),
    );
    status_row(&mut out, "Claude Code", updates.host.as_ref(), "version unknown");
    out
}
