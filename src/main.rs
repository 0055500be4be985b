use anyhow::Result;
use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use std::process;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use claude_quotaline::cache::{CacheManager, USAGE_CACHE_KEY};
use claude_quotaline::cli::Args;
use claude_quotaline::config::{Config, ConfigStore, Part, Setting, apply};
use claude_quotaline::display::{RenderOptions, render_line};
use claude_quotaline::models::{SessionContext, Updates};
use claude_quotaline::release;
use claude_quotaline::report;
use claude_quotaline::usage_api::{OAuthUsageSource, UsageSource, discover_credentials};
use claude_quotaline::utils::{
    cache_dir, claude_paths, colors_enabled, line_width, read_stdin,
};

const STDIN_TIMEOUT: Duration = Duration::from_millis(250);

/// Diagnostics go to stderr; stdout carries only the status line.
fn setup_logging(debug: bool) {
    let filter = match std::env::var("CLAUDE_QUOTALINE_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        _ if debug => EnvFilter::new("claude_quotaline=debug"),
        _ => EnvFilter::new("off"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

/// Apply setting flags in order and save once. Any invalid value aborts with
/// exit status 2 before anything is written.
fn apply_settings(store: &ConfigStore, settings: &[(Setting, &str)], color: bool) -> Result<Config> {
    let mut config = store.load();
    for (setting, value) in settings {
        match apply(*setting, value, &config) {
            Ok(next) => config = next,
            Err(err) => {
                if color {
                    eprintln!("{} {}: {err}", "error:".red().bold(), setting.flag());
                } else {
                    eprintln!("error: {}: {err}", setting.flag());
                }
                process::exit(2);
            }
        }
    }
    store.save(&config)?;
    for (setting, value) in settings {
        let mark = if color { "✓".green().to_string() } else { "✓".to_string() };
        println!("{mark} {} {}", setting.flag(), value.trim());
    }
    Ok(config)
}

fn render(args: &Args, config: &Config, now: DateTime<Utc>, color: bool) {
    let stdin = read_stdin(STDIN_TIMEOUT);
    let credentials = discover_credentials(&claude_paths());
    let plan = credentials.as_ref().and_then(|c| c.plan_label());
    let ctx = SessionContext::from_hook_bytes(&stdin).with_plan(plan);

    let source = OAuthUsageSource::new(credentials);
    let mut cache = CacheManager::new(cache_dir());
    let snapshot = cache
        .get(USAGE_CACHE_KEY, config.cache_ttl_seconds, now, || source.fetch(now))
        .into_value();

    let updates = if config.show.is_visible(Part::Update) {
        release::check_all(&mut cache, ctx.host_version.as_deref(), now, false)
    } else {
        Updates::default()
    };

    let opts = RenderOptions {
        width: line_width(args.width),
        color,
        updates,
    };
    println!("{}", render_line(snapshot.as_ref(), &ctx, config, now, &opts));
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.debug);

    let color = colors_enabled();
    let now = Utc::now();
    let store = ConfigStore::open_default();

    let settings = args.mutations();
    let config = if settings.is_empty() {
        store.load()
    } else {
        apply_settings(&store, &settings, color)?
    };

    let mut queried = false;
    if args.config {
        print!("{}", report::config_report(&config, store.path(), color));
        queried = true;
    }
    if args.themes {
        print!("{}", report::theme_previews(&config, now, color));
        queried = true;
    }
    if args.check_updates {
        let mut cache = CacheManager::new(cache_dir());
        let updates = release::check_all(&mut cache, None, now, true);
        print!("{}", report::update_report(&updates, color));
        queried = true;
    }

    if settings.is_empty() && !queried {
        render(&args, &config, now, color);
    }
    Ok(())
}
