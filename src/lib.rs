//! # Claude Quotaline
//!
//! A status line for Claude Code that shows how much of the account's usage
//! quota is left, refreshed on every UI tick.
//!
//! ## Overview
//!
//! Each invocation is a short-lived process. Remote data is kept in small TTL
//! caches on disk so most ticks never touch the network:
//! - Session (5-hour) and weekly usage with a reset countdown
//! - Extra credits, when the account has them
//! - Context window fill, model and plan from the host's JSON on stdin
//! - Update indicators for this tool and for the host CLI
//!
//! Rendering is a pure function of the snapshot, the session context, the
//! config and the current time, so identical inputs give identical lines.

/// Stateless hue drift and shimmer
pub mod animation;

/// Usage bar glyphs and fill arithmetic
pub mod bar;

/// File-backed TTL cache with stale fallback
pub mod cache;

/// Command-line argument parsing
pub mod cli;

/// Persisted configuration and flag mutations
pub mod config;

/// Line composition, width fitting and colouring
pub mod display;

pub mod error;

/// Data models for usage snapshots, hook input and release checks
pub mod models;

/// Release feeds and version comparison
pub mod release;

/// Text for the query flags
pub mod report;

/// Theme registry and colour resolution
pub mod theme;

/// Percent and countdown arithmetic, usage payload ingestion
pub mod usage;

/// Usage retrieved from the Claude OAuth API
pub mod usage_api;

/// Paths, stdin, terminal width and atomic writes
pub mod utils;
