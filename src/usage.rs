//! Percentage and countdown arithmetic, plus ingestion of the raw usage
//! payload into a [`UsageSnapshot`].

use chrono::{DateTime, TimeDelta, Timelike, Utc};
use serde_json::Value;

use crate::models::{ExtraCredit, UsageSnapshot};

/// Clamp a percentage to `[0, 100]`. NaN counts as zero.
pub fn clamp_percent(pct: f64) -> f64 {
    if pct.is_nan() { 0.0 } else { pct.clamp(0.0, 100.0) }
}

/// The whole percent a reader sees. Colour tiers classify this value too, so
/// `80%` is never drawn in the mid colour.
pub fn whole_percent(pct: f64) -> f64 {
    clamp_percent(pct).round()
}

/// Time left until `resets_at`, never negative.
pub fn countdown(resets_at: DateTime<Utc>, now: DateTime<Utc>) -> TimeDelta {
    (resets_at - now).max(TimeDelta::zero())
}

/// `3h 40m`, `12m`, or `now` once the reset has passed.
pub fn format_countdown(resets_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let total = countdown(resets_at, now).num_seconds();
    if total <= 0 {
        return "now".to_string();
    }
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else {
        format!("{minutes}m")
    }
}

/// The API reports resets like `04:59:59.943+00:00`; snap to the nearest
/// minute so the countdown does not flicker between two values.
pub fn normalize_reset_time(dt: DateTime<Utc>) -> DateTime<Utc> {
    let base = dt
        .with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt);
    if dt.second() >= 30 {
        base + TimeDelta::minutes(1)
    } else {
        base
    }
}

impl UsageSnapshot {
    /// Build a snapshot from the `/api/oauth/usage` payload. Each field is read
    /// on its own: a missing or mistyped field becomes `None` without
    /// discarding the rest.
    pub fn from_api_value(v: &Value, fetched_at: DateTime<Utc>) -> Self {
        let five_hour = v.get("five_hour");
        UsageSnapshot {
            session_percent: five_hour.and_then(|w| percent_field(w, "utilization")),
            session_resets_at: five_hour.and_then(|w| datetime_field(w, "resets_at")),
            weekly_percent: v
                .get("seven_day")
                .and_then(|w| percent_field(w, "utilization")),
            extra: v.get("extra_usage").and_then(extra_credit_from),
            fetched_at,
        }
    }
}

fn percent_field(obj: &Value, key: &str) -> Option<f64> {
    obj.get(key).and_then(Value::as_f64).map(clamp_percent)
}

fn number_field(obj: &Value, key: &str) -> Option<f64> {
    obj.get(key).and_then(Value::as_f64).filter(|n| n.is_finite())
}

fn datetime_field(obj: &Value, key: &str) -> Option<DateTime<Utc>> {
    let raw = obj.get(key)?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| normalize_reset_time(dt.with_timezone(&Utc)))
        .ok()
}

fn extra_credit_from(v: &Value) -> Option<ExtraCredit> {
    if !v.is_object() {
        return None;
    }
    Some(ExtraCredit {
        used: number_field(v, "used_credits"),
        limit: number_field(v, "monthly_limit"),
        active: v.get("is_enabled").and_then(Value::as_bool).unwrap_or(false),
        utilization: percent_field(v, "utilization"),
    })
}
