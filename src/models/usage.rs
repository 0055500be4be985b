use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::usage::clamp_percent;

/// Gifted or purchased credits on top of the plan allowance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraCredit {
    pub used: Option<f64>,
    pub limit: Option<f64>,
    pub active: bool,
    /// Percent reported by the API, already clamped
    pub utilization: Option<f64>,
}

impl ExtraCredit {
    /// Enabled with a positive limit; the condition for auto display.
    pub fn has_credits(&self) -> bool {
        self.active && self.limit.is_some_and(|l| l > 0.0)
    }

    pub fn percent(&self) -> f64 {
        if let Some(pct) = self.utilization {
            return pct;
        }
        match (self.used, self.limit) {
            (Some(used), Some(limit)) if limit > 0.0 => clamp_percent(used / limit * 100.0),
            _ => 0.0,
        }
    }
}

/// Account usage as last fetched from the remote API. This is what the usage
/// cache lineage stores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub session_percent: Option<f64>,
    pub session_resets_at: Option<DateTime<Utc>>,
    pub weekly_percent: Option<f64>,
    pub extra: Option<ExtraCredit>,
    pub fetched_at: DateTime<Utc>,
}
