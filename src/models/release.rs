use serde::{Deserialize, Serialize};

use crate::release::is_newer;

/// Outcome of one release check, cached per lineage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseStatus {
    pub current_version: String,
    pub latest_version: String,
    pub update_available: bool,
}

impl ReleaseStatus {
    pub fn new(current: &str, latest: &str) -> Self {
        ReleaseStatus {
            current_version: current.to_string(),
            latest_version: latest.to_string(),
            update_available: is_newer(current, latest),
        }
    }

    /// Re-evaluate against the version that is installed now. A cached entry
    /// written before an upgrade must not keep advertising that upgrade.
    pub fn rebased(self, current: Option<&str>) -> Self {
        match current {
            Some(cur) if cur != self.current_version => ReleaseStatus::new(cur, &self.latest_version),
            _ => self,
        }
    }
}

/// Both update indicators resolved for one render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Updates {
    pub tool: Option<ReleaseStatus>,
    pub host: Option<ReleaseStatus>,
}

impl Updates {
    pub fn tool_available(&self) -> bool {
        self.tool.as_ref().is_some_and(|s| s.update_available)
    }

    pub fn host_available(&self) -> bool {
        self.host.as_ref().is_some_and(|s| s.update_available)
    }
}
