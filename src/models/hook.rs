use serde::Serialize;
use serde_json::Value;

use crate::usage::clamp_percent;

/// Per-invocation facts from the host. Rebuilt on every render and never
/// cached, so these fields stay live while the usage snapshot may be served
/// from cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionContext {
    /// Context window fill; absent until the session has sent a message
    pub context_percent: Option<f64>,
    pub model: Option<String>,
    /// Plan tier label such as `Max 5x`
    pub plan: Option<String>,
    /// Host CLI version as reported on stdin
    pub host_version: Option<String>,
}

impl SessionContext {
    /// Parse the host's status-line JSON. Empty or unparsable input yields an
    /// empty context rather than an error.
    pub fn from_hook_bytes(bytes: &[u8]) -> Self {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return SessionContext::default();
        }
        match serde_json::from_slice::<Value>(bytes) {
            Ok(v) => SessionContext::from_hook_value(&v),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring unparsable hook input");
                SessionContext::default()
            }
        }
    }

    pub fn from_hook_value(v: &Value) -> Self {
        let model = v
            .get("model")
            .and_then(|m| m.get("display_name").or_else(|| m.get("id")))
            .and_then(non_empty_str);
        let host_version = v.get("version").and_then(non_empty_str);
        let context_percent = v.get("context_window").and_then(context_percent_from);
        SessionContext {
            context_percent,
            model,
            plan: None,
            host_version,
        }
    }

    pub fn with_plan(mut self, plan: Option<String>) -> Self {
        self.plan = plan;
        self
    }
}

fn non_empty_str(v: &Value) -> Option<String> {
    v.as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn context_percent_from(cw: &Value) -> Option<f64> {
    if let Some(pct) = cw.get("used_percentage").and_then(Value::as_f64) {
        return Some(clamp_percent(pct));
    }
    let size = cw
        .get("context_window_size")
        .and_then(Value::as_f64)
        .filter(|s| *s > 0.0)?;
    let usage = cw.get("current_usage").filter(|u| u.is_object())?;
    let used: f64 = [
        "input_tokens",
        "cache_creation_input_tokens",
        "cache_read_input_tokens",
    ]
    .iter()
    .filter_map(|k| usage.get(*k).and_then(Value::as_f64))
    .sum();
    Some(clamp_percent(used / size * 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_hook_payload() {
        let raw = br#"{
            "session_id": "abc",
            "model": {"id": "claude-opus-4-1", "display_name": "Opus 4.1"},
            "version": "2.0.14",
            "context_window": {"used_percentage": 41.5}
        }"#;
        let ctx = SessionContext::from_hook_bytes(raw);
        assert_eq!(ctx.model.as_deref(), Some("Opus 4.1"));
        assert_eq!(ctx.host_version.as_deref(), Some("2.0.14"));
        assert_eq!(ctx.context_percent, Some(41.5));
        assert_eq!(ctx.plan, None);
    }

    #[test]
    fn test_context_from_token_counts() {
        let raw = br#"{"context_window": {
            "context_window_size": 200000,
            "current_usage": {"input_tokens": 40000, "cache_read_input_tokens": 60000}
        }}"#;
        let ctx = SessionContext::from_hook_bytes(raw);
        assert_eq!(ctx.context_percent, Some(50.0));
    }

    #[test]
    fn test_session_not_started_has_no_context() {
        let raw = br#"{"model": {"display_name": "Sonnet 4.5"}, "context_window": {"current_usage": null, "context_window_size": 200000}}"#;
        let ctx = SessionContext::from_hook_bytes(raw);
        assert_eq!(ctx.context_percent, None);
        assert_eq!(ctx.model.as_deref(), Some("Sonnet 4.5"));
    }

    #[test]
    fn test_malformed_fields_degrade_individually() {
        let raw = br#"{"model": {"display_name": 7}, "version": "2.1.0", "context_window": {"used_percentage": "lots"}}"#;
        let ctx = SessionContext::from_hook_bytes(raw);
        assert_eq!(ctx.model, None);
        assert_eq!(ctx.context_percent, None);
        assert_eq!(ctx.host_version.as_deref(), Some("2.1.0"));
    }

    #[test]
    fn test_empty_and_garbage_input() {
        assert_eq!(SessionContext::from_hook_bytes(b""), SessionContext::default());
        assert_eq!(SessionContext::from_hook_bytes(b"  \n"), SessionContext::default());
        assert_eq!(SessionContext::from_hook_bytes(b"{not json"), SessionContext::default());
    }

    #[test]
    fn test_percent_is_clamped() {
        let ctx = SessionContext::from_hook_bytes(br#"{"context_window": {"used_percentage": 130}}"#);
        assert_eq!(ctx.context_percent, Some(100.0));
    }
}
