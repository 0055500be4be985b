use thiserror::Error;

/// Every failure the render path can hit. All of them are recovered inside the
/// component that detects them; only flag-mutation commands show one to the user.
#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("no OAuth credentials found")]
    CredentialsUnavailable,

    #[error("request timed out")]
    NetworkTimeout,

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("malformed cache entry: {0}")]
    MalformedCacheEntry(String),

    #[error("malformed config file: {0}")]
    MalformedConfigFile(String),

    #[error("unknown {field} '{value}' (valid: {expected})")]
    UnknownEnumValue {
        field: &'static str,
        value: String,
        expected: String,
    },

    #[error("terminal width unknown")]
    TerminalWidthUnknown,
}

impl From<ureq::Error> for QuotaError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Timeout(_) => QuotaError::NetworkTimeout,
            other => QuotaError::NetworkError(other.to_string()),
        }
    }
}
