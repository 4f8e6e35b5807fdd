//! Error types shared by the presence service and the check agent

use std::path::PathBuf;

/// Failures while loading or validating the static configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML in config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failure of one image fetch / classification attempt.
///
/// `Transient` covers the service-unavailable class (HTTP 503, connection
/// refused, timeouts) and is the only kind [`crate::bounded_retry`] retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckError {
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("{0}")]
    Terminal(String),
    #[error("still unavailable after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl CheckError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn terminal(msg: impl Into<String>) -> Self {
        Self::Terminal(msg.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// The presence status service could not be read
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("presence service unreachable: {0}")]
    Unreachable(String),
    #[error("unexpected presence response: {0}")]
    BadResponse(String),
}

#[derive(Debug, thiserror::Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_is_retryable() {
        assert!(CheckError::transient("503").is_transient());
        assert!(!CheckError::terminal("400").is_transient());
        let exhausted = CheckError::RetriesExhausted { attempts: 3, last: "503".into() };
        assert!(!exhausted.is_transient());
        assert_eq!(exhausted.to_string(), "still unavailable after 3 attempts: 503");
    }
}
