//! Mapping of HTTP failures onto the retry taxonomy

use doorwatch_core::CheckError;
use reqwest::StatusCode;

/// Connect failures and timeouts are worth retrying, the rest is not.
pub fn request_error(what: &str, e: reqwest::Error) -> CheckError {
    if e.is_connect() || e.is_timeout() {
        CheckError::transient(format!("{what}: {e}"))
    } else {
        CheckError::terminal(format!("{what}: {e}"))
    }
}

/// Only 503 is the service-unavailable class.
pub fn status_error(what: &str, status: StatusCode) -> CheckError {
    if status == StatusCode::SERVICE_UNAVAILABLE {
        CheckError::transient(format!("{what} returned {status}"))
    } else {
        CheckError::terminal(format!("{what} returned {status}"))
    }
}
