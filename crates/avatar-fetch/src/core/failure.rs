use bytes::Bytes;

use crate::data::FetchOutcome;
use crate::error::TransportError;

/// Classify a primary transport result.
///
/// Connection-level failures, broken body transfers and failures without a
/// status code are retryable; HTTP error statuses and timeouts are terminal.
///
/// # Examples
///
/// ```
/// use avatar_fetch::{TransportError, classify};
///
/// let outcome = classify(Err(TransportError::Status { code: 404, message: "Not Found".into() }));
/// assert!(!outcome.is_retryable());
///
/// let outcome = classify(Err(TransportError::Connection { message: "dns error".into() }));
/// assert!(outcome.is_retryable());
/// ```
pub fn classify(result: Result<Bytes, TransportError>) -> FetchOutcome {
    match result {
        Ok(bytes) => FetchOutcome::Success { bytes },
        Err(e) => FetchOutcome::NetworkFailure {
            retryable: e.is_retryable(),
            code: e.code(),
            message: e.to_string(),
        },
    }
}

/// Classify a secondary transport result. There is no further tier, so every
/// failure is terminal.
pub fn classify_fallback(result: Result<Bytes, TransportError>) -> FetchOutcome {
    match classify(result) {
        FetchOutcome::NetworkFailure { code, message, .. } => FetchOutcome::NetworkFailure {
            retryable: false,
            code,
            message,
        },
        outcome => outcome,
    }
}
