use std::future::Future;
use std::sync::Arc;

use avatar_policy::HostPolicy;
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{HeaderName, HeaderValue};

use super::tls::{self, Verification};
use crate::data::FetchConfig;
use crate::error::{Error, Result, TransportError};

/// One way of turning a URL into response bytes.
///
/// Implementations apply the host policy headers, enforce their own timeout,
/// and map every failure into a [`TransportError`] so the orchestrator can
/// classify it.
///
/// # Implementations
///
/// - [`PrimaryTransport`](super::PrimaryTransport): first attempt
/// - [`SecondaryTransport`](super::SecondaryTransport): the single fallback attempt
/// - Scripted implementations for testing
pub trait Transport: Send + Sync {
    /// GET `url` and return the full response body.
    ///
    /// # Errors
    ///
    /// Connection failures, non-success statuses, timeouts and body read
    /// errors, each as the matching [`TransportError`] variant.
    fn send(&self, url: &str) -> impl Future<Output = std::result::Result<Bytes, TransportError>> + Send;
}

/// Build a reqwest client carrying our TLS config and timeout.
pub(crate) fn http_client(
    config: &FetchConfig,
    policy: &Arc<HostPolicy>,
    verification: Verification,
    decompress: bool,
) -> Result<reqwest::Client> {
    let tls = tls::client_config(policy, verification, config.tls13)?;

    reqwest::Client::builder()
        .use_preconfigured_tls(tls)
        .timeout(config.timeout())
        .gzip(decompress)
        .deflate(decompress)
        .build()
        .map_err(Error::Client)
}

/// Apply the policy headers for `url` to a request.
///
/// A header whose name or value is not valid HTTP is logged and skipped; the
/// request goes out with the rest.
pub(crate) fn with_policy_headers(
    mut request: reqwest::RequestBuilder,
    policy: &HostPolicy,
    url: &str,
) -> reqwest::RequestBuilder {
    for (name, value) in policy.headers_for(url) {
        let header_name = match HeaderName::try_from(name.as_str()) {
            Ok(header_name) => header_name,
            Err(e) => {
                tracing::warn!(url, header = %name, error = %e, "skipping invalid header name");
                continue;
            }
        };
        let header_value = match HeaderValue::try_from(value.as_str()) {
            Ok(header_value) => header_value,
            Err(e) => {
                tracing::warn!(url, header = %name, error = %e, "skipping invalid header value");
                continue;
            }
        };
        request = request.header(header_name, header_value);
    }
    request
}

pub(crate) fn status_error(status: StatusCode) -> TransportError {
    TransportError::Status {
        code: status.as_u16(),
        message: status
            .canonical_reason()
            .unwrap_or("unrecognised status")
            .to_string(),
    }
}

/// Map a failure while reading the body of a response that arrived with
/// `code`.
pub(crate) fn body_error(e: reqwest::Error, code: u16) -> TransportError {
    match TransportError::from(e) {
        TransportError::Body { message, .. } | TransportError::Connection { message } => {
            TransportError::Body { code, message }
        }
        other => other,
    }
}
