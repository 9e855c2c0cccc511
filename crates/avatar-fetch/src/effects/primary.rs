//! First-attempt transport with a pollable request operation.

use std::sync::Arc;
use std::time::Duration;

use avatar_policy::HostPolicy;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::tls::Verification;
use super::transport::{Transport, body_error, http_client, status_error, with_policy_headers};
use crate::data::FetchConfig;
use crate::error::{Result, TransportError};

/// First-attempt transport.
///
/// Holds two clients: one with standard certificate validation, and one with
/// the trust evaluator, used only for requests to trusted hosts. Responses
/// are not decompressed.
pub struct PrimaryTransport {
    standard: reqwest::Client,
    trusted: reqwest::Client,
    policy: Arc<HostPolicy>,
    timeout: Duration,
}

impl PrimaryTransport {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let policy = Arc::new(config.policy.clone());
        Ok(Self {
            standard: http_client(config, &policy, Verification::Standard, false)?,
            trusted: http_client(config, &policy, Verification::Trusted, false)?,
            policy,
            timeout: config.timeout(),
        })
    }

    pub fn policy(&self) -> &HostPolicy {
        &self.policy
    }

    /// Build a GET request for `url` with the policy headers and timeout.
    ///
    /// # Errors
    ///
    /// [`TransportError::InvalidRequest`] if `url` or a policy header cannot
    /// form a request.
    pub fn build_request(&self, url: &str) -> std::result::Result<RequestHandle, TransportError> {
        let trusted = self.policy.is_trusted_url(url);
        let client = if trusted { &self.trusted } else { &self.standard };

        let request = with_policy_headers(client.get(url), &self.policy, url)
            .timeout(self.timeout)
            .build()?;

        Ok(RequestHandle {
            client: client.clone(),
            request,
            trusted,
        })
    }
}

impl Transport for PrimaryTransport {
    async fn send(&self, url: &str) -> std::result::Result<Bytes, TransportError> {
        let mut operation = self.build_request(url)?.send();
        operation.wait().await.into_result()
    }
}

/// A built, not yet sent, primary request.
#[derive(Debug)]
pub struct RequestHandle {
    client: reqwest::Client,
    request: reqwest::Request,
    trusted: bool,
}

impl RequestHandle {
    pub fn url(&self) -> &str {
        self.request.url().as_str()
    }

    pub fn method(&self) -> &reqwest::Method {
        self.request.method()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.request.timeout().copied()
    }

    /// Returns `true` if the request validates certificates through the
    /// trust evaluator instead of the standard verifier.
    pub fn uses_trust_evaluator(&self) -> bool {
        self.trusted
    }

    /// Start the exchange on the current tokio runtime. Does not block.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn send(self) -> Operation {
        let (tx, rx) = watch::channel(None);
        let task = tokio::spawn(async move {
            let completion = execute(self.client, self.request).await;
            let _ = tx.send(Some(completion));
        });

        Operation {
            completion: rx,
            task,
        }
    }
}

async fn execute(client: reqwest::Client, request: reqwest::Request) -> Completion {
    let response = match client.execute(request).await {
        Ok(response) => response,
        Err(e) => return Completion::failed(e.into()),
    };

    let status = response.status();
    if !status.is_success() {
        return Completion::failed(status_error(status));
    }

    let code = status.as_u16();
    match response.bytes().await {
        Ok(bytes) => Completion {
            result: Ok(bytes),
            response_code: code,
        },
        Err(e) => Completion::failed(body_error(e, code)),
    }
}

/// An in-flight primary request.
///
/// Completion can be polled with [`is_done`](Self::is_done) or awaited with
/// [`wait`](Self::wait). Dropping the operation aborts the exchange.
#[derive(Debug)]
pub struct Operation {
    completion: watch::Receiver<Option<Completion>>,
    task: JoinHandle<()>,
}

impl Operation {
    pub fn is_done(&self) -> bool {
        self.completion.borrow().is_some()
    }

    pub fn succeeded(&self) -> bool {
        self.completion
            .borrow()
            .as_ref()
            .is_some_and(Completion::succeeded)
    }

    /// Response status, `0` while pending or when no response arrived.
    pub fn response_code(&self) -> u16 {
        self.completion
            .borrow()
            .as_ref()
            .map_or(0, Completion::response_code)
    }

    pub fn error_message(&self) -> Option<String> {
        self.completion
            .borrow()
            .as_ref()
            .and_then(Completion::error_message)
    }

    pub fn response_bytes(&self) -> Option<Bytes> {
        self.completion
            .borrow()
            .as_ref()
            .and_then(|c| c.response_bytes().cloned())
    }

    /// Suspend until the exchange finishes.
    pub async fn wait(&mut self) -> Completion {
        let done = match self.completion.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone(),
            Err(_) => None,
        };
        done.unwrap_or_else(Completion::aborted)
    }
}

impl Drop for Operation {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Final state of a primary exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    result: std::result::Result<Bytes, TransportError>,
    response_code: u16,
}

impl Completion {
    fn failed(error: TransportError) -> Self {
        Self {
            response_code: error.code(),
            result: Err(error),
        }
    }

    fn aborted() -> Self {
        Self::failed(TransportError::Unavailable(
            "request task ended without completing".to_string(),
        ))
    }

    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    pub fn response_code(&self) -> u16 {
        self.response_code
    }

    pub fn error_message(&self) -> Option<String> {
        self.result.as_ref().err().map(ToString::to_string)
    }

    pub fn response_bytes(&self) -> Option<&Bytes> {
        self.result.as_ref().ok()
    }

    pub fn into_result(self) -> std::result::Result<Bytes, TransportError> {
        self.result
    }
}
