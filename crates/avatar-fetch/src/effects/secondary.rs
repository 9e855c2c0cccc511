//! Fallback transport: a general-purpose client shared process-wide.

use std::sync::Arc;

use avatar_policy::HostPolicy;
use bytes::Bytes;
use once_cell::sync::OnceCell;

use super::tls::Verification;
use super::transport::{Transport, body_error, http_client, status_error, with_policy_headers};
use crate::data::FetchConfig;
use crate::error::{Result, TransportError};

static SHARED: OnceCell<Option<Arc<SecondaryTransport>>> = OnceCell::new();

/// Fallback transport.
///
/// Independent of the primary transport's connections. Every host goes
/// through the trust evaluator, which leaves untrusted hosts on standard
/// validation. gzip/deflate responses are decoded when
/// [`FetchConfig::decompress`] is set.
pub struct SecondaryTransport {
    client: reqwest::Client,
    policy: Arc<HostPolicy>,
}

impl SecondaryTransport {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let policy = Arc::new(config.policy.clone());
        let client = http_client(config, &policy, Verification::Trusted, config.decompress)?;
        Ok(Self { client, policy })
    }

    /// The process-wide instance, built from `config` on first use.
    ///
    /// Later calls return the same instance whatever config they pass. If
    /// the client cannot be built the failure is logged once and every call
    /// returns `None`: fallback is unavailable for the life of the process.
    pub fn shared(config: &FetchConfig) -> Option<Arc<Self>> {
        SHARED
            .get_or_init(|| match Self::new(config) {
                Ok(transport) => Some(Arc::new(transport)),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to build fallback HTTP client");
                    None
                }
            })
            .clone()
    }

    /// GET `url`, returning `None` on any failure.
    pub async fn fetch(&self, url: &str) -> Option<Bytes> {
        match self.try_fetch(url).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(url, code = e.code(), error = %e, "fallback download failed");
                None
            }
        }
    }

    /// GET `url`, returning the failure on error.
    pub async fn try_fetch(&self, url: &str) -> std::result::Result<Bytes, TransportError> {
        let response = with_policy_headers(self.client.get(url), &self.policy, url)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }

        response
            .bytes()
            .await
            .map_err(|e| body_error(e, status.as_u16()))
    }
}

impl Transport for SecondaryTransport {
    async fn send(&self, url: &str) -> std::result::Result<Bytes, TransportError> {
        self.try_fetch(url).await
    }
}
