//! The fetch state machine: primary attempt, one fallback, decode, deliver.

use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use super::display::DisplaySink;
use super::primary::PrimaryTransport;
use super::secondary::SecondaryTransport;
use super::transport::Transport;
use crate::core::{classify, classify_fallback, decode};
use crate::data::{
    FailureReason, FetchConfig, FetchOutcome, FetchResult, RequestTarget, SessionReport,
    SessionState,
};
use crate::error::Result;

/// Per-request state, owned by the task driving it.
#[derive(Debug)]
pub struct FetchSession {
    target: RequestTarget,
    state: SessionState,
    history: Vec<SessionState>,
    primary: Option<FetchOutcome>,
    fallback: Option<FetchOutcome>,
    network_attempts: u8,
}

impl FetchSession {
    pub fn new(target: RequestTarget) -> Self {
        Self {
            target,
            state: SessionState::Start,
            history: vec![SessionState::Start],
            primary: None,
            fallback: None,
            network_attempts: 0,
        }
    }

    pub fn target(&self) -> &RequestTarget {
        &self.target
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    fn advance(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!(url = self.target.url(), from = %self.state, to = %next, "fetch session transition");
        self.state = next;
        self.history.push(next);
    }

    fn fail(&mut self, reason: FailureReason) -> FetchResult {
        self.advance(SessionState::Failed);
        FetchResult::Fallback(reason)
    }

    /// Replace the outcome of the attempt whose bytes failed to decode.
    fn record_decode_failure(&mut self, outcome: FetchOutcome) {
        if self.fallback.is_some() {
            self.fallback = Some(outcome);
        } else {
            self.primary = Some(outcome);
        }
    }

    fn into_report(self, result: FetchResult, delivered: bool) -> SessionReport {
        SessionReport {
            target: self.target,
            result,
            primary: self.primary,
            fallback: self.fallback,
            network_attempts: self.network_attempts,
            history: self.history,
            delivered,
        }
    }
}

/// Drives fetch sessions over a primary and an optional fallback transport.
///
/// Sessions share nothing but the transports. At most one fallback attempt
/// is made per session, and only after a retryable primary failure.
pub struct Orchestrator<P, S> {
    primary: P,
    secondary: Option<Arc<S>>,
}

impl Orchestrator<PrimaryTransport, SecondaryTransport> {
    /// Build the production pair: a fresh primary transport and the shared
    /// secondary transport, if it can be built.
    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        let primary = PrimaryTransport::new(config)?;
        let secondary = SecondaryTransport::shared(config);
        if secondary.is_none() {
            tracing::warn!("fallback transport unavailable, primary failures are final");
        }
        Ok(Self::new(primary, secondary))
    }
}

impl<P, S> Orchestrator<P, S>
where
    P: Transport,
    S: Transport + 'static,
{
    pub fn new(primary: P, secondary: Option<Arc<S>>) -> Self {
        Self { primary, secondary }
    }

    pub fn has_fallback(&self) -> bool {
        self.secondary.is_some()
    }

    /// Run one session to completion and deliver its result to `sink`.
    ///
    /// Exactly one of [`DisplaySink::on_image_ready`] and
    /// [`DisplaySink::on_fallback`] is called, unless `cancel` fired, in which
    /// case the sink is left untouched.
    pub async fn run<D>(&self, target: RequestTarget, cancel: &CancellationToken, sink: &D) -> SessionReport
    where
        D: DisplaySink + ?Sized,
    {
        let mut session = FetchSession::new(target);
        let result = self.drive(&mut session, cancel).await;

        let cancelled = cancel.is_cancelled() || matches!(result, FetchResult::Fallback(FailureReason::Cancelled));
        if cancelled {
            tracing::debug!(url = session.target.url(), "fetch session cancelled, nothing delivered");
            return session.into_report(result, false);
        }

        match &result {
            FetchResult::Image(image) => sink.on_image_ready(&session.target, image.clone()),
            FetchResult::Fallback(reason) => {
                tracing::debug!(
                    url = session.target.url(),
                    label = %session.target.fallback_label(),
                    reason = %reason,
                    "keeping fallback label"
                );
                sink.on_fallback(&session.target);
            }
        }
        session.into_report(result, true)
    }

    async fn drive(&self, session: &mut FetchSession, cancel: &CancellationToken) -> FetchResult {
        let url = session.target.url().to_string();

        session.advance(SessionState::PrimaryPending);
        session.network_attempts += 1;
        let primary = tokio::select! {
            biased;
            _ = cancel.cancelled() => return session.fail(FailureReason::Cancelled),
            result = self.primary.send(&url) => classify(result),
        };
        session.primary = Some(primary.clone());

        let bytes = match primary {
            FetchOutcome::Success { bytes } => bytes,
            FetchOutcome::NetworkFailure {
                retryable: true,
                code,
                message,
            } => {
                tracing::warn!(url = %url, code, error = %message, "primary request failed, trying fallback transport");
                match self.fallback(session, &url, cancel).await {
                    Ok(bytes) => bytes,
                    Err(reason) => return session.fail(reason),
                }
            }
            FetchOutcome::NetworkFailure { code, message, .. } => {
                tracing::warn!(url = %url, code, error = %message, "failed to load avatar");
                return session.fail(FailureReason::Network { code, message });
            }
            FetchOutcome::DecodeFailure { reason } => return session.fail(FailureReason::Decode(reason)),
        };

        session.advance(SessionState::Decoding);
        let size = bytes.len();
        let decoded = match tokio::task::spawn_blocking(move || decode(&bytes)).await {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "decode task faulted");
                return session.fail(FailureReason::Faulted(e.to_string()));
            }
        };
        match decoded {
            Ok(image) => {
                session.advance(SessionState::Done);
                tracing::info!(
                    url = %url,
                    width = image.width,
                    height = image.height,
                    format = ?image.format,
                    fallback = session.fallback.is_some(),
                    "loaded avatar"
                );
                FetchResult::Image(image)
            }
            Err(reason) => {
                tracing::warn!(url = %url, bytes = size, reason = %reason, "failed to decode avatar");
                session.record_decode_failure(FetchOutcome::DecodeFailure {
                    reason: reason.clone(),
                });
                session.fail(FailureReason::Decode(reason))
            }
        }
    }

    async fn fallback(
        &self,
        session: &mut FetchSession,
        url: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<Bytes, FailureReason> {
        let Some(secondary) = self.secondary.as_ref().map(Arc::clone) else {
            tracing::warn!(url, "fallback transport unavailable");
            return Err(FailureReason::FallbackUnavailable);
        };

        session.advance(SessionState::FallbackPending);
        session.network_attempts += 1;

        let owned_url = url.to_string();
        let mut task = tokio::spawn(async move { secondary.send(&owned_url).await });
        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                task.abort();
                session.fallback = Some(abandoned("fallback request cancelled"));
                return Err(FailureReason::Cancelled);
            }
            joined = &mut task => joined,
        };

        match joined {
            Ok(result) => {
                let outcome = classify_fallback(result);
                session.fallback = Some(outcome.clone());
                match outcome {
                    FetchOutcome::Success { bytes } => Ok(bytes),
                    FetchOutcome::NetworkFailure { code, message, .. } => {
                        tracing::warn!(url, code, error = %message, "fallback transport returned no data");
                        Err(FailureReason::FallbackFailed { code, message })
                    }
                    FetchOutcome::DecodeFailure { reason } => Err(FailureReason::Decode(reason)),
                }
            }
            Err(e) if e.is_cancelled() => {
                tracing::warn!(url, "fallback task cancelled");
                session.fallback = Some(abandoned("fallback task cancelled"));
                Err(FailureReason::Cancelled)
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "fallback task faulted");
                session.fallback = Some(abandoned(&e.to_string()));
                Err(FailureReason::Faulted(e.to_string()))
            }
        }
    }
}

/// Outcome of a fallback attempt that never produced a response.
fn abandoned(message: &str) -> FetchOutcome {
    FetchOutcome::NetworkFailure {
        retryable: false,
        code: 0,
        message: message.to_string(),
    }
}
