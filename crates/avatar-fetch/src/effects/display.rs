//! Seam to the display layer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::orchestrator::Orchestrator;
use super::transport::Transport;
use crate::data::{DecodedImage, FallbackLabel, RequestTarget, SessionReport};

/// Receives the single terminal result of each fetch session.
///
/// The fallback label is assumed to be visible from the moment a request is
/// made; `on_fallback` only confirms it stays.
pub trait DisplaySink: Send + Sync {
    fn on_image_ready(&self, target: &RequestTarget, image: DecodedImage);

    fn on_fallback(&self, target: &RequestTarget);
}

/// One avatar slot: requests images for a display sink, restarting whenever
/// the URL changes.
///
/// Deliveries happen while the loader's session lock is held, so a sink must
/// not call back into the same loader from `on_image_ready` or `on_fallback`.
pub struct AvatarLoader<P, S, D: ?Sized> {
    orchestrator: Arc<Orchestrator<P, S>>,
    sink: Arc<D>,
    label: Mutex<FallbackLabel>,
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl<P, S, D> AvatarLoader<P, S, D>
where
    P: Transport + 'static,
    S: Transport + 'static,
    D: DisplaySink + ?Sized + 'static,
{
    pub fn new(orchestrator: Arc<Orchestrator<P, S>>, sink: Arc<D>, label: FallbackLabel) -> Self {
        Self {
            orchestrator,
            sink,
            label: Mutex::new(label),
            current: Arc::new(Mutex::new(None)),
        }
    }

    pub fn fallback_label(&self) -> FallbackLabel {
        self.label
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Change the label used by subsequent requests.
    pub fn set_fallback_label(&self, label: FallbackLabel) {
        *self.label.lock().unwrap_or_else(PoisonError::into_inner) = label;
    }

    /// Start loading `url`, cancelling any session this loader started
    /// before. A blank URL only cancels.
    ///
    /// Fire-and-forget: the result reaches the sink. The returned handle is
    /// for callers that want the session report.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn request_image(&self, url: &str) -> Option<JoinHandle<SessionReport>> {
        let token = CancellationToken::new();
        {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = current.replace(token.clone()) {
                previous.cancel();
            }
        }

        if url.trim().is_empty() {
            tracing::debug!("no avatar URL, keeping fallback label");
            return None;
        }

        let target = RequestTarget::new(url, self.fallback_label());
        let orchestrator = Arc::clone(&self.orchestrator);
        let sink = SessionSink {
            sink: Arc::clone(&self.sink),
            current: Arc::clone(&self.current),
            token: token.clone(),
            suppressed: AtomicBool::new(false),
        };

        Some(tokio::spawn(async move {
            let mut report = orchestrator.run(target, &token, &sink).await;
            if sink.suppressed.load(Ordering::SeqCst) {
                report.delivered = false;
            }
            report
        }))
    }

    /// Cancel the in-flight session, if any. Nothing is delivered for it.
    pub fn cancel(&self) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = current.take() {
            token.cancel();
        }
    }
}

/// Forwards one session's result to the loader's sink, unless the session
/// was cancelled. The check and the delivery happen under the lock that
/// `request_image` and `cancel` take to cancel a session.
struct SessionSink<D: ?Sized> {
    sink: Arc<D>,
    current: Arc<Mutex<Option<CancellationToken>>>,
    token: CancellationToken,
    suppressed: AtomicBool,
}

impl<D: DisplaySink + ?Sized> SessionSink<D> {
    fn deliver(&self, target: &RequestTarget, forward: impl FnOnce(&D)) {
        let _current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if self.token.is_cancelled() {
            tracing::debug!(url = target.url(), "session superseded before delivery");
            self.suppressed.store(true, Ordering::SeqCst);
            return;
        }
        forward(self.sink.as_ref());
    }
}

impl<D: DisplaySink + ?Sized> DisplaySink for SessionSink<D> {
    fn on_image_ready(&self, target: &RequestTarget, image: DecodedImage) {
        self.deliver(target, |sink| sink.on_image_ready(target, image));
    }

    fn on_fallback(&self, target: &RequestTarget) {
        self.deliver(target, |sink| sink.on_fallback(target));
    }
}
