use std::fmt;

use bytes::Bytes;
use image::{DynamicImage, ImageFormat};

use super::target::RequestTarget;
use crate::error::DecodeError;

/// Result of one transport attempt, after decoding where the transport
/// succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success {
        bytes: Bytes,
    },
    NetworkFailure {
        retryable: bool,
        code: u16,
        message: String,
    },
    DecodeFailure {
        reason: DecodeError,
    },
}

impl FetchOutcome {
    /// Returns `true` only for a network failure that authorises a fallback.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkFailure { retryable: true, .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// States of a fetch session.
///
/// `Start → PrimaryPending → {Decoding | FallbackPending | Failed}`,
/// `FallbackPending → {Decoding | Failed}`, `Decoding → {Done | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Start,
    PrimaryPending,
    FallbackPending,
    Decoding,
    Done,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns `true` if the state machine allows moving from `self` to `next`.
    pub fn can_advance_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Start, PrimaryPending)
                | (Start, Failed)
                | (PrimaryPending, Decoding)
                | (PrimaryPending, FallbackPending)
                | (PrimaryPending, Failed)
                | (FallbackPending, Decoding)
                | (FallbackPending, Failed)
                | (Decoding, Done)
                | (Decoding, Failed)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Start => write!(f, "Start"),
            SessionState::PrimaryPending => write!(f, "PrimaryPending"),
            SessionState::FallbackPending => write!(f, "FallbackPending"),
            SessionState::Decoding => write!(f, "Decoding"),
            SessionState::Done => write!(f, "Done"),
            SessionState::Failed => write!(f, "Failed"),
        }
    }
}

/// Why a session ended on the fallback label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Primary failed with a terminal network error.
    Network { code: u16, message: String },

    /// Primary failed retryably but no secondary transport exists.
    FallbackUnavailable,

    /// The secondary transport returned no bytes.
    FallbackFailed { code: u16, message: String },

    /// The session was cancelled before completing.
    Cancelled,

    /// The fallback task panicked.
    Faulted(String),

    Decode(DecodeError),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Network { code, message } => write!(f, "network failure ({code}): {message}"),
            FailureReason::FallbackUnavailable => write!(f, "fallback transport unavailable"),
            FailureReason::FallbackFailed { code, message } => {
                write!(f, "fallback failed ({code}): {message}")
            }
            FailureReason::Cancelled => write!(f, "cancelled"),
            FailureReason::Faulted(message) => write!(f, "fallback faulted: {message}"),
            FailureReason::Decode(reason) => write!(f, "decode failed: {reason}"),
        }
    }
}

/// A decoded avatar plus the facts worth logging about it.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub image: DynamicImage,
    pub width: u32,
    pub height: u32,
    pub format: Option<ImageFormat>,
}

/// Terminal result of a session, as the caller sees it.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    Image(DecodedImage),
    Fallback(FailureReason),
}

impl FetchResult {
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image(_))
    }

    pub fn image(&self) -> Option<&DecodedImage> {
        match self {
            Self::Image(image) => Some(image),
            Self::Fallback(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            Self::Image(_) => None,
            Self::Fallback(reason) => Some(reason),
        }
    }
}

/// Everything a finished session recorded.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub target: RequestTarget,
    pub result: FetchResult,
    pub primary: Option<FetchOutcome>,
    pub fallback: Option<FetchOutcome>,
    pub network_attempts: u8,
    pub history: Vec<SessionState>,
    /// `false` when the session was cancelled and the sink was never called.
    pub delivered: bool,
}

impl SessionReport {
    pub fn fallback_attempted(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn final_state(&self) -> SessionState {
        self.history.last().copied().unwrap_or_default()
    }
}
