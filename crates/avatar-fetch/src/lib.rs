//! Resilient avatar image downloads.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Immutable configuration and session types
//! - [`core`] - Pure transformations (failure classification, image decoding)
//! - [`effects`] - Transports, the fetch orchestrator and the display seam
//!
//! # Flow
//!
//! A [`RequestTarget`] is fetched by the primary transport. A connection-level
//! failure (or a response with status 0) earns exactly one attempt through the
//! secondary transport. Bytes from whichever attempt succeeded go through the
//! decode gate, and the [`DisplaySink`] receives either the decoded image or a
//! single "keep showing the fallback label" signal. Header and trust decisions
//! come from [`avatar_policy::HostPolicy`].

pub mod core;
pub mod data;
pub mod effects;
mod error;

pub use self::core::{classify, decode};
pub use self::data::{
    DecodedImage, FailureReason, FallbackLabel, FetchConfig, FetchOutcome, FetchResult,
    RequestTarget, SessionReport, SessionState,
};
pub use self::effects::{
    AvatarLoader, Completion, DisplaySink, FetchSession, Operation, Orchestrator,
    PrimaryTransport, RequestHandle, SecondaryTransport, Transport, TrustVerifier,
};
pub use self::error::{DecodeError, Error, Result, TransportError};

pub use avatar_policy::HostPolicy;
