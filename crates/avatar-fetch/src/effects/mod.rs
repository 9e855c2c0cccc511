//! I/O for avatar fetching.
//!
//! The two transports behind the [`Transport`] trait, the rustls verifier
//! that applies the trust evaluator, the session orchestrator, and the seam
//! to the display layer.

mod display;
mod orchestrator;
mod primary;
mod secondary;
mod tls;
mod transport;

pub use display::{AvatarLoader, DisplaySink};
pub use orchestrator::{FetchSession, Orchestrator};
pub use primary::{Completion, Operation, PrimaryTransport, RequestHandle};
pub use secondary::SecondaryTransport;
pub use tls::TrustVerifier;
pub use transport::Transport;
