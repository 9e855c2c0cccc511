//! Immutable data types for avatar fetching.
//!
//! Configuration, request targets and the outcome types a fetch session
//! produces. None of these perform I/O.

pub mod config;
pub mod outcome;
pub mod target;

pub use config::FetchConfig;
pub use outcome::{
    DecodedImage, FailureReason, FetchOutcome, FetchResult, SessionReport, SessionState,
};
pub use target::{FallbackLabel, RequestTarget};
