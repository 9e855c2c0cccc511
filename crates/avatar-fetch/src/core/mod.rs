//! Pure transformations for avatar fetching.
//!
//! Failure classification and the image decode gate. Nothing here touches
//! the network.

mod failure;
mod gate;

pub use failure::{classify, classify_fallback};
pub use gate::decode;
