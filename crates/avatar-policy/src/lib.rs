//! Per-host request policy for avatar downloads.
//!
//! Two pure lookups live here, shared by every transport that fetches avatars:
//!
//! - [`HostPolicy::headers_for`] - headers a request to a given URL carries
//! - [`evaluate_trust`] - whether a presented certificate is accepted for a host
//!
//! Nothing in this crate performs I/O. Transports inject the policy and the
//! evaluator into their own TLS and request plumbing.
//!
//! # Example
//!
//! ```
//! use avatar_policy::HostPolicy;
//!
//! let policy = HostPolicy::default();
//! let headers = policy.headers_for("https://avatars.githubusercontent.com/u/1");
//!
//! assert!(headers.iter().any(|(k, v)| k == "Referer" && v == "https://github.com/"));
//! assert!(policy.is_trusted_host("avatars.githubusercontent.com"));
//! ```

pub use error::{Error, Result};
pub use rules::{
    DEFAULT_USER_AGENT, HeaderRule, HostPolicy, IMAGE_ACCEPT, host_of,
};
pub use trust::{CertificateNames, evaluate_trust, host_suffix};

mod error;
mod rules;
mod trust;
