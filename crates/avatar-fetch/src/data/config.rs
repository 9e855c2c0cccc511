use std::time::Duration;

use avatar_policy::HostPolicy;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration shared by both transports.
///
/// # Examples
///
/// ```
/// use avatar_fetch::FetchConfig;
/// use std::time::Duration;
///
/// let config = FetchConfig::default().timeout_secs(10).tls13(false);
/// assert_eq!(config.timeout(), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-request timeout enforced by each transport.
    ///
    /// Default: 30
    pub timeout_secs: u64,

    /// Offer TLS 1.3 alongside TLS 1.2. Best effort: if the TLS stack refuses,
    /// connections fall back to TLS 1.2 only.
    ///
    /// Default: true
    pub tls13: bool,

    /// Transparent gzip/deflate decoding on the secondary transport.
    ///
    /// Default: true
    pub decompress: bool,

    /// Header rules and trusted hosts.
    pub policy: HostPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            tls13: true,
            decompress: true,
            policy: HostPolicy::default(),
        }
    }
}

impl FetchConfig {
    /// Load from a TOML document. Missing keys take their defaults.
    ///
    /// ```
    /// use avatar_fetch::FetchConfig;
    ///
    /// let config = FetchConfig::from_toml_str("timeout_secs = 5").unwrap();
    /// assert_eq!(config.timeout_secs, 5);
    /// assert!(config.tls13);
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn tls13(mut self, enabled: bool) -> Self {
        self.tls13 = enabled;
        self
    }

    #[must_use]
    pub fn decompress(mut self, enabled: bool) -> Self {
        self.decompress = enabled;
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: HostPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn defaults() {
        let config = FetchConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.tls13);
        assert!(config.decompress);
        assert_eq!(config.policy, HostPolicy::default());
    }

    #[test]
    fn toml_overrides_nested_policy() {
        let config = FetchConfig::from_toml_str(
            r#"
            timeout_secs = 12
            decompress = false

            [policy]
            trusted_hosts = ["cdn.example.com"]
            "#,
        )
        .unwrap();

        assert_eq!(config.timeout_secs, 12);
        assert!(!config.decompress);
        assert!(config.policy.is_trusted_host("cdn.example.com"));
        assert_eq!(config.policy.user_agent, avatar_policy::DEFAULT_USER_AGENT);
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = FetchConfig::from_toml_str("timeout_secs = \"soon\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
