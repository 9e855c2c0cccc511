//! Domain policy table: per-host header rules and trusted hosts.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// User agent sent with every avatar request.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko)";

/// `Accept` value for image CDNs that negotiate on it.
pub const IMAGE_ACCEPT: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";

/// Header mutations applied when the request host contains any of the patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderRule {
    pub host_contains: Vec<String>,
    pub headers: Vec<(String, String)>,
}

impl HeaderRule {
    pub fn new(host_contains: &[&str], headers: &[(&str, &str)]) -> Self {
        Self {
            host_contains: host_contains.iter().map(|p| p.to_ascii_lowercase()).collect(),
            headers: headers
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    /// Returns `true` if `host` (already lowercased) contains any pattern.
    pub fn matches(&self, host: &str) -> bool {
        self.host_contains
            .iter()
            .any(|pattern| !pattern.is_empty() && host.contains(&pattern.to_ascii_lowercase()))
    }
}

/// Process-wide request policy.
///
/// Rules are ordered; the first rule whose pattern matches the host applies
/// and later rules are not consulted. The `User-Agent` header is always set.
///
/// # Examples
///
/// ```
/// use avatar_policy::HostPolicy;
///
/// let policy = HostPolicy::default();
/// let headers = policy.headers_for("https://example.com/a.png");
/// assert_eq!(headers.len(), 1);
/// assert_eq!(headers[0].0, "User-Agent");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostPolicy {
    pub user_agent: String,
    pub rules: Vec<HeaderRule>,
    pub trusted_hosts: Vec<String>,
}

impl Default for HostPolicy {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            rules: vec![
                HeaderRule::new(&["huaban.com"], &[("Referer", "https://huaban.com/")]),
                HeaderRule::new(
                    &["githubusercontent.com", "githubusercontent"],
                    &[("Referer", "https://github.com/"), ("Accept", IMAGE_ACCEPT)],
                ),
            ],
            trusted_hosts: vec!["githubusercontent.com".to_string()],
        }
    }
}

impl HostPolicy {
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Append a rule after the existing ones.
    #[must_use]
    pub fn rule(mut self, rule: HeaderRule) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn trusted_host(mut self, suffix: impl Into<String>) -> Self {
        self.trusted_hosts.push(suffix.into().to_ascii_lowercase());
        self
    }

    /// Headers for a request to `url`.
    ///
    /// Never fails: if the host cannot be derived the request proceeds with
    /// the default `User-Agent` only.
    pub fn headers_for(&self, url: &str) -> Vec<(String, String)> {
        let mut headers = vec![("User-Agent".to_string(), self.user_agent.clone())];

        match host_of(url) {
            Ok(host) => {
                if let Some(rule) = self.rule_for(&host) {
                    for (name, value) in &rule.headers {
                        set_header(&mut headers, name, value);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "unable to configure host headers, using defaults");
            }
        }

        headers
    }

    /// First rule matching `host`, if any.
    pub fn rule_for(&self, host: &str) -> Option<&HeaderRule> {
        let host = host.to_ascii_lowercase();
        self.rules.iter().find(|rule| rule.matches(&host))
    }

    /// Returns `true` if `host` gets the relaxed certificate matching rule.
    pub fn is_trusted_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.trusted_hosts
            .iter()
            .any(|suffix| !suffix.is_empty() && host.contains(&suffix.to_ascii_lowercase()))
    }

    /// [`is_trusted_host`](Self::is_trusted_host) for the host of `url`.
    ///
    /// Unparseable URLs are never trusted.
    pub fn is_trusted_url(&self, url: &str) -> bool {
        host_of(url).is_ok_and(|host| self.is_trusted_host(&host))
    }
}

/// Lowercased host component of `url`.
pub fn host_of(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url).map_err(|source| Error::InvalidUrl {
        url: url.to_string(),
        source,
    })?;

    parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| Error::MissingHost(url.to_string()))
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
        Some(existing) => existing.1 = value.to_string(),
        None => headers.push((name.to_string(), value.to_string())),
    }
}
