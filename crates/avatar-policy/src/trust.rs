//! Certificate trust evaluation for trusted avatar hosts.

use x509_parser::extensions::GeneralName;

use crate::error::{Error, Result};
use crate::rules::HostPolicy;

/// Decide whether the certificate presented by `host` is accepted.
///
/// Hosts outside [`HostPolicy::trusted_hosts`] get `standard_valid` back
/// unchanged. Trusted hosts are accepted when the certificate subject or any
/// subject alternative name contains the host's parent domain or the host
/// itself; a certificate that cannot be parsed is rejected.
///
/// # Examples
///
/// ```
/// use avatar_policy::{HostPolicy, evaluate_trust};
///
/// let policy = HostPolicy::default();
/// assert!(evaluate_trust(&policy, "example.com", b"ignored", true));
/// assert!(!evaluate_trust(&policy, "example.com", b"ignored", false));
/// assert!(!evaluate_trust(&policy, "avatars.githubusercontent.com", b"garbage", true));
/// ```
pub fn evaluate_trust(policy: &HostPolicy, host: &str, cert_der: &[u8], standard_valid: bool) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if !policy.is_trusted_host(&host) {
        return standard_valid;
    }

    match CertificateNames::parse(cert_der) {
        Ok(names) => {
            let accepted = names.mentions(&host);
            if !accepted {
                tracing::warn!(
                    host = %host,
                    subject = %names.subject,
                    alt_names = names.alt_names.len(),
                    "certificate does not name trusted host"
                );
            } else if !standard_valid {
                tracing::debug!(host = %host, "accepting trusted host certificate over chain failure");
            }
            accepted
        }
        Err(e) => {
            tracing::warn!(host = %host, error = %e, "certificate validation failed");
            false
        }
    }
}

/// Everything after the first label of `host`, or `host` itself when it has
/// a single label.
///
/// ```
/// use avatar_policy::host_suffix;
///
/// assert_eq!(host_suffix("avatars.githubusercontent.com"), "githubusercontent.com");
/// assert_eq!(host_suffix("localhost"), "localhost");
/// ```
pub fn host_suffix(host: &str) -> &str {
    match host.find('.') {
        Some(index) if index + 1 < host.len() => &host[index + 1..],
        _ => host,
    }
}

/// Lowercased names a certificate is issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateNames {
    pub subject: String,
    pub alt_names: Vec<String>,
}

impl CertificateNames {
    /// Parse a DER-encoded X.509 certificate.
    ///
    /// A malformed subject alternative name extension is logged and treated
    /// as absent; only a certificate that fails to parse at all is an error.
    pub fn parse(der: &[u8]) -> Result<Self> {
        let (_, cert) = x509_parser::parse_x509_certificate(der)
            .map_err(|e| Error::Certificate(e.to_string()))?;

        let subject = cert.subject().to_string().to_ascii_lowercase();
        let alt_names = match cert.subject_alternative_name() {
            Ok(Some(san)) => san
                .value
                .general_names
                .iter()
                .filter_map(|name| match name {
                    GeneralName::DNSName(s) | GeneralName::RFC822Name(s) | GeneralName::URI(s) => {
                        Some(s.to_ascii_lowercase())
                    }
                    _ => None,
                })
                .collect(),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to inspect subject alternative names");
                Vec::new()
            }
        };

        Ok(Self { subject, alt_names })
    }

    /// Returns `true` if the subject or an alternative name contains the
    /// parent domain of `host` or `host` itself.
    pub fn mentions(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        let suffix = host_suffix(&host);
        let contains_host = |name: &str| (!suffix.is_empty() && name.contains(suffix)) || name.contains(&host);

        contains_host(&self.subject) || self.alt_names.iter().any(|name| contains_host(name))
    }
}
