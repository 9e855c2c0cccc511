//! rustls wiring for the trust evaluator.

use std::sync::Arc;

use avatar_policy::{HostPolicy, evaluate_trust};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::error::Result;

/// Certificate verifier that runs standard chain validation and then lets
/// [`evaluate_trust`] decide.
///
/// For hosts outside the policy's trusted set the standard result is returned
/// untouched, error included. Handshake signatures are always checked by the
/// standard verifier.
#[derive(Debug)]
pub struct TrustVerifier {
    standard: Arc<WebPkiServerVerifier>,
    policy: Arc<HostPolicy>,
}

impl TrustVerifier {
    pub fn new(policy: Arc<HostPolicy>, provider: Arc<CryptoProvider>) -> Result<Self> {
        let standard = WebPkiServerVerifier::builder_with_provider(Arc::new(root_store()), provider)
            .build()?;
        Ok(Self { standard, policy })
    }
}

impl ServerCertVerifier for TrustVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        let standard = self.standard.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        );
        let host = server_name.to_str();

        if !self.policy.is_trusted_host(&host) {
            return standard;
        }

        if evaluate_trust(&self.policy, &host, end_entity.as_ref(), standard.is_ok()) {
            Ok(ServerCertVerified::assertion())
        } else {
            tracing::warn!(host = %host, "certificate rejected for trusted host");
            standard.and(Err(rustls::Error::InvalidCertificate(
                rustls::CertificateError::NotValidForName,
            )))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.standard.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.standard.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.standard.supported_verify_schemes()
    }
}

/// Which certificate verifier a client config carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verification {
    Standard,
    Trusted,
}

/// Build a client config offering TLS 1.2, plus TLS 1.3 when `tls13` is set
/// and the provider accepts it.
pub(crate) fn client_config(
    policy: &Arc<HostPolicy>,
    verification: Verification,
    tls13: bool,
) -> Result<ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let builder = if tls13 {
        match ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])
        {
            Ok(builder) => builder,
            Err(e) => {
                tracing::warn!(error = %e, "unable to enable TLS 1.3, continuing with TLS 1.2");
                tls12_only(&provider)?
            }
        }
    } else {
        tls12_only(&provider)?
    };

    let config = match verification {
        Verification::Standard => builder
            .with_root_certificates(root_store())
            .with_no_client_auth(),
        Verification::Trusted => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(TrustVerifier::new(
                Arc::clone(policy),
                Arc::clone(&provider),
            )?))
            .with_no_client_auth(),
    };

    Ok(config)
}

fn tls12_only(
    provider: &Arc<CryptoProvider>,
) -> Result<rustls::ConfigBuilder<ClientConfig, rustls::WantsVerifier>> {
    Ok(ClientConfig::builder_with_provider(Arc::clone(provider))
        .with_protocol_versions(&[&rustls::version::TLS12])?)
}

fn root_store() -> RootCertStore {
    RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned())
}

#[cfg(test)]
mod tests {
    use rcgen::{CertificateParams, DnType, KeyPair};

    use super::*;

    fn verifier() -> TrustVerifier {
        TrustVerifier::new(
            Arc::new(HostPolicy::default()),
            Arc::new(rustls::crypto::ring::default_provider()),
        )
        .unwrap()
    }

    fn self_signed(common_name: &str, alt_names: &[&str]) -> CertificateDer<'static> {
        let alt_names: Vec<String> = alt_names.iter().map(|s| s.to_string()).collect();
        let mut params = CertificateParams::new(alt_names).unwrap();
        params.distinguished_name.push(DnType::CommonName, common_name);
        let key = KeyPair::generate().unwrap();
        params.self_signed(&key).unwrap().der().clone()
    }

    fn verify(host: &'static str, cert: &CertificateDer<'_>) -> bool {
        let name = ServerName::try_from(host).unwrap();
        verifier()
            .verify_server_cert(cert, &[], &name, &[], UnixTime::now())
            .is_ok()
    }

    #[test]
    fn trusted_host_accepts_self_signed_matching_cert() {
        let cert = self_signed("avatars.githubusercontent.com", &["*.githubusercontent.com"]);
        assert!(verify("avatars.githubusercontent.com", &cert));
    }

    #[test]
    fn trusted_host_rejects_foreign_cert() {
        let cert = self_signed("example.org", &["example.org"]);
        assert!(!verify("avatars.githubusercontent.com", &cert));
    }

    #[test]
    fn other_hosts_keep_standard_rejection() {
        let cert = self_signed("cdn.example.com", &["cdn.example.com"]);
        assert!(!verify("cdn.example.com", &cert));
    }

    #[test]
    fn configs_build_with_and_without_tls13() {
        let policy = Arc::new(HostPolicy::default());
        for tls13 in [true, false] {
            for verification in [Verification::Standard, Verification::Trusted] {
                assert!(client_config(&policy, verification, tls13).is_ok());
            }
        }
    }
}
