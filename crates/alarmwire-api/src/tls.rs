// rustls client configuration for the push-channel socket.
//
// reqwest applies `TlsMode` to REST calls on its own; the WebSocket upgrade
// goes through tokio-tungstenite and needs an explicit `ClientConfig`.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::error::Error;
use crate::transport::TlsMode;

/// `ClientConfig` for the push socket, or `None` to keep tokio-tungstenite's
/// bundled web PKI roots.
///
/// A custom CA replaces the public roots: plant servers behind a private CA
/// are not expected to present publicly trusted chains.
pub fn push_client_config(mode: &TlsMode) -> Result<Option<Arc<ClientConfig>>, Error> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(format!("unsupported TLS settings: {e}")))?;

    let config = match mode {
        TlsMode::System => return Ok(None),
        TlsMode::CustomCa(path) => {
            let pem = std::fs::read(path)
                .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
            builder
                .with_root_certificates(root_store(&pem)?)
                .with_no_client_auth()
        }
        TlsMode::DangerAcceptInvalid => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCert {
                algorithms: provider.signature_verification_algorithms,
            }))
            .with_no_client_auth(),
    };
    Ok(Some(Arc::new(config)))
}

fn root_store(pem: &[u8]) -> Result<RootCertStore, Error> {
    let mut roots = RootCertStore::empty();
    for cert in CertificateDer::pem_slice_iter(pem) {
        let cert = cert.map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
        roots
            .add(cert)
            .map_err(|e| Error::Tls(format!("unusable CA cert: {e}")))?;
    }
    if roots.is_empty() {
        return Err(Error::Tls("CA file holds no certificates".into()));
    }
    Ok(roots)
}

/// Skips chain and hostname checks. Handshake signatures are still verified
/// so the peer must hold the key for the certificate it sent.
#[derive(Debug)]
struct AcceptAnyCert {
    algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn system_roots_keep_the_default_connector() {
        assert!(push_client_config(&TlsMode::System).unwrap().is_none());
    }

    #[test]
    fn accept_invalid_builds_a_config() {
        let config = push_client_config(&TlsMode::DangerAcceptInvalid).unwrap();
        assert!(config.is_some());
    }

    #[test]
    fn missing_ca_file_is_a_tls_error() {
        let err = push_client_config(&TlsMode::CustomCa("/nonexistent/ca.pem".into())).unwrap_err();
        assert!(matches!(err, Error::Tls(ref m) if m.contains("failed to read")), "{err:?}");
    }

    #[test]
    fn ca_file_without_certificates_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not a certificate").unwrap();
        let err = push_client_config(&TlsMode::CustomCa(file.path().into())).unwrap_err();
        assert!(matches!(err, Error::Tls(_)), "{err:?}");
    }
}
