//! TLS connector with certificate fingerprint pinning.
//!
//! The backend's certificate is pinned by the SHA-1 fingerprint of its DER
//! encoding, the same 20 bytes certificate checkers print for
//! `api.telegram.org`. Full web-PKI validation against the Mozilla roots is
//! available as well.

use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use sha1::{Digest, Sha1};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use crate::errors::ConfigError;
use crate::transport::{Connector, Target};

// ─── Fingerprint ──────────────────────────────────────────────────────────────

/// SHA-1 fingerprint of the backend's TLS certificate.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub [u8; 20]);

impl Default for Fingerprint {
    fn default() -> Self {
        Self([
            0xF2, 0xAD, 0x29, 0x9C, 0x34, 0x48, 0xDD, 0x8D, 0xF4, 0xCF,
            0x52, 0x32, 0xF6, 0x57, 0x33, 0x68, 0x2E, 0x81, 0xC1, 0x90,
        ])
    }
}

impl Fingerprint {
    /// Fingerprint of a DER-encoded certificate.
    pub fn of_certificate(der: &[u8]) -> Self {
        let mut out = [0u8; 20];
        out.copy_from_slice(&Sha1::digest(der));
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl From<[u8; 20]> for Fingerprint {
    fn from(bytes: [u8; 20]) -> Self { Self(bytes) }
}

/// Accepts `F2AD29…`, `F2:AD:29:…` and `F2 AD 29 …`, any case.
impl FromStr for Fingerprint {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.chars().filter(|c| !matches!(c, ':' | ' ' | '-')).collect();
        let bytes = hex::decode(&digits).map_err(|e| ConfigError::Invalid {
            key:    "fingerprint",
            reason: e.to_string(),
        })?;
        let array: [u8; 20] = bytes.try_into().map_err(|b: Vec<u8>| ConfigError::Invalid {
            key:    "fingerprint",
            reason: format!("expected 20 bytes, got {}", b.len()),
        })?;
        Ok(Self(array))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

// ─── Verification ─────────────────────────────────────────────────────────────

/// How the backend's certificate is checked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Verification {
    /// Pin the end-entity certificate by fingerprint (default).
    #[default]
    Fingerprint,
    /// Validate the chain against the bundled Mozilla roots.
    WebPki,
}

#[derive(Debug)]
struct FingerprintVerifier {
    expected: Fingerprint,
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for FingerprintVerifier {
    fn verify_server_cert(
        &self,
        end_entity:     &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name:   &ServerName<'_>,
        _ocsp_response: &[u8],
        _now:           UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let actual = Fingerprint::of_certificate(end_entity.as_ref());
        if actual == self.expected {
            Ok(ServerCertVerified::assertion())
        } else {
            tracing::warn!("[perch] Certificate fingerprint mismatch: got {actual}, expected {}", self.expected);
            Err(rustls::Error::InvalidCertificate(CertificateError::ApplicationVerificationFailure))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert:    &CertificateDer<'_>,
        dss:     &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert:    &CertificateDer<'_>,
        dss:     &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

// ─── TlsConnector ─────────────────────────────────────────────────────────────

/// TCP + rustls connector.
///
/// The TLS server name is always the backend host name, also when the TCP
/// connection goes to the fixed address.
pub struct TlsConnector {
    server_name:  ServerName<'static>,
    verification: Verification,
    fingerprint:  Fingerprint,
    inner:        tokio_rustls::TlsConnector,
}

impl TlsConnector {
    pub fn new(host: &str, verification: Verification, fingerprint: Fingerprint) -> Result<Self, ConfigError> {
        let server_name = ServerName::try_from(host.to_string()).map_err(|e| ConfigError::Invalid {
            key:    "host",
            reason: e.to_string(),
        })?;
        let inner = build_connector(verification, fingerprint)?;
        Ok(Self { server_name, verification, fingerprint, inner })
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn verification(&self) -> Verification {
        self.verification
    }

    /// Pin a new certificate fingerprint for all following connections.
    pub fn set_fingerprint(&mut self, fingerprint: Fingerprint) -> Result<(), ConfigError> {
        self.inner = build_connector(self.verification, fingerprint)?;
        self.fingerprint = fingerprint;
        Ok(())
    }
}

fn build_connector(verification: Verification, fingerprint: Fingerprint) -> Result<tokio_rustls::TlsConnector, ConfigError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?;

    let config = match verification {
        Verification::Fingerprint => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(FingerprintVerifier { expected: fingerprint, provider }))
            .with_no_client_auth(),
        Verification::WebPki => {
            let mut roots = RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            builder.with_root_certificates(roots).with_no_client_auth()
        }
    };
    Ok(tokio_rustls::TlsConnector::from(Arc::new(config)))
}

impl Connector for TlsConnector {
    type Stream = TlsStream<TcpStream>;

    async fn connect(&self, target: &Target) -> io::Result<Self::Stream> {
        let tcp = match target {
            Target::Host { name, port } => TcpStream::connect((name.as_str(), *port)).await?,
            Target::Ip(addr)            => TcpStream::connect(addr).await?,
        };
        tcp.set_nodelay(true)?;
        self.inner.connect(self.server_name.clone(), tcp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_parses_common_formats() {
        let colon: Fingerprint = "F2:AD:29:9C:34:48:DD:8D:F4:CF:52:32:F6:57:33:68:2E:81:C1:90".parse().unwrap();
        let spaced: Fingerprint = "f2 ad 29 9c 34 48 dd 8d f4 cf 52 32 f6 57 33 68 2e 81 c1 90".parse().unwrap();
        let plain: Fingerprint = "F2AD299C3448DD8DF4CF5232F65733682E81C190".parse().unwrap();
        assert_eq!(colon, Fingerprint::default());
        assert_eq!(spaced, colon);
        assert_eq!(plain, colon);
    }

    #[test]
    fn fingerprint_rejects_wrong_length() {
        assert!("F2:AD".parse::<Fingerprint>().is_err());
        assert!("not hex at all".parse::<Fingerprint>().is_err());
    }

    #[test]
    fn fingerprint_display_round_trips() {
        let fp = Fingerprint::default();
        assert_eq!(fp.to_string(), "F2:AD:29:9C:34:48:DD:8D:F4:CF:52:32:F6:57:33:68:2E:81:C1:90");
        assert_eq!(fp.to_string().parse::<Fingerprint>().unwrap(), fp);
    }

    #[test]
    fn fingerprint_of_certificate_is_sha1() {
        // SHA-1("abc")
        let fp = Fingerprint::of_certificate(b"abc");
        assert_eq!(fp.to_string(), "A9:99:3E:36:47:06:81:6A:BA:3E:25:71:78:50:C2:6C:9C:D0:D8:9D");
    }

    #[test]
    fn connector_builds_for_both_modes() {
        let mut c = TlsConnector::new("api.telegram.org", Verification::Fingerprint, Fingerprint::default()).unwrap();
        c.set_fingerprint(Fingerprint([7; 20])).unwrap();
        assert_eq!(c.fingerprint(), Fingerprint([7; 20]));
        assert!(TlsConnector::new("api.telegram.org", Verification::WebPki, Fingerprint::default()).is_ok());
    }
}
