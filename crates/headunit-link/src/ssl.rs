use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConnection, DigitallySignedStruct, SignatureScheme};
use tracing::debug;

use crate::config::SslConfig;
use crate::error::{LinkError, Result};

/// TLS engine in memory-I/O mode.
///
/// The engine never touches a socket. Handshake and record ciphertext is
/// pushed in with [`read_ciphertext`](SslSession::read_ciphertext) and
/// pulled out with [`drain_ciphertext`](SslSession::drain_ciphertext);
/// the connection core tunnels it through `SSLHandshake` control frames
/// and ENCRYPTED-flagged data frames. Owned by the I/O thread.
pub struct SslSession {
    conn: ClientConnection,
}

impl SslSession {
    /// Build a client-mode session. The phone's certificate is not
    /// anchored in any CA store, so chain verification is disabled; the
    /// optional client identity comes from the injected PEM material.
    pub fn new(config: &SslConfig) -> Result<Self> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());

        let builder = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_protocol_versions(rustls::ALL_VERSIONS)?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptPhoneCert { provider }));

        let client_config = match (&config.client_cert_pem, &config.client_key_pem) {
            (Some(cert_pem), Some(key_pem)) => {
                let certs = CertificateDer::pem_slice_iter(cert_pem)
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|err| {
                        LinkError::Protocol(format!("bad client certificate pem: {err:?}"))
                    })?;
                let key = PrivateKeyDer::from_pem_slice(key_pem).map_err(|err| {
                    LinkError::Protocol(format!("bad client key pem: {err:?}"))
                })?;
                builder.with_client_auth_cert(certs, key)?
            }
            _ => builder.with_no_client_auth(),
        };

        // Verification is disabled, so the name is only a placeholder.
        let server_name = ServerName::try_from("phone.android.local")
            .map_err(|_| LinkError::Protocol("invalid tls server name".into()))?;
        let conn = ClientConnection::new(Arc::new(client_config), server_name)?;
        Ok(Self { conn })
    }

    /// True once the handshake has finished.
    pub fn is_established(&self) -> bool {
        !self.conn.is_handshaking()
    }

    /// Pull whatever ciphertext the engine wants on the wire (handshake
    /// flights, alerts, queued data records).
    pub fn drain_ciphertext(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while self.conn.wants_write() {
            self.conn
                .write_tls(&mut out)
                .map_err(|err| LinkError::Tls(rustls::Error::General(err.to_string())))?;
        }
        Ok(out)
    }

    /// Feed peer ciphertext into the engine.
    pub fn read_ciphertext(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let consumed = self
                .conn
                .read_tls(&mut data)
                .map_err(|err| LinkError::Tls(rustls::Error::General(err.to_string())))?;
            if consumed == 0 {
                break;
            }
            self.conn.process_new_packets()?;
        }
        Ok(())
    }

    /// Plaintext in, ciphertext out.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.conn
            .writer()
            .write_all(plaintext)
            .map_err(|err| LinkError::Tls(rustls::Error::General(err.to_string())))?;
        let out = self.drain_ciphertext()?;
        debug!(plain = plaintext.len(), cipher = out.len(), "encrypted");
        Ok(out)
    }

    /// Ciphertext in, plaintext out.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.read_ciphertext(ciphertext)?;

        let mut plain = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            match self.conn.reader().read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => plain.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) => {
                    return Err(LinkError::Tls(rustls::Error::General(err.to_string())));
                }
            }
        }
        Ok(plain)
    }
}

/// Accepts whatever certificate the phone presents. Signature checks on
/// the handshake transcript still run; only chain/name validation is
/// skipped, because phones present self-signed certificates.
#[derive(Debug)]
struct AcceptPhoneCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptPhoneCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_server() -> rustls::ServerConnection {
        let cert = rcgen::generate_simple_self_signed(vec!["phone.android.local".into()])
            .expect("generate test certificate");
        let cert_der = cert.cert.der().clone();
        let key_der = PrivateKeyDer::Pkcs8(cert.key_pair.serialize_der().into());

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = rustls::ServerConfig::builder_with_provider(provider)
            .with_protocol_versions(rustls::ALL_VERSIONS)
            .expect("server protocol versions")
            .with_no_client_auth()
            .with_single_cert(vec![cert_der], key_der)
            .expect("server config");
        rustls::ServerConnection::new(Arc::new(config)).expect("server connection")
    }

    /// Pump handshake bytes between the client session and a rustls
    /// server until both sides settle.
    fn complete_handshake(client: &mut SslSession, server: &mut rustls::ServerConnection) {
        for _ in 0..10 {
            let to_server = client.drain_ciphertext().unwrap();
            if !to_server.is_empty() {
                let mut input = to_server.as_slice();
                while !input.is_empty() {
                    server.read_tls(&mut input).unwrap();
                }
                server.process_new_packets().unwrap();
            }

            let mut to_client = Vec::new();
            while server.wants_write() {
                server.write_tls(&mut to_client).unwrap();
            }
            if !to_client.is_empty() {
                client.read_ciphertext(&to_client).unwrap();
            }

            if client.is_established() && !server.is_handshaking() {
                return;
            }
        }
        panic!("handshake did not converge");
    }

    #[test]
    fn handshake_establishes() {
        let mut client = SslSession::new(&SslConfig::default()).unwrap();
        assert!(!client.is_established());

        let mut server = test_server();
        complete_handshake(&mut client, &mut server);
        assert!(client.is_established());
    }

    #[test]
    fn encrypt_then_peer_decrypts() {
        let mut client = SslSession::new(&SslConfig::default()).unwrap();
        let mut server = test_server();
        complete_handshake(&mut client, &mut server);

        let cipher = client.encrypt(b"media payload").unwrap();
        assert!(!cipher.is_empty());
        assert_ne!(cipher.as_slice(), b"media payload");

        let mut input = cipher.as_slice();
        while !input.is_empty() {
            server.read_tls(&mut input).unwrap();
        }
        server.process_new_packets().unwrap();
        let mut plain = Vec::new();
        server.reader().read_to_end(&mut plain).ok();
        assert_eq!(plain, b"media payload");
    }

    #[test]
    fn peer_encrypts_then_decrypt() {
        let mut client = SslSession::new(&SslConfig::default()).unwrap();
        let mut server = test_server();
        complete_handshake(&mut client, &mut server);

        server.writer().write_all(b"from phone").unwrap();
        let mut cipher = Vec::new();
        while server.wants_write() {
            server.write_tls(&mut cipher).unwrap();
        }

        let plain = client.decrypt(&cipher).unwrap();
        assert_eq!(plain, b"from phone");
    }

    #[test]
    fn garbage_ciphertext_is_fatal() {
        let mut client = SslSession::new(&SslConfig::default()).unwrap();
        let garbage = [0xFFu8; 64];
        let result = client.read_ciphertext(&garbage);
        assert!(result.is_err());
    }
}
