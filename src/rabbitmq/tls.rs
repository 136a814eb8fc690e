// src/rabbitmq/tls.rs
//! rustls client configuration for `amqps` connections.

use std::fs;
use std::sync::Arc;

use tokio_rustls::rustls::{
    self,
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::CryptoProvider,
    pki_types::{pem::PemObject, CertificateDer, PrivateKeyDer, ServerName, UnixTime},
    ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
};
use tracing::{debug, warn};

use super::errors::{RabbitMQError, Result};

/// Certificate material for a TLS connection. Paths are PEM files.
#[derive(Clone, Debug, Default)]
pub struct TlsOptions {
    pub ca_cert: Option<String>,
    pub client_cert: Option<String>,
    pub client_key: Option<String>,
    pub skip_verify: bool,
}

/// What the connection factory should hand to the transport.
#[derive(Clone, Debug)]
pub enum TlsContext {
    /// Nothing configured: let the client library use the platform trust store.
    PlatformDefaults,
    Custom(Arc<ClientConfig>),
}

pub fn build_tls_context(options: &TlsOptions) -> Result<TlsContext> {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());

    // TLS 1.2 is the floor; rustls has no older versions to fall back to.
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])
        .map_err(|e| RabbitMQError::CertificateLoad(format!("Invalid TLS setup: {}", e)))?;

    if options.skip_verify {
        warn!("TLS certificate verification is DISABLED; any server identity will be accepted");
        if let Some(ca) = &options.ca_cert {
            warn!(ca_cert = %ca, "CA certificate ignored because verification is disabled");
        }
        let config = builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert(provider)))
            .with_no_client_auth();
        return Ok(TlsContext::Custom(Arc::new(config)));
    }

    let identity = match (&options.client_cert, &options.client_key) {
        (Some(cert), Some(key)) => Some((load_certs(cert)?, load_key(key)?)),
        (None, None) => None,
        _ => {
            return Err(RabbitMQError::CertificateLoad(
                "Client certificate and key must be provided together".to_string(),
            ))
        }
    };

    let ca_path = match &options.ca_cert {
        Some(path) => path,
        None if identity.is_none() => return Ok(TlsContext::PlatformDefaults),
        None => {
            return Err(RabbitMQError::CertificateLoad(
                "A client identity needs a CA certificate to verify the broker".to_string(),
            ))
        }
    };

    let mut roots = RootCertStore::empty();
    for cert in load_certs(ca_path)? {
        roots.add(cert).map_err(|e| {
            RabbitMQError::CertificateLoad(format!("Failed to append CA certificate: {}", e))
        })?;
    }
    debug!(ca_cert = %ca_path, roots = roots.len(), "Loaded CA certificates");

    let builder = builder.with_root_certificates(roots);
    let config = match identity {
        Some((chain, key)) => builder.with_client_auth_cert(chain, key).map_err(|e| {
            RabbitMQError::CertificateLoad(format!("Failed to load client certificate: {}", e))
        })?,
        None => builder.with_no_client_auth(),
    };

    Ok(TlsContext::Custom(Arc::new(config)))
}

fn read_file(path: &str) -> Result<Vec<u8>> {
    fs::read(path)
        .map_err(|e| RabbitMQError::CertificateLoad(format!("Failed to read {}: {}", path, e)))
}

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>> {
    let pem = read_file(path)?;
    let certs = CertificateDer::pem_slice_iter(&pem)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| RabbitMQError::CertificateLoad(format!("Failed to parse {}: {}", path, e)))?;

    if certs.is_empty() {
        return Err(RabbitMQError::CertificateLoad(format!(
            "No certificates found in {}",
            path
        )));
    }
    Ok(certs)
}

fn load_key(path: &str) -> Result<PrivateKeyDer<'static>> {
    let pem = read_file(path)?;
    PrivateKeyDer::from_pem_slice(&pem)
        .map_err(|e| RabbitMQError::CertificateLoad(format!("Failed to parse {}: {}", path, e)))
}

/// Accepts every server certificate. Handshake signatures are still checked
/// so the session keys belong to whoever presented the certificate.
#[derive(Debug)]
struct AcceptAnyServerCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyServerCert {
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
            &self.0.signature_verification_algorithms,
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
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
