//! HTTPS server startup logic.
//!
//! Provisions the certificate pair, builds the rustls context from it, binds
//! the listener and serves the static router until shut down.

use std::net::SocketAddr;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};

use crate::banner;
use crate::cert::{CertificateIssuer, CertificatePair, ProvisionError, Provisioner};
use crate::config::{ServerConfig, ALPN_PROTOCOLS};
use crate::net::discover_local_ip;

use super::shutdown::ShutdownHandle;
use super::static_files::create_router;

/// Server startup error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Certificate provisioning failed: {0}")]
    Provision(#[from] ProvisionError),

    #[error("Failed to bind {addr}: {source}\nIs another process using this port?")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Failed to load TLS configuration: {0}")]
    TlsConfig(String),

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Start the HTTPS server described by `config`.
///
/// Blocks until `shutdown` is triggered and in-flight connections have
/// drained. The listening socket is closed when this returns.
pub async fn start_server(
    config: ServerConfig,
    issuer: Arc<dyn CertificateIssuer>,
    shutdown: ShutdownHandle,
) -> Result<(), ServerError> {
    let pair = Provisioner::new(&config.cert_path, &config.key_path, issuer)
        .ensure_certificate()
        .await?;

    let tls_config = load_tls_config(&pair).await?;

    let addr = config.bind_addr();
    let listener = std::net::TcpListener::bind(addr)
        .and_then(|listener| listener.set_nonblocking(true).map(|()| listener))
        .map_err(|source| ServerError::Bind { addr, source })?;
    let local_addr = listener
        .local_addr()
        .map_err(|source| ServerError::Bind { addr, source })?;

    tracing::info!(
        addr = %local_addr,
        root = %config.root.display(),
        cert = %pair.cert_path.display(),
        "Starting HTTPS server"
    );

    banner::print_banner(local_addr.port(), discover_local_ip());

    let app = create_router(&config);

    axum_server::from_tcp_rustls(listener, tls_config)
        .handle(shutdown.server_handle())
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(ServerError::Serve)?;

    tracing::info!(addr = %local_addr, "HTTPS server stopped");
    Ok(())
}

/// Build the server TLS context from a PEM certificate chain and private key.
///
/// TLS 1.2 and 1.3 via the aws-lc-rs provider, no client certificates, and
/// only `http/1.1` offered over ALPN.
pub async fn load_tls_config(pair: &CertificatePair) -> Result<RustlsConfig, ServerError> {
    let pair = pair.clone();

    let server_config = tokio::task::spawn_blocking(move || {
        let certs = CertificateDer::pem_file_iter(&pair.cert_path)
            .and_then(|certs| certs.collect::<Result<Vec<_>, _>>())
            .map_err(|e| {
                ServerError::TlsConfig(format!(
                    "Failed to read certificate {}: {}",
                    pair.cert_path.display(),
                    e
                ))
            })?;

        if certs.is_empty() {
            return Err(ServerError::TlsConfig(format!(
                "No certificates found in {}",
                pair.cert_path.display()
            )));
        }

        let key = PrivateKeyDer::from_pem_file(&pair.key_path).map_err(|e| {
            ServerError::TlsConfig(format!(
                "Failed to read private key {}: {}",
                pair.key_path.display(),
                e
            ))
        })?;

        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let mut server_config = rustls::ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| ServerError::TlsConfig(e.to_string()))?
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| {
                ServerError::TlsConfig(format!("Certificate and key do not match: {}", e))
            })?;
        server_config.alpn_protocols = ALPN_PROTOCOLS.iter().map(|p| p.to_vec()).collect();

        Ok(server_config)
    })
    .await
    .map_err(|e| ServerError::TlsConfig(format!("TLS loader task failed: {}", e)))??;

    Ok(RustlsConfig::from_config(Arc::new(server_config)))
}
