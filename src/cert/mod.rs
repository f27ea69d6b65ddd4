//! Certificate provisioning.
//!
//! Makes sure a self-signed certificate and its private key exist before the
//! TLS listener starts. Generation is delegated to a [`CertificateIssuer`]; the
//! default [`OpensslIssuer`] shells out to the `openssl` command-line tool.
//!
//! An existing pair is always reused as-is. It is inspected only to warn about
//! expiry or missing hostnames.

mod inspect;
mod openssl;

pub use inspect::{parse_cert_file, CertInfo, InspectError};
pub use openssl::OpensslIssuer;

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{
    CERT_KEY_BITS, CERT_SAN_DNS, CERT_SUBJECT_PREFIX, CERT_VALIDITY_DAYS, LOOPBACK_IP,
    OPENSSL_INSTALL_HINT,
};
use crate::net::discover_local_ip;

/// Certificate provisioning error. Always fatal for the server.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("Certificate tool '{}' not found", program.display())]
    ToolNotFound { program: PathBuf },

    #[error("Certificate tool '{}' failed ({status}): {stderr}", program.display())]
    ToolFailed {
        program: PathBuf,
        status: ExitStatus,
        stderr: String,
    },

    #[error("Failed to run certificate tool '{}': {source}", program.display())]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    #[error("Certificate tool reported success but {} is missing", path.display())]
    MissingOutput { path: PathBuf },
}

impl ProvisionError {
    /// Remediation text shown to the user alongside the error.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            ProvisionError::ToolNotFound { .. }
            | ProvisionError::ToolFailed { .. }
            | ProvisionError::Spawn { .. } => Some(OPENSSL_INSTALL_HINT),
            ProvisionError::MissingOutput { .. } => None,
        }
    }
}

/// Paths of a provisioned certificate and its private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificatePair {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Everything an issuer needs to produce a self-signed certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    /// Common name; the discovered local IP
    pub common_name: String,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub key_bits: u32,
    pub validity_days: u32,
}

impl CertificateRequest {
    /// Request covering `localhost`, the loopback address and `local_ip`.
    pub fn for_local_ip(cert_path: &Path, key_path: &Path, local_ip: IpAddr) -> Self {
        let mut ip_addresses = vec![LOOPBACK_IP];
        if local_ip != LOOPBACK_IP {
            ip_addresses.push(local_ip);
        }

        Self {
            cert_path: cert_path.to_path_buf(),
            key_path: key_path.to_path_buf(),
            common_name: local_ip.to_string(),
            dns_names: vec![CERT_SAN_DNS.to_string()],
            ip_addresses,
            key_bits: CERT_KEY_BITS,
            validity_days: CERT_VALIDITY_DAYS,
        }
    }

    /// Distinguished name in OpenSSL `-subj` form.
    pub fn subject(&self) -> String {
        format!("{}{}", CERT_SUBJECT_PREFIX, self.common_name)
    }

    /// `subjectAltName` extension value, e.g. `DNS:localhost,IP:127.0.0.1`.
    pub fn subject_alt_names(&self) -> String {
        self.dns_names
            .iter()
            .map(|dns| format!("DNS:{}", dns))
            .chain(self.ip_addresses.iter().map(|ip| format!("IP:{}", ip)))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Hostnames and addresses the certificate will be valid for.
    pub fn hostnames(&self) -> Vec<String> {
        self.dns_names
            .iter()
            .cloned()
            .chain(self.ip_addresses.iter().map(IpAddr::to_string))
            .collect()
    }
}

/// Produces a self-signed certificate and key at the requested paths.
#[async_trait]
pub trait CertificateIssuer: Send + Sync {
    async fn issue(&self, request: &CertificateRequest) -> Result<(), ProvisionError>;
}

/// Ensures a certificate pair exists at fixed paths.
pub struct Provisioner {
    cert_path: PathBuf,
    key_path: PathBuf,
    issuer: Arc<dyn CertificateIssuer>,
    local_ip: Option<IpAddr>,
}

impl Provisioner {
    pub fn new(
        cert_path: impl Into<PathBuf>,
        key_path: impl Into<PathBuf>,
        issuer: Arc<dyn CertificateIssuer>,
    ) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            issuer,
            local_ip: None,
        }
    }

    /// Use a fixed local IP instead of discovering it.
    pub fn with_local_ip(mut self, ip: IpAddr) -> Self {
        self.local_ip = Some(ip);
        self
    }

    fn local_ip(&self) -> IpAddr {
        self.local_ip.unwrap_or_else(discover_local_ip)
    }

    /// Return the certificate pair, generating it first if either file is missing.
    ///
    /// When both files exist nothing is written and the issuer is not called.
    pub async fn ensure_certificate(&self) -> Result<CertificatePair, ProvisionError> {
        let pair = CertificatePair {
            cert_path: self.cert_path.clone(),
            key_path: self.key_path.clone(),
        };

        if pair.cert_path.exists() && pair.key_path.exists() {
            println!("SSL certificate already exists");
            self.warn_if_stale(&pair.cert_path);
            return Ok(pair);
        }

        println!("Creating self-signed SSL certificate...");

        let local_ip = self.local_ip();
        let request = CertificateRequest::for_local_ip(&pair.cert_path, &pair.key_path, local_ip);
        tracing::info!(
            cert = %pair.cert_path.display(),
            key = %pair.key_path.display(),
            subject = %request.subject(),
            san = %request.subject_alt_names(),
            "Generating self-signed certificate"
        );

        self.issuer.issue(&request).await?;

        for path in [&pair.cert_path, &pair.key_path] {
            if !path.exists() {
                return Err(ProvisionError::MissingOutput { path: path.clone() });
            }
        }

        println!(
            "Certificate created: {}, {}",
            pair.cert_path.display(),
            pair.key_path.display()
        );
        println!("Certificate valid for: {}", request.hostnames().join(", "));

        Ok(pair)
    }

    /// Log a warning when a reused certificate is expired or does not cover
    /// the current hostnames. The pair is reused regardless.
    fn warn_if_stale(&self, cert_path: &Path) {
        let info = match parse_cert_file(cert_path) {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(cert = %cert_path.display(), error = %e, "Could not inspect existing certificate");
                return;
            }
        };

        if info.is_expired() {
            tracing::warn!(
                cert = %cert_path.display(),
                "Existing certificate has expired; delete server.crt and server.key to regenerate"
            );
        } else {
            tracing::debug!(
                cert = %cert_path.display(),
                days_remaining = info.days_remaining,
                "Reusing existing certificate"
            );
        }

        let expected = [
            CERT_SAN_DNS.to_string(),
            LOOPBACK_IP.to_string(),
            self.local_ip().to_string(),
        ];
        let missing = info.missing_names(&expected);
        if !missing.is_empty() {
            tracing::warn!(
                cert = %cert_path.display(),
                missing = ?missing,
                "Existing certificate does not cover all local addresses; delete server.crt and server.key to regenerate"
            );
        }
    }
}
