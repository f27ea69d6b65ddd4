//! Read back an existing certificate without shelling out.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};

use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::*;

#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid PEM: {0}")]
    Pem(String),

    #[error("Invalid X.509 certificate: {0}")]
    X509(String),
}

/// Fields of a certificate relevant to reuse decisions.
#[derive(Debug, Clone)]
pub struct CertInfo {
    pub common_name: Option<String>,
    /// DNS names and IP addresses from the SAN extension
    pub subject_alt_names: Vec<String>,
    /// Whole days until expiry; `None` once expired
    pub days_remaining: Option<i64>,
}

impl CertInfo {
    pub fn is_expired(&self) -> bool {
        self.days_remaining.is_none()
    }

    /// Names from `expected` that the SAN extension does not list.
    pub fn missing_names<'a>(&self, expected: &'a [String]) -> Vec<&'a str> {
        expected
            .iter()
            .filter(|name| !self.subject_alt_names.contains(name))
            .map(String::as_str)
            .collect()
    }
}

/// Parse the first certificate of a PEM file.
pub fn parse_cert_file(path: &Path) -> Result<CertInfo, InspectError> {
    let data = std::fs::read(path).map_err(|e| InspectError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    let (_, pem) = parse_x509_pem(&data).map_err(|e| InspectError::Pem(e.to_string()))?;
    let cert = pem
        .parse_x509()
        .map_err(|e| InspectError::X509(e.to_string()))?;

    let common_name = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(String::from);

    let mut subject_alt_names = Vec::new();
    for ext in cert.extensions() {
        if let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() {
            for name in &san.general_names {
                match name {
                    GeneralName::DNSName(dns) => subject_alt_names.push(dns.to_string()),
                    GeneralName::IPAddress(bytes) => {
                        if let Some(ip) = ip_from_bytes(bytes) {
                            subject_alt_names.push(ip.to_string());
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    let days_remaining = cert
        .validity()
        .time_to_expiration()
        .map(|left| left.whole_days());

    Ok(CertInfo {
        common_name,
        subject_alt_names,
        days_remaining,
    })
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    if let Ok(v4) = <[u8; 4]>::try_from(bytes) {
        return Some(IpAddr::V4(Ipv4Addr::from(v4)));
    }
    <[u8; 16]>::try_from(bytes)
        .ok()
        .map(|v6| IpAddr::V6(Ipv6Addr::from(v6)))
}
