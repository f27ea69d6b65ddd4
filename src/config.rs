//! Configuration and constants.
//!
//! Defines the defaults for the listener, the certificate parameters handed to
//! the issuer, logging defaults, and `ServerConfig`, the immutable settings
//! struct passed to the server at startup.

use const_format::formatcp;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

// =============================================================================
// Listener
// =============================================================================

/// Default HTTPS port when `--port` is omitted
pub const DEFAULT_PORT: u16 = 5500;

/// Bind address: all IPv4 interfaces
pub const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Seconds to wait for in-flight connections after shutdown is requested
pub const GRACEFUL_SHUTDOWN_SECS: u64 = 5;

/// ALPN protocols advertised by the TLS context (HTTP/1.1 only)
pub const ALPN_PROTOCOLS: &[&[u8]] = &[b"http/1.1"];

/// Cache-Control for every response; edits must show up on reload
pub const CACHE_CONTROL_DEV: &str = "no-cache";

// =============================================================================
// Certificate
// =============================================================================

/// Certificate file name, relative to the served root
pub const CERT_FILE: &str = "server.crt";

/// Private key file name, relative to the served root
pub const KEY_FILE: &str = "server.key";

/// Default certificate generation program
pub const DEFAULT_OPENSSL: &str = "openssl";

/// RSA key size for generated keys
pub const CERT_KEY_BITS: u32 = 4096;

/// Validity of generated certificates in days
pub const CERT_VALIDITY_DAYS: u32 = 365;

pub const CERT_SUBJECT_COUNTRY: &str = "DE";
pub const CERT_SUBJECT_STATE: &str = "State";
pub const CERT_SUBJECT_LOCALITY: &str = "City";
pub const CERT_SUBJECT_ORG: &str = "Dev";

/// Subject prefix; the common name (local IP) is appended at runtime
pub const CERT_SUBJECT_PREFIX: &str = formatcp!(
    "/C={}/ST={}/L={}/O={}/CN=",
    CERT_SUBJECT_COUNTRY,
    CERT_SUBJECT_STATE,
    CERT_SUBJECT_LOCALITY,
    CERT_SUBJECT_ORG
);

/// DNS name always covered by generated certificates
pub const CERT_SAN_DNS: &str = "localhost";

/// Loopback address always covered by generated certificates
pub const LOOPBACK_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Public address used to pick the outbound interface (no packets are sent)
pub const LOCAL_IP_ROUTE_TARGET: &str = "8.8.8.8:80";

/// Install hint printed when certificate generation fails
pub const OPENSSL_INSTALL_HINT: &str =
    "OpenSSL must be installed. Install it with:\nsudo apt-get install openssl";

// =============================================================================
// Logging
// =============================================================================

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "tlsserve=info,tower_http=info";

/// Environment variable selecting the log format (text or json)
pub const LOG_FORMAT_ENV: &str = "TLSSERVE_LOG_FORMAT";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

/// Settings for one server run. Built once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// HTTPS port
    pub port: u16,
    /// Interface to bind
    pub bind_ip: IpAddr,
    /// Directory tree served as static content
    pub root: PathBuf,
    /// PEM certificate, created on first run if missing
    pub cert_path: PathBuf,
    /// PEM private key, created on first run if missing
    pub key_path: PathBuf,
    /// Program invoked by the default certificate issuer
    pub openssl: PathBuf,
}

impl ServerConfig {
    /// Config serving `root` on `port`, with the certificate pair stored in `root`.
    pub fn for_root(root: impl Into<PathBuf>, port: u16) -> Self {
        let root = root.into();
        Self {
            port,
            bind_ip: DEFAULT_BIND_IP,
            cert_path: root.join(CERT_FILE),
            key_path: root.join(KEY_FILE),
            openssl: PathBuf::from(DEFAULT_OPENSSL),
            root,
        }
    }

    /// Config anchored at the directory containing the running executable,
    /// so the served tree does not depend on the invocation directory.
    pub fn from_executable(port: u16) -> std::io::Result<Self> {
        let exe = std::env::current_exe()?.canonicalize()?;
        let root = exe.parent().map(Path::to_path_buf).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("executable {} has no parent directory", exe.display()),
            )
        })?;
        Ok(Self::for_root(root, port))
    }

    /// Socket address the listener binds.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_prefix() {
        assert_eq!(CERT_SUBJECT_PREFIX, "/C=DE/ST=State/L=City/O=Dev/CN=");
    }

    #[test]
    fn test_for_root_paths() {
        let config = ServerConfig::for_root("/srv/app", 8443);
        assert_eq!(config.port, 8443);
        assert_eq!(config.cert_path, PathBuf::from("/srv/app/server.crt"));
        assert_eq!(config.key_path, PathBuf::from("/srv/app/server.key"));
        assert_eq!(config.openssl, PathBuf::from("openssl"));
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:8443");
    }

    #[test]
    fn test_from_executable_uses_exe_dir() {
        let config = ServerConfig::from_executable(DEFAULT_PORT).unwrap();
        let exe = std::env::current_exe().unwrap().canonicalize().unwrap();
        assert_eq!(config.root, exe.parent().unwrap());
        assert_eq!(config.port, 5500);
    }
}
