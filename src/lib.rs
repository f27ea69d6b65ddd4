//! tlsserve - local HTTPS static file server
//!
//! Serves a directory over HTTPS with a self-signed certificate so that
//! browser features requiring a secure context (camera access, OAuth redirect
//! URIs) work on a development machine and other devices on the LAN.

pub mod banner;
pub mod cert;
pub mod config;
pub mod error;
pub mod http;
pub mod middleware;
pub mod net;

pub use cert::{CertificateIssuer, CertificatePair, OpensslIssuer, ProvisionError, Provisioner};
pub use config::ServerConfig;
pub use error::AppError;
pub use self::http::{start_server, ServerError, ShutdownHandle};
