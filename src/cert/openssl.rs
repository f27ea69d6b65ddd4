//! Certificate generation through the `openssl` command-line tool.

use std::ffi::OsString;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;

use super::{CertificateIssuer, CertificateRequest, ProvisionError};
use crate::config::DEFAULT_OPENSSL;

/// Issues certificates with `openssl req -x509`.
#[derive(Debug, Clone)]
pub struct OpensslIssuer {
    program: PathBuf,
}

impl Default for OpensslIssuer {
    fn default() -> Self {
        Self::new(DEFAULT_OPENSSL)
    }
}

impl OpensslIssuer {
    /// Issuer running `program` (a name looked up on PATH, or a full path).
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(request: &CertificateRequest) -> Vec<OsString> {
        vec![
            "req".into(),
            "-x509".into(),
            "-newkey".into(),
            format!("rsa:{}", request.key_bits).into(),
            "-keyout".into(),
            request.key_path.clone().into_os_string(),
            "-out".into(),
            request.cert_path.clone().into_os_string(),
            "-days".into(),
            request.validity_days.to_string().into(),
            "-nodes".into(),
            "-subj".into(),
            request.subject().into(),
            "-addext".into(),
            format!("subjectAltName={}", request.subject_alt_names()).into(),
        ]
    }
}

#[async_trait]
impl CertificateIssuer for OpensslIssuer {
    async fn issue(&self, request: &CertificateRequest) -> Result<(), ProvisionError> {
        tracing::debug!(program = %self.program.display(), "Running certificate tool");

        let output = Command::new(&self.program)
            .args(Self::args(request))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ProvisionError::ToolNotFound {
                    program: self.program.clone(),
                },
                _ => ProvisionError::Spawn {
                    program: self.program.clone(),
                    source: e,
                },
            })?;

        if !output.status.success() {
            return Err(ProvisionError::ToolFailed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}
