use std::{path::PathBuf, sync::Arc};

use apl_exec::{CommandSpec, Executor};
use async_trait::async_trait;

use crate::pki::PkiError;

/// What the issuer is asked to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueRequest {
    /// Self-signed CA: `ca.crt` and `private.key` in `ca_dir`.
    Ca {
        ca_dir: PathBuf,
        csr_conf_dir: PathBuf,
    },
    /// Leaf signed by the CA: `server.crt` and `server.key` in `cert_dir`.
    Server {
        ca_dir: PathBuf,
        cert_dir: PathBuf,
        csr_conf_dir: PathBuf,
        common_name: String,
    },
}

impl IssueRequest {
    pub fn mode(&self) -> &'static str {
        match self {
            IssueRequest::Ca { .. } => "ca",
            IssueRequest::Server { .. } => "server",
        }
    }

    /// Command line of the `pkitool cert` subcommand for this request.
    pub fn tool_args(&self) -> Vec<String> {
        let mut args = vec!["cert".to_string(), "-m".to_string(), self.mode().to_string()];
        match self {
            IssueRequest::Ca {
                ca_dir,
                csr_conf_dir,
            } => {
                args.extend(["-a".into(), ca_dir.display().to_string()]);
                args.extend(["-c".into(), csr_conf_dir.display().to_string()]);
            }
            IssueRequest::Server {
                ca_dir,
                cert_dir,
                csr_conf_dir,
                common_name,
            } => {
                args.extend(["-a".into(), ca_dir.display().to_string()]);
                args.extend(["-o".into(), cert_dir.display().to_string()]);
                args.extend(["-c".into(), csr_conf_dir.display().to_string()]);
                args.extend(["-n".into(), common_name.clone()]);
            }
        }
        args
    }
}

/// Produces certificate material on disk.
#[async_trait]
pub trait CertIssuer: Send + Sync + 'static {
    async fn issue(&self, req: &IssueRequest) -> Result<(), PkiError>;
}

/// Issuer backed by the external `pkitool` binary.
pub struct PkiTool {
    program: PathBuf,
    executor: Arc<dyn Executor>,
}

impl PkiTool {
    pub fn new(program: impl Into<PathBuf>, executor: Arc<dyn Executor>) -> Self {
        Self {
            program: program.into(),
            executor,
        }
    }
}

#[async_trait]
impl CertIssuer for PkiTool {
    async fn issue(&self, req: &IssueRequest) -> Result<(), PkiError> {
        let spec = CommandSpec::new(&self.program)
            .with_label("pkitool")
            .with_args(req.tool_args());
        self.executor
            .run(&spec)
            .await
            .map_err(|source| PkiError::Issue {
                mode: req.mode(),
                source,
            })
    }
}
