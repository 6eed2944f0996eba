//! Idempotent provisioning of the guest CA and per-task leaf certificates.
//!
//! Certificate material is produced by an external issuer (the `pkitool` binary in
//! production). This module only decides *whether* to issue, based on the marker file
//! written after a bundle is complete, and keeps the all-or-nothing invariant of a bundle
//! directory: either every file plus the marker exists, or the directory is gone.

mod error;
pub use error::PkiError;

mod issuer;
pub use issuer::{CertIssuer, IssueRequest, PkiTool};

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use apl_model::{MARKER_FILE, TlsRequest};
use tracing::{debug, error, info, warn};

/// Files of a CA bundle.
pub const CA_FILES: [&str; 2] = ["ca.crt", "private.key"];
/// Files of a leaf bundle.
pub const LEAF_FILES: [&str; 2] = ["server.crt", "server.key"];

#[derive(Debug, Clone)]
pub struct PkiConfig {
    /// Directory holding the CA bundle. Must live on an encrypted disk.
    pub ca_dir: PathBuf,
    /// Directory with the CSR templates consumed by the issuer.
    pub csr_conf_dir: PathBuf,
}

/// Whether a bundle had to be generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bundle {
    Generated,
    Present,
}

pub struct Pki {
    cfg: PkiConfig,
    issuer: Arc<dyn CertIssuer>,
}

impl Pki {
    pub fn new(cfg: PkiConfig, issuer: Arc<dyn CertIssuer>) -> Self {
        Self { cfg, issuer }
    }

    /// Make sure the CA and the leaf certificate requested by a task exist.
    pub async fn prepare(&self, tls: &TlsRequest) -> Result<(), PkiError> {
        self.ensure_ca(&self.cfg.ca_dir, &self.cfg.csr_conf_dir).await?;
        self.ensure_leaf(
            &tls.cert_dir,
            &self.cfg.ca_dir,
            &self.cfg.csr_conf_dir,
            &tls.common_name,
        )
        .await?;
        Ok(())
    }

    /// Generate the CA bundle in `ca_dir` unless it is already complete.
    ///
    /// The CA certificate is written to the log afterwards so operators can pin it.
    pub async fn ensure_ca(&self, ca_dir: &Path, csr_conf_dir: &Path) -> Result<Bundle, PkiError> {
        let req = IssueRequest::Ca {
            ca_dir: ca_dir.to_path_buf(),
            csr_conf_dir: csr_conf_dir.to_path_buf(),
        };
        let bundle = self.ensure_bundle(ca_dir, &CA_FILES, &req).await?;
        if bundle == Bundle::Generated {
            warn!(
                target: "apl.core.pki",
                ca_dir = %ca_dir.display(),
                "new CA generated; the CA directory must be on an encrypted disk"
            );
        }
        surface_ca(ca_dir);
        Ok(bundle)
    }

    /// Generate a leaf bundle for `common_name` in `cert_dir`, signed by the CA in `ca_dir`.
    pub async fn ensure_leaf(
        &self,
        cert_dir: &Path,
        ca_dir: &Path,
        csr_conf_dir: &Path,
        common_name: &str,
    ) -> Result<Bundle, PkiError> {
        if !ca_dir.join(MARKER_FILE).exists() {
            return Err(PkiError::MissingCa(ca_dir.to_path_buf()));
        }
        let req = IssueRequest::Server {
            ca_dir: ca_dir.to_path_buf(),
            cert_dir: cert_dir.to_path_buf(),
            csr_conf_dir: csr_conf_dir.to_path_buf(),
            common_name: common_name.to_string(),
        };
        self.ensure_bundle(cert_dir, &LEAF_FILES, &req).await
    }

    async fn ensure_bundle(
        &self,
        dir: &Path,
        files: &[&str],
        req: &IssueRequest,
    ) -> Result<Bundle, PkiError> {
        let marker = dir.join(MARKER_FILE);
        if marker.exists() {
            let missing = missing_files(dir, files);
            if missing.is_empty() {
                debug!(target: "apl.core.pki", dir = %dir.display(), mode = req.mode(), "bundle present, skipping");
                return Ok(Bundle::Present);
            }
            warn!(target: "apl.core.pki", dir = %dir.display(), ?missing, "marker present but bundle incomplete; regenerating");
            fs::remove_dir_all(dir).map_err(|source| PkiError::Cleanup {
                dir: dir.to_path_buf(),
                source,
            })?;
        }

        info!(target: "apl.core.pki", dir = %dir.display(), mode = req.mode(), "generating bundle");
        self.issuer.issue(req).await?;

        let missing = missing_files(dir, files);
        if !missing.is_empty() {
            rollback(dir);
            return Err(PkiError::Incomplete {
                dir: dir.to_path_buf(),
                missing: missing.join(", "),
            });
        }
        if let Err(source) = fs::write(&marker, MARKER_FILE) {
            rollback(dir);
            return Err(PkiError::Marker {
                dir: dir.to_path_buf(),
                source,
            });
        }

        info!(target: "apl.core.pki", dir = %dir.display(), mode = req.mode(), "bundle generated");
        Ok(Bundle::Generated)
    }
}

fn missing_files(dir: &Path, files: &[&str]) -> Vec<String> {
    files
        .iter()
        .filter(|f| !dir.join(f).is_file())
        .map(|f| f.to_string())
        .collect()
}

// A half-written bundle must never be mistaken for a valid one.
fn rollback(dir: &Path) {
    if let Err(e) = fs::remove_dir_all(dir) {
        error!(target: "apl.core.pki", dir = %dir.display(), error = %e, "rollback of partial bundle failed");
    }
}

fn surface_ca(ca_dir: &Path) {
    let path = ca_dir.join(CA_FILES[0]);
    match fs::read_to_string(&path) {
        Ok(pem) => info!(target: "apl.core.pki", path = %path.display(), "CA certificate:\n{pem}"),
        Err(e) => warn!(target: "apl.core.pki", path = %path.display(), error = %e, "cannot read CA certificate"),
    }
}
