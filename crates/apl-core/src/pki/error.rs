use std::path::PathBuf;

use apl_exec::ExecError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PkiError {
    #[error("{mode} certificate generation failed: {source}")]
    Issue {
        mode: &'static str,
        #[source]
        source: ExecError,
    },

    #[error("bundle in {dir} is missing {missing} after generation")]
    Incomplete { dir: PathBuf, missing: String },

    #[error("mark bundle in {dir} as complete: {source}")]
    Marker {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("remove stale bundle {dir}: {source}")]
    Cleanup {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CA bundle in {0} does not exist")]
    MissingCa(PathBuf),
}
