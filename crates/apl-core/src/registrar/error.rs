use std::path::PathBuf;

use apl_exec::ExecError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("read unit template {path}: {source}")]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse unit template {path}: {source}")]
    TemplateParse {
        path: PathBuf,
        #[source]
        source: tera::Error,
    },

    #[error("render unit {unit}: {source}")]
    Render {
        unit: String,
        #[source]
        source: tera::Error,
    },

    #[error("write unit file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("supervisor control `{action}` failed: {source}")]
    Control {
        action: String,
        #[source]
        source: ExecError,
    },

    #[error("server task '{0}' has no priority assigned")]
    Unprioritized(String),
}
