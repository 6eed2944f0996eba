use apl_exec::ExecError;
use apl_model::ModelError;
use thiserror::Error;

use crate::{pki::PkiError, registrar::DeployError};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Pki(#[from] PkiError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error("task type '{0}' is not supported")]
    UnsupportedKind(String),
}
