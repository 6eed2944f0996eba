use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("read boot spec {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse boot spec: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("boot spec declares {0} application tasks, at most one is allowed")]
    TooManyApplications(usize),

    #[error("task '{0}' has type dockerApp, which is only allowed in the app section")]
    MisplacedDockerApp(String),

    #[error("duplicate task name '{0}'")]
    DuplicateName(String),

    #[error("{section} task #{index} has an empty {field}")]
    MissingField {
        section: &'static str,
        index: usize,
        field: &'static str,
    },

    #[error("task '{task}': user env format error: {reason}")]
    UserEnvFormat { task: String, reason: String },
}
