use std::fmt;

use thiserror::Error;

use crate::CoreError;

/// Stage of a task at which dispatching failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Resolving the task's own environment.
    Env,
    /// Provisioning certificates.
    Tls,
    /// Running a job to completion.
    Run,
    /// Registering and starting a server.
    Deploy,
    /// Replacing the process image.
    Replace,
    /// Choosing how to run the task.
    Dispatch,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Env => "env",
            Step::Tls => "tls",
            Step::Run => "run",
            Step::Deploy => "deploy",
            Step::Replace => "replace",
            Step::Dispatch => "dispatch",
        })
    }
}

#[derive(Debug, Error)]
#[error("task '{task}' failed at {step}: {source}")]
pub struct DispatchError {
    pub task: String,
    pub step: Step,
    #[source]
    pub source: CoreError,
}
