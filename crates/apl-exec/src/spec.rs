use std::path::PathBuf;

use apl_model::TaskEnv;

/// Where a child process gets its environment from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnvPolicy {
    /// Keep the orchestrator's environment. Used for control tools such as `supervisorctl`.
    Inherit,
    /// Start from an empty environment and set only these pairs; later pairs win.
    Explicit(TaskEnv),
}

/// A process to run to completion.
#[derive(Clone, Debug)]
pub struct CommandSpec {
    /// Name attached to every forwarded output line.
    pub label: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: EnvPolicy,
}

impl CommandSpec {
    /// Command with no arguments that inherits the caller's environment.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        Self {
            label: program.display().to_string(),
            program,
            args: Vec::new(),
            env: EnvPolicy::Inherit,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, env: TaskEnv) -> Self {
        self.env = EnvPolicy::Explicit(env);
        self
    }
}

/// The program that replaces the orchestrator's own process image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessImage {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Overlaid on the current process environment; later pairs win.
    pub env: TaskEnv,
}
