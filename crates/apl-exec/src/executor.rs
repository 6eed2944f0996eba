use async_trait::async_trait;

use crate::{CommandSpec, ExecError, ExecResult, ProcessImage};

/// Process execution backend.
///
/// Everything that leaves the orchestrator as a process goes through this trait, which lets
/// the dispatcher be driven by a recording implementation in tests.
#[async_trait]
pub trait Executor: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Run `spec` to completion, forwarding its output to the log.
    async fn run(&self, spec: &CommandSpec) -> ExecResult<()>;

    /// Replace the current process image with `image`.
    ///
    /// Does not return on success; the returned value is always the reason it failed.
    fn replace(&self, image: &ProcessImage) -> ExecError;
}
