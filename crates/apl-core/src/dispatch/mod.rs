//! Sequential execution of the boot specification.
//!
//! Assistants run in file order, then the application. Every failure is fatal: the first
//! error stops the sequence and is returned tagged with the task and the step that failed.

mod error;
pub use error::{DispatchError, Step};

use std::sync::Arc;

use apl_exec::{CommandSpec, Executor, ProcessImage};
use apl_model::{BootSequence, Task, TaskEnv, TaskKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{CoreError, Pki, Registrar, SecretStore};

/// Priority handed to the first server of a list; later ones count up from here.
const BASE_PRIORITY: i32 = 2;

/// How a dispatcher run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    Completed,
    /// Stopped between tasks because the cancel token fired.
    Cancelled,
}

pub struct Dispatcher {
    secrets: SecretStore,
    pki: Pki,
    registrar: Registrar,
    executor: Arc<dyn Executor>,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        secrets: SecretStore,
        pki: Pki,
        registrar: Registrar,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            secrets,
            pki,
            registrar,
            executor,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run assistants, then the application.
    ///
    /// Server tasks get their priority assigned in place.
    pub async fn run(&self, seq: &mut BootSequence) -> Result<BootOutcome, DispatchError> {
        info!(
            target: "apl.core.dispatch",
            kind = %seq.kind,
            assistants = seq.assistants.len(),
            app = seq.application.len(),
            executor = self.executor.name(),
            "boot sequence started"
        );

        if self.run_phase("assistant", &mut seq.assistants).await? == BootOutcome::Cancelled {
            return Ok(BootOutcome::Cancelled);
        }
        let outcome = self.run_phase("app", &mut seq.application).await?;

        if outcome == BootOutcome::Completed {
            info!(target: "apl.core.dispatch", "boot sequence completed");
        }
        Ok(outcome)
    }

    async fn run_phase(
        &self,
        phase: &'static str,
        tasks: &mut [Task],
    ) -> Result<BootOutcome, DispatchError> {
        for (index, task) in tasks.iter_mut().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(target: "apl.core.dispatch", phase, next = %task.name, "cancelled; remaining tasks skipped");
                return Ok(BootOutcome::Cancelled);
            }
            if task.kind == TaskKind::Server {
                task.priority = Some(BASE_PRIORITY + index as i32);
            }

            info!(target: "apl.core.dispatch", phase, task = %task.name, kind = task.kind.kind(), "task begin");
            self.dispatch(task).await?;
            info!(target: "apl.core.dispatch", phase, task = %task.name, kind = task.kind.kind(), "task end");
        }
        Ok(BootOutcome::Completed)
    }

    /// Run one task according to its kind.
    pub async fn dispatch(&self, task: &Task) -> Result<(), DispatchError> {
        let fail = |step: Step| {
            let task = task.name.clone();
            move |source: CoreError| DispatchError { task, step, source }
        };

        if let TaskKind::Unsupported(kind) = &task.kind {
            return Err(fail(Step::Dispatch)(unsupported(kind)));
        }

        let user_env = task.user_env().map_err(|e| fail(Step::Env)(e.into()))?;
        if let Some(tls) = &task.tls {
            self.pki
                .prepare(tls)
                .await
                .map_err(|e| fail(Step::Tls)(e.into()))?;
        }

        match &task.kind {
            TaskKind::Job => {
                let spec = CommandSpec::new(&task.entrypoint)
                    .with_label(&task.name)
                    .with_args(task.args.iter().cloned())
                    .with_env(self.job_env(user_env));
                self.executor
                    .run(&spec)
                    .await
                    .map_err(|e| fail(Step::Run)(e.into()))
            }
            TaskKind::Server => {
                let path = self
                    .registrar
                    .deploy(task)
                    .await
                    .map_err(fail(Step::Deploy))?;
                debug!(target: "apl.core.dispatch", task = %task.name, unit = %path.display(), "server registered");
                Ok(())
            }
            TaskKind::DockerApp => {
                let image = ProcessImage {
                    program: task.entrypoint.clone(),
                    args: task.args.clone(),
                    env: self.job_env(user_env),
                };
                info!(target: "apl.core.dispatch", task = %task.name, program = %image.program.display(), "replacing process image");
                let err = self.executor.replace(&image);
                Err(fail(Step::Replace)(err.into()))
            }
            TaskKind::Unsupported(kind) => Err(fail(Step::Dispatch)(unsupported(kind))),
        }
    }

    /// Secrets sorted by key, followed by the task's own env so the task wins on collisions.
    fn job_env(&self, user_env: &TaskEnv) -> TaskEnv {
        self.secrets.to_env().merged(user_env)
    }
}

fn unsupported(kind: &str) -> CoreError {
    CoreError::UnsupportedKind(kind.to_string())
}
