use std::process::Stdio;

use apl_model::workdir_of;
use async_trait::async_trait;
use tracing::{debug, info, trace, warn};

use crate::{
    CommandSpec, ExecError, ExecResult, Executor, ProcessImage,
    util::{cmd_program, forward_lines},
};

/// Executes commands as native child processes.
///
/// stdout and stderr are piped and forwarded line by line to the `apl.exec.out` log target
/// while the child runs. Lines longer than 8 KiB are logged in chunks.
#[derive(Debug, Default)]
pub struct ProcRunner;

impl ProcRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Executor for ProcRunner {
    fn name(&self) -> &'static str {
        "proc"
    }

    async fn run(&self, spec: &CommandSpec) -> ExecResult<()> {
        if spec.program.as_os_str().is_empty() {
            return Err(ExecError::MissingProgram);
        }

        let mut cmd = cmd_program(&spec.program, &spec.args, &spec.env);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        trace!(target: "apl.exec.proc", task = %spec.label, program = %spec.program.display(), args = ?spec.args, "spawn");
        let mut child = cmd
            .spawn()
            .map_err(|e| ExecError::Spawn(format!("{}: {e}", spec.program.display())))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (status, (), ()) = tokio::join!(
            child.wait(),
            forward_lines(stdout, &spec.label, "stdout"),
            forward_lines(stderr, &spec.label, "stderr"),
        );
        let status = status?;

        if status.success() {
            debug!(target: "apl.exec.proc", task = %spec.label, "exit success");
            return Ok(());
        }
        match status.code() {
            Some(code) => {
                warn!(target: "apl.exec.proc", task = %spec.label, code, "exit non-zero");
                Err(ExecError::NonZeroExit { code })
            }
            None => {
                warn!(target: "apl.exec.proc", task = %spec.label, "terminated by signal");
                Err(ExecError::KilledBySignal)
            }
        }
    }

    #[cfg(unix)]
    fn replace(&self, image: &ProcessImage) -> ExecError {
        use std::os::unix::process::CommandExt;

        let mut cmd = std::process::Command::new(&image.program);
        cmd.args(&image.args);
        if let Some(dir) = workdir_of(&image.program) {
            cmd.current_dir(dir);
        }
        for kv in image.env.iter() {
            cmd.env(kv.key(), kv.value());
        }

        info!(target: "apl.exec.proc", program = %image.program.display(), args = ?image.args, "replacing process image");
        let err = cmd.exec();
        ExecError::Replace(format!("{}: {err}", image.program.display()))
    }

    #[cfg(not(unix))]
    fn replace(&self, image: &ProcessImage) -> ExecError {
        ExecError::Replace(format!(
            "{}: process image replacement requires a unix host",
            image.program.display()
        ))
    }
}
