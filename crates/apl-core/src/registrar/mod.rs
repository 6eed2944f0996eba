mod error;
pub use error::DeployError;

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use apl_exec::{CommandSpec, Executor};
use apl_model::{Task, TaskEnv};
use serde::Serialize;
use tera::{Context, Tera};
use tracing::{debug, info};

use crate::CoreError;

const TEMPLATE_NAME: &str = "supervisord.ini";

#[derive(Debug, Clone)]
pub struct RegistrarConfig {
    /// Directory the supervisor includes unit files from.
    pub supervisor_dir: PathBuf,
    /// Tera template rendered once per server task.
    pub template_path: PathBuf,
    /// Supervisor control command.
    pub supervisorctl: PathBuf,
}

/// Values exposed to the unit template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupervisorUnit {
    pub name: String,
    /// Entrypoint followed by its space-joined arguments.
    pub command: String,
    pub directory: String,
    /// Comma-joined `KEY=VALUE` pairs from the task's own env. Secrets never go here:
    /// unit files are written to disk.
    pub environment: String,
    pub priority: i32,
}

impl SupervisorUnit {
    pub fn new(task: &Task, env: &TaskEnv, priority: i32) -> Self {
        let mut command = task.entrypoint.display().to_string();
        for arg in &task.args {
            command.push(' ');
            command.push_str(arg);
        }
        let directory = task
            .workdir()
            .unwrap_or_else(|| Path::new("."))
            .display()
            .to_string();

        Self {
            name: task.name.clone(),
            command,
            directory,
            environment: env.joined(","),
            priority,
        }
    }
}

/// Registers server tasks with the external process supervisor.
pub struct Registrar {
    cfg: RegistrarConfig,
    executor: Arc<dyn Executor>,
}

impl Registrar {
    pub fn new(cfg: RegistrarConfig, executor: Arc<dyn Executor>) -> Self {
        Self { cfg, executor }
    }

    /// Write the unit for `task`, reload the supervisor and start the unit.
    ///
    /// The task must already carry its priority. Success means the supervisor accepted the
    /// start request, not that the service is healthy.
    pub async fn deploy(&self, task: &Task) -> Result<PathBuf, CoreError> {
        let priority = task
            .priority
            .ok_or_else(|| DeployError::Unprioritized(task.name.clone()))?;
        let unit = SupervisorUnit::new(task, task.user_env()?, priority);
        let path = self.register(&unit).await?;
        Ok(path)
    }

    /// Render and write `unit`, then drive `update` and `start <name>`.
    pub async fn register(&self, unit: &SupervisorUnit) -> Result<PathBuf, DeployError> {
        let path = self.write_unit(unit)?;
        self.control(&["update"]).await?;
        self.control(&["start", &unit.name]).await?;
        info!(target: "apl.core.registrar", unit = %unit.name, priority = unit.priority, "unit started");
        Ok(path)
    }

    /// Render `unit` through the configured template.
    pub fn render(&self, unit: &SupervisorUnit) -> Result<String, DeployError> {
        let path = &self.cfg.template_path;
        let source = fs::read_to_string(path).map_err(|source| DeployError::TemplateRead {
            path: path.clone(),
            source,
        })?;

        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, &source)
            .map_err(|source| DeployError::TemplateParse {
                path: path.clone(),
                source,
            })?;
        let ctx = Context::from_serialize(unit).map_err(|source| DeployError::Render {
            unit: unit.name.clone(),
            source,
        })?;
        tera.render(TEMPLATE_NAME, &ctx)
            .map_err(|source| DeployError::Render {
                unit: unit.name.clone(),
                source,
            })
    }

    /// Replace `<supervisor_dir>/<name>.ini` with the rendered unit.
    pub fn write_unit(&self, unit: &SupervisorUnit) -> Result<PathBuf, DeployError> {
        let rendered = self.render(unit)?;
        let dir = &self.cfg.supervisor_dir;
        let path = dir.join(format!("{}.ini", unit.name));
        let io_err = |source| DeployError::Write {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(dir).map_err(io_err)?;
        if path.is_file() {
            fs::remove_file(&path).map_err(io_err)?;
        }
        fs::write(&path, rendered).map_err(io_err)?;

        debug!(target: "apl.core.registrar", path = %path.display(), "unit file written");
        Ok(path)
    }

    async fn control(&self, args: &[&str]) -> Result<(), DeployError> {
        let spec = CommandSpec::new(&self.cfg.supervisorctl)
            .with_label("supervisorctl")
            .with_args(args.iter().copied());
        self.executor
            .run(&spec)
            .await
            .map_err(|source| DeployError::Control {
                action: args.join(" "),
                source,
            })
    }
}
