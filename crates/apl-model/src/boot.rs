use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Deserializer};

use crate::{ModelError, TaskEnv, TaskKind, UserEnv};

/// Parsed boot specification.
///
/// ```yaml
/// kind: cvm
/// cvmAssistants:
///   - name: init-db
///     type: job
///     entrypoint: /workplace/bin/init-db
/// app:
///   - name: web
///     type: server
///     entrypoint: /workplace/bin/webapp
///     args: ["--port", "80"]
///     env: { MODE: prod }
///     tls: { certPath: /workplace/certs/web, commonName: web.local }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct BootSequence {
    #[serde(default)]
    pub kind: String,
    /// Tasks run in file order before the application.
    #[serde(
        default,
        rename = "cvmAssistants",
        alias = "csvAssistants",
        alias = "assistants",
        deserialize_with = "null_as_empty"
    )]
    pub assistants: Vec<Task>,
    /// At most one entry; checked by [`BootSequence::validate`].
    #[serde(default, rename = "app", deserialize_with = "null_as_empty")]
    pub application: Vec<Task>,
}

/// One entry of the boot specification.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Task {
    /// Unique within its section; doubles as the supervisor unit name.
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub entrypoint: PathBuf,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: UserEnv,
    #[serde(default)]
    pub tls: Option<TlsRequest>,
    /// Supervisor priority, assigned by the dispatcher right before a server is deployed.
    #[serde(skip)]
    pub priority: Option<i32>,
}

/// Request to provision a leaf certificate before the task runs.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsRequest {
    #[serde(rename = "certPath")]
    pub cert_dir: PathBuf,
    pub common_name: String,
}

impl BootSequence {
    /// Read, parse and validate the boot spec at `path`.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let text = fs::read_to_string(path).map_err(|source| ModelError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Parse and validate a boot spec document.
    pub fn from_yaml(text: &str) -> Result<Self, ModelError> {
        let seq: BootSequence = serde_yaml::from_str(text)?;
        seq.validate()?;
        Ok(seq)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.application.len() > 1 {
            return Err(ModelError::TooManyApplications(self.application.len()));
        }
        if let Some(task) = self.assistants.iter().find(|t| t.kind.is_terminal()) {
            return Err(ModelError::MisplacedDockerApp(task.name.clone()));
        }
        check_section("assistant", &self.assistants)?;
        check_section("app", &self.application)
    }

    /// The application task, if any.
    pub fn application(&self) -> Option<&Task> {
        self.application.first()
    }
}

impl Task {
    /// User supplied environment, or the format error recorded at load time.
    pub fn user_env(&self) -> Result<&TaskEnv, ModelError> {
        self.env.resolve(&self.name)
    }

    /// Directory the task runs in.
    pub fn workdir(&self) -> Option<&Path> {
        workdir_of(&self.entrypoint)
    }
}

/// Parent directory of `program`, or `None` for a bare program name.
pub fn workdir_of(program: &Path) -> Option<&Path> {
    program.parent().filter(|p| !p.as_os_str().is_empty())
}

fn check_section(section: &'static str, tasks: &[Task]) -> Result<(), ModelError> {
    let mut seen = HashSet::new();
    for (index, task) in tasks.iter().enumerate() {
        if task.name.trim().is_empty() {
            return Err(ModelError::MissingField {
                section,
                index,
                field: "name",
            });
        }
        if task.entrypoint.as_os_str().is_empty() {
            return Err(ModelError::MissingField {
                section,
                index,
                field: "entrypoint",
            });
        }
        if !seen.insert(task.name.as_str()) {
            return Err(ModelError::DuplicateName(task.name.clone()));
        }
    }
    Ok(())
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
kind: cvm
cvmAssistants:
  - name: prepare
    type: job
    entrypoint: /bin/echo
    args: ["hello"]
  - name: sidecar
    type: server
    entrypoint: /opt/sidecar/run
    tls:
      certPath: /workplace/certs/sidecar
      commonName: sidecar.local
app:
  - name: web
    type: server
    entrypoint: /bin/webapp
    args: ["--port", "80"]
    env:
      MODE: prod
"#;

    #[test]
    fn parses_sections_in_order() {
        let seq = BootSequence::from_yaml(SAMPLE).unwrap();
        assert_eq!(seq.kind, "cvm");

        let names: Vec<_> = seq.assistants.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["prepare", "sidecar"]);

        let sidecar = &seq.assistants[1];
        assert_eq!(sidecar.kind, TaskKind::Server);
        assert_eq!(
            sidecar.tls,
            Some(TlsRequest {
                cert_dir: PathBuf::from("/workplace/certs/sidecar"),
                common_name: "sidecar.local".into(),
            })
        );
        assert!(sidecar.priority.is_none());

        let app = seq.application().unwrap();
        assert_eq!(app.args, vec!["--port", "80"]);
        assert_eq!(app.user_env().unwrap().get("MODE"), Some("prod"));
        assert_eq!(app.workdir(), Some(Path::new("/bin")));
    }

    #[test]
    fn legacy_assistants_key_is_accepted() {
        let seq = BootSequence::from_yaml(
            "kind: csv\ncsvAssistants:\n  - {name: a, type: job, entrypoint: /bin/true}\n",
        )
        .unwrap();
        assert_eq!(seq.assistants.len(), 1);
        assert!(seq.application.is_empty());
    }

    #[test]
    fn more_than_one_application_is_rejected() {
        let err = BootSequence::from_yaml(
            r#"
app:
  - {name: a, type: job, entrypoint: /bin/true}
  - {name: b, type: job, entrypoint: /bin/true}
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::TooManyApplications(2)));
    }

    #[test]
    fn docker_app_is_rejected_among_assistants() {
        let err = BootSequence::from_yaml(
            "cvmAssistants:\n  - {name: shell, type: dockerApp, entrypoint: /bin/sh}\n",
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::MisplacedDockerApp(name) if name == "shell"));
    }

    #[test]
    fn duplicate_names_in_one_section_are_rejected() {
        let err = BootSequence::from_yaml(
            r#"
cvmAssistants:
  - {name: a, type: job, entrypoint: /bin/true}
  - {name: a, type: server, entrypoint: /bin/true}
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateName(name) if name == "a"));
    }

    #[test]
    fn empty_entrypoint_is_rejected() {
        let err =
            BootSequence::from_yaml("app:\n  - {name: a, type: job, entrypoint: \"\"}\n").unwrap_err();
        assert!(matches!(
            err,
            ModelError::MissingField {
                field: "entrypoint",
                ..
            }
        ));
    }

    #[test]
    fn null_sections_default_to_empty() {
        let seq = BootSequence::from_yaml("kind: cvm\napp:\ncvmAssistants:\n").unwrap();
        assert!(seq.application().is_none());
        assert!(seq.assistants.is_empty());
    }

    #[test]
    fn unknown_type_loads_and_malformed_env_loads() {
        let seq = BootSequence::from_yaml(
            r#"
cvmAssistants:
  - {name: a, type: cron, entrypoint: /bin/true}
  - {name: b, type: job, entrypoint: /bin/true, env: [X=1]}
"#,
        )
        .unwrap();
        assert_eq!(seq.assistants[0].kind, TaskKind::Unsupported("cron".into()));
        assert!(seq.assistants[1].user_env().is_err());
    }

    #[test]
    fn workdir_of_bare_program_is_none() {
        assert_eq!(workdir_of(Path::new("supervisorctl")), None);
        assert_eq!(workdir_of(Path::new("/usr/bin/supervisorctl")), Some(Path::new("/usr/bin")));
    }
}
