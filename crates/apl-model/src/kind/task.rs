use serde::{Deserialize, Serialize};

/// How a boot task is executed.
///
/// Parsed from the `type` field of a task. Unknown values are kept as [`TaskKind::Unsupported`]
/// so the error surfaces when the task is dispatched, together with the task name.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskKind {
    /// Run a process to completion before moving on.
    Job,
    /// Register a long-running process with the external supervisor and start it.
    Server,
    /// Replace the orchestrator's own process image. Terminal; only valid as the application.
    DockerApp,
    /// Any other `type` value.
    Unsupported(String),
}

impl TaskKind {
    /// Returns the identifier used in the boot spec:
    /// - `"job"`
    /// - `"server"`
    /// - `"dockerApp"`
    pub fn kind(&self) -> &str {
        match self {
            TaskKind::Job => "job",
            TaskKind::Server => "server",
            TaskKind::DockerApp => "dockerApp",
            TaskKind::Unsupported(other) => other,
        }
    }

    /// Whether dispatching this kind never hands control back.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskKind::DockerApp)
    }
}

impl From<String> for TaskKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "job" => TaskKind::Job,
            "server" => TaskKind::Server,
            "dockerApp" => TaskKind::DockerApp,
            _ => TaskKind::Unsupported(value),
        }
    }
}

impl From<TaskKind> for String {
    fn from(kind: TaskKind) -> Self {
        kind.kind().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::TaskKind;

    #[test]
    fn known_kinds_parse() {
        let kinds: Vec<TaskKind> = serde_yaml::from_str("[job, server, dockerApp]").unwrap();
        assert_eq!(kinds, vec![TaskKind::Job, TaskKind::Server, TaskKind::DockerApp]);
    }

    #[test]
    fn unknown_kind_is_kept_verbatim() {
        let kind: TaskKind = serde_yaml::from_str("cronjob").unwrap();
        assert_eq!(kind, TaskKind::Unsupported("cronjob".into()));
        assert_eq!(kind.kind(), "cronjob");
        assert!(!kind.is_terminal());
    }

    #[test]
    fn kind_names_are_case_sensitive() {
        let kind: TaskKind = serde_yaml::from_str("DockerApp").unwrap();
        assert!(matches!(kind, TaskKind::Unsupported(_)));
    }
}
