use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use apl_core::{
    BootOutcome, CertIssuer, CoreError, Dispatcher, IssueRequest, Pki, PkiConfig, PkiError,
    Registrar, RegistrarConfig, SecretStore, Step,
};
use apl_exec::{CommandSpec, EnvPolicy, ExecError, ExecResult, Executor, ProcessImage};
use apl_model::{BootSequence, ModelError, TaskEnv};
use async_trait::async_trait;
use tempfile::{TempDir, tempdir};
use tokio_util::sync::CancellationToken;

const TEMPLATE: &str = "[program:{{ name }}]
command={{ command }}
directory={{ directory }}
environment={{ environment }}
priority={{ priority }}
";

const SUPERVISORCTL: &str = "/usr/bin/supervisorctl";

#[derive(Default)]
struct Recorder {
    runs: Mutex<Vec<CommandSpec>>,
    images: Mutex<Vec<ProcessImage>>,
}

impl Recorder {
    fn runs(&self) -> Vec<CommandSpec> {
        self.runs.lock().unwrap().clone()
    }

    fn jobs(&self) -> Vec<CommandSpec> {
        self.runs()
            .into_iter()
            .filter(|s| s.program != Path::new(SUPERVISORCTL))
            .collect()
    }

    fn control_calls(&self) -> Vec<Vec<String>> {
        self.runs()
            .into_iter()
            .filter(|s| s.program == Path::new(SUPERVISORCTL))
            .map(|s| s.args)
            .collect()
    }
}

#[async_trait]
impl Executor for Recorder {
    fn name(&self) -> &'static str {
        "recorder"
    }

    async fn run(&self, spec: &CommandSpec) -> ExecResult<()> {
        self.runs.lock().unwrap().push(spec.clone());
        Ok(())
    }

    fn replace(&self, image: &ProcessImage) -> ExecError {
        self.images.lock().unwrap().push(image.clone());
        ExecError::Replace("exec returned".into())
    }
}

/// Writes a complete bundle wherever it is asked to.
struct DiskIssuer;

#[async_trait]
impl CertIssuer for DiskIssuer {
    async fn issue(&self, req: &IssueRequest) -> Result<(), PkiError> {
        let (dir, files): (&PathBuf, [&str; 2]) = match req {
            IssueRequest::Ca { ca_dir, .. } => (ca_dir, ["ca.crt", "private.key"]),
            IssueRequest::Server { cert_dir, .. } => (cert_dir, ["server.crt", "server.key"]),
        };
        fs::create_dir_all(dir).unwrap();
        for f in files {
            fs::write(dir.join(f), "pem").unwrap();
        }
        Ok(())
    }
}

struct Harness {
    root: TempDir,
    exec: Arc<Recorder>,
    secrets: SecretStore,
}

impl Harness {
    fn new() -> Self {
        let root = tempdir().unwrap();
        fs::write(root.path().join("unit.template"), TEMPLATE).unwrap();
        Self {
            root,
            exec: Arc::new(Recorder::default()),
            secrets: SecretStore::new(),
        }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root.path().join(rel)
    }

    fn dispatcher(&self) -> Dispatcher {
        let pki = Pki::new(
            PkiConfig {
                ca_dir: self.path("pki"),
                csr_conf_dir: self.path("cert-conf"),
            },
            Arc::new(DiskIssuer),
        );
        let registrar = Registrar::new(
            RegistrarConfig {
                supervisor_dir: self.path("units"),
                template_path: self.path("unit.template"),
                supervisorctl: SUPERVISORCTL.into(),
            },
            self.exec.clone(),
        );
        Dispatcher::new(self.secrets.clone(), pki, registrar, self.exec.clone())
    }
}

fn explicit_env(spec: &CommandSpec) -> &TaskEnv {
    match &spec.env {
        EnvPolicy::Explicit(env) => env,
        EnvPolicy::Inherit => panic!("job {} inherits the environment", spec.label),
    }
}

#[tokio::test]
async fn job_then_server_end_to_end() {
    let h = Harness::new();
    let mut seq = BootSequence::from_yaml(
        r#"
kind: cvm
cvmAssistants:
  - name: greet
    type: job
    entrypoint: /bin/echo
    args: ["hello"]
app:
  - name: web
    type: server
    entrypoint: /bin/webapp
    args: ["--port", "80"]
    env: { MODE: prod }
"#,
    )
    .unwrap();

    let outcome = h.dispatcher().run(&mut seq).await.unwrap();

    assert_eq!(outcome, BootOutcome::Completed);
    let jobs = h.exec.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].program, PathBuf::from("/bin/echo"));
    assert_eq!(jobs[0].args, vec!["hello"]);
    assert_eq!(jobs[0].label, "greet");

    let unit = fs::read_to_string(h.path("units/web.ini")).unwrap();
    assert!(unit.contains("command=/bin/webapp --port 80"));
    assert!(unit.contains("environment=MODE=prod"));
    assert!(unit.contains("priority=2"));
    assert_eq!(seq.application[0].priority, Some(2));

    assert_eq!(
        h.exec.control_calls(),
        vec![vec!["update".to_string()], vec!["start".into(), "web".into()]]
    );
}

#[tokio::test]
async fn server_priority_follows_list_index() {
    let h = Harness::new();
    let mut seq = BootSequence::from_yaml(
        r#"
cvmAssistants:
  - name: prepare
    type: job
    entrypoint: /bin/true
  - name: sidecar
    type: server
    entrypoint: /opt/sidecar/run
"#,
    )
    .unwrap();

    h.dispatcher().run(&mut seq).await.unwrap();

    let unit = fs::read_to_string(h.path("units/sidecar.ini")).unwrap();
    assert!(unit.contains("priority=3"));
    assert!(unit.contains("directory=/opt/sidecar"));
    assert_eq!(seq.assistants[0].priority, None);
}

#[tokio::test]
async fn job_env_is_secrets_then_task_env() {
    let h = Harness::new();
    h.secrets.put("TOKEN", "s3cr3t");
    h.secrets.put("API_KEY", "k");
    h.secrets.put("MODE", "from-secret");
    let mut seq = BootSequence::from_yaml(
        r#"
cvmAssistants:
  - name: migrate
    type: job
    entrypoint: /bin/migrate
    env: { MODE: from-task, RETRIES: 3 }
"#,
    )
    .unwrap();

    h.dispatcher().run(&mut seq).await.unwrap();

    let jobs = h.exec.jobs();
    let env = explicit_env(&jobs[0]);
    assert_eq!(
        env.joined(","),
        "API_KEY=k,MODE=from-secret,TOKEN=s3cr3t,MODE=from-task,RETRIES=3"
    );
    assert_eq!(env.get("MODE"), Some("from-task"));
}

#[tokio::test]
async fn server_unit_never_contains_secrets() {
    let h = Harness::new();
    h.secrets.put("TOKEN", "s3cr3t");
    let mut seq = BootSequence::from_yaml(
        r#"
app:
  - name: web
    type: server
    entrypoint: /bin/webapp
    env: { MODE: prod }
"#,
    )
    .unwrap();

    h.dispatcher().run(&mut seq).await.unwrap();

    let unit = fs::read_to_string(h.path("units/web.ini")).unwrap();
    assert!(!unit.contains("s3cr3t"));
    assert!(!unit.contains("TOKEN"));
}

#[tokio::test]
async fn docker_app_replaces_image_with_merged_env() {
    let h = Harness::new();
    h.secrets.put("TOKEN", "s3cr3t");
    let mut seq = BootSequence::from_yaml(
        r#"
app:
  - name: main
    type: dockerApp
    entrypoint: /app/run
    args: ["serve"]
    env: { MODE: prod }
"#,
    )
    .unwrap();

    let err = h.dispatcher().run(&mut seq).await.unwrap_err();

    assert_eq!(err.task, "main");
    assert_eq!(err.step, Step::Replace);
    assert!(matches!(err.source, CoreError::Exec(ExecError::Replace(_))));

    let images = h.exec.images.lock().unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].program, PathBuf::from("/app/run"));
    assert_eq!(images[0].args, vec!["serve"]);
    assert_eq!(images[0].env.joined(","), "TOKEN=s3cr3t,MODE=prod");
}

#[tokio::test]
async fn unsupported_kind_stops_the_sequence() {
    let h = Harness::new();
    let mut seq = BootSequence::from_yaml(
        r#"
cvmAssistants:
  - name: odd
    type: cron
    entrypoint: /bin/odd
  - name: after
    type: job
    entrypoint: /bin/true
"#,
    )
    .unwrap();

    let err = h.dispatcher().run(&mut seq).await.unwrap_err();

    assert_eq!(err.task, "odd");
    assert_eq!(err.step, Step::Dispatch);
    assert!(matches!(err.source, CoreError::UnsupportedKind(ref k) if k == "cron"));
    assert!(h.exec.runs().is_empty());
}

#[tokio::test]
async fn malformed_env_fails_at_dispatch() {
    let h = Harness::new();
    let mut seq = BootSequence::from_yaml(
        r#"
cvmAssistants:
  - name: broken
    type: job
    entrypoint: /bin/true
    env: ["not", "a", "map"]
"#,
    )
    .unwrap();

    let err = h.dispatcher().run(&mut seq).await.unwrap_err();

    assert_eq!(err.step, Step::Env);
    assert!(matches!(
        err.source,
        CoreError::Model(ModelError::UserEnvFormat { .. })
    ));
    assert!(h.exec.runs().is_empty());
}

#[tokio::test]
async fn tls_is_provisioned_before_the_job() {
    let h = Harness::new();
    let cert_dir = h.path("certs/api");
    let yaml = format!(
        r#"
cvmAssistants:
  - name: api
    type: job
    entrypoint: /bin/true
    tls:
      certPath: {}
      commonName: api.local
"#,
        cert_dir.display()
    );
    let mut seq = BootSequence::from_yaml(&yaml).unwrap();

    h.dispatcher().run(&mut seq).await.unwrap();

    assert!(h.path("pki/existed").is_file());
    assert!(cert_dir.join("server.crt").is_file());
    assert!(cert_dir.join("existed").is_file());
    assert_eq!(h.exec.jobs().len(), 1);
}

#[tokio::test]
async fn cancelled_token_skips_remaining_tasks() {
    let h = Harness::new();
    let mut seq = BootSequence::from_yaml(
        r#"
cvmAssistants:
  - name: first
    type: job
    entrypoint: /bin/true
app:
  - name: web
    type: server
    entrypoint: /bin/webapp
"#,
    )
    .unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = h
        .dispatcher()
        .with_cancel(cancel)
        .run(&mut seq)
        .await
        .unwrap();

    assert_eq!(outcome, BootOutcome::Cancelled);
    assert!(h.exec.runs().is_empty());
    assert!(!h.path("units").exists());
}
