use std::{future::Future, io, net::SocketAddr, sync::Arc, time::Duration};

use apl_api::{HttpApi, SecretStoreAdapter};
use apl_core::{BootOutcome, DispatchError, Dispatcher, Pki, PkiTool, Registrar, SecretStore};
use apl_exec::{Executor, ProcRunner};
use apl_model::{BootSequence, ModelError};
use thiserror::Error;
use tokio::{
    sync::oneshot,
    task::{JoinError, JoinHandle},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{AgentConfig, Listener};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("boot spec: {0}")]
    BootSpec(#[from] ModelError),

    #[error("bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("secret API failed: {0}")]
    Serve(#[source] io::Error),

    #[error("secret API stopped unexpectedly")]
    ServerStopped,

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("{what} task aborted: {source}")]
    Join {
        what: &'static str,
        #[source]
        source: JoinError,
    },
}

type BootResult = Result<Result<BootOutcome, DispatchError>, JoinError>;
type ServeResult = Result<io::Result<()>, JoinError>;

enum Wake {
    Boot(BootResult),
    Server(ServeResult),
    Signal,
}

/// The orchestrator: secret API plus the boot dispatcher, bounded by process signals.
pub struct Application {
    cfg: AgentConfig,
    executor: Arc<dyn Executor>,
    ready: Option<oneshot::Sender<SocketAddr>>,
}

impl Application {
    pub fn new(cfg: AgentConfig) -> Self {
        Self::with_executor(cfg, Arc::new(ProcRunner::new()))
    }

    /// Use `executor` for every process the boot sequence starts.
    pub fn with_executor(cfg: AgentConfig, executor: Arc<dyn Executor>) -> Self {
        Self {
            cfg,
            executor,
            ready: None,
        }
    }

    /// Report the bound API address once the listener accepts connections.
    pub fn on_ready(mut self, tx: oneshot::Sender<SocketAddr>) -> Self {
        self.ready = Some(tx);
        self
    }

    /// Run until the boot sequence ends or SIGINT/SIGTERM arrives.
    pub async fn run(self) -> Result<(), AppError> {
        self.run_until(shutdown_signal()).await
    }

    /// Like [`Application::run`], with `stop` standing in for the process signals.
    pub async fn run_until<F>(mut self, stop: F) -> Result<(), AppError>
    where
        F: Future<Output = ()>,
    {
        let timeout = self.cfg.shutdown_timeout;

        // 1) Boot spec
        let mut seq = BootSequence::load(&self.cfg.boot_spec)?;
        info!(
            target: "apl.loaderd",
            path = %self.cfg.boot_spec.display(),
            assistants = seq.assistants.len(),
            app = seq.application().map(|t| t.name.as_str()).unwrap_or("-"),
            "boot spec loaded"
        );

        // 2) Shared state + dispatcher
        let secrets = SecretStore::new();
        let cancel = CancellationToken::new();
        let issuer = PkiTool::new(&self.cfg.pki_tool, self.executor.clone());
        let dispatcher = Dispatcher::new(
            secrets.clone(),
            Pki::new(self.cfg.pki(), Arc::new(issuer)),
            Registrar::new(self.cfg.registrar(), self.executor.clone()),
            self.executor.clone(),
        )
        .with_cancel(cancel.clone());

        // 3) Secret API
        let router = HttpApi::new(Arc::new(SecretStoreAdapter::new(secrets))).router();
        let addr = self.cfg.listen;
        let listener = Listener::bind(addr, router)
            .await
            .map_err(|source| AppError::Bind { addr, source })?;
        let server_stop = CancellationToken::new();
        let (ready_tx, ready_rx) = oneshot::channel();
        let mut server = tokio::spawn(listener.serve(ready_tx, server_stop.clone()));

        let Ok(bound) = ready_rx.await else {
            return Err(serve_failure(server.await));
        };
        info!(target: "apl.loaderd", addr = %bound, "secret API ready");
        if let Some(tx) = self.ready.take() {
            let _ = tx.send(bound);
        }

        // 4) Boot sequence
        let mut boot = tokio::spawn(async move { dispatcher.run(&mut seq).await });

        // 5) Wait for whichever ends first
        tokio::pin!(stop);
        let wake = tokio::select! {
            res = &mut boot => Wake::Boot(res),
            res = &mut server => Wake::Server(res),
            _ = &mut stop => Wake::Signal,
        };

        match wake {
            Wake::Boot(res) => {
                let outcome = boot_result(res);
                let stopped = stop_server(server, &server_stop, timeout).await;
                outcome.and(stopped)
            }
            Wake::Signal => {
                info!(target: "apl.loaderd", "shutdown requested; boot sequence stops after the running task");
                cancel.cancel();
                let stopped = stop_server(server, &server_stop, timeout).await;
                let outcome = drain_boot(boot, timeout).await;
                outcome.and(stopped)
            }
            Wake::Server(res) => {
                cancel.cancel();
                let err = serve_failure(res);
                error!(target: "apl.loaderd", error = %err, "secret API terminated");
                let _ = drain_boot(boot, timeout).await;
                Err(err)
            }
        }
    }
}

fn boot_result(res: BootResult) -> Result<(), AppError> {
    match res {
        Ok(Ok(BootOutcome::Completed)) => {
            info!(target: "apl.loaderd", "boot sequence completed; exiting");
            Ok(())
        }
        Ok(Ok(BootOutcome::Cancelled)) => {
            info!(target: "apl.loaderd", "boot sequence cancelled");
            Ok(())
        }
        Ok(Err(e)) => {
            error!(target: "apl.loaderd", task = %e.task, step = %e.step, error = %e.source, "boot sequence failed");
            Err(e.into())
        }
        Err(source) => Err(AppError::Join {
            what: "boot",
            source,
        }),
    }
}

async fn drain_boot(
    mut boot: JoinHandle<Result<BootOutcome, DispatchError>>,
    timeout: Duration,
) -> Result<(), AppError> {
    match tokio::time::timeout(timeout, &mut boot).await {
        Ok(res) => boot_result(res),
        Err(_) => {
            warn!(target: "apl.loaderd", ?timeout, "running task did not finish in time; abandoning it");
            boot.abort();
            Ok(())
        }
    }
}

async fn stop_server(
    mut server: JoinHandle<io::Result<()>>,
    stop: &CancellationToken,
    timeout: Duration,
) -> Result<(), AppError> {
    stop.cancel();
    match tokio::time::timeout(timeout, &mut server).await {
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(res) => Err(serve_failure(res)),
        Err(_) => {
            warn!(target: "apl.loaderd", ?timeout, "secret API did not drain in time; forcing shutdown");
            server.abort();
            Ok(())
        }
    }
}

fn serve_failure(res: ServeResult) -> AppError {
    match res {
        Ok(Ok(())) => AppError::ServerStopped,
        Ok(Err(e)) => AppError::Serve(e),
        Err(source) => AppError::Join {
            what: "server",
            source,
        },
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(target: "apl.loaderd", error = %e, "cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(target: "apl.loaderd", error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(target: "apl.loaderd", "received SIGINT"),
        _ = terminate => info!(target: "apl.loaderd", "received SIGTERM"),
    }
}
