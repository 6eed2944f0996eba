use std::{io, net::SocketAddr};

use axum::Router;
use tokio::{net::TcpListener, sync::oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Bound secret API listener.
pub struct Listener {
    inner: TcpListener,
    router: Router,
}

impl Listener {
    pub async fn bind(addr: SocketAddr, router: Router) -> io::Result<Self> {
        let inner = TcpListener::bind(addr).await?;
        Ok(Self { inner, router })
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    ///
    /// `ready` receives the bound address before the first connection is accepted.
    pub async fn serve(
        self,
        ready: oneshot::Sender<SocketAddr>,
        shutdown: CancellationToken,
    ) -> io::Result<()> {
        let addr = self.inner.local_addr()?;
        if ready.send(addr).is_err() {
            debug!(target: "apl.loaderd", "readiness receiver dropped");
        }

        axum::serve(self.inner, self.router)
            .with_graceful_shutdown(async move { shutdown.cancelled_owned().await })
            .await?;

        info!(target: "apl.loaderd", %addr, "listener stopped");
        Ok(())
    }
}
