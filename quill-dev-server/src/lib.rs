//! Development server: builds the site, serves the output and rebuilds it
//! whenever the sources change.

pub mod handler;
pub mod watch;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};
use quill_core::Config;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

pub use handler::router;
pub use watch::{ChangeKind, DEBOUNCE, should_rebuild};

/// How long in-flight requests get to finish once shutdown starts.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the development server
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Site to build and serve
    pub site: Config,
    /// Address to listen on
    pub addr: SocketAddr,
    /// Open the site in a browser once listening
    pub open: bool,
}

/// A rebuilding static file server
pub struct DevServer {
    config: DevServerConfig,
    ready: Option<oneshot::Sender<SocketAddr>>,
}

impl DevServer {
    pub fn new(config: DevServerConfig) -> Self {
        Self {
            config,
            ready: None,
        }
    }

    /// Reports the bound address once the server accepts connections.
    pub fn with_ready(mut self, ready: oneshot::Sender<SocketAddr>) -> Self {
        self.ready = Some(ready);
        self
    }

    /// Runs until `token` is cancelled.
    pub async fn run(self, token: CancellationToken) -> Result<()> {
        let site = Arc::new(self.config.site);

        // A broken site should not keep the server from starting.
        let initial = Arc::clone(&site);
        if let Err(e) = tokio::task::spawn_blocking(move || quill_core::build(&initial)).await? {
            error!("Initial build failed: {e}");
        }

        let watcher = watch::SourceWatcher::new(&site.source_dirs())?;

        let listener = TcpListener::bind(self.config.addr)
            .await
            .with_context(|| format!("failed to listen on {}", self.config.addr))?;
        let addr = listener.local_addr()?;
        info!("Serving {} at http://{addr}", site.dst.display());

        if let Some(ready) = self.ready {
            let _ = ready.send(addr);
        }

        if self.config.open {
            if let Err(e) = open::that(format!("http://{addr}")) {
                warn!("Failed to open browser: {e}");
            }
        }

        let rebuild_site = Arc::clone(&site);
        let watch_task = tokio::spawn(watch::debounce(watcher, token.child_token(), move || {
            if let Err(e) = quill_core::build(&rebuild_site) {
                error!("Build failed: {e}");
            }
        }));

        let shutdown = token.clone();
        let mut server = tokio::spawn(
            axum::serve(listener, router(site.dst.clone()))
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .into_future(),
        );

        tokio::select! {
            res = &mut server => {
                token.cancel();
                watch_task.await?;
                return Ok(res??);
            }
            _ = token.cancelled() => {}
        }

        info!("Shutting down");
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut server).await {
            Ok(res) => res??,
            Err(_) => {
                warn!("Connections still open after {SHUTDOWN_TIMEOUT:?}, giving up");
                server.abort();
            }
        }
        watch_task.await?;

        Ok(())
    }
}
