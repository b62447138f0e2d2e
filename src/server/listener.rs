use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::server::handler::Handler;
use crate::server::session::Session;
use crate::server::stats::Reporter;

/// Accepts connections and hands each one to its own detached session task.
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Resolves `addr` and binds to the first address it yields.
    pub async fn bind(addr: &str) -> anyhow::Result<Self> {
        let endpoint = tokio::net::lookup_host(addr)
            .await
            .with_context(|| format!("failed to resolve {}", addr))?
            .next()
            .with_context(|| format!("{} resolved to no addresses", addr))?;

        let inner = TcpListener::bind(endpoint)
            .await
            .with_context(|| format!("failed to bind {}", endpoint))?;
        let local_addr = inner.local_addr()?;

        info!(address = %local_addr, "Listening");

        Ok(Self { inner, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Runs the accept loop until `shutdown` flips to true (or its sender
    /// goes away) or accept fails.
    ///
    /// Sessions are not tracked: they keep running after this returns and
    /// end with the runtime that owns them.
    pub async fn run<H, R>(
        self,
        handler: Arc<H>,
        reporter: Arc<R>,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()>
    where
        H: Handler,
        R: Reporter,
    {
        loop {
            let stopping = *shutdown.borrow_and_update();
            if stopping {
                break;
            }

            let accepted = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                res = self.inner.accept() => res,
            };

            let (socket, peer) = accepted.context("failed to accept connection")?;
            debug!(peer = %peer, "Accepted connection");

            let handler = Arc::clone(&handler);
            let reporter = Arc::clone(&reporter);
            tokio::spawn(async move {
                let session = Session::with_reporter(socket, handler, reporter, Some(peer));
                if let Err(e) = session.run().await {
                    error!("Session error from {}: {:#}", peer, e);
                }
            });
        }

        info!(address = %self.local_addr, "Listener stopped");
        Ok(())
    }
}
