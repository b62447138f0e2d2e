//! Process-level orchestration: bind, serve, stop on SIGINT/SIGTERM.
//!
//! Shutdown is immediate. Once a signal arrives the listener stops
//! accepting and the runtime is torn down without waiting, so sessions in
//! the middle of a request are abandoned rather than drained.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::server::handler::Handler;
use crate::server::listener::Listener;
use crate::server::stats::{NoReporter, Reporter};

/// The termination signals the runner reacts to, installed up front so a
/// failure to register them is a startup error.
pub struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    /// Must be called from within a tokio runtime.
    #[cfg(unix)]
    pub fn install() -> anyhow::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?,
            terminate: signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> anyhow::Result<Self> {
        Ok(Self {})
    }

    /// Resolves on the first SIGINT or SIGTERM.
    #[cfg(unix)]
    pub async fn recv(mut self) {
        let name = tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        };
        info!(signal = name, "Shutdown signal received");
    }

    #[cfg(not(unix))]
    pub async fn recv(self) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Ctrl-C handler failed");
            std::future::pending::<()>().await;
        }
        info!(signal = "ctrl-c", "Shutdown signal received");
    }
}

/// Serves `listener` until `shutdown` resolves or the accept loop ends.
///
/// When `shutdown` fires the listener is told to stop and this waits for
/// the accept loop to return. Sessions already spawned are left running.
pub async fn serve<H, R, F>(
    listener: Listener,
    handler: H,
    reporter: R,
    shutdown: F,
) -> anyhow::Result<()>
where
    H: Handler,
    R: Reporter,
    F: Future<Output = ()>,
{
    let (stop_tx, stop_rx) = watch::channel(false);

    let accept_loop = listener.run(Arc::new(handler), Arc::new(reporter), stop_rx);
    tokio::pin!(accept_loop);

    tokio::select! {
        res = &mut accept_loop => return res,
        () = shutdown => {}
    }

    let _ = stop_tx.send(true);
    accept_loop.await
}

/// Runs `handler` on `config`'s endpoint until a termination signal,
/// returning the process exit status.
pub fn run<H: Handler>(config: &ServerConfig, handler: H) -> i32 {
    run_with_reporter(config, handler, NoReporter)
}

/// Like [`run`], reporting each finished session's statistics.
pub fn run_with_reporter<H, R>(config: &ServerConfig, handler: H, reporter: R) -> i32
where
    H: Handler,
    R: Reporter,
{
    match try_run(config, handler, reporter) {
        Ok(()) => 0,
        Err(e) => {
            error!("Server failed: {:#}", e);
            -1
        }
    }
}

fn try_run<H, R>(config: &ServerConfig, handler: H, reporter: R) -> anyhow::Result<()>
where
    H: Handler,
    R: Reporter,
{
    let runtime = build_runtime(config.worker_threads)?;
    let addr = config.listen_addr();

    let result = runtime.block_on(async {
        // Installed before binding, so a signal sent once the listening
        // line is out always takes the graceful path.
        let signals = ShutdownSignals::install()?;
        let listener = Listener::bind(&addr).await?;
        serve(listener, handler, reporter, signals.recv()).await
    });

    // Drops every task still queued, including live sessions.
    runtime.shutdown_background();

    result
}

fn build_runtime(worker_threads: usize) -> anyhow::Result<Runtime> {
    let mut builder = if worker_threads > 1 {
        let mut builder = Builder::new_multi_thread();
        builder.worker_threads(worker_threads);
        builder
    } else {
        Builder::new_current_thread()
    };

    builder
        .enable_all()
        .build()
        .context("failed to start runtime")
}
