//! Graceful shutdown coordination
//!
//! One [`ShutdownController`] per process. The HTTP server, the averaging
//! worker and the MQTT ingestor each receive a child token and stop when
//! the controller is cancelled.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Coordinates shutdown across background tasks.
///
/// ```ignore
/// let shutdown = ShutdownController::with_ctrl_c();
///
/// let worker_token = shutdown.child_token();
/// tokio::spawn(async move { worker.run(worker_token).await });
///
/// http_server.run(shutdown.token()).await?;
/// ```
#[derive(Clone)]
pub struct ShutdownController {
    token: CancellationToken,
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownController {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Controller cancelled by Ctrl+C (or SIGTERM on unix).
    pub fn with_ctrl_c() -> Self {
        let controller = Self::new();
        let token = controller.token.clone();

        tokio::spawn(async move {
            match wait_for_signal().await {
                Ok(signal) => {
                    info!(signal, "Received shutdown signal, stopping gracefully");
                    token.cancel();
                }
                Err(e) => {
                    warn!("Failed to listen for shutdown signal: {}", e);
                }
            }
        });

        controller
    }

    /// Token cancelled with this controller; cancelling it leaves the parent running.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Trigger shutdown manually
    pub fn shutdown(&self) {
        info!("Manual shutdown triggered");
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn wait_for_shutdown(&self) {
        self.token.cancelled().await;
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|_| "SIGINT"),
        _ = term.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|_| "ctrl_c")
}

/// Run `future` until it completes or `token` is cancelled.
///
/// Returns `None` if shutdown came first.
pub async fn run_until_shutdown<F, T>(token: CancellationToken, future: F) -> Option<T>
where
    F: std::future::Future<Output = T>,
{
    tokio::select! {
        result = future => Some(result),
        _ = token.cancelled() => None,
    }
}

/// Wait for background tasks to finish, aborting any still running after `grace`.
///
/// Returns the number of tasks that finished on their own.
pub async fn drain_tasks(handles: Vec<(&'static str, JoinHandle<()>)>, grace: Duration) -> usize {
    let mut finished = 0;
    let deadline = tokio::time::Instant::now() + grace;

    for (name, mut handle) in handles {
        match tokio::time::timeout_at(deadline, &mut handle).await {
            Ok(Ok(())) => {
                info!(task = name, "Task stopped");
                finished += 1;
            }
            Ok(Err(e)) => warn!(task = name, error = %e, "Task ended abnormally"),
            Err(_) => {
                warn!(task = name, "Task did not stop in time, aborting");
                handle.abort();
            }
        }
    }

    finished
}
