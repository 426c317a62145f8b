use std::io;
#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cancels the shutdown token on SIGINT, SIGTERM or SIGQUIT.
///
/// Listening stops when the handler is dropped.
#[derive(Debug)]
pub struct SignalHandler {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl SignalHandler {
    pub fn install(shutdown: CancellationToken) -> io::Result<Self> {
        let listener = SignalListener::new()?;
        let token = shutdown.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                name = listener.recv() => {
                    info!("Received {name}, initiating graceful shutdown");
                    token.cancel();
                }
            }
        });
        Ok(Self { shutdown, task })
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub async fn wait(&self) {
        self.shutdown.cancelled().await;
    }
}

impl Drop for SignalHandler {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(unix)]
struct SignalListener {
    interrupt: Signal,
    terminate: Signal,
    quit: Signal,
}

#[cfg(unix)]
impl SignalListener {
    fn new() -> io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            quit: signal(SignalKind::quit())?,
        })
    }

    async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.quit.recv() => "SIGQUIT",
        }
    }
}

#[cfg(not(unix))]
struct SignalListener;

#[cfg(not(unix))]
impl SignalListener {
    fn new() -> io::Result<Self> {
        Ok(Self)
    }

    async fn recv(self) -> &'static str {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
        "Ctrl+C"
    }
}
