//! Background execution loop
//!
//! One dedicated thread runs a single-threaded tokio runtime for all
//! agent-invocation and server-management futures. Serving threads (web,
//! Telegram) never drive those futures themselves; they submit work here
//! and block with an explicit ceiling. Timeouts fire at the submitting
//! side, so a hung future cannot stop the loop from servicing other
//! submissions.

use std::future::Future;
use std::sync::mpsc::{sync_channel, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::runtime;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Why a submitted unit of work produced no value
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The ceiling passed to [`BackgroundLoop::submit`] expired. The
    /// underlying future may still be running; whoever owns its resources
    /// is responsible for closing them.
    #[error("background task timed out")]
    Timeout,

    /// The loop has shut down and can no longer run work.
    #[error("background loop is closed")]
    Closed,
}

/// Handle to the background runtime thread.
///
/// Dropping the handle shuts the loop down; in-flight tasks are dropped
/// with the runtime.
pub struct BackgroundLoop {
    handle: runtime::Handle,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl BackgroundLoop {
    /// Spawn the runtime thread. The loop parks on a shutdown signal while
    /// servicing everything spawned onto its handle.
    pub fn start() -> Result<Self> {
        let rt = runtime::Builder::new_current_thread()
            .enable_all()
            .thread_name("hermit-exec")
            .build()
            .context("failed to build background runtime")?;
        let handle = rt.handle().clone();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let thread = thread::Builder::new()
            .name("hermit-exec".to_string())
            .spawn(move || {
                rt.block_on(async move {
                    // Resolves on shutdown send or when the sender drops.
                    let _ = shutdown_rx.await;
                });
                debug!("Background loop stopped");
            })
            .context("failed to spawn background loop thread")?;

        Ok(Self {
            handle,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// Run a future on the loop and block the calling thread until it
    /// finishes or `timeout` expires.
    pub fn submit<F, T>(&self, future: F, timeout: Duration) -> Result<T, SubmitError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = sync_channel::<T>(1);
        self.handle.spawn(async move {
            // Receiver may have given up already; nothing to do then.
            let _ = tx.send(future.await);
        });

        match rx.recv_timeout(timeout) {
            Ok(value) => Ok(value),
            Err(RecvTimeoutError::Timeout) => {
                warn!("Background task exceeded its {:?} ceiling", timeout);
                Err(SubmitError::Timeout)
            }
            Err(RecvTimeoutError::Disconnected) => Err(SubmitError::Closed),
        }
    }

    /// Fire-and-forget: run a future on the loop without waiting for it.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(future);
    }
}

impl Drop for BackgroundLoop {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
