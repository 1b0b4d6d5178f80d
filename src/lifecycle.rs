//! Cancellable background tasks

use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Handle to a spawned periodic task.
///
/// Stopping signals the task and waits for it, so work already in progress
/// (a flush, a transaction) completes before `stop` returns.
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl TaskHandle {
    /// Spawn `task`, handing it the shutdown receiver it must watch
    pub fn spawn<F, Fut>(name: &'static str, task: F) -> Self
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, rx) = watch::channel(false);
        let join = tokio::spawn(task(rx));
        debug!(task = name, "Background task started");
        Self {
            name,
            shutdown,
            join,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        match self.join.await {
            Ok(()) => debug!(task = self.name, "Background task stopped"),
            Err(e) => warn!(task = self.name, "Background task ended abnormally: {}", e),
        }
    }
}
