//! Shutdown coordination for the bot's background tasks.

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Coordinator for graceful shutdown.
///
/// The sweeper, the admin server and the dispatcher watcher each hold a
/// receiver and return once the signal fires.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal. Safe to call more than once.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of tasks still subscribed.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Wait for `tasks` to finish, giving up after `deadline`.
    ///
    /// Returns `true` if every task finished in time.
    pub async fn drain(&self, tasks: Vec<JoinHandle<()>>, deadline: Duration) -> bool {
        let count = tasks.len();
        let join_all = async {
            for task in tasks {
                if let Err(e) = task.await {
                    tracing::error!(error = %e, "Background task panicked during shutdown");
                }
            }
        };

        match tokio::time::timeout(deadline, join_all).await {
            Ok(()) => {
                tracing::debug!(tasks = count, "All background tasks stopped");
                true
            }
            Err(_) => {
                tracing::warn!(
                    deadline_secs = deadline.as_secs(),
                    remaining = self.receiver_count(),
                    "Background tasks did not stop before the deadline"
                );
                false
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
