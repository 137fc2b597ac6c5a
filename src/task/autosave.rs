#![forbid(unsafe_code)]

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::task::storage::PersistenceGateway;

#[derive(Debug)]
enum Job {
    Save(String),
    Flush(oneshot::Sender<()>),
}

/// Background writer that hands full-list snapshots to the gateway one at a
/// time, in the order they were enqueued.
#[derive(Debug, Clone)]
pub struct Autosave {
    tx: mpsc::UnboundedSender<Job>,
}

impl Autosave {
    /// Starts the writer on the current tokio runtime.
    #[must_use]
    pub fn spawn(gateway: Arc<dyn PersistenceGateway>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(gateway, rx));
        Self { tx }
    }

    pub fn enqueue(&self, blob: String) {
        if self.tx.send(Job::Save(blob)).is_err() {
            tracing::error!("autosave writer is gone; snapshot dropped");
        }
    }

    /// Resolves once every snapshot enqueued before this call has been
    /// attempted.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Job::Flush(done_tx)).is_err() {
            return;
        }
        let _ = done_rx.await;
    }
}

async fn run(gateway: Arc<dyn PersistenceGateway>, mut rx: mpsc::UnboundedReceiver<Job>) {
    let mut attempts = 0u64;
    while let Some(job) = rx.recv().await {
        match job {
            Job::Save(blob) => {
                attempts += 1;
                let bytes = blob.len();
                match gateway.save(blob).await {
                    Ok(()) => tracing::debug!(attempt = attempts, bytes, "tasks saved"),
                    Err(e) => tracing::error!(attempt = attempts, error = %e, "failed to save tasks"),
                }
            }
            Job::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::debug!(attempts, "autosave writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::storage::MemoryGateway;

    #[tokio::test]
    async fn saves_in_order_and_last_snapshot_wins() {
        let gw = MemoryGateway::new();
        let autosave = Autosave::spawn(Arc::new(gw.clone()));

        for n in 0..5 {
            autosave.enqueue(format!("[{n}]"));
        }
        autosave.flush().await;

        assert_eq!(gw.saves(), vec!["[0]", "[1]", "[2]", "[3]", "[4]"]);
        assert_eq!(gw.current().as_deref(), Some("[4]"));
    }

    #[tokio::test]
    async fn failed_save_does_not_stop_the_writer() {
        let gw = MemoryGateway::new();
        let autosave = Autosave::spawn(Arc::new(gw.clone()));

        gw.set_fail_save(true);
        autosave.enqueue("[1]".to_owned());
        autosave.flush().await;
        gw.set_fail_save(false);
        autosave.enqueue("[2]".to_owned());
        autosave.flush().await;

        assert_eq!(gw.save_count(), 2);
        assert_eq!(gw.current().as_deref(), Some("[2]"));
    }
}
