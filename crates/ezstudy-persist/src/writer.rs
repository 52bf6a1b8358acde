use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{PersistError, Result};
use crate::snapshot::SessionSnapshot;
use crate::store::KeyValueStore;

/// Timing of the debounced writer.
///
/// A scheduled snapshot is written once no newer one arrived for `debounce`,
/// and never later than `max_delay` after it first became pending. `max_delay`
/// is therefore the longest stretch of changes a crash can lose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterConfig {
    pub debounce: Duration,
    pub max_delay: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            max_delay: Duration::from_secs(2),
        }
    }
}

enum Command {
    Write(SessionSnapshot),
    Flush(oneshot::Sender<Result<()>>),
}

struct Pending {
    snapshot: SessionSnapshot,
    first_at: Instant,
    last_at: Instant,
}

/// Coalesces snapshot writes on a background task (last write wins)
///
/// Dropping the writer closes its queue; the task then writes whatever is
/// still pending and exits.
pub struct SnapshotWriter {
    tx: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<()>,
}

impl SnapshotWriter {
    /// Start the writer task. Must be called inside a tokio runtime.
    pub fn spawn(store: Arc<dyn KeyValueStore>, config: WriterConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(store, config, rx));
        Self { tx, handle }
    }

    /// Queue `snapshot`, replacing any snapshot not yet written
    pub fn schedule(&self, snapshot: SessionSnapshot) {
        if self.tx.send(Command::Write(snapshot)).is_err() {
            tracing::warn!("Snapshot writer is gone, dropping write");
        }
    }

    /// Write the pending snapshot now
    pub async fn flush(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(ack_tx))
            .map_err(|_| PersistError::WriterClosed)?;
        ack_rx.await.map_err(|_| PersistError::WriterClosed)?
    }

    /// Write what is pending and wait for the task to finish
    pub async fn shutdown(self) -> Result<()> {
        let Self { tx, handle } = self;
        drop(tx);
        handle.await.map_err(|_| PersistError::WriterClosed)
    }
}

async fn run(
    store: Arc<dyn KeyValueStore>,
    config: WriterConfig,
    mut rx: mpsc::UnboundedReceiver<Command>,
) {
    let mut pending: Option<Pending> = None;

    loop {
        let deadline = pending
            .as_ref()
            .map(|p| (p.last_at + config.debounce).min(p.first_at + config.max_delay));

        let command = match deadline {
            Some(deadline) => tokio::select! {
                command = rx.recv() => command,
                _ = tokio::time::sleep_until(deadline) => {
                    if let Some(p) = pending.take() {
                        write_logged(store.as_ref(), &p.snapshot).await;
                    }
                    continue;
                }
            },
            None => rx.recv().await,
        };

        match command {
            Some(Command::Write(snapshot)) => {
                let now = Instant::now();
                pending = match pending.take() {
                    // Another namespace is waiting; it must not be overwritten
                    Some(p) if p.snapshot.user_key != snapshot.user_key => {
                        write_logged(store.as_ref(), &p.snapshot).await;
                        Some(Pending { snapshot, first_at: now, last_at: now })
                    }
                    Some(p) => Some(Pending { snapshot, first_at: p.first_at, last_at: now }),
                    None => Some(Pending { snapshot, first_at: now, last_at: now }),
                };
            }
            Some(Command::Flush(ack)) => {
                let result = match pending.take() {
                    Some(p) => p.snapshot.write(store.as_ref()).await,
                    None => Ok(()),
                };
                if let Err(e) = &result {
                    tracing::warn!(error = %e, "Failed to flush session snapshot");
                }
                let _ = ack.send(result);
            }
            None => {
                if let Some(p) = pending.take() {
                    write_logged(store.as_ref(), &p.snapshot).await;
                }
                break;
            }
        }
    }

    tracing::debug!("Snapshot writer stopped");
}

async fn write_logged(store: &dyn KeyValueStore, snapshot: &SessionSnapshot) {
    if let Err(e) = snapshot.write(store).await {
        tracing::warn!(
            user_key = %snapshot.user_key,
            error = %e,
            "Failed to persist session snapshot"
        );
    }
}
