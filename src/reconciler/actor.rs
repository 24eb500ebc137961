use crate::reconciler::{Event, Reconciler};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub fn create(
    logger: slog::Logger,
    buffer_size: usize,
    reconciler: Arc<Reconciler>,
    shutdown: CancellationToken,
) -> (ReconcilerClient, ReconcilerActor) {
    let (tx, rx) = mpsc::channel(buffer_size);
    let client = ReconcilerClient { sender: tx };
    let actor = ReconcilerActor {
        logger,
        receiver: rx,
        reconciler,
        shutdown,
    };

    (client, actor)
}

#[derive(Debug, thiserror::Error)]
pub enum EventQueueError {
    #[error("Reconciler event loop has stopped")]
    Stopped,
}

/// Producers' handle to the event queue. Sending waits while the queue is full.
#[derive(Clone)]
pub struct ReconcilerClient {
    sender: mpsc::Sender<Event>,
}

impl ReconcilerClient {
    pub async fn send(&self, event: Event) -> Result<(), EventQueueError> {
        self.sender.send(event).await.map_err(|_| EventQueueError::Stopped)
    }
}

/// ReconcilerActor drains the queue one event at a time, in arrival order.
pub struct ReconcilerActor {
    logger: slog::Logger,
    receiver: mpsc::Receiver<Event>,
    reconciler: Arc<Reconciler>,
    shutdown: CancellationToken,
}

impl ReconcilerActor {
    pub async fn run_event_loop(mut self) {
        slog::info!(self.logger, "Reconciler event loop started");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    slog::info!(self.logger, "Reconciler event loop shutting down");
                    break;
                }
                event = self.receiver.recv() => match event {
                    Some(event) => self.reconciler.handle(event).await,
                    None => {
                        slog::info!(self.logger, "All event producers are gone");
                        break;
                    }
                },
            }
        }
        self.reconciler.stop_plugins().await;
    }
}
