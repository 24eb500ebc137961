use crate::intake::{DomainBinding, DomainIntake};
use crate::reconciler::{Event, EventMethod, EventQueueError, Reconciler, ReconcilerClient};
use crate::store::VersionedStore;
use crate::sync::{ResourceAuthority, StartupSync, SyncError};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Entrance is a running control plane instance.
pub struct Entrance {
    logger: slog::Logger,
    client: ReconcilerClient,
    domains: DomainIntake,
    store: Arc<VersionedStore>,
    reconciler: Arc<Reconciler>,
    shutdown: CancellationToken,
    event_loop: JoinHandle<()>,
}

impl Entrance {
    pub(super) fn new(
        logger: slog::Logger,
        client: ReconcilerClient,
        domains: DomainIntake,
        store: Arc<VersionedStore>,
        reconciler: Arc<Reconciler>,
        shutdown: CancellationToken,
        event_loop: JoinHandle<()>,
    ) -> Self {
        Entrance {
            logger,
            client,
            domains,
            store,
            reconciler,
            shutdown,
            event_loop,
        }
    }

    /// A sender for producers that run on their own tasks.
    pub fn client(&self) -> ReconcilerClient {
        self.client.clone()
    }

    pub fn store(&self) -> &Arc<VersionedStore> {
        &self.store
    }

    pub async fn send(&self, event: Event) -> Result<(), EventQueueError> {
        self.client.send(event).await
    }

    pub async fn submit_domain(&self, method: EventMethod, binding: &DomainBinding) -> Result<(), EventQueueError> {
        self.domains.submit(&self.client, method, binding).await
    }

    /// Deletes whatever the authority no longer backs. Returns the number of deletes queued.
    pub async fn startup_sync(&self, authority: Arc<dyn ResourceAuthority>) -> Result<usize, SyncError> {
        let sync = StartupSync::new(
            self.logger.new(slog::o!("Component" => "StartupSync")),
            self.store.clone(),
            authority,
        );
        sync.run(&self.client).await
    }

    pub async fn report_plugin_status(&self) -> bool {
        self.reconciler.report_plugin_status().await
    }

    pub fn plugin_errors(&self) -> u64 {
        self.reconciler.plugin_errors()
    }

    /// Stops the event loop once the event in progress is done. Queued events are dropped.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.event_loop.await {
            slog::error!(self.logger, "Reconciler event loop panicked: {}", e);
        }
    }
}
