use crate::object::Source;
use crate::reconciler::{Event, EventQueueError, ReconcilerClient};
use crate::store::{StoreError, VersionedStore};
use std::error::Error;
use std::sync::Arc;

pub type AuthorityError = Box<dyn Error + Send + Sync>;

/// The external system (e.g. the Kubernetes API) that owns the resources stored objects were
/// derived from.
#[async_trait::async_trait]
pub trait ResourceAuthority: Send + Sync {
    /// Whether `source` still corresponds to a live resource of the same version.
    async fn is_current(&self, source: &Source) -> Result<bool, AuthorityError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Failed to read stored objects: {0}")]
    Store(#[from] StoreError),
    #[error("Failed to queue delete: {0}")]
    Queue(#[from] EventQueueError),
}

/// StartupSync repairs drift accumulated while this instance was down by deleting stored
/// objects the authority no longer knows about.
pub struct StartupSync {
    logger: slog::Logger,
    store: Arc<VersionedStore>,
    authority: Arc<dyn ResourceAuthority>,
}

impl StartupSync {
    pub fn new(logger: slog::Logger, store: Arc<VersionedStore>, authority: Arc<dyn ResourceAuthority>) -> Self {
        StartupSync {
            logger,
            store,
            authority,
        }
    }

    /// Delete events for every stale object: nodes first, then virtual services, then pools,
    /// so a pool is only deleted once its members are gone.
    pub async fn stale_events(&self) -> Result<Vec<Event>, SyncError> {
        let mut candidates: Vec<Source> = vec![];
        candidates.extend(self.store.get_all_nodes().await?.into_iter().map(Source::from));
        candidates.extend(
            self.store
                .get_all_virtual_services()
                .await?
                .into_iter()
                .map(Source::from),
        );
        candidates.extend(self.store.get_all_pools().await?.into_iter().map(Source::from));

        let mut events = vec![];
        for source in candidates {
            match self.authority.is_current(&source).await {
                Ok(true) => {}
                Ok(false) => {
                    slog::info!(self.logger, "Stored {} '{}' is stale", source.kind(), source.name());
                    events.push(Event::delete(source));
                }
                // Unknown is not stale.
                Err(e) => slog::warn!(
                    self.logger,
                    "Cannot verify {} '{}', keeping it: {}",
                    source.kind(),
                    source.name(),
                    e
                ),
            }
        }

        Ok(events)
    }

    /// Queues the stale deletes and returns how many there were.
    pub async fn run(&self, client: &ReconcilerClient) -> Result<usize, SyncError> {
        let events = self.stale_events().await?;
        let count = events.len();
        for event in events {
            client.send(event).await?;
        }

        slog::info!(self.logger, "Startup sync queued {} deletes", count);
        Ok(count)
    }
}
