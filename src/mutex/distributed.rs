use crate::coordination::{CoordinationError, CoordinationStore, CreateOutcome, LeaseId};
use bytes::Bytes;
use std::sync::Arc;
use tokio::time::Duration;

/// DistributedMutex serializes work on one shared resource across every control-plane
/// instance using the same coordination store.
///
/// The lock key holds the holder id and is bound to a lease, so a crashed holder releases the
/// lock once its TTL runs out.
pub struct DistributedMutex {
    logger: slog::Logger,
    store: Arc<dyn CoordinationStore>,
    key: String,
    ttl: Duration,
    max_attempts: u32,
    holder_id: String,
    held: Option<Held>,
}

struct Held {
    lease: LeaseId,
    revision: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("Coordination store failure: {0}")]
    Store(#[from] CoordinationError),
    #[error("Gave up acquiring lock '{key}' after {attempts} attempts")]
    Exhausted { key: String, attempts: u32 },
    #[error("Lock '{0}' is already held by this mutex")]
    AlreadyHeld(String),
}

impl DistributedMutex {
    pub fn new(
        logger: slog::Logger,
        store: Arc<dyn CoordinationStore>,
        key: String,
        ttl: Duration,
        max_attempts: u32,
    ) -> Self {
        let holder_id = format!("{:032x}", rand::random::<u128>());
        let logger = logger.new(slog::o!("Lock" => key.clone()));

        DistributedMutex {
            logger,
            store,
            key,
            ttl,
            max_attempts,
            holder_id,
            held: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn lock(&mut self) -> Result<(), LockError> {
        if self.held.is_some() {
            return Err(LockError::AlreadyHeld(self.key.clone()));
        }

        for attempt in 1..=self.max_attempts {
            let lease = self.store.grant_lease(self.ttl).await?;
            let outcome = self
                .store
                .create(&self.key, Bytes::from(self.holder_id.clone()), Some(lease))
                .await;

            let current = match outcome {
                Ok(CreateOutcome::Created { revision }) => {
                    self.held = Some(Held { lease, revision });
                    return Ok(());
                }
                Ok(CreateOutcome::Exists(current)) => current,
                Err(e) => {
                    self.revoke_quietly(lease).await;
                    return Err(e.into());
                }
            };

            // Lease was never attached to anything.
            self.revoke_quietly(lease).await;

            slog::debug!(
                self.logger,
                "Lock held by {}, waiting for release (attempt {}/{})",
                String::from_utf8_lossy(&current.value),
                attempt,
                self.max_attempts
            );
            let wait = self.store.wait_for_delete(&self.key, current.mod_revision);
            match tokio::time::timeout(self.ttl, wait).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => slog::warn!(self.logger, "Timed out waiting for lock release"),
            }
        }

        slog::error!(self.logger, "Gave up acquiring lock after {} attempts", self.max_attempts);
        Err(LockError::Exhausted {
            key: self.key.clone(),
            attempts: self.max_attempts,
        })
    }

    /// Releasing a lock that is not held, or that expired and was taken by someone else, is
    /// not an error.
    pub async fn unlock(&mut self) -> Result<(), LockError> {
        let held = match self.held.take() {
            Some(held) => held,
            None => return Ok(()),
        };

        let deleted = self.store.compare_and_delete(&self.key, held.revision).await?;
        if !deleted {
            slog::warn!(self.logger, "Lock expired before it was released");
        }
        self.revoke_quietly(held.lease).await;

        Ok(())
    }

    async fn revoke_quietly(&self, lease: LeaseId) {
        if let Err(e) = self.store.revoke_lease(lease).await {
            slog::debug!(self.logger, "Failed to revoke lease {:?}: {}", lease, e);
        }
    }
}
