use crate::coordination::{CoordinationError, CoordinationStore, CreateOutcome};
use crate::mutex::{DistributedMutex, LockError};
use crate::object::{Node, Pool, Rule, RuleProtocol, Source, SourceKind, VirtualService};
use crate::store::envelope::{decode_data, StoredSource};
use crate::store::KeyLayout;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::time::Duration;

// Online-flag writes race only with other flag writes and updates, so a few tries suffice.
const ONLINE_WRITE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub key_prefix: String,
    /// Recorded as the `operation` of every envelope this instance writes.
    pub instance_name: String,
    pub pool_lock_ttl: Duration,
    pub update_lock_ttl: Duration,
    pub lock_attempts: u32,
}

/// Outcome of `VersionedStore::update_source`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UpdateVerdict {
    /// The online flag of the envelope before this update.
    pub was_online: bool,
    /// Whether this instance should apply the update to the backend.
    pub granted: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Coordination store failure: {0}")]
    Coordination(#[from] CoordinationError),
    #[error("Failed to take write lock: {0}")]
    Lock(#[from] LockError),
    #[error("Failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Malformed envelope at '{key}'")]
    Malformed {
        key: String,
        #[source]
        error: serde_json::Error,
    },
    #[error("Key '{0}' not found")]
    NotFound(String),
    #[error("Lost {attempts} consecutive write races on '{key}'")]
    Conflict { key: String, attempts: u32 },
}

/// VersionedStore persists entities in envelopes and arbitrates which instance may apply a
/// change to the backend.
pub struct VersionedStore {
    logger: slog::Logger,
    client: Arc<dyn CoordinationStore>,
    keys: KeyLayout,
    config: StoreConfig,
}

impl VersionedStore {
    pub fn new(logger: slog::Logger, client: Arc<dyn CoordinationStore>, config: StoreConfig) -> Self {
        VersionedStore {
            logger,
            client,
            keys: KeyLayout::new(&config.key_prefix),
            config,
        }
    }

    /// Creates the envelope if the key is absent. `Ok(false)` means another instance already
    /// created it.
    pub async fn add_source(&self, source: &Source) -> Result<bool, StoreError> {
        let key = self.keys.source(source);
        let value = StoredSource::new(source.clone(), &self.config.instance_name, false).encode()?;

        match self.client.create(&key, value, None).await? {
            CreateOutcome::Created { .. } => Ok(true),
            CreateOutcome::Exists(_) => {
                slog::debug!(self.logger, "'{}' already exists, add not granted", key);
                Ok(false)
            }
        }
    }

    /// Replaces an existing envelope if the incoming index is newer and the content differs.
    /// Never creates. A node missing its address is completed from the stored copy.
    pub async fn update_source(&self, source: &mut Source) -> Result<UpdateVerdict, StoreError> {
        let rejected = UpdateVerdict {
            was_online: false,
            granted: false,
        };
        if !self.complete_node_address(source).await? {
            return Ok(rejected);
        }

        let key = self.keys.source(source);
        let mut lock = self.mutex(self.keys.update_lock(&key), self.config.update_lock_ttl);
        lock.lock().await?;
        let verdict = self.update_locked(&key, source).await;
        if let Err(e) = lock.unlock().await {
            slog::warn!(self.logger, "Failed to release write lock for '{}': {}", key, e);
        }

        verdict
    }

    async fn update_locked(&self, key: &str, source: &Source) -> Result<UpdateVerdict, StoreError> {
        let current = match self.client.get(key).await? {
            Some(kv) => kv,
            None => {
                slog::debug!(self.logger, "'{}' does not exist, update not granted", key);
                return Ok(UpdateVerdict {
                    was_online: false,
                    granted: false,
                });
            }
        };
        let stored = self.decode(key, source.kind(), &current.value)?;
        let was_online = stored.is_online;
        let rejected = UpdateVerdict {
            was_online,
            granted: false,
        };

        if source.index() <= stored.index {
            slog::debug!(
                self.logger,
                "'{}' index {} is not newer than stored {}",
                key,
                source.index(),
                stored.index
            );
            return Ok(rejected);
        }
        if same_content(source, &stored.source) {
            slog::debug!(self.logger, "'{}' content unchanged at index {}", key, source.index());
            return Ok(rejected);
        }

        let replacement = StoredSource::new(source.clone(), &self.config.instance_name, was_online);
        let written = self
            .client
            .compare_and_swap(key, replacement.encode()?, current.mod_revision)
            .await?;
        if !written {
            slog::debug!(self.logger, "Lost write race on '{}'", key);
            return Ok(rejected);
        }

        // Only address or readiness changes justify touching a backend node.
        if let (Source::Node(new), Source::Node(old)) = (source, &stored.source) {
            if new.connectivity() == old.connectivity() {
                return Ok(rejected);
            }
        }

        Ok(UpdateVerdict {
            was_online,
            granted: true,
        })
    }

    /// Deletes the envelope. `Ok(false)` means it was already gone. Deleting a pool also drops
    /// the node and rule records filed under it.
    pub async fn delete_source(&self, source: &mut Source) -> Result<bool, StoreError> {
        if !self.complete_node_address(source).await? {
            return Ok(false);
        }

        let key = self.keys.source(source);
        if !self.client.delete(&key).await? {
            slog::debug!(self.logger, "'{}' not found, delete not granted", key);
            return Ok(false);
        }

        if let Source::Pool(pool) = source {
            let mut cascaded = self.client.delete_prefix(&self.keys.nodes_of(&pool.name)).await?;
            for protocol in &[RuleProtocol::Http, RuleProtocol::Https] {
                cascaded += self
                    .client
                    .delete_prefix(&self.keys.rules_of(*protocol, &pool.name))
                    .await?;
            }
            if cascaded > 0 {
                slog::info!(self.logger, "Removed {} records of pool '{}'", cascaded, pool.name);
            }
        }

        Ok(true)
    }

    // Returns false if the node has no address and there is no stored copy to take it from.
    async fn complete_node_address(&self, source: &mut Source) -> Result<bool, StoreError> {
        let key = self.keys.source(source);
        let node = match source {
            Source::Node(node) if !node.has_address() => node,
            _ => return Ok(true),
        };

        match self.read(&key, SourceKind::Node).await {
            Ok(StoredSource {
                source: Source::Node(last_known),
                ..
            }) => {
                if node.host.is_empty() {
                    node.host = last_known.host;
                }
                if node.port == 0 {
                    node.port = last_known.port;
                }
                Ok(true)
            }
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => {
                slog::warn!(self.logger, "Could not recover address of '{}': {}", key, e);
                Ok(true)
            }
        }
    }

    pub async fn get_source(&self, source: &Source) -> Result<Source, StoreError> {
        self.get_stored(source).await.map(|s| s.source)
    }

    /// The envelope, including bookkeeping, for the entity with the same identity as `source`.
    pub async fn get_stored(&self, source: &Source) -> Result<StoredSource, StoreError> {
        self.read(&self.keys.source(source), source.kind()).await
    }

    /// Records whether the entity is applied to its backend. Keeps the stored data and index.
    pub async fn update_source_online(&self, source: &Source, is_online: bool) -> Result<(), StoreError> {
        let key = self.keys.source(source);

        for _ in 0..ONLINE_WRITE_ATTEMPTS {
            let current = self
                .client
                .get(&key)
                .await?
                .ok_or_else(|| StoreError::NotFound(key.clone()))?;
            let mut stored = self.decode(&key, source.kind(), &current.value)?;
            stored.is_online = is_online;
            stored.update_time = chrono::Utc::now().to_rfc3339();
            stored.operation = self.config.instance_name.clone();

            if self
                .client
                .compare_and_swap(&key, stored.encode()?, current.mod_revision)
                .await?
            {
                return Ok(());
            }
        }

        Err(StoreError::Conflict {
            key,
            attempts: ONLINE_WRITE_ATTEMPTS,
        })
    }

    pub async fn get_node_by_pool(&self, pool_name: &str) -> Result<Vec<Node>, StoreError> {
        self.list(&self.keys.nodes_of(pool_name)).await
    }

    pub async fn get_rule_by_pool(&self, protocol: RuleProtocol, pool_name: &str) -> Result<Vec<Rule>, StoreError> {
        self.list(&self.keys.rules_of(protocol, pool_name)).await
    }

    pub async fn get_all_rules(&self, protocol: RuleProtocol) -> Result<Vec<Rule>, StoreError> {
        self.list(&self.keys.rules(protocol)).await
    }

    /// The named pools that exist, in the order given.
    pub async fn get_pools(&self, names: &[String]) -> Result<Vec<Pool>, StoreError> {
        let mut pools = Vec::with_capacity(names.len());
        for name in names {
            let key = self.keys.pool(name);
            match self.read(&key, SourceKind::Pool).await {
                Ok(StoredSource {
                    source: Source::Pool(pool),
                    ..
                }) => pools.push(pool),
                Ok(_) | Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(pools)
    }

    pub async fn get_all_pools(&self) -> Result<Vec<Pool>, StoreError> {
        self.list(&self.keys.pools()).await
    }

    pub async fn get_all_nodes(&self) -> Result<Vec<Node>, StoreError> {
        self.list(&self.keys.nodes()).await
    }

    pub async fn get_all_virtual_services(&self) -> Result<Vec<VirtualService>, StoreError> {
        self.list(&self.keys.virtual_services()).await
    }

    /// The virtual service whose default pool is `pool_name`, if any.
    pub async fn get_vs_by_pool_name(&self, pool_name: &str) -> Result<Option<VirtualService>, StoreError> {
        let all = self.get_all_virtual_services().await?;
        Ok(all.into_iter().find(|vs| vs.default_pool_name == pool_name))
    }

    /// Mutex serializing backend mutations of one pool and its nodes.
    pub fn pool_mutex(&self, pool_name: &str) -> DistributedMutex {
        self.mutex(self.keys.pool_lock(pool_name), self.config.pool_lock_ttl)
    }

    fn mutex(&self, key: String, ttl: Duration) -> DistributedMutex {
        DistributedMutex::new(
            self.logger.clone(),
            self.client.clone(),
            key,
            ttl,
            self.config.lock_attempts,
        )
    }

    async fn read(&self, key: &str, kind: SourceKind) -> Result<StoredSource, StoreError> {
        let kv = self
            .client
            .get(key)
            .await?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        self.decode(key, kind, &kv.value)
    }

    fn decode(&self, key: &str, kind: SourceKind, bytes: &[u8]) -> Result<StoredSource, StoreError> {
        StoredSource::decode(kind, bytes).map_err(|error| StoreError::Malformed {
            key: key.to_string(),
            error,
        })
    }

    // Skips entries that fail to decode; one bad record must not hide the rest.
    async fn list<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>, StoreError> {
        let kvs = self.client.get_prefix(prefix).await?;
        let mut items = Vec::with_capacity(kvs.len());
        for kv in kvs {
            match decode_data::<T>(&kv.value) {
                Ok(item) => items.push(item),
                Err(e) => slog::warn!(self.logger, "Skipping malformed envelope at '{}': {}", kv.key, e),
            }
        }

        Ok(items)
    }
}

// A hash failure on either side counts as different content.
fn same_content(a: &Source, b: &Source) -> bool {
    match (a.hash(), b.hash()) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}
