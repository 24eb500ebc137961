use bytes::Bytes;
use tokio::time::Duration;
use tonic::codegen::http::uri;

/// LeaseId identifies a TTL lease. Keys attached to a lease vanish when it expires.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LeaseId(pub i64);

/// KeyValue is one stored key at the revision it was read.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValue {
    pub key: String,
    pub value: Bytes,
    pub create_revision: i64,
    pub mod_revision: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created { revision: i64 },
    Exists(KeyValue),
}

/// CoordinationStore is a linearizable, revisioned key-value store. Every successful write
/// bumps a store-wide revision, and a key's `mod_revision` is the revision of its last write.
#[async_trait::async_trait]
pub trait CoordinationStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<KeyValue>, CoordinationError>;

    /// All keys starting with `prefix`, ordered by key.
    async fn get_prefix(&self, prefix: &str) -> Result<Vec<KeyValue>, CoordinationError>;

    /// Writes `value` only if `key` does not exist. When it does exist the current value is
    /// returned instead.
    async fn create(
        &self,
        key: &str,
        value: Bytes,
        lease: Option<LeaseId>,
    ) -> Result<CreateOutcome, CoordinationError>;

    /// Writes `value` only if the key's current `mod_revision` equals `expected_mod_revision`.
    async fn compare_and_swap(
        &self,
        key: &str,
        value: Bytes,
        expected_mod_revision: i64,
    ) -> Result<bool, CoordinationError>;

    /// Returns false if the key did not exist.
    async fn delete(&self, key: &str) -> Result<bool, CoordinationError>;

    /// Returns the number of deleted keys.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CoordinationError>;

    /// Deletes the key only if its current `mod_revision` equals `mod_revision`.
    async fn compare_and_delete(&self, key: &str, mod_revision: i64) -> Result<bool, CoordinationError>;

    async fn grant_lease(&self, ttl: Duration) -> Result<LeaseId, CoordinationError>;

    async fn revoke_lease(&self, lease: LeaseId) -> Result<(), CoordinationError>;

    /// Blocks until `key` is deleted (explicitly or by lease expiry) at a revision greater
    /// than `after_revision`. Returns immediately if the key is already gone.
    async fn wait_for_delete(&self, key: &str, after_revision: i64) -> Result<(), CoordinationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinationError {
    #[error("Invalid coordination store endpoint")]
    InvalidEndpoint(#[from] uri::InvalidUri),
    #[error("No coordination store endpoints configured")]
    NoEndpoints,
    #[error("Coordination store RPC failed: {0}")]
    Rpc(#[from] tonic::Status),
    #[error("Lease {0:?} not found")]
    LeaseNotFound(LeaseId),
    #[error("Lease grant rejected: {0}")]
    LeaseRejected(String),
    #[error("Watch canceled by server: {0}")]
    WatchCanceled(String),
    #[error("Watch stream closed")]
    WatchClosed,
}
