use crate::coordination::{CoordinationError, CoordinationStore, CreateOutcome, KeyValue, LeaseId};
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio::time::Duration;

// Revisioned map with the same write semantics as etcd. Leases expire on a tokio timer, so
// tests can drive expiry with paused time.
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    // Key of every deleted entry, published after the delete is applied.
    deletes: broadcast::Sender<String>,
}

#[derive(Default)]
struct State {
    revision: i64,
    next_lease_id: i64,
    entries: BTreeMap<String, Entry>,
    leases: HashMap<LeaseId, HashSet<String>>,
}

struct Entry {
    kv: KeyValue,
    lease: Option<LeaseId>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        let (deletes, _) = broadcast::channel(256);
        InMemoryStore {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                deletes,
            }),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock cannot leave the map half-written.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn notify_deleted(&self, keys: Vec<String>) {
        for key in keys {
            // No subscribers is fine.
            let _ = self.deletes.send(key);
        }
    }

    fn expire_lease(&self, lease: LeaseId) {
        let removed = self.state().revoke(lease);
        self.notify_deleted(removed);
    }
}

impl State {
    fn put(&mut self, key: &str, value: Bytes, lease: Option<LeaseId>) -> i64 {
        self.revision += 1;
        let revision = self.revision;
        let create_revision = self
            .entries
            .get(key)
            .map(|e| e.kv.create_revision)
            .unwrap_or(revision);

        if let Some(lease) = lease {
            self.leases.entry(lease).or_default().insert(key.to_string());
        }
        self.entries.insert(
            key.to_string(),
            Entry {
                kv: KeyValue {
                    key: key.to_string(),
                    value,
                    create_revision,
                    mod_revision: revision,
                },
                lease,
            },
        );

        revision
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.revision += 1;
                if let Some(lease) = entry.lease {
                    if let Some(keys) = self.leases.get_mut(&lease) {
                        keys.remove(key);
                    }
                }
                true
            }
            None => false,
        }
    }

    fn revoke(&mut self, lease: LeaseId) -> Vec<String> {
        let keys: Vec<String> = match self.leases.remove(&lease) {
            Some(keys) => keys.into_iter().collect(),
            None => return vec![],
        };

        keys.into_iter().filter(|key| self.remove(key)).collect()
    }
}

#[async_trait::async_trait]
impl CoordinationStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<KeyValue>, CoordinationError> {
        Ok(self.inner.state().entries.get(key).map(|e| e.kv.clone()))
    }

    async fn get_prefix(&self, prefix: &str) -> Result<Vec<KeyValue>, CoordinationError> {
        let state = self.inner.state();
        let kvs = state
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(_, e)| e.kv.clone())
            .collect();

        Ok(kvs)
    }

    async fn create(
        &self,
        key: &str,
        value: Bytes,
        lease: Option<LeaseId>,
    ) -> Result<CreateOutcome, CoordinationError> {
        let mut state = self.inner.state();
        if let Some(existing) = state.entries.get(key) {
            return Ok(CreateOutcome::Exists(existing.kv.clone()));
        }
        if let Some(lease) = lease {
            if !state.leases.contains_key(&lease) {
                return Err(CoordinationError::LeaseNotFound(lease));
            }
        }

        let revision = state.put(key, value, lease);
        Ok(CreateOutcome::Created { revision })
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        value: Bytes,
        expected_mod_revision: i64,
    ) -> Result<bool, CoordinationError> {
        let mut state = self.inner.state();
        let lease = match state.entries.get(key) {
            Some(e) if e.kv.mod_revision == expected_mod_revision => e.lease,
            _ => return Ok(false),
        };

        state.put(key, value, lease);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, CoordinationError> {
        let deleted = self.inner.state().remove(key);
        if deleted {
            self.inner.notify_deleted(vec![key.to_string()]);
        }

        Ok(deleted)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CoordinationError> {
        let deleted: Vec<String> = {
            let mut state = self.inner.state();
            let keys: Vec<String> = state
                .entries
                .range(prefix.to_string()..)
                .take_while(|(k, _)| k.starts_with(prefix))
                .map(|(k, _)| k.clone())
                .collect();
            keys.into_iter().filter(|k| state.remove(k)).collect()
        };

        let count = deleted.len() as u64;
        self.inner.notify_deleted(deleted);
        Ok(count)
    }

    async fn compare_and_delete(&self, key: &str, mod_revision: i64) -> Result<bool, CoordinationError> {
        let deleted = {
            let mut state = self.inner.state();
            match state.entries.get(key) {
                Some(e) if e.kv.mod_revision == mod_revision => state.remove(key),
                _ => false,
            }
        };
        if deleted {
            self.inner.notify_deleted(vec![key.to_string()]);
        }

        Ok(deleted)
    }

    async fn grant_lease(&self, ttl: Duration) -> Result<LeaseId, CoordinationError> {
        let lease = {
            let mut state = self.inner.state();
            state.next_lease_id += 1;
            let lease = LeaseId(state.next_lease_id);
            state.leases.insert(lease, HashSet::new());
            lease
        };

        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            inner.expire_lease(lease);
        });

        Ok(lease)
    }

    async fn revoke_lease(&self, lease: LeaseId) -> Result<(), CoordinationError> {
        let removed = {
            let mut state = self.inner.state();
            if !state.leases.contains_key(&lease) {
                return Err(CoordinationError::LeaseNotFound(lease));
            }
            state.revoke(lease)
        };

        self.inner.notify_deleted(removed);
        Ok(())
    }

    async fn wait_for_delete(&self, key: &str, after_revision: i64) -> Result<(), CoordinationError> {
        // Subscribe before checking so a delete between the check and the wait is not missed.
        let mut deletes = self.inner.deletes.subscribe();

        loop {
            // A newer mod revision means it was deleted and re-created since the caller looked.
            let unchanged = {
                let state = self.inner.state();
                match state.entries.get(key) {
                    Some(e) => e.kv.mod_revision <= after_revision,
                    None => false,
                }
            };
            if !unchanged {
                return Ok(());
            }

            match deletes.recv().await {
                Ok(deleted) if deleted == key => return Ok(()),
                Ok(_) => {}
                // Missed some notices; the state check at the top of the loop catches up.
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return Err(CoordinationError::WatchClosed),
            }
        }
    }
}
