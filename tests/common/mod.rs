#![allow(dead_code)]

use entrance::{
    Certificate, Domain, EventLog, HttpsVirtualService, InMemoryStore, Node, Plugin, PluginError, Pool, Reconciler,
    Registry, RetryPolicy, Rule, SlogEventLog, StoreConfig, VersionedStore, VirtualService,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Duration;

pub const POOL: &str = "t1@svcA_80.Pool";
pub const RECORDING: &str = "recording";

pub fn logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: &'static str,
    pub name: String,
}

/// Test double that records every attempted call and can be told to fail.
pub struct RecordingPlugin {
    name: String,
    calls: Mutex<Vec<Call>>,
    virtual_services: Mutex<Vec<VirtualService>>,
    failures: AtomicU32,
    up: AtomicBool,
}

impl RecordingPlugin {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(RecordingPlugin {
            name: name.to_string(),
            calls: Mutex::new(vec![]),
            virtual_services: Mutex::new(vec![]),
            failures: AtomicU32::new(0),
            up: AtomicBool::new(true),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls().iter().filter(|c| c.op == op).count()
    }

    pub fn names(&self, op: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.op == op)
            .map(|c| c.name)
            .collect()
    }

    /// Virtual services passed to add/update, in order.
    pub fn virtual_services(&self) -> Vec<VirtualService> {
        self.virtual_services.lock().unwrap().clone()
    }

    /// The next `n` calls fail.
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }

    fn record<'a>(&self, op: &'static str, names: impl Iterator<Item = &'a String>) -> Result<(), PluginError> {
        {
            let mut calls = self.calls.lock().unwrap();
            calls.extend(names.map(|name| Call { op, name: name.clone() }));
        }

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(PluginError::Backend(format!("{} failed", op)));
        }
        Ok(())
    }

    fn record_vs(&self, op: &'static str, services: &[VirtualService]) -> Result<(), PluginError> {
        self.virtual_services.lock().unwrap().extend(services.iter().cloned());
        self.record(op, services.iter().map(|s| &s.name))
    }
}

#[async_trait::async_trait]
impl Plugin for RecordingPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    async fn add_pool(&self, pools: &[Pool]) -> Result<(), PluginError> {
        self.record("add_pool", pools.iter().map(|p| &p.name))
    }

    async fn update_pool(&self, pools: &[Pool]) -> Result<(), PluginError> {
        self.record("update_pool", pools.iter().map(|p| &p.name))
    }

    async fn delete_pool(&self, pools: &[Pool]) -> Result<(), PluginError> {
        self.record("delete_pool", pools.iter().map(|p| &p.name))
    }

    async fn get_pool(&self, _name: &str) -> Option<Pool> {
        None
    }

    async fn add_node(&self, nodes: &[Node]) -> Result<(), PluginError> {
        self.record("add_node", nodes.iter().map(|n| &n.name))
    }

    async fn update_node(&self, nodes: &[Node]) -> Result<(), PluginError> {
        self.record("update_node", nodes.iter().map(|n| &n.name))
    }

    async fn delete_node(&self, nodes: &[Node]) -> Result<(), PluginError> {
        self.record("delete_node", nodes.iter().map(|n| &n.name))
    }

    async fn get_node(&self, _name: &str) -> Option<Node> {
        None
    }

    async fn add_rule(&self, rules: &[Rule]) -> Result<(), PluginError> {
        self.record("add_rule", rules.iter().map(|r| &r.name))
    }

    async fn update_rule(&self, rules: &[Rule]) -> Result<(), PluginError> {
        self.record("update_rule", rules.iter().map(|r| &r.name))
    }

    async fn delete_rule(&self, rules: &[Rule]) -> Result<(), PluginError> {
        self.record("delete_rule", rules.iter().map(|r| &r.name))
    }

    async fn get_rule(&self, _name: &str) -> Option<Rule> {
        None
    }

    async fn add_domain(&self, domains: &[Domain]) -> Result<(), PluginError> {
        self.record("add_domain", domains.iter().map(|d| &d.name))
    }

    async fn update_domain(&self, domains: &[Domain]) -> Result<(), PluginError> {
        self.record("update_domain", domains.iter().map(|d| &d.name))
    }

    async fn delete_domain(&self, domains: &[Domain]) -> Result<(), PluginError> {
        self.record("delete_domain", domains.iter().map(|d| &d.name))
    }

    async fn get_domain(&self, _name: &str) -> Option<Domain> {
        None
    }

    async fn add_virtual_service(&self, services: &[VirtualService]) -> Result<(), PluginError> {
        self.record_vs("add_virtual_service", services)
    }

    async fn update_virtual_service(&self, services: &[VirtualService]) -> Result<(), PluginError> {
        self.record_vs("update_virtual_service", services)
    }

    async fn delete_virtual_service(&self, services: &[VirtualService]) -> Result<(), PluginError> {
        self.record("delete_virtual_service", services.iter().map(|s| &s.name))
    }

    async fn get_virtual_service(&self, _name: &str) -> Option<VirtualService> {
        None
    }

    async fn add_certificate(&self, certificates: &[Certificate]) -> Result<(), PluginError> {
        self.record("add_certificate", certificates.iter().map(|c| &c.name))
    }

    async fn update_certificate(&self, certificates: &[Certificate]) -> Result<(), PluginError> {
        self.record("update_certificate", certificates.iter().map(|c| &c.name))
    }

    async fn delete_certificate(&self, certificates: &[Certificate]) -> Result<(), PluginError> {
        self.record("delete_certificate", certificates.iter().map(|c| &c.name))
    }

    async fn get_certificate(&self, _name: &str) -> Option<Certificate> {
        None
    }

    async fn stop(&self) -> Result<(), PluginError> {
        Ok(())
    }

    async fn status(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }
}

pub fn store_config() -> StoreConfig {
    StoreConfig {
        key_prefix: "/entrance".to_string(),
        instance_name: "entrance-test".to_string(),
        pool_lock_ttl: Duration::from_secs(60),
        update_lock_ttl: Duration::from_secs(20),
        lock_attempts: 3,
    }
}

/// A registry whose default plugin is `plugin`, registered as `RECORDING`.
pub fn registry_with(plugin: &Arc<RecordingPlugin>) -> Registry {
    let mut registry = Registry::new(logger());
    let shared = plugin.clone();
    registry.register(
        RECORDING,
        move |_| Ok(shared.clone() as Arc<dyn Plugin>),
        |_| Ok(()),
    );
    registry.set_default(RECORDING, BTreeMap::new());
    registry
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub severity: &'static str,
    pub event_id: String,
    pub status: String,
    pub message: String,
}

/// Keeps every audit entry in memory.
#[derive(Default)]
pub struct RecordingEventLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingEventLog {
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn with_severity(&self, severity: &str) -> Vec<AuditEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.severity == severity)
            .collect()
    }

    fn push(&self, severity: &'static str, event_id: &str, status: &str, message: &str) {
        self.entries.lock().unwrap().push(AuditEntry {
            severity,
            event_id: event_id.to_string(),
            status: status.to_string(),
            message: message.to_string(),
        });
    }
}

impl EventLog for RecordingEventLog {
    fn info(&self, event_id: &str, status: &str, message: &str) {
        self.push("info", event_id, status, message);
    }

    fn debug(&self, event_id: &str, status: &str, message: &str) {
        self.push("debug", event_id, status, message);
    }

    fn error(&self, event_id: &str, status: &str, message: &str) {
        self.push("error", event_id, status, message);
    }
}

pub struct Harness {
    pub memory: InMemoryStore,
    pub store: Arc<VersionedStore>,
    pub plugin: Arc<RecordingPlugin>,
    pub reconciler: Reconciler,
}

pub fn harness() -> Harness {
    let memory = InMemoryStore::new();
    let plugin = RecordingPlugin::new(RECORDING);
    let (store, reconciler) = replica(
        &memory,
        &plugin,
        store_config(),
        Arc::new(SlogEventLog::new(logger())),
    );

    Harness {
        memory,
        store,
        plugin,
        reconciler,
    }
}

/// One control-plane instance over `memory`, applying to `plugin`.
pub fn replica(
    memory: &InMemoryStore,
    plugin: &Arc<RecordingPlugin>,
    config: StoreConfig,
    event_log: Arc<dyn EventLog>,
) -> (Arc<VersionedStore>, Reconciler) {
    let store = Arc::new(VersionedStore::new(logger(), Arc::new(memory.clone()), config));
    let reconciler = Reconciler::new(
        logger(),
        store.clone(),
        Arc::new(registry_with(plugin)),
        event_log,
        RetryPolicy::default(),
        HttpsVirtualService::default(),
    );

    (store, reconciler)
}

pub fn pool(index: i64) -> Pool {
    Pool {
        name: POOL.to_string(),
        index,
        service_id: "svcA".to_string(),
        service_port: 80,
        ..Pool::default()
    }
}

pub fn node(name: &str, host: &str, ready: bool, index: i64) -> Node {
    Node {
        name: name.to_string(),
        index,
        host: host.to_string(),
        port: 8080,
        pool_name: POOL.to_string(),
        ready,
        ..Node::default()
    }
}
