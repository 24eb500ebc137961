use crate::event_log::EventLog;
use crate::mutex::LockError;
use crate::object::{RuleProtocol, Source};
use crate::plugin::{Plugin, PluginError, Registry, RegistryError};
use crate::reconciler::{Event, EventMethod, HttpsVirtualService, PluginErrorCounter, RetryPolicy};
use crate::store::VersionedStore;
use std::fmt;
use std::slice;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
enum ApplyError {
    #[error("No usable plugin: {0}")]
    Plugin(#[from] RegistryError),
    #[error("Failed to lock pool: {0}")]
    Lock(#[from] LockError),
    #[error(transparent)]
    Backend(#[from] PluginError),
}

/// Reconciler turns lifecycle events into backend calls. The store decides whether this
/// instance may act on an event; only granted events reach a plugin.
pub struct Reconciler {
    logger: slog::Logger,
    store: Arc<VersionedStore>,
    registry: Arc<Registry>,
    event_log: Arc<dyn EventLog>,
    retry: RetryPolicy,
    errors: PluginErrorCounter,
    https_vs: HttpsVirtualService,
}

impl Reconciler {
    pub fn new(
        logger: slog::Logger,
        store: Arc<VersionedStore>,
        registry: Arc<Registry>,
        event_log: Arc<dyn EventLog>,
        retry: RetryPolicy,
        https_vs: HttpsVirtualService,
    ) -> Self {
        Reconciler {
            logger,
            store,
            registry,
            event_log,
            retry,
            errors: PluginErrorCounter::default(),
            https_vs,
        }
    }

    /// Failed plugin attempts since startup.
    pub fn plugin_errors(&self) -> u64 {
        self.errors.get()
    }

    /// Failures are logged and the event is dropped; producers resync on their own schedule.
    pub async fn handle(&self, event: Event) {
        slog::debug!(
            self.logger,
            "Handling {} of {} '{}' (index {})",
            event.method,
            event.source.kind(),
            event.source.name(),
            event.source.index()
        );
        match event.method {
            EventMethod::Add => self.add(event.source).await,
            EventMethod::Update => self.update(event.source).await,
            EventMethod::Delete => self.delete(event.source).await,
        }
    }

    /// Probes the default plugin and publishes `entrance_default_plugin_up`.
    pub async fn report_plugin_status(&self) -> bool {
        let (name, up) = match self.registry.get_default_plugin(&self.store) {
            Ok(plugin) => (plugin.name().to_string(), plugin.status().await),
            Err(e) => {
                slog::error!(self.logger, "Cannot probe default plugin: {}", e);
                (self.registry.default_name().unwrap_or_default().to_string(), false)
            }
        };

        let value = if up { 1.0 } else { 0.0 };
        metrics::gauge!("entrance_default_plugin_up", "plugin_name" => name).set(value);
        up
    }

    pub async fn stop_plugins(&self) {
        for plugin in self.registry.created() {
            if let Err(e) = plugin.stop().await {
                slog::warn!(self.logger, "Plugin '{}' failed to stop: {}", plugin.name(), e);
            }
        }
    }

    async fn add(&self, source: Source) {
        match self.store.add_source(&source).await {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => return self.report_failure(&source, "store", &e),
        }

        if let Source::Node(node) = &source {
            if !node.ready {
                slog::debug!(self.logger, "Node '{}' is not ready, not adding it to the backend", node.name);
                return;
            }
        }

        if let Err(e) = self.apply(EventMethod::Add, &source).await {
            self.report_failure(&source, "add", &e);
        }
    }

    async fn update(&self, mut source: Source) {
        let verdict = match self.store.update_source(&mut source).await {
            Ok(verdict) => verdict,
            Err(e) => return self.report_failure(&source, "store", &e),
        };
        if !verdict.granted {
            slog::debug!(self.logger, "Update of '{}' not granted", source.name());
            return;
        }

        let node = match &source {
            Source::Node(node) => node,
            _ => {
                if let Err(e) = self.apply(EventMethod::Update, &source).await {
                    self.report_failure(&source, "update", &e);
                }
                return;
            }
        };

        if node.ready {
            if let Err(e) = self.apply(EventMethod::Update, &source).await {
                self.report_failure(&source, "update", &e);
            }
            return;
        }
        if !verdict.was_online {
            slog::debug!(self.logger, "Node '{}' is neither ready nor online, ignoring", node.name);
            return;
        }

        // A lone node stays in: if it is really down the pool is down either way.
        let members = match self.store.get_node_by_pool(&node.pool_name).await {
            Ok(members) => members.len(),
            Err(e) => return self.report_failure(&source, "count pool members for", &e),
        };
        if members <= 1 {
            slog::info!(
                self.logger,
                "Node '{}' is not ready but is the only node of '{}', keeping it",
                node.name,
                node.pool_name
            );
            return;
        }

        slog::info!(self.logger, "Node '{}' is not ready, draining it", node.name);
        match self.apply(EventMethod::Delete, &source).await {
            Ok(()) => {
                if let Err(e) = self.store.update_source_online(&source, false).await {
                    self.report_failure(&source, "mark offline", &e);
                }
            }
            Err(e) => self.report_failure(&source, "drain", &e),
        }
    }

    async fn delete(&self, mut source: Source) {
        if let Source::Pool(pool) = &source {
            match self.store.get_node_by_pool(&pool.name).await {
                Ok(nodes) if !nodes.is_empty() => {
                    slog::info!(
                        self.logger,
                        "Pool '{}' still has {} nodes, not deleting it",
                        pool.name,
                        nodes.len()
                    );
                    return;
                }
                Ok(_) => {}
                Err(e) => return self.report_failure(&source, "list nodes of", &e),
            }
        }

        match self.store.delete_source(&mut source).await {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => return self.report_failure(&source, "delete", &e),
        }

        if let Err(e) = self.apply(EventMethod::Delete, &source).await {
            self.report_failure(&source, "delete", &e);
        }
    }

    // Failures go to the process log and, keyed by the event id, to the audit trail.
    fn report_failure(&self, source: &Source, action: &str, error: &dyn fmt::Display) {
        slog::error!(
            self.logger,
            "Failed to {} {} '{}': {}",
            action,
            source.kind(),
            source.name(),
            error
        );
        self.event_log.error(
            source.event_id(),
            "failure",
            &format!("Load balancer {} ({}) failed to {}: {}", source.kind(), source.name(), action, error),
        );
    }

    // Pool and node mutations run under the pool's mutex.
    async fn apply(&self, method: EventMethod, source: &Source) -> Result<(), ApplyError> {
        let plugin = self.plugin_for(source)?;

        let pool = match source {
            Source::Pool(pool) => Some(pool.name.as_str()),
            Source::Node(node) => Some(node.pool_name.as_str()),
            _ => None,
        };
        match pool {
            Some(pool) => {
                let mut lock = self.store.pool_mutex(pool);
                lock.lock().await?;
                let result = self.exec(plugin.as_ref(), method, source).await;
                if let Err(e) = lock.unlock().await {
                    slog::warn!(self.logger, "Failed to unlock pool '{}': {}", pool, e);
                }
                result?;
            }
            None => self.exec(plugin.as_ref(), method, source).await?,
        }

        self.after_success(plugin.as_ref(), method, source).await;
        Ok(())
    }

    async fn exec(&self, plugin: &dyn Plugin, method: EventMethod, source: &Source) -> Result<(), PluginError> {
        let description = format!("{} {} '{}'", method, source.kind(), source.name());
        self.retry
            .run(&self.logger, &self.errors, &description, move || {
                dispatch(plugin, method, source)
            })
            .await
    }

    async fn after_success(&self, plugin: &dyn Plugin, method: EventMethod, source: &Source) {
        slog::info!(self.logger, "Applied {} of {} '{}'", method, source.kind(), source.name());

        match (method, source) {
            (EventMethod::Add, Source::Node(node)) | (EventMethod::Update, Source::Node(node)) => {
                if let Err(e) = self.store.update_source_online(source, true).await {
                    self.report_failure(source, "mark online", &e);
                }
                self.event_log.info(
                    &node.event_id,
                    "success",
                    &format!("Load balancer node ({}) added", node.address()),
                );
            }
            (EventMethod::Delete, Source::Node(node)) => {
                self.event_log.info(
                    &node.event_id,
                    "success",
                    &format!("Load balancer node ({}) offline", node.address()),
                );
            }
            (EventMethod::Add, Source::VirtualService(vs)) => {
                self.event_log
                    .info(&vs.event_id, "success", "Load balancer virtual service added");
            }
            (EventMethod::Add, Source::Rule(rule)) => {
                self.event_log.debug(
                    &rule.event_id,
                    "success",
                    &format!("Load balancer rule for domain ({}) added", rule.domain_name),
                );
            }
            (EventMethod::Add, Source::Domain(domain)) => {
                self.event_log.debug(
                    &domain.event_id,
                    "success",
                    &format!("Load balancer domain ({}) added", domain.domain),
                );
            }
            _ => {}
        }

        if let Source::Rule(rule) = source {
            if rule.https {
                self.push_https_virtual_service(plugin, source).await;
            }
        }
    }

    // `cause` is the https rule whose change triggered the refresh.
    async fn push_https_virtual_service(&self, plugin: &dyn Plugin, cause: &Source) {
        let rules = match self.store.get_all_rules(RuleProtocol::Https).await {
            Ok(rules) => rules,
            Err(e) => return self.report_failure(cause, "list https rules for", &e),
        };
        let services = [self.https_vs.build(&rules)];
        let services = &services[..];

        slog::info!(self.logger, "Refreshing '{}' after an https rule change", services[0].name);
        let result = self
            .retry
            .run(&self.logger, &self.errors, "update the https virtual service", move || {
                plugin.update_virtual_service(services)
            })
            .await;
        if let Err(e) = result {
            self.report_failure(cause, "refresh the https virtual service for", &e);
        }
    }

    // An unusable named plugin falls back to the default one.
    fn plugin_for(&self, source: &Source) -> Result<Arc<dyn Plugin>, RegistryError> {
        let name = source.plugin_name();
        if name.is_empty() {
            return self.registry.get_default_plugin(&self.store);
        }

        self.registry
            .get_plugin(name, source.plugin_opts(), &self.store)
            .or_else(|e| {
                slog::warn!(self.logger, "Plugin '{}' unavailable, using the default: {}", name, e);
                self.registry.get_default_plugin(&self.store)
            })
    }
}

async fn dispatch(plugin: &dyn Plugin, method: EventMethod, source: &Source) -> Result<(), PluginError> {
    match (method, source) {
        (EventMethod::Add, Source::Pool(o)) => plugin.add_pool(slice::from_ref(o)).await,
        (EventMethod::Update, Source::Pool(o)) => plugin.update_pool(slice::from_ref(o)).await,
        (EventMethod::Delete, Source::Pool(o)) => plugin.delete_pool(slice::from_ref(o)).await,

        (EventMethod::Add, Source::Node(o)) => plugin.add_node(slice::from_ref(o)).await,
        (EventMethod::Update, Source::Node(o)) => plugin.update_node(slice::from_ref(o)).await,
        (EventMethod::Delete, Source::Node(o)) => plugin.delete_node(slice::from_ref(o)).await,

        (EventMethod::Add, Source::Rule(o)) => plugin.add_rule(slice::from_ref(o)).await,
        (EventMethod::Update, Source::Rule(o)) => plugin.update_rule(slice::from_ref(o)).await,
        (EventMethod::Delete, Source::Rule(o)) => plugin.delete_rule(slice::from_ref(o)).await,

        (EventMethod::Add, Source::VirtualService(o)) => plugin.add_virtual_service(slice::from_ref(o)).await,
        (EventMethod::Update, Source::VirtualService(o)) => plugin.update_virtual_service(slice::from_ref(o)).await,
        (EventMethod::Delete, Source::VirtualService(o)) => plugin.delete_virtual_service(slice::from_ref(o)).await,

        (EventMethod::Add, Source::Domain(o)) => plugin.add_domain(slice::from_ref(o)).await,
        (EventMethod::Update, Source::Domain(o)) => plugin.update_domain(slice::from_ref(o)).await,
        (EventMethod::Delete, Source::Domain(o)) => plugin.delete_domain(slice::from_ref(o)).await,

        (EventMethod::Add, Source::Certificate(o)) => plugin.add_certificate(slice::from_ref(o)).await,
        (EventMethod::Update, Source::Certificate(o)) => plugin.update_certificate(slice::from_ref(o)).await,
        (EventMethod::Delete, Source::Certificate(o)) => plugin.delete_certificate(slice::from_ref(o)).await,
    }
}
