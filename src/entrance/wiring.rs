use crate::coordination::CoordinationStore;
use crate::entrance::options::EntranceOptionsValidated;
use crate::entrance::{Entrance, EntranceOptions};
use crate::event_log::{EventLog, SlogEventLog};
use crate::intake::DomainIntake;
use crate::plugin::Registry;
use crate::reconciler::{self, HttpsVirtualService, Reconciler, RetryPolicy};
use crate::store::{StoreConfig, VersionedStore};
use std::convert::TryFrom;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct EntranceConfig {
    /// Recorded in every envelope this instance writes.
    pub instance_name: String,
    pub coordination: Arc<dyn CoordinationStore>,
    /// Must have a registered default plugin.
    pub registry: Registry,
    /// Defaults to logging the audit trail through `info_logger`.
    pub event_log: Option<Arc<dyn EventLog>>,
    pub info_logger: slog::Logger,
    pub options: EntranceOptions,
}

#[derive(Debug, thiserror::Error)]
pub enum EntranceCreationError {
    #[error("Illegal options for configuring entrance: {0}")]
    IllegalOptions(String),
    #[error("No default plugin configured")]
    NoDefaultPlugin,
    #[error("Default plugin '{0}' is not registered")]
    UnknownDefaultPlugin(String),
}

/// Builds the store, reconciler and event loop. Must be called within a tokio runtime.
pub async fn try_create_entrance(config: EntranceConfig) -> Result<Entrance, EntranceCreationError> {
    let root_logger = config.info_logger;

    let options = EntranceOptionsValidated::try_from(config.options)
        .map_err(|e| EntranceCreationError::IllegalOptions(e.to_string()))?;

    match config.registry.default_name() {
        None => return Err(EntranceCreationError::NoDefaultPlugin),
        Some(name) if !config.registry.is_registered(name) => {
            return Err(EntranceCreationError::UnknownDefaultPlugin(name.to_string()))
        }
        Some(_) => {}
    }

    let store = Arc::new(VersionedStore::new(
        root_logger.new(slog::o!("Component" => "Store")),
        config.coordination,
        StoreConfig {
            key_prefix: options.key_prefix,
            instance_name: config.instance_name,
            pool_lock_ttl: options.pool_lock_ttl,
            update_lock_ttl: options.update_lock_ttl,
            lock_attempts: options.lock_attempts,
        },
    ));

    let event_log = config
        .event_log
        .unwrap_or_else(|| Arc::new(SlogEventLog::new(root_logger.clone())));

    let reconciler = Arc::new(Reconciler::new(
        root_logger.new(slog::o!("Component" => "Reconciler")),
        store.clone(),
        Arc::new(config.registry),
        event_log,
        RetryPolicy {
            attempts: options.plugin_retry_attempts,
            backoff: options.plugin_retry_backoff,
        },
        HttpsVirtualService {
            port: options.https_listen_port,
            ..HttpsVirtualService::default()
        },
    ));

    let shutdown = CancellationToken::new();
    let (client, actor) = reconciler::create(
        root_logger.clone(),
        options.event_queue_capacity,
        reconciler.clone(),
        shutdown.clone(),
    );
    let event_loop = tokio::spawn(actor.run_event_loop());

    // Indexes must outgrow whatever a previous run of this instance wrote.
    let domains = DomainIntake::new(chrono::Utc::now().timestamp_millis());

    Ok(Entrance::new(
        root_logger,
        client,
        domains,
        store,
        reconciler,
        shutdown,
        event_loop,
    ))
}
