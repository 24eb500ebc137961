mod coordination;
mod entrance;
mod event_log;
mod intake;
mod mutex;
mod object;
mod plugin;
mod reconciler;
mod store;
mod sync;
mod grpc {
    include!("../generated/etcdserverpb.rs");
}

pub use coordination::CoordinationError;
pub use coordination::CoordinationStore;
pub use coordination::CreateOutcome;
pub use coordination::EtcdStore;
pub use coordination::InMemoryStore;
pub use coordination::KeyValue;
pub use coordination::LeaseId;
pub use entrance::try_create_entrance;
pub use entrance::Entrance;
pub use entrance::EntranceConfig;
pub use entrance::EntranceCreationError;
pub use entrance::EntranceOptions;
pub use event_log::EventLog;
pub use event_log::SlogEventLog;
pub use intake::DomainBinding;
pub use intake::DomainIntake;
pub use mutex::DistributedMutex;
pub use mutex::LockError;
pub use object::node_name;
pub use object::parse_pool_name;
pub use object::pool_name;
pub use object::rule_name;
pub use object::rule_variants;
pub use object::Certificate;
pub use object::Domain;
pub use object::DomainProtocol;
pub use object::HashError;
pub use object::Node;
pub use object::NodeState;
pub use object::Pool;
pub use object::PoolIdentity;
pub use object::Rule;
pub use object::RuleProtocol;
pub use object::Source;
pub use object::SourceKind;
pub use object::SourceObject;
pub use object::UnknownDomainProtocol;
pub use object::VirtualService;
pub use plugin::register_nginx;
pub use plugin::NginxPlugin;
pub use plugin::Plugin;
pub use plugin::PluginContext;
pub use plugin::PluginError;
pub use plugin::Registry;
pub use plugin::RegistryError;
pub use plugin::NGINX_PLUGIN_NAME;
pub use reconciler::Backoff;
pub use reconciler::Event;
pub use reconciler::EventMethod;
pub use reconciler::EventQueueError;
pub use reconciler::HttpsVirtualService;
pub use reconciler::Reconciler;
pub use reconciler::ReconcilerClient;
pub use reconciler::RetryPolicy;
pub use reconciler::HTTPS_VS_NAME;
pub use store::KeyLayout;
pub use store::StoreConfig;
pub use store::StoreError;
pub use store::StoredSource;
pub use store::UpdateVerdict;
pub use store::VersionedStore;
pub use sync::AuthorityError;
pub use sync::ResourceAuthority;
pub use sync::StartupSync;
pub use sync::SyncError;

// Module roots hold only private `mod` declarations and `pub use` re-exports. Implementation
// lives in the files underneath, so a module can be split up without changing its exports.
