mod api;
mod etcd;
mod in_memory;

pub use api::CoordinationError;
pub use api::CoordinationStore;
pub use api::CreateOutcome;
pub use api::KeyValue;
pub use api::LeaseId;
pub use etcd::EtcdStore;
pub use in_memory::InMemoryStore;
