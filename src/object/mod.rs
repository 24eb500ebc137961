//! Object model: the six kinds of entities the control plane reconciles against backends.
mod certificate;
mod domain;
mod fingerprint;
mod naming;
mod node;
mod pool;
mod rule;
mod source;
mod variants;
mod virtual_service;

pub use certificate::Certificate;
pub use domain::Domain;
pub use domain::DomainProtocol;
pub use domain::UnknownDomainProtocol;
pub use fingerprint::HashError;
pub use naming::node_name;
pub use naming::parse_pool_name;
pub use naming::pool_name;
pub use naming::rule_name;
pub use naming::PoolIdentity;
pub use node::Node;
pub use node::NodeState;
pub use pool::Pool;
pub use rule::Rule;
pub use rule::RuleProtocol;
pub use source::Source;
pub use source::SourceKind;
pub use source::SourceObject;
pub use variants::rule_variants;
pub use virtual_service::VirtualService;
