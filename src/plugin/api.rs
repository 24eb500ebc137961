use crate::object::{Certificate, Domain, Node, Pool, Rule, VirtualService};
use crate::store::StoreError;

/// Plugin is a backend driver for one reverse-proxy product.
///
/// Mutations take batches. Callers add a pool before its nodes or virtual services, may delete
/// a pool without first deleting its nodes, and hold the pool's distributed mutex for every
/// pool and node mutation.
#[async_trait::async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    async fn add_pool(&self, pools: &[Pool]) -> Result<(), PluginError>;
    async fn update_pool(&self, pools: &[Pool]) -> Result<(), PluginError>;
    async fn delete_pool(&self, pools: &[Pool]) -> Result<(), PluginError>;
    async fn get_pool(&self, name: &str) -> Option<Pool>;

    async fn add_node(&self, nodes: &[Node]) -> Result<(), PluginError>;
    async fn update_node(&self, nodes: &[Node]) -> Result<(), PluginError>;
    async fn delete_node(&self, nodes: &[Node]) -> Result<(), PluginError>;
    async fn get_node(&self, name: &str) -> Option<Node>;

    async fn add_rule(&self, rules: &[Rule]) -> Result<(), PluginError>;
    async fn update_rule(&self, rules: &[Rule]) -> Result<(), PluginError>;
    async fn delete_rule(&self, rules: &[Rule]) -> Result<(), PluginError>;
    async fn get_rule(&self, name: &str) -> Option<Rule>;

    async fn add_domain(&self, domains: &[Domain]) -> Result<(), PluginError>;
    async fn update_domain(&self, domains: &[Domain]) -> Result<(), PluginError>;
    async fn delete_domain(&self, domains: &[Domain]) -> Result<(), PluginError>;
    async fn get_domain(&self, name: &str) -> Option<Domain>;

    async fn add_virtual_service(&self, services: &[VirtualService]) -> Result<(), PluginError>;
    async fn update_virtual_service(&self, services: &[VirtualService]) -> Result<(), PluginError>;
    async fn delete_virtual_service(&self, services: &[VirtualService]) -> Result<(), PluginError>;
    async fn get_virtual_service(&self, name: &str) -> Option<VirtualService>;

    async fn add_certificate(&self, certificates: &[Certificate]) -> Result<(), PluginError>;
    async fn update_certificate(&self, certificates: &[Certificate]) -> Result<(), PluginError>;
    async fn delete_certificate(&self, certificates: &[Certificate]) -> Result<(), PluginError>;
    async fn get_certificate(&self, name: &str) -> Option<Certificate>;

    async fn stop(&self) -> Result<(), PluginError>;

    /// Health probe.
    async fn status(&self) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Backend request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Backend rejected {method} {url} with HTTP {status}")]
    Rejected { method: String, url: String, status: u16 },
    #[error("Store lookup failed: {0}")]
    Store(#[from] StoreError),
    #[error("Invalid object '{name}': {reason}")]
    InvalidObject { name: String, reason: String },
    #[error("Invalid plugin options: {0}")]
    InvalidOptions(String),
    #[error("{0}")]
    Backend(String),
    #[error("{}", join_errors(.0))]
    Multiple(Vec<PluginError>),
}

impl PluginError {
    /// Ok if `errors` is empty, the lone error, or all of them.
    pub fn aggregate(mut errors: Vec<PluginError>) -> Result<(), PluginError> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(PluginError::Multiple(errors)),
        }
    }
}

fn join_errors(errors: &[PluginError]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(";")
}
