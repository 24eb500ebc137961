use crate::object::fingerprint::{fingerprint, HashError};
use crate::object::source::SourceObject;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Active,
    Draining,
    Disabled,
}

impl Default for NodeState {
    fn default() -> Self {
        NodeState::Active
    }
}

/// Node is one backend endpoint (host:port) belonging to exactly one pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub index: i64,
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub namespace: String,
    // Delete events often arrive without an address; empty host / zero port means "unknown".
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub state: NodeState,
    pub pool_name: String,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub weight: u32,
    #[serde(default)]
    pub plugin_name: String,
    #[serde(default)]
    pub plugin_opts: BTreeMap<String, String>,
}

impl Node {
    pub fn has_address(&self) -> bool {
        !self.host.is_empty() && self.port != 0
    }

    /// "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The fields whose change justifies a backend call.
    pub(crate) fn connectivity(&self) -> String {
        format!("{}:{} {}", self.host, self.port, self.ready)
    }

    pub fn is_stream(&self) -> bool {
        !self.protocol.is_empty() && !self.protocol.eq_ignore_ascii_case("http")
    }
}

impl SourceObject for Node {
    fn name(&self) -> &str {
        &self.name
    }

    fn index(&self) -> i64 {
        self.index
    }

    fn event_id(&self) -> &str {
        &self.event_id
    }

    fn hash(&self) -> Result<String, HashError> {
        let view = Node {
            index: 0,
            event_id: String::new(),
            ..self.clone()
        };
        fingerprint(&view)
    }

    fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    fn plugin_opts(&self) -> &BTreeMap<String, String> {
        &self.plugin_opts
    }
}
