use crate::object::fingerprint::{fingerprint, HashError};
use crate::object::source::SourceObject;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// VirtualService is a layer-4 / stream listener bound to a default pool and a set of rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VirtualService {
    pub name: String,
    pub index: i64,
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub namespace: String,
    pub port: u16,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub listening: Vec<String>,
    #[serde(default)]
    pub default_pool_name: String,
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub plugin_name: String,
    #[serde(default)]
    pub plugin_opts: BTreeMap<String, String>,
}

impl SourceObject for VirtualService {
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
        let view = VirtualService {
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
