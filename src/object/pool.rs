use crate::object::fingerprint::{fingerprint, HashError};
use crate::object::source::SourceObject;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pool is a named set of backend endpoints for one service port.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub name: String,
    pub index: i64,
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub service_id: String,
    #[serde(default)]
    pub service_version: String,
    #[serde(default)]
    pub service_port: u16,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub plugin_name: String,
    #[serde(default)]
    pub plugin_opts: BTreeMap<String, String>,
}

impl SourceObject for Pool {
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
        let view = Pool {
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
