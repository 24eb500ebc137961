use crate::object::fingerprint::{fingerprint, HashError};
use crate::object::source::SourceObject;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A TLS certificate referenced by `Rule::certificate_name`.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub name: String,
    pub index: i64,
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub namespace: String,
    /// PEM encoded certificate chain.
    pub certificate: String,
    /// PEM encoded private key.
    pub private_key: String,
    #[serde(default)]
    pub plugin_name: String,
    #[serde(default)]
    pub plugin_opts: BTreeMap<String, String>,
}

// Keep key material out of logs.
impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("name", &self.name)
            .field("index", &self.index)
            .field("event_id", &self.event_id)
            .field("namespace", &self.namespace)
            .field("plugin_name", &self.plugin_name)
            .finish()
    }
}

impl SourceObject for Certificate {
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
        let view = Certificate {
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
