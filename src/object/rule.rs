use crate::object::fingerprint::{fingerprint, HashError};
use crate::object::source::SourceObject;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which listener family a rule is filed under.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RuleProtocol {
    Http,
    Https,
}

impl RuleProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleProtocol::Http => "http",
            RuleProtocol::Https => "https",
        }
    }
}

impl fmt::Display for RuleProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule maps one domain name to one pool. The https rule of a domain and its plain http
/// companion share a name and are told apart by `https`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub index: i64,
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub namespace: String,
    pub domain_name: String,
    pub pool_name: String,
    #[serde(default)]
    pub https: bool,
    #[serde(default)]
    pub transfer_http: bool,
    #[serde(default)]
    pub certificate_name: String,
    #[serde(default)]
    pub plugin_name: String,
    #[serde(default)]
    pub plugin_opts: BTreeMap<String, String>,
}

impl Rule {
    pub fn protocol(&self) -> RuleProtocol {
        if self.https {
            RuleProtocol::Https
        } else {
            RuleProtocol::Http
        }
    }
}

impl SourceObject for Rule {
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
        let view = Rule {
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
