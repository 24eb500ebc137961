use crate::object::fingerprint::{fingerprint, HashError};
use crate::object::source::SourceObject;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How a domain is exposed. Drives which rule variants exist for it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainProtocol {
    Http,
    Https,
    #[serde(rename = "httptohttps")]
    HttpToHttps,
    #[serde(rename = "httpandhttps")]
    HttpAndHttps,
}

impl Default for DomainProtocol {
    fn default() -> Self {
        DomainProtocol::Http
    }
}

impl DomainProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainProtocol::Http => "http",
            DomainProtocol::Https => "https",
            DomainProtocol::HttpToHttps => "httptohttps",
            DomainProtocol::HttpAndHttps => "httpandhttps",
        }
    }
}

impl fmt::Display for DomainProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown domain protocol '{0}'")]
pub struct UnknownDomainProtocol(String);

impl FromStr for DomainProtocol {
    type Err = UnknownDomainProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(DomainProtocol::Http),
            "https" => Ok(DomainProtocol::Https),
            "httptohttps" => Ok(DomainProtocol::HttpToHttps),
            "httpandhttps" => Ok(DomainProtocol::HttpAndHttps),
            other => Err(UnknownDomainProtocol(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    pub index: i64,
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub namespace: String,
    pub domain: String,
    #[serde(default)]
    pub protocol: DomainProtocol,
    #[serde(default)]
    pub plugin_name: String,
    #[serde(default)]
    pub plugin_opts: BTreeMap<String, String>,
}

impl SourceObject for Domain {
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
        let view = Domain {
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
