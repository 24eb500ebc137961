use crate::object::{Certificate, Domain, HashError, Node, Pool, Rule, VirtualService};
use std::collections::BTreeMap;
use std::fmt;

/// Capabilities shared by every entity kind.
pub trait SourceObject {
    /// Stable identity, used as the last component of the store key.
    fn name(&self) -> &str;

    /// Monotonic write version supplied by the producer.
    fn index(&self) -> i64;

    /// Correlates this object with the audit trail.
    fn event_id(&self) -> &str;

    /// Fingerprint over every field that matters to a backend.
    fn hash(&self) -> Result<String, HashError>;

    /// Empty means "use the default plugin".
    fn plugin_name(&self) -> &str;

    fn plugin_opts(&self) -> &BTreeMap<String, String>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Pool,
    Node,
    Rule,
    VirtualService,
    Domain,
    Certificate,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceKind::Pool => "pool",
            SourceKind::Node => "node",
            SourceKind::Rule => "rule",
            SourceKind::VirtualService => "virtual_service",
            SourceKind::Domain => "domain",
            SourceKind::Certificate => "certificate",
        };
        f.write_str(s)
    }
}

/// Source is any one entity travelling through the reconciler.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Pool(Pool),
    Node(Node),
    Rule(Rule),
    VirtualService(VirtualService),
    Domain(Domain),
    Certificate(Certificate),
}

impl Source {
    pub fn kind(&self) -> SourceKind {
        match self {
            Source::Pool(_) => SourceKind::Pool,
            Source::Node(_) => SourceKind::Node,
            Source::Rule(_) => SourceKind::Rule,
            Source::VirtualService(_) => SourceKind::VirtualService,
            Source::Domain(_) => SourceKind::Domain,
            Source::Certificate(_) => SourceKind::Certificate,
        }
    }

    pub fn object(&self) -> &dyn SourceObject {
        match self {
            Source::Pool(o) => o,
            Source::Node(o) => o,
            Source::Rule(o) => o,
            Source::VirtualService(o) => o,
            Source::Domain(o) => o,
            Source::Certificate(o) => o,
        }
    }

    pub fn name(&self) -> &str {
        self.object().name()
    }

    pub fn index(&self) -> i64 {
        self.object().index()
    }

    pub fn event_id(&self) -> &str {
        self.object().event_id()
    }

    pub fn hash(&self) -> Result<String, HashError> {
        self.object().hash()
    }

    pub fn plugin_name(&self) -> &str {
        self.object().plugin_name()
    }

    pub fn plugin_opts(&self) -> &BTreeMap<String, String> {
        self.object().plugin_opts()
    }
}

// ------- Conversions --------

impl From<Pool> for Source {
    fn from(o: Pool) -> Self {
        Source::Pool(o)
    }
}

impl From<Node> for Source {
    fn from(o: Node) -> Self {
        Source::Node(o)
    }
}

impl From<Rule> for Source {
    fn from(o: Rule) -> Self {
        Source::Rule(o)
    }
}

impl From<VirtualService> for Source {
    fn from(o: VirtualService) -> Self {
        Source::VirtualService(o)
    }
}

impl From<Domain> for Source {
    fn from(o: Domain) -> Self {
        Source::Domain(o)
    }
}

impl From<Certificate> for Source {
    fn from(o: Certificate) -> Self {
        Source::Certificate(o)
    }
}
