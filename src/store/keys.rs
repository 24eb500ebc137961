use crate::object::{Rule, RuleProtocol, Source};

/// KeyLayout maps entities to coordination store keys under one installation prefix.
///
/// ```text
/// <prefix>/pool/<pool>
/// <prefix>/node/<pool>/<node>
/// <prefix>/vs/<vs>
/// <prefix>/rule/{http,https}/<pool>/<rule>
/// <prefix>/domain/<domain>
/// <prefix>/certificate/<certificate>
/// <prefix>/lock/<pool>
/// <prefix>/lock/update/<entity key relative to prefix>
/// ```
#[derive(Debug, Clone)]
pub struct KeyLayout {
    prefix: String,
}

impl KeyLayout {
    pub fn new(prefix: &str) -> Self {
        KeyLayout {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn source(&self, source: &Source) -> String {
        match source {
            Source::Pool(pool) => self.pool(&pool.name),
            Source::Node(node) => format!("{}{}", self.nodes_of(&node.pool_name), node.name),
            Source::Rule(rule) => self.rule(rule),
            Source::VirtualService(vs) => format!("{}{}", self.virtual_services(), vs.name),
            Source::Domain(domain) => format!("{}/domain/{}", self.prefix, domain.name),
            Source::Certificate(cert) => format!("{}/certificate/{}", self.prefix, cert.name),
        }
    }

    pub fn pool(&self, pool_name: &str) -> String {
        format!("{}{}", self.pools(), pool_name)
    }

    pub fn pools(&self) -> String {
        format!("{}/pool/", self.prefix)
    }

    pub fn nodes(&self) -> String {
        format!("{}/node/", self.prefix)
    }

    pub fn nodes_of(&self, pool_name: &str) -> String {
        format!("{}{}/", self.nodes(), pool_name)
    }

    pub fn virtual_services(&self) -> String {
        format!("{}/vs/", self.prefix)
    }

    fn rule(&self, rule: &Rule) -> String {
        format!("{}{}", self.rules_of(rule.protocol(), &rule.pool_name), rule.name)
    }

    pub fn rules(&self, protocol: RuleProtocol) -> String {
        format!("{}/rule/{}/", self.prefix, protocol)
    }

    pub fn rules_of(&self, protocol: RuleProtocol, pool_name: &str) -> String {
        format!("{}{}/", self.rules(protocol), pool_name)
    }

    pub fn pool_lock(&self, pool_name: &str) -> String {
        format!("{}/lock/{}", self.prefix, pool_name)
    }

    /// Per-entity write lock. Lives outside the entity directories so listings never see it.
    pub fn update_lock(&self, entity_key: &str) -> String {
        let relative = entity_key.strip_prefix(&self.prefix).unwrap_or(entity_key);
        format!("{}/lock/update{}", self.prefix, relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Node, Pool};

    #[test]
    fn layout() {
        let keys = KeyLayout::new("/entrance/");
        let node = Node {
            name: "podX_80.Node".to_string(),
            pool_name: "t1@svcA_80.Pool".to_string(),
            ..Node::default()
        };
        let https_rule = Rule {
            name: "r.Rule".to_string(),
            pool_name: "t1@svcA_80.Pool".to_string(),
            https: true,
            ..Rule::default()
        };
        let http_rule = Rule {
            https: false,
            ..https_rule.clone()
        };

        assert_eq!(
            keys.source(&Source::Pool(Pool {
                name: "t1@svcA_80.Pool".to_string(),
                ..Pool::default()
            })),
            "/entrance/pool/t1@svcA_80.Pool"
        );
        assert_eq!(
            keys.source(&Source::Node(node)),
            "/entrance/node/t1@svcA_80.Pool/podX_80.Node"
        );
        assert_eq!(
            keys.source(&Source::Rule(https_rule)),
            "/entrance/rule/https/t1@svcA_80.Pool/r.Rule"
        );
        assert_eq!(
            keys.source(&Source::Rule(http_rule)),
            "/entrance/rule/http/t1@svcA_80.Pool/r.Rule"
        );
        assert_eq!(keys.pool_lock("t1@svcA_80.Pool"), "/entrance/lock/t1@svcA_80.Pool");
        assert_eq!(
            keys.update_lock("/entrance/vs/HTTPS.VS"),
            "/entrance/lock/update/vs/HTTPS.VS"
        );
    }
}
