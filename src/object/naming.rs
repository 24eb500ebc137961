use sha2::{Digest, Sha256};

/// `<tenant>@<service>_<port>.Pool`
pub fn pool_name(tenant: &str, service: &str, port: u16) -> String {
    format!("{}@{}_{}.Pool", tenant, service, port)
}

/// `<pod>_<port>.Node`
pub fn node_name(pod: &str, port: u16) -> String {
    format!("{}_{}.Node", pod, port)
}

/// `<tenant>_<service>_<port>_<sha8(domain)>.Rule`
pub fn rule_name(tenant: &str, service: &str, port: u16, domain: &str) -> String {
    format!("{}_{}_{}_{}.Rule", tenant, service, port, sha8(domain))
}

/// First 4 bytes of the domain digest, hex encoded.
fn sha8(s: &str) -> String {
    let digest = Sha256::digest(s.as_bytes());
    hex::encode(&digest[..4])
}

/// The parts a pool name is derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolIdentity {
    pub tenant: String,
    pub service: String,
    pub port: u16,
}

/// Inverse of `pool_name`. Service names may contain '_', so the port is split off the right.
pub fn parse_pool_name(name: &str) -> Option<PoolIdentity> {
    let body = name.strip_suffix(".Pool")?;
    let (tenant, rest) = body.split_once('@')?;
    let (service, port) = rest.rsplit_once('_')?;
    if tenant.is_empty() || service.is_empty() {
        return None;
    }

    Some(PoolIdentity {
        tenant: tenant.to_string(),
        service: service.to_string(),
        port: port.parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(pool_name("t1", "svcA", 80), "t1@svcA_80.Pool");
        assert_eq!(node_name("podX", 80), "podX_80.Node");

        let rule = rule_name("t1", "svcA", 80, "www.example.com");
        assert!(rule.starts_with("t1_svcA_80_"));
        assert!(rule.ends_with(".Rule"));
        assert_eq!(rule.len(), "t1_svcA_80_".len() + 8 + ".Rule".len());
        assert_eq!(rule, rule_name("t1", "svcA", 80, "www.example.com"));
        assert_ne!(rule, rule_name("t1", "svcA", 80, "api.example.com"));
    }

    #[test]
    fn parse_round_trips_service_with_underscore() {
        let parsed = parse_pool_name(&pool_name("t1", "svc_a", 5000)).unwrap();

        assert_eq!(
            parsed,
            PoolIdentity {
                tenant: "t1".to_string(),
                service: "svc_a".to_string(),
                port: 5000,
            }
        );
    }

    #[test]
    fn parse_rejects_malformed() {
        assert_eq!(parse_pool_name("t1@svcA_80"), None);
        assert_eq!(parse_pool_name("svcA_80.Pool"), None);
        assert_eq!(parse_pool_name("t1@svcA_http.Pool"), None);
        assert_eq!(parse_pool_name("@svcA_80.Pool"), None);
    }
}
