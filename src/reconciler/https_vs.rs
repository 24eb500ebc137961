use crate::object::{Rule, VirtualService};

pub const HTTPS_VS_NAME: &str = "HTTPS.VS";
const HTTPS_VS_INDEX: i64 = 10_000_001;
const HTTPS_VS_DEFAULT_POOL: &str = "discard";

/// HttpsVirtualService describes the shared TLS listener. Its rule list embeds every https
/// rule, so it is rebuilt and pushed whenever one of them changes.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpsVirtualService {
    pub port: u16,
    /// Rules that always come first, ahead of the stored https rules.
    pub base_rules: Vec<String>,
}

impl Default for HttpsVirtualService {
    fn default() -> Self {
        HttpsVirtualService {
            port: 10443,
            base_rules: vec!["custom".to_string(), "httpsproxy".to_string()],
        }
    }
}

impl HttpsVirtualService {
    pub fn build(&self, https_rules: &[Rule]) -> VirtualService {
        let mut rules = self.base_rules.clone();
        rules.extend(https_rules.iter().map(|r| r.name.clone()));

        VirtualService {
            name: HTTPS_VS_NAME.to_string(),
            index: HTTPS_VS_INDEX,
            port: self.port,
            protocol: "http".to_string(),
            default_pool_name: HTTPS_VS_DEFAULT_POOL.to_string(),
            rules,
            enabled: true,
            note: "system https vs".to_string(),
            ..VirtualService::default()
        }
    }
}
