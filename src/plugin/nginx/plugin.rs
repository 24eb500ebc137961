use crate::object::{
    parse_pool_name, Certificate, Domain, Node, Pool, PoolIdentity, Rule, RuleProtocol, VirtualService,
};
use crate::plugin::nginx::options::NginxOptions;
use crate::plugin::nginx::NAME;
use crate::plugin::{Plugin, PluginContext, PluginError};
use crate::store::VersionedStore;
use reqwest::{Method, StatusCode};
use std::convert::TryFrom;
use std::sync::Arc;

// nginx rejects an empty upstream block, so pools without ready nodes point here.
const PLACEHOLDER_UPSTREAM: &str = "128.0.0.1:65533";

type Form = Vec<(&'static str, String)>;

/// NginxPlugin drives the nginx admin API: `httpapi` endpoints manage http servers and
/// certificates, `streamapi` endpoints manage stream listeners and upstreams.
pub struct NginxPlugin {
    logger: slog::Logger,
    client: reqwest::Client,
    http_apis: Vec<String>,
    stream_apis: Vec<String>,
    store: Arc<VersionedStore>,
}

impl NginxPlugin {
    pub fn new(context: PluginContext) -> Result<Self, PluginError> {
        let options = NginxOptions::try_from(&context.options).map_err(PluginError::InvalidOptions)?;
        let client = reqwest::Client::builder().timeout(options.timeout).build()?;

        Ok(NginxPlugin {
            logger: context.logger,
            client,
            http_apis: options.http_apis,
            stream_apis: options.stream_apis,
            store: context.store,
        })
    }

    async fn call(&self, method: Method, url: String, form: &[(&'static str, String)]) -> Result<(), PluginError> {
        slog::debug!(self.logger, "{} {}", method, url);

        let mut request = self.client.request(method.clone(), &url);
        if !form.is_empty() {
            request = request.form(form);
        }
        let status = request.send().await?.status();

        // Deleting something nginx never had is fine.
        if status.is_success() || (method == Method::DELETE && status == StatusCode::NOT_FOUND) {
            return Ok(());
        }
        Err(PluginError::Rejected {
            method: method.to_string(),
            url,
            status: status.as_u16(),
        })
    }

    // Every endpoint is attempted; failures are collected rather than short-circuiting.
    async fn fan_out(
        &self,
        bases: &[String],
        method: Method,
        path: &str,
        form: &[(&'static str, String)],
        errors: &mut Vec<PluginError>,
    ) {
        for base in bases {
            if let Err(e) = self.call(method.clone(), format!("{}{}", base, path), form).await {
                slog::warn!(self.logger, "nginx call failed: {}", e);
                errors.push(e);
            }
        }
    }

    async fn ready_upstreams(&self, pool_name: &str) -> Result<Vec<String>, PluginError> {
        let nodes = self.store.get_node_by_pool(pool_name).await?;
        Ok(nodes
            .iter()
            .filter(|n| n.ready && n.has_address())
            .map(Node::address)
            .collect())
    }

    async fn upstreams_or_placeholder(&self, pool_name: &str) -> Result<Vec<String>, PluginError> {
        let mut upstreams = self.ready_upstreams(pool_name).await?;
        if upstreams.is_empty() {
            upstreams.push(PLACEHOLDER_UPSTREAM.to_string());
        }
        Ok(upstreams)
    }

    async fn rules_of_pool(&self, pool_name: &str) -> Result<Vec<Rule>, PluginError> {
        let mut rules = self.store.get_rule_by_pool(RuleProtocol::Http, pool_name).await?;
        rules.extend(self.store.get_rule_by_pool(RuleProtocol::Https, pool_name).await?);
        Ok(rules)
    }

    // Registers the pool's default server and, for custom domains, the domain server.
    async fn push_domain(&self, rule: &Rule, upstreams: &[String], errors: &mut Vec<PluginError>) {
        let pool = match identity(&rule.pool_name) {
            Ok(pool) => pool,
            Err(e) => return errors.push(e),
        };
        let upstream = upstream_form(upstreams);

        let server_path = format!("/server/{}/{}/{}", pool.port, pool.service, pool.tenant);
        self.fan_out(&self.http_apis, Method::POST, &server_path, &upstream, errors)
            .await;

        if !is_custom_domain(&rule.domain_name, &pool) {
            return;
        }
        let mut form = Form::new();
        if !rule.certificate_name.is_empty() {
            if rule.https {
                form.push(("https", "https".to_string()));
                form.push(("cert_name", rule.certificate_name.clone()));
            } else if rule.transfer_http {
                form.push(("https", "tran_https".to_string()));
                form.push(("cert_name", rule.certificate_name.clone()));
            }
        }
        form.extend(upstream);
        let domain_path = format!("/server/{}/{}", rule.domain_name, rule.pool_name);
        self.fan_out(&self.http_apis, Method::POST, &domain_path, &form, errors)
            .await;
    }

    async fn push_node(&self, node: &Node, errors: &mut Vec<PluginError>) -> Result<(), PluginError> {
        if node.is_stream() {
            match self.store.get_vs_by_pool_name(&node.pool_name).await? {
                Some(vs) => {
                    let path = format!("/upstream/stream/{}/{}", node.pool_name, vs.port);
                    let form = upstream_form(&[node.address()]);
                    self.fan_out(&self.stream_apis, Method::POST, &path, &form, errors)
                        .await;
                }
                // Adding the virtual service pushes every ready node.
                None => slog::debug!(
                    self.logger,
                    "No virtual service for stream pool '{}' yet",
                    node.pool_name
                ),
            }
            return Ok(());
        }

        let upstreams = self.ready_upstreams(&node.pool_name).await?;
        if upstreams.is_empty() {
            return Ok(());
        }
        for rule in self.rules_of_pool(&node.pool_name).await? {
            self.push_domain(&rule, &upstreams, errors).await;
        }
        Ok(())
    }

    async fn remove_node(&self, node: &Node, errors: &mut Vec<PluginError>) -> Result<(), PluginError> {
        let form = upstream_form(&[node.address()]);

        if node.is_stream() {
            if let Some(vs) = self.store.get_vs_by_pool_name(&node.pool_name).await? {
                let path = format!("/upstream/stream/{}/{}", node.pool_name, vs.port);
                self.fan_out(&self.stream_apis, Method::DELETE, &path, &form, errors)
                    .await;
            }
            return Ok(());
        }

        let pool = identity(&node.pool_name)?;
        let path = format!("/upstream/server/{}/{}/{}", pool.port, pool.service, pool.tenant);
        self.fan_out(&self.stream_apis, Method::DELETE, &path, &form, errors)
            .await;
        for rule in self.rules_of_pool(&node.pool_name).await? {
            if is_custom_domain(&rule.domain_name, &pool) {
                let path = format!("/upstream/server/{}", rule.domain_name);
                self.fan_out(&self.stream_apis, Method::DELETE, &path, &form, errors)
                    .await;
            }
        }
        Ok(())
    }

    async fn push_certificates(&self, certificates: &[Certificate]) -> Result<(), PluginError> {
        let mut errors = vec![];
        for cert in certificates {
            let form: Form = vec![
                ("cert_name", cert.name.clone()),
                ("ca", cert.certificate.clone()),
                ("key", cert.private_key.clone()),
            ];
            let path = format!("/ssl/cert/{}", cert.name);
            self.fan_out(&self.http_apis, Method::POST, &path, &form, &mut errors)
                .await;
        }
        PluginError::aggregate(errors)
    }
}

#[async_trait::async_trait]
impl Plugin for NginxPlugin {
    fn name(&self) -> &str {
        NAME
    }

    // nginx has no standalone pool object; pools materialize with their first rule or listener.
    async fn add_pool(&self, _pools: &[Pool]) -> Result<(), PluginError> {
        Ok(())
    }

    async fn update_pool(&self, _pools: &[Pool]) -> Result<(), PluginError> {
        Ok(())
    }

    async fn delete_pool(&self, pools: &[Pool]) -> Result<(), PluginError> {
        let mut errors = vec![];
        for pool in pools {
            let identity = match identity(&pool.name) {
                Ok(identity) => identity,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            let server_path = format!("/server/{}/{}/{}", identity.port, identity.service, identity.tenant);
            self.fan_out(&self.http_apis, Method::DELETE, &server_path, &[], &mut errors)
                .await;
            let stream_path = format!("/stream/{}/{}", pool.name, identity.port);
            self.fan_out(&self.stream_apis, Method::DELETE, &stream_path, &[], &mut errors)
                .await;
        }
        PluginError::aggregate(errors)
    }

    async fn get_pool(&self, _name: &str) -> Option<Pool> {
        None
    }

    async fn add_node(&self, nodes: &[Node]) -> Result<(), PluginError> {
        let mut errors = vec![];
        for node in nodes {
            if let Err(e) = self.push_node(node, &mut errors).await {
                errors.push(e);
            }
        }
        PluginError::aggregate(errors)
    }

    async fn update_node(&self, nodes: &[Node]) -> Result<(), PluginError> {
        self.add_node(nodes).await
    }

    async fn delete_node(&self, nodes: &[Node]) -> Result<(), PluginError> {
        let mut errors = vec![];
        for node in nodes {
            if let Err(e) = self.remove_node(node, &mut errors).await {
                errors.push(e);
            }
        }
        PluginError::aggregate(errors)
    }

    async fn get_node(&self, _name: &str) -> Option<Node> {
        None
    }

    async fn add_rule(&self, rules: &[Rule]) -> Result<(), PluginError> {
        let mut errors = vec![];
        for rule in rules {
            match self.upstreams_or_placeholder(&rule.pool_name).await {
                Ok(upstreams) => self.push_domain(rule, &upstreams, &mut errors).await,
                Err(e) => errors.push(e),
            }
        }
        PluginError::aggregate(errors)
    }

    async fn update_rule(&self, rules: &[Rule]) -> Result<(), PluginError> {
        self.add_rule(rules).await
    }

    async fn delete_rule(&self, rules: &[Rule]) -> Result<(), PluginError> {
        let mut errors = vec![];
        for rule in rules {
            let path = format!("/server/{}/{}", rule.domain_name, rule.pool_name);
            self.fan_out(&self.http_apis, Method::DELETE, &path, &[], &mut errors)
                .await;
        }
        PluginError::aggregate(errors)
    }

    async fn get_rule(&self, _name: &str) -> Option<Rule> {
        None
    }

    // Domains are realized entirely through their rules.
    async fn add_domain(&self, _domains: &[Domain]) -> Result<(), PluginError> {
        Ok(())
    }

    async fn update_domain(&self, _domains: &[Domain]) -> Result<(), PluginError> {
        Ok(())
    }

    async fn delete_domain(&self, _domains: &[Domain]) -> Result<(), PluginError> {
        Ok(())
    }

    async fn get_domain(&self, _name: &str) -> Option<Domain> {
        None
    }

    async fn add_virtual_service(&self, services: &[VirtualService]) -> Result<(), PluginError> {
        let mut errors = vec![];
        for vs in services {
            match self.upstreams_or_placeholder(&vs.default_pool_name).await {
                Ok(upstreams) => {
                    let path = format!("/stream/{}/{}", vs.default_pool_name, vs.port);
                    let form = upstream_form(&upstreams);
                    self.fan_out(&self.stream_apis, Method::POST, &path, &form, &mut errors)
                        .await;
                }
                Err(e) => errors.push(e),
            }
        }
        PluginError::aggregate(errors)
    }

    async fn update_virtual_service(&self, services: &[VirtualService]) -> Result<(), PluginError> {
        let mut errors = vec![];
        for vs in services {
            match self.ready_upstreams(&vs.default_pool_name).await {
                Ok(upstreams) if upstreams.is_empty() => {
                    slog::debug!(self.logger, "Skipping update of '{}' without ready nodes", vs.name)
                }
                Ok(upstreams) => {
                    let path = format!("/stream/{}/{}", vs.default_pool_name, vs.port);
                    let form = upstream_form(&upstreams);
                    self.fan_out(&self.stream_apis, Method::PUT, &path, &form, &mut errors)
                        .await;
                }
                Err(e) => errors.push(e),
            }
        }
        PluginError::aggregate(errors)
    }

    async fn delete_virtual_service(&self, services: &[VirtualService]) -> Result<(), PluginError> {
        let mut errors = vec![];
        for vs in services {
            let path = format!("/stream/{}/{}", vs.default_pool_name, vs.port);
            self.fan_out(&self.stream_apis, Method::DELETE, &path, &[], &mut errors)
                .await;
        }
        PluginError::aggregate(errors)
    }

    async fn get_virtual_service(&self, _name: &str) -> Option<VirtualService> {
        None
    }

    async fn add_certificate(&self, certificates: &[Certificate]) -> Result<(), PluginError> {
        self.push_certificates(certificates).await
    }

    async fn update_certificate(&self, certificates: &[Certificate]) -> Result<(), PluginError> {
        self.push_certificates(certificates).await
    }

    async fn delete_certificate(&self, certificates: &[Certificate]) -> Result<(), PluginError> {
        let mut errors = vec![];
        for cert in certificates {
            let form: Form = vec![("cert_name", cert.name.clone())];
            let path = format!("/ssl/cert/{}", cert.name);
            self.fan_out(&self.http_apis, Method::DELETE, &path, &form, &mut errors)
                .await;
        }
        PluginError::aggregate(errors)
    }

    async fn get_certificate(&self, _name: &str) -> Option<Certificate> {
        None
    }

    async fn stop(&self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Up when every http admin endpoint answers at all.
    async fn status(&self) -> bool {
        for base in &self.http_apis {
            if let Err(e) = self.client.get(base).send().await {
                slog::warn!(self.logger, "nginx admin endpoint {} unreachable: {}", base, e);
                return false;
            }
        }
        true
    }
}

fn identity(pool_name: &str) -> Result<PoolIdentity, PluginError> {
    parse_pool_name(pool_name).ok_or_else(|| PluginError::InvalidObject {
        name: pool_name.to_string(),
        reason: "pool name is not '<tenant>@<service>_<port>.Pool'".to_string(),
    })
}

// The platform generated domain starts with "<port>.<service>"; anything else is user supplied.
fn is_custom_domain(domain: &str, pool: &PoolIdentity) -> bool {
    !domain.starts_with(&format!("{}.{}", pool.port, pool.service))
}

fn upstream_form(upstreams: &[String]) -> Form {
    upstreams.iter().map(|u| ("upstream", u.clone())).collect()
}
