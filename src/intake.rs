use crate::object::{pool_name, rule_name, rule_variants, Certificate, Domain, DomainProtocol, Rule};
use crate::reconciler::{Event, EventMethod, EventQueueError, ReconcilerClient};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

// Certificates pushed alongside a domain are only ever created, never versioned.
const CERTIFICATE_INDEX: i64 = 100_001;

/// DomainBinding routes one domain to one service port.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainBinding {
    pub tenant: String,
    pub service: String,
    pub port: u16,
    pub domain: String,
    pub protocol: DomainProtocol,
    pub event_id: String,
    pub certificate_name: String,
    pub certificate: String,
    pub private_key: String,
    pub plugin_name: String,
    pub plugin_opts: BTreeMap<String, String>,
}

/// DomainIntake expands domain bindings into the events the reconciler understands. Every
/// producer of domain changes goes through it, so rule variants are built in one place.
pub struct DomainIntake {
    index: AtomicI64,
}

impl DomainIntake {
    /// Indexes handed out start after `start_index`.
    pub fn new(start_index: i64) -> Self {
        DomainIntake {
            index: AtomicI64::new(start_index),
        }
    }

    /// Add: the domain, its rules, then the certificate if one is supplied.
    /// Delete: the rules, then the domain.
    pub fn events(&self, method: EventMethod, binding: &DomainBinding) -> Vec<Event> {
        let mut events = vec![];

        if method == EventMethod::Delete {
            let rules = rule_variants(self.rule(binding), binding.protocol);
            events.extend(rules.into_iter().map(|r| Event::new(method, r)));
            events.push(Event::new(method, self.domain(binding)));
            return events;
        }

        events.push(Event::new(method, self.domain(binding)));
        let rules = rule_variants(self.rule(binding), binding.protocol);
        events.extend(rules.into_iter().map(|r| Event::new(method, r)));
        if let Some(certificate) = certificate(binding) {
            events.push(Event::add(certificate));
        }

        events
    }

    /// Queues the events for `binding` in order.
    pub async fn submit(
        &self,
        client: &ReconcilerClient,
        method: EventMethod,
        binding: &DomainBinding,
    ) -> Result<(), EventQueueError> {
        for event in self.events(method, binding) {
            client.send(event).await?;
        }
        Ok(())
    }

    fn next_index(&self) -> i64 {
        self.index.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn domain(&self, binding: &DomainBinding) -> Domain {
        Domain {
            name: binding.domain.clone(),
            index: self.next_index(),
            event_id: binding.event_id.clone(),
            namespace: binding.tenant.clone(),
            domain: binding.domain.clone(),
            protocol: binding.protocol,
            plugin_name: binding.plugin_name.clone(),
            plugin_opts: binding.plugin_opts.clone(),
        }
    }

    fn rule(&self, binding: &DomainBinding) -> Rule {
        Rule {
            name: rule_name(&binding.tenant, &binding.service, binding.port, &binding.domain),
            index: self.next_index(),
            event_id: binding.event_id.clone(),
            namespace: binding.tenant.clone(),
            domain_name: binding.domain.clone(),
            pool_name: pool_name(&binding.tenant, &binding.service, binding.port),
            certificate_name: binding.certificate_name.clone(),
            plugin_name: binding.plugin_name.clone(),
            plugin_opts: binding.plugin_opts.clone(),
            ..Rule::default()
        }
    }
}

fn certificate(binding: &DomainBinding) -> Option<Certificate> {
    if binding.certificate_name.is_empty() || binding.certificate.is_empty() {
        return None;
    }

    Some(Certificate {
        name: binding.certificate_name.clone(),
        index: CERTIFICATE_INDEX,
        event_id: binding.event_id.clone(),
        namespace: binding.tenant.clone(),
        certificate: binding.certificate.clone(),
        private_key: binding.private_key.clone(),
        plugin_name: binding.plugin_name.clone(),
        plugin_opts: binding.plugin_opts.clone(),
    })
}
