use crate::object::{DomainProtocol, Rule};

/// Expands the rule for a domain into the stored rule objects its protocol calls for.
///
/// `http` and `https` yield one rule. `httptohttps` and `httpandhttps` yield the https rule
/// followed by a plain http companion with the next index; for `httptohttps` the companion
/// redirects to https.
pub fn rule_variants(base: Rule, protocol: DomainProtocol) -> Vec<Rule> {
    match protocol {
        DomainProtocol::Http => vec![Rule {
            https: false,
            transfer_http: false,
            ..base
        }],
        DomainProtocol::Https => vec![Rule {
            https: true,
            transfer_http: false,
            ..base
        }],
        DomainProtocol::HttpToHttps => paired(base, true),
        DomainProtocol::HttpAndHttps => paired(base, false),
    }
}

fn paired(base: Rule, transfer_http: bool) -> Vec<Rule> {
    let secure = Rule {
        https: true,
        transfer_http: false,
        ..base
    };
    let plain = Rule {
        index: secure.index.saturating_add(1),
        https: false,
        transfer_http,
        ..secure.clone()
    };

    vec![secure, plain]
}
