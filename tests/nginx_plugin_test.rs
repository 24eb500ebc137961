mod common;

use common::{logger, node, store_config, POOL};
use entrance::{
    register_nginx, Certificate, InMemoryStore, Plugin, PluginError, Registry, Rule, Source, VersionedStore,
    VirtualService, NGINX_PLUGIN_NAME,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Setup {
    server: MockServer,
    store: Arc<VersionedStore>,
    plugin: Arc<dyn Plugin>,
}

async fn setup() -> Setup {
    let server = MockServer::start().await;
    let store = Arc::new(VersionedStore::new(
        logger(),
        Arc::new(InMemoryStore::new()),
        store_config(),
    ));

    let mut registry = Registry::new(logger());
    register_nginx(&mut registry);
    let mut options = BTreeMap::new();
    options.insert("httpapi".to_string(), server.uri());
    options.insert("streamapi".to_string(), server.uri());
    let plugin = registry.get_plugin(NGINX_PLUGIN_NAME, &options, &store).unwrap();

    Setup { server, store, plugin }
}

fn rule(domain: &str, https: bool) -> Rule {
    Rule {
        name: "t1_svcA_80_1a2b3c4d.Rule".to_string(),
        index: 1,
        domain_name: domain.to_string(),
        pool_name: POOL.to_string(),
        https,
        certificate_name: if https { "example-cert".to_string() } else { String::new() },
        ..Rule::default()
    }
}

#[tokio::test]
async fn https_rule_posts_pool_server_and_custom_domain() {
    // -- setup --
    let s = setup().await;
    s.store
        .add_source(&Source::Node(node("podX_80.Node", "10.0.0.5", true, 1)))
        .await
        .unwrap();

    Mock::given(method("POST"))
        .and(path("/server/80/svcA/t1"))
        .and(body_string_contains("upstream=10.0.0.5%3A8080"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&s.server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/server/www.example.com/{}", POOL).as_str()))
        .and(body_string_contains("https=https"))
        .and(body_string_contains("cert_name=example-cert"))
        .and(body_string_contains("upstream=10.0.0.5%3A8080"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&s.server)
        .await;

    // -- execute --
    let result = s.plugin.add_rule(&[rule("www.example.com", true)]).await;

    // -- verify --
    assert!(result.is_ok(), "{:?}", result);
}

#[tokio::test]
async fn platform_domain_without_nodes_uses_placeholder_upstream() {
    let s = setup().await;

    Mock::given(method("POST"))
        .and(path("/server/80/svcA/t1"))
        .and(body_string_contains("upstream=128.0.0.1%3A65533"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&s.server)
        .await;

    let result = s.plugin.add_rule(&[rule("80.svcA.t1.apps.example.com", false)]).await;

    assert!(result.is_ok(), "{:?}", result);
}

#[tokio::test]
async fn http_node_delete_removes_pool_and_domain_upstreams() {
    // -- setup --
    let s = setup().await;
    s.store
        .add_source(&Source::Rule(rule("www.example.com", false)))
        .await
        .unwrap();

    Mock::given(method("DELETE"))
        .and(path("/upstream/server/80/svcA/t1"))
        .and(body_string_contains("upstream=10.0.0.5%3A8080"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&s.server)
        .await;
    // Already gone is fine.
    Mock::given(method("DELETE"))
        .and(path("/upstream/server/www.example.com"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&s.server)
        .await;

    // -- execute --
    let result = s
        .plugin
        .delete_node(&[node("podX_80.Node", "10.0.0.5", false, 2)])
        .await;

    // -- verify --
    assert!(result.is_ok(), "{:?}", result);
}

#[tokio::test]
async fn stream_node_is_added_to_virtual_service_upstream() {
    let s = setup().await;
    let vs = VirtualService {
        name: "t1@svcA_80.VS".to_string(),
        index: 1,
        port: 9000,
        protocol: "tcp".to_string(),
        default_pool_name: POOL.to_string(),
        ..VirtualService::default()
    };
    s.store.add_source(&Source::VirtualService(vs)).await.unwrap();

    Mock::given(method("POST"))
        .and(path(format!("/upstream/stream/{}/9000", POOL).as_str()))
        .and(body_string_contains("upstream=10.0.0.5%3A8080"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&s.server)
        .await;

    let mut stream_node = node("podX_80.Node", "10.0.0.5", true, 1);
    stream_node.protocol = "tcp".to_string();
    let result = s.plugin.add_node(&[stream_node]).await;

    assert!(result.is_ok(), "{:?}", result);
}

#[tokio::test]
async fn backend_rejection_is_reported() {
    let s = setup().await;

    Mock::given(method("DELETE"))
        .and(path(format!("/server/www.example.com/{}", POOL).as_str()))
        .respond_with(ResponseTemplate::new(500))
        .mount(&s.server)
        .await;

    let result = s.plugin.delete_rule(&[rule("www.example.com", false)]).await;

    match result {
        Err(PluginError::Rejected { method, status, .. }) => {
            assert_eq!(method, "DELETE");
            assert_eq!(status, 500);
        }
        other => panic!("Unexpected result {:?}", other),
    }
}

#[tokio::test]
async fn certificate_is_uploaded() {
    let s = setup().await;

    Mock::given(method("POST"))
        .and(path("/ssl/cert/example-cert"))
        .and(body_string_contains("cert_name=example-cert"))
        .and(body_string_contains("key="))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&s.server)
        .await;

    let certificate = Certificate {
        name: "example-cert".to_string(),
        index: 100_001,
        certificate: "CERT".to_string(),
        private_key: "KEY".to_string(),
        ..Certificate::default()
    };
    let result = s.plugin.add_certificate(&[certificate]).await;

    assert!(result.is_ok(), "{:?}", result);
}

#[tokio::test]
async fn status_requires_reachable_http_api() {
    let s = setup().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&s.server)
        .await;
    assert!(s.plugin.status().await);

    let mut registry = Registry::new(logger());
    register_nginx(&mut registry);
    let mut options = BTreeMap::new();
    options.insert("httpapi".to_string(), "http://127.0.0.1:1".to_string());
    options.insert("streamapi".to_string(), "http://127.0.0.1:1".to_string());
    options.insert("timeout_ms".to_string(), "500".to_string());
    let unreachable = registry.get_plugin(NGINX_PLUGIN_NAME, &options, &s.store).unwrap();

    assert!(!unreachable.status().await);
}
