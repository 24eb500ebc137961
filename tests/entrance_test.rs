mod common;

use common::{logger, node, pool, registry_with, RecordingPlugin, POOL};
use entrance::{
    try_create_entrance, DomainBinding, DomainProtocol, EntranceConfig, EntranceCreationError, EntranceOptions,
    Event, EventMethod, InMemoryStore, Registry, Source,
};
use std::sync::Arc;
use tokio::time::{Duration, Instant};

fn config(registry: Registry) -> EntranceConfig {
    EntranceConfig {
        instance_name: "entrance-test".to_string(),
        coordination: Arc::new(InMemoryStore::new()),
        registry,
        event_log: None,
        info_logger: logger(),
        options: EntranceOptions::default(),
    }
}

async fn eventually<F>(what: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "Timed out waiting for {}", what);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn events_flow_through_the_queue() {
    // -- setup --
    let plugin = RecordingPlugin::new("recording");
    let entrance = try_create_entrance(config(registry_with(&plugin))).await.unwrap();
    let member = node("podX_80.Node", "10.0.0.5", true, 1);

    // -- execute --
    entrance.send(Event::add(pool(1))).await.unwrap();
    entrance.send(Event::add(member.clone())).await.unwrap();
    entrance
        .submit_domain(
            EventMethod::Add,
            &DomainBinding {
                tenant: "t1".to_string(),
                service: "svcA".to_string(),
                port: 80,
                domain: "www.example.com".to_string(),
                protocol: DomainProtocol::Http,
                ..DomainBinding::default()
            },
        )
        .await
        .unwrap();

    // -- verify --
    eventually("the rule to be applied", || plugin.count("add_rule") == 1).await;
    assert_eq!(plugin.count("add_pool"), 1);
    assert_eq!(plugin.count("add_node"), 1);
    assert_eq!(plugin.count("add_domain"), 1);
    let stored = entrance.store().get_stored(&Source::Node(member)).await.unwrap();
    assert!(stored.is_online);
    assert_eq!(entrance.store().get_node_by_pool(POOL).await.unwrap().len(), 1);
    assert!(entrance.report_plugin_status().await);
    assert_eq!(entrance.plugin_errors(), 0);

    let client = entrance.client();
    entrance.shutdown().await;
    assert!(client.send(Event::add(pool(2))).await.is_err());
}

#[tokio::test]
async fn creation_requires_a_registered_default_plugin() {
    let no_default = try_create_entrance(config(Registry::new(logger()))).await;
    assert!(matches!(no_default, Err(EntranceCreationError::NoDefaultPlugin)));

    let mut registry = Registry::new(logger());
    registry.set_default("zeus", Default::default());
    let unknown = try_create_entrance(config(registry)).await;
    assert!(matches!(unknown, Err(EntranceCreationError::UnknownDefaultPlugin(name)) if name == "zeus"));

    let plugin = RecordingPlugin::new("recording");
    let mut illegal = config(registry_with(&plugin));
    illegal.options.event_queue_capacity = Some(0);
    assert!(matches!(
        try_create_entrance(illegal).await,
        Err(EntranceCreationError::IllegalOptions(_))
    ));
}
