mod common;

use common::{logger, node, pool, replica, store_config, RecordingPlugin, POOL, RECORDING};
use entrance::{Event, InMemoryStore, Reconciler, SlogEventLog, Source, StoreConfig, VersionedStore};
use std::sync::Arc;

struct Instance {
    store: Arc<VersionedStore>,
    reconciler: Arc<Reconciler>,
}

fn instance(memory: &InMemoryStore, plugin: &Arc<RecordingPlugin>, name: &str) -> Instance {
    let config = StoreConfig {
        instance_name: name.to_string(),
        ..store_config()
    };
    let (store, reconciler) = replica(
        memory,
        plugin,
        config,
        Arc::new(SlogEventLog::new(logger())),
    );

    Instance {
        store,
        reconciler: Arc::new(reconciler),
    }
}

// Both instances get the same event at the same time, each on its own task.
async fn deliver_to_both(a: &Instance, b: &Instance, event: Event) {
    let first = tokio::spawn({
        let reconciler = a.reconciler.clone();
        let event = event.clone();
        async move { reconciler.handle(event).await }
    });
    let second = tokio::spawn({
        let reconciler = b.reconciler.clone();
        async move { reconciler.handle(event).await }
    });

    first.await.unwrap();
    second.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_instances_apply_each_change_once() {
    // -- setup --
    let memory = InMemoryStore::new();
    let plugin = RecordingPlugin::new(RECORDING);
    let a = instance(&memory, &plugin, "entrance-a");
    let b = instance(&memory, &plugin, "entrance-b");
    let names: Vec<String> = (0..5).map(|i| format!("pod{}_80.Node", i)).collect();

    // -- execute --
    deliver_to_both(&a, &b, Event::add(pool(1))).await;
    for (i, name) in names.iter().enumerate() {
        let host = format!("10.0.0.{}", i + 10);
        deliver_to_both(&a, &b, Event::add(node(name, &host, true, 1))).await;
    }
    for (i, name) in names.iter().enumerate() {
        let moved = format!("10.0.1.{}", i + 10);
        deliver_to_both(&a, &b, Event::update(node(name, &moved, true, 2))).await;
    }

    // -- verify --
    assert_eq!(plugin.names("add_pool"), vec![POOL.to_string()]);
    for name in &names {
        assert_eq!(plugin.names("add_node").iter().filter(|n| *n == name).count(), 1);
        assert_eq!(plugin.names("update_node").iter().filter(|n| *n == name).count(), 1);
    }
    assert_eq!(plugin.count("add_node"), names.len());
    assert_eq!(plugin.count("update_node"), names.len());

    for name in &names {
        let stored = a
            .store
            .get_stored(&Source::Node(node(name, "", true, 0)))
            .await
            .unwrap();
        assert_eq!(stored.index, 2);
        assert!(stored.is_online);
        assert!(stored.operation == "entrance-a" || stored.operation == "entrance-b");
    }
    assert_eq!(b.store.get_all_nodes().await.unwrap().len(), names.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_pool_deletes_apply_once() {
    let memory = InMemoryStore::new();
    let plugin = RecordingPlugin::new(RECORDING);
    let a = instance(&memory, &plugin, "entrance-a");
    let b = instance(&memory, &plugin, "entrance-b");
    deliver_to_both(&a, &b, Event::add(pool(1))).await;

    deliver_to_both(&a, &b, Event::delete(pool(2))).await;

    assert_eq!(plugin.count("add_pool"), 1);
    assert_eq!(plugin.count("delete_pool"), 1);
    assert!(a.store.get_all_pools().await.unwrap().is_empty());
}
