mod common;

use common::{harness, node, pool, POOL};
use entrance::{AuthorityError, Event, EventMethod, ResourceAuthority, Source, StartupSync, VirtualService};
use std::collections::HashSet;
use std::sync::Arc;

/// Knows a fixed set of live object names. Names in `broken` cannot be checked.
struct FixedAuthority {
    live: HashSet<String>,
    broken: HashSet<String>,
}

#[async_trait::async_trait]
impl ResourceAuthority for FixedAuthority {
    async fn is_current(&self, source: &Source) -> Result<bool, AuthorityError> {
        if self.broken.contains(source.name()) {
            return Err("authority unavailable".into());
        }
        Ok(self.live.contains(source.name()))
    }
}

fn names(names: &[&str]) -> HashSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[tokio::test]
async fn stale_objects_become_ordered_deletes() {
    // -- setup --
    let h = harness();
    let vs = VirtualService {
        name: "t1@svcA_80.VS".to_string(),
        index: 1,
        port: 9000,
        default_pool_name: POOL.to_string(),
        ..VirtualService::default()
    };
    h.reconciler.handle(Event::add(pool(1))).await;
    h.reconciler.handle(Event::add(vs)).await;
    for name in &["podX_80.Node", "podY_80.Node", "podZ_80.Node"] {
        h.reconciler.handle(Event::add(node(name, "10.0.0.5", true, 1))).await;
    }
    let authority = FixedAuthority {
        live: names(&["podX_80.Node"]),
        broken: names(&["podZ_80.Node"]),
    };
    let sync = StartupSync::new(common::logger(), h.store.clone(), Arc::new(authority));

    // -- execute --
    let events = sync.stale_events().await.unwrap();

    // -- verify --
    let deleted: Vec<&str> = events.iter().map(|e| e.source.name()).collect();
    assert_eq!(deleted, vec!["podY_80.Node", "t1@svcA_80.VS", POOL]);
    assert!(events.iter().all(|e| e.method == EventMethod::Delete));

    // Applying them removes everything but the pool, which still has members.
    for event in events {
        h.reconciler.handle(event).await;
    }
    assert_eq!(h.plugin.names("delete_node"), vec!["podY_80.Node".to_string()]);
    assert_eq!(h.plugin.count("delete_virtual_service"), 1);
    assert_eq!(h.plugin.count("delete_pool"), 0);
}
