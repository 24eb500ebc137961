mod common;

use common::{logger, store_config, RecordingPlugin};
use entrance::{register_nginx, InMemoryStore, Plugin, Registry, RegistryError, VersionedStore, NGINX_PLUGIN_NAME};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn store() -> Arc<VersionedStore> {
    Arc::new(VersionedStore::new(
        logger(),
        Arc::new(InMemoryStore::new()),
        store_config(),
    ))
}

fn options(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[test]
fn plugin_is_constructed_once() {
    // -- setup --
    let constructed = Arc::new(AtomicUsize::new(0));
    let counter = constructed.clone();
    let plugin = RecordingPlugin::new("counted");
    let mut registry = Registry::new(logger());
    registry.register(
        "counted",
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(plugin.clone() as Arc<dyn Plugin>)
        },
        |_| Ok(()),
    );
    let store = store();

    // -- execute --
    let first = registry.get_plugin("counted", &BTreeMap::new(), &store).unwrap();
    let second = registry.get_plugin("counted", &BTreeMap::new(), &store).unwrap();

    // -- verify --
    assert_eq!(constructed.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.created().len(), 1);
}

#[test]
fn unknown_and_missing_default() {
    let registry = Registry::new(logger());
    let store = store();

    assert!(matches!(
        registry.get_plugin("zeus", &BTreeMap::new(), &store),
        Err(RegistryError::Unknown(name)) if name == "zeus"
    ));
    assert!(matches!(
        registry.get_default_plugin(&store),
        Err(RegistryError::NoDefault)
    ));
}

#[test]
fn option_check_runs_before_construction() {
    let mut registry = Registry::new(logger());
    registry.register(
        "picky",
        |_| panic!("must not be constructed"),
        |opts| match opts.get("mode") {
            Some(_) => Ok(()),
            None => Err("missing option 'mode'".to_string()),
        },
    );

    let result = registry.get_plugin("picky", &BTreeMap::new(), &store());

    match result {
        Err(RegistryError::InvalidOptions { name, reason }) => {
            assert_eq!(name, "picky");
            assert_eq!(reason, "missing option 'mode'");
        }
        Err(e) => panic!("Unexpected error {}", e),
        Ok(_) => panic!("Plugin should not have been created"),
    }
}

#[tokio::test]
async fn nginx_registers_and_validates_endpoints() {
    // -- setup --
    let mut registry = Registry::new(logger());
    register_nginx(&mut registry);
    let store = store();

    // -- execute --
    let rejected = registry.get_plugin(
        NGINX_PLUGIN_NAME,
        &options(&[("httpapi", "ftp://a"), ("streamapi", "http://a:10003")]),
        &store,
    );
    registry.set_default(
        NGINX_PLUGIN_NAME,
        options(&[("httpapi", "http://a:10002"), ("streamapi", "http://a:10003")]),
    );
    let accepted = registry.get_default_plugin(&store);

    // -- verify --
    assert!(registry.is_registered(NGINX_PLUGIN_NAME));
    assert!(matches!(rejected, Err(RegistryError::InvalidOptions { .. })));
    assert_eq!(accepted.unwrap().name(), "nginx");
}
