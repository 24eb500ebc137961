use crate::plugin::{Plugin, PluginError};
use crate::store::VersionedStore;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Everything a plugin constructor gets.
pub struct PluginContext {
    pub options: BTreeMap<String, String>,
    pub store: Arc<VersionedStore>,
    pub logger: slog::Logger,
}

type Constructor = Box<dyn Fn(PluginContext) -> Result<Arc<dyn Plugin>, PluginError> + Send + Sync>;
type OptionCheck = Box<dyn Fn(&BTreeMap<String, String>) -> Result<(), String> + Send + Sync>;

struct Registration {
    constructor: Constructor,
    check: OptionCheck,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("No plugin registered as '{0}'")]
    Unknown(String),
    #[error("Invalid options for plugin '{name}': {reason}")]
    InvalidOptions { name: String, reason: String },
    #[error("Failed to construct plugin '{name}': {error}")]
    Construction {
        name: String,
        #[source]
        error: PluginError,
    },
    #[error("No default plugin configured")]
    NoDefault,
}

/// Registry is built once at startup. Each plugin adds itself through its own `register`
/// function; instances are created on first use and then shared.
pub struct Registry {
    logger: slog::Logger,
    registrations: HashMap<String, Registration>,
    default_plugin: Option<(String, BTreeMap<String, String>)>,
    instances: Mutex<HashMap<String, Arc<dyn Plugin>>>,
}

impl Registry {
    pub fn new(logger: slog::Logger) -> Self {
        Registry {
            logger,
            registrations: HashMap::new(),
            default_plugin: None,
            instances: Mutex::new(HashMap::new()),
        }
    }

    pub fn register<C, V>(&mut self, name: &str, constructor: C, check: V)
    where
        C: Fn(PluginContext) -> Result<Arc<dyn Plugin>, PluginError> + Send + Sync + 'static,
        V: Fn(&BTreeMap<String, String>) -> Result<(), String> + Send + Sync + 'static,
    {
        let previous = self.registrations.insert(
            name.to_string(),
            Registration {
                constructor: Box::new(constructor),
                check: Box::new(check),
            },
        );
        if previous.is_some() {
            slog::warn!(self.logger, "Plugin '{}' registered twice; keeping the latest", name);
        }
    }

    /// The plugin used for objects that name none, and as the fallback when a named plugin
    /// cannot be resolved.
    pub fn set_default(&mut self, name: &str, options: BTreeMap<String, String>) {
        self.default_plugin = Some((name.to_string(), options));
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default_plugin.as_ref().map(|(name, _)| name.as_str())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registrations.contains_key(name)
    }

    /// Returns the shared instance for `name`, constructing it with `options` on first use.
    pub fn get_plugin(
        &self,
        name: &str,
        options: &BTreeMap<String, String>,
        store: &Arc<VersionedStore>,
    ) -> Result<Arc<dyn Plugin>, RegistryError> {
        let mut instances = self.instances();
        if let Some(plugin) = instances.get(name) {
            return Ok(plugin.clone());
        }

        let registration = self
            .registrations
            .get(name)
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))?;
        (registration.check)(options).map_err(|reason| RegistryError::InvalidOptions {
            name: name.to_string(),
            reason,
        })?;

        let context = PluginContext {
            options: options.clone(),
            store: store.clone(),
            logger: self.logger.new(slog::o!("Plugin" => name.to_string())),
        };
        let plugin = (registration.constructor)(context).map_err(|error| RegistryError::Construction {
            name: name.to_string(),
            error,
        })?;
        slog::info!(self.logger, "Created plugin '{}'", name);

        instances.insert(name.to_string(), plugin.clone());
        Ok(plugin)
    }

    pub fn get_default_plugin(&self, store: &Arc<VersionedStore>) -> Result<Arc<dyn Plugin>, RegistryError> {
        let (name, options) = self.default_plugin.as_ref().ok_or(RegistryError::NoDefault)?;
        self.get_plugin(name, options, store)
    }

    /// Every instance created so far.
    pub fn created(&self) -> Vec<Arc<dyn Plugin>> {
        self.instances().values().cloned().collect()
    }

    fn instances(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<dyn Plugin>>> {
        match self.instances.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
