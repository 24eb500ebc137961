mod options;
mod plugin;

pub use plugin::NginxPlugin;

use crate::plugin::{Plugin, Registry};
use std::sync::Arc;

pub const NAME: &str = "nginx";

pub fn register(registry: &mut Registry) {
    registry.register(
        NAME,
        |context| Ok(Arc::new(NginxPlugin::new(context)?) as Arc<dyn Plugin>),
        options::check,
    );
}
