//! Backend drivers. Every reverse-proxy flavor implements `Plugin`; the `Registry` maps plugin
//! names to constructors and memoizes one instance per name.
mod api;
mod nginx;
mod registry;

pub use api::Plugin;
pub use api::PluginError;
pub use nginx::register as register_nginx;
pub use nginx::NginxPlugin;
pub use nginx::NAME as NGINX_PLUGIN_NAME;
pub use registry::PluginContext;
pub use registry::Registry;
pub use registry::RegistryError;
