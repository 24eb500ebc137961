mod actor;
mod event;
mod https_vs;
mod reconciler;
mod retry;

pub use actor::create;
pub use actor::EventQueueError;
pub use actor::ReconcilerActor;
pub use actor::ReconcilerClient;
pub use event::Event;
pub use event::EventMethod;
pub use https_vs::HttpsVirtualService;
pub use https_vs::HTTPS_VS_NAME;
pub use reconciler::Reconciler;
pub use retry::Backoff;
pub use retry::PluginErrorCounter;
pub use retry::RetryPolicy;
