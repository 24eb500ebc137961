//! Versioned store: every entity persisted in an envelope, with compare-and-swap arbitration
//! deciding which control-plane instance gets to mutate the backend.
mod envelope;
mod keys;
mod versioned;

pub use envelope::StoredSource;
pub use keys::KeyLayout;
pub use versioned::StoreConfig;
pub use versioned::StoreError;
pub use versioned::UpdateVerdict;
pub use versioned::VersionedStore;
