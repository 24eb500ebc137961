use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
#[error("Failed to fingerprint object: {0}")]
pub struct HashError(#[from] serde_json::Error);

/// Hex encoded sha256 of the JSON form of `view`. Callers pass a view with the bookkeeping
/// fields (index, event id) already cleared.
pub(super) fn fingerprint<T: Serialize>(view: &T) -> Result<String, HashError> {
    let json = serde_json::to_vec(view)?;
    Ok(hex::encode(Sha256::digest(&json)))
}
