use std::sync::Arc;
use yamon_common::HashKey;
use yamon_storage::Repository;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    /// Verifies incoming hashes and signs `/value/` responses when set.
    pub hash_key: Option<HashKey>,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repository>, hash_key: Option<HashKey>) -> Self {
        Self { repo, hash_key }
    }
}
