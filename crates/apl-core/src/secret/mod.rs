use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, PoisonError, RwLock},
};

use apl_model::TaskEnv;

/// In-memory secret storage shared by the ingestion API and the dispatcher.
///
/// Cloning yields another handle to the same map. Secrets live for the lifetime of the
/// process: there is no deletion, expiry or persistence.
#[derive(Clone, Default)]
pub struct SecretStore {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl SecretStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a secret; last write wins.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.insert(key.into(), value.into());
    }

    /// Independent copy of every secret, ordered by key.
    ///
    /// Writers are blocked only while the copy is taken; the caller can iterate the result
    /// while ingestion continues.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Snapshot as an environment list.
    pub fn to_env(&self) -> TaskEnv {
        self.snapshot().into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SecretStore {
    // Values never reach the log.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretStore")
            .field("len", &self.len())
            .finish()
    }
}
