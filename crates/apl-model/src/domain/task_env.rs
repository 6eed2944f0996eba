use serde::{Deserialize, Serialize};

use crate::KeyValue;

/// Ordered list of environment variables handed to a task.
///
/// Entries keep their insertion order. Duplicate keys are allowed; the last entry wins both
/// for [`TaskEnv::get`] and when the list is applied to a process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskEnv(pub Vec<KeyValue>);

impl TaskEnv {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.0.iter()
    }

    /// Value of the last entry named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|kv| kv.key() == key)
            .map(|kv| kv.value())
    }

    pub fn push<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.push(KeyValue::new(key, value));
    }

    /// Concatenate `self` and `other`; entries of `other` take precedence.
    pub fn merged(&self, other: &TaskEnv) -> TaskEnv {
        let mut out = self.0.clone();
        out.extend(other.0.iter().cloned());
        TaskEnv(out)
    }

    /// Render every entry as `KEY=VALUE` and join them with `sep`.
    pub fn joined(&self, sep: &str) -> String {
        self.0
            .iter()
            .map(KeyValue::to_pair)
            .collect::<Vec<_>>()
            .join(sep)
    }
}

impl<K, V> FromIterator<(K, V)> for TaskEnv
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| KeyValue::new(k, v)).collect())
    }
}
