use serde::{Deserialize, Deserializer};
use serde_yaml::{Number, Value};

use crate::{ModelError, TaskEnv};

/// The `env` section of a task, converted to strings when the boot spec is loaded.
///
/// A section that is not a flat mapping with string keys does not fail the load; it is kept
/// as [`UserEnv::Malformed`] and rejected when the owning task is dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEnv {
    Flat(TaskEnv),
    Malformed(String),
}

impl UserEnv {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => UserEnv::Flat(TaskEnv::new()),
            Value::Mapping(map) => {
                let mut env = TaskEnv::new();
                for (key, value) in map {
                    let Value::String(key) = key else {
                        return UserEnv::Malformed(format!(
                            "keys must be strings, found {}",
                            type_name(&key)
                        ));
                    };
                    env.push(key, env_value_to_string(&value));
                }
                UserEnv::Flat(env)
            }
            other => UserEnv::Malformed(format!("expected a mapping, found {}", type_name(&other))),
        }
    }

    /// Resolve to the converted environment, or the format error for `task`.
    pub fn resolve(&self, task: &str) -> Result<&TaskEnv, ModelError> {
        match self {
            UserEnv::Flat(env) => Ok(env),
            UserEnv::Malformed(reason) => Err(ModelError::UserEnvFormat {
                task: task.to_string(),
                reason: reason.clone(),
            }),
        }
    }
}

impl Default for UserEnv {
    fn default() -> Self {
        UserEnv::Flat(TaskEnv::new())
    }
}

impl<'de> Deserialize<'de> for UserEnv {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(UserEnv::from_value)
    }
}

/// String form of a scalar env value.
///
/// Numbers never use scientific notation or surplus precision, tagged scalars (e.g. `!!binary`)
/// contribute their raw text, and structured values fall back to their JSON encoding.
pub fn env_value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_to_string(n),
        Value::String(s) => s.clone(),
        Value::Tagged(tagged) => env_value_to_string(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

fn number_to_string(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        i.to_string()
    } else if let Some(u) = n.as_u64() {
        u.to_string()
    } else if let Some(f) = n.as_f64() {
        // f64's Display is the shortest round-trip decimal and never switches to exponents.
        f.to_string()
    } else {
        n.to_string()
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
