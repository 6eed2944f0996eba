mod kv;
pub use kv::KeyValue;

mod task_env;
pub use task_env::TaskEnv;

mod user_env;
pub use user_env::{UserEnv, env_value_to_string};

/// Name of the marker file whose presence means a PKI bundle was fully generated.
pub const MARKER_FILE: &str = "existed";
