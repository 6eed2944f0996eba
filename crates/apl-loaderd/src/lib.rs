//! Boot orchestrator daemon: wires the secret API, the boot dispatcher and signal handling.

mod config;
pub use config::{AgentConfig, ConfigError};

mod server;
pub use server::Listener;

mod app;
pub use app::{AppError, Application};
