use std::{
    net::{SocketAddr, ToSocketAddrs},
    path::PathBuf,
    time::Duration,
};

use apl_core::{PkiConfig, RegistrarConfig};
use apl_observe::{LoggerConfig, LoggerError, LoggerFormat};
use thiserror::Error;

const DEFAULT_PORT: &str = ":9090";
const DEFAULT_BOOT_SPEC: &str = "/workplace/apploader/conf/app.yml";
const DEFAULT_SUPERVISOR_DIR: &str = "/workplace/supervisord/apploader";
const DEFAULT_SUPERVISOR_TEMPLATE: &str = "conf/supervisord.ini.template";
const DEFAULT_SUPERVISORCTL: &str = "supervisorctl";
const DEFAULT_PKI_TOOL: &str = "/workplace/cvm-agent/cvmassistants/pkitool/pkitool";
const DEFAULT_PKI_CA_DIR: &str = "/workplace/encryptedData/pki";
const DEFAULT_PKI_CSR_CONF: &str = "/workplace/cvm-agent/cvmassistants/pkitool/conf/cert-conf";
const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid logger settings: {0}")]
    Logger(#[from] LoggerError),
}

/// Runtime settings of the orchestrator, read from environment variables.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Address of the secret API (`PORT`).
    pub listen: SocketAddr,
    /// Boot specification file (`CVM_CONFIG_PATH`).
    pub boot_spec: PathBuf,
    pub supervisor_dir: PathBuf,
    pub supervisor_template: PathBuf,
    pub supervisorctl: PathBuf,
    pub pki_tool: PathBuf,
    pub pki_ca_dir: PathBuf,
    pub pki_csr_conf_dir: PathBuf,
    /// Upper bound for draining the listener and the dispatcher on exit.
    pub shutdown_timeout: Duration,
    pub logger: LoggerConfig,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from `lookup`; unset and empty variables take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let listen = parse_listen(&get("PORT", DEFAULT_PORT))?;

        let timeout_raw = get("SHUTDOWN_TIMEOUT_MS", &DEFAULT_SHUTDOWN_TIMEOUT_MS.to_string());
        let timeout_ms = timeout_raw
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::Invalid {
                var: "SHUTDOWN_TIMEOUT_MS",
                value: timeout_raw.clone(),
                reason: e.to_string(),
            })?;

        let logger = LoggerConfig {
            format: get("LOG_FORMAT", "text").parse::<LoggerFormat>()?,
            level: get("LOG_LEVEL", "info"),
            ..Default::default()
        };

        Ok(Self {
            listen,
            boot_spec: get("CVM_CONFIG_PATH", DEFAULT_BOOT_SPEC).into(),
            supervisor_dir: get("SUPERVISOR_PATH", DEFAULT_SUPERVISOR_DIR).into(),
            supervisor_template: get("SUPERVISOR_TEMPLATE_PATH", DEFAULT_SUPERVISOR_TEMPLATE)
                .into(),
            supervisorctl: get("SUPERVISORCTL_PATH", DEFAULT_SUPERVISORCTL).into(),
            pki_tool: get("PKI_TOOL_PATH", DEFAULT_PKI_TOOL).into(),
            pki_ca_dir: get("PKI_CA_PATH", DEFAULT_PKI_CA_DIR).into(),
            pki_csr_conf_dir: get("PKI_CSR_CONF_PATH", DEFAULT_PKI_CSR_CONF).into(),
            shutdown_timeout: Duration::from_millis(timeout_ms),
            logger,
        })
    }

    pub fn registrar(&self) -> RegistrarConfig {
        RegistrarConfig {
            supervisor_dir: self.supervisor_dir.clone(),
            template_path: self.supervisor_template.clone(),
            supervisorctl: self.supervisorctl.clone(),
        }
    }

    pub fn pki(&self) -> PkiConfig {
        PkiConfig {
            ca_dir: self.pki_ca_dir.clone(),
            csr_conf_dir: self.pki_csr_conf_dir.clone(),
        }
    }
}

/// `:PORT` listens on all interfaces; anything else must be `HOST:PORT`.
fn parse_listen(raw: &str) -> Result<SocketAddr, ConfigError> {
    let raw = raw.trim();
    let full = match raw.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => raw.to_string(),
    };
    let invalid = |reason: String| ConfigError::Invalid {
        var: "PORT",
        value: raw.to_string(),
        reason,
    };

    if let Ok(addr) = full.parse::<SocketAddr>() {
        return Ok(addr);
    }
    full.to_socket_addrs()
        .map_err(|e| invalid(e.to_string()))?
        .next()
        .ok_or_else(|| invalid("no address resolved".into()))
}
