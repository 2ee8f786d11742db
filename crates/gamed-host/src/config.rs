use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::HostError;

pub const ENV_LISTENING_PORT: &str = "GAMED_LISTENING_PORT";
pub const ENV_BIND_HOST: &str = "GAMED_BIND_HOST";
pub const ENV_STORE_DIR: &str = "GAMED_STORE_DIR";
pub const ENV_BLUEPRINTS: &str = "GAMED_BLUEPRINTS";

pub const DEFAULT_PORT: u16 = 80;

#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Gateway listen address.
    pub bind: SocketAddr,
    /// Directory for grain state; `None` keeps everything in memory.
    pub store_dir: Option<PathBuf>,
    /// JSON blueprint file; `None` uses the built-in registry.
    pub blueprints: Option<PathBuf>,
    /// Envelopes buffered per grain before senders wait.
    pub mailbox_capacity: usize,
    /// How long a client waits for a grain to answer.
    pub request_timeout: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            store_dir: None,
            blueprints: None,
            mailbox_capacity: 64,
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl HostConfig {
    /// Defaults overridden by the `GAMED_*` environment variables.
    pub fn from_env() -> Result<Self, HostError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, HostError> {
        let mut config = Self::default();
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = present(ENV_LISTENING_PORT) {
            let port = port.trim().parse::<u16>().map_err(|err| {
                HostError::Config(format!("{ENV_LISTENING_PORT}={port:?}: {err}"))
            })?;
            config.bind.set_port(port);
        }
        if let Some(host) = present(ENV_BIND_HOST) {
            let ip = host
                .trim()
                .parse::<IpAddr>()
                .map_err(|err| HostError::Config(format!("{ENV_BIND_HOST}={host:?}: {err}")))?;
            config.bind.set_ip(ip);
        }
        config.store_dir = present(ENV_STORE_DIR).map(PathBuf::from);
        config.blueprints = present(ENV_BLUEPRINTS).map(PathBuf::from);
        Ok(config)
    }
}
