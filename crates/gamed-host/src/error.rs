use std::net::SocketAddr;
use std::time::Duration;

use gamed_grains::GrainError;
use gamed_store::StoreError;
use gamed_types::{GrainAddress, RegistryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("grain {0} is unavailable")]
    GrainUnavailable(GrainAddress),
    #[error("grain {address} did not answer within {after:?}")]
    Timeout { address: GrainAddress, after: Duration },
    #[error("grain {address} failed: {source}")]
    Grain {
        address: GrainAddress,
        #[source]
        source: GrainError,
    },
    #[error("host is shutting down")]
    ShuttingDown,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("http server: {0}")]
    Serve(#[source] std::io::Error),
}
