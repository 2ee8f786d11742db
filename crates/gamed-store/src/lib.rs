//! Persistence for grain state, keyed by grain address, plus filesystem and
//! in-memory backends.
//!
//! Grains snapshot their whole state on every save, so the contract is a plain
//! overwrite rather than an append log.

mod fs_store;
mod mem_store;

pub use fs_store::FsStore;
pub use mem_store::MemStore;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use gamed_types::GrainAddress;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub type StoreResult<T> = Result<T, StoreError>;
pub type DynStore = Arc<dyn GrainStore>;

/// Trait implemented by all grain state stores.
pub trait GrainStore: Send + Sync {
    /// Replace the persisted state for `address`.
    fn save_bytes(&self, address: &GrainAddress, bytes: &[u8]) -> StoreResult<()>;
    /// `Ok(None)` when nothing has been saved for `address`.
    fn load_bytes(&self, address: &GrainAddress) -> StoreResult<Option<Vec<u8>>>;
    fn remove(&self, address: &GrainAddress) -> StoreResult<()>;
}

/// Typed save/load on top of any [`GrainStore`], encoded as CBOR.
pub trait GrainStoreExt: GrainStore {
    fn save<T: Serialize>(&self, address: &GrainAddress, value: &T) -> StoreResult<()> {
        let bytes = serde_cbor::to_vec(value)?;
        self.save_bytes(address, &bytes)
    }

    fn load<T: DeserializeOwned>(&self, address: &GrainAddress) -> StoreResult<Option<T>> {
        match self.load_bytes(address)? {
            Some(bytes) => Ok(Some(serde_cbor::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl<S: GrainStore + ?Sized> GrainStoreExt for S {}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("CBOR serialization error: {0}")]
    Cbor(#[from] serde_cbor::Error),
}

pub(crate) fn io_error(path: impl Into<PathBuf>, err: io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source: err,
    }
}
