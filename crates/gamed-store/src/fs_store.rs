use crate::{GrainStore, StoreResult, io_error};
use gamed_types::GrainAddress;
use std::{
    fmt, fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

/// Filesystem-backed store rooted at `<root>/.grains`, one file per grain:
/// `<root>/.grains/<kind>/<id>.cbor`.
#[derive(Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl fmt::Debug for FsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsStore").field("root", &self.root).finish()
    }
}

impl FsStore {
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().join(".grains");
        fs::create_dir_all(&root).map_err(|e| io_error(&root, e))?;
        Ok(Self { root })
    }

    fn grain_path(&self, address: &GrainAddress) -> PathBuf {
        self.root
            .join(address.kind.as_str())
            .join(format!("{}.cbor", address.id))
    }

    /// Write through a temp file in the same directory and rename over the target,
    /// so readers never observe a half-written snapshot.
    fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        let mut tmp = NamedTempFile::new_in(parent).map_err(|e| io_error(parent, e))?;
        tmp.write_all(bytes).map_err(|e| io_error(tmp.path(), e))?;
        tmp.as_file().sync_all().map_err(|e| io_error(tmp.path(), e))?;
        tmp.persist(path).map_err(|e| io_error(path, e.error))?;
        Ok(())
    }
}

impl GrainStore for FsStore {
    fn save_bytes(&self, address: &GrainAddress, bytes: &[u8]) -> StoreResult<()> {
        let path = self.grain_path(address);
        Self::write_atomic(&path, bytes)?;
        tracing::debug!(grain = %address, path = %path.display(), "saved grain state");
        Ok(())
    }

    fn load_bytes(&self, address: &GrainAddress) -> StoreResult<Option<Vec<u8>>> {
        let path = self.grain_path(address);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(path, err)),
        }
    }

    fn remove(&self, address: &GrainAddress) -> StoreResult<()> {
        let path = self.grain_path(address);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(path, err)),
        }
    }
}
