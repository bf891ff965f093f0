//! File-backed NVRAM
//!
//! Records live in memory and are written through to a JSON file on every
//! change. Clones share the same records, so the identity key store and the
//! link-key store can both hold a handle.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use headset_control::{KeyValueStore, StorageError};
use log::{debug, error};

use crate::error::HostResult;

struct NvramState {
    path: PathBuf,
    records: BTreeMap<u16, Vec<u8>>,
}

impl NvramState {
    fn flush(&self) -> HostResult<()> {
        let json = serde_json::to_vec_pretty(&self.records)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Handle to the JSON-backed record store
#[derive(Clone)]
pub struct FileNvram {
    state: Arc<Mutex<NvramState>>,
}

impl FileNvram {
    /// Open `path`, starting empty if it does not exist yet
    pub fn open(path: impl AsRef<Path>) -> HostResult<Self> {
        let path = path.as_ref().to_path_buf();
        let records = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!("NVRAM {} opened", path.display());
        Ok(Self {
            state: Arc::new(Mutex::new(NvramState { path, records })),
        })
    }

    /// Raw copy of record `id`
    pub fn get(&self, id: u16) -> Option<Vec<u8>> {
        let state = self.state.lock().ok()?;
        state.records.get(&id).cloned()
    }
}

impl KeyValueStore for FileNvram {
    fn read(&mut self, id: u16, buf: &mut [u8]) -> Result<usize, StorageError> {
        let state = self.state.lock().map_err(|_| StorageError::Io)?;
        let record = state.records.get(&id).ok_or(StorageError::NotFound)?;
        if record.len() != buf.len() {
            return Err(StorageError::LengthMismatch {
                expected: buf.len(),
                actual: record.len(),
            });
        }
        buf.copy_from_slice(record);
        Ok(record.len())
    }

    fn write(&mut self, id: u16, data: &[u8]) -> Result<usize, StorageError> {
        let mut state = self.state.lock().map_err(|_| StorageError::Io)?;
        let previous = state.records.insert(id, data.to_vec());
        if let Err(e) = state.flush() {
            error!("NVRAM flush failed: {}", e);
            // keep memory consistent with what is on disk
            match previous {
                Some(old) => state.records.insert(id, old),
                None => state.records.remove(&id),
            };
            return Err(StorageError::Io);
        }
        Ok(data.len())
    }
}
