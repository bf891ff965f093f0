//! # Local Identity Key Store
//!
//! Caches the local identity resolving key (used for LE resolvable private
//! addresses) and mirrors it to NVRAM. Writes happen only when the key
//! actually changes, and the cache only moves once the write is confirmed.

use serde::{Deserialize, Serialize};

use crate::traits::{KeyValueStore, StorageError};

/// Size of the local identity key record
pub const LOCAL_KEY_LEN: usize = 16;

/// NVRAM record holding the local identity key
pub const NVRAM_ID_LOCAL_IRK: u16 = 0x201;

/// NVRAM record holding bonded peers' link keys (owned by the link-key store)
pub const NVRAM_ID_LINK_KEYS: u16 = 0x202;

/// Opaque 16-byte local identity key
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LocalIdentityKey(pub [u8; LOCAL_KEY_LEN]);

impl LocalIdentityKey {
    pub fn as_bytes(&self) -> &[u8; LOCAL_KEY_LEN] {
        &self.0
    }
}

/// Outcome of the last operation that touched the stored record
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PersistResult {
    #[default]
    NotLoaded,
    Success,
    Failed(StorageError),
}

/// In-memory mirror of the local identity key record
///
/// Invariant: whenever `last_result()` is `Success`, `key()` equals the last
/// value durably read from or written to storage.
pub struct IdentityKeyStore<S: KeyValueStore> {
    storage: S,
    key: LocalIdentityKey,
    result: PersistResult,
}

impl<S: KeyValueStore> IdentityKeyStore<S> {
    /// Wrap `storage` with a zeroed, not-yet-loaded cache
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            key: LocalIdentityKey::default(),
            result: PersistResult::NotLoaded,
        }
    }

    /// Load the record into the cache
    ///
    /// Any storage error or short read marks the record as failed and
    /// leaves the cache zeroed.
    pub fn restore(&mut self) -> Result<(), StorageError> {
        let mut buf = [0u8; LOCAL_KEY_LEN];
        let loaded = self
            .storage
            .read(NVRAM_ID_LOCAL_IRK, &mut buf)
            .and_then(|n| match n {
                LOCAL_KEY_LEN => Ok(()),
                actual => Err(StorageError::LengthMismatch {
                    expected: LOCAL_KEY_LEN,
                    actual,
                }),
            });

        match loaded {
            Ok(()) => {
                self.key = LocalIdentityKey(buf);
                self.result = PersistResult::Success;
                info!("local identity key restored");
                Ok(())
            }
            Err(e) => {
                self.key = LocalIdentityKey::default();
                self.result = PersistResult::Failed(e);
                warn!("local identity key restore failed: {:?}", e);
                Err(e)
            }
        }
    }

    /// Persist `new_key` if it differs from the cached value
    ///
    /// Returns `true` when a write was attempted. The cache and result are
    /// left untouched unless all 16 bytes were confirmed written.
    pub fn update(&mut self, new_key: &LocalIdentityKey) -> bool {
        if *new_key == self.key {
            debug!("local identity key unchanged, skipping write");
            return false;
        }

        match self.storage.write(NVRAM_ID_LOCAL_IRK, new_key.as_bytes()) {
            Ok(LOCAL_KEY_LEN) => {
                self.key = *new_key;
                self.result = PersistResult::Success;
                info!("local identity key updated");
            }
            Ok(n) => warn!("local identity key short write ({} bytes)", n),
            Err(e) => warn!("local identity key write failed: {:?}", e),
        }
        true
    }

    /// The cached key, if it is backed by storage
    pub fn key(&self) -> Option<&LocalIdentityKey> {
        match self.result {
            PersistResult::Success => Some(&self.key),
            _ => None,
        }
    }

    pub fn last_result(&self) -> PersistResult {
        self.result
    }

    /// Access to the underlying storage
    pub fn storage(&self) -> &S {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MockNvram {
        record: Option<[u8; LOCAL_KEY_LEN]>,
        short_read: bool,
        fail_writes: bool,
        short_writes: bool,
        writes: usize,
    }

    impl KeyValueStore for MockNvram {
        fn read(&mut self, id: u16, buf: &mut [u8]) -> Result<usize, StorageError> {
            assert_eq!(id, NVRAM_ID_LOCAL_IRK);
            let record = self.record.ok_or(StorageError::NotFound)?;
            let n = if self.short_read { 10 } else { record.len() };
            buf[..n].copy_from_slice(&record[..n]);
            Ok(n)
        }

        fn write(&mut self, id: u16, data: &[u8]) -> Result<usize, StorageError> {
            assert_eq!(id, NVRAM_ID_LOCAL_IRK);
            self.writes += 1;
            if self.fail_writes {
                return Err(StorageError::Io);
            }
            if self.short_writes {
                return Ok(data.len() / 2);
            }
            let mut record = [0u8; LOCAL_KEY_LEN];
            record.copy_from_slice(data);
            self.record = Some(record);
            Ok(data.len())
        }
    }

    #[test]
    fn test_restore_populates_cache() {
        let nvram = MockNvram {
            record: Some([0x42; LOCAL_KEY_LEN]),
            ..Default::default()
        };
        let mut store = IdentityKeyStore::new(nvram);
        assert_eq!(store.last_result(), PersistResult::NotLoaded);
        assert!(store.key().is_none());

        store.restore().unwrap();
        assert_eq!(store.last_result(), PersistResult::Success);
        assert_eq!(store.key(), Some(&LocalIdentityKey([0x42; LOCAL_KEY_LEN])));
    }

    #[test]
    fn test_restore_missing_record_marks_failure() {
        let mut store = IdentityKeyStore::new(MockNvram::default());
        assert_eq!(store.restore(), Err(StorageError::NotFound));
        assert_eq!(store.last_result(), PersistResult::Failed(StorageError::NotFound));
        assert!(store.key().is_none());
    }

    #[test]
    fn test_restore_short_read_keeps_zeroed_cache() {
        let nvram = MockNvram {
            record: Some([0x42; LOCAL_KEY_LEN]),
            short_read: true,
            ..Default::default()
        };
        let mut store = IdentityKeyStore::new(nvram);
        assert!(matches!(
            store.restore(),
            Err(StorageError::LengthMismatch { expected: 16, actual: 10 })
        ));
        assert!(store.key().is_none());

        // zeroed cache means an all-zero update is still a no-op
        assert!(!store.update(&LocalIdentityKey::default()));
    }

    #[test]
    fn test_update_same_key_writes_once() {
        let mut store = IdentityKeyStore::new(MockNvram::default());
        let key = LocalIdentityKey([9; LOCAL_KEY_LEN]);

        assert!(store.update(&key));
        assert!(!store.update(&key));
        assert_eq!(store.storage().writes, 1);
        assert_eq!(store.key(), Some(&key));
    }

    #[test]
    fn test_failed_write_leaves_cache_untouched() {
        let nvram = MockNvram {
            record: Some([1; LOCAL_KEY_LEN]),
            ..Default::default()
        };
        let mut store = IdentityKeyStore::new(nvram);
        store.restore().unwrap();

        let mut store = IdentityKeyStore {
            storage: MockNvram {
                fail_writes: true,
                ..Default::default()
            },
            ..store
        };
        assert!(store.update(&LocalIdentityKey([2; LOCAL_KEY_LEN])));
        assert_eq!(store.key(), Some(&LocalIdentityKey([1; LOCAL_KEY_LEN])));
        assert_eq!(store.last_result(), PersistResult::Success);
    }

    #[test]
    fn test_short_write_is_not_committed() {
        let nvram = MockNvram {
            short_writes: true,
            ..Default::default()
        };
        let mut store = IdentityKeyStore::new(nvram);
        let key = LocalIdentityKey([3; LOCAL_KEY_LEN]);

        assert!(store.update(&key));
        assert!(store.key().is_none());
        assert_eq!(store.last_result(), PersistResult::NotLoaded);

        // not committed, so the same key is retried next time
        assert!(store.update(&key));
        assert_eq!(store.storage().writes, 2);
    }
}
