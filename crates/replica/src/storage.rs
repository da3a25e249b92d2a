//! RocksDB-backed store.
//!
//! All operations are synchronous blocking I/O. Callers in async contexts
//! should use `spawn_blocking` if needed to avoid blocking the runtime.

use std::path::Path;

use riptide_types::{Height, SignedBlock};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Options as DbOptions, DB};

use crate::store::{BlockStore, ProcessState, ProcessStore, StoreError};

const CF_BLOCKS: &str = "blocks";
const CF_PROCESS: &str = "process";

const PROCESS_STATE_KEY: &[u8] = b"state";

/// RocksDB-based store for production use.
///
/// Column families separate the block log from process state. Values are
/// bincode-encoded; block keys are big-endian heights so iteration order is
/// height order.
pub struct RocksDbStore {
    db: DB,
}

impl RocksDbStore {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let mut opts = DbOptions::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = [CF_BLOCKS, CF_PROCESS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, DbOptions::default()));

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(RocksDbStore { db })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("missing column family {name}")))
    }

    fn block_key(height: Height) -> [u8; 8] {
        height.0.to_be_bytes()
    }
}

impl BlockStore for RocksDbStore {
    fn append_block(&mut self, block: &SignedBlock) -> Result<(), StoreError> {
        let height = block.block.height;
        let cf = self.cf(CF_BLOCKS)?;
        let key = Self::block_key(height);
        let existing = self
            .db
            .get_cf(cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        if existing.is_some() {
            return Err(StoreError::HeightOccupied(height));
        }
        let value = bincode::serialize(block).map_err(|e| StoreError::Codec(e.to_string()))?;
        self.db
            .put_cf(cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn block_at(&self, height: Height) -> Result<Option<SignedBlock>, StoreError> {
        let cf = self.cf(CF_BLOCKS)?;
        let bytes = self
            .db
            .get_cf(cf, Self::block_key(height))
            .map_err(|e| StoreError::Database(e.to_string()))?;
        bytes
            .map(|bytes| bincode::deserialize(&bytes).map_err(|e| StoreError::Codec(e.to_string())))
            .transpose()
    }

    fn latest_height(&self) -> Result<Option<Height>, StoreError> {
        let cf = self.cf(CF_BLOCKS)?;
        let mut iter = self.db.iterator_cf(cf, rocksdb::IteratorMode::End);
        match iter.next() {
            None => Ok(None),
            Some(Err(e)) => Err(StoreError::Database(e.to_string())),
            Some(Ok((key, _))) => {
                let key: [u8; 8] = key
                    .as_ref()
                    .try_into()
                    .map_err(|_| StoreError::Codec("malformed block key".to_string()))?;
                Ok(Some(Height(u64::from_be_bytes(key))))
            }
        }
    }
}

impl ProcessStore for RocksDbStore {
    fn save_state(&mut self, state: &ProcessState) -> Result<(), StoreError> {
        let cf = self.cf(CF_PROCESS)?;
        let value = bincode::serialize(state).map_err(|e| StoreError::Codec(e.to_string()))?;
        self.db
            .put_cf(cf, PROCESS_STATE_KEY, value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn load_state(&self) -> Result<Option<ProcessState>, StoreError> {
        let cf = self.cf(CF_PROCESS)?;
        let bytes = self
            .db
            .get_cf(cf, PROCESS_STATE_KEY)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        bytes
            .map(|bytes| bincode::deserialize(&bytes).map_err(|e| StoreError::Codec(e.to_string())))
            .transpose()
    }
}
