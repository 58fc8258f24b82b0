use std::path::{Path, PathBuf};

use lmdb::{Database, DatabaseFlags, Environment, Error as LmdbError, Transaction, WriteFlags};
use log::{debug, info, warn};
use serde_json::Value as JsonValue;

use crate::app_response::AppResponse;
use crate::collection::Collection;
use crate::config::StoreConfig;
use crate::slot_store::SlotStore;

const COLLECTIONS_DB: &str = "collections";
const MAX_DBS: u32 = 4;

/// LMDB environment holding one slot per collection.
///
/// The environment lives in `<name>.lmdb`. All collections share a single
/// named database; each key (`students`, `books`, `lendedBooks`) holds the
/// whole collection as a JSON array.
pub struct AppDbState {
    env: Option<Environment>,
    db: Database,
    path: PathBuf,
    config: StoreConfig,
}

impl AppDbState {
    /// Opens (or creates) `<name>.lmdb` with default settings.
    pub fn init(name: String) -> Result<Self, AppResponse> {
        Self::open(StoreConfig::named(name))
    }

    pub fn open(config: StoreConfig) -> Result<Self, AppResponse> {
        config.validate()?;

        let path = PathBuf::from(format!("{}.lmdb", config.name));
        std::fs::create_dir_all(&path)?;

        let (env, db) = open_environment(&path, config.map_size)?;
        info!("Opened store at {}", path.display());

        Ok(Self {
            env: Some(env),
            db,
            path,
            config,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.env.is_some()
    }

    fn env(&self) -> Result<&Environment, AppResponse> {
        self.env
            .as_ref()
            .ok_or_else(|| AppResponse::DatabaseError("Store is closed".to_string()))
    }

    /// Empties every collection slot and returns how many records were removed.
    pub fn clear_all_records(&self) -> Result<usize, AppResponse> {
        let mut removed = 0;
        for collection in Collection::ALL {
            if let Some(raw) = self.read_slot(collection.storage_key())? {
                match serde_json::from_str::<Vec<JsonValue>>(&raw) {
                    Ok(items) => removed += items.len(),
                    Err(e) => warn!("Clearing unreadable slot '{}': {e}", collection.storage_key()),
                }
            }
        }

        let env = self.env()?;
        let mut txn = env.begin_rw_txn()?;
        txn.clear_db(self.db)?;
        txn.commit()?;

        info!("Cleared {removed} records from {}", self.path.display());
        Ok(removed)
    }

    /// Closes the environment, deletes `<name>.lmdb` from disk and reopens an
    /// empty store under `name`.
    pub fn reset_database(&mut self, name: &str) -> Result<(), AppResponse> {
        self.close_database()?;

        if self.path.exists() {
            std::fs::remove_dir_all(&self.path)?;
            info!("Removed {}", self.path.display());
        }

        let config = StoreConfig {
            name: name.to_string(),
            ..self.config.clone()
        };
        *self = Self::open(config)?;
        Ok(())
    }

    /// Releases the environment. Later operations fail with `DatabaseError`.
    pub fn close_database(&mut self) -> Result<(), AppResponse> {
        match self.env.take() {
            Some(env) => {
                env.sync(true)?;
                drop(env);
                info!("Closed store at {}", self.path.display());
            }
            None => debug!("Store at {} already closed", self.path.display()),
        }
        Ok(())
    }
}

fn open_environment(path: &Path, map_size: usize) -> Result<(Environment, Database), AppResponse> {
    let env = Environment::new()
        .set_max_dbs(MAX_DBS)
        .set_map_size(map_size)
        .open(path)?;
    let db = env.create_db(Some(COLLECTIONS_DB), DatabaseFlags::empty())?;
    Ok((env, db))
}

impl SlotStore for AppDbState {
    fn read_slot(&self, key: &str) -> Result<Option<String>, AppResponse> {
        let env = self.env()?;
        let txn = env.begin_ro_txn()?;

        let raw = match txn.get(self.db, &key) {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(LmdbError::NotFound) => None,
            Err(e) => return Err(e.into()),
        };
        txn.abort();

        match raw {
            Some(bytes) => String::from_utf8(bytes).map(Some).map_err(|e| {
                AppResponse::SerializationError(format!("Slot '{key}' is not valid UTF-8: {e}"))
            }),
            None => Ok(None),
        }
    }

    fn write_slot(&self, key: &str, value: &str) -> Result<(), AppResponse> {
        let env = self.env()?;
        let mut txn = env.begin_rw_txn()?;
        txn.put(self.db, &key, &value, WriteFlags::empty())?;
        txn.commit()?;
        debug!("Wrote {} bytes to slot '{key}'", value.len());
        Ok(())
    }

    fn remove_slot(&self, key: &str) -> Result<bool, AppResponse> {
        let env = self.env()?;
        let mut txn = env.begin_rw_txn()?;
        match txn.del(self.db, &key, None) {
            Ok(()) => {
                txn.commit()?;
                Ok(true)
            }
            Err(LmdbError::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
