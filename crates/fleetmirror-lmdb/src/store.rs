use async_trait::async_trait;
use fleetmirror_core::{
    config::{LmdbConfig, SyncMode},
    error::{MirrorError, Result},
    traits::CheckpointStore,
};
use lmdb::{Cursor, Database, DatabaseFlags, Environment, EnvironmentFlags, Transaction, WriteFlags};
use std::sync::Arc;

use crate::keys::{db_names, validate_key};

/// LMDB-backed checkpoint store
///
/// Keys are mirror checkpoint keys, values are versions rendered as decimal
/// strings. Cloning is cheap and shares the environment.
#[derive(Clone)]
pub struct LmdbCheckpointStore {
    env: Arc<Environment>,
    db: Database,
    path: std::path::PathBuf,
}

impl LmdbCheckpointStore {
    pub fn open(cfg: LmdbConfig) -> Result<Self> {
        std::fs::create_dir_all(&cfg.path)?;

        let mut env_builder = Environment::new();
        env_builder.set_max_dbs(1);
        env_builder.set_map_size(cfg.map_size);

        let mut flags = EnvironmentFlags::empty();
        match cfg.sync_mode {
            SyncMode::Full => {}
            SyncMode::NoMetaSync => {
                flags.insert(EnvironmentFlags::NO_META_SYNC);
            }
            SyncMode::NoSync => {
                flags.insert(EnvironmentFlags::NO_SYNC);
            }
        }
        env_builder.set_flags(flags);

        let env = env_builder
            .open(&cfg.path)
            .map_err(|e| MirrorError::Io(std::io::Error::other(e)))?;

        let db = env
            .create_db(Some(db_names::CHECKPOINTS), DatabaseFlags::empty())
            .map_err(|e| MirrorError::Store(e.to_string()))?;

        tracing::debug!("Opened checkpoint store at {}", cfg.path.display());

        Ok(Self {
            env: Arc::new(env),
            db,
            path: cfg.path,
        })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn get_blocking(env: &Environment, db: Database, key: &str) -> Result<Option<String>> {
        let txn = env
            .begin_ro_txn()
            .map_err(|e| MirrorError::Store(e.to_string()))?;
        match txn.get(db, &key) {
            Ok(bytes) => {
                let value = std::str::from_utf8(bytes)
                    .map_err(|e| MirrorError::Serialization(e.to_string()))?
                    .to_string();
                Ok(Some(value))
            }
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(MirrorError::Store(e.to_string())),
        }
    }

    fn put_blocking(env: &Environment, db: Database, key: &str, value: &str) -> Result<()> {
        let mut txn = env
            .begin_rw_txn()
            .map_err(|e| MirrorError::Store(e.to_string()))?;
        txn.put(db, &key, &value, WriteFlags::empty())
            .map_err(|e| MirrorError::Store(e.to_string()))?;
        txn.commit().map_err(|e| MirrorError::Store(e.to_string()))
    }

    fn list_blocking(env: &Environment, db: Database) -> Result<Vec<(String, String)>> {
        let txn = env
            .begin_ro_txn()
            .map_err(|e| MirrorError::Store(e.to_string()))?;
        let mut entries = Vec::new();
        {
            let mut cursor = txn
                .open_ro_cursor(db)
                .map_err(|e| MirrorError::Store(e.to_string()))?;
            for (key, value) in cursor.iter_start() {
                let key_bytes: &[u8] = key;
                let value_bytes: &[u8] = value;
                entries.push((
                    String::from_utf8_lossy(key_bytes).into_owned(),
                    String::from_utf8_lossy(value_bytes).into_owned(),
                ));
            }
        }
        Ok(entries)
    }
}

#[async_trait]
impl CheckpointStore for LmdbCheckpointStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if !validate_key(key) {
            return Err(MirrorError::Store(format!("invalid checkpoint key: {:?}", key)));
        }
        let env = self.env.clone();
        let db = self.db;
        let key = key.to_string();

        tokio::task::spawn_blocking(move || Self::get_blocking(&env, db, &key))
            .await
            .map_err(|e| MirrorError::Store(format!("Task join error: {}", e)))?
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        if !validate_key(key) {
            return Err(MirrorError::Store(format!("invalid checkpoint key: {:?}", key)));
        }
        let env = self.env.clone();
        let db = self.db;
        let key = key.to_string();
        let value = value.to_string();

        tokio::task::spawn_blocking(move || Self::put_blocking(&env, db, &key, &value))
            .await
            .map_err(|e| MirrorError::Store(format!("Task join error: {}", e)))?
    }

    async fn list(&self) -> Result<Vec<(String, String)>> {
        let env = self.env.clone();
        let db = self.db;

        tokio::task::spawn_blocking(move || Self::list_blocking(&env, db))
            .await
            .map_err(|e| MirrorError::Store(format!("Task join error: {}", e)))?
    }

    fn store_type(&self) -> &str {
        "lmdb"
    }
}
