use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::model::{unix_now, SecretMeta, SecretRecord};

pub(crate) const SECRETS: TableDefinition<u128, &[u8]> = TableDefinition::new("secrets");

/// Outcome of [`Store::take`].
#[derive(Debug)]
pub enum TakeResult {
    /// The record was removed and is returned to the caller.
    Taken(SecretRecord),
    /// The record had expired; it was removed and must not be revealed.
    Expired,
    /// No such record, e.g. another reveal already consumed it.
    Missing,
}

/// Handle to the redb database. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    pub(crate) db: Arc<Database>,
}

impl Store {
    /// Open (or create) the database at `path` and make sure the table exists.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)
            .with_context(|| format!("open database at {}", path.display()))?;

        let write_txn = db.begin_write()?;
        write_txn.open_table(SECRETS)?;
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Insert a new record. Returns false, leaving storage untouched, if the
    /// id is already taken.
    pub fn insert(&self, record: &SecretRecord) -> Result<bool> {
        let bytes = encode(record)?;
        let key = record.id.as_u128();

        let write_txn = self.db.begin_write()?;
        let inserted = {
            let mut table = write_txn.open_table(SECRETS)?;
            if table.get(key)?.is_some() {
                false
            } else {
                table.insert(key, bytes.as_slice())?;
                true
            }
        };
        write_txn.commit()?;
        Ok(inserted)
    }

    /// Fetch a record only if it is still available at `now`.
    pub fn get_available(&self, id: Uuid, now: i64) -> Result<Option<SecretRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SECRETS)?;

        let Some(guard) = table.get(id.as_u128())? else {
            return Ok(None);
        };
        let record = decode(guard.value())?;
        if record.is_expired(now) {
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// Remove a record in a single write transaction, re-checking expiry.
    /// Concurrent callers are serialized by redb, so at most one sees `Taken`.
    pub fn take(&self, id: Uuid, now: i64) -> Result<TakeResult> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(SECRETS)?;
            let removed = table.remove(id.as_u128())?.map(|v| v.value().to_vec());
            removed
        };
        write_txn.commit()?;

        let Some(bytes) = removed else {
            return Ok(TakeResult::Missing);
        };
        let record = decode(&bytes)?;
        if record.is_expired(now) {
            return Ok(TakeResult::Expired);
        }
        Ok(TakeResult::Taken(record))
    }

    /// Delete a record by id. Returns true if it existed.
    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(SECRETS)?;
            let existed = table.remove(id.as_u128())?.is_some();
            existed
        };
        write_txn.commit()?;
        Ok(existed)
    }

    /// Metadata for every stored record, newest first. Expired rows that have
    /// not been pruned yet are included and flagged unavailable. Rows that no
    /// longer decode are skipped.
    pub fn list(&self, now: i64) -> Result<Vec<SecretMeta>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SECRETS)?;

        let mut metas = Vec::new();
        for item in table.iter()? {
            let (k, v) = item?;
            match decode(v.value()) {
                Ok(record) => metas.push(record.meta(now)),
                Err(e) => warn!(
                    id = %Uuid::from_u128(k.value()),
                    error = %e,
                    "skipping unreadable secret"
                ),
            }
        }
        metas.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(metas)
    }

    /// Number of stored records, expired or not.
    pub fn count(&self) -> Result<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SECRETS)?;
        Ok(table.len()?)
    }

    /// Delete every record expired at `now`, along with rows that no longer
    /// decode and so can never be revealed. Returns how many were removed.
    pub fn prune(&self, now: i64) -> Result<usize> {
        let write_txn = self.db.begin_write()?;
        let pruned = {
            let mut table = write_txn.open_table(SECRETS)?;

            let mut expired = Vec::new();
            for item in table.iter()? {
                let (k, v) = item?;
                match decode(v.value()) {
                    Ok(record) if record.is_expired(now) => expired.push(k.value()),
                    Ok(_) => {}
                    Err(e) => {
                        warn!(
                            id = %Uuid::from_u128(k.value()),
                            error = %e,
                            "removing unreadable secret"
                        );
                        expired.push(k.value());
                    }
                }
            }
            for key in &expired {
                table.remove(*key)?;
            }
            expired.len()
        };
        write_txn.commit()?;

        if pruned > 0 {
            debug!(pruned, "pruned expired secrets");
        }
        Ok(pruned)
    }

    /// Periodically prune expired records in the background.
    pub fn spawn_sweep(self, interval: Duration) -> tokio::task::JoinHandle<()> {
        info!(interval_secs = interval.as_secs(), "starting expiry sweep");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let store = self.clone();
                match tokio::task::spawn_blocking(move || store.prune(unix_now())).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!(error = %e, "expiry sweep failed"),
                    Err(e) => warn!(error = %e, "expiry sweep task panicked"),
                }
            }
        })
    }
}

fn encode(record: &SecretRecord) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(record, bincode::config::standard())
        .context("bincode encode secret")
}

fn decode(bytes: &[u8]) -> Result<SecretRecord> {
    let (record, _): (SecretRecord, _) =
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .context("bincode decode secret")?;
    Ok(record)
}
