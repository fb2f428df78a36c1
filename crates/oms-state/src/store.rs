//! StateStore: redb-backed persistence for OMS.
//!
//! Provides typed operations over package payloads, package records, and
//! config entries. The store supports both on-disk and in-memory backends
//! (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use oms_core::{Page, PageParam, TagScope};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

fn decode_record(bytes: &[u8]) -> StateResult<PackageRecord> {
    serde_json::from_slice(bytes).map_err(map_err!(Codec))
}

fn encode_record(record: &PackageRecord) -> StateResult<Vec<u8>> {
    serde_json::to_vec(record).map_err(map_err!(Codec))
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Storage))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Storage))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        txn.open_table(PACKAGE_FILES).map_err(map_err!(Storage))?;
        txn.open_table(PACKAGE_RECORDS).map_err(map_err!(Storage))?;
        txn.open_table(CONFIG_ENTRIES).map_err(map_err!(Storage))?;
        txn.commit().map_err(map_err!(Storage))?;
        Ok(())
    }

    // ── Packages ───────────────────────────────────────────────────

    /// Insert a payload and its record in one transaction.
    ///
    /// The new record starts with `tag = false` and `size` equal to the
    /// payload length.
    pub fn insert_package(&self, pkg: &NewPackage) -> StateResult<PackageRecord> {
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        let record;
        {
            let mut files = txn.open_table(PACKAGE_FILES).map_err(map_err!(Storage))?;
            let file_id = match files.last().map_err(map_err!(Read))? {
                Some((key, _)) => key.value() + 1,
                None => 1,
            };
            files
                .insert(file_id, pkg.bytes.as_slice())
                .map_err(map_err!(Write))?;

            let mut records = txn.open_table(PACKAGE_RECORDS).map_err(map_err!(Storage))?;
            let record_id = match records.last().map_err(map_err!(Read))? {
                Some((key, _)) => key.value() + 1,
                None => 1,
            };
            record = PackageRecord {
                id: record_id,
                name: pkg.name.clone(),
                app_type: pkg.app_type.clone(),
                size: pkg.bytes.len() as u64,
                file_id,
                note: pkg.note.clone(),
                tag: false,
                sha256: pkg.sha256.clone(),
                created_at: pkg.created_at,
            };
            let value = encode_record(&record)?;
            records
                .insert(record_id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Storage))?;
        debug!(
            record_id = record.id,
            file_id = record.file_id,
            app_type = %record.app_type,
            size = record.size,
            "package stored"
        );
        Ok(record)
    }

    /// Get a package record by id.
    pub fn get_package_record(&self, id: RecordId) -> StateResult<Option<PackageRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Storage))?;
        let table = txn.open_table(PACKAGE_RECORDS).map_err(map_err!(Storage))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode_record(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Get a package payload by file id.
    pub fn get_package_file(&self, id: FileId) -> StateResult<Option<PackageFile>> {
        let txn = self.db.begin_read().map_err(map_err!(Storage))?;
        let table = txn.open_table(PACKAGE_FILES).map_err(map_err!(Storage))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(PackageFile {
                id,
                package_bytes: guard.value().to_vec(),
            })),
            None => Ok(None),
        }
    }

    /// List all package records, oldest first.
    pub fn list_package_records(&self) -> StateResult<Vec<PackageRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Storage))?;
        let table = txn.open_table(PACKAGE_RECORDS).map_err(map_err!(Storage))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(decode_record(value.value())?);
        }
        Ok(results)
    }

    /// One page of package records, newest (highest id) first.
    pub fn page_package_records(&self, param: PageParam) -> StateResult<Page<PackageRecord>> {
        let param = param.normalized();
        let txn = self.db.begin_read().map_err(map_err!(Storage))?;
        let table = txn.open_table(PACKAGE_RECORDS).map_err(map_err!(Storage))?;
        let total = table.len().map_err(map_err!(Read))?;

        let mut records = Vec::new();
        let rows = table
            .iter()
            .map_err(map_err!(Read))?
            .rev()
            .skip(param.offset() as usize)
            .take(param.size as usize);
        for entry in rows {
            let (_, value) = entry.map_err(map_err!(Read))?;
            records.push(decode_record(value.value())?);
        }
        Ok(Page { total, records })
    }

    /// Overwrite an existing record by id.
    pub fn update_package_record(&self, record: &PackageRecord) -> StateResult<()> {
        let value = encode_record(record)?;
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        let existed;
        {
            let mut table = txn.open_table(PACKAGE_RECORDS).map_err(map_err!(Storage))?;
            existed = table.get(record.id).map_err(map_err!(Read))?.is_some();
            if existed {
                table
                    .insert(record.id, value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        if !existed {
            txn.abort().map_err(map_err!(Storage))?;
            return Err(StateError::RecordNotFound(record.id));
        }
        txn.commit().map_err(map_err!(Storage))?;
        Ok(())
    }

    /// Clear the active flag on every record, or only on records of
    /// `app_type` when given. Returns the number of records changed.
    pub fn clear_tags(&self, app_type: Option<&str>) -> StateResult<u32> {
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        let cleared;
        {
            let mut table = txn.open_table(PACKAGE_RECORDS).map_err(map_err!(Storage))?;
            cleared = clear_tags_in(&mut table, app_type)?;
        }
        txn.commit().map_err(map_err!(Storage))?;
        debug!(?app_type, cleared, "package tags cleared");
        Ok(cleared)
    }

    /// Mark `id` as the active version.
    ///
    /// Clears the flag within `scope` and sets it on the target in a single
    /// transaction, so readers never observe zero or two active records
    /// mid-update.
    pub fn activate_package(&self, id: RecordId, scope: TagScope) -> StateResult<PackageRecord> {
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        let target;
        {
            let mut table = txn.open_table(PACKAGE_RECORDS).map_err(map_err!(Storage))?;
            let mut record = match table.get(id).map_err(map_err!(Read))? {
                Some(guard) => decode_record(guard.value())?,
                None => return Err(StateError::RecordNotFound(id)),
            };

            let type_filter = match scope {
                TagScope::Type => Some(record.app_type.as_str()),
                TagScope::All => None,
            };
            let cleared = clear_tags_in(&mut table, type_filter)?;

            record.tag = true;
            let value = encode_record(&record)?;
            table.insert(id, value.as_slice()).map_err(map_err!(Write))?;
            debug!(record_id = id, ?scope, cleared, "package activated");
            target = record;
        }
        txn.commit().map_err(map_err!(Storage))?;
        Ok(target)
    }

    // ── Config entries ─────────────────────────────────────────────

    /// Insert or update a config entry.
    pub fn put_config(&self, key: &str, value: &str) -> StateResult<()> {
        let entry = ConfigEntry {
            key: key.to_string(),
            value: value.to_string(),
        };
        let bytes = serde_json::to_vec(&entry).map_err(map_err!(Codec))?;
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        {
            let mut table = txn.open_table(CONFIG_ENTRIES).map_err(map_err!(Storage))?;
            table.insert(key, bytes.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Storage))?;
        debug!(%key, "config entry stored");
        Ok(())
    }

    /// Get a config value by key.
    pub fn get_config(&self, key: &str) -> StateResult<Option<String>> {
        let txn = self.db.begin_read().map_err(map_err!(Storage))?;
        let table = txn.open_table(CONFIG_ENTRIES).map_err(map_err!(Storage))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let entry: ConfigEntry =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Codec))?;
                Ok(Some(entry.value))
            }
            None => Ok(None),
        }
    }

    /// List all config entries in key order.
    pub fn list_config(&self) -> StateResult<Vec<ConfigEntry>> {
        let txn = self.db.begin_read().map_err(map_err!(Storage))?;
        let table = txn.open_table(CONFIG_ENTRIES).map_err(map_err!(Storage))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let entry: ConfigEntry =
                serde_json::from_slice(value.value()).map_err(map_err!(Codec))?;
            results.push(entry);
        }
        Ok(results)
    }

    /// Delete a config entry. Returns true if it existed.
    pub fn delete_config(&self, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        let existed;
        {
            let mut table = txn.open_table(CONFIG_ENTRIES).map_err(map_err!(Storage))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Storage))?;
        debug!(%key, existed, "config entry deleted");
        Ok(existed)
    }
}

/// Clear tags inside an open write transaction.
fn clear_tags_in(
    table: &mut redb::Table<'_, u64, &'static [u8]>,
    app_type: Option<&str>,
) -> StateResult<u32> {
    // Collect first: the iterator borrows the table.
    let mut tagged = Vec::new();
    for entry in table.iter().map_err(map_err!(Read))? {
        let (_, value) = entry.map_err(map_err!(Read))?;
        let record = decode_record(value.value())?;
        let in_scope = app_type.is_none_or(|t| record.app_type == t);
        if record.tag && in_scope {
            tagged.push(record);
        }
    }

    for mut record in tagged.iter().cloned() {
        record.tag = false;
        let value = encode_record(&record)?;
        table
            .insert(record.id, value.as_slice())
            .map_err(map_err!(Write))?;
    }
    Ok(tagged.len() as u32)
}
