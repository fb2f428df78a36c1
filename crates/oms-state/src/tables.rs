//! redb table definitions for the OMS state store.
//!
//! Package tables use `u64` ids; config entries use their `&str` key.
//! Records and config entries are JSON-serialized; package payloads are
//! stored as raw bytes.

use redb::TableDefinition;

/// Raw package payloads keyed by file id.
pub const PACKAGE_FILES: TableDefinition<u64, &[u8]> = TableDefinition::new("package_files");

/// Package metadata keyed by record id.
pub const PACKAGE_RECORDS: TableDefinition<u64, &[u8]> = TableDefinition::new("package_records");

/// Config entries keyed by config key (e.g. `WCS_INSTALL_PATH`).
pub const CONFIG_ENTRIES: TableDefinition<&str, &[u8]> = TableDefinition::new("config_entries");
