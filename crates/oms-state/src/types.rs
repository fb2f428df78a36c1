//! Domain types for the OMS state store.
//!
//! Field names serialize in camelCase: records are returned verbatim by the
//! paging endpoint.

use serde::{Deserialize, Serialize};

/// Unique identifier for a stored package payload.
pub type FileId = u64;

/// Unique identifier for a package record.
pub type RecordId = u64;

/// Raw uploaded package bytes. Immutable once written and never deleted by
/// the upgrade path, so older versions stay available.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PackageFile {
    pub id: FileId,
    pub package_bytes: Vec<u8>,
}

/// Metadata for an uploaded package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PackageRecord {
    pub id: RecordId,
    /// Original upload filename, e.g. `wcs-upgrade-1.zip`.
    pub name: String,
    /// Application key this package belongs to, e.g. `WCS`.
    #[serde(rename = "type")]
    pub app_type: String,
    /// Payload length in bytes.
    pub size: u64,
    pub file_id: FileId,
    #[serde(default)]
    pub note: Option<String>,
    /// Whether this is the currently installed version.
    pub tag: bool,
    /// Hex SHA-256 of the payload.
    #[serde(default)]
    pub sha256: String,
    /// Unix timestamp (seconds) of the upload.
    #[serde(default)]
    pub created_at: u64,
}

/// A package about to be inserted. Ids and `tag` are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPackage {
    pub name: String,
    pub app_type: String,
    pub note: Option<String>,
    pub sha256: String,
    pub created_at: u64,
    pub bytes: Vec<u8>,
}

/// A key/value configuration entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
}
