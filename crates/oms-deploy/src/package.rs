//! Package uploads and listing.

use std::time::{SystemTime, UNIX_EPOCH};

use oms_core::{Page, PageParam, keys};
use oms_state::{NewPackage, PackageRecord, RecordId, StateStore};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::{DeployError, DeployResult};
use crate::run_blocking;

/// An uploaded package as received from a client.
#[derive(Debug, Clone, Default)]
pub struct PackageUpload {
    /// Original filename, e.g. `wcs-upgrade-1.zip`.
    pub file_name: String,
    /// Application key the package belongs to.
    pub app_type: String,
    pub note: Option<String>,
    pub bytes: Vec<u8>,
}

/// Upload and query side of the package store.
#[derive(Clone)]
pub struct PackageStore {
    store: StateStore,
}

impl PackageStore {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// Store a package payload and its record.
    ///
    /// The archive itself is not inspected here; a broken archive is only
    /// detected when it is upgraded.
    pub async fn upload(&self, upload: PackageUpload) -> DeployResult<PackageRecord> {
        let file_name = upload.file_name.trim().to_string();
        if file_name.is_empty() {
            return Err(DeployError::Validation("uploadFile name is required".to_string()));
        }
        if upload.app_type.trim().is_empty() {
            return Err(DeployError::Validation("type is required".to_string()));
        }
        let app_type = keys::validate_app_key(&upload.app_type)
            .map_err(|e| DeployError::Validation(e.to_string()))?
            .to_string();
        let note = upload
            .note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let store = self.store.clone();
        let bytes = upload.bytes;
        let record = run_blocking(move || {
            let sha256 = hex::encode(Sha256::digest(&bytes));
            Ok(store.insert_package(&NewPackage {
                name: file_name,
                app_type,
                note,
                sha256,
                created_at: unix_now(),
                bytes,
            })?)
        })
        .await?;

        info!(
            record_id = record.id,
            app_type = %record.app_type,
            name = %record.name,
            size = record.size,
            sha256 = %record.sha256,
            "package uploaded"
        );
        Ok(record)
    }

    /// Records newest first.
    pub async fn page(&self, param: PageParam) -> DeployResult<Page<PackageRecord>> {
        let store = self.store.clone();
        run_blocking(move || Ok(store.page_package_records(param)?)).await
    }

    pub async fn get(&self, id: RecordId) -> DeployResult<PackageRecord> {
        let store = self.store.clone();
        run_blocking(move || {
            store
                .get_package_record(id)?
                .ok_or_else(|| DeployError::NotFound(format!("package record {id}")))
        })
        .await
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
