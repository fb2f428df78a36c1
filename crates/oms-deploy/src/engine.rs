//! Upgrade engine: installs a stored package and restarts its application.

use std::path::PathBuf;
use std::sync::Arc;

use oms_core::{Operation, TagScope, keys};
use oms_process::ProcessController;
use oms_state::{ConfigLookup, RecordId, StateError, StateStore};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{DeployError, DeployResult};
use crate::run_blocking;
use crate::staging::{self, InstallOutcome};

/// Result of a completed upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeReport {
    pub record_id: RecordId,
    pub app_type: String,
    pub install_path: PathBuf,
    pub merged_files: usize,
    pub root_files: Vec<String>,
}

/// Runs upgrades one at a time, regardless of application type.
pub struct UpgradeEngine {
    store: StateStore,
    lookup: Arc<dyn ConfigLookup>,
    controller: Arc<ProcessController>,
    tag_scope: TagScope,
    lock: Mutex<()>,
}

impl UpgradeEngine {
    pub fn new(
        store: StateStore,
        lookup: Arc<dyn ConfigLookup>,
        controller: Arc<ProcessController>,
    ) -> Self {
        Self {
            store,
            lookup,
            controller,
            tag_scope: TagScope::default(),
            lock: Mutex::new(()),
        }
    }

    /// Set which records lose their active flag on upgrade.
    pub fn with_tag_scope(mut self, scope: TagScope) -> Self {
        self.tag_scope = scope;
        self
    }

    pub fn tag_scope(&self) -> TagScope {
        self.tag_scope
    }

    /// Upgrade the application a stored package belongs to.
    ///
    /// Nothing on disk changes until the record, its app key, both config
    /// keys, and the install directory sentinel check out. The restart goes
    /// through the process controller, so its lock is taken while this one
    /// is held.
    pub async fn upgrade(&self, record_id: RecordId) -> DeployResult<UpgradeReport> {
        let _guard = self.lock.lock().await;

        let store = self.store.clone();
        let record = run_blocking(move || {
            store
                .get_package_record(record_id)?
                .ok_or_else(|| DeployError::NotFound(format!("package record {record_id}")))
        })
        .await?;
        let app_type = keys::validate_app_key(&record.app_type)
            .map_err(|e| DeployError::Validation(e.to_string()))?
            .to_string();

        let install_path = PathBuf::from(self.require(&keys::install_path(&app_type))?);
        let deploy_shell = self.require(&keys::deploy_shell(&app_type))?;
        debug!(%app_type, %deploy_shell, "deploy shell resolved");

        let dir = install_path.clone();
        let found = run_blocking(move || staging::count_root_files(&dir)).await?;
        if found != 1 {
            warn!(%app_type, path = ?install_path, found, "install directory not in steady state");
            return Err(DeployError::DirectoryStateInvalid {
                path: install_path,
                found,
            });
        }

        info!(
            record_id,
            %app_type,
            name = %record.name,
            path = ?install_path,
            "upgrade started"
        );

        let store = self.store.clone();
        let dir = install_path.clone();
        let name = record.name.clone();
        let file_id = record.file_id;
        let outcome: InstallOutcome = run_blocking(move || {
            let file = store
                .get_package_file(file_id)?
                .ok_or(StateError::FileNotFound(file_id))?;
            staging::install_package(&dir, &name, &file.package_bytes)
        })
        .await
        .inspect_err(|e| error!(record_id, %app_type, error = %e, "package install failed"))?;

        let store = self.store.clone();
        let scope = self.tag_scope;
        run_blocking(move || Ok(store.activate_package(record_id, scope)?)).await?;

        self.controller
            .operate(&app_type, Operation::Restart)
            .await
            .inspect_err(|e| error!(record_id, %app_type, error = %e, "restart after upgrade failed"))?;

        info!(
            record_id,
            %app_type,
            merged_files = outcome.merged_files,
            root_files = outcome.root_files.len(),
            "upgrade complete"
        );
        Ok(UpgradeReport {
            record_id,
            app_type,
            install_path,
            merged_files: outcome.merged_files,
            root_files: outcome.root_files,
        })
    }

    fn require(&self, key: &str) -> DeployResult<String> {
        match self.lookup.lookup(key)? {
            Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            _ => Err(DeployError::ConfigMissing(key.to_string())),
        }
    }
}
