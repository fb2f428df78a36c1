//! oms.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::TagScope;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OmsConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub process: ProcessConfig,
    pub probe: ProbeConfig,
    pub upgrade: UpgradeConfig,
    /// Static config entries, consulted before the store's `config` table.
    pub settings: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8089,
            max_upload_bytes: 512 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/oms"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Prefix service-manager commands with `sudo`.
    pub elevate: bool,
    pub service_manager: String,
    /// Log and record commands instead of executing them.
    pub dry_run: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            elevate: true,
            service_manager: "systemctl".to_string(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { timeout_ms: 3000 }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeConfig {
    pub tag_scope: TagScope,
}

impl OmsConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: OmsConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `path` if given, otherwise fall back to defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Path of the redb database under the data directory.
    pub fn db_path(&self) -> PathBuf {
        self.storage.data_dir.join("oms.redb")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OmsConfig::default();
        assert_eq!(config.server.port, 8089);
        assert!(config.process.elevate);
        assert_eq!(config.upgrade.tag_scope, TagScope::Type);
        assert_eq!(config.db_path(), PathBuf::from("/var/lib/oms/oms.redb"));
    }

    #[test]
    fn test_parse_partial() {
        let toml_str = r#"
[server]
port = 9000

[upgrade]
tag_scope = "all"

[settings]
WCS_INSTALL_PATH = "/data/wcs"
"#;
        let config: OmsConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.upgrade.tag_scope, TagScope::All);
        assert_eq!(config.settings["WCS_INSTALL_PATH"], "/data/wcs");
        assert_eq!(config.probe.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_from_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oms.toml");
        let mut config = OmsConfig::default();
        config.process.dry_run = true;
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        let loaded = OmsConfig::load(Some(&path)).unwrap();
        assert!(loaded.process.dry_run);
        assert!(OmsConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
