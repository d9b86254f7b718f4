use anyhow::{Context, Result};
use kitting_anchors::QualityGateConfig;
use kitting_session::SessionConfig;
use kitting_storage::StoreConfig;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config/kitting.toml";
const DEFAULT_DATA_DIR: &str = "data";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct KittingConfig {
    pub session: SessionConfig,
    pub quality: QualityGateConfig,
    pub storage: StorageSection,
}

/// Where and how long anchor records are kept.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageSection {
    /// Directory holding the persisted history blob.
    pub data_dir: PathBuf,
    pub capacity: usize,
    /// Whole days before a record is purged.
    pub expiry_days: i64,
}

impl Default for StorageSection {
    fn default() -> Self {
        let retention = StoreConfig::default();
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            capacity: retention.capacity,
            expiry_days: retention.expiry_days,
        }
    }
}

impl StorageSection {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            capacity: self.capacity,
            expiry_days: self.expiry_days,
        }
    }
}

impl KittingConfig {
    /// Load configuration from the default path.
    pub fn load() -> Self {
        Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<KittingConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    KittingConfig::default()
                }
            },
            Err(err) => {
                if path != Path::new(DEFAULT_CONFIG_PATH)
                    || err.kind() != std::io::ErrorKind::NotFound
                {
                    warn!("Failed to read {}: {err}. Using defaults", path.display());
                } else {
                    warn!("Config not found at {}. Using defaults", path.display());
                }
                KittingConfig::default()
            }
        }
    }

    /// Save configuration to an explicit path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!(
                "kitting-config-{}",
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap()
                    .as_nanos()
            ))
            .join(name)
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let path = temp_path("partial.toml");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            "[session]\ntick_rate = 60\n\n[storage]\ncapacity = 5\n",
        )
        .unwrap();

        let cfg = KittingConfig::load_from_path(&path);
        assert_eq!(cfg.session.tick_rate, 60);
        assert_eq!(cfg.session.convergence_delay_ticks(), 90);
        assert_eq!(cfg.storage.capacity, 5);
        assert_eq!(cfg.storage.expiry_days, 365);
        assert_eq!(cfg.quality, QualityGateConfig::default());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn save_then_load_roundtrips() {
        let path = temp_path("nested/kitting.toml");
        let mut cfg = KittingConfig::default();
        cfg.quality.good_required = 2;
        cfg.storage.data_dir = PathBuf::from("/tmp/kitting-data");
        cfg.save_to_path(&path).expect("save succeeds");

        assert_eq!(KittingConfig::load_from_path(&path), cfg);
        let _ = fs::remove_dir_all(path.parent().unwrap().parent().unwrap());
    }

    #[test]
    fn unreadable_or_broken_files_fall_back() {
        let missing = temp_path("missing.toml");
        assert_eq!(KittingConfig::load_from_path(&missing), KittingConfig::default());

        let broken = temp_path("broken.toml");
        fs::create_dir_all(broken.parent().unwrap()).unwrap();
        fs::write(&broken, "[session\ntick_rate = ").unwrap();
        assert_eq!(KittingConfig::load_from_path(&broken), KittingConfig::default());
        let _ = fs::remove_dir_all(broken.parent().unwrap());
    }
}
