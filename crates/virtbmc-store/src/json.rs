//! JSON file storage implementation.
//!
//! This module provides the `JsonStore` implementation of the `ConfigStore` trait.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use virtbmc_core::{BmcConfig, RawConfig};

use crate::error::{Result, StoreError};
use crate::paths;
use crate::ConfigStore;

/// Directory-of-JSON-files storage implementation.
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Open the store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        tracing::debug!(path = %dir.display(), "Opened config store");
        Ok(Self { dir })
    }

    /// The directory holding the records.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Serialize a value as indented JSON.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf =
            serde_json::to_vec_pretty(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        buf.push(b'\n');
        Ok(buf)
    }

    /// Replace the record for `name` with `bytes` via a rename.
    fn replace(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = paths::record_path(&self.dir, name)?;
        let temp = paths::temp_path(&self.dir, name)?;
        fs::write(&temp, bytes)?;
        fs::rename(&temp, &path)?;
        Ok(())
    }

    /// Read the raw JSON document for `name`, `None` if the file is absent.
    fn read_document(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = paths::record_path(&self.dir, name)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Decode the record stored under `key`, logging and discarding it if it
    /// is corrupt or names a different instance.
    fn decode(path: &Path, key: &str, bytes: &[u8]) -> Option<BmcConfig> {
        let config: BmcConfig = match serde_json::from_slice(bytes) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(
                    path = %path.display(),
                    error = %e,
                    "Failed to decode config record, ignoring it"
                );
                return None;
            }
        };

        if config.name != key {
            tracing::error!(
                path = %path.display(),
                name = %config.name,
                "Config record names a different bmc, ignoring it"
            );
            return None;
        }
        Some(config)
    }
}

impl ConfigStore for JsonStore {
    fn write(&self, config: &BmcConfig) -> Result<()> {
        let bytes = Self::serialize(config)?;
        self.replace(&config.name, &bytes)
    }

    fn read(&self, name: &str) -> Result<Option<BmcConfig>> {
        let Some(bytes) = self.read_document(name)? else {
            return Ok(None);
        };
        let path = paths::record_path(&self.dir, name)?;
        Ok(Self::decode(&path, name, &bytes))
    }

    fn delete(&self, name: &str) -> Result<()> {
        let path = paths::record_path(&self.dir, name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn update(&self, name: &str, settings: &RawConfig) -> Result<()> {
        let bytes = self
            .read_document(name)?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;

        let mut document: RawConfig = match serde_json::from_slice(&bytes) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                return Err(StoreError::Serialization(format!(
                    "record {name} is not a JSON object"
                )))
            }
            Err(e) => return Err(StoreError::Serialization(e.to_string())),
        };

        for (key, value) in settings {
            document.insert(key.clone(), value.clone());
        }

        let bytes = Self::serialize(&document)?;
        self.replace(name, &bytes)
    }

    fn get_all(&self) -> Result<Vec<BmcConfig>> {
        let mut configs = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !paths::is_record(&path) {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                // removed between listing and reading
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::error!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config record, ignoring it"
                    );
                    continue;
                }
            };
            if let Some(config) = Self::decode(&path, key, &bytes) {
                configs.push(config);
            }
        }

        configs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(configs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use virtbmc_core::BaseSettings;

    fn create_test_store() -> (JsonStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path().join("bmc")).unwrap();
        (store, dir)
    }

    fn create_test_config(name: &str) -> BmcConfig {
        BaseSettings::default().to_config(name, "dummy", RawConfig::new())
    }

    #[test]
    fn config_crud() {
        let (store, _dir) = create_test_store();
        let config = create_test_config("node-1");

        // Create
        store.write(&config).unwrap();

        // Read
        let retrieved = store.read("node-1").unwrap().unwrap();
        assert_eq!(retrieved, config);
        assert!(!retrieved.active);

        // Update
        store.set_active("node-1", true).unwrap();
        let updated = store.read("node-1").unwrap().unwrap();
        assert!(updated.active);
        assert_eq!(updated.port, config.port);

        // Delete
        store.delete("node-1").unwrap();
        assert!(store.read("node-1").unwrap().is_none());
    }

    #[test]
    fn delete_missing_is_not_found() {
        let (store, _dir) = create_test_store();
        let result = store.delete("ghost");
        assert!(matches!(result, Err(StoreError::NotFound(name)) if name == "ghost"));

        store.write(&create_test_config("once")).unwrap();
        store.delete("once").unwrap();
        assert!(store.delete("once").unwrap_err().is_not_found());
    }

    #[test]
    fn update_missing_is_not_found() {
        let (store, _dir) = create_test_store();
        assert!(store.set_active("ghost", true).unwrap_err().is_not_found());
    }

    #[test]
    fn update_merges_extra_fields() {
        let (store, _dir) = create_test_store();
        store.write(&create_test_config("node-1")).unwrap();

        let mut settings = RawConfig::new();
        settings.insert("cloud".into(), json!("lab"));
        settings.insert("port".into(), json!(6230));
        store.update("node-1", &settings).unwrap();

        let config = store.read("node-1").unwrap().unwrap();
        assert_eq!(config.port, 6230);
        assert_eq!(config.extra.get("cloud"), Some(&json!("lab")));
        assert_eq!(config.driver, "dummy");
    }

    #[test]
    fn records_are_indented_json() {
        let (store, _dir) = create_test_store();
        store.write(&create_test_config("node-1")).unwrap();

        let text = fs::read_to_string(store.dir().join("node-1.json")).unwrap();
        assert!(text.contains("\n  \"name\": \"node-1\""));
    }

    #[test]
    fn corrupt_record_reads_as_absent() {
        let (store, _dir) = create_test_store();
        store.write(&create_test_config("good")).unwrap();
        fs::write(store.dir().join("bad.json"), b"{ not json").unwrap();

        assert!(store.read("bad").unwrap().is_none());

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "good");
    }

    #[test]
    fn record_under_wrong_name_is_ignored() {
        let (store, _dir) = create_test_store();
        let bytes = serde_json::to_vec(&create_test_config("a")).unwrap();
        fs::write(store.dir().join("b.json"), bytes).unwrap();

        assert!(store.read("b").unwrap().is_none());
        assert!(store.read("a").unwrap().is_none());
        assert!(store.get_all().unwrap().is_empty());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn unreadable_record_is_skipped() {
        let (store, _dir) = create_test_store();
        store.write(&create_test_config("good")).unwrap();
        store.set_active("good", true).unwrap();
        // a regular file whose reads fail with EIO
        std::os::unix::fs::symlink("/proc/self/mem", store.dir().join("zzz.json")).unwrap();

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "good");
        assert_eq!(store.get_active().unwrap().len(), 1);
    }

    #[test]
    fn unrelated_files_are_ignored() {
        let (store, _dir) = create_test_store();
        store.write(&create_test_config("node-1")).unwrap();
        fs::write(store.dir().join("test.ini"), b"[section]\nkey=value\n").unwrap();
        fs::write(store.dir().join("node-2.json.tmp"), b"{}").unwrap();
        fs::create_dir(store.dir().join("nested.json")).unwrap();

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "node-1");
    }

    #[test]
    fn get_all_and_active() {
        let (store, _dir) = create_test_store();
        for name in ["charlie", "alpha", "bravo"] {
            store.write(&create_test_config(name)).unwrap();
        }
        store.set_active("bravo", true).unwrap();

        let names: Vec<_> = store.get_all().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["alpha", "bravo", "charlie"]);

        let active = store.get_active().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "bravo");
    }

    #[test]
    fn write_overwrites() {
        let (store, _dir) = create_test_store();
        let mut config = create_test_config("node-1");
        store.write(&config).unwrap();

        config.username = "root".into();
        store.write(&config).unwrap();

        assert_eq!(store.read("node-1").unwrap().unwrap().username, "root");
        assert_eq!(store.get_all().unwrap().len(), 1);
    }
}
