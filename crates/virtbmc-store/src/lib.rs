//! Durable configuration records for virtbmc.
//!
//! Each managed instance is stored as one pretty-printed JSON document named
//! after the instance, under a `bmc/` directory inside the configuration
//! location:
//!
//! ```text
//! <location>/bmc/
//! ├── node-1.json
//! ├── node-2.json
//! └── notes.txt        (ignored)
//! ```
//!
//! Files that are not `*.json` records are ignored. A record that fails to
//! decode is logged and treated as absent, so one corrupt file never takes
//! down listing or recovery.
//!
//! The store does no locking of its own; callers serialize writes per name.
//!
//! # Example
//!
//! ```no_run
//! use virtbmc_store::{ConfigStore, JsonStore};
//!
//! let store = JsonStore::open("/tmp/virtbmc/bmc").unwrap();
//! for config in store.get_active().unwrap() {
//!     println!("{} listens on {}:{}", config.name, config.address, config.port);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod json;
pub mod location;
pub mod paths;

pub use error::{Result, StoreError};
pub use json::JsonStore;
pub use location::{config_location, store_path};

use virtbmc_core::{BmcConfig, RawConfig};

/// The storage trait for instance configuration records.
pub trait ConfigStore: Send + Sync {
    /// Create or overwrite the record for `config.name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    fn write(&self, config: &BmcConfig) -> Result<()>;

    /// Read a record by name.
    ///
    /// Returns `None` if the record is absent or cannot be decoded. A record
    /// holding a config for a different name counts as absent too.
    ///
    /// # Errors
    ///
    /// Returns an error for I/O failures other than a missing file.
    fn read(&self, name: &str) -> Result<Option<BmcConfig>>;

    /// Delete a record by name.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the record doesn't exist.
    fn delete(&self, name: &str) -> Result<()>;

    /// Merge `settings` into an existing record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the record doesn't exist.
    fn update(&self, name: &str, settings: &RawConfig) -> Result<()>;

    /// All readable records, sorted by name. Records that [`read`] would
    /// treat as absent are skipped.
    ///
    /// [`read`]: ConfigStore::read
    ///
    /// # Errors
    ///
    /// Returns an error if the store location cannot be listed.
    fn get_all(&self) -> Result<Vec<BmcConfig>>;

    /// Records whose `active` flag is set, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store location cannot be listed.
    fn get_active(&self) -> Result<Vec<BmcConfig>> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|config| config.active)
            .collect())
    }

    /// Set the `active` flag of an existing record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the record doesn't exist.
    fn set_active(&self, name: &str, active: bool) -> Result<()> {
        let mut settings = RawConfig::new();
        settings.insert("active".into(), active.into());
        self.update(name, &settings)
    }
}
