//! Resolution of the configuration location.
//!
//! The first of these wins:
//!
//! 1. `$VIRTBMC_CONFIG`
//! 2. `/etc/virtbmc`, if it exists
//! 3. `~/.virtbmc`

use std::path::{Path, PathBuf};

use directories::BaseDirs;

use crate::error::{Result, StoreError};

/// Environment variable overriding the configuration location.
pub const CONFIG_ENV: &str = "VIRTBMC_CONFIG";

/// System wide configuration location.
pub const SYSTEM_LOCATION: &str = "/etc/virtbmc";

/// Directory name used under the home directory.
pub const USER_DIR_NAME: &str = ".virtbmc";

/// Subdirectory of the location holding instance records.
pub const STORE_SUBDIR: &str = "bmc";

/// Resolve the configuration location from the environment.
///
/// # Errors
///
/// Returns `StoreError::Location` if no override is set, the system
/// location is missing and no home directory can be determined.
pub fn config_location() -> Result<PathBuf> {
    let env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let home = BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
    resolve(env, Path::new(SYSTEM_LOCATION), home)
}

/// Directory holding instance records for a configuration location.
#[must_use]
pub fn store_path(location: &Path) -> PathBuf {
    location.join(STORE_SUBDIR)
}

fn resolve(env: Option<PathBuf>, system: &Path, home: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = env.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(path);
    }
    if system.is_dir() {
        return Ok(system.to_path_buf());
    }
    home.map(|home| home.join(USER_DIR_NAME)).ok_or_else(|| {
        StoreError::Location(format!(
            "set {CONFIG_ENV}, create {} or provide a home directory",
            system.display()
        ))
    })
}
