//! Mapping between instance names and record files.

use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};

/// Extension of record files.
pub const RECORD_EXTENSION: &str = "json";

/// Suffix of a record being written, never picked up by listings.
const TEMP_SUFFIX: &str = "json.tmp";

/// Path of the record for `name` inside `dir`.
///
/// # Errors
///
/// Returns `StoreError::InvalidName` for names that would escape `dir`.
pub fn record_path(dir: &Path, name: &str) -> Result<PathBuf> {
    virtbmc_core::config::validate_name(name)
        .map_err(|_| StoreError::InvalidName(name.to_string()))?;
    Ok(dir.join(format!("{name}.{RECORD_EXTENSION}")))
}

/// Path of the scratch file used while replacing the record for `name`.
///
/// # Errors
///
/// Returns `StoreError::InvalidName` for names that would escape `dir`.
pub fn temp_path(dir: &Path, name: &str) -> Result<PathBuf> {
    virtbmc_core::config::validate_name(name)
        .map_err(|_| StoreError::InvalidName(name.to_string()))?;
    Ok(dir.join(format!("{name}.{TEMP_SUFFIX}")))
}

/// Returns true if `path` looks like a record file.
#[must_use]
pub fn is_record(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == RECORD_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_paths() {
        let dir = Path::new("/var/lib/virtbmc/bmc");
        assert_eq!(
            record_path(dir, "node-1").unwrap(),
            PathBuf::from("/var/lib/virtbmc/bmc/node-1.json")
        );
        assert_eq!(
            temp_path(dir, "node-1").unwrap(),
            PathBuf::from("/var/lib/virtbmc/bmc/node-1.json.tmp")
        );
    }

    #[test]
    fn escaping_names_are_rejected() {
        let dir = Path::new("/data");
        assert!(matches!(
            record_path(dir, "../etc/passwd"),
            Err(StoreError::InvalidName(_))
        ));
        assert!(matches!(record_path(dir, ".."), Err(StoreError::InvalidName(_))));
    }
}
