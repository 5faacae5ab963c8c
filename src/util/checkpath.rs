//! Directory/device/file path probes shared by every driver.

use std::fs;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::path::Path;

/// Make sure `path` exists and is a usable directory, creating it if
/// `create` is set and it is absent.
///
/// Mirrors the original `checkdir`: an existing non-directory is always an
/// error, and an existing directory is checked for read+traverse access
/// (plus write access when `create` is set).
pub fn checkdir(path: &Path, create: bool, simulate: bool) -> Result<(), &'static str> {
    match fs::metadata(path) {
        Ok(meta) => {
            if !meta.is_dir() {
                return Err("not a directory");
            }
            let mode = meta.permissions().mode();
            if mode & 0o500 != 0o500 {
                return Err("no access");
            }
            if create && mode & 0o200 == 0 {
                return Err("no write access");
            }
            Ok(())
        }
        Err(_) if create => {
            if !simulate {
                fs::create_dir(path).map_err(|_| "unable to create")?;
            }
            Ok(())
        }
        Err(_) => Err("no such directory"),
    }
}

/// True if `path` names an existing block device.
pub fn checkdev(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.file_type().is_block_device())
        .unwrap_or(false)
}

/// True if `path` names an existing regular file.
pub fn checkfile(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn existing_dir_ok() {
        let dir = TempDir::new().unwrap();
        assert!(checkdir(dir.path(), false, false).is_ok());
    }

    #[test]
    fn missing_dir_without_create_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert_eq!(checkdir(&missing, false, false), Err("no such directory"));
    }

    #[test]
    fn missing_dir_with_create_is_created() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        assert!(checkdir(&sub, true, false).is_ok());
        assert!(sub.is_dir());
    }

    #[test]
    fn missing_dir_with_create_and_simulate_is_not_created() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        assert!(checkdir(&sub, true, true).is_ok());
        assert!(!sub.exists());
    }

    #[test]
    fn file_is_not_a_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("f");
        fs::write(&file, b"x").unwrap();
        assert_eq!(checkdir(&file, false, false), Err("not a directory"));
    }

    #[test]
    fn checkfile_detects_regular_files() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("f");
        fs::write(&file, b"x").unwrap();
        assert!(checkfile(&file));
        assert!(!checkdev(&file));
        assert!(!checkfile(dir.path()));
    }
}
