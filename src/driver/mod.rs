//! Workload drivers: build the descriptor list for one workload family and
//! hand it to the thread manager.

pub mod copy;
pub mod create;
pub mod verify;

use std::path::{Path, PathBuf};

/// Alpha-sorted, non-hidden regular files directly under `dir` (flat scan,
/// no recursion — see SPEC_FULL.md §9 on the single-level copy/verify model).
pub fn scan_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| !n.starts_with('.'))
        })
        .collect();
    entries.sort();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn scan_files_skips_hidden_and_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"x").unwrap();
        std::fs::write(dir.path().join(".hidden"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let files = scan_files(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|p| p.file_name().unwrap().to_str().unwrap()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }
}
