//! Source tree traversal.
//!
//! `scan_source` yields one `FileRecord` per surviving file, lazily, so
//! large trees never have to be materialized up front. Each call re-walks
//! the filesystem; there is no cached state. Unreadable entries become
//! `ScanError` items and never abort the traversal.

use crate::exclude::ExcludeMatcher;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Snapshot of a single source file: everything the comparator needs
/// except the content hash, which is only computed on demand.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Absolute path of the file in the source folder.
    pub source_path: PathBuf,
    /// Path relative to the source folder root.
    pub relative_path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

/// A single entry that could not be read during traversal.
#[derive(Debug, Clone)]
pub struct ScanError {
    pub path: PathBuf,
    pub reason: String,
}

/// Walk a source folder depth-first, pruning excluded directories so their
/// subtrees are never visited. Symlinks are followed and treated as the
/// files they resolve to.
pub fn scan_source<'a>(
    root: &'a Path,
    matcher: &'a ExcludeMatcher,
) -> impl Iterator<Item = std::result::Result<FileRecord, ScanError>> + 'a {
    WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }
            let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
            !matcher.is_excluded(rel)
        })
        .filter_map(move |entry| match entry {
            Ok(entry) => {
                if !entry.file_type().is_file() {
                    return None;
                }
                let relative_path = entry
                    .path()
                    .strip_prefix(root)
                    .unwrap_or(entry.path())
                    .to_path_buf();
                let metadata = match entry.metadata() {
                    Ok(md) => md,
                    Err(e) => {
                        return Some(Err(ScanError {
                            path: entry.path().to_path_buf(),
                            reason: format!("failed to stat: {}", e),
                        }))
                    }
                };
                let modified = match metadata.modified() {
                    Ok(m) => m,
                    Err(e) => {
                        return Some(Err(ScanError {
                            path: entry.path().to_path_buf(),
                            reason: format!("no modification time: {}", e),
                        }))
                    }
                };
                Some(Ok(FileRecord {
                    source_path: entry.path().to_path_buf(),
                    relative_path,
                    size: metadata.len(),
                    modified,
                }))
            }
            Err(e) => {
                let path = e
                    .path()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_else(|| root.to_path_buf());
                Some(Err(ScanError {
                    path,
                    reason: e.to_string(),
                }))
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_scan_finds_all_files() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.txt"), "a");
        touch(&dir.path().join("sub/b.txt"), "bb");
        touch(&dir.path().join("sub/deep/c.txt"), "ccc");

        let matcher = ExcludeMatcher::new(&[]);
        let mut records: Vec<FileRecord> = scan_source(dir.path(), &matcher)
            .map(|r| r.unwrap())
            .collect();
        records.sort_by(|l, r| l.relative_path.cmp(&r.relative_path));

        let rels: Vec<&Path> = records.iter().map(|r| r.relative_path.as_path()).collect();
        assert_eq!(
            rels,
            vec![
                Path::new("a.txt"),
                Path::new("sub/b.txt"),
                Path::new("sub/deep/c.txt")
            ]
        );
        assert_eq!(records[1].size, 2);
    }

    #[test]
    fn test_excluded_directory_is_pruned() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("keep.txt"), "x");
        touch(&dir.path().join("node_modules/pkg/index.js"), "js");
        touch(&dir.path().join("node_modules/pkg/deep/more.js"), "js");

        let matcher = ExcludeMatcher::new(&["node_modules".to_string()]);
        let records: Vec<FileRecord> = scan_source(dir.path(), &matcher)
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].relative_path, Path::new("keep.txt"));
    }

    #[test]
    fn test_excluded_file_by_name() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("data.txt"), "x");
        touch(&dir.path().join("scratch.tmp"), "y");

        let matcher = ExcludeMatcher::new(&["*.tmp".to_string()]);
        let records: Vec<FileRecord> = scan_source(dir.path(), &matcher)
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].relative_path, Path::new("data.txt"));
    }

    #[test]
    fn test_scan_is_restartable() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.txt"), "a");

        let matcher = ExcludeMatcher::new(&[]);
        let first: Vec<_> = scan_source(dir.path(), &matcher).collect();
        let second: Vec<_> = scan_source(dir.path(), &matcher).collect();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_yields_error_not_abort() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("readable.txt"), "ok");
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        touch(&locked.join("hidden.txt"), "no");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let matcher = ExcludeMatcher::new(&[]);
        let results: Vec<_> = scan_source(dir.path(), &matcher).collect();

        // Restore so TempDir can clean up.
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        // Skip when running as root: permission bits do not apply there.
        if results.iter().all(|r| r.is_ok()) && results.len() == 2 {
            return;
        }
        assert!(results.iter().any(|r| r.is_ok()));
        assert!(results.iter().any(|r| r.is_err()));
    }
}
