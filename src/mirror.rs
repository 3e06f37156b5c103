//! Mirror reconciliation: remove target files whose source disappeared.
//!
//! Only the namespace of a currently configured source folder is ever
//! touched. Namespaces of folders removed from the configuration are left
//! alone so a configuration typo can never wipe old backups.

use crate::progress::{ProgressEvent, RunContext};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// What one reconciliation pass did. Deletion failures never abort the
/// pass; they end up in `errors`.
#[derive(Debug, Default)]
pub struct MirrorOutcome {
    /// Paths relative to the namespace root that were removed.
    pub deleted: Vec<PathBuf>,
    pub errors: Vec<(PathBuf, String)>,
}

/// Walk one target namespace bottom-up, delete files not present in
/// `expected`, then drop directories left empty. Files before their
/// containing directories, so emptiness checks stay accurate.
///
/// Anything at or below a prefix in `protected` is never touched: those
/// paths failed to scan this run, so their absence from `expected` proves
/// nothing about the source.
pub fn reconcile(
    namespace: &Path,
    expected: &HashSet<PathBuf>,
    protected: &HashSet<PathBuf>,
    ctx: &RunContext,
) -> MirrorOutcome {
    let mut outcome = MirrorOutcome::default();
    if !namespace.is_dir() {
        return outcome;
    }

    for entry in WalkDir::new(namespace).contents_first(true) {
        if ctx.is_cancelled() {
            break;
        }
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                let path = e
                    .path()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_else(|| namespace.to_path_buf());
                outcome.errors.push((path, e.to_string()));
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }
        let rel = match entry.path().strip_prefix(namespace) {
            Ok(r) => r.to_path_buf(),
            Err(_) => continue,
        };
        if protected.iter().any(|prefix| rel.starts_with(prefix)) {
            continue;
        }

        if entry.file_type().is_dir() {
            // Only remove directories emptied by earlier deletions.
            let is_empty = fs::read_dir(entry.path())
                .map(|mut it| it.next().is_none())
                .unwrap_or(false);
            if is_empty {
                if let Err(e) = fs::remove_dir(entry.path()) {
                    outcome.errors.push((rel, e.to_string()));
                } else {
                    debug!("Removed empty directory {}", entry.path().display());
                }
            }
        } else if !expected.contains(&rel) {
            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    debug!("Deleted {}", entry.path().display());
                    ctx.emit(ProgressEvent::Deleted {
                        relative_path: rel.clone(),
                    });
                    outcome.deleted.push(rel);
                }
                Err(e) => {
                    warn!("Failed to delete {}: {}", entry.path().display(), e);
                    outcome.errors.push((rel, e.to_string()));
                }
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "x").unwrap();
    }

    fn expected(paths: &[&str]) -> HashSet<PathBuf> {
        paths.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_removes_files_absent_from_snapshot() {
        let dir = TempDir::new().unwrap();
        let ns = dir.path().join("docs");
        touch(&ns.join("keep.txt"));
        touch(&ns.join("gone.txt"));

        let outcome = reconcile(&ns, &expected(&["keep.txt"]), &expected(&[]), &RunContext::new());

        assert_eq!(outcome.deleted, vec![PathBuf::from("gone.txt")]);
        assert!(outcome.errors.is_empty());
        assert!(ns.join("keep.txt").exists());
        assert!(!ns.join("gone.txt").exists());
    }

    #[test]
    fn test_removes_directories_left_empty() {
        let dir = TempDir::new().unwrap();
        let ns = dir.path().join("docs");
        touch(&ns.join("old/sub/file.txt"));
        touch(&ns.join("live/data.txt"));

        let outcome = reconcile(&ns, &expected(&["live/data.txt"]), &expected(&[]), &RunContext::new());

        assert_eq!(outcome.deleted, vec![PathBuf::from("old/sub/file.txt")]);
        assert!(!ns.join("old").exists());
        assert!(ns.join("live/data.txt").exists());
    }

    #[test]
    fn test_namespace_root_is_never_deleted() {
        let dir = TempDir::new().unwrap();
        let ns = dir.path().join("docs");
        touch(&ns.join("only.txt"));

        reconcile(&ns, &expected(&[]), &expected(&[]), &RunContext::new());

        // Everything inside is gone but the namespace itself survives.
        assert!(ns.is_dir());
        assert!(fs::read_dir(&ns).unwrap().next().is_none());
    }

    #[test]
    fn test_missing_namespace_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let outcome = reconcile(
            &dir.path().join("never-created"),
            &expected(&["a.txt"]),
            &expected(&[]),
            &RunContext::new(),
        );
        assert!(outcome.deleted.is_empty());
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn test_protected_prefix_is_never_deleted() {
        let dir = TempDir::new().unwrap();
        let ns = dir.path().join("docs");
        touch(&ns.join("private/secret.txt"));
        touch(&ns.join("private/deep/more.txt"));
        touch(&ns.join("gone.txt"));

        // `private` failed to scan, so nothing below it is accounted for.
        let outcome = reconcile(
            &ns,
            &expected(&[]),
            &expected(&["private"]),
            &RunContext::new(),
        );

        assert_eq!(outcome.deleted, vec![PathBuf::from("gone.txt")]);
        assert!(ns.join("private/secret.txt").exists());
        assert!(ns.join("private/deep/more.txt").exists());
    }

    #[test]
    fn test_cancellation_stops_reconciliation() {
        let dir = TempDir::new().unwrap();
        let ns = dir.path().join("docs");
        touch(&ns.join("a.txt"));
        touch(&ns.join("b.txt"));

        let ctx = RunContext::new();
        ctx.cancel();
        let outcome = reconcile(&ns, &expected(&[]), &expected(&[]), &ctx);
        assert!(outcome.deleted.is_empty());
        assert!(ns.join("a.txt").exists());
    }
}
