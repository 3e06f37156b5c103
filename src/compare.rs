//! Per-file change detection.
//!
//! Two compare methods are supported: `timestamp_size` (fast, default) and
//! `hash` (thorough, streams SHA-256 over both files). Under
//! `timestamp_size`, a content change that keeps size and mtime identical
//! is undetectable and stays `Skipped`; use `hash` when that matters.

use crate::diff::FileAction;
use crate::scanner::FileRecord;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::Path;
use std::time::Duration;

/// Tolerance for modification-time comparison. FAT filesystems store
/// mtimes with 2-second granularity, so anything within that window
/// counts as equal.
pub const MTIME_TOLERANCE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareMethod {
    TimestampSize,
    Hash,
}

impl Default for CompareMethod {
    fn default() -> Self {
        Self::TimestampSize
    }
}

/// Outcome of comparing one source record against its target path.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub action: FileAction,
    pub reason: Option<String>,
}

impl Comparison {
    fn action(action: FileAction) -> Self {
        Self {
            action,
            reason: None,
        }
    }

    fn error(reason: String) -> Self {
        Self {
            action: FileAction::Error,
            reason: Some(reason),
        }
    }
}

/// Decide what to do with a source file given its (possibly absent)
/// target counterpart. Never panics and never propagates I/O failures;
/// they become `Error` actions with a captured reason.
pub fn compare(record: &FileRecord, target: &Path, method: CompareMethod) -> Comparison {
    let target_meta = match std::fs::metadata(target) {
        Ok(md) => md,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Comparison::action(FileAction::New);
        }
        Err(e) => {
            return Comparison::error(format!("failed to stat target: {}", e));
        }
    };

    match method {
        CompareMethod::Hash => {
            let source_hash = match file_sha256(&record.source_path) {
                Ok(h) => h,
                Err(e) => return Comparison::error(format!("failed to hash source: {}", e)),
            };
            let target_hash = match file_sha256(target) {
                Ok(h) => h,
                Err(e) => return Comparison::error(format!("failed to hash target: {}", e)),
            };
            if source_hash == target_hash {
                Comparison::action(FileAction::Skipped)
            } else {
                Comparison::action(FileAction::Updated)
            }
        }
        CompareMethod::TimestampSize => {
            if record.size != target_meta.len() {
                return Comparison::action(FileAction::Updated);
            }
            let target_modified = match target_meta.modified() {
                Ok(m) => m,
                Err(e) => {
                    return Comparison::error(format!("no target modification time: {}", e))
                }
            };
            // Only a source that is newer beyond the tolerance forces a
            // recopy; an older source (e.g. a touched target) is left alone.
            match record.modified.duration_since(target_modified) {
                Ok(delta) if delta > MTIME_TOLERANCE => Comparison::action(FileAction::Updated),
                _ => Comparison::action(FileAction::Skipped),
            }
        }
    }
}

/// Streaming SHA-256 digest of a file.
pub fn file_sha256(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 65536];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use std::fs;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn record_for(path: &Path) -> FileRecord {
        let md = fs::metadata(path).unwrap();
        FileRecord {
            source_path: path.to_path_buf(),
            relative_path: path.file_name().unwrap().into(),
            size: md.len(),
            modified: md.modified().unwrap(),
        }
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        filetime::set_file_mtime(path, FileTime::from_system_time(time)).unwrap();
    }

    #[test]
    fn test_missing_target_is_new() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, "hello").unwrap();

        let cmp = compare(
            &record_for(&src),
            &dir.path().join("missing.txt"),
            CompareMethod::TimestampSize,
        );
        assert_eq!(cmp.action, FileAction::New);
    }

    #[test]
    fn test_identical_is_skipped() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        let tgt = dir.path().join("b.txt");
        fs::write(&src, "hello").unwrap();
        fs::write(&tgt, "hello").unwrap();
        let now = SystemTime::now();
        set_mtime(&src, now);
        set_mtime(&tgt, now);

        let cmp = compare(&record_for(&src), &tgt, CompareMethod::TimestampSize);
        assert_eq!(cmp.action, FileAction::Skipped);
    }

    #[test]
    fn test_size_change_is_updated() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        let tgt = dir.path().join("b.txt");
        fs::write(&src, "hello world").unwrap();
        fs::write(&tgt, "hello").unwrap();

        let cmp = compare(&record_for(&src), &tgt, CompareMethod::TimestampSize);
        assert_eq!(cmp.action, FileAction::Updated);
    }

    #[test]
    fn test_newer_source_is_updated_older_is_skipped() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        let tgt = dir.path().join("b.txt");
        fs::write(&src, "12345").unwrap();
        fs::write(&tgt, "12345").unwrap();

        let base = SystemTime::now();
        set_mtime(&tgt, base);
        set_mtime(&src, base + Duration::from_secs(10));
        let cmp = compare(&record_for(&src), &tgt, CompareMethod::TimestampSize);
        assert_eq!(cmp.action, FileAction::Updated);

        // Within the FAT tolerance: equal.
        set_mtime(&src, base + Duration::from_secs(1));
        let cmp = compare(&record_for(&src), &tgt, CompareMethod::TimestampSize);
        assert_eq!(cmp.action, FileAction::Skipped);

        // Target newer than source: no recopy.
        set_mtime(&src, base - Duration::from_secs(60));
        let cmp = compare(&record_for(&src), &tgt, CompareMethod::TimestampSize);
        assert_eq!(cmp.action, FileAction::Skipped);
    }

    #[test]
    fn test_hash_ignores_mtime() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        let tgt = dir.path().join("b.txt");
        fs::write(&src, "same content").unwrap();
        fs::write(&tgt, "same content").unwrap();
        set_mtime(&src, SystemTime::now());
        set_mtime(&tgt, SystemTime::now() - Duration::from_secs(3600));

        let cmp = compare(&record_for(&src), &tgt, CompareMethod::Hash);
        assert_eq!(cmp.action, FileAction::Skipped);
    }

    #[test]
    fn test_hash_detects_spoofed_timestamp() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        let tgt = dir.path().join("b.txt");
        // Same size, same mtime, different content.
        fs::write(&src, "AAAA").unwrap();
        fs::write(&tgt, "BBBB").unwrap();
        let now = SystemTime::now();
        set_mtime(&src, now);
        set_mtime(&tgt, now);

        let cmp = compare(&record_for(&src), &tgt, CompareMethod::Hash);
        assert_eq!(cmp.action, FileAction::Updated);

        // The very same case is a documented gap under timestamp_size.
        let cmp = compare(&record_for(&src), &tgt, CompareMethod::TimestampSize);
        assert_eq!(cmp.action, FileAction::Skipped);
    }

    #[test]
    fn test_unreadable_source_is_error_under_hash() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        let tgt = dir.path().join("b.txt");
        fs::write(&src, "data").unwrap();
        fs::write(&tgt, "data").unwrap();

        let mut record = record_for(&src);
        record.source_path = dir.path().join("vanished.txt");

        let cmp = compare(&record, &tgt, CompareMethod::Hash);
        assert_eq!(cmp.action, FileAction::Error);
        assert!(cmp.reason.unwrap().contains("hash source"));
    }

    #[test]
    fn test_compare_method_serde_names() {
        assert_eq!(
            serde_json::to_string(&CompareMethod::TimestampSize).unwrap(),
            "\"timestamp_size\""
        );
        assert_eq!(
            serde_json::from_str::<CompareMethod>("\"hash\"").unwrap(),
            CompareMethod::Hash
        );
    }
}
