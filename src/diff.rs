//! Diff engine: scans the configured source folders and builds the
//! backup plan (dry run).
//!
//! Building a plan is read-only and idempotent; the same code path serves
//! the preview table and the real run, so the two can never disagree.

use crate::compare::{compare, CompareMethod};
use crate::exclude::ExcludeMatcher;
use crate::progress::{ProgressEvent, RunContext};
use crate::scanner::scan_source;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

/// Terminal category for one considered source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    /// File exists only in the source.
    New,
    /// File changed since the last backup.
    Updated,
    /// File is identical; nothing to do.
    Skipped,
    /// File could not be read or compared.
    Error,
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FileAction::New => "new",
            FileAction::Updated => "updated",
            FileAction::Skipped => "skipped",
            FileAction::Error => "error",
        };
        f.pad(label)
    }
}

/// One planned action for one source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanEntry {
    pub source_path: PathBuf,
    /// Absolute destination path on the target device.
    pub target_path: PathBuf,
    /// Path relative to the target namespace, including the source
    /// folder's base name, so two sources can never collide.
    pub relative_path: PathBuf,
    pub action: FileAction,
    pub size: u64,
    pub modified: Option<SystemTime>,
    /// Human-readable failure description, only for `Error` entries.
    pub reason: Option<String>,
}

/// The dry-run artifact: every planned action plus aggregate counts.
/// Immutable once produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupPlan {
    pub entries: Vec<PlanEntry>,
    pub new: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Sum of source sizes over `New` and `Updated` entries.
    pub bytes_to_copy: u64,
}

impl BackupPlan {
    fn push(&mut self, entry: PlanEntry) {
        match entry.action {
            FileAction::New => {
                self.new += 1;
                self.bytes_to_copy += entry.size;
            }
            FileAction::Updated => {
                self.updated += 1;
                self.bytes_to_copy += entry.size;
            }
            FileAction::Skipped => self.skipped += 1,
            FileAction::Error => self.errors += 1,
        }
        self.entries.push(entry);
    }

    pub fn total(&self) -> usize {
        self.entries.len()
    }

    /// Entries that require an actual copy, in plan order.
    pub fn actionable(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.action, FileAction::New | FileAction::Updated))
    }
}

/// Scans source folders and classifies every surviving file.
pub struct DiffEngine {
    method: CompareMethod,
    matcher: ExcludeMatcher,
}

impl DiffEngine {
    pub fn new(method: CompareMethod, excludes: &[String]) -> Self {
        Self {
            method,
            matcher: ExcludeMatcher::new(excludes),
        }
    }

    /// Build the plan for all configured sources against the target
    /// namespace. Performs no writes; safe to call repeatedly. Entries are
    /// grouped by source folder in configuration order, then traversal
    /// order within each folder.
    pub fn build_plan(
        &self,
        sources: &[PathBuf],
        target_base: &Path,
        ctx: &RunContext,
    ) -> BackupPlan {
        let mut plan = BackupPlan::default();

        'sources: for source in sources {
            if !source.exists() {
                plan.push(PlanEntry {
                    source_path: source.clone(),
                    target_path: target_base.to_path_buf(),
                    relative_path: PathBuf::from(source_name(source)),
                    action: FileAction::Error,
                    size: 0,
                    modified: None,
                    reason: Some(format!("source not found: {}", source.display())),
                });
                continue;
            }

            let name = source_name(source);
            debug!("Scanning source folder {}", source.display());

            for item in scan_source(source, &self.matcher) {
                if ctx.is_cancelled() {
                    break 'sources;
                }
                match item {
                    Ok(record) => {
                        ctx.emit(ProgressEvent::Scanning {
                            path: record.source_path.clone(),
                        });
                        let target_path =
                            target_base.join(&name).join(&record.relative_path);
                        let comparison = compare(&record, &target_path, self.method);
                        plan.push(PlanEntry {
                            source_path: record.source_path,
                            target_path,
                            relative_path: Path::new(&name).join(&record.relative_path),
                            action: comparison.action,
                            size: record.size,
                            modified: Some(record.modified),
                            reason: comparison.reason,
                        });
                    }
                    Err(scan_error) => {
                        let relative_path = scan_error
                            .path
                            .strip_prefix(source)
                            .map(|rel| Path::new(&name).join(rel))
                            .unwrap_or_else(|_| PathBuf::from(&name));
                        plan.push(PlanEntry {
                            source_path: scan_error.path,
                            target_path: target_base.to_path_buf(),
                            relative_path,
                            action: FileAction::Error,
                            size: 0,
                            modified: None,
                            reason: Some(scan_error.reason),
                        });
                    }
                }
            }
        }

        info!(
            "Plan built: {} new, {} updated, {} skipped, {} errors, {} bytes to copy",
            plan.new, plan.updated, plan.skipped, plan.errors, plan.bytes_to_copy
        );
        plan
    }
}

/// Base name of a source folder, used as its namespace segment on the
/// target device.
pub(crate) fn source_name(source: &Path) -> String {
    source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string())
}
