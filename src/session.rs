//! The execution record of one backup run.
//!
//! Created when a run starts, mutated only by the engine while it runs,
//! sealed at the end and handed to the session log writer. The core never
//! persists it itself.

use crate::diff::FileAction;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One file the run copied or skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionFile {
    pub relative_path: PathBuf,
    pub action: FileAction,
    pub size: u64,
}

/// One per-file failure, with a human-readable reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionError {
    pub relative_path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSession {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub computer_name: String,
    pub os_name: String,
    pub source_paths: Vec<PathBuf>,
    pub target_path: PathBuf,
    pub copied: Vec<SessionFile>,
    pub skipped: Vec<SessionFile>,
    pub errors: Vec<SessionError>,
    /// Relative paths removed by mirror reconciliation.
    pub deleted: Vec<PathBuf>,
    pub bytes_copied: u64,
    pub duration_secs: f64,
    pub cancelled: bool,
}

impl BackupSession {
    /// Open a fresh session record at run start.
    pub fn begin(source_paths: Vec<PathBuf>, target_path: PathBuf) -> Self {
        let started_at = Local::now();
        Self {
            started_at,
            finished_at: started_at,
            computer_name: computer_name(),
            os_name: os_name(),
            source_paths,
            target_path,
            copied: Vec::new(),
            skipped: Vec::new(),
            errors: Vec::new(),
            deleted: Vec::new(),
            bytes_copied: 0,
            duration_secs: 0.0,
            cancelled: false,
        }
    }

    /// Seal the record: set end time and duration. Called exactly once.
    pub(crate) fn seal(&mut self) {
        self.finished_at = Local::now();
        self.duration_secs = (self.finished_at - self.started_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
    }
}

/// Host name used both for the target namespace and the session record.
pub fn computer_name() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown-host".to_string())
}

fn os_name() -> String {
    format!("{} {}", std::env::consts::OS, std::env::consts::ARCH)
}
