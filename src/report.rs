//! Daily session logs: `Logs/YYYY-MM-DD.log` on the target device.
//!
//! Sessions running on the same calendar day are appended to the same
//! file, never overwritten. The block format is plain text meant for
//! humans auditing what a backup did.

use crate::diff::FileAction;
use crate::session::BackupSession;
use crate::Result;
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

const RULE_HEAVY: &str =
    "======================================================================";
const RULE_LIGHT: &str =
    "----------------------------------------------------------------------";

/// Writes sealed sessions into daily log files and reads back the most
/// recent one for the status display.
pub struct SessionWriter {
    log_dir: PathBuf,
}

/// Summary of the newest logged session, for the front-end status panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastSessionInfo {
    pub log_file: String,
    pub date: String,
    pub timestamp: Option<String>,
    pub copied: Option<String>,
    pub errors: Option<String>,
}

impl SessionWriter {
    pub fn new(device_root: &Path) -> Self {
        Self {
            log_dir: device_root.join("Logs"),
        }
    }

    /// Path of today's log file.
    pub fn log_path(&self) -> PathBuf {
        self.log_dir
            .join(format!("{}.log", Local::now().format("%Y-%m-%d")))
    }

    /// Append one sealed session as a human-readable block.
    pub fn write(&self, session: &BackupSession) -> Result<()> {
        fs::create_dir_all(&self.log_dir)?;
        let path = self.log_path();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        let mut block = String::new();
        block.push('\n');
        block.push_str(RULE_HEAVY);
        block.push('\n');
        block.push_str("BACKUP SESSION START\n");
        block.push_str(&format!(
            "  Timestamp : {}\n",
            session.started_at.to_rfc3339()
        ));
        block.push_str(&format!("  Computer  : {}\n", session.computer_name));
        block.push_str(&format!("  OS        : {}\n", session.os_name));
        block.push_str(&format!(
            "  Sources   : {}\n",
            session
                .source_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));
        block.push_str(&format!(
            "  Target    : {}\n",
            session.target_path.display()
        ));
        block.push_str(RULE_LIGHT);
        block.push('\n');

        for file_entry in &session.copied {
            let label = match file_entry.action {
                FileAction::New => "COPIED (NEW)",
                _ => "COPIED (UPD)",
            };
            block.push_str(&format!(
                "  [{:>15}] {}  ({})\n",
                label,
                file_entry.relative_path.display(),
                format_size(file_entry.size)
            ));
        }
        for file_entry in &session.skipped {
            block.push_str(&format!(
                "  [{:>15}] {}\n",
                "SKIPPED",
                file_entry.relative_path.display()
            ));
        }
        for rel in &session.deleted {
            block.push_str(&format!("  [{:>15}] {}\n", "DELETED", rel.display()));
        }
        for err in &session.errors {
            block.push_str(&format!(
                "  [{:>15}] {}  -- {}\n",
                "ERROR",
                err.relative_path.display(),
                err.reason
            ));
        }

        block.push_str(RULE_LIGHT);
        block.push('\n');
        block.push_str("STATISTICS:\n");
        block.push_str(&format!("  Copied    : {} files\n", session.copied.len()));
        block.push_str(&format!("  Skipped   : {} files\n", session.skipped.len()));
        block.push_str(&format!("  Deleted   : {} files\n", session.deleted.len()));
        block.push_str(&format!("  Errors    : {}\n", session.errors.len()));
        block.push_str(&format!(
            "  Data      : {}\n",
            format_size(session.bytes_copied)
        ));
        block.push_str(&format!("  Duration  : {:.1}s\n", session.duration_secs));
        if session.cancelled {
            block.push_str("  Cancelled : yes\n");
        }
        if !session.errors.is_empty() {
            block.push_str("  Errors detail:\n");
            for err in &session.errors {
                block.push_str(&format!(
                    "    - {}: {}\n",
                    err.relative_path.display(),
                    err.reason
                ));
            }
        }
        block.push_str(&format!(
            "BACKUP SESSION END: {}\n",
            session.finished_at.to_rfc3339()
        ));
        block.push_str(RULE_HEAVY);
        block.push('\n');

        file.write_all(block.as_bytes())?;
        debug!("Session appended to {}", path.display());
        Ok(())
    }

    /// Extract a short summary of the last session from the newest log
    /// file. Returns `None` when no logs exist yet.
    pub fn last_session_info(&self) -> Option<LastSessionInfo> {
        let mut logs: Vec<PathBuf> = fs::read_dir(&self.log_dir)
            .ok()?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|x| x == "log").unwrap_or(false))
            .collect();
        logs.sort();
        let newest = logs.pop()?;

        let content = fs::read_to_string(&newest).ok()?;
        let last = content.rsplit("BACKUP SESSION START").next()?;
        if last.len() == content.len() {
            // Marker not present at all.
            return None;
        }

        let file_name = newest.file_name()?.to_string_lossy().into_owned();
        let date = newest.file_stem()?.to_string_lossy().into_owned();
        let mut info = LastSessionInfo {
            log_file: file_name,
            date,
            timestamp: None,
            copied: None,
            errors: None,
        };
        for line in last.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("Timestamp") {
                info.timestamp = split_value(rest);
            } else if let Some(rest) = line.strip_prefix("Copied") {
                info.copied = split_value(rest);
            } else if line.starts_with("Errors") && !line.contains("detail") {
                info.errors = split_value(line.trim_start_matches("Errors"));
            }
        }
        Some(info)
    }
}

fn split_value(rest: &str) -> Option<String> {
    rest.split_once(':')
        .map(|(_, value)| value.trim().to_string())
}

/// Bytes to a human-readable size, e.g. `12.3 MB`.
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{:.1} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.1} TB", value)
}
