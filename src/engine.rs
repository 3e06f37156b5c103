//! Backup engine: drives a whole run from plan to sealed session.
//!
//! The engine walks the state machine Idle → Scanning →
//! AwaitingConfirmation → Copying → Reconciling → Completed, with
//! Cancelled absorbing from any working state; after the terminal state is
//! reported the engine settles back in Idle, ready for another run.
//! Preview and execution share the diff code so they can never disagree
//! about what would be copied.

use crate::config::Config;
use crate::copy::copy_file;
use crate::diff::{source_name, BackupPlan, DiffEngine, FileAction};
use crate::mirror::{reconcile, MirrorOutcome};
use crate::progress::{EngineState, ProgressEvent, RunContext};
use crate::session::{computer_name, BackupSession, SessionError, SessionFile};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Transfer-rate window: the last N copied files feed the speed estimate.
const SPEED_WINDOW: usize = 20;

pub struct BackupEngine {
    config: Config,
    target_base: PathBuf,
    state: EngineState,
}

impl BackupEngine {
    /// Create an engine for one device root. Fatal configuration problems
    /// (no sources, unreachable target) surface here, before any scan.
    pub fn new(config: Config, device_root: &Path) -> Result<Self> {
        config.validate()?;
        if !device_root.is_dir() {
            return Err(Error::TargetUnreachable {
                path: device_root.display().to_string(),
            });
        }
        let target_base = device_root
            .join(&config.target_subfolder)
            .join(computer_name());
        Ok(Self {
            config,
            target_base,
            state: EngineState::Idle,
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Root of this computer's namespace on the device:
    /// `<root>/<targetSubfolder>/<computerName>`.
    pub fn target_base(&self) -> &Path {
        &self.target_base
    }

    /// Build the preview plan (dry run). Read-only; safe to call again.
    pub fn build_plan(&mut self, ctx: &RunContext) -> BackupPlan {
        self.set_state(EngineState::Scanning, ctx);
        let diff = DiffEngine::new(self.config.compare_method, &self.config.excludes);
        let plan = diff.build_plan(&self.config.sources, &self.target_base, ctx);
        if ctx.is_cancelled() {
            self.set_state(EngineState::Cancelled, ctx);
        } else {
            self.set_state(EngineState::AwaitingConfirmation, ctx);
        }
        plan
    }

    /// Execute a confirmed plan: copy every `New`/`Updated` entry in plan
    /// order, reconcile the mirror if configured, and return the sealed
    /// session. Per-file failures are recorded, never fatal.
    pub fn execute(&mut self, plan: &BackupPlan, ctx: &RunContext) -> BackupSession {
        let mut session = BackupSession::begin(
            self.config.sources.clone(),
            self.target_base.clone(),
        );

        // Skipped and error entries from the plan are part of the record.
        for entry in &plan.entries {
            match entry.action {
                FileAction::Skipped => session.skipped.push(SessionFile {
                    relative_path: entry.relative_path.clone(),
                    action: entry.action,
                    size: entry.size,
                }),
                FileAction::Error => session.errors.push(SessionError {
                    relative_path: entry.relative_path.clone(),
                    reason: entry
                        .reason
                        .clone()
                        .unwrap_or_else(|| "unknown error".to_string()),
                }),
                _ => {}
            }
        }

        self.set_state(EngineState::Copying, ctx);
        let actionable: Vec<_> = plan.actionable().collect();
        let total = actionable.len();
        let mut window: VecDeque<(u64, f64)> = VecDeque::with_capacity(SPEED_WINDOW);

        for (index, entry) in actionable.into_iter().enumerate() {
            if ctx.is_cancelled() {
                session.cancelled = true;
                break;
            }

            ctx.emit(ProgressEvent::FileStarted {
                index: index + 1,
                total,
                relative_path: entry.relative_path.clone(),
            });

            let base = session.bytes_copied;
            let started = Instant::now();
            let result = copy_file(&entry.source_path, &entry.target_path, ctx, |bytes_file| {
                ctx.emit(ProgressEvent::FileProgress {
                    bytes_file,
                    bytes_total: base + bytes_file,
                });
            });

            match result {
                Ok(bytes) => {
                    session.bytes_copied += bytes;
                    session.copied.push(SessionFile {
                        relative_path: entry.relative_path.clone(),
                        action: entry.action,
                        size: bytes,
                    });
                    ctx.emit(ProgressEvent::FileFinished {
                        relative_path: entry.relative_path.clone(),
                        action: entry.action,
                        size: bytes,
                    });

                    let elapsed = started.elapsed().as_secs_f64().max(0.001);
                    window.push_back((bytes, elapsed));
                    if window.len() > SPEED_WINDOW {
                        window.pop_front();
                    }
                    let (total_bytes, total_time) = window
                        .iter()
                        .fold((0u64, 0f64), |(b, t), (wb, wt)| (b + wb, t + wt));
                    if total_time > 0.0 {
                        ctx.emit(ProgressEvent::Speed {
                            bytes_per_sec: total_bytes as f64 / total_time,
                        });
                    }
                }
                Err(Error::Cancelled) => {
                    // The partial file stays; it is not recorded as copied.
                    session.cancelled = true;
                    break;
                }
                Err(e) => {
                    warn!("Copy failed for {}: {}", entry.relative_path.display(), e);
                    session.errors.push(SessionError {
                        relative_path: entry.relative_path.clone(),
                        reason: e.to_string(),
                    });
                    ctx.emit(ProgressEvent::FileFinished {
                        relative_path: entry.relative_path.clone(),
                        action: FileAction::Error,
                        size: 0,
                    });
                }
            }
        }

        if !session.cancelled && self.config.delete_removed {
            self.set_state(EngineState::Reconciling, ctx);
            let outcome = self.reconcile_all(plan, ctx);
            if ctx.is_cancelled() {
                session.cancelled = true;
            }
            for rel in outcome.deleted {
                session.deleted.push(rel);
            }
            for (rel, reason) in outcome.errors {
                session.errors.push(SessionError {
                    relative_path: rel,
                    reason,
                });
            }
        }

        session.seal();
        let final_state = if session.cancelled {
            EngineState::Cancelled
        } else {
            EngineState::Completed
        };
        self.set_state(final_state, ctx);

        info!(
            "Backup {}: {} copied, {} skipped, {} deleted, {} errors, {} bytes in {:.1}s",
            if session.cancelled { "cancelled" } else { "finished" },
            session.copied.len(),
            session.skipped.len(),
            session.deleted.len(),
            session.errors.len(),
            session.bytes_copied,
            session.duration_secs
        );
        // The sealed session is the caller's now; ready for the next run.
        self.set_state(EngineState::Idle, ctx);
        session
    }

    /// Run mirror reconciliation for every configured source that exists,
    /// against the snapshot the plan was built from. Namespaces of sources
    /// no longer configured are never visited.
    fn reconcile_all(&self, plan: &BackupPlan, ctx: &RunContext) -> MirrorOutcome {
        // Group the plan's relative paths by their namespace segment.
        // Error entries become protected prefixes instead of expected
        // files: a path that failed to scan proves nothing, and when the
        // failed path is a directory none of its descendants made it into
        // the plan, so the whole subtree below it must be left alone.
        let mut expected: HashMap<String, HashSet<PathBuf>> = HashMap::new();
        let mut protected: HashMap<String, HashSet<PathBuf>> = HashMap::new();
        let mut tainted: HashSet<String> = HashSet::new();
        for entry in &plan.entries {
            let mut components = entry.relative_path.components();
            let Some(first) = components.next() else {
                continue;
            };
            let name = first.as_os_str().to_string_lossy().into_owned();
            let rest: PathBuf = components.collect();
            if rest.as_os_str().is_empty() {
                // An error at the source root leaves the entire namespace
                // unaccounted for.
                if entry.action == FileAction::Error {
                    tainted.insert(name);
                }
                continue;
            }
            if entry.action == FileAction::Error {
                protected.entry(name).or_default().insert(rest);
            } else {
                expected.entry(name).or_default().insert(rest);
            }
        }

        let empty = HashSet::new();
        let mut outcome = MirrorOutcome::default();
        for source in &self.config.sources {
            if ctx.is_cancelled() {
                break;
            }
            if !source.exists() {
                // A vanished source already produced an error entry; its
                // target data is deliberately left untouched.
                continue;
            }
            let name = source_name(source);
            if tainted.contains(&name) {
                warn!("Skipping mirror for {}: its source failed to scan", name);
                continue;
            }
            let namespace = self.target_base.join(&name);
            let snapshot = expected.get(&name).unwrap_or(&empty);
            let shielded = protected.get(&name).unwrap_or(&empty);
            let partial = reconcile(&namespace, snapshot, shielded, ctx);
            // Record deletions with the namespace prefix, matching the
            // relative paths used everywhere else in the session.
            outcome.deleted.extend(
                partial
                    .deleted
                    .into_iter()
                    .map(|rel| Path::new(&name).join(rel)),
            );
            outcome.errors.extend(
                partial
                    .errors
                    .into_iter()
                    .map(|(rel, reason)| (Path::new(&name).join(rel), reason)),
            );
        }
        outcome
    }

    fn set_state(&mut self, state: EngineState, ctx: &RunContext) {
        self.state = state;
        ctx.emit(ProgressEvent::State(state));
    }
}
