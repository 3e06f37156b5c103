//! # portasync
//!
//! Incremental, one-directional backup engine for attached storage.
//! Mirrors a set of source folders onto a target device, copying only
//! files that are new or changed, optionally deleting target files whose
//! source disappeared, and reporting every decision for audit.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use portasync::{BackupEngine, Config, RunContext};
//! use std::path::{Path, PathBuf};
//!
//! # fn main() -> portasync::Result<()> {
//! let mut config = Config::default();
//! config.sources.push(PathBuf::from("/home/user/docs"));
//!
//! let mut engine = BackupEngine::new(config, Path::new("/media/stick"))?;
//! let ctx = RunContext::new();
//! let plan = engine.build_plan(&ctx);
//! println!("{} new, {} updated", plan.new, plan.updated);
//!
//! let session = engine.execute(&plan, &ctx);
//! println!("copied {} files", session.copied.len());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod compare;
pub mod config;
pub mod copy;
pub mod diff;
pub mod engine;
pub mod error;
pub mod exclude;
pub mod mirror;
pub mod progress;
pub mod report;
pub mod scanner;
pub mod session;

// Re-export commonly used types
pub use compare::CompareMethod;
pub use config::Config;
pub use diff::{BackupPlan, DiffEngine, FileAction, PlanEntry};
pub use engine::BackupEngine;
pub use error::{Error, Result};
pub use exclude::ExcludeMatcher;
pub use progress::{EngineState, ProgressEvent, RunContext};
pub use report::SessionWriter;
pub use session::BackupSession;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
