//! Command-line front-end: preview, run, and status for one device root.
//!
//! The engine itself executes on a worker thread; this module drains the
//! progress channel into an indicatif bar so the terminal stays live
//! during long copies.

use crate::config::{Config, CONFIG_FILE};
use crate::diff::{BackupPlan, FileAction};
use crate::engine::BackupEngine;
use crate::progress::{ProgressEvent, RunContext};
use crate::report::{format_size, SessionWriter};
use crate::session::BackupSession;
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "portasync")]
#[command(about = "Incremental one-way backup to attached storage")]
#[command(version)]
pub struct Cli {
    /// Device root holding config.json, the backup tree and the logs
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter config.json to the device root
    Init {
        /// Source folder to back up (repeatable)
        #[arg(long = "source")]
        sources: Vec<PathBuf>,
    },
    /// Preview what a backup would do (dry run, no writes)
    Scan,
    /// Run a backup
    Run {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Show the last logged session
    Status,
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Init { sources } => cmd_init(&cli.root, sources),
        Commands::Scan => cmd_scan(&cli.root),
        Commands::Run { yes } => cmd_run(&cli.root, yes),
        Commands::Status => cmd_status(&cli.root),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("portasync=debug")
    } else {
        EnvFilter::new("portasync=info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn cmd_init(root: &Path, sources: Vec<PathBuf>) -> anyhow::Result<()> {
    let path = root.join(CONFIG_FILE);
    if path.exists() {
        bail!("{} already exists, edit it instead", path.display());
    }
    let config = Config {
        sources,
        ..Config::default()
    };
    config.save(root).context("cannot write config")?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn cmd_scan(root: &PathBuf) -> anyhow::Result<()> {
    let config = Config::load(root);
    let mut engine = BackupEngine::new(config, root).context("cannot start engine")?;

    let spinner = scan_spinner();
    let plan = engine.build_plan(&RunContext::new());
    spinner.finish_and_clear();

    print_plan(&plan);
    Ok(())
}

fn cmd_run(root: &PathBuf, yes: bool) -> anyhow::Result<()> {
    let config = Config::load(root);
    let mut engine = BackupEngine::new(config, root).context("cannot start engine")?;

    let spinner = scan_spinner();
    let plan = engine.build_plan(&RunContext::new());
    spinner.finish_and_clear();
    print_plan(&plan);

    if plan.new + plan.updated == 0 {
        println!("Nothing to copy.");
        // Mirror reconciliation may still have work to do; fall through
        // only when the user confirms a run.
    }
    if !yes && !confirm("Start backup?")? {
        println!("Aborted.");
        return Ok(());
    }

    let bytes_to_copy = plan.bytes_to_copy;
    let (tx, rx) = mpsc::channel();
    let worker_ctx = RunContext::with_events(tx);

    let worker = thread::spawn(move || engine.execute(&plan, &worker_ctx));

    render_progress(rx, bytes_to_copy);
    let session = worker.join().expect("backup worker panicked");

    let writer = SessionWriter::new(root);
    if let Err(e) = writer.write(&session) {
        eprintln!("warning: failed to write session log: {}", e);
    }
    print_session(&session);
    Ok(())
}

fn cmd_status(root: &PathBuf) -> anyhow::Result<()> {
    let writer = SessionWriter::new(root);
    match writer.last_session_info() {
        Some(info) => {
            println!("Last session ({})", info.log_file);
            if let Some(ts) = info.timestamp {
                println!("  Timestamp : {}", ts);
            }
            if let Some(copied) = info.copied {
                println!("  Copied    : {}", copied);
            }
            if let Some(errors) = info.errors {
                println!("  Errors    : {}", errors);
            }
        }
        None => println!("No sessions logged yet."),
    }
    Ok(())
}

fn scan_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("static template")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "),
    );
    spinner.set_message("Scanning sources...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

/// Drain engine events into a byte-level progress bar until the worker
/// drops its sender.
fn render_progress(rx: mpsc::Receiver<ProgressEvent>, bytes_to_copy: u64) {
    let bar = ProgressBar::new(bytes_to_copy);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/dim} {bytes}/{total_bytes} {msg}")
            .expect("static template"),
    );

    for event in rx {
        match event {
            ProgressEvent::FileStarted {
                index,
                total,
                relative_path,
            } => {
                bar.set_message(format!("[{}/{}] {}", index, total, relative_path.display()));
            }
            ProgressEvent::FileProgress { bytes_total, .. } => {
                bar.set_position(bytes_total);
            }
            ProgressEvent::Speed { bytes_per_sec } => {
                bar.set_message(format!("{}/s", format_size(bytes_per_sec as u64)));
            }
            ProgressEvent::Deleted { relative_path } => {
                bar.set_message(format!("deleting {}", relative_path.display()));
            }
            _ => {}
        }
    }

    bar.finish_and_clear();
}

fn print_plan(plan: &BackupPlan) {
    for entry in &plan.entries {
        if entry.action == FileAction::Skipped {
            continue;
        }
        let detail = match entry.action {
            FileAction::Error => entry.reason.clone().unwrap_or_default(),
            _ => format_size(entry.size),
        };
        println!(
            "  {:>8}  {}  {}",
            entry.action,
            entry.relative_path.display(),
            detail
        );
    }
    println!(
        "Plan: {} new, {} updated, {} skipped, {} errors, {} to copy",
        plan.new,
        plan.updated,
        plan.skipped,
        plan.errors,
        format_size(plan.bytes_to_copy)
    );
}

fn print_session(session: &BackupSession) {
    let verdict = if session.cancelled {
        "Backup cancelled"
    } else {
        "Backup finished"
    };
    println!(
        "{}: {} copied, {} skipped, {} deleted, {} errors, {} in {:.1}s",
        verdict,
        session.copied.len(),
        session.skipped.len(),
        session.deleted.len(),
        session.errors.len(),
        format_size(session.bytes_copied),
        session.duration_secs
    );
    for err in &session.errors {
        println!("  error: {}: {}", err.relative_path.display(), err.reason);
    }
}

fn confirm(prompt: &str) -> io::Result<bool> {
    let mut input = String::new();
    loop {
        input.clear();
        print!("{} (y/N): ", prompt);
        io::stdout().flush()?;
        io::stdin().read_line(&mut input)?;
        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" | "" => return Ok(false),
            _ => continue,
        }
    }
}
