//! portasync - incremental one-way backup to attached storage
//!
//! Main binary entry point for the command-line interface.

fn main() {
    if let Err(e) = portasync::cli::run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
