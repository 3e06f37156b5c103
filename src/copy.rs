//! Chunked file copy with progress reporting and cooperative cancellation.

use crate::{Error, Result};
use filetime::FileTime;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use std::time::SystemTime;

/// Copy chunk size. Small enough to drive a progress bar smoothly, large
/// enough not to dominate on syscall overhead.
pub const CHUNK_SIZE: usize = 256 * 1024;

/// Copy `source` to `target`, creating intermediate directories and
/// preserving the source modification time on the destination.
///
/// `on_chunk` receives the cumulative byte count after every chunk. The
/// cancel flag is checked between chunks; on cancellation the partial
/// target file is left in place, which a later run re-detects as changed.
pub fn copy_file(
    source: &Path,
    target: &Path,
    ctx: &crate::progress::RunContext,
    mut on_chunk: impl FnMut(u64),
) -> Result<u64> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut src = File::open(source)?;
    let modified: SystemTime = src.metadata()?.modified()?;
    let mut dst = File::create(target)?;

    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut copied: u64 = 0;

    loop {
        if ctx.is_cancelled() {
            dst.flush()?;
            return Err(Error::Cancelled);
        }
        let bytes_read = src.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        dst.write_all(&buffer[..bytes_read])?;
        copied += bytes_read as u64;
        on_chunk(copied);
    }

    dst.flush()?;
    drop(dst);

    filetime::set_file_mtime(target, FileTime::from_system_time(modified))?;
    Ok(copied)
}
