//! Parser for `/proc/self/mountstats`.
//!
//! The file is a sequence of `device ...` blocks. NFS blocks carry `age:`,
//! `events:`, `bytes:` and per-op counter lines; everything else (the
//! transport section, mount options, non-NFS mounts) is skipped. One call
//! makes a single forward pass and returns an owned [`Snapshot`], or fails as
//! a whole on the first structural problem.

mod error;
mod lines;

pub use error::{MountstatsError, Result};
pub use lines::{parse_age, parse_bytes, parse_device_line, parse_events, parse_op_line};

use crate::models::nfs::{NfsMount, Snapshot};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub const DEFAULT_PATH: &str = "/proc/self/mountstats";

/// Read and parse a mountstats file from disk.
pub fn read_mountstats(path: &Path) -> Result<Snapshot> {
    let file = File::open(path).map_err(|source| MountstatsError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    parse(BufReader::new(file))
}

/// Parse mountstats text held in memory.
pub fn parse_str(text: &str) -> Result<Snapshot> {
    parse(text.as_bytes())
}

/// Parse a mountstats stream into mount point → mount record.
///
/// A later block for the same mount point replaces an earlier one. Bytes that
/// are not UTF-8 are replaced, never rejected.
pub fn parse<R: BufRead>(mut reader: R) -> Result<Snapshot> {
    let mut mounts  = Snapshot::new();
    let mut current: Option<NfsMount> = None;

    // Mount paths are raw kernel bytes, so lines are decoded lossily.
    let mut buf    = Vec::new();
    let mut lineno = 0usize;
    loop {
        buf.clear();
        lineno += 1;
        let n = reader.read_until(b'\n', &mut buf)
            .map_err(|source| MountstatsError::Read { line: lineno, source })?;
        if n == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let trimmed = line.trim();

        if trimmed.split_whitespace().next() == Some("device") {
            flush(&mut mounts, current.take());
            if lines::is_nfs_device_line(trimmed) {
                current = Some(parse_device_line(trimmed, lineno)?);
            }
            continue;
        }

        // Preamble and non-NFS blocks
        let Some(mount) = current.as_mut() else { continue };
        apply_stat_line(mount, trimmed, lineno)?;
    }

    flush(&mut mounts, current);
    Ok(mounts)
}

fn flush(mounts: &mut Snapshot, mount: Option<NfsMount>) {
    if let Some(m) = mount {
        mounts.insert(m.mount_point.clone(), m);
    }
}

fn apply_stat_line(mount: &mut NfsMount, line: &str, lineno: usize) -> Result<()> {
    if let Some(rest) = line.strip_prefix("age:") {
        mount.age_secs = parse_age(rest, lineno)?;
    } else if let Some(rest) = line.strip_prefix("events:") {
        mount.events = parse_events(rest, lineno)?;
    } else if let Some(rest) = line.strip_prefix("bytes:") {
        let (read, written) = parse_bytes(rest, lineno)?;
        mount.bytes_read    = read;
        mount.bytes_written = written;
    } else if lines::is_op_line(line) {
        let op = parse_op_line(line, lineno)?;
        mount.operations.insert(op.name.clone(), op);
    }
    Ok(())
}
