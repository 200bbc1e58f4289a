//! Decoders for the individual line kinds of a mountstats mount block.
//!
//! Each decoder gets the trimmed line plus its 1-based line number and returns
//! a typed value or a [`MountstatsError`] naming the offending field.

use super::error::{MountstatsError, Result};
use crate::models::nfs::{EventCounters, NfsMount, OpStats};

/// Prefixes of colon-bearing lines inside a mount block that are not per-op counters.
const NON_OP_PREFIXES: &[&str] = &[
    "RPC", "xprt", "per-op", "opts", "caps", "sec", "nfsv3", "nfsv4",
    "impl_id", "fsc",
];

/// Per-op counter names in column order. The last one is missing on older kernels.
const OP_FIELDS: [&str; 9] = [
    "ops", "ntrans", "timeouts", "bytes_sent", "bytes_recv",
    "queue_ms", "rtt_ms", "execute_ms", "errors",
];

const OP_REQUIRED: usize = 8;

/// Tokens the `bytes:` line needs, label included.
const BYTES_REQUIRED: usize = 6;

fn parse_int(value: &str, line: usize, field: impl FnOnce() -> String) -> Result<i64> {
    value.parse::<i64>().map_err(|source| MountstatsError::InvalidField {
        field: field(),
        value: value.to_string(),
        line,
        source,
    })
}

// ── Device line ───────────────────────────────────────────────────────

/// True when a `device` line describes an NFS mount.
///
/// The line must mention `nfs`; when it also names an fstype, that fstype has
/// to be an nfs one (this drops `rpc_pipefs` mounted under /var/lib/nfs).
pub fn is_nfs_device_line(line: &str) -> bool {
    if !line.contains("nfs") {
        return false;
    }
    match fstype_of(line) {
        Some(fs) => fs.starts_with("nfs"),
        None     => true,
    }
}

/// "device srv:/export mounted on /mnt/x with fstype nfs4 statvers=1.1"
fn split_on_layout(line: &str) -> Option<(&str, &str)> {
    let (head, tail) = line.split_once(" on ")?;
    let device = head.split_whitespace().nth(1)?;
    let mount_point = tail.split_whitespace().next()?;
    Some((device, mount_point))
}

/// Legacy fixed columns: device in column 1, mount point in column 4.
fn fixed_column_layout(line: &str) -> Option<(&str, &str)> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 8 {
        return None;
    }
    Some((parts[1], parts[4]))
}

fn fstype_of(line: &str) -> Option<&str> {
    let mut parts = line.split_whitespace();
    parts.by_ref().find(|p| *p == "fstype")?;
    parts.next()
}

/// Opens a new mount record from a `device` line.
pub fn parse_device_line(line: &str, lineno: usize) -> Result<NfsMount> {
    let (device, mount_point) = split_on_layout(line)
        .or_else(|| fixed_column_layout(line))
        .ok_or_else(|| MountstatsError::InvalidDeviceLine {
            line: lineno,
            text: line.to_string(),
        })?;

    let mut mount = NfsMount::new(device, mount_point);
    mount.fstype = fstype_of(line).map(str::to_string);
    Ok(mount)
}

// ── Mount-level stat lines ────────────────────────────────────────────

/// "age: 12345" → seconds since mount.
pub fn parse_age(rest: &str, lineno: usize) -> Result<i64> {
    let value = rest.split_whitespace().next().ok_or_else(|| MountstatsError::TooFewFields {
        section:  "age".into(),
        expected: 1,
        found:    0,
        line:     lineno,
    })?;
    parse_int(value, lineno, || "age".into())
}

/// "events: 1 2 3 ..." → 25 required counters plus two optional pNFS ones.
pub fn parse_events(rest: &str, lineno: usize) -> Result<EventCounters> {
    let fields: Vec<&str> = rest.split_whitespace().collect();
    if fields.len() < EventCounters::REQUIRED {
        return Err(MountstatsError::TooFewFields {
            section:  "events".into(),
            expected: EventCounters::REQUIRED,
            found:    fields.len(),
            line:     lineno,
        });
    }

    let mut values = [0i64; 27];
    for (i, (slot, raw)) in values.iter_mut().zip(&fields).enumerate() {
        *slot = parse_int(raw, lineno, || format!("events.{}", EventCounters::NAMES[i]))?;
    }
    Ok(EventCounters::from_array(values))
}

/// "bytes: r _ _ _ w ..." → (bytes read, bytes written) from label-inclusive columns 1 and 5.
pub fn parse_bytes(rest: &str, lineno: usize) -> Result<(i64, i64)> {
    let fields: Vec<&str> = rest.split_whitespace().collect();
    if fields.len() + 1 < BYTES_REQUIRED {
        return Err(MountstatsError::TooFewFields {
            section:  "bytes".into(),
            expected: BYTES_REQUIRED,
            found:    fields.len() + 1,
            line:     lineno,
        });
    }
    let read    = parse_int(fields[0], lineno, || "bytes_read".into())?;
    let written = parse_int(fields[4], lineno, || "bytes_written".into())?;
    Ok((read, written))
}

// ── Per-op lines ──────────────────────────────────────────────────────

/// True for a colon-bearing line that should carry per-op counters.
pub fn is_op_line(line: &str) -> bool {
    line.contains(':') && !NON_OP_PREFIXES.iter().any(|p| line.starts_with(p))
}

/// "READ: 10 1 1 100 200 500 300 400 700" → [`OpStats`].
pub fn parse_op_line(line: &str, lineno: usize) -> Result<OpStats> {
    let (name, rest) = line.split_once(':').unwrap_or((line, ""));
    let name = name.trim();
    if name.is_empty() {
        return Err(MountstatsError::MissingOperationName { line: lineno, text: line.to_string() });
    }

    let fields: Vec<&str> = rest.split_whitespace().collect();
    if fields.len() < OP_REQUIRED {
        return Err(MountstatsError::TooFewFields {
            section:  name.to_string(),
            expected: OP_REQUIRED,
            found:    fields.len(),
            line:     lineno,
        });
    }

    let mut v = [0i64; 9];
    for (i, (slot, raw)) in v.iter_mut().zip(&fields).enumerate() {
        *slot = parse_int(raw, lineno, || format!("{}.{}", name, OP_FIELDS[i]))?;
    }

    Ok(OpStats {
        name:       name.to_string(),
        ops:        v[0],
        ntrans:     v[1],
        timeouts:   v[2],
        bytes_sent: v[3],
        bytes_recv: v[4],
        queue_ms:   v[5],
        rtt_ms:     v[6],
        execute_ms: v[7],
        errors:     v[8],
    })
}
