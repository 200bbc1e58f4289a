use serde::Serialize;
use std::collections::HashMap;

/// One parsed mountstats file: mount point → mount record.
pub type Snapshot = HashMap<String, NfsMount>;

/// Cumulative per-operation RPC accounting for one mount ("READ: 10 10 0 ...").
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OpStats {
    pub name:       String,
    pub ops:        i64,
    pub ntrans:     i64,   // transmissions, including retransmits
    pub timeouts:   i64,
    pub bytes_sent: i64,
    pub bytes_recv: i64,
    pub queue_ms:   i64,
    pub rtt_ms:     i64,
    pub execute_ms: i64,
    pub errors:     i64,   // absent on older kernels
}

/// VFS-level cache and revalidation counters from the `events:` line.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventCounters {
    pub inode_revalidate:  i64,
    pub dentry_revalidate: i64,
    pub data_invalidate:   i64,
    pub attr_invalidate:   i64,
    pub vfs_open:          i64,
    pub vfs_lookup:        i64,
    pub vfs_access:        i64,
    pub vfs_update_page:   i64,
    pub vfs_read_page:     i64,
    pub vfs_read_pages:    i64,
    pub vfs_write_page:    i64,
    pub vfs_write_pages:   i64,
    pub vfs_getdents:      i64,
    pub vfs_setattr:       i64,
    pub vfs_flush:         i64,
    pub vfs_fsync:         i64,
    pub vfs_lock:          i64,
    pub vfs_release:       i64,
    pub congestion_wait:   i64,
    pub setattr_trunc:     i64,
    pub extend_write:      i64,
    pub silly_rename:      i64,
    pub short_read:        i64,
    pub short_write:       i64,
    pub delay:             i64,
    pub pnfs_read:         i64,
    pub pnfs_write:        i64,
}

impl EventCounters {
    /// Counter names in kernel order.
    pub const NAMES: [&'static str; 27] = [
        "inode_revalidate", "dentry_revalidate", "data_invalidate", "attr_invalidate",
        "vfs_open", "vfs_lookup", "vfs_access", "vfs_update_page",
        "vfs_read_page", "vfs_read_pages", "vfs_write_page", "vfs_write_pages",
        "vfs_getdents", "vfs_setattr", "vfs_flush", "vfs_fsync",
        "vfs_lock", "vfs_release", "congestion_wait", "setattr_trunc",
        "extend_write", "silly_rename", "short_read", "short_write",
        "delay", "pnfs_read", "pnfs_write",
    ];

    /// Number of counters every kernel reports; the two pNFS counters follow.
    pub const REQUIRED: usize = 25;

    pub fn from_array(v: [i64; 27]) -> Self {
        let [
            inode_revalidate, dentry_revalidate, data_invalidate, attr_invalidate,
            vfs_open, vfs_lookup, vfs_access, vfs_update_page,
            vfs_read_page, vfs_read_pages, vfs_write_page, vfs_write_pages,
            vfs_getdents, vfs_setattr, vfs_flush, vfs_fsync,
            vfs_lock, vfs_release, congestion_wait, setattr_trunc,
            extend_write, silly_rename, short_read, short_write,
            delay, pnfs_read, pnfs_write,
        ] = v;
        Self {
            inode_revalidate, dentry_revalidate, data_invalidate, attr_invalidate,
            vfs_open, vfs_lookup, vfs_access, vfs_update_page,
            vfs_read_page, vfs_read_pages, vfs_write_page, vfs_write_pages,
            vfs_getdents, vfs_setattr, vfs_flush, vfs_fsync,
            vfs_lock, vfs_release, congestion_wait, setattr_trunc,
            extend_write, silly_rename, short_read, short_write,
            delay, pnfs_read, pnfs_write,
        }
    }

    /// Counter values in the same order as [`Self::NAMES`].
    pub fn values(&self) -> [i64; 27] {
        [
            self.inode_revalidate, self.dentry_revalidate, self.data_invalidate, self.attr_invalidate,
            self.vfs_open, self.vfs_lookup, self.vfs_access, self.vfs_update_page,
            self.vfs_read_page, self.vfs_read_pages, self.vfs_write_page, self.vfs_write_pages,
            self.vfs_getdents, self.vfs_setattr, self.vfs_flush, self.vfs_fsync,
            self.vfs_lock, self.vfs_release, self.congestion_wait, self.setattr_trunc,
            self.extend_write, self.silly_rename, self.short_read, self.short_write,
            self.delay, self.pnfs_read, self.pnfs_write,
        ]
    }
}

/// One active NFS mount as reported by /proc/self/mountstats.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NfsMount {
    pub device:        String,   // "server:/export"
    pub mount_point:   String,   // "/mnt/nfs"
    pub server:        String,
    pub export:        String,
    pub fstype:        Option<String>,   // "nfs4", only on the "with fstype" layout
    pub age_secs:      i64,
    pub operations:    HashMap<String, OpStats>,
    pub events:        EventCounters,
    pub bytes_read:    i64,
    pub bytes_written: i64,
}

impl NfsMount {
    pub fn new(device: &str, mount_point: &str) -> Self {
        let (server, export) = match device.split_once(':') {
            Some((s, e)) => (s.to_string(), e.to_string()),
            None         => (device.to_string(), "/".to_string()),
        };
        Self {
            device:      device.to_string(),
            mount_point: mount_point.to_string(),
            server,
            export,
            ..Self::default()
        }
    }
}

/// Per-operation activity between two samples.
///
/// Every derived field is zero unless `delta_ops > 0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeltaStats {
    pub operation:     String,
    pub delta_ops:     i64,
    pub delta_sent:    i64,
    pub delta_recv:    i64,
    pub delta_bytes:   i64,
    pub delta_rtt:     i64,
    pub delta_exec:    i64,
    pub delta_queue:   i64,
    pub delta_errors:  i64,
    pub delta_retrans: i64,
    pub iops:          f64,
    pub avg_rtt_ms:    f64,
    pub avg_exec_ms:   f64,
    pub avg_queue_ms:  f64,
    pub kb_per_op:     f64,
    pub kb_per_sec:    f64,
}

impl DeltaStats {
    pub fn retrans_pct(&self) -> f64 {
        if self.delta_ops <= 0 { return 0.0; }
        self.delta_retrans as f64 / self.delta_ops as f64 * 100.0
    }

    pub fn error_pct(&self) -> f64 {
        if self.delta_ops <= 0 { return 0.0; }
        self.delta_errors as f64 / self.delta_ops as f64 * 100.0
    }
}
