use super::filter::OpFilter;
use crate::models::nfs::{DeltaStats, EventCounters, NfsMount, OpStats};
use serde::Serialize;

const KB: f64 = 1024.0;

/// Attribute/page cache activity between two `events:` samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttrCacheDelta {
    pub vfs_opens:          i64,
    pub inode_revalidates:  i64,   // forced GETATTRs
    pub page_invalidations: i64,
    pub attr_invalidations: i64,
}

/// Mount-wide rates over one interval.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MountSummary {
    pub ops_per_sec:      f64,
    pub read_kb_per_sec:  f64,
    pub write_kb_per_sec: f64,
}

/// Everything reported for one mount over one interval.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MountReport {
    pub mount_point:  String,
    pub device:       String,
    pub elapsed_secs: f64,
    pub summary:      MountSummary,
    pub attr_cache:   AttrCacheDelta,
    pub operations:   Vec<DeltaStats>,
}

/// Compute activity for one operation between two samples.
///
/// Returns `None` when either sample lacks the operation. When the op count
/// did not grow (idle, or the kernel reset counters on remount) the record
/// carries only the name and zero everywhere else.
///
/// `duration_secs` is the wall time between the samples. A non-positive or
/// non-finite duration leaves the per-second rates at zero; per-op averages
/// are still filled in.
pub fn compute_delta(
    previous:      Option<&OpStats>,
    current:       Option<&OpStats>,
    duration_secs: f64,
) -> Option<DeltaStats> {
    let (prev, curr) = (previous?, current?);

    let delta_ops = diff(curr.ops, prev.ops);
    if delta_ops <= 0 {
        return Some(DeltaStats { operation: curr.name.clone(), ..DeltaStats::default() });
    }

    let delta_sent  = diff(curr.bytes_sent, prev.bytes_sent);
    let delta_recv  = diff(curr.bytes_recv, prev.bytes_recv);
    let delta_bytes = delta_sent.saturating_add(delta_recv);
    let delta_rtt   = diff(curr.rtt_ms,     prev.rtt_ms);
    let delta_exec  = diff(curr.execute_ms, prev.execute_ms);
    let delta_queue = diff(curr.queue_ms,   prev.queue_ms);
    let ops = delta_ops as f64;

    Some(DeltaStats {
        operation:     curr.name.clone(),
        delta_ops,
        delta_sent,
        delta_recv,
        delta_bytes,
        delta_rtt,
        delta_exec,
        delta_queue,
        delta_errors:  diff(curr.errors,   prev.errors),
        delta_retrans: diff(curr.timeouts, prev.timeouts),
        iops:          per_sec(ops, duration_secs),
        avg_rtt_ms:    delta_rtt   as f64 / ops,
        avg_exec_ms:   delta_exec  as f64 / ops,
        avg_queue_ms:  delta_queue as f64 / ops,
        kb_per_op:     delta_bytes as f64 / ops / KB,
        kb_per_sec:    per_sec(delta_bytes as f64, duration_secs) / KB,
    })
}

/// Deltas for every operation of `current` that passes `filter` and saw activity,
/// ordered by operation name. Operations new in `current` are left out.
pub fn mount_deltas(
    previous:      &NfsMount,
    current:       &NfsMount,
    duration_secs: f64,
    filter:        &OpFilter,
) -> Vec<DeltaStats> {
    let mut out: Vec<DeltaStats> = current.operations.iter()
        .filter(|(name, _)| filter.matches(name))
        .filter_map(|(name, op)| compute_delta(previous.operations.get(name), Some(op), duration_secs))
        .filter(|d| d.delta_ops > 0)
        .collect();
    out.sort_by(|a, b| a.operation.cmp(&b.operation));
    out
}

/// Attribute cache counters between two samples; a reset counts as no activity.
pub fn event_deltas(previous: &EventCounters, current: &EventCounters) -> AttrCacheDelta {
    AttrCacheDelta {
        vfs_opens:          non_negative(diff(current.vfs_open,         previous.vfs_open)),
        inode_revalidates:  non_negative(diff(current.inode_revalidate, previous.inode_revalidate)),
        page_invalidations: non_negative(diff(current.data_invalidate,  previous.data_invalidate)),
        attr_invalidations: non_negative(diff(current.attr_invalidate,  previous.attr_invalidate)),
    }
}

/// Mount-wide ops/s over all active operations plus `bytes:` line throughput.
pub fn mount_summary(previous: &NfsMount, current: &NfsMount, duration_secs: f64) -> MountSummary {
    let ops_per_sec = mount_deltas(previous, current, duration_secs, &OpFilter::default())
        .iter()
        .map(|d| d.iops)
        .sum();
    let d_read  = non_negative(diff(current.bytes_read,    previous.bytes_read));
    let d_write = non_negative(diff(current.bytes_written, previous.bytes_written));

    MountSummary {
        ops_per_sec,
        read_kb_per_sec:  per_sec(d_read  as f64, duration_secs) / KB,
        write_kb_per_sec: per_sec(d_write as f64, duration_secs) / KB,
    }
}

/// Build the full per-interval report for one mount.
pub fn mount_report(
    previous:      &NfsMount,
    current:       &NfsMount,
    duration_secs: f64,
    filter:        &OpFilter,
) -> MountReport {
    MountReport {
        mount_point:  current.mount_point.clone(),
        device:       current.device.clone(),
        elapsed_secs: duration_secs,
        summary:      mount_summary(previous, current, duration_secs),
        attr_cache:   event_deltas(&previous.events, &current.events),
        operations:   mount_deltas(previous, current, duration_secs, filter),
    }
}

fn per_sec(amount: f64, duration_secs: f64) -> f64 {
    if duration_secs > 0.0 && duration_secs.is_finite() { amount / duration_secs } else { 0.0 }
}

/// Counter difference that cannot overflow on arbitrary parsed values.
fn diff(curr: i64, prev: i64) -> i64 {
    curr.saturating_sub(prev)
}

fn non_negative(v: i64) -> i64 {
    v.max(0)
}
