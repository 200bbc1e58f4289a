use crate::metrics::PrometheusExporter;
use crate::models::nfs::{NfsMount, Snapshot};
use crate::stats::{MountReport, OpFilter};
use crate::util::human::{fmt_age, fmt_bytes, fmt_kb_rate};
use chrono::{DateTime, Local};
use crossterm::{
    cursor::MoveTo,
    execute,
    terminal::{Clear, ClearType},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::io::{self, Write};

/// How each interval report is printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One row per active operation
    #[default]
    Table,
    /// nfsiostat-style blocks per operation
    Iostat,
    /// One JSON object per mount per interval
    Json,
    /// Prometheus text exposition per interval
    Prometheus,
}

impl OutputFormat {
    /// Formats meant for other programs get no banner.
    pub fn is_machine_readable(self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Prometheus)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderOptions {
    pub format:         OutputFormat,
    pub show_bandwidth: bool,
    pub show_attr:      bool,
}

pub fn clear_screen<W: Write>(w: &mut W) -> io::Result<()> {
    execute!(w, Clear(ClearType::All), MoveTo(0, 0))
}

/// Print one interval report in the configured format.
pub fn render<W: Write>(
    w:      &mut W,
    report: &MountReport,
    opts:   &RenderOptions,
    now:    &DateTime<Local>,
) -> io::Result<()> {
    match opts.format {
        OutputFormat::Table      => render_table(w, report, opts.show_bandwidth, now),
        OutputFormat::Iostat     => render_iostat(w, report, opts.show_attr),
        OutputFormat::Json       => render_json(w, report, now),
        OutputFormat::Prometheus => render_prometheus(w, &[], std::slice::from_ref(report)),
    }
}

/// Startup summary of what is being watched.
pub fn render_banner<W: Write>(
    w:           &mut W,
    mounts:      &[&NfsMount],
    filter:      &OpFilter,
    interval_ms: u64,
) -> io::Result<()> {
    writeln!(w, "NFS client I/O statistics, every {} ms", interval_ms)?;
    writeln!(w, "Monitoring {} NFS mount(s):", mounts.len())?;
    for m in mounts {
        writeln!(w, "  {} -> {}", m.device, m.mount_point)?;
    }
    if !filter.is_empty() {
        writeln!(w, "Operations: {}", filter.names().join(", "))?;
    }
    writeln!(w)
}

// ── Table ─────────────────────────────────────────────────────────────

/// Column table of active operations. Prints nothing for an idle interval.
pub fn render_table<W: Write>(
    w:              &mut W,
    report:         &MountReport,
    show_bandwidth: bool,
    now:            &DateTime<Local>,
) -> io::Result<()> {
    if report.operations.is_empty() {
        return Ok(());
    }

    writeln!(w, "{} mounted on {}  {}", report.device, report.mount_point, now.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(w, "{}", summary_line(report))?;
    if show_bandwidth {
        writeln!(w, "{:<14} {:>10} {:>10} {:>10} {:>10} {:>10} {:>8}",
            "OP", "IOPS", "RTT(ms)", "EXE(ms)", "MB/s", "KB/op", "ERRORS")?;
        writeln!(w, "{}", "-".repeat(78))?;
    } else {
        writeln!(w, "{:<14} {:>10} {:>10} {:>10} {:>8}",
            "OP", "IOPS", "RTT(ms)", "EXE(ms)", "ERRORS")?;
        writeln!(w, "{}", "-".repeat(56))?;
    }

    for d in &report.operations {
        if show_bandwidth {
            writeln!(w, "{:<14} {:>10.1} {:>10.3} {:>10.3} {:>10.3} {:>10.2} {:>8}",
                d.operation, d.iops, d.avg_rtt_ms, d.avg_exec_ms,
                d.kb_per_sec / 1024.0, d.kb_per_op, d.delta_errors)?;
        } else {
            writeln!(w, "{:<14} {:>10.1} {:>10.3} {:>10.3} {:>8}",
                d.operation, d.iops, d.avg_rtt_ms, d.avg_exec_ms, d.delta_errors)?;
        }
    }
    writeln!(w)
}

// ── nfsiostat layout ──────────────────────────────────────────────────

/// Per-operation blocks in the nfsiostat layout. Always prints the mount header.
pub fn render_iostat<W: Write>(w: &mut W, report: &MountReport, show_attr: bool) -> io::Result<()> {
    let s = &report.summary;
    writeln!(w, "\n{} mounted on {}:\n", report.device, report.mount_point)?;
    writeln!(w, "{:>16} {:>16} {:>16}", "ops/s", "read kB/s", "write kB/s")?;
    writeln!(w, "{:>16.3} {:>16.3} {:>16.3}\n", s.ops_per_sec, s.read_kb_per_sec, s.write_kb_per_sec)?;

    for d in &report.operations {
        writeln!(w, "{}:", d.operation.to_lowercase())?;
        writeln!(w, "{:>16} {:>16} {:>16} {:>16} {:>16} {:>16} {:>16} {:>16}",
            "ops/s", "kB/s", "kB/op", "retrans", "avg RTT (ms)", "avg exe (ms)", "avg queue (ms)", "errors")?;
        writeln!(w, "{:>16.3} {:>16.3} {:>16.3} {:>16} {:>16.3} {:>16.3} {:>16.3} {:>16}",
            d.iops, d.kb_per_sec, d.kb_per_op,
            format!("{} ({:.1}%)", d.delta_retrans, d.retrans_pct()),
            d.avg_rtt_ms, d.avg_exec_ms, d.avg_queue_ms,
            format!("{} ({:.1}%)", d.delta_errors, d.error_pct()))?;
    }

    if show_attr {
        let a = &report.attr_cache;
        writeln!(w)?;
        writeln!(w, "{} VFS opens", a.vfs_opens)?;
        writeln!(w, "{} inoderevalidates (forced GETATTRs)", a.inode_revalidates)?;
        writeln!(w, "{} page cache invalidations", a.page_invalidations)?;
        writeln!(w, "{} attribute cache invalidations", a.attr_invalidations)?;
    }
    Ok(())
}

// ── JSON ──────────────────────────────────────────────────────────────

/// One JSON object per line.
pub fn render_json<W: Write>(w: &mut W, report: &MountReport, now: &DateTime<Local>) -> io::Result<()> {
    let line = json!({
        "timestamp":    now.to_rfc3339(),
        "mount_point":  report.mount_point,
        "device":       report.device,
        "elapsed_secs": report.elapsed_secs,
        "summary":      report.summary,
        "attr_cache":   report.attr_cache,
        "operations":   report.operations,
    });
    serde_json::to_writer(&mut *w, &line)?;
    writeln!(w)
}

/// Full parsed snapshot as pretty JSON, mounts ordered by mount point.
pub fn render_snapshot_json<W: Write>(w: &mut W, snapshot: &Snapshot, now: &DateTime<Local>) -> io::Result<()> {
    let mounts: BTreeMap<&String, &NfsMount> = snapshot.iter().collect();
    let doc = json!({
        "timestamp": now.to_rfc3339(),
        "mounts":    mounts,
    });
    serde_json::to_writer_pretty(&mut *w, &doc)?;
    writeln!(w)
}

// ── Prometheus ────────────────────────────────────────────────────────

/// Cumulative counters for `mounts` plus interval rates for `reports`.
pub fn render_prometheus<W: Write>(w: &mut W, mounts: &[&NfsMount], reports: &[MountReport]) -> io::Result<()> {
    let exporter = PrometheusExporter::new().map_err(io::Error::other)?;
    for m in mounts {
        exporter.observe_mount(m);
    }
    for r in reports {
        exporter.observe_report(r);
    }
    exporter.encode(w).map_err(io::Error::other)
}

// ── Mount list ────────────────────────────────────────────────────────

pub fn render_mount_list<W: Write>(w: &mut W, snapshot: &Snapshot) -> io::Result<()> {
    if snapshot.is_empty() {
        return writeln!(w, "No NFS mounts found.");
    }

    let mut mounts: Vec<&NfsMount> = snapshot.values().collect();
    mounts.sort_by(|a, b| a.mount_point.cmp(&b.mount_point));

    writeln!(w, "{:<24} {:<6} {:<32} {:>5} {:>10} {:>10} {:>5}",
        "MOUNT", "TYPE", "DEVICE", "AGE", "READ", "WRITTEN", "OPS")?;
    for m in mounts {
        let device = if m.device.chars().count() > 32 {
            format!("{}…", m.device.chars().take(31).collect::<String>())
        } else {
            m.device.clone()
        };
        writeln!(w, "{:<24} {:<6} {:<32} {:>5} {:>10} {:>10} {:>5}",
            m.mount_point,
            m.fstype.as_deref().unwrap_or("nfs"),
            device,
            fmt_age(m.age_secs),
            fmt_bytes(m.bytes_read),
            fmt_bytes(m.bytes_written),
            m.operations.len())?;
    }
    Ok(())
}

/// Mount-wide throughput line shown under the table header.
pub fn summary_line(report: &MountReport) -> String {
    format!("{:.1} ops/s  read {}  write {}",
        report.summary.ops_per_sec,
        fmt_kb_rate(report.summary.read_kb_per_sec),
        fmt_kb_rate(report.summary.write_kb_per_sec))
}
