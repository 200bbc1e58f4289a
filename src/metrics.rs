//! Prometheus text exposition for NFS mounts.
//!
//! An exporter is built per scrape: cumulative kernel counters come from the
//! current [`NfsMount`]s, interval rates from the [`MountReport`]s. Nothing is
//! carried between scrapes, so a counter's value is exactly the kernel's.

use crate::models::nfs::{EventCounters, NfsMount};
use crate::stats::MountReport;
use prometheus::{
    CounterVec, Encoder, GaugeVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::io::Write;

pub type Result<T> = std::result::Result<T, prometheus::Error>;

const MOUNT_LABELS: &[&str] = &["mount_point", "server", "export"];
const OP_LABELS:    &[&str] = &["mount_point", "operation"];
const EVENT_LABELS: &[&str] = &["mount_point", "event"];
const RATE_LABELS:  &[&str] = &["mount_point"];

pub struct PrometheusExporter {
    registry: Registry,

    // ── cumulative ──
    age_seconds:        IntGaugeVec,
    read_bytes:         IntCounterVec,
    write_bytes:        IntCounterVec,
    op_requests:        IntCounterVec,
    op_transmissions:   IntCounterVec,
    op_timeouts:        IntCounterVec,
    op_sent_bytes:      IntCounterVec,
    op_received_bytes:  IntCounterVec,
    op_errors:          IntCounterVec,
    op_queue_seconds:   CounterVec,
    op_rtt_seconds:     CounterVec,
    op_execute_seconds: CounterVec,
    events:             IntCounterVec,

    // ── last interval ──
    mount_ops_rate:        GaugeVec,
    mount_read_kb_rate:    GaugeVec,
    mount_write_kb_rate:   GaugeVec,
    op_rate:               GaugeVec,
    op_kb_rate:            GaugeVec,
    op_avg_rtt_seconds:    GaugeVec,
    op_avg_exec_seconds:   GaugeVec,
    op_avg_queue_seconds:  GaugeVec,
}

impl PrometheusExporter {
    pub fn new() -> Result<Self> {
        let r = Registry::new();
        Ok(Self {
            age_seconds:        int_gauge(&r, "nfs_mount_age_seconds", "Seconds since the NFS mount was created", MOUNT_LABELS)?,
            read_bytes:         int_counter(&r, "nfs_mount_read_bytes_total", "Bytes read as reported on the mountstats bytes line", MOUNT_LABELS)?,
            write_bytes:        int_counter(&r, "nfs_mount_write_bytes_total", "Bytes written as reported on the mountstats bytes line", MOUNT_LABELS)?,
            op_requests:        int_counter(&r, "nfs_operations_requests_total", "RPC requests issued per operation", OP_LABELS)?,
            op_transmissions:   int_counter(&r, "nfs_operations_transmissions_total", "RPC transmissions per operation, retransmits included", OP_LABELS)?,
            op_timeouts:        int_counter(&r, "nfs_operations_major_timeouts_total", "Major timeouts per operation", OP_LABELS)?,
            op_sent_bytes:      int_counter(&r, "nfs_operations_sent_bytes_total", "Bytes sent per operation", OP_LABELS)?,
            op_received_bytes:  int_counter(&r, "nfs_operations_received_bytes_total", "Bytes received per operation", OP_LABELS)?,
            op_errors:          int_counter(&r, "nfs_operations_errors_total", "Operations that completed with an error", OP_LABELS)?,
            op_queue_seconds:   counter(&r, "nfs_operations_queue_time_seconds_total", "Time requests spent queued before transmission", OP_LABELS)?,
            op_rtt_seconds:     counter(&r, "nfs_operations_response_time_seconds_total", "Time spent waiting for server replies", OP_LABELS)?,
            op_execute_seconds: counter(&r, "nfs_operations_request_time_seconds_total", "Total time from queueing to completion", OP_LABELS)?,
            events:             int_counter(&r, "nfs_events_total", "VFS and cache events from the mountstats events line", EVENT_LABELS)?,

            mount_ops_rate:       gauge(&r, "nfs_mount_operations_per_second", "Operations per second over the last interval", RATE_LABELS)?,
            mount_read_kb_rate:   gauge(&r, "nfs_mount_read_kilobytes_per_second", "Read throughput over the last interval", RATE_LABELS)?,
            mount_write_kb_rate:  gauge(&r, "nfs_mount_write_kilobytes_per_second", "Write throughput over the last interval", RATE_LABELS)?,
            op_rate:              gauge(&r, "nfs_operation_per_second", "Operations per second over the last interval", OP_LABELS)?,
            op_kb_rate:           gauge(&r, "nfs_operation_kilobytes_per_second", "Kilobytes per second over the last interval", OP_LABELS)?,
            op_avg_rtt_seconds:   gauge(&r, "nfs_operation_avg_rtt_seconds", "Mean round-trip time over the last interval", OP_LABELS)?,
            op_avg_exec_seconds:  gauge(&r, "nfs_operation_avg_execute_seconds", "Mean execute time over the last interval", OP_LABELS)?,
            op_avg_queue_seconds: gauge(&r, "nfs_operation_avg_queue_seconds", "Mean queue time over the last interval", OP_LABELS)?,
            registry: r,
        })
    }

    /// Record the cumulative counters of one mount.
    pub fn observe_mount(&self, m: &NfsMount) {
        let mount = [m.mount_point.as_str(), m.server.as_str(), m.export.as_str()];
        self.age_seconds.with_label_values(&mount).set(m.age_secs);
        self.read_bytes.with_label_values(&mount).inc_by(count(m.bytes_read));
        self.write_bytes.with_label_values(&mount).inc_by(count(m.bytes_written));

        for op in m.operations.values() {
            let l = [m.mount_point.as_str(), op.name.as_str()];
            self.op_requests.with_label_values(&l).inc_by(count(op.ops));
            self.op_transmissions.with_label_values(&l).inc_by(count(op.ntrans));
            self.op_timeouts.with_label_values(&l).inc_by(count(op.timeouts));
            self.op_sent_bytes.with_label_values(&l).inc_by(count(op.bytes_sent));
            self.op_received_bytes.with_label_values(&l).inc_by(count(op.bytes_recv));
            self.op_errors.with_label_values(&l).inc_by(count(op.errors));
            self.op_queue_seconds.with_label_values(&l).inc_by(seconds(op.queue_ms));
            self.op_rtt_seconds.with_label_values(&l).inc_by(seconds(op.rtt_ms));
            self.op_execute_seconds.with_label_values(&l).inc_by(seconds(op.execute_ms));
        }

        for (name, value) in EventCounters::NAMES.iter().copied().zip(m.events.values()) {
            self.events.with_label_values(&[m.mount_point.as_str(), name]).inc_by(count(value));
        }
    }

    /// Record the rates of one interval report.
    pub fn observe_report(&self, r: &MountReport) {
        let mp = [r.mount_point.as_str()];
        self.mount_ops_rate.with_label_values(&mp).set(r.summary.ops_per_sec);
        self.mount_read_kb_rate.with_label_values(&mp).set(r.summary.read_kb_per_sec);
        self.mount_write_kb_rate.with_label_values(&mp).set(r.summary.write_kb_per_sec);

        for d in &r.operations {
            let l = [r.mount_point.as_str(), d.operation.as_str()];
            self.op_rate.with_label_values(&l).set(d.iops);
            self.op_kb_rate.with_label_values(&l).set(d.kb_per_sec);
            self.op_avg_rtt_seconds.with_label_values(&l).set(d.avg_rtt_ms / 1000.0);
            self.op_avg_exec_seconds.with_label_values(&l).set(d.avg_exec_ms / 1000.0);
            self.op_avg_queue_seconds.with_label_values(&l).set(d.avg_queue_ms / 1000.0);
        }
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        TextEncoder::new().encode(&self.registry.gather(), w)
    }
}

fn int_counter(r: &Registry, name: &str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    let v = IntCounterVec::new(Opts::new(name, help), labels)?;
    r.register(Box::new(v.clone()))?;
    Ok(v)
}

fn counter(r: &Registry, name: &str, help: &str, labels: &[&str]) -> Result<CounterVec> {
    let v = CounterVec::new(Opts::new(name, help), labels)?;
    r.register(Box::new(v.clone()))?;
    Ok(v)
}

fn int_gauge(r: &Registry, name: &str, help: &str, labels: &[&str]) -> Result<IntGaugeVec> {
    let v = IntGaugeVec::new(Opts::new(name, help), labels)?;
    r.register(Box::new(v.clone()))?;
    Ok(v)
}

fn gauge(r: &Registry, name: &str, help: &str, labels: &[&str]) -> Result<GaugeVec> {
    let v = GaugeVec::new(Opts::new(name, help), labels)?;
    r.register(Box::new(v.clone()))?;
    Ok(v)
}

// Kernel counters never go negative; a corrupt value is exported as 0.
fn count(v: i64) -> u64 {
    v.max(0) as u64
}

fn seconds(ms: i64) -> f64 {
    ms.max(0) as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::nfs::{DeltaStats, OpStats};
    use crate::stats::{AttrCacheDelta, MountSummary};

    /// Value of the first sample of `name` whose label set contains all `labels`.
    fn sample(text: &str, name: &str, labels: &[&str]) -> Option<f64> {
        text.lines()
            .filter(|l| !l.starts_with('#'))
            .filter(|l| l.split(['{', ' ']).next() == Some(name))
            .find(|l| labels.iter().all(|lbl| l.contains(lbl)))
            .and_then(|l| l.rsplit(' ').next())
            .and_then(|v| v.parse().ok())
    }

    fn mount() -> NfsMount {
        let mut m = NfsMount::new("srv:/export", "/mnt/nfs");
        m.age_secs = 3600;
        m.bytes_read = 4096;
        m.bytes_written = -1;
        m.events.vfs_open = 42;
        m.operations.insert("READ".into(), OpStats {
            name:       "READ".into(),
            ops:        12800,
            ntrans:     12801,
            timeouts:   1,
            bytes_sent: 2150400,
            bytes_recv: 53248000,
            queue_ms:   512,
            rtt_ms:     25600,
            execute_ms: 26880,
            errors:     3,
        });
        m
    }

    fn encode(exporter: &PrometheusExporter) -> String {
        let mut buf = Vec::new();
        exporter.encode(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn mount_counters_are_exported_with_labels() {
        let e = PrometheusExporter::new().unwrap();
        e.observe_mount(&mount());
        let text = encode(&e);

        assert!(text.contains("# TYPE nfs_operations_requests_total counter"));
        assert!(text.contains("# TYPE nfs_mount_age_seconds gauge"));
        let mp = r#"mount_point="/mnt/nfs""#;
        let read = r#"operation="READ""#;
        assert_eq!(sample(&text, "nfs_mount_age_seconds", &[mp, r#"server="srv""#, r#"export="/export""#]), Some(3600.0));
        assert_eq!(sample(&text, "nfs_mount_read_bytes_total", &[mp]), Some(4096.0));
        assert_eq!(sample(&text, "nfs_mount_write_bytes_total", &[mp]), Some(0.0));
        assert_eq!(sample(&text, "nfs_operations_requests_total", &[mp, read]), Some(12800.0));
        assert_eq!(sample(&text, "nfs_operations_transmissions_total", &[mp, read]), Some(12801.0));
        assert_eq!(sample(&text, "nfs_operations_errors_total", &[mp, read]), Some(3.0));
        assert_eq!(sample(&text, "nfs_operations_response_time_seconds_total", &[mp, read]), Some(25.6));
        assert_eq!(sample(&text, "nfs_events_total", &[mp, r#"event="vfs_open""#]), Some(42.0));
        assert_eq!(sample(&text, "nfs_events_total", &[mp, r#"event="pnfs_write""#]), Some(0.0));
    }

    #[test]
    fn interval_rates_are_gauges() {
        let e = PrometheusExporter::new().unwrap();
        e.observe_report(&MountReport {
            mount_point:  "/mnt/nfs".into(),
            device:       "srv:/export".into(),
            elapsed_secs: 1.0,
            summary:      MountSummary { ops_per_sec: 10.0, read_kb_per_sec: 4.0, write_kb_per_sec: 0.5 },
            attr_cache:   AttrCacheDelta::default(),
            operations:   vec![DeltaStats {
                operation:  "READ".into(),
                delta_ops:  10,
                iops:       10.0,
                avg_rtt_ms: 30.0,
                kb_per_sec: 2.0,
                ..Default::default()
            }],
        });
        let text = encode(&e);

        let mp = r#"mount_point="/mnt/nfs""#;
        assert!(text.contains("# TYPE nfs_operation_per_second gauge"));
        assert_eq!(sample(&text, "nfs_mount_operations_per_second", &[mp]), Some(10.0));
        assert_eq!(sample(&text, "nfs_mount_write_kilobytes_per_second", &[mp]), Some(0.5));
        assert_eq!(sample(&text, "nfs_operation_per_second", &[mp, r#"operation="READ""#]), Some(10.0));
        assert_eq!(sample(&text, "nfs_operation_avg_rtt_seconds", &[mp]), Some(0.03));
    }

    #[test]
    fn each_exporter_starts_from_zero() {
        for _ in 0..2 {
            let e = PrometheusExporter::new().unwrap();
            e.observe_mount(&mount());
            let text = encode(&e);
            assert_eq!(sample(&text, "nfs_operations_requests_total", &[r#"operation="READ""#]), Some(12800.0));
        }
    }
}
