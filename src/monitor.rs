use crate::collectors::mountstats::read_mountstats;
use crate::config::Config;
use crate::display::{self, OutputFormat, RenderOptions};
use crate::models::nfs::{NfsMount, Snapshot};
use crate::stats::{mount_report, MountReport, OpFilter};
use anyhow::{bail, Context, Result};
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Shortest interval the loop will sleep between samples.
pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Everything the poll loop needs, resolved from config file and command line.
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub path:         PathBuf,
    pub interval:     Duration,
    pub count:        u64,
    pub mounts:       Vec<String>,   // empty = every NFS mount
    pub filter:       OpFilter,
    pub render:       RenderOptions,
    pub clear_screen: bool,
}

impl MonitorOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            path:         PathBuf::from(&cfg.general.mountstats_path),
            interval:     Duration::from_millis(cfg.general.interval_ms),
            count:        cfg.general.count,
            mounts:       cfg.filter.mounts.clone(),
            filter:       OpFilter::from_names(&cfg.filter.operations),
            render:       RenderOptions {
                format:         cfg.display.format,
                show_bandwidth: cfg.display.show_bandwidth,
                show_attr:      cfg.display.show_attr,
            },
            clear_screen: cfg.display.clear_screen,
        }
    }
}

/// Polls mountstats and reports per-interval deltas for the selected mounts.
pub struct Monitor {
    opts:        MonitorOptions,
    previous:    Snapshot,
    last_sample: Instant,
}

impl Monitor {
    /// Take the baseline sample. Any failure here is fatal.
    pub fn start(opts: MonitorOptions) -> Result<Self> {
        let previous = read_mountstats(&opts.path)
            .with_context(|| format!("reading initial sample from {}", opts.path.display()))?;
        let last_sample = Instant::now();

        if previous.is_empty() {
            bail!("no NFS mounts found in {}", opts.path.display());
        }
        for mp in &opts.mounts {
            if !previous.contains_key(mp) {
                bail!("{} is not an NFS mount point", mp);
            }
        }

        if opts.interval < MIN_INTERVAL {
            log::warn!("interval {:?} raised to the minimum of {:?}", opts.interval, MIN_INTERVAL);
        }
        log::debug!("baseline: {} NFS mount(s) from {}", previous.len(), opts.path.display());
        Ok(Self { opts, previous, last_sample })
    }

    /// Mounts currently being watched, ordered by mount point.
    pub fn monitored(&self) -> Vec<&NfsMount> {
        let mut v: Vec<&NfsMount> = self.previous.values()
            .filter(|m| self.is_selected(&m.mount_point))
            .collect();
        v.sort_by(|a, b| a.mount_point.cmp(&b.mount_point));
        v
    }

    /// Configured interval, floored at [`MIN_INTERVAL`].
    pub fn interval(&self) -> Duration {
        self.opts.interval.max(MIN_INTERVAL)
    }

    fn is_selected(&self, mount_point: &str) -> bool {
        self.opts.mounts.is_empty() || self.opts.mounts.iter().any(|m| m == mount_point)
    }

    /// Take one sample and compute reports against the previous one.
    ///
    /// A failed read is logged and returns `None`; the baseline is kept so the
    /// next successful sample covers the whole gap.
    pub fn sample(&mut self) -> Option<Vec<MountReport>> {
        let current = match read_mountstats(&self.opts.path) {
            Ok(s)  => s,
            Err(e) => {
                log::warn!("skipping sample: {}", e);
                return None;
            }
        };
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_sample).as_secs_f64();

        let mut reports = Vec::new();
        for (mp, curr) in &current {
            if !self.is_selected(mp) { continue; }
            match self.previous.get(mp) {
                Some(prev) => reports.push(mount_report(prev, curr, elapsed, &self.opts.filter)),
                None       => log::info!("new NFS mount {}, reporting from next interval", mp),
            }
        }
        for mp in self.previous.keys() {
            if self.is_selected(mp) && !current.contains_key(mp) {
                log::info!("NFS mount {} went away", mp);
            }
        }
        reports.sort_by(|a, b| a.mount_point.cmp(&b.mount_point));

        self.previous    = current;
        self.last_sample = now;
        Some(reports)
    }

    /// Sample once and print the result. Returns whether a report was produced.
    pub fn tick<W: Write>(&mut self, out: &mut W) -> Result<bool> {
        let Some(reports) = self.sample() else { return Ok(false) };

        if self.opts.clear_screen {
            display::clear_screen(out)?;
        }
        if self.opts.render.format == OutputFormat::Prometheus {
            display::render_prometheus(out, &self.monitored(), &reports)?;
        } else {
            let now = chrono::Local::now();
            for r in &reports {
                display::render(out, r, &self.opts.render, &now)?;
            }
        }
        out.flush()?;
        Ok(true)
    }

    /// Sleep, sample and print until `count` reports were printed (forever when 0).
    pub fn run<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let tick = self.interval();
        if !self.opts.render.format.is_machine_readable() {
            let interval_ms = tick.as_millis() as u64;
            display::render_banner(out, &self.monitored(), &self.opts.filter, interval_ms)?;
        }

        let mut shown = 0u64;
        while self.opts.count == 0 || shown < self.opts.count {
            std::thread::sleep(tick);
            if self.tick(out)? {
                shown += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn stats(read_ops: i64, write_ops: i64) -> String {
        format!("\
device srv:/export mounted on /mnt/a with fstype nfs4 statvers=1.1
\tage:\t100
\tevents:\t1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16 17 18 19 20 21 22 23 24 25
\tbytes:\t0 0 0 0 0 0 0 0
\tper-op statistics
\t        READ: {read_ops} {read_ops} 0 0 0 0 {read_ops} {read_ops} 0
\t       WRITE: {write_ops} {write_ops} 0 0 0 0 0 0 0
device srv:/other mounted on /mnt/b with fstype nfs statvers=1.1
\tage:\t50
\t        READ: 1 1 0 0 0 0 0 0 0
")
    }

    fn options(path: PathBuf, format: OutputFormat) -> MonitorOptions {
        MonitorOptions {
            path,
            interval:     Duration::from_millis(1),
            count:        1,
            mounts:       vec![],
            filter:       OpFilter::default(),
            render:       RenderOptions { format, ..Default::default() },
            clear_screen: false,
        }
    }

    #[test]
    fn missing_file_is_fatal_at_start() {
        let dir = tempfile::tempdir().unwrap();
        let err = Monitor::start(options(dir.path().join("nope"), OutputFormat::Table)).err().unwrap();
        assert!(format!("{:#}", err).contains("reading initial sample"));
    }

    #[test]
    fn malformed_file_is_fatal_at_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mountstats");
        fs::write(&path, "device srv:/export type nfs4\n").unwrap();
        assert!(Monitor::start(options(path, OutputFormat::Table)).is_err());
    }

    #[test]
    fn no_nfs_mounts_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mountstats");
        fs::write(&path, "device proc mounted on /proc with fstype proc\n").unwrap();
        assert!(Monitor::start(options(path, OutputFormat::Table)).is_err());
    }

    #[test]
    fn unknown_mount_point_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mountstats");
        fs::write(&path, stats(0, 0)).unwrap();
        let mut opts = options(path, OutputFormat::Table);
        opts.mounts = vec!["/mnt/zzz".into()];
        assert!(Monitor::start(opts).is_err());
    }

    #[test]
    fn sample_reports_activity_since_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mountstats");
        fs::write(&path, stats(10, 5)).unwrap();
        let mut mon = Monitor::start(options(path.clone(), OutputFormat::Table)).unwrap();
        assert_eq!(mon.monitored().len(), 2);

        fs::write(&path, stats(30, 5)).unwrap();
        let reports = mon.sample().unwrap();
        assert_eq!(reports.len(), 2);

        let a = &reports[0];
        assert_eq!(a.mount_point, "/mnt/a");
        assert_eq!(a.operations.len(), 1);
        assert_eq!(a.operations[0].operation, "READ");
        assert_eq!(a.operations[0].delta_ops, 20);
        assert_eq!(a.operations[0].avg_rtt_ms, 1.0);
        assert!(a.operations[0].iops.is_finite());
        assert!(reports[1].operations.is_empty());
    }

    #[test]
    fn failed_sample_is_skipped_and_baseline_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mountstats");
        fs::write(&path, stats(10, 0)).unwrap();
        let mut mon = Monitor::start(options(path.clone(), OutputFormat::Table)).unwrap();

        fs::write(&path, "device srv:/export type nfs4\n").unwrap();
        assert!(mon.sample().is_none());

        let mut out = Vec::new();
        assert!(!mon.tick(&mut out).unwrap());
        assert!(out.is_empty());

        fs::write(&path, stats(15, 0)).unwrap();
        let reports = mon.sample().unwrap();
        assert_eq!(reports[0].operations[0].delta_ops, 5);
    }

    #[test]
    fn selected_mount_limits_reports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mountstats");
        fs::write(&path, stats(0, 0)).unwrap();
        let mut opts = options(path.clone(), OutputFormat::Table);
        opts.mounts = vec!["/mnt/b".into()];
        let mut mon = Monitor::start(opts).unwrap();

        let reports = mon.sample().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].mount_point, "/mnt/b");
    }

    #[test]
    fn run_prints_json_lines_without_banner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mountstats");
        fs::write(&path, stats(1, 1)).unwrap();
        let mut mon = Monitor::start(options(path, OutputFormat::Json)).unwrap();

        let mut out = Vec::new();
        mon.run(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| l.starts_with('{')));
    }

    #[test]
    fn banner_shows_the_interval_actually_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mountstats");
        fs::write(&path, stats(1, 1)).unwrap();
        let mut mon = Monitor::start(options(path, OutputFormat::Table)).unwrap();
        assert_eq!(mon.interval(), MIN_INTERVAL);

        let mut out = Vec::new();
        mon.run(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("NFS client I/O statistics, every 100 ms\n"));
    }

    #[test]
    fn longer_intervals_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mountstats");
        fs::write(&path, stats(1, 1)).unwrap();
        let mut opts = options(path, OutputFormat::Table);
        opts.interval = Duration::from_millis(2500);
        assert_eq!(Monitor::start(opts).unwrap().interval(), Duration::from_millis(2500));
    }

    #[test]
    fn prometheus_tick_exports_every_selected_mount() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mountstats");
        fs::write(&path, stats(10, 0)).unwrap();
        let mut mon = Monitor::start(options(path.clone(), OutputFormat::Prometheus)).unwrap();

        fs::write(&path, stats(30, 0)).unwrap();
        let mut out = Vec::new();
        assert!(mon.tick(&mut out).unwrap());
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("NFS client I/O statistics"));
        assert!(text.contains(r#"mount_point="/mnt/a""#));
        assert!(text.contains(r#"mount_point="/mnt/b""#));
        assert!(text.lines().any(|l| l.starts_with("nfs_operation_per_second{")
            && l.contains(r#"mount_point="/mnt/a""#)
            && l.contains(r#"operation="READ""#)));
    }

    #[test]
    fn options_follow_config() {
        let mut cfg = Config::default();
        cfg.general.interval_ms = 2500;
        cfg.filter.operations = vec!["read".into()];
        cfg.display.format = OutputFormat::Iostat;
        let opts = MonitorOptions::from_config(&cfg);
        assert_eq!(opts.interval, Duration::from_millis(2500));
        assert_eq!(opts.path, PathBuf::from("/proc/self/mountstats"));
        assert!(opts.filter.matches("READ"));
        assert!(!opts.filter.matches("WRITE"));
        assert_eq!(opts.render.format, OutputFormat::Iostat);
    }
}
