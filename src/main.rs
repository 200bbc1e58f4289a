use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use nfsmon::collectors::mountstats::read_mountstats;
use nfsmon::config::Config;
use nfsmon::display::{self, OutputFormat};
use nfsmon::monitor::{Monitor, MonitorOptions};
use nfsmon::stats::OpFilter;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "nfsmon", about = "Per-operation NFS client I/O statistics", version = "0.1")]
struct Cli {
    /// Mount point to monitor (default: every NFS mount)
    mount: Option<String>,

    /// Comma-separated operations to show, e.g. READ,WRITE,GETATTR
    #[arg(long)]
    ops: Option<String>,

    /// Update interval in milliseconds (minimum 100)
    #[arg(short, long)]
    interval: Option<u64>,

    /// Number of reports before exiting (0 = until interrupted)
    #[arg(short, long)]
    count: Option<u64>,

    /// Read statistics from this file instead of /proc/self/mountstats
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// nfsiostat-style per-operation blocks
    #[arg(long, conflicts_with = "json")]
    iostat: bool,

    /// Show attribute cache statistics (iostat format)
    #[arg(long)]
    attr: bool,

    /// Show bandwidth columns (table format)
    #[arg(long)]
    bw: bool,

    /// Clear the screen before every report
    #[arg(long)]
    clear: bool,

    /// One JSON object per mount per interval
    #[arg(long)]
    json: bool,

    /// Prometheus text exposition each interval (with --snapshot: counters once)
    #[arg(long, conflicts_with_all = ["json", "iostat"])]
    prometheus: bool,

    /// Print one parsed snapshot as JSON and exit
    #[arg(long)]
    snapshot: bool,

    /// List NFS mounts and exit
    #[arg(long)]
    list: bool,

    /// Print config file path and current values, then exit
    #[arg(long)]
    config: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    if cli.config {
        return run_print_config();
    }

    let mut cfg = Config::load();
    apply_cli(&mut cfg, &cli);
    let path = PathBuf::from(&cfg.general.mountstats_path);

    if cli.list {
        return run_list(&path);
    }
    if cli.snapshot {
        return run_snapshot(&path, cfg.display.format);
    }

    let mut opts = MonitorOptions::from_config(&cfg);
    if let Some(list) = &cli.ops {
        opts.filter = OpFilter::parse(list);
    }
    if let Some(mp) = &cli.mount {
        opts.mounts = vec![mp.clone()];
    }
    run_monitor(opts)
}

/// Command-line flags win over the config file.
fn apply_cli(cfg: &mut Config, cli: &Cli) {
    if let Some(ms) = cli.interval { cfg.general.interval_ms = ms; }
    if let Some(n)  = cli.count    { cfg.general.count = n; }
    if let Some(f)  = &cli.file    { cfg.general.mountstats_path = f.to_string_lossy().into_owned(); }

    if cli.json {
        cfg.display.format = OutputFormat::Json;
    } else if cli.prometheus {
        cfg.display.format = OutputFormat::Prometheus;
    } else if cli.iostat {
        cfg.display.format = OutputFormat::Iostat;
    }
    cfg.display.show_attr      |= cli.attr;
    cfg.display.show_bandwidth |= cli.bw;
    cfg.display.clear_screen   |= cli.clear;
}

fn run_monitor(opts: MonitorOptions) -> Result<()> {
    log::info!("monitoring {} every {:?}", opts.path.display(), opts.interval);
    let mut monitor = Monitor::start(opts)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    monitor.run(&mut out)
}

fn run_list(path: &Path) -> Result<()> {
    let snapshot = read_mountstats(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let mut out = io::stdout().lock();
    display::render_mount_list(&mut out, &snapshot)?;
    out.flush()?;
    Ok(())
}

fn run_snapshot(path: &Path, format: OutputFormat) -> Result<()> {
    let snapshot = read_mountstats(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let mut out = io::stdout().lock();
    if format == OutputFormat::Prometheus {
        let mut mounts: Vec<_> = snapshot.values().collect();
        mounts.sort_by(|a, b| a.mount_point.cmp(&b.mount_point));
        display::render_prometheus(&mut out, &mounts, &[])?;
    } else {
        display::render_snapshot_json(&mut out, &snapshot, &chrono::Local::now())?;
    }
    out.flush()?;
    Ok(())
}

fn run_print_config() -> Result<()> {
    let cfg = Config::load();
    let path = Config::config_path()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "(unknown)".to_string());
    let ops = if cfg.filter.operations.is_empty() {
        "(all)".to_string()
    } else {
        cfg.filter.operations.join(", ")
    };
    let mounts = if cfg.filter.mounts.is_empty() {
        "(all)".to_string()
    } else {
        cfg.filter.mounts.join(", ")
    };
    println!("Config: {}", path);
    println!();
    println!("[general]");
    println!("  interval_ms     = {}", cfg.general.interval_ms);
    println!("  count           = {}", cfg.general.count);
    println!("  mountstats_path = {}", cfg.general.mountstats_path);
    println!();
    println!("[display]");
    println!("  format          = {:?}", cfg.display.format);
    println!("  show_bandwidth  = {}", cfg.display.show_bandwidth);
    println!("  show_attr       = {}", cfg.display.show_attr);
    println!("  clear_screen    = {}", cfg.display.clear_screen);
    println!();
    println!("[filter]");
    println!("  operations      = {}", ops);
    println!("  mounts          = {}", mounts);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "nfsmon", "/mnt/a", "-i", "250", "-c", "3", "-f", "/tmp/ms", "--iostat", "--attr",
        ]);
        let mut cfg = Config::default();
        apply_cli(&mut cfg, &cli);
        assert_eq!(cfg.general.interval_ms, 250);
        assert_eq!(cfg.general.count, 3);
        assert_eq!(cfg.general.mountstats_path, "/tmp/ms");
        assert_eq!(cfg.display.format, OutputFormat::Iostat);
        assert!(cfg.display.show_attr);
        assert!(!cfg.display.show_bandwidth);
        assert_eq!(cli.mount.as_deref(), Some("/mnt/a"));
    }

    #[test]
    fn absent_flags_keep_config_values() {
        let cli = Cli::parse_from(["nfsmon"]);
        let mut cfg = Config::default();
        cfg.general.interval_ms = 5000;
        cfg.display.show_bandwidth = true;
        cfg.display.format = OutputFormat::Iostat;
        apply_cli(&mut cfg, &cli);
        assert_eq!(cfg.general.interval_ms, 5000);
        assert!(cfg.display.show_bandwidth);
        assert_eq!(cfg.display.format, OutputFormat::Iostat);
    }

    #[test]
    fn json_and_iostat_conflict() {
        assert!(Cli::try_parse_from(["nfsmon", "--json", "--iostat"]).is_err());
        assert!(Cli::try_parse_from(["nfsmon", "--prometheus", "--json"]).is_err());
        assert!(Cli::try_parse_from(["nfsmon", "--prometheus", "--iostat"]).is_err());
    }

    #[test]
    fn prometheus_flag_selects_format() {
        let cli = Cli::parse_from(["nfsmon", "--prometheus", "--snapshot"]);
        let mut cfg = Config::default();
        apply_cli(&mut cfg, &cli);
        assert_eq!(cfg.display.format, OutputFormat::Prometheus);
        assert!(cli.snapshot);
    }
}
