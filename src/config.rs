use crate::collectors::mountstats::DEFAULT_PATH;
use crate::display::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub filter: FilterConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Sampling interval in milliseconds (at least 100)
    pub interval_ms: u64,
    /// Number of reports before exiting (0 = run until interrupted)
    pub count: u64,
    /// Where to read NFS client statistics from
    pub mountstats_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// "table", "iostat", "json" or "prometheus"
    pub format: OutputFormat,
    /// Add MB/s and KB/op columns to the table format
    pub show_bandwidth: bool,
    /// Add attribute cache lines to the iostat format
    pub show_attr: bool,
    /// Clear the terminal before every report
    pub clear_screen: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Operation names to report, e.g. ["READ", "WRITE"]. Empty = all.
    pub operations: Vec<String>,
    /// Mount points to report. Empty = every NFS mount.
    pub mounts: Vec<String>,
}

// ── Defaults ─────────────────────────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            interval_ms:     1000,
            count:           0,
            mountstats_path: DEFAULT_PATH.to_string(),
        }
    }
}

// ── Load / Save ───────────────────────────────────────────────────────

impl Config {
    /// Load the user config, falling back to defaults.
    ///
    /// A missing file is created with defaults (best-effort). A file that
    /// exists but does not parse is left alone and reported.
    pub fn load() -> Self {
        let Some(path) = Config::config_path() else {
            log::debug!("no config directory, using defaults");
            return Config::default();
        };
        if !path.exists() {
            if let Err(e) = write_defaults(&path) {
                log::debug!("could not write default config to {}: {:#}", path.display(), e);
            }
            return Config::default();
        }
        match Config::load_from(&path) {
            Ok(c)  => c,
            Err(e) => {
                log::warn!("ignoring config {}: {:#}", path.display(), e);
                Config::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let cfg: Config = toml::from_str(&text)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(cfg)
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("nfsmon").join("nfsmon.toml"))
    }
}

fn write_defaults(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = toml::to_string_pretty(&Config::default())?;
    fs::write(path, format!("# nfsmon configuration\n# Generated on first run, edit freely\n\n{}", text))?;
    Ok(())
}
