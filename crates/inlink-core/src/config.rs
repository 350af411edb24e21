use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Defaults for the command analyzer (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Shell command run once per page when the job config names none.
    #[serde(default)]
    pub command: Option<String>,
    /// Per-page time limit in seconds; a page that exceeds it is skipped.
    #[serde(default = "default_analyzer_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_analyzer_timeout_secs() -> u64 {
    120
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            command: None,
            timeout_secs: default_analyzer_timeout_secs(),
        }
    }
}

impl AnalyzerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Global configuration loaded from `~/.config/inlink/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlinkConfig {
    /// Directory holding job records and checkpoints (None = `~/.local/state/inlink/jobs`).
    #[serde(default)]
    pub jobs_dir: Option<PathBuf>,
    /// Terminal jobs older than this many days are removed by `inlink cleanup`.
    pub retention_days: u64,
    /// Pause between pages, in milliseconds.
    pub unit_delay_ms: u64,
    /// Minimum interval between progress lines printed by the CLI.
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
    /// Optional analyzer defaults; if missing, built-in defaults are used.
    #[serde(default)]
    pub analyzer: Option<AnalyzerConfig>,
}

fn default_progress_interval_ms() -> u64 {
    500
}

impl Default for InlinkConfig {
    fn default() -> Self {
        Self {
            jobs_dir: None,
            retention_days: 7,
            unit_delay_ms: 0,
            progress_interval_ms: default_progress_interval_ms(),
            analyzer: None,
        }
    }
}

impl InlinkConfig {
    /// Configured jobs directory, or the default under the XDG state dir.
    pub fn jobs_dir(&self) -> Result<PathBuf> {
        match &self.jobs_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(state_dir()?.join("jobs")),
        }
    }

    pub fn unit_delay(&self) -> Duration {
        Duration::from_millis(self.unit_delay_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days.saturating_mul(24 * 60 * 60))
    }

    pub fn analyzer(&self) -> AnalyzerConfig {
        self.analyzer.clone().unwrap_or_default()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("inlink")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// `~/.local/state/inlink`: log file, control socket, default jobs dir.
pub fn state_dir() -> std::io::Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("inlink")?;
    Ok(xdg_dirs.get_state_home().join("inlink"))
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<InlinkConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = InlinkConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

/// Load configuration from an explicit file.
pub fn load_from(path: &Path) -> Result<InlinkConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config: {}", path.display()))?;
    let cfg: InlinkConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}
