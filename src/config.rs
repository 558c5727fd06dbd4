use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IoResultExt, Result};

/// how HEAD advances after a new checkpoint
///
/// chosen at construction time and applied consistently: `Branching` keeps
/// HEAD symbolic on a branch under `refs/heads/`, `Linear` keeps HEAD
/// detached on the latest commit with single-parent history.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
    #[default]
    Branching,
    Linear,
}

/// engine configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// root under which per-project storage directories live
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,

    /// glob patterns excluded from snapshots
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// files larger than this are skipped (bytes)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// author recorded on commits when the caller passes none
    #[serde(default = "default_author")]
    pub author: String,

    /// gzip level for stored objects, 0..=9
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,

    #[serde(default)]
    pub history: HistoryMode,
}

impl Config {
    /// load config from a toml file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// save config to a toml file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_path(path)?;
        Ok(())
    }

    /// gzip level clamped to the valid range
    pub fn compression(&self) -> flate2::Compression {
        flate2::Compression::new(self.compression_level.min(9))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            ignore_patterns: default_ignore_patterns(),
            max_file_size: default_max_file_size(),
            author: default_author(),
            compression_level: default_compression_level(),
            history: HistoryMode::default(),
        }
    }
}

fn default_base_path() -> PathBuf {
    home_dir().join("waypoint").join("checkpoints")
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_ignore_patterns() -> Vec<String> {
    [
        "node_modules/**",
        ".git/**",
        ".DS_Store",
        "*.log",
        "tmp/**",
        "temp/**",
        "dist/**",
        "build/**",
        ".next/**",
        ".nuxt/**",
        "coverage/**",
        ".nyc_output/**",
        ".cache/**",
        "*.tmp",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_file_size() -> u64 {
    100 * 1024 * 1024
}

fn default_author() -> String {
    "waypoint-user".to_string()
}

fn default_compression_level() -> u32 {
    6
}
