//! hwtree Configuration
//!
//! Configuration lives in /etc/hwtree/config.toml. Every field has a default,
//! so a partial file (or no file at all) is fine.

use crate::cpuinfo::CpuArch;
use crate::error::ConfigError;
use crate::scsi::enumerator::DEFAULT_MAX_CONTROLLERS;
use crate::scsi::DEFAULT_CANDIDATES;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// System configuration directory
pub const SYSTEM_CONFIG_DIR: &str = "/etc/hwtree";
const CONFIG_FILE: &str = "config.toml";

/// SCSI generic probe settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScsiConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Endpoint path template, `{}` is replaced by the controller index
    #[serde(default = "default_sg_device_template")]
    pub sg_device_template: String,

    #[serde(default = "default_proc_scsi_dir")]
    pub proc_scsi_dir: PathBuf,

    /// Device paths probed to name SCSI devices, in priority order
    #[serde(default = "default_candidate_devices")]
    pub candidate_devices: Vec<String>,

    /// Stop the index walk here even if endpoints keep opening
    #[serde(default = "default_max_controllers")]
    pub max_controllers: u32,
}

fn default_enabled() -> bool {
    true
}

fn default_sg_device_template() -> String {
    "/dev/sg{}".to_string()
}

fn default_proc_scsi_dir() -> PathBuf {
    PathBuf::from("/proc/scsi")
}

fn default_candidate_devices() -> Vec<String> {
    DEFAULT_CANDIDATES.iter().map(|s| s.to_string()).collect()
}

fn default_max_controllers() -> u32 {
    DEFAULT_MAX_CONTROLLERS
}

impl Default for ScsiConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            sg_device_template: default_sg_device_template(),
            proc_scsi_dir: default_proc_scsi_dir(),
            candidate_devices: default_candidate_devices(),
            max_controllers: default_max_controllers(),
        }
    }
}

/// /proc/cpuinfo probe settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuinfoConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_cpuinfo_path")]
    pub path: PathBuf,

    /// auto, x86 or ppc
    #[serde(default = "default_arch")]
    pub arch: String,
}

fn default_cpuinfo_path() -> PathBuf {
    PathBuf::from("/proc/cpuinfo")
}

fn default_arch() -> String {
    "auto".to_string()
}

impl Default for CpuinfoConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            path: default_cpuinfo_path(),
            arch: default_arch(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Complete hwtree configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HwtreeConfig {
    #[serde(default)]
    pub scsi: ScsiConfig,

    #[serde(default)]
    pub cpuinfo: CpuinfoConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl HwtreeConfig {
    /// Load config from the system config directory
    /// (/etc/hwtree/config.toml), falling back to defaults when it is
    /// missing or broken.
    pub fn load() -> Self {
        let system_path = config_path();
        if system_path.exists() {
            if let Ok(config) = Self::load_from(&system_path) {
                return config;
            }
        }
        Self::default()
    }

    /// Load an explicitly named file. Unlike [`HwtreeConfig::load`] this
    /// reports why the file could not be used.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.cpu_arch()?;
        Ok(config)
    }

    /// Effective cpuinfo layout
    pub fn cpu_arch(&self) -> Result<CpuArch, ConfigError> {
        match self.cpuinfo.arch.as_str() {
            "auto" | "" => Ok(CpuArch::native()),
            other => CpuArch::parse(other).ok_or_else(|| ConfigError::UnknownArch(other.to_string())),
        }
    }
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    PathBuf::from(SYSTEM_CONFIG_DIR).join(CONFIG_FILE)
}
