//! Logging helpers
//!
//! The library only emits `tracing` events. Installing a subscriber is up
//! to the binary; this module resolves which filter it should use.

use serde::{Deserialize, Serialize};

/// Environment variable that overrides the configured level
pub const LOG_ENV: &str = "RUST_LOG";

/// Log level enum
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    #[default]
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Filter directive for the subscriber: a non-empty `RUST_LOG` value wins,
/// otherwise the configured level (unknown levels fall back to info).
pub fn filter_directive(configured: &str, env: Option<&str>) -> String {
    if let Some(directive) = env.map(str::trim).filter(|d| !d.is_empty()) {
        return directive.to_string();
    }
    LogLevel::parse(configured).unwrap_or_default().as_str().to_string()
}
