//! Error types for hwtree.

use crate::scsi::status::StatusCategory;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single probe step.
///
/// None of these abort a scan: callers log them and move on to the next
/// unit, keeping whatever the node already learned.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The request mechanism itself could not be used (open or ioctl failed)
    #[error("cannot reach {path}: {source}")]
    Transport {
        path: String,
        #[source]
        source: io::Error,
    },

    /// sg driver answered but is older than we can talk to
    #[error("sg driver version {found} is below the supported minimum {minimum}")]
    UnsupportedVersion { found: i32, minimum: i32 },

    /// Two consecutive identify reads disagreed on the reply length
    #[error("identify reply length changed between reads ({first} then {second})")]
    LengthMismatch { first: usize, second: usize },

    /// Device completed the request with an unusable status
    #[error("device reported {0}")]
    DeviceReported(StatusCategory),
}

impl ProbeError {
    pub fn transport(path: impl Into<String>, source: io::Error) -> Self {
        ProbeError::Transport {
            path: path.into(),
            source,
        }
    }

    /// True for the protocol family: endpoint reachable but unusable.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            ProbeError::UnsupportedVersion { .. } | ProbeError::LengthMismatch { .. }
        )
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown cpu architecture '{0}' (expected auto, x86 or ppc)")]
    UnknownArch(String),
}
