//! hwtree Common - Hardware inventory tree and probes
//!
//! Builds a single ownership tree of the machine's hardware from kernel
//! interfaces: `/proc/cpuinfo` text records and the SCSI generic (`sg`)
//! driver. Every probe mutates the same [`tree::DeviceTree`].

pub mod config;
pub mod cpuinfo;
pub mod error;
pub mod logging;
pub mod scan;
pub mod scsi;
pub mod tree;

pub use config::HwtreeConfig;
pub use error::{ConfigError, ProbeError};
pub use scan::{ScanContext, ScanReport};
pub use tree::{DeviceNode, DeviceTree, HwClass, NodeId};
