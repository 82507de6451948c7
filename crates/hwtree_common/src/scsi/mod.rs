//! SCSI bus probe
//!
//! Enumerates `/dev/sg<N>` endpoints, talks to each device through the
//! generic control-request client, decodes the INQUIRY and MODE SENSE
//! replies and attaches the result under a bus/channel pair:
//!
//! ```text
//! scsi (bus, logical name "scsi<host>")
//! └── channel (storage, handle SCSI:hh:cc)
//!     └── disk / cdrom / tape ... (handle SCSI:hh:cc:tt:ll)
//! ```

pub mod decode;
pub mod enumerator;
pub mod identity;
pub mod inquiry;
pub mod media;
pub mod peripheral;
pub mod reader;
#[cfg(target_os = "linux")]
pub mod sg;
pub mod status;
pub mod transport;

pub use enumerator::{scan_hosts, ScsiProbe, ScsiScanSummary};
pub use identity::{CandidateProbe, DeviceMap, DEFAULT_CANDIDATES};
pub use media::{MediaProbe, NoMediaProbe};
pub use status::{classify, StatusCategory};
pub use transport::{ControlEndpoint, EndpointOpener, ScsiId, REQUEST_TIMEOUT};

use std::fmt;

/// Bus topology address of a SCSI node.
///
/// Formats as `SCSI:hh[:cc[:tt[:ll]]]`, each component zero-padded to two
/// digits, stopping at the first unknown component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScsiAddress {
    pub host: u32,
    pub channel: Option<u32>,
    pub target: Option<u32>,
    pub lun: Option<u32>,
}

impl ScsiAddress {
    pub fn host(host: u32) -> Self {
        Self {
            host,
            channel: None,
            target: None,
            lun: None,
        }
    }

    pub fn channel(host: u32, channel: u32) -> Self {
        Self {
            channel: Some(channel),
            ..Self::host(host)
        }
    }

    pub fn device(host: u32, channel: u32, target: u32, lun: u32) -> Self {
        Self {
            host,
            channel: Some(channel),
            target: Some(target),
            lun: Some(lun),
        }
    }
}

impl fmt::Display for ScsiAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SCSI:{:02}", self.host)?;
        let rest = [self.channel, self.target, self.lun];
        for part in rest.iter().map_while(|p| *p) {
            write!(f, ":{:02}", part)?;
        }
        Ok(())
    }
}

/// Logical name the kernel gives a host adapter
pub fn host_logical_name(host: u32) -> String {
    format!("scsi{}", host)
}
