//! Generic control-request client
//!
//! One synchronous request/reply exchange with a SCSI generic endpoint:
//! a 6-byte command block goes out, a data buffer, the raw status codes
//! and the sense buffer come back. [`super::sg`] implements this over the
//! Linux `SG_IO` ioctl; tests plug in scripted endpoints.

use super::status::{classify, StatusCategory};
use super::ScsiAddress;
use crate::error::ProbeError;
use std::time::Duration;

/// Every request uses the same timeout; there is no per-call override.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

pub const SENSE_BUFFER_LEN: usize = 32;

/// Oldest sg driver (3.0.0) that supports the SG_IO interface
pub const MIN_SG_VERSION: i32 = 30000;

const INQUIRY: u8 = 0x12;
const MODE_SENSE_6: u8 = 0x1a;

/// Fixed 6-byte command descriptor block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandBlock([u8; 6]);

impl CommandBlock {
    /// Identify request. With `evpd` set, `page` selects a vital product
    /// data page (0x80 is the unit serial number).
    pub fn inquiry(evpd: bool, page: u8, allocation_len: u8) -> Self {
        let mut cdb = [INQUIRY, 0, 0, 0, 0, 0];
        if evpd {
            cdb[1] |= 0x01;
        }
        cdb[2] = page;
        cdb[4] = allocation_len;
        Self(cdb)
    }

    /// Diagnostic page request (MODE SENSE(6))
    pub fn mode_sense(page: u8, page_control: u8) -> Self {
        let page = page & 0x3f;
        let page_control = page_control & 0x03;
        Self([MODE_SENSE_6, 0, (page_control << 6) | page, 0, 0xff, 0])
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    pub fn opcode(&self) -> u8 {
        self.0[0]
    }

    pub fn is_inquiry(&self) -> bool {
        self.opcode() == INQUIRY
    }

    pub fn is_mode_sense(&self) -> bool {
        self.opcode() == MODE_SENSE_6
    }
}

/// Raw outcome of one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub status: u8,
    pub host_status: u16,
    pub driver_status: u16,
    pub data: Vec<u8>,
    pub sense: Vec<u8>,
}

impl Reply {
    /// Successful reply carrying `data`
    pub fn ok(data: Vec<u8>) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }

    pub fn category(&self) -> StatusCategory {
        classify(self.status, self.host_status, self.driver_status, &self.sense)
    }
}

/// Identity of the device behind an endpoint (`SG_GET_SCSI_ID` plus the
/// emulation flag)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScsiId {
    pub host: u32,
    pub channel: u32,
    pub target: u32,
    pub lun: u32,
    pub peripheral_type: u8,
    pub emulated: bool,
}

impl ScsiId {
    pub fn address(&self) -> ScsiAddress {
        ScsiAddress::device(self.host, self.channel, self.target, self.lun)
    }
}

/// A per-controller-instance request endpoint
pub trait ControlEndpoint {
    /// Path the endpoint was opened from, for diagnostics
    fn path(&self) -> &str;

    /// Issue one read-direction request. Fails only when the request
    /// could not be issued at all; device-side errors come back in the
    /// reply's status fields.
    fn send(
        &mut self,
        cdb: &CommandBlock,
        capacity: usize,
        timeout: Duration,
    ) -> Result<Reply, ProbeError>;

    fn scsi_id(&mut self) -> Result<ScsiId, ProbeError>;

    /// Parent bus slot (e.g. a PCI address), when the driver exposes one
    fn platform_slot(&mut self) -> Option<String>;

    fn driver_version(&mut self) -> Result<i32, ProbeError>;
}

/// Opens the endpoint for controller index `n`
pub trait EndpointOpener {
    type Endpoint: ControlEndpoint;

    fn open(&self, index: u32) -> Result<Self::Endpoint, ProbeError>;
}

/// Send `cdb` with the fixed timeout and keep the data only when the
/// reply classifies as Clean or Recovered.
pub fn request<E>(endpoint: &mut E, cdb: CommandBlock, capacity: usize) -> Result<Vec<u8>, ProbeError>
where
    E: ControlEndpoint + ?Sized,
{
    let reply = endpoint.send(&cdb, capacity, REQUEST_TIMEOUT)?;
    let category = reply.category();
    if category.is_success() {
        Ok(reply.data)
    } else {
        Err(ProbeError::DeviceReported(category))
    }
}

/// Reject endpoints whose driver predates SG_IO
pub fn ensure_version<E>(endpoint: &mut E) -> Result<(), ProbeError>
where
    E: ControlEndpoint + ?Sized,
{
    let found = endpoint.driver_version()?;
    if found < MIN_SG_VERSION {
        return Err(ProbeError::UnsupportedVersion {
            found,
            minimum: MIN_SG_VERSION,
        });
    }
    Ok(())
}
