//! Reply decoders for INQUIRY and MODE SENSE data
//!
//! Pure functions over reply buffers. Offsets follow SPC/SBC layouts.

use super::reader::ByteReader;
use crate::tree::DeviceNode;

/// Largest allocation length a 6-byte CDB can request
pub const MAX_ALLOC_LEN: usize = 255;

/// Unit serial number VPD page
pub const SERIAL_PAGE: u8 = 0x80;

/// MODE SENSE page code meaning "return all pages"
pub const ALL_PAGES: u8 = 0x3f;

const RIGID_DISK_GEOMETRY_PAGE: u8 = 4;
const FORMAT_DEVICE_PAGE: u8 = 3;

/// Rotation-rate buckets, checked in this order
const RPM_BUCKETS: &[(u64, &str)] = &[(10000, "10000rpm"), (7200, "7200rpm"), (5400, "5400rpm")];

/// Length an INQUIRY reply says it has: additional length (byte 4) plus
/// the five header bytes, capped at [`MAX_ALLOC_LEN`].
pub fn declared_length(reply: &[u8]) -> usize {
    let additional = ByteReader::new(reply).byte(4).unwrap_or(0) as usize;
    (additional + 5).min(MAX_ALLOC_LEN)
}

/// Decoded standard INQUIRY data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub removable: bool,
    pub ansi_version: u8,
    pub vendor: Option<String>,
    pub product: Option<String>,
    pub revision: Option<String>,
}

impl Identity {
    pub fn apply(&self, node: &mut DeviceNode) {
        if self.removable {
            node.add_capability("removable");
        }
        if let Some(vendor) = &self.vendor {
            node.set_vendor(vendor);
        }
        if let Some(product) = &self.product {
            node.set_product(product);
        }
        if let Some(revision) = &self.revision {
            node.set_version(revision);
        }
        if self.ansi_version != 0 {
            node.set_config("ansiversion", self.ansi_version.to_string());
        }
    }
}

/// Decode a standard INQUIRY reply whose declared length is `length`.
/// Bytes the device did not send read as zero.
pub fn decode_identity(reply: &[u8], length: usize) -> Identity {
    let mut padded = reply.to_vec();
    if padded.len() < MAX_ALLOC_LEN {
        padded.resize(MAX_ALLOC_LEN, 0);
    }
    let r = ByteReader::new(&padded);
    let field = |offset, len| r.ascii(offset, len).filter(|s| !s.is_empty());

    Identity {
        removable: r.byte(1).unwrap_or(0) & 0x80 != 0,
        ansi_version: r.byte(2).unwrap_or(0) & 0x07,
        vendor: field(8, 8),
        product: if length > 16 { field(16, 16) } else { None },
        revision: if length > 32 { field(32, 4) } else { None },
    }
}

/// Decode the unit serial number page. The page is only trusted when it
/// has a payload and its first byte is above ASCII space.
pub fn decode_serial_page(reply: &[u8]) -> Option<String> {
    let r = ByteReader::new(reply);
    let len = r.byte(3)? as usize;
    let first = r.byte(0)?;
    if len == 0 || first <= b' ' {
        return None;
    }
    let available = len.min(r.len().saturating_sub(4));
    r.ascii(4, available).filter(|s| !s.is_empty())
}

/// Disk geometry gathered from MODE SENSE pages 3 and 4
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Geometry {
    pub sectors: u64,
    pub sector_size: u64,
    pub cylinders: u64,
    pub heads: u64,
    pub rpm: u64,
}

impl Geometry {
    /// heads x cylinders x sectors x sector size, 0 when any is unknown.
    ///
    /// Page 3 sector data is combined with page 4 head/cylinder data as
    /// reported, even though the two pages overlap.
    pub fn capacity(&self) -> u64 {
        self.heads
            .saturating_mul(self.cylinders)
            .saturating_mul(self.sectors)
            .saturating_mul(self.sector_size)
    }

    pub fn rpm_capability(&self) -> Option<&'static str> {
        rpm_bucket(self.rpm)
    }

    pub fn apply(&self, node: &mut DeviceNode) {
        node.set_capacity(self.capacity());
        if let Some(cap) = self.rpm_capability() {
            node.add_capability(cap);
        }
    }
}

/// Nominal rotation-rate tag. Rates are compared in whole hundreds of
/// rpm, so 7200 maps to "7200rpm" and 6000 maps to nothing.
pub fn rpm_bucket(rpm: u64) -> Option<&'static str> {
    RPM_BUCKETS
        .iter()
        .find(|(bucket, _)| rpm / 100 == bucket / 100)
        .map(|(_, tag)| *tag)
}

/// Walk a MODE SENSE(6) "all pages" reply.
///
/// Layout: byte 0 mode data length (end of the page list), byte 3 block
/// descriptor length; pages start right after the descriptors at
/// `4 + byte 3`. Each page is `[code & 0x3f, len, len bytes...]`.
pub fn decode_mode_pages(reply: &[u8]) -> Geometry {
    let r = ByteReader::new(reply);
    let mut geometry = Geometry::default();

    let (Some(end), Some(descriptor_len)) = (r.byte(0), r.byte(3)) else {
        return geometry;
    };
    let end = end as usize;
    let descriptor_len = descriptor_len as usize;

    // a single short block descriptor carries the logical block length
    if descriptor_len == 8 {
        if let Some(block_len) = r.be_u24(9) {
            geometry.sector_size = u64::from(block_len);
        }
    }

    let mut offset = 4 + descriptor_len;
    while offset < end {
        let Some(code) = r.byte(offset) else {
            break;
        };
        let page = r.slice_from(offset);

        match code & 0x3f {
            FORMAT_DEVICE_PAGE => {
                if let Some(sectors) = page.be_u16(10) {
                    geometry.sectors = u64::from(sectors);
                }
                if let Some(size) = page.be_u16(12) {
                    geometry.sector_size = u64::from(size);
                }
            }
            RIGID_DISK_GEOMETRY_PAGE => {
                if let Some(cylinders) = page.be_u24(2) {
                    geometry.cylinders = u64::from(cylinders);
                }
                if let Some(heads) = page.byte(5) {
                    geometry.heads = u64::from(heads);
                }
                if let Some(rpm) = page.be_u16(20) {
                    geometry.rpm = u64::from(rpm);
                }
            }
            _ => {}
        }

        let Some(page_len) = page.byte(1) else {
            break;
        };
        offset += page_len as usize + 2;
    }

    geometry
}
