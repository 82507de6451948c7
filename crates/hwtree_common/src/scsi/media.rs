//! Media sub-probes
//!
//! Optical-drive and disk-geometry probes are separate collaborators. The
//! enumerator hands them the populated device node before attaching it.

use crate::tree::DeviceNode;

pub trait MediaProbe {
    /// Called for write-once and CD-ROM peripherals
    fn scan_cdrom(&self, _node: &mut DeviceNode) {}

    /// Called for disks and magneto-optical disks
    fn scan_disk(&self, _node: &mut DeviceNode) {}
}

/// Leaves nodes as the generic probe produced them
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMediaProbe;

impl MediaProbe for NoMediaProbe {}
