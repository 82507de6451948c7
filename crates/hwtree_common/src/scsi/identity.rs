//! Identity reconciliation
//!
//! Maps SCSI addresses to the block/char device paths users know them by
//! (`/dev/sda`, `/dev/sr0`, ...). The map is built once per scan from a
//! fixed candidate list and consulted for every device the enumerator
//! finds.

use super::ScsiAddress;
use crate::tree::DeviceNode;
use std::collections::BTreeMap;
use tracing::debug;

/// Conventional device paths, probed in this order. When two paths report
/// the same address the later one wins.
pub const DEFAULT_CANDIDATES: &[&str] = &[
    "/dev/sda", "/dev/sdb", "/dev/sdc", "/dev/sdd", "/dev/sde", "/dev/sdf",
    "/dev/sdg", "/dev/sdh", "/dev/sdi", "/dev/sdj", "/dev/sdk", "/dev/sdl",
    "/dev/sdm", "/dev/sdn", "/dev/sdo", "/dev/sdp", "/dev/sdq", "/dev/sdr",
    "/dev/sds", "/dev/sdt", "/dev/sdu", "/dev/sdv", "/dev/sdw", "/dev/sdx",
    "/dev/sdy", "/dev/sdz", "/dev/sdaa", "/dev/sdab", "/dev/sdac", "/dev/sdad",
    "/dev/scd0", "/dev/scd1", "/dev/scd2", "/dev/scd3", "/dev/scd4", "/dev/scd5",
    "/dev/scd6", "/dev/scd7", "/dev/scd8", "/dev/scd9", "/dev/scd10", "/dev/scd11",
    "/dev/sr0", "/dev/sr1", "/dev/sr2", "/dev/sr3", "/dev/sr4", "/dev/sr5",
    "/dev/sr6", "/dev/sr7", "/dev/sr8", "/dev/sr9", "/dev/sr10", "/dev/sr11",
    "/dev/cdrom", "/dev/cdrom0", "/dev/cdrom1", "/dev/cdrom2",
    "/dev/cdwriter", "/dev/cdwriter0", "/dev/cdwriter1", "/dev/cdwriter2",
    "/dev/dvd", "/dev/dvd0", "/dev/dvd1", "/dev/dvd2",
    "/dev/st0", "/dev/st1", "/dev/st2", "/dev/st3", "/dev/st4", "/dev/st5",
    "/dev/nst0", "/dev/nst1", "/dev/nst2", "/dev/nst3", "/dev/nst4", "/dev/nst5",
    "/dev/nosst0", "/dev/nosst1", "/dev/nosst2", "/dev/nosst3", "/dev/nosst4",
    "/dev/tape", "/dev/tape0", "/dev/tape1", "/dev/tape2", "/dev/tape3", "/dev/tape4",
];

/// Answers the two identity queries for a candidate path
pub trait CandidateProbe {
    /// `(bus number, idlun word)` for `path`, or `None` when the path is
    /// missing or does not answer both queries.
    fn query(&self, path: &str) -> Option<(u32, u32)>;
}

/// Decode the `SCSI_IOCTL_GET_IDLUN` word:
/// `target | lun << 8 | channel << 16` (low byte of each).
pub fn address_from_idlun(bus: u32, idlun: u32) -> ScsiAddress {
    ScsiAddress::device(bus, (idlun >> 16) & 0xff, idlun & 0xff, (idlun >> 8) & 0xff)
}

/// Handle string → device path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceMap {
    by_handle: BTreeMap<String, String>,
}

impl DeviceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe every candidate in order and record the ones that answer
    pub fn build<P, S>(probe: &P, candidates: &[S]) -> Self
    where
        P: CandidateProbe + ?Sized,
        S: AsRef<str>,
    {
        let mut map = Self::new();
        for path in candidates {
            let path = path.as_ref();
            if let Some((bus, idlun)) = probe.query(path) {
                let address = address_from_idlun(bus, idlun);
                debug!("{} answers as {}", path, address);
                map.insert(address, path);
            }
        }
        map
    }

    pub fn insert(&mut self, address: ScsiAddress, path: impl Into<String>) {
        self.by_handle.insert(address.to_string(), path.into());
    }

    pub fn lookup(&self, handle: &str) -> Option<&str> {
        self.by_handle.get(handle).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }

    /// Give `node` its device path and claim it. Returns false (and leaves
    /// the node alone) when its handle is not in the map.
    pub fn reconcile(&self, node: &mut DeviceNode) -> bool {
        let Some(path) = node.handle().and_then(|h| self.lookup(h)) else {
            return false;
        };
        let path = path.to_string();
        node.set_logical_name(path);
        node.claim();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::HwClass;
    use std::collections::HashMap;

    struct FakeDevices(HashMap<&'static str, (u32, u32)>);

    impl CandidateProbe for FakeDevices {
        fn query(&self, path: &str) -> Option<(u32, u32)> {
            self.0.get(path).copied()
        }
    }

    #[test]
    fn test_candidate_list_shape() {
        assert_eq!(DEFAULT_CANDIDATES.len(), 89);
        assert_eq!(DEFAULT_CANDIDATES[0], "/dev/sda");
        assert_eq!(DEFAULT_CANDIDATES[DEFAULT_CANDIDATES.len() - 1], "/dev/tape4");
    }

    #[test]
    fn test_idlun_decoding() {
        // channel 1, lun 2, target 5
        let word = (1 << 16) | (2 << 8) | 5;
        assert_eq!(address_from_idlun(3, word).to_string(), "SCSI:03:01:05:02");
    }

    #[test]
    fn test_build_and_reconcile() {
        let devices = FakeDevices(HashMap::from([
            ("/dev/sda", (0, 0)),
            ("/dev/sr0", (1, 0)),
            ("/dev/cdrom", (1, 0)),
        ]));
        let map = DeviceMap::build(&devices, DEFAULT_CANDIDATES);
        assert_eq!(map.len(), 2);
        assert_eq!(map.lookup("SCSI:00:00:00:00"), Some("/dev/sda"));
        // later candidate wins
        assert_eq!(map.lookup("SCSI:01:00:00:00"), Some("/dev/cdrom"));

        let mut disk = DeviceNode::new("disk", HwClass::Storage);
        disk.set_handle("SCSI:00:00:00:00");
        assert!(map.reconcile(&mut disk));
        assert_eq!(disk.logical_name(), Some("/dev/sda"));
        assert!(disk.is_claimed());
    }

    #[test]
    fn test_unknown_address_left_alone() {
        let map = DeviceMap::new();
        let mut tape = DeviceNode::new("tape", HwClass::Storage);
        tape.set_handle("SCSI:02:00:04:00");
        assert!(!map.reconcile(&mut tape));
        assert_eq!(tape.logical_name(), None);
        assert!(!tape.is_claimed());

        let mut bare = DeviceNode::new("generic", HwClass::Generic);
        assert!(!map.reconcile(&mut bare));
    }
}
