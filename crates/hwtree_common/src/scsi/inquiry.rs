//! Identify and DiagnosticPage request sequences
//!
//! Drives the control-request client and hands the replies to
//! [`super::decode`]. A failed step never throws away what earlier steps
//! already put on the node.

use super::decode::{self, Geometry, Identity, ALL_PAGES, MAX_ALLOC_LEN, SERIAL_PAGE};
use super::transport::{ensure_version, request, CommandBlock, ControlEndpoint};
use crate::error::ProbeError;
use crate::tree::DeviceNode;
use tracing::debug;

/// First identify read: just enough bytes to reach the additional-length
/// field (byte 4).
pub const INQUIRY_PROBE_LEN: usize = 5;

/// What [`enrich`] managed to learn
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub serial: bool,
    pub geometry: bool,
}

/// Two-phase identify read.
///
/// Phase one learns the declared length; phase two re-reads the full
/// reply when it is longer than the probe. If the second reply declares a
/// different length the device changed under us and the read fails with
/// [`ProbeError::LengthMismatch`]. No retry.
pub fn read_identity<E>(endpoint: &mut E) -> Result<Identity, ProbeError>
where
    E: ControlEndpoint + ?Sized,
{
    let probe_cdb = CommandBlock::inquiry(false, 0, INQUIRY_PROBE_LEN as u8);
    let mut reply = request(endpoint, probe_cdb, INQUIRY_PROBE_LEN)?;
    let first = decode::declared_length(&reply);

    if first > INQUIRY_PROBE_LEN {
        let full_cdb = CommandBlock::inquiry(false, 0, first as u8);
        reply = request(endpoint, full_cdb, first)?;
    }

    let second = decode::declared_length(&reply);
    if second != first {
        return Err(ProbeError::LengthMismatch { first, second });
    }

    Ok(decode::decode_identity(&reply, first))
}

/// Unit serial number, `None` when the page is absent or untrusted
pub fn read_serial<E>(endpoint: &mut E) -> Result<Option<String>, ProbeError>
where
    E: ControlEndpoint + ?Sized,
{
    let cdb = CommandBlock::inquiry(true, SERIAL_PAGE, MAX_ALLOC_LEN as u8);
    let reply = request(endpoint, cdb, MAX_ALLOC_LEN)?;
    Ok(decode::decode_serial_page(&reply))
}

/// Current values of all mode pages
pub fn read_geometry<E>(endpoint: &mut E) -> Result<Geometry, ProbeError>
where
    E: ControlEndpoint + ?Sized,
{
    let cdb = CommandBlock::mode_sense(ALL_PAGES, 0);
    let reply = request(endpoint, cdb, MAX_ALLOC_LEN + 1)?;
    Ok(decode::decode_mode_pages(&reply))
}

/// Run the whole Identify + DiagnosticPage sequence against `node`.
///
/// The driver version floor and the identity read are mandatory: if
/// either fails the error is returned and nothing else is attempted.
/// Serial and geometry failures only leave those fields unset.
pub fn enrich<E>(endpoint: &mut E, node: &mut DeviceNode) -> Result<Enrichment, ProbeError>
where
    E: ControlEndpoint + ?Sized,
{
    ensure_version(endpoint)?;

    let identity = read_identity(endpoint)?;
    identity.apply(node);

    let mut outcome = Enrichment::default();

    match read_serial(endpoint) {
        Ok(Some(serial)) => {
            node.set_serial(serial);
            outcome.serial = true;
        }
        Ok(None) => {}
        Err(e) => debug!("{}: no serial number page: {}", endpoint.path(), e),
    }

    match read_geometry(endpoint) {
        Ok(geometry) => {
            geometry.apply(node);
            outcome.geometry = true;
        }
        Err(e) => debug!("{}: no mode pages: {}", endpoint.path(), e),
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scsi::transport::{Reply, ScsiId};
    use crate::tree::HwClass;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Replays canned replies in order and records each CDB
    struct Scripted {
        replies: VecDeque<Reply>,
        sent: Vec<CommandBlock>,
        version: i32,
    }

    impl Scripted {
        fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: replies.into(),
                sent: Vec::new(),
                version: 30536,
            }
        }
    }

    impl ControlEndpoint for Scripted {
        fn path(&self) -> &str {
            "/dev/sg0"
        }

        fn send(&mut self, cdb: &CommandBlock, _: usize, _: Duration) -> Result<Reply, ProbeError> {
            self.sent.push(*cdb);
            Ok(self.replies.pop_front().unwrap_or_else(|| Reply {
                host_status: 0x01,
                ..Default::default()
            }))
        }

        fn scsi_id(&mut self) -> Result<ScsiId, ProbeError> {
            Ok(ScsiId::default())
        }

        fn platform_slot(&mut self) -> Option<String> {
            None
        }

        fn driver_version(&mut self) -> Result<i32, ProbeError> {
            Ok(self.version)
        }
    }

    fn inquiry(declared: usize) -> Vec<u8> {
        let mut buf = vec![0u8; declared.max(36)];
        buf[4] = (declared - 5) as u8;
        buf[8..16].copy_from_slice(b"IBM     ");
        buf[16..32].copy_from_slice(b"ULTRIUM-TD3     ");
        buf[32..36].copy_from_slice(b"54K1");
        buf
    }

    #[test]
    fn test_two_phase_read() {
        let mut ep = Scripted::new(vec![Reply::ok(inquiry(36)), Reply::ok(inquiry(36))]);
        let id = read_identity(&mut ep).unwrap();
        assert_eq!(id.vendor.as_deref(), Some("IBM"));
        assert_eq!(id.product.as_deref(), Some("ULTRIUM-TD3"));
        assert_eq!(ep.sent.len(), 2);
        assert_eq!(ep.sent[0].as_bytes()[4], INQUIRY_PROBE_LEN as u8);
        assert_eq!(ep.sent[1].as_bytes()[4], 36);
    }

    #[test]
    fn test_length_change_is_protocol_error() {
        let mut ep = Scripted::new(vec![Reply::ok(inquiry(36)), Reply::ok(inquiry(56))]);
        let mut node = DeviceNode::new("tape", HwClass::Storage);
        let err = enrich(&mut ep, &mut node).unwrap_err();
        assert!(matches!(err, ProbeError::LengthMismatch { first: 36, second: 56 }));
        assert!(err.is_protocol());
        assert_eq!(node.vendor(), None);
        assert_eq!(node.product(), None);
        // serial and mode pages are not attempted
        assert_eq!(ep.sent.len(), 2);
    }

    #[test]
    fn test_old_driver_rejected_before_any_request() {
        let mut ep = Scripted::new(vec![]);
        ep.version = 20000;
        let mut node = DeviceNode::new("disk", HwClass::Storage);
        let err = enrich(&mut ep, &mut node).unwrap_err();
        assert!(matches!(err, ProbeError::UnsupportedVersion { found: 20000, .. }));
        assert!(ep.sent.is_empty());
    }

    #[test]
    fn test_minimal_reply_needs_no_second_read() {
        let mut ep = Scripted::new(vec![Reply::ok(vec![0x00, 0x80, 0x02, 0x02, 0x00])]);
        let id = read_identity(&mut ep).unwrap();
        assert!(id.removable);
        assert_eq!(id.vendor, None);
        assert_eq!(ep.sent.len(), 1);
    }

    #[test]
    fn test_enrich_keeps_identity_when_later_steps_fail() {
        // identity ok, serial page and mode sense time out
        let mut ep = Scripted::new(vec![Reply::ok(inquiry(36)), Reply::ok(inquiry(36))]);
        let mut node = DeviceNode::new("tape", HwClass::Storage);
        let outcome = enrich(&mut ep, &mut node).unwrap();
        assert_eq!(outcome, Enrichment::default());
        assert_eq!(node.vendor(), Some("IBM"));
        assert_eq!(node.version(), Some("54K1"));
        assert_eq!(ep.sent.len(), 4);
        assert!(ep.sent[2].is_inquiry());
        assert!(ep.sent[3].is_mode_sense());
    }

    #[test]
    fn test_enrich_full_sequence() {
        let mut serial = vec![0x41, 0x80, 0, 6];
        serial.extend_from_slice(b"HU1234");

        let mut mode = vec![0u8, 0, 0, 0];
        let mut page4 = vec![0u8; 24];
        page4[0] = 0x04;
        page4[1] = 22;
        page4[20..22].copy_from_slice(&10000u16.to_be_bytes());
        mode.extend_from_slice(&page4);
        mode[0] = mode.len() as u8;

        let mut ep = Scripted::new(vec![
            Reply::ok(inquiry(36)),
            Reply::ok(inquiry(36)),
            Reply::ok(serial),
            Reply::ok(mode),
        ]);
        let mut node = DeviceNode::new("disk", HwClass::Storage);
        let outcome = enrich(&mut ep, &mut node).unwrap();
        assert!(outcome.serial && outcome.geometry);
        assert_eq!(node.serial(), Some("HU1234"));
        assert!(node.has_capability("10000rpm"));
        assert_eq!(node.capacity(), 0);
    }
}
