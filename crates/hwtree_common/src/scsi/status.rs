//! Status classification for SG_IO replies
//!
//! Folds the SCSI status byte, the host adapter status, the driver status
//! and the sense buffer into a small taxonomy. Only [`StatusCategory::Clean`]
//! and [`StatusCategory::Recovered`] count as success.

use serde::{Deserialize, Serialize};
use std::fmt;

// SCSI status byte (already masked with STATUS_MASK)
const STATUS_MASK: u8 = 0x7e;
const CHECK_CONDITION: u8 = 0x02;
const COMMAND_TERMINATED: u8 = 0x22;

// host_status
const DID_NO_CONNECT: u16 = 0x01;
const DID_BUS_BUSY: u16 = 0x02;
const DID_TIME_OUT: u16 = 0x03;

// driver_status
const DRIVER_MASK: u16 = 0x0f;
const DRIVER_TIMEOUT: u16 = 0x06;
const DRIVER_SENSE: u16 = 0x08;

// sense keys
const RECOVERED_ERROR: u8 = 0x01;
const UNIT_ATTENTION: u8 = 0x06;

// additional sense codes under UNIT ATTENTION
const ASC_MEDIUM_CHANGED: u8 = 0x28;
const ASC_RESET: u8 = 0x29;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    Clean,
    Recovered,
    MediaChanged,
    Reset,
    Timeout,
    DiagnosticPresent,
    Other,
}

impl StatusCategory {
    pub fn is_success(&self) -> bool {
        matches!(self, StatusCategory::Clean | StatusCategory::Recovered)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCategory::Clean => "clean",
            StatusCategory::Recovered => "recovered error",
            StatusCategory::MediaChanged => "media changed",
            StatusCategory::Reset => "reset",
            StatusCategory::Timeout => "timeout",
            StatusCategory::DiagnosticPresent => "sense data",
            StatusCategory::Other => "other error",
        }
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify one completed request. `sense` holds only the bytes the
/// driver actually wrote.
pub fn classify(status: u8, host_status: u16, driver_status: u16, sense: &[u8]) -> StatusCategory {
    let status = status & STATUS_MASK;

    if status == 0 && host_status == 0 && driver_status == 0 {
        return StatusCategory::Clean;
    }

    if status == CHECK_CONDITION
        || status == COMMAND_TERMINATED
        || (driver_status & DRIVER_MASK) == DRIVER_SENSE
    {
        return classify_sense(sense);
    }

    if matches!(host_status, DID_NO_CONNECT | DID_BUS_BUSY | DID_TIME_OUT) {
        return StatusCategory::Timeout;
    }

    if driver_status == DRIVER_TIMEOUT {
        return StatusCategory::Timeout;
    }

    StatusCategory::Other
}

fn classify_sense(sense: &[u8]) -> StatusCategory {
    if sense.len() <= 2 {
        return StatusCategory::DiagnosticPresent;
    }

    let (key, extra) = if sense[0] & 0x80 != 0 {
        (sense[1] & 0x0f, sense[2])
    } else {
        let extra = if sense.len() > 12 { sense[12] } else { 0 };
        (sense[2] & 0x0f, extra)
    };

    match (key, extra) {
        (RECOVERED_ERROR, _) => StatusCategory::Recovered,
        (UNIT_ATTENTION, ASC_MEDIUM_CHANGED) => StatusCategory::MediaChanged,
        (UNIT_ATTENTION, ASC_RESET) => StatusCategory::Reset,
        _ => StatusCategory::DiagnosticPresent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_sense(key: u8, asc: u8) -> [u8; 18] {
        let mut sense = [0u8; 18];
        sense[0] = 0x70;
        sense[2] = key;
        sense[7] = 10;
        sense[12] = asc;
        sense
    }

    #[test]
    fn test_clean() {
        assert_eq!(classify(0, 0, 0, &[]), StatusCategory::Clean);
        // reserved bits of the status byte are ignored
        assert_eq!(classify(0x81, 0, 0, &[]), StatusCategory::Clean);
    }

    #[test]
    fn test_recovered_is_success() {
        let sense = fixed_sense(RECOVERED_ERROR, 0x17);
        let cat = classify(CHECK_CONDITION, 0, 0, &sense);
        assert_eq!(cat, StatusCategory::Recovered);
        assert!(cat.is_success());
    }

    #[test]
    fn test_unit_attention() {
        let changed = fixed_sense(UNIT_ATTENTION, 0x28);
        assert_eq!(classify(CHECK_CONDITION, 0, 0, &changed), StatusCategory::MediaChanged);

        let reset = fixed_sense(UNIT_ATTENTION, 0x29);
        assert_eq!(classify(COMMAND_TERMINATED, 0, 0, &reset), StatusCategory::Reset);

        let other = fixed_sense(UNIT_ATTENTION, 0x3f);
        assert_eq!(classify(CHECK_CONDITION, 0, 0, &other), StatusCategory::DiagnosticPresent);
    }

    #[test]
    fn test_high_bit_layout_reads_key_from_byte_one() {
        let sense = [0x80, UNIT_ATTENTION, 0x28, 0, 0];
        assert_eq!(classify(0, 0, DRIVER_SENSE, &sense), StatusCategory::MediaChanged);
    }

    #[test]
    fn test_short_sense_buffer() {
        assert_eq!(classify(CHECK_CONDITION, 0, 0, &[0x70, 0]), StatusCategory::DiagnosticPresent);
        // too short for byte 12: extra defaults to 0
        let sense = [0x70, 0, UNIT_ATTENTION, 0, 0, 0];
        assert_eq!(classify(CHECK_CONDITION, 0, 0, &sense), StatusCategory::DiagnosticPresent);
    }

    #[test]
    fn test_driver_sense_flag_uses_low_nibble() {
        let sense = fixed_sense(RECOVERED_ERROR, 0);
        assert_eq!(classify(0, 0, 0x10 | DRIVER_SENSE, &sense), StatusCategory::Recovered);
    }

    #[test]
    fn test_timeouts() {
        for host in [DID_NO_CONNECT, DID_BUS_BUSY, DID_TIME_OUT] {
            assert_eq!(classify(0, host, 0, &[]), StatusCategory::Timeout);
        }
        assert_eq!(classify(0, 0, DRIVER_TIMEOUT, &[]), StatusCategory::Timeout);
        // bad target is not a timeout
        assert_eq!(classify(0, 0x04, 0, &[]), StatusCategory::Other);
    }

    #[test]
    fn test_other() {
        assert_eq!(classify(0x08, 0, 0, &[]), StatusCategory::Other);
        assert!(!StatusCategory::Other.is_success());
        assert!(!StatusCategory::Timeout.is_success());
    }

    #[test]
    fn test_pure() {
        let sense = fixed_sense(UNIT_ATTENTION, 0x28);
        let first = classify(CHECK_CONDITION, 0, DRIVER_SENSE, &sense);
        for _ in 0..4 {
            assert_eq!(classify(CHECK_CONDITION, 0, DRIVER_SENSE, &sense), first);
        }
    }
}
