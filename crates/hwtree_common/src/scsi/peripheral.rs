//! Peripheral device type table
//!
//! Maps the 5-bit peripheral device type from `SG_GET_SCSI_ID` to the node
//! the enumerator creates for it.

use crate::tree::{DeviceNode, HwClass};

/// Which media collaborator gets the node after the generic probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    None,
    Optical,
    Disk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeripheralType {
    pub code: Option<u8>,
    pub id: &'static str,
    pub class: HwClass,
    pub description: Option<&'static str>,
    pub media: MediaKind,
}

impl PeripheralType {
    const fn known(
        code: u8,
        id: &'static str,
        class: HwClass,
        description: &'static str,
        media: MediaKind,
    ) -> Self {
        Self {
            code: Some(code),
            id,
            class,
            description: Some(description),
            media,
        }
    }

    /// Fresh detached node for this type
    pub fn new_node(&self) -> DeviceNode {
        let mut node = DeviceNode::new(self.id, self.class);
        if let Some(description) = self.description {
            node.set_description(description);
        }
        node
    }
}

pub const PERIPHERAL_TYPES: &[PeripheralType] = &[
    PeripheralType::known(0x00, "disk", HwClass::Storage, "Disk", MediaKind::Disk),
    PeripheralType::known(0x01, "tape", HwClass::Storage, "Tape", MediaKind::None),
    PeripheralType::known(0x03, "processor", HwClass::Processor, "Processor", MediaKind::None),
    PeripheralType::known(
        0x04,
        "cdrom",
        HwClass::Storage,
        "Write-Once Read-Only Memory",
        MediaKind::Optical,
    ),
    PeripheralType::known(0x05, "cdrom", HwClass::Storage, "CD-ROM", MediaKind::Optical),
    PeripheralType::known(0x06, "scanner", HwClass::Generic, "Scanner", MediaKind::None),
    PeripheralType::known(
        0x07,
        "magnetooptical",
        HwClass::Storage,
        "Magneto-optical Disk",
        MediaKind::Disk,
    ),
    PeripheralType::known(0x08, "changer", HwClass::Generic, "Medium Changer", MediaKind::None),
    PeripheralType::known(0x0d, "enclosure", HwClass::Generic, "Enclosure", MediaKind::None),
];

/// Fallback for codes not in [`PERIPHERAL_TYPES`]
pub const GENERIC: PeripheralType = PeripheralType {
    code: None,
    id: "generic",
    class: HwClass::Generic,
    description: None,
    media: MediaKind::None,
};

pub fn lookup(code: u8) -> &'static PeripheralType {
    PERIPHERAL_TYPES
        .iter()
        .find(|t| t.code == Some(code))
        .unwrap_or(&GENERIC)
}
