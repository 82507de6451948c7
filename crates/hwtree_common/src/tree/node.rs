//! Device node - one entry of the hardware tree

use super::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Hardware class of a node. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HwClass {
    System,
    Bridge,
    Memory,
    Processor,
    Address,
    Storage,
    Disk,
    Tape,
    Bus,
    Network,
    Display,
    Input,
    Printer,
    Multimedia,
    Communication,
    Power,
    Volume,
    #[default]
    Generic,
}

impl HwClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            HwClass::System => "system",
            HwClass::Bridge => "bridge",
            HwClass::Memory => "memory",
            HwClass::Processor => "processor",
            HwClass::Address => "address",
            HwClass::Storage => "storage",
            HwClass::Disk => "disk",
            HwClass::Tape => "tape",
            HwClass::Bus => "bus",
            HwClass::Network => "network",
            HwClass::Display => "display",
            HwClass::Input => "input",
            HwClass::Printer => "printer",
            HwClass::Multimedia => "multimedia",
            HwClass::Communication => "communication",
            HwClass::Power => "power",
            HwClass::Volume => "volume",
            HwClass::Generic => "generic",
        }
    }
}

/// A hardware component.
///
/// Nodes can live detached (built by a probe before it knows where to
/// attach them) or inside a [`super::DeviceTree`], which owns them and
/// tracks `children`/`parent` as arena indices.
#[derive(Debug, Clone, Default)]
pub struct DeviceNode {
    id: String,
    class: HwClass,
    handle: Option<String>,
    vendor: Option<String>,
    product: Option<String>,
    version: Option<String>,
    serial: Option<String>,
    description: Option<String>,
    capacity: u64,
    capabilities: BTreeSet<String>,
    config: BTreeMap<String, String>,
    logical_name: Option<String>,
    claimed: bool,
    pub(super) children: Vec<NodeId>,
    pub(super) parent: Option<NodeId>,
}

/// Trim blanks and NUL padding; empty input clears the field.
fn clean(value: &str) -> Option<String> {
    let trimmed = value.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl DeviceNode {
    pub fn new(id: impl Into<String>, class: HwClass) -> Self {
        Self {
            id: id.into(),
            class,
            ..Default::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(super) fn set_id(&mut self, id: String) {
        self.id = id;
    }

    pub fn class(&self) -> HwClass {
        self.class
    }

    pub fn handle(&self) -> Option<&str> {
        self.handle.as_deref()
    }

    pub fn set_handle(&mut self, handle: impl AsRef<str>) {
        self.handle = clean(handle.as_ref());
    }

    pub fn vendor(&self) -> Option<&str> {
        self.vendor.as_deref()
    }

    pub fn set_vendor(&mut self, vendor: impl AsRef<str>) {
        self.vendor = clean(vendor.as_ref());
    }

    pub fn product(&self) -> Option<&str> {
        self.product.as_deref()
    }

    pub fn set_product(&mut self, product: impl AsRef<str>) {
        self.product = clean(product.as_ref());
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn set_version(&mut self, version: impl AsRef<str>) {
        self.version = clean(version.as_ref());
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    pub fn set_serial(&mut self, serial: impl AsRef<str>) {
        self.serial = clean(serial.as_ref());
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: impl AsRef<str>) {
        self.description = clean(description.as_ref());
    }

    /// Size in bytes, 0 when unknown
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: u64) {
        self.capacity = capacity;
    }

    pub fn capabilities(&self) -> impl Iterator<Item = &str> {
        self.capabilities.iter().map(String::as_str)
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn add_capability(&mut self, capability: impl AsRef<str>) {
        if let Some(cap) = clean(capability.as_ref()) {
            self.capabilities.insert(cap);
        }
    }

    pub fn config(&self, key: &str) -> Option<&str> {
        self.config.get(key).map(String::as_str)
    }

    pub fn config_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.config.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn set_config(&mut self, key: impl Into<String>, value: impl AsRef<str>) {
        let key = key.into();
        match clean(value.as_ref()) {
            Some(value) => {
                self.config.insert(key, value);
            }
            None => {
                self.config.remove(&key);
            }
        }
    }

    pub fn logical_name(&self) -> Option<&str> {
        self.logical_name.as_deref()
    }

    /// Last write wins
    pub fn set_logical_name(&mut self, name: impl AsRef<str>) {
        self.logical_name = clean(name.as_ref());
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed
    }

    /// Claim this node only. Subtree claims go through
    /// [`super::DeviceTree::claim`].
    pub fn claim(&mut self) {
        self.claimed = true;
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}
