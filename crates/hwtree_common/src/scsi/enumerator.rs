//! SCSI bus enumerator
//!
//! Walks controller indices `0, 1, 2, ...` until one cannot be opened, builds
//! the bus/channel/device nodes for each endpoint, then attributes driver
//! names and host descriptions from `/proc/scsi`.

use super::identity::DeviceMap;
use super::inquiry;
use super::media::{MediaProbe, NoMediaProbe};
use super::peripheral::{self, MediaKind};
use super::transport::{ControlEndpoint, EndpointOpener};
use super::{host_logical_name, ScsiAddress};
use crate::tree::{DeviceNode, DeviceTree, HwClass, NodeId};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Upper bound on controller indices tried in one scan
pub const DEFAULT_MAX_CONTROLLERS: u32 = 256;

/// What one SCSI scan did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScsiScanSummary {
    /// Endpoints that could be opened
    pub endpoints: u32,
    /// Device nodes attached to the tree
    pub devices: u32,
    /// Endpoints that did not answer the identity query
    pub skipped: u32,
    /// Devices attached without identify data
    pub failed_subprobes: u32,
    /// Whether the `/proc/scsi` host pass ran to completion
    pub host_pass: bool,
}

/// SCSI generic bus probe
pub struct ScsiProbe<O: EndpointOpener> {
    opener: O,
    proc_scsi_dir: PathBuf,
    max_controllers: u32,
    media: Box<dyn MediaProbe>,
}

impl<O: EndpointOpener> ScsiProbe<O> {
    pub fn new(opener: O) -> Self {
        Self {
            opener,
            proc_scsi_dir: PathBuf::from("/proc/scsi"),
            max_controllers: DEFAULT_MAX_CONTROLLERS,
            media: Box::new(NoMediaProbe),
        }
    }

    pub fn with_proc_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.proc_scsi_dir = dir.into();
        self
    }

    pub fn with_media(mut self, media: Box<dyn MediaProbe>) -> Self {
        self.media = media;
        self
    }

    pub fn with_max_controllers(mut self, max: u32) -> Self {
        self.max_controllers = max;
        self
    }

    /// Enumerate every controller and attach what was found below `root`.
    ///
    /// Never fails: an index that cannot be opened ends the walk, every
    /// other problem is confined to the unit it happened on.
    pub fn scan(&self, tree: &mut DeviceTree, root: NodeId, devices: &DeviceMap) -> ScsiScanSummary {
        let mut summary = ScsiScanSummary::default();

        for index in 0..self.max_controllers {
            let mut endpoint = match self.opener.open(index) {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    debug!("Stopping SCSI walk at index {}: {}", index, e);
                    break;
                }
            };
            summary.endpoints += 1;
            self.scan_endpoint(tree, root, devices, &mut endpoint, &mut summary);
        }

        summary.host_pass = scan_hosts(tree, root, &self.proc_scsi_dir);

        info!(
            "SCSI scan: {} endpoints, {} devices, {} skipped, {} without identify data",
            summary.endpoints, summary.devices, summary.skipped, summary.failed_subprobes
        );
        summary
    }

    fn scan_endpoint(
        &self,
        tree: &mut DeviceTree,
        root: NodeId,
        devices: &DeviceMap,
        endpoint: &mut O::Endpoint,
        summary: &mut ScsiScanSummary,
    ) {
        let id = match endpoint.scsi_id() {
            Ok(id) => id,
            Err(e) => {
                debug!("{}: no SCSI identity, skipping: {}", endpoint.path(), e);
                summary.skipped += 1;
                return;
            }
        };

        let host_name = host_logical_name(id.host);
        let parent = endpoint
            .platform_slot()
            .and_then(|slot| tree.find_by_handle(root, &format!("PCI:{}", slot)))
            .or_else(|| tree.find_by_logical_name(root, &host_name))
            .unwrap_or_else(|| tree.add_child(root, DeviceNode::new("scsi", HwClass::Bus)));

        let bus = tree.node_mut(parent);
        bus.set_logical_name(&host_name);
        bus.claim();
        if id.emulated {
            bus.add_capability("emulated");
        }

        let channel_handle = ScsiAddress::channel(id.host, id.channel).to_string();
        let channel = tree
            .find_by_handle(parent, &channel_handle)
            .unwrap_or_else(|| tree.add_child(parent, DeviceNode::new("channel", HwClass::Storage)));

        let channel_node = tree.node_mut(channel);
        channel_node.set_description(format!("Channel {}", id.channel));
        channel_node.set_handle(&channel_handle);
        channel_node.claim();

        let kind = peripheral::lookup(id.peripheral_type);
        let mut device = kind.new_node();
        device.set_handle(id.address().to_string());

        if !devices.reconcile(&mut device) {
            debug!("{}: no device path known for {}", endpoint.path(), id.address());
        }

        if let Err(e) = inquiry::enrich(endpoint, &mut device) {
            warn!("{}: identify failed: {}", endpoint.path(), e);
            summary.failed_subprobes += 1;
        }

        match kind.media {
            MediaKind::Optical => self.media.scan_cdrom(&mut device),
            MediaKind::Disk => self.media.scan_disk(&mut device),
            MediaKind::None => {}
        }

        let existing = tree
            .children(channel)
            .iter()
            .copied()
            .find(|child| tree.node(*child).handle() == device.handle());
        let attached = match existing {
            Some(node) => {
                tree.replace(node, device);
                node
            }
            None => tree.add_child(channel, device),
        };
        summary.devices += 1;
        debug!("{}: attached {}", endpoint.path(), tree.path_of(attached));
    }
}

/// Leading decimal digits of a directory entry name
fn parse_host_number(name: &str) -> Option<u32> {
    let digits: String = name.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn subdirectories(dir: &Path) -> Vec<(String, PathBuf)> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            (!name.starts_with('.')).then(|| (name, entry.into_path()))
        })
        .collect()
}

/// Attribute driver names and host descriptions to bus nodes.
///
/// Every numeric entry `n` in `<proc_scsi_dir>/<driver>/` sets
/// `driver=<driver>` on the bus node named `scsi<n>`. Line `i` of
/// `<proc_scsi_dir>/sg/host_strs` describes `scsi<i>` unless that node
/// already has a product or description. Returns false when either source
/// is unavailable.
pub fn scan_hosts(tree: &mut DeviceTree, root: NodeId, proc_scsi_dir: &Path) -> bool {
    if !proc_scsi_dir.is_dir() {
        debug!("{} not present, skipping host pass", proc_scsi_dir.display());
        return false;
    }

    for (driver, dir) in subdirectories(proc_scsi_dir) {
        let entries = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok());

        for entry in entries {
            let Some(host) = entry.file_name().to_str().and_then(parse_host_number) else {
                continue;
            };
            if let Some(bus) = tree.find_by_logical_name(root, &host_logical_name(host)) {
                debug!("scsi{} is driven by {}", host, driver);
                tree.node_mut(bus).set_config("driver", &driver);
            }
        }
    }

    let host_strs = proc_scsi_dir.join("sg").join("host_strs");
    let content = match fs::read_to_string(&host_strs) {
        Ok(content) => content,
        Err(e) => {
            debug!("Cannot read {}: {}", host_strs.display(), e);
            return false;
        }
    };

    for (index, line) in content.lines().enumerate() {
        let Some(bus) = tree.find_by_logical_name(root, &host_logical_name(index as u32)) else {
            continue;
        };
        let node = tree.node_mut(bus);
        if node.product().is_none() && node.description().is_none() {
            node.set_description(line);
        }
    }

    true
}
