//! /proc/cpuinfo scanner
//!
//! `/proc/cpuinfo` is a stream of `key : value` lines. On x86 every
//! `processor` line opens a new record; PowerPC has no boundary key and
//! describes a single unit. Each line is applied to the current unit's node
//! under `core/`.

use crate::tree::{DeviceNode, DeviceTree, HwClass, NodeId};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Layout family of /proc/cpuinfo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuArch {
    X86,
    Ppc,
}

impl CpuArch {
    /// Architecture this binary was built for
    pub fn native() -> Self {
        if cfg!(any(target_arch = "powerpc", target_arch = "powerpc64")) {
            CpuArch::Ppc
        } else {
            CpuArch::X86
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "x86" | "x86_64" | "i386" | "i686" => Some(CpuArch::X86),
            "ppc" | "ppc64" | "powerpc" | "powerpc64" => Some(CpuArch::Ppc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CpuArch::X86 => "x86",
            CpuArch::Ppc => "ppc",
        }
    }

    fn profile(&self) -> &'static ArchProfile {
        match self {
            CpuArch::X86 => &X86_PROFILE,
            CpuArch::Ppc => &PPC_PROFILE,
        }
    }
}

/// What a recognised key does to the unit node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Vendor,
    Product,
    Version,
    Serial,
    /// Capability named after the key, added when the value is `yes`
    YesFlag,
    /// One capability per whitespace-separated token
    FlagList,
}

struct ArchProfile {
    boundary: Option<&'static str>,
    first_unit: i32,
    fields: &'static [(&'static str, Field)],
}

static X86_PROFILE: ArchProfile = ArchProfile {
    boundary: Some("processor"),
    first_unit: -1,
    fields: &[
        ("vendor_id", Field::Vendor),
        ("model name", Field::Product),
        ("Physical processor ID", Field::Serial),
        ("fdiv_bug", Field::YesFlag),
        ("hlt_bug", Field::YesFlag),
        ("f00f_bug", Field::YesFlag),
        ("coma_bug", Field::YesFlag),
        ("fpu", Field::YesFlag),
        ("wp", Field::YesFlag),
        ("fpu_exception", Field::YesFlag),
        ("flags", Field::FlagList),
    ],
};

static PPC_PROFILE: ArchProfile = ArchProfile {
    boundary: None,
    first_unit: 0,
    fields: &[("revision", Field::Version), ("cpu", Field::Product)],
};

/// CPUID vendor strings and the names we report instead
const VENDOR_NAMES: &[(&str, &str)] = &[
    ("AuthenticAMD", "Advanced Micro Devices [AMD]"),
    ("GenuineIntel", "Intel Corp."),
];

fn vendor_name(raw: &str) -> &str {
    VENDOR_NAMES
        .iter()
        .find(|(code, _)| *code == raw)
        .map(|(_, name)| *name)
        .unwrap_or(raw)
}

/// Split `key : value`, trimming both sides
fn split_line(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    Some((key.trim(), value.trim()))
}

/// Find or create the node for processor `n` under `root/core`.
///
/// Negative indices mean 0. `cpu:0` and `cpu` are the same unit while core
/// holds at most one processor. Returns `None` when there is no `core`.
pub fn get_cpu(tree: &mut DeviceTree, root: NodeId, n: i32) -> Option<NodeId> {
    let n = n.max(0);

    if let Some(cpu) = tree.get_child(root, &format!("core/cpu:{}", n)) {
        tree.claim(cpu, true);
        return Some(cpu);
    }

    let core = tree.get_child(root, "core")?;

    if n == 0 && tree.count_children(core, HwClass::Processor) <= 1 {
        if let Some(cpu) = tree.get_child(core, "cpu") {
            tree.claim(cpu, true);
            return Some(cpu);
        }
    }

    Some(tree.add_child(core, DeviceNode::new("cpu", HwClass::Processor)))
}

/// Streaming scanner holding the current unit index for one input
pub struct CpuinfoScanner {
    profile: &'static ArchProfile,
    current: i32,
}

impl CpuinfoScanner {
    pub fn new(arch: CpuArch) -> Self {
        let profile = arch.profile();
        Self {
            profile,
            current: profile.first_unit,
        }
    }

    /// Index of the unit the next line applies to
    pub fn current_unit(&self) -> i32 {
        self.current
    }

    /// Apply one line. Lines without a colon and unknown keys are ignored.
    pub fn feed_line(&mut self, tree: &mut DeviceTree, root: NodeId, line: &str) {
        let Some((key, value)) = split_line(line) else {
            return;
        };

        if self.profile.boundary == Some(key) {
            self.current += 1;
        }

        let Some(cpu) = get_cpu(tree, root, self.current) else {
            return;
        };
        tree.claim(cpu, true);

        let Some((_, field)) = self.profile.fields.iter().find(|(k, _)| *k == key) else {
            return;
        };

        let node = tree.node_mut(cpu);
        match field {
            Field::Vendor => node.set_vendor(vendor_name(value)),
            Field::Product => node.set_product(value),
            Field::Version => node.set_version(value),
            Field::Serial => node.set_serial(value),
            Field::YesFlag => {
                if value == "yes" {
                    node.add_capability(key);
                }
            }
            Field::FlagList => {
                for flag in value.split_whitespace() {
                    node.add_capability(flag);
                }
            }
        }
    }

    pub fn feed(&mut self, tree: &mut DeviceTree, root: NodeId, text: &str) {
        for line in text.lines() {
            self.feed_line(tree, root, line);
        }
    }
}

/// Make sure `root/core` exists and return it
pub fn ensure_core(tree: &mut DeviceTree, root: NodeId) -> NodeId {
    if let Some(core) = tree.get_child(root, "core") {
        return core;
    }
    let mut core = DeviceNode::new("core", HwClass::Bus);
    core.set_description("Motherboard");
    tree.add_child(root, core)
}

/// Read `path` and feed it through a fresh scanner for `arch`.
/// Returns false when the file cannot be read.
pub fn scan_cpuinfo(tree: &mut DeviceTree, root: NodeId, path: &Path, arch: CpuArch) -> bool {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            debug!("Cannot read {}: {}", path.display(), e);
            return false;
        }
    };

    let core = ensure_core(tree, root);
    let mut scanner = CpuinfoScanner::new(arch);
    scanner.feed(tree, root, &content);

    info!(
        "cpuinfo ({}): {} processor(s)",
        arch.as_str(),
        tree.count_children(core, HwClass::Processor)
    );
    true
}
