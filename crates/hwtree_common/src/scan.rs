//! Scan driver
//!
//! Runs the enabled probes against one tree. All per-scan state (the
//! address → device path map in particular) lives in a [`ScanContext`]
//! built for that scan, so repeated scans never see each other's leftovers.

use crate::config::HwtreeConfig;
use crate::cpuinfo;
use crate::error::ConfigError;
use crate::scsi::{DeviceMap, EndpointOpener, ScsiProbe, ScsiScanSummary};
use crate::tree::DeviceTree;
use serde::Serialize;

/// Probe families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Probe {
    Cpuinfo,
    Scsi,
}

impl Probe {
    pub const ALL: [Probe; 2] = [Probe::Cpuinfo, Probe::Scsi];

    pub fn as_str(&self) -> &'static str {
        match self {
            Probe::Cpuinfo => "cpuinfo",
            Probe::Scsi => "scsi",
        }
    }
}

/// Everything one scan needs besides the tree
#[derive(Debug, Clone)]
pub struct ScanContext {
    pub config: HwtreeConfig,
    pub device_map: DeviceMap,
}

impl ScanContext {
    /// Context with an empty device map
    pub fn new(config: HwtreeConfig) -> Self {
        Self {
            config,
            device_map: DeviceMap::new(),
        }
    }

    /// Probe the configured candidate device paths on this machine
    #[cfg(target_os = "linux")]
    pub fn discover_devices(&mut self) {
        use crate::scsi::sg::LinuxCandidateProbe;

        self.device_map = DeviceMap::build(&LinuxCandidateProbe, &self.config.scsi.candidate_devices);
        tracing::info!("{} SCSI device paths identified", self.device_map.len());
    }

    #[cfg(not(target_os = "linux"))]
    pub fn discover_devices(&mut self) {}
}

/// What a scan did, per probe family
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Whether /proc/cpuinfo was read; `None` when the probe did not run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpuinfo: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scsi: Option<ScsiScanSummary>,
}

fn wanted(ctx: &ScanContext, probes: &[Probe], probe: Probe) -> bool {
    let enabled = match probe {
        Probe::Cpuinfo => ctx.config.cpuinfo.enabled,
        Probe::Scsi => ctx.config.scsi.enabled,
    };
    enabled && probes.contains(&probe)
}

fn run_cpuinfo(tree: &mut DeviceTree, ctx: &ScanContext, report: &mut ScanReport) -> Result<(), ConfigError> {
    let arch = ctx.config.cpu_arch()?;
    let root = tree.root();
    report.cpuinfo = Some(cpuinfo::scan_cpuinfo(tree, root, &ctx.config.cpuinfo.path, arch));
    Ok(())
}

/// Run the selected probes, reaching SCSI controllers through `opener`.
/// Only a bad cpuinfo architecture setting is an error.
pub fn run_with<O: EndpointOpener>(
    tree: &mut DeviceTree,
    ctx: &ScanContext,
    probes: &[Probe],
    opener: O,
) -> Result<ScanReport, ConfigError> {
    let mut report = ScanReport::default();

    if wanted(ctx, probes, Probe::Cpuinfo) {
        run_cpuinfo(tree, ctx, &mut report)?;
    }

    if wanted(ctx, probes, Probe::Scsi) {
        let root = tree.root();
        let probe = ScsiProbe::new(opener)
            .with_proc_dir(&ctx.config.scsi.proc_scsi_dir)
            .with_max_controllers(ctx.config.scsi.max_controllers);
        report.scsi = Some(probe.scan(tree, root, &ctx.device_map));
    }

    Ok(report)
}

/// Run the selected probes against the real machine
#[cfg(target_os = "linux")]
pub fn run(tree: &mut DeviceTree, ctx: &ScanContext, probes: &[Probe]) -> Result<ScanReport, ConfigError> {
    use crate::scsi::sg::SgOpener;

    run_with(tree, ctx, probes, SgOpener::new(&ctx.config.scsi.sg_device_template))
}

#[cfg(not(target_os = "linux"))]
pub fn run(tree: &mut DeviceTree, ctx: &ScanContext, probes: &[Probe]) -> Result<ScanReport, ConfigError> {
    let mut report = ScanReport::default();
    if wanted(ctx, probes, Probe::Cpuinfo) {
        run_cpuinfo(tree, ctx, &mut report)?;
    }
    if wanted(ctx, probes, Probe::Scsi) {
        tracing::warn!("SCSI generic probing is only available on Linux");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scsi::transport::{CommandBlock, ControlEndpoint, Reply, ScsiId};
    use crate::ProbeError;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    struct Absent;

    impl ControlEndpoint for Absent {
        fn path(&self) -> &str {
            "absent"
        }

        fn send(&mut self, _: &CommandBlock, _: usize, _: Duration) -> Result<Reply, ProbeError> {
            Ok(Reply::default())
        }

        fn scsi_id(&mut self) -> Result<ScsiId, ProbeError> {
            Ok(ScsiId::default())
        }

        fn platform_slot(&mut self) -> Option<String> {
            None
        }

        fn driver_version(&mut self) -> Result<i32, ProbeError> {
            Ok(0)
        }
    }

    struct NoControllers;

    impl EndpointOpener for NoControllers {
        type Endpoint = Absent;

        fn open(&self, index: u32) -> Result<Absent, ProbeError> {
            Err(ProbeError::transport(
                format!("/dev/sg{}", index),
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ))
        }
    }

    fn context_for(cpuinfo: &NamedTempFile) -> ScanContext {
        let mut config = HwtreeConfig::default();
        config.cpuinfo.path = cpuinfo.path().to_path_buf();
        config.cpuinfo.arch = "x86".to_string();
        config.scsi.proc_scsi_dir = "/nonexistent/hwtree/proc/scsi".into();
        ScanContext::new(config)
    }

    #[test]
    fn test_full_scan_without_controllers() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "processor : 0\nvendor_id : GenuineIntel\nprocessor : 1\nvendor_id : GenuineIntel").unwrap();
        let ctx = context_for(&file);

        let mut tree = DeviceTree::default();
        let report = run_with(&mut tree, &ctx, &Probe::ALL, NoControllers).unwrap();
        assert_eq!(report.cpuinfo, Some(true));
        let scsi = report.scsi.unwrap();
        assert_eq!(scsi.endpoints, 0);
        assert!(!scsi.host_pass);

        let root = tree.root();
        assert!(tree.get_child(root, "core/cpu:0").is_some());
        assert!(tree.get_child(root, "core/cpu:1").is_some());
        assert_eq!(tree.get_child(root, "scsi"), None);
    }

    #[test]
    fn test_probe_selection_and_disabled_probes() {
        let file = NamedTempFile::new().unwrap();
        let mut ctx = context_for(&file);

        let mut tree = DeviceTree::default();
        let report = run_with(&mut tree, &ctx, &[Probe::Scsi], NoControllers).unwrap();
        assert_eq!(report.cpuinfo, None);
        assert!(report.scsi.is_some());

        ctx.config.scsi.enabled = false;
        let report = run_with(&mut tree, &ctx, &Probe::ALL, NoControllers).unwrap();
        assert_eq!(report.scsi, None);
        assert_eq!(report.cpuinfo, Some(true));
    }

    #[test]
    fn test_bad_arch_is_reported() {
        let file = NamedTempFile::new().unwrap();
        let mut ctx = context_for(&file);
        ctx.config.cpuinfo.arch = "vax".to_string();
        let mut tree = DeviceTree::default();
        let err = run_with(&mut tree, &ctx, &[Probe::Cpuinfo], NoControllers).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownArch(_)));
    }

    #[test]
    fn test_report_serialization_skips_missing_probes() {
        let report = ScanReport {
            cpuinfo: Some(false),
            scsi: None,
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["cpuinfo"], false);
        assert!(value.get("scsi").is_none());
    }
}
