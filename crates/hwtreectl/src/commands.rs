//! hwtreectl subcommands

use crate::OnlyProbe;
use anyhow::{Context, Result};
use chrono::Utc;
use hwtree_common::logging::{filter_directive, LOG_ENV};
use hwtree_common::scan::{self, Probe};
use hwtree_common::{DeviceTree, HwtreeConfig, ScanContext};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Explicit file when given, otherwise the system file or defaults
fn load_config(path: Option<PathBuf>) -> Result<HwtreeConfig> {
    match path {
        Some(path) => HwtreeConfig::load_from(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(HwtreeConfig::load()),
    }
}

/// Install the stderr subscriber. stdout carries only the JSON dump.
fn init_logging(config: &HwtreeConfig) {
    let env = std::env::var(LOG_ENV).ok();
    let directive = filter_directive(&config.log.level, env.as_deref());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

fn selected_probes(only: Option<OnlyProbe>) -> Vec<Probe> {
    match only {
        Some(OnlyProbe::Cpu) => vec![Probe::Cpuinfo],
        Some(OnlyProbe::Scsi) => vec![Probe::Scsi],
        None => Probe::ALL.to_vec(),
    }
}

/// Execute `hwtreectl scan`
pub fn scan(config: Option<PathBuf>, only: Option<OnlyProbe>, compact: bool) -> Result<()> {
    let config = load_config(config)?;
    init_logging(&config);

    let probes = selected_probes(only);
    let mut ctx = ScanContext::new(config);
    if probes.contains(&Probe::Scsi) && ctx.config.scsi.enabled {
        ctx.discover_devices();
    }

    info!("hwtree {} scanning", env!("CARGO_PKG_VERSION"));
    let mut tree = DeviceTree::default();
    let report = scan::run(&mut tree, &ctx, &probes).context("Scan configuration is invalid")?;

    let output = json!({
        "generated_at": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "report": report,
        "tree": tree.to_json(tree.root()),
    });

    let rendered = if compact {
        serde_json::to_string(&output)?
    } else {
        serde_json::to_string_pretty(&output)?
    };
    println!("{}", rendered);
    Ok(())
}

/// Execute `hwtreectl config`
pub fn show_config(config: Option<PathBuf>) -> Result<()> {
    let config = load_config(config)?;
    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    print!("{}", rendered);
    Ok(())
}
