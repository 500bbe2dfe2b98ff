//! FPGA Inventory
//!
//! Walks the sysfs PCI device tree and reports the allocatable FPGA
//! accelerator devices on this node. Runs a single pass by default, or
//! re-scans on an interval when `--scan-interval-seconds` is set (the
//! stand-in for an external filesystem watcher re-triggering discovery).

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fpga_inventory::{DeviceScanner, ScannerConfig};

// =============================================================================
// CLI Arguments
// =============================================================================

/// FPGA Inventory - accelerator card discovery for Kubernetes device plugins
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Sysfs root enumerating PCI functions
    #[arg(long, env = "FPGA_SYSFS_ROOT", default_value = "/sys/bus/pci/devices")]
    sysfs_root: PathBuf,

    /// Comma-separated vendor ID allow-list
    #[arg(
        long,
        env = "FPGA_VENDOR_IDS",
        value_delimiter = ',',
        default_value = "0x10ee,0x13fe,0x1d0f,0x3475,0x1014"
    )]
    vendors: Vec<String>,

    /// Re-scan interval in seconds (0 = single pass)
    #[arg(long, env = "FPGA_SCAN_INTERVAL_SECONDS", default_value = "0")]
    scan_interval_seconds: u64,

    /// Print the inventory as JSON on stdout
    #[arg(long, env = "FPGA_OUTPUT_JSON")]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> fpga_inventory::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    info!("Starting FPGA inventory");
    info!("  Sysfs root: {}", args.sysfs_root.display());
    info!("  Vendors: {}", args.vendors.join(", "));
    info!("  Scan interval: {}s", args.scan_interval_seconds);

    let scanner = DeviceScanner::new(ScannerConfig {
        sysfs_root: args.sysfs_root.clone(),
        vendor_allowlist: args.vendors.clone(),
        ..Default::default()
    });

    if args.scan_interval_seconds == 0 {
        let inventory = scanner.inventory().await?;
        report(&inventory, args.json);
        return Ok(());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(args.scan_interval_seconds));
    loop {
        ticker.tick().await;
        // An error means no reliable inventory this pass; keep the loop
        // alive and retry on the next tick.
        match scanner.inventory().await {
            Ok(inventory) => report(&inventory, args.json),
            Err(e) => error!("discovery pass failed: {}", e),
        }
    }
}

fn report(inventory: &fpga_inventory::DeviceInventory, json: bool) {
    info!(
        "Discovered {} device(s), {} healthy, {} with accelerator links",
        inventory.len(),
        inventory.healthy_count(),
        inventory.accelerator_link_count(),
    );
    for device in &inventory.devices {
        let nodes = device.nodes.snapshot();
        info!(
            "  #{} {} shell={} nodes[mgmt={} user={} dma={}]",
            device.index,
            device.dbdf,
            device.shell_version,
            nodes.mgmt.as_deref().unwrap_or("-"),
            nodes.user.as_deref().unwrap_or("-"),
            nodes.dma.as_deref().unwrap_or("-"),
        );
    }

    if json {
        match serde_json::to_string_pretty(inventory) {
            Ok(out) => println!("{}", out),
            Err(e) => error!("failed to serialize inventory: {}", e),
        }
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
