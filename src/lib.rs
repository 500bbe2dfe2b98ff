//! FPGA Inventory - Accelerator Card Discovery for Kubernetes Device Plugins
//!
//! Inventories FPGA accelerator cards attached over PCI/PCIe by walking the
//! sysfs device tree, classifying each PCI function into a role and emitting
//! a normalized list of allocatable device records with their device-node
//! paths. A registration layer (device plugin gRPC server, out of scope
//! here) consumes the list and exposes the devices to the kubelet.
//!
//! # Architecture
//!
//! ```text
//! DeviceScanner ──per function──▶ FunctionClassifier
//!                                   │        │
//!                            sysfs probe   CardCatalog
//!                                   │
//!                             Vec<Device> (shared NodeGroups per card)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use fpga_inventory::DeviceScanner;
//!
//! # async fn example() -> fpga_inventory::Result<()> {
//! let scanner = DeviceScanner::default_scanner();
//! let devices = scanner.discover().await?;
//!
//! for device in &devices {
//!     println!("{}: {} ({}) [{}]",
//!         device.index,
//!         device.dbdf,
//!         device.shell_version,
//!         device.health,
//!     );
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`discovery`] - Classification, card catalog, retry policy, scanner
//! - [`error`] - Error types
//! - [`pci`] - PCI address codec
//! - [`sysfs`] - Filesystem probe primitives

pub mod discovery;
pub mod error;
pub mod pci;
pub mod sysfs;

// Re-export commonly used types
pub use discovery::catalog::CardCatalog;
pub use discovery::retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use discovery::scanner::{default_vendor_allowlist, DeviceScanner, ScannerConfig};
pub use discovery::{
    ControllerKind, Device, DeviceInventory, HealthStatus, NodeGroup, SharedNodeGroup,
};
pub use error::{Error, Result};
pub use pci::CardAddress;
