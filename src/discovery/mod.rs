//! FPGA Discovery Components
//!
//! Device enumeration and classification for PCI-attached FPGA accelerator
//! cards. One discovery pass walks the sysfs PCI device tree, classifies
//! each function by its marker files (`mgmt_pf` / `user_pf` / neither) and
//! emits a normalized list of allocatable [`Device`] records for the
//! registration layer to expose to the kubelet.

pub mod catalog;
pub mod classifier;
pub mod retry;
pub mod scanner;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Serialize, Serializer};

// =============================================================================
// Sysfs Layout
// =============================================================================

/// Default sysfs root enumerating PCI functions by address.
pub const SYSFS_DEVICES: &str = "/sys/bus/pci/devices";

/// Marker file present on a management function.
pub const MGMT_MARKER: &str = "mgmt_pf";
/// Marker file present on a user (compute) function.
pub const USER_MARKER: &str = "user_pf";

pub const VENDOR_FILE: &str = "vendor";
pub const DEVICE_FILE: &str = "device";
pub const SUBSYSTEM_DEVICE_FILE: &str = "subsystem_device";
pub const INSTANCE_FILE: &str = "instance";

/// Firmware-info subdirectory name prefix (e.g. `rom.u50`).
pub const ROM_PREFIX: &str = "rom";
/// Shell/firmware version attribute inside the rom directory.
pub const SHELL_VERSION_FILE: &str = "VBNV";
/// Firmware timestamp attribute inside the rom directory.
pub const TIMESTAMP_FILE: &str = "timestamp";

/// DRM subdirectory of a user function.
pub const DRM_DIR: &str = "drm";
/// Render node name prefix under the DRM subdirectory.
pub const RENDER_PREFIX: &str = "renderD";

/// QDMA queue subdirectory prefix and device-node name stem.
pub const QDMA_QUEUE_STR: &str = "dma.qdma.u";

pub const MGMT_NODE_PREFIX: &str = "/dev/xclmgmt";
pub const USER_NODE_DIR: &str = "/dev/dri";
pub const QDMA_NODE_DIR: &str = "/dev/xfpga";

/// CAPI2 kernel interface: `cxl/card<N>` under the function directory
/// maps to `/dev/cxl/afu<N>.0m`.
pub const CXL_DIR: &str = "cxl";
pub const CXL_CARD_PREFIX: &str = "card";
pub const CXL_NODE_DIR: &str = "/dev/cxl";
pub const CXL_NODE_PREFIX: &str = "afu";
pub const CXL_NODE_POSTFIX: &str = ".0m";

/// OpenCAPI kernel interface: `ocxlfn.<addr>/ocxl` under the function
/// directory maps to `/dev/ocxl/IBM,oc-snap.<addr>.0`.
pub const OCXL_FN_PREFIX: &str = "ocxlfn.";
pub const OCXL_DIR: &str = "ocxl";
pub const OCXL_NODE_DIR: &str = "/dev/ocxl";
pub const OCXL_NODE_PREFIX: &str = "IBM,oc-snap.";
pub const OCXL_NODE_POSTFIX: &str = ".0";

// =============================================================================
// Vendor and Device IDs
// =============================================================================

pub const XILINX_VENDOR_ID: &str = "0x10ee";
pub const ADVANTECH_VENDOR_ID: &str = "0x13fe";
pub const AWS_VENDOR_ID: &str = "0x1d0f";
pub const ARISTA_VENDOR_ID: &str = "0x3475";
pub const IBM_VENDOR_ID: &str = "0x1014";

/// PCI device ID of a CAPI2 controller function.
pub const CAPI2_DEVICE_ID: &str = "0x0477";
/// PCI device ID of an OpenCAPI controller function.
pub const OPENCAPI_DEVICE_ID: &str = "0x062b";

// =============================================================================
// Controller Kind
// =============================================================================

/// Controller family of an unclassified ("virtual slot") function,
/// derived from its PCI device ID.
///
/// The kind qualifies every Card Catalog key: CAPI2 and OpenCAPI cards
/// reuse subsystem IDs, so the subsystem ID alone is ambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ControllerKind {
    /// CAPI2 controller (cxl kernel interface)
    Capi2,
    /// OpenCAPI controller (ocxl kernel interface)
    OpenCapi,
}

impl ControllerKind {
    /// Derive the controller kind from a PCI device ID string.
    pub fn from_device_id(device_id: &str) -> Option<Self> {
        if device_id.eq_ignore_ascii_case(CAPI2_DEVICE_ID) {
            Some(ControllerKind::Capi2)
        } else if device_id.eq_ignore_ascii_case(OPENCAPI_DEVICE_ID) {
            Some(ControllerKind::OpenCapi)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerKind::Capi2 => write!(f, "CAPI2"),
            ControllerKind::OpenCapi => write!(f, "OpenCAPI"),
        }
    }
}

// =============================================================================
// Health Status
// =============================================================================

/// Coarse readiness flag for an allocatable device.
///
/// Discovery always reports [`HealthStatus::Healthy`]; live probing
/// (thermal, power, fan) is layered externally by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Kubelet device plugin API health strings.
        match self {
            HealthStatus::Healthy => write!(f, "Healthy"),
            HealthStatus::Unhealthy => write!(f, "Unhealthy"),
        }
    }
}

// =============================================================================
// Node Group
// =============================================================================

/// Device-node paths of one physical card, filled in incrementally as its
/// sibling functions are visited.
///
/// On bare metal a card shows up as a mgmt PF / user PF pair; in a VM the
/// mgmt PF may not be assigned, so any slot can stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeGroup {
    /// Management node, e.g. `/dev/xclmgmt196865`
    pub mgmt: Option<String>,
    /// User (render) node, e.g. `/dev/dri/renderD128`
    pub user: Option<String>,
    /// DMA queue node, e.g. `/dev/xfpga/dma.qdma.u196864.0`
    pub dma: Option<String>,
}

/// Shared handle to a card's [`NodeGroup`].
///
/// Every [`Device`] of the same card holds the same handle, and the group
/// is mutated in place while the pass is still running. A management
/// sibling visited after a user function was already emitted therefore
/// becomes visible through the emitted record. This aliasing is part of
/// the contract: consumers read the group at registration time, not at
/// emission time.
#[derive(Debug, Clone, Default)]
pub struct SharedNodeGroup(Arc<RwLock<NodeGroup>>);

impl SharedNodeGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mgmt(&self, node: String) {
        self.0.write().mgmt = Some(node);
    }

    pub fn set_user(&self, node: String) {
        self.0.write().user = Some(node);
    }

    pub fn set_dma(&self, node: String) {
        self.0.write().dma = Some(node);
    }

    /// Copy of the group's current contents.
    pub fn snapshot(&self) -> NodeGroup {
        self.0.read().clone()
    }

    /// Whether two handles alias the same underlying group.
    pub fn shares_with(&self, other: &SharedNodeGroup) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Serialize for SharedNodeGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.snapshot().serialize(serializer)
    }
}

// =============================================================================
// Device
// =============================================================================

/// One allocatable accelerator unit, emitted once per qualifying function.
///
/// Immutable after creation; only the [`NodeGroup`] behind `nodes` may
/// still change during the remainder of the pass (see [`SharedNodeGroup`]).
#[derive(Debug, Clone, Serialize)]
pub struct Device {
    /// 1-based sequence index; assignment order equals discovery order.
    pub index: usize,
    /// Firmware shell version (DSA), or the catalog card name for
    /// virtual-slot devices.
    pub shell_version: String,
    /// Firmware timestamp, or the subsystem device ID for virtual-slot
    /// devices.
    pub timestamp: String,
    /// Full function address (domain:bus:device.function).
    pub dbdf: String,
    /// PCI device ID of the function.
    pub device_id: String,
    /// Coarse readiness flag.
    pub health: HealthStatus,
    /// Shared node paths of the owning card.
    pub nodes: SharedNodeGroup,
    /// CAPI/OpenCAPI accelerator link (`/dev/cxl/...`, `/dev/ocxl/...`),
    /// absent for plain user functions.
    pub aux_device_path: Option<String>,
}

// =============================================================================
// Device Inventory
// =============================================================================

/// Result of one discovery pass.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInventory {
    /// Emitted devices in discovery order.
    pub devices: Vec<Device>,
    /// When the pass completed.
    pub discovered_at: DateTime<Utc>,
}

impl DeviceInventory {
    pub fn new(devices: Vec<Device>) -> Self {
        Self {
            devices,
            discovered_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Devices currently flagged healthy.
    pub fn healthy_count(&self) -> usize {
        self.devices
            .iter()
            .filter(|d| d.health == HealthStatus::Healthy)
            .count()
    }

    /// Devices carrying a CAPI/OpenCAPI accelerator link.
    pub fn accelerator_link_count(&self) -> usize {
        self.devices
            .iter()
            .filter(|d| d.aux_device_path.is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_kind_from_device_id() {
        assert_eq!(
            ControllerKind::from_device_id("0x0477"),
            Some(ControllerKind::Capi2)
        );
        assert_eq!(
            ControllerKind::from_device_id("0x062B"),
            Some(ControllerKind::OpenCapi)
        );
        assert_eq!(ControllerKind::from_device_id("0x5000"), None);
    }

    #[test]
    fn test_health_status_display_matches_plugin_api() {
        assert_eq!(HealthStatus::Healthy.to_string(), "Healthy");
        assert_eq!(HealthStatus::Unhealthy.to_string(), "Unhealthy");
    }

    #[test]
    fn test_shared_node_group_mutation_visible_through_clone() {
        let group = SharedNodeGroup::new();
        let handle = group.clone();

        group.set_user("/dev/dri/renderD128".to_string());
        handle.set_mgmt("/dev/xclmgmt196865".to_string());

        let snap = handle.snapshot();
        assert_eq!(snap.user.as_deref(), Some("/dev/dri/renderD128"));
        assert_eq!(snap.mgmt.as_deref(), Some("/dev/xclmgmt196865"));
        assert!(group.shares_with(&handle));
        assert!(!group.shares_with(&SharedNodeGroup::new()));
    }

    #[test]
    fn test_inventory_counts() {
        let group = SharedNodeGroup::new();
        let device = |index, aux: Option<&str>| Device {
            index,
            shell_version: "xilinx_u50_gen3x16".to_string(),
            timestamp: "0x5e8f3b".to_string(),
            dbdf: "0000:03:00.1".to_string(),
            device_id: "0x5001".to_string(),
            health: HealthStatus::Healthy,
            nodes: group.clone(),
            aux_device_path: aux.map(String::from),
        };

        let inventory =
            DeviceInventory::new(vec![device(1, None), device(2, Some("/dev/cxl/afu0.0m"))]);
        assert_eq!(inventory.len(), 2);
        assert_eq!(inventory.healthy_count(), 2);
        assert_eq!(inventory.accelerator_link_count(), 1);
        assert!(!inventory.is_empty());
    }
}
