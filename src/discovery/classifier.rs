//! Function Classifier
//!
//! Determines the role of one PCI function from its marker files and
//! extracts the role-specific metadata:
//!
//! - `user_pf` present: the compute function. Firmware version/timestamp
//!   come from the `rom*` subdirectory (retried per [`RetryPolicy`] to
//!   tolerate the hot-plug populate race), the render node from `drm/`,
//!   and a DMA queue node when the QDMA subdirectory exists. Emits one
//!   [`Device`].
//! - `mgmt_pf` present: the management function. Contributes the mgmt node
//!   path to the card's shared [`SharedNodeGroup`] and emits nothing.
//! - neither: a CAPI2 virtual slot or an OpenCAPI function, identified via
//!   the Card Catalog; unrecognized ID pairs emit nothing.
//!
//! Prior to the 2018.3 driver release the mgmt/user function numbers were
//! fixed instead of marked; drivers without the marker files land on the
//! catalog path and are not supported as plain FPGAs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use super::catalog::CardCatalog;
use super::retry::{RetryPolicy, Sleeper, TokioSleeper};
use super::{
    ControllerKind, Device, HealthStatus, SharedNodeGroup, CXL_CARD_PREFIX, CXL_DIR,
    CXL_NODE_DIR, CXL_NODE_POSTFIX, CXL_NODE_PREFIX, DEVICE_FILE, DRM_DIR, INSTANCE_FILE,
    MGMT_MARKER, MGMT_NODE_PREFIX, OCXL_DIR, OCXL_FN_PREFIX, OCXL_NODE_DIR, OCXL_NODE_POSTFIX,
    OCXL_NODE_PREFIX, QDMA_NODE_DIR, QDMA_QUEUE_STR, RENDER_PREFIX, ROM_PREFIX,
    SHELL_VERSION_FILE, SUBSYSTEM_DEVICE_FILE, TIMESTAMP_FILE, USER_MARKER, USER_NODE_DIR,
};
use crate::error::Result;
use crate::pci;
use crate::sysfs;

/// Classifies one PCI function directory and extracts its metadata.
pub struct FunctionClassifier {
    sysfs_root: PathBuf,
    catalog: CardCatalog,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl FunctionClassifier {
    /// Create a classifier with the production (tokio) sleeper.
    pub fn new(sysfs_root: impl Into<PathBuf>, catalog: CardCatalog, retry: RetryPolicy) -> Self {
        Self::with_sleeper(sysfs_root, catalog, retry, Arc::new(TokioSleeper))
    }

    /// Create a classifier with an injected sleeper (tests).
    pub fn with_sleeper(
        sysfs_root: impl Into<PathBuf>,
        catalog: CardCatalog,
        retry: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            sysfs_root: sysfs_root.into(),
            catalog,
            retry,
            sleeper,
        }
    }

    fn function_dir(&self, address: &str) -> PathBuf {
        self.sysfs_root.join(address)
    }

    /// Classify the function at `address`, contributing node paths to the
    /// card's shared `group` and emitting at most one [`Device`] carrying
    /// the given 1-based `index`.
    ///
    /// Any read failure of an expected file aborts the whole pass.
    pub async fn classify(
        &self,
        address: &str,
        group: &SharedNodeGroup,
        index: usize,
    ) -> Result<Option<Device>> {
        let dir = self.function_dir(address);

        if sysfs::exists(dir.join(USER_MARKER)) {
            self.classify_user(address, &dir, group, index).await.map(Some)
        } else if sysfs::exists(dir.join(MGMT_MARKER)) {
            self.classify_mgmt(address, &dir, group)?;
            Ok(None)
        } else {
            self.classify_virtual_slot(address, &dir, group, index)
        }
    }

    /// User (compute) function: firmware metadata, render node, DMA node.
    async fn classify_user(
        &self,
        address: &str,
        dir: &Path,
        group: &SharedNodeGroup,
        index: usize,
    ) -> Result<Device> {
        let rom_dir = self.locate_rom_dir(address, dir).await?;

        let shell_version = sysfs::read_trimmed(rom_dir.join(SHELL_VERSION_FILE))?;
        let timestamp = sysfs::read_trimmed(rom_dir.join(TIMESTAMP_FILE))?;
        let device_id = sysfs::read_trimmed(dir.join(DEVICE_FILE))?;

        if let Some(render) = sysfs::first_with_prefix(dir.join(DRM_DIR), RENDER_PREFIX)? {
            group.set_user(format!("{}/{}", USER_NODE_DIR, render));
        }

        let instance = pci::instance_number(address)?;
        if sysfs::first_with_prefix(dir, QDMA_QUEUE_STR)?.is_some() {
            group.set_dma(format!(
                "{}/{}{}.0",
                QDMA_NODE_DIR, QDMA_QUEUE_STR, instance
            ));
        }

        Ok(Device {
            index,
            shell_version,
            timestamp,
            dbdf: address.to_string(),
            device_id,
            // No live probing here; consumers layer real health externally.
            health: HealthStatus::Healthy,
            nodes: group.clone(),
            aux_device_path: None,
        })
    }

    /// Find the `rom*` firmware subdirectory, retrying while the driver is
    /// still populating it after a hot-plug.
    async fn locate_rom_dir(&self, address: &str, dir: &Path) -> Result<PathBuf> {
        let mut rom = sysfs::first_with_prefix(dir, ROM_PREFIX)?;
        let mut attempt = 0;
        while rom.is_none() && attempt < self.retry.max_attempts {
            attempt += 1;
            debug!(
                address,
                attempt, "firmware directory not yet populated, retrying"
            );
            self.sleeper.sleep(self.retry.delay).await;
            rom = sysfs::first_with_prefix(dir, ROM_PREFIX)?;
        }

        match rom {
            Some(name) => Ok(dir.join(name)),
            None => {
                // Proceed with the bare function dir; the version read
                // below fails and aborts the pass with a FileRead error.
                warn!(address, "firmware directory absent after retries");
                Ok(dir.to_path_buf())
            }
        }
    }

    /// Management function: contributes the mgmt node, emits no device.
    fn classify_mgmt(&self, address: &str, dir: &Path, group: &SharedNodeGroup) -> Result<()> {
        let instance = sysfs::read_trimmed(dir.join(INSTANCE_FILE))?;
        debug!(address, %instance, "management function");
        group.set_mgmt(format!("{}{}", MGMT_NODE_PREFIX, instance));
        Ok(())
    }

    /// Neither marker: CAPI2 virtual slot or OpenCAPI function. Allocatable
    /// only when (kind, subsystem ID) is in the Card Catalog.
    fn classify_virtual_slot(
        &self,
        address: &str,
        dir: &Path,
        group: &SharedNodeGroup,
        index: usize,
    ) -> Result<Option<Device>> {
        let subsystem_id = sysfs::read_trimmed(dir.join(SUBSYSTEM_DEVICE_FILE))?;
        let device_id = sysfs::read_trimmed(dir.join(DEVICE_FILE))?;

        let Some(kind) = ControllerKind::from_device_id(&device_id) else {
            debug!(address, %device_id, "no controller kind, skipping");
            return Ok(None);
        };

        let Some(card_name) = self.catalog.lookup(kind, &subsystem_id) else {
            debug!(
                address,
                %kind,
                %device_id,
                %subsystem_id,
                "unrecognized card, skipping"
            );
            return Ok(None);
        };

        let aux_device_path = match kind {
            ControllerKind::Capi2 => self.capi2_accelerator_link(dir)?,
            ControllerKind::OpenCapi => {
                // The ocxl companion directory exists exactly for virtual
                // slots the kernel exposed a device node for; without it
                // the function is not allocatable.
                let companion = dir
                    .join(format!("{}{}", OCXL_FN_PREFIX, address))
                    .join(OCXL_DIR);
                if !sysfs::exists(&companion) {
                    debug!(address, "no ocxl companion link, skipping");
                    return Ok(None);
                }
                Some(format!(
                    "{}/{}{}{}",
                    OCXL_NODE_DIR, OCXL_NODE_PREFIX, address, OCXL_NODE_POSTFIX
                ))
            }
        };

        Ok(Some(Device {
            index,
            shell_version: card_name.to_string(),
            timestamp: subsystem_id,
            dbdf: address.to_string(),
            device_id,
            health: HealthStatus::Healthy,
            nodes: group.clone(),
            aux_device_path,
        }))
    }

    /// `/dev/cxl/afu<N>.0m` for a CAPI2 card, when the `cxl/card<N>` entry
    /// is present. Absence still emits the device, just without the link.
    fn capi2_accelerator_link(&self, dir: &Path) -> Result<Option<String>> {
        let cxl_dir = dir.join(CXL_DIR);
        if !sysfs::exists(&cxl_dir) {
            return Ok(None);
        }
        let Some(card) = sysfs::first_with_prefix(&cxl_dir, CXL_CARD_PREFIX)? else {
            return Ok(None);
        };
        let card_id = card.trim_start_matches(CXL_CARD_PREFIX);
        Ok(Some(format!(
            "{}/{}{}{}",
            CXL_NODE_DIR, CXL_NODE_PREFIX, card_id, CXL_NODE_POSTFIX
        )))
    }
}
