//! Discovery Orchestrator
//!
//! Walks the sysfs PCI device tree, applies the vendor allow-list, groups
//! sibling functions by card address and delegates per-function work to the
//! [`FunctionClassifier`]. One call to [`DeviceScanner::discover`] is one
//! pass: sequential, all-or-nothing, repeatable.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::catalog::CardCatalog;
use super::classifier::FunctionClassifier;
use super::retry::{RetryPolicy, Sleeper};
use super::{Device, DeviceInventory, SharedNodeGroup, SYSFS_DEVICES, VENDOR_FILE};
use super::{
    ADVANTECH_VENDOR_ID, ARISTA_VENDOR_ID, AWS_VENDOR_ID, IBM_VENDOR_ID, XILINX_VENDOR_ID,
};
use crate::error::{Error, Result};
use crate::pci::CardAddress;
use crate::sysfs;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the device scanner
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Sysfs root enumerating PCI functions by address
    pub sysfs_root: PathBuf,

    /// Recognized vendor IDs; functions from other vendors are skipped
    pub vendor_allowlist: Vec<String>,

    /// Retry policy for the firmware-directory hot-plug race
    pub retry: RetryPolicy,

    /// Recognized CAPI2/OpenCAPI cards
    pub catalog: CardCatalog,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            sysfs_root: PathBuf::from(SYSFS_DEVICES),
            vendor_allowlist: default_vendor_allowlist(),
            retry: RetryPolicy::default(),
            catalog: CardCatalog::known_cards(),
        }
    }
}

/// Vendors whose FPGA functions this plugin recognizes.
pub fn default_vendor_allowlist() -> Vec<String> {
    vec![
        XILINX_VENDOR_ID.to_string(),
        ADVANTECH_VENDOR_ID.to_string(),
        AWS_VENDOR_ID.to_string(),
        ARISTA_VENDOR_ID.to_string(),
        IBM_VENDOR_ID.to_string(),
    ]
}

// =============================================================================
// Device Scanner
// =============================================================================

/// Enumerates PCI functions and assembles the allocatable device list.
pub struct DeviceScanner {
    config: ScannerConfig,
    classifier: FunctionClassifier,
}

impl DeviceScanner {
    /// Create a scanner from a configuration.
    pub fn new(config: ScannerConfig) -> Self {
        let classifier = FunctionClassifier::new(
            config.sysfs_root.clone(),
            config.catalog.clone(),
            config.retry,
        );
        Self { config, classifier }
    }

    /// Create a scanner with an injected sleeper (tests).
    pub fn with_sleeper(config: ScannerConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        let classifier = FunctionClassifier::with_sleeper(
            config.sysfs_root.clone(),
            config.catalog.clone(),
            config.retry,
            sleeper,
        );
        Self { config, classifier }
    }

    /// Scanner over the real sysfs tree with default settings.
    pub fn default_scanner() -> Self {
        Self::new(ScannerConfig::default())
    }

    /// Run one discovery pass.
    ///
    /// Functions are visited in name order. Each emitted device gets the
    /// next 1-based sequence index. The first error aborts the pass;
    /// callers must not treat a partial list as an inventory, so none is
    /// returned.
    #[instrument(skip(self), fields(root = %self.config.sysfs_root.display()))]
    pub async fn discover(&self) -> Result<Vec<Device>> {
        // An empty allow-list would silently report an empty fleet; treat
        // it as a misconfiguration instead.
        if self.config.vendor_allowlist.is_empty() {
            return Err(Error::Config("vendor allow-list is empty".to_string()));
        }

        let addresses = self.list_functions()?;
        debug!(count = addresses.len(), "enumerated PCI functions");

        let mut devices: Vec<Device> = Vec::new();
        let mut groups: HashMap<CardAddress, SharedNodeGroup> = HashMap::new();

        for address in &addresses {
            let vendor = sysfs::read_trimmed(
                self.config.sysfs_root.join(address).join(VENDOR_FILE),
            )?;
            if !self.vendor_allowed(&vendor) {
                continue;
            }
            debug!(%address, %vendor, "classifying function");

            // The group must exist before classification so sibling
            // functions share one handle regardless of visit order.
            let card = CardAddress::from_function(address)?;
            let group = groups.entry(card).or_default();

            if let Some(device) = self
                .classifier
                .classify(address, group, devices.len() + 1)
                .await?
            {
                info!(
                    index = device.index,
                    %address,
                    shell = %device.shell_version,
                    "registered device"
                );
                devices.push(device);
            }
        }

        Ok(devices)
    }

    /// One pass wrapped in a timestamped [`DeviceInventory`].
    pub async fn inventory(&self) -> Result<DeviceInventory> {
        Ok(DeviceInventory::new(self.discover().await?))
    }

    fn vendor_allowed(&self, vendor: &str) -> bool {
        self.config
            .vendor_allowlist
            .iter()
            .any(|v| v.eq_ignore_ascii_case(vendor))
    }

    /// PCI function addresses under the sysfs root, in name order.
    fn list_functions(&self) -> Result<Vec<String>> {
        let root = &self.config.sysfs_root;
        let entries = fs::read_dir(root).map_err(|source| Error::DirectoryList {
            path: root.display().to_string(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| Error::DirectoryList {
                path: root.display().to_string(),
                source,
            })?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::fs;
    use std::path::Path;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, format!("{}\n", content)).unwrap();
    }

    fn scanner_at(root: &Path) -> DeviceScanner {
        DeviceScanner::new(ScannerConfig {
            sysfs_root: root.to_path_buf(),
            retry: RetryPolicy::immediate(0),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_unreadable_root_is_directory_list_error() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = scanner_at(&dir.path().join("missing"));
        let err = scanner.discover().await.unwrap_err();
        assert_matches!(err, Error::DirectoryList { .. });
    }

    #[tokio::test]
    async fn test_foreign_vendor_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "0000:00:1f.3/vendor", "0x8086");

        let devices = scanner_at(dir.path()).discover().await.unwrap();
        assert!(devices.is_empty());
    }

    #[tokio::test]
    async fn test_vendor_filter_honors_configured_allowlist() {
        let dir = tempfile::tempdir().unwrap();
        // An otherwise-valid CAPI2 card from a vendor not on the list.
        write(dir.path(), "0003:01:00.0/vendor", "0x1014");
        write(dir.path(), "0003:01:00.0/device", "0x0477");
        write(dir.path(), "0003:01:00.0/subsystem_device", "0x0665");

        let scanner = DeviceScanner::new(ScannerConfig {
            sysfs_root: dir.path().to_path_buf(),
            vendor_allowlist: vec!["0x10ee".to_string()],
            retry: RetryPolicy::immediate(0),
            ..Default::default()
        });
        assert!(scanner.discover().await.unwrap().is_empty());

        let scanner = DeviceScanner::new(ScannerConfig {
            sysfs_root: dir.path().to_path_buf(),
            vendor_allowlist: vec!["0x1014".to_string()],
            retry: RetryPolicy::immediate(0),
            ..Default::default()
        });
        assert_eq!(scanner.discover().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_vendor_allowlist_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "0000:03:00.0/vendor", "0x10ee");

        let scanner = DeviceScanner::new(ScannerConfig {
            sysfs_root: dir.path().to_path_buf(),
            vendor_allowlist: vec![],
            retry: RetryPolicy::immediate(0),
            ..Default::default()
        });
        let err = scanner.discover().await.unwrap_err();
        assert_matches!(err, Error::Config(_));
    }

    #[tokio::test]
    async fn test_missing_vendor_file_aborts_pass() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("0000:03:00.0")).unwrap();

        let err = scanner_at(dir.path()).discover().await.unwrap_err();
        assert_matches!(err, Error::FileRead { .. });
    }
}
