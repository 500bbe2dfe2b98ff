//! PCI address codec
//!
//! A PCI function is addressed as `domain:bus:device.function`, all hex
//! (e.g. `0003:01:00.0`). Two derived forms matter here:
//!
//! - the [`instance_number`], a linear encoding used to name per-function
//!   DMA queue device nodes,
//! - the [`CardAddress`], the `domain:bus:device` portion shared by sibling
//!   functions of the same physical card, used as the grouping key when
//!   pairing a management function with its user function.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

fn parse_hex(component: &str, address: &str, bits: u32) -> Result<u64> {
    let value = u64::from_str_radix(component, 16).map_err(|_| Error::AddressParse {
        address: address.to_string(),
        reason: format!("invalid hex component '{}'", component),
    })?;
    if value >> bits != 0 {
        return Err(Error::AddressParse {
            address: address.to_string(),
            reason: format!("component '{}' exceeds {} bits", component, bits),
        });
    }
    Ok(value)
}

fn missing(separator: &str, address: &str) -> Error {
    Error::AddressParse {
        address: address.to_string(),
        reason: format!("missing '{}' separator", separator),
    }
}

/// Compute the linear instance number of a PCI function address.
///
/// `domain:bus:device.function` maps to
/// `domain * 65536 + bus * 256 + device * 8 + function`, matching the
/// numbering the FPGA driver uses for DMA queue nodes
/// (`/dev/xfpga/dma.qdma.u<instance>.0`).
///
/// Pure function: the same address always yields the same number.
pub fn instance_number(address: &str) -> Result<u64> {
    let (domain, rest) = address.split_once(':').ok_or_else(|| missing(":", address))?;
    let (bus, dev_fn) = rest.split_once(':').ok_or_else(|| missing(":", address))?;
    let (device, function) = dev_fn.split_once('.').ok_or_else(|| missing(".", address))?;

    // Component widths per the PCI address format: 16-bit domain, 8-bit
    // bus/device/function. Bounding them keeps the arithmetic below far
    // from u64 overflow.
    let domain = parse_hex(domain, address, 16)?;
    let bus = parse_hex(bus, address, 8)?;
    let device = parse_hex(device, address, 8)?;
    let function = parse_hex(function, address, 8)?;

    Ok(domain * 65536 + bus * 256 + device * 8 + function)
}

/// The `domain:bus:device` portion of a function address (value object).
///
/// Sibling functions of one physical card differ only in the function
/// digit, so this is the key under which their node paths are grouped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardAddress(String);

impl CardAddress {
    /// Derive the card address from a full function address by stripping
    /// the function digit.
    pub fn from_function(address: &str) -> Result<Self> {
        let (dbd, _function) = address
            .rsplit_once('.')
            .ok_or_else(|| missing(".", address))?;
        Ok(Self(dbd.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CardAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
