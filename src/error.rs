//! Error types for the FPGA inventory core

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during a discovery pass.
///
/// Any of these aborts the whole pass: discovery is all-or-nothing per
/// invocation, callers retry the next pass rather than consume a partial
/// inventory.
#[derive(Error, Debug)]
pub enum Error {
    /// A sysfs directory could not be listed
    #[error("Can't read folder {path}: {source}")]
    DirectoryList {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// An expected sysfs file could not be opened or read
    #[error("Can't read file {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A PCI address component failed to parse
    #[error("Malformed PCI address '{address}': {reason}")]
    AddressParse { address: String, reason: String },

    /// Invalid scanner configuration
    #[error("Configuration error: {0}")]
    Config(String),
}
