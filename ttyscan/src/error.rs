//! Error types for ttyscan.

use thiserror::Error;

/// Result type for ttyscan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for ttyscan operations.
///
/// Only [`Error::Registry`] is produced by an enumeration itself; the other
/// variant comes from backend selection.
#[derive(Debug, Error)]
pub enum Error {
    /// The top-level serial service query could not be built or submitted.
    #[error("Registry query failed: {0}")]
    Registry(String),

    /// No enumeration backend is available on this platform.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Registry error for an OS call that returned a non-success code.
    pub fn registry_call(call: &str, code: i32) -> Self {
        Self::Registry(format!("{call} returned {code:#010x}"))
    }
}

/// Failure to read a single field of a device.
///
/// These never abort an enumeration. The discovery code turns each one into
/// an absent field on an otherwise valid record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    /// The property or object does not exist.
    #[error("{0} is not present")]
    Missing(&'static str),

    /// The property exists but cannot be represented as UTF-8 text.
    #[error("{0} cannot be converted to text")]
    Conversion(&'static str),

    /// An OS call failed.
    #[error("{call} failed with {code:#010x}")]
    Call {
        /// Name of the failing call.
        call: &'static str,
        /// Raw return code.
        code: i32,
    },
}
