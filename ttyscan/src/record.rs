//! Device records produced by an enumeration.

use crate::error::Error;

/// One discovered serial device.
///
/// Absent fields stay `None`; they are never represented by an empty
/// string. With the `serde` feature the record serializes with camelCase
/// keys and absent fields as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct DeviceRecord {
    /// Device path (e.g., "/dev/tty.usbserial-A10KJ2").
    pub path: String,
    /// Manufacturer string from the USB ancestor.
    pub manufacturer: Option<String>,
    /// Serial number string from the USB ancestor.
    pub serial_number: Option<String>,
    /// Plug-and-play identifier. Never populated by the backends in this crate.
    pub pnp_id: Option<String>,
    /// Physical USB location, 8 lowercase hex digits.
    pub location_id: Option<String>,
    /// USB vendor ID, 4 lowercase hex digits.
    pub vendor_id: Option<String>,
    /// USB product ID, 4 lowercase hex digits.
    pub product_id: Option<String>,
}

impl DeviceRecord {
    /// Record with only a path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Record with a path and the USB metadata gathered for it.
    pub fn with_usb(path: impl Into<String>, usb: UsbInfo) -> Self {
        Self {
            path: path.into(),
            manufacturer: usb.manufacturer,
            serial_number: usb.serial_number,
            pnp_id: None,
            location_id: usb.location_id,
            vendor_id: usb.vendor_id,
            product_id: usb.product_id,
        }
    }

    /// Whether any USB metadata is present.
    pub fn has_usb_info(&self) -> bool {
        self.vendor_id.is_some()
            || self.product_id.is_some()
            || self.location_id.is_some()
            || self.manufacturer.is_some()
            || self.serial_number.is_some()
    }
}

/// USB metadata read from a device's USB ancestor.
///
/// Every field is independently optional: string properties come from the
/// registry entry, the numeric IDs from one device interface query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsbInfo {
    /// Manufacturer string.
    pub manufacturer: Option<String>,
    /// Serial number string.
    pub serial_number: Option<String>,
    /// Location ID, formatted.
    pub location_id: Option<String>,
    /// Vendor ID, formatted.
    pub vendor_id: Option<String>,
    /// Product ID, formatted.
    pub product_id: Option<String>,
}

/// Format a USB location ID as 8 zero-padded lowercase hex digits.
pub fn format_location_id(location: u32) -> String {
    format!("{location:08x}")
}

/// Format a USB vendor or product ID as 4 zero-padded lowercase hex digits.
pub fn format_usb_id(id: u16) -> String {
    format!("{id:04x}")
}

/// Outcome of one enumeration as handed to a result sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumerationResult {
    /// Devices in discovery order.
    Devices(Vec<DeviceRecord>),
    /// Why the registry query failed.
    Failed(String),
}

impl EnumerationResult {
    /// Split into an `(error, devices)` pair with exactly one side populated.
    pub fn into_pair(self) -> (Option<String>, Option<Vec<DeviceRecord>>) {
        match self {
            Self::Devices(devices) => (None, Some(devices)),
            Self::Failed(message) => (Some(message), None),
        }
    }

    /// Whether this is a successful result.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Devices(_))
    }

    /// Convert into a standard result.
    pub fn into_result(self) -> std::result::Result<Vec<DeviceRecord>, String> {
        match self {
            Self::Devices(devices) => Ok(devices),
            Self::Failed(message) => Err(message),
        }
    }
}

impl From<crate::Result<Vec<DeviceRecord>>> for EnumerationResult {
    fn from(result: crate::Result<Vec<DeviceRecord>>) -> Self {
        match result {
            Ok(devices) => Self::Devices(devices),
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}

impl From<Error> for EnumerationResult {
    fn from(error: Error) -> Self {
        Self::Failed(error.to_string())
    }
}
