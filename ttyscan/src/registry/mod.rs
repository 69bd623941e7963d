//! Device registry abstraction.
//!
//! The discovery algorithm walks a hierarchical, OS-owned registry of
//! services. This module describes that registry as a set of traits so the
//! algorithm can run against IOKit on macOS or against an in-memory
//! [`simulated`] registry.
//!
//! ## Handle ownership
//!
//! Every associated handle type owns exactly one registry reference and
//! releases it when dropped. Code that holds a handle therefore cannot leak
//! it on an early return, and cannot release it twice.
//!
//! ```text
//! serial_services() ──> Services ──> Service ──ancestors()──> Ancestors ──> Service (USB)
//!                                                                           │
//!                                                   create_plugin() <───────┘
//!                                                        │
//!                                                     PlugIn ──query_device_interface()──> Interface
//! ```

#[cfg(target_os = "macos")]
pub mod iokit;
pub mod simulated;

use crate::error::{FieldError, Result};

/// Text properties read from registry entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// Callout/dial-in device path of a serial service.
    DialinDevice,
    /// Vendor (manufacturer) name of a USB device.
    UsbVendorName,
    /// Serial number of a USB device.
    UsbSerialNumber,
}

impl PropertyKey {
    /// Registry key string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DialinDevice => "IODialinDevice",
            Self::UsbVendorName => "USB Vendor Name",
            Self::UsbSerialNumber => "USB Serial Number",
        }
    }
}

/// Where a property lookup searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The entry itself only.
    Entry,
    /// The entry, then its children recursively in the service plane.
    Subtree,
}

/// A hierarchical device registry.
pub trait Registry {
    /// Owned reference to a registry entry, released on drop.
    type Service;
    /// Iterator over matched serial services, released on drop.
    type Services: Iterator<Item = Self::Service>;
    /// Iterator over a service's ancestors, released on drop.
    type Ancestors: Iterator<Item = Self::Service>;
    /// Plugin used to obtain a device interface, released on drop.
    type PlugIn: PlugIn<Interface = Self::Interface>;
    /// USB device interface, released on drop.
    type Interface: DeviceInterface;

    /// Submit the query matching every serial BSD service.
    fn serial_services(&self) -> Result<Self::Services>;

    /// Iterate the ancestors of `service` in the service plane, nearest first.
    fn ancestors(&self, service: &Self::Service) -> std::result::Result<Self::Ancestors, FieldError>;

    /// Whether `service` conforms to the USB device class.
    fn is_usb_device(&self, service: &Self::Service) -> bool;

    /// Read a text property of `service`.
    fn string_property(
        &self,
        service: &Self::Service,
        key: PropertyKey,
        scope: Scope,
    ) -> std::result::Result<String, FieldError>;

    /// Create a USB device user-client plugin for `service`.
    fn create_plugin(&self, service: &Self::Service) -> std::result::Result<Self::PlugIn, FieldError>;
}

/// Short-lived factory for a device interface.
pub trait PlugIn {
    /// Interface type produced by the query.
    type Interface: DeviceInterface;

    /// Query the USB device interface.
    ///
    /// Consumes the plugin: it is released as soon as the query returns,
    /// whatever the outcome.
    fn query_device_interface(self) -> std::result::Result<Self::Interface, FieldError>;
}

/// Typed handle answering USB descriptor queries.
pub trait DeviceInterface {
    /// Physical location ID.
    fn location_id(&self) -> std::result::Result<u32, FieldError>;

    /// USB vendor ID.
    fn vendor_id(&self) -> std::result::Result<u16, FieldError>;

    /// USB product ID.
    fn product_id(&self) -> std::result::Result<u16, FieldError>;
}
