//! USB ancestor resolution and descriptor extraction.

use {
    crate::{
        error::FieldError,
        record::{UsbInfo, format_location_id, format_usb_id},
        registry::{DeviceInterface, PlugIn, PropertyKey, Registry, Scope},
    },
    log::trace,
    std::sync::{Mutex, MutexGuard, OnceLock, PoisonError},
};

/// Serializes plugin creation and device interface access process-wide.
static USB_INTERFACE_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Take the process-wide USB interface lock, creating it on first use.
pub(crate) fn lock_usb_interfaces() -> MutexGuard<'static, ()> {
    USB_INTERFACE_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Find the nearest ancestor of `service` that is a USB device.
///
/// Rejected ancestors are released as the walk passes them, and the
/// ancestor iterator is released on return.
pub fn resolve_usb_ancestor<R: Registry>(registry: &R, service: Option<&R::Service>) -> Option<R::Service> {
    let service = service?;

    let mut ancestors = match registry.ancestors(service) {
        Ok(ancestors) => ancestors,
        Err(e) => {
            trace!("Cannot walk ancestors: {e}");
            return None;
        },
    };

    ancestors.find(|ancestor| registry.is_usb_device(ancestor))
}

/// Read USB metadata from a resolved USB device entry.
///
/// Never fails: each field is read independently and left absent when its
/// read fails. The string properties are read first, straight from the
/// registry, so they survive a failure to open the device interface.
pub fn extract_usb_info<R: Registry>(registry: &R, usb_device: &R::Service) -> UsbInfo {
    let mut info = UsbInfo {
        manufacturer: absorb(
            "manufacturer",
            registry.string_property(usb_device, PropertyKey::UsbVendorName, Scope::Entry),
        )
        .filter(|m| !m.is_empty()),
        serial_number: absorb(
            "serial number",
            registry.string_property(usb_device, PropertyKey::UsbSerialNumber, Scope::Subtree),
        )
        .filter(|s| !s.is_empty()),
        ..Default::default()
    };

    let _guard = lock_usb_interfaces();

    let Some(plugin) = absorb("plugin interface", registry.create_plugin(usb_device)) else {
        return info;
    };
    let Some(interface) = absorb("device interface", plugin.query_device_interface()) else {
        return info;
    };

    info.location_id = absorb("location ID", interface.location_id()).map(format_location_id);
    info.vendor_id = absorb("vendor ID", interface.vendor_id()).map(format_usb_id);
    info.product_id = absorb("product ID", interface.product_id()).map(format_usb_id);

    info
}

/// Turn a field read into an optional value, logging failures.
fn absorb<T>(field: &str, result: Result<T, FieldError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            trace!("USB {field} unavailable: {e}");
            None
        },
    }
}
