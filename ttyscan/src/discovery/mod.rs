//! Serial device discovery.
//!
//! The core walk, generic over any [`Registry`]:
//!
//! 1. [`find_serial_services`] matches every serial BSD service.
//! 2. For each one with a dial-in path, [`usb::resolve_usb_ancestor`] finds
//!    the USB device it sits behind, if any.
//! 3. [`usb::extract_usb_info`] reads that device's identifying fields.
//! 4. [`build_device_list`] collects one [`DeviceRecord`] per path, in
//!    registry order.
//!
//! Only the matching query can fail. Anything that goes wrong for a single
//! device leaves the affected fields absent.

#[cfg(feature = "native")]
pub mod portable;
pub mod usb;

use {
    crate::{
        error::{Error, Result},
        record::DeviceRecord,
        registry::{PropertyKey, Registry, Scope},
    },
    log::{debug, trace},
};

pub use usb::{extract_usb_info, resolve_usb_ancestor};

/// Query the registry for all serial BSD services.
pub fn find_serial_services<R: Registry>(registry: &R) -> Result<R::Services> {
    debug!("Matching serial BSD services (all types)");
    registry.serial_services()
}

/// Enumerate serial devices with their USB metadata.
pub fn build_device_list<R: Registry>(registry: &R) -> Result<Vec<DeviceRecord>> {
    let services = find_serial_services(registry)?;
    let mut devices = Vec::new();

    for service in services {
        let path = match registry.string_property(&service, PropertyKey::DialinDevice, Scope::Subtree) {
            Ok(path) if !path.is_empty() => path,
            Ok(_) => {
                trace!("Skipping serial service with an empty path");
                continue;
            },
            Err(e) => {
                trace!("Skipping serial service: {e}");
                continue;
            },
        };

        let record = match resolve_usb_ancestor(registry, Some(&service)) {
            Some(usb_device) => DeviceRecord::with_usb(path, extract_usb_info(registry, &usb_device)),
            None => DeviceRecord::new(path),
        };

        debug!(
            "Found serial device: {} (VID: {}, PID: {}, location: {})",
            record.path,
            record.vendor_id.as_deref().unwrap_or("-"),
            record.product_id.as_deref().unwrap_or("-"),
            record.location_id.as_deref().unwrap_or("-"),
        );
        devices.push(record);
    }

    Ok(devices)
}

/// Source of a device list snapshot.
pub trait Enumerator {
    /// Produce the current device list.
    fn enumerate(&self) -> Result<Vec<DeviceRecord>>;
}

impl<T: Enumerator + ?Sized> Enumerator for Box<T> {
    fn enumerate(&self) -> Result<Vec<DeviceRecord>> {
        (**self).enumerate()
    }
}

/// Enumerator running [`build_device_list`] against a registry.
#[derive(Debug, Clone, Default)]
pub struct RegistryEnumerator<R> {
    registry: R,
}

impl<R: Registry> RegistryEnumerator<R> {
    /// Wrap `registry`.
    pub fn new(registry: R) -> Self {
        Self { registry }
    }

    /// The wrapped registry.
    pub fn registry(&self) -> &R {
        &self.registry
    }
}

impl<R: Registry> Enumerator for RegistryEnumerator<R> {
    fn enumerate(&self) -> Result<Vec<DeviceRecord>> {
        build_device_list(&self.registry)
    }
}

/// Enumerator for builds without any platform backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedEnumerator;

impl Enumerator for UnsupportedEnumerator {
    fn enumerate(&self) -> Result<Vec<DeviceRecord>> {
        Err(Error::Unsupported(
            "serial device enumeration is not available on this platform without the `native` feature"
                .to_string(),
        ))
    }
}

/// The platform's enumerator: IOKit on macOS, `serialport` elsewhere.
#[cfg(target_os = "macos")]
pub fn default_enumerator() -> Box<dyn Enumerator + Send + Sync> {
    Box::new(RegistryEnumerator::new(crate::registry::iokit::IoKitRegistry::new()))
}

/// The platform's enumerator: IOKit on macOS, `serialport` elsewhere.
#[cfg(all(not(target_os = "macos"), feature = "native"))]
pub fn default_enumerator() -> Box<dyn Enumerator + Send + Sync> {
    Box::new(portable::PortableEnumerator)
}

/// The platform's enumerator: IOKit on macOS, `serialport` elsewhere.
#[cfg(all(not(target_os = "macos"), not(feature = "native")))]
pub fn default_enumerator() -> Box<dyn Enumerator + Send + Sync> {
    Box::new(UnsupportedEnumerator)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::registry::simulated::{HandleKind, SimInterface, SimNode, SimulatedRegistry, Snapshot},
    };

    fn init_logging() {
        let _ = env_logger::builder()
            .is_test(true)
            .filter_level(log::LevelFilter::Trace)
            .try_init();
    }

    fn ftdi_snapshot(path: &str) -> Snapshot {
        Snapshot::new()
            .node(
                SimNode::usb_device(10)
                    .property("USB Vendor Name", "FTDI")
                    .property("USB Serial Number", "A1B2C3")
                    .interface(SimInterface::new(0x14200000, 0x0403, 0x6001)),
            )
            .node(SimNode::other(11).parent(10))
            .node(SimNode::serial(12, path).parent(11))
    }

    #[test]
    fn test_scenario_no_usb_ancestor() {
        init_logging();
        let registry = SimulatedRegistry::new(
            Snapshot::new()
                .node(SimNode::other(1))
                .node(SimNode::serial(2, "/dev/tty.usbserial-A").parent(1)),
        );
        let devices = build_device_list(&registry).unwrap();
        assert_eq!(devices, vec![DeviceRecord::new("/dev/tty.usbserial-A")]);
        assert!(registry.all_released());
    }

    #[test]
    fn test_scenario_full_usb_info() {
        init_logging();
        let registry = SimulatedRegistry::new(ftdi_snapshot("/dev/tty.usbserial-B"));
        let devices = build_device_list(&registry).unwrap();
        assert_eq!(
            devices,
            vec![DeviceRecord {
                path: "/dev/tty.usbserial-B".to_string(),
                manufacturer: Some("FTDI".to_string()),
                serial_number: Some("A1B2C3".to_string()),
                pnp_id: None,
                location_id: Some("14200000".to_string()),
                vendor_id: Some("0403".to_string()),
                product_id: Some("6001".to_string()),
            }]
        );
        assert!(registry.all_released());
    }

    #[test]
    fn test_scenario_registry_failure() {
        init_logging();
        let registry = SimulatedRegistry::new(ftdi_snapshot("/dev/tty.usbserial-C").failing_matching());
        let err = build_device_list(&registry).unwrap_err();
        assert!(matches!(err, Error::Registry(_)));
        assert!(registry.all_released());
    }

    #[test]
    fn test_scenario_first_interface_fails() {
        init_logging();
        let registry = SimulatedRegistry::new(
            Snapshot::new()
                .node(
                    SimNode::usb_device(1)
                        .property("USB Vendor Name", "Silicon Labs")
                        .property("USB Serial Number", "0001")
                        .interface(SimInterface::new(0x14100000, 0x10c4, 0xea60).failing_plugin()),
                )
                .node(SimNode::serial(2, "/dev/tty.SLAB_USBtoUART").parent(1))
                .node(
                    SimNode::usb_device(3)
                        .property("USB Vendor Name", "FTDI")
                        .property("USB Serial Number", "A1B2C3")
                        .interface(SimInterface::new(0x14200000, 0x0403, 0x6001)),
                )
                .node(SimNode::serial(4, "/dev/tty.usbserial-D").parent(3)),
        );
        let devices = build_device_list(&registry).unwrap();
        assert_eq!(devices.len(), 2);

        let first = &devices[0];
        assert_eq!(first.path, "/dev/tty.SLAB_USBtoUART");
        assert_eq!(first.manufacturer.as_deref(), Some("Silicon Labs"));
        assert_eq!(first.serial_number.as_deref(), Some("0001"));
        assert!(first.vendor_id.is_none());
        assert!(first.product_id.is_none());
        assert!(first.location_id.is_none());

        let second = &devices[1];
        assert_eq!(second.path, "/dev/tty.usbserial-D");
        assert_eq!(second.vendor_id.as_deref(), Some("0403"));
        assert_eq!(second.product_id.as_deref(), Some("6001"));
        assert_eq!(second.location_id.as_deref(), Some("14200000"));

        // The failed plugin path must not leak the USB ancestor.
        assert!(registry.all_released());
    }

    #[test]
    fn test_services_without_path_are_skipped() {
        init_logging();
        let registry = SimulatedRegistry::new(
            Snapshot::new()
                .node(SimNode::serial_without_path(1))
                .node(SimNode::serial(2, ""))
                .node(SimNode::serial_without_path(3).opaque_property("IODialinDevice"))
                .node(SimNode::serial(4, "/dev/tty.debug-console")),
        );
        let devices = build_device_list(&registry).unwrap();
        assert_eq!(devices, vec![DeviceRecord::new("/dev/tty.debug-console")]);
        assert_eq!(registry.acquired(HandleKind::Service), 4);
        assert!(registry.all_released());
    }

    #[test]
    fn test_path_found_in_child_entry() {
        let registry = SimulatedRegistry::new(
            Snapshot::new()
                .node(SimNode::serial_without_path(1))
                .node(SimNode::other(2).parent(1).property("IODialinDevice", "/dev/tty.modem")),
        );
        let devices = build_device_list(&registry).unwrap();
        assert_eq!(devices, vec![DeviceRecord::new("/dev/tty.modem")]);
    }

    #[test]
    fn test_order_follows_registry() {
        let registry = SimulatedRegistry::new(
            Snapshot::new()
                .node(SimNode::serial(1, "/dev/tty.zeta"))
                .node(SimNode::serial(2, "/dev/tty.alpha"))
                .node(SimNode::serial(3, "/dev/tty.mu")),
        );
        let paths: Vec<String> = build_device_list(&registry)
            .unwrap()
            .into_iter()
            .map(|d| d.path)
            .collect();
        assert_eq!(paths, ["/dev/tty.zeta", "/dev/tty.alpha", "/dev/tty.mu"]);
    }

    #[test]
    fn test_enumeration_is_idempotent() {
        let enumerator = RegistryEnumerator::new(SimulatedRegistry::new(ftdi_snapshot("/dev/tty.usbserial-E")));
        let first = enumerator.enumerate().unwrap();
        let second = enumerator.enumerate().unwrap();
        assert_eq!(first, second);
        assert!(enumerator.registry().all_released());
    }

    #[test]
    fn test_vendor_and_product_set_together() {
        let registry = SimulatedRegistry::new(
            Snapshot::new()
                .node(SimNode::usb_device(1).interface(SimInterface::new(1, 0x1a86, 0x7523).failing_query()))
                .node(SimNode::serial(2, "/dev/tty.wchusbserial1"))
                .node(SimNode::serial(3, "/dev/tty.wchusbserial2").parent(1)),
        );
        for device in build_device_list(&registry).unwrap() {
            assert!(!device.path.is_empty());
            assert_eq!(device.vendor_id.is_some(), device.product_id.is_some());
            assert!(device.pnp_id.is_none());
        }
    }

    #[test]
    fn test_unsupported_enumerator() {
        assert!(matches!(
            UnsupportedEnumerator.enumerate(),
            Err(Error::Unsupported(_))
        ));
    }
}
