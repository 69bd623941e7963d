//! Portable enumeration through the `serialport` crate.
//!
//! Used on hosts without an IOKit registry. The records keep the same shape
//! and formatting as the registry walk; `serialport` reports no physical
//! location, so `location_id` is always absent here.

use {
    crate::{
        discovery::Enumerator,
        error::{Error, Result},
        record::{DeviceRecord, UsbInfo, format_usb_id},
    },
    log::{debug, trace},
};

/// Enumerator backed by `serialport::available_ports()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortableEnumerator;

impl Enumerator for PortableEnumerator {
    fn enumerate(&self) -> Result<Vec<DeviceRecord>> {
        let ports = serialport::available_ports()
            .map_err(|e| Error::Registry(format!("serial port enumeration failed: {e}")))?;
        debug!("serialport reported {} port(s)", ports.len());

        Ok(ports
            .into_iter()
            .filter(|p| !p.port_name.is_empty())
            .map(record_from_port)
            .collect())
    }
}

fn record_from_port(port: serialport::SerialPortInfo) -> DeviceRecord {
    match port.port_type {
        serialport::SerialPortType::UsbPort(usb) => {
            trace!(
                "Found USB port: {} (VID: {:04X}, PID: {:04X})",
                port.port_name, usb.vid, usb.pid
            );
            DeviceRecord::with_usb(
                port.port_name,
                usb_metadata(usb.vid, usb.pid, usb.manufacturer, usb.serial_number),
            )
        },
        _ => DeviceRecord::new(port.port_name),
    }
}

fn usb_metadata(vid: u16, pid: u16, manufacturer: Option<String>, serial_number: Option<String>) -> UsbInfo {
    UsbInfo {
        manufacturer: manufacturer.filter(|m| !m.is_empty()),
        serial_number: serial_number.filter(|s| !s.is_empty()),
        location_id: None,
        vendor_id: Some(format_usb_id(vid)),
        product_id: Some(format_usb_id(pid)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_usb_port_has_path_only() {
        let record = record_from_port(serialport::SerialPortInfo {
            port_name: "/dev/ttyS0".to_string(),
            port_type: serialport::SerialPortType::Unknown,
        });
        assert_eq!(record, DeviceRecord::new("/dev/ttyS0"));
    }

    #[test]
    fn test_usb_metadata_formatting() {
        let info = usb_metadata(0x0403, 0x6001, Some("FTDI".to_string()), Some(String::new()));
        assert_eq!(info.vendor_id.as_deref(), Some("0403"));
        assert_eq!(info.product_id.as_deref(), Some("6001"));
        assert_eq!(info.manufacturer.as_deref(), Some("FTDI"));
        assert!(info.serial_number.is_none());
        assert!(info.location_id.is_none());
    }

    #[test]
    fn test_enumerate_does_not_panic() {
        let _ = PortableEnumerator.enumerate();
    }
}
