//! IOKit registry backend.
//!
//! Serial services are `IOSerialBSDClient` entries; their USB ancestors are
//! `IOUSBDevice` (or `IOUSBHostDevice`) entries in the service plane. The
//! numeric descriptor fields need a device interface obtained through a
//! CFPlugIn, the string fields are plain registry properties.

#![allow(unsafe_code)]

mod sys;

use {
    crate::{
        error::{Error, FieldError, Result},
        registry::{DeviceInterface, PlugIn, PropertyKey, Registry, Scope},
    },
    std::{
        ffi::{CStr, CString, c_char, c_void},
        ptr,
    },
    sys::{
        CFTypeRef, IO_OBJECT_NULL, IOCFPlugInInterface, IOUSBDeviceInterface, KERN_SUCCESS,
        MACH_PORT_NULL, io_iterator_t, io_name_t, io_object_t,
    },
};

/// The IOKit device registry of the running host.
#[derive(Debug, Clone, Copy, Default)]
pub struct IoKitRegistry;

impl IoKitRegistry {
    /// Registry handle using the default main port.
    pub fn new() -> Self {
        Self
    }
}

/// Owned `io_object_t`, released on drop.
#[derive(Debug)]
pub struct IoObject(io_object_t);

impl IoObject {
    fn from_raw(raw: io_object_t) -> Option<Self> {
        (raw != IO_OBJECT_NULL).then_some(Self(raw))
    }

    fn raw(&self) -> io_object_t {
        self.0
    }
}

impl Drop for IoObject {
    fn drop(&mut self) {
        if self.0 != IO_OBJECT_NULL {
            unsafe {
                sys::IOObjectRelease(self.0);
            }
        }
    }
}

/// Owned `io_iterator_t` yielding owned entries.
#[derive(Debug)]
pub struct IoIterator(IoObject);

impl Iterator for IoIterator {
    type Item = IoObject;

    fn next(&mut self) -> Option<IoObject> {
        if self.0.raw() == IO_OBJECT_NULL {
            return None;
        }
        IoObject::from_raw(unsafe { sys::IOIteratorNext(self.0.raw()) })
    }
}

/// Owned CoreFoundation object, released on drop.
struct CfObject(CFTypeRef);

impl CfObject {
    fn from_raw(raw: CFTypeRef) -> Option<Self> {
        (!raw.is_null()).then_some(Self(raw))
    }

    fn string(value: &CStr) -> Option<Self> {
        Self::from_raw(unsafe {
            sys::CFStringCreateWithCString(
                sys::kCFAllocatorDefault,
                value.as_ptr(),
                sys::kCFStringEncodingUTF8,
            )
        })
    }

    /// Copy out a CFString as UTF-8.
    fn to_text(&self, name: &'static str) -> std::result::Result<String, FieldError> {
        if unsafe { sys::CFGetTypeID(self.0) != sys::CFStringGetTypeID() } {
            return Err(FieldError::Conversion(name));
        }

        let capacity = unsafe {
            let length = sys::CFStringGetLength(self.0);
            sys::CFStringGetMaximumSizeForEncoding(length, sys::kCFStringEncodingUTF8) + 1
        };
        let mut buffer = vec![0u8; usize::try_from(capacity).map_err(|_| FieldError::Conversion(name))?];

        let converted = unsafe {
            sys::CFStringGetCString(
                self.0,
                buffer
                    .as_mut_ptr()
                    .cast::<c_char>(),
                capacity,
                sys::kCFStringEncodingUTF8,
            )
        };
        if converted == 0 {
            return Err(FieldError::Conversion(name));
        }

        CStr::from_bytes_until_nul(&buffer)
            .ok()
            .and_then(|s| s.to_str().ok())
            .map(str::to_string)
            .ok_or(FieldError::Conversion(name))
    }
}

impl Drop for CfObject {
    fn drop(&mut self) {
        unsafe { sys::CFRelease(self.0) }
    }
}

/// `IOCFPlugInInterface **`, released on drop.
pub struct IoPlugIn(*mut *mut IOCFPlugInInterface);

impl Drop for IoPlugIn {
    fn drop(&mut self) {
        unsafe {
            ((**self.0).Release)(self.0.cast::<c_void>());
        }
    }
}

impl PlugIn for IoPlugIn {
    type Interface = IoUsbDevice;

    fn query_device_interface(self) -> std::result::Result<IoUsbDevice, FieldError> {
        let mut device: *mut c_void = ptr::null_mut();
        let result = unsafe {
            ((**self.0).QueryInterface)(
                self.0.cast::<c_void>(),
                sys::kIOUSBDeviceInterfaceID,
                &mut device,
            )
        };
        drop(self);

        if result != 0 {
            return Err(FieldError::Call {
                call: "QueryInterface",
                code: result,
            });
        }
        if device.is_null() {
            return Err(FieldError::Missing("IOUSBDeviceInterface"));
        }
        Ok(IoUsbDevice(device.cast::<*mut IOUSBDeviceInterface>()))
    }
}

/// `IOUSBDeviceInterface **`, released on drop.
pub struct IoUsbDevice(*mut *mut IOUSBDeviceInterface);

impl IoUsbDevice {
    fn this(&self) -> *mut c_void {
        self.0.cast::<c_void>()
    }
}

impl Drop for IoUsbDevice {
    fn drop(&mut self) {
        unsafe {
            ((**self.0).Release)(self.this());
        }
    }
}

impl DeviceInterface for IoUsbDevice {
    fn location_id(&self) -> std::result::Result<u32, FieldError> {
        let mut location = 0u32;
        let code = unsafe { ((**self.0).GetLocationID)(self.this(), &mut location) };
        check("GetLocationID", code).map(|()| location)
    }

    fn vendor_id(&self) -> std::result::Result<u16, FieldError> {
        let mut vendor = 0u16;
        let code = unsafe { ((**self.0).GetDeviceVendor)(self.this(), &mut vendor) };
        check("GetDeviceVendor", code).map(|()| vendor)
    }

    fn product_id(&self) -> std::result::Result<u16, FieldError> {
        let mut product = 0u16;
        let code = unsafe { ((**self.0).GetDeviceProduct)(self.this(), &mut product) };
        check("GetDeviceProduct", code).map(|()| product)
    }
}

fn check(call: &'static str, code: i32) -> std::result::Result<(), FieldError> {
    if code == KERN_SUCCESS {
        Ok(())
    } else {
        Err(FieldError::Call { call, code })
    }
}

impl Registry for IoKitRegistry {
    type Service = IoObject;
    type Services = IoIterator;
    type Ancestors = IoIterator;
    type PlugIn = IoPlugIn;
    type Interface = IoUsbDevice;

    fn serial_services(&self) -> Result<IoIterator> {
        let matching = unsafe { sys::IOServiceMatching(sys::kIOSerialBSDServiceValue.as_ptr()) };
        if matching.is_null() {
            return Err(Error::Registry(
                "IOServiceMatching(IOSerialBSDClient) returned NULL".to_string(),
            ));
        }

        if let (Some(key), Some(value)) = (
            CfObject::string(sys::kIOSerialBSDTypeKey),
            CfObject::string(sys::kIOSerialBSDAllTypes),
        ) {
            unsafe { sys::CFDictionarySetValue(matching, key.0, value.0) };
        }

        // The matching dictionary is consumed by this call, on success or not.
        let mut iterator: io_iterator_t = IO_OBJECT_NULL;
        let code = unsafe {
            sys::IOServiceGetMatchingServices(MACH_PORT_NULL, matching.cast_const(), &mut iterator)
        };
        if code != KERN_SUCCESS {
            return Err(Error::registry_call("IOServiceGetMatchingServices", code));
        }

        Ok(IoIterator(IoObject(iterator)))
    }

    fn ancestors(&self, service: &IoObject) -> std::result::Result<IoIterator, FieldError> {
        let mut iterator: io_iterator_t = IO_OBJECT_NULL;
        let code = unsafe {
            sys::IORegistryEntryCreateIterator(
                service.raw(),
                sys::kIOServicePlane.as_ptr(),
                sys::kIORegistryIterateParents | sys::kIORegistryIterateRecursively,
                &mut iterator,
            )
        };
        check("IORegistryEntryCreateIterator", code)?;
        Ok(IoIterator(IoObject(iterator)))
    }

    fn is_usb_device(&self, service: &IoObject) -> bool {
        let mut name: io_name_t = [0; 128];
        let named = unsafe {
            sys::IORegistryEntryGetNameInPlane(
                service.raw(),
                sys::kIOServicePlane.as_ptr(),
                name.as_mut_ptr(),
            )
        };
        if named != KERN_SUCCESS {
            return false;
        }

        [sys::kIOUSBDeviceClassName, sys::kIOUSBHostDeviceClassName]
            .iter()
            .any(|class| unsafe { sys::IOObjectConformsTo(service.raw(), class.as_ptr()) != 0 })
    }

    fn string_property(
        &self,
        service: &IoObject,
        key: PropertyKey,
        scope: Scope,
    ) -> std::result::Result<String, FieldError> {
        let name = key.as_str();
        let cf_key = CString::new(name)
            .ok()
            .and_then(|k| CfObject::string(&k))
            .ok_or(FieldError::Missing(name))?;

        let raw = unsafe {
            match scope {
                Scope::Entry => {
                    sys::IORegistryEntryCreateCFProperty(service.raw(), cf_key.0, sys::kCFAllocatorDefault, 0)
                },
                Scope::Subtree => sys::IORegistryEntrySearchCFProperty(
                    service.raw(),
                    sys::kIOServicePlane.as_ptr(),
                    cf_key.0,
                    sys::kCFAllocatorDefault,
                    sys::kIORegistryIterateRecursively,
                ),
            }
        };

        CfObject::from_raw(raw)
            .ok_or(FieldError::Missing(name))?
            .to_text(name)
    }

    fn create_plugin(&self, service: &IoObject) -> std::result::Result<IoPlugIn, FieldError> {
        let mut plugin: *mut *mut IOCFPlugInInterface = ptr::null_mut();
        let mut score: sys::SInt32 = 0;
        let code = unsafe {
            sys::IOCreatePlugInInterfaceForService(
                service.raw(),
                sys::constant_uuid(sys::kIOUSBDeviceUserClientTypeID),
                sys::constant_uuid(sys::kIOCFPlugInInterfaceID),
                &mut plugin,
                &mut score,
            )
        };
        check("IOCreatePlugInInterfaceForService", code)?;

        if plugin.is_null() {
            return Err(FieldError::Missing("IOCFPlugInInterface"));
        }
        Ok(IoPlugIn(plugin))
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::discovery::build_device_list};

    #[test]
    fn test_iokit_enumeration_has_paths() {
        let devices = build_device_list(&IoKitRegistry::new()).unwrap();
        assert!(devices.iter().all(|d| !d.path.is_empty()));
        assert!(devices.iter().all(|d| d.pnp_id.is_none()));
    }

    #[test]
    fn test_iokit_usb_ids_are_formatted() {
        for device in build_device_list(&IoKitRegistry::new()).unwrap() {
            if let Some(vid) = &device.vendor_id {
                assert_eq!(vid.len(), 4);
                assert_eq!(vid, &vid.to_lowercase());
            }
            if let Some(location) = &device.location_id {
                assert_eq!(location.len(), 8);
            }
        }
    }

    #[test]
    fn test_conforms_to_returns_c_int() {
        let _conforms: unsafe extern "C" fn(io_object_t, *const c_char) -> sys::boolean_t = sys::IOObjectConformsTo;
        assert_eq!(std::mem::size_of::<sys::boolean_t>(), std::mem::size_of::<std::ffi::c_int>());
    }

    #[test]
    fn test_uuid_constants_are_distinct() {
        assert_ne!(sys::kIOUSBDeviceUserClientTypeID, sys::kIOCFPlugInInterfaceID);
        assert_ne!(sys::kIOUSBDeviceInterfaceID, sys::kIOCFPlugInInterfaceID);
    }
}
