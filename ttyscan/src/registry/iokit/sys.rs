//! Raw IOKit and CoreFoundation declarations.
//!
//! Only the handful of calls, constants, and COM vtable slots the registry
//! walk needs. Vtable slots that are never called are declared as opaque
//! pointers so the layout stays correct.

#![allow(non_camel_case_types, non_snake_case, non_upper_case_globals, dead_code)]

use std::ffi::{c_char, c_void};

pub type kern_return_t = i32;
pub type mach_port_t = u32;
pub type io_object_t = mach_port_t;
pub type io_iterator_t = io_object_t;
pub type io_service_t = io_object_t;
pub type io_registry_entry_t = io_object_t;
pub type IOOptionBits = u32;
pub type IOReturn = kern_return_t;
pub type HRESULT = i32;
pub type SInt32 = i32;
pub type ULONG = u32;

/// IOKit's `boolean_t` is a 32-bit `int`, unlike CoreFoundation's `Boolean`.
pub type boolean_t = i32;

/// `io_name_t` is `char[128]`.
pub type io_name_t = [c_char; 128];

pub const KERN_SUCCESS: kern_return_t = 0;
pub const MACH_PORT_NULL: mach_port_t = 0;
pub const IO_OBJECT_NULL: io_object_t = 0;

pub const kIORegistryIterateRecursively: IOOptionBits = 0x0000_0001;
pub const kIORegistryIterateParents: IOOptionBits = 0x0000_0002;

pub const kIOServicePlane: &std::ffi::CStr = c"IOService";
pub const kIOSerialBSDServiceValue: &std::ffi::CStr = c"IOSerialBSDClient";
pub const kIOSerialBSDTypeKey: &std::ffi::CStr = c"IOSerialBSDClientType";
pub const kIOSerialBSDAllTypes: &std::ffi::CStr = c"IOSerialStream";
pub const kIOUSBDeviceClassName: &std::ffi::CStr = c"IOUSBDevice";
pub const kIOUSBHostDeviceClassName: &std::ffi::CStr = c"IOUSBHostDevice";

pub type Boolean = u8;
pub type CFIndex = isize;
pub type CFTypeID = usize;
pub type CFStringEncoding = u32;
pub type CFTypeRef = *const c_void;
pub type CFStringRef = *const c_void;
pub type CFAllocatorRef = *const c_void;
pub type CFDictionaryRef = *const c_void;
pub type CFMutableDictionaryRef = *mut c_void;
pub type CFUUIDRef = *const c_void;

pub const kCFStringEncodingUTF8: CFStringEncoding = 0x0800_0100;

/// `CFUUIDBytes`, passed by value as `REFIID`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CFUUIDBytes {
    pub bytes: [u8; 16],
}

/// `kIOUSBDeviceUserClientTypeID`: 9dc7b780-9ec0-11d4-a54f-000a27052861.
pub const kIOUSBDeviceUserClientTypeID: CFUUIDBytes = CFUUIDBytes {
    bytes: [
        0x9d, 0xc7, 0xb7, 0x80, 0x9e, 0xc0, 0x11, 0xd4, 0xa5, 0x4f, 0x00, 0x0a, 0x27, 0x05, 0x28, 0x61,
    ],
};

/// `kIOCFPlugInInterfaceID`: c244e858-109c-11d4-91d4-0050e4c6426f.
pub const kIOCFPlugInInterfaceID: CFUUIDBytes = CFUUIDBytes {
    bytes: [
        0xc2, 0x44, 0xe8, 0x58, 0x10, 0x9c, 0x11, 0xd4, 0x91, 0xd4, 0x00, 0x50, 0xe4, 0xc6, 0x42, 0x6f,
    ],
};

/// `kIOUSBDeviceInterfaceID`: 5c8187d0-9ef3-11d4-8b45-000a27052861.
pub const kIOUSBDeviceInterfaceID: CFUUIDBytes = CFUUIDBytes {
    bytes: [
        0x5c, 0x81, 0x87, 0xd0, 0x9e, 0xf3, 0x11, 0xd4, 0x8b, 0x45, 0x00, 0x0a, 0x27, 0x05, 0x28, 0x61,
    ],
};

/// Leading slots of `IOCFPlugInInterface` (the `IUNKNOWN_C_GUTS`).
#[repr(C)]
pub struct IOCFPlugInInterface {
    pub _reserved: *mut c_void,
    pub QueryInterface: unsafe extern "C" fn(this: *mut c_void, iid: CFUUIDBytes, ppv: *mut *mut c_void) -> HRESULT,
    pub AddRef: unsafe extern "C" fn(this: *mut c_void) -> ULONG,
    pub Release: unsafe extern "C" fn(this: *mut c_void) -> ULONG,
}

/// Leading slots of `IOUSBDeviceInterface`, through `GetLocationID`.
#[repr(C)]
pub struct IOUSBDeviceInterface {
    pub _reserved: *mut c_void,
    pub QueryInterface: unsafe extern "C" fn(this: *mut c_void, iid: CFUUIDBytes, ppv: *mut *mut c_void) -> HRESULT,
    pub AddRef: unsafe extern "C" fn(this: *mut c_void) -> ULONG,
    pub Release: unsafe extern "C" fn(this: *mut c_void) -> ULONG,
    pub CreateDeviceAsyncEventSource: *const c_void,
    pub GetDeviceAsyncEventSource: *const c_void,
    pub CreateDeviceAsyncPort: *const c_void,
    pub GetDeviceAsyncPort: *const c_void,
    pub USBDeviceOpen: *const c_void,
    pub USBDeviceClose: *const c_void,
    pub GetDeviceClass: *const c_void,
    pub GetDeviceSubClass: *const c_void,
    pub GetDeviceProtocol: *const c_void,
    pub GetDeviceVendor: unsafe extern "C" fn(this: *mut c_void, vendor: *mut u16) -> IOReturn,
    pub GetDeviceProduct: unsafe extern "C" fn(this: *mut c_void, product: *mut u16) -> IOReturn,
    pub GetDeviceReleaseNumber: *const c_void,
    pub GetDeviceAddress: *const c_void,
    pub GetDeviceBusPowerAvailable: *const c_void,
    pub GetDeviceSpeed: *const c_void,
    pub GetNumberOfConfigurations: *const c_void,
    pub GetLocationID: unsafe extern "C" fn(this: *mut c_void, location: *mut u32) -> IOReturn,
}

#[link(name = "CoreFoundation", kind = "framework")]
unsafe extern "C" {
    pub static kCFAllocatorDefault: CFAllocatorRef;

    pub fn CFRelease(cf: CFTypeRef);
    pub fn CFGetTypeID(cf: CFTypeRef) -> CFTypeID;
    pub fn CFStringGetTypeID() -> CFTypeID;
    pub fn CFStringCreateWithCString(
        alloc: CFAllocatorRef,
        c_str: *const c_char,
        encoding: CFStringEncoding,
    ) -> CFStringRef;
    pub fn CFStringGetLength(string: CFStringRef) -> CFIndex;
    pub fn CFStringGetMaximumSizeForEncoding(length: CFIndex, encoding: CFStringEncoding) -> CFIndex;
    pub fn CFStringGetCString(
        string: CFStringRef,
        buffer: *mut c_char,
        buffer_size: CFIndex,
        encoding: CFStringEncoding,
    ) -> Boolean;
    pub fn CFDictionarySetValue(dict: CFMutableDictionaryRef, key: *const c_void, value: *const c_void);
    pub fn CFUUIDGetConstantUUIDWithBytes(
        alloc: CFAllocatorRef,
        byte0: u8,
        byte1: u8,
        byte2: u8,
        byte3: u8,
        byte4: u8,
        byte5: u8,
        byte6: u8,
        byte7: u8,
        byte8: u8,
        byte9: u8,
        byte10: u8,
        byte11: u8,
        byte12: u8,
        byte13: u8,
        byte14: u8,
        byte15: u8,
    ) -> CFUUIDRef;
}

#[link(name = "IOKit", kind = "framework")]
unsafe extern "C" {
    pub fn IOServiceMatching(name: *const c_char) -> CFMutableDictionaryRef;
    pub fn IOServiceGetMatchingServices(
        main_port: mach_port_t,
        matching: CFDictionaryRef,
        existing: *mut io_iterator_t,
    ) -> kern_return_t;
    pub fn IOIteratorNext(iterator: io_iterator_t) -> io_object_t;
    pub fn IOObjectRelease(object: io_object_t) -> kern_return_t;
    pub fn IOObjectConformsTo(object: io_object_t, class_name: *const c_char) -> boolean_t;
    pub fn IORegistryEntryCreateIterator(
        entry: io_registry_entry_t,
        plane: *const c_char,
        options: IOOptionBits,
        iterator: *mut io_iterator_t,
    ) -> kern_return_t;
    pub fn IORegistryEntryGetNameInPlane(
        entry: io_registry_entry_t,
        plane: *const c_char,
        name: *mut c_char,
    ) -> kern_return_t;
    pub fn IORegistryEntryCreateCFProperty(
        entry: io_registry_entry_t,
        key: CFStringRef,
        allocator: CFAllocatorRef,
        options: IOOptionBits,
    ) -> CFTypeRef;
    pub fn IORegistryEntrySearchCFProperty(
        entry: io_registry_entry_t,
        plane: *const c_char,
        key: CFStringRef,
        allocator: CFAllocatorRef,
        options: IOOptionBits,
    ) -> CFTypeRef;
    pub fn IOCreatePlugInInterfaceForService(
        service: io_service_t,
        plugin_type: CFUUIDRef,
        interface_type: CFUUIDRef,
        the_interface: *mut *mut *mut IOCFPlugInInterface,
        the_score: *mut SInt32,
    ) -> kern_return_t;
}

/// Constant `CFUUIDRef` for `bytes`. Constant UUIDs are never released.
///
/// # Safety
///
/// Calls into CoreFoundation.
pub unsafe fn constant_uuid(uuid: CFUUIDBytes) -> CFUUIDRef {
    let b = uuid.bytes;
    unsafe {
        CFUUIDGetConstantUUIDWithBytes(
            std::ptr::null(),
            b[0],
            b[1],
            b[2],
            b[3],
            b[4],
            b[5],
            b[6],
            b[7],
            b[8],
            b[9],
            b[10],
            b[11],
            b[12],
            b[13],
            b[14],
            b[15],
        )
    }
}
