//! # ttyscan
//!
//! A library for enumerating the serial devices attached to a host.
//!
//! Each device is reported with its path and, when it sits behind a USB
//! controller, the USB vendor ID, product ID, location ID, manufacturer, and
//! serial number. Every call is a fresh point-in-time snapshot: nothing is
//! cached and hot-plug events are not watched.
//!
//! ## Backends
//!
//! - **IOKit** (macOS): walks the IOKit registry from each serial BSD service
//!   up to its USB device and opens that device's interface for the numeric
//!   IDs.
//! - **Portable** (`native` feature, other platforms): the `serialport`
//!   crate's port list mapped to the same record shape.
//! - **Simulated**: an in-memory registry for tests and snapshot replay.
//!
//! ## Features
//!
//! - `native` (default): portable backend via `serialport`
//! - `serde`: serialization support for records and snapshots
//!
//! ## Example
//!
//! ```rust,no_run
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     for device in ttyscan::list_ports()? {
//!         println!(
//!             "{} {}:{}",
//!             device.path,
//!             device.vendor_id.as_deref().unwrap_or("----"),
//!             device.product_id.as_deref().unwrap_or("----"),
//!         );
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod discovery;
pub mod error;
pub mod record;
pub mod registry;
pub mod task;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use discovery::portable::PortableEnumerator;
#[cfg(target_os = "macos")]
pub use registry::iokit::IoKitRegistry;
pub use {
    discovery::{
        Enumerator, RegistryEnumerator, UnsupportedEnumerator, build_device_list, default_enumerator,
        extract_usb_info, find_serial_services, resolve_usb_ancestor,
    },
    error::{Error, FieldError, Result},
    record::{DeviceRecord, EnumerationResult, UsbInfo, format_location_id, format_usb_id},
    registry::{
        DeviceInterface, PlugIn, PropertyKey, Registry, Scope,
        simulated::{SimulatedRegistry, Snapshot},
    },
    task::{
        EnumerationTask, Executor, InlineExecutor, Job, ResultSink, ThreadExecutor, list_ports,
        list_ports_async, spawn_enumeration,
    },
};
