//! In-memory registry for tests and snapshot replay.
//!
//! A [`Snapshot`] describes a tree of registry nodes: serial services, USB
//! devices, and anything in between. [`SimulatedRegistry`] serves that tree
//! through the [`Registry`] traits and keeps a ledger of every handle it
//! hands out, so callers can check that each one was released exactly once.
//!
//! ## Example
//!
//! ```rust
//! use ttyscan::registry::simulated::{SimInterface, SimNode, SimulatedRegistry, Snapshot};
//!
//! let snapshot = Snapshot::new()
//!     .node(SimNode::usb_device(1).property("USB Vendor Name", "FTDI").interface(
//!         SimInterface::new(0x14200000, 0x0403, 0x6001),
//!     ))
//!     .node(SimNode::serial(2, "/dev/tty.usbserial-B").parent(1));
//!
//! let registry = SimulatedRegistry::new(snapshot);
//! let devices = ttyscan::discovery::build_device_list(&registry).unwrap();
//! assert_eq!(devices[0].vendor_id.as_deref(), Some("0403"));
//! assert!(registry.all_released());
//! ```
//!
//! With the `serde` feature a snapshot can be loaded from a file:
//!
//! ```toml
//! [[nodes]]
//! id = 1
//! class = "usb-device"
//! properties = { "USB Vendor Name" = "FTDI", "USB Serial Number" = "A1B2C3" }
//! interface = { location_id = 337641472, vendor_id = 1027, product_id = 24577 }
//!
//! [[nodes]]
//! id = 2
//! parent = 1
//! class = "serial"
//! properties = { IODialinDevice = "/dev/tty.usbserial-B" }
//! ```

use {
    crate::{
        error::{Error, FieldError, Result},
        registry::{DeviceInterface, PlugIn, PropertyKey, Registry, Scope},
    },
    std::{
        collections::BTreeMap,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    },
};

/// Identifier of a node inside a snapshot.
pub type NodeId = u32;

/// `kIOReturnUnsupported`, reported for simulated call failures.
#[allow(clippy::cast_possible_wrap)]
const RETURN_UNSUPPORTED: i32 = 0xe000_02c7_u32 as i32;

/// `E_NOINTERFACE`, reported for a failing interface query.
#[allow(clippy::cast_possible_wrap)]
const E_NOINTERFACE: i32 = 0x8000_0004_u32 as i32;

/// Registry class of a simulated node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum NodeClass {
    /// Serial BSD service.
    Serial,
    /// USB device.
    UsbDevice,
    /// Anything else (bus controllers, interfaces, drivers).
    #[default]
    Other,
}

/// Device interface behaviour of a simulated USB node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimInterface {
    /// Location ID; `None` makes the getter fail.
    pub location_id: Option<u32>,
    /// Vendor ID; `None` makes the getter fail.
    pub vendor_id: Option<u16>,
    /// Product ID; `None` makes the getter fail.
    pub product_id: Option<u16>,
    /// Plugin creation fails.
    pub fail_plugin: bool,
    /// Plugin creation succeeds but the interface query fails.
    pub fail_query: bool,
}

impl SimInterface {
    /// Interface answering every getter.
    pub fn new(location_id: u32, vendor_id: u16, product_id: u16) -> Self {
        Self {
            location_id: Some(location_id),
            vendor_id: Some(vendor_id),
            product_id: Some(product_id),
            ..Default::default()
        }
    }

    /// Make plugin creation fail.
    #[must_use]
    pub fn failing_plugin(mut self) -> Self {
        self.fail_plugin = true;
        self
    }

    /// Make the interface query fail.
    #[must_use]
    pub fn failing_query(mut self) -> Self {
        self.fail_query = true;
        self
    }
}

/// One node of a simulated registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimNode {
    /// Node identifier, unique within the snapshot.
    pub id: NodeId,
    /// Parent node in the service plane.
    pub parent: Option<NodeId>,
    /// Registry class.
    pub class: NodeClass,
    /// Text properties.
    pub properties: BTreeMap<String, String>,
    /// Properties that exist but are not text.
    pub opaque_properties: Vec<String>,
    /// Device interface, for USB device nodes.
    pub interface: Option<SimInterface>,
}

impl SimNode {
    /// Serial service node with a dial-in path.
    pub fn serial(id: NodeId, path: &str) -> Self {
        Self::with_class(id, NodeClass::Serial).property(PropertyKey::DialinDevice.as_str(), path)
    }

    /// Serial service node without any path property.
    pub fn serial_without_path(id: NodeId) -> Self {
        Self::with_class(id, NodeClass::Serial)
    }

    /// USB device node.
    pub fn usb_device(id: NodeId) -> Self {
        Self::with_class(id, NodeClass::UsbDevice)
    }

    /// Intermediate node of no particular class.
    pub fn other(id: NodeId) -> Self {
        Self::with_class(id, NodeClass::Other)
    }

    fn with_class(id: NodeId, class: NodeClass) -> Self {
        Self {
            id,
            class,
            ..Default::default()
        }
    }

    /// Set the parent node.
    #[must_use]
    pub fn parent(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Add a text property.
    #[must_use]
    pub fn property(mut self, key: &str, value: &str) -> Self {
        self.properties
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Add a property that cannot be converted to text.
    #[must_use]
    pub fn opaque_property(mut self, key: &str) -> Self {
        self.opaque_properties
            .push(key.to_string());
        self
    }

    /// Attach a device interface.
    #[must_use]
    pub fn interface(mut self, interface: SimInterface) -> Self {
        self.interface = Some(interface);
        self
    }

    fn lookup(&self, key: PropertyKey) -> Option<std::result::Result<String, FieldError>> {
        let name = key.as_str();
        if let Some(value) = self.properties.get(name) {
            return Some(Ok(value.clone()));
        }
        self.opaque_properties
            .iter()
            .any(|k| k == name)
            .then_some(Err(FieldError::Conversion(name)))
    }
}

/// Contents of a simulated registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Snapshot {
    /// Reject the serial service query.
    pub fail_matching: bool,
    /// Nodes in registry iteration order.
    pub nodes: Vec<SimNode>,
}

impl Snapshot {
    /// Empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node.
    #[must_use]
    pub fn node(mut self, node: SimNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Make the serial service query fail.
    #[must_use]
    pub fn failing_matching(mut self) -> Self {
        self.fail_matching = true;
        self
    }

    fn index_of(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    fn children(&self, id: NodeId) -> impl Iterator<Item = &SimNode> {
        self.nodes
            .iter()
            .filter(move |n| n.parent == Some(id))
    }

    /// Depth-first, pre-order search starting at `node`.
    fn search(&self, node: &SimNode, key: PropertyKey, depth: usize) -> Option<std::result::Result<String, FieldError>> {
        if depth > self.nodes.len() {
            return None;
        }
        node.lookup(key).or_else(|| {
            self.children(node.id)
                .find_map(|child| self.search(child, key, depth + 1))
        })
    }
}

/// Kinds of handles tracked by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// Service or ancestor iterator.
    Iterator,
    /// Registry entry.
    Service,
    /// Plugin interface.
    PlugIn,
    /// Device interface.
    Interface,
}

impl HandleKind {
    const ALL: [Self; 4] = [Self::Iterator, Self::Service, Self::PlugIn, Self::Interface];

    fn index(self) -> usize {
        match self {
            Self::Iterator => 0,
            Self::Service => 1,
            Self::PlugIn => 2,
            Self::Interface => 3,
        }
    }
}

#[derive(Debug, Default)]
struct Ledger {
    acquired: [AtomicUsize; 4],
    released: [AtomicUsize; 4],
}

#[derive(Debug, Default)]
struct Probe {
    active: AtomicUsize,
    peak: AtomicUsize,
}

#[derive(Debug)]
struct Shared {
    snapshot: Snapshot,
    ledger: Ledger,
    probe: Probe,
    plugin_delay: Option<Duration>,
}

/// One reference counted by the ledger; released on drop.
#[derive(Debug)]
struct Token {
    shared: Arc<Shared>,
    kind: HandleKind,
}

impl Token {
    fn acquire(shared: &Arc<Shared>, kind: HandleKind) -> Self {
        shared.ledger.acquired[kind.index()].fetch_add(1, Ordering::SeqCst);
        Self {
            shared: Arc::clone(shared),
            kind,
        }
    }
}

impl Drop for Token {
    fn drop(&mut self) {
        self.shared.ledger.released[self.kind.index()].fetch_add(1, Ordering::SeqCst);
    }
}

/// Marks time spent between plugin creation and interface release.
#[derive(Debug)]
struct ProbeGuard {
    shared: Arc<Shared>,
}

impl ProbeGuard {
    fn enter(shared: &Arc<Shared>) -> Self {
        let now = shared.probe.active.fetch_add(1, Ordering::SeqCst) + 1;
        shared.probe.peak.fetch_max(now, Ordering::SeqCst);
        Self {
            shared: Arc::clone(shared),
        }
    }
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        self.shared.probe.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Registry backed by a [`Snapshot`].
#[derive(Debug, Clone)]
pub struct SimulatedRegistry {
    shared: Arc<Shared>,
}

impl SimulatedRegistry {
    /// Serve `snapshot`.
    pub fn new(snapshot: Snapshot) -> Self {
        Self::build(snapshot, None)
    }

    /// Serve `snapshot`, sleeping inside every plugin creation.
    pub fn with_plugin_delay(snapshot: Snapshot, delay: Duration) -> Self {
        Self::build(snapshot, Some(delay))
    }

    fn build(snapshot: Snapshot, plugin_delay: Option<Duration>) -> Self {
        Self {
            shared: Arc::new(Shared {
                snapshot,
                ledger: Ledger::default(),
                probe: Probe::default(),
                plugin_delay,
            }),
        }
    }

    /// The served snapshot.
    pub fn snapshot(&self) -> &Snapshot {
        &self.shared.snapshot
    }

    /// Handles of `kind` handed out so far.
    pub fn acquired(&self, kind: HandleKind) -> usize {
        self.shared.ledger.acquired[kind.index()].load(Ordering::SeqCst)
    }

    /// Handles of `kind` handed out but not yet released.
    pub fn outstanding(&self, kind: HandleKind) -> usize {
        let ledger = &self.shared.ledger;
        let acquired = ledger.acquired[kind.index()].load(Ordering::SeqCst);
        let released = ledger.released[kind.index()].load(Ordering::SeqCst);
        acquired.saturating_sub(released)
    }

    /// Whether every handle of every kind has been released.
    pub fn all_released(&self) -> bool {
        HandleKind::ALL
            .iter()
            .all(|kind| self.outstanding(*kind) == 0)
    }

    /// Largest number of plugin/interface sessions open at the same time.
    pub fn peak_interface_sessions(&self) -> usize {
        self.shared.probe.peak.load(Ordering::SeqCst)
    }

    fn node(&self, service: &SimService) -> &SimNode {
        &self.shared.snapshot.nodes[service.index]
    }
}

impl From<Snapshot> for SimulatedRegistry {
    fn from(snapshot: Snapshot) -> Self {
        Self::new(snapshot)
    }
}

/// Registry entry handle.
#[derive(Debug)]
pub struct SimService {
    index: usize,
    id: NodeId,
    _token: Token,
}

impl SimService {
    /// Node identifier of this entry.
    pub fn id(&self) -> NodeId {
        self.id
    }
}

/// Iterator handle over registry entries.
#[derive(Debug)]
pub struct SimIter {
    shared: Arc<Shared>,
    pending: std::vec::IntoIter<usize>,
    _token: Token,
}

impl SimIter {
    fn new(shared: &Arc<Shared>, pending: Vec<usize>) -> Self {
        Self {
            shared: Arc::clone(shared),
            pending: pending.into_iter(),
            _token: Token::acquire(shared, HandleKind::Iterator),
        }
    }
}

impl Iterator for SimIter {
    type Item = SimService;

    fn next(&mut self) -> Option<SimService> {
        let index = self.pending.next()?;
        Some(SimService {
            index,
            id: self.shared.snapshot.nodes[index].id,
            _token: Token::acquire(&self.shared, HandleKind::Service),
        })
    }
}

/// Plugin handle.
#[derive(Debug)]
pub struct SimPlugIn {
    shared: Arc<Shared>,
    interface: SimInterface,
    session: ProbeGuard,
    _token: Token,
}

impl PlugIn for SimPlugIn {
    type Interface = SimDeviceInterface;

    fn query_device_interface(self) -> std::result::Result<SimDeviceInterface, FieldError> {
        if self.interface.fail_query {
            return Err(FieldError::Call {
                call: "QueryInterface",
                code: E_NOINTERFACE,
            });
        }
        let token = Token::acquire(&self.shared, HandleKind::Interface);
        Ok(SimDeviceInterface {
            interface: self.interface,
            _session: self.session,
            _token: token,
        })
    }
}

/// Device interface handle.
#[derive(Debug)]
pub struct SimDeviceInterface {
    interface: SimInterface,
    _session: ProbeGuard,
    _token: Token,
}

fn getter<T>(value: Option<T>, call: &'static str) -> std::result::Result<T, FieldError> {
    value.ok_or(FieldError::Call {
        call,
        code: RETURN_UNSUPPORTED,
    })
}

impl DeviceInterface for SimDeviceInterface {
    fn location_id(&self) -> std::result::Result<u32, FieldError> {
        getter(self.interface.location_id, "GetLocationID")
    }

    fn vendor_id(&self) -> std::result::Result<u16, FieldError> {
        getter(self.interface.vendor_id, "GetDeviceVendor")
    }

    fn product_id(&self) -> std::result::Result<u16, FieldError> {
        getter(self.interface.product_id, "GetDeviceProduct")
    }
}

impl Registry for SimulatedRegistry {
    type Service = SimService;
    type Services = SimIter;
    type Ancestors = SimIter;
    type PlugIn = SimPlugIn;
    type Interface = SimDeviceInterface;

    fn serial_services(&self) -> Result<SimIter> {
        let snapshot = &self.shared.snapshot;
        if snapshot.fail_matching {
            return Err(Error::Registry(
                "simulated registry rejected the serial service query".to_string(),
            ));
        }
        let matches = snapshot
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.class == NodeClass::Serial)
            .map(|(i, _)| i)
            .collect();
        Ok(SimIter::new(&self.shared, matches))
    }

    fn ancestors(&self, service: &SimService) -> std::result::Result<SimIter, FieldError> {
        let snapshot = &self.shared.snapshot;
        let mut chain = Vec::new();
        let mut parent = self.node(service).parent;
        while let Some(index) = parent.and_then(|id| snapshot.index_of(id)) {
            if chain.contains(&index) || chain.len() >= snapshot.nodes.len() {
                break;
            }
            chain.push(index);
            parent = snapshot.nodes[index].parent;
        }
        Ok(SimIter::new(&self.shared, chain))
    }

    fn is_usb_device(&self, service: &SimService) -> bool {
        self.node(service).class == NodeClass::UsbDevice
    }

    fn string_property(
        &self,
        service: &SimService,
        key: PropertyKey,
        scope: Scope,
    ) -> std::result::Result<String, FieldError> {
        let node = self.node(service);
        let found = match scope {
            Scope::Entry => node.lookup(key),
            Scope::Subtree => self.shared.snapshot.search(node, key, 0),
        };
        found.unwrap_or(Err(FieldError::Missing(key.as_str())))
    }

    fn create_plugin(&self, service: &SimService) -> std::result::Result<SimPlugIn, FieldError> {
        let session = ProbeGuard::enter(&self.shared);
        if let Some(delay) = self.shared.plugin_delay {
            std::thread::sleep(delay);
        }
        match &self.node(service).interface {
            Some(interface) if !interface.fail_plugin => Ok(SimPlugIn {
                shared: Arc::clone(&self.shared),
                interface: interface.clone(),
                session,
                _token: Token::acquire(&self.shared, HandleKind::PlugIn),
            }),
            _ => Err(FieldError::Call {
                call: "IOCreatePlugInInterfaceForService",
                code: RETURN_UNSUPPORTED,
            }),
        }
    }
}
