//! `list` command: enumerate serial devices and print them.

use {
    crate::config::{FilterConfig, OutputFormat},
    anyhow::{Context, Result, bail},
    console::style,
    log::{debug, warn},
    std::sync::mpsc,
    ttyscan::{DeviceRecord, EnumerationResult, Enumerator, ThreadExecutor, format_usb_id, spawn_enumeration},
};

/// Parse a USB vendor ID given as hex, with or without a `0x` prefix.
///
/// Returns the ID in the same 4-digit lowercase form records use.
pub(crate) fn parse_vendor_id(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() {
        return Err("empty vendor ID".to_string());
    }
    u16::from_str_radix(digits, 16)
        .map(format_usb_id)
        .map_err(|_| format!("invalid USB vendor ID '{s}': expected up to 4 hex digits"))
}

/// Which devices `list` shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct DeviceFilter {
    usb_only: bool,
    vendor_ids: Vec<String>,
}

impl DeviceFilter {
    /// Filter from command-line values, falling back to the config file.
    ///
    /// `--vendor` values replace the configured list; `--usb-only` can only
    /// tighten the configured setting.
    pub fn resolve(usb_only: bool, vendor_ids: &[String], config: &FilterConfig) -> Self {
        let vendor_ids = if vendor_ids.is_empty() {
            config
                .vendor_ids
                .iter()
                .filter_map(|vid| match parse_vendor_id(vid) {
                    Ok(vid) => Some(vid),
                    Err(e) => {
                        warn!("Ignoring configured vendor ID: {e}");
                        None
                    },
                })
                .collect()
        } else {
            vendor_ids.to_vec()
        };

        Self {
            usb_only: usb_only || config.usb_only,
            vendor_ids,
        }
    }

    /// Whether `device` passes the filter.
    pub fn matches(&self, device: &DeviceRecord) -> bool {
        if self.usb_only && !device.has_usb_info() {
            return false;
        }
        if self.vendor_ids.is_empty() {
            return true;
        }
        device
            .vendor_id
            .as_ref()
            .is_some_and(|vid| self.vendor_ids.contains(vid))
    }
}

/// Resolved `list` options.
#[derive(Debug, Clone, Default)]
pub(crate) struct ListOptions {
    /// Output format.
    pub format: OutputFormat,
    /// Device filter.
    pub filter: DeviceFilter,
}

/// Run one enumeration on a worker thread and wait for its result.
///
/// Waits as long as the worker runs. The wait only ends without a result if
/// the worker dies before delivering.
fn enumerate_on_worker(enumerator: Box<dyn Enumerator + Send + Sync>) -> Result<EnumerationResult> {
    let (tx, rx) = mpsc::channel();
    spawn_enumeration(&ThreadExecutor, enumerator, move |result| {
        let _ = tx.send(result);
    });

    rx.recv()
        .context("Enumeration worker did not report a result")
}

/// List serial devices.
///
/// Returns `Ok(false)` when enumeration failed and the failure was already
/// reported as a JSON envelope.
pub(crate) fn cmd_list(enumerator: Box<dyn Enumerator + Send + Sync>, options: &ListOptions) -> Result<bool> {
    let devices = match enumerate_on_worker(enumerator)?.into_result() {
        Ok(devices) => devices,
        Err(message) => {
            if options.format == OutputFormat::Json {
                let output = serde_json::json!({
                    "ok": false,
                    "error": message,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
                return Ok(false);
            }
            bail!("Failed to enumerate serial devices: {message}");
        },
    };

    let total = devices.len();
    let devices: Vec<DeviceRecord> = devices
        .into_iter()
        .filter(|d| options.filter.matches(d))
        .collect();
    debug!("Showing {} of {} device(s)", devices.len(), total);

    match options.format {
        OutputFormat::Json => print_json(&devices)?,
        OutputFormat::Table => print_table(&devices),
    }
    Ok(true)
}

fn print_json(devices: &[DeviceRecord]) -> Result<()> {
    let output = serde_json::json!({
        "ok": true,
        "data": {
            "devices": devices,
        }
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

const ABSENT: &str = "-";

fn vid_pid(device: &DeviceRecord) -> String {
    match (&device.vendor_id, &device.product_id) {
        (None, None) => ABSENT.to_string(),
        (vid, pid) => format!(
            "{}:{}",
            vid.as_deref().unwrap_or("????"),
            pid.as_deref().unwrap_or("????")
        ),
    }
}

fn or_absent(value: Option<&String>) -> &str {
    value.map_or(ABSENT, String::as_str)
}

fn print_table(devices: &[DeviceRecord]) {
    if devices.is_empty() {
        eprintln!("{}", style("No serial devices found").dim());
        return;
    }

    let rows: Vec<[String; 5]> = devices
        .iter()
        .map(|d| {
            [
                d.path.clone(),
                vid_pid(d),
                or_absent(d.location_id.as_ref()).to_string(),
                or_absent(d.manufacturer.as_ref()).to_string(),
                or_absent(d.serial_number.as_ref()).to_string(),
            ]
        })
        .collect();

    let headers = ["PATH", "VID:PID", "LOCATION", "MANUFACTURER", "SERIAL"];
    let mut widths = headers.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let header = headers
        .iter()
        .zip(widths)
        .map(|(h, w)| format!("{h:<w$}"))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{}", style(header.trim_end()).bold());

    for row in rows {
        let [path, ids, location, manufacturer, serial] = row;
        let cells = [
            style(format!("{path:<w$}", w = widths[0])).green(),
            style(format!("{ids:<w$}", w = widths[1])).yellow(),
            style(format!("{location:<w$}", w = widths[2])),
            style(format!("{manufacturer:<w$}", w = widths[3])),
            style(format!("{serial:<w$}", w = widths[4])).dim(),
        ];
        let line = cells
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("  ");
        println!("{}", line.trim_end());
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        ttyscan::{
            RegistryEnumerator, SimulatedRegistry, Snapshot, UsbInfo,
            registry::simulated::{SimInterface, SimNode},
        },
    };

    fn usb_device(path: &str, vid: &str) -> DeviceRecord {
        DeviceRecord::with_usb(
            path,
            UsbInfo {
                vendor_id: Some(vid.to_string()),
                product_id: Some("6001".to_string()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_parse_vendor_id_forms() {
        assert_eq!(parse_vendor_id("0403").unwrap(), "0403");
        assert_eq!(parse_vendor_id("0x10C4").unwrap(), "10c4");
        assert_eq!(parse_vendor_id("0X1a86").unwrap(), "1a86");
        assert_eq!(parse_vendor_id("403").unwrap(), "0403");
        assert_eq!(parse_vendor_id(" 2341 ").unwrap(), "2341");
    }

    #[test]
    fn test_parse_vendor_id_rejects_invalid() {
        assert!(parse_vendor_id("").is_err());
        assert!(parse_vendor_id("0x").is_err());
        assert!(parse_vendor_id("zzzz").is_err());
        assert!(parse_vendor_id("10000").is_err());
    }

    #[test]
    fn test_default_filter_matches_everything() {
        let filter = DeviceFilter::default();
        assert!(filter.matches(&DeviceRecord::new("/dev/tty.Bluetooth-Incoming-Port")));
        assert!(filter.matches(&usb_device("/dev/tty.usbserial-1", "0403")));
    }

    #[test]
    fn test_usb_only_filter() {
        let filter = DeviceFilter::resolve(true, &[], &FilterConfig::default());
        assert!(!filter.matches(&DeviceRecord::new("/dev/tty.Bluetooth-Incoming-Port")));
        assert!(filter.matches(&usb_device("/dev/tty.usbserial-1", "0403")));
    }

    #[test]
    fn test_vendor_filter() {
        let filter = DeviceFilter::resolve(false, &["10c4".to_string()], &FilterConfig::default());
        assert!(filter.matches(&usb_device("/dev/tty.SLAB_USBtoUART", "10c4")));
        assert!(!filter.matches(&usb_device("/dev/tty.usbserial-1", "0403")));
        assert!(!filter.matches(&DeviceRecord::new("/dev/tty.debug-console")));
    }

    #[test]
    fn test_cli_vendors_replace_config_vendors() {
        let config = FilterConfig {
            usb_only: false,
            vendor_ids: vec!["0403".to_string()],
        };
        let filter = DeviceFilter::resolve(false, &["1a86".to_string()], &config);
        assert_eq!(filter.vendor_ids, vec!["1a86"]);
    }

    #[test]
    fn test_config_vendors_normalized_and_invalid_skipped() {
        let config = FilterConfig {
            usb_only: true,
            vendor_ids: vec!["0x0403".to_string(), "nope".to_string(), "10C4".to_string()],
        };
        let filter = DeviceFilter::resolve(false, &[], &config);
        assert!(filter.usb_only);
        assert_eq!(filter.vendor_ids, vec!["0403", "10c4"]);
    }

    #[test]
    fn test_vid_pid_column() {
        assert_eq!(vid_pid(&usb_device("/dev/a", "0403")), "0403:6001");
        assert_eq!(vid_pid(&DeviceRecord::new("/dev/b")), "-");

        let partial = DeviceRecord {
            vendor_id: Some("0403".to_string()),
            ..DeviceRecord::new("/dev/c")
        };
        assert_eq!(vid_pid(&partial), "0403:????");
    }

    #[test]
    fn test_enumerate_on_worker_delivers_devices() {
        let snapshot = Snapshot::new()
            .node(SimNode::usb_device(1).interface(SimInterface::new(0x14100000, 0x0403, 0x6015)))
            .node(SimNode::serial(2, "/dev/tty.usbserial-X").parent(1));
        let enumerator = Box::new(RegistryEnumerator::new(SimulatedRegistry::new(snapshot)));

        let devices = enumerate_on_worker(enumerator)
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].product_id.as_deref(), Some("6015"));
    }

    struct SlowEnumerator(std::time::Duration);

    impl Enumerator for SlowEnumerator {
        fn enumerate(&self) -> ttyscan::Result<Vec<DeviceRecord>> {
            std::thread::sleep(self.0);
            Ok(vec![DeviceRecord::new("/dev/tty.slow")])
        }
    }

    struct PanickingEnumerator;

    impl Enumerator for PanickingEnumerator {
        fn enumerate(&self) -> ttyscan::Result<Vec<DeviceRecord>> {
            panic!("backend crashed");
        }
    }

    #[test]
    fn test_enumerate_on_worker_waits_for_slow_backend() {
        let result = enumerate_on_worker(Box::new(SlowEnumerator(std::time::Duration::from_millis(200)))).unwrap();
        assert_eq!(result.into_result().unwrap(), vec![DeviceRecord::new("/dev/tty.slow")]);
    }

    #[test]
    fn test_enumerate_on_worker_reports_dead_worker() {
        let err = enumerate_on_worker(Box::new(PanickingEnumerator)).unwrap_err();
        assert!(err.to_string().contains("did not report a result"));
    }

    #[test]
    fn test_cmd_list_json_failure_reports_false() {
        let registry = SimulatedRegistry::new(Snapshot::new().failing_matching());
        let options = ListOptions {
            format: OutputFormat::Json,
            filter: DeviceFilter::default(),
        };
        assert!(!cmd_list(Box::new(RegistryEnumerator::new(registry)), &options).unwrap());
    }

    #[test]
    fn test_cmd_list_table_failure_is_error() {
        let registry = SimulatedRegistry::new(Snapshot::new().failing_matching());
        let err = cmd_list(Box::new(RegistryEnumerator::new(registry)), &ListOptions::default()).unwrap_err();
        assert!(err.to_string().contains("Failed to enumerate serial devices"));
    }
}
