// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `usb:` scheme for USB printer-class devices.
//
// Discovery walks every device -> configuration -> interface -> alternate
// setting looking for printer class (7), subclass 1, protocol 1
// (unidirectional) or 2 (bidirectional), preferring the highest protocol
// that has a bulk OUT endpoint.  Device URIs take the form
// `usb://{manufacturer}/{model}?serial={serial}`.
//
// Bus access goes through `UsbBus` so the matching logic works on plain
// descriptor data.  The `nusb` backend is behind the `usb` feature.

#[cfg(feature = "usb")]
mod nusb_bus;

use std::io;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use druckwerk_core::error::{DruckwerkError, Result};
use druckwerk_core::types::PrinterReasons;

use crate::connection::{
    Connection, IdQueryable, OpenContext, Readable, StatusQueryable, Writable,
};
use crate::registry::{DeviceListing, DeviceScheme, DeviceType};
use crate::uri::{DeviceUri, percent_encode};

pub const PRINTER_CLASS: u8 = 7;
pub const PRINTER_SUBCLASS: u8 = 1;
pub const PROTOCOL_UNIDIRECTIONAL: u8 = 1;
pub const PROTOCOL_BIDIRECTIONAL: u8 = 2;

/// Printer-class request: GET_DEVICE_ID.
pub const REQUEST_GET_DEVICE_ID: u8 = 0;
/// Printer-class request: GET_PORT_STATUS.
pub const REQUEST_GET_PORT_STATUS: u8 = 1;

// ---------------------------------------------------------------------------
// Descriptor model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndpointDirection {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferType {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbEndpoint {
    pub address: u8,
    pub direction: EndpointDirection,
    pub transfer: TransferType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbAltSetting {
    pub alt_setting: u8,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    pub endpoints: Vec<UsbEndpoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbInterface {
    pub number: u8,
    pub alt_settings: Vec<UsbAltSetting>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbConfiguration {
    pub value: u8,
    pub interfaces: Vec<UsbInterface>,
}

/// Everything discovery needs to know about one attached device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbDeviceInfo {
    pub bus: u8,
    pub address: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    /// Serial number descriptor contents as read from the device.
    pub serial: Option<Vec<u8>>,
    pub configurations: Vec<UsbConfiguration>,
}

/// The printer interface chosen on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrinterInterface {
    pub configuration: u8,
    pub interface: u8,
    pub alt_setting: u8,
    pub protocol: u8,
    pub write_endpoint: u8,
    /// Present only for bidirectional interfaces.
    pub read_endpoint: Option<u8>,
}

/// Best printer-class interface on `dev`, if any.
pub fn find_printer_interface(dev: &UsbDeviceInfo) -> Option<PrinterInterface> {
    let mut best: Option<PrinterInterface> = None;

    for config in &dev.configurations {
        for iface in &config.interfaces {
            for alt in &iface.alt_settings {
                if alt.class != PRINTER_CLASS
                    || alt.subclass != PRINTER_SUBCLASS
                    || !matches!(alt.protocol, PROTOCOL_UNIDIRECTIONAL | PROTOCOL_BIDIRECTIONAL)
                {
                    continue;
                }
                if best.is_some_and(|b| b.protocol >= alt.protocol) {
                    continue;
                }

                let bulk = |dir: EndpointDirection| {
                    alt.endpoints
                        .iter()
                        .find(|ep| ep.transfer == TransferType::Bulk && ep.direction == dir)
                        .map(|ep| ep.address)
                };
                let Some(write_endpoint) = bulk(EndpointDirection::Out) else {
                    continue;
                };
                let read_endpoint = if alt.protocol == PROTOCOL_BIDIRECTIONAL {
                    bulk(EndpointDirection::In)
                } else {
                    None
                };

                best = Some(PrinterInterface {
                    configuration: config.value,
                    interface: iface.number,
                    alt_setting: alt.alt_setting,
                    protocol: alt.protocol,
                    write_endpoint,
                    read_endpoint,
                });
            }
        }
    }
    best
}

/// Serial string for URIs.
///
/// Printable ASCII is used as is; other non-empty descriptors are
/// hex-encoded; with no serial at all, "configuration.interface".
pub fn normalize_serial(raw: Option<&[u8]>, iface: &PrinterInterface) -> String {
    match raw {
        Some(bytes) if !bytes.is_empty() => {
            if bytes.iter().all(|b| (0x20..0x7f).contains(b)) {
                String::from_utf8_lossy(bytes).into_owned()
            } else {
                hex::encode_upper(bytes)
            }
        }
        _ => format!("{}.{}", iface.configuration, iface.interface),
    }
}

/// Decode a GET_DEVICE_ID response (2-byte big-endian length, then text).
pub fn parse_device_id_response(buf: &[u8]) -> Option<String> {
    if buf.len() < 2 {
        return None;
    }
    let declared = u16::from_be_bytes([buf[0], buf[1]]) as usize;
    let end = declared.clamp(2, buf.len());
    let text = String::from_utf8_lossy(&buf[2..end]).trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// Look up a key in an IEEE-1284 device ID (`KEY:value;KEY:value;`).
pub fn device_id_value<'a>(device_id: &'a str, keys: &[&str]) -> Option<&'a str> {
    device_id.split(';').find_map(|pair| {
        let (key, value) = pair.split_once(':')?;
        let key = key.trim();
        keys.iter()
            .any(|k| key.eq_ignore_ascii_case(k))
            .then(|| value.trim())
            .filter(|v| !v.is_empty())
    })
}

/// Keep a usable device ID or build one from the descriptor strings.
pub fn ensure_device_id(raw: Option<&str>, dev: &UsbDeviceInfo, serial: &str) -> String {
    if let Some(id) = raw {
        let has_mfg = device_id_value(id, &["MFG", "MANUFACTURER"]).is_some();
        let has_mdl = device_id_value(id, &["MDL", "MODEL"]).is_some();
        if has_mfg && has_mdl {
            return id.to_string();
        }
    }

    let mfg = dev.manufacturer.as_deref().unwrap_or("Unknown");
    let mdl = dev.product.as_deref().unwrap_or("Printer");
    let mut id = format!("MFG:{mfg};MDL:{mdl};SN:{serial};");
    if let Some(cmd) = raw.and_then(|r| device_id_value(r, &["CMD", "COMMAND SET"])) {
        id.push_str(&format!("CMD:{cmd};"));
    }
    id
}

/// Map a GET_PORT_STATUS byte to state reasons.
pub fn port_status_reasons(status: u8) -> PrinterReasons {
    let mut reasons = PrinterReasons::empty();
    if status & 0x20 != 0 {
        reasons |= PrinterReasons::MEDIA_EMPTY;
    }
    if status & 0x10 == 0 {
        reasons |= PrinterReasons::OFFLINE;
    }
    if status & 0x08 == 0 {
        reasons |= PrinterReasons::OTHER;
    }
    reasons
}

fn make_uri(device_id: &str, serial: &str) -> String {
    let mfg = device_id_value(device_id, &["MFG", "MANUFACTURER"]).unwrap_or("Unknown");
    let mdl = device_id_value(device_id, &["MDL", "MODEL"]).unwrap_or("Printer");
    format!(
        "usb://{}/{}?serial={}",
        percent_encode(mfg),
        percent_encode(mdl),
        percent_encode(serial)
    )
}

// ---------------------------------------------------------------------------
// Bus abstraction
// ---------------------------------------------------------------------------

/// Access to the host's USB devices.
pub trait UsbBus: Send + Sync {
    fn devices(&self) -> Result<Vec<UsbDeviceInfo>>;

    /// Claim `iface` on `dev` for exclusive use.
    fn open(&self, dev: &UsbDeviceInfo, iface: &PrinterInterface) -> Result<Box<dyn UsbHandle>>;
}

/// A claimed printer interface.
pub trait UsbHandle: Send {
    fn bulk_out(&mut self, data: &[u8]) -> io::Result<usize>;

    fn bulk_in(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Class-specific, interface-recipient IN control request.
    fn control_in(&mut self, request: u8, value: u16, index: u16, buf: &mut [u8])
    -> io::Result<usize>;

    /// Release the interface. Called exactly once.
    fn release(&mut self);
}

/// Bus used when the crate is built without USB support.
#[derive(Debug, Default)]
pub struct NoUsbBus;

impl UsbBus for NoUsbBus {
    fn devices(&self) -> Result<Vec<UsbDeviceInfo>> {
        Ok(Vec::new())
    }

    fn open(&self, _dev: &UsbDeviceInfo, _iface: &PrinterInterface) -> Result<Box<dyn UsbHandle>> {
        Err(DruckwerkError::UnsupportedScheme(
            "usb (built without USB support)".into(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Scheme
// ---------------------------------------------------------------------------

/// A printer found on the bus.
#[derive(Debug, Clone)]
pub struct UsbPrinter {
    pub info: UsbDeviceInfo,
    pub interface: PrinterInterface,
    pub serial: String,
    pub device_id: String,
    pub uri: String,
}

/// The built-in `usb:` scheme.
#[derive(Clone)]
pub struct UsbScheme {
    bus: Arc<dyn UsbBus>,
}

impl UsbScheme {
    pub fn new(bus: Arc<dyn UsbBus>) -> Self {
        Self { bus }
    }

    /// Scheme bound to the host bus (or an empty bus without the `usb` feature).
    pub fn system() -> Self {
        #[cfg(feature = "usb")]
        {
            Self::new(Arc::new(nusb_bus::NusbBus))
        }
        #[cfg(not(feature = "usb"))]
        {
            Self::new(Arc::new(NoUsbBus))
        }
    }

    /// Every printer-class device currently attached.
    pub fn printers(&self) -> Result<Vec<UsbPrinter>> {
        let mut found = Vec::new();
        for info in self.bus.devices()? {
            let Some(interface) = find_printer_interface(&info) else {
                continue;
            };
            let serial = normalize_serial(info.serial.as_deref(), &interface);

            // Reading the ID needs the interface; a busy device still gets listed.
            let raw_id = match self.bus.open(&info, &interface) {
                Ok(handle) => {
                    let mut guard = HandleGuard::new(handle);
                    read_device_id(guard.handle()?, &interface).ok().flatten()
                }
                Err(e) => {
                    debug!(bus = info.bus, address = info.address, error = %e, "USB printer busy");
                    None
                }
            };
            let device_id = ensure_device_id(raw_id.as_deref(), &info, &serial);
            let uri = make_uri(&device_id, &serial);

            found.push(UsbPrinter {
                info,
                interface,
                serial,
                device_id,
                uri,
            });
        }
        Ok(found)
    }
}

impl std::fmt::Debug for UsbScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsbScheme").finish_non_exhaustive()
    }
}

impl DeviceScheme for UsbScheme {
    fn open(&self, uri: &DeviceUri, _ctx: &OpenContext<'_>) -> Result<Box<dyn Connection>> {
        let wanted_serial = uri.option("serial");
        let printer = self
            .printers()?
            .into_iter()
            .find(|p| match DeviceUri::parse(&p.uri) {
                Ok(candidate) => {
                    candidate.host() == uri.host()
                        && candidate.resource() == uri.resource()
                        && wanted_serial.is_none_or(|s| candidate.option("serial") == Some(s))
                }
                Err(_) => false,
            })
            .ok_or_else(|| DruckwerkError::DeviceOpen {
                uri: uri.to_string(),
                reason: "no matching USB printer attached".into(),
            })?;

        let handle = self.bus.open(&printer.info, &printer.interface)?;
        debug!(uri = %printer.uri, protocol = printer.interface.protocol, "USB printer opened");
        Ok(Box::new(UsbConnection {
            guard: HandleGuard::new(handle),
            interface: printer.interface,
            device_id: printer.device_id,
        }))
    }

    fn list(&self) -> Result<Vec<DeviceListing>> {
        Ok(self
            .printers()?
            .into_iter()
            .map(|p| {
                let info = match (&p.info.manufacturer, &p.info.product) {
                    (Some(m), Some(d)) => format!("{m} {d} (USB)"),
                    (_, Some(d)) => format!("{d} (USB)"),
                    _ => format!("USB printer {:04x}:{:04x}", p.info.vendor_id, p.info.product_id),
                };
                DeviceListing {
                    info,
                    uri: p.uri,
                    device_id: Some(p.device_id),
                    device_type: DeviceType::Local,
                }
            })
            .collect())
    }
}

fn read_device_id(handle: &mut dyn UsbHandle, iface: &PrinterInterface) -> io::Result<Option<String>> {
    let mut buf = [0u8; 1024];
    let index = (u16::from(iface.interface) << 8) | u16::from(iface.alt_setting);
    let count = handle.control_in(
        REQUEST_GET_DEVICE_ID,
        u16::from(iface.configuration),
        index,
        &mut buf,
    )?;
    Ok(parse_device_id_response(&buf[..count]))
}

/// Owns a claimed interface; releases it exactly once.
struct HandleGuard {
    handle: Option<Box<dyn UsbHandle>>,
}

impl HandleGuard {
    fn new(handle: Box<dyn UsbHandle>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    fn handle(&mut self) -> io::Result<&mut dyn UsbHandle> {
        match self.handle.as_deref_mut() {
            Some(handle) => Ok(handle),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "USB interface released")),
        }
    }

    fn release(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.release();
        }
    }
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.release();
    }
}

struct UsbConnection {
    guard: HandleGuard,
    interface: PrinterInterface,
    device_id: String,
}

impl Writable for UsbConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.guard.handle()?.bulk_out(buf)
    }
}

impl Readable for UsbConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.guard.handle()?.bulk_in(buf)
    }
}

impl StatusQueryable for UsbConnection {
    fn status(&mut self) -> Result<PrinterReasons> {
        let mut status = [0u8; 1];
        let count = self
            .guard
            .handle()?
            .control_in(
                REQUEST_GET_PORT_STATUS,
                0,
                u16::from(self.interface.interface) << 8,
                &mut status,
            )?;
        if count == 0 {
            warn!("empty USB port status");
            return Ok(PrinterReasons::empty());
        }
        Ok(port_status_reasons(status[0]))
    }
}

impl IdQueryable for UsbConnection {
    fn device_id(&mut self) -> Result<String> {
        let fresh = read_device_id(self.guard.handle()?, &self.interface)?;
        if let Some(id) = fresh {
            self.device_id = id;
        }
        Ok(self.device_id.clone())
    }
}

impl Connection for UsbConnection {
    fn readable(&mut self) -> Option<&mut dyn Readable> {
        if self.interface.read_endpoint.is_some() {
            Some(self)
        } else {
            None
        }
    }

    fn status_query(&mut self) -> Option<&mut dyn StatusQueryable> {
        Some(self)
    }

    fn id_query(&mut self) -> Option<&mut dyn IdQueryable> {
        Some(self)
    }

    fn close(&mut self) -> io::Result<()> {
        self.guard.release();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn bulk(address: u8, direction: EndpointDirection) -> UsbEndpoint {
        UsbEndpoint {
            address,
            direction,
            transfer: TransferType::Bulk,
        }
    }

    fn alt(alt_setting: u8, protocol: u8, endpoints: Vec<UsbEndpoint>) -> UsbAltSetting {
        UsbAltSetting {
            alt_setting,
            class: PRINTER_CLASS,
            subclass: PRINTER_SUBCLASS,
            protocol,
            endpoints,
        }
    }

    fn device(alts: Vec<UsbAltSetting>, serial: Option<&[u8]>) -> UsbDeviceInfo {
        UsbDeviceInfo {
            bus: 1,
            address: 4,
            vendor_id: 0x04b8,
            product_id: 0x0202,
            manufacturer: Some("Acme".into()),
            product: Some("LabelJet 400".into()),
            serial: serial.map(<[u8]>::to_vec),
            configurations: vec![UsbConfiguration {
                value: 1,
                interfaces: vec![UsbInterface {
                    number: 0,
                    alt_settings: alts,
                }],
            }],
        }
    }

    #[test]
    fn prefers_bidirectional_with_write_endpoint() {
        let dev = device(
            vec![
                alt(0, 1, vec![bulk(0x01, EndpointDirection::Out)]),
                alt(
                    1,
                    2,
                    vec![
                        bulk(0x02, EndpointDirection::Out),
                        bulk(0x81, EndpointDirection::In),
                    ],
                ),
            ],
            None,
        );
        let found = find_printer_interface(&dev).expect("printer interface");
        assert_eq!(found.alt_setting, 1);
        assert_eq!(found.protocol, 2);
        assert_eq!(found.write_endpoint, 0x02);
        assert_eq!(found.read_endpoint, Some(0x81));
    }

    #[test]
    fn skips_protocol_without_write_endpoint() {
        let dev = device(
            vec![
                alt(0, 1, vec![bulk(0x01, EndpointDirection::Out)]),
                alt(1, 2, vec![bulk(0x81, EndpointDirection::In)]),
            ],
            None,
        );
        let found = find_printer_interface(&dev).expect("printer interface");
        assert_eq!(found.protocol, 1);
        assert_eq!(found.read_endpoint, None);
    }

    #[test]
    fn ignores_ieee1284_4_and_other_classes() {
        let mut vendor = alt(0, 3, vec![bulk(0x01, EndpointDirection::Out)]);
        assert!(find_printer_interface(&device(vec![vendor.clone()], None)).is_none());
        vendor.protocol = 2;
        vendor.class = 0xff;
        assert!(find_printer_interface(&device(vec![vendor], None)).is_none());
    }

    #[test]
    fn serial_normalization() {
        let iface = PrinterInterface {
            configuration: 1,
            interface: 0,
            alt_setting: 0,
            protocol: 2,
            write_endpoint: 1,
            read_endpoint: None,
        };
        assert_eq!(normalize_serial(Some(b"X3Y7-001"), &iface), "X3Y7-001");
        assert_eq!(normalize_serial(Some(&[0x01, 0xab, 0x10]), &iface), "01AB10");
        assert_eq!(normalize_serial(Some(&[]), &iface), "1.0");
        assert_eq!(normalize_serial(None, &iface), "1.0");
    }

    #[test]
    fn device_id_synthesized_when_incomplete() {
        let dev = device(Vec::new(), None);
        assert_eq!(
            ensure_device_id(Some("CMD:ESC/POS;"), &dev, "SN1"),
            "MFG:Acme;MDL:LabelJet 400;SN:SN1;CMD:ESC/POS;"
        );
        let full = "MANUFACTURER:Acme;MODEL:LJ400;CMD:PWG;";
        assert_eq!(ensure_device_id(Some(full), &dev, "SN1"), full);
    }

    #[test]
    fn device_id_response_length_prefix() {
        // The length counts its own two bytes.
        let mut buf = vec![0x00, 0x0e];
        buf.extend_from_slice(b"MFG:A;MDL:B;trailing-junk");
        assert_eq!(parse_device_id_response(&buf).as_deref(), Some("MFG:A;MDL:B;"));
        assert_eq!(parse_device_id_response(&[0x00]), None);
    }

    #[test]
    fn port_status_bits() {
        assert_eq!(port_status_reasons(0x18), PrinterReasons::empty());
        assert_eq!(port_status_reasons(0x38), PrinterReasons::MEDIA_EMPTY);
        assert!(port_status_reasons(0x08).contains(PrinterReasons::OFFLINE));
    }

    // -- Fake bus --

    #[derive(Default)]
    struct FakeState {
        written: Vec<u8>,
        releases: u32,
    }

    struct FakeBus {
        devices: Vec<UsbDeviceInfo>,
        state: Arc<Mutex<FakeState>>,
    }

    struct FakeHandle {
        state: Arc<Mutex<FakeState>>,
    }

    impl UsbHandle for FakeHandle {
        fn bulk_out(&mut self, data: &[u8]) -> io::Result<usize> {
            self.state.lock().expect("lock").written.extend_from_slice(data);
            Ok(data.len())
        }

        fn bulk_in(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn control_in(
            &mut self,
            request: u8,
            _value: u16,
            _index: u16,
            buf: &mut [u8],
        ) -> io::Result<usize> {
            let reply: &[u8] = match request {
                REQUEST_GET_DEVICE_ID => b"\x00\x1cMFG:Acme;MDL:LabelJet 400;",
                _ => &[0x18],
            };
            buf[..reply.len()].copy_from_slice(reply);
            Ok(reply.len())
        }

        fn release(&mut self) {
            self.state.lock().expect("lock").releases += 1;
        }
    }

    impl UsbBus for FakeBus {
        fn devices(&self) -> Result<Vec<UsbDeviceInfo>> {
            Ok(self.devices.clone())
        }

        fn open(
            &self,
            _dev: &UsbDeviceInfo,
            _iface: &PrinterInterface,
        ) -> Result<Box<dyn UsbHandle>> {
            Ok(Box::new(FakeHandle {
                state: self.state.clone(),
            }))
        }
    }

    fn fake_scheme() -> (UsbScheme, Arc<Mutex<FakeState>>) {
        let state = Arc::new(Mutex::new(FakeState::default()));
        let dev = device(
            vec![alt(
                0,
                2,
                vec![
                    bulk(0x01, EndpointDirection::Out),
                    bulk(0x82, EndpointDirection::In),
                ],
            )],
            Some(b"SN42"),
        );
        let bus = FakeBus {
            devices: vec![dev],
            state: state.clone(),
        };
        (UsbScheme::new(Arc::new(bus)), state)
    }

    #[test]
    fn lists_printer_with_uri_and_id() {
        let (scheme, _) = fake_scheme();
        let listed = scheme.list().expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].uri, "usb://Acme/LabelJet%20400?serial=SN42");
        assert_eq!(listed[0].device_id.as_deref(), Some("MFG:Acme;MDL:LabelJet 400;"));
        assert_eq!(listed[0].info, "Acme LabelJet 400 (USB)");
    }

    #[test]
    fn open_write_close_releases_once() {
        let (scheme, state) = fake_scheme();
        let uri = DeviceUri::parse("usb://Acme/LabelJet%20400?serial=SN42").expect("uri");

        // Listing released its probe handle.
        let releases_before = {
            scheme.list().expect("list");
            state.lock().expect("lock").releases
        };

        let mut conn = scheme.open(&uri, &OpenContext::default()).expect("open");
        conn.write(b"^XA^XZ").expect("write");
        assert!(conn.status_query().expect("status").status().expect("status").is_empty());
        conn.close().expect("close");
        drop(conn);

        let state = state.lock().expect("lock");
        assert_eq!(state.written, b"^XA^XZ");
        // One probe during open's discovery plus the connection itself.
        assert_eq!(state.releases, releases_before + 2);
    }

    #[test]
    fn open_unknown_serial_fails() {
        let (scheme, _) = fake_scheme();
        let uri = DeviceUri::parse("usb://Acme/LabelJet%20400?serial=OTHER").expect("uri");
        assert!(matches!(
            scheme.open(&uri, &OpenContext::default()).err(),
            Some(DruckwerkError::DeviceOpen { .. })
        ));
    }
}
