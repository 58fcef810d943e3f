// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// URI scheme registry.
//
// Maps a URI scheme to the transport that opens it.  The built-in schemes
// (file, socket, usb) are installed on first use of the registry, so an
// application that removes one before opening any device never sees it.

use std::collections::BTreeMap;
use std::sync::{Arc, Once, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use druckwerk_core::error::{DruckwerkError, Result};

use crate::connection::{Connection, OpenContext};
use crate::device::{DEFAULT_BUFFER_SIZE, Device};
use crate::uri::DeviceUri;

/// Broad transport class used to filter device listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    /// Directly attached (file, USB).
    Local,
    /// Reached over the network (socket).
    Network,
    /// Registered by the application.
    Custom,
}

/// One discovered device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceListing {
    pub info: String,
    pub uri: String,
    /// IEEE-1284 device ID, when the transport can tell.
    pub device_id: Option<String>,
    pub device_type: DeviceType,
}

/// A transport for one URI scheme.
pub trait DeviceScheme: Send + Sync {
    fn open(&self, uri: &DeviceUri, ctx: &OpenContext<'_>) -> Result<Box<dyn Connection>>;

    /// Enumerate reachable devices. Schemes without discovery return nothing.
    fn list(&self) -> Result<Vec<DeviceListing>> {
        Ok(Vec::new())
    }
}

/// Registry entry.
#[derive(Clone)]
pub struct DeviceSchemeEntry {
    pub name: String,
    pub device_type: DeviceType,
    pub scheme: Arc<dyn DeviceScheme>,
}

impl DeviceSchemeEntry {
    pub fn new(
        name: impl Into<String>,
        device_type: DeviceType,
        scheme: impl DeviceScheme + 'static,
    ) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            device_type,
            scheme: Arc::new(scheme),
        }
    }
}

impl std::fmt::Debug for DeviceSchemeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSchemeEntry")
            .field("name", &self.name)
            .field("device_type", &self.device_type)
            .finish_non_exhaustive()
    }
}

/// Thread-safe scheme table shared by every printer in a system.
pub struct SchemeRegistry {
    entries: RwLock<BTreeMap<String, DeviceSchemeEntry>>,
    builtins: Once,
    buffer_size: usize,
}

impl std::fmt::Debug for SchemeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .entries
            .read()
            .expect("scheme registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        f.debug_struct("SchemeRegistry")
            .field("schemes", &names)
            .field("buffer_size", &self.buffer_size)
            .finish()
    }
}

impl Default for SchemeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemeRegistry {
    /// Registry that installs the built-in schemes on first use.
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            builtins: Once::new(),
            buffer_size,
        }
    }

    /// Registry without the built-in schemes.
    pub fn empty() -> Self {
        let registry = Self::new();
        registry.builtins.call_once(|| {});
        registry
    }

    fn ensure_builtins(&self) {
        self.builtins.call_once(|| {
            let mut entries = self.entries.write().expect("scheme registry lock poisoned");
            for entry in builtin_schemes() {
                entries.entry(entry.name.clone()).or_insert(entry);
            }
            debug!(count = entries.len(), "built-in device schemes installed");
        });
    }

    /// Register a scheme, replacing any existing entry with the same name.
    pub fn add_scheme(&self, entry: DeviceSchemeEntry) {
        self.ensure_builtins();
        info!(scheme = %entry.name, device_type = ?entry.device_type, "device scheme registered");
        self.entries
            .write()
            .expect("scheme registry lock poisoned")
            .insert(entry.name.clone(), entry);
    }

    /// Remove a scheme. Returns whether it was present.
    pub fn remove_scheme(&self, name: &str) -> bool {
        self.ensure_builtins();
        let removed = self
            .entries
            .write()
            .expect("scheme registry lock poisoned")
            .remove(&name.to_ascii_lowercase())
            .is_some();
        if removed {
            info!(scheme = name, "device scheme removed");
        }
        removed
    }

    pub fn lookup(&self, name: &str) -> Option<DeviceSchemeEntry> {
        self.ensure_builtins();
        self.entries
            .read()
            .expect("scheme registry lock poisoned")
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    /// Registered scheme names, sorted.
    pub fn schemes(&self) -> Vec<String> {
        self.ensure_builtins();
        self.entries
            .read()
            .expect("scheme registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Whether `uri` could be opened.
    ///
    /// `file:` URIs are judged by whether the target path is writable (or,
    /// for a missing file, whether its directory is).  Other schemes only
    /// need to be registered.
    pub fn is_supported(&self, uri: &str) -> bool {
        let Ok(parsed) = DeviceUri::parse(uri) else {
            return false;
        };
        if parsed.scheme() == "file" {
            return crate::file::is_writable(std::path::Path::new(parsed.resource()));
        }
        self.lookup(parsed.scheme()).is_some()
    }

    /// Open a device for exclusive use.
    #[instrument(skip_all, fields(uri = %uri))]
    pub fn open(&self, uri: &str, ctx: &OpenContext<'_>) -> Result<Device> {
        let parsed = DeviceUri::parse(uri)?;
        let entry = self
            .lookup(parsed.scheme())
            .ok_or_else(|| DruckwerkError::UnsupportedScheme(parsed.scheme().to_string()))?;

        let conn = entry.scheme.open(&parsed, ctx)?;
        debug!(scheme = %entry.name, "device opened");
        Ok(Device::new(uri, conn, self.buffer_size))
    }

    /// Ask each scheme of the given type (or all types) for devices.
    ///
    /// A scheme whose discovery fails is logged and skipped.
    pub fn list_devices(&self, filter: Option<DeviceType>) -> Vec<DeviceListing> {
        self.ensure_builtins();
        let entries: Vec<DeviceSchemeEntry> = self
            .entries
            .read()
            .expect("scheme registry lock poisoned")
            .values()
            .filter(|e| filter.is_none_or(|t| t == e.device_type))
            .cloned()
            .collect();

        let mut found = Vec::new();
        for entry in entries {
            match entry.scheme.list() {
                Ok(mut devices) => found.append(&mut devices),
                Err(e) => warn!(scheme = %entry.name, error = %e, "device discovery failed"),
            }
        }
        found
    }
}

fn builtin_schemes() -> Vec<DeviceSchemeEntry> {
    vec![
        DeviceSchemeEntry::new("file", DeviceType::Local, crate::file::FileScheme),
        DeviceSchemeEntry::new(
            "socket",
            DeviceType::Network,
            crate::socket::SocketScheme::default(),
        ),
        DeviceSchemeEntry::new("usb", DeviceType::Local, crate::usb::UsbScheme::system()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::tests::MemoryConnection;

    struct MemoryScheme(MemoryConnection);

    impl DeviceScheme for MemoryScheme {
        fn open(&self, _uri: &DeviceUri, _ctx: &OpenContext<'_>) -> Result<Box<dyn Connection>> {
            Ok(Box::new(self.0.clone()))
        }

        fn list(&self) -> Result<Vec<DeviceListing>> {
            Ok(vec![DeviceListing {
                info: "Memory".into(),
                uri: "mem://0".into(),
                device_id: None,
                device_type: DeviceType::Custom,
            }])
        }
    }

    #[test]
    fn builtins_present_on_first_use() {
        let registry = SchemeRegistry::new();
        assert_eq!(registry.schemes(), vec!["file", "socket", "usb"]);
    }

    #[test]
    fn removing_builtin_before_use_sticks() {
        let registry = SchemeRegistry::new();
        assert!(registry.remove_scheme("file"));
        assert!(registry.lookup("file").is_none());
        assert!(!registry.schemes().contains(&"file".to_string()));
    }

    #[test]
    fn unknown_scheme_fails_to_open() {
        let registry = SchemeRegistry::empty();
        let err = registry
            .open("ipp://printer.local/ipp/print", &OpenContext::default())
            .expect_err("no such scheme");
        assert!(matches!(err, DruckwerkError::UnsupportedScheme(s) if s == "ipp"));
    }

    #[test]
    fn custom_scheme_opens_buffered_device() {
        let registry = SchemeRegistry::with_buffer_size(4);
        let conn = MemoryConnection::default();
        registry.add_scheme(DeviceSchemeEntry::new(
            "mem",
            DeviceType::Custom,
            MemoryScheme(conn.clone()),
        ));

        let mut device = registry
            .open("mem://0", &OpenContext::default())
            .expect("open");
        device.write(b"abc").expect("write");
        device.write(b"de").expect("write");
        device.close().expect("close");

        let writes = conn.writes.lock().expect("lock").clone();
        assert_eq!(writes, vec![b"abc".to_vec(), b"de".to_vec()]);
    }

    #[test]
    fn listing_filters_by_type() {
        let registry = SchemeRegistry::empty();
        registry.add_scheme(DeviceSchemeEntry::new(
            "mem",
            DeviceType::Custom,
            MemoryScheme(MemoryConnection::default()),
        ));

        assert_eq!(registry.list_devices(Some(DeviceType::Custom)).len(), 1);
        assert!(registry.list_devices(Some(DeviceType::Network)).is_empty());
        assert_eq!(registry.list_devices(None).len(), 1);
    }

    #[test]
    fn file_support_follows_writability() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = SchemeRegistry::empty();

        let target = dir.path().join("out.prn");
        assert!(registry.is_supported(&format!("file://{}", target.display())));
        assert!(!registry.is_supported("file:///nonexistent-dir/for/sure/out.prn"));
        assert!(!registry.is_supported("socket://printer:9100"));
    }
}
