// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Druckwerk device layer: buffered byte channels to printers, selected by
// URI scheme through a registry.

pub mod connection;
pub mod device;
pub mod file;
pub mod metrics;
pub mod registry;
pub mod socket;
pub mod uri;
pub mod usb;

pub use connection::{
    Connection, IdQueryable, OpenContext, Readable, StatusQueryable, SuppliesQueryable, Writable,
};
pub use device::{DEFAULT_BUFFER_SIZE, Device};
pub use metrics::DeviceMetrics;
pub use registry::{DeviceListing, DeviceScheme, DeviceSchemeEntry, DeviceType, SchemeRegistry};
pub use uri::DeviceUri;
