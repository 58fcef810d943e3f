// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Buffered device handle.
//
// `write` appends to a fixed-size buffer.  The buffer is flushed first when
// the new data would overflow it; data at least as large as the buffer then
// goes straight to the transport.  A transport that accepts fewer bytes than
// offered is a hard error and the pending buffer is discarded.

use std::io;

use tracing::{debug, warn};

use druckwerk_core::error::{DruckwerkError, Result};
use druckwerk_core::types::{PrinterReasons, Supply};

use crate::connection::Connection;
use crate::metrics::{DeviceMetrics, OpClass, Sample};

/// Default write buffer size.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// An open device. Exactly one owner at a time; dropping closes it.
pub struct Device {
    uri: String,
    conn: Option<Box<dyn Connection>>,
    buffer: Vec<u8>,
    capacity: usize,
    metrics: DeviceMetrics,
}

impl Device {
    pub fn new(uri: impl Into<String>, conn: Box<dyn Connection>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            uri: uri.into(),
            conn: Some(conn),
            buffer: Vec::with_capacity(capacity),
            capacity,
            metrics: DeviceMetrics::default(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Bytes waiting in the write buffer.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Snapshot of the cumulative I/O metrics.
    pub fn metrics(&self) -> DeviceMetrics {
        self.metrics
    }

    /// Buffered write. Returns the number of bytes accepted.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.conn.is_none() {
            return Err(DruckwerkError::DeviceClosed);
        }

        if self.buffer.len() + data.len() > self.capacity {
            self.flush()?;
        }

        if data.len() < self.capacity {
            self.buffer.extend_from_slice(data);
        } else {
            write_through(&mut self.conn, data, &mut self.metrics)?;
        }
        Ok(data.len())
    }

    /// Write a string.
    pub fn puts(&mut self, text: &str) -> Result<()> {
        self.write(text.as_bytes()).map(|_| ())
    }

    /// Send any buffered bytes to the transport.
    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let result = write_through(&mut self.conn, &self.buffer, &mut self.metrics);
        self.buffer.clear();
        result
    }

    /// Read from the device. Pending writes are flushed first. `Ok(0)` is EOF.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.flush()?;

        let conn = self.conn.as_mut().ok_or(DruckwerkError::DeviceClosed)?;
        let reader = conn.readable().ok_or(DruckwerkError::NotSupported("read"))?;

        let sample = Sample::start(OpClass::Read);
        match reader.read(buf) {
            Ok(count) => {
                sample.finish(&mut self.metrics, count);
                Ok(count)
            }
            Err(e) => {
                sample.finish(&mut self.metrics, 0);
                Err(DruckwerkError::DeviceIo(format!("read {}: {e}", self.uri)))
            }
        }
    }

    /// Printer state reasons reported by the device.
    pub fn status(&mut self) -> Result<PrinterReasons> {
        let conn = self.conn.as_mut().ok_or(DruckwerkError::DeviceClosed)?;
        let query = conn
            .status_query()
            .ok_or(DruckwerkError::NotSupported("status"))?;

        let sample = Sample::start(OpClass::Status);
        let result = query.status();
        sample.finish(&mut self.metrics, 0);
        result
    }

    /// Marker supply levels reported by the device.
    pub fn supplies(&mut self) -> Result<Vec<Supply>> {
        let conn = self.conn.as_mut().ok_or(DruckwerkError::DeviceClosed)?;
        let query = conn
            .supplies_query()
            .ok_or(DruckwerkError::NotSupported("supplies"))?;

        let sample = Sample::start(OpClass::Status);
        let result = query.supplies();
        sample.finish(&mut self.metrics, 0);
        result
    }

    /// IEEE-1284 device ID.
    pub fn device_id(&mut self) -> Result<String> {
        let conn = self.conn.as_mut().ok_or(DruckwerkError::DeviceClosed)?;
        let query = conn.id_query().ok_or(DruckwerkError::NotSupported("device ID"))?;

        let sample = Sample::start(OpClass::Status);
        let result = query.device_id();
        sample.finish(&mut self.metrics, 0);
        result
    }

    /// Flush and release the transport. Closing a closed device does nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.conn.is_none() {
            return Ok(());
        }

        let flushed = self.flush();
        if let Some(mut conn) = self.conn.take() {
            if let Err(e) = conn.close() {
                warn!(uri = %self.uri, error = %e, "device close failed");
            }
        }
        debug!(uri = %self.uri, metrics = ?self.metrics, "device closed");
        flushed
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(uri = %self.uri, error = %e, "pending output lost while closing device");
        }
    }
}

impl io::Write for Device {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Device::write(self, buf).map_err(io::Error::other)
    }

    fn flush(&mut self) -> io::Result<()> {
        Device::flush(self).map_err(io::Error::other)
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("uri", &self.uri)
            .field("open", &self.is_open())
            .field("pending", &self.buffer.len())
            .field("metrics", &self.metrics)
            .finish()
    }
}

fn write_through(
    conn: &mut Option<Box<dyn Connection>>,
    data: &[u8],
    metrics: &mut DeviceMetrics,
) -> Result<()> {
    let conn = conn.as_mut().ok_or(DruckwerkError::DeviceClosed)?;

    let sample = Sample::start(OpClass::Write);
    match conn.write(data) {
        Ok(written) if written == data.len() => {
            sample.finish(metrics, written);
            Ok(())
        }
        Ok(written) => {
            sample.finish(metrics, written);
            Err(DruckwerkError::ShortWrite {
                expected: data.len(),
                written,
            })
        }
        Err(e) => {
            sample.finish(metrics, 0);
            Err(DruckwerkError::DeviceIo(format!("write: {e}")))
        }
    }
}
