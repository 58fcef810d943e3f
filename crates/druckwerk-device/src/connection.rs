// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capability traits implemented by each transport.
//
// Every connection can be written to.  Reading, status, supplies, and
// IEEE-1284 device ID queries are optional; a transport advertises them by
// returning `Some(self)` from the matching accessor on `Connection`.

use std::io;

use druckwerk_core::error::Result;
use druckwerk_core::types::{JobId, PrinterReasons, Supply};

/// Byte sink. Implementations write the whole slice or fail.
pub trait Writable {
    /// Write `buf`, returning how many bytes reached the transport.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

/// Byte source. `Ok(0)` means end of stream.
pub trait Readable {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Printer state reasons reported by the transport (e.g. USB port status).
pub trait StatusQueryable {
    fn status(&mut self) -> Result<PrinterReasons>;
}

/// Marker supply levels.
pub trait SuppliesQueryable {
    fn supplies(&mut self) -> Result<Vec<Supply>>;
}

/// IEEE-1284 device ID.
pub trait IdQueryable {
    fn device_id(&mut self) -> Result<String>;
}

/// An open transport handle.
pub trait Connection: Writable + Send {
    fn readable(&mut self) -> Option<&mut dyn Readable> {
        None
    }

    fn status_query(&mut self) -> Option<&mut dyn StatusQueryable> {
        None
    }

    fn supplies_query(&mut self) -> Option<&mut dyn SuppliesQueryable> {
        None
    }

    fn id_query(&mut self) -> Option<&mut dyn IdQueryable> {
        None
    }

    /// Release the transport. Called exactly once, after the final flush.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// What a scheme may know about the job a device is opened for.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenContext<'a> {
    pub printer: Option<&'a str>,
    pub job_id: Option<JobId>,
    pub job_name: Option<&'a str>,
}

impl<'a> OpenContext<'a> {
    pub fn for_job(printer: &'a str, job_id: JobId, job_name: &'a str) -> Self {
        Self {
            printer: Some(printer),
            job_id: Some(job_id),
            job_name: Some(job_name),
        }
    }
}
