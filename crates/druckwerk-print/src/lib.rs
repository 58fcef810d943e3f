// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Druckwerk print service: the system, its printers and their jobs.
//
// Each printer owns a scheduler thread that starts at most one job worker
// at a time.  Workers wait for the device, send the documents through the
// printer's driver and report back; clients watch progress through the
// event bus.

pub mod event;
pub mod job;
pub mod printer;
mod scheduler;
pub mod spool;
pub mod system;
mod worker;

pub use event::{Event, EventBus};
pub use job::{Document, Job, JobAttributes};
pub use printer::{Printer, PrinterAttributes};
pub use spool::{Spool, SpooledFile};
pub use system::System;
