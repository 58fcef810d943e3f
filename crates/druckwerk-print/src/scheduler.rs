// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-printer scheduler thread.  Only this thread claims pending jobs, so a
// printer never starts two workers at once regardless of which thread asked
// for a queue check.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Weak;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use druckwerk_core::error::Result;

use crate::printer::Printer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SchedulerMsg {
    CheckJobs,
    Shutdown,
}

#[derive(Debug)]
pub(crate) struct Scheduler {
    tx: Sender<SchedulerMsg>,
    thread: JoinHandle<()>,
}

impl Scheduler {
    pub(crate) fn start(printer: Weak<Printer>, name: &str) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name(format!("sched-{name}"))
            .spawn(move || run(printer, rx))?;
        Ok(Self { tx, thread })
    }

    pub(crate) fn check_jobs(&self) {
        // A stopped scheduler has dropped its receiver; nothing to wake.
        let _ = self.tx.send(SchedulerMsg::CheckJobs);
    }

    /// Stop the thread and wait for it.
    pub(crate) fn stop(self) {
        let _ = self.tx.send(SchedulerMsg::Shutdown);
        if self.thread.join().is_err() {
            warn!("scheduler thread panicked");
        }
    }
}

fn run(printer: Weak<Printer>, rx: Receiver<SchedulerMsg>) {
    while let Ok(msg) = rx.recv() {
        match msg {
            SchedulerMsg::Shutdown => break,
            SchedulerMsg::CheckJobs => {
                let Some(printer) = printer.upgrade() else {
                    break;
                };
                printer.check_jobs();
            }
        }
    }
    debug!("scheduler stopped");
}
