// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job worker: one thread per processing job.  It waits for the device,
// opens it (retrying while the printer is offline), sends the documents and
// reports the final job state back to the printer.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, instrument, warn};

use druckwerk_core::error::{DruckwerkError, ErrorClass, Result, classify_error};
use druckwerk_core::types::{DocumentFormat, JobState, PrinterReasons, PrinterState};
use druckwerk_device::{Device, OpenContext};
use druckwerk_raster::pwg::PwgReader;
use druckwerk_raster::urf::UrfReader;
use druckwerk_raster::{
    DocumentInfo, JobProgress, PrintOptions, RasterDocument, RasterOutcome, resolve_options,
    run_raster_job,
};

use crate::job::{Document, Job};
use crate::printer::Printer;

pub(crate) fn spawn(printer: Arc<Printer>, job: Arc<Job>) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name(format!("job-{}-{}", printer.name(), job.id()))
        .spawn(move || run(&printer, &job))?;
    Ok(handle)
}

enum Acquired {
    Device(Device),
    /// Canceled before the device was ours.
    Canceled,
    /// Shutdown arrived first; the job goes back to the queue.
    Requeue,
    Failed(DruckwerkError),
}

#[instrument(skip_all, fields(printer = %printer.name(), job_id = %job.id()))]
fn run(printer: &Printer, job: &Arc<Job>) {
    if !claim_device(printer, job) {
        let state = if job.is_canceled() {
            JobState::Canceled
        } else {
            JobState::Pending
        };
        printer.finish_job(job, state, None, false);
        return;
    }

    let mut device = match open_device(printer, job) {
        Acquired::Device(device) => device,
        Acquired::Canceled => {
            printer.finish_job(job, JobState::Canceled, None, true);
            return;
        }
        Acquired::Requeue => {
            printer.finish_job(job, JobState::Pending, None, true);
            return;
        }
        Acquired::Failed(e) => {
            error!(error = %e, "cannot open device");
            printer.finish_job(job, JobState::Aborted, Some(e.to_string()), true);
            return;
        }
    };

    {
        let mut inner = printer.write();
        let reasons = inner.reasons - PrinterReasons::OFFLINE;
        printer.set_state_locked(&mut inner, PrinterState::Processing, Some(reasons));
    }
    info!(uri = %device.uri(), "job started");

    let result = process(printer, job, &mut device);
    let shutting_down = printer.ctx.is_shutting_down();
    let (state, message) = match &result {
        Ok(RasterOutcome::Completed) if job.is_canceled() => (JobState::Canceled, None),
        Ok(RasterOutcome::Completed) => (JobState::Completed, None),
        Ok(RasterOutcome::Canceled) => (JobState::Canceled, None),
        Ok(RasterOutcome::Stopped) if shutting_down => (JobState::Pending, None),
        Ok(RasterOutcome::Stopped) => (JobState::Stopped, Some("suspended".to_string())),
        Err(e) => (JobState::Aborted, Some(e.to_string())),
    };
    match state {
        JobState::Aborted => error!(message = message.as_deref().unwrap_or(""), "job aborted"),
        _ => info!(state = %state.keyword(), "job finished"),
    }

    if result.is_ok() {
        printer.release_device(Some(device));
    } else if let Err(e) = device.close() {
        warn!(error = %e, "error closing device after failure");
    }
    printer.finish_job(job, state, message, true);
}

/// Wait until no other user holds the device. False when the job should
/// not run after all.
fn claim_device(printer: &Printer, job: &Job) -> bool {
    let ctx = &printer.ctx;
    loop {
        if job.is_canceled() || ctx.is_shutting_down() {
            return false;
        }
        {
            let mut inner = printer.write();
            if inner.deleted {
                return false;
            }
            if !inner.device_in_use {
                inner.device_in_use = true;
                return true;
            }
        }
        debug!("device busy, waiting");
        ctx.sleep(ctx.config.busy_poll_interval());
    }
}

fn open_device(printer: &Printer, job: &Job) -> Acquired {
    if let Some(device) = printer.take_kept_device() {
        return Acquired::Device(device);
    }
    let ctx = &printer.ctx;
    let open_ctx = OpenContext::for_job(printer.name(), job.id(), job.name());
    let mut reported = false;
    loop {
        match ctx.registry.open(printer.device_uri(), &open_ctx) {
            Ok(mut device) => {
                if ctx.is_shutting_down() {
                    if let Err(e) = device.close() {
                        warn!(error = %e, "error closing device");
                    }
                    return Acquired::Requeue;
                }
                return Acquired::Device(device);
            }
            Err(e) if classify_error(&e) == ErrorClass::Transient => {
                if !reported {
                    error!(uri = %printer.device_uri(), error = %e, "printer offline, retrying");
                    let mut inner = printer.write();
                    let reasons = inner.reasons | PrinterReasons::OFFLINE;
                    printer.set_state_locked(&mut inner, PrinterState::Stopped, Some(reasons));
                    reported = true;
                }
            }
            Err(e) => return Acquired::Failed(e),
        }
        ctx.sleep(ctx.config.open_retry_interval());
        if job.is_canceled() {
            return Acquired::Canceled;
        }
        if ctx.is_shutting_down() {
            return Acquired::Requeue;
        }
    }
}

/// Progress hooks seen by the raster pipeline. Shutdown suspends the job at
/// the next page boundary.
struct WorkerProgress<'a> {
    printer: &'a Printer,
    job: &'a Job,
}

impl JobProgress for WorkerProgress<'_> {
    fn is_canceled(&self) -> bool {
        self.job.is_canceled()
    }

    fn is_suspended(&self) -> bool {
        self.job.is_suspended() || self.printer.ctx.is_shutting_down()
    }

    fn page_completed(&self, pages: u32) {
        self.job.page_completed(pages);
    }

    fn copy_completed(&self, copies: u32) {
        self.job.copy_completed(copies);
    }
}

/// What can be learned about a spooled document before printing it: images
/// are one page, raster streams announce their page count up front.
fn document_info(doc: &Document) -> DocumentInfo {
    let mut info = DocumentInfo::new(doc.format.clone());
    info.num_pages = match doc.format {
        DocumentFormat::Jpeg | DocumentFormat::Png => Some(1),
        DocumentFormat::PwgRaster | DocumentFormat::AppleRaster => {
            stream_page_count(doc).unwrap_or_else(|e| {
                debug!(path = %doc.path.display(), error = %e, "page count unknown");
                None
            })
        }
        _ => None,
    };
    info
}

fn stream_page_count(doc: &Document) -> Result<Option<u32>> {
    let file = BufReader::new(File::open(&doc.path)?);
    let count = if matches!(doc.format, DocumentFormat::AppleRaster) {
        UrfReader::new(file)?.page_count()
    } else {
        let mut reader = PwgReader::new(file)?;
        reader.next_header()?.map_or(0, |header| header.total_page_count)
    };
    Ok(Some(count).filter(|&count| count > 0))
}

/// Impressions the job will print, when every document's page count is known.
fn total_impressions(resolved: &[(Document, PrintOptions)], copies: u32) -> Option<u32> {
    let pages = resolved
        .iter()
        .map(|(_, options)| options.num_pages)
        .sum::<Option<u32>>()?;
    Some(pages * copies)
}

fn process(printer: &Printer, job: &Job, device: &mut Device) -> Result<RasterOutcome> {
    let driver = printer.driver();
    let data = driver.data();
    let info = job.info();

    let resolved = job
        .documents()
        .into_iter()
        .map(|doc| -> Result<(Document, PrintOptions)> {
            let options = resolve_options(data, job.request(), &doc.request, &document_info(&doc))?;
            Ok((doc, options))
        })
        .collect::<Result<Vec<_>>>()?;
    let Some((first, job_options)) = resolved.first() else {
        return Err(DruckwerkError::InvalidArgument("job has no documents".into()));
    };

    let native = resolved
        .iter()
        .all(|(doc, _)| data.accepts_natively(doc.format.mime_type()));
    // A lone raster stream carries its own copies, as does anything sent as-is.
    let streaming = resolved.len() == 1
        && matches!(first.format, DocumentFormat::PwgRaster | DocumentFormat::AppleRaster);
    let copies = if native || streaming {
        1
    } else {
        job_options.copy_loops()
    };
    if let Some(total) = total_impressions(&resolved, copies) {
        debug!(total, "impressions known");
        job.set_impressions(total);
    }

    let outcome = if native {
        let mut outcome = RasterOutcome::Completed;
        let mut sent = 0;
        for (doc, options) in &resolved {
            if job.is_canceled() {
                outcome = RasterOutcome::Canceled;
                break;
            }
            debug!(path = %doc.path.display(), "sending document as-is");
            driver
                .print_file(&info, options, device, &doc.path)
                .map_err(|e| DruckwerkError::Driver {
                    callback: "print_file",
                    message: e.message().to_string(),
                })?;
            if let Some(pages) = options.num_pages {
                sent += pages;
                job.page_completed(sent);
            }
        }
        outcome
    } else {
        if let Some((doc, _)) = resolved.iter().find(|(d, _)| !d.format.is_renderable()) {
            return Err(DruckwerkError::UnsupportedFormat(
                doc.format.mime_type().to_string(),
            ));
        }
        let raster: Vec<RasterDocument> = resolved
            .iter()
            .map(|(doc, options)| {
                RasterDocument::new(doc.path.clone(), doc.format.clone()).with_options(options.clone())
            })
            .collect();
        let progress = WorkerProgress { printer, job };
        run_raster_job(driver.as_ref(), &info, job_options, &progress, device, &raster)?
    };
    device.flush()?;
    Ok(outcome)
}
