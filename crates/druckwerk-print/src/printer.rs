// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printers: job queues, printer state, and the device slot.
//
// Lock order is printer `inner`, then a job's lock, then the device slot.
// Jobs move between the active and completed queues only under the printer
// write lock.  `device_in_use` together with the device slot gives one
// writer per device.

use std::collections::{BTreeMap, VecDeque};
use std::io::Read;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use druckwerk_core::error::{DruckwerkError, Result};
use druckwerk_core::types::{
    DocumentFormat, IdentifyActions, JobId, JobState, PrinterReasons, PrinterState, Supply,
};
use druckwerk_device::{Device, OpenContext};
use druckwerk_raster::{Driver, DriverError, PrintRequest, validate_request};

use crate::event::Event;
use crate::job::{Document, Job, JobAttributes};
use crate::scheduler::Scheduler;
use crate::system::SystemContext;
use crate::worker;

pub(crate) struct PrinterInner {
    pub(crate) state: PrinterState,
    pub(crate) state_time: DateTime<Utc>,
    pub(crate) reasons: PrinterReasons,
    /// Non-terminal jobs in submission order.
    pub(crate) active: Vec<Arc<Job>>,
    /// Terminal jobs, oldest first.
    pub(crate) completed: VecDeque<Arc<Job>>,
    pub(crate) jobs: BTreeMap<JobId, Arc<Job>>,
    pub(crate) processing: Option<JobId>,
    pub(crate) device_in_use: bool,
    pub(crate) paused: bool,
    pub(crate) deleted: bool,
    next_job_id: u32,
    device_id: Option<String>,
    supplies: Vec<Supply>,
}

/// Point-in-time view of a printer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrinterAttributes {
    pub name: String,
    pub uuid: Uuid,
    pub device_uri: String,
    pub driver: String,
    pub make_and_model: String,
    pub state: PrinterState,
    pub state_reasons: Vec<&'static str>,
    pub state_time: DateTime<Utc>,
    pub is_accepting_jobs: bool,
    pub processing_job: Option<JobId>,
    pub active_jobs: usize,
    pub completed_jobs: usize,
}

pub struct Printer {
    name: String,
    uuid: Uuid,
    device_uri: String,
    driver_name: String,
    driver: Arc<dyn Driver>,
    pub(crate) ctx: Arc<SystemContext>,
    inner: RwLock<PrinterInner>,
    device: Mutex<Option<Device>>,
    scheduler: Mutex<Option<Scheduler>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for Printer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Printer")
            .field("name", &self.name)
            .field("device_uri", &self.device_uri)
            .field("driver", &self.driver_name)
            .finish_non_exhaustive()
    }
}

fn driver_error(callback: &'static str) -> impl Fn(DriverError) -> DruckwerkError {
    move |err| DruckwerkError::Driver {
        callback,
        message: err.message().to_string(),
    }
}

impl Printer {
    pub(crate) fn new(
        name: &str,
        device_uri: &str,
        driver_name: &str,
        driver: Arc<dyn Driver>,
        ctx: Arc<SystemContext>,
    ) -> Result<Arc<Self>> {
        let printer = Arc::new(Self {
            name: name.to_string(),
            uuid: Uuid::new_v4(),
            device_uri: device_uri.to_string(),
            driver_name: driver_name.to_string(),
            driver,
            ctx,
            inner: RwLock::new(PrinterInner {
                state: PrinterState::Idle,
                state_time: Utc::now(),
                reasons: PrinterReasons::empty(),
                active: Vec::new(),
                completed: VecDeque::new(),
                jobs: BTreeMap::new(),
                processing: None,
                device_in_use: false,
                paused: false,
                deleted: false,
                next_job_id: 1,
                device_id: None,
                supplies: Vec::new(),
            }),
            device: Mutex::new(None),
            scheduler: Mutex::new(None),
            workers: Mutex::new(Vec::new()),
        });
        let scheduler = Scheduler::start(Arc::downgrade(&printer), name)?;
        *printer.scheduler.lock().expect("scheduler lock poisoned") = Some(scheduler);
        Ok(printer)
    }

    // -- Accessors --

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn device_uri(&self) -> &str {
        &self.device_uri
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn state(&self) -> PrinterState {
        self.read().state
    }

    pub fn reasons(&self) -> PrinterReasons {
        self.read().reasons
    }

    pub fn attributes(&self) -> PrinterAttributes {
        let inner = self.read();
        PrinterAttributes {
            name: self.name.clone(),
            uuid: self.uuid,
            device_uri: self.device_uri.clone(),
            driver: self.driver_name.clone(),
            make_and_model: self.driver.data().make_and_model.clone(),
            state: inner.state,
            state_reasons: inner.reasons.keywords(),
            state_time: inner.state_time,
            is_accepting_jobs: !inner.deleted && !self.ctx.is_shutting_down(),
            processing_job: inner.processing,
            active_jobs: inner.active.len(),
            completed_jobs: inner.completed.len(),
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, PrinterInner> {
        self.inner.read().expect("printer lock poisoned")
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, PrinterInner> {
        self.inner.write().expect("printer lock poisoned")
    }

    // -- Jobs --

    pub fn job(&self, id: JobId) -> Result<Arc<Job>> {
        self.read()
            .jobs
            .get(&id)
            .cloned()
            .ok_or(DruckwerkError::JobNotFound(id.0))
    }

    /// Active jobs first, then completed ones.
    pub fn jobs(&self) -> Vec<Arc<Job>> {
        let inner = self.read();
        inner
            .active
            .iter()
            .chain(inner.completed.iter())
            .cloned()
            .collect()
    }

    pub fn active_jobs(&self) -> Vec<Arc<Job>> {
        self.read().active.clone()
    }

    pub fn completed_jobs(&self) -> Vec<Arc<Job>> {
        self.read().completed.iter().cloned().collect()
    }

    pub fn job_attributes(&self, id: JobId) -> Result<JobAttributes> {
        Ok(self.job(id)?.attributes())
    }

    fn check_accepting(&self) -> Result<()> {
        if self.ctx.is_shutting_down() {
            return Err(DruckwerkError::ShuttingDown);
        }
        if self.read().deleted {
            return Err(DruckwerkError::PrinterDeleted(self.name.clone()));
        }
        Ok(())
    }

    /// Create a job that waits (held) for its documents.
    #[instrument(skip_all, fields(printer = %self.name))]
    pub fn create_job(&self, name: &str, username: &str, request: PrintRequest) -> Result<Arc<Job>> {
        self.check_accepting()?;
        validate_request(self.driver.data(), &request)?;

        let job = {
            let mut inner = self.write();
            let id = JobId(inner.next_job_id);
            inner.next_job_id += 1;
            let job = Arc::new(Job::new(id, &self.name, name, username, request));
            inner.active.push(job.clone());
            inner.jobs.insert(id, job.clone());
            job
        };
        info!(job_id = %job.id(), name = %job.name(), "job created");
        self.publish_job(&job);
        Ok(job)
    }

    /// Spool one document of a held job. The last document releases the job
    /// to the scheduler.
    #[instrument(skip_all, fields(printer = %self.name, job_id = %job_id, format = %format))]
    pub fn submit_document(
        &self,
        job_id: JobId,
        reader: &mut dyn Read,
        format: DocumentFormat,
        request: PrintRequest,
        is_last: bool,
    ) -> Result<()> {
        self.check_accepting()?;
        let job = self.job(job_id)?;
        {
            let inner = job.read();
            if inner.state != JobState::Held || inner.complete {
                return Err(DruckwerkError::InvalidJobState {
                    job_id: job_id.0,
                    action: "submit document",
                    state: inner.state.keyword().to_string(),
                });
            }
        }
        let data = self.driver.data();
        if !data.accepts_natively(format.mime_type()) && !format.is_renderable() {
            return Err(DruckwerkError::UnsupportedFormat(format.mime_type().to_string()));
        }
        validate_request(data, &request)?;

        let spooled = match self
            .ctx
            .spool
            .store(&self.name, job_id, job.name(), &format, reader)
        {
            Ok(spooled) => spooled,
            Err(e) => {
                error!(error = %e, "document upload failed");
                self.finish_unprocessed(&job, JobState::Aborted, Some(e.to_string()));
                return Err(e);
            }
        };
        info!(bytes = spooled.bytes, sha256 = %spooled.sha256, "document received");
        job.write().documents.push(Document::new(format, spooled, request));

        if is_last {
            self.close_job(job_id)?;
        }
        Ok(())
    }

    /// No more documents will follow: release a held job to the scheduler.
    pub fn close_job(&self, job_id: JobId) -> Result<()> {
        let job = self.job(job_id)?;
        let released = {
            let _inner = self.write();
            let mut jinner = job.write();
            if jinner.state != JobState::Held || jinner.complete {
                return Err(DruckwerkError::InvalidJobState {
                    job_id: job_id.0,
                    action: "close",
                    state: jinner.state.keyword().to_string(),
                });
            }
            jinner.complete = true;
            if jinner.documents.is_empty() {
                false
            } else {
                jinner.state = JobState::Pending;
                true
            }
        };
        if !released {
            self.finish_unprocessed(&job, JobState::Aborted, Some("job has no documents".into()));
            return Err(DruckwerkError::InvalidJobState {
                job_id: job_id.0,
                action: "close",
                state: "no documents".into(),
            });
        }
        debug!(job_id = %job_id, "job pending");
        self.publish_job(&job);
        self.notify();
        Ok(())
    }

    /// Create a job and spool its only document.
    pub fn print_job(
        &self,
        name: &str,
        username: &str,
        request: PrintRequest,
        reader: &mut dyn Read,
        format: DocumentFormat,
    ) -> Result<Arc<Job>> {
        let job = self.create_job(name, username, request)?;
        self.submit_document(job.id(), reader, format, PrintRequest::default(), true)?;
        Ok(job)
    }

    /// Cancel a job. A processing job only gets its cancel flag raised and
    /// stops at the next page boundary.
    #[instrument(skip_all, fields(printer = %self.name, job_id = %job_id))]
    pub fn cancel_job(&self, job_id: JobId) -> Result<()> {
        let job = self.job(job_id)?;
        {
            let mut inner = self.write();
            let state = job.state();
            if state.is_terminal() {
                return Err(DruckwerkError::InvalidJobState {
                    job_id: job_id.0,
                    action: "cancel",
                    state: state.keyword().to_string(),
                });
            }
            job.request_cancel();
            if state == JobState::Processing {
                info!("cancel requested for processing job");
                return Ok(());
            }
            job.set_state(JobState::Canceled, None);
            move_to_completed(&mut inner, &job);
        }
        info!("job canceled");
        self.publish_job(&job);
        self.clean_jobs();
        Ok(())
    }

    pub fn cancel_all_jobs(&self) -> usize {
        let ids: Vec<JobId> = self.read().active.iter().map(|j| j.id()).collect();
        ids.into_iter()
            .filter(|id| self.cancel_job(*id).is_ok())
            .count()
    }

    /// Pending or held jobs stop right away; a processing job stops at the
    /// next page boundary.
    pub fn suspend_job(&self, job_id: JobId) -> Result<()> {
        let job = self.job(job_id)?;
        {
            let _inner = self.write();
            match job.state() {
                JobState::Pending | JobState::Held => job.set_state(JobState::Stopped, None),
                JobState::Processing => {
                    job.set_suspend(true);
                    info!(printer = %self.name, job_id = %job_id, "suspend requested for processing job");
                    return Ok(());
                }
                state => {
                    return Err(DruckwerkError::InvalidJobState {
                        job_id: job_id.0,
                        action: "suspend",
                        state: state.keyword().to_string(),
                    });
                }
            }
        }
        self.publish_job(&job);
        Ok(())
    }

    pub fn resume_job(&self, job_id: JobId) -> Result<()> {
        let job = self.job(job_id)?;
        {
            let _inner = self.write();
            let state = job.state();
            if state != JobState::Stopped {
                return Err(DruckwerkError::InvalidJobState {
                    job_id: job_id.0,
                    action: "resume",
                    state: state.keyword().to_string(),
                });
            }
            job.set_suspend(false);
            let next = if job.read().complete {
                JobState::Pending
            } else {
                JobState::Held
            };
            job.set_state(next, None);
        }
        self.publish_job(&job);
        self.notify();
        Ok(())
    }

    /// Drop the oldest completed jobs beyond the retention limit, with their
    /// spool files. Returns how many were removed.
    pub fn clean_jobs(&self) -> usize {
        let removed: Vec<Arc<Job>> = {
            let mut inner = self.write();
            let mut removed = Vec::new();
            while inner.completed.len() > self.ctx.config.max_completed_jobs {
                let Some(job) = inner.completed.pop_front() else {
                    break;
                };
                inner.jobs.remove(&job.id());
                removed.push(job);
            }
            removed
        };
        for job in &removed {
            job.remove_files();
        }
        if !removed.is_empty() {
            debug!(printer = %self.name, count = removed.len(), "completed jobs purged");
        }
        removed.len()
    }

    // -- Printer state --

    /// Stop starting new jobs. The current job finishes.
    pub fn pause(&self) {
        {
            let mut inner = self.write();
            inner.paused = true;
            if inner.processing.is_none() {
                self.set_state_locked(&mut inner, PrinterState::Stopped, None);
            }
        }
        info!(printer = %self.name, "printer paused");
        self.publish_config();
    }

    pub fn resume(&self) {
        {
            let mut inner = self.write();
            inner.paused = false;
            if inner.processing.is_none() {
                self.set_state_locked(&mut inner, PrinterState::Idle, None);
            }
        }
        info!(printer = %self.name, "printer resumed");
        self.publish_config();
        self.notify();
    }

    pub fn is_paused(&self) -> bool {
        self.read().paused
    }

    /// Update the state and reasons, logging and publishing real changes.
    pub(crate) fn set_state_locked(
        &self,
        inner: &mut PrinterInner,
        state: PrinterState,
        reasons: Option<PrinterReasons>,
    ) {
        let reasons = reasons.unwrap_or(inner.reasons);
        if inner.state == state && inner.reasons == reasons {
            return;
        }
        if inner.state != state {
            info!(printer = %self.name, from = %inner.state, to = %state, "printer state changed");
            inner.state_time = Utc::now();
        }
        inner.state = state;
        inner.reasons = reasons;
        self.ctx.events.publish(Event::PrinterStateChanged {
            printer: self.name.clone(),
            state,
            reasons: reasons.keywords(),
        });
    }

    // -- Device queries --

    /// Run `f` with the printer's device when no job is using it. `None`
    /// means the device is busy; the closure gets `None` when it could not
    /// be opened.
    fn with_idle_device<T>(&self, f: impl FnOnce(Option<&mut Device>) -> T) -> Option<T> {
        {
            let mut inner = self.write();
            if inner.device_in_use || inner.deleted {
                return None;
            }
            inner.device_in_use = true;
        }

        let mut device = self.take_kept_device().or_else(|| {
            let ctx = OpenContext {
                printer: Some(&self.name),
                ..Default::default()
            };
            match self.ctx.registry.open(&self.device_uri, &ctx) {
                Ok(device) => Some(device),
                Err(e) => {
                    debug!(printer = %self.name, error = %e, "device not available for query");
                    None
                }
            }
        });
        let result = f(device.as_mut());
        if let Some(device) = device {
            self.release_device(Some(device));
        }
        self.write().device_in_use = false;
        Some(result)
    }

    pub(crate) fn take_kept_device(&self) -> Option<Device> {
        self.device.lock().expect("device slot lock poisoned").take()
    }

    /// Keep the device open for the next user or close it, per config.
    pub(crate) fn release_device(&self, device: Option<Device>) {
        let Some(mut device) = device else {
            return;
        };
        if self.ctx.config.keep_device_open && !self.ctx.is_shutting_down() {
            *self.device.lock().expect("device slot lock poisoned") = Some(device);
        } else if let Err(e) = device.close() {
            warn!(printer = %self.name, error = %e, "error closing device");
        }
    }

    /// Poll driver and device for state reasons.
    #[instrument(skip_all, fields(printer = %self.name))]
    pub fn refresh_status(&self) -> Result<PrinterReasons> {
        let polled = self.with_idle_device(|device| -> Result<PrinterReasons> {
            let Some(device) = device else {
                return Ok(PrinterReasons::OFFLINE);
            };
            let mut reasons = self
                .driver
                .status(Some(&mut *device))
                .map_err(driver_error("status"))?;
            match device.status() {
                Ok(device_reasons) => reasons |= device_reasons,
                Err(DruckwerkError::NotSupported(_)) => {}
                Err(e) => debug!(error = %e, "device status query failed"),
            }
            Ok(reasons)
        });
        let Some(reasons) = polled else {
            return Ok(self.reasons());
        };
        let reasons = reasons?;
        let mut inner = self.write();
        let keep = inner.reasons & PrinterReasons::IDENTIFY_PRINTER_REQUESTED;
        let state = inner.state;
        self.set_state_locked(&mut inner, state, Some(reasons | keep));
        Ok(inner.reasons)
    }

    /// Marker supplies; the last known levels while a job holds the device.
    pub fn supplies(&self) -> Result<Vec<Supply>> {
        match self.with_idle_device(|device| self.driver.supplies(device)) {
            Some(supplies) => {
                let supplies = supplies.map_err(driver_error("supplies"))?;
                self.write().supplies = supplies.clone();
                Ok(supplies)
            }
            None => Ok(self.read().supplies.clone()),
        }
    }

    /// IEEE-1284 device ID, cached after the first successful query.
    pub fn device_id(&self) -> Result<String> {
        let queried = self.with_idle_device(|device| device.map(|d| d.device_id()));
        match queried {
            Some(Some(Ok(id))) => {
                self.write().device_id = Some(id.clone());
                Ok(id)
            }
            Some(Some(Err(e))) if !matches!(e, DruckwerkError::NotSupported(_)) => Err(e),
            _ => self
                .read()
                .device_id
                .clone()
                .ok_or(DruckwerkError::NotSupported("device id")),
        }
    }

    /// Ask the driver to draw attention to the printer. Empty `actions`
    /// means the driver's default.
    pub fn identify(&self, actions: IdentifyActions, message: Option<&str>) -> Result<()> {
        let data = self.driver.data();
        let actions = if actions.is_empty() {
            data.identify_default
        } else {
            actions
        };
        if !data.identify_supported.contains(actions) {
            return Err(DruckwerkError::InvalidAttribute {
                name: "identify-actions".into(),
                reason: format!("{actions:?} not supported"),
            });
        }
        let result = match self.with_idle_device(|device| self.driver.identify(device, actions, message)) {
            Some(result) => result,
            None => self.driver.identify(None, actions, message),
        };
        result.map_err(driver_error("identify"))
    }

    /// Queue the driver's test page as a job.
    pub fn print_test_page(&self) -> Result<Arc<Job>> {
        let path = self
            .driver
            .test_page(self.ctx.spool.dir())
            .map_err(driver_error("test_page"))?
            .ok_or(DruckwerkError::NotSupported("test page"))?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(DocumentFormat::from_extension)
            .unwrap_or_else(|| DocumentFormat::Other("application/octet-stream".into()));
        let mut file = std::fs::File::open(&path)?;
        let job = self.print_job("Test Page", "druckwerk", PrintRequest::default(), &mut file, format);
        crate::spool::remove_spool_file(&path);
        job
    }

    // -- Scheduling --

    /// Ask the scheduler to look for a pending job.
    pub(crate) fn notify(&self) {
        if let Some(scheduler) = self.scheduler.lock().expect("scheduler lock poisoned").as_ref() {
            scheduler.check_jobs();
        }
    }

    /// Claim the first pending job and start its worker. Runs on the
    /// scheduler thread.
    pub(crate) fn check_jobs(self: &Arc<Self>) {
        if self.ctx.is_shutting_down() {
            return;
        }
        let job = {
            let mut inner = self.write();
            if inner.deleted || inner.paused || inner.processing.is_some() {
                return;
            }
            let Some(job) = inner
                .active
                .iter()
                .find(|j| j.state() == JobState::Pending)
                .cloned()
            else {
                return;
            };
            job.set_state(JobState::Processing, None);
            inner.processing = Some(job.id());
            job
        };
        self.publish_job(&job);

        match worker::spawn(self.clone(), job.clone()) {
            Ok(handle) => {
                let mut workers = self.workers.lock().expect("worker list lock poisoned");
                workers.retain(|h| !h.is_finished());
                workers.push(handle);
            }
            Err(e) => {
                error!(printer = %self.name, job_id = %job.id(), error = %e, "cannot start job worker");
                self.finish_job(&job, JobState::Pending, None, false);
            }
        }
    }

    /// Record a job's final state for this attempt and free the printer.
    pub(crate) fn finish_job(
        &self,
        job: &Arc<Job>,
        state: JobState,
        message: Option<String>,
        held_device: bool,
    ) {
        {
            let mut inner = self.write();
            job.set_state(state, message);
            if state.is_terminal() {
                move_to_completed(&mut inner, job);
            }
            if inner.processing == Some(job.id()) {
                inner.processing = None;
            }
            if held_device {
                inner.device_in_use = false;
            }
            let next = if inner.paused {
                PrinterState::Stopped
            } else {
                PrinterState::Idle
            };
            let reasons = inner.reasons - PrinterReasons::OFFLINE;
            self.set_state_locked(&mut inner, next, Some(reasons));
        }
        self.publish_job(job);
        self.clean_jobs();
        self.notify();
    }

    /// Finish a job that never reached a worker.
    fn finish_unprocessed(&self, job: &Arc<Job>, state: JobState, message: Option<String>) {
        {
            let mut inner = self.write();
            job.set_state(state, message);
            if state.is_terminal() {
                move_to_completed(&mut inner, job);
            }
        }
        self.publish_job(job);
        self.clean_jobs();
    }

    fn publish_job(&self, job: &Job) {
        let inner = job.read();
        self.ctx.events.publish(Event::JobStateChanged {
            printer: self.name.clone(),
            job_id: job.id(),
            state: inner.state,
            message: inner.message.clone(),
        });
    }

    fn publish_config(&self) {
        self.ctx.events.publish(Event::PrinterConfigChanged {
            printer: self.name.clone(),
        });
    }

    // -- Teardown --

    /// Mark deleted and cancel everything; workers notice at their next
    /// boundary.
    pub(crate) fn delete(&self) {
        {
            let mut inner = self.write();
            inner.deleted = true;
        }
        let canceled = self.cancel_all_jobs();
        info!(printer = %self.name, canceled, "printer deleted");
        self.publish_config();
        self.stop();
    }

    /// Stop the scheduler, wait for workers and close a kept device.
    pub(crate) fn stop(&self) {
        let scheduler = self.scheduler.lock().expect("scheduler lock poisoned").take();
        if let Some(scheduler) = scheduler {
            scheduler.stop();
        }
        let workers = std::mem::take(&mut *self.workers.lock().expect("worker list lock poisoned"));
        for handle in workers {
            if handle.join().is_err() {
                error!(printer = %self.name, "job worker panicked");
            }
        }
        if let Some(mut device) = self.take_kept_device() {
            if let Err(e) = device.close() {
                warn!(printer = %self.name, error = %e, "error closing device");
            }
        }
    }
}

fn move_to_completed(inner: &mut PrinterInner, job: &Arc<Job>) {
    if let Some(pos) = inner.active.iter().position(|j| j.id() == job.id()) {
        let job = inner.active.remove(pos);
        inner.completed.push_back(job);
    }
}
