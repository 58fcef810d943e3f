// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The printing system: registered drivers, printers, the shared device
// registry, spool and event bus, and orderly shutdown.

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use druckwerk_core::config::SystemConfig;
use druckwerk_core::error::{DruckwerkError, Result};
use druckwerk_core::types::{DocumentFormat, JobId};
use druckwerk_device::{DeviceListing, DeviceType, SchemeRegistry};
use druckwerk_raster::{Driver, PWG_DRIVER_NAME, PrintRequest, PwgDriver};

use crate::event::{Event, EventBus};
use crate::job::{Job, JobAttributes};
use crate::printer::Printer;
use crate::spool::Spool;

/// Longest single sleep, so waits notice shutdown promptly.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// State shared by the system, its printers and their workers.
#[derive(Debug)]
pub(crate) struct SystemContext {
    pub(crate) config: SystemConfig,
    pub(crate) registry: SchemeRegistry,
    pub(crate) events: EventBus,
    pub(crate) spool: Spool,
    shutdown: AtomicBool,
}

impl SystemContext {
    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` or until shutdown starts.
    pub(crate) fn sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while !self.is_shutting_down() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

pub struct System {
    ctx: Arc<SystemContext>,
    drivers: RwLock<BTreeMap<String, Arc<dyn Driver>>>,
    printers: RwLock<BTreeMap<String, Arc<Printer>>>,
}

impl System {
    /// A system with the built-in device schemes and the `pwg` driver.
    pub fn new(config: SystemConfig) -> Result<Self> {
        let registry = SchemeRegistry::with_buffer_size(config.write_buffer_size);
        Self::with_registry(config, registry)
    }

    pub fn with_registry(config: SystemConfig, registry: SchemeRegistry) -> Result<Self> {
        config.validate()?;
        for scheme in &config.disabled_schemes {
            if registry.remove_scheme(scheme) {
                info!(scheme = %scheme, "device scheme disabled");
            }
        }
        let spool = Spool::open(&config.spool_dir)?;
        info!(spool = %spool.dir().display(), schemes = ?registry.schemes(), "printing system ready");

        let system = Self {
            ctx: Arc::new(SystemContext {
                config,
                registry,
                events: EventBus::new(),
                spool,
                shutdown: AtomicBool::new(false),
            }),
            drivers: RwLock::new(BTreeMap::new()),
            printers: RwLock::new(BTreeMap::new()),
        };
        system.register_driver(PWG_DRIVER_NAME, Arc::new(PwgDriver::new()));
        Ok(system)
    }

    pub fn config(&self) -> &SystemConfig {
        &self.ctx.config
    }

    pub fn registry(&self) -> &SchemeRegistry {
        &self.ctx.registry
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.ctx.events.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.ctx.is_shutting_down()
    }

    // -- Drivers --

    /// Register (or replace) a driver under `name`.
    pub fn register_driver(&self, name: &str, driver: Arc<dyn Driver>) {
        self.drivers
            .write()
            .expect("driver table lock poisoned")
            .insert(name.to_string(), driver);
    }

    pub fn drivers(&self) -> Vec<String> {
        self.drivers
            .read()
            .expect("driver table lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    // -- Printers --

    #[instrument(skip(self))]
    pub fn add_printer(&self, name: &str, device_uri: &str, driver: &str) -> Result<Arc<Printer>> {
        if self.is_shutting_down() {
            return Err(DruckwerkError::ShuttingDown);
        }
        if name.trim().is_empty() {
            return Err(DruckwerkError::InvalidArgument("printer name is empty".into()));
        }
        if !self.ctx.registry.is_supported(device_uri) {
            let scheme = device_uri.split(':').next().unwrap_or(device_uri);
            return Err(DruckwerkError::UnsupportedScheme(scheme.to_string()));
        }
        let driver_impl = self
            .drivers
            .read()
            .expect("driver table lock poisoned")
            .get(driver)
            .cloned()
            .ok_or_else(|| DruckwerkError::InvalidArgument(format!("unknown driver '{driver}'")))?;

        let mut printers = self.printers.write().expect("printer table lock poisoned");
        if printers.contains_key(name) {
            return Err(DruckwerkError::InvalidArgument(format!(
                "printer '{name}' already exists"
            )));
        }
        let printer = Printer::new(name, device_uri, driver, driver_impl, self.ctx.clone())?;
        printers.insert(name.to_string(), printer.clone());
        drop(printers);

        info!(uri = %device_uri, "printer added");
        self.ctx.events.publish(Event::PrinterConfigChanged {
            printer: name.to_string(),
        });
        Ok(printer)
    }

    /// Create every printer listed in the configuration.
    pub fn add_configured_printers(&self) -> Result<Vec<Arc<Printer>>> {
        self.ctx
            .config
            .printers
            .iter()
            .map(|p| self.add_printer(&p.name, &p.device_uri, &p.driver))
            .collect()
    }

    pub fn printer(&self, name: &str) -> Result<Arc<Printer>> {
        self.printers
            .read()
            .expect("printer table lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| DruckwerkError::PrinterNotFound(name.to_string()))
    }

    pub fn printers(&self) -> Vec<Arc<Printer>> {
        self.printers
            .read()
            .expect("printer table lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Remove a printer, canceling its jobs.
    pub fn delete_printer(&self, name: &str) -> Result<()> {
        let printer = self
            .printers
            .write()
            .expect("printer table lock poisoned")
            .remove(name)
            .ok_or_else(|| DruckwerkError::PrinterNotFound(name.to_string()))?;
        printer.delete();
        Ok(())
    }

    // -- Jobs --

    pub fn create_job(
        &self,
        printer: &str,
        name: &str,
        username: &str,
        request: PrintRequest,
    ) -> Result<Arc<Job>> {
        self.printer(printer)?.create_job(name, username, request)
    }

    pub fn submit_document(
        &self,
        printer: &str,
        job_id: JobId,
        reader: &mut dyn Read,
        format: DocumentFormat,
        request: PrintRequest,
        is_last: bool,
    ) -> Result<()> {
        self.printer(printer)?
            .submit_document(job_id, reader, format, request, is_last)
    }

    pub fn cancel_job(&self, printer: &str, job_id: JobId) -> Result<()> {
        self.printer(printer)?.cancel_job(job_id)
    }

    pub fn get_job_attributes(&self, printer: &str, job_id: JobId) -> Result<JobAttributes> {
        self.printer(printer)?.job_attributes(job_id)
    }

    pub fn list_devices(&self, filter: Option<DeviceType>) -> Vec<DeviceListing> {
        self.ctx.registry.list_devices(filter)
    }

    // -- Shutdown --

    /// Stop accepting work, let workers reach a page boundary, and wait for
    /// them. Interrupted jobs go back to pending. Safe to call twice.
    pub fn shutdown(&self) {
        if self.ctx.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("shutting down");
        for printer in self.printers() {
            printer.stop();
        }
        info!("shutdown complete");
    }
}

impl Drop for System {
    fn drop(&mut self) {
        if !self.is_shutting_down() {
            warn!("system dropped without shutdown");
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicU32;

    use druckwerk_core::media::MediaCol;
    use druckwerk_core::types::{ColorMode, JobState, PageRange, PrinterState, Resolution};
    use druckwerk_device::{Connection, DeviceScheme, DeviceSchemeEntry, DeviceUri, OpenContext, Writable};
    use druckwerk_raster::pwg::{PwgReader, PwgWriter};
    use druckwerk_raster::{DriverData, PixelFormat, RasterHeader, pwg_driver_data};

    use super::*;

    /// Scheme whose devices record writes in memory. The first
    /// `fail_opens` opens report the printer as unreachable.
    #[derive(Clone, Default)]
    struct MemoryScheme {
        data: Arc<Mutex<Vec<u8>>>,
        fail_opens: Arc<AtomicU32>,
        opens: Arc<AtomicU32>,
        /// Writes block while this is set.
        gate: Arc<AtomicBool>,
    }

    struct MemoryConnection {
        data: Arc<Mutex<Vec<u8>>>,
        gate: Arc<AtomicBool>,
    }

    impl Writable for MemoryConnection {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            while self.gate.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(5));
            }
            self.data.lock().expect("data lock").extend_from_slice(buf);
            Ok(buf.len())
        }
    }

    impl Connection for MemoryConnection {}

    impl DeviceScheme for MemoryScheme {
        fn open(&self, uri: &DeviceUri, _ctx: &OpenContext<'_>) -> Result<Box<dyn Connection>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let remaining = self.fail_opens.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_opens.store(remaining - 1, Ordering::SeqCst);
                return Err(DruckwerkError::DeviceOpen {
                    uri: uri.as_str().to_string(),
                    reason: "printer is offline".into(),
                });
            }
            Ok(Box::new(MemoryConnection {
                data: self.data.clone(),
                gate: self.gate.clone(),
            }))
        }
    }

    fn system(scheme: &MemoryScheme, dir: &std::path::Path) -> System {
        let config = SystemConfig {
            spool_dir: dir.join("spool"),
            busy_poll_interval_ms: 10,
            open_retry_interval_ms: 20,
            max_completed_jobs: 2,
            ..SystemConfig::default()
        };
        let registry = SchemeRegistry::empty();
        registry.add_scheme(DeviceSchemeEntry::new("mem", DeviceType::Network, scheme.clone()));
        System::with_registry(config, registry).expect("system")
    }

    fn wait_for(what: &str, mut check: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !check() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    /// A small PWG raster document for the pwg driver to pass through.
    fn raw_document() -> Vec<u8> {
        let mut doc = b"RaS2".to_vec();
        doc.extend_from_slice(&[0u8; 64]);
        doc
    }

    fn submit(system: &System, printer: &str) -> Arc<Job> {
        let job = system
            .create_job(printer, "doc", "alice", PrintRequest::default())
            .expect("create job");
        system
            .submit_document(
                printer,
                job.id(),
                &mut raw_document().as_slice(),
                DocumentFormat::PwgRaster,
                PrintRequest::default(),
                true,
            )
            .expect("submit");
        job
    }

    /// 30x15 pixel pages at 150dpi.
    fn tiny_request() -> PrintRequest {
        PrintRequest {
            media: MediaCol::from_pwg_name("custom_tiny_0.2x0.1in", 0),
            resolution: Some(Resolution::new(150, 150)),
            ..Default::default()
        }
    }

    fn png_document() -> Vec<u8> {
        let mut png = Vec::new();
        image::GrayImage::from_pixel(4, 4, image::Luma([0u8]))
            .write_to(&mut io::Cursor::new(&mut png), image::ImageFormat::Png)
            .expect("encode png");
        png
    }

    /// A PWG stream of `pages` small gray pages.
    fn pwg_document(pages: u32) -> Vec<u8> {
        let mut data = Vec::new();
        let mut writer = PwgWriter::new();
        writer.write_sync(&mut data).expect("sync");
        let mut header = RasterHeader::new(30, 15, PixelFormat::Sgray8, [150, 150]);
        header.total_page_count = pages;
        for _ in 0..pages {
            writer.start_page(&mut data, &header).expect("start");
            for _ in 0..15 {
                writer.write_line(&mut data, &[0x80; 30]).expect("line");
            }
            writer.end_page(&mut data).expect("end");
        }
        data
    }

    /// Page headers of everything the pwg driver sent to the device.
    fn printed_headers(scheme: &MemoryScheme) -> Vec<RasterHeader> {
        let data = scheme.data.lock().expect("data lock").clone();
        let mut reader = PwgReader::new(data.as_slice()).expect("pwg stream");
        let mut headers = Vec::new();
        while let Some(header) = reader.next_header().expect("page header") {
            headers.push(header.clone());
        }
        headers
    }

    fn submit_as(
        system: &System,
        job: &Job,
        document: Vec<u8>,
        format: DocumentFormat,
        request: PrintRequest,
        is_last: bool,
    ) {
        system
            .submit_document("lp", job.id(), &mut document.as_slice(), format, request, is_last)
            .expect("submit");
    }

    #[test]
    fn raw_job_reaches_the_device() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scheme = MemoryScheme::default();
        let system = system(&scheme, dir.path());
        system.add_printer("lp", "mem://lp", "pwg").expect("add printer");

        let job = submit(&system, "lp");
        wait_for("completion", || job.state() == JobState::Completed);

        assert_eq!(*scheme.data.lock().expect("data lock"), raw_document());
        let printer = system.printer("lp").expect("printer");
        assert_eq!(printer.state(), PrinterState::Idle);
        assert!(printer.active_jobs().is_empty());
        assert_eq!(printer.completed_jobs().len(), 1);
        system.shutdown();
    }

    #[test]
    fn unknown_scheme_and_driver_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let system = system(&MemoryScheme::default(), dir.path());
        assert!(matches!(
            system.add_printer("lp", "gopher://x", "pwg"),
            Err(DruckwerkError::UnsupportedScheme(s)) if s == "gopher"
        ));
        assert!(system.add_printer("lp", "mem://x", "nope").is_err());
        assert!(matches!(system.printer("lp"), Err(DruckwerkError::PrinterNotFound(_))));
    }

    #[test]
    fn pending_job_cancels_without_touching_the_device() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scheme = MemoryScheme::default();
        let system = system(&scheme, dir.path());
        let printer = system.add_printer("lp", "mem://lp", "pwg").expect("add printer");
        printer.pause();

        let job = submit(&system, "lp");
        assert_eq!(job.state(), JobState::Pending);
        system.cancel_job("lp", job.id()).expect("cancel");

        assert_eq!(job.state(), JobState::Canceled);
        assert!(printer.active_jobs().is_empty());
        assert_eq!(printer.completed_jobs().len(), 1);
        assert_eq!(scheme.opens.load(Ordering::SeqCst), 0);
        assert!(matches!(
            system.cancel_job("lp", job.id()),
            Err(DruckwerkError::InvalidJobState { .. })
        ));
        system.shutdown();
    }

    #[test]
    fn one_job_processes_at_a_time() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scheme = MemoryScheme::default();
        scheme.gate.store(true, Ordering::SeqCst);
        let system = system(&scheme, dir.path());
        let printer = system.add_printer("lp", "mem://lp", "pwg").expect("add printer");

        let first = submit(&system, "lp");
        let second = submit(&system, "lp");
        wait_for("first job to start", || first.state() == JobState::Processing);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(second.state(), JobState::Pending);
        assert_eq!(printer.attributes().processing_job, Some(first.id()));

        // Every job sits in exactly one queue.
        let active: Vec<JobId> = printer.active_jobs().iter().map(|j| j.id()).collect();
        assert_eq!(active, vec![first.id(), second.id()]);
        assert!(printer.completed_jobs().is_empty());

        scheme.gate.store(false, Ordering::SeqCst);
        wait_for("both jobs", || second.state() == JobState::Completed);
        assert_eq!(first.state(), JobState::Completed);
        system.shutdown();
    }

    #[test]
    fn processing_job_cancels_at_the_next_boundary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scheme = MemoryScheme::default();
        scheme.gate.store(true, Ordering::SeqCst);
        let system = system(&scheme, dir.path());
        system.add_printer("lp", "mem://lp", "pwg").expect("add printer");

        let job = submit(&system, "lp");
        wait_for("processing", || job.state() == JobState::Processing);
        system.cancel_job("lp", job.id()).expect("cancel");
        assert_eq!(job.state(), JobState::Processing);
        assert!(job.attributes().cancel_requested);

        scheme.gate.store(false, Ordering::SeqCst);
        wait_for("cancel", || job.state() == JobState::Canceled);
        system.shutdown();
    }

    #[test]
    fn offline_printer_stops_once_then_processes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scheme = MemoryScheme::default();
        scheme.fail_opens.store(3, Ordering::SeqCst);
        let system = system(&scheme, dir.path());
        let mut events = system.subscribe();
        let printer = system.add_printer("lp", "mem://lp", "pwg").expect("add printer");

        let job = submit(&system, "lp");
        wait_for("completion", || job.state() == JobState::Completed);
        wait_for("idle", || printer.state() == PrinterState::Idle);
        assert_eq!(scheme.opens.load(Ordering::SeqCst), 4);

        let mut states = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let Event::PrinterStateChanged { state, .. } = event {
                if states.last() != Some(&state) {
                    states.push(state);
                }
            }
        }
        assert_eq!(
            states,
            vec![PrinterState::Stopped, PrinterState::Processing, PrinterState::Idle]
        );
        system.shutdown();
    }

    #[test]
    fn suspended_job_waits_for_resume() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scheme = MemoryScheme::default();
        let system = system(&scheme, dir.path());
        let printer = system.add_printer("lp", "mem://lp", "pwg").expect("add printer");
        printer.pause();

        let job = submit(&system, "lp");
        printer.suspend_job(job.id()).expect("suspend");
        assert_eq!(job.state(), JobState::Stopped);
        printer.resume();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(job.state(), JobState::Stopped);

        printer.resume_job(job.id()).expect("resume job");
        wait_for("completion", || job.state() == JobState::Completed);
        system.shutdown();
    }

    #[test]
    fn completed_jobs_are_purged_beyond_the_limit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scheme = MemoryScheme::default();
        let system = system(&scheme, dir.path());
        let printer = system.add_printer("lp", "mem://lp", "pwg").expect("add printer");

        let jobs: Vec<Arc<Job>> = (0..3).map(|_| submit(&system, "lp")).collect();
        wait_for("all jobs", || jobs.iter().all(|j| j.is_terminal()));
        wait_for("purge", || printer.completed_jobs().len() == 2);

        let oldest = jobs[0].documents()[0].path.clone();
        assert!(!oldest.exists());
        assert!(matches!(
            printer.job(jobs[0].id()),
            Err(DruckwerkError::JobNotFound(_))
        ));
        assert!(printer.job(jobs[2].id()).is_ok());
        system.shutdown();
    }

    #[test]
    fn shutdown_requeues_a_job_waiting_for_its_device() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scheme = MemoryScheme::default();
        scheme.fail_opens.store(u32::MAX, Ordering::SeqCst);
        let system = system(&scheme, dir.path());
        let printer = system.add_printer("lp", "mem://lp", "pwg").expect("add printer");

        let job = submit(&system, "lp");
        wait_for("offline", || printer.state() == PrinterState::Stopped);
        system.shutdown();

        assert_eq!(job.state(), JobState::Pending);
        assert!(matches!(
            system.create_job("lp", "late", "bob", PrintRequest::default()),
            Err(DruckwerkError::ShuttingDown)
        ));
        system.shutdown();
    }

    #[test]
    fn test_page_is_rasterized() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scheme = MemoryScheme::default();
        let system = system(&scheme, dir.path());
        let printer = system.add_printer("lp", "mem://lp", "pwg").expect("add printer");

        let job = printer.print_test_page().expect("test page");
        wait_for("test page", || job.is_terminal());
        assert_eq!(job.state(), JobState::Completed);
        let data = scheme.data.lock().expect("data lock");
        assert!(data.starts_with(b"RaS2"));
        assert!(data.len() > 4 + 1796);
        drop(data);
        system.shutdown();
    }

    #[test]
    fn deleted_printer_cancels_its_jobs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let system = system(&MemoryScheme::default(), dir.path());
        let printer = system.add_printer("lp", "mem://lp", "pwg").expect("add printer");
        printer.pause();
        let job = submit(&system, "lp");

        system.delete_printer("lp").expect("delete");
        assert_eq!(job.state(), JobState::Canceled);
        assert!(matches!(
            printer.create_job("x", "bob", PrintRequest::default()),
            Err(DruckwerkError::PrinterDeleted(_))
        ));
        assert!(system.printers().is_empty());
    }

    #[test]
    fn each_document_prints_with_its_own_options() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scheme = MemoryScheme::default();
        let system = system(&scheme, dir.path());
        system.add_printer("lp", "mem://lp", "pwg").expect("add printer");

        let job = system
            .create_job("lp", "pair", "alice", tiny_request())
            .expect("create job");
        submit_as(&system, &job, png_document(), DocumentFormat::Png, PrintRequest::default(), false);
        let bilevel = PrintRequest {
            color_mode: Some(ColorMode::BiLevel),
            ..Default::default()
        };
        submit_as(&system, &job, png_document(), DocumentFormat::Png, bilevel, true);
        wait_for("completion", || job.is_terminal());
        assert_eq!(job.state(), JobState::Completed);

        let bits: Vec<u32> = printed_headers(&scheme).iter().map(|h| h.bits_per_pixel).collect();
        assert_eq!(bits, [8, 1]);
        system.shutdown();
    }

    #[test]
    fn impressions_total_is_known_before_pages_print() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scheme = MemoryScheme::default();
        scheme.gate.store(true, Ordering::SeqCst);
        let system = system(&scheme, dir.path());
        system.add_printer("lp", "mem://lp", "pwg").expect("add printer");

        // Six copies outgrow the device buffer, so the gate holds the job
        // part way through.
        let request = PrintRequest {
            copies: Some(6),
            ..tiny_request()
        };
        let job = system.create_job("lp", "copies", "alice", request).expect("create job");
        submit_as(&system, &job, png_document(), DocumentFormat::Png, PrintRequest::default(), true);

        wait_for("impression total", || job.attributes().impressions == 6);
        std::thread::sleep(Duration::from_millis(50));
        let attrs = job.attributes();
        assert_eq!(attrs.state, JobState::Processing);
        assert!(attrs.impressions > attrs.impressions_completed);

        scheme.gate.store(false, Ordering::SeqCst);
        wait_for("completion", || job.state() == JobState::Completed);
        let attrs = job.attributes();
        assert_eq!((attrs.impressions, attrs.impressions_completed), (6, 6));
        system.shutdown();
    }

    #[test]
    fn page_range_is_clamped_to_the_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scheme = MemoryScheme::default();
        let system = system(&scheme, dir.path());
        let data = DriverData {
            native_formats: Vec::new(),
            ..pwg_driver_data()
        };
        system.register_driver("rasterize", Arc::new(PwgDriver::with_data(data)));
        system.add_printer("lp", "mem://lp", "rasterize").expect("add printer");

        let past_the_end = PrintRequest {
            page_range: Some(PageRange { first: 5, last: 10 }),
            ..tiny_request()
        };
        let job = system.create_job("lp", "none", "alice", past_the_end).expect("create job");
        submit_as(&system, &job, pwg_document(3), DocumentFormat::PwgRaster, PrintRequest::default(), true);
        wait_for("first job", || job.is_terminal());
        assert_eq!(job.state(), JobState::Completed);
        assert!(printed_headers(&scheme).is_empty());
        assert_eq!(job.attributes().impressions, 0);

        let tail = PrintRequest {
            page_range: Some(PageRange { first: 2, last: 10 }),
            ..tiny_request()
        };
        scheme.data.lock().expect("data lock").clear();
        let job = system.create_job("lp", "tail", "alice", tail).expect("create job");
        submit_as(&system, &job, pwg_document(3), DocumentFormat::PwgRaster, PrintRequest::default(), true);
        wait_for("second job", || job.is_terminal());
        assert_eq!(job.state(), JobState::Completed);
        assert_eq!(printed_headers(&scheme).len(), 2);
        assert_eq!(job.attributes().impressions, 2);
        system.shutdown();
    }
}
