// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster execution: drives the driver's start_job / start_page / write_line /
// end_page / end_job callbacks over copies x documents x pages.
//
// Cancellation and suspension are only honoured between pages, documents
// and copies.  `end_job` runs exactly once whenever `start_job` succeeded.
// Each copy of each document starts on a fresh sheet: a duplex run that
// ends on a front side is followed by a blank back side.

use std::path::PathBuf;

use tracing::{debug, info, instrument, warn};

use druckwerk_core::error::{DruckwerkError, Result};
use druckwerk_core::types::DocumentFormat;
use druckwerk_device::Device;

use crate::convert::LineConverter;
use crate::driver::{Driver, DriverError, JobInfo, RasterJob};
use crate::options::PrintOptions;
use crate::source::{PageSource, SourcePage, open_document};

/// Hooks the pipeline uses to observe and report on its job.
pub trait JobProgress {
    fn is_canceled(&self) -> bool;

    fn is_suspended(&self) -> bool {
        false
    }

    /// `pages` pages have been fully sent.
    fn page_completed(&self, _pages: u32) {}

    /// `copies` copies have been fully sent.
    fn copy_completed(&self, _copies: u32) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    NotStarted,
    JobStarted,
    PageStarted,
    WritingLines,
    PageEnded,
    JobEnded,
}

/// How a raster run ended when no error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterOutcome {
    Completed,
    Canceled,
    /// Suspended at a page boundary.
    Stopped,
}

/// A spooled document to rasterize.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterDocument {
    pub path: PathBuf,
    pub format: DocumentFormat,
    /// Options resolved for this document; the job's options when `None`.
    pub options: Option<PrintOptions>,
}

impl RasterDocument {
    pub fn new(path: impl Into<PathBuf>, format: DocumentFormat) -> Self {
        Self {
            path: path.into(),
            format,
            options: None,
        }
    }

    pub fn with_options(mut self, options: PrintOptions) -> Self {
        self.options = Some(options);
        self
    }
}

fn driver_failure(callback: &'static str) -> impl Fn(DriverError) -> DruckwerkError {
    move |err| DruckwerkError::Driver {
        callback,
        message: err.message().to_string(),
    }
}

/// One raster run of a job.
pub struct RasterPipeline<'a> {
    driver: &'a dyn Driver,
    job: &'a JobInfo,
    options: &'a PrintOptions,
    progress: &'a dyn JobProgress,
    state: PipelineState,
    /// Pages handed to the driver, blank back sides included.
    pages: u32,
    /// Document pages printed.
    impressions: u32,
    /// Sides printed in the current copy of the current document.
    sides: u32,
}

impl<'a> RasterPipeline<'a> {
    pub fn new(
        driver: &'a dyn Driver,
        job: &'a JobInfo,
        options: &'a PrintOptions,
        progress: &'a dyn JobProgress,
    ) -> Self {
        Self {
            driver,
            job,
            options,
            progress,
            state: PipelineState::NotStarted,
            pages: 0,
            impressions: 0,
            sides: 0,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Pages sent so far.
    pub fn pages(&self) -> u32 {
        self.pages
    }

    #[instrument(skip_all, fields(job_id = %self.job.id, printer = %self.job.printer))]
    pub fn run(&mut self, device: &mut Device, documents: &[RasterDocument]) -> Result<RasterOutcome> {
        let mut raster = self
            .driver
            .start_job(self.job, self.options, device)
            .map_err(driver_failure("start_job"))?;
        self.state = PipelineState::JobStarted;

        let result = self.run_documents(raster.as_mut(), device, documents);

        let ended = raster
            .end_job(self.options, device)
            .map_err(driver_failure("end_job"));
        self.state = PipelineState::JobEnded;

        match (result, ended) {
            (Err(err), ended) => {
                if let Err(end_err) = ended {
                    warn!(error = %end_err, "end_job failed after an earlier error");
                }
                Err(err)
            }
            (Ok(_), Err(err)) => Err(err),
            (Ok(outcome), Ok(())) => {
                info!(pages = self.pages, outcome = ?outcome, "raster job finished");
                Ok(outcome)
            }
        }
    }

    fn interrupted(&self) -> Option<RasterOutcome> {
        if self.progress.is_canceled() {
            Some(RasterOutcome::Canceled)
        } else if self.progress.is_suspended() {
            Some(RasterOutcome::Stopped)
        } else {
            None
        }
    }

    fn run_documents(
        &mut self,
        raster: &mut dyn RasterJob,
        device: &mut Device,
        documents: &[RasterDocument],
    ) -> Result<RasterOutcome> {
        // Client-rendered raster already carries its copies.
        let streaming = documents.len() == 1
            && matches!(
                documents[0].format,
                DocumentFormat::PwgRaster | DocumentFormat::AppleRaster
            );
        let loops = if streaming { 1 } else { self.options.copy_loops() };
        let mut previous: Option<&PrintOptions> = None;

        for copy in 0..loops {
            if let Some(outcome) = self.interrupted() {
                return Ok(outcome);
            }
            for doc in documents {
                if let Some(outcome) = self.interrupted() {
                    return Ok(outcome);
                }
                let options = doc.options.as_ref().unwrap_or(self.options);
                if let Some(previous) = previous {
                    self.finish_sheet(raster, device, previous)?;
                }
                debug!(path = %doc.path.display(), format = %doc.format, copy, "rasterizing document");
                let mut source = open_document(&doc.path, &doc.format, options)?;
                if let Some(outcome) =
                    self.run_source(raster, device, source.as_mut(), options, streaming)?
                {
                    return Ok(outcome);
                }
                previous = Some(options);
            }
            if !streaming {
                self.progress.copy_completed(copy + 1);
            }
        }
        Ok(RasterOutcome::Completed)
    }

    fn run_source(
        &mut self,
        raster: &mut dyn RasterJob,
        device: &mut Device,
        source: &mut dyn PageSource,
        options: &PrintOptions,
        streaming: bool,
    ) -> Result<Option<RasterOutcome>> {
        let mut input_page = 0u32;
        let mut pages_per_set = None;

        while let Some(page) = source.next_page()? {
            input_page += 1;
            if input_page == 1 && streaming {
                pages_per_set = page.total_pages.and_then(|total| {
                    let copies = options.copies.max(1);
                    (copies > 1 && total >= copies && total % copies == 0).then_some(total / copies)
                });
            }
            if !options.includes_page(input_page) {
                continue;
            }
            if let Some(outcome) = self.interrupted() {
                return Ok(Some(outcome));
            }

            self.print_page(raster, device, source, &page, options)?;

            if let Some(per_set) = pages_per_set {
                if input_page % per_set == 0 {
                    self.progress.copy_completed(input_page / per_set);
                }
            }
        }
        if streaming && pages_per_set.is_none() {
            self.progress.copy_completed(options.copies.max(1));
        }
        Ok(None)
    }

    fn print_page(
        &mut self,
        raster: &mut dyn RasterJob,
        device: &mut Device,
        source: &mut dyn PageSource,
        page: &SourcePage,
        options: &PrintOptions,
    ) -> Result<()> {
        let page_no = self.pages + 1;
        self.sides += 1;
        let header = options.header_for_page(self.sides, Some(page.format.is_color()));
        let format = header.pixel_format()?;

        raster
            .start_page(options, device, page_no, &header)
            .map_err(driver_failure("start_page"))?;
        self.state = PipelineState::PageStarted;

        let mut converter = LineConverter::new(
            page.format,
            page.width,
            format,
            header.width,
            options.dither_matrix(),
        );
        let mut input = vec![0u8; converter.source_bytes()];
        let mut output = vec![0u8; converter.output_bytes()];

        self.state = PipelineState::WritingLines;
        for y in 0..header.height {
            if y < page.height {
                source.read_line(&mut input)?;
                converter.convert(&input, y, &mut output);
            } else {
                converter.white_line(&mut output);
            }
            raster
                .write_line(options, device, y, &output)
                .map_err(driver_failure("write_line"))?;
        }
        // Rows the output page has no room for are read and dropped.
        for _ in header.height..page.height {
            source.read_line(&mut input)?;
        }

        raster
            .end_page(options, device, page_no)
            .map_err(driver_failure("end_page"))?;
        self.state = PipelineState::PageEnded;
        self.pages = page_no;
        self.impressions += 1;
        self.progress.page_completed(self.impressions);
        Ok(())
    }

    /// Close the sheet of the run that just ended so the next copy or
    /// document starts on a front side.
    fn finish_sheet(
        &mut self,
        raster: &mut dyn RasterJob,
        device: &mut Device,
        options: &PrintOptions,
    ) -> Result<()> {
        if options.sides.is_duplex() && self.sides % 2 == 1 {
            self.blank_back_side(raster, device, options)?;
        }
        self.sides = 0;
        Ok(())
    }

    fn blank_back_side(
        &mut self,
        raster: &mut dyn RasterJob,
        device: &mut Device,
        options: &PrintOptions,
    ) -> Result<()> {
        let page_no = self.pages + 1;
        let header = options.header_for_page(self.sides + 1, Some(false));
        let format = header.pixel_format()?;
        debug!(page = page_no, "blank back side");

        raster
            .start_page(options, device, page_no, &header)
            .map_err(driver_failure("start_page"))?;
        self.state = PipelineState::PageStarted;

        let line = vec![format.white(); format.bytes_per_line(header.width)];
        self.state = PipelineState::WritingLines;
        for y in 0..header.height {
            raster
                .write_line(options, device, y, &line)
                .map_err(driver_failure("write_line"))?;
        }

        raster
            .end_page(options, device, page_no)
            .map_err(driver_failure("end_page"))?;
        self.state = PipelineState::PageEnded;
        self.pages = page_no;
        Ok(())
    }
}

/// Run one raster pass of a job with already resolved options.
pub fn run_raster_job(
    driver: &dyn Driver,
    job: &JobInfo,
    options: &PrintOptions,
    progress: &dyn JobProgress,
    device: &mut Device,
    documents: &[RasterDocument],
) -> Result<RasterOutcome> {
    RasterPipeline::new(driver, job, options, progress).run(device, documents)
}
