// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Driver interface: capabilities/defaults plus the callbacks a printer
// driver implements.
//
// Callbacks return `DriverResult`.  `DriverError` carries only a message, so
// transport error types never leak across the driver boundary.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use druckwerk_core::error::DruckwerkError;
use druckwerk_core::media::MediaCol;
use druckwerk_core::types::{
    ColorMode, ContentOptimize, DuplexStyle, IdentifyActions, JobId, Orientation, PrintQuality,
    PrinterReasons, Resolution, ScalingMode, Sides, Supply,
};
use druckwerk_device::Device;

use crate::header::{PixelFormat, RasterHeader};
use crate::options::PrintOptions;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure reported by a driver callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DriverError {
    message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<DruckwerkError> for DriverError {
    fn from(err: DruckwerkError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<std::io::Error> for DriverError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

pub type DriverResult<T = ()> = std::result::Result<T, DriverError>;

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

bitflags! {
    /// Raster formats a driver can consume.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct RasterTypes: u32 {
        const BLACK_1 = 0x01;
        const BLACK_8 = 0x02;
        const SGRAY_8 = 0x04;
        const SRGB_8 = 0x08;
        const CMYK_8 = 0x10;
    }
}

impl RasterTypes {
    pub fn supports(&self, format: PixelFormat) -> bool {
        let flag = match format {
            PixelFormat::Black1 => Self::BLACK_1,
            PixelFormat::Black8 => Self::BLACK_8,
            PixelFormat::Sgray8 => Self::SGRAY_8,
            PixelFormat::Rgb8 => Self::SRGB_8,
            PixelFormat::Cmyk8 => Self::CMYK_8,
            PixelFormat::Sgray1 => return false,
        };
        self.contains(flag)
    }
}

/// Static description of what a driver supports and what it defaults to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverData {
    pub make_and_model: String,
    /// MIME types the driver prints as is through `print_file`.
    pub native_formats: Vec<String>,
    pub raster_types: RasterTypes,
    pub color_supported: Vec<ColorMode>,
    pub color_default: ColorMode,
    pub quality_default: PrintQuality,
    pub content_default: ContentOptimize,
    pub orientation_default: Orientation,
    pub scaling_default: ScalingMode,
    pub sides_supported: Vec<Sides>,
    pub sides_default: Sides,
    /// How the back side of a duplex sheet is imaged.
    pub duplex: DuplexStyle,
    /// Supported resolutions, lowest first.
    pub resolutions: Vec<Resolution>,
    pub resolution_default: Resolution,
    pub media_ready: Vec<MediaCol>,
    pub media_default: MediaCol,
    pub max_copies: u32,
    pub identify_supported: IdentifyActions,
    pub identify_default: IdentifyActions,
    /// Vendor option defaults (e.g. "darkness" -> "50").
    pub vendor_defaults: BTreeMap<String, String>,
    /// Integer vendor option ranges in "min-max" form.
    pub vendor_ranges: BTreeMap<String, String>,
}

impl DriverData {
    pub fn accepts_natively(&self, mime: &str) -> bool {
        self.native_formats.iter().any(|f| f.eq_ignore_ascii_case(mime))
    }

    pub fn supports_color(&self) -> bool {
        self.color_supported.contains(&ColorMode::Color)
            && self
                .raster_types
                .intersects(RasterTypes::SRGB_8 | RasterTypes::CMYK_8)
    }
}

// ---------------------------------------------------------------------------
// Callbacks
// ---------------------------------------------------------------------------

/// What a driver is told about the job it is printing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: JobId,
    pub name: String,
    pub username: String,
    pub printer: String,
}

/// Printer driver. Callbacks for one job are never called concurrently.
pub trait Driver: Send + Sync {
    fn data(&self) -> &DriverData;

    /// Draw attention to the printer.
    fn identify(
        &self,
        _device: Option<&mut Device>,
        _actions: IdentifyActions,
        _message: Option<&str>,
    ) -> DriverResult {
        Ok(())
    }

    /// Send a document the driver accepts natively. The default streams the
    /// file to the device unchanged.
    fn print_file(
        &self,
        _job: &JobInfo,
        _options: &PrintOptions,
        device: &mut Device,
        file: &Path,
    ) -> DriverResult {
        let mut input = File::open(file)?;
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let count = input.read(&mut buf)?;
            if count == 0 {
                break;
            }
            device.write(&buf[..count])?;
        }
        Ok(())
    }

    /// Begin a raster job.
    fn start_job(
        &self,
        job: &JobInfo,
        options: &PrintOptions,
        device: &mut Device,
    ) -> DriverResult<Box<dyn RasterJob>>;

    /// Current printer state reasons.
    fn status(&self, _device: Option<&mut Device>) -> DriverResult<PrinterReasons> {
        Ok(PrinterReasons::empty())
    }

    /// Marker supply levels. The default asks the device.
    fn supplies(&self, device: Option<&mut Device>) -> DriverResult<Vec<Supply>> {
        match device {
            Some(device) => match device.supplies() {
                Ok(supplies) => Ok(supplies),
                Err(DruckwerkError::NotSupported(_)) => Ok(Vec::new()),
                Err(e) => Err(e.into()),
            },
            None => Ok(Vec::new()),
        }
    }

    /// Produce a test page file in `dir`, or `None` when there is none.
    fn test_page(&self, _dir: &Path) -> DriverResult<Option<PathBuf>> {
        Ok(None)
    }
}

/// Per-job raster callbacks returned by `Driver::start_job`.
pub trait RasterJob: Send {
    fn start_page(
        &mut self,
        options: &PrintOptions,
        device: &mut Device,
        page: u32,
        header: &RasterHeader,
    ) -> DriverResult;

    /// Write line `y` of the current page, in the header's pixel format.
    fn write_line(
        &mut self,
        options: &PrintOptions,
        device: &mut Device,
        y: u32,
        line: &[u8],
    ) -> DriverResult;

    fn end_page(&mut self, options: &PrintOptions, device: &mut Device, page: u32)
    -> DriverResult;

    /// Finish the job. Called exactly once, also after a failure or cancel.
    fn end_job(self: Box<Self>, options: &PrintOptions, device: &mut Device) -> DriverResult;
}
