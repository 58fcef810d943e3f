// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reference driver: emits PWG raster to the device and passes
// `image/pwg-raster` documents through untouched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use tracing::{debug, info};

use druckwerk_core::error::DruckwerkError;
use druckwerk_core::media::MediaCol;
use druckwerk_core::types::{
    ColorMode, ContentOptimize, DuplexStyle, IdentifyActions, Orientation, PrintQuality,
    PrinterReasons, Resolution, ScalingMode, Sides,
};
use druckwerk_device::Device;

use crate::driver::{Driver, DriverData, DriverError, DriverResult, JobInfo, RasterJob, RasterTypes};
use crate::header::RasterHeader;
use crate::options::PrintOptions;
use crate::pwg::PwgWriter;

/// Name the driver is registered under in printer configuration.
pub const PWG_DRIVER_NAME: &str = "pwg";

/// Margin of the ready media, in hundredths of millimetres (1/6 inch).
const MARGIN: i32 = 423;

/// Capabilities of the reference PWG driver.
pub fn pwg_driver_data() -> DriverData {
    let media_ready: Vec<MediaCol> = ["iso_a4_210x297mm", "na_letter_8.5x11in"]
        .iter()
        .filter_map(|name| MediaCol::from_pwg_name(name, MARGIN))
        .collect();
    let media_default = media_ready.first().cloned().unwrap_or_else(|| MediaCol {
        size_name: "iso_a4_210x297mm".into(),
        size_width: 21000,
        size_length: 29700,
        bottom_margin: MARGIN,
        left_margin: MARGIN,
        right_margin: MARGIN,
        top_margin: MARGIN,
        source: "main".into(),
        media_type: "stationery".into(),
    });

    DriverData {
        make_and_model: "Druckwerk PWG Raster".into(),
        native_formats: vec!["image/pwg-raster".into()],
        raster_types: RasterTypes::BLACK_1 | RasterTypes::SGRAY_8 | RasterTypes::SRGB_8,
        color_supported: vec![
            ColorMode::Auto,
            ColorMode::AutoMonochrome,
            ColorMode::BiLevel,
            ColorMode::Color,
            ColorMode::Monochrome,
        ],
        color_default: ColorMode::Auto,
        quality_default: PrintQuality::Normal,
        content_default: ContentOptimize::Auto,
        orientation_default: Orientation::None,
        scaling_default: ScalingMode::Auto,
        sides_supported: vec![
            Sides::OneSided,
            Sides::TwoSidedLongEdge,
            Sides::TwoSidedShortEdge,
        ],
        sides_default: Sides::OneSided,
        duplex: DuplexStyle::Normal,
        resolutions: vec![
            Resolution::new(150, 150),
            Resolution::new(300, 300),
            Resolution::new(600, 600),
        ],
        resolution_default: Resolution::new(300, 300),
        media_ready,
        media_default,
        max_copies: 99,
        identify_supported: IdentifyActions::DISPLAY | IdentifyActions::SOUND,
        identify_default: IdentifyActions::SOUND,
        vendor_defaults: BTreeMap::from([("darkness".to_string(), "50".to_string())]),
        vendor_ranges: BTreeMap::from([("darkness".to_string(), "0-100".to_string())]),
    }
}

/// Driver writing PWG raster streams.
#[derive(Debug, Clone)]
pub struct PwgDriver {
    data: DriverData,
}

impl PwgDriver {
    pub fn new() -> Self {
        Self::with_data(pwg_driver_data())
    }

    pub fn with_data(data: DriverData) -> Self {
        Self { data }
    }
}

impl Default for PwgDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for PwgDriver {
    fn data(&self) -> &DriverData {
        &self.data
    }

    fn identify(
        &self,
        _device: Option<&mut Device>,
        actions: IdentifyActions,
        message: Option<&str>,
    ) -> DriverResult {
        // Nothing to blink on a raster sink; the log line is the signal.
        info!(actions = ?actions, message = message.unwrap_or(""), "identify");
        Ok(())
    }

    fn start_job(
        &self,
        job: &JobInfo,
        _options: &PrintOptions,
        device: &mut Device,
    ) -> DriverResult<Box<dyn RasterJob>> {
        let mut writer = PwgWriter::new();
        writer.write_sync(device)?;
        debug!(job_id = %job.id, "PWG stream started");
        Ok(Box::new(PwgJob { writer }))
    }

    fn status(&self, device: Option<&mut Device>) -> DriverResult<PrinterReasons> {
        let Some(device) = device else {
            return Ok(PrinterReasons::empty());
        };
        match device.status() {
            Ok(reasons) => Ok(reasons),
            Err(DruckwerkError::NotSupported(_)) => Ok(PrinterReasons::empty()),
            Err(e) => Err(e.into()),
        }
    }

    fn test_page(&self, dir: &Path) -> DriverResult<Option<PathBuf>> {
        let path = dir.join("pwg-test-page.png");
        test_pattern(600, 800)
            .save(&path)
            .map_err(|e| DriverError::new(format!("cannot write test page: {e}")))?;
        Ok(Some(path))
    }
}

/// Border, diagonals and a gray ramp.
fn test_pattern(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let border = x < 8 || y < 8 || x >= width - 8 || y >= height - 8;
        let diagonal = (x * height).abs_diff(y * width) < width.max(height) * 2
            || (x * height).abs_diff((height - 1 - y) * width) < width.max(height) * 2;
        if border || diagonal {
            Rgb([0, 0, 0])
        } else if y > height * 3 / 4 {
            let level = (x * 255 / width) as u8;
            Rgb([level, level, level])
        } else if y > height / 2 {
            let band = (x * 3 / width) as usize;
            let mut px = [255u8; 3];
            px[band.min(2)] = 0;
            Rgb(px)
        } else {
            Rgb([255, 255, 255])
        }
    })
}

struct PwgJob {
    writer: PwgWriter,
}

impl RasterJob for PwgJob {
    fn start_page(
        &mut self,
        _options: &PrintOptions,
        device: &mut Device,
        _page: u32,
        header: &RasterHeader,
    ) -> DriverResult {
        self.writer.start_page(device, header)?;
        Ok(())
    }

    fn write_line(
        &mut self,
        _options: &PrintOptions,
        device: &mut Device,
        _y: u32,
        line: &[u8],
    ) -> DriverResult {
        self.writer.write_line(device, line)?;
        Ok(())
    }

    fn end_page(&mut self, _options: &PrintOptions, device: &mut Device, _page: u32) -> DriverResult {
        self.writer.end_page(device)?;
        Ok(())
    }

    fn end_job(self: Box<Self>, _options: &PrintOptions, device: &mut Device) -> DriverResult {
        device.flush()?;
        Ok(())
    }
}
