// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print option resolution.
//
// A job carries a `PrintRequest` and each document may carry another.  The
// resolver merges them over the driver defaults (document, then job, then
// driver) and derives everything the raster pipeline needs: output pixel
// format, dithering table, raster headers and the copy/page loops.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use druckwerk_core::error::{DruckwerkError, Result};
use druckwerk_core::media::MediaCol;
use druckwerk_core::types::{
    ColorMode, ContentOptimize, DocumentFormat, DocumentHandling, DuplexStyle, Orientation,
    PageRange, PrintQuality, Resolution, ScalingMode, Sides,
};

use crate::dither::{self, DitherMatrix};
use crate::driver::{DriverData, RasterTypes};
use crate::header::{PixelFormat, RasterHeader};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Attributes a client supplied for a job or a single document. Anything
/// left `None` falls through to the next level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrintRequest {
    pub copies: Option<u32>,
    pub handling: Option<DocumentHandling>,
    pub color_mode: Option<ColorMode>,
    pub quality: Option<PrintQuality>,
    pub content: Option<ContentOptimize>,
    pub resolution: Option<Resolution>,
    pub media: Option<MediaCol>,
    pub orientation: Option<Orientation>,
    pub scaling: Option<ScalingMode>,
    pub sides: Option<Sides>,
    pub page_range: Option<PageRange>,
    /// Vendor attributes by name.
    #[serde(default)]
    pub vendor: BTreeMap<String, String>,
}

impl PrintRequest {
    /// `self` layered over `base`: every value set here wins.
    pub fn merged_over(&self, base: &PrintRequest) -> PrintRequest {
        let mut vendor = base.vendor.clone();
        vendor.extend(self.vendor.iter().map(|(k, v)| (k.clone(), v.clone())));
        PrintRequest {
            copies: self.copies.or(base.copies),
            handling: self.handling.or(base.handling),
            color_mode: self.color_mode.or(base.color_mode),
            quality: self.quality.or(base.quality),
            content: self.content.or(base.content),
            resolution: self.resolution.or(base.resolution),
            media: self.media.clone().or_else(|| base.media.clone()),
            orientation: self.orientation.or(base.orientation),
            scaling: self.scaling.or(base.scaling),
            sides: self.sides.or(base.sides),
            page_range: self.page_range.or(base.page_range),
            vendor,
        }
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> DruckwerkError {
    DruckwerkError::InvalidAttribute {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Reject attributes the driver cannot honour. Runs before any job or
/// device resources are allocated.
pub fn validate_request(data: &DriverData, req: &PrintRequest) -> Result<()> {
    if let Some(copies) = req.copies {
        if copies == 0 || copies > data.max_copies {
            return Err(invalid(
                "copies",
                format!("{copies} not in 1-{}", data.max_copies),
            ));
        }
    }

    if let Some(res) = req.resolution {
        if !data.resolutions.contains(&res) {
            return Err(invalid("printer-resolution", format!("{res} not supported")));
        }
    }

    if let Some(mode) = req.color_mode {
        let automatic = matches!(mode, ColorMode::Auto | ColorMode::AutoMonochrome);
        if !automatic && !data.color_supported.contains(&mode) {
            return Err(invalid("print-color-mode", format!("{} not supported", mode.keyword())));
        }
        if mode == ColorMode::Color && !data.supports_color() {
            return Err(invalid("print-color-mode", "printer has no color raster type"));
        }
    }

    if let Some(sides) = req.sides {
        if !data.sides_supported.contains(&sides) {
            return Err(invalid("sides", format!("{} not supported", sides.keyword())));
        }
    }

    if let Some(range) = req.page_range {
        if range.first == 0 || range.first > range.last {
            return Err(invalid(
                "page-ranges",
                format!("{}-{} is not a valid range", range.first, range.last),
            ));
        }
    }

    if let Some(media) = &req.media {
        if media.size_width <= 0 || media.size_length <= 0 {
            return Err(invalid("media-col", format!("bad size for {}", media.size_name)));
        }
    }

    for (name, value) in &req.vendor {
        match data.vendor_ranges.get(name) {
            Some(range) => {
                let (min, max) = parse_range(range)?;
                let parsed: i64 = value
                    .trim()
                    .parse()
                    .map_err(|_| invalid(name, format!("{value:?} is not an integer")))?;
                if parsed < min || parsed > max {
                    return Err(invalid(name, format!("{parsed} not in {min}-{max}")));
                }
            }
            None if data.vendor_defaults.contains_key(name) => {}
            None => return Err(invalid(name, "unsupported vendor attribute")),
        }
    }

    Ok(())
}

/// Parse an integer capability range "min-max" (either bound may be
/// negative). A malformed or empty range is an error.
pub fn parse_range(text: &str) -> Result<(i64, i64)> {
    let text = text.trim();
    let bad = || DruckwerkError::Capability(format!("malformed range {text:?}"));

    // Skip a leading sign so "-10-10" splits at the second dash.
    let sep = text
        .get(1..)
        .and_then(|rest| rest.find('-'))
        .map(|i| i + 1)
        .ok_or_else(bad)?;
    let min: i64 = text[..sep].trim().parse().map_err(|_| bad())?;
    let max: i64 = text[sep + 1..].trim().parse().map_err(|_| bad())?;
    if min > max {
        return Err(DruckwerkError::Capability(format!(
            "empty range {text:?}: {min} > {max}"
        )));
    }
    Ok((min, max))
}

/// Clamp a page range against a known page count. Returns the clamped range
/// and how many pages it selects.
pub fn clamp_page_range(range: PageRange, count: u32) -> (PageRange, u32) {
    if range.first > count {
        let past = count + 1;
        return (
            PageRange {
                first: past,
                last: past,
            },
            0,
        );
    }
    let last = range.last.min(count);
    (
        PageRange {
            first: range.first,
            last,
        },
        last - range.first + 1,
    )
}

// ---------------------------------------------------------------------------
// Resolved options
// ---------------------------------------------------------------------------

/// What is known about a document before it is printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    pub format: DocumentFormat,
    /// `Some(true)` when the content was detected as non-gray.
    pub is_color: Option<bool>,
    pub num_pages: Option<u32>,
}

impl DocumentInfo {
    pub fn new(format: DocumentFormat) -> Self {
        Self {
            format,
            is_color: None,
            num_pages: None,
        }
    }
}

/// Which dithering table the job uses for 8-to-1-bit output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DitherKind {
    General,
    Photo,
    Threshold,
}

impl DitherKind {
    pub fn matrix(&self) -> &'static DitherMatrix {
        match self {
            Self::General => &dither::GENERAL,
            Self::Photo => &dither::PHOTO,
            Self::Threshold => &dither::THRESHOLD,
        }
    }
}

/// Concrete parameters for one processing attempt of a job.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintOptions {
    pub copies: u32,
    pub handling: DocumentHandling,
    /// Color mode after merging, before AUTO is resolved.
    pub color_mode: ColorMode,
    /// Color, Monochrome or BiLevel.
    pub print_color: ColorMode,
    /// Color output with gray pages switched to `mono_header`.
    pub auto_color: bool,
    pub quality: PrintQuality,
    pub content: ContentOptimize,
    pub resolution: Resolution,
    pub media: MediaCol,
    pub orientation: Orientation,
    pub scaling: ScalingMode,
    pub sides: Sides,
    pub duplex: DuplexStyle,
    /// Page range after clamping to the page count, when one was requested.
    pub page_range: Option<PageRange>,
    /// Pages that will print, when the page count is known.
    pub num_pages: Option<u32>,
    pub dither: DitherKind,
    pub header: RasterHeader,
    pub mono_header: RasterHeader,
    pub vendor: BTreeMap<String, String>,
}

impl PrintOptions {
    /// How many times the pipeline runs over the documents.
    pub fn copy_loops(&self) -> u32 {
        match self.handling {
            DocumentHandling::SeparateDocumentsUncollatedCopies => 1,
            DocumentHandling::SeparateDocumentsCollatedCopies => self.copies,
        }
    }

    pub fn includes_page(&self, page: u32) -> bool {
        self.page_range
            .is_none_or(|range| page >= range.first && page <= range.last)
    }

    pub fn dither_matrix(&self) -> &'static DitherMatrix {
        self.dither.matrix()
    }

    /// Header for side `side` (1-based) of one copy of a document. Gray
    /// pages of an auto-color job use the monochrome header; even sides of a
    /// duplex job get the back-side transform.
    pub fn header_for_page(&self, side: u32, page_is_color: Option<bool>) -> RasterHeader {
        let mut header = if self.auto_color && page_is_color == Some(false) {
            self.mono_header.clone()
        } else {
            self.header.clone()
        };
        if self.sides.is_duplex() && side % 2 == 0 {
            let (cross, feed) = back_side_transform(self.duplex, self.sides);
            header.cross_feed_transform = cross;
            header.feed_transform = feed;
        }
        header
    }
}

/// (cross-feed, feed) transform for the back of a duplex sheet.
pub fn back_side_transform(duplex: DuplexStyle, sides: Sides) -> (i32, i32) {
    let short_edge = sides == Sides::TwoSidedShortEdge;
    match (duplex, short_edge) {
        (DuplexStyle::Normal, _) => (1, 1),
        (DuplexStyle::Flipped, false) => (1, -1),
        (DuplexStyle::Flipped, true) => (-1, 1),
        (DuplexStyle::Rotated, false) => (-1, -1),
        (DuplexStyle::Rotated, true) => (1, 1),
        (DuplexStyle::ManualTumble, false) => (1, 1),
        (DuplexStyle::ManualTumble, true) => (-1, -1),
    }
}

fn content_keyword(content: ContentOptimize) -> &'static str {
    match content {
        ContentOptimize::Auto => "auto",
        ContentOptimize::Graphic => "graphic",
        ContentOptimize::Photo => "photo",
        ContentOptimize::Text => "text",
        ContentOptimize::TextAndGraphic => "text-and-graphic",
    }
}

/// PWG `Orientation` header value: quarter turns counter-clockwise.
fn orientation_code(orientation: Orientation) -> u32 {
    match orientation {
        Orientation::Portrait | Orientation::None => 0,
        Orientation::Landscape => 1,
        Orientation::ReversePortrait => 2,
        Orientation::ReverseLandscape => 3,
    }
}

fn pick_resolution(data: &DriverData, req: &PrintRequest) -> Resolution {
    if let Some(res) = req.resolution {
        return res;
    }
    let Some(quality) = req.quality else {
        return data.resolution_default;
    };
    let pick = match quality {
        PrintQuality::Draft => data.resolutions.first(),
        PrintQuality::Normal => data.resolutions.get(data.resolutions.len() / 2),
        PrintQuality::High => data.resolutions.last(),
    };
    pick.copied().unwrap_or(data.resolution_default)
}

fn mono_format(types: RasterTypes, bilevel: bool) -> Option<PixelFormat> {
    if bilevel && types.contains(RasterTypes::BLACK_1) {
        return Some(PixelFormat::Black1);
    }
    [
        (RasterTypes::SGRAY_8, PixelFormat::Sgray8),
        (RasterTypes::BLACK_8, PixelFormat::Black8),
        (RasterTypes::BLACK_1, PixelFormat::Black1),
        (RasterTypes::SRGB_8, PixelFormat::Rgb8),
        (RasterTypes::CMYK_8, PixelFormat::Cmyk8),
    ]
    .into_iter()
    .find(|(flag, _)| types.contains(*flag))
    .map(|(_, format)| format)
}

fn color_format(types: RasterTypes) -> Option<PixelFormat> {
    if types.contains(RasterTypes::SRGB_8) {
        Some(PixelFormat::Rgb8)
    } else if types.contains(RasterTypes::CMYK_8) {
        Some(PixelFormat::Cmyk8)
    } else {
        None
    }
}

/// Merge `doc` over `job` over the driver defaults and derive the raster
/// parameters for one processing attempt.
#[instrument(skip_all, fields(format = %info.format))]
pub fn resolve_options(
    data: &DriverData,
    job: &PrintRequest,
    doc: &PrintRequest,
    info: &DocumentInfo,
) -> Result<PrintOptions> {
    let req = doc.merged_over(job);
    validate_request(data, &req)?;

    let copies = req.copies.unwrap_or(1);
    let handling = req
        .handling
        .unwrap_or(DocumentHandling::SeparateDocumentsCollatedCopies);
    let color_mode = req.color_mode.unwrap_or(data.color_default);
    let quality = req.quality.unwrap_or(data.quality_default);
    let content = req.content.unwrap_or(data.content_default);
    let resolution = pick_resolution(data, &req);
    let media = req.media.clone().unwrap_or_else(|| data.media_default.clone());
    let orientation = req.orientation.unwrap_or(data.orientation_default);
    let scaling = req.scaling.unwrap_or(data.scaling_default);
    let sides = req.sides.unwrap_or(data.sides_default);

    let color_ok = data.supports_color();
    let (print_color, auto_color) = match color_mode {
        ColorMode::Auto => match info.is_color {
            Some(true) if color_ok => (ColorMode::Color, false),
            Some(_) => (ColorMode::Monochrome, false),
            None if color_ok => (ColorMode::Color, true),
            None => (ColorMode::Monochrome, false),
        },
        ColorMode::Color if color_ok => (ColorMode::Color, false),
        ColorMode::BiLevel => (ColorMode::BiLevel, false),
        _ => (ColorMode::Monochrome, false),
    };

    let no_format = || DruckwerkError::Capability("driver supports no raster type".into());
    let mono = mono_format(data.raster_types, print_color == ColorMode::BiLevel)
        .ok_or_else(no_format)?;
    let format = match print_color {
        ColorMode::Color => color_format(data.raster_types).ok_or_else(no_format)?,
        _ => mono,
    };

    let one_bit = format == PixelFormat::Black1;
    let dither = if one_bit && (print_color == ColorMode::BiLevel || quality == PrintQuality::Draft)
    {
        DitherKind::Threshold
    } else if content == ContentOptimize::Photo
        || info.format == DocumentFormat::Jpeg
        || quality == PrintQuality::High
    {
        DitherKind::Photo
    } else {
        DitherKind::General
    };

    let (page_range, num_pages) = match (req.page_range, info.num_pages) {
        (Some(range), Some(count)) => {
            let (range, pages) = clamp_page_range(range, count);
            (Some(range), Some(pages))
        }
        (Some(range), None) => (Some(range), None),
        (None, count) => (None, count),
    };

    // Vendor values fall back to driver defaults; a driver range that does
    // not parse means the option is not offered.
    let mut vendor = BTreeMap::new();
    for (name, default) in &data.vendor_defaults {
        if let Some(range) = data.vendor_ranges.get(name) {
            if parse_range(range).is_err() {
                debug!(option = %name, range = %range, "vendor option not offered");
                continue;
            }
        }
        let value = req.vendor.get(name).unwrap_or(default);
        vendor.insert(name.clone(), value.clone());
    }
    for (name, value) in &req.vendor {
        vendor.entry(name.clone()).or_insert_with(|| value.clone());
    }

    let header_copies = match handling {
        DocumentHandling::SeparateDocumentsUncollatedCopies => copies,
        DocumentHandling::SeparateDocumentsCollatedCopies => 1,
    };
    let build = |format: PixelFormat| {
        let (width, height) = media.size_pixels(resolution.x, resolution.y);
        let mut header = RasterHeader::new(width, height, format, [resolution.x, resolution.y]);
        let (pw, pl) = media.size_points();
        header.page_size = [pw, pl];
        header.page_size_name = media.size_name.clone();
        header.media_type = media.media_type.clone();
        header.output_type = content_keyword(content).to_string();
        header.duplex = sides.is_duplex();
        header.tumble = sides == Sides::TwoSidedShortEdge;
        header.orientation = orientation_code(orientation);
        header.num_copies = header_copies;
        header.print_quality = quality.ipp_enum_value() as u32;
        header.total_page_count = num_pages.unwrap_or(0);
        header
    };
    let header = build(format);
    let mono_header = build(mono);

    debug!(
        color = print_color.keyword(),
        resolution = %resolution,
        format = ?format,
        dither = ?dither,
        copies,
        "resolved print options"
    );

    Ok(PrintOptions {
        copies,
        handling,
        color_mode,
        print_color,
        auto_color,
        quality,
        content,
        resolution,
        media,
        orientation,
        scaling,
        sides,
        duplex: data.duplex,
        page_range,
        num_pages,
        dither,
        header,
        mono_header,
        vendor,
    })
}
