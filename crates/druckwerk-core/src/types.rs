// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types shared by the device, raster, and print crates.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Numeric job identifier, unique within one printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub u32);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle states of a job (RFC 8011 §5.3.7 values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    /// Queued, all document data received.
    Pending,
    /// Created, document upload still open.
    Held,
    /// Claimed by a worker.
    Processing,
    /// Suspended by the operator or by a device condition.
    Stopped,
    /// Canceled by a client or operator.
    Canceled,
    /// Failed during processing.
    Aborted,
    /// Printed.
    Completed,
}

impl JobState {
    /// IPP `job-state` enum value.
    pub fn ipp_enum_value(&self) -> i32 {
        match self {
            Self::Pending => 3,
            Self::Held => 4,
            Self::Processing => 5,
            Self::Stopped => 6,
            Self::Canceled => 7,
            Self::Aborted => 8,
            Self::Completed => 9,
        }
    }

    /// IPP keyword form.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Held => "pending-held",
            Self::Processing => "processing",
            Self::Stopped => "processing-stopped",
            Self::Canceled => "canceled",
            Self::Aborted => "aborted",
            Self::Completed => "completed",
        }
    }

    /// Terminal jobs live in the completed queue.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Canceled | Self::Aborted | Self::Completed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Printer-level state (RFC 8011 §5.4.12 values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrinterState {
    Idle,
    Processing,
    Stopped,
}

impl PrinterState {
    pub fn ipp_enum_value(&self) -> i32 {
        match self {
            Self::Idle => 3,
            Self::Processing => 4,
            Self::Stopped => 5,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Processing => "processing",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for PrinterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

bitflags! {
    /// `printer-state-reasons` values reported by drivers and devices.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct PrinterReasons: u32 {
        const OTHER = 0x0001;
        const COVER_OPEN = 0x0002;
        const INPUT_TRAY_MISSING = 0x0004;
        const MARKER_SUPPLY_EMPTY = 0x0008;
        const MARKER_SUPPLY_LOW = 0x0010;
        const MARKER_WASTE_ALMOST_FULL = 0x0020;
        const MARKER_WASTE_FULL = 0x0040;
        const MEDIA_EMPTY = 0x0080;
        const MEDIA_JAM = 0x0100;
        const MEDIA_LOW = 0x0200;
        const MEDIA_NEEDED = 0x0400;
        const OFFLINE = 0x0800;
        const SPOOL_AREA_FULL = 0x1000;
        const TONER_EMPTY = 0x2000;
        const TONER_LOW = 0x4000;
        const DOOR_OPEN = 0x8000;
        const IDENTIFY_PRINTER_REQUESTED = 0x10000;
    }
}

impl PrinterReasons {
    /// IPP keywords for the set reasons, or `["none"]`.
    pub fn keywords(&self) -> Vec<&'static str> {
        const NAMES: [(PrinterReasons, &str); 17] = [
            (PrinterReasons::OTHER, "other"),
            (PrinterReasons::COVER_OPEN, "cover-open"),
            (PrinterReasons::INPUT_TRAY_MISSING, "input-tray-missing"),
            (PrinterReasons::MARKER_SUPPLY_EMPTY, "marker-supply-empty"),
            (PrinterReasons::MARKER_SUPPLY_LOW, "marker-supply-low"),
            (PrinterReasons::MARKER_WASTE_ALMOST_FULL, "marker-waste-almost-full"),
            (PrinterReasons::MARKER_WASTE_FULL, "marker-waste-full"),
            (PrinterReasons::MEDIA_EMPTY, "media-empty"),
            (PrinterReasons::MEDIA_JAM, "media-jam"),
            (PrinterReasons::MEDIA_LOW, "media-low"),
            (PrinterReasons::MEDIA_NEEDED, "media-needed"),
            (PrinterReasons::OFFLINE, "offline-report"),
            (PrinterReasons::SPOOL_AREA_FULL, "spool-area-full"),
            (PrinterReasons::TONER_EMPTY, "toner-empty"),
            (PrinterReasons::TONER_LOW, "toner-low"),
            (PrinterReasons::DOOR_OPEN, "door-open"),
            (
                PrinterReasons::IDENTIFY_PRINTER_REQUESTED,
                "identify-printer-requested",
            ),
        ];

        let names: Vec<&'static str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() { vec!["none"] } else { names }
    }
}

bitflags! {
    /// `identify-actions` supported by a driver.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct IdentifyActions: u32 {
        const DISPLAY = 0x01;
        const FLASH = 0x02;
        const SOUND = 0x04;
        const SPEAK = 0x08;
    }
}

/// Marker supply colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplyColor {
    NoColor,
    Black,
    Cyan,
    Magenta,
    Yellow,
    Multiple,
}

/// Marker supply kinds (subset of RFC 3805 prtMarkerSuppliesType).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplyType {
    Toner,
    Ink,
    InkCartridge,
    RibbonWax,
    WasteToner,
    WasteInk,
    Other,
}

/// One marker supply as reported by a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supply {
    pub color: SupplyColor,
    pub description: String,
    pub is_consumed: bool,
    /// Percent remaining, 0-100.
    pub level: u8,
    pub supply_type: SupplyType,
}

/// `print-color-mode` keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorMode {
    Auto,
    AutoMonochrome,
    BiLevel,
    Color,
    Monochrome,
    ProcessMonochrome,
}

impl ColorMode {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::AutoMonochrome => "auto-monochrome",
            Self::BiLevel => "bi-level",
            Self::Color => "color",
            Self::Monochrome => "monochrome",
            Self::ProcessMonochrome => "process-monochrome",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "auto" => Some(Self::Auto),
            "auto-monochrome" => Some(Self::AutoMonochrome),
            "bi-level" => Some(Self::BiLevel),
            "color" => Some(Self::Color),
            "monochrome" => Some(Self::Monochrome),
            "process-monochrome" => Some(Self::ProcessMonochrome),
            _ => None,
        }
    }
}

/// `print-quality` enum values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrintQuality {
    Draft,
    Normal,
    High,
}

impl PrintQuality {
    pub fn ipp_enum_value(&self) -> i32 {
        match self {
            Self::Draft => 3,
            Self::Normal => 4,
            Self::High => 5,
        }
    }
}

/// `print-content-optimize` keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentOptimize {
    Auto,
    Graphic,
    Photo,
    Text,
    TextAndGraphic,
}

/// Page orientation (`orientation-requested`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    Portrait,
    Landscape,
    ReverseLandscape,
    ReversePortrait,
    /// Let the content decide.
    None,
}

impl Orientation {
    /// IPP `orientation-requested` enum value (RFC 8011 §5.2.10).
    pub fn ipp_enum_value(&self) -> i32 {
        match self {
            Self::Portrait => 3,
            Self::Landscape => 4,
            Self::ReverseLandscape => 5,
            Self::ReversePortrait => 6,
            Self::None => 7,
        }
    }
}

/// Duplex printing mode (`sides`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sides {
    OneSided,
    TwoSidedLongEdge,
    TwoSidedShortEdge,
}

impl Sides {
    /// IPP `sides` keyword (RFC 8011 §5.2.8).
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::OneSided => "one-sided",
            Self::TwoSidedLongEdge => "two-sided-long-edge",
            Self::TwoSidedShortEdge => "two-sided-short-edge",
        }
    }

    pub fn is_duplex(&self) -> bool {
        !matches!(self, Self::OneSided)
    }
}

/// How the printer images the back side of a duplex sheet
/// (`pwg-raster-document-sheet-back`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DuplexStyle {
    Normal,
    Flipped,
    Rotated,
    ManualTumble,
}

/// `print-scaling` keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalingMode {
    Auto,
    AutoFit,
    Fill,
    Fit,
    None,
}

/// `multiple-document-handling` keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentHandling {
    SeparateDocumentsCollatedCopies,
    SeparateDocumentsUncollatedCopies,
}

/// A resolution in dots per inch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub x: u32,
    pub y: u32,
}

impl Resolution {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.x == self.y {
            write!(f, "{}dpi", self.x)
        } else {
            write!(f, "{}x{}dpi", self.x, self.y)
        }
    }
}

/// Requested page range (1-based, inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub first: u32,
    pub last: u32,
}

/// Document formats the core knows how to name, spool, and route.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentFormat {
    Jpeg,
    Png,
    PwgRaster,
    AppleRaster,
    Pdf,
    PostScript,
    /// Anything else, kept by MIME type for raw passthrough.
    Other(String),
}

impl DocumentFormat {
    /// MIME type string (`document-format`).
    pub fn mime_type(&self) -> &str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::PwgRaster => "image/pwg-raster",
            Self::AppleRaster => "image/urf",
            Self::Pdf => "application/pdf",
            Self::PostScript => "application/postscript",
            Self::Other(mime) => mime,
        }
    }

    /// Infer the format from a MIME type.
    pub fn from_mime(mime: &str) -> Self {
        match mime.to_ascii_lowercase().as_str() {
            "image/jpeg" => Self::Jpeg,
            "image/png" => Self::Png,
            "image/pwg-raster" => Self::PwgRaster,
            "image/urf" => Self::AppleRaster,
            "application/pdf" => Self::Pdf,
            "application/postscript" => Self::PostScript,
            other => Self::Other(other.to_string()),
        }
    }

    /// Infer the format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "pwg" => Some(Self::PwgRaster),
            "urf" => Some(Self::AppleRaster),
            "pdf" => Some(Self::Pdf),
            "ps" => Some(Self::PostScript),
            _ => None,
        }
    }

    /// Spool file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::PwgRaster => "pwg",
            Self::AppleRaster => "urf",
            Self::Pdf => "pdf",
            Self::PostScript => "ps",
            Self::Other(_) => "prn",
        }
    }

    /// Whether the raster pipeline can render this format itself.
    pub fn is_renderable(&self) -> bool {
        matches!(
            self,
            Self::Jpeg | Self::Png | Self::PwgRaster | Self::AppleRaster
        )
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Replace every character that is not safe in a URL path segment with `_`.
///
/// Used for spool file names and for file-device names synthesized from job
/// names. Empty input yields `untitled`.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .take(64)
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "untitled".into()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Canceled.is_terminal());
        assert!(JobState::Aborted.is_terminal());
        assert!(!JobState::Stopped.is_terminal());
        assert!(!JobState::Held.is_terminal());
    }

    #[test]
    fn reasons_keywords() {
        assert_eq!(PrinterReasons::empty().keywords(), vec!["none"]);
        let reasons = PrinterReasons::MEDIA_EMPTY | PrinterReasons::TONER_LOW;
        assert_eq!(reasons.keywords(), vec!["media-empty", "toner-low"]);
    }

    #[test]
    fn format_extension_fallback_is_prn() {
        assert_eq!(DocumentFormat::from_mime("image/jpeg").extension(), "jpg");
        assert_eq!(DocumentFormat::from_mime("image/urf").extension(), "urf");
        assert_eq!(
            DocumentFormat::from_mime("application/vnd.hp-pcl").extension(),
            "prn"
        );
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_name("My Report (v2).pdf"), "My_Report__v2_.pdf");
        assert_eq!(sanitize_name("a/b?c"), "a_b_c");
        assert_eq!(sanitize_name(""), "untitled");
    }

    #[test]
    fn color_mode_keywords_roundtrip() {
        for mode in [
            ColorMode::Auto,
            ColorMode::AutoMonochrome,
            ColorMode::BiLevel,
            ColorMode::Color,
            ColorMode::Monochrome,
            ColorMode::ProcessMonochrome,
        ] {
            assert_eq!(ColorMode::from_keyword(mode.keyword()), Some(mode));
        }
    }
}
