// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PWG raster page header (PWG 5102.4) and the pixel formats it describes.
//
// Only the fields the pipeline reads or drivers care about are modelled.
// Serialization writes the full 1796-byte big-endian header with every
// other field zeroed.

use serde::{Deserialize, Serialize};

use druckwerk_core::error::{DruckwerkError, Result};

/// Size of a PWG raster page header on the wire.
pub const PWG_HEADER_SIZE: usize = 1796;

/// `cupsColorSpace` values used by PWG raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorSpace {
    Rgb,
    Black,
    Cmyk,
    Sgray,
    Srgb,
    AdobeRgb,
}

impl ColorSpace {
    pub fn code(&self) -> u32 {
        match self {
            Self::Rgb => 1,
            Self::Black => 3,
            Self::Cmyk => 6,
            Self::Sgray => 18,
            Self::Srgb => 19,
            Self::AdobeRgb => 20,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Rgb),
            3 => Some(Self::Black),
            6 => Some(Self::Cmyk),
            18 => Some(Self::Sgray),
            19 => Some(Self::Srgb),
            20 => Some(Self::AdobeRgb),
            _ => None,
        }
    }

    pub fn num_colors(&self) -> u32 {
        match self {
            Self::Black | Self::Sgray => 1,
            Self::Rgb | Self::Srgb | Self::AdobeRgb => 3,
            Self::Cmyk => 4,
        }
    }

    /// Whether zero samples are white (additive-inverse colorspaces).
    pub fn zero_is_white(&self) -> bool {
        matches!(self, Self::Black | Self::Cmyk)
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Rgb => "rgb",
            Self::Black => "black",
            Self::Cmyk => "cmyk",
            Self::Sgray => "sgray",
            Self::Srgb => "srgb",
            Self::AdobeRgb => "adobe-rgb",
        }
    }
}

/// Concrete sample layout of one raster line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 1 bit per pixel, 1 = black.
    Black1,
    /// 1 bit per pixel, 1 = white.
    Sgray1,
    /// 8 bits, 255 = black.
    Black8,
    /// 8 bits, 255 = white.
    Sgray8,
    /// 24-bit RGB.
    Rgb8,
    /// 32-bit CMYK.
    Cmyk8,
}

impl PixelFormat {
    pub fn bits_per_pixel(&self) -> u32 {
        match self {
            Self::Black1 | Self::Sgray1 => 1,
            Self::Black8 | Self::Sgray8 => 8,
            Self::Rgb8 => 24,
            Self::Cmyk8 => 32,
        }
    }

    /// Bytes per pixel, with bitmaps counted as one byte per 8 pixels.
    pub fn bytes_per_line(&self, width: u32) -> usize {
        (width as usize * self.bits_per_pixel() as usize).div_ceil(8)
    }

    /// Byte that paints white in this format.
    pub fn white(&self) -> u8 {
        match self {
            Self::Black1 | Self::Black8 | Self::Cmyk8 => 0x00,
            Self::Sgray1 | Self::Sgray8 | Self::Rgb8 => 0xff,
        }
    }

    pub fn is_color(&self) -> bool {
        matches!(self, Self::Rgb8 | Self::Cmyk8)
    }
}

/// PWG raster page header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterHeader {
    /// `MediaType`, e.g. "stationery".
    pub media_type: String,
    /// `OutputType`, the print-content-optimize keyword.
    pub output_type: String,
    /// `cupsPageSizeName`, the PWG media name.
    pub page_size_name: String,
    /// `cupsRenderingIntent`.
    pub rendering_intent: String,
    pub duplex: bool,
    pub tumble: bool,
    pub hw_resolution: [u32; 2],
    /// Page size in points.
    pub page_size: [u32; 2],
    pub num_copies: u32,
    /// `Orientation` (0 = portrait, 1 = landscape, 2 = reverse portrait, 3 = reverse landscape).
    pub orientation: u32,
    pub width: u32,
    pub height: u32,
    pub bits_per_color: u32,
    pub bits_per_pixel: u32,
    pub bytes_per_line: u32,
    pub color_space: ColorSpace,
    pub num_colors: u32,
    /// `TotalPageCount`; zero when unknown.
    pub total_page_count: u32,
    /// Back-side `CrossFeedTransform` (1 or -1).
    pub cross_feed_transform: i32,
    /// Back-side `FeedTransform` (1 or -1).
    pub feed_transform: i32,
    /// `PrintQuality` (0 = default, 3 draft, 4 normal, 5 high).
    pub print_quality: u32,
}

impl RasterHeader {
    /// Header for a `width` x `height` page in `format` at `resolution` dpi.
    pub fn new(width: u32, height: u32, format: PixelFormat, resolution: [u32; 2]) -> Self {
        let (color_space, bits_per_color) = match format {
            PixelFormat::Black1 => (ColorSpace::Black, 1),
            PixelFormat::Sgray1 => (ColorSpace::Sgray, 1),
            PixelFormat::Black8 => (ColorSpace::Black, 8),
            PixelFormat::Sgray8 => (ColorSpace::Sgray, 8),
            PixelFormat::Rgb8 => (ColorSpace::Srgb, 8),
            PixelFormat::Cmyk8 => (ColorSpace::Cmyk, 8),
        };
        let xdpi = resolution[0].max(1);
        let ydpi = resolution[1].max(1);
        Self {
            media_type: String::new(),
            output_type: String::new(),
            page_size_name: String::new(),
            rendering_intent: String::new(),
            duplex: false,
            tumble: false,
            hw_resolution: resolution,
            page_size: [width * 72 / xdpi, height * 72 / ydpi],
            num_copies: 1,
            orientation: 0,
            width,
            height,
            bits_per_color,
            bits_per_pixel: format.bits_per_pixel(),
            bytes_per_line: format.bytes_per_line(width) as u32,
            color_space,
            num_colors: color_space.num_colors(),
            total_page_count: 0,
            cross_feed_transform: 1,
            feed_transform: 1,
            print_quality: 0,
        }
    }

    /// Pixel layout described by this header.
    pub fn pixel_format(&self) -> Result<PixelFormat> {
        let format = match (self.color_space, self.bits_per_pixel) {
            (ColorSpace::Black, 1) => PixelFormat::Black1,
            (ColorSpace::Sgray, 1) => PixelFormat::Sgray1,
            (ColorSpace::Black, 8) => PixelFormat::Black8,
            (ColorSpace::Sgray, 8) => PixelFormat::Sgray8,
            (ColorSpace::Rgb | ColorSpace::Srgb | ColorSpace::AdobeRgb, 24) => PixelFormat::Rgb8,
            (ColorSpace::Cmyk, 32) => PixelFormat::Cmyk8,
            (space, bpp) => {
                return Err(DruckwerkError::Raster(format!(
                    "unsupported raster layout {} at {bpp} bits per pixel",
                    space.keyword()
                )));
            }
        };
        if format.bytes_per_line(self.width) != self.bytes_per_line as usize {
            return Err(DruckwerkError::Raster(format!(
                "bytes per line {} does not match width {} at {} bpp",
                self.bytes_per_line, self.width, self.bits_per_pixel
            )));
        }
        Ok(format)
    }

    /// Bytes per pixel for run-length coding (bitmaps code whole bytes).
    pub fn pixel_bytes(&self) -> usize {
        (self.bits_per_pixel as usize / 8).max(1)
    }

    /// Serialize as a PWG page header.
    pub fn to_pwg_bytes(&self) -> [u8; PWG_HEADER_SIZE] {
        let mut buf = [0u8; PWG_HEADER_SIZE];
        put_str(&mut buf, 0, "PwgRaster");
        put_str(&mut buf, 128, &self.media_type);
        put_str(&mut buf, 192, &self.output_type);
        put_u32(&mut buf, 272, self.duplex as u32);
        put_u32(&mut buf, 276, self.hw_resolution[0]);
        put_u32(&mut buf, 280, self.hw_resolution[1]);
        put_u32(&mut buf, 340, self.num_copies);
        put_u32(&mut buf, 344, self.orientation);
        put_u32(&mut buf, 352, self.page_size[0]);
        put_u32(&mut buf, 356, self.page_size[1]);
        put_u32(&mut buf, 368, self.tumble as u32);
        put_u32(&mut buf, 372, self.width);
        put_u32(&mut buf, 376, self.height);
        put_u32(&mut buf, 384, self.bits_per_color);
        put_u32(&mut buf, 388, self.bits_per_pixel);
        put_u32(&mut buf, 392, self.bytes_per_line);
        put_u32(&mut buf, 400, self.color_space.code());
        put_u32(&mut buf, 420, self.num_colors);
        put_u32(&mut buf, 452, self.total_page_count);
        put_u32(&mut buf, 456, self.cross_feed_transform as u32);
        put_u32(&mut buf, 460, self.feed_transform as u32);
        put_u32(&mut buf, 484, self.print_quality);
        put_str(&mut buf, 1668, &self.rendering_intent);
        put_str(&mut buf, 1732, &self.page_size_name);
        buf
    }

    /// Parse a PWG page header.
    pub fn from_pwg_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < PWG_HEADER_SIZE {
            return Err(DruckwerkError::Raster(format!(
                "page header truncated at {} bytes",
                buf.len()
            )));
        }
        let code = get_u32(buf, 400);
        let color_space = ColorSpace::from_code(code)
            .ok_or_else(|| DruckwerkError::Raster(format!("unknown color space {code}")))?;

        let header = Self {
            media_type: get_str(buf, 128),
            output_type: get_str(buf, 192),
            page_size_name: get_str(buf, 1732),
            rendering_intent: get_str(buf, 1668),
            duplex: get_u32(buf, 272) != 0,
            tumble: get_u32(buf, 368) != 0,
            hw_resolution: [get_u32(buf, 276), get_u32(buf, 280)],
            page_size: [get_u32(buf, 352), get_u32(buf, 356)],
            num_copies: get_u32(buf, 340),
            orientation: get_u32(buf, 344),
            width: get_u32(buf, 372),
            height: get_u32(buf, 376),
            bits_per_color: get_u32(buf, 384),
            bits_per_pixel: get_u32(buf, 388),
            bytes_per_line: get_u32(buf, 392),
            color_space,
            num_colors: get_u32(buf, 420),
            total_page_count: get_u32(buf, 452),
            cross_feed_transform: get_u32(buf, 456) as i32,
            feed_transform: get_u32(buf, 460) as i32,
            print_quality: get_u32(buf, 484),
        };

        if header.width == 0 || header.height == 0 {
            return Err(DruckwerkError::Raster("page has zero size".into()));
        }
        header.pixel_format()?;
        Ok(header)
    }
}

fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

fn get_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

/// Fixed 64-byte NUL-padded string field.
fn put_str(buf: &mut [u8], offset: usize, value: &str) {
    let bytes = value.as_bytes();
    let len = bytes.len().min(63);
    buf[offset..offset + len].copy_from_slice(&bytes[..len]);
}

fn get_str(buf: &[u8], offset: usize) -> String {
    let field = &buf[offset..offset + 64];
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}
