// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Apple raster (URF) streams: "UNIRAST\0" + page count, then per page a
// 32-byte header followed by the same line coding PWG uses.

use std::io::Read;

use druckwerk_core::error::{DruckwerkError, Result};

use crate::header::PixelFormat;
use crate::pwg::{LineState, read_first_byte};
use crate::source::{PageSource, SourcePage};

pub const URF_MAGIC: &[u8; 8] = b"UNIRAST\0";
const PAGE_HEADER_SIZE: usize = 32;

/// One URF page header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrfPageHeader {
    pub bits_per_pixel: u8,
    pub color_space: u8,
    /// 1 = simplex, 2 = short edge, 3 = long edge.
    pub duplex: u8,
    pub quality: u8,
    pub width: u32,
    pub height: u32,
    pub resolution: u32,
}

impl UrfPageHeader {
    pub fn parse(buf: &[u8; PAGE_HEADER_SIZE]) -> Result<Self> {
        let u32_at = |o: usize| u32::from_be_bytes([buf[o], buf[o + 1], buf[o + 2], buf[o + 3]]);
        let header = Self {
            bits_per_pixel: buf[0],
            color_space: buf[1],
            duplex: buf[2],
            quality: buf[3],
            width: u32_at(12),
            height: u32_at(16),
            resolution: u32_at(20),
        };
        if header.width == 0 || header.height == 0 || header.resolution == 0 {
            return Err(DruckwerkError::Raster(format!(
                "bad URF page geometry {}x{} at {}dpi",
                header.width, header.height, header.resolution
            )));
        }
        header.pixel_format()?;
        Ok(header)
    }

    pub fn to_bytes(&self) -> [u8; PAGE_HEADER_SIZE] {
        let mut buf = [0u8; PAGE_HEADER_SIZE];
        buf[0] = self.bits_per_pixel;
        buf[1] = self.color_space;
        buf[2] = self.duplex;
        buf[3] = self.quality;
        buf[12..16].copy_from_slice(&self.width.to_be_bytes());
        buf[16..20].copy_from_slice(&self.height.to_be_bytes());
        buf[20..24].copy_from_slice(&self.resolution.to_be_bytes());
        buf
    }

    /// 0/4 = gray, 1/3/5 = RGB variants, 6 = CMYK. CIELab (2) is not supported.
    pub fn pixel_format(&self) -> Result<PixelFormat> {
        match (self.color_space, self.bits_per_pixel) {
            (0 | 4, 8) => Ok(PixelFormat::Sgray8),
            (1 | 3 | 5, 24) => Ok(PixelFormat::Rgb8),
            (6, 32) => Ok(PixelFormat::Cmyk8),
            (space, bpp) => Err(DruckwerkError::Raster(format!(
                "unsupported URF color space {space} at {bpp} bits per pixel"
            ))),
        }
    }
}

/// Streaming URF reader.
pub struct UrfReader<R> {
    reader: R,
    page_count: u32,
    state: Option<LineState>,
}

impl<R: Read> UrfReader<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let mut head = [0u8; 12];
        reader
            .read_exact(&mut head)
            .map_err(|_| DruckwerkError::Raster("missing URF file header".into()))?;
        if &head[..8] != URF_MAGIC {
            return Err(DruckwerkError::Raster("bad URF magic".into()));
        }
        Ok(Self {
            reader,
            page_count: u32::from_be_bytes([head[8], head[9], head[10], head[11]]),
            state: None,
        })
    }

    /// Page count from the file header (zero when the producer did not know).
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn next_header(&mut self) -> Result<Option<UrfPageHeader>> {
        if let Some(mut state) = self.state.take() {
            state.skip_rest(&mut self.reader)?;
        }

        let Some(first) = read_first_byte(&mut self.reader)? else {
            return Ok(None);
        };
        let mut buf = [0u8; PAGE_HEADER_SIZE];
        buf[0] = first;
        self.reader
            .read_exact(&mut buf[1..])
            .map_err(|e| DruckwerkError::Raster(format!("URF page header truncated: {e}")))?;

        let header = UrfPageHeader::parse(&buf)?;
        let format = header.pixel_format()?;
        self.state = Some(LineState::new(
            format.bytes_per_line(header.width),
            header.bits_per_pixel as usize / 8,
            format.white(),
            header.height,
        ));
        Ok(Some(header))
    }
}

impl<R: Read> PageSource for UrfReader<R> {
    fn next_page(&mut self) -> Result<Option<SourcePage>> {
        let Some(header) = self.next_header()? else {
            return Ok(None);
        };
        Ok(Some(SourcePage {
            width: header.width,
            height: header.height,
            format: header.pixel_format()?,
            resolution: [header.resolution, header.resolution],
            total_pages: (self.page_count > 0).then_some(self.page_count),
        }))
    }

    fn read_line(&mut self, out: &mut [u8]) -> Result<()> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| DruckwerkError::Raster("no current page".into()))?;
        state.read_line(&mut self.reader, out)
    }

    fn carries_copies(&self) -> bool {
        true
    }
}
