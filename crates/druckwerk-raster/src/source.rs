// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page sources feed the raster pipeline one page and one line at a time.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use druckwerk_core::error::{DruckwerkError, Result};
use druckwerk_core::types::DocumentFormat;

use crate::header::PixelFormat;
use crate::options::PrintOptions;
use crate::pwg::PwgReader;
use crate::render::ImagePages;
use crate::urf::UrfReader;

/// Geometry and layout of the next page from a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePage {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub resolution: [u32; 2],
    /// Pages in the whole stream, when the producer said so.
    pub total_pages: Option<u32>,
}

impl SourcePage {
    pub fn bytes_per_line(&self) -> usize {
        self.format.bytes_per_line(self.width)
    }
}

/// Anything that yields raster pages.
pub trait PageSource {
    /// Advance to the next page, skipping unread lines of the current one.
    fn next_page(&mut self) -> Result<Option<SourcePage>>;

    /// Read the next line of the current page into `out`.
    fn read_line(&mut self, out: &mut [u8]) -> Result<()>;

    /// Whether the stream already contains every copy (client-rendered raster).
    fn carries_copies(&self) -> bool {
        false
    }
}

/// Open a spooled document as a page source.
pub fn open_document(
    path: &Path,
    format: &DocumentFormat,
    options: &PrintOptions,
) -> Result<Box<dyn PageSource>> {
    match format {
        DocumentFormat::PwgRaster => {
            let file = BufReader::new(File::open(path)?);
            Ok(Box::new(PwgReader::new(file)?))
        }
        DocumentFormat::AppleRaster => {
            let file = BufReader::new(File::open(path)?);
            Ok(Box::new(UrfReader::new(file)?))
        }
        DocumentFormat::Jpeg | DocumentFormat::Png => {
            Ok(Box::new(ImagePages::open(path, options)?))
        }
        other => Err(DruckwerkError::UnsupportedFormat(other.mime_type().to_string())),
    }
}
