// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PWG raster streams (PWG 5102.4): "RaS2" sync word, then per page a
// 1796-byte header followed by line-repeat + PackBits coded lines.

use std::io::{self, Read, Write};

use druckwerk_core::error::{DruckwerkError, Result};

use crate::compress::{decode_line, encode_line};
use crate::header::{PWG_HEADER_SIZE, PixelFormat, RasterHeader};
use crate::source::{PageSource, SourcePage};

pub const PWG_SYNC: &[u8; 4] = b"RaS2";

// ---------------------------------------------------------------------------
// Line-repeat decoding shared with URF
// ---------------------------------------------------------------------------

/// Decoder state for the page currently being read.
#[derive(Debug)]
pub(crate) struct LineState {
    pixel_bytes: usize,
    white: u8,
    lines_left: u32,
    repeats_left: u32,
    line: Vec<u8>,
}

impl LineState {
    pub(crate) fn new(bytes_per_line: usize, pixel_bytes: usize, white: u8, height: u32) -> Self {
        Self {
            pixel_bytes,
            white,
            lines_left: height,
            repeats_left: 0,
            line: vec![white; bytes_per_line],
        }
    }

    pub(crate) fn read_line<R: Read>(&mut self, reader: &mut R, out: &mut [u8]) -> Result<()> {
        if self.lines_left == 0 {
            return Err(DruckwerkError::Raster("read past end of page".into()));
        }
        if self.repeats_left > 0 {
            self.repeats_left -= 1;
        } else {
            let mut repeat = [0u8; 1];
            reader
                .read_exact(&mut repeat)
                .map_err(|e| DruckwerkError::Raster(format!("raster data truncated: {e}")))?;
            decode_line(reader, self.pixel_bytes, self.white, &mut self.line)?;
            self.repeats_left = repeat[0] as u32;
        }
        self.lines_left -= 1;

        let n = out.len().min(self.line.len());
        out[..n].copy_from_slice(&self.line[..n]);
        Ok(())
    }

    /// Consume the rest of the page.
    pub(crate) fn skip_rest<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let mut scratch = vec![0u8; self.line.len()];
        while self.lines_left > 0 {
            self.read_line(reader, &mut scratch)?;
        }
        Ok(())
    }
}

/// Read one byte, or `None` at a clean end of stream.
pub(crate) fn read_first_byte<R: Read>(reader: &mut R) -> Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Streaming PWG raster reader.
pub struct PwgReader<R> {
    reader: R,
    header: Option<RasterHeader>,
    state: Option<LineState>,
}

impl<R: Read> PwgReader<R> {
    /// Check the sync word and prepare to read pages.
    pub fn new(mut reader: R) -> Result<Self> {
        let mut sync = [0u8; 4];
        reader
            .read_exact(&mut sync)
            .map_err(|_| DruckwerkError::Raster("missing PWG sync word".into()))?;
        if &sync != PWG_SYNC {
            return Err(DruckwerkError::Raster(format!(
                "bad PWG sync word {:02x?}",
                sync
            )));
        }
        Ok(Self {
            reader,
            header: None,
            state: None,
        })
    }

    /// Header of the page being read.
    pub fn header(&self) -> Option<&RasterHeader> {
        self.header.as_ref()
    }

    /// Advance to the next page header.
    pub fn next_header(&mut self) -> Result<Option<&RasterHeader>> {
        if let Some(mut state) = self.state.take() {
            state.skip_rest(&mut self.reader)?;
        }
        self.header = None;

        let Some(first) = read_first_byte(&mut self.reader)? else {
            return Ok(None);
        };
        let mut buf = vec![0u8; PWG_HEADER_SIZE];
        buf[0] = first;
        self.reader
            .read_exact(&mut buf[1..])
            .map_err(|e| DruckwerkError::Raster(format!("page header truncated: {e}")))?;

        let header = RasterHeader::from_pwg_bytes(&buf)?;
        let format = header.pixel_format()?;
        self.state = Some(LineState::new(
            header.bytes_per_line as usize,
            header.pixel_bytes(),
            format.white(),
            header.height,
        ));
        Ok(Some(&*self.header.insert(header)))
    }
}

impl<R: Read> PageSource for PwgReader<R> {
    fn next_page(&mut self) -> Result<Option<SourcePage>> {
        let Some(header) = self.next_header()? else {
            return Ok(None);
        };
        Ok(Some(SourcePage {
            width: header.width,
            height: header.height,
            format: header.pixel_format()?,
            resolution: header.hw_resolution,
            total_pages: (header.total_page_count > 0).then_some(header.total_page_count),
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

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Incremental PWG raster encoder. Identical consecutive lines share one
/// coded line through the repeat count.
#[derive(Debug, Default)]
pub struct PwgWriter {
    page: Option<WriterPage>,
}

#[derive(Debug)]
struct WriterPage {
    pixel_bytes: usize,
    white: u8,
    previous: Vec<u8>,
    repeats: u8,
    pending: bool,
    coded: Vec<u8>,
}

impl PwgWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the stream sync word. Call once before the first page.
    pub fn write_sync<W: Write + ?Sized>(&mut self, out: &mut W) -> io::Result<()> {
        out.write_all(PWG_SYNC)
    }

    pub fn start_page<W: Write + ?Sized>(
        &mut self,
        out: &mut W,
        header: &RasterHeader,
    ) -> Result<()> {
        let format: PixelFormat = header.pixel_format()?;
        out.write_all(&header.to_pwg_bytes())?;
        self.page = Some(WriterPage {
            pixel_bytes: header.pixel_bytes(),
            white: format.white(),
            previous: Vec::with_capacity(header.bytes_per_line as usize),
            repeats: 0,
            pending: false,
            coded: Vec::with_capacity(header.bytes_per_line as usize + 16),
        });
        Ok(())
    }

    pub fn write_line<W: Write + ?Sized>(&mut self, out: &mut W, line: &[u8]) -> Result<()> {
        let page = self
            .page
            .as_mut()
            .ok_or_else(|| DruckwerkError::Raster("line written outside a page".into()))?;

        if page.pending && page.repeats < u8::MAX && page.previous == line {
            page.repeats += 1;
            return Ok(());
        }
        page.flush(out)?;
        page.previous.clear();
        page.previous.extend_from_slice(line);
        page.pending = true;
        Ok(())
    }

    pub fn end_page<W: Write + ?Sized>(&mut self, out: &mut W) -> Result<()> {
        if let Some(mut page) = self.page.take() {
            page.flush(out)?;
        }
        Ok(())
    }
}

impl WriterPage {
    fn flush<W: Write + ?Sized>(&mut self, out: &mut W) -> io::Result<()> {
        if !self.pending {
            return Ok(());
        }
        self.coded.clear();
        self.coded.push(self.repeats);
        encode_line(&self.previous, self.pixel_bytes, self.white, &mut self.coded);
        out.write_all(&self.coded)?;
        self.pending = false;
        self.repeats = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_page_stream() -> Vec<u8> {
        let mut out = Vec::new();
        let mut writer = PwgWriter::new();
        writer.write_sync(&mut out).expect("sync");

        let mut header = RasterHeader::new(4, 3, PixelFormat::Sgray8, [300, 300]);
        header.total_page_count = 2;
        for page in 0..2u8 {
            writer.start_page(&mut out, &header).expect("start");
            writer.write_line(&mut out, &[page, page, page, page]).expect("line");
            writer.write_line(&mut out, &[page, page, page, page]).expect("line");
            writer.write_line(&mut out, &[9, 8, 7, 255]).expect("line");
            writer.end_page(&mut out).expect("end");
        }
        out
    }

    #[test]
    fn reads_back_written_pages() {
        let data = two_page_stream();
        let mut reader = PwgReader::new(&data[..]).expect("reader");
        let mut line = [0u8; 4];

        for page in 0..2u8 {
            let info = reader.next_page().expect("page").expect("some page");
            assert_eq!((info.width, info.height), (4, 3));
            assert_eq!(info.total_pages, Some(2));
            reader.read_line(&mut line).expect("line");
            assert_eq!(line, [page; 4]);
            reader.read_line(&mut line).expect("line");
            assert_eq!(line, [page; 4]);
            reader.read_line(&mut line).expect("line");
            assert_eq!(line, [9, 8, 7, 255]);
        }
        assert!(reader.next_page().expect("eof").is_none());
    }

    #[test]
    fn unread_lines_are_skipped() {
        let data = two_page_stream();
        let mut reader = PwgReader::new(&data[..]).expect("reader");
        reader.next_page().expect("page");
        let second = reader.next_page().expect("page").expect("second page");
        assert_eq!(second.height, 3);

        let mut line = [0u8; 4];
        reader.read_line(&mut line).expect("line");
        assert_eq!(line, [1; 4]);
    }

    #[test]
    fn repeated_lines_share_one_record() {
        let data = two_page_stream();
        // sync + header + [repeat=1, run code, pixel] + [repeat=0, literal...]
        let first_line = 4 + PWG_HEADER_SIZE;
        assert_eq!(data[first_line], 1);
    }

    #[test]
    fn reading_past_page_end_fails() {
        let data = two_page_stream();
        let mut reader = PwgReader::new(&data[..]).expect("reader");
        reader.next_page().expect("page");
        let mut line = [0u8; 4];
        for _ in 0..3 {
            reader.read_line(&mut line).expect("line");
        }
        assert!(reader.read_line(&mut line).is_err());
    }

    #[test]
    fn rejects_bad_sync_and_truncation() {
        assert!(PwgReader::new(&b"RaS3"[..]).is_err());

        let data = two_page_stream();
        let mut reader = PwgReader::new(&data[..100]).expect("reader");
        assert!(reader.next_page().is_err());
    }
}
