// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Colorspace conversion between raster line formats.
//
// Lines are converted pixel by pixel into the output format.  Output pixels
// past the end of the source line are white; source pixels past the end of
// the output line are dropped.

use crate::dither::{DitherMatrix, SampleSense, dither_line};
use crate::header::PixelFormat;

/// Luminance from sRGB, integer weights 31/61/8.
#[inline]
pub fn rgb_to_gray(r: u8, g: u8, b: u8) -> u8 {
    ((31 * r as u32 + 61 * g as u32 + 8 * b as u32) / 100) as u8
}

/// Naive CMYK separation with full black generation.
#[inline]
pub fn rgb_to_cmyk(r: u8, g: u8, b: u8) -> [u8; 4] {
    let (c, m, y) = (255 - r, 255 - g, 255 - b);
    let k = c.min(m).min(y);
    [c - k, m - k, y - k, k]
}

#[inline]
fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> [u8; 3] {
    let channel = |v: u8| 255u16.saturating_sub(v as u16 + k as u16) as u8;
    [channel(c), channel(m), channel(y)]
}

/// Converts lines of one format and width into another.
pub struct LineConverter {
    src: PixelFormat,
    src_width: u32,
    dst: PixelFormat,
    dst_width: u32,
    matrix: &'static DitherMatrix,
    samples: Vec<u8>,
}

impl LineConverter {
    pub fn new(
        src: PixelFormat,
        src_width: u32,
        dst: PixelFormat,
        dst_width: u32,
        matrix: &'static DitherMatrix,
    ) -> Self {
        Self {
            src,
            src_width,
            dst,
            dst_width,
            matrix,
            samples: vec![0; dst_width as usize],
        }
    }

    pub fn source_bytes(&self) -> usize {
        self.src.bytes_per_line(self.src_width)
    }

    pub fn output_bytes(&self) -> usize {
        self.dst.bytes_per_line(self.dst_width)
    }

    pub fn white_line(&self, out: &mut [u8]) {
        out.fill(self.dst.white());
    }

    /// Convert `line` (row `row` of the page) into `out`.
    pub fn convert(&mut self, line: &[u8], row: u32, out: &mut [u8]) {
        let shared = self.src_width.min(self.dst_width) as usize;

        if self.src == self.dst {
            let copy = self.src.bytes_per_line(shared as u32).min(line.len()).min(out.len());
            out[..copy].copy_from_slice(&line[..copy]);
            out[copy..].fill(self.dst.white());
            return;
        }

        match self.dst {
            PixelFormat::Black1 | PixelFormat::Sgray1 => {
                // Dither in the source's own sense so K data keeps its polarity.
                let sense = if self.src == PixelFormat::Black8 {
                    SampleSense::Black
                } else {
                    SampleSense::Gray
                };
                let white = if sense == SampleSense::Black { 0 } else { 255 };
                for x in 0..self.dst_width as usize {
                    self.samples[x] = if x < shared {
                        match sense {
                            SampleSense::Black => line[x],
                            SampleSense::Gray => gray_at(self.src, line, x),
                        }
                    } else {
                        white
                    };
                }
                dither_line(&self.samples, sense, row, self.matrix, out);
                if self.dst == PixelFormat::Sgray1 {
                    out.iter_mut().for_each(|b| *b = !*b);
                }
            }
            PixelFormat::Black8 | PixelFormat::Sgray8 => {
                for x in 0..self.dst_width as usize {
                    let gray = if x < shared { gray_at(self.src, line, x) } else { 255 };
                    out[x] = if self.dst == PixelFormat::Black8 {
                        255 - gray
                    } else {
                        gray
                    };
                }
            }
            PixelFormat::Rgb8 => {
                for x in 0..self.dst_width as usize {
                    let rgb = if x < shared { rgb_at(self.src, line, x) } else { [255; 3] };
                    out[x * 3..x * 3 + 3].copy_from_slice(&rgb);
                }
            }
            PixelFormat::Cmyk8 => {
                for x in 0..self.dst_width as usize {
                    let cmyk = if x < shared {
                        let [r, g, b] = rgb_at(self.src, line, x);
                        rgb_to_cmyk(r, g, b)
                    } else {
                        [0; 4]
                    };
                    out[x * 4..x * 4 + 4].copy_from_slice(&cmyk);
                }
            }
        }
    }
}

fn bit(line: &[u8], x: usize) -> bool {
    line[x / 8] & (0x80 >> (x & 7)) != 0
}

/// Sample `x` as 8-bit gray (255 = white).
fn gray_at(format: PixelFormat, line: &[u8], x: usize) -> u8 {
    match format {
        PixelFormat::Black1 => {
            if bit(line, x) {
                0
            } else {
                255
            }
        }
        PixelFormat::Sgray1 => {
            if bit(line, x) {
                255
            } else {
                0
            }
        }
        PixelFormat::Black8 => 255 - line[x],
        PixelFormat::Sgray8 => line[x],
        PixelFormat::Rgb8 => rgb_to_gray(line[x * 3], line[x * 3 + 1], line[x * 3 + 2]),
        PixelFormat::Cmyk8 => {
            let p = &line[x * 4..x * 4 + 4];
            let [r, g, b] = cmyk_to_rgb(p[0], p[1], p[2], p[3]);
            rgb_to_gray(r, g, b)
        }
    }
}

fn rgb_at(format: PixelFormat, line: &[u8], x: usize) -> [u8; 3] {
    match format {
        PixelFormat::Rgb8 => [line[x * 3], line[x * 3 + 1], line[x * 3 + 2]],
        PixelFormat::Cmyk8 => {
            let p = &line[x * 4..x * 4 + 4];
            cmyk_to_rgb(p[0], p[1], p[2], p[3])
        }
        _ => [gray_at(format, line, x); 3],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dither::{GENERAL, THRESHOLD};

    #[test]
    fn gray_weights() {
        assert_eq!(rgb_to_gray(255, 255, 255), 255);
        assert_eq!(rgb_to_gray(255, 0, 0), 79);
        assert_eq!(rgb_to_gray(0, 255, 0), 155);
        assert_eq!(rgb_to_gray(0, 0, 255), 20);
    }

    #[test]
    fn rgb_to_black_bitmap() {
        let mut conv = LineConverter::new(PixelFormat::Rgb8, 8, PixelFormat::Black1, 8, &THRESHOLD);
        let mut line = Vec::new();
        for i in 0..8 {
            line.extend_from_slice(if i % 2 == 0 { &[0, 0, 0] } else { &[255, 255, 255] });
        }
        let mut out = [0u8; 1];
        conv.convert(&line, 0, &mut out);
        assert_eq!(out, [0b1010_1010]);
    }

    #[test]
    fn k_input_keeps_polarity_when_dithered() {
        let mut conv = LineConverter::new(PixelFormat::Black8, 8, PixelFormat::Black1, 8, &GENERAL);
        let mut out = [0u8; 1];
        conv.convert(&[255; 8], 0, &mut out);
        assert_eq!(out, [0xff]);
    }

    #[test]
    fn narrower_source_is_padded_white() {
        let mut conv = LineConverter::new(PixelFormat::Sgray8, 2, PixelFormat::Rgb8, 4, &GENERAL);
        let mut out = [0u8; 12];
        conv.convert(&[0, 100], 0, &mut out);
        assert_eq!(out, [0, 0, 0, 100, 100, 100, 255, 255, 255, 255, 255, 255]);
    }

    #[test]
    fn wider_source_is_truncated() {
        let mut conv = LineConverter::new(PixelFormat::Sgray8, 6, PixelFormat::Sgray8, 3, &GENERAL);
        let mut out = [0u8; 3];
        conv.convert(&[1, 2, 3, 4, 5, 6], 0, &mut out);
        assert_eq!(out, [1, 2, 3]);
    }

    #[test]
    fn same_format_padding_uses_colorspace_white() {
        let mut conv = LineConverter::new(PixelFormat::Black8, 2, PixelFormat::Black8, 4, &GENERAL);
        let mut out = [9u8; 4];
        conv.convert(&[200, 201], 0, &mut out);
        assert_eq!(out, [200, 201, 0, 0]);
    }

    #[test]
    fn cmyk_separation() {
        assert_eq!(rgb_to_cmyk(255, 255, 255), [0, 0, 0, 0]);
        assert_eq!(rgb_to_cmyk(0, 0, 0), [0, 0, 0, 255]);
        assert_eq!(rgb_to_cmyk(255, 0, 0), [0, 255, 255, 0]);
    }
}
