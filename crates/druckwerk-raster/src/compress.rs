// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PackBits-style line coding shared by PWG and Apple raster.
//
// Each coded line is a sequence of runs over whole pixels:
//   0..=127    next pixel repeated n+1 times
//   129..=255  257-n literal pixels follow
//   128        the rest of the line is white
// The per-line repeat byte in front of each line is handled by the stream
// readers and writers, not here.

use std::io::Read;

use druckwerk_core::error::{DruckwerkError, Result};

const FILL_WHITE: u8 = 128;
const MAX_RUN: usize = 128;

/// Decode one line into `out` (exactly one line long).
pub fn decode_line<R: Read + ?Sized>(
    reader: &mut R,
    pixel_bytes: usize,
    white: u8,
    out: &mut [u8],
) -> Result<()> {
    let mut pos = 0;
    let mut code = [0u8; 1];

    while pos < out.len() {
        reader.read_exact(&mut code).map_err(truncated)?;
        let code = code[0];

        if code == FILL_WHITE {
            out[pos..].fill(white);
            return Ok(());
        }

        if code < FILL_WHITE {
            let count = (code as usize + 1) * pixel_bytes;
            let end = checked_end(pos, count, out.len())?;
            reader
                .read_exact(&mut out[pos..pos + pixel_bytes])
                .map_err(truncated)?;
            let mut filled = pos + pixel_bytes;
            while filled < end {
                out.copy_within(pos..pos + pixel_bytes, filled);
                filled += pixel_bytes;
            }
            pos = end;
        } else {
            let count = (257 - code as usize) * pixel_bytes;
            let end = checked_end(pos, count, out.len())?;
            reader.read_exact(&mut out[pos..end]).map_err(truncated)?;
            pos = end;
        }
    }
    Ok(())
}

fn checked_end(pos: usize, count: usize, len: usize) -> Result<usize> {
    let end = pos + count;
    if end > len {
        return Err(DruckwerkError::Raster(format!(
            "run of {count} bytes at offset {pos} overflows {len}-byte line"
        )));
    }
    Ok(end)
}

fn truncated(e: std::io::Error) -> DruckwerkError {
    DruckwerkError::Raster(format!("raster data truncated: {e}"))
}

/// Encode one line, appending to `out`.
pub fn encode_line(line: &[u8], pixel_bytes: usize, white: u8, out: &mut Vec<u8>) {
    let pixels = line.len() / pixel_bytes;
    let pixel = |i: usize| &line[i * pixel_bytes..(i + 1) * pixel_bytes];

    // Everything from `end` on is white and collapses to a single code.
    let mut end = pixels;
    while end > 0 && pixel(end - 1).iter().all(|&b| b == white) {
        end -= 1;
    }

    let mut i = 0;
    while i < end {
        let mut j = i + 1;
        while j < end && j - i < MAX_RUN && pixel(j) == pixel(i) {
            j += 1;
        }

        if j - i >= 2 {
            out.push((j - i - 1) as u8);
            out.extend_from_slice(pixel(i));
            i = j;
            continue;
        }

        let start = i;
        i += 1;
        while i < end && i - start < MAX_RUN && !(i + 1 < end && pixel(i) == pixel(i + 1)) {
            i += 1;
        }
        let count = i - start;
        out.push(if count == 1 { 0 } else { (257 - count) as u8 });
        out.extend_from_slice(&line[start * pixel_bytes..i * pixel_bytes]);
    }

    if end < pixels {
        out.push(FILL_WHITE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(coded: &[u8], pixel_bytes: usize, white: u8, len: usize) -> Result<Vec<u8>> {
        let mut out = vec![0x55; len];
        decode_line(&mut &coded[..], pixel_bytes, white, &mut out)?;
        Ok(out)
    }

    #[test]
    fn decodes_repeat_literal_and_fill() {
        // 3 x 0x11, literal [0x22, 0x33], rest white.
        let coded = [2, 0x11, 255, 0x22, 0x33, 128];
        let line = decode(&coded, 1, 0xff, 8).expect("decode");
        assert_eq!(line, [0x11, 0x11, 0x11, 0x22, 0x33, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn repeats_whole_rgb_pixels() {
        let coded = [1, 10, 20, 30];
        let line = decode(&coded, 3, 0xff, 6).expect("decode");
        assert_eq!(line, [10, 20, 30, 10, 20, 30]);
    }

    #[test]
    fn overflowing_run_is_an_error() {
        assert!(decode(&[5, 0x00], 1, 0, 4).is_err());
        assert!(decode(&[0x00], 1, 0, 4).is_err());
    }

    #[test]
    fn encoder_output_decodes_to_input() {
        let lines: [&[u8]; 4] = [
            &[0, 0, 0, 0, 1, 2, 3, 3, 3, 255, 255, 255],
            &[7],
            &[255, 255, 255],
            &[1, 2, 1, 2, 1, 2, 9, 9],
        ];
        for line in lines {
            let mut coded = Vec::new();
            encode_line(line, 1, 255, &mut coded);
            assert_eq!(decode(&coded, 1, 255, line.len()).expect("decode"), line);
        }
    }

    #[test]
    fn encoder_splits_long_runs() {
        let line = vec![0x42u8; 300];
        let mut coded = Vec::new();
        encode_line(&line, 1, 0xff, &mut coded);
        assert_eq!(coded, [127, 0x42, 127, 0x42, 43, 0x42]);
    }

    #[test]
    fn blank_line_is_one_byte() {
        let mut coded = Vec::new();
        encode_line(&[0xff; 64], 1, 0xff, &mut coded);
        assert_eq!(coded, [128]);
    }
}
