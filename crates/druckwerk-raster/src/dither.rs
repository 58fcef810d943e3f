// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ordered dithering from 8-bit samples to 1-bit black bitmaps.

/// 16x16 threshold table, indexed `[row % 16][column % 16]`.
pub type DitherMatrix = [[u8; 16]; 16];

/// General-purpose dispersed-dot (Bayer) matrix.
pub const GENERAL: DitherMatrix = general_matrix();

/// Clustered-dot matrix for photos: a 4x4 growing dot, with the 16 cells
/// of the 16x16 tile ordered by a 4x4 Bayer pattern.
pub const PHOTO: DitherMatrix = photo_matrix();

/// Fixed 50% threshold for bi-level and draft output.
pub const THRESHOLD: DitherMatrix = [[127; 16]; 16];

const CLUSTER: [[u8; 4]; 4] = [[12, 5, 6, 13], [4, 0, 1, 7], [11, 3, 2, 8], [15, 10, 9, 14]];

/// Bayer index for (x, y) in a 2^bits square.
const fn bayer(x: usize, y: usize, bits: u32) -> usize {
    let xor = x ^ y;
    let mut value = 0;
    let mut bit = 0;
    while bit < bits {
        value = (value << 2) | (((xor >> bit) & 1) << 1) | ((y >> bit) & 1);
        bit += 1;
    }
    value
}

const fn general_matrix() -> DitherMatrix {
    let mut m = [[0u8; 16]; 16];
    let mut y = 0;
    while y < 16 {
        let mut x = 0;
        while x < 16 {
            m[y][x] = bayer(x, y, 4) as u8;
            x += 1;
        }
        y += 1;
    }
    m
}

const fn photo_matrix() -> DitherMatrix {
    let mut m = [[0u8; 16]; 16];
    let mut y = 0;
    while y < 16 {
        let mut x = 0;
        while x < 16 {
            m[y][x] = CLUSTER[y % 4][x % 4] * 16 + bayer(x / 4, y / 4, 2) as u8;
            x += 1;
        }
        y += 1;
    }
    m
}

/// Which sense the 8-bit input has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleSense {
    /// 255 = black (K).
    Black,
    /// 255 = white (gray).
    Gray,
}

/// Dither one line of 8-bit samples into a 1-bit black bitmap.
///
/// K samples set a bit when above the threshold; gray samples when at or
/// below it.  `dst` must hold `src.len().div_ceil(8)` bytes.
pub fn dither_line(src: &[u8], sense: SampleSense, row: u32, matrix: &DitherMatrix, dst: &mut [u8]) {
    let thresholds = &matrix[row as usize % 16];
    dst.fill(0);

    for (x, &sample) in src.iter().enumerate() {
        let threshold = thresholds[x & 15];
        let black = match sense {
            SampleSense::Black => sample > threshold,
            SampleSense::Gray => sample <= threshold,
        };
        if black {
            dst[x / 8] |= 0x80 >> (x & 7);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn general_matrix_is_a_permutation() {
        let values: HashSet<u8> = GENERAL.iter().flatten().copied().collect();
        assert_eq!(values.len(), 256);
        assert_eq!(GENERAL[0][0], 0);
        assert_eq!(GENERAL[0][1], 128);
        assert_eq!(GENERAL[1][1], 64);
    }

    #[test]
    fn photo_matrix_is_a_permutation() {
        let values: HashSet<u8> = PHOTO.iter().flatten().copied().collect();
        assert_eq!(values.len(), 256);
        // Cell centres are the darkest-first thresholds.
        assert!(PHOTO[1][1] < 16);
    }

    #[test]
    fn black_samples_set_bits_above_threshold() {
        let mut out = [0u8; 2];
        dither_line(&[255; 16], SampleSense::Black, 0, &GENERAL, &mut out);
        assert_eq!(out, [0xff, 0xff]);
        dither_line(&[0; 16], SampleSense::Black, 0, &GENERAL, &mut out);
        assert_eq!(out, [0x00, 0x00]);
    }

    #[test]
    fn gray_samples_set_bits_at_or_below_threshold() {
        let mut out = [0u8; 1];
        dither_line(&[127; 8], SampleSense::Gray, 3, &THRESHOLD, &mut out);
        assert_eq!(out, [0xff]);
        dither_line(&[128; 8], SampleSense::Gray, 3, &THRESHOLD, &mut out);
        assert_eq!(out, [0x00]);
    }

    #[test]
    fn mid_gray_covers_about_half() {
        let mut black = 0u32;
        let mut out = [0u8; 2];
        for row in 0..16 {
            dither_line(&[128; 16], SampleSense::Gray, row, &GENERAL, &mut out);
            black += out.iter().map(|b| b.count_ones()).sum::<u32>();
        }
        assert_eq!(black, 128);
    }

    #[test]
    fn partial_byte_is_left_white() {
        let mut out = [0xaa; 2];
        dither_line(&[255; 10], SampleSense::Black, 0, &THRESHOLD, &mut out);
        assert_eq!(out, [0xff, 0xc0]);
    }
}
