// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Media sizes and the `media-col` collection.
//
// Dimensions are stored in hundredths of millimetres, the unit IPP uses for
// `media-size`.

use serde::{Deserialize, Serialize};

/// Well-known PWG self-describing media names (PWG 5101.1).
const KNOWN_SIZES: &[(&str, i32, i32)] = &[
    ("iso_a3_297x420mm", 29700, 42000),
    ("iso_a4_210x297mm", 21000, 29700),
    ("iso_a5_148x210mm", 14800, 21000),
    ("iso_a6_105x148mm", 10500, 14800),
    ("na_letter_8.5x11in", 21590, 27940),
    ("na_legal_8.5x14in", 21590, 35560),
    ("na_ledger_11x17in", 27940, 43180),
    ("na_index-4x6_4x6in", 10160, 15240),
    ("na_5x7_5x7in", 12700, 17780),
    ("oe_4x6-label_4x6in", 10160, 15240),
    ("roll_max_4x39.6in", 10160, 100584),
];

/// One entry of `media-col`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCol {
    /// PWG media size name.
    pub size_name: String,
    /// Width in hundredths of millimetres.
    pub size_width: i32,
    /// Length in hundredths of millimetres.
    pub size_length: i32,
    pub bottom_margin: i32,
    pub left_margin: i32,
    pub right_margin: i32,
    pub top_margin: i32,
    /// `media-source` keyword, e.g. "main".
    pub source: String,
    /// `media-type` keyword, e.g. "stationery".
    pub media_type: String,
}

impl MediaCol {
    /// Build a media collection for a PWG size name with uniform margins.
    pub fn from_pwg_name(name: &str, margin: i32) -> Option<Self> {
        let (width, length) = pwg_size(name)?;
        Some(Self {
            size_name: name.to_string(),
            size_width: width,
            size_length: length,
            bottom_margin: margin,
            left_margin: margin,
            right_margin: margin,
            top_margin: margin,
            source: "main".into(),
            media_type: "stationery".into(),
        })
    }

    /// Page size in PostScript points (1/72 inch), rounded.
    pub fn size_points(&self) -> (u32, u32) {
        (
            hundredths_mm_to_points(self.size_width),
            hundredths_mm_to_points(self.size_length),
        )
    }

    /// Page size in pixels at the given resolution.
    pub fn size_pixels(&self, xdpi: u32, ydpi: u32) -> (u32, u32) {
        (
            hundredths_mm_to_pixels(self.size_width, xdpi),
            hundredths_mm_to_pixels(self.size_length, ydpi),
        )
    }

    /// Imageable area in pixels: (left, top, width, height).
    pub fn printable_pixels(&self, xdpi: u32, ydpi: u32) -> (u32, u32, u32, u32) {
        let left = hundredths_mm_to_pixels(self.left_margin, xdpi);
        let right = hundredths_mm_to_pixels(self.right_margin, xdpi);
        let top = hundredths_mm_to_pixels(self.top_margin, ydpi);
        let bottom = hundredths_mm_to_pixels(self.bottom_margin, ydpi);
        let (width, height) = self.size_pixels(xdpi, ydpi);
        (
            left,
            top,
            width.saturating_sub(left + right),
            height.saturating_sub(top + bottom),
        )
    }

    /// True when the margins are all zero.
    pub fn is_borderless(&self) -> bool {
        self.bottom_margin == 0
            && self.left_margin == 0
            && self.right_margin == 0
            && self.top_margin == 0
    }
}

/// Look up the dimensions for a PWG media name.
///
/// Besides the table of common sizes this understands custom names of the
/// form `custom_<name>_<w>x<h>mm` and `..._<w>x<h>in`.
pub fn pwg_size(name: &str) -> Option<(i32, i32)> {
    if let Some(&(_, w, h)) = KNOWN_SIZES.iter().find(|(n, _, _)| *n == name) {
        return Some((w, h));
    }

    let dims = name.rsplit('_').next()?;
    let (scale, dims) = if let Some(d) = dims.strip_suffix("mm") {
        (100.0, d)
    } else if let Some(d) = dims.strip_suffix("in") {
        (2540.0, d)
    } else {
        return None;
    };
    let (w, h) = dims.split_once('x')?;
    let w: f64 = w.parse().ok()?;
    let h: f64 = h.parse().ok()?;
    if w <= 0.0 || h <= 0.0 {
        return None;
    }
    Some(((w * scale).round() as i32, (h * scale).round() as i32))
}

fn hundredths_mm_to_points(value: i32) -> u32 {
    ((value.max(0) as u64 * 72 + 1270) / 2540) as u32
}

fn hundredths_mm_to_pixels(value: i32, dpi: u32) -> u32 {
    (value.max(0) as u64 * dpi as u64 / 2540) as u32
}
