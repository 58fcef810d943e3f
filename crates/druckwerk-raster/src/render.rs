// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JPEG/PNG documents as a one-page raster source: decoded with `image`,
// rotated for the requested orientation, scaled per `print-scaling` and
// centered in the printable area.

use std::path::Path;

use image::{DynamicImage, GrayImage, RgbImage};
use tracing::{debug, instrument};

use druckwerk_core::error::{DruckwerkError, Result};
use druckwerk_core::types::{Orientation, ScalingMode};

use crate::header::PixelFormat;
use crate::options::PrintOptions;
use crate::source::{PageSource, SourcePage};

/// Pixels per inch assumed for images printed without scaling.
pub const NATURAL_PPI: u32 = 300;

/// Channel spread below which a pixel still counts as gray.
const GRAY_TOLERANCE: u8 = 2;

enum Pixels {
    Gray(GrayImage),
    Rgb(RgbImage),
}

/// Where the scaled image lands on the page, in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
    /// Clip box (the printable area).
    pub clip_left: u32,
    pub clip_top: u32,
    pub clip_right: u32,
    pub clip_bottom: u32,
}

/// A decoded image rendered line by line onto a full page.
pub struct ImagePages {
    pixels: Pixels,
    page: SourcePage,
    placement: Placement,
    emitted: bool,
    row: u32,
}

impl ImagePages {
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path, options: &PrintOptions) -> Result<Self> {
        let img = image::open(path).map_err(|err| {
            DruckwerkError::Image(format!("failed to open {}: {err}", path.display()))
        })?;
        Ok(Self::from_image(img, options))
    }

    pub fn from_image(img: DynamicImage, options: &PrintOptions) -> Self {
        let res = options.resolution;
        let (page_width, page_height) = options.media.size_pixels(res.x, res.y);
        let (left, top, area_width, area_height) = options.media.printable_pixels(res.x, res.y);

        let img = orient(img, options.orientation, area_width, area_height);
        let rgb = img.to_rgb8();
        let is_color = rgb.pixels().any(|p| {
            let [r, g, b] = p.0;
            r.max(g).max(b) - r.min(g).min(b) > GRAY_TOLERANCE
        });
        let pixels = if is_color {
            Pixels::Rgb(rgb)
        } else {
            Pixels::Gray(img.to_luma8())
        };

        let scaling = match options.scaling {
            ScalingMode::Auto if options.media.is_borderless() => ScalingMode::Fill,
            ScalingMode::Auto => ScalingMode::Fit,
            other => other,
        };
        let placement = place(
            dims(&pixels),
            [res.x, res.y],
            (left, top, area_width, area_height),
            scaling,
        );
        debug!(
            is_color,
            scaling = ?scaling,
            width = placement.width,
            height = placement.height,
            "image placed"
        );

        Self {
            page: SourcePage {
                width: page_width,
                height: page_height,
                format: if is_color {
                    PixelFormat::Rgb8
                } else {
                    PixelFormat::Sgray8
                },
                resolution: [res.x, res.y],
                total_pages: Some(1),
            },
            pixels,
            placement,
            emitted: false,
            row: 0,
        }
    }

    pub fn is_color(&self) -> bool {
        matches!(self.pixels, Pixels::Rgb(_))
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }
}

fn dims(pixels: &Pixels) -> (u32, u32) {
    match pixels {
        Pixels::Gray(img) => img.dimensions(),
        Pixels::Rgb(img) => img.dimensions(),
    }
}

/// Rotate for the requested orientation. With no orientation requested a
/// landscape image on a portrait area is turned.
fn orient(
    img: DynamicImage,
    orientation: Orientation,
    area_width: u32,
    area_height: u32,
) -> DynamicImage {
    match orientation {
        Orientation::Portrait => img,
        Orientation::Landscape => img.rotate270(),
        Orientation::ReverseLandscape => img.rotate90(),
        Orientation::ReversePortrait => img.rotate180(),
        Orientation::None => {
            let image_wide = img.width() > img.height();
            let area_wide = area_width > area_height;
            if image_wide != area_wide {
                img.rotate270()
            } else {
                img
            }
        }
    }
}

/// Compute the destination rectangle for an image of `size` pixels.
pub fn place(
    size: (u32, u32),
    resolution: [u32; 2],
    area: (u32, u32, u32, u32),
    scaling: ScalingMode,
) -> Placement {
    let (iw, ih) = (size.0.max(1) as f64, size.1.max(1) as f64);
    let (left, top, aw, ah) = area;
    // Scale in device pixels per image pixel, along x; y follows the dpi ratio.
    let aspect = resolution[1].max(1) as f64 / resolution[0].max(1) as f64;
    let fit_x = aw as f64 / iw;
    let fit_y = ah as f64 / (ih * aspect);
    let natural = resolution[0] as f64 / NATURAL_PPI as f64;

    let scale = match scaling {
        ScalingMode::Fit | ScalingMode::Auto => fit_x.min(fit_y),
        ScalingMode::Fill => fit_x.max(fit_y),
        ScalingMode::None => natural,
        ScalingMode::AutoFit => {
            if iw * natural > aw as f64 || ih * natural * aspect > ah as f64 {
                fit_x.min(fit_y)
            } else {
                natural
            }
        }
    };

    let width = (iw * scale).round().max(1.0) as u32;
    let height = (ih * scale * aspect).round().max(1.0) as u32;
    Placement {
        x: left as i64 + (aw as i64 - width as i64) / 2,
        y: top as i64 + (ah as i64 - height as i64) / 2,
        width,
        height,
        clip_left: left,
        clip_top: top,
        clip_right: left + aw,
        clip_bottom: top + ah,
    }
}

impl PageSource for ImagePages {
    fn next_page(&mut self) -> Result<Option<SourcePage>> {
        if self.emitted {
            return Ok(None);
        }
        self.emitted = true;
        self.row = 0;
        Ok(Some(self.page.clone()))
    }

    fn read_line(&mut self, out: &mut [u8]) -> Result<()> {
        if !self.emitted || self.row >= self.page.height {
            return Err(DruckwerkError::Raster("read past end of image page".into()));
        }
        let y = self.row;
        self.row += 1;
        out.fill(self.page.format.white());

        let p = self.placement;
        let dy = y as i64 - p.y;
        if y < p.clip_top || y >= p.clip_bottom || dy < 0 || dy >= p.height as i64 {
            return Ok(());
        }
        let (iw, ih) = dims(&self.pixels);
        let src_y = (dy as u64 * ih as u64 / p.height as u64) as u32;

        let x_start = (p.x.max(p.clip_left as i64)) as u32;
        let x_end = (p.x + p.width as i64).min(p.clip_right as i64).min(self.page.width as i64);
        for x in x_start as i64..x_end {
            let src_x = ((x - p.x) as u64 * iw as u64 / p.width as u64) as u32;
            let x = x as usize;
            match &self.pixels {
                Pixels::Gray(img) => {
                    if let Some(dst) = out.get_mut(x) {
                        *dst = img.get_pixel(src_x, src_y).0[0];
                    }
                }
                Pixels::Rgb(img) => {
                    if let Some(dst) = out.get_mut(x * 3..x * 3 + 3) {
                        dst.copy_from_slice(&img.get_pixel(src_x, src_y).0);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use druckwerk_core::media::MediaCol;
    use druckwerk_core::types::{DocumentFormat, Resolution};
    use image::Rgb;

    use crate::options::{DocumentInfo, PrintRequest, resolve_options};
    use crate::pwg_driver::pwg_driver_data;

    fn options(scaling: ScalingMode) -> PrintOptions {
        let req = PrintRequest {
            media: MediaCol::from_pwg_name("custom_test_1x1in", 0),
            resolution: Some(Resolution::new(150, 150)),
            orientation: Some(Orientation::Portrait),
            scaling: Some(scaling),
            ..Default::default()
        };
        resolve_options(
            &pwg_driver_data(),
            &req,
            &PrintRequest::default(),
            &DocumentInfo::new(DocumentFormat::Png),
        )
        .expect("resolve")
    }

    fn red(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([255, 0, 0])))
    }

    #[test]
    fn fit_centers_and_pads_with_white() {
        let mut pages = ImagePages::from_image(red(10, 20), &options(ScalingMode::Fit));
        assert!(pages.is_color());
        let page = pages.next_page().expect("page").expect("one page");
        assert_eq!((page.width, page.height), (150, 150));
        assert_eq!(page.format, PixelFormat::Rgb8);

        let p = pages.placement();
        assert_eq!((p.width, p.height), (75, 150));
        assert_eq!(p.x, 37);

        let mut line = vec![0u8; page.bytes_per_line()];
        pages.read_line(&mut line).expect("line");
        assert_eq!(&line[0..3], &[255, 255, 255]);
        assert_eq!(&line[40 * 3..41 * 3], &[255, 0, 0]);
        assert!(pages.next_page().expect("eof").is_none());
    }

    #[test]
    fn borderless_auto_fills_the_page() {
        let mut pages = ImagePages::from_image(red(10, 20), &options(ScalingMode::Auto));
        let page = pages.next_page().expect("page").expect("one page");
        let p = pages.placement();
        assert_eq!((p.width, p.height), (150, 300));

        let mut line = vec![0u8; page.bytes_per_line()];
        pages.read_line(&mut line).expect("line");
        assert!(line.chunks(3).all(|px| px == [255, 0, 0]));
    }

    #[test]
    fn unscaled_uses_natural_size() {
        let p = place((300, 300), [600, 600], (0, 0, 6000, 6000), ScalingMode::None);
        assert_eq!((p.width, p.height), (600, 600));

        let shrunk = place((3000, 300), [300, 300], (0, 0, 600, 600), ScalingMode::AutoFit);
        assert_eq!(shrunk.width, 600);
    }

    #[test]
    fn gray_images_stay_gray() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([90, 91, 90])));
        let mut pages = ImagePages::from_image(img, &options(ScalingMode::Fit));
        assert!(!pages.is_color());
        let page = pages.next_page().expect("page").expect("one page");
        assert_eq!(page.format, PixelFormat::Sgray8);
    }

    #[test]
    fn decodes_png_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("red.png");
        red(8, 8).save(&path).expect("save png");

        let mut pages = ImagePages::open(&path, &options(ScalingMode::Fit)).expect("open");
        assert!(pages.next_page().expect("page").is_some());
        assert!(ImagePages::open(&dir.path().join("missing.png"), &options(ScalingMode::Fit)).is_err());
    }
}
