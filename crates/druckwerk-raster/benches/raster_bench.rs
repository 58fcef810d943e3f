// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the per-line hot paths: 8-to-1-bit dithering and
// PWG line decoding.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use druckwerk_raster::dither::{GENERAL, PHOTO, SampleSense, dither_line};
use druckwerk_raster::header::{PixelFormat, RasterHeader};
use druckwerk_raster::pwg::{PwgReader, PwgWriter};
use druckwerk_raster::source::PageSource;

/// One 8.5in line at 600dpi.
const WIDTH: u32 = 5100;

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_dither(c: &mut Criterion) {
    let ramp: Vec<u8> = (0..WIDTH).map(|x| (x % 256) as u8).collect();
    let mut out = vec![0u8; (WIDTH as usize).div_ceil(8)];

    c.bench_function("dither_line general (5100 px)", |b| {
        let mut row = 0u32;
        b.iter(|| {
            dither_line(black_box(&ramp), SampleSense::Gray, row, &GENERAL, &mut out);
            row = row.wrapping_add(1);
            black_box(&out);
        });
    });

    c.bench_function("dither_line photo (5100 px)", |b| {
        let mut row = 0u32;
        b.iter(|| {
            dither_line(black_box(&ramp), SampleSense::Black, row, &PHOTO, &mut out);
            row = row.wrapping_add(1);
            black_box(&out);
        });
    });
}

/// A 64-line gray page mixing runs, literals and blank tails.
fn encoded_page() -> Vec<u8> {
    let mut data = Vec::new();
    let mut writer = PwgWriter::new();
    writer.write_sync(&mut data).expect("sync");
    let header = RasterHeader::new(WIDTH, 64, PixelFormat::Sgray8, [600, 600]);
    writer.start_page(&mut data, &header).expect("start page");
    for y in 0..64u32 {
        let line: Vec<u8> = (0..WIDTH)
            .map(|x| match x {
                x if x < 1000 => 0,
                x if x < 2000 => ((x * 7 + y) % 251) as u8,
                _ => 255,
            })
            .collect();
        writer.write_line(&mut data, &line).expect("line");
    }
    writer.end_page(&mut data).expect("end page");
    data
}

fn bench_pwg_decode(c: &mut Criterion) {
    let data = encoded_page();
    let mut line = vec![0u8; WIDTH as usize];

    c.bench_function("pwg decode page (5100x64 gray)", |b| {
        b.iter(|| {
            let mut reader = PwgReader::new(black_box(&data[..])).expect("reader");
            reader.next_page().expect("page").expect("one page");
            for _ in 0..64 {
                reader.read_line(&mut line).expect("line");
            }
            black_box(&line);
        });
    });
}

criterion_group!(benches, bench_dither, bench_pwg_decode);
criterion_main!(benches);
