// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Druckwerk raster layer: page headers, dithering, colorspace conversion,
// PWG/URF streams, image rendering, option resolution, driver callbacks and
// the raster pipeline that ties them together.

pub mod compress;
pub mod convert;
pub mod dither;
pub mod driver;
pub mod header;
pub mod options;
pub mod pipeline;
pub mod pwg;
pub mod pwg_driver;
pub mod render;
pub mod source;
pub mod urf;

pub use driver::{Driver, DriverData, DriverError, DriverResult, JobInfo, RasterJob, RasterTypes};
pub use header::{ColorSpace, PixelFormat, RasterHeader};
pub use options::{
    DitherKind, DocumentInfo, PrintOptions, PrintRequest, parse_range, resolve_options,
    validate_request,
};
pub use pipeline::{JobProgress, RasterDocument, RasterOutcome, RasterPipeline, run_raster_job};
pub use pwg_driver::{PWG_DRIVER_NAME, PwgDriver, pwg_driver_data};

#[cfg(test)]
pub(crate) mod testing {
    use std::io;
    use std::sync::{Arc, Mutex};

    use druckwerk_device::{Connection, Writable};

    /// Connection collecting everything written to it.
    #[derive(Clone, Default)]
    pub(crate) struct SinkConnection {
        data: Arc<Mutex<Vec<u8>>>,
    }

    impl SinkConnection {
        pub(crate) fn bytes(&self) -> Vec<u8> {
            self.data.lock().expect("sink lock poisoned").clone()
        }
    }

    impl Writable for SinkConnection {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.data
                .lock()
                .expect("sink lock poisoned")
                .extend_from_slice(buf);
            Ok(buf.len())
        }
    }

    impl Connection for SinkConnection {}
}
