// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cumulative per-device I/O metrics.
//
// Only the thread that currently owns a `Device` touches its metrics, so
// plain integers suffice.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Counters for one device, exposed as a read-only snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMetrics {
    pub read_requests: u64,
    pub read_bytes: u64,
    pub read_msecs: u64,
    pub write_requests: u64,
    pub write_bytes: u64,
    pub write_msecs: u64,
    pub status_requests: u64,
    pub status_msecs: u64,
}

/// Operation class a sample is recorded under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpClass {
    Read,
    Write,
    Status,
}

/// Wall-clock timer for one device operation.
pub(crate) struct Sample {
    class: OpClass,
    started: Instant,
}

impl Sample {
    pub(crate) fn start(class: OpClass) -> Self {
        Self {
            class,
            started: Instant::now(),
        }
    }

    /// Record the sample. `bytes` is zero for failed and status operations.
    pub(crate) fn finish(self, metrics: &mut DeviceMetrics, bytes: usize) {
        let msecs = self.started.elapsed().as_millis() as u64;
        match self.class {
            OpClass::Read => {
                metrics.read_requests += 1;
                metrics.read_bytes += bytes as u64;
                metrics.read_msecs += msecs;
            }
            OpClass::Write => {
                metrics.write_requests += 1;
                metrics.write_bytes += bytes as u64;
                metrics.write_msecs += msecs;
            }
            OpClass::Status => {
                metrics.status_requests += 1;
                metrics.status_msecs += msecs;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_accumulate_per_class() {
        let mut metrics = DeviceMetrics::default();
        Sample::start(OpClass::Write).finish(&mut metrics, 100);
        Sample::start(OpClass::Write).finish(&mut metrics, 28);
        Sample::start(OpClass::Read).finish(&mut metrics, 0);
        Sample::start(OpClass::Status).finish(&mut metrics, 0);

        assert_eq!(metrics.write_requests, 2);
        assert_eq!(metrics.write_bytes, 128);
        assert_eq!(metrics.read_requests, 1);
        assert_eq!(metrics.read_bytes, 0);
        assert_eq!(metrics.status_requests, 1);
    }
}
