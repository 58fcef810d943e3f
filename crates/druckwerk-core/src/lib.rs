// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Druckwerk — core types, errors, and configuration shared across all crates.

pub mod config;
pub mod error;
pub mod media;
pub mod types;

pub use config::{PrinterConfig, SystemConfig};
pub use error::{DruckwerkError, ErrorClass, Result, classify_error};
pub use media::MediaCol;
pub use types::*;
