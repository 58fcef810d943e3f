// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Druckwerk, plus the error classification used by
// the job worker to tell retryable device trouble from fatal failures.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for all Druckwerk operations.
#[derive(Debug, Error)]
pub enum DruckwerkError {
    // -- Device errors --
    #[error("unsupported device URI scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid device URI: {0}")]
    InvalidUri(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unable to open device {uri}: {reason}")]
    DeviceOpen { uri: String, reason: String },

    #[error("device I/O error: {0}")]
    DeviceIo(String),

    #[error("short write to device: {written} of {expected} bytes")]
    ShortWrite { expected: usize, written: usize },

    #[error("device does not support {0}")]
    NotSupported(&'static str),

    #[error("device is closed")]
    DeviceClosed,

    // -- Job / printer errors --
    #[error("job {0} not found")]
    JobNotFound(u32),

    #[error("printer {0} not found")]
    PrinterNotFound(String),

    #[error("printer {0} has been deleted")]
    PrinterDeleted(String),

    #[error("job {job_id} cannot {action} while {state}")]
    InvalidJobState {
        job_id: u32,
        action: &'static str,
        state: String,
    },

    #[error("system is shutting down")]
    ShuttingDown,

    // -- Options / raster errors --
    #[error("invalid print attribute {name}: {reason}")]
    InvalidAttribute { name: String, reason: String },

    #[error("malformed capability range: {0}")]
    Capability(String),

    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("raster stream error: {0}")]
    Raster(String),

    #[error("image processing failed: {0}")]
    Image(String),

    #[error("driver callback {callback} failed: {message}")]
    Driver {
        callback: &'static str,
        message: String,
    },

    // -- Storage / configuration --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DruckwerkError>;

/// How far an error reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Device busy or temporarily unopenable; polled again later.
    Transient,
    /// The job cannot finish and is aborted.
    FatalToJob,
    /// The request is rejected before any job or device state exists.
    FatalToRequest,
}

/// Classify a `DruckwerkError` for retry decisions.
pub fn classify_error(err: &DruckwerkError) -> ErrorClass {
    match err {
        DruckwerkError::DeviceOpen { .. } => ErrorClass::Transient,
        DruckwerkError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::WouldBlock
            | std::io::ErrorKind::ResourceBusy
            | std::io::ErrorKind::Interrupted => ErrorClass::Transient,
            _ => ErrorClass::FatalToJob,
        },

        DruckwerkError::InvalidAttribute { .. }
        | DruckwerkError::InvalidUri(_)
        | DruckwerkError::UnsupportedScheme(_)
        | DruckwerkError::Capability(_)
        | DruckwerkError::JobNotFound(_)
        | DruckwerkError::PrinterNotFound(_)
        | DruckwerkError::InvalidJobState { .. }
        | DruckwerkError::Config(_) => ErrorClass::FatalToRequest,

        DruckwerkError::InvalidArgument(_)
        | DruckwerkError::DeviceIo(_)
        | DruckwerkError::ShortWrite { .. }
        | DruckwerkError::NotSupported(_)
        | DruckwerkError::DeviceClosed
        | DruckwerkError::PrinterDeleted(_)
        | DruckwerkError::ShuttingDown
        | DruckwerkError::UnsupportedFormat(_)
        | DruckwerkError::Raster(_)
        | DruckwerkError::Image(_)
        | DruckwerkError::Driver { .. }
        | DruckwerkError::Serialization(_) => ErrorClass::FatalToJob,
    }
}
