// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Spool directory: where submitted documents wait for their job worker.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use druckwerk_core::error::Result;
use druckwerk_core::types::{DocumentFormat, JobId, sanitize_name};

/// Spool file name: `{printer}-j{job:09}-{job name}.{ext}`.
pub fn spool_file_name(printer: &str, job_id: JobId, job_name: &str, format: &DocumentFormat) -> String {
    format!(
        "{}-j{:09}-{}.{}",
        sanitize_name(printer),
        job_id.0,
        sanitize_name(job_name),
        format.extension()
    )
}

/// What was written for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpooledFile {
    pub path: PathBuf,
    pub bytes: u64,
    /// Lowercase hex SHA-256 of the content.
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct Spool {
    dir: PathBuf,
}

impl Spool {
    /// Use `dir`, creating it when missing.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy `reader` into a new spool file, hashing as it goes. A second
    /// document of the same job gets a numeric suffix.
    #[instrument(skip_all, fields(printer = %printer, job_id = %job_id))]
    pub fn store(
        &self,
        printer: &str,
        job_id: JobId,
        job_name: &str,
        format: &DocumentFormat,
        reader: &mut dyn Read,
    ) -> Result<SpooledFile> {
        let path = self.unique_path(&spool_file_name(printer, job_id, job_name, format));
        let result = copy_hashed(reader, &path);
        if result.is_err() {
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "cannot remove partial spool file");
                }
            }
        }
        let (bytes, digest) = result?;
        debug!(path = %path.display(), bytes, "document spooled");
        Ok(SpooledFile {
            path,
            bytes,
            sha256: digest,
        })
    }

    fn unique_path(&self, name: &str) -> PathBuf {
        let first = self.dir.join(name);
        if !first.exists() {
            return first;
        }
        let (stem, ext) = name.rsplit_once('.').unwrap_or((name, ""));
        (2u32..)
            .map(|n| self.dir.join(format!("{stem}-{n}.{ext}")))
            .find(|p| !p.exists())
            .unwrap_or(first)
    }
}

fn copy_hashed(reader: &mut dyn Read, path: &Path) -> Result<(u64, String)> {
    let mut out = BufWriter::new(File::create(path)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 16 * 1024];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buf[..n]);
        out.write_all(&buf[..n])?;
        total += n as u64;
    }
    out.flush()?;
    Ok((total, hex::encode(hasher.finalize())))
}

/// Delete a spool file, ignoring one that is already gone.
pub fn remove_spool_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "spool file removed"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "cannot remove spool file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_the_spool_pattern() {
        assert_eq!(
            spool_file_name("Office Laser", JobId(42), "my report", &DocumentFormat::Pdf),
            format!(
                "{}-j000000042-{}.pdf",
                sanitize_name("Office Laser"),
                sanitize_name("my report")
            )
        );
        assert!(
            spool_file_name("lp", JobId(1), "x", &DocumentFormat::Other("text/plain".into()))
                .ends_with(".prn")
        );
    }

    #[test]
    fn store_records_size_and_digest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let spool = Spool::open(dir.path().join("spool")).expect("spool");
        let stored = spool
            .store("lp", JobId(1), "hello", &DocumentFormat::Png, &mut &b"abc"[..])
            .expect("store");

        assert_eq!(stored.bytes, 3);
        assert_eq!(
            stored.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(fs::read(&stored.path).expect("read back"), b"abc");

        let second = spool
            .store("lp", JobId(1), "hello", &DocumentFormat::Png, &mut &b"d"[..])
            .expect("store");
        assert_ne!(second.path, stored.path);

        remove_spool_file(&stored.path);
        remove_spool_file(&stored.path);
        assert!(!stored.path.exists());
    }
}
