// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `file:` scheme.
//
// The resource path decides how the device is opened:
//   directory          -> new file `{dir}/{job name}.{ext}` (ext from `?ext=`, default "prn")
//   character device   -> exclusive write
//   regular or missing -> append, creating if needed
//   anything else      -> invalid argument

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use druckwerk_core::error::{DruckwerkError, Result};
use druckwerk_core::types::sanitize_name;

use crate::connection::{Connection, OpenContext, Writable};
use crate::registry::DeviceScheme;
use crate::uri::DeviceUri;

const DEFAULT_EXTENSION: &str = "prn";

/// How a `file:` resource will be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileTarget {
    /// Fresh per-job file inside a directory.
    Generated(PathBuf),
    /// Character special file, opened exclusively.
    CharDevice(PathBuf),
    /// Regular file, opened for append.
    Append(PathBuf),
}

impl FileTarget {
    pub fn path(&self) -> &Path {
        match self {
            Self::Generated(p) | Self::CharDevice(p) | Self::Append(p) => p,
        }
    }
}

/// Decide how `uri` should be opened for the job in `ctx`.
pub fn resolve_target(uri: &DeviceUri, ctx: &OpenContext<'_>) -> Result<FileTarget> {
    let path = PathBuf::from(uri.resource());

    let meta = match std::fs::metadata(&path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(FileTarget::Append(path)),
        Err(e) => {
            return Err(DruckwerkError::DeviceOpen {
                uri: uri.to_string(),
                reason: e.to_string(),
            });
        }
    };

    if meta.is_dir() {
        let name = sanitize_name(ctx.job_name.unwrap_or("untitled"));
        let ext = uri
            .option("ext")
            .map(sanitize_name)
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
        return Ok(FileTarget::Generated(path.join(format!("{name}.{ext}"))));
    }
    if is_char_device(&meta) {
        return Ok(FileTarget::CharDevice(path));
    }
    if meta.is_file() {
        return Ok(FileTarget::Append(path));
    }

    Err(DruckwerkError::InvalidArgument(format!(
        "{} is not a directory, character device, or regular file",
        path.display()
    )))
}

/// Whether `path` (or, if it does not exist, its directory) is writable.
pub fn is_writable(path: &Path) -> bool {
    if path.exists() {
        return access_writable(path);
    }
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.is_dir() && access_writable(parent),
        _ => false,
    }
}

#[cfg(unix)]
fn access_writable(path: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(cpath) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: `cpath` is a valid NUL-terminated string for the duration of the call.
    unsafe { libc::access(cpath.as_ptr(), libc::W_OK) == 0 }
}

#[cfg(not(unix))]
fn access_writable(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|m| !m.permissions().readonly())
}

#[cfg(unix)]
fn is_char_device(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::FileTypeExt;
    meta.file_type().is_char_device()
}

#[cfg(not(unix))]
fn is_char_device(_meta: &std::fs::Metadata) -> bool {
    false
}

fn open_target(target: &FileTarget) -> io::Result<File> {
    match target {
        FileTarget::Generated(path) => OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path),
        FileTarget::CharDevice(path) => {
            let mut options = OpenOptions::new();
            options.write(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.custom_flags(libc::O_EXCL);
            }
            options.open(path)
        }
        FileTarget::Append(path) => OpenOptions::new().append(true).create(true).open(path),
    }
}

/// The built-in `file:` scheme.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileScheme;

impl DeviceScheme for FileScheme {
    fn open(&self, uri: &DeviceUri, ctx: &OpenContext<'_>) -> Result<Box<dyn Connection>> {
        let target = resolve_target(uri, ctx)?;
        let file = open_target(&target).map_err(|e| DruckwerkError::DeviceOpen {
            uri: uri.to_string(),
            reason: format!("{}: {e}", target.path().display()),
        })?;
        debug!(path = %target.path().display(), ?target, "file device opened");
        Ok(Box::new(FileConnection { file }))
    }
}

struct FileConnection {
    file: File,
}

impl Writable for FileConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write_all(buf)?;
        Ok(buf.len())
    }
}

impl Connection for FileConnection {
    fn close(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SchemeRegistry;

    fn uri(s: &str) -> DeviceUri {
        DeviceUri::parse(s).expect("uri")
    }

    #[test]
    fn directory_gets_per_job_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let u = uri(&format!("file://{}?ext=pwg", dir.path().display()));
        let ctx = OpenContext {
            job_name: Some("Quarterly report (final).pdf"),
            ..Default::default()
        };

        let target = resolve_target(&u, &ctx).expect("target");
        assert_eq!(
            target,
            FileTarget::Generated(dir.path().join("Quarterly_report__final_.pdf.pwg"))
        );
    }

    #[test]
    fn directory_without_job_name_uses_default_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let u = uri(&format!("file://{}", dir.path().display()));
        let target = resolve_target(&u, &OpenContext::default()).expect("target");
        assert_eq!(target.path(), dir.path().join("untitled.prn"));
    }

    #[test]
    fn missing_path_is_appended() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.prn");
        let u = uri(&format!("file://{}", path.display()));
        assert_eq!(
            resolve_target(&u, &OpenContext::default()).expect("target"),
            FileTarget::Append(path)
        );
    }

    #[cfg(unix)]
    #[test]
    fn dev_null_is_a_char_device() {
        let u = uri("file:///dev/null");
        assert_eq!(
            resolve_target(&u, &OpenContext::default()).expect("target"),
            FileTarget::CharDevice(PathBuf::from("/dev/null"))
        );
    }

    #[test]
    fn second_open_appends() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.prn");
        let u = format!("file://{}?ext=bin", path.display());
        let registry = SchemeRegistry::empty();
        registry.add_scheme(crate::registry::DeviceSchemeEntry::new(
            "file",
            crate::registry::DeviceType::Local,
            FileScheme,
        ));

        for chunk in [b"first\n".as_slice(), b"second\n".as_slice()] {
            let mut device = registry.open(&u, &OpenContext::default()).expect("open");
            device.write(chunk).expect("write");
            device.close().expect("close");
        }

        let contents = std::fs::read(&path).expect("read back");
        assert_eq!(contents, b"first\nsecond\n");
    }

    #[test]
    fn writability_of_missing_file_follows_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(is_writable(&dir.path().join("new.prn")));
        assert!(!is_writable(Path::new("/definitely/not/here/new.prn")));
    }
}
