// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Device URI decomposition: `scheme://host[:port]/resource[?options]`.
//
// The `file:` scheme also accepts the short `file:/path` form.  Host,
// resource, and option values are percent-decoded.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use druckwerk_core::error::{DruckwerkError, Result};

/// A decomposed device URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceUri {
    raw: String,
    scheme: String,
    host: String,
    port: Option<u16>,
    resource: String,
    options: BTreeMap<String, String>,
}

impl DeviceUri {
    /// Split a device URI into its parts.
    pub fn parse(uri: &str) -> Result<Self> {
        let invalid = |reason: &str| DruckwerkError::InvalidUri(format!("{uri}: {reason}"));

        let (scheme, rest) = uri.split_once(':').ok_or_else(|| invalid("missing scheme"))?;
        if scheme.is_empty()
            || !scheme.starts_with(|c: char| c.is_ascii_alphabetic())
            || !scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return Err(invalid("bad scheme"));
        }
        let scheme = scheme.to_ascii_lowercase();

        let (before_query, query) = match rest.split_once('?') {
            Some((before, query)) => (before, Some(query)),
            None => (rest, None),
        };

        let (authority, resource) = match before_query.strip_prefix("//") {
            Some(after) => match after.find('/') {
                Some(slash) => (&after[..slash], &after[slash..]),
                None => (after, "/"),
            },
            None if before_query.starts_with('/') => ("", before_query),
            None => return Err(invalid("expected '//' or an absolute path")),
        };

        // Drop any userinfo; device URIs never carry credentials we use.
        let hostport = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
        let (host, port) = split_host_port(hostport).ok_or_else(|| invalid("bad port"))?;

        let mut options = BTreeMap::new();
        if let Some(query) = query {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                options.insert(
                    percent_decode(key).ok_or_else(|| invalid("bad escape in options"))?,
                    percent_decode(value).ok_or_else(|| invalid("bad escape in options"))?,
                );
            }
        }

        Ok(Self {
            raw: uri.to_string(),
            scheme,
            host: percent_decode(host).ok_or_else(|| invalid("bad escape in host"))?,
            port,
            resource: percent_decode(resource).ok_or_else(|| invalid("bad escape in resource"))?,
            options,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Decoded path, always starting with `/`.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }
}

impl FromStr for DeviceUri {
    type Err = DruckwerkError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for DeviceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn split_host_port(hostport: &str) -> Option<(&str, Option<u16>)> {
    // Bracketed IPv6 literal.
    if let Some(inner) = hostport.strip_prefix('[') {
        let (host, after) = inner.split_once(']')?;
        return match after.strip_prefix(':') {
            Some(port) => Some((host, Some(port.parse().ok()?))),
            None if after.is_empty() => Some((host, None)),
            None => None,
        };
    }

    match hostport.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() => Some((host, Some(port.parse().ok()?))),
        Some((host, _)) => Some((host, None)),
        None => Some((hostport, None)),
    }
}

/// Decode `%XX` escapes. Returns `None` on a malformed escape or invalid UTF-8.
pub fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            let hex = std::str::from_utf8(hex).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// Escape everything outside the URI "unreserved" set.
pub fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_uri_with_options() {
        let uri = DeviceUri::parse("file:///tmp/out.prn?ext=bin").expect("parse");
        assert_eq!(uri.scheme(), "file");
        assert_eq!(uri.host(), "");
        assert_eq!(uri.resource(), "/tmp/out.prn");
        assert_eq!(uri.option("ext"), Some("bin"));
    }

    #[test]
    fn short_file_form() {
        let uri = DeviceUri::parse("file:/var/spool/out").expect("parse");
        assert_eq!(uri.resource(), "/var/spool/out");
    }

    #[test]
    fn socket_with_port() {
        let uri = DeviceUri::parse("socket://192.168.0.10:9101").expect("parse");
        assert_eq!(uri.host(), "192.168.0.10");
        assert_eq!(uri.port(), Some(9101));
        assert_eq!(uri.resource(), "/");
    }

    #[test]
    fn ipv6_literal() {
        let uri = DeviceUri::parse("socket://[fe80::1]:9100/").expect("parse");
        assert_eq!(uri.host(), "fe80::1");
        assert_eq!(uri.port(), Some(9100));
    }

    #[test]
    fn usb_uri_is_decoded() {
        let uri = DeviceUri::parse("usb://Acme%20Corp/Label%20Writer?serial=0A1B").expect("parse");
        assert_eq!(uri.host(), "Acme Corp");
        assert_eq!(uri.resource(), "/Label Writer");
        assert_eq!(uri.option("serial"), Some("0A1B"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(DeviceUri::parse("no-scheme-here").is_err());
        assert!(DeviceUri::parse("socket://host:notaport").is_err());
        assert!(DeviceUri::parse("file:///bad%zz").is_err());
        assert!(DeviceUri::parse("1abc://host").is_err());
    }

    #[test]
    fn encode_decode_agree() {
        let original = "Acme Corp/Model #5";
        assert_eq!(
            percent_decode(&percent_encode(original)).as_deref(),
            Some(original)
        );
    }
}
