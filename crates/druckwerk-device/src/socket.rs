// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `socket:` scheme: raw TCP ("AppSocket"/JetDirect), port 9100 by default.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use druckwerk_core::error::{DruckwerkError, Result};

use crate::connection::{Connection, OpenContext, Readable, Writable};
use crate::registry::DeviceScheme;
use crate::uri::DeviceUri;

pub const DEFAULT_PORT: u16 = 9100;

/// Raw TCP transport.
#[derive(Debug, Clone, Copy)]
pub struct SocketScheme {
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for SocketScheme {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(60),
            read_timeout: Duration::from_secs(1),
        }
    }
}

impl DeviceScheme for SocketScheme {
    fn open(&self, uri: &DeviceUri, _ctx: &OpenContext<'_>) -> Result<Box<dyn Connection>> {
        if uri.host().is_empty() {
            return Err(DruckwerkError::InvalidUri(format!("{uri}: missing host")));
        }
        let port = uri.port().unwrap_or(DEFAULT_PORT);
        let open_err = |reason: String| DruckwerkError::DeviceOpen {
            uri: uri.to_string(),
            reason,
        };

        let addrs = (uri.host(), port)
            .to_socket_addrs()
            .map_err(|e| open_err(format!("resolve {}: {e}", uri.host())))?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream
                        .set_write_timeout(Some(self.write_timeout))
                        .and_then(|()| stream.set_read_timeout(Some(self.read_timeout)))
                        .and_then(|()| stream.set_nodelay(true))
                        .map_err(|e| open_err(e.to_string()))?;
                    debug!(%addr, "socket device connected");
                    return Ok(Box::new(SocketConnection { stream }));
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(open_err(last_err.map_or_else(
            || format!("no addresses for {}", uri.host()),
            |e| e.to_string(),
        )))
    }
}

struct SocketConnection {
    stream: TcpStream,
}

impl Writable for SocketConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write_all(buf)?;
        Ok(buf.len())
    }
}

impl Readable for SocketConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stream.read(buf) {
            // Nothing back-channel yet is not end of stream.
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(0)
            }
            other => other,
        }
    }
}

impl Connection for SocketConnection {
    fn readable(&mut self) -> Option<&mut dyn Readable> {
        Some(self)
    }

    fn close(&mut self) -> io::Result<()> {
        self.stream.flush()?;
        match self.stream.shutdown(Shutdown::Write) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn sends_bytes_to_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();

        let server = thread::spawn(move || {
            let (mut conn, _) = listener.accept().expect("accept");
            let mut received = Vec::new();
            conn.read_to_end(&mut received).expect("read");
            received
        });

        let uri = DeviceUri::parse(&format!("socket://127.0.0.1:{port}")).expect("uri");
        let mut conn = SocketScheme::default()
            .open(&uri, &OpenContext::default())
            .expect("open");
        conn.write(b"\x1bE hello").expect("write");
        conn.close().expect("close");
        drop(conn);

        assert_eq!(server.join().expect("server"), b"\x1bE hello");
    }

    #[test]
    fn refused_connection_is_open_error() {
        // Bind then drop to find a port nobody listens on.
        let port = TcpListener::bind("127.0.0.1:0")
            .expect("bind")
            .local_addr()
            .expect("addr")
            .port();
        let uri = DeviceUri::parse(&format!("socket://127.0.0.1:{port}")).expect("uri");
        let err = SocketScheme::default()
            .open(&uri, &OpenContext::default())
            .err()
            .expect("refused");
        assert!(matches!(err, DruckwerkError::DeviceOpen { .. }));
    }

    #[test]
    fn missing_host_is_rejected() {
        let uri = DeviceUri::parse("socket:///").expect("uri");
        assert!(matches!(
            SocketScheme::default().open(&uri, &OpenContext::default()),
            Err(DruckwerkError::InvalidUri(_))
        ));
    }
}
