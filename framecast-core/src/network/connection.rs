//! Outbound connection establishment.
//!
//! Resolves the target, connects with a deadline, and maps failures onto
//! the distinct error kinds the operator needs to tell apart: name
//! resolution, refusal, timeout.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::error::StreamError;

/// Target of the single outbound stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    host: String,
    port: u16,
}

impl ConnectionInfo {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Resolve `info` and open a TCP stream to the first address that accepts.
///
/// `timeout` bounds resolution and each connect attempt separately.
pub async fn open_stream(info: &ConnectionInfo, timeout: Duration) -> Result<TcpStream, StreamError> {
    let addrs = resolve(info, timeout).await?;

    let mut last_err = None;
    for addr in addrs {
        debug!("connecting to {addr}");
        match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                stream.set_nodelay(true)?;
                info!("connected to {info} ({addr})");
                return Ok(stream);
            }
            Ok(Err(e)) => last_err = Some(classify(e, addr, timeout)),
            Err(_) => last_err = Some(StreamError::Timeout(timeout)),
        }
    }

    Err(last_err.unwrap_or_else(|| StreamError::Dns {
        host: info.host().to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses"),
    }))
}

async fn resolve(info: &ConnectionInfo, timeout: Duration) -> Result<Vec<SocketAddr>, StreamError> {
    let lookup = tokio::net::lookup_host((info.host(), info.port()));
    let addrs: Vec<SocketAddr> = match tokio::time::timeout(timeout, lookup).await {
        Ok(Ok(addrs)) => addrs.collect(),
        Ok(Err(source)) => {
            return Err(StreamError::Dns {
                host: info.host().to_string(),
                source,
            });
        }
        Err(_) => return Err(StreamError::Timeout(timeout)),
    };

    if addrs.is_empty() {
        return Err(StreamError::Dns {
            host: info.host().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses"),
        });
    }
    Ok(addrs)
}

fn classify(e: std::io::Error, addr: SocketAddr, timeout: Duration) -> StreamError {
    match e.kind() {
        std::io::ErrorKind::ConnectionRefused => StreamError::ConnectionRefused {
            addr: addr.to_string(),
            source: e,
        },
        std::io::ErrorKind::TimedOut => StreamError::Timeout(timeout),
        _ => StreamError::Transport(e),
    }
}
