use std::future::Future;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use cozyscan_common::config::Config;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

use crate::protocol::{self, IdentifyRequest, ProbeOutcome, RESPONSE_BUFFER_SIZE};

/// Local failures that say nothing about the remote host.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe of {address} failed locally: {source}")]
    Internal {
        address: Ipv4Addr,
        #[source]
        source: io::Error,
    },
    #[error("could not encode identify request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Runs the identify handshake against one address.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, addr: Ipv4Addr) -> Result<ProbeOutcome, ProbeError>;
}

#[derive(Debug, Clone, Copy)]
pub struct TcpProber {
    port: u16,
    timeout: Duration,
}

impl TcpProber {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }
}

impl From<&Config> for TcpProber {
    fn from(cfg: &Config) -> Self {
        Self::new(cfg.port, cfg.timeout)
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, addr: Ipv4Addr) -> Result<ProbeOutcome, ProbeError> {
        identify(addr, self.port, self.timeout).await
    }
}

/// One connect, one write, one read, each bounded by `probe_timeout`.
///
/// Refusals, resets, timeouts and anything that does not classify as a device
/// come back as [`ProbeOutcome::Absent`]. The stream is dropped, and therefore
/// closed, on every path out of this function.
pub async fn identify(
    addr: Ipv4Addr,
    port: u16,
    probe_timeout: Duration,
) -> Result<ProbeOutcome, ProbeError> {
    let socket_addr: SocketAddr = SocketAddr::new(IpAddr::V4(addr), port);
    let frame: Vec<u8> = IdentifyRequest::new().to_frame()?;

    let Some(mut stream) =
        bounded(addr, "connect", probe_timeout, TcpStream::connect(socket_addr)).await?
    else {
        return Ok(ProbeOutcome::Absent);
    };

    if bounded(addr, "write", probe_timeout, stream.write_all(&frame))
        .await?
        .is_none()
    {
        return Ok(ProbeOutcome::Absent);
    }

    let mut buf = [0u8; RESPONSE_BUFFER_SIZE];
    let Some(len) = bounded(addr, "read", probe_timeout, stream.read(&mut buf)).await? else {
        return Ok(ProbeOutcome::Absent);
    };
    drop(stream);

    let outcome = protocol::classify(&buf[..len], addr);
    trace!(%addr, bytes = len, found = outcome.is_found(), "identify response classified");
    Ok(outcome)
}

/// Awaits `fut` for at most `limit`. Timeouts and remote-side errors yield
/// `None`; local errors are returned as [`ProbeError::Internal`].
async fn bounded<T, F>(
    addr: Ipv4Addr,
    stage: &'static str,
    limit: Duration,
    fut: F,
) -> Result<Option<T>, ProbeError>
where
    F: Future<Output = io::Result<T>>,
{
    match timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(Some(value)),
        Ok(Err(e)) if is_remote_failure(&e) => {
            trace!(%addr, stage, error = %e, "no device");
            Ok(None)
        }
        Ok(Err(e)) => Err(ProbeError::Internal {
            address: addr,
            source: e,
        }),
        Err(_elapsed) => {
            trace!(%addr, stage, "timed out");
            Ok(None)
        }
    }
}

fn is_remote_failure(e: &io::Error) -> bool {
    use io::ErrorKind::*;
    matches!(
        e.kind(),
        ConnectionRefused
            | ConnectionReset
            | ConnectionAborted
            | NotConnected
            | BrokenPipe
            | TimedOut
            | UnexpectedEof
            | Interrupted
            | WouldBlock
            | HostUnreachable
            | NetworkUnreachable
            | NetworkDown
    )
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
