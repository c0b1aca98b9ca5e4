//! UDP transport for exchanging a single query/response pair with a
//! remote nameserver. No TCP fallback: a truncated response is
//! surfaced to the caller as-is and it is up to them to treat it as
//! recoverable.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::error::ResolutionError;

/// Maximum size of a response datagram, matching the UDP payload size
/// advertised in the outbound query's EDNS(0) OPT record.
const RECV_BUFFER_SIZE: usize = 4096;

const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Send `query_bytes` to `server_ipv4` on the standard DNS port and
/// return whatever datagram comes back first. Opens a fresh ephemeral
/// socket per exchange and lets it drop (closing it) on every exit
/// path.
///
/// # Errors
///
/// Returns `Timeout` if no response arrives within the exchange
/// timeout, or `SendFailed` if the socket could not be opened or the
/// query could not be sent.
pub async fn exchange(server_ipv4: Ipv4Addr, query_bytes: &[u8]) -> Result<Bytes, ResolutionError> {
    exchange_to_port(server_ipv4, 53, query_bytes).await
}

/// Like `exchange`, but to an arbitrary port - used directly by tests
/// to talk to a loopback responder without root privileges.
///
/// # Errors
///
/// See [`exchange`].
pub async fn exchange_to_port(
    server_ipv4: Ipv4Addr,
    port: u16,
    query_bytes: &[u8],
) -> Result<Bytes, ResolutionError> {
    if let Ok(res) = timeout(
        EXCHANGE_TIMEOUT,
        exchange_notimeout(server_ipv4, port, query_bytes),
    )
    .await
    {
        res
    } else {
        tracing::debug!(%server_ipv4, "timed out");
        Err(ResolutionError::Timeout)
    }
}

async fn exchange_notimeout(
    server_ipv4: Ipv4Addr,
    port: u16,
    query_bytes: &[u8],
) -> Result<Bytes, ResolutionError> {
    let address = SocketAddr::from((server_ipv4, port));

    let sock = UdpSocket::bind("0.0.0.0:0").await.map_err(|error| {
        tracing::warn!(%address, ?error, "could not open socket");
        ResolutionError::SendFailed
    })?;
    sock.connect(address).await.map_err(|error| {
        tracing::warn!(%address, ?error, "could not connect socket");
        ResolutionError::SendFailed
    })?;
    sock.send(query_bytes).await.map_err(|error| {
        tracing::warn!(%address, ?error, "could not send query");
        ResolutionError::SendFailed
    })?;

    let mut buf = BytesMut::zeroed(RECV_BUFFER_SIZE);
    let size = sock.recv(&mut buf).await.map_err(|error| {
        tracing::warn!(%address, ?error, "could not receive response");
        ResolutionError::Timeout
    })?;
    buf.truncate(size);

    Ok(buf.freeze())
}
