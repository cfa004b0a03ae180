//! Controller connection setup.
//!
//! Resolution and connect are the only waiting steps in the harness and
//! both are bounded: resolution by the system resolver, connect by an
//! explicit millisecond deadline on a non-blocking socket. Everything after
//! this module is readiness-driven.

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use mio::net::TcpStream;
use mio::{Events, Interest, Poll, Token};

use crate::error::BenchError;

/// Resolve `host:port` to the first usable address.
pub fn resolve(host: &str, port: u16) -> Result<SocketAddr, BenchError> {
    match (host, port).to_socket_addrs() {
        Ok(mut addrs) => addrs
            .next()
            .ok_or_else(|| BenchError::Resolution(format!("{host}: no addresses found"))),
        Err(e) => Err(BenchError::Resolution(format!("{host}: {e}"))),
    }
}

/// Open a non-blocking TCP connection to `addr`, waiting up to `timeout`
/// for the handshake to complete. `nodelay` disables Nagle (latency mode
/// is RTT-sensitive; throughput mode wants coalescing).
pub fn connect(
    addr: SocketAddr,
    timeout: Duration,
    nodelay: bool,
) -> Result<TcpStream, BenchError> {
    let mut stream =
        TcpStream::connect(addr).map_err(|e| BenchError::Connect(format!("{addr}: {e}")))?;

    // Wait for writability: that is when a non-blocking connect resolves.
    let mut poll = Poll::new()?;
    let mut events = Events::with_capacity(4);
    poll.registry()
        .register(&mut stream, Token(0), Interest::WRITABLE)?;
    poll.poll(&mut events, Some(timeout))?;
    if events.is_empty() {
        return Err(BenchError::Connect(format!(
            "{addr}: timed out after {} ms",
            timeout.as_millis()
        )));
    }
    if let Some(err) = stream.take_error()? {
        return Err(BenchError::Connect(format!("{addr}: {err}")));
    }
    // A connect still in flight reports NotConnected here.
    if let Err(e) = stream.peer_addr() {
        return Err(BenchError::Connect(format!("{addr}: {e}")));
    }
    poll.registry().deregister(&mut stream)?;

    if nodelay {
        stream.set_nodelay(true)?;
    }
    Ok(stream)
}
