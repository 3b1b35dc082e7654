//! UDP telemetry socket
//!
//! The worker thread is the only reader. Receives block for at most the
//! configured read timeout so the loop can notice a stop request even when
//! the simulator is silent.

use socket2::{Domain, Protocol, Socket, Type};
use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use crate::error::NetworkError;

/// Receive buffer size; the codec only needs the first 256 bytes
pub const RECV_BUFFER_SIZE: usize = 512;

/// Outcome of a single receive attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recv {
    /// A datagram of this many bytes; zero means the connection is gone
    Packet(usize),
    /// Nothing arrived within the read timeout
    TimedOut,
}

/// Anything the telemetry loop can pull packets from
pub trait PacketSource: Send {
    fn recv(&mut self, buf: &mut [u8]) -> Result<Recv, NetworkError>;
}

/// Telemetry socket bound with address reuse
pub struct TelemetrySocket {
    inner: UdpSocket,
    local_addr: SocketAddr,
}

impl TelemetrySocket {
    /// Bind to `address:port`
    pub fn bind(address: &str, port: u16, read_timeout: Duration) -> Result<Self, NetworkError> {
        let addr = (address, port)
            .to_socket_addrs()
            .map_err(|e| NetworkError::InvalidAddress(format!("{}:{}: {}", address, port, e)))?
            .next()
            .ok_or_else(|| NetworkError::InvalidAddress(format!("{}:{}", address, port)))?;

        let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| NetworkError::BindFailed(e.to_string()))?;
        socket
            .set_reuse_address(true)
            .map_err(|e| NetworkError::BindFailed(e.to_string()))?;
        socket
            .bind(&addr.into())
            .map_err(|e| NetworkError::BindFailed(format!("{}: {}", addr, e)))?;
        if !read_timeout.is_zero() {
            socket
                .set_read_timeout(Some(read_timeout))
                .map_err(|e| NetworkError::BindFailed(e.to_string()))?;
        }

        let inner: UdpSocket = socket.into();
        let local_addr = inner.local_addr().unwrap_or(addr);

        tracing::info!("Telemetry socket bound to {}", local_addr);

        Ok(Self { inner, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl PacketSource for TelemetrySocket {
    fn recv(&mut self, buf: &mut [u8]) -> Result<Recv, NetworkError> {
        match self.inner.recv(buf) {
            Ok(len) => Ok(Recv::Packet(len)),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Ok(Recv::TimedOut)
            }
            Err(e) => Err(NetworkError::ReceiveFailed(e.to_string())),
        }
    }
}
