//! Live UDP source
//!
//! Each datagram carries one JSON object mapping field names to scalars.

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use chrono::Local;
use tokio::net::UdpSocket;
use tracing::{info, warn};

use super::{RecordSource, SourceKind};
use crate::error::SourceError;
use crate::record::RawRecord;

/// Receive buffer size used when none is configured
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 4096;

/// Connectionless network listener
#[derive(Debug)]
pub struct LiveSource {
    socket: UdpSocket,
    buf: Vec<u8>,
    rejected: u64,
}

impl LiveSource {
    /// Bind the listener
    ///
    /// Datagrams longer than `max_datagram_size` are truncated and will fail
    /// to parse.
    pub async fn bind(addr: SocketAddr, max_datagram_size: usize) -> Result<Self, SourceError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| SourceError::Bind { addr, source })?;
        let local = socket.local_addr()?;
        info!(%local, "listening for telemetry datagrams");

        Ok(Self {
            socket,
            buf: vec![0u8; max_datagram_size.max(1)],
            rejected: 0,
        })
    }

    /// Address the socket is bound to
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

#[async_trait]
impl RecordSource for LiveSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Live
    }

    async fn next_record(&mut self) -> Result<Option<RawRecord>, SourceError> {
        loop {
            let (len, from) = match self.socket.recv_from(&mut self.buf).await {
                Ok(received) => received,
                // Reported on some platforms after an ICMP port unreachable
                Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {
                    warn!(error = %e, "transient UDP receive error");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let payload = &self.buf[..len];
            match RawRecord::from_json_slice(payload, Local::now().naive_local()) {
                Ok(record) => return Ok(Some(record)),
                Err(e) => {
                    self.rejected += 1;
                    warn!(%from, len, error = %e, "dropping malformed telemetry payload");
                }
            }
        }
    }

    fn rejected(&self) -> u64 {
        self.rejected
    }
}
