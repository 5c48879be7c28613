use std::{io, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use tracing::{debug, info};

pub use js5watch_proto as proto;
use proto::{js5, Revision, Status};

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to connect: {0}")]
    Connect(#[source] io::Error),
    #[error("handshake failed: {0}")]
    Handshake(#[source] io::Error),
    #[error("unexpected handshake status {0}")]
    UnexpectedStatus(u8),
    #[error("revision still rejected after {0} increments")]
    RevisionExhausted(u32),
    #[error("ping failed: {0}")]
    Liveness(#[source] io::Error),
}

/// Coarse classification of [`Error`], deciding how the caller reacts
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The socket couldn't be opened or written
    Connection,
    /// The peer answered the handshake with something we can't use
    Protocol,
    /// A probe went unanswered
    Liveness,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connect(_) => ErrorKind::Connection,
            Error::Handshake(_) | Error::UnexpectedStatus(_) | Error::RevisionExhausted(_) => {
                ErrorKind::Protocol
            }
            Error::Liveness(_) => ErrorKind::Liveness,
        }
    }
}

/// A connection to a single JS5 endpoint.
///
/// Exists so the reset monitor can be driven by a scripted transport in tests; [`Js5Client`] is the only real
/// implementation.
#[async_trait]
pub trait Transport: Send {
    /// Address of the endpoint, for diagnostics
    fn address(&self) -> &str;

    /// (Re)connect and negotiate a revision, starting from `revision`.
    ///
    /// Returns the revision the endpoint accepted. Any previous connection is dropped first.
    async fn connect(&mut self, revision: Revision) -> Result<Revision, Error>;

    /// Probe the endpoint, returning whatever it sent back
    async fn ping(&mut self) -> Result<Vec<u8>, Error>;

    /// Drop the connection, if any
    fn close(&mut self);
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bound on connecting and on every individual read or write
    pub timeout: Duration,
    /// Number of `MISMATCH` answers tolerated in a single `connect`
    pub max_revision_bumps: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_revision_bumps: 50,
        }
    }
}

/// JS5 client speaking just enough of the protocol to tell whether the server is up
pub struct Js5Client {
    address: String,
    config: ClientConfig,
    stream: Option<TcpStream>,
}

impl Js5Client {
    pub fn new(address: impl Into<String>, config: ClientConfig) -> Self {
        Self {
            address: address.into(),
            config,
            stream: None,
        }
    }

    #[cfg(test)]
    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn open(&self) -> Result<TcpStream, Error> {
        let stream = timeout(self.config.timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| Error::Connect(timed_out()))?
            .map_err(Error::Connect)?;
        stream.set_nodelay(true).map_err(Error::Connect)?;
        Ok(stream)
    }

    /// Open a fresh connection and offer `revision`
    async fn handshake(&self, revision: Revision) -> Result<(TcpStream, u8), Error> {
        let mut stream = self.open().await?;
        timeout(
            self.config.timeout,
            stream.write_all(&js5::handshake_frame(revision)),
        )
        .await
        .map_err(|_| Error::Connect(timed_out()))?
        .map_err(Error::Connect)?;
        let status = timeout(self.config.timeout, stream.read_u8())
            .await
            .map_err(|_| Error::Handshake(timed_out()))?
            .map_err(Error::Handshake)?;
        Ok((stream, status))
    }
}

#[async_trait]
impl Transport for Js5Client {
    fn address(&self) -> &str {
        &self.address
    }

    async fn connect(&mut self, mut revision: Revision) -> Result<Revision, Error> {
        self.close();
        let mut bumps = 0;
        loop {
            let (stream, status) = self.handshake(revision).await?;
            match Status::from_byte(status) {
                Some(Status::Match) => {
                    info!(endpoint = %self.address, revision, "revision settled");
                    self.stream = Some(stream);
                    return Ok(revision);
                }
                // The server hangs up after a mismatch, so the next attempt needs a new connection
                Some(Status::Mismatch) => {
                    if bumps == self.config.max_revision_bumps {
                        return Err(Error::RevisionExhausted(bumps));
                    }
                    bumps += 1;
                    revision += 1;
                    debug!(endpoint = %self.address, revision, "revision mismatch, bumping");
                }
                None => return Err(Error::UnexpectedStatus(status)),
            }
        }
    }

    async fn ping(&mut self) -> Result<Vec<u8>, Error> {
        let limit = self.config.timeout;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::Liveness(io::ErrorKind::NotConnected.into()))?;
        timeout(limit, stream.write_all(&js5::ping_frame()))
            .await
            .map_err(|_| Error::Liveness(timed_out()))?
            .map_err(Error::Liveness)?;
        let mut buf = vec![0; js5::MAX_RESPONSE];
        let n = timeout(limit, stream.read(&mut buf))
            .await
            .map_err(|_| Error::Liveness(timed_out()))?
            .map_err(Error::Liveness)?;
        if n == 0 {
            return Err(Error::Liveness(io::ErrorKind::UnexpectedEof.into()));
        }
        buf.truncate(n);
        Ok(buf)
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

fn timed_out() -> io::Error {
    io::ErrorKind::TimedOut.into()
}
