//! A single TCP connection to the store.

use super::error::StoreError;
use super::resp::{encode_command, parse_frame, Frame};
use bytes::BytesMut;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Cap on establishing a TCP connection, so an unroutable endpoint fails
/// fast enough for the retry loop to move on.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// One request/reply connection.
///
/// Replies are read into an internal buffer and decoded incrementally, so a
/// frame split across reads is handled transparently.
#[derive(Debug)]
pub(crate) struct Connection {
    stream: TcpStream,
    buffer: BytesMut,
}

impl Connection {
    /// Opens a connection to `addr` (`host:port`).
    pub async fn open(addr: &str) -> Result<Self, StoreError> {
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                StoreError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect to {addr} timed out"),
                ))
            })??;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            buffer: BytesMut::with_capacity(4096),
        })
    }

    /// Sends one command and reads one reply frame.
    ///
    /// A `-ERR` reply is mapped to [`StoreError::ServerError`].
    pub async fn request(&mut self, args: &[&[u8]]) -> Result<Frame, StoreError> {
        self.stream.write_all(&encode_command(args)).await?;
        match self.read_frame().await? {
            Frame::Error(message) => Err(StoreError::ServerError(message)),
            frame => Ok(frame),
        }
    }

    /// Reads one complete frame, pulling more bytes as needed.
    async fn read_frame(&mut self) -> Result<Frame, StoreError> {
        loop {
            if let Some(frame) = parse_frame(&mut self.buffer)? {
                return Ok(frame);
            }
            let read = self.stream.read_buf(&mut self.buffer).await?;
            if read == 0 {
                return Err(StoreError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "store closed the connection",
                )));
            }
        }
    }
}
