//! Framed transport over a byte stream.
//!
//! [`FrameWriter`] and [`FrameReader`] wrap any `AsyncWrite` / `AsyncRead`
//! with the [`EnvelopeCodec`]. The helpers at the bottom establish the TCP
//! connection for each role and apply socket tuning. Tuning never changes
//! the wire format.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::codec::EnvelopeCodec;
use crate::error::{FramecastError, Result};

/// Lowest port accepted from configuration.
pub const MIN_PORT: u16 = 1024;

// ── SocketOptions ────────────────────────────────────────────────

/// Socket-level tuning applied when a connection is set up.
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// Disable Nagle's algorithm (TCP_NODELAY).
    pub nodelay: bool,
    /// SO_SNDBUF in bytes, `None` keeps the OS default.
    pub send_buffer_size: Option<u32>,
    /// SO_RCVBUF in bytes, `None` keeps the OS default.
    pub recv_buffer_size: Option<u32>,
    /// Deadline for establishing the connection.
    pub connect_timeout: Duration,
    /// Deadline for a single envelope write or read, `None` waits forever.
    pub io_timeout: Option<Duration>,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            nodelay: true,
            send_buffer_size: Some(1024 * 1024),
            recv_buffer_size: Some(1024 * 1024),
            connect_timeout: Duration::from_secs(10),
            io_timeout: Some(Duration::from_secs(10)),
        }
    }
}

// ── FrameWriter ──────────────────────────────────────────────────

/// Write side of the framed transport.
///
/// A failed [`send`](Self::send) leaves the stream in an unknown state;
/// there is no resynchronisation, so the caller must drop the writer.
pub struct FrameWriter<W> {
    sink: FramedWrite<W, EnvelopeCodec>,
    io_timeout: Option<Duration>,
    envelopes_sent: u64,
    bytes_sent: u64,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            sink: FramedWrite::new(writer, EnvelopeCodec::new()),
            io_timeout: None,
            envelopes_sent: 0,
            bytes_sent: 0,
        }
    }

    /// Bound every send by `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Write one envelope (prefix + payload) and flush it.
    pub async fn send(&mut self, payload: Bytes) -> Result<()> {
        let len = payload.len();
        let send = self.sink.send(payload);
        match self.io_timeout {
            Some(limit) => tokio::time::timeout(limit, send)
                .await
                .map_err(|_| FramecastError::Timeout(limit))??,
            None => send.await?,
        }
        self.envelopes_sent += 1;
        self.bytes_sent += (crate::codec::PREFIX_LEN + len) as u64;
        Ok(())
    }

    /// Envelopes written successfully.
    pub fn envelopes_sent(&self) -> u64 {
        self.envelopes_sent
    }

    /// Wire bytes written successfully, prefixes included.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }
}

// ── FrameReader ──────────────────────────────────────────────────

/// Read side of the framed transport.
pub struct FrameReader<R> {
    stream: FramedRead<R, EnvelopeCodec>,
    idle_timeout: Option<Duration>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_codec(reader, EnvelopeCodec::new())
    }

    pub fn with_codec(reader: R, codec: EnvelopeCodec) -> Self {
        Self {
            stream: FramedRead::new(reader, codec),
            idle_timeout: None,
        }
    }

    /// Fail a receive that sees no complete envelope within `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Read the next complete payload.
    ///
    /// `Ok(None)` means end of stream, including a peer that closed in the
    /// middle of a prefix or payload.
    pub async fn receive(&mut self) -> Result<Option<Bytes>> {
        let next = match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, self.stream.next())
                .await
                .map_err(|_| FramecastError::Timeout(limit))?,
            None => self.stream.next().await,
        };
        next.transpose()
    }
}

// ── Connection setup ─────────────────────────────────────────────

/// Reject ports below [`MIN_PORT`].
pub fn validate_port(port: u16) -> Result<u16> {
    if port < MIN_PORT {
        return Err(FramecastError::PortOutOfRange(port));
    }
    Ok(port)
}

/// Resolve `host:port` to the first usable socket address.
pub async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| FramecastError::InvalidAddress(format!("{host}:{port}: {e}")))?;
    addrs
        .next()
        .ok_or_else(|| FramecastError::InvalidAddress(format!("{host}:{port}: no addresses")))
}

fn new_socket(addr: &SocketAddr) -> std::io::Result<TcpSocket> {
    if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
}

/// Client role: connect to `host:port` with the given tuning.
pub async fn connect(host: &str, port: u16, options: &SocketOptions) -> Result<TcpStream> {
    let addr = resolve(host, port).await?;
    let socket = new_socket(&addr)?;
    if let Some(size) = options.send_buffer_size {
        socket.set_send_buffer_size(size)?;
    }
    if let Some(size) = options.recv_buffer_size {
        socket.set_recv_buffer_size(size)?;
    }

    tracing::debug!(%addr, "connecting");
    let stream = tokio::time::timeout(options.connect_timeout, socket.connect(addr))
        .await
        .map_err(|_| FramecastError::Timeout(options.connect_timeout))??;
    stream.set_nodelay(options.nodelay)?;
    Ok(stream)
}

/// Server role: bind `host:port` with a backlog of one connection.
pub async fn bind(host: &str, port: u16, options: &SocketOptions) -> Result<TcpListener> {
    let addr = resolve(host, port).await?;
    let bind_err = |source| FramecastError::Bind {
        addr: addr.to_string(),
        source,
    };

    let socket = new_socket(&addr).map_err(bind_err)?;
    socket.set_reuseaddr(true).map_err(bind_err)?;
    if let Some(size) = options.recv_buffer_size {
        socket.set_recv_buffer_size(size).map_err(bind_err)?;
    }
    socket.bind(addr).map_err(bind_err)?;
    socket.listen(1).map_err(bind_err)
}

/// Accept the next connection and apply per-stream tuning.
pub async fn accept(
    listener: &TcpListener,
    options: &SocketOptions,
) -> Result<(TcpStream, SocketAddr)> {
    let (stream, peer) = listener.accept().await?;
    stream.set_nodelay(options.nodelay)?;
    Ok((stream, peer))
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn round_trip(len: usize) -> Bytes {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let payload: Bytes = (0..len).map(|i| (i % 251) as u8).collect::<Vec<_>>().into();

        let expected = payload.clone();
        let writer = tokio::spawn(async move {
            let mut writer = FrameWriter::new(client);
            writer.send(payload).await.unwrap();
            writer
        });

        let mut reader = FrameReader::new(server);
        let received = reader.receive().await.unwrap().expect("end of stream");
        let writer = writer.await.unwrap();
        assert_eq!(writer.envelopes_sent(), 1);
        assert_eq!(writer.bytes_sent(), (len + 4) as u64);
        assert_eq!(received, expected);
        received
    }

    #[tokio::test]
    async fn round_trip_lengths() {
        for len in [0usize, 1, 65_535, 1 << 24] {
            assert_eq!(round_trip(len).await.len(), len);
        }
    }

    #[tokio::test]
    async fn eof_mid_prefix_is_end_of_stream() {
        let mock = tokio_test::io::Builder::new().read(&[0, 0]).build();
        let mut reader = FrameReader::new(mock);
        assert!(reader.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn eof_mid_payload_is_end_of_stream() {
        let mock = tokio_test::io::Builder::new()
            .read(&[0, 0, 0, 8])
            .read(b"half")
            .build();
        let mut reader = FrameReader::new(mock);
        assert!(reader.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn partial_reads_are_reassembled() {
        let mock = tokio_test::io::Builder::new()
            .read(&[0])
            .read(&[0, 0])
            .read(&[3, b'a'])
            .read(b"bc")
            .build();
        let mut reader = FrameReader::new(mock);
        assert_eq!(reader.receive().await.unwrap().as_deref(), Some(&b"abc"[..]));
        assert!(reader.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn read_error_is_failure() {
        let mock = tokio_test::io::Builder::new()
            .read(&[0, 0])
            .read_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            ))
            .build();
        let mut reader = FrameReader::new(mock);
        assert!(matches!(
            reader.receive().await,
            Err(FramecastError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn send_to_closed_peer_fails() {
        let (client, server) = tokio::io::duplex(1024);
        drop(server);
        let mut writer = FrameWriter::new(client);
        assert!(writer.send(Bytes::from_static(b"frame")).await.is_err());
        assert_eq!(writer.envelopes_sent(), 0);
    }

    #[tokio::test]
    async fn idle_timeout_fires() {
        let (_client, server) = tokio::io::duplex(1024);
        let mut reader = FrameReader::new(server).with_timeout(Some(Duration::from_millis(20)));
        assert!(matches!(
            reader.receive().await,
            Err(FramecastError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn tcp_connect_and_accept() {
        let options = SocketOptions::default();
        let listener = bind("127.0.0.1", 0, &options).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let client = tokio::spawn({
            let options = options.clone();
            async move {
                let stream = connect("127.0.0.1", port, &options).await.unwrap();
                let mut writer = FrameWriter::new(stream);
                writer.send(Bytes::from_static(b"over tcp")).await.unwrap();
            }
        });

        let (stream, _peer) = accept(&listener, &options).await.unwrap();
        let mut reader = FrameReader::new(stream);
        assert_eq!(
            reader.receive().await.unwrap().as_deref(),
            Some(&b"over tcp"[..])
        );
        client.await.unwrap();
        assert!(reader.receive().await.unwrap().is_none());
    }

    #[test]
    fn port_validation() {
        assert!(matches!(
            validate_port(80),
            Err(FramecastError::PortOutOfRange(80))
        ));
        assert_eq!(validate_port(1024).unwrap(), 1024);
        assert_eq!(validate_port(65_535).unwrap(), 65_535);
    }
}
