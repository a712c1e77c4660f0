//! Frame reader: turns a byte stream into decoded frames.
//!
//! The reader accumulates exactly [`HEADER_SIZE`] bytes across short reads,
//! checks the magic, then drains the payload in bounded chunks and throws the
//! pixels away. Any error ends the reader's usefulness for the connection;
//! there is no attempt to resync on a later byte.

use std::fmt;

use tokio::io::{AsyncRead, AsyncReadExt};

use super::header::{FrameHeader, HEADER_SIZE};

/// Upper bound for a single payload read (1 MiB).
pub const DEFAULT_READ_CHUNK: usize = 1024 * 1024;

/// The stream violated the wire contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("bad magic 0x{found:08x} (expected 0x5643414d)")]
    BadMagic { found: u32 },

    #[error("payload size overflows u64 (planes={planes})")]
    PayloadOverflow { planes: u32 },
}

/// Where in the frame the peer closed the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPosition {
    /// Between frames, before any header byte.
    FrameBoundary,
    /// Partway through a header.
    MidHeader { received: usize },
    /// After a full header, before the payload was complete.
    MidPayload { drained: u64, expected: u64 },
}

impl StreamPosition {
    pub fn is_clean(&self) -> bool {
        matches!(self, StreamPosition::FrameBoundary)
    }
}

impl fmt::Display for StreamPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamPosition::FrameBoundary => write!(f, "frame boundary"),
            StreamPosition::MidHeader { received } => {
                write!(f, "mid-header ({}/{} bytes)", received, HEADER_SIZE)
            }
            StreamPosition::MidPayload { drained, expected } => {
                write!(f, "mid-payload ({}/{} bytes)", drained, expected)
            }
        }
    }
}

/// Everything that can stop [`FrameReader::next_frame`] from producing a frame.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("end of stream at {0}")]
    EndOfStream(StreamPosition),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A decoded header together with the payload length that followed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub payload_size: u64,
}

/// Reads frames off a single connection.
pub struct FrameReader<R> {
    stream: R,
    chunk: Vec<u8>,
    last_header: Option<[u8; HEADER_SIZE]>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(stream: R) -> Self {
        Self::with_chunk_size(stream, DEFAULT_READ_CHUNK)
    }

    /// `chunk_size` caps each payload read; zero is bumped to one byte.
    pub fn with_chunk_size(stream: R, chunk_size: usize) -> Self {
        Self {
            stream,
            chunk: vec![0u8; chunk_size.max(1)],
            last_header: None,
        }
    }

    /// Raw bytes of the most recent complete header, valid or not.
    pub fn last_header_bytes(&self) -> Option<&[u8; HEADER_SIZE]> {
        self.last_header.as_ref()
    }

    /// Read the next frame header and drain its payload.
    pub async fn next_frame(&mut self) -> Result<Frame, ReadError> {
        let raw = self.read_header().await?;
        self.last_header = Some(raw);

        let header = FrameHeader::decode(&raw);
        if !header.has_valid_magic() {
            return Err(ProtocolError::BadMagic { found: header.magic }.into());
        }

        let payload_size = header.payload_size()?;
        self.drain_payload(payload_size).await?;

        Ok(Frame { header, payload_size })
    }

    async fn read_header(&mut self) -> Result<[u8; HEADER_SIZE], ReadError> {
        let mut raw = [0u8; HEADER_SIZE];
        let mut filled = 0;
        while filled < HEADER_SIZE {
            let n = self.stream.read(&mut raw[filled..]).await?;
            if n == 0 {
                let at = if filled == 0 {
                    StreamPosition::FrameBoundary
                } else {
                    StreamPosition::MidHeader { received: filled }
                };
                return Err(ReadError::EndOfStream(at));
            }
            filled += n;
        }
        Ok(raw)
    }

    async fn drain_payload(&mut self, expected: u64) -> Result<(), ReadError> {
        let mut drained: u64 = 0;
        while drained < expected {
            let want = (expected - drained).min(self.chunk.len() as u64) as usize;
            let n = self.stream.read(&mut self.chunk[..want]).await?;
            if n == 0 {
                return Err(ReadError::EndOfStream(StreamPosition::MidPayload {
                    drained,
                    expected,
                }));
            }
            drained += n as u64;
        }
        Ok(())
    }
}
