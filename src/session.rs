//! Connection session
//!
//! A session owns one accepted connection and drives its [`FrameReader`] until
//! the peer goes away or the stream breaks the protocol:
//!
//! ```text
//! Active --EndOfStream--> Closing --+
//!    |                              +--> Terminated (connection dropped)
//!    +----ProtocolError/Io--> Faulted
//! ```
//!
//! The frame counter lives in the session, so every connection counts from 1.

use std::fmt;

use tokio::io::AsyncRead;
use tokio::sync::mpsc::UnboundedSender;

use crate::network::{
    Frame, FrameReader, ProtocolError, ReadError, StreamPosition, DEFAULT_READ_CHUNK, MAX_PLANES,
};

/// One decoded frame as reported to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    /// 1-based position of the frame within its session.
    pub index: u64,
    pub frame: Frame,
}

impl fmt::Display for FrameReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = &self.frame.header;
        write!(
            f,
            "[frame {}] v{} {}x{} chroma=0x{:08x}",
            self.index, h.version, h.width, h.height, h.chroma
        )?;
        if let Some(cc) = h.fourcc() {
            write!(f, " ({})", cc)?;
        }
        write!(
            f,
            " planes={} pts={} pitches={:?} lines={:?} payload_bytes={}",
            h.planes, h.pts, h.pitches, h.lines, self.frame.payload_size
        )
    }
}

/// Operator-visible events, in the order a session produces them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    Frame(FrameReport),
    Disconnected(StreamPosition),
    Faulted { reason: String },
}

/// Receives session events.
pub trait Reporter {
    fn report(&mut self, event: &SessionEvent);
}

/// Writes events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Connected => tracing::info!("[receiver] [connected]"),
            SessionEvent::Frame(report) => {
                tracing::info!("{}", report);
                let h = &report.frame.header;
                if h.planes_overflow() {
                    // Clamped, not rejected.
                    tracing::warn!(
                        "[receiver] [planes_clamped] frame={} declared={} counted={}",
                        report.index,
                        h.planes,
                        MAX_PLANES
                    );
                }
            }
            SessionEvent::Disconnected(at) if at.is_clean() => {
                tracing::info!("[receiver] [disconnected]")
            }
            SessionEvent::Disconnected(at) => {
                tracing::info!("[receiver] [disconnected] truncated at {}", at)
            }
            SessionEvent::Faulted { reason } => {
                tracing::warn!("[receiver] [connection_error] {}", reason)
            }
        }
    }
}

impl Reporter for Vec<SessionEvent> {
    fn report(&mut self, event: &SessionEvent) {
        self.push(event.clone());
    }
}

/// Forwards events to another task, e.g. a test harness or a UI watching a
/// receiver that runs in its own task.
impl Reporter for UnboundedSender<SessionEvent> {
    fn report(&mut self, event: &SessionEvent) {
        // A dropped receiver only means nobody is listening any more.
        let _ = self.send(event.clone());
    }
}

/// How a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// Peer closed the connection, cleanly or not.
    Disconnected(StreamPosition),
    /// Protocol violation or transport fault.
    Faulted(ReadError),
}

#[derive(Debug)]
pub struct SessionOutcome {
    /// Frames fully read before the session ended.
    pub frames: u64,
    pub end: SessionEnd,
}

/// Drives a single connection from accept to close.
pub struct Session<R> {
    reader: FrameReader<R>,
    frames: u64,
}

impl<R: AsyncRead + Unpin> Session<R> {
    pub fn new(conn: R) -> Self {
        Self::with_chunk_size(conn, DEFAULT_READ_CHUNK)
    }

    pub fn with_chunk_size(conn: R, read_chunk: usize) -> Self {
        Self {
            reader: FrameReader::with_chunk_size(conn, read_chunk),
            frames: 0,
        }
    }

    /// Read frames until the connection ends. The connection is closed before returning.
    pub async fn run<P: Reporter + ?Sized>(mut self, reporter: &mut P) -> SessionOutcome {
        reporter.report(&SessionEvent::Connected);

        let end = loop {
            match self.reader.next_frame().await {
                Ok(frame) => {
                    self.frames += 1;
                    reporter.report(&SessionEvent::Frame(FrameReport {
                        index: self.frames,
                        frame,
                    }));
                }
                Err(ReadError::EndOfStream(at)) => {
                    reporter.report(&SessionEvent::Disconnected(at));
                    break SessionEnd::Disconnected(at);
                }
                Err(err) => {
                    if let ReadError::Protocol(ProtocolError::BadMagic { .. }) = err {
                        if let Some(raw) = self.reader.last_header_bytes() {
                            tracing::debug!("[receiver] [desync] header={}", hex::encode(raw));
                        }
                    }
                    reporter.report(&SessionEvent::Faulted {
                        reason: err.to_string(),
                    });
                    break SessionEnd::Faulted(err);
                }
            }
        };

        let frames = self.frames;
        drop(self);
        SessionOutcome { frames, end }
    }
}
