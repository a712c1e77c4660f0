//! VCAM wire protocol: header layout and the frame reader.

pub mod header;
pub mod reader;

pub use header::{FrameHeader, HEADER_SIZE, MAX_PLANES, VCAM_MAGIC};
pub use reader::{
    Frame, FrameReader, ProtocolError, ReadError, StreamPosition, DEFAULT_READ_CHUNK,
};
