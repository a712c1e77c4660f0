//! VCAM bridge
//!
//! Receives the raw frame stream a video-capture producer writes to a local
//! UNIX socket, decodes each fixed-layout frame header, drains the pixel
//! payload and reports per-frame metadata. Used to check a producer's stream
//! before wiring it into a real consumer such as a virtual camera.

/// Receiver configuration (YAML + environment)
pub mod config;
/// Wire protocol (header layout, frame reader)
pub mod network;
/// Listener accepting producer connections
pub mod servers;
/// Per-connection session and operator reporting
pub mod session;
