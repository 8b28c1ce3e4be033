//! # Host Bridge Traits
//!
//! Capabilities the FLAC decode core needs from its host, plus the adapter
//! that turns a host byte stream into decoder callbacks.
//!
//! ## Traits
//!
//! - [`StreamHandle`](stream::StreamHandle) - Byte source (file, HTTP body, memory)
//! - [`AudioSink`](playback::AudioSink) - PCM output device
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Adapters
//!
//! - [`StreamIoBridge`](stream_io::StreamIoBridge) - read/seek/tell/length/eof
//!   callbacks over a [`StreamHandle`](stream::StreamHandle)
//! - [`MemoryStream`](stream::MemoryStream) and [`FileStream`](stream::FileStream)
//!   ready-made handles
//!
//! ## Error Handling
//!
//! All bridge operations use [`BridgeError`](error::BridgeError). Host
//! implementations convert platform failures into it and keep "capability
//! missing" ([`BridgeError::NotAvailable`]) distinct from runtime failures.
//!
//! ## Thread Safety
//!
//! Stream handles and sinks are moved onto the decode thread and must be
//! `Send`. Logger sinks are shared and must be `Send + Sync`.

pub mod error;
pub mod logging;
pub mod platform;
pub mod playback;
pub mod stream;
pub mod stream_io;

pub use error::BridgeError;

// Re-export commonly used types
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use playback::{AudioSink, PlaybackSessionId, ReplayGainInfo, SampleFormat};
pub use stream::{FileStream, MemoryStream, SeekWhence, StreamHandle, StreamSize};
pub use stream_io::{ReadStatus, StreamIoBridge};
