//! # Core Runtime Module
//!
//! Runtime plumbing shared by the decode and metadata crates:
//! - `tracing` subscriber setup with pretty, JSON, or compact output
//! - Forwarding of log events into a host [`LoggerSink`](bridge_traits::LoggerSink)
//!
//! ## Overview
//!
//! Hosts call [`logging::init_logging`] once at startup. Library crates only
//! emit `tracing` events and never install subscribers themselves.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
