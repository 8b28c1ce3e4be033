//! Thread-safety markers shared by the bridge traits.
//!
//! Stream handles and audio sinks are created on the host thread and then
//! moved onto the dedicated decode thread, so every host capability must be
//! `Send`. Types shared between the control thread and the decode thread
//! (transport state, logger sinks) must additionally be `Sync`.

/// Marker for host objects that are moved onto the decode thread.
pub trait PlatformSend: Send {}

impl<T> PlatformSend for T where T: Send {}

/// Marker for host objects shared between threads.
pub trait PlatformSendSync: Send + Sync {}

impl<T> PlatformSendSync for T where T: Send + Sync {}
