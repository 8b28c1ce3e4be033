use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Not a FLAC stream: {0}")]
    NotFlac(String),

    #[error("Missing STREAMINFO block")]
    MissingStreamInfo,

    #[error("Corrupted metadata block: {0}")]
    CorruptedBlock(String),

    #[error("Unexpected end of stream while reading {0}")]
    Truncated(&'static str),

    #[error("Read aborted by host stream")]
    ReadAborted,

    #[error("Failed to write tags: {0}")]
    WriteFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::error::BridgeError),
}

impl MetadataError {
    /// Whether the stream is simply not something this crate reads, as
    /// opposed to a FLAC stream that is damaged.
    pub fn is_not_ours(&self) -> bool {
        matches!(self, MetadataError::NotFlac(_))
    }
}

pub type Result<T> = std::result::Result<T, MetadataError>;
