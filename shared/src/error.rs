use std::io;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid action code {0}")]
    InvalidAction(u8),
}

/// Errors produced while reading or writing framed packets.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The peer closed the stream cleanly between two frames.
    #[error("end of stream")]
    EndOfStream,
    #[error("frame too large: {0} bytes (max {1})")]
    FrameTooLarge(usize, usize),
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),
    #[error("malformed packet: {0}")]
    Decode(#[source] bincode::Error),
    #[error("failed to encode packet: {0}")]
    Encode(#[source] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl FrameError {
    /// Whether the stream is still aligned on a frame boundary after this error,
    /// so the next read can go ahead.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FrameError::Decode(_) | FrameError::UnsupportedVersion(_))
    }

    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, FrameError::EndOfStream)
    }
}
