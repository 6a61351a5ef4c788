/// Errors that can occur during frame encoding/decoding and reassembly.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The header advertises a payload larger than a frame may carry.
    #[error("frame payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A continuation fragment arrived on a channel with no message in flight.
    #[error("fragment without FIRST on channel {channel}")]
    OrphanFragment { channel: u8 },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream was closed before a complete frame was received.
    #[error("stream closed (incomplete frame)")]
    StreamClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
