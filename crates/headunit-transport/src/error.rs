/// Errors that can occur in phone transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the phone over TCP.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// No USB device accepted the accessory switch.
    #[error("no android device found")]
    NoDevice,

    /// A USB operation failed.
    #[error("usb error: {0}")]
    Usb(#[from] rusb::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A read or write did not complete within its timeout. Non-fatal;
    /// the caller re-polls or retries.
    #[error("transport timed out")]
    Timeout,

    /// The peer closed the stream.
    #[error("transport closed by peer")]
    Closed,

    /// An operation was attempted before `start` succeeded.
    #[error("transport not started")]
    NotStarted,
}

pub type Result<T> = std::result::Result<T, TransportError>;
