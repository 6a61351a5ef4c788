use crate::state::LinkState;

/// Errors surfaced by the connection core.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The transport failed. Fatal; the connection moves to STOPPING.
    #[error("transport error: {0}")]
    Transport(#[from] headunit_transport::TransportError),

    /// Framing-level error.
    #[error("frame error: {0}")]
    Frame(#[from] headunit_frame::FrameError),

    /// TLS handshake or record-layer failure. Fatal.
    #[error("tls error: {0}")]
    Tls(#[from] rustls::Error),

    /// A message body failed to parse.
    #[error("message decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// The peer violated the protocol. Logged and dropped outside of the
    /// init phase; fatal while STARTING.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Send attempted on a channel the phone has not opened.
    #[error("channel {channel} not open")]
    NotOpen { channel: u8 },

    /// A send did not complete within its retry budget. Non-fatal.
    #[error("send timed out")]
    Timeout,

    /// Operation not valid in the current connection state.
    #[error("invalid in state {0}")]
    InvalidState(LinkState),

    /// The connection has stopped; the command was not accepted.
    #[error("connection stopped")]
    Stopped,
}

impl LinkError {
    /// Fatal errors tear the connection down; the rest are logged and the
    /// connection continues.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LinkError::Transport(_) | LinkError::Tls(_))
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
