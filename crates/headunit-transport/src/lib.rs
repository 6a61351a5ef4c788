//! Byte-stream transports between the head unit and the phone.
//!
//! Provides a unified interface over the two ways a phone attaches:
//! - USB accessory (AOA switch + bulk endpoints)
//! - TCP over Wi-Fi (phone listening on port 5277)
//!
//! This is the lowest layer of the stack. The connection core sees only
//! the [`Transport`] contract plus a pollable read descriptor, never the
//! socket or USB handle underneath.

pub mod error;
pub mod pipe;
pub mod poll;
pub mod tcp;
pub mod traits;
pub mod usb;

pub use error::{Result, TransportError};
pub use pipe::{Pipe, PipeReader, PipeWriter};
pub use poll::{poll_readable, PollEvent};
pub use tcp::{TcpTransport, AA_TCP_PORT};
pub use traits::{Transport, TransportKind};
pub use usb::UsbTransport;
