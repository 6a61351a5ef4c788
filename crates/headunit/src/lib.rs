//! Android Auto head unit.
//!
//! The phone thinks it is talking to a car. This workspace implements
//! the head-unit side of the connection: transports, wire framing, the
//! protocol vocabulary, and the connection core.
//!
//! # Crate Structure
//!
//! - [`transport`] — byte streams to the phone (USB accessory, TCP)
//! - [`frame`] — wire framing, fragmentation, per-channel reassembly
//! - [`proto`] — message codes and protobuf bodies
//! - [`link`] — the connection core: TLS, dispatch, I/O thread
//! - [`config`] — the JSON settings component
//! - [`sink`] — a logging implementation of the callback façade

pub mod config;
pub mod sink;

/// Re-export transport types.
pub mod transport {
    pub use headunit_transport::*;
}

/// Re-export framing types.
pub mod frame {
    pub use headunit_frame::*;
}

/// Re-export protocol vocabulary.
pub mod proto {
    pub use headunit_proto::*;
}

/// Re-export the connection core.
pub mod link {
    pub use headunit_link::*;
}
