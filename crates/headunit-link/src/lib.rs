//! The head-unit connection core.
//!
//! Speaks the phone protocol over a byte transport: version negotiation,
//! the in-band TLS handshake, framed and multiplexed service channels,
//! control-message dispatch, and media relay. One dedicated I/O thread
//! owns all connection state; producer threads post commands through
//! [`LinkHandle`].
//!
//! ```no_run
//! use headunit_link::{HeadUnit, LinkConfig};
//! use headunit_transport::TransportKind;
//!
//! # struct MySink;
//! # impl headunit_link::EventCallbacks for MySink {
//! #     fn media_packet(&mut self, _: u8, _: u64, _: &[u8]) {}
//! #     fn media_start(&mut self, _: u8) {}
//! #     fn media_stop(&mut self, _: u8) {}
//! #     fn media_setup_complete(&mut self, _: u8) {}
//! #     fn disconnection_or_error(&mut self) {}
//! #     fn audio_focus_request(&mut self, _: u8, _: &headunit_proto::messages::AudioFocusRequest) {}
//! #     fn video_focus_request(&mut self, _: u8, _: &headunit_proto::messages::VideoFocusRequest) {}
//! # }
//! # fn main() -> headunit_link::Result<()> {
//! let mut server = HeadUnit::new(LinkConfig::default(), Box::new(MySink))?;
//! let handle = server.start(TransportKind::Usb, None, true)?;
//! // ... handle.send_encrypted_message(...) from any thread ...
//! server.stop();
//! # Ok(())
//! # }
//! ```

pub mod callbacks;
pub mod channels;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod server;
pub mod services;
pub mod session;
pub mod ssl;
pub mod state;

pub use callbacks::{EventCallbacks, FilterAction};
pub use channels::{ChannelSlot, ChannelTable};
pub use command::{LinkCommand, LinkHandle};
pub use config::{HeadUnitInfo, LinkConfig, ServiceConfig, SslConfig};
pub use error::{LinkError, Result};
pub use server::HeadUnit;
pub use services::{advertised_channels, build_discovery_response};
pub use session::LinkSession;
pub use ssl::SslSession;
pub use state::{LinkState, StateCell};
