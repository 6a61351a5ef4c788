//! Protocol vocabulary shared by the connection core and embedders.
//!
//! - [`codes`] — 2-byte message codes per channel family, button scan
//!   codes, and helpers for splitting code/timestamp prefixes off
//!   assembled payloads.
//! - [`messages`] — the protobuf message bodies, hand-derived with
//!   `prost` so the schema lives with the code that speaks it.

pub mod codes;
pub mod messages;

pub use codes::{
    is_control_code, split_code, split_timestamp, BluetoothMessageId, ControlMessageId,
    InitMessageId, InputMessageId, MediaMessageId, NaviMessageId, NotificationMessageId,
    PhoneStatusMessageId, SensorMessageId, SERVICE_CODE_BASE,
};
pub use messages::*;
