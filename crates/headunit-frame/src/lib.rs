//! Android Auto wire framing with channel multiplexing.
//!
//! Every message is framed with:
//! - A 1-byte channel id for multiplexing
//! - A 1-byte flags bitmap (FIRST, LAST, CONTROL, ENCRYPTED)
//! - A 2-byte big-endian payload length
//! - A 4-byte big-endian total message length on first-of-many fragments
//!
//! Messages larger than [`MAX_FRAME_PAYLOAD`] are fragmented across frames
//! and reassembled per channel. No partial reads, no buffer management in
//! user code.

pub mod channel;
pub mod codec;
pub mod error;
pub mod reassembly;

pub use channel::{channel_name, is_media_data, is_media_output, MAX_CHANNELS};
pub use codec::{
    decode_frame, encode_frame, split_message, Frame, FrameFlags, BASE_HEADER_SIZE,
    EXTENDED_HEADER_SIZE, MAX_FRAME_PAYLOAD, MAX_WIRE_FRAME,
};
pub use error::{FrameError, Result};
pub use reassembly::{Assembled, Assembler};
