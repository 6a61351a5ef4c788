use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Base header: channel (1) + flags (1) + payload length (2, big-endian).
pub const BASE_HEADER_SIZE: usize = 4;

/// Extended header: base header + total message length (4, big-endian).
/// Present only on a FIRST frame that is not also a LAST frame.
pub const EXTENDED_HEADER_SIZE: usize = 8;

/// Largest plaintext payload carried by a single frame.
pub const MAX_FRAME_PAYLOAD: usize = 0x4000;

/// Hard bound on a complete on-wire frame. The 256-byte slack above
/// [`MAX_FRAME_PAYLOAD`] absorbs TLS record overhead on encrypted frames.
pub const MAX_WIRE_FRAME: usize = 0x4100;

/// Frame flags bitmap.
///
/// Unknown bits are preserved on decode and ignored, per the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameFlags(pub u8);

impl FrameFlags {
    /// First fragment of a message.
    pub const FIRST: u8 = 0x01;
    /// Last fragment of a message.
    pub const LAST: u8 = 0x02;
    /// Handshake/setup message, distinct from ordinary service messages.
    pub const CONTROL: u8 = 0x04;
    /// Payload is a TLS record, not plaintext.
    pub const ENCRYPTED: u8 = 0x08;

    /// FIRST | LAST: a message that fits in one frame.
    pub fn single() -> Self {
        FrameFlags(Self::FIRST | Self::LAST)
    }

    pub fn first(self) -> bool {
        self.0 & Self::FIRST != 0
    }

    pub fn last(self) -> bool {
        self.0 & Self::LAST != 0
    }

    pub fn control(self) -> bool {
        self.0 & Self::CONTROL != 0
    }

    pub fn encrypted(self) -> bool {
        self.0 & Self::ENCRYPTED != 0
    }

    pub fn with(self, bits: u8) -> Self {
        FrameFlags(self.0 | bits)
    }

    pub fn without(self, bits: u8) -> Self {
        FrameFlags(self.0 & !bits)
    }

    /// True when the extended header (total length) is present on the wire.
    pub fn has_total(self) -> bool {
        self.first() && !self.last()
    }
}

/// A single wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Channel the payload belongs to.
    pub channel: u8,
    /// Flags bitmap.
    pub flags: FrameFlags,
    /// Total message length across fragments. Carried on the wire only when
    /// `flags.has_total()`; advisory for reassembly bookkeeping.
    pub total: Option<u32>,
    /// Frame payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a single-frame message.
    pub fn single(channel: u8, extra_flags: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            channel,
            flags: FrameFlags::single().with(extra_flags),
            total: None,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        let header = if self.flags.has_total() {
            EXTENDED_HEADER_SIZE
        } else {
            BASE_HEADER_SIZE
        };
        header + self.payload.len()
    }
}

/// Encode one frame into the wire format.
///
/// ```text
/// ┌─────────────┬───────────┬──────────────┬──────────────────┬─────────┐
/// │ Channel (1B)│ Flags (1B)│ Length (2B BE)│ [Total (4B BE)]  │ Payload │
/// └─────────────┴───────────┴──────────────┴──────────────────┴─────────┘
/// ```
///
/// The total field is written only when `FIRST && !LAST`.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    let header = if frame.flags.has_total() {
        EXTENDED_HEADER_SIZE
    } else {
        BASE_HEADER_SIZE
    };
    if header + frame.payload.len() > MAX_WIRE_FRAME {
        return Err(FrameError::PayloadTooLarge {
            size: frame.payload.len(),
            max: MAX_WIRE_FRAME - header,
        });
    }

    dst.reserve(header + frame.payload.len());
    dst.put_u8(frame.channel);
    dst.put_u8(frame.flags.0);
    dst.put_u16(frame.payload.len() as u16);
    if frame.flags.has_total() {
        dst.put_u32(frame.total.unwrap_or(frame.payload.len() as u32));
    }
    dst.put_slice(&frame.payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer. A short read is
/// never an error here; the caller keeps feeding bytes and retries.
pub fn decode_frame(src: &mut BytesMut) -> Result<Option<Frame>> {
    if src.len() < BASE_HEADER_SIZE {
        return Ok(None);
    }

    let channel = src[0];
    let flags = FrameFlags(src[1]);
    let payload_len = u16::from_be_bytes([src[2], src[3]]) as usize;

    let header = if flags.has_total() {
        EXTENDED_HEADER_SIZE
    } else {
        BASE_HEADER_SIZE
    };

    if header + payload_len > MAX_WIRE_FRAME {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: MAX_WIRE_FRAME - header,
        });
    }

    if src.len() < header {
        return Ok(None);
    }

    let total = if flags.has_total() {
        Some(u32::from_be_bytes([src[4], src[5], src[6], src[7]]))
    } else {
        None
    };

    if src.len() < header + payload_len {
        return Ok(None);
    }

    src.advance(header);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame {
        channel,
        flags,
        total,
        payload,
    }))
}

/// Split a message into frames of at most [`MAX_FRAME_PAYLOAD`] bytes.
///
/// A message that fits in one frame gets `FIRST | LAST`. Otherwise the
/// first frame carries `FIRST` plus the total message length, the last
/// carries `LAST`, and middle frames carry neither. `extra_flags`
/// (CONTROL, ENCRYPTED) are applied to every fragment.
pub fn split_message(channel: u8, extra_flags: u8, message: &[u8]) -> Vec<Frame> {
    if message.len() <= MAX_FRAME_PAYLOAD {
        return vec![Frame::single(channel, extra_flags, message.to_vec())];
    }

    let total = message.len() as u32;
    let mut frames = Vec::with_capacity(message.len().div_ceil(MAX_FRAME_PAYLOAD));
    let mut chunks = message.chunks(MAX_FRAME_PAYLOAD).peekable();
    let mut first = true;
    while let Some(chunk) = chunks.next() {
        let mut flags = FrameFlags(extra_flags);
        if first {
            flags = flags.with(FrameFlags::FIRST);
        }
        if chunks.peek().is_none() {
            flags = flags.with(FrameFlags::LAST);
        }
        frames.push(Frame {
            channel,
            flags,
            total: flags.has_total().then_some(total),
            payload: Bytes::copy_from_slice(chunk),
        });
        first = false;
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(frame: Frame) -> Frame {
        let mut buf = BytesMut::new();
        encode_frame(&frame, &mut buf).unwrap();
        decode_frame(&mut buf).unwrap().unwrap()
    }

    #[test]
    fn single_frame_roundtrip() {
        let frame = Frame::single(3, FrameFlags::ENCRYPTED, b"payload".to_vec());
        let out = roundtrip(frame.clone());
        assert_eq!(out, frame);
    }

    #[test]
    fn roundtrip_all_channels_and_flags() {
        for channel in [0u8, 1, 11, 42, 255] {
            for bits in 0u8..16 {
                let flags = FrameFlags(bits);
                let frame = Frame {
                    channel,
                    flags,
                    total: flags.has_total().then_some(9),
                    payload: Bytes::from_static(b"abcdefghi"),
                };
                assert_eq!(roundtrip(frame.clone()), frame);
            }
        }
    }

    #[test]
    fn extended_header_only_on_first_of_many() {
        let first = Frame {
            channel: 4,
            flags: FrameFlags(FrameFlags::FIRST),
            total: Some(40_000),
            payload: Bytes::from(vec![0u8; 16]),
        };
        assert_eq!(first.wire_size(), EXTENDED_HEADER_SIZE + 16);

        let single = Frame::single(4, 0, vec![0u8; 16]);
        assert_eq!(single.wire_size(), BASE_HEADER_SIZE + 16);
    }

    #[test]
    fn decode_incomplete_returns_none() {
        let mut buf = BytesMut::from(&[0x00u8, 0x03, 0x00][..]);
        assert!(decode_frame(&mut buf).unwrap().is_none());

        let mut buf = BytesMut::new();
        encode_frame(&Frame::single(1, 0, b"hello".to_vec()), &mut buf).unwrap();
        buf.truncate(BASE_HEADER_SIZE + 2);
        assert!(decode_frame(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decode_raw_control_frame() {
        // Version request as it appears on the wire: channel 0, CONTROL,
        // 2-byte code then two 16-bit version fields.
        let mut buf = BytesMut::from(
            &[0x00u8, 0x07, 0x00, 0x06, 0x00, 0x01, 0x00, 0x01, 0x00, 0x01][..],
        );
        let frame = decode_frame(&mut buf).unwrap().unwrap();
        assert_eq!(frame.channel, 0);
        assert!(frame.flags.control());
        assert!(frame.flags.first() && frame.flags.last());
        assert_eq!(frame.payload.as_ref(), &[0x00, 0x01, 0x00, 0x01, 0x00, 0x01]);
        assert!(buf.is_empty());
    }

    #[test]
    fn oversize_length_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u8(1);
        buf.put_u8(0);
        buf.put_u16(u16::MAX);
        let err = decode_frame(&mut buf).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }

    #[test]
    fn unknown_flag_bits_preserved() {
        let frame = Frame {
            channel: 9,
            flags: FrameFlags(0xF2),
            total: None,
            payload: Bytes::from_static(b"x"),
        };
        let out = roundtrip(frame.clone());
        assert_eq!(out.flags.0, 0xF2);
    }

    #[test]
    fn split_small_message_is_single() {
        let frames = split_message(4, FrameFlags::ENCRYPTED, &[7u8; 100]);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].flags.first() && frames[0].flags.last());
        assert!(frames[0].flags.encrypted());
        assert!(frames[0].total.is_none());
    }

    #[test]
    fn split_large_message_fragments() {
        let message = vec![0xAAu8; 40_000];
        let frames = split_message(4, 0, &message);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].payload.len(), MAX_FRAME_PAYLOAD);
        assert_eq!(frames[1].payload.len(), MAX_FRAME_PAYLOAD);
        assert_eq!(frames[2].payload.len(), 40_000 - 2 * MAX_FRAME_PAYLOAD);

        assert!(frames[0].flags.first() && !frames[0].flags.last());
        assert_eq!(frames[0].total, Some(40_000));
        assert!(!frames[1].flags.first() && !frames[1].flags.last());
        assert!(frames[1].total.is_none());
        assert!(!frames[2].flags.first() && frames[2].flags.last());

        let rejoined: Vec<u8> = frames
            .iter()
            .flat_map(|f| f.payload.iter().copied())
            .collect();
        assert_eq!(rejoined, message);
    }

    #[test]
    fn split_exact_boundary() {
        let frames = split_message(3, 0, &vec![1u8; MAX_FRAME_PAYLOAD]);
        assert_eq!(frames.len(), 1);

        let frames = split_message(3, 0, &vec![1u8; MAX_FRAME_PAYLOAD + 1]);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].payload.len(), 1);
    }

    #[test]
    fn multiple_frames_decode_in_sequence() {
        let mut buf = BytesMut::new();
        encode_frame(&Frame::single(1, 0, b"one".to_vec()), &mut buf).unwrap();
        encode_frame(&Frame::single(2, 0, b"two".to_vec()), &mut buf).unwrap();

        let f1 = decode_frame(&mut buf).unwrap().unwrap();
        let f2 = decode_frame(&mut buf).unwrap().unwrap();
        assert_eq!((f1.channel, f1.payload.as_ref()), (1, b"one".as_ref()));
        assert_eq!((f2.channel, f2.payload.as_ref()), (2, b"two".as_ref()));
        assert!(buf.is_empty());
    }
}
