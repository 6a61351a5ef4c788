use bytes::Bytes;

use crate::channel::{CTRL, MAX_CHANNELS};
use crate::codec::Frame;
use crate::error::{FrameError, Result};

/// A completely reassembled message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembled {
    /// The message bytes, FIRST through LAST payloads concatenated.
    pub message: Bytes,
    /// Total length advertised on the FIRST fragment, when one was present.
    /// Advisory; a mismatch is logged by the caller, not fatal.
    pub expected: Option<u32>,
}

/// Per-channel reassembly of fragmented messages.
///
/// One owned buffer per channel slot plus a scratch buffer for channel-0
/// control messages. A channel's buffer is empty between messages; at most
/// one fragmented message is in flight per channel.
pub struct Assembler {
    slots: Vec<Vec<u8>>,
    expected: Vec<Option<u32>>,
    scratch: Vec<u8>,
    scratch_expected: Option<u32>,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    pub fn new() -> Self {
        Self {
            slots: vec![Vec::new(); MAX_CHANNELS],
            expected: vec![None; MAX_CHANNELS],
            scratch: Vec::new(),
            scratch_expected: None,
        }
    }

    /// Feed one decoded (and, where applicable, already decrypted) frame.
    ///
    /// Returns the complete message once the final fragment arrives.
    pub fn push(&mut self, frame: &Frame) -> Result<Option<Assembled>> {
        if frame.channel == CTRL && frame.flags.control() {
            return Ok(self.push_control(frame));
        }

        let chan = frame.channel as usize;
        let flags = frame.flags;

        if flags.first() {
            self.slots[chan].clear();
            self.expected[chan] = frame.total;
        } else if self.slots[chan].is_empty() {
            return Err(FrameError::OrphanFragment {
                channel: frame.channel,
            });
        }

        self.slots[chan].extend_from_slice(&frame.payload);

        if flags.last() {
            let message = Bytes::from(std::mem::take(&mut self.slots[chan]));
            let expected = self.expected[chan].take();
            return Ok(Some(Assembled { message, expected }));
        }
        Ok(None)
    }

    /// Channel-0 control messages go through the scratch buffer so a
    /// long-running data reassembly on another channel never contends.
    /// A control frame is complete unless it is an explicit non-final
    /// first fragment.
    fn push_control(&mut self, frame: &Frame) -> Option<Assembled> {
        if frame.flags.first() {
            self.scratch.clear();
            self.scratch_expected = frame.total;
        }
        self.scratch.extend_from_slice(&frame.payload);

        if frame.flags.has_total() {
            return None;
        }
        let message = Bytes::from(std::mem::take(&mut self.scratch));
        let expected = self.scratch_expected.take();
        Some(Assembled { message, expected })
    }

    /// True when no fragmented message is in flight on any channel.
    pub fn is_idle(&self) -> bool {
        self.scratch.is_empty() && self.slots.iter().all(Vec::is_empty)
    }

    /// Drop any partially assembled state (connection teardown).
    pub fn clear(&mut self) {
        self.scratch.clear();
        self.scratch_expected = None;
        for slot in &mut self.slots {
            slot.clear();
        }
        for expected in &mut self.expected {
            *expected = None;
        }
    }
}
