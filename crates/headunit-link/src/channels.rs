use headunit_frame::MAX_CHANNELS;

/// Per-channel connection state.
#[derive(Debug, Clone, Copy)]
pub struct ChannelSlot {
    pub open: bool,
    /// Session id the phone assigned on media start; -1 when unassigned.
    pub session_id: i32,
}

impl Default for ChannelSlot {
    fn default() -> Self {
        Self {
            open: false,
            session_id: -1,
        }
    }
}

/// The channel/session table, owned exclusively by the I/O thread.
pub struct ChannelTable {
    slots: Vec<ChannelSlot>,
}

impl Default for ChannelTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelTable {
    pub fn new() -> Self {
        Self {
            slots: vec![ChannelSlot::default(); MAX_CHANNELS],
        }
    }

    pub fn open(&mut self, channel: u8) {
        self.slots[channel as usize].open = true;
    }

    pub fn is_open(&self, channel: u8) -> bool {
        self.slots[channel as usize].open
    }

    pub fn set_session(&mut self, channel: u8, session_id: i32) {
        self.slots[channel as usize].session_id = session_id;
    }

    pub fn session_id(&self, channel: u8) -> i32 {
        self.slots[channel as usize].session_id
    }

    /// Close every channel and forget session assignments (teardown).
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            *slot = ChannelSlot::default();
        }
    }
}
