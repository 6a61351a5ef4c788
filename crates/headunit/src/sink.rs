//! A logging implementation of the callback façade.
//!
//! Useful as a starting point for embedders and as the sink behind the
//! CLI: media is counted rather than rendered, focus is granted
//! unconditionally, and everything else lands in the log.

use std::sync::{Arc, OnceLock};

use headunit_frame::channel_name;
use headunit_link::{EventCallbacks, LinkHandle};
use headunit_proto::codes::ControlMessageId;
use headunit_proto::messages::{
    AudioFocusRequest, AudioFocusResponse, AudioFocusState, AudioFocusType, NavDistanceMessage,
    NavMessagesStatus, NavTurnMessage, PhoneStatus, VideoFocusRequest, VoiceSessionRequest,
};
use tracing::{debug, info};

const MEDIA_LOG_EVERY: u64 = 256;

/// Counts media, grants focus, logs events.
pub struct LoggingSink {
    handle: Arc<OnceLock<LinkHandle>>,
    bluetooth_address: Option<String>,
    packets: u64,
    bytes: u64,
}

impl LoggingSink {
    pub fn new(bluetooth_address: Option<String>) -> Self {
        Self {
            handle: Arc::new(OnceLock::new()),
            bluetooth_address,
            packets: 0,
            bytes: 0,
        }
    }

    /// Slot for the connection handle, so focus responses can be queued
    /// back once the server exists. Grab it before boxing the sink, fill
    /// it with [`HeadUnit::handle`](headunit_link::HeadUnit::handle).
    pub fn handle_slot(&self) -> Arc<OnceLock<LinkHandle>> {
        Arc::clone(&self.handle)
    }
}

impl EventCallbacks for LoggingSink {
    fn media_packet(&mut self, channel: u8, timestamp: u64, data: &[u8]) {
        self.packets += 1;
        self.bytes += data.len() as u64;
        if self.packets % MEDIA_LOG_EVERY == 1 {
            debug!(
                channel = channel_name(channel),
                timestamp,
                packets = self.packets,
                bytes = self.bytes,
                "media flowing"
            );
        }
    }

    fn media_start(&mut self, channel: u8) {
        info!(channel = channel_name(channel), "media start");
    }

    fn media_stop(&mut self, channel: u8) {
        info!(channel = channel_name(channel), "media stop");
    }

    fn media_setup_complete(&mut self, channel: u8) {
        info!(channel = channel_name(channel), "media setup complete");
    }

    fn disconnection_or_error(&mut self) {
        info!("phone disconnected");
    }

    fn audio_focus_request(&mut self, channel: u8, request: &AudioFocusRequest) {
        info!(channel, focus_type = request.focus_type, "audio focus request");
        let Some(handle) = self.handle.get() else {
            return;
        };
        let state = match request.focus_type() {
            AudioFocusType::Release => AudioFocusState::Loss,
            AudioFocusType::GainTransient => AudioFocusState::GainTransient,
            _ => AudioFocusState::Gain,
        };
        let response = AudioFocusResponse {
            focus_state: state as i32,
        };
        let _ = handle.send_encrypted_message(
            0,
            headunit_frame::channel::CTRL,
            ControlMessageId::AudioFocusResponse as u16,
            &response,
        );
    }

    fn video_focus_request(&mut self, channel: u8, request: &VideoFocusRequest) {
        info!(channel, mode = request.mode, "video focus request");
    }

    fn voice_session_request(&mut self, request: &VoiceSessionRequest) {
        info!(status = request.session_status, "voice session");
    }

    fn phone_status(&mut self, status: &PhoneStatus) {
        info!(calls = status.calls.len(), "phone status");
    }

    fn navi_status(&mut self, status: &NavMessagesStatus) {
        debug!(status = status.status, "navigation status");
    }

    fn navi_turn(&mut self, turn: &NavTurnMessage) {
        info!(road = %turn.road, "navigation turn");
    }

    fn navi_turn_distance(&mut self, distance: &NavDistanceMessage) {
        debug!(meters = distance.distance_meters, "navigation distance");
    }

    fn car_bluetooth_address(&mut self) -> Option<String> {
        self.bluetooth_address.clone()
    }
}
