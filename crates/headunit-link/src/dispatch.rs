//! Message dispatch: (channel, code) routing to handlers.
//!
//! Handlers run on the I/O thread with the full session at hand. Unknown
//! (channel, code) pairs are logged and dropped, never fatal.

use bytes::Bytes;
use headunit_frame::channel::{
    BLUETOOTH, CTRL, NAVIGATION, NOTIFICATIONS, PHONE_STATUS, SENSOR, TOUCH,
};
use headunit_frame::{channel_name, is_media_data};
use headunit_proto::codes::{
    split_code, split_timestamp, BluetoothMessageId, ControlMessageId, InitMessageId,
    InputMessageId, MediaMessageId, NaviMessageId, NotificationMessageId, PhoneStatusMessageId,
    SensorMessageId,
};
use headunit_proto::messages::{
    AudioFocusRequest, AuthCompleteResponse, BindingRequest, BindingResponse, BluetoothAuthData,
    BluetoothPairingRequest, BluetoothPairingResponse, ChannelOpenRequest, ChannelOpenResponse,
    GenericNotificationRequest, GenericNotificationResponse, MediaSetupRequest, MediaSetupResponse,
    MediaSetupStatus, MediaStartRequest, MessageStatus, MicRequest, NavDistanceMessage,
    NavMessagesStatus, NavTurnMessage, NavigationFocusRequest, NavigationFocusResponse,
    PhoneStatus, PingRequest, PingResponse, SensorStartRequest, SensorStartResponse,
    ServiceDiscoveryRequest, ShutdownRequest, ShutdownResponse, VideoFocusRequest,
    VoiceSessionRequest,
};
use prost::Message;
use tracing::{debug, info, trace, warn};

use crate::callbacks::FilterAction;
use crate::error::Result;
use crate::services;
use crate::session::LinkSession;
use crate::state::LinkState;

/// Phone acks per media setup before it stops and waits.
const MEDIA_MAX_UNACKED: u32 = 10;

impl LinkSession {
    pub(crate) fn dispatch(&mut self, channel: u8, message: Bytes) -> Result<()> {
        let Some((code, body)) = split_code(&message) else {
            return self.protocol_violation(format!(
                "message without code on {}",
                channel_name(channel)
            ));
        };

        let state = self.state.get();
        if self.callbacks.message_filter(state, channel, code, body) == FilterAction::Consumed {
            trace!(channel = channel_name(channel), code, "filtered by embedder");
            return Ok(());
        }

        if channel == CTRL {
            self.dispatch_ctrl(code, body)
        } else {
            self.dispatch_service(channel, code, body)
        }
    }

    // --- channel 0 --------------------------------------------------------

    fn dispatch_ctrl(&mut self, code: u16, body: &[u8]) -> Result<()> {
        // The TLS engine keeps consuming in-band records after auth too
        // (session tickets, rekeys).
        if code == InitMessageId::SslHandshake as u16 {
            return self.handle_ssl_handshake(body);
        }
        if self.state.get() == LinkState::Starting {
            if let Ok(init) = InitMessageId::try_from(code) {
                return match init {
                    InitMessageId::VersionResponse => self.handle_version_response(body),
                    InitMessageId::SslHandshake => unreachable!("handled above"),
                    InitMessageId::VersionRequest | InitMessageId::AuthComplete => self
                        .protocol_violation(format!("unexpected init message 0x{code:04x}")),
                };
            }
            // Service discovery may race the tail of the handshake; the
            // post-auth handlers are already in place, fall through.
        }

        match ControlMessageId::try_from(code) {
            Ok(ControlMessageId::ServiceDiscoveryRequest) => self.handle_service_discovery(body),
            Ok(ControlMessageId::PingRequest) => self.handle_ping(body),
            Ok(ControlMessageId::NavigationFocusRequest) => self.handle_navigation_focus(body),
            Ok(ControlMessageId::ShutdownRequest) => self.handle_shutdown_request(body),
            Ok(ControlMessageId::ShutdownResponse) => {
                debug!("phone acknowledged shutdown");
                self.request_stop();
                Ok(())
            }
            Ok(ControlMessageId::VoiceSessionRequest) => {
                let request = VoiceSessionRequest::decode(body)?;
                self.callbacks.voice_session_request(&request);
                Ok(())
            }
            Ok(ControlMessageId::AudioFocusRequest) => {
                let request = AudioFocusRequest::decode(body)?;
                self.callbacks.audio_focus_request(CTRL, &request);
                Ok(())
            }
            _ => {
                warn!(code, "unknown control message (dropped)");
                Ok(())
            }
        }
    }

    /// Version response body: negotiated major/minor plus a status word,
    /// all raw big-endian shorts. Success kicks off the TLS handshake.
    fn handle_version_response(&mut self, body: &[u8]) -> Result<()> {
        if body.len() < 6 {
            return self.protocol_violation("short version response".into());
        }
        let major = u16::from_be_bytes([body[0], body[1]]);
        let minor = u16::from_be_bytes([body[2], body[3]]);
        let status = u16::from_be_bytes([body[4], body[5]]);
        if status != 0 {
            return self
                .protocol_violation(format!("version negotiation refused (status {status})"));
        }
        info!(major, minor, "version negotiated, starting tls handshake");
        self.version_ok = true;
        self.pump_ssl_handshake(&[])
    }

    fn handle_ssl_handshake(&mut self, body: &[u8]) -> Result<()> {
        self.pump_ssl_handshake(body)
    }

    /// One round of the in-band TLS handshake: feed the phone's
    /// ciphertext in, push our next flight out in an `SSLHandshake`
    /// control frame, and finish with `AuthComplete` once established.
    fn pump_ssl_handshake(&mut self, incoming: &[u8]) -> Result<()> {
        let (out, established) = self.ssl_handshake_step(incoming)?;
        if !out.is_empty() {
            self.send_unencrypted_blob(0, CTRL, InitMessageId::SslHandshake as u16, &out)?;
        }
        if established && self.version_ok && !self.auth_complete_sent {
            self.auth_complete_sent = true;
            let auth = AuthCompleteResponse {
                status: MessageStatus::Ok as i32,
            };
            self.send_unencrypted_message(0, CTRL, InitMessageId::AuthComplete as u16, &auth)?;
            self.state.advance(LinkState::Started);
            info!("connection started");
        }
        Ok(())
    }

    // --- service channels -------------------------------------------------

    fn dispatch_service(&mut self, channel: u8, code: u16, body: &[u8]) -> Result<()> {
        // Channel open is common to every service channel.
        if code == ControlMessageId::ChannelOpenRequest as u16 {
            return self.handle_channel_open(channel, body);
        }

        if is_media_data(channel) {
            return self.dispatch_media(channel, code, body);
        }
        match channel {
            SENSOR => self.dispatch_sensor(channel, code, body),
            TOUCH => self.dispatch_input(channel, code, body),
            BLUETOOTH => self.dispatch_bluetooth(channel, code, body),
            PHONE_STATUS => self.dispatch_phone_status(channel, code, body),
            NOTIFICATIONS => self.dispatch_notifications(channel, code, body),
            NAVIGATION => self.dispatch_navigation(channel, code, body),
            _ => {
                warn!(channel, code, "message on unassigned channel (dropped)");
                Ok(())
            }
        }
    }

    fn handle_channel_open(&mut self, channel: u8, body: &[u8]) -> Result<()> {
        let request = ChannelOpenRequest::decode(body)?;
        let has_bluetooth = self
            .callbacks
            .car_bluetooth_address()
            .is_some_and(|a| !a.is_empty());
        let accepted =
            services::advertised_channels(&self.config, has_bluetooth).contains(&channel);

        let status = if accepted {
            self.channels.open(channel);
            MessageStatus::Ok
        } else {
            warn!(
                channel = channel_name(channel),
                "open request for unadvertised channel"
            );
            MessageStatus::Fail
        };
        info!(
            channel = channel_name(channel),
            priority = request.priority,
            ok = accepted,
            "channel open"
        );

        let response = ChannelOpenResponse {
            status: status as i32,
        };
        self.send_encrypted_blob_unchecked(
            0,
            channel,
            ControlMessageId::ChannelOpenResponse as u16,
            &response.encode_to_vec(),
        )
    }

    fn dispatch_media(&mut self, channel: u8, code: u16, body: &[u8]) -> Result<()> {
        // Media data first: the hot path, and the one place the
        // channel-open gate applies.
        if code == ControlMessageId::MediaDataWithTimestamp as u16 {
            if !self.channels.is_open(channel) {
                debug!(
                    channel = channel_name(channel),
                    "media data before channel open (dropped)"
                );
                return Ok(());
            }
            let Some((timestamp, data)) = split_timestamp(body) else {
                return self.protocol_violation("media packet without timestamp".into());
            };
            self.callbacks.media_packet(channel, timestamp, data);
            return Ok(());
        }
        if code == ControlMessageId::MediaData as u16 {
            if !self.channels.is_open(channel) {
                debug!(
                    channel = channel_name(channel),
                    "media data before channel open (dropped)"
                );
                return Ok(());
            }
            self.callbacks.media_packet(channel, 0, body);
            return Ok(());
        }

        match MediaMessageId::try_from(code) {
            Ok(MediaMessageId::MediaSetupRequest) => {
                let request = MediaSetupRequest::decode(body)?;
                debug!(
                    channel = channel_name(channel),
                    stream_type = request.stream_type,
                    "media setup"
                );
                let response = MediaSetupResponse {
                    media_status: MediaSetupStatus::Ready as i32,
                    max_unacked: MEDIA_MAX_UNACKED,
                    configs: vec![0],
                };
                self.send_encrypted_message(
                    0,
                    channel,
                    MediaMessageId::MediaSetupResponse as u16,
                    &response,
                )?;
                self.callbacks.media_setup_complete(channel);
                Ok(())
            }
            Ok(MediaMessageId::MediaStartRequest) => {
                let request = MediaStartRequest::decode(body)?;
                self.channels.set_session(channel, request.session);
                debug!(
                    channel = channel_name(channel),
                    session = request.session,
                    "media start"
                );
                self.callbacks.media_start(channel);
                Ok(())
            }
            Ok(MediaMessageId::MediaStopRequest) => {
                debug!(channel = channel_name(channel), "media stop");
                self.callbacks.media_stop(channel);
                Ok(())
            }
            Ok(MediaMessageId::MediaAck) => {
                // Informational.
                trace!(channel = channel_name(channel), "media ack");
                Ok(())
            }
            Ok(MediaMessageId::VideoFocusRequest) => {
                let request = VideoFocusRequest::decode(body)?;
                self.callbacks.video_focus_request(channel, &request);
                Ok(())
            }
            Ok(MediaMessageId::MicRequest) => {
                let request = MicRequest::decode(body)?;
                self.callbacks.mic_request(channel, &request);
                Ok(())
            }
            _ => {
                warn!(
                    channel = channel_name(channel),
                    code,
                    "unknown media message (dropped)"
                );
                Ok(())
            }
        }
    }

    fn dispatch_sensor(&mut self, channel: u8, code: u16, body: &[u8]) -> Result<()> {
        match SensorMessageId::try_from(code) {
            Ok(SensorMessageId::SensorStartRequest) => {
                let request = SensorStartRequest::decode(body)?;
                debug!(sensor_type = request.sensor_type, "sensor start");
                let response = SensorStartResponse {
                    status: MessageStatus::Ok as i32,
                };
                self.send_encrypted_message(
                    0,
                    channel,
                    SensorMessageId::SensorStartResponse as u16,
                    &response,
                )
            }
            _ => {
                warn!(code, "unknown sensor message (dropped)");
                Ok(())
            }
        }
    }

    fn dispatch_input(&mut self, channel: u8, code: u16, body: &[u8]) -> Result<()> {
        match InputMessageId::try_from(code) {
            Ok(InputMessageId::BindingRequest) => {
                let request = BindingRequest::decode(body)?;
                debug!(requested = request.scan_codes.len(), "input binding");
                let response = BindingResponse {
                    status: MessageStatus::Ok as i32,
                };
                self.send_encrypted_message(
                    0,
                    channel,
                    InputMessageId::BindingResponse as u16,
                    &response,
                )
            }
            _ => {
                warn!(code, "unknown input message (dropped)");
                Ok(())
            }
        }
    }

    fn dispatch_bluetooth(&mut self, channel: u8, code: u16, body: &[u8]) -> Result<()> {
        match BluetoothMessageId::try_from(code) {
            Ok(BluetoothMessageId::BluetoothPairingRequest) => {
                let request = BluetoothPairingRequest::decode(body)?;
                let address = self
                    .callbacks
                    .car_bluetooth_address()
                    .filter(|a| !a.is_empty());
                debug!(
                    phone = %request.phone_address,
                    accept = address.is_some(),
                    "bluetooth pairing request"
                );
                let response = match address {
                    Some(_) => BluetoothPairingResponse {
                        already_paired: true,
                        status: MessageStatus::Ok as i32,
                    },
                    None => BluetoothPairingResponse {
                        already_paired: false,
                        status: MessageStatus::Fail as i32,
                    },
                };
                self.send_encrypted_message(
                    0,
                    channel,
                    BluetoothMessageId::BluetoothPairingResponse as u16,
                    &response,
                )
            }
            Ok(BluetoothMessageId::BluetoothAuthData) => {
                let data = BluetoothAuthData::decode(body)?;
                self.callbacks.bluetooth_auth_data(&data);
                Ok(())
            }
            _ => {
                warn!(code, "unknown bluetooth message (dropped)");
                Ok(())
            }
        }
    }

    fn dispatch_phone_status(&mut self, _channel: u8, code: u16, body: &[u8]) -> Result<()> {
        match PhoneStatusMessageId::try_from(code) {
            Ok(PhoneStatusMessageId::PhoneStatus) => {
                let status = PhoneStatus::decode(body)?;
                self.callbacks.phone_status(&status);
                Ok(())
            }
            _ => {
                warn!(code, "unknown phone-status message (dropped)");
                Ok(())
            }
        }
    }

    fn dispatch_notifications(&mut self, _channel: u8, code: u16, body: &[u8]) -> Result<()> {
        match NotificationMessageId::try_from(code) {
            Ok(NotificationMessageId::StartGenericNotifications) => {
                self.callbacks.generic_notifications_start();
                Ok(())
            }
            Ok(NotificationMessageId::StopGenericNotifications) => {
                self.callbacks.generic_notifications_stop();
                Ok(())
            }
            Ok(NotificationMessageId::GenericNotificationRequest) => {
                let request = GenericNotificationRequest::decode(body)?;
                self.callbacks.generic_notification_request(&request);
                Ok(())
            }
            Ok(NotificationMessageId::GenericNotificationResponse) => {
                let response = GenericNotificationResponse::decode(body)?;
                self.callbacks.generic_notification_response(&response);
                Ok(())
            }
            _ => {
                warn!(code, "unknown notification message (dropped)");
                Ok(())
            }
        }
    }

    fn dispatch_navigation(&mut self, _channel: u8, code: u16, body: &[u8]) -> Result<()> {
        match NaviMessageId::try_from(code) {
            Ok(NaviMessageId::Status) => {
                let status = NavMessagesStatus::decode(body)?;
                self.callbacks.navi_status(&status);
                Ok(())
            }
            Ok(NaviMessageId::Turn) => {
                let turn = NavTurnMessage::decode(body)?;
                self.callbacks.navi_turn(&turn);
                Ok(())
            }
            Ok(NaviMessageId::TurnDistance) => {
                let distance = NavDistanceMessage::decode(body)?;
                self.callbacks.navi_turn_distance(&distance);
                Ok(())
            }
            _ => {
                warn!(code, "unknown navigation message (dropped)");
                Ok(())
            }
        }
    }

    // --- control handlers -------------------------------------------------

    fn handle_service_discovery(&mut self, body: &[u8]) -> Result<()> {
        let request = ServiceDiscoveryRequest::decode(body)?;
        info!(
            device = request.device_name.as_deref().unwrap_or("<unnamed>"),
            "service discovery"
        );
        let response = services::build_discovery_response(&self.config, self.callbacks.as_mut());
        self.send_encrypted_message(
            0,
            CTRL,
            ControlMessageId::ServiceDiscoveryResponse as u16,
            &response,
        )
    }

    fn handle_ping(&mut self, body: &[u8]) -> Result<()> {
        let request = PingRequest::decode(body)?;
        let response = PingResponse {
            timestamp: request.timestamp,
        };
        self.send_encrypted_message(0, CTRL, ControlMessageId::PingResponse as u16, &response)
    }

    fn handle_navigation_focus(&mut self, body: &[u8]) -> Result<()> {
        let request = NavigationFocusRequest::decode(body)?;
        // Focus is always granted; the head unit has no competing HMI.
        let response = NavigationFocusResponse {
            focus_type: request.focus_type,
        };
        self.send_encrypted_message(
            0,
            CTRL,
            ControlMessageId::NavigationFocusResponse as u16,
            &response,
        )
    }

    fn handle_shutdown_request(&mut self, body: &[u8]) -> Result<()> {
        let request = ShutdownRequest::decode(body)?;
        info!(reason = request.reason, "phone requested shutdown");
        self.send_encrypted_message(
            0,
            CTRL,
            ControlMessageId::ShutdownResponse as u16,
            &ShutdownResponse {},
        )?;
        self.request_stop();
        Ok(())
    }
}
