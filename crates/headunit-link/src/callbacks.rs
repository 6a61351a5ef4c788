use headunit_proto::messages::{
    AudioFocusRequest, BluetoothAuthData, BluetoothService, GenericNotificationRequest,
    GenericNotificationResponse, InputEventChannel, InputStreamChannel, MicRequest,
    NavDistanceMessage, NavMessagesStatus, NavTurnMessage, OutputStreamChannel, PhoneStatus,
    SensorChannel, ServiceDiscoveryResponse, VideoFocusRequest, VoiceSessionRequest,
};

use crate::state::LinkState;

/// Verdict of [`EventCallbacks::message_filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAction {
    /// Let the core dispatch the message normally.
    Pass,
    /// The embedder handled the message; the core drops it.
    Consumed,
}

/// The interface the core exposes to embedders.
///
/// Every method runs on the connection's I/O thread. Implementations must
/// not block; anything slow belongs on another thread, fed through the
/// command queue.
pub trait EventCallbacks: Send {
    /// Pre-dispatch hook over every assembled message.
    fn message_filter(
        &mut self,
        _state: LinkState,
        _channel: u8,
        _code: u16,
        _payload: &[u8],
    ) -> FilterAction {
        FilterAction::Pass
    }

    /// A media payload arrived on `channel`. `timestamp` is the 8-byte
    /// presentation timestamp, 0 for untimestamped data.
    fn media_packet(&mut self, channel: u8, timestamp: u64, data: &[u8]);

    fn media_start(&mut self, channel: u8);

    fn media_stop(&mut self, channel: u8);

    fn media_setup_complete(&mut self, channel: u8);

    /// Fired exactly once when the connection goes away, whether through
    /// orderly shutdown or failure.
    fn disconnection_or_error(&mut self);

    fn audio_focus_request(&mut self, channel: u8, request: &AudioFocusRequest);

    fn video_focus_request(&mut self, channel: u8, request: &VideoFocusRequest);

    fn voice_session_request(&mut self, _request: &VoiceSessionRequest) {}

    fn mic_request(&mut self, _channel: u8, _request: &MicRequest) {}

    fn phone_status(&mut self, _status: &PhoneStatus) {}

    fn navi_status(&mut self, _status: &NavMessagesStatus) {}

    fn navi_turn(&mut self, _turn: &NavTurnMessage) {}

    fn navi_turn_distance(&mut self, _distance: &NavDistanceMessage) {}

    fn generic_notification_request(&mut self, _request: &GenericNotificationRequest) {}

    fn generic_notification_response(&mut self, _response: &GenericNotificationResponse) {}

    fn generic_notifications_start(&mut self) {}

    fn generic_notifications_stop(&mut self) {}

    fn bluetooth_auth_data(&mut self, _data: &BluetoothAuthData) {}

    /// MAC address of the car's bluetooth adapter. `None` (or empty)
    /// means no bluetooth: the service is not advertised and pairing
    /// requests are declined.
    fn car_bluetooth_address(&mut self) -> Option<String> {
        None
    }

    // Descriptor customization hooks, invoked while the service
    // discovery response is being assembled, before serialization.

    fn customize_car_info(&mut self, _info: &mut ServiceDiscoveryResponse) {}

    fn customize_sensor_config(&mut self, _channel: &mut SensorChannel) {}

    fn customize_input_config(&mut self, _channel: &mut InputEventChannel) {}

    fn customize_output_channel(&mut self, _channel_id: u8, _stream: &mut OutputStreamChannel) {}

    fn customize_input_channel(&mut self, _channel_id: u8, _stream: &mut InputStreamChannel) {}

    fn customize_bluetooth_service(&mut self, _channel_id: u8, _service: &mut BluetoothService) {}
}
