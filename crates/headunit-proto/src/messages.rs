//! Protocol-buffer message bodies.
//!
//! Hand-derived `prost` messages covering every body the connection core
//! serializes or parses. Field numbers are part of the wire contract; do
//! not renumber.

/// Generic request outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum MessageStatus {
    Ok = 0,
    Fail = 1,
}

/// Sent by the head unit once the TLS handshake settles.
#[derive(Clone, PartialEq, prost::Message)]
pub struct AuthCompleteResponse {
    #[prost(enumeration = "MessageStatus", tag = "1")]
    pub status: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ServiceDiscoveryRequest {
    #[prost(string, optional, tag = "1")]
    pub device_name: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub device_brand: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ServiceDiscoveryResponse {
    #[prost(message, repeated, tag = "1")]
    pub channels: Vec<ChannelDescriptor>,
    #[prost(string, tag = "2")]
    pub head_unit_name: String,
    #[prost(string, tag = "3")]
    pub car_model: String,
    #[prost(string, tag = "4")]
    pub car_year: String,
    #[prost(string, tag = "5")]
    pub car_serial: String,
    #[prost(bool, tag = "6")]
    pub left_hand_drive: bool,
    #[prost(string, tag = "7")]
    pub headunit_manufacturer: String,
    #[prost(string, tag = "8")]
    pub headunit_model: String,
    #[prost(string, tag = "9")]
    pub sw_build: String,
    #[prost(string, tag = "10")]
    pub sw_version: String,
    #[prost(bool, tag = "11")]
    pub can_play_native_media_during_vr: bool,
    #[prost(bool, optional, tag = "12")]
    pub hide_projected_clock: Option<bool>,
}

/// One advertised service. Exactly one of the service fields is set.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ChannelDescriptor {
    #[prost(uint32, tag = "1")]
    pub channel_id: u32,
    #[prost(message, optional, tag = "2")]
    pub sensor_channel: Option<SensorChannel>,
    #[prost(message, optional, tag = "3")]
    pub output_stream_channel: Option<OutputStreamChannel>,
    #[prost(message, optional, tag = "4")]
    pub input_event_channel: Option<InputEventChannel>,
    #[prost(message, optional, tag = "5")]
    pub input_stream_channel: Option<InputStreamChannel>,
    #[prost(message, optional, tag = "6")]
    pub bluetooth_service: Option<BluetoothService>,
    #[prost(message, optional, tag = "7")]
    pub phone_status_service: Option<PhoneStatusService>,
    #[prost(message, optional, tag = "8")]
    pub navigation_status_service: Option<NavigationStatusService>,
    #[prost(message, optional, tag = "9")]
    pub generic_notification_service: Option<GenericNotificationService>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum SensorType {
    SensorUnspecified = 0,
    DrivingStatus = 1,
    NightData = 2,
    Location = 3,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Sensor {
    #[prost(enumeration = "SensorType", tag = "1")]
    pub sensor_type: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SensorChannel {
    #[prost(message, repeated, tag = "1")]
    pub sensors: Vec<Sensor>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum StreamType {
    StreamUnspecified = 0,
    Audio = 1,
    Video = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum AudioStreamType {
    AudioUnspecified = 0,
    Media = 1,
    Speech = 2,
    System = 3,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AudioConfig {
    #[prost(uint32, tag = "1")]
    pub sample_rate: u32,
    #[prost(uint32, tag = "2")]
    pub bit_depth: u32,
    #[prost(uint32, tag = "3")]
    pub channel_count: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum VideoResolution {
    ResolutionUnspecified = 0,
    Res800x480 = 1,
    Res1280x720 = 2,
    Res1920x1080 = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum VideoFrameRate {
    RateUnspecified = 0,
    Fps30 = 1,
    Fps60 = 2,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VideoConfig {
    #[prost(enumeration = "VideoResolution", tag = "1")]
    pub resolution: i32,
    #[prost(enumeration = "VideoFrameRate", tag = "2")]
    pub frame_rate: i32,
    #[prost(uint32, tag = "3")]
    pub margin_width: u32,
    #[prost(uint32, tag = "4")]
    pub margin_height: u32,
    #[prost(uint32, tag = "5")]
    pub dpi: u32,
}

/// A media stream from the phone to the head unit (video or audio out).
#[derive(Clone, PartialEq, prost::Message)]
pub struct OutputStreamChannel {
    #[prost(enumeration = "StreamType", tag = "1")]
    pub stream_type: i32,
    #[prost(enumeration = "AudioStreamType", optional, tag = "2")]
    pub audio_stream_type: Option<i32>,
    #[prost(message, repeated, tag = "3")]
    pub audio_configs: Vec<AudioConfig>,
    #[prost(message, repeated, tag = "4")]
    pub video_configs: Vec<VideoConfig>,
    #[prost(bool, optional, tag = "5")]
    pub available_while_in_call: Option<bool>,
}

/// A media stream from the head unit to the phone (microphone).
#[derive(Clone, PartialEq, prost::Message)]
pub struct InputStreamChannel {
    #[prost(enumeration = "StreamType", tag = "1")]
    pub stream_type: i32,
    #[prost(message, optional, tag = "2")]
    pub audio_config: Option<AudioConfig>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TouchScreenConfig {
    #[prost(uint32, tag = "1")]
    pub width: u32,
    #[prost(uint32, tag = "2")]
    pub height: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct InputEventChannel {
    #[prost(uint32, repeated, tag = "1")]
    pub supported_keycodes: Vec<u32>,
    #[prost(message, optional, tag = "2")]
    pub touch_screen: Option<TouchScreenConfig>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum BluetoothPairingMethod {
    PairingUnspecified = 0,
    Pin = 2,
    Numeric = 3,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BluetoothService {
    #[prost(string, tag = "1")]
    pub car_address: String,
    #[prost(enumeration = "BluetoothPairingMethod", repeated, tag = "2")]
    pub supported_pairing_methods: Vec<i32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PhoneStatusService {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct NavigationStatusService {
    #[prost(uint32, tag = "1")]
    pub minimum_interval_ms: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GenericNotificationService {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ChannelOpenRequest {
    #[prost(int32, tag = "1")]
    pub priority: i32,
    #[prost(uint32, tag = "2")]
    pub channel_id: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ChannelOpenResponse {
    #[prost(enumeration = "MessageStatus", tag = "1")]
    pub status: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PingRequest {
    #[prost(int64, tag = "1")]
    pub timestamp: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PingResponse {
    #[prost(int64, tag = "1")]
    pub timestamp: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct NavigationFocusRequest {
    #[prost(uint32, tag = "1")]
    pub focus_type: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct NavigationFocusResponse {
    #[prost(uint32, tag = "1")]
    pub focus_type: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ShutdownRequest {
    #[prost(int32, tag = "1")]
    pub reason: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ShutdownResponse {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum VoiceSessionStatus {
    VoiceUnspecified = 0,
    Start = 1,
    Stop = 2,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VoiceSessionRequest {
    #[prost(enumeration = "VoiceSessionStatus", tag = "1")]
    pub session_status: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum AudioFocusType {
    FocusUnspecified = 0,
    Gain = 1,
    GainTransient = 2,
    GainNavi = 3,
    Release = 4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum AudioFocusState {
    StateUnspecified = 0,
    Gain = 1,
    GainTransient = 2,
    Loss = 3,
    LossTransientCanDuck = 4,
    LossTransient = 5,
    GainMediaOnly = 6,
    GainTransientGuidanceOnly = 7,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AudioFocusRequest {
    #[prost(enumeration = "AudioFocusType", tag = "1")]
    pub focus_type: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AudioFocusResponse {
    #[prost(enumeration = "AudioFocusState", tag = "1")]
    pub focus_state: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum MediaSetupStatus {
    SetupUnspecified = 0,
    Fail = 1,
    Ready = 2,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MediaSetupRequest {
    #[prost(enumeration = "StreamType", tag = "1")]
    pub stream_type: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MediaSetupResponse {
    #[prost(enumeration = "MediaSetupStatus", tag = "1")]
    pub media_status: i32,
    #[prost(uint32, tag = "2")]
    pub max_unacked: u32,
    #[prost(uint32, repeated, tag = "3")]
    pub configs: Vec<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MediaStartRequest {
    #[prost(int32, tag = "1")]
    pub session: i32,
    #[prost(uint32, tag = "2")]
    pub config: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MediaStopRequest {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MediaAck {
    #[prost(int32, tag = "1")]
    pub session: i32,
    #[prost(uint32, tag = "2")]
    pub ack: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MicRequest {
    #[prost(bool, tag = "1")]
    pub open: bool,
    #[prost(bool, tag = "2")]
    pub anc: bool,
    #[prost(bool, tag = "3")]
    pub ec: bool,
    #[prost(int32, tag = "4")]
    pub max_unacked: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MicResponse {
    #[prost(enumeration = "MessageStatus", tag = "1")]
    pub status: i32,
    #[prost(uint32, tag = "2")]
    pub session: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum VideoFocusMode {
    ModeUnspecified = 0,
    Focused = 1,
    Unfocused = 2,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VideoFocusRequest {
    #[prost(int32, tag = "1")]
    pub disp_channel_id: i32,
    #[prost(enumeration = "VideoFocusMode", tag = "2")]
    pub mode: i32,
    #[prost(int32, tag = "3")]
    pub reason: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VideoFocus {
    #[prost(enumeration = "VideoFocusMode", tag = "1")]
    pub mode: i32,
    #[prost(bool, tag = "2")]
    pub unsolicited: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SensorStartRequest {
    #[prost(enumeration = "SensorType", tag = "1")]
    pub sensor_type: i32,
    #[prost(int64, tag = "2")]
    pub min_update_period: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SensorStartResponse {
    #[prost(enumeration = "MessageStatus", tag = "1")]
    pub status: i32,
}

/// Location fix scaled the way the wire wants it: degrees * 1e7,
/// metres * 1e2 for altitude, m/s * 1e3 for speed.
#[derive(Clone, PartialEq, prost::Message)]
pub struct LocationData {
    #[prost(uint64, tag = "1")]
    pub timestamp: u64,
    #[prost(int32, tag = "2")]
    pub latitude: i32,
    #[prost(int32, tag = "3")]
    pub longitude: i32,
    #[prost(uint32, optional, tag = "4")]
    pub accuracy: Option<u32>,
    #[prost(int32, optional, tag = "5")]
    pub altitude: Option<i32>,
    #[prost(int32, optional, tag = "6")]
    pub speed: Option<i32>,
    #[prost(int32, optional, tag = "7")]
    pub bearing: Option<i32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct NightMode {
    #[prost(bool, tag = "1")]
    pub is_night: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DrivingStatus {
    #[prost(int32, tag = "1")]
    pub status: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SensorEvent {
    #[prost(message, repeated, tag = "1")]
    pub location: Vec<LocationData>,
    #[prost(message, optional, tag = "2")]
    pub night_mode: Option<NightMode>,
    #[prost(message, optional, tag = "3")]
    pub driving_status: Option<DrivingStatus>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BindingRequest {
    #[prost(int32, repeated, tag = "1")]
    pub scan_codes: Vec<i32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BindingResponse {
    #[prost(enumeration = "MessageStatus", tag = "1")]
    pub status: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TouchPointer {
    #[prost(uint32, tag = "1")]
    pub x: u32,
    #[prost(uint32, tag = "2")]
    pub y: u32,
    #[prost(uint32, tag = "3")]
    pub pointer_id: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum TouchAction {
    ActionUnspecified = 0,
    Press = 1,
    Release = 2,
    Drag = 3,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TouchEvent {
    #[prost(message, repeated, tag = "1")]
    pub pointer_data: Vec<TouchPointer>,
    #[prost(uint32, optional, tag = "2")]
    pub action_index: Option<u32>,
    #[prost(enumeration = "TouchAction", tag = "3")]
    pub action: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ButtonEvent {
    #[prost(uint32, tag = "1")]
    pub scan_code: u32,
    #[prost(bool, tag = "2")]
    pub is_pressed: bool,
    #[prost(uint32, optional, tag = "3")]
    pub meta: Option<u32>,
    #[prost(bool, optional, tag = "4")]
    pub long_press: Option<bool>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct InputReport {
    #[prost(uint64, tag = "1")]
    pub timestamp: u64,
    #[prost(int32, optional, tag = "2")]
    pub disp_channel: Option<i32>,
    #[prost(message, optional, tag = "3")]
    pub touch_event: Option<TouchEvent>,
    #[prost(message, repeated, tag = "4")]
    pub button_events: Vec<ButtonEvent>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum CallState {
    CallUnspecified = 0,
    Idle = 1,
    Active = 2,
    OnHold = 3,
    Incoming = 4,
    Muted = 5,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PhoneCall {
    #[prost(enumeration = "CallState", tag = "1")]
    pub state: i32,
    #[prost(string, tag = "2")]
    pub number: String,
    #[prost(string, tag = "3")]
    pub display_name: String,
    #[prost(uint32, tag = "4")]
    pub duration_seconds: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PhoneStatus {
    #[prost(message, repeated, tag = "1")]
    pub calls: Vec<PhoneCall>,
    #[prost(uint32, optional, tag = "2")]
    pub signal_strength: Option<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BluetoothPairingRequest {
    #[prost(string, tag = "1")]
    pub phone_address: String,
    #[prost(enumeration = "BluetoothPairingMethod", tag = "2")]
    pub pairing_method: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BluetoothPairingResponse {
    #[prost(bool, tag = "1")]
    pub already_paired: bool,
    #[prost(enumeration = "MessageStatus", tag = "2")]
    pub status: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BluetoothAuthData {
    #[prost(string, tag = "1")]
    pub data: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StartGenericNotifications {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StopGenericNotifications {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GenericNotificationRequest {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub text: String,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub icon: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GenericNotificationResponse {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(bool, tag = "2")]
    pub handled: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum NaviStatus {
    NaviUnspecified = 0,
    Unavailable = 1,
    Active = 2,
    Inactive = 3,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct NavMessagesStatus {
    #[prost(enumeration = "NaviStatus", tag = "1")]
    pub status: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct NavTurnMessage {
    #[prost(string, tag = "1")]
    pub road: String,
    #[prost(int32, tag = "2")]
    pub turn_side: i32,
    #[prost(int32, tag = "3")]
    pub turn_event: i32,
    #[prost(int32, tag = "4")]
    pub turn_number: i32,
    #[prost(int32, tag = "5")]
    pub turn_angle: i32,
    #[prost(bytes = "vec", optional, tag = "6")]
    pub image: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct NavDistanceMessage {
    #[prost(uint32, tag = "1")]
    pub distance_meters: u32,
    #[prost(uint32, tag = "2")]
    pub time_to_turn_seconds: u32,
    #[prost(uint32, tag = "3")]
    pub display_distance: u32,
    #[prost(int32, tag = "4")]
    pub display_distance_unit: i32,
}

#[cfg(test)]
mod tests {
    use prost::Message;

    use super::*;

    #[test]
    fn ping_roundtrip() {
        let ping = PingRequest {
            timestamp: 0x1122_3344_5566,
        };
        let bytes = ping.encode_to_vec();
        let back = PingRequest::decode(bytes.as_slice()).unwrap();
        assert_eq!(back, ping);
    }

    #[test]
    fn discovery_response_roundtrip() {
        let resp = ServiceDiscoveryResponse {
            channels: vec![ChannelDescriptor {
                channel_id: 3,
                output_stream_channel: Some(OutputStreamChannel {
                    stream_type: StreamType::Video as i32,
                    video_configs: vec![VideoConfig {
                        resolution: VideoResolution::Res1280x720 as i32,
                        frame_rate: VideoFrameRate::Fps30 as i32,
                        dpi: 140,
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
                ..Default::default()
            }],
            head_unit_name: "headunit".into(),
            car_model: "Universal".into(),
            ..Default::default()
        };

        let bytes = resp.encode_to_vec();
        let back = ServiceDiscoveryResponse::decode(bytes.as_slice()).unwrap();
        assert_eq!(back.channels.len(), 1);
        let video = back.channels[0]
            .output_stream_channel
            .as_ref()
            .unwrap()
            .video_configs[0]
            .clone();
        assert_eq!(video.resolution, VideoResolution::Res1280x720 as i32);
        assert_eq!(video.frame_rate, VideoFrameRate::Fps30 as i32);
    }

    #[test]
    fn enumeration_accessor() {
        let resp = ChannelOpenResponse {
            status: MessageStatus::Fail as i32,
        };
        let bytes = resp.encode_to_vec();
        let back = ChannelOpenResponse::decode(bytes.as_slice()).unwrap();
        assert_eq!(back.status(), MessageStatus::Fail);
    }

    #[test]
    fn empty_messages_encode() {
        assert!(ShutdownResponse::default().encode_to_vec().is_empty());
        assert!(MediaStopRequest::default().encode_to_vec().is_empty());
    }
}
