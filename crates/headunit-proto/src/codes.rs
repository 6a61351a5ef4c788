//! Message codes, per channel family.
//!
//! Every assembled non-media-data payload starts with one of these codes
//! as a 2-byte big-endian prefix. Codes below 0x8000 are connection-level
//! control; codes at or above 0x8000 are service-specific.

/// Service-specific codes start here. Used to decide whether an outbound
/// frame carries the CONTROL flag.
pub const SERVICE_CODE_BASE: u16 = 0x8000;

/// Channel-0 codes during the init phase (before `AuthComplete`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum InitMessageId {
    VersionRequest = 0x0001,
    VersionResponse = 0x0002,
    SslHandshake = 0x0003,
    AuthComplete = 0x0004,
}

impl TryFrom<u16> for InitMessageId {
    type Error = u16;
    fn try_from(code: u16) -> Result<Self, u16> {
        Ok(match code {
            0x0001 => Self::VersionRequest,
            0x0002 => Self::VersionResponse,
            0x0003 => Self::SslHandshake,
            0x0004 => Self::AuthComplete,
            other => return Err(other),
        })
    }
}

/// Connection-level codes valid after auth. MediaDataWithTimestamp and
/// MediaData appear on media channels; the rest on channel 0 or, for
/// channel open, on the channel being opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ControlMessageId {
    MediaDataWithTimestamp = 0x0000,
    MediaData = 0x0001,
    ServiceDiscoveryRequest = 0x0005,
    ServiceDiscoveryResponse = 0x0006,
    ChannelOpenRequest = 0x0007,
    ChannelOpenResponse = 0x0008,
    PingRequest = 0x000b,
    PingResponse = 0x000c,
    NavigationFocusRequest = 0x000d,
    NavigationFocusResponse = 0x000e,
    ShutdownRequest = 0x000f,
    ShutdownResponse = 0x0010,
    VoiceSessionRequest = 0x0011,
    AudioFocusRequest = 0x0012,
    AudioFocusResponse = 0x0013,
}

impl TryFrom<u16> for ControlMessageId {
    type Error = u16;
    fn try_from(code: u16) -> Result<Self, u16> {
        Ok(match code {
            0x0000 => Self::MediaDataWithTimestamp,
            0x0001 => Self::MediaData,
            0x0005 => Self::ServiceDiscoveryRequest,
            0x0006 => Self::ServiceDiscoveryResponse,
            0x0007 => Self::ChannelOpenRequest,
            0x0008 => Self::ChannelOpenResponse,
            0x000b => Self::PingRequest,
            0x000c => Self::PingResponse,
            0x000d => Self::NavigationFocusRequest,
            0x000e => Self::NavigationFocusResponse,
            0x000f => Self::ShutdownRequest,
            0x0010 => Self::ShutdownResponse,
            0x0011 => Self::VoiceSessionRequest,
            0x0012 => Self::AudioFocusRequest,
            0x0013 => Self::AudioFocusResponse,
            other => return Err(other),
        })
    }
}

/// Codes on media output channels (video, the audio outputs) and mic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum MediaMessageId {
    MediaSetupRequest = 0x8000,
    MediaStartRequest = 0x8001,
    MediaStopRequest = 0x8002,
    MediaSetupResponse = 0x8003,
    MediaAck = 0x8004,
    MicRequest = 0x8005,
    MicResponse = 0x8006,
    VideoFocusRequest = 0x8007,
    VideoFocus = 0x8008,
}

impl TryFrom<u16> for MediaMessageId {
    type Error = u16;
    fn try_from(code: u16) -> Result<Self, u16> {
        Ok(match code {
            0x8000 => Self::MediaSetupRequest,
            0x8001 => Self::MediaStartRequest,
            0x8002 => Self::MediaStopRequest,
            0x8003 => Self::MediaSetupResponse,
            0x8004 => Self::MediaAck,
            0x8005 => Self::MicRequest,
            0x8006 => Self::MicResponse,
            0x8007 => Self::VideoFocusRequest,
            0x8008 => Self::VideoFocus,
            other => return Err(other),
        })
    }
}

/// Codes on the sensor channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SensorMessageId {
    SensorStartRequest = 0x8001,
    SensorStartResponse = 0x8002,
    SensorEvent = 0x8003,
}

impl TryFrom<u16> for SensorMessageId {
    type Error = u16;
    fn try_from(code: u16) -> Result<Self, u16> {
        Ok(match code {
            0x8001 => Self::SensorStartRequest,
            0x8002 => Self::SensorStartResponse,
            0x8003 => Self::SensorEvent,
            other => return Err(other),
        })
    }
}

/// Codes on the input (touch) channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum InputMessageId {
    InputEvent = 0x8001,
    BindingRequest = 0x8002,
    BindingResponse = 0x8003,
}

impl TryFrom<u16> for InputMessageId {
    type Error = u16;
    fn try_from(code: u16) -> Result<Self, u16> {
        Ok(match code {
            0x8001 => Self::InputEvent,
            0x8002 => Self::BindingRequest,
            0x8003 => Self::BindingResponse,
            other => return Err(other),
        })
    }
}

/// Codes on the phone-status channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum PhoneStatusMessageId {
    PhoneStatus = 0x8001,
    PhoneStatusInput = 0x8002,
}

impl TryFrom<u16> for PhoneStatusMessageId {
    type Error = u16;
    fn try_from(code: u16) -> Result<Self, u16> {
        Ok(match code {
            0x8001 => Self::PhoneStatus,
            0x8002 => Self::PhoneStatusInput,
            other => return Err(other),
        })
    }
}

/// Codes on the bluetooth channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum BluetoothMessageId {
    BluetoothPairingRequest = 0x8001,
    BluetoothPairingResponse = 0x8002,
    BluetoothAuthData = 0x8003,
}

impl TryFrom<u16> for BluetoothMessageId {
    type Error = u16;
    fn try_from(code: u16) -> Result<Self, u16> {
        Ok(match code {
            0x8001 => Self::BluetoothPairingRequest,
            0x8002 => Self::BluetoothPairingResponse,
            0x8003 => Self::BluetoothAuthData,
            other => return Err(other),
        })
    }
}

/// Codes on the notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum NotificationMessageId {
    StartGenericNotifications = 0x8001,
    StopGenericNotifications = 0x8002,
    GenericNotificationRequest = 0x8003,
    GenericNotificationResponse = 0x8004,
}

impl TryFrom<u16> for NotificationMessageId {
    type Error = u16;
    fn try_from(code: u16) -> Result<Self, u16> {
        Ok(match code {
            0x8001 => Self::StartGenericNotifications,
            0x8002 => Self::StopGenericNotifications,
            0x8003 => Self::GenericNotificationRequest,
            0x8004 => Self::GenericNotificationResponse,
            other => return Err(other),
        })
    }
}

/// Codes on the navigation channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum NaviMessageId {
    Status = 0x8003,
    Turn = 0x8004,
    TurnDistance = 0x8005,
}

impl TryFrom<u16> for NaviMessageId {
    type Error = u16;
    fn try_from(code: u16) -> Result<Self, u16> {
        Ok(match code {
            0x8003 => Self::Status,
            0x8004 => Self::Turn,
            0x8005 => Self::TurnDistance,
            other => return Err(other),
        })
    }
}

/// Button scan codes the phone understands in input reports.
pub mod buttons {
    pub const MIC1: u32 = 0x01;
    pub const MENU: u32 = 0x02;
    pub const HOME: u32 = 0x03;
    pub const BACK: u32 = 0x04;
    pub const PHONE: u32 = 0x05;
    pub const CALL_END: u32 = 0x06;
    pub const UP: u32 = 0x13;
    pub const DOWN: u32 = 0x14;
    pub const LEFT: u32 = 0x15;
    pub const RIGHT: u32 = 0x16;
    pub const ENTER: u32 = 0x17;
    pub const MIC: u32 = 0x54;
    pub const PLAY_PAUSE: u32 = 0x55;
    pub const NEXT: u32 = 0x57;
    pub const PREV: u32 = 0x58;
    pub const START: u32 = 0x7e;
    pub const STOP: u32 = 0x7f;
    pub const MUSIC: u32 = 0xd1;
    pub const SCROLL_WHEEL: u32 = 65536;
    pub const MEDIA: u32 = 65537;
    pub const NAVIGATION: u32 = 65538;
    pub const RADIO: u32 = 65539;
    pub const TEL: u32 = 65540;
    pub const PRIMARY_BUTTON: u32 = 65541;
    pub const SECONDARY_BUTTON: u32 = 65542;
    pub const TERTIARY_BUTTON: u32 = 65543;
}

/// Split the 2-byte big-endian message code off an assembled payload.
pub fn split_code(message: &[u8]) -> Option<(u16, &[u8])> {
    if message.len() < 2 {
        return None;
    }
    Some((u16::from_be_bytes([message[0], message[1]]), &message[2..]))
}

/// Split the 8-byte big-endian presentation timestamp off a media body.
pub fn split_timestamp(body: &[u8]) -> Option<(u64, &[u8])> {
    if body.len() < 8 {
        return None;
    }
    let mut ts = [0u8; 8];
    ts.copy_from_slice(&body[..8]);
    Some((u64::from_be_bytes(ts), &body[8..]))
}

/// True when an outbound message with this code is connection-level and
/// gets the CONTROL framing flag.
pub fn is_control_code(code: u16) -> bool {
    code < SERVICE_CODE_BASE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_codes_roundtrip() {
        for code in [0x0001u16, 0x0002, 0x0003, 0x0004] {
            let id = InitMessageId::try_from(code).unwrap();
            assert_eq!(id as u16, code);
        }
        assert_eq!(InitMessageId::try_from(0x0005), Err(0x0005));
    }

    #[test]
    fn control_codes_roundtrip() {
        let id = ControlMessageId::try_from(0x000b).unwrap();
        assert_eq!(id, ControlMessageId::PingRequest);
        assert_eq!(ControlMessageId::ShutdownResponse as u16, 0x0010);
        assert!(ControlMessageId::try_from(0x7fff).is_err());
    }

    #[test]
    fn split_code_prefix() {
        let payload = [0x80, 0x01, 0xaa, 0xbb];
        let (code, rest) = split_code(&payload).unwrap();
        assert_eq!(code, 0x8001);
        assert_eq!(rest, &[0xaa, 0xbb]);
        assert!(split_code(&[0x80]).is_none());
    }

    #[test]
    fn split_timestamp_prefix() {
        let mut body = 0xdead_beefu64.to_be_bytes().to_vec();
        body.extend_from_slice(b"h264");
        let (ts, rest) = split_timestamp(&body).unwrap();
        assert_eq!(ts, 0xdead_beef);
        assert_eq!(rest, b"h264");
        assert!(split_timestamp(&[0; 7]).is_none());
    }

    #[test]
    fn control_code_classification() {
        assert!(is_control_code(ControlMessageId::PingResponse as u16));
        assert!(!is_control_code(MediaMessageId::MediaSetupRequest as u16));
    }
}
