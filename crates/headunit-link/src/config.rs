use std::time::Duration;

use headunit_proto::messages::{VideoFrameRate, VideoResolution};

/// Identity strings advertised to the phone in service discovery.
#[derive(Debug, Clone)]
pub struct HeadUnitInfo {
    pub name: String,
    pub car_model: String,
    pub car_year: String,
    pub car_serial: String,
    pub left_hand_drive: bool,
    pub manufacturer: String,
    pub model: String,
    pub sw_build: String,
    pub sw_version: String,
}

impl Default for HeadUnitInfo {
    fn default() -> Self {
        Self {
            name: "headunit".into(),
            car_model: "Universal".into(),
            car_year: "2016".into(),
            car_serial: "0001".into(),
            left_hand_drive: true,
            manufacturer: "headunit-rs".into(),
            model: "ConnectionCore".into(),
            sw_build: "1".into(),
            sw_version: "1.0".into(),
        }
    }
}

/// Which services the head unit advertises, and their stream parameters.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub sensor: bool,
    pub video: bool,
    pub audio: bool,
    pub mic: bool,
    pub input: bool,
    pub phone_status: bool,
    pub notifications: bool,
    pub navigation: bool,

    pub video_resolution: VideoResolution,
    pub video_fps: VideoFrameRate,
    pub video_dpi: u32,
    /// Touch surface dimensions, when a touch screen is present.
    pub touch_screen: Option<(u32, u32)>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            sensor: true,
            video: true,
            audio: true,
            mic: true,
            input: true,
            phone_status: true,
            notifications: false,
            navigation: true,
            video_resolution: VideoResolution::Res1280x720,
            video_fps: VideoFrameRate::Fps30,
            video_dpi: 140,
            touch_screen: Some((800, 480)),
        }
    }
}

/// TLS client identity, injected at construction. PEM-encoded; `None`
/// runs the handshake without a client certificate.
#[derive(Debug, Clone, Default)]
pub struct SslConfig {
    pub client_cert_pem: Option<Vec<u8>>,
    pub client_key_pem: Option<Vec<u8>>,
}

/// Everything the connection core needs at construction. Plain data; no
/// globals.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Bound on each blocking transport read.
    pub recv_timeout: Duration,
    /// Bound on each blocking transport write; also the per-attempt
    /// timeout of the send retry budget.
    pub send_timeout: Duration,
    /// Delay before granting audio focus when a backup-camera requestor
    /// is involved. Platform heuristic, kept tunable.
    pub focus_grant_delay: Duration,
    /// Protocol version sent in the version request.
    pub version: (u16, u16),
    pub unit: HeadUnitInfo,
    pub services: ServiceConfig,
    pub ssl: SslConfig,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            recv_timeout: Duration::from_millis(150),
            send_timeout: Duration::from_millis(500),
            focus_grant_delay: Duration::from_secs(1),
            version: (1, 1),
            unit: HeadUnitInfo::default(),
            services: ServiceConfig::default(),
            ssl: SslConfig::default(),
        }
    }
}
