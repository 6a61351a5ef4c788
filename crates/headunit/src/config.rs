//! The JSON configuration component.
//!
//! A small sibling of the connection core: reads and writes the head
//! unit's settings file, tolerating missing files, missing keys, and
//! corrupt content by falling back to defaults. The core consumes
//! `wifiTransport` to pick its transport.

use std::path::Path;

use headunit_transport::TransportKind;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Persisted head-unit settings. Key names are part of the on-disk
/// format; do not rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadUnitSettings {
    #[serde(rename = "launchOnDevice")]
    pub launch_on_device: bool,

    #[serde(rename = "carGPS")]
    pub car_gps: bool,

    /// True: connect to the phone over Wi-Fi; false: USB accessory.
    #[serde(rename = "wifiTransport")]
    pub wifi_transport: bool,

    #[serde(rename = "reverseGPS")]
    pub reverse_gps: bool,

    /// Phone address for the Wi-Fi transport.
    #[serde(rename = "phoneAddress", skip_serializing_if = "Option::is_none")]
    pub phone_address: Option<String>,
}

impl Default for HeadUnitSettings {
    fn default() -> Self {
        Self {
            launch_on_device: true,
            car_gps: true,
            wifi_transport: false,
            reverse_gps: false,
            phone_address: None,
        }
    }
}

impl HeadUnitSettings {
    /// Read settings from `path`. A missing or unparsable file yields the
    /// defaults; a valid file with missing keys fills those in.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(?path, %err, "config file not readable, using defaults");
                return Self::default();
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(settings) => settings,
            Err(err) => {
                warn!(?path, %err, "config file not parsable, using defaults");
                Self::default()
            }
        }
    }

    /// Write settings to `path`, pretty-printed.
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Which transport family the settings select.
    pub fn transport_kind(&self) -> TransportKind {
        if self.wifi_transport {
            TransportKind::Wifi
        } else {
            TransportKind::Usb
        }
    }
}
