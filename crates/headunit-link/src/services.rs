use headunit_frame::channel::{
    AUDIO, AUDIO1, AUDIO2, BLUETOOTH, MIC, NAVIGATION, NOTIFICATIONS, PHONE_STATUS, SENSOR,
    TOUCH, VIDEO,
};
use headunit_proto::codes::buttons;
use headunit_proto::messages::{
    AudioConfig, AudioStreamType, BluetoothPairingMethod, BluetoothService, ChannelDescriptor,
    GenericNotificationService, InputEventChannel, InputStreamChannel, NavigationStatusService,
    OutputStreamChannel, PhoneStatusService, Sensor, SensorChannel, SensorType,
    ServiceDiscoveryResponse, StreamType, TouchScreenConfig, VideoConfig,
};

use crate::callbacks::EventCallbacks;
use crate::config::LinkConfig;

/// The channels the head unit accepts `ChannelOpenRequest` on, given the
/// enabled services and whether a bluetooth adapter address exists.
pub fn advertised_channels(config: &LinkConfig, has_bluetooth: bool) -> Vec<u8> {
    let services = &config.services;
    let mut channels = Vec::new();
    if services.sensor {
        channels.push(SENSOR);
    }
    if services.video {
        channels.push(VIDEO);
    }
    if services.audio {
        channels.extend([AUDIO, AUDIO1, AUDIO2]);
    }
    if services.mic {
        channels.push(MIC);
    }
    if services.input {
        channels.push(TOUCH);
    }
    if has_bluetooth {
        channels.push(BLUETOOTH);
    }
    if services.phone_status {
        channels.push(PHONE_STATUS);
    }
    if services.notifications {
        channels.push(NOTIFICATIONS);
    }
    if services.navigation {
        channels.push(NAVIGATION);
    }
    channels
}

/// Assemble the service discovery response: one descriptor per enabled
/// service, each passed through the embedder's customization hook before
/// the response is serialized.
pub fn build_discovery_response(
    config: &LinkConfig,
    callbacks: &mut dyn EventCallbacks,
) -> ServiceDiscoveryResponse {
    let services = &config.services;
    let mut channels = Vec::new();

    if services.sensor {
        let mut sensor = SensorChannel {
            sensors: vec![
                Sensor {
                    sensor_type: SensorType::DrivingStatus as i32,
                },
                Sensor {
                    sensor_type: SensorType::NightData as i32,
                },
                Sensor {
                    sensor_type: SensorType::Location as i32,
                },
            ],
        };
        callbacks.customize_sensor_config(&mut sensor);
        channels.push(ChannelDescriptor {
            channel_id: SENSOR as u32,
            sensor_channel: Some(sensor),
            ..Default::default()
        });
    }

    if services.video {
        let mut stream = OutputStreamChannel {
            stream_type: StreamType::Video as i32,
            video_configs: vec![VideoConfig {
                resolution: services.video_resolution as i32,
                frame_rate: services.video_fps as i32,
                margin_width: 0,
                margin_height: 0,
                dpi: services.video_dpi,
            }],
            available_while_in_call: Some(true),
            ..Default::default()
        };
        callbacks.customize_output_channel(VIDEO, &mut stream);
        channels.push(ChannelDescriptor {
            channel_id: VIDEO as u32,
            output_stream_channel: Some(stream),
            ..Default::default()
        });
    }

    if services.audio {
        for (channel_id, audio_type, sample_rate, channel_count) in [
            (AUDIO, AudioStreamType::Media, 48_000, 2),
            (AUDIO1, AudioStreamType::Speech, 16_000, 1),
            (AUDIO2, AudioStreamType::System, 16_000, 1),
        ] {
            let mut stream = OutputStreamChannel {
                stream_type: StreamType::Audio as i32,
                audio_stream_type: Some(audio_type as i32),
                audio_configs: vec![AudioConfig {
                    sample_rate,
                    bit_depth: 16,
                    channel_count,
                }],
                available_while_in_call: Some(true),
                ..Default::default()
            };
            callbacks.customize_output_channel(channel_id, &mut stream);
            channels.push(ChannelDescriptor {
                channel_id: channel_id as u32,
                output_stream_channel: Some(stream),
                ..Default::default()
            });
        }
    }

    if services.mic {
        let mut stream = InputStreamChannel {
            stream_type: StreamType::Audio as i32,
            audio_config: Some(AudioConfig {
                sample_rate: 16_000,
                bit_depth: 16,
                channel_count: 1,
            }),
        };
        callbacks.customize_input_channel(MIC, &mut stream);
        channels.push(ChannelDescriptor {
            channel_id: MIC as u32,
            input_stream_channel: Some(stream),
            ..Default::default()
        });
    }

    if services.input {
        let mut input = InputEventChannel {
            supported_keycodes: vec![
                buttons::MIC1,
                buttons::MENU,
                buttons::HOME,
                buttons::BACK,
                buttons::PHONE,
                buttons::ENTER,
                buttons::UP,
                buttons::DOWN,
                buttons::LEFT,
                buttons::RIGHT,
                buttons::PLAY_PAUSE,
                buttons::NEXT,
                buttons::PREV,
            ],
            touch_screen: services
                .touch_screen
                .map(|(width, height)| TouchScreenConfig { width, height }),
        };
        callbacks.customize_input_config(&mut input);
        channels.push(ChannelDescriptor {
            channel_id: TOUCH as u32,
            input_event_channel: Some(input),
            ..Default::default()
        });
    }

    if let Some(address) = callbacks.car_bluetooth_address().filter(|a| !a.is_empty()) {
        let mut service = BluetoothService {
            car_address: address,
            supported_pairing_methods: vec![
                BluetoothPairingMethod::Pin as i32,
                BluetoothPairingMethod::Numeric as i32,
            ],
        };
        callbacks.customize_bluetooth_service(BLUETOOTH, &mut service);
        channels.push(ChannelDescriptor {
            channel_id: BLUETOOTH as u32,
            bluetooth_service: Some(service),
            ..Default::default()
        });
    }

    if services.phone_status {
        channels.push(ChannelDescriptor {
            channel_id: PHONE_STATUS as u32,
            phone_status_service: Some(PhoneStatusService {}),
            ..Default::default()
        });
    }

    if services.notifications {
        channels.push(ChannelDescriptor {
            channel_id: NOTIFICATIONS as u32,
            generic_notification_service: Some(GenericNotificationService {}),
            ..Default::default()
        });
    }

    if services.navigation {
        channels.push(ChannelDescriptor {
            channel_id: NAVIGATION as u32,
            navigation_status_service: Some(NavigationStatusService {
                minimum_interval_ms: 1000,
            }),
            ..Default::default()
        });
    }

    let unit = &config.unit;
    let mut response = ServiceDiscoveryResponse {
        channels,
        head_unit_name: unit.name.clone(),
        car_model: unit.car_model.clone(),
        car_year: unit.car_year.clone(),
        car_serial: unit.car_serial.clone(),
        left_hand_drive: unit.left_hand_drive,
        headunit_manufacturer: unit.manufacturer.clone(),
        headunit_model: unit.model.clone(),
        sw_build: unit.sw_build.clone(),
        sw_version: unit.sw_version.clone(),
        can_play_native_media_during_vr: false,
        hide_projected_clock: None,
    };
    callbacks.customize_car_info(&mut response);
    response
}
