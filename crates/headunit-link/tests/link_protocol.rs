//! End-to-end protocol tests against an in-process phone.
//!
//! The phone side runs a real rustls server with a generated certificate,
//! speaks the wire framing over a loopback TCP socket, and drives the
//! connection through version negotiation, the tunneled TLS handshake,
//! service discovery, and the media path.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use headunit_frame::channel::{AUDIO, AUDIO1, CTRL, SENSOR, TOUCH, VIDEO};
use headunit_frame::{decode_frame, encode_frame, Frame, FrameFlags, MAX_FRAME_PAYLOAD};
use headunit_link::{EventCallbacks, HeadUnit, LinkConfig, LinkState};
use headunit_proto::codes::{is_control_code, split_code, ControlMessageId, InitMessageId, MediaMessageId};
use headunit_proto::messages::{
    AudioFocusRequest, ChannelOpenRequest, ChannelOpenResponse, MediaSetupRequest,
    MediaSetupResponse, MediaStartRequest, MessageStatus, PingRequest, PingResponse,
    ServiceDiscoveryRequest, ServiceDiscoveryResponse, ShutdownRequest, VideoFocusRequest,
    VideoFrameRate, VideoResolution,
};
use headunit_transport::TcpTransport;
use prost::Message;

// --- recording sink -------------------------------------------------------

#[derive(Default)]
struct Record {
    media: Vec<(u8, u64, Vec<u8>)>,
    started: Vec<u8>,
    stopped: Vec<u8>,
    setup_complete: Vec<u8>,
    disconnects: usize,
}

#[derive(Clone)]
struct RecordingSink(Arc<Mutex<Record>>);

impl EventCallbacks for RecordingSink {
    fn media_packet(&mut self, channel: u8, timestamp: u64, data: &[u8]) {
        self.0
            .lock()
            .unwrap()
            .media
            .push((channel, timestamp, data.to_vec()));
    }

    fn media_start(&mut self, channel: u8) {
        self.0.lock().unwrap().started.push(channel);
    }

    fn media_stop(&mut self, channel: u8) {
        self.0.lock().unwrap().stopped.push(channel);
    }

    fn media_setup_complete(&mut self, channel: u8) {
        self.0.lock().unwrap().setup_complete.push(channel);
    }

    fn disconnection_or_error(&mut self) {
        self.0.lock().unwrap().disconnects += 1;
    }

    fn audio_focus_request(&mut self, _: u8, _: &AudioFocusRequest) {}

    fn video_focus_request(&mut self, _: u8, _: &VideoFocusRequest) {}
}

// --- fake phone -----------------------------------------------------------

/// A plaintext fragment waiting to be sealed and sent.
struct Fragment {
    channel: u8,
    flags: FrameFlags,
    total: Option<u32>,
    plaintext: Vec<u8>,
}

struct FakePhone {
    stream: TcpStream,
    rx: BytesMut,
    tls: rustls::ServerConnection,
}

impl FakePhone {
    fn new(stream: TcpStream) -> Self {
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();

        let cert = rcgen::generate_simple_self_signed(vec!["phone.android.local".into()])
            .expect("generate phone certificate");
        let cert_der = cert.cert.der().clone();
        let key_der = rustls::pki_types::PrivateKeyDer::Pkcs8(cert.key_pair.serialize_der().into());

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = rustls::ServerConfig::builder_with_provider(provider)
            .with_protocol_versions(rustls::ALL_VERSIONS)
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der], key_der)
            .unwrap();
        let tls = rustls::ServerConnection::new(Arc::new(config)).unwrap();

        Self {
            stream,
            rx: BytesMut::new(),
            tls,
        }
    }

    fn read_frame(&mut self) -> Frame {
        loop {
            if let Some(frame) = decode_frame(&mut self.rx).unwrap() {
                return frame;
            }
            let mut buf = [0u8; 4096];
            let n = self.stream.read(&mut buf).expect("phone read");
            assert!(n > 0, "head unit closed the stream unexpectedly");
            self.rx.extend_from_slice(&buf[..n]);
        }
    }

    fn write_frame(&mut self, frame: &Frame) {
        let mut wire = BytesMut::new();
        encode_frame(frame, &mut wire).unwrap();
        self.stream.write_all(&wire).unwrap();
    }

    fn tls_encrypt(&mut self, plain: &[u8]) -> Vec<u8> {
        self.tls.writer().write_all(plain).unwrap();
        let mut out = Vec::new();
        while self.tls.wants_write() {
            self.tls.write_tls(&mut out).unwrap();
        }
        out
    }

    fn tls_decrypt(&mut self, mut cipher: &[u8]) -> Vec<u8> {
        while !cipher.is_empty() {
            self.tls.read_tls(&mut cipher).unwrap();
            self.tls.process_new_packets().unwrap();
        }
        let mut plain = Vec::new();
        let _ = self.tls.reader().read_to_end(&mut plain);
        plain
    }

    /// Read one complete message from the head unit, decrypting when the
    /// frame says so.
    fn expect_message(&mut self) -> (u8, u16, Vec<u8>) {
        let frame = self.read_frame();
        assert!(
            frame.flags.last() || frame.flags.control(),
            "unexpected fragmented frame from head unit"
        );
        let payload = if frame.flags.encrypted() {
            self.tls_decrypt(&frame.payload)
        } else {
            frame.payload.to_vec()
        };
        let (code, body) = split_code(&payload).expect("message code prefix");
        (frame.channel, code, body.to_vec())
    }

    fn send_message(&mut self, channel: u8, code: u16, body: &[u8], encrypted: bool) {
        let mut payload = Vec::with_capacity(2 + body.len());
        payload.extend_from_slice(&code.to_be_bytes());
        payload.extend_from_slice(body);

        let mut extra = 0u8;
        if is_control_code(code) {
            extra |= FrameFlags::CONTROL;
        }
        let payload = if encrypted {
            extra |= FrameFlags::ENCRYPTED;
            self.tls_encrypt(&payload)
        } else {
            payload
        };
        self.write_frame(&Frame::single(channel, extra, payload));
    }

    /// Split a large message into plaintext fragments with the right
    /// flags. Encryption happens at send time, because TLS records must
    /// go on the wire in the order they were sealed.
    fn fragment_plain(channel: u8, message: &[u8]) -> Vec<Fragment> {
        let total = message.len() as u32;
        let mut fragments = Vec::new();
        let mut chunks = message.chunks(MAX_FRAME_PAYLOAD).peekable();
        let mut first = true;
        while let Some(chunk) = chunks.next() {
            let mut flags = FrameFlags(FrameFlags::ENCRYPTED);
            if first {
                flags = flags.with(FrameFlags::FIRST);
            }
            if chunks.peek().is_none() {
                flags = flags.with(FrameFlags::LAST);
            }
            fragments.push(Fragment {
                channel,
                flags,
                total: flags.has_total().then_some(total),
                plaintext: chunk.to_vec(),
            });
            first = false;
        }
        fragments
    }

    /// Seal and transmit one fragment.
    fn send_fragment(&mut self, fragment: &Fragment) {
        let cipher = self.tls_encrypt(&fragment.plaintext);
        self.write_frame(&Frame {
            channel: fragment.channel,
            flags: fragment.flags,
            total: fragment.total,
            payload: cipher.into(),
        });
    }

    /// Drive version negotiation, the tunneled TLS handshake, and wait
    /// for AuthComplete.
    fn run_handshake(&mut self) {
        let (channel, code, body) = self.expect_message();
        assert_eq!(channel, CTRL);
        assert_eq!(code, InitMessageId::VersionRequest as u16);
        assert_eq!(body, [0x00, 0x01, 0x00, 0x01], "version request body");

        // Version granted: (1, 1), status 0.
        self.send_message(
            CTRL,
            InitMessageId::VersionResponse as u16,
            &[0x00, 0x01, 0x00, 0x01, 0x00, 0x00],
            false,
        );

        loop {
            let (channel, code, body) = self.expect_message();
            assert_eq!(channel, CTRL);
            if code == InitMessageId::SslHandshake as u16 {
                let mut input = body.as_slice();
                while !input.is_empty() {
                    self.tls.read_tls(&mut input).unwrap();
                    self.tls.process_new_packets().unwrap();
                }
                let mut flight = Vec::new();
                while self.tls.wants_write() {
                    self.tls.write_tls(&mut flight).unwrap();
                }
                if !flight.is_empty() {
                    self.send_message(CTRL, InitMessageId::SslHandshake as u16, &flight, false);
                }
            } else if code == InitMessageId::AuthComplete as u16 {
                assert!(!self.tls.is_handshaking(), "auth complete before tls settled");
                return;
            } else {
                panic!("unexpected init message 0x{code:04x}");
            }
        }
    }

    /// Open a service channel and assert the response status.
    fn open_channel(&mut self, channel: u8, expect: MessageStatus) {
        let request = ChannelOpenRequest {
            priority: 1,
            channel_id: channel as u32,
        };
        self.send_message(
            channel,
            ControlMessageId::ChannelOpenRequest as u16,
            &request.encode_to_vec(),
            true,
        );
        let (reply_channel, code, body) = self.expect_message();
        assert_eq!(reply_channel, channel);
        assert_eq!(code, ControlMessageId::ChannelOpenResponse as u16);
        let response = ChannelOpenResponse::decode(body.as_slice()).unwrap();
        assert_eq!(response.status, expect as i32);
    }
}

// --- harness --------------------------------------------------------------

fn start_pair_with(config: LinkConfig) -> (HeadUnit, FakePhone, Arc<Mutex<Record>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let record = Arc::new(Mutex::new(Record::default()));
    let mut server = HeadUnit::new(config, Box::new(RecordingSink(Arc::clone(&record)))).unwrap();
    server
        .start_with_transport(Box::new(TcpTransport::with_addr(addr)), false)
        .unwrap();

    let (stream, _) = listener.accept().unwrap();
    (server, FakePhone::new(stream), record)
}

fn start_pair() -> (HeadUnit, FakePhone, Arc<Mutex<Record>>) {
    start_pair_with(LinkConfig::default())
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

// --- scenarios ------------------------------------------------------------

#[test]
fn happy_handshake_reaches_started() {
    let (server, mut phone, _record) = start_pair();

    assert!(matches!(
        server.state(),
        LinkState::Starting | LinkState::Started
    ));
    phone.run_handshake();

    assert!(wait_until(Duration::from_secs(2), || server.state()
        == LinkState::Started));
}

#[test]
fn service_discovery_advertises_default_services() {
    let (_server, mut phone, _record) = start_pair();
    phone.run_handshake();

    let request = ServiceDiscoveryRequest {
        device_name: Some("test-phone".into()),
        device_brand: None,
    };
    phone.send_message(
        CTRL,
        ControlMessageId::ServiceDiscoveryRequest as u16,
        &request.encode_to_vec(),
        true,
    );

    let (channel, code, body) = phone.expect_message();
    assert_eq!(channel, CTRL);
    assert_eq!(code, ControlMessageId::ServiceDiscoveryResponse as u16);

    let response = ServiceDiscoveryResponse::decode(body.as_slice()).unwrap();
    let ids: Vec<u32> = response.channels.iter().map(|c| c.channel_id).collect();
    for expected in [SENSOR, VIDEO, AUDIO, TOUCH] {
        assert!(ids.contains(&(expected as u32)), "service {expected} missing");
    }

    let video = response
        .channels
        .iter()
        .find(|c| c.channel_id == VIDEO as u32)
        .and_then(|c| c.output_stream_channel.as_ref())
        .expect("video stream descriptor");
    assert_eq!(
        video.video_configs[0].resolution,
        VideoResolution::Res1280x720 as i32
    );
    assert_eq!(
        video.video_configs[0].frame_rate,
        VideoFrameRate::Fps30 as i32
    );
}

#[test]
fn media_path_delivers_timestamped_packets() {
    let (_server, mut phone, record) = start_pair();
    phone.run_handshake();

    phone.open_channel(VIDEO, MessageStatus::Ok);

    // Setup: expect max_unacked=10 and the embedder completion callback.
    let setup = MediaSetupRequest::default();
    phone.send_message(
        VIDEO,
        MediaMessageId::MediaSetupRequest as u16,
        &setup.encode_to_vec(),
        true,
    );
    let (channel, code, body) = phone.expect_message();
    assert_eq!(channel, VIDEO);
    assert_eq!(code, MediaMessageId::MediaSetupResponse as u16);
    let response = MediaSetupResponse::decode(body.as_slice()).unwrap();
    assert_eq!(response.max_unacked, 10);
    assert!(wait_until(Duration::from_secs(1), || record
        .lock()
        .unwrap()
        .setup_complete
        .contains(&VIDEO)));

    let start = MediaStartRequest {
        session: 11,
        config: 0,
    };
    phone.send_message(
        VIDEO,
        MediaMessageId::MediaStartRequest as u16,
        &start.encode_to_vec(),
        true,
    );
    assert!(wait_until(Duration::from_secs(1), || record
        .lock()
        .unwrap()
        .started
        .contains(&VIDEO)));

    // One timestamped packet.
    let mut body = 0x0000_0000_DEAD_BEEFu64.to_be_bytes().to_vec();
    body.extend_from_slice(&vec![0x42u8; 1024]);
    phone.send_message(
        VIDEO,
        ControlMessageId::MediaDataWithTimestamp as u16,
        &body,
        true,
    );

    assert!(wait_until(Duration::from_secs(2), || !record
        .lock()
        .unwrap()
        .media
        .is_empty()));
    let media = record.lock().unwrap();
    let (channel, timestamp, data) = &media.media[0];
    assert_eq!(*channel, VIDEO);
    assert_eq!(*timestamp, 0xDEAD_BEEF);
    assert_eq!(data.len(), 1024);
}

#[test]
fn fragmented_audio_payload_reassembles_to_one_callback() {
    let (_server, mut phone, record) = start_pair();
    phone.run_handshake();
    phone.open_channel(AUDIO, MessageStatus::Ok);

    // 40,000-byte message: code + timestamp + payload, split 16384 +
    // 16384 + 7232 across three frames.
    let data: Vec<u8> = (0..39_990u32).map(|i| (i % 251) as u8).collect();
    let mut message = Vec::with_capacity(40_000);
    message.extend_from_slice(&(ControlMessageId::MediaDataWithTimestamp as u16).to_be_bytes());
    message.extend_from_slice(&0x1234_5678u64.to_be_bytes());
    message.extend_from_slice(&data);
    assert_eq!(message.len(), 40_000);

    let fragments = FakePhone::fragment_plain(AUDIO, &message);
    assert_eq!(fragments.len(), 3);
    assert_eq!(fragments[0].plaintext.len(), 16_384);
    assert_eq!(fragments[2].plaintext.len(), 7_232);
    assert_eq!(fragments[0].total, Some(40_000));
    for fragment in &fragments {
        phone.send_fragment(fragment);
    }

    assert!(wait_until(Duration::from_secs(2), || !record
        .lock()
        .unwrap()
        .media
        .is_empty()));
    let media = record.lock().unwrap();
    assert_eq!(media.media.len(), 1, "exactly one callback for the message");
    let (channel, timestamp, received) = &media.media[0];
    assert_eq!(*channel, AUDIO);
    assert_eq!(*timestamp, 0x1234_5678);
    assert_eq!(received, &data);
}

#[test]
fn interleaved_channels_preserve_per_channel_order() {
    let (_server, mut phone, record) = start_pair();
    phone.run_handshake();
    phone.open_channel(AUDIO, MessageStatus::Ok);
    phone.open_channel(AUDIO1, MessageStatus::Ok);

    let payload_a: Vec<u8> = vec![0xAA; 20_000];
    let payload_b: Vec<u8> = vec![0xBB; 20_000];

    let mut message_a =
        (ControlMessageId::MediaDataWithTimestamp as u16).to_be_bytes().to_vec();
    message_a.extend_from_slice(&1u64.to_be_bytes());
    message_a.extend_from_slice(&payload_a);
    let mut message_b =
        (ControlMessageId::MediaDataWithTimestamp as u16).to_be_bytes().to_vec();
    message_b.extend_from_slice(&2u64.to_be_bytes());
    message_b.extend_from_slice(&payload_b);

    // Interleave fragments of the two streams on the wire.
    let fragments_a = FakePhone::fragment_plain(AUDIO, &message_a);
    let fragments_b = FakePhone::fragment_plain(AUDIO1, &message_b);
    phone.send_fragment(&fragments_a[0]);
    phone.send_fragment(&fragments_b[0]);
    phone.send_fragment(&fragments_a[1]);
    phone.send_fragment(&fragments_b[1]);

    assert!(wait_until(Duration::from_secs(2), || record
        .lock()
        .unwrap()
        .media
        .len()
        == 2));
    let media = record.lock().unwrap();
    let audio = media.media.iter().find(|(c, _, _)| *c == AUDIO).unwrap();
    let aux = media.media.iter().find(|(c, _, _)| *c == AUDIO1).unwrap();
    assert_eq!(audio.2, payload_a);
    assert_eq!(aux.2, payload_b);
}

#[test]
fn ping_echoes_timestamp_promptly() {
    let (_server, mut phone, _record) = start_pair();
    phone.run_handshake();

    let sent_at = Instant::now();
    let request = PingRequest {
        timestamp: 0x00C0_FFEE,
    };
    phone.send_message(
        CTRL,
        ControlMessageId::PingRequest as u16,
        &request.encode_to_vec(),
        true,
    );

    let (channel, code, body) = phone.expect_message();
    assert!(sent_at.elapsed() < Duration::from_millis(200), "ping too slow");
    assert_eq!(channel, CTRL);
    assert_eq!(code, ControlMessageId::PingResponse as u16);
    let response = PingResponse::decode(body.as_slice()).unwrap();
    assert_eq!(response.timestamp, 0x00C0_FFEE);
}

#[test]
fn shutdown_request_stops_the_connection_once() {
    let (mut server, mut phone, record) = start_pair();
    phone.run_handshake();

    phone.send_message(
        CTRL,
        ControlMessageId::ShutdownRequest as u16,
        &ShutdownRequest { reason: 0 }.encode_to_vec(),
        true,
    );

    let (channel, code, _body) = phone.expect_message();
    assert_eq!(channel, CTRL);
    assert_eq!(code, ControlMessageId::ShutdownResponse as u16);

    assert!(wait_until(Duration::from_secs(2), || server.state()
        == LinkState::Stopped));
    assert_eq!(record.lock().unwrap().disconnects, 1);

    // Idempotent stop: no second disconnect, state stays terminal.
    server.stop();
    server.stop();
    assert_eq!(server.state(), LinkState::Stopped);
    assert_eq!(record.lock().unwrap().disconnects, 1);
}

#[test]
fn unadvertised_channel_open_is_refused() {
    let mut config = LinkConfig::default();
    config.services.video = false;
    let (_server, mut phone, record) = start_pair_with(config);
    phone.run_handshake();

    phone.open_channel(VIDEO, MessageStatus::Fail);

    // Media data on the refused channel is dropped silently.
    let mut body = 7u64.to_be_bytes().to_vec();
    body.extend_from_slice(&[1, 2, 3, 4]);
    phone.send_message(
        VIDEO,
        ControlMessageId::MediaDataWithTimestamp as u16,
        &body,
        true,
    );

    // Ping still answered: the connection survived.
    phone.send_message(
        CTRL,
        ControlMessageId::PingRequest as u16,
        &PingRequest { timestamp: 5 }.encode_to_vec(),
        true,
    );
    let (_, code, _) = phone.expect_message();
    assert_eq!(code, ControlMessageId::PingResponse as u16);
    assert!(record.lock().unwrap().media.is_empty());
}

#[test]
fn embedder_stop_tears_down_cleanly() {
    let (mut server, mut phone, record) = start_pair();
    phone.run_handshake();
    assert!(wait_until(Duration::from_secs(2), || server.state()
        == LinkState::Started));

    server.stop();
    assert_eq!(server.state(), LinkState::Stopped);
    assert_eq!(record.lock().unwrap().disconnects, 1);

    // The goodbye reaches the phone before the stream closes.
    let (channel, code, _body) = phone.expect_message();
    assert_eq!(channel, CTRL);
    assert_eq!(code, ControlMessageId::ShutdownRequest as u16);
}
