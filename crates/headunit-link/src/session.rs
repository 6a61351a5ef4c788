use std::os::fd::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use headunit_frame::channel::CTRL;
use headunit_frame::{
    channel_name, decode_frame, encode_frame, split_message, Assembler, Frame, FrameError,
    FrameFlags, MAX_FRAME_PAYLOAD, MAX_WIRE_FRAME,
};
use headunit_proto::codes::{is_control_code, InitMessageId};
use headunit_transport::{Transport, TransportError};
use prost::Message;
use tracing::{debug, trace, warn};

use crate::callbacks::EventCallbacks;
use crate::channels::ChannelTable;
use crate::command::LinkCommand;
use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::ssl::SslSession;
use crate::state::{LinkState, StateCell};

/// The thread-confined half of a connection.
///
/// Owned by the I/O thread: the TLS engine, the reassembly buffers, the
/// channel table, and the transport all live here and are never touched
/// from any other thread. Commands posted through
/// [`LinkHandle`](crate::LinkHandle) receive `&mut LinkSession`.
pub struct LinkSession {
    pub(crate) config: LinkConfig,
    transport: Box<dyn Transport>,
    ssl: SslSession,
    assembler: Assembler,
    pub(crate) channels: ChannelTable,
    pub(crate) callbacks: Box<dyn EventCallbacks>,
    pub(crate) state: Arc<StateCell>,
    pub(crate) quit: Arc<AtomicBool>,
    rx_buf: BytesMut,
    pub(crate) version_ok: bool,
    pub(crate) auth_complete_sent: bool,
    delayed: Vec<(Instant, LinkCommand)>,
}

impl LinkSession {
    pub(crate) fn new(
        config: LinkConfig,
        transport: Box<dyn Transport>,
        callbacks: Box<dyn EventCallbacks>,
        state: Arc<StateCell>,
        quit: Arc<AtomicBool>,
    ) -> Result<Self> {
        let ssl = SslSession::new(&config.ssl)?;
        Ok(Self {
            config,
            transport,
            ssl,
            assembler: Assembler::new(),
            channels: ChannelTable::new(),
            callbacks,
            state,
            quit,
            rx_buf: BytesMut::with_capacity(MAX_WIRE_FRAME * 2),
            version_ok: false,
            auth_complete_sent: false,
            delayed: Vec::new(),
        })
    }

    pub fn state(&self) -> LinkState {
        self.state.get()
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Ask the connection to wind down after the current loop iteration.
    pub fn request_stop(&mut self) {
        self.quit.store(true, Ordering::SeqCst);
    }

    pub(crate) fn transport_fds(&self) -> (Option<RawFd>, Option<RawFd>) {
        (self.transport.read_fd(), self.transport.error_fd())
    }

    /// One handshake turn: feed the phone's ciphertext in, pull the next
    /// outbound flight, report whether the session is established.
    pub(crate) fn ssl_handshake_step(&mut self, incoming: &[u8]) -> Result<(Vec<u8>, bool)> {
        if !incoming.is_empty() {
            self.ssl.read_ciphertext(incoming)?;
        }
        let out = self.ssl.drain_ciphertext()?;
        Ok((out, self.ssl.is_established()))
    }

    // --- outbound ---------------------------------------------------------

    /// The very first message after transport start: plain-text version
    /// request with the supported protocol version pair.
    pub(crate) fn send_version_request(&mut self) -> Result<()> {
        let (major, minor) = self.config.version;
        let mut body = Vec::with_capacity(4);
        body.extend_from_slice(&major.to_be_bytes());
        body.extend_from_slice(&minor.to_be_bytes());
        self.send_unencrypted_blob(0, CTRL, InitMessageId::VersionRequest as u16, &body)
    }

    /// Send raw bytes unencrypted. Only meaningful on channel 0 during
    /// the init phase.
    pub fn send_unencrypted_blob(
        &mut self,
        retry: u32,
        channel: u8,
        code: u16,
        data: &[u8],
    ) -> Result<()> {
        let mut payload = Vec::with_capacity(2 + data.len());
        payload.extend_from_slice(&code.to_be_bytes());
        payload.extend_from_slice(data);

        let extra = if is_control_code(code) {
            FrameFlags::CONTROL
        } else {
            0
        };
        for frame in split_message(channel, extra, &payload) {
            self.write_frame(retry, &frame)?;
        }
        Ok(())
    }

    /// Serialize and send a message unencrypted.
    pub fn send_unencrypted_message<M: Message>(
        &mut self,
        retry: u32,
        channel: u8,
        code: u16,
        message: &M,
    ) -> Result<()> {
        self.send_unencrypted_blob(retry, channel, code, &message.encode_to_vec())
    }

    /// Send raw bytes through the TLS engine. Fails with
    /// [`LinkError::NotOpen`] on a channel the phone has not opened;
    /// channel 0 is always implicitly open.
    pub fn send_encrypted_blob(
        &mut self,
        retry: u32,
        channel: u8,
        code: u16,
        data: &[u8],
    ) -> Result<()> {
        if channel != CTRL && !self.channels.is_open(channel) {
            return Err(LinkError::NotOpen { channel });
        }
        self.send_encrypted_blob_unchecked(retry, channel, code, data)
    }

    /// Same as [`send_encrypted_blob`](Self::send_encrypted_blob) minus
    /// the open check. Used by handlers that reply on a channel being
    /// opened or declined.
    pub(crate) fn send_encrypted_blob_unchecked(
        &mut self,
        retry: u32,
        channel: u8,
        code: u16,
        data: &[u8],
    ) -> Result<()> {
        let mut payload = Vec::with_capacity(2 + data.len());
        payload.extend_from_slice(&code.to_be_bytes());
        payload.extend_from_slice(data);
        self.send_encrypted_payload(retry, channel, is_control_code(code), &payload)
    }

    /// Serialize and send a message through the TLS engine.
    pub fn send_encrypted_message<M: Message>(
        &mut self,
        retry: u32,
        channel: u8,
        code: u16,
        message: &M,
    ) -> Result<()> {
        self.send_encrypted_blob(retry, channel, code, &message.encode_to_vec())
    }

    /// Send a timestamped media payload through the TLS engine.
    pub fn send_encrypted_media_packet(
        &mut self,
        retry: u32,
        channel: u8,
        code: u16,
        timestamp: u64,
        data: &[u8],
    ) -> Result<()> {
        if channel != CTRL && !self.channels.is_open(channel) {
            return Err(LinkError::NotOpen { channel });
        }
        let mut payload = Vec::with_capacity(10 + data.len());
        payload.extend_from_slice(&code.to_be_bytes());
        payload.extend_from_slice(&timestamp.to_be_bytes());
        payload.extend_from_slice(data);
        self.send_encrypted_payload(retry, channel, false, &payload)
    }

    /// Chunk at the plaintext payload limit, encrypt each chunk as its
    /// own TLS record, and frame the ciphertext. The total-length field
    /// on a first-of-many fragment carries the plaintext total, which is
    /// what reassembly on the far side sees again after decryption.
    fn send_encrypted_payload(
        &mut self,
        retry: u32,
        channel: u8,
        control: bool,
        payload: &[u8],
    ) -> Result<()> {
        let mut extra = FrameFlags::ENCRYPTED;
        if control {
            extra |= FrameFlags::CONTROL;
        }

        if payload.len() <= MAX_FRAME_PAYLOAD {
            let cipher = self.ssl.encrypt(payload)?;
            let frame = Frame::single(channel, extra, cipher);
            return self.write_frame(retry, &frame);
        }

        let total = payload.len() as u32;
        let mut chunks = payload.chunks(MAX_FRAME_PAYLOAD).peekable();
        let mut first = true;
        while let Some(chunk) = chunks.next() {
            let mut flags = FrameFlags(extra);
            if first {
                flags = flags.with(FrameFlags::FIRST);
            }
            if chunks.peek().is_none() {
                flags = flags.with(FrameFlags::LAST);
            }
            let cipher = self.ssl.encrypt(chunk)?;
            let frame = Frame {
                channel,
                flags,
                total: flags.has_total().then_some(total),
                payload: cipher.into(),
            };
            self.write_frame(retry, &frame)?;
            first = false;
        }
        Ok(())
    }

    /// Write one frame, retrying timed-out writes up to `retry` extra
    /// attempts. `retry = 0` means a single attempt.
    fn write_frame(&mut self, retry: u32, frame: &Frame) -> Result<()> {
        let mut wire = BytesMut::new();
        encode_frame(frame, &mut wire)?;

        let mut attempts = 0u32;
        let mut offset = 0usize;
        while offset < wire.len() {
            match self.transport.write(&wire[offset..], self.config.send_timeout) {
                Ok(n) => offset += n,
                Err(TransportError::Timeout) => {
                    attempts += 1;
                    if attempts > retry {
                        return Err(LinkError::Timeout);
                    }
                    trace!(
                        channel = frame.channel,
                        attempts,
                        "send timed out, retrying"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    // --- inbound ----------------------------------------------------------

    /// One bounded transport read, then drain every complete frame out of
    /// the staging buffer. A read timeout returns cleanly; the caller
    /// re-polls. Fatal errors propagate.
    pub(crate) fn recv_process(&mut self) -> Result<()> {
        let mut chunk = [0u8; MAX_WIRE_FRAME];
        match self.transport.read(&mut chunk, self.config.recv_timeout) {
            Ok(n) => self.rx_buf.extend_from_slice(&chunk[..n]),
            Err(TransportError::Timeout) => return Ok(()),
            Err(err) => return Err(err.into()),
        }

        loop {
            match decode_frame(&mut self.rx_buf) {
                Ok(Some(frame)) => self.process_frame(frame)?,
                Ok(None) => break,
                Err(err) => {
                    // A malformed header means the stream lost sync; drop
                    // the staged bytes and resynchronize on fresh input.
                    self.rx_buf.clear();
                    return self.protocol_violation(format!("bad frame header: {err}"));
                }
            }
        }
        Ok(())
    }

    fn process_frame(&mut self, frame: Frame) -> Result<()> {
        trace!(
            channel = channel_name(frame.channel),
            flags = frame.flags.0,
            len = frame.payload.len(),
            "frame in"
        );

        let frame = if frame.flags.encrypted() {
            let plain = self.ssl.decrypt(&frame.payload)?;
            Frame {
                payload: plain.into(),
                ..frame
            }
        } else {
            frame
        };

        let channel = frame.channel;
        match self.assembler.push(&frame) {
            Ok(Some(assembled)) => {
                if let Some(expected) = assembled.expected {
                    if expected as usize != assembled.message.len() {
                        warn!(
                            channel = channel_name(channel),
                            expected,
                            actual = assembled.message.len(),
                            "total-length mismatch on reassembled message"
                        );
                    }
                }
                self.dispatch(channel, assembled.message)
            }
            Ok(None) => Ok(()),
            Err(FrameError::OrphanFragment { channel }) => self.protocol_violation(format!(
                "fragment without FIRST on {}",
                channel_name(channel)
            )),
            Err(err) => Err(err.into()),
        }
    }

    /// Protocol violations are logged and dropped, except during the init
    /// phase, where the peer is clearly broken and continuing is useless.
    pub(crate) fn protocol_violation(&mut self, what: String) -> Result<()> {
        if self.state.get() == LinkState::Starting {
            return Err(LinkError::Protocol(what));
        }
        warn!("{what} (dropped)");
        Ok(())
    }

    // --- delayed commands -------------------------------------------------

    /// Register a command to run on this thread after `delay`.
    pub fn queue_delayed(&mut self, delay: Duration, command: LinkCommand) {
        self.delayed.push((Instant::now() + delay, command));
    }

    /// Run every due delayed command; returns the time until the next
    /// pending one, for the poll-timeout computation.
    pub(crate) fn run_due_delayed(&mut self) -> Option<Duration> {
        let now = Instant::now();
        let mut due = Vec::new();
        let mut index = 0;
        while index < self.delayed.len() {
            if self.delayed[index].0 <= now {
                due.push(self.delayed.remove(index).1);
            } else {
                index += 1;
            }
        }
        for command in due {
            command(self);
        }
        self.delayed
            .iter()
            .map(|(deadline, _)| deadline.saturating_duration_since(now))
            .min()
    }

    // --- teardown ---------------------------------------------------------

    /// Best-effort goodbye to the phone ahead of a locally initiated stop.
    pub(crate) fn send_shutdown_goodbye(&mut self) {
        if self.state.get() != LinkState::Started {
            return;
        }
        let bye = headunit_proto::messages::ShutdownRequest { reason: 1 };
        if let Err(err) = self.send_encrypted_message(
            0,
            CTRL,
            headunit_proto::codes::ControlMessageId::ShutdownRequest as u16,
            &bye,
        ) {
            debug!(%err, "shutdown goodbye not delivered");
        }
    }

    /// Close TLS state, clear reassembly, close the transport.
    pub(crate) fn shutdown_transport(&mut self) {
        self.assembler.clear();
        self.channels.reset();
        if let Err(err) = self.transport.stop() {
            debug!(%err, "transport stop failed");
        }
    }
}
