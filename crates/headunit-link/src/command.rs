use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use headunit_transport::Pipe;
use prost::Message;
use tracing::warn;

use crate::error::{LinkError, Result};
use crate::session::LinkSession;
use crate::state::{LinkState, StateCell};

/// A unit of work executed on the I/O thread. Move-only; owns every
/// buffer it needs. Receives the thread-confined session, which exposes
/// the send primitives. Must not block waiting for a peer reply.
pub type LinkCommand = Box<dyn FnOnce(&mut LinkSession) + Send + 'static>;

/// Cloneable any-thread handle into a running connection.
///
/// All senders serialize onto the I/O thread through a FIFO command
/// queue; a self-pipe wakes the thread out of its transport poll.
#[derive(Clone)]
pub struct LinkHandle {
    tx: mpsc::Sender<LinkCommand>,
    wake: Arc<Pipe>,
    state: Arc<StateCell>,
    quit: Arc<AtomicBool>,
}

impl LinkHandle {
    pub(crate) fn new(
        tx: mpsc::Sender<LinkCommand>,
        wake: Arc<Pipe>,
        state: Arc<StateCell>,
        quit: Arc<AtomicBool>,
    ) -> Self {
        Self {
            tx,
            wake,
            state,
            quit,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state.get()
    }

    /// Enqueue a command for the I/O thread. FIFO with respect to every
    /// other command from any thread.
    pub fn queue(&self, command: impl FnOnce(&mut LinkSession) + Send + 'static) -> Result<()> {
        if self.state.get() >= LinkState::Stopping {
            return Err(LinkError::Stopped);
        }
        self.tx
            .send(Box::new(command))
            .map_err(|_| LinkError::Stopped)?;
        self.wake.notify();
        Ok(())
    }

    /// Enqueue a command that runs after `delay` on the I/O thread.
    pub fn queue_delayed(
        &self,
        delay: Duration,
        command: impl FnOnce(&mut LinkSession) + Send + 'static,
    ) -> Result<()> {
        self.queue(move |session| session.queue_delayed(delay, Box::new(command)))
    }

    /// Serialize `message` now, send it encrypted from the I/O thread.
    pub fn send_encrypted_message<M: Message>(
        &self,
        retry: u32,
        channel: u8,
        code: u16,
        message: &M,
    ) -> Result<()> {
        let body = message.encode_to_vec();
        self.queue(move |session| {
            if let Err(err) = session.send_encrypted_blob(retry, channel, code, &body) {
                warn!(channel, code, %err, "queued encrypted send failed");
            }
        })
    }

    /// Send a timestamped media payload encrypted from the I/O thread.
    pub fn send_encrypted_media_packet(
        &self,
        retry: u32,
        channel: u8,
        code: u16,
        timestamp: u64,
        data: Vec<u8>,
    ) -> Result<()> {
        self.queue(move |session| {
            if let Err(err) =
                session.send_encrypted_media_packet(retry, channel, code, timestamp, &data)
            {
                warn!(channel, code, %err, "queued media send failed");
            }
        })
    }

    /// Send raw bytes unencrypted from the I/O thread (init phase only).
    pub fn send_unencrypted_blob(
        &self,
        retry: u32,
        channel: u8,
        code: u16,
        data: Vec<u8>,
    ) -> Result<()> {
        self.queue(move |session| {
            if let Err(err) = session.send_unencrypted_blob(retry, channel, code, &data) {
                warn!(channel, code, %err, "queued unencrypted send failed");
            }
        })
    }

    /// Serialize `message` now, send it unencrypted from the I/O thread.
    pub fn send_unencrypted_message<M: Message>(
        &self,
        retry: u32,
        channel: u8,
        code: u16,
        message: &M,
    ) -> Result<()> {
        let body = message.encode_to_vec();
        self.send_unencrypted_blob(retry, channel, code, body)
    }

    /// Ask the connection to stop. Idempotent, callable from any thread,
    /// including I/O-thread callbacks.
    pub fn stop(&self) {
        self.quit.store(true, Ordering::SeqCst);
        self.wake.notify();
    }
}
