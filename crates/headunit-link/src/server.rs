use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

use headunit_transport::{
    poll_readable, Pipe, TcpTransport, Transport, TransportError, TransportKind, UsbTransport,
};
use tracing::{debug, error, info, warn};

use crate::callbacks::EventCallbacks;
use crate::command::{LinkCommand, LinkHandle};
use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::session::LinkSession;
use crate::state::{LinkState, StateCell};

/// The head-unit side of one phone connection.
///
/// `start` opens the transport and spawns the dedicated I/O thread that
/// owns all connection state. Producers talk to the running connection
/// through the [`LinkHandle`] it returns. `stop` is idempotent and joins
/// the thread.
pub struct HeadUnit {
    state: Arc<StateCell>,
    quit: Arc<AtomicBool>,
    wake: Arc<Pipe>,
    tx: mpsc::Sender<LinkCommand>,
    rx: Option<mpsc::Receiver<LinkCommand>>,
    config: Option<LinkConfig>,
    callbacks: Option<Box<dyn EventCallbacks>>,
    thread: Option<JoinHandle<()>>,
}

impl HeadUnit {
    pub fn new(config: LinkConfig, callbacks: Box<dyn EventCallbacks>) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        Ok(Self {
            state: Arc::new(StateCell::new()),
            quit: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Pipe::wake()?),
            tx,
            rx: Some(rx),
            config: Some(config),
            callbacks: Some(callbacks),
            thread: None,
        })
    }

    pub fn state(&self) -> LinkState {
        self.state.get()
    }

    /// A cloneable any-thread handle into this connection.
    pub fn handle(&self) -> LinkHandle {
        LinkHandle::new(
            self.tx.clone(),
            Arc::clone(&self.wake),
            Arc::clone(&self.state),
            Arc::clone(&self.quit),
        )
    }

    /// Open a connection over the named transport family. `phone_ip` is
    /// required for Wi-Fi; USB enumerates attached devices.
    pub fn start(
        &mut self,
        kind: TransportKind,
        phone_ip: Option<IpAddr>,
        wait_for_device: bool,
    ) -> Result<LinkHandle> {
        let transport: Box<dyn Transport> = match kind {
            TransportKind::Usb => Box::new(UsbTransport::new()),
            TransportKind::Wifi => {
                let ip = phone_ip.ok_or_else(|| {
                    LinkError::Protocol("wifi transport requires a phone address".into())
                })?;
                Box::new(TcpTransport::new(ip))
            }
        };
        self.start_with_transport(transport, wait_for_device)
    }

    /// Open a connection over a caller-supplied transport.
    pub fn start_with_transport(
        &mut self,
        mut transport: Box<dyn Transport>,
        wait_for_device: bool,
    ) -> Result<LinkHandle> {
        if self.state.get() != LinkState::Initial {
            return Err(LinkError::InvalidState(self.state.get()));
        }
        self.state.advance(LinkState::Starting);

        if let Err(err) = transport.start(wait_for_device) {
            error!(%err, "transport start failed");
            self.state.advance(LinkState::Stopped);
            if let Some(mut callbacks) = self.callbacks.take() {
                callbacks.disconnection_or_error();
            }
            return Err(err.into());
        }

        let config = self
            .config
            .take()
            .ok_or(LinkError::InvalidState(self.state.get()))?;
        let callbacks = self
            .callbacks
            .take()
            .ok_or(LinkError::InvalidState(self.state.get()))?;
        let rx = self
            .rx
            .take()
            .ok_or(LinkError::InvalidState(self.state.get()))?;

        let session = match LinkSession::new(
            config,
            transport,
            callbacks,
            Arc::clone(&self.state),
            Arc::clone(&self.quit),
        ) {
            Ok(session) => session,
            Err(err) => {
                self.state.advance(LinkState::Stopped);
                return Err(err);
            }
        };

        let wake = Arc::clone(&self.wake);
        let quit = Arc::clone(&self.quit);
        let state = Arc::clone(&self.state);
        let thread = std::thread::Builder::new()
            .name("hu-io".into())
            .spawn(move || io_thread_main(session, rx, wake, quit, state))
            .map_err(|err| LinkError::Transport(TransportError::Io(err)))?;
        self.thread = Some(thread);

        info!("connection starting");
        Ok(self.handle())
    }

    /// Stop the connection: goodbye to the phone when still up, signal
    /// the I/O thread, join it. Safe to call repeatedly and from any
    /// thread that owns the server.
    pub fn stop(&mut self) {
        if self.thread.is_some() && self.state.get() == LinkState::Started {
            let _ = self.handle().queue(|session| session.send_shutdown_goodbye());
        }
        self.quit.store(true, Ordering::SeqCst);
        self.wake.notify();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        // A connection that never started has no thread to move the state.
        self.state.advance(LinkState::Stopped);
    }
}

impl Drop for HeadUnit {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The I/O thread: single owner of the session. Wakes on transport
/// readability, the command self-pipe, or the nearest delayed-command
/// deadline, whichever comes first.
fn io_thread_main(
    mut session: LinkSession,
    rx: mpsc::Receiver<LinkCommand>,
    wake: Arc<Pipe>,
    quit: Arc<AtomicBool>,
    state: Arc<StateCell>,
) {
    let mut fatal: Option<LinkError> = None;

    if let Err(err) = session.send_version_request() {
        error!(%err, "version request failed");
        fatal = Some(err);
    }

    while fatal.is_none() && !quit.load(Ordering::SeqCst) {
        let mut timeout = session.config().recv_timeout;
        if let Some(next_delayed) = session.run_due_delayed() {
            timeout = timeout.min(next_delayed);
        }

        let (read_fd, error_fd) = session.transport_fds();
        let mut fds = vec![wake.read_fd()];
        let read_index = read_fd.map(|fd| {
            fds.push(fd);
            fds.len() - 1
        });
        let error_index = error_fd.map(|fd| {
            fds.push(fd);
            fds.len() - 1
        });

        let events = match poll_readable(&fds, Some(timeout)) {
            Ok(events) => events,
            Err(err) => {
                fatal = Some(err.into());
                break;
            }
        };

        if events[0].readable {
            wake.drain();
        }

        // Commands run in FIFO order, from every producer thread.
        while let Ok(command) = rx.try_recv() {
            command(&mut session);
        }
        if quit.load(Ordering::SeqCst) {
            break;
        }

        if let Some(index) = error_index {
            if events[index].readable || events[index].hangup {
                fatal = Some(LinkError::Transport(TransportError::Closed));
                break;
            }
        }

        let transport_ready = read_index
            .map(|index| events[index].readable || events[index].hangup)
            .unwrap_or(false);
        if transport_ready {
            if let Err(err) = session.recv_process() {
                if err.is_fatal() || session.state() == LinkState::Starting {
                    fatal = Some(err);
                    break;
                }
                warn!(%err, "recoverable receive error");
            }
        }
    }

    if let Some(err) = &fatal {
        error!(%err, "connection tearing down");
    }
    state.advance(LinkState::Stopping);

    // Drain whatever producers managed to queue before the stop signal.
    while let Ok(command) = rx.try_recv() {
        command(&mut session);
    }

    session.shutdown_transport();
    state.advance(LinkState::Stopped);
    session.callbacks.disconnection_or_error();
    debug!("io thread exit");
}
