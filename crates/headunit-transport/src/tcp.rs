use std::io::{ErrorKind, Read, Write};
use std::net::{IpAddr, SocketAddr, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{Transport, TransportKind};

/// The phone listens on this port when head-unit projection over Wi-Fi
/// is enabled.
pub const AA_TCP_PORT: u16 = 5277;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const WAIT_FOR_DEVICE_GRACE: Duration = Duration::from_secs(30);
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// TCP transport towards a phone on the local network.
pub struct TcpTransport {
    addr: SocketAddr,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    /// Target the phone at `ip` on the standard port.
    pub fn new(ip: IpAddr) -> Self {
        Self::with_addr(SocketAddr::new(ip, AA_TCP_PORT))
    }

    /// Target an explicit address (tests, nonstandard ports).
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self { addr, stream: None }
    }

    /// Wrap an already-connected socket, e.g. when the phone connected to
    /// a local listener instead of the head unit dialing out.
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        let addr = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        Ok(Self {
            addr,
            stream: Some(stream),
        })
    }

    fn stream(&mut self) -> Result<&mut TcpStream> {
        self.stream.as_mut().ok_or(TransportError::NotStarted)
    }
}

impl Transport for TcpTransport {
    fn start(&mut self, wait_for_device: bool) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let deadline = Instant::now() + WAIT_FOR_DEVICE_GRACE;
        let stream = loop {
            match TcpStream::connect_timeout(&self.addr, CONNECT_TIMEOUT) {
                Ok(stream) => break stream,
                Err(err)
                    if wait_for_device
                        && Instant::now() < deadline
                        && matches!(
                            err.kind(),
                            ErrorKind::ConnectionRefused
                                | ErrorKind::TimedOut
                                | ErrorKind::AddrNotAvailable
                                | ErrorKind::Other
                        ) =>
                {
                    debug!(addr = %self.addr, %err, "phone not reachable yet, retrying");
                    std::thread::sleep(RETRY_DELAY);
                }
                Err(err) => {
                    return Err(TransportError::Connect {
                        addr: self.addr.to_string(),
                        source: err,
                    })
                }
            }
        };

        stream.set_nodelay(true)?;
        info!(addr = %self.addr, "connected to phone over tcp");
        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
            debug!("tcp transport stopped");
        }
        Ok(())
    }

    fn write(&mut self, buf: &[u8], timeout: Duration) -> Result<usize> {
        let stream = self.stream()?;
        stream.set_write_timeout(Some(timeout))?;
        match stream.write(buf) {
            Ok(0) => Err(TransportError::Closed),
            Ok(n) => Ok(n),
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Err(TransportError::Timeout)
            }
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let stream = self.stream()?;
        stream.set_read_timeout(Some(timeout))?;
        match stream.read(buf) {
            Ok(0) => Err(TransportError::Closed),
            Ok(n) => Ok(n),
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Err(TransportError::Timeout)
            }
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn read_fd(&self) -> Option<RawFd> {
        self.stream.as_ref().map(|s| s.as_raw_fd())
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Wifi
    }
}
