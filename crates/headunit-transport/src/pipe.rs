use std::io::{Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use crate::error::{Result, TransportError};

/// An anonymous pipe.
///
/// Two uses in this crate and above it: the wake pipe coalesced with the
/// transport descriptor in the connection poll loop, and the data pipe the
/// USB bulk pump feeds so the core has a pollable read descriptor.
pub struct Pipe {
    read: OwnedFd,
    write: OwnedFd,
}

impl Pipe {
    /// Create a blocking pipe pair.
    pub fn new() -> Result<Self> {
        Self::create(libc::O_CLOEXEC)
    }

    /// Create a wake pipe: both ends non-blocking, so `notify` on a full
    /// pipe and `drain` on an empty one return immediately.
    pub fn wake() -> Result<Self> {
        Self::create(libc::O_CLOEXEC | libc::O_NONBLOCK)
    }

    fn create(flags: libc::c_int) -> Result<Self> {
        let mut fds = [0 as libc::c_int; 2];
        // SAFETY: `fds` is a valid writable array of two ints.
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), flags) };
        if rc != 0 {
            return Err(TransportError::Io(std::io::Error::last_os_error()));
        }
        // SAFETY: pipe2 succeeded, so both descriptors are open and owned
        // by this process only.
        unsafe {
            Ok(Self {
                read: OwnedFd::from_raw_fd(fds[0]),
                write: OwnedFd::from_raw_fd(fds[1]),
            })
        }
    }

    pub fn read_fd(&self) -> RawFd {
        self.read.as_raw_fd()
    }

    /// Write one byte to wake a poller. A full pipe already wakes the
    /// poller, so EAGAIN is success.
    pub fn notify(&self) {
        let buf = [1u8];
        // SAFETY: writes a single byte from a valid buffer to an fd we own.
        let rc = unsafe { libc::write(self.write.as_raw_fd(), buf.as_ptr().cast(), 1) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() != std::io::ErrorKind::WouldBlock {
                tracing::warn!(%err, "wake pipe write failed");
            }
        }
    }

    /// Consume all pending wake bytes. Only meaningful on a wake pipe.
    pub fn drain(&self) {
        let mut buf = [0u8; 64];
        loop {
            // SAFETY: reads into a valid buffer from an fd we own.
            let rc = unsafe {
                libc::read(self.read.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len())
            };
            if rc <= 0 {
                return;
            }
        }
    }

    /// Split into separately owned ends (reader for the poll loop, writer
    /// for a pump thread). Dropping the writer delivers EOF to the reader.
    pub fn into_parts(self) -> (PipeReader, PipeWriter) {
        (PipeReader(self.read), PipeWriter(self.write))
    }
}

/// Owned read end of a [`Pipe`].
pub struct PipeReader(OwnedFd);

impl PipeReader {
    pub fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        // SAFETY: reads into the caller's buffer from an fd we own.
        let rc = unsafe { libc::read(self.0.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };
        if rc < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(rc as usize)
    }
}

/// Owned write end of a [`Pipe`].
pub struct PipeWriter(OwnedFd);

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        // SAFETY: writes from the caller's buffer to an fd we own.
        let rc = unsafe { libc::write(self.0.as_raw_fd(), buf.as_ptr().cast(), buf.len()) };
        if rc < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(rc as usize)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_and_drain() {
        let pipe = Pipe::wake().unwrap();
        pipe.notify();
        pipe.notify();
        pipe.drain();

        // Drained pipe is no longer readable.
        let ready =
            crate::poll::poll_readable(&[pipe.read_fd()], Some(std::time::Duration::from_millis(10)))
                .unwrap();
        assert!(!ready[0].readable);
    }

    #[test]
    fn split_ends_carry_data_and_eof() {
        let (mut reader, mut writer) = Pipe::new().unwrap().into_parts();
        writer.write_all(b"bulk").unwrap();

        let mut buf = [0u8; 8];
        let n = reader.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"bulk");

        drop(writer);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn full_wake_pipe_does_not_block() {
        let pipe = Pipe::wake().unwrap();
        for _ in 0..100_000 {
            pipe.notify();
        }
        pipe.drain();
    }
}
