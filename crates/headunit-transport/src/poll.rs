use std::os::fd::RawFd;
use std::time::Duration;

use crate::error::{Result, TransportError};

/// Readiness of one polled descriptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollEvent {
    /// Data is available to read.
    pub readable: bool,
    /// The peer hung up or the descriptor errored. A subsequent read
    /// observes EOF/error; callers treat this as a closed transport.
    pub hangup: bool,
}

/// Wait until any of `fds` becomes readable, with an optional timeout.
///
/// Returns one [`PollEvent`] per descriptor, in input order. An elapsed
/// timeout yields all-idle events, not an error; EINTR is retried.
pub fn poll_readable(fds: &[RawFd], timeout: Option<Duration>) -> Result<Vec<PollEvent>> {
    let mut pollfds: Vec<libc::pollfd> = fds
        .iter()
        .map(|&fd| libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        })
        .collect();

    let timeout_ms: libc::c_int = match timeout {
        Some(t) => t.as_millis().min(libc::c_int::MAX as u128) as libc::c_int,
        None => -1,
    };

    loop {
        // SAFETY: `pollfds` is a valid array of initialized pollfd structs
        // for the given length.
        let rc = unsafe { libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, timeout_ms) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(TransportError::Io(err));
        }
        break;
    }

    Ok(pollfds
        .iter()
        .map(|p| PollEvent {
            readable: p.revents & libc::POLLIN != 0,
            hangup: p.revents & (libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0,
        })
        .collect())
}
