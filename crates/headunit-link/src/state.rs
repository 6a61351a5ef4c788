use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Connection lifecycle.
///
/// States advance one way through the sequence; STOPPED is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LinkState {
    Initial = 0,
    Starting = 1,
    Started = 2,
    Stopping = 3,
    Stopped = 4,
}

impl LinkState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LinkState::Initial,
            1 => LinkState::Starting,
            2 => LinkState::Started,
            3 => LinkState::Stopping,
            _ => LinkState::Stopped,
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::Initial => "INITIAL",
            LinkState::Starting => "STARTING",
            LinkState::Started => "STARTED",
            LinkState::Stopping => "STOPPING",
            LinkState::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

/// The one piece of state shared across threads besides the command
/// queue: a monotonic connection-state atomic.
#[derive(Debug, Default)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(LinkState::Initial as u8))
    }

    pub fn get(&self) -> LinkState {
        LinkState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Move forward to `to`. Returns false (and leaves the state alone)
    /// if the connection already is at or past `to` — the state machine
    /// never moves backwards.
    pub fn advance(&self, to: LinkState) -> bool {
        let mut current = self.0.load(Ordering::SeqCst);
        loop {
            if current >= to as u8 {
                return false;
            }
            match self.0.compare_exchange_weak(
                current,
                to as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_forward_only() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), LinkState::Initial);

        assert!(cell.advance(LinkState::Starting));
        assert!(cell.advance(LinkState::Started));
        assert_eq!(cell.get(), LinkState::Started);

        // No going back.
        assert!(!cell.advance(LinkState::Starting));
        assert_eq!(cell.get(), LinkState::Started);
    }

    #[test]
    fn stopped_is_terminal() {
        let cell = StateCell::new();
        assert!(cell.advance(LinkState::Stopped));
        assert!(!cell.advance(LinkState::Stopping));
        assert!(!cell.advance(LinkState::Stopped));
        assert_eq!(cell.get(), LinkState::Stopped);
    }

    #[test]
    fn skipping_intermediate_states_is_forward() {
        // Transport failure during STARTING lands directly in STOPPED.
        let cell = StateCell::new();
        assert!(cell.advance(LinkState::Starting));
        assert!(cell.advance(LinkState::Stopped));
        assert_eq!(cell.get(), LinkState::Stopped);
    }

    #[test]
    fn display_names() {
        assert_eq!(LinkState::Starting.to_string(), "STARTING");
        assert_eq!(LinkState::Stopped.to_string(), "STOPPED");
    }
}
