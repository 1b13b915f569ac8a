use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event as CtEvent, KeyCode, KeyEvent,
    KeyEventKind, KeyModifiers, MouseEventKind,
};
use crossterm::execute;
use tracing::trace;

use crate::config::ResponseMode;

/// Unified event type consumed by the experiment driver
#[derive(Clone, Debug)]
pub enum NbackEvent {
    Key(KeyEvent),
    /// Mouse button pressed
    Pointer,
    Resize,
    Tick,
    /// The input source went away; the session is being torn down
    Closed,
}

impl NbackEvent {
    /// Esc or ctrl+c ends the session.
    pub fn is_abort(&self) -> bool {
        match self {
            NbackEvent::Closed => true,
            NbackEvent::Key(key) => {
                key.code == KeyCode::Esc
                    || (key.modifiers.contains(KeyModifiers::CONTROL)
                        && key.code == KeyCode::Char('c'))
            }
            _ => false,
        }
    }
}

/// Per-trial allow-list of response inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputFilter {
    pub keys: &'static [char],
    pub pointer: bool,
}

impl InputFilter {
    pub const NONE: InputFilter = InputFilter {
        keys: &[],
        pointer: false,
    };

    pub fn for_response_mode(mode: ResponseMode) -> Self {
        Self {
            keys: if mode.allows_keyboard() { &[' '] } else { &[] },
            pointer: mode.allows_pointer(),
        }
    }

    pub fn accepts(&self, ev: &NbackEvent) -> Option<ResponseInput> {
        match ev {
            NbackEvent::Key(key) => match key.code {
                KeyCode::Char(c) if self.keys.contains(&c) => Some(ResponseInput::Key(c)),
                _ => None,
            },
            NbackEvent::Pointer if self.pointer => Some(ResponseInput::Pointer),
            _ => None,
        }
    }
}

/// A qualifying participant response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseInput {
    Key(char),
    Pointer,
}

/// Source of terminal events (keyboard, mouse, resize)
pub trait EventSource {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<NbackEvent, RecvTimeoutError>;

    /// Start delivering the inputs `filter` allows.
    fn attach(&self, _filter: &InputFilter) -> io::Result<()> {
        Ok(())
    }

    /// Stop delivering response inputs.
    fn detach(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    rx: Receiver<NbackEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let ev = match event::read() {
                Ok(CtEvent::Key(key)) if key.kind == KeyEventKind::Press => NbackEvent::Key(key),
                Ok(CtEvent::Mouse(m)) if matches!(m.kind, MouseEventKind::Down(_)) => {
                    NbackEvent::Pointer
                }
                Ok(CtEvent::Resize(_, _)) => NbackEvent::Resize,
                Ok(_) => continue,
                Err(_) => break,
            };
            if tx.send(ev).is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<NbackEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    fn attach(&self, filter: &InputFilter) -> io::Result<()> {
        if filter.pointer {
            execute!(io::stdout(), EnableMouseCapture)?;
        }
        Ok(())
    }

    fn detach(&self) -> io::Result<()> {
        execute!(io::stdout(), DisableMouseCapture)
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<NbackEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<NbackEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<NbackEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Suspends the driver until the next event or timer expiry
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    pub fn source(&self) -> &E {
        &self.event_source
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> NbackEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) => NbackEvent::Tick,
            Err(RecvTimeoutError::Disconnected) => NbackEvent::Closed,
        }
    }

    /// Waits for an event until `deadline`; `None` means the deadline passed.
    pub fn next_before(&self, deadline: Instant) -> Option<NbackEvent> {
        let timeout = deadline.saturating_duration_since(Instant::now());
        match self.event_source.recv_timeout(timeout) {
            Ok(ev) => Some(ev),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(NbackEvent::Closed),
        }
    }
}

/// Scoped input listener: attached on creation, detached when dropped.
pub struct ListenerGuard<'a, E: EventSource> {
    source: &'a E,
    filter: InputFilter,
}

impl<'a, E: EventSource> ListenerGuard<'a, E> {
    pub fn attach(source: &'a E, filter: InputFilter) -> io::Result<Self> {
        source.attach(&filter)?;
        trace!(?filter, "input listener attached");
        Ok(Self { source, filter })
    }

    pub fn classify(&self, ev: &NbackEvent) -> Option<ResponseInput> {
        self.filter.accepts(ev)
    }
}

impl<E: EventSource> Drop for ListenerGuard<'_, E> {
    fn drop(&mut self) {
        let _ = self.source.detach();
        trace!("input listener detached");
    }
}
