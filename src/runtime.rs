use std::cell::Cell;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::debug;

use crate::collaborators::{HighlightFocus, SessionObserver};
use crate::error::SessionError;
use crate::orchestrator::SessionOrchestrator;
use crate::plan::PracticePlan;

/// Operator actions on a running session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionCommand {
    TogglePause,
    Skip,
    Exit,
    Note(String),
}

impl SessionCommand {
    pub fn apply<O: SessionObserver, F: HighlightFocus>(
        self,
        orchestrator: &mut SessionOrchestrator<O, F>,
    ) {
        match self {
            SessionCommand::TogglePause => orchestrator.toggle_pause(),
            SessionCommand::Skip => orchestrator.skip(),
            SessionCommand::Exit => orchestrator.exit(),
            SessionCommand::Note(text) => {
                orchestrator.record_section_note(&text);
            }
        }
    }
}

/// Unified event type consumed by the session loop
#[derive(Clone, Debug)]
pub enum PracticeEvent {
    Key(KeyEvent),
    Command(SessionCommand),
    Resize,
    Tick,
}

/// Source of operator input (keyboard, resize, scripted commands)
pub trait PracticeEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<PracticeEvent, RecvTimeoutError>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    rx: Receiver<PracticeEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            match event::read() {
                Ok(CtEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                    if tx.send(PracticeEvent::Key(key)).is_err() {
                        break;
                    }
                }
                Ok(CtEvent::Resize(_, _)) => {
                    if tx.send(PracticeEvent::Resize).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
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

impl PracticeEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<PracticeEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
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

    pub fn every_second() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<PracticeEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<PracticeEvent>) -> Self {
        Self { rx }
    }
}

impl PracticeEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<PracticeEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Turns key presses into session commands, with a small line editor for notes
#[derive(Debug, Default)]
pub struct Controls {
    note_draft: Option<String>,
}

impl Controls {
    pub fn new() -> Self {
        Self::default()
    }

    /// The note being typed, if note entry is open
    pub fn note_draft(&self) -> Option<&str> {
        self.note_draft.as_deref()
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Option<SessionCommand> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.note_draft = None;
            return Some(SessionCommand::Exit);
        }

        if let Some(draft) = self.note_draft.as_mut() {
            match key.code {
                KeyCode::Enter => {
                    let text = self.note_draft.take().unwrap_or_default();
                    return Some(SessionCommand::Note(text));
                }
                KeyCode::Esc => self.note_draft = None,
                KeyCode::Backspace => {
                    draft.pop();
                }
                KeyCode::Char(c) => draft.push(c),
                _ => {}
            }
            return None;
        }

        match key.code {
            KeyCode::Char(' ') | KeyCode::Char('p') => Some(SessionCommand::TogglePause),
            KeyCode::Char('s') | KeyCode::Right => Some(SessionCommand::Skip),
            KeyCode::Char('q') | KeyCode::Esc => Some(SessionCommand::Exit),
            KeyCode::Char('n') => {
                self.note_draft = Some(String::new());
                None
            }
            _ => None,
        }
    }
}

/// Runner that advances the application one event/tick at a time.
///
/// Ticks are scheduled against deadlines, so a burst of key presses does
/// not stretch the second they arrive in.
pub struct Runner<E: PracticeEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
    next_tick: Cell<Instant>,
}

impl<E: PracticeEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        let next_tick = Cell::new(Instant::now() + ticker.interval());
        Self {
            event_source,
            ticker,
            next_tick,
        }
    }

    /// Restart the tick schedule one full interval from now
    pub fn reset_ticks(&self) {
        self.next_tick.set(Instant::now() + self.ticker.interval());
    }

    /// Start `plan`, settle anything due immediately (zero-length sections),
    /// then arm the ticker for the section that is actually running
    pub fn start_session<O: SessionObserver, F: HighlightFocus>(
        &self,
        orchestrator: &mut SessionOrchestrator<O, F>,
        plan: PracticePlan,
    ) -> Result<(), SessionError> {
        orchestrator.start(plan)?;
        orchestrator.pump();
        self.reset_ticks();
        Ok(())
    }

    /// Blocks until the next event or tick deadline and returns whichever came first
    pub fn step(&self) -> PracticeEvent {
        let deadline = self.next_tick.get();
        let now = Instant::now();

        if now >= deadline {
            self.next_tick.set(deadline + self.ticker.interval());
            return PracticeEvent::Tick;
        }

        match self.event_source.recv_timeout(deadline - now) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) => {
                self.next_tick.set(deadline + self.ticker.interval());
                PracticeEvent::Tick
            }
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
                self.next_tick.set(deadline + self.ticker.interval());
                PracticeEvent::Tick
            }
        }
    }

    /// Take one event and feed it to the orchestrator, then let it settle.
    /// Returns the event that was handled.
    ///
    /// A section started by input rather than by a tick gets a full interval
    /// before its first decrement.
    pub fn drive<O: SessionObserver, F: HighlightFocus>(
        &self,
        orchestrator: &mut SessionOrchestrator<O, F>,
        controls: &mut Controls,
    ) -> PracticeEvent {
        let event = self.step();
        let started_before = orchestrator.sections_started();
        match &event {
            PracticeEvent::Tick => orchestrator.tick(),
            PracticeEvent::Key(key) => {
                if let Some(command) = controls.on_key(*key) {
                    debug!("key {:?} -> {command:?}", key.code);
                    command.apply(orchestrator);
                }
            }
            PracticeEvent::Command(command) => command.clone().apply(orchestrator),
            PracticeEvent::Resize => {}
        }
        orchestrator.pump();
        let restarted = orchestrator.sections_started() != started_before;
        if restarted && !matches!(event, PracticeEvent::Tick) {
            self.reset_ticks();
        }
        event
    }
}
