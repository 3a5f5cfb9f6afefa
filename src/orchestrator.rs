use crate::collaborators::{
    FocusOptions, HighlightFocus, NoFocus, NoopObserver, SessionNotice, SessionObserver,
};
use crate::error::SessionError;
use crate::plan::PracticePlan;
use crate::session::{SessionOutcome, SessionSnapshot, SessionState};
use crate::timer::TimerEvent;
use log::{debug, info, warn};

/// Sequences the sections of a plan, one countdown at a time.
///
/// At most one session exists per orchestrator. It lives in `session` and
/// owns the only live timer; starting another run drops the previous state
/// (and with it the previous timer) before the new one is built.
#[derive(Debug)]
pub struct SessionOrchestrator<O: SessionObserver = NoopObserver, F: HighlightFocus = NoFocus> {
    session: Option<SessionState>,
    observer: O,
    focus: F,
    sections_started: u64,
}

impl SessionOrchestrator {
    /// An orchestrator that nobody listens to
    pub fn headless() -> Self {
        Self::new(NoopObserver, NoFocus)
    }
}

impl<O: SessionObserver, F: HighlightFocus> SessionOrchestrator<O, F> {
    pub fn new(observer: O, focus: F) -> Self {
        Self {
            session: None,
            observer,
            focus,
            sections_started: 0,
        }
    }

    /// Start running `plan` from its first section, replacing any session in progress
    pub fn start(&mut self, plan: PracticePlan) -> Result<(), SessionError> {
        if plan.sections.is_empty() {
            warn!("refusing to start '{}': no sections", plan.name);
            return Err(SessionError::EmptyPlan);
        }

        if let Some(mut previous) = self.session.take() {
            info!(
                "discarding running session '{}' at section {}",
                previous.plan.name,
                previous.current_section_index + 1
            );
            previous.timer.destroy();
        }

        info!(
            "starting session '{}' ({} sections, ~{} min)",
            plan.name, plan.total_sections, plan.estimated_time_minutes
        );
        let mut state = SessionState::new(plan);
        state.start_current_section();
        self.session = Some(state);
        self.enter_current_section();
        Ok(())
    }

    /// One turn of the event loop: let the timer flush deferred work and
    /// react to whatever it queued.
    pub fn pump(&mut self) {
        let events = match self.session.as_mut() {
            Some(state) => {
                state.timer.poll();
                state.timer.drain_events()
            }
            None => return,
        };

        for event in events {
            if self.handle_timer_event(event) {
                // the timer that queued the rest of the batch is gone
                break;
            }
        }
    }

    /// One second of wall time has passed
    pub fn tick(&mut self) {
        if let Some(state) = self.session.as_mut() {
            state.timer.tick();
        }
        self.pump();
    }

    pub fn toggle_pause(&mut self) {
        match self.session.as_mut() {
            Some(state) => {
                state.timer.toggle_pause();
            }
            None => debug!("toggle_pause ignored: no active session"),
        }
        self.pump();
    }

    /// Skip the rest of the current section
    pub fn skip(&mut self) {
        match self.session.as_mut() {
            Some(state) => {
                state.timer.manual_advance();
            }
            None => debug!("skip ignored: no active session"),
        }
        self.pump();
    }

    /// Abandon the session wherever it is
    pub fn exit(&mut self) {
        match self.session.as_mut() {
            Some(state) => state.timer.stop(),
            None => debug!("exit ignored: no active session"),
        }
        self.pump();
    }

    /// Attach operator notes to the section being worked. Returns false when
    /// there is no session or the text is blank.
    pub fn record_section_note(&mut self, text: &str) -> bool {
        let text = text.trim();
        let Some(state) = self.session.as_mut() else {
            debug!("note ignored: no active session");
            return false;
        };
        if text.is_empty() {
            return false;
        }

        state
            .section_notes
            .entry(state.current_section_index)
            .and_modify(|existing| {
                existing.push('\n');
                existing.push_str(text);
            })
            .or_insert_with(|| text.to_string());
        true
    }

    /// Move on to the next section, or wrap the session up after the last one
    pub fn advance_to_next_section(&mut self) {
        let Some(state) = self.session.as_mut() else {
            debug!("advance ignored: no active session");
            return;
        };

        if state.move_to_next_section() {
            state.start_current_section();
            let new_index = state.current_section_index;
            debug!("advanced to section {}", new_index + 1);
            self.observer
                .notify(&SessionNotice::SectionAdvanced { new_index });
            self.enter_current_section();
        } else {
            let summary = state.summarize(SessionOutcome::Completed);
            self.session = None;
            info!(
                "session '{}' completed in {}s",
                summary.plan_name, summary.elapsed_secs
            );
            self.observer
                .notify(&SessionNotice::SessionCompleted(summary));
            self.leave_focus_mode();
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&SessionState> {
        self.session.as_ref()
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.session.as_ref().map(SessionState::snapshot)
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn focus(&self) -> &F {
        &self.focus
    }

    /// How many section countdowns have begun over this orchestrator's life
    pub fn sections_started(&self) -> u64 {
        self.sections_started
    }

    /// Returns true when the event retired the timer that produced it
    fn handle_timer_event(&mut self, event: TimerEvent) -> bool {
        match event {
            TimerEvent::Tick { remaining_secs } => {
                self.observer.notify(&SessionNotice::Tick { remaining_secs });
                false
            }
            TimerEvent::PauseChanged { paused } => {
                if let Some(state) = self.session.as_mut() {
                    state.is_paused = paused;
                    state.is_running = !paused;
                }
                self.observer.notify(&SessionNotice::PauseChanged { paused });
                false
            }
            TimerEvent::Completed | TimerEvent::Advanced => {
                self.advance_to_next_section();
                true
            }
            TimerEvent::Exited => {
                self.end_exited();
                true
            }
        }
    }

    fn end_exited(&mut self) {
        let Some(state) = self.session.take() else {
            return;
        };
        let summary = state.summarize(SessionOutcome::Exited);
        drop(state);

        info!(
            "session '{}' exited after {} of {} sections",
            summary.plan_name, summary.sections_completed, summary.total_sections
        );
        self.observer.notify(&SessionNotice::SessionExited(summary));
        self.leave_focus_mode();
    }

    fn enter_current_section(&mut self) {
        let Some(state) = self.session.as_ref() else {
            return;
        };
        let snapshot = state.snapshot();
        self.sections_started += 1;
        let options = FocusOptions {
            section_index: snapshot.section_index,
            total_sections: snapshot.total_sections,
            scroll_into_view: true,
        };

        if let Err(e) = self.focus.focus_on_highlight(&snapshot.highlight_id, &options) {
            warn!("could not focus highlight {}: {e}", snapshot.highlight_id);
        }
        self.observer.notify(&SessionNotice::SectionStarted(snapshot));
    }

    fn leave_focus_mode(&mut self) {
        if let Err(e) = self.focus.exit_focus_mode() {
            warn!("could not exit focus mode: {e}");
        }
    }
}
