//! Seams between the session engine and the code around it.
//!
//! Every trait has a do-nothing implementation so the engine can be run
//! with only the pieces a caller cares about.

use crate::error::{FocusError, StoreError};
use crate::plan::{Highlight, PlanId, PracticePlan};
use crate::session::{SessionSnapshot, SessionSummary};

/// Hints passed along when a highlight gains focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusOptions {
    pub section_index: usize,
    pub total_sections: usize,
    pub scroll_into_view: bool,
}

/// Visual aid that brings the current section's score region to the front.
/// Best effort: the orchestrator logs and ignores every failure.
pub trait HighlightFocus {
    fn focus_on_highlight(
        &mut self,
        highlight_id: &str,
        options: &FocusOptions,
    ) -> Result<(), FocusError>;
    fn exit_focus_mode(&mut self) -> Result<(), FocusError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoFocus;

impl HighlightFocus for NoFocus {
    fn focus_on_highlight(
        &mut self,
        _highlight_id: &str,
        _options: &FocusOptions,
    ) -> Result<(), FocusError> {
        Ok(())
    }

    fn exit_focus_mode(&mut self) -> Result<(), FocusError> {
        Ok(())
    }
}

/// Everything the engine announces while a session runs
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    SectionStarted(SessionSnapshot),
    Tick { remaining_secs: u64 },
    PauseChanged { paused: bool },
    SectionAdvanced { new_index: usize },
    SessionCompleted(SessionSummary),
    SessionExited(SessionSummary),
}

pub trait SessionObserver {
    fn notify(&mut self, notice: &SessionNotice);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn notify(&mut self, _notice: &SessionNotice) {}
}

/// Keeps every notice it sees; handy for headless runs and tests
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    pub notices: Vec<SessionNotice>,
}

impl RecordingObserver {
    pub fn count(&self, pred: impl Fn(&SessionNotice) -> bool) -> usize {
        self.notices.iter().filter(|n| pred(n)).count()
    }
}

impl SessionObserver for RecordingObserver {
    fn notify(&mut self, notice: &SessionNotice) {
        self.notices.push(notice.clone());
    }
}

/// Durable home for plans
pub trait PlanPersistence {
    fn save(&self, plan: &PracticePlan) -> Result<PlanId, StoreError>;
    fn update(&self, id: PlanId, plan: &PracticePlan) -> Result<PlanId, StoreError>;
    fn load_plans_for_score(&self, score_id: &str) -> Result<Vec<PracticePlan>, StoreError>;
}

/// Where the highlight records for a score come from
pub trait HighlightSource {
    fn load_highlights(&self, score_id: &str) -> Result<Vec<Highlight>, StoreError>;
}
