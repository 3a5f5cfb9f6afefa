use crate::plan::{PlanId, PracticeMethod, PracticePlan};
use crate::timer::CountdownTimer;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionOutcome {
    Completed,
    Exited,
}

impl SessionOutcome {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(SessionOutcome::Completed),
            "exited" => Some(SessionOutcome::Exited),
            _ => None,
        }
    }
}

/// Live state of the one running session. Owned by the orchestrator.
#[derive(Debug)]
pub struct SessionState {
    pub plan: PracticePlan,
    pub current_section_index: usize,
    pub timer: CountdownTimer,
    pub is_paused: bool,
    pub is_running: bool,
    pub section_notes: BTreeMap<usize, String>,
    pub started_at: DateTime<Local>,
    // seconds counted down in sections already left behind
    finished_secs: u64,
}

impl SessionState {
    pub fn new(plan: PracticePlan) -> Self {
        Self {
            plan,
            current_section_index: 0,
            timer: CountdownTimer::new(),
            is_paused: false,
            is_running: false,
            section_notes: BTreeMap::new(),
            started_at: Local::now(),
            finished_secs: 0,
        }
    }

    /// Begin the timer for the section at `current_section_index`
    pub fn start_current_section(&mut self) {
        let minutes = self
            .plan
            .section(self.current_section_index)
            .map(|s| s.target_time_minutes);
        self.timer.start(minutes);
        self.is_paused = false;
        self.is_running = true;
    }

    /// Retire the current timer and move the index forward by one.
    /// Returns false once past the last section.
    pub fn move_to_next_section(&mut self) -> bool {
        self.finished_secs += self.timer.elapsed_secs();
        // dropping the old timer releases its schedule
        self.timer = CountdownTimer::new();
        self.current_section_index += 1;
        self.current_section_index < self.plan.sections.len()
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.finished_secs + self.timer.elapsed_secs()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let section = self.plan.section(self.current_section_index);
        SessionSnapshot {
            plan_name: self.plan.name.clone(),
            section_index: self.current_section_index,
            total_sections: self.plan.total_sections,
            highlight_id: section.map(|s| s.highlight_id.clone()).unwrap_or_default(),
            practice_method: section.map(|s| s.practice_method.clone()).unwrap_or_default(),
            section_notes: section.and_then(|s| s.notes.clone()),
            target_secs: self.timer.total_secs(),
            remaining_secs: self.timer.remaining_secs(),
            is_paused: self.is_paused,
        }
    }

    /// Close the books on this run
    pub fn summarize(&self, outcome: SessionOutcome) -> SessionSummary {
        let sections_completed = match outcome {
            SessionOutcome::Completed => self.plan.sections.len(),
            SessionOutcome::Exited => self.current_section_index.min(self.plan.sections.len()),
        };

        SessionSummary {
            plan_id: self.plan.id,
            plan_name: self.plan.name.clone(),
            score_id: self.plan.score_id.clone(),
            outcome,
            sections_completed,
            total_sections: self.plan.total_sections,
            elapsed_secs: self.elapsed_secs(),
            estimated_time_minutes: self.plan.estimated_time_minutes,
            section_notes: self.section_notes.clone(),
            started_at: self.started_at,
            ended_at: Local::now(),
        }
    }
}

/// Read-only view of the running session handed to observers
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub plan_name: String,
    pub section_index: usize,
    pub total_sections: usize,
    pub highlight_id: String,
    pub practice_method: PracticeMethod,
    pub section_notes: Option<String>,
    pub target_secs: u64,
    pub remaining_secs: u64,
    pub is_paused: bool,
}

/// What a finished (or abandoned) run amounted to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub plan_id: Option<PlanId>,
    pub plan_name: String,
    pub score_id: Option<String>,
    pub outcome: SessionOutcome,
    pub sections_completed: usize,
    pub total_sections: usize,
    pub elapsed_secs: u64,
    pub estimated_time_minutes: f64,
    pub section_notes: BTreeMap<usize, String>,
    pub started_at: DateTime<Local>,
    pub ended_at: DateTime<Local>,
}
