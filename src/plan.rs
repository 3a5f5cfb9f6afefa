use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of a persisted plan
pub type PlanId = i64;

pub const DEFAULT_PLAN_NAME: &str = "Untitled Session";
pub const DEFAULT_FOCUS: &str = "accuracy";
pub const DEFAULT_DURATION_MINUTES: u32 = 30;
pub const DEFAULT_SECTION_MINUTES: f64 = 5.0;

/// Technique applied while working a section.
///
/// The set is open: anything outside the well-known techniques is carried
/// through as `Custom` and only checked for presence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PracticeMethod {
    #[default]
    SlowPractice,
    HandsSeparate,
    Metronome,
    TempoPractice,
    Custom(String),
}

impl PracticeMethod {
    pub fn as_str(&self) -> &str {
        match self {
            PracticeMethod::SlowPractice => "slow-practice",
            PracticeMethod::HandsSeparate => "hands-separate",
            PracticeMethod::Metronome => "metronome",
            PracticeMethod::TempoPractice => "tempo-practice",
            PracticeMethod::Custom(s) => s,
        }
    }
}

impl fmt::Display for PracticeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for PracticeMethod {
    fn from(s: &str) -> Self {
        match s.trim() {
            "slow-practice" => PracticeMethod::SlowPractice,
            "hands-separate" => PracticeMethod::HandsSeparate,
            "metronome" => PracticeMethod::Metronome,
            "tempo-practice" => PracticeMethod::TempoPractice,
            other => PracticeMethod::Custom(other.to_string()),
        }
    }
}

impl From<String> for PracticeMethod {
    fn from(s: String) -> Self {
        PracticeMethod::from(s.as_str())
    }
}

impl From<PracticeMethod> for String {
    fn from(m: PracticeMethod) -> Self {
        m.as_str().to_string()
    }
}

impl FromStr for PracticeMethod {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(PracticeMethod::from(s))
    }
}

/// One unit of timed work, tied to a highlighted region of the score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeSection {
    pub highlight_id: String,
    pub practice_method: PracticeMethod,
    pub target_time_minutes: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// An ordered list of sections plus header metadata.
///
/// Built by [`crate::plan_builder`]; `total_sections` and
/// `estimated_time_minutes` are always derived from `sections` there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticePlan {
    pub id: Option<PlanId>,
    pub score_id: Option<String>,
    pub name: String,
    pub focus: String,
    pub duration_minutes: u32,
    pub sections: Vec<PracticeSection>,
    pub total_sections: usize,
    pub estimated_time_minutes: f64,
}

impl PracticePlan {
    pub fn section(&self, index: usize) -> Option<&PracticeSection> {
        self.sections.get(index)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Whether the summed section targets exceed the stated budget
    pub fn over_budget(&self) -> bool {
        self.estimated_time_minutes > f64::from(self.duration_minutes)
    }

    /// Find a section by highlight id; the last match wins when ids repeat
    pub fn section_for_highlight(&self, highlight_id: &str) -> Option<(usize, &PracticeSection)> {
        self.sections
            .iter()
            .enumerate()
            .rev()
            .find(|(_, s)| s.highlight_id == highlight_id)
    }
}

/// A marked region of a score, owned by the highlighting side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub id: String,
    pub score_id: String,
    pub label: String,
    pub start_measure: Option<u32>,
    pub end_measure: Option<u32>,
}

impl Highlight {
    /// Short human description, e.g. `Coda (mm. 12-20)`
    pub fn describe(&self) -> String {
        match (self.start_measure, self.end_measure) {
            (Some(a), Some(b)) if a != b => format!("{} (mm. {a}-{b})", self.label),
            (Some(a), _) => format!("{} (m. {a})", self.label),
            _ => self.label.clone(),
        }
    }
}
