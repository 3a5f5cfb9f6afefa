//! Turning edited rows into plans.
//!
//! Nothing here touches storage: every function takes values and returns a
//! fresh [`PracticePlan`], falling back to defaults instead of rejecting
//! incomplete input.

use crate::plan::{
    Highlight, PlanId, PracticeMethod, PracticePlan, PracticeSection, DEFAULT_DURATION_MINUTES,
    DEFAULT_FOCUS, DEFAULT_PLAN_NAME, DEFAULT_SECTION_MINUTES,
};
use crate::util::{format_minutes, parse_number};

/// One editable row, exactly as entered
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionEntry {
    pub highlight_id: String,
    pub practice_method: Option<String>,
    pub target_time_minutes: Option<String>,
    pub notes: Option<String>,
}

/// Header fields of the plan form, exactly as entered
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanHeader {
    pub name: String,
    pub focus: Option<String>,
    pub duration_minutes: Option<String>,
}

/// Fallbacks applied to blank or unusable input
#[derive(Debug, Clone, PartialEq)]
pub struct PlanDefaults {
    pub section_minutes: f64,
    pub duration_minutes: u32,
    pub focus: String,
    pub practice_method: PracticeMethod,
}

impl Default for PlanDefaults {
    fn default() -> Self {
        Self {
            section_minutes: DEFAULT_SECTION_MINUTES,
            duration_minutes: DEFAULT_DURATION_MINUTES,
            focus: DEFAULT_FOCUS.to_string(),
            practice_method: PracticeMethod::default(),
        }
    }
}

pub fn build_from_sections(entries: &[SectionEntry], header: &PlanHeader) -> PracticePlan {
    build_with_defaults(entries, header, &PlanDefaults::default())
}

pub fn build_with_defaults(
    entries: &[SectionEntry],
    header: &PlanHeader,
    defaults: &PlanDefaults,
) -> PracticePlan {
    let sections: Vec<PracticeSection> = entries
        .iter()
        .map(|entry| build_section(entry, defaults))
        .collect();

    let name = match header.name.trim() {
        "" => DEFAULT_PLAN_NAME.to_string(),
        name => name.to_string(),
    };
    let focus = non_blank(header.focus.as_deref()).unwrap_or_else(|| defaults.focus.clone());
    let duration_minutes = parse_number(header.duration_minutes.as_deref())
        .map(f64::trunc)
        .filter(|d| *d >= 1.0 && *d <= f64::from(u32::MAX))
        .map_or(defaults.duration_minutes, |d| d as u32);

    PracticePlan {
        id: None,
        score_id: None,
        name,
        focus,
        duration_minutes,
        total_sections: sections.len(),
        estimated_time_minutes: sections.iter().map(|s| s.target_time_minutes).sum(),
        sections,
    }
}

fn build_section(entry: &SectionEntry, defaults: &PlanDefaults) -> PracticeSection {
    PracticeSection {
        highlight_id: entry.highlight_id.trim().to_string(),
        practice_method: non_blank(entry.practice_method.as_deref())
            .map_or_else(|| defaults.practice_method.clone(), PracticeMethod::from),
        target_time_minutes: parse_number(entry.target_time_minutes.as_deref())
            .unwrap_or(defaults.section_minutes),
        notes: non_blank(entry.notes.as_deref()),
    }
}

/// Bind a built plan to its score. With `existing_id` the value replaces the
/// stored plan of that id; without one it is a new plan.
pub fn to_persistable_plan(
    plan: PracticePlan,
    score_id: &str,
    existing_id: Option<PlanId>,
) -> PracticePlan {
    PracticePlan {
        id: existing_id,
        score_id: Some(score_id.to_string()),
        ..plan
    }
}

/// Fresh rows for a new plan, one per highlight
pub fn entries_from_highlights(
    highlights: &[Highlight],
    defaults: &PlanDefaults,
) -> Vec<SectionEntry> {
    highlights
        .iter()
        .map(|h| SectionEntry {
            highlight_id: h.id.clone(),
            practice_method: Some(defaults.practice_method.to_string()),
            target_time_minutes: Some(format_minutes(defaults.section_minutes)),
            notes: None,
        })
        .collect()
}

/// Rows and header that rebuild `plan` unchanged
pub fn entries_from_plan(plan: &PracticePlan) -> (Vec<SectionEntry>, PlanHeader) {
    let entries = plan
        .sections
        .iter()
        .map(|s| SectionEntry {
            highlight_id: s.highlight_id.clone(),
            practice_method: Some(s.practice_method.to_string()),
            target_time_minutes: Some(s.target_time_minutes.to_string()),
            notes: s.notes.clone(),
        })
        .collect();
    let header = PlanHeader {
        name: plan.name.clone(),
        focus: Some(plan.focus.clone()),
        duration_minutes: Some(plan.duration_minutes.to_string()),
    };
    (entries, header)
}

fn non_blank(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}
