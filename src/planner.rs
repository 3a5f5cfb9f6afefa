use crate::collaborators::{HighlightSource, PlanPersistence};
use crate::error::PlanError;
use crate::plan::{PlanId, PracticePlan};
use crate::plan_builder::{
    build_with_defaults, entries_from_highlights, entries_from_plan, to_persistable_plan,
    PlanDefaults, PlanHeader, SectionEntry,
};
use log::{error, info};

/// Editing context for the plans of one score.
///
/// Remembers which stored plan (if any) is open so that saving overwrites it
/// rather than creating a duplicate.
#[derive(Debug, Default)]
pub struct PlanEditor {
    score_id: Option<String>,
    loaded: Option<PracticePlan>,
    defaults: PlanDefaults,
}

impl PlanEditor {
    pub fn new(defaults: PlanDefaults) -> Self {
        Self {
            score_id: None,
            loaded: None,
            defaults,
        }
    }

    /// Switch to `score_id` and open its most recently saved plan, if there is one
    pub fn open_score<P: PlanPersistence>(
        &mut self,
        store: &P,
        score_id: &str,
    ) -> Result<Option<&PracticePlan>, PlanError> {
        let plans = store.load_plans_for_score(score_id).map_err(|source| {
            error!("loading plans for score {score_id} failed: {source}");
            PlanError::Load {
                score_id: score_id.to_string(),
                source,
            }
        })?;

        self.score_id = Some(score_id.to_string());
        self.loaded = plans.into_iter().next();
        Ok(self.loaded.as_ref())
    }

    /// Close the loaded plan so the next save inserts a new one
    pub fn start_new_plan(&mut self) {
        self.loaded = None;
    }

    pub fn score_id(&self) -> Option<&str> {
        self.score_id.as_deref()
    }

    pub fn loaded(&self) -> Option<&PracticePlan> {
        self.loaded.as_ref()
    }

    pub fn defaults(&self) -> &PlanDefaults {
        &self.defaults
    }

    /// Rows to show in the editor: the loaded plan's, otherwise one per highlight
    pub fn editable_entries<H: HighlightSource>(
        &self,
        highlights: &H,
    ) -> Result<(Vec<SectionEntry>, PlanHeader), PlanError> {
        if let Some(plan) = &self.loaded {
            return Ok(entries_from_plan(plan));
        }

        let score_id = self.score_id.as_deref().ok_or(PlanError::NoActiveScore)?;
        let records = highlights
            .load_highlights(score_id)
            .map_err(|source| {
                error!("loading highlights for score {score_id} failed: {source}");
                PlanError::Highlights {
                    score_id: score_id.to_string(),
                    source,
                }
            })?;
        Ok((
            entries_from_highlights(&records, &self.defaults),
            PlanHeader::default(),
        ))
    }

    /// Build a plan from the edited rows without saving it, e.g. for a preview run
    pub fn preview(&self, entries: &[SectionEntry], header: &PlanHeader) -> PracticePlan {
        let plan = build_with_defaults(entries, header, &self.defaults);
        match self.score_id.as_deref() {
            Some(score_id) => to_persistable_plan(plan, score_id, self.loaded_id()),
            None => plan,
        }
    }

    /// Build and store a plan for the active score. Updates the loaded plan in
    /// place when there is one, inserts otherwise. On failure nothing about the
    /// editor changes, so the same call can simply be repeated.
    pub fn save<P: PlanPersistence>(
        &mut self,
        store: &P,
        entries: &[SectionEntry],
        header: &PlanHeader,
    ) -> Result<PlanId, PlanError> {
        let score_id = self.score_id.clone().ok_or(PlanError::NoActiveScore)?;
        let existing_id = self.loaded_id();
        let plan = to_persistable_plan(
            build_with_defaults(entries, header, &self.defaults),
            &score_id,
            existing_id,
        );

        let result = match existing_id {
            Some(id) => store.update(id, &plan),
            None => store.save(&plan),
        };

        match result {
            Ok(id) => {
                info!(
                    "{} plan '{}' (id {id}) for score {score_id}",
                    if existing_id.is_some() { "updated" } else { "saved" },
                    plan.name
                );
                self.loaded = Some(PracticePlan { id: Some(id), ..plan });
                Ok(id)
            }
            Err(source) => {
                error!("saving plan '{}' for score {score_id} failed: {source}", plan.name);
                Err(PlanError::Persistence {
                    score_id,
                    plan_name: plan.name,
                    source,
                })
            }
        }
    }

    fn loaded_id(&self) -> Option<PlanId> {
        self.loaded.as_ref().and_then(|p| p.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::plan::Highlight;
    use crate::store::PracticeStore;
    use assert_matches::assert_matches;
    use std::cell::Cell;

    fn entries(minutes: &[&str]) -> Vec<SectionEntry> {
        minutes
            .iter()
            .enumerate()
            .map(|(i, m)| SectionEntry {
                highlight_id: format!("h{i}"),
                practice_method: Some("slow-practice".into()),
                target_time_minutes: Some(m.to_string()),
                notes: None,
            })
            .collect()
    }

    fn header(name: &str) -> PlanHeader {
        PlanHeader {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Store that fails every call until told otherwise
    struct FlakyStore {
        inner: PracticeStore,
        failing: Cell<bool>,
    }

    impl PlanPersistence for FlakyStore {
        fn save(&self, plan: &PracticePlan) -> Result<PlanId, StoreError> {
            if self.failing.get() {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            self.inner.save(plan)
        }

        fn update(&self, id: PlanId, plan: &PracticePlan) -> Result<PlanId, StoreError> {
            if self.failing.get() {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            self.inner.update(id, plan)
        }

        fn load_plans_for_score(&self, score_id: &str) -> Result<Vec<PracticePlan>, StoreError> {
            if self.failing.get() {
                return Err(StoreError::Io(std::io::Error::other("database locked")));
            }
            self.inner.load_plans_for_score(score_id)
        }
    }

    impl HighlightSource for FlakyStore {
        fn load_highlights(&self, score_id: &str) -> Result<Vec<Highlight>, StoreError> {
            if self.failing.get() {
                return Err(StoreError::Io(std::io::Error::other("database locked")));
            }
            self.inner.load_highlights(score_id)
        }
    }

    fn flaky() -> FlakyStore {
        FlakyStore {
            inner: PracticeStore::open_in_memory().unwrap(),
            failing: Cell::new(false),
        }
    }

    #[test]
    fn test_save_without_score_is_rejected() {
        let store = PracticeStore::open_in_memory().unwrap();
        let mut editor = PlanEditor::default();
        assert_matches!(
            editor.save(&store, &entries(&["1"]), &header("x")),
            Err(PlanError::NoActiveScore)
        );
    }

    #[test]
    fn test_first_save_inserts_then_updates() {
        let store = PracticeStore::open_in_memory().unwrap();
        let mut editor = PlanEditor::default();
        assert!(editor.open_score(&store, "score-1").unwrap().is_none());

        let id = editor.save(&store, &entries(&["5", "3"]), &header("Etude")).unwrap();
        assert_eq!(editor.loaded().unwrap().id, Some(id));
        assert_eq!(editor.loaded().unwrap().estimated_time_minutes, 8.0);

        let again = editor.save(&store, &entries(&["2"]), &header("Etude v2")).unwrap();
        assert_eq!(again, id);

        let plans = store.load_plans_for_score("score-1").unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].name, "Etude v2");
        assert_eq!(plans[0].total_sections, 1);
    }

    #[test]
    fn test_open_score_loads_existing_plan_for_update() {
        let store = PracticeStore::open_in_memory().unwrap();
        let mut first = PlanEditor::default();
        first.open_score(&store, "score-1").unwrap();
        let id = first.save(&store, &entries(&["1"]), &header("Saved")).unwrap();

        let mut editor = PlanEditor::default();
        let loaded = editor.open_score(&store, "score-1").unwrap().cloned();
        assert_eq!(loaded.and_then(|p| p.id), Some(id));

        editor.save(&store, &entries(&["4"]), &header("Edited")).unwrap();
        assert_eq!(store.load_plans_for_score("score-1").unwrap().len(), 1);
    }

    #[test]
    fn test_start_new_plan_inserts() {
        let store = PracticeStore::open_in_memory().unwrap();
        let mut editor = PlanEditor::default();
        editor.open_score(&store, "score-1").unwrap();
        let a = editor.save(&store, &entries(&["1"]), &header("A")).unwrap();

        editor.start_new_plan();
        let b = editor.save(&store, &entries(&["1"]), &header("B")).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.load_plans_for_score("score-1").unwrap().len(), 2);
    }

    #[test]
    fn test_failed_save_leaves_editor_unchanged() {
        let store = flaky();
        let mut editor = PlanEditor::default();
        editor.open_score(&store, "score-1").unwrap();
        let id = editor.save(&store, &entries(&["1"]), &header("Before")).unwrap();
        let before = editor.loaded().cloned();

        store.failing.set(true);
        let err = editor
            .save(&store, &entries(&["9"]), &header("After"))
            .unwrap_err();
        assert_matches!(
            &err,
            PlanError::Persistence { score_id, plan_name, .. }
                if score_id == "score-1" && plan_name == "After"
        );
        assert_eq!(editor.loaded().cloned(), before);

        store.failing.set(false);
        assert_eq!(editor.save(&store, &entries(&["9"]), &header("After")).unwrap(), id);
        assert_eq!(store.inner.load_plan(id).unwrap().name, "After");
    }

    #[test]
    fn test_failed_open_score_keeps_previous_score() {
        let store = flaky();
        let mut editor = PlanEditor::default();
        editor.open_score(&store, "score-1").unwrap();
        let id = editor.save(&store, &entries(&["2"]), &header("Kept")).unwrap();

        store.failing.set(true);
        let err = editor.open_score(&store, "score-2").unwrap_err();
        assert_matches!(&err, PlanError::Load { score_id, .. } if score_id == "score-2");
        assert_eq!(editor.score_id(), Some("score-1"));
        assert_eq!(editor.loaded().and_then(|p| p.id), Some(id));
    }

    #[test]
    fn test_failed_highlight_load_is_reported() {
        let store = flaky();
        let mut editor = PlanEditor::default();
        editor.open_score(&store, "score-1").unwrap();

        store.failing.set(true);
        assert_matches!(
            editor.editable_entries(&store),
            Err(PlanError::Highlights { score_id, .. }) if score_id == "score-1"
        );
        assert_eq!(editor.score_id(), Some("score-1"));
        assert!(editor.loaded().is_none());

        store.failing.set(false);
        assert!(editor.editable_entries(&store).unwrap().0.is_empty());
    }

    #[test]
    fn test_editable_entries_from_highlights() {
        let store = PracticeStore::open_in_memory().unwrap();
        for (i, id) in ["intro", "coda"].iter().enumerate() {
            store
                .add_highlight(&Highlight {
                    id: id.to_string(),
                    score_id: "score-1".into(),
                    label: id.to_string(),
                    start_measure: Some(i as u32 * 10 + 1),
                    end_measure: None,
                })
                .unwrap();
        }

        let mut editor = PlanEditor::default();
        assert_matches!(editor.editable_entries(&store), Err(PlanError::NoActiveScore));

        editor.open_score(&store, "score-1").unwrap();
        let (rows, header) = editor.editable_entries(&store).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].highlight_id, "intro");
        assert_eq!(header.name, "");

        let plan = editor.preview(&rows, &header);
        assert_eq!(plan.estimated_time_minutes, 10.0);
        assert_eq!(plan.score_id.as_deref(), Some("score-1"));
        assert_eq!(plan.id, None);
    }

    #[test]
    fn test_editable_entries_prefer_loaded_plan() {
        let store = PracticeStore::open_in_memory().unwrap();
        let mut editor = PlanEditor::default();
        editor.open_score(&store, "score-1").unwrap();
        editor.save(&store, &entries(&["7"]), &header("Mine")).unwrap();

        let (rows, header) = editor.editable_entries(&store).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].target_time_minutes.as_deref(), Some("7"));
        assert_eq!(header.name, "Mine");
    }
}
