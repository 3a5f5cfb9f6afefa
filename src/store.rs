use crate::app_dirs::AppDirs;
use crate::collaborators::{HighlightSource, PlanPersistence};
use crate::error::StoreError;
use crate::plan::{Highlight, PlanId, PracticePlan, PracticeSection};
use crate::session::{SessionOutcome, SessionSummary};
use chrono::{DateTime, Local};
use itertools::Itertools;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS highlights (
    id TEXT NOT NULL,
    score_id TEXT NOT NULL,
    label TEXT NOT NULL,
    start_measure INTEGER,
    end_measure INTEGER,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (score_id, id)
);

CREATE TABLE IF NOT EXISTS practice_plans (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    score_id TEXT NOT NULL,
    name TEXT NOT NULL,
    focus TEXT NOT NULL,
    duration_minutes INTEGER NOT NULL,
    sections TEXT NOT NULL,
    total_sections INTEGER NOT NULL,
    estimated_time_minutes REAL NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_practice_plans_score ON practice_plans(score_id);

CREATE TABLE IF NOT EXISTS session_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    plan_id INTEGER,
    score_id TEXT,
    plan_name TEXT NOT NULL,
    outcome TEXT NOT NULL,
    sections_completed INTEGER NOT NULL,
    total_sections INTEGER NOT NULL,
    elapsed_secs INTEGER NOT NULL,
    estimated_time_minutes REAL NOT NULL,
    section_notes TEXT NOT NULL,
    started_at TEXT NOT NULL,
    ended_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_session_runs_score ON session_runs(score_id);
"#;

/// A finished run as stored in the history table
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: i64,
    pub summary: SessionSummary,
}

/// Flat row written by [`PracticeStore::export_history_csv`]
#[derive(Debug, Serialize)]
struct HistoryCsvRow<'a> {
    started_at: String,
    ended_at: String,
    score_id: &'a str,
    plan_name: &'a str,
    outcome: String,
    sections_completed: usize,
    total_sections: usize,
    elapsed_secs: u64,
    estimated_minutes: f64,
    notes: String,
}

/// SQLite-backed home for highlights, plans and session history
#[derive(Debug)]
pub struct PracticeStore {
    conn: Connection,
}

impl PracticeStore {
    /// Open (creating if needed) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    /// Open the database under the user's state directory
    pub fn open_default() -> Result<Self, StoreError> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("cadenza_practice.db"));
        Self::open(path)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(PracticeStore { conn })
    }

    /// Insert or replace a highlight; the last write for an id wins
    pub fn add_highlight(&self, highlight: &Highlight) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO highlights (id, score_id, label, start_measure, end_measure)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                highlight.id,
                highlight.score_id,
                highlight.label,
                highlight.start_measure,
                highlight.end_measure,
            ],
        )?;
        Ok(())
    }

    pub fn load_plan(&self, id: PlanId) -> Result<PracticePlan, StoreError> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT id, score_id, name, focus, duration_minutes, sections,
                       total_sections, estimated_time_minutes
                FROM practice_plans WHERE id = ?1
                "#,
                [id],
                PlanRow::from_row,
            )
            .optional()?;

        row.ok_or(StoreError::PlanNotFound(id))?.into_plan()
    }

    pub fn delete_plan(&self, id: PlanId) -> Result<(), StoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM practice_plans WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(StoreError::PlanNotFound(id));
        }
        Ok(())
    }

    /// Append a finished run to the history
    pub fn record_session(&self, summary: &SessionSummary) -> Result<i64, StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO session_runs
            (plan_id, score_id, plan_name, outcome, sections_completed, total_sections,
             elapsed_secs, estimated_time_minutes, section_notes, started_at, ended_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                summary.plan_id,
                summary.score_id,
                summary.plan_name,
                summary.outcome.to_string(),
                summary.sections_completed as i64,
                summary.total_sections as i64,
                summary.elapsed_secs as i64,
                summary.estimated_time_minutes,
                serde_json::to_string(&summary.section_notes)?,
                summary.started_at.to_rfc3339(),
                summary.ended_at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Past runs, newest first, optionally limited to one score
    pub fn session_history(
        &self,
        score_id: Option<&str>,
    ) -> Result<Vec<SessionRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, plan_id, score_id, plan_name, outcome, sections_completed, total_sections,
                   elapsed_secs, estimated_time_minutes, section_notes, started_at, ended_at
            FROM session_runs
            WHERE ?1 IS NULL OR score_id = ?1
            ORDER BY started_at DESC, id DESC
            "#,
        )?;

        let rows = stmt.query_map([score_id], |row| {
            let outcome: String = row.get(4)?;
            let outcome = SessionOutcome::parse(&outcome).ok_or_else(|| {
                rusqlite::Error::InvalidColumnType(
                    4,
                    "outcome".to_string(),
                    rusqlite::types::Type::Text,
                )
            })?;
            let notes: String = row.get(9)?;

            Ok((
                SessionRecord {
                    id: row.get(0)?,
                    summary: SessionSummary {
                        plan_id: row.get(1)?,
                        score_id: row.get(2)?,
                        plan_name: row.get(3)?,
                        outcome,
                        sections_completed: row.get::<_, i64>(5)? as usize,
                        total_sections: row.get::<_, i64>(6)? as usize,
                        elapsed_secs: row.get::<_, i64>(7)? as u64,
                        estimated_time_minutes: row.get(8)?,
                        section_notes: BTreeMap::new(),
                        started_at: parse_timestamp(row, 10)?,
                        ended_at: parse_timestamp(row, 11)?,
                    },
                },
                notes,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (mut record, notes) = row?;
            record.summary.section_notes = serde_json::from_str(&notes)?;
            records.push(record);
        }
        Ok(records)
    }

    /// Write the history as CSV, one row per run
    pub fn export_history_csv<W: Write>(
        &self,
        score_id: Option<&str>,
        writer: W,
    ) -> Result<usize, StoreError> {
        let records = self.session_history(score_id)?;
        let mut wtr = csv::Writer::from_writer(writer);

        for record in &records {
            let s = &record.summary;
            wtr.serialize(HistoryCsvRow {
                started_at: s.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                ended_at: s.ended_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                score_id: s.score_id.as_deref().unwrap_or(""),
                plan_name: &s.plan_name,
                outcome: s.outcome.to_string(),
                sections_completed: s.sections_completed,
                total_sections: s.total_sections,
                elapsed_secs: s.elapsed_secs,
                estimated_minutes: s.estimated_time_minutes,
                notes: s
                    .section_notes
                    .iter()
                    .map(|(idx, note)| format!("#{}: {}", idx + 1, note.replace('\n', " / ")))
                    .join(" | "),
            })?;
        }

        wtr.flush()?;
        Ok(records.len())
    }

    /// Clear all stored data (for testing or reset purposes)
    pub fn clear_all(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "DELETE FROM session_runs; DELETE FROM practice_plans; DELETE FROM highlights;",
        )?;
        Ok(())
    }
}

impl PlanPersistence for PracticeStore {
    fn save(&self, plan: &PracticePlan) -> Result<PlanId, StoreError> {
        let score_id = plan
            .score_id
            .as_deref()
            .ok_or_else(|| StoreError::MissingScore(plan.name.clone()))?;
        let now = Local::now().to_rfc3339();

        self.conn.execute(
            r#"
            INSERT INTO practice_plans
            (score_id, name, focus, duration_minutes, sections, total_sections,
             estimated_time_minutes, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            "#,
            params![
                score_id,
                plan.name,
                plan.focus,
                plan.duration_minutes,
                serde_json::to_string(&plan.sections)?,
                plan.total_sections as i64,
                plan.estimated_time_minutes,
                now,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(&self, id: PlanId, plan: &PracticePlan) -> Result<PlanId, StoreError> {
        let score_id = plan
            .score_id
            .as_deref()
            .ok_or_else(|| StoreError::MissingScore(plan.name.clone()))?;

        let changed = self.conn.execute(
            r#"
            UPDATE practice_plans
            SET score_id = ?2, name = ?3, focus = ?4, duration_minutes = ?5, sections = ?6,
                total_sections = ?7, estimated_time_minutes = ?8, updated_at = ?9
            WHERE id = ?1
            "#,
            params![
                id,
                score_id,
                plan.name,
                plan.focus,
                plan.duration_minutes,
                serde_json::to_string(&plan.sections)?,
                plan.total_sections as i64,
                plan.estimated_time_minutes,
                Local::now().to_rfc3339(),
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::PlanNotFound(id));
        }
        Ok(id)
    }

    fn load_plans_for_score(&self, score_id: &str) -> Result<Vec<PracticePlan>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, score_id, name, focus, duration_minutes, sections,
                   total_sections, estimated_time_minutes
            FROM practice_plans
            WHERE score_id = ?1
            ORDER BY updated_at DESC, id DESC
            "#,
        )?;

        let rows = stmt.query_map([score_id], PlanRow::from_row)?;

        let mut plans = Vec::new();
        for row in rows {
            plans.push(row?.into_plan()?);
        }
        Ok(plans)
    }
}

impl HighlightSource for PracticeStore {
    fn load_highlights(&self, score_id: &str) -> Result<Vec<Highlight>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, score_id, label, start_measure, end_measure
            FROM highlights
            WHERE score_id = ?1
            ORDER BY start_measure IS NULL, start_measure, created_at, id
            "#,
        )?;

        let rows = stmt.query_map([score_id], |row| {
            Ok(Highlight {
                id: row.get(0)?,
                score_id: row.get(1)?,
                label: row.get(2)?,
                start_measure: row.get(3)?,
                end_measure: row.get(4)?,
            })
        })?;

        let mut highlights = Vec::new();
        for h in rows {
            highlights.push(h?);
        }
        Ok(highlights)
    }
}

/// Raw plan columns; sections are still JSON
struct PlanRow {
    id: PlanId,
    score_id: String,
    name: String,
    focus: String,
    duration_minutes: u32,
    sections: String,
    total_sections: i64,
    estimated_time_minutes: f64,
}

impl PlanRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(PlanRow {
            id: row.get(0)?,
            score_id: row.get(1)?,
            name: row.get(2)?,
            focus: row.get(3)?,
            duration_minutes: row.get(4)?,
            sections: row.get(5)?,
            total_sections: row.get(6)?,
            estimated_time_minutes: row.get(7)?,
        })
    }

    fn into_plan(self) -> Result<PracticePlan, StoreError> {
        let sections: Vec<PracticeSection> = serde_json::from_str(&self.sections)?;
        Ok(PracticePlan {
            id: Some(self.id),
            score_id: Some(self.score_id),
            name: self.name,
            focus: self.focus,
            duration_minutes: self.duration_minutes,
            total_sections: self.total_sections as usize,
            estimated_time_minutes: self.estimated_time_minutes,
            sections,
        })
    }
}

fn parse_timestamp(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Local>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Local))
        .map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                idx,
                "timestamp".to_string(),
                rusqlite::types::Type::Text,
            )
        })
}
